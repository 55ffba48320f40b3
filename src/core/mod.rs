// Core modules implementing the type model, column store, codecs, and error modeling.
pub mod binary;
pub mod bitmap;
pub mod builder;
pub mod column;
pub mod dtype;
pub mod error;
pub mod format;
pub mod frame;
pub mod table;
pub(crate) mod temporal;
pub mod text;
pub mod value;
pub(crate) mod visit;
pub(crate) mod wire;
