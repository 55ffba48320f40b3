//! Purpose: Define the stable public Rust API boundary for colframe.
//! Exports: Table and column types, the type model, frame entrypoints, and errors.
//! Role: Public, additive-only surface; hides codec internals and wire helpers.
//! Invariants: This module is the only supported import path for library users.
//! Invariants: Internal modules remain reachable through `core` only for tests and tooling.

pub use crate::core::bitmap::{Bitmap, BitmapBuilder};
pub use crate::core::builder::ColumnBuilder;
pub use crate::core::column::{
    Column, ColumnData, Dictionary, EqualityOptions, NativeType, ObservedDictionary,
};
pub use crate::core::dtype::{DataType, Field, MAX_DECIMAL_PRECISION, PhysicalType, TimeUnit};
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::format::{FORMAT_VERSION, SUPPORTED_FORMAT_VERSIONS};
pub use crate::core::frame::{
    DEFAULT_MAX_INPUT_BYTES, DEFAULT_MAX_ROWS, Format, FrameOptions, deserialize,
    deserialize_with, from_bytes, serialize, serialize_with, to_bytes,
};
pub use crate::core::table::Table;
pub use crate::core::value::{OpaqueValue, Value};
