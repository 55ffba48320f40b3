//! Purpose: Columnar table serialization with exact binary and text round trips.
//! Exports: `api` (stable surface) and `core` (type model, column store, codecs, errors).
//! Role: Library crate; callers hand it a table and an `std::io` sink or source.
//! Invariants: Tables are immutable once built; every codec is a pure transformation.
//! Invariants: Library code returns errors for bad input and never panics on it.
pub mod api;
pub mod core;
