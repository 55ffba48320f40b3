//! Purpose: Whole-table serialize/deserialize entrypoints over `std::io` sinks and sources.
//! Exports: `Format`, `FrameOptions`, `serialize`, `serialize_with`, `deserialize`,
//!          `deserialize_with`, `to_bytes`, `from_bytes`, `DEFAULT_MAX_INPUT_BYTES`,
//!          `DEFAULT_MAX_ROWS`.
//! Role: Dispatches to the binary or text codec; owns I/O, input bounds, and logging.
//! Invariants: Unsupported payloads fail before any byte reaches the sink.
//! Invariants: An encoding reaches the sink through one `write_all`; a failed encode writes nothing.
//! Invariants: Decoding returns a whole table or an error, never a partial table.
#![allow(clippy::result_large_err)]

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use crate::core::binary;
use crate::core::dtype::unsupported;
use crate::core::error::{Error, ErrorKind};
use crate::core::table::Table;
use crate::core::text;

/// Largest encoding `deserialize` reads unless configured otherwise.
pub const DEFAULT_MAX_INPUT_BYTES: usize = 1 << 30;

/// Largest row count any decoded column may reach, nested children included.
/// At 16 bytes per `Decimal` slot this keeps one column within `DEFAULT_MAX_INPUT_BYTES`.
pub const DEFAULT_MAX_ROWS: usize = 1 << 26;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Format {
    Binary,
    Text,
}

impl Format {
    pub fn as_str(self) -> &'static str {
        match self {
            Format::Binary => "binary",
            Format::Text => "text",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "binary" => Ok(Format::Binary),
            "text" => Ok(Format::Text),
            other => Err(Error::new(ErrorKind::Usage)
                .with_message(format!("unknown format {other:?} (expected binary or text)"))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct FrameOptions {
    /// One schema entry and one column per line in text output.
    pub pretty_text: bool,
    /// Check the binary SHA-256 trailer before decoding payloads.
    pub verify_digest: bool,
    pub max_input_bytes: usize,
    /// Row ceiling for every decoded column. Null columns and null array rows occupy no input,
    /// so the byte limit alone does not bound them.
    pub max_rows: usize,
}

impl FrameOptions {
    pub fn new() -> Self {
        Self {
            pretty_text: false,
            verify_digest: true,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            max_rows: DEFAULT_MAX_ROWS,
        }
    }
}

impl Default for FrameOptions {
    fn default() -> Self {
        Self::new()
    }
}

pub fn serialize<W: Write>(table: &Table, format: Format, sink: W) -> Result<(), Error> {
    serialize_with(table, format, sink, &FrameOptions::new())
}

pub fn serialize_with<W: Write>(
    table: &Table,
    format: Format,
    mut sink: W,
    options: &FrameOptions,
) -> Result<(), Error> {
    let bytes = encode(table, format, options)?;
    sink.write_all(&bytes)?;
    sink.flush()?;
    Ok(())
}

pub fn to_bytes(table: &Table, format: Format) -> Result<Vec<u8>, Error> {
    encode(table, format, &FrameOptions::new())
}

pub fn deserialize<R: Read>(source: R, format: Format) -> Result<Table, Error> {
    deserialize_with(source, format, &FrameOptions::new())
}

pub fn deserialize_with<R: Read>(
    source: R,
    format: Format,
    options: &FrameOptions,
) -> Result<Table, Error> {
    let bytes = read_bounded(source, options.max_input_bytes)?;
    decode(&bytes, format, options)
}

pub fn from_bytes(bytes: &[u8], format: Format) -> Result<Table, Error> {
    let options = FrameOptions::new();
    if bytes.len() > options.max_input_bytes {
        return Err(too_large(options.max_input_bytes));
    }
    decode(bytes, format, &options)
}

impl Table {
    /// Writes this table to `sink`; see [`serialize`].
    pub fn serialize<W: Write>(&self, format: Format, sink: W) -> Result<(), Error> {
        serialize(self, format, sink)
    }

    /// Reads a table from `source`; see [`deserialize`].
    pub fn deserialize<R: Read>(source: R, format: Format) -> Result<Self, Error> {
        deserialize(source, format)
    }
}

fn encode(table: &Table, format: Format, options: &FrameOptions) -> Result<Vec<u8>, Error> {
    reject_opaque(table)?;
    let bytes = match format {
        Format::Binary => binary::encode_table(table)?,
        Format::Text => text::encode_table(table, options.pretty_text)?,
    };
    tracing::debug!(
        format = %format,
        columns = table.width(),
        rows = table.height(),
        bytes = bytes.len(),
        "encoded table"
    );
    Ok(bytes)
}

fn decode(bytes: &[u8], format: Format, options: &FrameOptions) -> Result<Table, Error> {
    let table = match format {
        Format::Binary => binary::decode_table(bytes, options.verify_digest, options.max_rows)?,
        Format::Text => text::decode_table(bytes, options.max_rows)?,
    };
    tracing::debug!(
        format = %format,
        columns = table.width(),
        rows = table.height(),
        bytes = bytes.len(),
        "decoded table"
    );
    Ok(table)
}

/// Schema-level check so no encoder ever starts on a table it cannot finish.
fn reject_opaque(table: &Table) -> Result<(), Error> {
    for column in table.columns() {
        if let Some(opaque) = column.dtype().find_opaque() {
            return Err(unsupported(opaque).with_column(column.name()));
        }
    }
    Ok(())
}

fn read_bounded<R: Read>(source: R, limit: usize) -> Result<Vec<u8>, Error> {
    let mut bytes = Vec::new();
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    source.take(cap).read_to_end(&mut bytes)?;
    if bytes.len() > limit {
        return Err(too_large(limit));
    }
    Ok(bytes)
}

fn too_large(limit: usize) -> Error {
    Error::malformed(format!("input exceeds the {limit}-byte limit"))
}
