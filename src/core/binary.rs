//! Purpose: Encode and decode whole tables in the compact little-endian binary format.
//! Exports: `encode_table`, `decode_table`.
//! Role: Pure byte transformation; the frame layer owns sinks, sources, and options.
//! Invariants: Layout is magic | version | column count | (name, dtype)* | rows | payload* | digest.
//! Invariants: Every column except `Null` leads with its validity bitmap.
//! Invariants: Categorical payloads carry the observed dictionary; enum payloads carry codes only.
//! Invariants: Decoding never trusts a declared length beyond the bytes actually present.
use std::sync::Arc;

use bytes::Bytes;
use sha2::{Digest, Sha256};

use crate::core::bitmap::{Bitmap, byte_len};
use crate::core::column::{Column, ColumnData, Dictionary, NativeType};
use crate::core::dtype::{DataType, unsupported};
use crate::core::error::Error;
use crate::core::format::{
    BINARY_MAGIC, DIGEST_LEN, FORMAT_VERSION, is_supported_version, version_error,
};
use crate::core::table::Table;
use crate::core::visit::{ColumnVisitor, child_path, walk};
use crate::core::wire::{WireReader, WireWriter};

/// Magic, version, and column count.
const PREAMBLE_LEN: usize = 4 + 2 + 4;
/// Smallest well-formed encoding: preamble, row count, digest.
const MIN_ENCODED_LEN: usize = PREAMBLE_LEN + 8 + DIGEST_LEN;

pub fn encode_table(table: &Table) -> Result<Vec<u8>, Error> {
    let mut out = WireWriter::with_capacity(MIN_ENCODED_LEN + table.height() * table.width() * 8);
    out.put_bytes(&BINARY_MAGIC);
    out.put_u16(FORMAT_VERSION);
    out.put_u32(
        u32::try_from(table.width()).map_err(|_| Error::schema("too many columns"))?,
    );
    for column in table.columns() {
        out.put_str(column.name())
            .map_err(|err| err.with_column(column.name()))?;
        column
            .dtype()
            .write_binary(&mut out)
            .map_err(|err| err.with_column(column.name()))?;
    }
    out.put_len(table.height());
    for column in table.columns() {
        let start = out.len();
        walk(column, column.name(), &mut PayloadWriter { out: &mut out })?;
        tracing::trace!(
            column = column.name(),
            bytes = out.len() - start,
            "encoded column payload"
        );
    }
    let digest = Sha256::digest(out.as_slice());
    out.put_bytes(&digest);
    Ok(out.into_inner())
}

struct PayloadWriter<'a> {
    out: &'a mut WireWriter,
}

impl PayloadWriter<'_> {
    fn put_native<T: NativeType>(&mut self, values: &[T]) {
        let buf = self.out.buf_mut();
        buf.reserve(values.len() * T::WIDTH);
        for value in values {
            value.write_le(buf);
        }
    }

    fn put_offsets(&mut self, offsets: &[u64]) {
        self.put_native(offsets);
    }

    fn put_categories(&mut self, categories: &[String]) -> Result<(), Error> {
        self.out.put_u32(
            u32::try_from(categories.len()).map_err(|_| Error::schema("too many categories"))?,
        );
        for category in categories {
            self.out.put_str(category)?;
        }
        Ok(())
    }
}

impl ColumnVisitor for PayloadWriter<'_> {
    type Output = ();

    fn enter(&mut self, column: &Column, _path: &str) -> Result<(), Error> {
        if !matches!(column.dtype(), DataType::Null) {
            self.out.put_bytes(column.validity().as_bytes());
        }
        if let (DataType::List(_), Some(offsets)) = (column.dtype(), column.offsets()) {
            self.put_offsets(offsets);
        }
        Ok(())
    }

    fn leaf(&mut self, column: &Column, path: &str) -> Result<(), Error> {
        match column.data() {
            ColumnData::Null => {}
            ColumnData::Boolean(bits) => self.out.put_bytes(bits.as_bytes()),
            ColumnData::Int8(values) => self.put_native(values),
            ColumnData::Int16(values) => self.put_native(values),
            ColumnData::Int32(values) => self.put_native(values),
            ColumnData::Int64(values) => self.put_native(values),
            ColumnData::Int128(values) => self.put_native(values),
            ColumnData::UInt8(values) => self.put_native(values),
            ColumnData::UInt16(values) => self.put_native(values),
            ColumnData::UInt32(values) => self.put_native(values),
            ColumnData::UInt64(values) => self.put_native(values),
            ColumnData::Float32(values) => self.put_native(values),
            ColumnData::Float64(values) => self.put_native(values),
            ColumnData::Bytes { offsets, values } => {
                self.put_offsets(offsets);
                self.out.put_len(values.len());
                self.out.put_bytes(values);
            }
            ColumnData::Dictionary(dictionary) => match column.dtype() {
                DataType::Enum { .. } => self.put_native(dictionary.codes()),
                _ => {
                    let observed = column.observed_dictionary().ok_or_else(|| {
                        Error::schema("categorical column without dictionary").with_column(path)
                    })?;
                    self.put_categories(&observed.categories)
                        .map_err(|err| err.with_column(path))?;
                    self.put_native(&observed.codes);
                }
            },
            ColumnData::Opaque(_) => return Err(unsupported(column.dtype()).with_column(path)),
            ColumnData::List { .. } | ColumnData::Array(_) | ColumnData::Struct(_) => {}
        }
        Ok(())
    }

    fn list(&mut self, _column: &Column, _path: &str, _child: ()) -> Result<(), Error> {
        Ok(())
    }

    fn array(&mut self, _column: &Column, _path: &str, _child: ()) -> Result<(), Error> {
        Ok(())
    }

    fn structure(&mut self, _column: &Column, _path: &str, _fields: Vec<()>) -> Result<(), Error> {
        Ok(())
    }
}

/// Decodes a complete binary encoding. The digest is checked before any payload is parsed
/// when `verify_digest` is set. No column, nested or not, may declare more than `max_rows` rows.
pub fn decode_table(bytes: &[u8], verify_digest: bool, max_rows: usize) -> Result<Table, Error> {
    if bytes.len() < 4 || bytes[..4] != BINARY_MAGIC {
        return Err(Error::malformed("not a binary table encoding (bad magic)").with_offset(0));
    }
    let mut preamble = WireReader::new(bytes);
    preamble.take(4)?;
    let version = preamble.u16()?;
    if !is_supported_version(version) {
        return Err(version_error(u64::from(version)).with_offset(4));
    }
    if bytes.len() < MIN_ENCODED_LEN {
        return Err(Error::malformed(format!(
            "input of {} bytes is shorter than the minimal encoding",
            bytes.len()
        ))
        .with_offset(bytes.len() as u64));
    }
    let (body, trailer) = bytes.split_at(bytes.len() - DIGEST_LEN);
    if verify_digest && Sha256::digest(body).as_slice() != trailer {
        return Err(Error::malformed("digest mismatch").with_offset(body.len() as u64));
    }

    let mut input = WireReader::new(body);
    input.take(PREAMBLE_LEN - 4)?;
    let width = input.u32()? as usize;
    // Each schema entry needs a 4-byte name length and a 1-byte tag.
    if width.saturating_mul(5) > input.remaining() {
        return Err(Error::malformed(format!("declared column count {width} exceeds input"))
            .with_offset(6));
    }
    let mut schema = Vec::with_capacity(width);
    for _ in 0..width {
        let name = input.str()?.to_string();
        let dtype = DataType::read_binary(&mut input).map_err(|err| err.with_column(name.as_str()))?;
        schema.push((name, dtype));
    }
    let height = input.count(0)?;

    let mut columns = Vec::with_capacity(width);
    for (name, dtype) in schema {
        let path = name.clone();
        let column = decode_column(&mut input, &path, name, &dtype, height, max_rows)?;
        tracing::trace!(column = %path, rows = height, "decoded column payload");
        columns.push(column);
    }
    if input.remaining() != 0 {
        return Err(Error::malformed(format!(
            "{} trailing bytes after the last column",
            input.remaining()
        ))
        .with_offset(input.position() as u64));
    }
    if columns.is_empty() {
        return Ok(Table::empty_with_height(height));
    }
    Table::new(columns)
}

fn decode_column(
    input: &mut WireReader<'_>,
    path: &str,
    name: String,
    dtype: &DataType,
    rows: usize,
    max_rows: usize,
) -> Result<Column, Error> {
    let start = input.position() as u64;
    decode_column_inner(input, path, name, dtype, rows, max_rows)
        .map_err(|err| err.with_column(path).with_offset(start))
}

fn decode_column_inner(
    input: &mut WireReader<'_>,
    path: &str,
    name: String,
    dtype: &DataType,
    rows: usize,
    max_rows: usize,
) -> Result<Column, Error> {
    // Null payloads are empty, so nothing else bounds their declared length.
    if rows > max_rows {
        return Err(Error::malformed(format!(
            "column declares {rows} rows, the limit is {max_rows}"
        )));
    }
    let validity = match dtype {
        DataType::Null => Bitmap::new_unset(rows),
        _ => read_bitmap(input, rows)?,
    };
    let data = match dtype {
        DataType::Null => ColumnData::Null,
        DataType::Boolean => ColumnData::Boolean(read_bitmap(input, rows)?),
        DataType::Int8 => read_native::<i8>(input, rows)?,
        DataType::Int16 => read_native::<i16>(input, rows)?,
        DataType::Int32 | DataType::Date => read_native::<i32>(input, rows)?,
        DataType::Int64
        | DataType::Datetime { .. }
        | DataType::Duration { .. }
        | DataType::Time => read_native::<i64>(input, rows)?,
        DataType::UInt8 => read_native::<u8>(input, rows)?,
        DataType::UInt16 => read_native::<u16>(input, rows)?,
        DataType::UInt32 => read_native::<u32>(input, rows)?,
        DataType::UInt64 => read_native::<u64>(input, rows)?,
        DataType::Float32 => read_native::<f32>(input, rows)?,
        DataType::Float64 => read_native::<f64>(input, rows)?,
        DataType::Decimal { .. } => read_native::<i128>(input, rows)?,
        DataType::String | DataType::Binary => {
            let offsets = read_offsets(input, rows)?;
            let total = input.count(1)?;
            let values = Bytes::copy_from_slice(input.take(total)?);
            ColumnData::Bytes { offsets, values }
        }
        DataType::Categorical => {
            let size = input.u32()? as usize;
            if size.saturating_mul(4) > input.remaining() {
                return Err(Error::malformed(format!("dictionary size {size} exceeds input")));
            }
            let mut categories = Vec::with_capacity(size);
            for _ in 0..size {
                categories.push(input.str()?.to_string());
            }
            let codes = read_codes(input, rows)?;
            ColumnData::Dictionary(Arc::new(Dictionary::new(categories, codes)))
        }
        DataType::Enum { categories } => {
            let codes = read_codes(input, rows)?;
            ColumnData::Dictionary(Arc::new(Dictionary::new(categories.clone(), codes)))
        }
        DataType::List(inner) => {
            let offsets = read_offsets(input, rows)?;
            let child_rows = list_child_rows(&offsets)?;
            let child_path = child_path(path, "item");
            let child =
                decode_column(input, &child_path, "item".to_string(), inner, child_rows, max_rows)?;
            ColumnData::List {
                offsets,
                child: Arc::new(child),
            }
        }
        DataType::Array { inner, size } => {
            let child_rows = rows
                .checked_mul(*size)
                .ok_or_else(|| Error::malformed("array child length overflows"))?;
            let child_path = child_path(path, "item");
            let child =
                decode_column(input, &child_path, "item".to_string(), inner, child_rows, max_rows)?;
            ColumnData::Array(Arc::new(child))
        }
        DataType::Struct(fields) => {
            let mut children = Vec::with_capacity(fields.len());
            for field in fields {
                let field_path = child_path(path, &field.name);
                children.push(decode_column(
                    input,
                    &field_path,
                    field.name.clone(),
                    &field.dtype,
                    rows,
                    max_rows,
                )?);
            }
            ColumnData::Struct(children.into())
        }
        DataType::Opaque => return Err(unsupported(dtype)),
    };
    Column::try_from_parts_at(path, name, dtype.clone(), rows, validity, data)
}

fn read_bitmap(input: &mut WireReader<'_>, bits: usize) -> Result<Bitmap, Error> {
    let bytes = input.take(byte_len(bits))?;
    Bitmap::from_bytes(Bytes::copy_from_slice(bytes), bits)
}

fn read_native<T: NativeType>(input: &mut WireReader<'_>, rows: usize) -> Result<ColumnData, Error> {
    Ok(T::into_data(read_values::<T>(input, rows)?))
}

fn read_values<T: NativeType>(input: &mut WireReader<'_>, count: usize) -> Result<Arc<[T]>, Error> {
    let len = count
        .checked_mul(T::WIDTH)
        .ok_or_else(|| Error::malformed("buffer length overflows"))?;
    let raw = input.take(len)?;
    Ok(raw.chunks_exact(T::WIDTH).map(T::read_le).collect())
}

fn read_offsets(input: &mut WireReader<'_>, rows: usize) -> Result<Arc<[u64]>, Error> {
    let count = rows
        .checked_add(1)
        .ok_or_else(|| Error::malformed("offset count overflows"))?;
    read_values::<u64>(input, count)
}

fn read_codes(input: &mut WireReader<'_>, rows: usize) -> Result<Arc<[u32]>, Error> {
    read_values::<u32>(input, rows)
}

/// Child length of a list, checked for monotonic offsets before any child bytes are read.
fn list_child_rows(offsets: &[u64]) -> Result<usize, Error> {
    for (row, pair) in offsets.windows(2).enumerate() {
        if pair[1] < pair[0] {
            return Err(Error::malformed("offsets are not monotonic").with_row(row));
        }
    }
    let last = offsets.last().copied().unwrap_or(0);
    usize::try_from(last).map_err(|_| Error::malformed("list child length does not fit in memory"))
}
