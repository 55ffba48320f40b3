//! Purpose: Row-order column construction from owned `Value`s.
//! Exports: `ColumnBuilder`.
//! Role: The only way callers assemble columns without hand-building buffers; decoders use it too
//!       for text input.
//! Invariants: Every push appends exactly one row to validity and to the physical slots.
//! Invariants: Null rows write a placeholder; arrays push `size` null children, structs push a
//!             null into every field, so child lengths never drift from the parent.
//! Invariants: `push` refuses a row that would take this column or any child past its row limit.
use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use crate::core::bitmap::BitmapBuilder;
use crate::core::column::{Column, ColumnData, Dictionary};
use crate::core::dtype::DataType;
use crate::core::error::Error;
use crate::core::value::{OpaqueValue, Value};
use crate::core::visit::child_path;

const ITEM_NAME: &str = "item";

#[derive(Debug)]
enum Slots {
    Null,
    Boolean(BitmapBuilder),
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Int128(Vec<i128>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Bytes {
        offsets: Vec<u64>,
        values: Vec<u8>,
    },
    Dictionary {
        categories: Vec<String>,
        lookup: HashMap<String, u32>,
        codes: Vec<u32>,
        closed: bool,
    },
    List {
        offsets: Vec<u64>,
        child: Box<ColumnBuilder>,
    },
    Array {
        size: usize,
        child: Box<ColumnBuilder>,
    },
    Struct(Vec<ColumnBuilder>),
    Opaque(Vec<Option<OpaqueValue>>),
}

/// Accumulates one column row by row.
#[derive(Debug)]
pub struct ColumnBuilder {
    name: String,
    /// Dotted path from the top-level column, used in error context.
    path: String,
    dtype: DataType,
    len: usize,
    max_len: usize,
    validity: BitmapBuilder,
    slots: Slots,
}

impl ColumnBuilder {
    pub fn new(name: impl Into<String>, dtype: DataType) -> Result<Self, Error> {
        let name = name.into();
        dtype.validate().map_err(|err| err.with_column(name.as_str()))?;
        let path = name.clone();
        Ok(Self::for_type(name, path, dtype))
    }

    fn for_type(name: String, path: String, dtype: DataType) -> Self {
        let slots = match &dtype {
            DataType::Null => Slots::Null,
            DataType::Boolean => Slots::Boolean(BitmapBuilder::new()),
            DataType::Int8 => Slots::Int8(Vec::new()),
            DataType::Int16 => Slots::Int16(Vec::new()),
            DataType::Int32 | DataType::Date => Slots::Int32(Vec::new()),
            DataType::Int64
            | DataType::Datetime { .. }
            | DataType::Duration { .. }
            | DataType::Time => Slots::Int64(Vec::new()),
            DataType::UInt8 => Slots::UInt8(Vec::new()),
            DataType::UInt16 => Slots::UInt16(Vec::new()),
            DataType::UInt32 => Slots::UInt32(Vec::new()),
            DataType::UInt64 => Slots::UInt64(Vec::new()),
            DataType::Float32 => Slots::Float32(Vec::new()),
            DataType::Float64 => Slots::Float64(Vec::new()),
            DataType::String | DataType::Binary => Slots::Bytes {
                offsets: vec![0],
                values: Vec::new(),
            },
            DataType::Decimal { .. } => Slots::Int128(Vec::new()),
            DataType::Categorical => Slots::Dictionary {
                categories: Vec::new(),
                lookup: HashMap::new(),
                codes: Vec::new(),
                closed: false,
            },
            DataType::Enum { categories } => Slots::Dictionary {
                categories: categories.clone(),
                lookup: categories
                    .iter()
                    .enumerate()
                    .map(|(code, category)| (category.clone(), code as u32))
                    .collect(),
                codes: Vec::new(),
                closed: true,
            },
            DataType::List(inner) => Slots::List {
                offsets: vec![0],
                child: Box::new(Self::item(&path, inner)),
            },
            DataType::Array { inner, size } => Slots::Array {
                size: *size,
                child: Box::new(Self::item(&path, inner)),
            },
            DataType::Struct(fields) => Slots::Struct(
                fields
                    .iter()
                    .map(|field| {
                        Self::for_type(
                            field.name.clone(),
                            child_path(&path, &field.name),
                            field.dtype.clone(),
                        )
                    })
                    .collect(),
            ),
            DataType::Opaque => Slots::Opaque(Vec::new()),
        };
        Self {
            name,
            path,
            dtype,
            len: 0,
            max_len: usize::MAX,
            validity: BitmapBuilder::new(),
            slots,
        }
    }

    fn item(parent: &str, inner: &DataType) -> Self {
        Self::for_type(
            ITEM_NAME.to_string(),
            child_path(parent, ITEM_NAME),
            inner.clone(),
        )
    }

    /// Caps the length of this column and every nested child. Decoders set it from
    /// `FrameOptions::max_rows`.
    pub fn with_row_limit(mut self, limit: usize) -> Self {
        self.set_row_limit(limit);
        self
    }

    fn set_row_limit(&mut self, limit: usize) {
        self.max_len = limit;
        match &mut self.slots {
            Slots::List { child, .. } | Slots::Array { child, .. } => child.set_row_limit(limit),
            Slots::Struct(fields) => fields.iter_mut().for_each(|field| field.set_row_limit(limit)),
            _ => {}
        }
    }

    /// Whether `rows` more rows fit, counting the child slots array and struct rows add.
    fn can_grow(&self, rows: usize) -> bool {
        if self.len.checked_add(rows).is_none_or(|len| len > self.max_len) {
            return false;
        }
        match &self.slots {
            Slots::Array { size, child } => {
                rows.checked_mul(*size).is_some_and(|slots| child.can_grow(slots))
            }
            Slots::Struct(fields) => fields.iter().all(|field| field.can_grow(rows)),
            _ => true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> &DataType {
        &self.dtype
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends one row. `Value::Null` is a null row; anything else must match the column type.
    pub fn push(&mut self, value: impl Into<Value>) -> Result<(), Error> {
        let value = value.into();
        let row = self.len;
        if !self.can_grow(1) {
            return Err(Error::malformed(format!(
                "row would exceed the {}-row limit",
                self.max_len
            ))
            .with_column(self.path.as_str())
            .with_row(row));
        }
        if value.is_null() {
            self.push_null();
            return Ok(());
        }
        self.push_valid(value)
            .map_err(|err| err.with_column(self.path.as_str()).with_row(row))?;
        self.validity.push(true);
        self.len += 1;
        Ok(())
    }

    pub fn push_null(&mut self) {
        match &mut self.slots {
            Slots::Null => {}
            Slots::Boolean(bits) => bits.push(false),
            Slots::Int8(buf) => buf.push(0),
            Slots::Int16(buf) => buf.push(0),
            Slots::Int32(buf) => buf.push(0),
            Slots::Int64(buf) => buf.push(0),
            Slots::Int128(buf) => buf.push(0),
            Slots::UInt8(buf) => buf.push(0),
            Slots::UInt16(buf) => buf.push(0),
            Slots::UInt32(buf) => buf.push(0),
            Slots::UInt64(buf) => buf.push(0),
            Slots::Float32(buf) => buf.push(0.0),
            Slots::Float64(buf) => buf.push(0.0),
            Slots::Bytes { offsets, values } => offsets.push(values.len() as u64),
            Slots::Dictionary { codes, .. } => codes.push(0),
            Slots::List { offsets, child } => offsets.push(child.len() as u64),
            Slots::Array { size, child } => {
                for _ in 0..*size {
                    child.push_null();
                }
            }
            Slots::Struct(fields) => fields.iter_mut().for_each(ColumnBuilder::push_null),
            Slots::Opaque(values) => values.push(None),
        }
        self.validity.push(false);
        self.len += 1;
    }

    fn push_valid(&mut self, value: Value) -> Result<(), Error> {
        let dtype = &self.dtype;
        match (&mut self.slots, value) {
            (Slots::Boolean(bits), Value::Boolean(v)) => bits.push(v),
            (Slots::Int8(buf), Value::Int8(v)) => buf.push(v),
            (Slots::Int16(buf), Value::Int16(v)) => buf.push(v),
            (Slots::Int32(buf), Value::Int32(v)) if matches!(dtype, DataType::Int32) => buf.push(v),
            (Slots::Int32(buf), Value::Date(v)) if matches!(dtype, DataType::Date) => buf.push(v),
            (Slots::Int64(buf), Value::Int64(v)) if matches!(dtype, DataType::Int64) => buf.push(v),
            (Slots::Int64(buf), Value::Datetime(v)) if matches!(dtype, DataType::Datetime { .. }) => {
                buf.push(v)
            }
            (Slots::Int64(buf), Value::Duration(v)) if matches!(dtype, DataType::Duration { .. }) => {
                buf.push(v)
            }
            (Slots::Int64(buf), Value::Time(v)) if matches!(dtype, DataType::Time) => buf.push(v),
            (Slots::Int128(buf), Value::Decimal(v)) => buf.push(v),
            (Slots::UInt8(buf), Value::UInt8(v)) => buf.push(v),
            (Slots::UInt16(buf), Value::UInt16(v)) => buf.push(v),
            (Slots::UInt32(buf), Value::UInt32(v)) => buf.push(v),
            (Slots::UInt64(buf), Value::UInt64(v)) => buf.push(v),
            (Slots::Float32(buf), Value::Float32(v)) => buf.push(v),
            (Slots::Float64(buf), Value::Float64(v)) => buf.push(v),
            (Slots::Bytes { offsets, values }, Value::String(v))
                if matches!(dtype, DataType::String) =>
            {
                values.extend_from_slice(v.as_bytes());
                offsets.push(values.len() as u64);
            }
            (Slots::Bytes { offsets, values }, Value::Binary(v))
                if matches!(dtype, DataType::Binary) =>
            {
                values.extend_from_slice(&v);
                offsets.push(values.len() as u64);
            }
            (
                Slots::Dictionary {
                    categories,
                    lookup,
                    codes,
                    closed,
                },
                Value::Category(v) | Value::String(v),
            ) => {
                let code = match lookup.get(&v) {
                    Some(code) => *code,
                    None if *closed => {
                        return Err(Error::schema(format!(
                            "category {v:?} is not a member of {dtype}"
                        )));
                    }
                    None => {
                        let code = u32::try_from(categories.len())
                            .map_err(|_| Error::schema("too many categories"))?;
                        categories.push(v.clone());
                        lookup.insert(v, code);
                        code
                    }
                };
                codes.push(code);
            }
            (Slots::List { offsets, child }, Value::List(items)) => {
                for item in items {
                    child.push(item)?;
                }
                offsets.push(child.len() as u64);
            }
            (Slots::Array { size, child }, Value::Array(items)) => {
                if items.len() != *size {
                    return Err(Error::schema(format!(
                        "array row has {} items, {dtype} needs {size}",
                        items.len()
                    )));
                }
                for item in items {
                    child.push(item)?;
                }
            }
            (Slots::Struct(fields), Value::Struct(values)) => {
                if values.len() != fields.len() {
                    return Err(Error::schema(format!(
                        "struct row has {} values, {dtype} has {} fields",
                        values.len(),
                        fields.len()
                    )));
                }
                for (field, value) in fields.iter_mut().zip(values) {
                    field.push(value)?;
                }
            }
            (Slots::Opaque(values), Value::Opaque(v)) => values.push(Some(v)),
            (_, other) => {
                return Err(Error::schema(format!(
                    "cannot store {} value in {dtype} column",
                    other.kind_name()
                )));
            }
        }
        Ok(())
    }

    pub fn finish(self) -> Result<Column, Error> {
        let data = match self.slots {
            Slots::Null => ColumnData::Null,
            Slots::Boolean(bits) => ColumnData::Boolean(bits.finish()),
            Slots::Int8(buf) => ColumnData::Int8(buf.into()),
            Slots::Int16(buf) => ColumnData::Int16(buf.into()),
            Slots::Int32(buf) => ColumnData::Int32(buf.into()),
            Slots::Int64(buf) => ColumnData::Int64(buf.into()),
            Slots::Int128(buf) => ColumnData::Int128(buf.into()),
            Slots::UInt8(buf) => ColumnData::UInt8(buf.into()),
            Slots::UInt16(buf) => ColumnData::UInt16(buf.into()),
            Slots::UInt32(buf) => ColumnData::UInt32(buf.into()),
            Slots::UInt64(buf) => ColumnData::UInt64(buf.into()),
            Slots::Float32(buf) => ColumnData::Float32(buf.into()),
            Slots::Float64(buf) => ColumnData::Float64(buf.into()),
            Slots::Bytes { offsets, values } => ColumnData::Bytes {
                offsets: offsets.into(),
                values: Bytes::from(values),
            },
            Slots::Dictionary {
                categories, codes, ..
            } => ColumnData::Dictionary(Arc::new(Dictionary::new(categories, codes))),
            Slots::List { offsets, child } => ColumnData::List {
                offsets: offsets.into(),
                child: Arc::new(child.finish()?),
            },
            Slots::Array { child, .. } => ColumnData::Array(Arc::new(child.finish()?)),
            Slots::Struct(fields) => ColumnData::Struct(
                fields
                    .into_iter()
                    .map(ColumnBuilder::finish)
                    .collect::<Result<Vec<_>, _>>()?
                    .into(),
            ),
            Slots::Opaque(values) => ColumnData::Opaque(values.into()),
        };
        Column::try_from_parts_at(
            &self.path,
            self.name,
            self.dtype,
            self.len,
            self.validity.finish(),
            data,
        )
    }
}

impl Column {
    /// Builds a column from row values in order; `None`/`Value::Null` entries become null rows.
    pub fn from_values<I, V>(name: impl Into<String>, dtype: DataType, values: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let mut builder = ColumnBuilder::new(name, dtype)?;
        for value in values {
            builder.push(value)?;
        }
        builder.finish()
    }
}
