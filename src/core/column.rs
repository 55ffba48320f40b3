//! Purpose: Immutable, shareable typed columns: validity bitmap + physical buffers + children.
//! Exports: `Column`, `ColumnData`, `Dictionary`, `ObservedDictionary`, `NativeType`, `EqualityOptions`.
//! Role: Read-only structure the codecs iterate; decoders assemble new columns via `try_from_parts`.
//! Invariants: Validity length equals the row count; array children hold exactly `rows * size` rows.
//! Invariants: Offsets start at 0, never decrease, and end at the child/value length.
//! Invariants: The observed-dictionary cache is published once through `OnceLock`; columns are
//!             otherwise never mutated after construction.
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use bytes::Bytes;

use crate::core::bitmap::Bitmap;
use crate::core::dtype::{DataType, PhysicalType};
use crate::core::error::Error;
use crate::core::value::{OpaqueValue, Value};

/// Physical storage of a column. The variant is fixed by `DataType::physical`.
#[derive(Clone, Debug)]
pub enum ColumnData {
    Null,
    Boolean(Bitmap),
    Int8(Arc<[i8]>),
    Int16(Arc<[i16]>),
    Int32(Arc<[i32]>),
    Int64(Arc<[i64]>),
    Int128(Arc<[i128]>),
    UInt8(Arc<[u8]>),
    UInt16(Arc<[u16]>),
    UInt32(Arc<[u32]>),
    UInt64(Arc<[u64]>),
    Float32(Arc<[f32]>),
    Float64(Arc<[f64]>),
    Bytes { offsets: Arc<[u64]>, values: Bytes },
    Dictionary(Arc<Dictionary>),
    List { offsets: Arc<[u64]>, child: Arc<Column> },
    Array(Arc<Column>),
    Struct(Arc<[Column]>),
    Opaque(Arc<[Option<OpaqueValue>]>),
}

impl ColumnData {
    pub fn physical(&self) -> PhysicalType {
        match self {
            ColumnData::Null => PhysicalType::Null,
            ColumnData::Boolean(_) => PhysicalType::Boolean,
            ColumnData::Int8(_) => PhysicalType::Int8,
            ColumnData::Int16(_) => PhysicalType::Int16,
            ColumnData::Int32(_) => PhysicalType::Int32,
            ColumnData::Int64(_) => PhysicalType::Int64,
            ColumnData::Int128(_) => PhysicalType::Int128,
            ColumnData::UInt8(_) => PhysicalType::UInt8,
            ColumnData::UInt16(_) => PhysicalType::UInt16,
            ColumnData::UInt32(_) => PhysicalType::UInt32,
            ColumnData::UInt64(_) => PhysicalType::UInt64,
            ColumnData::Float32(_) => PhysicalType::Float32,
            ColumnData::Float64(_) => PhysicalType::Float64,
            ColumnData::Bytes { .. } => PhysicalType::Bytes,
            ColumnData::Dictionary(_) => PhysicalType::Dictionary,
            ColumnData::List { .. } => PhysicalType::List,
            ColumnData::Array(_) => PhysicalType::Array,
            ColumnData::Struct(_) => PhysicalType::Struct,
            ColumnData::Opaque(_) => PhysicalType::Opaque,
        }
    }
}

/// Fixed-width native values stored in flat buffers.
pub trait NativeType: Copy + Send + Sync + 'static {
    const WIDTH: usize;

    fn buffer(data: &ColumnData) -> Option<&[Self]>;
    fn into_data(values: Arc<[Self]>) -> ColumnData;
    fn write_le(self, out: &mut Vec<u8>);
    /// `bytes` is exactly `WIDTH` long.
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! native_type {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl NativeType for $t {
                const WIDTH: usize = std::mem::size_of::<$t>();

                fn buffer(data: &ColumnData) -> Option<&[Self]> {
                    match data {
                        ColumnData::$variant(values) => Some(values),
                        _ => None,
                    }
                }

                fn into_data(values: Arc<[Self]>) -> ColumnData {
                    ColumnData::$variant(values)
                }

                fn write_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                fn read_le(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$t>()];
                    raw.copy_from_slice(bytes);
                    <$t>::from_le_bytes(raw)
                }
            }
        )*
    };
}

native_type!(
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    i128 => Int128,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
);

/// Categories plus one code per row.
#[derive(Debug)]
pub struct Dictionary {
    categories: Arc<[String]>,
    codes: Arc<[u32]>,
}

impl Dictionary {
    pub fn new(categories: impl Into<Arc<[String]>>, codes: impl Into<Arc<[u32]>>) -> Self {
        Self {
            categories: categories.into(),
            codes: codes.into(),
        }
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn codes(&self) -> &[u32] {
        &self.codes
    }

    pub fn category(&self, code: u32) -> Option<&str> {
        self.categories.get(code as usize).map(String::as_str)
    }
}

/// Categories referenced by valid rows in first-appearance order, with codes remapped onto them.
/// Null rows carry code 0.
#[derive(Debug, PartialEq, Eq)]
pub struct ObservedDictionary {
    pub categories: Vec<String>,
    pub codes: Vec<u32>,
}

/// Comparison switches for `Column::equals_with` and `Table::equals_with`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct EqualityOptions {
    /// Compare categorical columns by realized strings only, ignoring dictionary order.
    pub categorical_as_str: bool,
}

impl EqualityOptions {
    pub fn strict() -> Self {
        Self::default()
    }

    pub fn categorical_as_str() -> Self {
        Self {
            categorical_as_str: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Column {
    name: String,
    dtype: DataType,
    len: usize,
    validity: Bitmap,
    data: ColumnData,
    observed: Arc<OnceLock<ObservedDictionary>>,
}

impl Column {
    /// Assembles a column from already-decoded parts, checking every structural invariant.
    pub fn try_from_parts(
        name: impl Into<String>,
        dtype: DataType,
        len: usize,
        validity: Bitmap,
        data: ColumnData,
    ) -> Result<Self, Error> {
        let name = name.into();
        let path = name.clone();
        Self::try_from_parts_at(&path, name, dtype, len, validity, data)
    }

    /// Like `try_from_parts`, but errors name `path` (for example `outer.item`) instead of the
    /// bare column name.
    pub(crate) fn try_from_parts_at(
        path: &str,
        name: String,
        dtype: DataType,
        len: usize,
        validity: Bitmap,
        data: ColumnData,
    ) -> Result<Self, Error> {
        check_parts(&dtype, len, &validity, &data).map_err(|err| err.with_column(path))?;
        Ok(Self {
            name,
            dtype,
            len,
            validity,
            data,
            observed: Arc::new(OnceLock::new()),
        })
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

    pub fn validity(&self) -> &Bitmap {
        &self.validity
    }

    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    pub fn is_valid(&self, row: usize) -> bool {
        row < self.len && self.validity.get(row)
    }

    pub fn null_count(&self) -> usize {
        self.validity.count_unset()
    }

    /// Returns the same column under another name; buffers are shared.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    pub fn primitive<T: NativeType>(&self) -> Option<&[T]> {
        T::buffer(&self.data)
    }

    pub fn offsets(&self) -> Option<&[u64]> {
        match &self.data {
            ColumnData::Bytes { offsets, .. } | ColumnData::List { offsets, .. } => Some(offsets),
            _ => None,
        }
    }

    pub fn value_bytes(&self, row: usize) -> Option<&[u8]> {
        match &self.data {
            ColumnData::Bytes { offsets, values } if row < self.len => {
                Some(&values[offsets[row] as usize..offsets[row + 1] as usize])
            }
            _ => None,
        }
    }

    pub fn dictionary(&self) -> Option<&Dictionary> {
        match &self.data {
            ColumnData::Dictionary(dictionary) => Some(dictionary),
            _ => None,
        }
    }

    pub fn child(&self) -> Option<&Column> {
        match &self.data {
            ColumnData::List { child, .. } | ColumnData::Array(child) => Some(child),
            _ => None,
        }
    }

    pub fn fields(&self) -> Option<&[Column]> {
        match &self.data {
            ColumnData::Struct(fields) => Some(fields),
            _ => None,
        }
    }

    /// The dictionary restricted to categories valid rows actually use.
    ///
    /// Computed on first access and published once; concurrent first callers
    /// wait for that single computation. Clones share the cache.
    pub fn observed_dictionary(&self) -> Option<&ObservedDictionary> {
        let dictionary = self.dictionary()?;
        Some(
            self.observed
                .get_or_init(|| observe(dictionary, &self.validity)),
        )
    }

    pub fn get(&self, row: usize) -> Option<Value> {
        (row < self.len).then(|| self.value_at(row))
    }

    pub fn iter(&self) -> impl Iterator<Item = Value> + '_ {
        (0..self.len).map(move |row| self.value_at(row))
    }

    pub(crate) fn value_at(&self, row: usize) -> Value {
        if !self.validity.get(row) {
            return Value::Null;
        }
        match (&self.dtype, &self.data) {
            (DataType::Boolean, ColumnData::Boolean(bits)) => Value::Boolean(bits.get(row)),
            (DataType::Int8, ColumnData::Int8(v)) => Value::Int8(v[row]),
            (DataType::Int16, ColumnData::Int16(v)) => Value::Int16(v[row]),
            (DataType::Int32, ColumnData::Int32(v)) => Value::Int32(v[row]),
            (DataType::Int64, ColumnData::Int64(v)) => Value::Int64(v[row]),
            (DataType::UInt8, ColumnData::UInt8(v)) => Value::UInt8(v[row]),
            (DataType::UInt16, ColumnData::UInt16(v)) => Value::UInt16(v[row]),
            (DataType::UInt32, ColumnData::UInt32(v)) => Value::UInt32(v[row]),
            (DataType::UInt64, ColumnData::UInt64(v)) => Value::UInt64(v[row]),
            (DataType::Float32, ColumnData::Float32(v)) => Value::Float32(v[row]),
            (DataType::Float64, ColumnData::Float64(v)) => Value::Float64(v[row]),
            (DataType::Date, ColumnData::Int32(v)) => Value::Date(v[row]),
            (DataType::Datetime { .. }, ColumnData::Int64(v)) => Value::Datetime(v[row]),
            (DataType::Duration { .. }, ColumnData::Int64(v)) => Value::Duration(v[row]),
            (DataType::Time, ColumnData::Int64(v)) => Value::Time(v[row]),
            (DataType::Decimal { .. }, ColumnData::Int128(v)) => Value::Decimal(v[row]),
            (DataType::String, ColumnData::Bytes { .. }) => {
                let bytes = self.value_bytes(row).unwrap_or_default();
                Value::String(String::from_utf8_lossy(bytes).into_owned())
            }
            (DataType::Binary, ColumnData::Bytes { .. }) => {
                Value::Binary(self.value_bytes(row).unwrap_or_default().to_vec())
            }
            (DataType::Categorical | DataType::Enum { .. }, ColumnData::Dictionary(dict)) => {
                dict.category(dict.codes[row])
                    .map_or(Value::Null, |category| Value::Category(category.to_string()))
            }
            (DataType::List(_), ColumnData::List { offsets, child }) => {
                let start = offsets[row] as usize;
                let end = offsets[row + 1] as usize;
                Value::List((start..end).map(|idx| child.value_at(idx)).collect())
            }
            (DataType::Array { size, .. }, ColumnData::Array(child)) => {
                let start = row * size;
                Value::Array((start..start + size).map(|idx| child.value_at(idx)).collect())
            }
            (DataType::Struct(_), ColumnData::Struct(fields)) => {
                Value::Struct(fields.iter().map(|field| field.value_at(row)).collect())
            }
            (DataType::Opaque, ColumnData::Opaque(values)) => {
                values[row].clone().map_or(Value::Null, Value::Opaque)
            }
            // `check_parts` rules out every other pairing.
            _ => Value::Null,
        }
    }

    pub fn equals_with(&self, other: &Column, options: EqualityOptions) -> bool {
        if self.name != other.name || self.dtype != other.dtype || self.len != other.len {
            return false;
        }
        if self.validity != other.validity {
            return false;
        }
        if !(0..self.len).all(|row| self.value_at(row) == other.value_at(row)) {
            return false;
        }
        options.categorical_as_str || dictionaries_match(self, other)
    }
}

impl PartialEq for Column {
    fn eq(&self, other: &Self) -> bool {
        self.equals_with(other, EqualityOptions::strict())
    }
}

fn dictionaries_match(left: &Column, right: &Column) -> bool {
    match (&left.data, &right.data) {
        (ColumnData::Dictionary(a), ColumnData::Dictionary(b)) => {
            a.categories == b.categories
                && (0..left.len)
                    .filter(|row| left.validity.get(*row))
                    .all(|row| a.codes[row] == b.codes[row])
        }
        (ColumnData::List { child: a, .. }, ColumnData::List { child: b, .. })
        | (ColumnData::Array(a), ColumnData::Array(b)) => dictionaries_match(a, b),
        (ColumnData::Struct(a), ColumnData::Struct(b)) => a
            .iter()
            .zip(b.iter())
            .all(|(left, right)| dictionaries_match(left, right)),
        _ => true,
    }
}

fn observe(dictionary: &Dictionary, validity: &Bitmap) -> ObservedDictionary {
    let mut remap: HashMap<u32, u32> = HashMap::new();
    let mut categories = Vec::new();
    let mut codes = Vec::with_capacity(dictionary.codes.len());
    for (row, code) in dictionary.codes.iter().enumerate() {
        if !validity.get(row) {
            codes.push(0);
            continue;
        }
        let next = remap.len() as u32;
        let mapped = *remap.entry(*code).or_insert_with(|| {
            categories.push(
                dictionary
                    .category(*code)
                    .map(str::to_string)
                    .unwrap_or_default(),
            );
            next
        });
        codes.push(mapped);
    }
    ObservedDictionary { categories, codes }
}

fn check_parts(dtype: &DataType, len: usize, validity: &Bitmap, data: &ColumnData) -> Result<(), Error> {
    dtype.validate()?;
    if validity.len() != len {
        return Err(Error::malformed(format!(
            "validity has {} bits for {len} rows",
            validity.len()
        )));
    }
    if dtype.physical() != data.physical() {
        return Err(Error::schema(format!(
            "{dtype} cannot be stored as {:?}",
            data.physical()
        )));
    }
    match (dtype, data) {
        (DataType::Null, ColumnData::Null) => {
            if validity.count_unset() != len {
                return Err(Error::malformed("null column has valid rows"));
            }
        }
        (_, ColumnData::Boolean(bits)) => expect_len("values", bits.len(), len)?,
        (_, ColumnData::Int8(v)) => expect_len("values", v.len(), len)?,
        (_, ColumnData::Int16(v)) => expect_len("values", v.len(), len)?,
        (_, ColumnData::Int32(v)) => expect_len("values", v.len(), len)?,
        (_, ColumnData::Int64(v)) => expect_len("values", v.len(), len)?,
        (_, ColumnData::Int128(v)) => expect_len("values", v.len(), len)?,
        (_, ColumnData::UInt8(v)) => expect_len("values", v.len(), len)?,
        (_, ColumnData::UInt16(v)) => expect_len("values", v.len(), len)?,
        (_, ColumnData::UInt32(v)) => expect_len("values", v.len(), len)?,
        (_, ColumnData::UInt64(v)) => expect_len("values", v.len(), len)?,
        (_, ColumnData::Float32(v)) => expect_len("values", v.len(), len)?,
        (_, ColumnData::Float64(v)) => expect_len("values", v.len(), len)?,
        (_, ColumnData::Bytes { offsets, values }) => {
            check_offsets(offsets, len, values.len())?;
            if matches!(dtype, DataType::String) {
                for row in (0..len).filter(|row| validity.get(*row)) {
                    let slice = &values[offsets[row] as usize..offsets[row + 1] as usize];
                    std::str::from_utf8(slice).map_err(|err| {
                        Error::malformed("invalid utf-8 in string value")
                            .with_row(row)
                            .with_source(err)
                    })?;
                }
            }
        }
        (_, ColumnData::Dictionary(dictionary)) => {
            expect_len("codes", dictionary.codes.len(), len)?;
            if let DataType::Enum { categories } = dtype {
                if dictionary.categories() != categories.as_slice() {
                    return Err(Error::schema(
                        "enum dictionary differs from the declared categories",
                    ));
                }
            }
            let size = dictionary.categories.len();
            for row in (0..len).filter(|row| validity.get(*row)) {
                if dictionary.codes[row] as usize >= size {
                    return Err(Error::malformed(format!(
                        "code {} outside dictionary of {size}",
                        dictionary.codes[row]
                    ))
                    .with_row(row));
                }
            }
        }
        (DataType::List(inner), ColumnData::List { offsets, child }) => {
            check_offsets(offsets, len, child.len())?;
            expect_child_type(inner, child)?;
        }
        (DataType::Array { inner, size }, ColumnData::Array(child)) => {
            let expected = len
                .checked_mul(*size)
                .ok_or_else(|| Error::malformed("array child length overflows"))?;
            expect_len("array child", child.len(), expected)?;
            expect_child_type(inner, child)?;
        }
        (DataType::Struct(declared), ColumnData::Struct(fields)) => {
            if declared.len() != fields.len() {
                return Err(Error::schema(format!(
                    "struct declares {} fields, got {}",
                    declared.len(),
                    fields.len()
                )));
            }
            for (field, column) in declared.iter().zip(fields.iter()) {
                if field.name != column.name {
                    return Err(Error::schema(format!(
                        "struct field {:?} stored as {:?}",
                        field.name, column.name
                    )));
                }
                expect_child_type(&field.dtype, column)?;
                expect_len("struct field", column.len(), len)?;
            }
        }
        (DataType::Opaque, ColumnData::Opaque(values)) => expect_len("values", values.len(), len)?,
        _ => {
            return Err(Error::schema(format!(
                "{dtype} cannot be stored as {:?}",
                data.physical()
            )));
        }
    }
    Ok(())
}

fn expect_len(what: &str, actual: usize, expected: usize) -> Result<(), Error> {
    if actual != expected {
        return Err(Error::malformed(format!(
            "{what} length {actual} does not match expected {expected}"
        )));
    }
    Ok(())
}

fn expect_child_type(declared: &DataType, child: &Column) -> Result<(), Error> {
    if child.dtype() != declared {
        return Err(Error::schema(format!(
            "child {:?} has type {}, declared {declared}",
            child.name(),
            child.dtype()
        )));
    }
    Ok(())
}

pub(crate) fn check_offsets(offsets: &[u64], len: usize, target: usize) -> Result<(), Error> {
    expect_len("offsets", offsets.len(), len + 1)?;
    if offsets[0] != 0 {
        return Err(Error::malformed("offsets must start at 0"));
    }
    for (row, pair) in offsets.windows(2).enumerate() {
        if pair[1] < pair[0] {
            return Err(Error::malformed("offsets are not monotonic").with_row(row));
        }
    }
    if offsets[len] != target as u64 {
        return Err(Error::malformed(format!(
            "final offset {} does not match length {target}",
            offsets[len]
        )));
    }
    Ok(())
}
