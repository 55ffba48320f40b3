//! Purpose: Define the closed, recursive logical type model and its two schema encodings.
//! Exports: `DataType`, `Field`, `TimeUnit`, `PhysicalType`.
//! Role: Single source of truth for what a column means; codecs dispatch on it exhaustively.
//! Invariants: Binary tags are stable and additive; unknown tags are rejected, never guessed.
//! Invariants: `Decimal` precision stays `None` when unspecified; nothing here defaults it.
//! Invariants: `Opaque` has no binary tag and no text form; it is detected before encoding.
use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::error::{Error, ErrorKind};
use crate::core::format::MAX_NESTING_DEPTH;
use crate::core::wire::{WireReader, WireWriter};

/// Largest decimal precision representable by the `i128` physical buffer.
pub const MAX_DECIMAL_PRECISION: u8 = 38;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum TimeUnit {
    #[serde(rename = "ms")]
    Milliseconds,
    #[serde(rename = "us")]
    Microseconds,
    #[serde(rename = "ns")]
    Nanoseconds,
}

impl TimeUnit {
    pub fn nanos_per_unit(self) -> i128 {
        match self {
            TimeUnit::Milliseconds => 1_000_000,
            TimeUnit::Microseconds => 1_000,
            TimeUnit::Nanoseconds => 1,
        }
    }

    fn tag(self) -> u8 {
        match self {
            TimeUnit::Milliseconds => 0,
            TimeUnit::Microseconds => 1,
            TimeUnit::Nanoseconds => 2,
        }
    }

    fn from_tag(tag: u8) -> Result<Self, Error> {
        match tag {
            0 => Ok(TimeUnit::Milliseconds),
            1 => Ok(TimeUnit::Microseconds),
            2 => Ok(TimeUnit::Nanoseconds),
            _ => Err(Error::malformed(format!("unknown time unit tag {tag}"))),
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self {
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Microseconds => "us",
            TimeUnit::Nanoseconds => "ns",
        };
        f.write_str(unit)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub dtype: DataType,
}

impl Field {
    pub fn new(name: impl Into<String>, dtype: DataType) -> Self {
        Self {
            name: name.into(),
            dtype,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Null,
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    String,
    Binary,
    /// Days since 1970-01-01.
    Date,
    Datetime {
        unit: TimeUnit,
        timezone: Option<String>,
    },
    Duration {
        unit: TimeUnit,
    },
    /// Nanoseconds since midnight.
    Time,
    Decimal {
        precision: Option<u8>,
        scale: u8,
    },
    Categorical,
    Enum {
        categories: Vec<String>,
    },
    List(Box<DataType>),
    Array {
        inner: Box<DataType>,
        size: usize,
    },
    Struct(Vec<Field>),
    #[serde(skip)]
    Opaque,
}

/// Physical storage shape backing a logical type.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PhysicalType {
    Null,
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    Int128,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Bytes,
    Dictionary,
    List,
    Array,
    Struct,
    Opaque,
}

impl DataType {
    pub fn list(inner: DataType) -> Self {
        DataType::List(Box::new(inner))
    }

    pub fn array(inner: DataType, size: usize) -> Self {
        DataType::Array {
            inner: Box::new(inner),
            size,
        }
    }

    pub fn datetime(unit: TimeUnit, timezone: Option<&str>) -> Self {
        DataType::Datetime {
            unit,
            timezone: timezone.map(str::to_string),
        }
    }

    pub fn decimal(precision: Option<u8>, scale: u8) -> Self {
        DataType::Decimal { precision, scale }
    }

    pub fn enumeration<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DataType::Enum {
            categories: categories.into_iter().map(Into::into).collect(),
        }
    }

    pub fn physical(&self) -> PhysicalType {
        match self {
            DataType::Null => PhysicalType::Null,
            DataType::Boolean => PhysicalType::Boolean,
            DataType::Int8 => PhysicalType::Int8,
            DataType::Int16 => PhysicalType::Int16,
            DataType::Int32 | DataType::Date => PhysicalType::Int32,
            DataType::Int64
            | DataType::Datetime { .. }
            | DataType::Duration { .. }
            | DataType::Time => PhysicalType::Int64,
            DataType::UInt8 => PhysicalType::UInt8,
            DataType::UInt16 => PhysicalType::UInt16,
            DataType::UInt32 => PhysicalType::UInt32,
            DataType::UInt64 => PhysicalType::UInt64,
            DataType::Float32 => PhysicalType::Float32,
            DataType::Float64 => PhysicalType::Float64,
            DataType::String | DataType::Binary => PhysicalType::Bytes,
            DataType::Decimal { .. } => PhysicalType::Int128,
            DataType::Categorical | DataType::Enum { .. } => PhysicalType::Dictionary,
            DataType::List(_) => PhysicalType::List,
            DataType::Array { .. } => PhysicalType::Array,
            DataType::Struct(_) => PhysicalType::Struct,
            DataType::Opaque => PhysicalType::Opaque,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    pub fn is_nested(&self) -> bool {
        matches!(
            self,
            DataType::List(_) | DataType::Array { .. } | DataType::Struct(_)
        )
    }

    /// Returns the first `Opaque` found at any depth, if any.
    pub fn find_opaque(&self) -> Option<&DataType> {
        match self {
            DataType::Opaque => Some(self),
            DataType::List(inner) | DataType::Array { inner, .. } => inner.find_opaque(),
            DataType::Struct(fields) => fields.iter().find_map(|field| field.dtype.find_opaque()),
            _ => None,
        }
    }

    /// Checks that the declared type is internally consistent.
    pub fn validate(&self) -> Result<(), Error> {
        self.validate_at(0)
    }

    fn validate_at(&self, depth: usize) -> Result<(), Error> {
        if depth > MAX_NESTING_DEPTH {
            return Err(Error::schema(format!(
                "type nesting exceeds {MAX_NESTING_DEPTH} levels"
            )));
        }
        match self {
            DataType::Decimal { precision, scale } => {
                if let Some(precision) = precision {
                    if *precision == 0 || *precision > MAX_DECIMAL_PRECISION {
                        return Err(Error::schema(format!(
                            "decimal precision {precision} outside 1..={MAX_DECIMAL_PRECISION}"
                        )));
                    }
                    if scale > precision {
                        return Err(Error::schema(format!(
                            "decimal scale {scale} exceeds precision {precision}"
                        )));
                    }
                } else if *scale > MAX_DECIMAL_PRECISION {
                    return Err(Error::schema(format!(
                        "decimal scale {scale} exceeds {MAX_DECIMAL_PRECISION}"
                    )));
                }
                Ok(())
            }
            DataType::Enum { categories } => {
                let mut seen = HashSet::with_capacity(categories.len());
                for category in categories {
                    if !seen.insert(category.as_str()) {
                        return Err(Error::schema(format!(
                            "duplicate enum category {category:?}"
                        )));
                    }
                }
                if u32::try_from(categories.len()).is_err() {
                    return Err(Error::schema("enum has too many categories"));
                }
                Ok(())
            }
            DataType::List(inner) => inner.validate_at(depth + 1),
            DataType::Array { inner, size } => {
                if *size == 0 {
                    return Err(Error::schema("array size must be positive"));
                }
                inner.validate_at(depth + 1)
            }
            DataType::Struct(fields) => {
                let mut seen = HashSet::with_capacity(fields.len());
                for field in fields {
                    if !seen.insert(field.name.as_str()) {
                        return Err(Error::schema(format!(
                            "duplicate struct field {:?}",
                            field.name
                        )));
                    }
                    field.dtype.validate_at(depth + 1)?;
                }
                Ok(())
            }
            DataType::Null
            | DataType::Boolean
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
            | DataType::String
            | DataType::Binary
            | DataType::Date
            | DataType::Datetime { .. }
            | DataType::Duration { .. }
            | DataType::Time
            | DataType::Categorical
            | DataType::Opaque => Ok(()),
        }
    }

    pub(crate) fn write_binary(&self, out: &mut WireWriter) -> Result<(), Error> {
        match self {
            DataType::Null => out.put_u8(0),
            DataType::Boolean => out.put_u8(1),
            DataType::Int8 => out.put_u8(2),
            DataType::Int16 => out.put_u8(3),
            DataType::Int32 => out.put_u8(4),
            DataType::Int64 => out.put_u8(5),
            DataType::UInt8 => out.put_u8(6),
            DataType::UInt16 => out.put_u8(7),
            DataType::UInt32 => out.put_u8(8),
            DataType::UInt64 => out.put_u8(9),
            DataType::Float32 => out.put_u8(10),
            DataType::Float64 => out.put_u8(11),
            DataType::String => out.put_u8(12),
            DataType::Binary => out.put_u8(13),
            DataType::Date => out.put_u8(14),
            DataType::Datetime { unit, timezone } => {
                out.put_u8(15);
                out.put_u8(unit.tag());
                match timezone {
                    Some(tz) => {
                        out.put_u8(1);
                        out.put_str(tz)?;
                    }
                    None => out.put_u8(0),
                }
            }
            DataType::Duration { unit } => {
                out.put_u8(16);
                out.put_u8(unit.tag());
            }
            DataType::Time => out.put_u8(17),
            DataType::Decimal { precision, scale } => {
                out.put_u8(18);
                match precision {
                    Some(precision) => {
                        out.put_u8(1);
                        out.put_u8(*precision);
                    }
                    None => out.put_u8(0),
                }
                out.put_u8(*scale);
            }
            DataType::Categorical => out.put_u8(19),
            DataType::Enum { categories } => {
                out.put_u8(20);
                out.put_u32(u32::try_from(categories.len()).map_err(|_| {
                    Error::schema("enum has too many categories")
                })?);
                for category in categories {
                    out.put_str(category)?;
                }
            }
            DataType::List(inner) => {
                out.put_u8(21);
                inner.write_binary(out)?;
            }
            DataType::Array { inner, size } => {
                out.put_u8(22);
                out.put_len(*size);
                inner.write_binary(out)?;
            }
            DataType::Struct(fields) => {
                out.put_u8(23);
                out.put_u32(u32::try_from(fields.len()).map_err(|_| {
                    Error::schema("struct has too many fields")
                })?);
                for field in fields {
                    out.put_str(&field.name)?;
                    field.dtype.write_binary(out)?;
                }
            }
            DataType::Opaque => return Err(unsupported(self)),
        }
        Ok(())
    }

    pub(crate) fn read_binary(input: &mut WireReader<'_>) -> Result<Self, Error> {
        let dtype = Self::read_binary_at(input, 0)?;
        dtype.validate()?;
        Ok(dtype)
    }

    fn read_binary_at(input: &mut WireReader<'_>, depth: usize) -> Result<Self, Error> {
        if depth > MAX_NESTING_DEPTH {
            return Err(Error::malformed(format!(
                "type nesting exceeds {MAX_NESTING_DEPTH} levels"
            ))
            .with_offset(input.position() as u64));
        }
        let at = input.position() as u64;
        let tag = input.u8()?;
        let dtype = match tag {
            0 => DataType::Null,
            1 => DataType::Boolean,
            2 => DataType::Int8,
            3 => DataType::Int16,
            4 => DataType::Int32,
            5 => DataType::Int64,
            6 => DataType::UInt8,
            7 => DataType::UInt16,
            8 => DataType::UInt32,
            9 => DataType::UInt64,
            10 => DataType::Float32,
            11 => DataType::Float64,
            12 => DataType::String,
            13 => DataType::Binary,
            14 => DataType::Date,
            15 => {
                let unit = TimeUnit::from_tag(input.u8()?)?;
                let timezone = match read_presence(input)? {
                    true => Some(input.str()?.to_string()),
                    false => None,
                };
                DataType::Datetime { unit, timezone }
            }
            16 => DataType::Duration {
                unit: TimeUnit::from_tag(input.u8()?)?,
            },
            17 => DataType::Time,
            18 => {
                let precision = match read_presence(input)? {
                    true => Some(input.u8()?),
                    false => None,
                };
                DataType::Decimal {
                    precision,
                    scale: input.u8()?,
                }
            }
            19 => DataType::Categorical,
            20 => {
                let count = input.u32()? as usize;
                // Each category needs at least its 4-byte length prefix.
                if count.saturating_mul(4) > input.remaining() {
                    return Err(Error::malformed("enum category count exceeds input")
                        .with_offset(at));
                }
                let mut categories = Vec::with_capacity(count);
                for _ in 0..count {
                    categories.push(input.str()?.to_string());
                }
                DataType::Enum { categories }
            }
            21 => DataType::List(Box::new(Self::read_binary_at(input, depth + 1)?)),
            22 => {
                let size = input.count(0)?;
                let inner = Self::read_binary_at(input, depth + 1)?;
                DataType::Array {
                    inner: Box::new(inner),
                    size,
                }
            }
            23 => {
                let count = input.u32()? as usize;
                if count.saturating_mul(5) > input.remaining() {
                    return Err(Error::malformed("struct field count exceeds input")
                        .with_offset(at));
                }
                let mut fields = Vec::with_capacity(count);
                for _ in 0..count {
                    let name = input.str()?.to_string();
                    let dtype = Self::read_binary_at(input, depth + 1)?;
                    fields.push(Field { name, dtype });
                }
                DataType::Struct(fields)
            }
            _ => {
                return Err(Error::malformed(format!("unknown type tag {tag}")).with_offset(at));
            }
        };
        Ok(dtype)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Null => f.write_str("Null"),
            DataType::Boolean => f.write_str("Boolean"),
            DataType::Int8 => f.write_str("Int8"),
            DataType::Int16 => f.write_str("Int16"),
            DataType::Int32 => f.write_str("Int32"),
            DataType::Int64 => f.write_str("Int64"),
            DataType::UInt8 => f.write_str("UInt8"),
            DataType::UInt16 => f.write_str("UInt16"),
            DataType::UInt32 => f.write_str("UInt32"),
            DataType::UInt64 => f.write_str("UInt64"),
            DataType::Float32 => f.write_str("Float32"),
            DataType::Float64 => f.write_str("Float64"),
            DataType::String => f.write_str("String"),
            DataType::Binary => f.write_str("Binary"),
            DataType::Date => f.write_str("Date"),
            DataType::Datetime { unit, timezone } => match timezone {
                Some(tz) => write!(f, "Datetime({unit}, {tz})"),
                None => write!(f, "Datetime({unit})"),
            },
            DataType::Duration { unit } => write!(f, "Duration({unit})"),
            DataType::Time => f.write_str("Time"),
            DataType::Decimal { precision, scale } => match precision {
                Some(precision) => write!(f, "Decimal({precision}, {scale})"),
                None => write!(f, "Decimal(None, {scale})"),
            },
            DataType::Categorical => f.write_str("Categorical"),
            DataType::Enum { categories } => write!(f, "Enum({categories:?})"),
            DataType::List(inner) => write!(f, "List({inner})"),
            DataType::Array { inner, size } => write!(f, "Array({inner}, {size})"),
            DataType::Struct(fields) => {
                f.write_str("Struct(")?;
                for (idx, field) in fields.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", field.name, field.dtype)?;
                }
                f.write_str(")")
            }
            DataType::Opaque => f.write_str("Object"),
        }
    }
}

pub(crate) fn unsupported(dtype: &DataType) -> Error {
    Error::new(ErrorKind::UnsupportedType)
        .with_message(format!("serializing data of type {dtype} is not supported"))
}

fn read_presence(input: &mut WireReader<'_>) -> Result<bool, Error> {
    let at = input.position() as u64;
    match input.u8()? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(Error::malformed(format!("invalid presence byte {other}")).with_offset(at)),
    }
}
