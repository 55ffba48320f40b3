//! Purpose: Encode and decode whole tables in the human-readable text format.
//! Exports: `encode_table`, `decode_table`, `grammar`.
//! Role: Pure byte transformation over the extended-JSON grammar; the frame layer owns I/O.
//! Invariants: The schema section uses the serde form of `Field`; tokens are one per row.
//! Invariants: Null rows are `null` at every level; `[null]` and `null` stay distinct.
//! Invariants: Reserved float markers are produced and accepted only for float columns.
//! Invariants: Temporal values outside the calendar range are written as bare physical integers.
pub(crate) mod grammar;

use bstr::{ByteSlice, ByteVec};

use crate::core::builder::ColumnBuilder;
use crate::core::column::Column;
use crate::core::dtype::{DataType, Field, unsupported};
use crate::core::error::{Error, ErrorKind};
use crate::core::format::{
    FORMAT_VERSION, TEXT_FORMAT_NAME, is_supported_version, version_error,
};
use crate::core::table::Table;
use crate::core::temporal;
use crate::core::value::Value;
use crate::core::visit::{ColumnVisitor, child_path, walk};

use grammar::{Node, NonFinite};

const KEY_FORMAT: &str = "format";
const KEY_VERSION: &str = "version";
const KEY_ROWS: &str = "rows";
const KEY_SCHEMA: &str = "schema";
const KEY_COLUMNS: &str = "columns";

/// Renders `table` as one text document. `pretty` puts every schema entry and
/// every column on its own line.
pub fn encode_table(table: &Table, pretty: bool) -> Result<Vec<u8>, Error> {
    let mut columns = Vec::with_capacity(table.width());
    for column in table.columns() {
        let rows = walk(column, column.name(), &mut TokenWriter)?;
        columns.push(Node::List(rows));
    }

    let (open, sep, close, indent) = if pretty {
        ("{\n  ", ",\n  ", "\n}\n", "\n    ")
    } else {
        ("{", ",", "}", "")
    };
    let mut out = Vec::new();
    grammar::write_raw(&mut out, open)?;
    grammar::write_str(&mut out, KEY_FORMAT)?;
    grammar::write_raw(&mut out, ":")?;
    grammar::write_str(&mut out, TEXT_FORMAT_NAME)?;
    grammar::write_raw(&mut out, sep)?;
    grammar::write_str(&mut out, KEY_VERSION)?;
    grammar::write_raw(&mut out, &format!(":{FORMAT_VERSION}"))?;
    grammar::write_raw(&mut out, sep)?;
    grammar::write_str(&mut out, KEY_ROWS)?;
    grammar::write_raw(&mut out, &format!(":{}", table.height()))?;
    grammar::write_raw(&mut out, sep)?;

    grammar::write_str(&mut out, KEY_SCHEMA)?;
    grammar::write_raw(&mut out, ":[")?;
    for (idx, field) in table.schema().iter().enumerate() {
        if idx > 0 {
            grammar::write_raw(&mut out, ",")?;
        }
        grammar::write_raw(&mut out, indent)?;
        serde_json::to_writer(&mut out, field).map_err(|err| {
            unsupported(&field.dtype)
                .with_column(field.name.as_str())
                .with_source(err)
        })?;
    }
    if pretty && table.width() > 0 {
        grammar::write_raw(&mut out, "\n  ")?;
    }
    grammar::write_raw(&mut out, "]")?;
    grammar::write_raw(&mut out, sep)?;

    grammar::write_str(&mut out, KEY_COLUMNS)?;
    grammar::write_raw(&mut out, ":[")?;
    for (idx, column) in columns.iter().enumerate() {
        if idx > 0 {
            grammar::write_raw(&mut out, ",")?;
        }
        grammar::write_raw(&mut out, indent)?;
        grammar::write_node(&mut out, column)?;
    }
    if pretty && table.width() > 0 {
        grammar::write_raw(&mut out, "\n  ")?;
    }
    grammar::write_raw(&mut out, "]")?;
    grammar::write_raw(&mut out, close)?;
    Ok(out)
}

/// Produces one token per row for each column it visits.
struct TokenWriter;

impl ColumnVisitor for TokenWriter {
    type Output = Vec<Node>;

    fn leaf(&mut self, column: &Column, path: &str) -> Result<Vec<Node>, Error> {
        (0..column.len())
            .map(|row| {
                value_token(column.value_at(row), column.dtype())
                    .map_err(|err| err.with_column(path).with_row(row))
            })
            .collect()
    }

    fn list(&mut self, column: &Column, path: &str, child: Vec<Node>) -> Result<Vec<Node>, Error> {
        let offsets = column.offsets().ok_or_else(|| missing_offsets(path))?;
        let mut items = child.into_iter();
        let mut rows = Vec::with_capacity(column.len());
        for row in 0..column.len() {
            let count = (offsets[row + 1] - offsets[row]) as usize;
            let values: Vec<Node> = items.by_ref().take(count).collect();
            rows.push(if column.is_valid(row) {
                Node::List(values)
            } else {
                Node::Null
            });
        }
        Ok(rows)
    }

    fn array(&mut self, column: &Column, _path: &str, child: Vec<Node>) -> Result<Vec<Node>, Error> {
        let size = match column.dtype() {
            DataType::Array { size, .. } => *size,
            _ => 0,
        };
        let mut items = child.into_iter();
        let mut rows = Vec::with_capacity(column.len());
        for row in 0..column.len() {
            let values: Vec<Node> = items.by_ref().take(size).collect();
            rows.push(if column.is_valid(row) {
                Node::List(values)
            } else {
                Node::Null
            });
        }
        Ok(rows)
    }

    fn structure(
        &mut self,
        column: &Column,
        _path: &str,
        fields: Vec<Vec<Node>>,
    ) -> Result<Vec<Node>, Error> {
        let names: Vec<&str> = column
            .fields()
            .map(|fields| fields.iter().map(Column::name).collect())
            .unwrap_or_default();
        let mut per_field: Vec<_> = fields.into_iter().map(Vec::into_iter).collect();
        let mut rows = Vec::with_capacity(column.len());
        for row in 0..column.len() {
            let members: Vec<(String, Node)> = names
                .iter()
                .zip(per_field.iter_mut())
                .map(|(name, tokens)| (name.to_string(), tokens.next().unwrap_or(Node::Null)))
                .collect();
            rows.push(if column.is_valid(row) {
                Node::Object(members)
            } else {
                Node::Null
            });
        }
        Ok(rows)
    }
}

fn missing_offsets(path: &str) -> Error {
    Error::new(ErrorKind::Internal)
        .with_message("list column without offsets")
        .with_column(path)
}

fn float_token(value: f64, lexeme: impl FnOnce() -> String) -> Node {
    if value.is_nan() {
        Node::NonFinite(NonFinite::NaN)
    } else if value == f64::INFINITY {
        Node::NonFinite(NonFinite::Infinity)
    } else if value == f64::NEG_INFINITY {
        Node::NonFinite(NonFinite::NegInfinity)
    } else {
        Node::Number(lexeme())
    }
}

fn temporal_token(text: Option<String>, physical: i64) -> Node {
    match text {
        Some(text) => Node::Str(text),
        None => Node::Number(physical.to_string()),
    }
}

/// Token for one leaf value; nested values never reach here.
fn value_token(value: Value, dtype: &DataType) -> Result<Node, Error> {
    Ok(match (value, dtype) {
        (Value::Null, _) => Node::Null,
        (Value::Boolean(v), _) => Node::Bool(v),
        (Value::Int8(v), _) => Node::Number(v.to_string()),
        (Value::Int16(v), _) => Node::Number(v.to_string()),
        (Value::Int32(v), _) => Node::Number(v.to_string()),
        (Value::Int64(v), _) => Node::Number(v.to_string()),
        (Value::UInt8(v), _) => Node::Number(v.to_string()),
        (Value::UInt16(v), _) => Node::Number(v.to_string()),
        (Value::UInt32(v), _) => Node::Number(v.to_string()),
        (Value::UInt64(v), _) => Node::Number(v.to_string()),
        (Value::Float32(v), _) => float_token(f64::from(v), || format!("{v:?}")),
        (Value::Float64(v), _) => float_token(v, || format!("{v:?}")),
        (Value::String(v), _) | (Value::Category(v), _) => Node::Str(v),
        (Value::Binary(v), _) => Node::Str(v.escape_bytes().to_string()),
        (Value::Date(v), _) => temporal_token(temporal::date_to_text(v)?, i64::from(v)),
        (Value::Datetime(v), DataType::Datetime { unit, .. }) => {
            temporal_token(temporal::datetime_to_text(v, *unit)?, v)
        }
        (Value::Time(v), _) => temporal_token(temporal::time_to_text(v)?, v),
        (Value::Duration(v), _) => Node::Number(v.to_string()),
        (Value::Decimal(v), DataType::Decimal { scale, .. }) => Node::Str(format_decimal(v, *scale)),
        (Value::Opaque(_), _) => return Err(unsupported(dtype)),
        (other, _) => {
            return Err(Error::new(ErrorKind::Internal).with_message(format!(
                "{} value cannot be written as a {dtype} leaf",
                other.kind_name()
            )));
        }
    })
}

pub(crate) fn format_decimal(value: i128, scale: u8) -> String {
    let digits = value.unsigned_abs().to_string();
    let sign = if value < 0 { "-" } else { "" };
    let scale = usize::from(scale);
    if scale == 0 {
        return format!("{sign}{digits}");
    }
    let padded = format!("{digits:0>width$}", width = scale + 1);
    let (whole, fraction) = padded.split_at(padded.len() - scale);
    format!("{sign}{whole}.{fraction}")
}

pub(crate) fn parse_decimal(text: &str, scale: u8) -> Result<i128, Error> {
    let invalid = || Error::malformed(format!("invalid decimal literal {text:?} for scale {scale}"));
    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (whole, fraction) = match unsigned.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (unsigned, ""),
    };
    let well_formed = !whole.is_empty()
        && whole.bytes().all(|byte| byte.is_ascii_digit())
        && fraction.bytes().all(|byte| byte.is_ascii_digit())
        && fraction.len() == usize::from(scale)
        && (scale > 0 || !unsigned.contains('.'));
    if !well_formed {
        return Err(invalid());
    }
    let magnitude: u128 = format!("{whole}{fraction}").parse().map_err(|_| invalid())?;
    if negative {
        0i128
            .checked_sub_unsigned(magnitude)
            .ok_or_else(invalid)
    } else {
        i128::try_from(magnitude).map_err(|_| invalid())
    }
}

/// Parses a complete text document back into a table. Null array rows expand to `size` child
/// slots without any tokens, so every column is built under `max_rows`.
pub fn decode_table(input: &[u8], max_rows: usize) -> Result<Table, Error> {
    let document = grammar::parse(input)?;
    let Node::Object(members) = document else {
        return Err(Error::malformed("text document must be an object"));
    };

    let mut format = None;
    let mut version = None;
    let mut rows = None;
    let mut schema = None;
    let mut columns = None;
    for (key, value) in members {
        match key.as_str() {
            KEY_FORMAT => format = Some(value),
            KEY_VERSION => version = Some(value),
            KEY_ROWS => rows = Some(value),
            KEY_SCHEMA => schema = Some(value),
            KEY_COLUMNS => columns = Some(value),
            other => return Err(Error::malformed(format!("unexpected document key {other:?}"))),
        }
    }

    match format {
        Some(Node::Str(name)) if name == TEXT_FORMAT_NAME => {}
        Some(_) => return Err(Error::malformed("not a text table document (bad format name)")),
        None => return Err(missing_key(KEY_FORMAT)),
    }
    let version = unsigned_member(version.ok_or_else(|| missing_key(KEY_VERSION))?, KEY_VERSION)?;
    if !u16::try_from(version).is_ok_and(is_supported_version) {
        return Err(version_error(version));
    }
    let height = unsigned_member(rows.ok_or_else(|| missing_key(KEY_ROWS))?, KEY_ROWS)?;
    let height = usize::try_from(height)
        .map_err(|_| Error::malformed("row count does not fit in memory"))?;

    let Node::List(schema) = schema.ok_or_else(|| missing_key(KEY_SCHEMA))? else {
        return Err(Error::malformed("schema must be a list"));
    };
    let mut fields = Vec::with_capacity(schema.len());
    for entry in &schema {
        let field: Field = serde_json::from_value(grammar::to_json(entry)?).map_err(|err| {
            Error::malformed("invalid schema entry").with_source(err)
        })?;
        field
            .dtype
            .validate()
            .map_err(|err| err.with_column(field.name.as_str()))?;
        fields.push(field);
    }

    let Node::List(tokens) = columns.ok_or_else(|| missing_key(KEY_COLUMNS))? else {
        return Err(Error::malformed("columns must be a list"));
    };
    if tokens.len() != fields.len() {
        return Err(Error::malformed(format!(
            "schema declares {} columns, document has {}",
            fields.len(),
            tokens.len()
        )));
    }

    let mut decoded = Vec::with_capacity(fields.len());
    for (field, column) in fields.into_iter().zip(tokens) {
        let path = field.name.clone();
        let Node::List(rows) = column else {
            return Err(Error::malformed("column tokens must be a list").with_column(path));
        };
        if rows.len() != height {
            return Err(Error::malformed(format!(
                "column has {} tokens, document declares {height} rows",
                rows.len()
            ))
            .with_column(path));
        }
        let mut builder =
            ColumnBuilder::new(field.name, field.dtype.clone())?.with_row_limit(max_rows);
        for (row, token) in rows.into_iter().enumerate() {
            let value = token_value(token, &field.dtype, &path)
                .map_err(|err| err.with_column(path.as_str()).with_row(row))?;
            builder.push(value).map_err(|err| err.with_row(row))?;
        }
        decoded.push(builder.finish()?);
        tracing::trace!(column = %path, rows = height, "decoded column tokens");
    }
    if decoded.is_empty() {
        return Ok(Table::empty_with_height(height));
    }
    Table::new(decoded)
}

fn missing_key(key: &str) -> Error {
    Error::malformed(format!("missing document key {key:?}"))
}

fn unsigned_member(node: Node, key: &str) -> Result<u64, Error> {
    match node {
        Node::Number(lexeme) => lexeme
            .parse::<u64>()
            .map_err(|_| Error::malformed(format!("{key} must be a non-negative integer"))),
        other => Err(Error::malformed(format!(
            "{key} must be a number, found {}",
            other.kind_name()
        ))),
    }
}

fn mismatch(token: &Node, dtype: &DataType) -> Error {
    let detail = match token {
        Node::NonFinite(_) => format!("reserved float marker is not valid in a {dtype} column"),
        _ => format!("{} token is not valid in a {dtype} column", token.kind_name()),
    };
    Error::malformed(detail)
}

fn integer<T: std::str::FromStr>(token: &Node, dtype: &DataType) -> Result<T, Error> {
    match token {
        Node::Number(lexeme) => lexeme.parse::<T>().map_err(|_| {
            Error::malformed(format!("{lexeme} is not a valid {dtype} value"))
        }),
        _ => Err(mismatch(token, dtype)),
    }
}

fn float(token: &Node, dtype: &DataType) -> Result<f64, Error> {
    match token {
        Node::Number(lexeme) => lexeme
            .parse::<f64>()
            .map_err(|_| Error::malformed(format!("{lexeme} is not a valid {dtype} value"))),
        Node::NonFinite(NonFinite::NaN) => Ok(f64::NAN),
        Node::NonFinite(NonFinite::Infinity) => Ok(f64::INFINITY),
        Node::NonFinite(NonFinite::NegInfinity) => Ok(f64::NEG_INFINITY),
        _ => Err(mismatch(token, dtype)),
    }
}

/// Converts one token into the owned value the builder accepts for `dtype`.
fn token_value(token: Node, dtype: &DataType, path: &str) -> Result<Value, Error> {
    if token == Node::Null {
        return Ok(Value::Null);
    }
    let value = match dtype {
        DataType::Null => return Err(mismatch(&token, dtype)),
        DataType::Boolean => match token {
            Node::Bool(v) => Value::Boolean(v),
            _ => return Err(mismatch(&token, dtype)),
        },
        DataType::Int8 => Value::Int8(integer(&token, dtype)?),
        DataType::Int16 => Value::Int16(integer(&token, dtype)?),
        DataType::Int32 => Value::Int32(integer(&token, dtype)?),
        DataType::Int64 => Value::Int64(integer(&token, dtype)?),
        DataType::UInt8 => Value::UInt8(integer(&token, dtype)?),
        DataType::UInt16 => Value::UInt16(integer(&token, dtype)?),
        DataType::UInt32 => Value::UInt32(integer(&token, dtype)?),
        DataType::UInt64 => Value::UInt64(integer(&token, dtype)?),
        DataType::Float32 => match &token {
            Node::Number(lexeme) => Value::Float32(lexeme.parse::<f32>().map_err(|_| {
                Error::malformed(format!("{lexeme} is not a valid {dtype} value"))
            })?),
            _ => Value::Float32(float(&token, dtype)? as f32),
        },
        DataType::Float64 => Value::Float64(float(&token, dtype)?),
        DataType::String => match token {
            Node::Str(v) => Value::String(v),
            _ => return Err(mismatch(&token, dtype)),
        },
        DataType::Binary => match token {
            Node::Str(v) => Value::Binary(<Vec<u8>>::unescape_bytes(v)),
            _ => return Err(mismatch(&token, dtype)),
        },
        DataType::Date => match &token {
            Node::Str(text) => Value::Date(temporal::date_from_text(text)?),
            _ => Value::Date(integer(&token, dtype)?),
        },
        DataType::Datetime { unit, .. } => match &token {
            Node::Str(text) => Value::Datetime(temporal::datetime_from_text(text, *unit)?),
            _ => Value::Datetime(integer(&token, dtype)?),
        },
        DataType::Duration { .. } => Value::Duration(integer(&token, dtype)?),
        DataType::Time => match &token {
            Node::Str(text) => Value::Time(temporal::time_from_text(text)?),
            _ => Value::Time(integer(&token, dtype)?),
        },
        DataType::Decimal { scale, .. } => match &token {
            Node::Str(text) => Value::Decimal(parse_decimal(text, *scale)?),
            _ => return Err(mismatch(&token, dtype)),
        },
        DataType::Categorical => match token {
            Node::Str(v) => Value::Category(v),
            _ => return Err(mismatch(&token, dtype)),
        },
        DataType::Enum { categories } => match token {
            Node::Str(v) if categories.contains(&v) => Value::Category(v),
            Node::Str(v) => {
                return Err(Error::malformed(format!(
                    "category {v:?} is not a member of {dtype}"
                )));
            }
            _ => return Err(mismatch(&token, dtype)),
        },
        DataType::List(inner) => match token {
            Node::List(items) => {
                let item_path = child_path(path, "item");
                Value::List(
                    items
                        .into_iter()
                        .map(|item| token_value(item, inner, &item_path))
                        .collect::<Result<_, _>>()
                        .map_err(|err| err.with_column(item_path.as_str()))?,
                )
            }
            _ => return Err(mismatch(&token, dtype)),
        },
        DataType::Array { inner, size } => match token {
            Node::List(items) if items.len() == *size => {
                let item_path = child_path(path, "item");
                Value::Array(
                    items
                        .into_iter()
                        .map(|item| token_value(item, inner, &item_path))
                        .collect::<Result<_, _>>()
                        .map_err(|err| err.with_column(item_path.as_str()))?,
                )
            }
            Node::List(items) => {
                return Err(Error::malformed(format!(
                    "array row has {} items, {dtype} needs {size}",
                    items.len()
                )));
            }
            _ => return Err(mismatch(&token, dtype)),
        },
        DataType::Struct(fields) => match token {
            Node::Object(mut members) => {
                let mut values = Vec::with_capacity(fields.len());
                for field in fields {
                    let field_path = child_path(path, &field.name);
                    let idx = members
                        .iter()
                        .position(|(key, _)| *key == field.name)
                        .ok_or_else(|| {
                            Error::malformed(format!("struct row is missing field {:?}", field.name))
                        })?;
                    let (_, member) = members.swap_remove(idx);
                    values.push(
                        token_value(member, &field.dtype, &field_path)
                            .map_err(|err| err.with_column(field_path.as_str()))?,
                    );
                }
                if let Some((extra, _)) = members.first() {
                    return Err(Error::malformed(format!(
                        "struct row has undeclared field {extra:?}"
                    )));
                }
                Value::Struct(values)
            }
            _ => return Err(mismatch(&token, dtype)),
        },
        DataType::Opaque => return Err(unsupported(dtype)),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::{decode_table, encode_table, format_decimal, parse_decimal};
    use crate::core::column::Column;
    use crate::core::dtype::{DataType, TimeUnit};
    use crate::core::error::{Error, ErrorKind};
    use crate::core::frame::DEFAULT_MAX_ROWS;
    use crate::core::table::Table;
    use crate::core::value::Value;

    fn decode(input: &[u8]) -> Result<Table, Error> {
        decode_table(input, DEFAULT_MAX_ROWS)
    }

    fn one(column: Column) -> Table {
        Table::new(vec![column]).expect("table")
    }

    fn text_of(table: &Table) -> String {
        String::from_utf8(encode_table(table, false).expect("encode")).expect("utf8")
    }

    #[test]
    fn document_shape_is_stable() {
        let table = one(Column::from_values("a", DataType::Int8, [Some(1i8), None]).expect("a"));
        assert_eq!(
            text_of(&table),
            r#"{"format":"colframe","version":1,"rows":2,"schema":[{"name":"a","dtype":"Int8"}],"columns":[[1,null]]}"#
        );
    }

    #[test]
    fn float_markers_round_trip() {
        let values = [f64::INFINITY, f64::NEG_INFINITY, f64::NAN, -0.0, 0.1, 1e300];
        let table = one(Column::from_values("f", DataType::Float64, values).expect("f"));
        let text = text_of(&table);
        assert!(text.contains("[Infinity,-Infinity,NaN,-0.0,0.1,1e300]"), "{text}");
        assert_eq!(decode(text.as_bytes()).expect("decode"), table);
    }

    #[test]
    fn float32_keeps_its_width() {
        let table = one(Column::from_values("f", DataType::Float32, [0.1f32, f32::MAX]).expect("f"));
        let decoded = decode(text_of(&table).as_bytes()).expect("decode");
        assert_eq!(decoded, table);
    }

    #[test]
    fn markers_are_rejected_outside_float_columns() {
        let text = r#"{"format":"colframe","version":1,"rows":1,"schema":[{"name":"i","dtype":"Int32"}],"columns":[[NaN]]}"#;
        let err = decode(text.as_bytes()).expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
        assert_eq!(err.column(), Some("i"));
        assert_eq!(err.row(), Some(0));
    }

    #[test]
    fn list_of_null_is_not_a_null_list() {
        let table = one(
            Column::from_values(
                "l",
                DataType::list(DataType::Null),
                [Value::List(vec![Value::Null]), Value::Null, Value::List(vec![])],
            )
            .expect("l"),
        );
        let text = text_of(&table);
        assert!(text.contains("[[null],null,[]]"), "{text}");
        assert_eq!(decode(text.as_bytes()).expect("decode"), table);
    }

    #[test]
    fn temporal_tokens_are_readable() {
        let table = Table::new(vec![
            Column::from_values("d", DataType::Date, [Value::Date(0), Value::Date(i32::MAX)])
                .expect("d"),
            Column::from_values(
                "t",
                DataType::datetime(TimeUnit::Nanoseconds, Some("Asia/Tokyo")),
                [Value::Datetime(1), Value::Datetime(-1)],
            )
            .expect("t"),
        ])
        .expect("table");
        let text = text_of(&table);
        assert!(text.contains(r#"["1970-01-01",2147483647]"#), "{text}");
        assert!(text.contains(r#""1970-01-01T00:00:00.000000001Z""#), "{text}");
        assert_eq!(decode(text.as_bytes()).expect("decode"), table);
    }

    #[test]
    fn struct_rows_need_exactly_the_declared_fields() {
        let schema = r#"[{"name":"s","dtype":{"Struct":[{"name":"x","dtype":"Int8"}]}}]"#;
        for row in [r#"{}"#, r#"{"x":1,"y":2}"#] {
            let text = format!(
                r#"{{"format":"colframe","version":1,"rows":1,"schema":{schema},"columns":[[{row}]]}}"#
            );
            let err = decode(text.as_bytes()).expect_err("should fail");
            assert_eq!(err.kind(), ErrorKind::MalformedInput, "{row}");
        }
        let text = format!(
            r#"{{"format":"colframe","version":1,"rows":1,"schema":{schema},"columns":[[{{"x":"one"}}]]}}"#
        );
        let err = decode(text.as_bytes()).expect_err("should fail");
        assert_eq!(err.column(), Some("s.x"));
    }

    #[test]
    fn array_rows_need_exactly_size_items() {
        let text = r#"{"format":"colframe","version":1,"rows":1,"schema":[{"name":"a","dtype":{"Array":{"inner":"Int8","size":2}}}],"columns":[[[1]]]}"#;
        let err = decode(text.as_bytes()).expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }

    #[test]
    fn enum_rejects_undeclared_categories() {
        let text = r#"{"format":"colframe","version":1,"rows":1,"schema":[{"name":"e","dtype":{"Enum":{"categories":["a"]}}}],"columns":[["b"]]}"#;
        let err = decode(text.as_bytes()).expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
        assert_eq!(err.column(), Some("e"));
        assert_eq!(err.row(), Some(0));
    }

    #[test]
    fn binary_values_are_byte_escaped() {
        let table = one(
            Column::from_values("b", DataType::Binary, [b"a\x00\xff\n".to_vec()]).expect("b"),
        );
        let text = text_of(&table);
        assert!(text.contains(r"\\xFF"), "{text}");
        assert_eq!(decode(text.as_bytes()).expect("decode"), table);
    }

    #[test]
    fn decimals_keep_their_scale() {
        assert_eq!(format_decimal(12345, 2), "123.45");
        assert_eq!(format_decimal(-5, 3), "-0.005");
        assert_eq!(format_decimal(7, 0), "7");
        assert_eq!(parse_decimal("-0.005", 3).expect("parse"), -5);
        assert_eq!(parse_decimal(&format_decimal(i128::MIN, 4), 4).expect("parse"), i128::MIN);
        for bad in ["1.2", "1.234", "1.", ".12", "1e2", "--1.00", "7.0"] {
            assert!(parse_decimal(bad, if bad == "7.0" { 0 } else { 2 }).is_err(), "{bad}");
        }
    }

    #[test]
    fn pretty_output_decodes_identically() {
        let table = Table::new(vec![
            Column::from_values("a", DataType::String, ["x", "y"]).expect("a"),
            Column::from_values("b", DataType::decimal(Some(5), 1), [Value::Decimal(15), Value::Null])
                .expect("b"),
        ])
        .expect("table");
        let pretty = encode_table(&table, true).expect("encode");
        let text = String::from_utf8(pretty.clone()).expect("utf8");
        assert!(text.contains("\n    [\"x\",\"y\"]"), "{text}");
        assert_eq!(decode(&pretty).expect("decode"), table);
    }

    #[test]
    fn unknown_keys_and_versions_are_rejected() {
        let cases = [
            r#"{"format":"other","version":1,"rows":0,"schema":[],"columns":[]}"#,
            r#"{"format":"colframe","version":2,"rows":0,"schema":[],"columns":[]}"#,
            r#"{"format":"colframe","version":1,"rows":0,"schema":[],"columns":[],"extra":1}"#,
            r#"{"format":"colframe","version":1,"schema":[],"columns":[]}"#,
        ];
        for case in cases {
            let err = decode(case.as_bytes()).expect_err("should fail");
            assert_eq!(err.kind(), ErrorKind::MalformedInput, "{case}");
        }
    }

    #[test]
    fn schema_fragment_is_validated() {
        let text = r#"{"format":"colframe","version":1,"rows":0,"schema":[{"name":"a","dtype":{"Array":{"inner":"Int8","size":0}}}],"columns":[[]]}"#;
        let err = decode(text.as_bytes()).expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
    }

    #[test]
    fn null_array_rows_respect_the_row_limit() {
        let text = r#"{"format":"colframe","version":1,"rows":2,"schema":[{"name":"a","dtype":{"Array":{"inner":"Int8","size":3}}}],"columns":[[null,[1,2,3]]]}"#;
        let table = decode_table(text.as_bytes(), 6).expect("decode");
        assert_eq!(table.column("a").expect("a").get(0), Some(Value::Null));
        let err = decode_table(text.as_bytes(), 5).expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
        assert_eq!(err.column(), Some("a"));
        assert_eq!(err.row(), Some(1));
    }
}
