//! Purpose: One exhaustive recursive walk over a column tree, shared by both encoders.
//! Exports: `ColumnVisitor`, `walk`, `child_path`.
//! Role: Encoders supply leaf and nesting behavior; the walk owns recursion order and paths.
//! Invariants: Parents are entered before their children; struct fields are visited in
//!             declared order; list and array children are named `item` in paths.
//! Invariants: `Opaque` at any depth stops the walk with `UnsupportedType` naming the path.
use crate::core::column::Column;
use crate::core::dtype::{DataType, unsupported};
use crate::core::error::{Error, ErrorKind};

pub(crate) trait ColumnVisitor {
    type Output;

    /// Called on every non-opaque column before its children are walked.
    fn enter(&mut self, _column: &Column, _path: &str) -> Result<(), Error> {
        Ok(())
    }

    fn leaf(&mut self, column: &Column, path: &str) -> Result<Self::Output, Error>;

    fn list(&mut self, column: &Column, path: &str, child: Self::Output)
        -> Result<Self::Output, Error>;

    fn array(
        &mut self,
        column: &Column,
        path: &str,
        child: Self::Output,
    ) -> Result<Self::Output, Error>;

    fn structure(
        &mut self,
        column: &Column,
        path: &str,
        fields: Vec<Self::Output>,
    ) -> Result<Self::Output, Error>;
}

pub(crate) fn child_path(path: &str, name: &str) -> String {
    format!("{path}.{name}")
}

pub(crate) fn walk<V: ColumnVisitor>(
    column: &Column,
    path: &str,
    visitor: &mut V,
) -> Result<V::Output, Error> {
    match column.dtype() {
        DataType::Opaque => Err(unsupported(column.dtype()).with_column(path)),
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
        | DataType::Decimal { .. }
        | DataType::Categorical
        | DataType::Enum { .. } => {
            visitor.enter(column, path)?;
            visitor.leaf(column, path)
        }
        DataType::List(_) => {
            visitor.enter(column, path)?;
            let child = walk(nested_child(column, path)?, &child_path(path, "item"), visitor)?;
            visitor.list(column, path, child)
        }
        DataType::Array { .. } => {
            visitor.enter(column, path)?;
            let child = walk(nested_child(column, path)?, &child_path(path, "item"), visitor)?;
            visitor.array(column, path, child)
        }
        DataType::Struct(_) => {
            visitor.enter(column, path)?;
            let fields = column.fields().ok_or_else(|| missing_children(path))?;
            let mut outputs = Vec::with_capacity(fields.len());
            for field in fields {
                outputs.push(walk(field, &child_path(path, field.name()), visitor)?);
            }
            visitor.structure(column, path, outputs)
        }
    }
}

fn nested_child<'a>(column: &'a Column, path: &str) -> Result<&'a Column, Error> {
    column.child().ok_or_else(|| missing_children(path))
}

fn missing_children(path: &str) -> Error {
    Error::new(ErrorKind::Internal)
        .with_message("nested column without child storage")
        .with_column(path)
}
