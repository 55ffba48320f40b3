// Ordered, uniquely named columns of equal length: the unit every codec reads and writes.
use std::collections::HashSet;

use crate::core::column::{Column, EqualityOptions};
use crate::core::dtype::Field;
use crate::core::error::Error;

#[derive(Clone, Debug, Default)]
pub struct Table {
    columns: Vec<Column>,
    height: usize,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Result<Self, Error> {
        let height = columns.first().map_or(0, Column::len);
        let mut names = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !names.insert(column.name()) {
                return Err(Error::schema("duplicate column name").with_column(column.name()));
            }
            if column.len() != height {
                return Err(Error::schema(format!(
                    "column has {} rows, table has {height}",
                    column.len()
                ))
                .with_column(column.name()));
            }
        }
        Ok(Self { columns, height })
    }

    /// A table with no columns but a row count, as decoded from an empty schema.
    pub(crate) fn empty_with_height(height: usize) -> Self {
        Self {
            columns: Vec::new(),
            height,
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name() == name)
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn schema(&self) -> Vec<Field> {
        self.columns
            .iter()
            .map(|column| Field::new(column.name(), column.dtype().clone()))
            .collect()
    }

    pub fn equals_with(&self, other: &Table, options: EqualityOptions) -> bool {
        self.height == other.height
            && self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(&other.columns)
                .all(|(left, right)| left.equals_with(right, options))
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.equals_with(other, EqualityOptions::strict())
    }
}

impl IntoIterator for Table {
    type Item = Column;
    type IntoIter = std::vec::IntoIter<Column>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::Table;
    use crate::core::column::{Column, EqualityOptions};
    use crate::core::dtype::DataType;
    use crate::core::error::ErrorKind;

    fn ints(name: &str, values: &[i32]) -> Column {
        Column::from_values(name, DataType::Int32, values.iter().copied()).expect("column")
    }

    #[test]
    fn lookup_by_name_and_schema_order() {
        let table = Table::new(vec![ints("b", &[1, 2]), ints("a", &[3, 4])]).expect("table");
        assert_eq!(table.height(), 2);
        assert_eq!(table.width(), 2);
        let names: Vec<_> = table.schema().into_iter().map(|field| field.name).collect();
        assert_eq!(names, ["b", "a"]);
        assert_eq!(table.column("a").map(Column::len), Some(2));
        assert!(table.column("c").is_none());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = Table::new(vec![ints("a", &[1]), ints("a", &[2])]).expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
        assert_eq!(err.column(), Some("a"));
    }

    #[test]
    fn ragged_columns_are_rejected() {
        let err = Table::new(vec![ints("a", &[1]), ints("b", &[2, 3])]).expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
        assert_eq!(err.column(), Some("b"));
    }

    #[test]
    fn relaxed_equality_still_compares_values() {
        let left = Column::from_values("c", DataType::Categorical, ["x", "y"]).expect("column");
        let right = Column::from_values("c", DataType::Categorical, ["y", "x"]).expect("column");
        let a = Table::new(vec![left]).expect("table");
        let b = Table::new(vec![right]).expect("table");
        assert_ne!(a, b);
        assert!(!a.equals_with(&b, EqualityOptions::categorical_as_str()));
    }

    #[test]
    fn tables_are_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Table>();
        assert_send_sync::<Column>();
    }
}
