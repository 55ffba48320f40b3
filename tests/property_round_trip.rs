//! Purpose: Property tests for exact round trips over generated nullable columns.
//! Exports: Integration tests only (no runtime exports).
//! Role: Cover value shapes hand-written fixtures miss (odd unicode, NaN payloads, extreme dates).
//! Invariants: `deserialize(serialize(t, f), f) == t` for both formats under strict equality.

use colframe::api::{Column, DataType, Format, Table, TimeUnit, Value, from_bytes, to_bytes};
use proptest::prelude::*;

fn assert_round_trips(table: &Table) -> Result<(), TestCaseError> {
    for format in [Format::Binary, Format::Text] {
        let bytes = to_bytes(table, format).map_err(|err| TestCaseError::fail(err.to_string()))?;
        let decoded = from_bytes(&bytes, format).map_err(|err| TestCaseError::fail(err.to_string()))?;
        prop_assert_eq!(&decoded, table, "format {}", format);
        let again = to_bytes(&decoded, format).map_err(|err| TestCaseError::fail(err.to_string()))?;
        prop_assert_eq!(again, bytes, "re-encoding differs for {}", format);
    }
    Ok(())
}

fn single(name: &str, dtype: DataType, values: Vec<Value>) -> Table {
    Table::new(vec![Column::from_values(name, dtype, values).expect("column")]).expect("table")
}

fn arb_list_row() -> impl Strategy<Value = Value> {
    prop::option::of(prop::collection::vec(prop::option::of(any::<i16>()), 0..6)).prop_map(|row| {
        row.map_or(Value::Null, |items| {
            Value::List(items.into_iter().map(Value::from).collect())
        })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_nullable_integers(values in prop::collection::vec(prop::option::of(any::<i64>()), 0..40)) {
        let values = values.into_iter().map(Value::from).collect();
        assert_round_trips(&single("i", DataType::Int64, values))?;
    }

    #[test]
    fn prop_nullable_strings(values in prop::collection::vec(prop::option::of(any::<String>()), 0..20)) {
        let values = values.into_iter().map(Value::from).collect();
        assert_round_trips(&single("s", DataType::String, values))?;
    }

    #[test]
    fn prop_raw_bytes(values in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..16), 0..20)) {
        let values = values.into_iter().map(Value::from).collect();
        assert_round_trips(&single("b", DataType::Binary, values))?;
    }

    #[test]
    fn prop_any_float(values in prop::collection::vec(any::<f64>(), 0..40)) {
        let values = values.into_iter().map(Value::from).collect();
        assert_round_trips(&single("f", DataType::Float64, values))?;
    }

    #[test]
    fn prop_integer_lists(rows in prop::collection::vec(arb_list_row(), 0..20)) {
        assert_round_trips(&single("l", DataType::list(DataType::Int16), rows))?;
    }

    #[test]
    fn prop_temporal_extremes(days in any::<i32>(), nanos in any::<i64>()) {
        let table = Table::new(vec![
            Column::from_values("d", DataType::Date, [Value::Date(days), Value::Null]).expect("d"),
            Column::from_values(
                "t",
                DataType::datetime(TimeUnit::Nanoseconds, None),
                [Value::Null, Value::Datetime(nanos)],
            )
            .expect("t"),
        ])
        .expect("table");
        assert_round_trips(&table)?;
    }

    #[test]
    fn prop_categories(values in prop::collection::vec(prop::option::of("[a-d]{1,2}"), 0..30)) {
        let values = values.into_iter().map(|value| value.map_or(Value::Null, Value::Category)).collect();
        assert_round_trips(&single("c", DataType::Categorical, values))?;
    }
}
