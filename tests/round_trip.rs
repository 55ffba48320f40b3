//! Purpose: Lock round-trip fidelity of both wire formats over the whole type system.
//! Exports: Integration tests only (no runtime exports).
//! Role: Exercise the public `api` surface the way library callers do: build, serialize, read back.
//! Invariants: Serialize then deserialize reproduces value and type under strict equality.
//! Invariants: Categorical columns with unused categories compare equal only when relaxed.

use std::io::{Seek, SeekFrom};
use std::sync::Arc;

use colframe::api::{
    Bitmap, Column, ColumnData, DataType, Dictionary, EqualityOptions, Field, Format, Table,
    TimeUnit, Value, deserialize, from_bytes, serialize, to_bytes,
};
use tracing_subscriber::EnvFilter;

const FORMATS: [Format; 2] = [Format::Binary, Format::Text];

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_test_writer()
        .try_init();
}

fn round_trip(table: &Table, format: Format) -> Table {
    let bytes = to_bytes(table, format).expect("encode");
    from_bytes(&bytes, format).expect("decode")
}

fn kitchen_sink() -> Table {
    let point = DataType::Struct(vec![
        Field::new("x", DataType::Float32),
        Field::new("label", DataType::String),
    ]);
    Table::new(vec![
        Column::from_values("null", DataType::Null, [Value::Null, Value::Null, Value::Null])
            .expect("null"),
        Column::from_values("bool", DataType::Boolean, [Some(true), None, Some(false)])
            .expect("bool"),
        Column::from_values("i8", DataType::Int8, [i8::MIN, 0, i8::MAX]).expect("i8"),
        Column::from_values("i16", DataType::Int16, [Some(i16::MIN), None, Some(i16::MAX)])
            .expect("i16"),
        Column::from_values("i32", DataType::Int32, [i32::MIN, -1, i32::MAX]).expect("i32"),
        Column::from_values("i64", DataType::Int64, [i64::MIN, 0, i64::MAX]).expect("i64"),
        Column::from_values("u8", DataType::UInt8, [0u8, 1, u8::MAX]).expect("u8"),
        Column::from_values("u16", DataType::UInt16, [0u16, 1, u16::MAX]).expect("u16"),
        Column::from_values("u32", DataType::UInt32, [0u32, 1, u32::MAX]).expect("u32"),
        Column::from_values("u64", DataType::UInt64, [0u64, 1, u64::MAX]).expect("u64"),
        Column::from_values("f32", DataType::Float32, [f32::MIN_POSITIVE, -2.5, f32::NAN])
            .expect("f32"),
        Column::from_values("f64", DataType::Float64, [Some(1e-300), None, Some(f64::INFINITY)])
            .expect("f64"),
        Column::from_values("str", DataType::String, [Some("héllo"), Some(""), None]).expect("str"),
        Column::from_values(
            "bin",
            DataType::Binary,
            [Some(vec![0u8, 159, 146, 150]), None, Some(b"plain".to_vec())],
        )
        .expect("bin"),
        Column::from_values(
            "date",
            DataType::Date,
            [Value::Date(-719_528), Value::Date(19_000), Value::Null],
        )
        .expect("date"),
        Column::from_values(
            "ts",
            DataType::datetime(TimeUnit::Milliseconds, Some("Europe/Amsterdam")),
            [Value::Datetime(1_700_000_000_123), Value::Null, Value::Datetime(-1)],
        )
        .expect("ts"),
        Column::from_values(
            "dur",
            DataType::Duration { unit: TimeUnit::Microseconds },
            [Value::Duration(-5), Value::Duration(i64::MAX), Value::Null],
        )
        .expect("dur"),
        Column::from_values(
            "time",
            DataType::Time,
            [Value::Time(0), Value::Time(86_399_999_999_999), Value::Null],
        )
        .expect("time"),
        Column::from_values(
            "dec",
            DataType::decimal(Some(10), 3),
            [Value::Decimal(1_234_567), Value::Decimal(-1), Value::Null],
        )
        .expect("dec"),
        Column::from_values(
            "dec_free",
            DataType::decimal(None, 2),
            [Value::Decimal(i128::MAX), Value::Decimal(i128::MIN), Value::Decimal(0)],
        )
        .expect("dec_free"),
        Column::from_values("cat", DataType::Categorical, [Some("b"), None, Some("a")])
            .expect("cat"),
        Column::from_values(
            "enum",
            DataType::enumeration(["ham", "foo", "bar"]),
            [Some("bar"), Some("ham"), None],
        )
        .expect("enum"),
        Column::from_values(
            "list",
            DataType::list(DataType::Int64),
            [
                Value::List(vec![Value::Int64(1), Value::Null]),
                Value::Null,
                Value::List(vec![]),
            ],
        )
        .expect("list"),
        Column::from_values(
            "pair",
            DataType::array(DataType::Float64, 2),
            [
                Value::Array(vec![Value::Float64(0.5), Value::Float64(f64::NAN)]),
                Value::Null,
                Value::Array(vec![Value::Null, Value::Float64(-0.0)]),
            ],
        )
        .expect("pair"),
        Column::from_values(
            "points",
            DataType::list(point.clone()),
            [
                Value::List(vec![
                    Value::Struct(vec![Value::Float32(1.0), Value::from("a")]),
                    Value::Null,
                ]),
                Value::List(vec![Value::Struct(vec![Value::Null, Value::Null])]),
                Value::Null,
            ],
        )
        .expect("points"),
        Column::from_values(
            "grid",
            DataType::array(DataType::list(DataType::Categorical), 2),
            [
                Value::Array(vec![
                    Value::List(vec![Value::from("x"), Value::from("y")]),
                    Value::Null,
                ]),
                Value::Array(vec![Value::List(vec![]), Value::List(vec![Value::from("x")])]),
                Value::Null,
            ],
        )
        .expect("grid"),
    ])
    .expect("table")
}

#[test]
fn every_type_round_trips_exactly() {
    init_tracing();
    let table = kitchen_sink();
    for format in FORMATS {
        let decoded = round_trip(&table, format);
        assert_eq!(decoded.schema(), table.schema(), "{format}");
        assert_eq!(decoded, table, "{format}");
    }
}

#[test]
fn encodings_are_deterministic() {
    let table = kitchen_sink();
    for format in FORMATS {
        let first = to_bytes(&table, format).expect("first");
        let again = to_bytes(&round_trip(&table, format), format).expect("again");
        assert_eq!(first, again, "{format}");
    }
}

#[test]
fn enum_categories_keep_declared_order() {
    let dtype = DataType::enumeration(["foo", "bar", "ham"]);
    let table = Table::new(vec![
        Column::from_values("e", dtype.clone(), ["ham", "foo"]).expect("e"),
    ])
    .expect("table");
    for format in FORMATS {
        let decoded = round_trip(&table, format);
        let column = decoded.column("e").expect("column");
        assert_eq!(column.dtype(), &dtype, "{format}");
        assert_eq!(
            column.dictionary().expect("dictionary").categories(),
            ["foo", "bar", "ham"]
        );
        assert_eq!(column.get(0), Some(Value::Category("ham".to_string())));
    }
}

#[test]
fn list_of_null_stays_distinct_from_null_list() {
    let table = Table::new(vec![
        Column::from_values(
            "l",
            DataType::list(DataType::Null),
            [Value::List(vec![Value::Null]), Value::Null],
        )
        .expect("l"),
    ])
    .expect("table");
    for format in FORMATS {
        let decoded = round_trip(&table, format);
        let column = decoded.column("l").expect("column");
        assert_eq!(column.get(0), Some(Value::List(vec![Value::Null])), "{format}");
        assert_eq!(column.get(1), Some(Value::Null), "{format}");
    }
}

#[test]
fn float_edge_values_survive_text() {
    let values = [
        f64::INFINITY,
        f64::NEG_INFINITY,
        f64::NAN,
        0.0,
        -0.0,
        f64::MIN_POSITIVE,
        f64::MAX,
        5e-324,
    ];
    let table = Table::new(vec![
        Column::from_values("f", DataType::Float64, values).expect("f"),
        Column::from_values(
            "g",
            DataType::Float32,
            [f32::INFINITY, f32::NEG_INFINITY, f32::NAN, 0.0, -0.0, 1e-45, f32::MAX, 0.1],
        )
        .expect("g"),
    ])
    .expect("table");
    let decoded = round_trip(&table, Format::Text);
    assert_eq!(decoded, table);
    let column = decoded.column("f").expect("f");
    assert!(matches!(column.get(2), Some(Value::Float64(v)) if v.is_nan()));
    assert_eq!(column.get(0), Some(Value::Float64(f64::INFINITY)));
}

#[test]
fn nested_temporal_types_round_trip() {
    let table = Table::new(vec![
        Column::from_values(
            "ts_list",
            DataType::list(DataType::datetime(TimeUnit::Nanoseconds, Some("UTC"))),
            [
                Value::List(vec![Value::Datetime(1), Value::Datetime(i64::MIN)]),
                Value::Null,
            ],
        )
        .expect("ts_list"),
        Column::from_values(
            "ts_array",
            DataType::array(DataType::datetime(TimeUnit::Microseconds, None), 2),
            [
                Value::Array(vec![Value::Datetime(0), Value::Null]),
                Value::Array(vec![Value::Datetime(-86_400_000_000), Value::Datetime(7)]),
            ],
        )
        .expect("ts_array"),
        Column::from_values(
            "date_list",
            DataType::list(DataType::Date),
            [Value::List(vec![Value::Date(0), Value::Date(-1)]), Value::List(vec![])],
        )
        .expect("date_list"),
        Column::from_values(
            "date_array",
            DataType::array(DataType::Date, 1),
            [Value::Array(vec![Value::Date(3_000_000)]), Value::Null],
        )
        .expect("date_array"),
        Column::from_values(
            "dur_list",
            DataType::list(DataType::Duration { unit: TimeUnit::Milliseconds }),
            [Value::List(vec![Value::Duration(-3)]), Value::Null],
        )
        .expect("dur_list"),
        Column::from_values(
            "dur_array",
            DataType::array(DataType::Duration { unit: TimeUnit::Nanoseconds }, 3),
            [
                Value::Array(vec![Value::Duration(1), Value::Duration(2), Value::Duration(3)]),
                Value::Array(vec![Value::Null, Value::Null, Value::Duration(0)]),
            ],
        )
        .expect("dur_array"),
    ])
    .expect("table");
    for format in FORMATS {
        let decoded = round_trip(&table, format);
        assert_eq!(decoded.schema(), table.schema(), "{format}");
        assert_eq!(decoded, table, "{format}");
    }
}

#[test]
fn decimal_without_precision_round_trips_in_binary() {
    let table = Table::new(vec![
        Column::from_values(
            "price",
            DataType::decimal(None, 2),
            [Value::Decimal(1999), Value::Null],
        )
        .expect("price"),
    ])
    .expect("table");
    let decoded = round_trip(&table, Format::Binary);
    assert_eq!(
        decoded.column("price").expect("price").dtype(),
        &DataType::Decimal { precision: None, scale: 2 }
    );
    assert_eq!(decoded, table);
}

#[test]
fn categorical_round_trip_needs_relaxed_equality() {
    let dictionary = Dictionary::new(
        vec!["stale".to_string(), "live".to_string(), "other".to_string()],
        vec![2u32, 1, 0],
    );
    let column = Column::try_from_parts(
        "c",
        DataType::Categorical,
        3,
        [true, true, false].into_iter().collect::<Bitmap>(),
        ColumnData::Dictionary(Arc::new(dictionary)),
    )
    .expect("column");
    let table = Table::new(vec![column]).expect("table");
    for format in FORMATS {
        let decoded = round_trip(&table, format);
        assert_ne!(decoded, table, "{format}");
        assert!(
            decoded.equals_with(&table, EqualityOptions::categorical_as_str()),
            "{format}"
        );
        let categories = decoded.columns()[0].dictionary().expect("dictionary").categories();
        assert_eq!(categories, ["other", "live"], "{format}");
    }
}

#[test]
fn file_sinks_and_sources_work() {
    let table = kitchen_sink();
    for format in FORMATS {
        let mut file = tempfile::tempfile().expect("tempfile");
        serialize(&table, format, &mut file).expect("serialize");
        file.seek(SeekFrom::Start(0)).expect("seek");
        let decoded = deserialize(&mut file, format).expect("deserialize");
        assert_eq!(decoded, table, "{format}");
    }
}

#[test]
fn empty_tables_round_trip() {
    let no_rows = Table::new(vec![
        Column::from_values("a", DataType::list(DataType::String), Vec::<Value>::new())
            .expect("a"),
    ])
    .expect("table");
    for format in FORMATS {
        assert_eq!(round_trip(&no_rows, format), no_rows, "{format}");
        assert_eq!(round_trip(&Table::default(), format), Table::default(), "{format}");
    }
}
