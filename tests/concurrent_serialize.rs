//! Purpose: Prove one shared table serializes safely from many threads at once.
//! Exports: Integration tests only (no runtime exports).
//! Role: Stress the only lazily derived state (the observed categorical dictionary) under contention.
//! Invariants: Every concurrent call produces exactly the bytes a single-threaded call produces.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use colframe::api::{Column, DataType, Field, Format, Table, Value, serialize, to_bytes};

const THREADS: usize = 4;
const CALLS: usize = 1000;

fn shared_table() -> Table {
    let rows = 64;
    Table::new(vec![
        Column::from_values(
            "cat",
            DataType::Categorical,
            (0..rows).map(|idx| (idx % 3 != 0).then(|| format!("c{}", idx % 7))),
        )
        .expect("cat"),
        Column::from_values(
            "nested",
            DataType::list(DataType::Struct(vec![
                Field::new("tag", DataType::Categorical),
                Field::new("n", DataType::Int64),
            ])),
            (0..rows).map(|idx| {
                Value::List(vec![Value::Struct(vec![
                    Value::Category(format!("t{}", idx % 5)),
                    Value::Int64(idx as i64),
                ])])
            }),
        )
        .expect("nested"),
    ])
    .expect("table")
}

#[test]
fn thousand_concurrent_serializations_agree() {
    // Built fresh so the first serialize calls race to derive the observed dictionaries.
    let table = shared_table();
    let reference = to_bytes(&shared_table(), Format::Binary).expect("reference");
    let text_reference = to_bytes(&shared_table(), Format::Text).expect("text reference");
    let next = AtomicUsize::new(0);

    thread::scope(|scope| {
        for _ in 0..THREADS {
            scope.spawn(|| {
                while next.fetch_add(1, Ordering::Relaxed) < CALLS {
                    let mut sink = Vec::new();
                    serialize(&table, Format::Binary, &mut sink).expect("serialize");
                    assert_eq!(sink, reference);
                }
            });
        }
    });
    assert!(next.load(Ordering::Relaxed) >= CALLS);

    let text = to_bytes(&table, Format::Text).expect("text");
    assert_eq!(text, text_reference);
}

#[test]
fn clones_share_the_derived_dictionary() {
    let table = shared_table();
    let clone = table.clone();
    thread::scope(|scope| {
        scope.spawn(|| to_bytes(&table, Format::Binary).expect("encode"));
        scope.spawn(|| to_bytes(&clone, Format::Binary).expect("encode"));
    });
    let original = table.column("cat").expect("cat").observed_dictionary().expect("observed");
    let copied = clone.column("cat").expect("cat").observed_dictionary().expect("observed");
    assert!(std::ptr::eq(original, copied));
}
