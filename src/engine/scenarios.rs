//! End-to-end scenarios against the full `Builder`/`StageExecutor` path (S1-S6).

use crate::builder::seed;
use crate::engine::stage::JoinOptions;
use crate::error::Result;
use crate::field::field;
use crate::parser::compile_query;
use crate::relation::{and, eq, ne, or};
use crate::result::ResultHandler;
use crate::source::SourceRegistry;
use crate::value::{Record, Value};
use std::cell::RefCell;
use std::rc::Rc;

fn record(pairs: &[(&str, Value)]) -> Record {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

struct SharedCollectHandler(Rc<RefCell<Vec<Record>>>);

impl ResultHandler for SharedCollectHandler {
    fn emit(&mut self, record: &Record) -> Result<()> {
        self.0.borrow_mut().push(record.clone());
        Ok(())
    }

    fn success(&self) -> bool {
        true
    }
}

#[test]
fn s1_eq_pivot_one_to_one() {
    let registry = SourceRegistry::with_builtins();
    registry.register_memory_table(
        "stage1",
        vec![
            record(&[("id", Value::Int(1)), ("n", Value::String("a".into()))]),
            record(&[("id", Value::Int(2)), ("n", Value::String("b".into()))]),
            record(&[("id", Value::Int(3)), ("n", Value::String("c".into()))]),
            record(&[("id", Value::Int(4)), ("n", Value::String("b".into()))]),
        ],
    );
    registry.register_memory_table(
        "stage2",
        vec![
            record(&[("nid", Value::Int(1)), ("c", Value::Int(10))]),
            record(&[("nid", Value::Int(6)), ("c", Value::Int(11))]),
            record(&[("nid", Value::Int(5)), ("c", Value::Int(12))]),
            record(&[("nid", Value::Int(4)), ("c", Value::Int(13))]),
        ],
    );

    let seed_source = registry.build("memory:stage1", None, None).unwrap();
    let pivot_source = registry.build("memory:stage2", None, None).unwrap();
    let sink = Rc::new(RefCell::new(Vec::new()));
    seed(seed_source)
        .pivot_to(pivot_source, eq(field("id", None), field("nid", None)).unwrap())
        .result_handler(Box::new(SharedCollectHandler(Rc::clone(&sink))))
        .execute(false)
        .unwrap();

    let got = sink.borrow();
    assert_eq!(got.len(), 2);
    assert_eq!(got[0].get("c"), Some(&Value::Int(10)));
    assert_eq!(got[1].get("c"), Some(&Value::Int(13)));
}

#[test]
fn s2_eq_pivot_multi_condition() {
    let registry = SourceRegistry::with_builtins();
    registry.register_memory_table(
        "stage1",
        vec![
            record(&[("id", Value::Int(1)), ("n", Value::String("w".into()))]),
            record(&[("id", Value::Int(2)), ("n", Value::String("x".into()))]),
            record(&[("id", Value::Int(3)), ("n", Value::String("y".into()))]),
        ],
    );
    registry.register_memory_table(
        "stage2",
        vec![
            record(&[
                ("nid", Value::Int(1)),
                ("l", Value::String("w".into())),
                ("c", Value::Int(10)),
            ]),
            record(&[
                ("nid", Value::Int(1)),
                ("l", Value::String("y".into())),
                ("c", Value::Int(11)),
            ]),
            record(&[
                ("nid", Value::Int(3)),
                ("l", Value::String("y".into())),
                ("c", Value::Int(13)),
            ]),
        ],
    );

    let relation = and(
        eq(field("id", None), field("nid", None)).unwrap(),
        eq(field("n", None), field("l", None)).unwrap(),
    );
    let seed_source = registry.build("memory:stage1", None, None).unwrap();
    let pivot_source = registry.build("memory:stage2", None, None).unwrap();
    let sink = Rc::new(RefCell::new(Vec::new()));
    seed(seed_source)
        .pivot_to(pivot_source, relation)
        .result_handler(Box::new(SharedCollectHandler(Rc::clone(&sink))))
        .execute(false)
        .unwrap();

    let got = sink.borrow();
    assert_eq!(got.len(), 2);
    assert_eq!(got[0].get("c"), Some(&Value::Int(10)));
    assert_eq!(got[1].get("c"), Some(&Value::Int(13)));
}

#[test]
fn s3_pivot_or() {
    let registry = SourceRegistry::with_builtins();
    registry.register_memory_table(
        "stage1",
        vec![
            record(&[("id", Value::Int(1)), ("tc", Value::Int(100))]),
            record(&[("id", Value::Int(9)), ("tc", Value::Int(7))]),
        ],
    );
    registry.register_memory_table(
        "stage2",
        vec![
            record(&[("nid", Value::Int(1)), ("c", Value::Int(0))]),
            record(&[("nid", Value::Int(0)), ("c", Value::Int(7))]),
            record(&[("nid", Value::Int(0)), ("c", Value::Int(0))]),
        ],
    );

    let relation = or(
        eq(field("id", None), field("nid", None)).unwrap(),
        eq(field("tc", None), field("c", None)).unwrap(),
    );
    let seed_source = registry.build("memory:stage1", None, None).unwrap();
    let pivot_source = registry.build("memory:stage2", None, None).unwrap();
    let sink = Rc::new(RefCell::new(Vec::new()));
    seed(seed_source)
        .pivot_to(pivot_source, relation)
        .result_handler(Box::new(SharedCollectHandler(Rc::clone(&sink))))
        .execute(false)
        .unwrap();

    assert_eq!(sink.borrow().len(), 2);
}

#[test]
fn s4_ne_pivot() {
    let registry = SourceRegistry::with_builtins();
    registry.register_memory_table(
        "stage1",
        vec![
            record(&[("id", Value::Int(1))]),
            record(&[("id", Value::Int(2))]),
            record(&[("id", Value::Int(3))]),
            record(&[("id", Value::Int(4))]),
        ],
    );
    registry.register_memory_table(
        "stage2",
        vec![
            record(&[("nid", Value::Int(1))]),
            record(&[("nid", Value::Int(5))]),
            record(&[("nid", Value::Int(3))]),
        ],
    );

    let seed_source = registry.build("memory:stage1", None, None).unwrap();
    let pivot_source = registry.build("memory:stage2", None, None).unwrap();
    let sink = Rc::new(RefCell::new(Vec::new()));
    seed(seed_source)
        .pivot_to(pivot_source, ne(field("id", None), field("nid", None)).unwrap())
        .result_handler(Box::new(SharedCollectHandler(Rc::clone(&sink))))
        .execute(false)
        .unwrap();

    let got = sink.borrow();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].get("nid"), Some(&Value::Int(5)));
}

#[test]
fn s5_mixed_ne_eq_join_with_array() {
    let registry = SourceRegistry::with_builtins();
    registry.register_memory_table(
        "stage1",
        vec![
            record(&[("id", Value::Int(1)), ("n", Value::String("a".into()))]),
            record(&[("id", Value::Int(2)), ("n", Value::String("a".into()))]),
            record(&[("id", Value::Int(3)), ("n", Value::String("a".into()))]),
            record(&[("id", Value::Int(4)), ("n", Value::String("b".into()))]),
        ],
    );
    registry.register_memory_table(
        "stage2",
        vec![record(&[
            ("nid", Value::Int(1)),
            ("t", Value::String("a".into())),
        ])],
    );

    let relation = and(
        ne(field("id", None), field("nid", None)).unwrap(),
        eq(field("n", None), field("t", None)).unwrap(),
    );
    let options = JoinOptions {
        field_name: Some("x".to_string()),
        as_array: true,
        exclude_empty: false,
    };

    let seed_source = registry.build("memory:stage1", None, None).unwrap();
    let join_source = registry.build("memory:stage2", None, None).unwrap();
    let sink = Rc::new(RefCell::new(Vec::new()));
    seed(seed_source)
        .join_to(join_source, relation, options)
        .result_handler(Box::new(SharedCollectHandler(Rc::clone(&sink))))
        .execute(false)
        .unwrap();

    let got = sink.borrow();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].get("nid"), Some(&Value::Int(1)));
    let Value::List(joined) = &got[0]["x"] else {
        panic!("expected a list under 'x'");
    };
    let ids: std::collections::BTreeSet<i64> = joined
        .iter()
        .map(|v| match v {
            Value::Object(o) => match o.get("id") {
                Some(Value::Int(i)) => *i,
                _ => panic!("expected id"),
            },
            _ => panic!("expected object"),
        })
        .collect();
    assert_eq!(ids, [2, 3].into_iter().collect());
}

#[test]
fn s6_text_query_compiles_and_runs() {
    let registry = SourceRegistry::with_builtins();
    registry.register_memory_table(
        "src1",
        vec![
            record(&[("id", Value::Int(1))]),
            record(&[("id", Value::Int(2))]),
        ],
    );
    registry.register_memory_table(
        "src2",
        vec![
            record(&[("nid", Value::Int(1)), ("c", Value::Int(10))]),
            record(&[("nid", Value::Int(9)), ("c", Value::Int(11))]),
        ],
    );

    let query = r#"#from "memory:src1" #as a #pivot-to "memory:src2" #as b #where a.id = b.nid"#;
    let builder = compile_query(query, &registry, None).unwrap();

    let sink = Rc::new(RefCell::new(Vec::new()));
    builder
        .result_handler(Box::new(SharedCollectHandler(Rc::clone(&sink))))
        .execute(false)
        .unwrap();

    assert_eq!(sink.borrow().len(), 1);
    assert_eq!(sink.borrow()[0].get("c"), Some(&Value::Int(10)));
}

#[test]
fn streaming_and_batch_modes_agree() {
    let registry = SourceRegistry::with_builtins();
    registry.register_memory_table(
        "stage1",
        vec![
            record(&[("id", Value::Int(1))]),
            record(&[("id", Value::Int(2))]),
        ],
    );
    registry.register_memory_table(
        "stage2",
        vec![record(&[("nid", Value::Int(1)), ("c", Value::Int(10))])],
    );

    for stream in [false, true] {
        let seed_source = registry.build("memory:stage1", None, None).unwrap();
        let pivot_source = registry.build("memory:stage2", None, None).unwrap();
        let sink = Rc::new(RefCell::new(Vec::new()));
        seed(seed_source)
            .pivot_to(pivot_source, eq(field("id", None), field("nid", None)).unwrap())
            .result_handler(Box::new(SharedCollectHandler(Rc::clone(&sink))))
            .execute(stream)
            .unwrap();
        assert_eq!(sink.borrow().len(), 1);
    }
}
