//! Integration tests for the quarry-engine crate.
//!
//! These tests run queries through the full pipeline:
//! - Backend setup with test data
//! - Normalization and flattening
//! - Flat execution, compared against direct interpretation
//!
//! ## Test Categories
//!
//! 1. **Pipeline Tests**: normalized queries return what the source term means
//! 2. **Host Function Tests**: registered functions in flat queries
//! 3. **SQL Tests**: rendering of normalized queries
//! 4. **Splice Tests**: validation cost does not depend on the data

use std::sync::Arc;

use common_config::StageConfig;
use common_error::QuarryError;
use quarry_core::{Catalog, DataType, RecordType, Type, Value};
use quarry_engine::{bag_equals, Datum, FlatExecutor, Interpreter, MemoryBackend, SqlRenderer};
use quarry_logical::term::{
    apply, empty, for_each, for_where, if_then_else, lambda, lit, record, table, union, var,
    yield_,
};
use quarry_logical::{HostFunction, PrimOp, Term};
use quarry_optimizer::flatten::flatten;
use quarry_optimizer::normalize;
use quarry_optimizer::stage::{Combinator, SpliceArg, StageValidator};

fn catalog() -> Arc<Catalog> {
    Catalog::builder()
        .register(
            "People",
            RecordType::new()
                .with_field("Name", DataType::String)
                .with_field("Age", DataType::Int64),
        )
        .unwrap()
        .register(
            "Couples",
            RecordType::new()
                .with_field("Her", DataType::String)
                .with_field("Him", DataType::String),
        )
        .unwrap()
        .build_shared()
}

/// Helper to set up a backend with people and couples.
fn setup_backend() -> MemoryBackend {
    let people = [
        ("Alex", 60),
        ("Bert", 55),
        ("Cora", 33),
        ("Drew", 31),
        ("Edna", 21),
        ("Fred", 60),
    ];
    let couples = [("Alex", "Bert"), ("Cora", "Drew"), ("Edna", "Fred")];

    MemoryBackend::new(catalog())
        .with_rows(
            "People",
            people
                .iter()
                .map(|(n, a)| vec![Value::from(*n), Value::Int64(*a)])
                .collect(),
        )
        .unwrap()
        .with_rows(
            "Couples",
            couples
                .iter()
                .map(|(h, m)| vec![Value::from(*h), Value::from(*m)])
                .collect(),
        )
        .unwrap()
}

/// Normalize, flatten and execute `term`, checking the result against
/// direct interpretation.
fn run_both(backend: &MemoryBackend, term: &Term) -> Vec<Datum> {
    let expected = Interpreter::new(backend)
        .eval(term)
        .unwrap()
        .into_bag()
        .unwrap();

    let normal = normalize(term.clone()).unwrap();
    let flattened = flatten(&normal).unwrap();
    let actual = FlatExecutor::new(backend)
        .execute_flattened(&flattened)
        .unwrap();

    assert!(
        bag_equals(&expected, &actual),
        "interpreted {expected:?} but executed {actual:?}"
    );
    actual
}

fn text(s: &str) -> Datum {
    Datum::Base(Value::from(s))
}

// ============================================================================
// Pipeline Tests
// ============================================================================

#[test]
fn test_age_differences() {
    let catalog = catalog();
    let backend = setup_backend();

    // for c in Couples, w in People, m in People
    //   where c.Her = w.Name and c.Him = m.Name and w.Age > m.Age
    //   yield {name = w.Name, diff = w.Age - m.Age}
    let people = || table(&catalog, "People").unwrap();
    let q = for_each(
        table(&catalog, "Couples").unwrap(),
        "c",
        for_each(
            people(),
            "w",
            for_where(
                people(),
                "m",
                var("c")
                    .field("Her")
                    .eq(var("w").field("Name"))
                    .and(var("c").field("Him").eq(var("m").field("Name")))
                    .and(var("w").field("Age").gt(var("m").field("Age"))),
                yield_(record([
                    ("name", var("w").field("Name")),
                    ("diff", var("w").field("Age").sub(var("m").field("Age"))),
                ])),
            ),
        ),
    );

    let rows = run_both(&backend, &q);
    let expected = vec![
        Datum::record([("name", text("Alex")), ("diff", Datum::Base(Value::Int64(5)))]),
        Datum::record([("name", text("Cora")), ("diff", Datum::Base(Value::Int64(2)))]),
    ];
    assert!(bag_equals(&rows, &expected));
}

#[test]
fn test_function_composition() {
    let catalog = catalog();
    let backend = setup_backend();
    let people = || table(&catalog, "People").unwrap();

    // range = fun a -> fun b -> for w in People where a <= w.Age and w.Age < b yield w.Name
    let range = lambda(
        "a",
        Type::int(),
        lambda(
            "b",
            Type::int(),
            for_where(
                people(),
                "w",
                var("a")
                    .lt_eq(var("w").field("Age"))
                    .and(var("w").field("Age").lt(var("b"))),
                yield_(var("w").field("Name")),
            ),
        ),
    );
    // for x in range(30)(40) do if x = "Drew" then empty else yield x
    let q = for_each(
        apply(apply(range, lit(30i64)), lit(40i64)),
        "x",
        if_then_else(
            var("x").eq(lit("Drew")),
            empty(Type::string()),
            yield_(var("x")),
        ),
    );

    let rows = run_both(&backend, &q);
    assert_eq!(rows, vec![text("Cora")]);
}

#[test]
fn test_union_sources() {
    let catalog = catalog();
    let backend = setup_backend();

    let names = |col: &str| {
        for_each(
            table(&catalog, "Couples").unwrap(),
            "c",
            yield_(var("c").field(col)),
        )
    };
    // for n in (her names union his names) where n <> "Alex" yield n || "!"
    let q = for_where(
        union(names("Her"), names("Him")),
        "n",
        var("n").not_eq(lit("Alex")),
        yield_(var("n").concat(lit("!"))),
    );

    let rows = run_both(&backend, &q);
    assert_eq!(rows.len(), 5);
}

#[test]
fn test_nested_results() {
    let catalog = catalog();
    let backend = setup_backend();

    // for c in Couples yield {her = c.Her, same_age = for p in People where p.Age = 60 yield p.Name}
    let q = for_each(
        table(&catalog, "Couples").unwrap(),
        "c",
        yield_(record([
            ("her", var("c").field("Her")),
            (
                "same_age",
                for_where(
                    table(&catalog, "People").unwrap(),
                    "p",
                    var("p").field("Age").eq(lit(60i64)),
                    yield_(var("p").field("Name")),
                ),
            ),
        ])),
    );

    let rows = run_both(&backend, &q);
    assert_eq!(rows.len(), 3);
    assert_eq!(
        rows[0].field("same_age").unwrap().clone().into_bag().unwrap().len(),
        2
    );
}

#[test]
fn test_runtime_errors_surface() {
    let catalog = catalog();
    let backend = setup_backend();

    let q = for_each(
        table(&catalog, "People").unwrap(),
        "u",
        yield_(var("u").field("Age").div(lit(0i64))),
    );
    let flat = flatten(&normalize(q).unwrap()).unwrap();
    let err = FlatExecutor::new(&backend)
        .execute_flattened(&flat)
        .unwrap_err();
    assert!(matches!(err, QuarryError::ExecutionError(_)));
}

// ============================================================================
// Host Function Tests
// ============================================================================

#[test]
fn test_registered_host_function() {
    let catalog = catalog();
    let mut backend = setup_backend();
    backend.register_function("initial", |args| match args {
        [Value::String(s)] => Ok(Value::String(s.chars().take(1).collect())),
        _ => Err(QuarryError::execution("initial expects one string")),
    });

    let initial = HostFunction::pure("initial", vec![DataType::String], DataType::String);
    let q = for_where(
        table(&catalog, "People").unwrap(),
        "u",
        var("u").field("Age").lt(lit(30i64)),
        yield_(Term::prim(PrimOp::Call(initial), vec![var("u").field("Name")])),
    );

    let rows = run_both(&backend, &q);
    assert_eq!(rows, vec![text("E")]);
}

// ============================================================================
// SQL Tests
// ============================================================================

#[test]
fn test_sql_for_normalized_query() {
    let catalog = catalog();

    // for p in (for u in People where u.Age >= 30 yield {name = u.Name}) yield p
    let inner = for_where(
        table(&catalog, "People").unwrap(),
        "u",
        var("u").field("Age").gt_eq(lit(30i64)),
        yield_(record([("name", var("u").field("Name"))])),
    );
    let q = for_each(inner, "p", yield_(var("p")));

    let flat = flatten(&normalize(q).unwrap())
        .unwrap()
        .into_flat()
        .unwrap();
    let sql = SqlRenderer::new().render(&flat).unwrap();
    assert_eq!(
        sql,
        "SELECT u.Name AS name FROM People AS u WHERE (u.Age >= 30)"
    );
}

#[test]
fn test_splice_checked_once_regardless_of_rows() {
    let catalog = catalog();
    let validator = StageValidator::new(Arc::clone(&catalog), StageConfig::default());

    // between(lo, hi) = for w in People where lo(w.Age) and hi(w.Age) yield w.Name
    let predicate = Type::function(Type::int(), Type::bool());
    let between = Combinator::new(
        "between",
        [("lo", predicate.clone()), ("hi", predicate)],
        for_where(
            table(&catalog, "People").unwrap(),
            "w",
            var("lo")
                .apply(var("w").field("Age"))
                .and(var("hi").apply(var("w").field("Age"))),
            yield_(var("w").field("Name")),
        ),
    );
    let args = [
        SpliceArg::anonymous(lambda("x", Type::int(), var("x").gt_eq(lit(30i64)))),
        SpliceArg::anonymous(lambda("x", Type::int(), var("x").lt(lit(60i64)))),
    ];
    let validated = args
        .iter()
        .map(|arg| validator.validate(arg))
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let query = normalize(between.instantiate(validated).unwrap()).unwrap();
    let flattened = flatten(&query).unwrap();
    assert_eq!(validator.checks_performed(), args.len());

    for size in [0usize, 1, 1_000] {
        let rows = (0..size)
            .map(|i| vec![Value::String(format!("p{i}")), Value::Int64((i % 90) as i64)])
            .collect();
        let backend = MemoryBackend::new(Arc::clone(&catalog))
            .with_rows("People", rows)
            .unwrap();

        let result = FlatExecutor::new(&backend)
            .execute_flattened(&flattened)
            .unwrap();
        let expected = (0..size).filter(|i| (30..60).contains(&(i % 90))).count();
        assert_eq!(result.len(), expected);
        assert_eq!(validator.checks_performed(), args.len());
    }
}
