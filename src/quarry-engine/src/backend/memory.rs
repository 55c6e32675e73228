//! In-memory backend.

use std::collections::HashMap;
use std::sync::Arc;

use common_error::{Location, QuarryError, QuarryResult};
use log::debug;
use quarry_core::{check_row_invariants, Catalog, DataType, Type, Value};
use quarry_logical::PrimOp;

use super::Backend;
use crate::datum::Datum;
use crate::eval::PrimEvaluator;

/// A host function implementation.
pub type HostFn = Arc<dyn Fn(&[Value]) -> QuarryResult<Value> + Send + Sync>;

/// Backend holding every table in memory.
///
/// Rows are checked against the catalog when inserted. Host functions are
/// executable only once registered.
pub struct MemoryBackend {
    catalog: Arc<Catalog>,
    tables: HashMap<String, Vec<Datum>>,
    functions: HashMap<String, HostFn>,
    evaluator: PrimEvaluator,
}

impl MemoryBackend {
    /// Create an empty backend over `catalog`. Every catalog collection
    /// starts out empty.
    pub fn new(catalog: Arc<Catalog>) -> Self {
        let tables = catalog
            .list()
            .into_iter()
            .map(|name| (name.to_string(), Vec::new()))
            .collect();
        Self {
            catalog,
            tables,
            functions: HashMap::new(),
            evaluator: PrimEvaluator::new(),
        }
    }

    /// The catalog this backend serves.
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Append rows to a table. Each row lists its values in the catalog's
    /// field order; integers are widened where the field is `Float64`.
    pub fn insert(&mut self, table: &str, rows: Vec<Vec<Value>>) -> QuarryResult<()> {
        let location = Location::root().child(table);
        let row_type = self.catalog.resolve(table, &location)?.clone();

        let mut converted = Vec::with_capacity(rows.len());
        for (i, values) in rows.into_iter().enumerate() {
            let labelled: Vec<(String, Value)> = row_type
                .labels()
                .map(str::to_string)
                .zip(values.iter().cloned())
                .collect();
            if labelled.len() != values.len() {
                return Err(QuarryError::type_error(
                    format!("{} fields", row_type.len()),
                    format!("{} fields", values.len()),
                    location.arg(i),
                ));
            }
            check_row_invariants(&labelled, &row_type, &location.arg(i))?;

            let fields = labelled
                .into_iter()
                .zip(row_type.fields())
                .map(|((label, value), (_, ty))| (label, Datum::Base(widen(value, ty))))
                .collect();
            converted.push(Datum::Record(fields));
        }

        debug!("Inserted {} rows into {table}", converted.len());
        self.tables.entry(table.to_string()).or_default().extend(converted);
        Ok(())
    }

    /// Builder-style [`MemoryBackend::insert`].
    pub fn with_rows(mut self, table: &str, rows: Vec<Vec<Value>>) -> QuarryResult<Self> {
        self.insert(table, rows)?;
        Ok(self)
    }

    /// Register an executable host function.
    pub fn register_function(
        &mut self,
        name: impl Into<String>,
        func: impl Fn(&[Value]) -> QuarryResult<Value> + Send + Sync + 'static,
    ) {
        self.functions.insert(name.into(), Arc::new(func));
    }

    /// Number of rows in a table.
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, Vec::len)
    }
}

#[allow(clippy::cast_precision_loss)]
fn widen(value: Value, ty: &Type) -> Value {
    match (value, ty) {
        (Value::Int64(i), Type::Base(DataType::Float64)) => Value::Float64(i as f64),
        (value, _) => value,
    }
}

impl Backend for MemoryBackend {
    fn enumerate(&self, table: &str) -> QuarryResult<Vec<Datum>> {
        self.tables
            .get(table)
            .cloned()
            .ok_or_else(|| QuarryError::execution(format!("unknown table `{table}`")))
    }

    fn evaluate(&self, op: &PrimOp, args: &[Value]) -> QuarryResult<Value> {
        match op {
            PrimOp::Call(func) => {
                let implementation = self.functions.get(&func.name).ok_or_else(|| {
                    QuarryError::execution(format!("host function `{}` is not registered", func.name))
                })?;
                implementation(args)
            }
            op => self.evaluator.evaluate(op, args),
        }
    }
}
