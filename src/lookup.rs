//! Maps a column expression to its index within a [`DataTable`](crate::table::DataTable).
//!
//! Two implementations exist because a SELECT expression can refer either to
//! a schema column by id (resolvable structurally) or to a composite
//! expression introduced by aggregation/pivot materialization that has no
//! schema id of its own.

use std::collections::HashMap;

use crate::column::ColumnExpr;
use crate::error::{EngineError, EngineResult};
use crate::table::DataTable;

pub trait ColumnLookup {
    fn index_of(&self, expr: &ColumnExpr) -> EngineResult<usize>;
}

/// Resolves `SimpleColumn`s directly against a table's schema.
pub struct DataTableColumnLookup<'a> {
    table: &'a DataTable,
}

impl<'a> DataTableColumnLookup<'a> {
    pub fn new(table: &'a DataTable) -> Self {
        DataTableColumnLookup { table }
    }
}

impl ColumnLookup for DataTableColumnLookup<'_> {
    fn index_of(&self, expr: &ColumnExpr) -> EngineResult<usize> {
        match expr {
            ColumnExpr::Simple(id) => self.table.column_index(id).ok_or_else(|| {
                EngineError::invalid_query("SELECT", format!("unknown column '{id}'"))
            }),
            other => Err(EngineError::invalid_query(
                "SELECT",
                format!("{} is not a schema column of this table", other.to_query_string()),
            )),
        }
    }
}

/// An explicit structural map, used for rows produced after GROUP/PIVOT
/// aggregation where SELECT references aggregation/scalar-function
/// expressions that do not correspond to a source schema id.
#[derive(Debug, Clone, Default)]
pub struct GenericColumnLookup {
    indices: HashMap<ColumnExpr, usize>,
}

impl GenericColumnLookup {
    pub fn new() -> Self {
        GenericColumnLookup {
            indices: HashMap::new(),
        }
    }

    pub fn insert(&mut self, expr: ColumnExpr, index: usize) {
        self.indices.insert(expr, index);
    }
}

impl ColumnLookup for GenericColumnLookup {
    fn index_of(&self, expr: &ColumnExpr) -> EngineResult<usize> {
        self.indices
            .get(expr)
            .copied()
            .ok_or_else(|| EngineError::invalid_query("SELECT", format!("unresolved column expression {}", expr.to_query_string())))
    }
}
