//! The query object: aggregates every clause and enforces the cross-clause
//! consistency rules that must hold before execution begins.

use std::collections::HashMap;

use tracing::debug;

use crate::column::ColumnExpr;
use crate::error::{EngineError, EngineResult};
use crate::filter::Filter;
use crate::table::DataTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortItem {
    pub expr: ColumnExpr,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Default)]
pub struct Query {
    pub select: Vec<ColumnExpr>,
    pub filter: Option<Filter>,
    pub group: Vec<ColumnExpr>,
    pub pivot: Vec<ColumnExpr>,
    pub order_by: Vec<SortItem>,
    pub skip: usize,
    pub limit: Option<usize>,
    pub labels: HashMap<ColumnExpr, String>,
    pub formats: HashMap<ColumnExpr, String>,
    pub no_values: bool,
    pub no_format: bool,
}

impl Query {
    pub fn new(select: Vec<ColumnExpr>) -> Self {
        Query {
            select,
            ..Default::default()
        }
    }

    pub fn has_aggregation(&self) -> bool {
        self.select.iter().any(|e| !e.all_aggregation_columns().is_empty())
    }

    pub fn has_group_or_pivot(&self) -> bool {
        !self.group.is_empty() || !self.pivot.is_empty()
    }

    /// Enforces every cross-clause rule from SPEC_FULL.md §4.6; the first
    /// violation raises an invalid-query error naming the offending clause.
    pub fn validate(&self, table: &DataTable) -> EngineResult<()> {
        for expr in &self.select {
            expr.validate(table)?;
        }
        if let Some(filter) = &self.filter {
            filter.validate(table)?;
        }
        for expr in self.group.iter().chain(self.pivot.iter()) {
            expr.validate(table)?;
            if !expr.all_aggregation_columns().is_empty() {
                return Err(EngineError::invalid_query("GROUP/PIVOT", "GROUP/PIVOT may not contain aggregations"));
            }
        }
        for item in &self.order_by {
            item.expr.validate(table)?;
        }
        for key in self.labels.keys().chain(self.formats.keys()) {
            key.validate(table)?;
        }

        let group_or_pivot: Vec<&ColumnExpr> = self.group.iter().chain(self.pivot.iter()).collect();

        if self.has_group_or_pivot() {
            for expr in &self.select {
                if !resolves_in_group_context(expr, &group_or_pivot) {
                    return Err(EngineError::invalid_query(
                        "SELECT",
                        format!(
                            "'{}' is not an aggregation, does not appear in GROUP BY or PIVOT, and is not a function of columns that do",
                            expr.to_query_string()
                        ),
                    ));
                }
            }
            for g in &group_or_pivot {
                if !self.select.iter().any(|s| s == *g) {
                    return Err(EngineError::invalid_query(
                        "GROUP/PIVOT",
                        format!("'{}' must also appear in SELECT", g.to_query_string()),
                    ));
                }
            }
        }

        if self.has_aggregation() {
            for expr in &self.select {
                if !resolves_in_group_context(expr, &group_or_pivot) {
                    return Err(EngineError::invalid_query(
                        "SELECT",
                        format!(
                            "'{}' must be an aggregation, appear in GROUP BY/PIVOT, or be a function of columns that do, when SELECT has aggregations",
                            expr.to_query_string()
                        ),
                    ));
                }
            }
        }

        for g in &self.group {
            if self.pivot.iter().any(|p| p == g) {
                return Err(EngineError::invalid_query(
                    "GROUP/PIVOT",
                    format!("'{}' cannot be both a GROUP and a PIVOT column", g.to_query_string()),
                ));
            }
        }

        let order_by_may_escape_select = !self.has_group_or_pivot() && !self.has_aggregation();
        if !order_by_may_escape_select {
            for item in &self.order_by {
                if !self.select.iter().any(|s| s == &item.expr) {
                    return Err(EngineError::invalid_query(
                        "ORDER BY",
                        format!(
                            "'{}' must appear in SELECT unless the query has no GROUP/PIVOT/aggregation",
                            item.expr.to_query_string()
                        ),
                    ));
                }
            }
        }

        for key in self.labels.keys() {
            if !self.select.iter().any(|s| s == key) {
                return Err(EngineError::invalid_query("LABEL", format!("'{}' must appear in SELECT", key.to_query_string())));
            }
        }
        for key in self.formats.keys() {
            if !self.select.iter().any(|s| s == key) {
                return Err(EngineError::invalid_query("FORMAT", format!("'{}' must appear in SELECT", key.to_query_string())));
            }
        }

        debug!(select_count = self.select.len(), "Query::validate passed");
        Ok(())
    }
}

/// Whether `expr` can be evaluated against a post-aggregation row: it is
/// itself an aggregation, it appears (structurally) in GROUP/PIVOT, or it is
/// a scalar function every one of whose arguments resolves this way.
fn resolves_in_group_context(expr: &ColumnExpr, group_or_pivot: &[&ColumnExpr]) -> bool {
    if matches!(expr, ColumnExpr::Aggregation(..)) || group_or_pivot.iter().any(|g| *g == expr) {
        return true;
    }
    match expr {
        ColumnExpr::ScalarFunction(_, args) => args.iter().all(|a| resolves_in_group_context(a, group_or_pivot)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::AggregationType;
    use crate::table::ColumnDescription;
    use crate::value::ValueType;

    fn schema() -> DataTable {
        let mut t = DataTable::new();
        t.add_column(ColumnDescription::new("dept", ValueType::Text)).unwrap();
        t.add_column(ColumnDescription::new("salary", ValueType::Number)).unwrap();
        t
    }

    #[test]
    fn select_sum_without_group_requires_aggregation_or_nothing_else() {
        let q = Query::new(vec![ColumnExpr::aggregation(ColumnExpr::simple("salary"), AggregationType::Sum)]);
        assert!(q.validate(&schema()).is_ok());
    }

    #[test]
    fn group_column_must_appear_in_select() {
        let mut q = Query::new(vec![ColumnExpr::aggregation(ColumnExpr::simple("salary"), AggregationType::Sum)]);
        q.group = vec![ColumnExpr::simple("dept")];
        assert!(q.validate(&schema()).is_err());
    }

    #[test]
    fn select_non_aggregation_not_in_group_fails() {
        let mut q = Query::new(vec![
            ColumnExpr::simple("dept"),
            ColumnExpr::aggregation(ColumnExpr::simple("salary"), AggregationType::Sum),
        ]);
        q.group = vec![];
        assert!(q.validate(&schema()).is_err());
    }

    #[test]
    fn sum_over_text_column_is_rejected() {
        let q = Query::new(vec![ColumnExpr::aggregation(ColumnExpr::simple("dept"), AggregationType::Sum)]);
        assert!(q.validate(&schema()).is_err());
    }

    #[test]
    fn group_and_pivot_cannot_share_a_column() {
        let mut q = Query::new(vec![
            ColumnExpr::simple("dept"),
            ColumnExpr::aggregation(ColumnExpr::simple("salary"), AggregationType::Sum),
        ]);
        q.group = vec![ColumnExpr::simple("dept")];
        q.pivot = vec![ColumnExpr::simple("dept")];
        assert!(q.validate(&schema()).is_err());
    }

    #[test]
    fn order_by_outside_select_ok_without_group_or_aggregation() {
        let mut q = Query::new(vec![ColumnExpr::simple("dept")]);
        q.order_by = vec![SortItem {
            expr: ColumnExpr::simple("salary"),
            direction: SortDirection::Desc,
        }];
        assert!(q.validate(&schema()).is_ok());
    }

    #[test]
    fn order_by_outside_select_rejected_with_group() {
        let mut q = Query::new(vec![
            ColumnExpr::simple("dept"),
            ColumnExpr::aggregation(ColumnExpr::simple("salary"), AggregationType::Sum),
        ]);
        q.group = vec![ColumnExpr::simple("dept")];
        q.order_by = vec![SortItem {
            expr: ColumnExpr::simple("salary"),
            direction: SortDirection::Desc,
        }];
        assert!(q.validate(&schema()).is_err());
    }

    #[test]
    fn label_key_must_appear_in_select() {
        let mut q = Query::new(vec![ColumnExpr::simple("dept")]);
        q.labels.insert(ColumnExpr::simple("salary"), "Salary".to_string());
        assert!(q.validate(&schema()).is_err());
    }

    fn schema_with_date() -> DataTable {
        let mut t = schema();
        t.add_column(ColumnDescription::new("hired", ValueType::Date)).unwrap();
        t
    }

    #[test]
    fn scalar_function_over_aggregation_is_accepted_without_group() {
        let q = Query::new(vec![ColumnExpr::scalar_function(
            "year",
            vec![ColumnExpr::aggregation(ColumnExpr::simple("hired"), AggregationType::Max)],
        )]);
        assert!(q.validate(&schema_with_date()).is_ok());
    }

    #[test]
    fn scalar_function_over_group_column_is_accepted() {
        let mut q = Query::new(vec![
            ColumnExpr::simple("dept"),
            ColumnExpr::scalar_function("upper", vec![ColumnExpr::simple("dept")]),
            ColumnExpr::aggregation(ColumnExpr::simple("salary"), AggregationType::Sum),
        ]);
        q.group = vec![ColumnExpr::simple("dept")];
        assert!(q.validate(&schema()).is_ok());
    }

    #[test]
    fn scalar_function_over_unrelated_column_is_still_rejected() {
        let q = Query::new(vec![
            ColumnExpr::scalar_function("upper", vec![ColumnExpr::simple("dept")]),
            ColumnExpr::aggregation(ColumnExpr::simple("salary"), AggregationType::Sum),
        ]);
        assert!(q.validate(&schema()).is_err());
    }
}
