//! The execution pipeline: turns a validated [`Query`] plus a source
//! [`DataTable`] into a result `DataTable`, applying clauses in the fixed
//! order WHERE → GROUP/PIVOT/AGGREGATE → SELECT → SORT → SKIP/LIMIT →
//! LABELS/FORMATS → OPTIONS.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::aggregate::{AggregationTree, ValueAggregator};
use crate::column::{AggregationType, ColumnExpr};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::filter::Filter;
use crate::lookup::{ColumnLookup, DataTableColumnLookup, GenericColumnLookup};
use crate::query::Query;
use crate::table::{ColumnDescription, DataTable, TableCell, TableRow, Warning};
use crate::value::{Value, ValueType};

/// Runs `query` against `table`, returning the result `DataTable` or the
/// first validation/execution error encountered.
pub fn execute(query: &Query, table: &DataTable, config: &EngineConfig) -> EngineResult<DataTable> {
    query.validate(table)?;
    check_cancelled(config)?;

    let source_lookup = DataTableColumnLookup::new(table);
    let value_types = |e: &ColumnExpr| e.value_type(table).expect("Query::validate already checked every column expression");

    let filtered = filter_rows(query.filter.as_ref(), table, &source_lookup, &value_types)?;
    debug!(matched = filtered.len(), "execute: WHERE stage complete");
    check_cancelled(config)?;

    let mut result = if query.has_group_or_pivot() || query.has_aggregation() {
        execute_aggregated(query, table, &filtered, config, &value_types)?
    } else {
        execute_flat(query, table, filtered, &source_lookup, &value_types, config)?
    };
    check_cancelled(config)?;

    result = apply_skip_limit(result, query.skip, query.limit);
    apply_options(&mut result, query);
    debug!(rows = result.rows().len(), "execute: pipeline complete");
    Ok(result)
}

fn check_cancelled(config: &EngineConfig) -> EngineResult<()> {
    if config.is_cancelled() { Err(EngineError::Cancelled) } else { Ok(()) }
}

fn filter_rows(
    filter: Option<&Filter>,
    table: &DataTable,
    lookup: &dyn ColumnLookup,
    value_types: &dyn Fn(&ColumnExpr) -> ValueType,
) -> EngineResult<Vec<TableRow>> {
    let Some(filter) = filter else {
        return Ok(table.rows().to_vec());
    };
    let mut out = Vec::new();
    for row in table.rows() {
        if filter.is_match(row, lookup, value_types)? {
            out.push(row.clone());
        }
    }
    Ok(out)
}

fn build_collator(config: &EngineConfig) -> Option<Box<dyn Fn(&str, &str) -> Ordering>> {
    if config.case_insensitive_collation {
        Some(Box::new(|a: &str, b: &str| a.to_lowercase().cmp(&b.to_lowercase())))
    } else {
        None
    }
}

/// No GROUP/PIVOT and no aggregation: each selected column is evaluated
/// directly against the filtered rows, ORDER BY may reference any schema
/// column (rule 7), and the projection happens last.
fn execute_flat(
    query: &Query,
    table: &DataTable,
    mut rows: Vec<TableRow>,
    lookup: &dyn ColumnLookup,
    value_types: &dyn Fn(&ColumnExpr) -> ValueType,
    config: &EngineConfig,
) -> EngineResult<DataTable> {
    if !query.order_by.is_empty() {
        let collator = build_collator(config);
        sort_rows_by_expr(&mut rows, &query.order_by, lookup, value_types, collator.as_deref())?;
    }

    let mut out = DataTable::new().with_locale(config.default_locale.clone());
    for expr in &query.select {
        let label = query.labels.get(expr).cloned().unwrap_or_else(|| expr.to_query_string());
        out.add_column(ColumnDescription::new(expr.id(), expr.value_type(table)?).with_label(label))?;
    }

    for row in &rows {
        let mut cells = Vec::with_capacity(query.select.len());
        for expr in &query.select {
            cells.push(TableCell::new(expr.eval(row, lookup, value_types)?));
        }
        out.add_row(cells)?;
    }

    for (i, expr) in query.select.iter().enumerate() {
        if let Some(pattern) = query.formats.get(expr) {
            if !query.no_format {
                apply_format(&mut out, i, expr.value_type(table)?, pattern)?;
            }
        }
    }
    Ok(out)
}

fn sort_rows_by_expr(
    rows: &mut Vec<TableRow>,
    order_by: &[crate::query::SortItem],
    lookup: &dyn ColumnLookup,
    value_types: &dyn Fn(&ColumnExpr) -> ValueType,
    collator: Option<&dyn Fn(&str, &str) -> Ordering>,
) -> EngineResult<()> {
    let mut keyed: Vec<(Vec<Value>, TableRow)> = Vec::with_capacity(rows.len());
    for row in rows.drain(..) {
        let mut key = Vec::with_capacity(order_by.len());
        for item in order_by {
            key.push(item.expr.eval(&row, lookup, value_types)?);
        }
        keyed.push((key, row));
    }
    keyed.sort_by(|a, b| compare_sort_keys(&a.0, &b.0, order_by, collator));
    rows.extend(keyed.into_iter().map(|(_, row)| row));
    Ok(())
}

fn compare_sort_keys(
    a: &[Value],
    b: &[Value],
    order_by: &[crate::query::SortItem],
    collator: Option<&dyn Fn(&str, &str) -> Ordering>,
) -> Ordering {
    for (i, item) in order_by.iter().enumerate() {
        let ord = a[i].compare_to(&b[i], collator);
        let ord = if item.direction == crate::query::SortDirection::Desc { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// One select-column's role in an aggregated execution; the same logical
/// select entry can expand into several physical output columns when PIVOT
/// is present.
enum ColumnPlan {
    Group { group_index: usize, base: ColumnExpr },
    Aggregation {
        inner_index: usize,
        agg: AggregationType,
        pivot_tuple: Option<Vec<Value>>,
        base: ColumnExpr,
    },
    /// A scalar function whose arguments bottom out in aggregation and/or
    /// GROUP subexpressions; evaluated against the post-group row via a
    /// `GenericColumnLookup` built fresh per (group, pivot tuple).
    ScalarFunction { expr: ColumnExpr, pivot_tuple: Option<Vec<Value>> },
}

fn execute_aggregated(
    query: &Query,
    table: &DataTable,
    rows: &[TableRow],
    config: &EngineConfig,
    value_types: &dyn Fn(&ColumnExpr) -> ValueType,
) -> EngineResult<DataTable> {
    let lookup = DataTableColumnLookup::new(table);

    let mut distinct_inner: Vec<ColumnExpr> = Vec::new();
    for expr in &query.select {
        for agg_expr in expr.all_aggregation_columns() {
            if let ColumnExpr::Aggregation(inner, _) = &agg_expr {
                if !distinct_inner.contains(inner.as_ref()) {
                    distinct_inner.push(inner.as_ref().clone());
                }
            }
        }
    }
    let agg_value_types: Vec<ValueType> = distinct_inner.iter().map(|e| e.value_type(table)).collect::<EngineResult<Vec<_>>>()?;

    let mut tree = AggregationTree::new(agg_value_types.clone());
    if query.group.is_empty() {
        tree.ensure_group(Vec::new());
    }
    for row in rows {
        let group_key: Vec<Value> = query.group.iter().map(|e| e.eval(row, &lookup, value_types)).collect::<EngineResult<_>>()?;
        let pivot_key: Vec<Value> = query.pivot.iter().map(|e| e.eval(row, &lookup, value_types)).collect::<EngineResult<_>>()?;
        let values: Vec<Value> = distinct_inner.iter().map(|e| e.eval(row, &lookup, value_types)).collect::<EngineResult<_>>()?;
        tree.ingest(group_key, pivot_key, &values);
    }
    debug!(groups = tree.groups().count(), "execute: aggregation stage complete");

    let pivot_tuples: Vec<Vec<Value>> = if query.pivot.is_empty() { vec![Vec::new()] } else { tree.distinct_pivot_tuples() };

    let mut plan: Vec<ColumnPlan> = Vec::new();
    for expr in &query.select {
        match expr {
            ColumnExpr::Aggregation(inner, agg) => {
                let inner_index = distinct_inner.iter().position(|e| e == inner.as_ref()).expect("collected above");
                if query.pivot.is_empty() {
                    plan.push(ColumnPlan::Aggregation {
                        inner_index,
                        agg: *agg,
                        pivot_tuple: None,
                        base: expr.clone(),
                    });
                } else {
                    for tuple in &pivot_tuples {
                        plan.push(ColumnPlan::Aggregation {
                            inner_index,
                            agg: *agg,
                            pivot_tuple: Some(tuple.clone()),
                            base: expr.clone(),
                        });
                    }
                }
            }
            ColumnExpr::ScalarFunction(..) => {
                let has_agg = !expr.all_aggregation_columns().is_empty();
                if has_agg && !query.pivot.is_empty() {
                    for tuple in &pivot_tuples {
                        plan.push(ColumnPlan::ScalarFunction {
                            expr: expr.clone(),
                            pivot_tuple: Some(tuple.clone()),
                        });
                    }
                } else {
                    plan.push(ColumnPlan::ScalarFunction { expr: expr.clone(), pivot_tuple: None });
                }
            }
            other => {
                if let Some(group_index) = query.group.iter().position(|g| g == other) {
                    plan.push(ColumnPlan::Group {
                        group_index,
                        base: other.clone(),
                    });
                }
                // A PIVOT passthrough column contributes no output column of
                // its own; its values are folded into aggregation headers.
            }
        }
    }

    let mut out = DataTable::new().with_locale(config.default_locale.clone());
    for p in &plan {
        let (id, label, value_type) = match p {
            ColumnPlan::Group { group_index, base } => {
                let label = query.labels.get(base).cloned().unwrap_or_else(|| base.to_query_string());
                (base.id(), label, base.value_type(table)?)
            }
            ColumnPlan::Aggregation { base, pivot_tuple, .. } => {
                let base_label = query.labels.get(base).cloned().unwrap_or_else(|| base.to_query_string());
                let value_type = base.value_type(table)?;
                match pivot_tuple {
                    None => (base.id(), base_label, value_type),
                    Some(tuple) => {
                        let suffix: Vec<String> = tuple.iter().map(crate::format::default_display).collect();
                        (format!("{}-{}", suffix.join("-"), base.id()), format!("{} {}", base_label, suffix.join(" ")), value_type)
                    }
                }
            }
            ColumnPlan::ScalarFunction { expr, pivot_tuple } => {
                let base_label = query.labels.get(expr).cloned().unwrap_or_else(|| expr.to_query_string());
                let value_type = expr.value_type(table)?;
                match pivot_tuple {
                    None => (expr.id(), base_label, value_type),
                    Some(tuple) => {
                        let suffix: Vec<String> = tuple.iter().map(crate::format::default_display).collect();
                        (format!("{}-{}", suffix.join("-"), expr.id()), format!("{} {}", base_label, suffix.join(" ")), value_type)
                    }
                }
            }
        };
        out.add_column(ColumnDescription::new(id, value_type).with_label(label))?;
    }

    for (group_key, pivot_map) in tree.groups() {
        let mut cells = Vec::with_capacity(plan.len());
        for p in &plan {
            match p {
                ColumnPlan::Group { group_index, .. } => cells.push(TableCell::new(group_key[*group_index].clone())),
                ColumnPlan::Aggregation { inner_index, agg, pivot_tuple, .. } => {
                    let key = pivot_tuple.clone().unwrap_or_default();
                    let value = match pivot_map.get(&key) {
                        Some(aggs) => aggs[*inner_index].result(*agg),
                        None => ValueAggregator::new(agg_value_types[*inner_index]).result(*agg),
                    };
                    cells.push(TableCell::new(value));
                }
                ColumnPlan::ScalarFunction { expr, pivot_tuple } => {
                    let key = pivot_tuple.clone().unwrap_or_default();
                    let value = eval_post_aggregation_scalar(expr, &query.group, group_key, &distinct_inner, &agg_value_types, &key, pivot_map, value_types)?;
                    cells.push(TableCell::new(value));
                }
            }
        }
        out.add_row(cells)?;
    }

    if !query.order_by.is_empty() {
        let index_of = materialized_column_index(&plan);
        let collator = build_collator(config);
        sort_materialized(&mut out, &query.order_by, &index_of, collator.as_deref())?;
    }

    for (i, p) in plan.iter().enumerate() {
        let base = match p {
            ColumnPlan::Group { base, .. } => base,
            ColumnPlan::Aggregation { base, .. } => base,
            ColumnPlan::ScalarFunction { expr, .. } => expr,
        };
        if let Some(pattern) = query.formats.get(base) {
            if !query.no_format {
                apply_format(&mut out, i, out.columns()[i].value_type, pattern)?;
            }
        }
    }

    Ok(out)
}

/// Evaluates a SELECT scalar function against one (group, pivot tuple) leaf,
/// per SPEC_FULL §4.7 stage 3: builds a `GenericColumnLookup` mapping every
/// aggregation/GROUP subexpression the function references to a synthetic
/// post-group row holding their computed values, then evaluates through it.
#[allow(clippy::too_many_arguments)]
fn eval_post_aggregation_scalar(
    expr: &ColumnExpr,
    group: &[ColumnExpr],
    group_key: &[Value],
    distinct_inner: &[ColumnExpr],
    agg_value_types: &[ValueType],
    pivot_key: &[Value],
    pivot_map: &BTreeMap<Vec<Value>, Vec<ValueAggregator>>,
    value_types: &dyn Fn(&ColumnExpr) -> ValueType,
) -> EngineResult<Value> {
    let mut post_group_lookup = GenericColumnLookup::new();
    let mut cells = Vec::new();
    for (i, g) in group.iter().enumerate() {
        post_group_lookup.insert(g.clone(), cells.len());
        cells.push(TableCell::new(group_key[i].clone()));
    }
    for agg_expr in expr.all_aggregation_columns() {
        let ColumnExpr::Aggregation(inner, agg) = &agg_expr else {
            continue;
        };
        let inner_index = distinct_inner.iter().position(|e| e == inner.as_ref()).expect("collected above");
        let value = match pivot_map.get(pivot_key) {
            Some(aggs) => aggs[inner_index].result(*agg),
            None => ValueAggregator::new(agg_value_types[inner_index]).result(*agg),
        };
        post_group_lookup.insert(agg_expr.clone(), cells.len());
        cells.push(TableCell::new(value));
    }
    let row = TableRow::new(cells);
    expr.eval(&row, &post_group_lookup, value_types)
}

fn materialized_column_index(plan: &[ColumnPlan]) -> HashMap<ColumnExpr, usize> {
    let mut map = HashMap::new();
    for (i, p) in plan.iter().enumerate() {
        let base = match p {
            ColumnPlan::Group { base, .. } => base,
            ColumnPlan::Aggregation { base, .. } => base,
            ColumnPlan::ScalarFunction { expr, .. } => expr,
        };
        map.entry(base.clone()).or_insert(i);
    }
    map
}

fn sort_materialized(
    table: &mut DataTable,
    order_by: &[crate::query::SortItem],
    index_of: &HashMap<ColumnExpr, usize>,
    collator: Option<&dyn Fn(&str, &str) -> Ordering>,
) -> EngineResult<()> {
    let indices: Vec<usize> = order_by
        .iter()
        .map(|item| {
            index_of
                .get(&item.expr)
                .copied()
                .ok_or_else(|| EngineError::invalid_query("ORDER BY", format!("'{}' does not resolve to a result column", item.expr.to_query_string())))
        })
        .collect::<EngineResult<_>>()?;

    let mut rows: Vec<TableRow> = table.rows().to_vec();
    rows.sort_by(|a, b| {
        for (i, item) in order_by.iter().enumerate() {
            let idx = indices[i];
            let ord = a.cells[idx].value.compare_to(&b.cells[idx].value, collator);
            let ord = if item.direction == crate::query::SortDirection::Desc { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });

    let mut rebuilt = DataTable::new().with_locale(table.locale());
    for col in table.columns() {
        rebuilt.add_column(col.clone())?;
    }
    for row in rows {
        rebuilt.add_row(row.cells)?;
    }
    for w in table.warnings() {
        rebuilt.add_warning(w.clone());
    }
    *table = rebuilt;
    Ok(())
}

fn apply_format(table: &mut DataTable, col_idx: usize, value_type: ValueType, pattern: &str) -> EngineResult<()> {
    match crate::format::build_formatter(value_type, pattern) {
        Ok(formatter) => {
            for row_idx in 0..table.rows().len() {
                let value = table.rows()[row_idx].cells[col_idx].value.clone();
                let formatted = formatter.format(&value);
                table.set_cell(row_idx, col_idx, TableCell::new(value).with_formatted_value(formatted))?;
            }
            Ok(())
        }
        Err(_) => {
            let col_id = table.columns()[col_idx].id.clone();
            table.add_warning(Warning::illegal_formatting_pattern(&col_id));
            Ok(())
        }
    }
}

fn apply_skip_limit(table: DataTable, skip: usize, limit: Option<usize>) -> DataTable {
    let total = table.rows().len();
    let mut rebuilt = DataTable::new().with_locale(table.locale());
    for col in table.columns() {
        rebuilt.add_column(col.clone()).expect("columns are already unique");
    }
    let after_skip: Vec<TableRow> = table.rows().iter().skip(skip).cloned().collect();
    let kept = after_skip.len();
    let limited: Vec<TableRow> = match limit {
        Some(n) => after_skip.into_iter().take(n).collect(),
        None => after_skip,
    };
    for row in &limited {
        rebuilt.add_row(row.cells.clone()).expect("rows already typed");
    }
    for w in table.warnings() {
        rebuilt.add_warning(w.clone());
    }
    let truncated = skip.min(total) > 0 || kept > limited.len();
    if truncated {
        rebuilt.add_warning(Warning::data_truncated());
    }
    rebuilt
}

/// NO_FORMAT is already honored at the point FORMAT patterns would have been
/// applied (the `!query.no_format` guards in `execute_flat`/`execute_aggregated`).
/// NO_VALUES strips all row data, leaving a schema-only table.
fn apply_options(table: &mut DataTable, query: &Query) {
    if query.no_values {
        let mut rebuilt = DataTable::new().with_locale(table.locale());
        for col in table.columns() {
            rebuilt.add_column(col.clone()).expect("columns already unique");
        }
        for w in table.warnings() {
            rebuilt.add_warning(w.clone());
        }
        *table = rebuilt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::AggregationType;
    use crate::filter::{Comparison, ComparisonOp, ComparisonOperand};
    use crate::query::{SortDirection, SortItem};
    use crate::value::ValueType;

    fn sales_table() -> DataTable {
        let mut t = DataTable::new();
        t.add_column(ColumnDescription::new("region", ValueType::Text)).unwrap();
        t.add_column(ColumnDescription::new("year", ValueType::Number)).unwrap();
        t.add_column(ColumnDescription::new("rev", ValueType::Number)).unwrap();
        for (region, year, rev) in [("N", 2020.0, 10.0), ("N", 2021.0, 20.0), ("S", 2020.0, 5.0)] {
            t.add_row(vec![TableCell::new(Value::text(region)), TableCell::new(Value::number(year)), TableCell::new(Value::number(rev))])
                .unwrap();
        }
        t
    }

    #[test]
    fn flat_select_with_where_filters_rows() {
        let table = sales_table();
        let mut query = Query::new(vec![ColumnExpr::simple("region")]);
        query.filter = Some(Filter::Compare(Comparison {
            op: ComparisonOp::Gt,
            left: ComparisonOperand::Column(ColumnExpr::simple("rev")),
            right: ComparisonOperand::Literal(Value::number(8.0)),
        }));
        let result = execute(&query, &table, &EngineConfig::new()).unwrap();
        assert_eq!(result.rows().len(), 2);
    }

    #[test]
    fn group_and_sum_aggregates_per_region() {
        let table = sales_table();
        let mut query = Query::new(vec![ColumnExpr::simple("region"), ColumnExpr::aggregation(ColumnExpr::simple("rev"), AggregationType::Sum)]);
        query.group = vec![ColumnExpr::simple("region")];
        let result = execute(&query, &table, &EngineConfig::new()).unwrap();
        assert_eq!(result.rows().len(), 2);
        let n_row = result.rows().iter().find(|r| r.cells[0].value.as_text() == Some("N")).unwrap();
        assert_eq!(n_row.cells[1].value.as_number(), Some(30.0));
    }

    #[test]
    fn pivot_materializes_one_column_per_distinct_tuple() {
        let table = sales_table();
        let mut query = Query::new(vec![ColumnExpr::simple("region"), ColumnExpr::aggregation(ColumnExpr::simple("rev"), AggregationType::Sum)]);
        query.group = vec![ColumnExpr::simple("region")];
        query.pivot = vec![ColumnExpr::simple("year")];
        let result = execute(&query, &table, &EngineConfig::new()).unwrap();
        assert_eq!(result.columns().len(), 3);
        let n_row = result.rows().iter().find(|r| r.cells[0].value.as_text() == Some("N")).unwrap();
        assert!(n_row.cells[1].value.as_number().is_some());
        assert!(n_row.cells[2].value.as_number().is_some());
        let s_row = result.rows().iter().find(|r| r.cells[0].value.as_text() == Some("S")).unwrap();
        assert!(s_row.cells[2].value.is_null());
    }

    #[test]
    fn limit_truncation_sets_warning() {
        let table = sales_table();
        let mut query = Query::new(vec![ColumnExpr::simple("region")]);
        query.limit = Some(1);
        let result = execute(&query, &table, &EngineConfig::new()).unwrap();
        assert_eq!(result.rows().len(), 1);
        assert!(result.warnings().iter().any(|w| w.reason == crate::table::WarningReason::DataTruncated));
    }

    #[test]
    fn order_by_outside_select_sorts_descending() {
        let table = sales_table();
        let mut query = Query::new(vec![ColumnExpr::simple("region")]);
        query.order_by = vec![SortItem {
            expr: ColumnExpr::simple("rev"),
            direction: SortDirection::Desc,
        }];
        let result = execute(&query, &table, &EngineConfig::new()).unwrap();
        assert_eq!(result.rows()[0].cells[0].value.as_text(), Some("N"));
    }

    #[test]
    fn cancellation_callback_aborts_execution() {
        let table = sales_table();
        let query = Query::new(vec![ColumnExpr::simple("region")]);
        let config = EngineConfig::new().with_cancellation(|| true);
        let err = execute(&query, &table, &config).unwrap_err();
        assert!(matches!(err, EngineError::Cancelled));
    }

    #[test]
    fn aggregation_without_group_over_empty_input_yields_one_row() {
        let table = DataTable::new();
        let mut t = table;
        t.add_column(ColumnDescription::new("x", ValueType::Number)).unwrap();
        let query = Query::new(vec![ColumnExpr::aggregation(ColumnExpr::simple("x"), AggregationType::Sum)]);
        let result = execute(&query, &t, &EngineConfig::new()).unwrap();
        assert_eq!(result.rows().len(), 1);
        assert!(result.rows()[0].cells[0].value.is_null());
    }

    #[test]
    fn format_pattern_populates_formatted_value() {
        let table = sales_table();
        let mut query = Query::new(vec![ColumnExpr::simple("rev")]);
        query.formats.insert(ColumnExpr::simple("rev"), "#,##0.00".to_string());
        let result = execute(&query, &table, &EngineConfig::new()).unwrap();
        assert_eq!(result.rows()[0].cells[0].formatted_value.as_deref(), Some("10.00"));
    }

    #[test]
    fn no_values_strips_rows_but_keeps_schema() {
        let table = sales_table();
        let mut query = Query::new(vec![ColumnExpr::simple("region")]);
        query.no_values = true;
        let result = execute(&query, &table, &EngineConfig::new()).unwrap();
        assert_eq!(result.columns().len(), 1);
        assert_eq!(result.rows().len(), 0);
    }

    fn sales_table_with_dates() -> DataTable {
        let mut t = DataTable::new();
        t.add_column(ColumnDescription::new("region", ValueType::Text)).unwrap();
        t.add_column(ColumnDescription::new("d", ValueType::Date)).unwrap();
        for (region, year) in [("N", 2019), ("N", 2021), ("S", 2020)] {
            t.add_row(vec![
                TableCell::new(Value::text(region)),
                TableCell::new(Value::Date(Some(crate::value::DateValue::new(year, 0, 1).unwrap()))),
            ])
            .unwrap();
        }
        t
    }

    #[test]
    fn scalar_function_over_aggregation_without_group_evaluates_through_generic_lookup() {
        let table = sales_table_with_dates();
        let query = Query::new(vec![ColumnExpr::scalar_function(
            "year",
            vec![ColumnExpr::aggregation(ColumnExpr::simple("d"), AggregationType::Max)],
        )]);
        let result = execute(&query, &table, &EngineConfig::new()).unwrap();
        assert_eq!(result.rows().len(), 1);
        assert_eq!(result.rows()[0].cells[0].value.as_number(), Some(2021.0));
    }

    #[test]
    fn scalar_function_over_aggregation_with_group_evaluates_per_group() {
        let table = sales_table_with_dates();
        let mut query = Query::new(vec![
            ColumnExpr::simple("region"),
            ColumnExpr::scalar_function("year", vec![ColumnExpr::aggregation(ColumnExpr::simple("d"), AggregationType::Max)]),
        ]);
        query.group = vec![ColumnExpr::simple("region")];
        let result = execute(&query, &table, &EngineConfig::new()).unwrap();
        let n_row = result.rows().iter().find(|r| r.cells[0].value.as_text() == Some("N")).unwrap();
        assert_eq!(n_row.cells[1].value.as_number(), Some(2021.0));
        let s_row = result.rows().iter().find(|r| r.cells[0].value.as_text() == Some("S")).unwrap();
        assert_eq!(s_row.cells[1].value.as_number(), Some(2020.0));
    }
}
