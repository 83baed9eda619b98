//! Column expressions: the three-variant AST node that appears in SELECT,
//! GROUP, PIVOT, ORDER BY, LABELS and FORMATS, and as leaves inside filters.

use crate::error::{EngineError, EngineResult};
use crate::lookup::ColumnLookup;
use crate::scalar::{self, evaluate_scalar};
use crate::table::{DataTable, TableRow};
use crate::value::{Value, ValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
pub enum AggregationType {
    #[strum(serialize = "SUM")]
    Sum,
    #[strum(serialize = "COUNT")]
    Count,
    #[strum(serialize = "MIN")]
    Min,
    #[strum(serialize = "MAX")]
    Max,
    #[strum(serialize = "AVG")]
    Avg,
}

/// A node of the column-expression AST. Equality and hashing are structural:
/// two expressions are equal iff they denote the same computation, which is
/// what lets them serve as keys in [`crate::lookup::GenericColumnLookup`] and
/// the LABELS/FORMATS maps.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnExpr {
    Simple(String),
    Aggregation(Box<ColumnExpr>, AggregationType),
    ScalarFunction(String, Vec<ColumnExpr>),
}

impl ColumnExpr {
    pub fn simple(id: impl Into<String>) -> Self {
        ColumnExpr::Simple(id.into())
    }

    pub fn aggregation(inner: ColumnExpr, agg: AggregationType) -> Self {
        ColumnExpr::Aggregation(Box::new(inner), agg)
    }

    pub fn scalar_function(name: impl Into<String>, args: Vec<ColumnExpr>) -> Self {
        ColumnExpr::ScalarFunction(name.into(), args)
    }

    /// A deterministic derived identifier, e.g. `sum-x` or `year-x`.
    pub fn id(&self) -> String {
        match self {
            ColumnExpr::Simple(id) => id.clone(),
            ColumnExpr::Aggregation(inner, agg) => {
                format!("{}-{}", agg.to_string().to_lowercase(), inner.id())
            }
            ColumnExpr::ScalarFunction(name, args) => {
                let arg_ids: Vec<String> = args.iter().map(ColumnExpr::id).collect();
                format!("{}-{}", name, arg_ids.join("-"))
            }
        }
    }

    pub fn all_simple_column_ids(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_simple_ids(&mut out);
        out
    }

    fn collect_simple_ids(&self, out: &mut Vec<String>) {
        match self {
            ColumnExpr::Simple(id) => out.push(id.clone()),
            ColumnExpr::Aggregation(inner, _) => inner.collect_simple_ids(out),
            ColumnExpr::ScalarFunction(_, args) => {
                for a in args {
                    a.collect_simple_ids(out);
                }
            }
        }
    }

    pub fn all_simple_columns(&self) -> Vec<ColumnExpr> {
        let mut out = Vec::new();
        self.collect(&mut out, &|e| matches!(e, ColumnExpr::Simple(_)));
        out
    }

    pub fn all_aggregation_columns(&self) -> Vec<ColumnExpr> {
        let mut out = Vec::new();
        self.collect(&mut out, &|e| matches!(e, ColumnExpr::Aggregation(..)));
        out
    }

    pub fn all_scalar_function_columns(&self) -> Vec<ColumnExpr> {
        let mut out = Vec::new();
        self.collect(&mut out, &|e| matches!(e, ColumnExpr::ScalarFunction(..)));
        out
    }

    fn collect(&self, out: &mut Vec<ColumnExpr>, pred: &dyn Fn(&ColumnExpr) -> bool) {
        if pred(self) {
            out.push(self.clone());
        }
        match self {
            ColumnExpr::Simple(_) => {}
            ColumnExpr::Aggregation(inner, _) => inner.collect(out, pred),
            ColumnExpr::ScalarFunction(_, args) => {
                for a in args {
                    a.collect(out, pred);
                }
            }
        }
    }

    /// Arity/type validation, independent of any row.
    pub fn validate(&self, table: &DataTable) -> EngineResult<()> {
        match self {
            ColumnExpr::Simple(id) => {
                table
                    .column(id)
                    .ok_or_else(|| EngineError::invalid_query("SELECT", format!("unknown column '{id}'")))?;
                Ok(())
            }
            ColumnExpr::Aggregation(inner, agg) => {
                let ColumnExpr::Simple(_) = inner.as_ref() else {
                    return Err(EngineError::invalid_query(
                        "SELECT",
                        "aggregation functions may only wrap a simple column",
                    ));
                };
                inner.validate(table)?;
                let inner_type = inner.value_type(table)?;
                if matches!(agg, AggregationType::Sum | AggregationType::Avg) && inner_type != ValueType::Number {
                    return Err(EngineError::invalid_query(
                        "SELECT",
                        format!("{agg} requires a NUMBER column, '{}' is {inner_type:?}", inner.id()),
                    ));
                }
                Ok(())
            }
            ColumnExpr::ScalarFunction(name, args) => {
                for a in args {
                    a.validate(table)?;
                }
                let f = scalar::lookup(name)
                    .ok_or_else(|| EngineError::invalid_query("SELECT", format!("unknown function '{name}'")))?;
                if !arity_accepts(f.arity(), args.len()) {
                    return Err(scalar::arity_error(name, f.arity(), args.len()));
                }
                let arg_types = args
                    .iter()
                    .map(|a| a.value_type(table))
                    .collect::<EngineResult<Vec<_>>>()?;
                f.validate_args(&arg_types)
            }
        }
    }

    /// The type this expression evaluates to; SUM/COUNT/AVG of a numeric
    /// column is NUMBER, MIN/MAX preserve the inner type.
    pub fn value_type(&self, table: &DataTable) -> EngineResult<ValueType> {
        match self {
            ColumnExpr::Simple(id) => table
                .column(id)
                .map(|c| c.value_type)
                .ok_or_else(|| EngineError::invalid_query("SELECT", format!("unknown column '{id}'"))),
            ColumnExpr::Aggregation(inner, agg) => {
                let inner_type = inner.value_type(table)?;
                Ok(match agg {
                    AggregationType::Sum | AggregationType::Count | AggregationType::Avg => ValueType::Number,
                    AggregationType::Min | AggregationType::Max => inner_type,
                })
            }
            ColumnExpr::ScalarFunction(name, args) => {
                let f = scalar::lookup(name)
                    .ok_or_else(|| EngineError::invalid_query("SELECT", format!("unknown function '{name}'")))?;
                let arg_types = args
                    .iter()
                    .map(|a| a.value_type(table))
                    .collect::<EngineResult<Vec<_>>>()?;
                Ok(f.return_type(&arg_types))
            }
        }
    }

    /// Evaluates this expression at `row` using `lookup` to resolve indices.
    /// `value_types` supplies each scalar-function argument's declared type
    /// so null-propagation can produce a correctly typed null.
    pub fn eval(&self, row: &TableRow, lookup: &dyn ColumnLookup, value_types: &dyn Fn(&ColumnExpr) -> ValueType) -> EngineResult<Value> {
        match self {
            ColumnExpr::Simple(_) | ColumnExpr::Aggregation(..) => {
                let idx = lookup.index_of(self)?;
                Ok(row.cells[idx].value.clone())
            }
            ColumnExpr::ScalarFunction(name, args) => {
                let f = scalar::lookup(name)
                    .ok_or_else(|| EngineError::invalid_query("SELECT", format!("unknown function '{name}'")))?;
                let arg_values = args
                    .iter()
                    .map(|a| a.eval(row, lookup, value_types))
                    .collect::<EngineResult<Vec<_>>>()?;
                let arg_types: Vec<ValueType> = args.iter().map(|a| value_types(a)).collect();
                evaluate_scalar(f, &arg_types, &arg_values)
            }
        }
    }

    pub fn to_query_string(&self) -> String {
        match self {
            ColumnExpr::Simple(id) => format!("`{id}`"),
            ColumnExpr::Aggregation(inner, agg) => format!("{agg}({})", inner.to_query_string()),
            ColumnExpr::ScalarFunction(name, args) => {
                let arg_strs: Vec<String> = args.iter().map(ColumnExpr::to_query_string).collect();
                format!("{name}({})", arg_strs.join(", "))
            }
        }
    }
}

fn arity_accepts(arity: scalar::Arity, n: usize) -> bool {
    match arity {
        scalar::Arity::Fixed(k) => n == k,
        scalar::Arity::AtLeast(k) => n >= k,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ColumnDescription;

    fn table_with_number(id: &str) -> DataTable {
        let mut t = DataTable::new();
        t.add_column(ColumnDescription::new(id, ValueType::Number)).unwrap();
        t
    }

    #[test]
    fn derived_id_is_deterministic() {
        let expr = ColumnExpr::aggregation(ColumnExpr::simple("x"), AggregationType::Sum);
        assert_eq!(expr.id(), "sum-x");
        let year = ColumnExpr::scalar_function("year", vec![ColumnExpr::simple("d")]);
        assert_eq!(year.id(), "year-d");
    }

    #[test]
    fn sum_over_text_column_fails_validation() {
        let mut t = DataTable::new();
        t.add_column(ColumnDescription::new("a", ValueType::Text)).unwrap();
        let expr = ColumnExpr::aggregation(ColumnExpr::simple("a"), AggregationType::Sum);
        assert!(expr.validate(&t).is_err());
    }

    #[test]
    fn min_max_preserve_inner_type() {
        let mut t = DataTable::new();
        t.add_column(ColumnDescription::new("d", ValueType::Date)).unwrap();
        let expr = ColumnExpr::aggregation(ColumnExpr::simple("d"), AggregationType::Min);
        assert_eq!(expr.value_type(&t).unwrap(), ValueType::Date);
    }

    #[test]
    fn scalar_function_arity_is_checked() {
        let t = table_with_number("a");
        let expr = ColumnExpr::scalar_function("lower", vec![ColumnExpr::simple("a")]);
        assert!(expr.validate(&t).is_err());
    }

    #[test]
    fn to_query_string_round_trips_shape() {
        let expr = ColumnExpr::aggregation(ColumnExpr::simple("x"), AggregationType::Sum);
        assert_eq!(expr.to_query_string(), "SUM(`x`)");
    }

    #[test]
    fn structural_equality_ignores_construction_path() {
        let a = ColumnExpr::scalar_function("year", vec![ColumnExpr::simple("d")]);
        let b = ColumnExpr::ScalarFunction("year".to_string(), vec![ColumnExpr::Simple("d".to_string())]);
        assert_eq!(a, b);
    }
}
