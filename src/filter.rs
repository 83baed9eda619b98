//! The WHERE clause: a boolean tree of AND/OR/NOT combinators over
//! comparison leaves.

use regex::Regex;

use crate::column::ColumnExpr;
use crate::error::{EngineError, EngineResult};
use crate::lookup::ColumnLookup;
use crate::table::{DataTable, TableRow};
use crate::value::{Value, ValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    Contains,
    StartsWith,
    EndsWith,
    Matches,
}

/// The right- (or both-) hand side of a comparison leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum ComparisonOperand {
    Column(ColumnExpr),
    Literal(Value),
}

impl ComparisonOperand {
    fn value_type(&self, table: &DataTable) -> EngineResult<ValueType> {
        match self {
            ComparisonOperand::Column(c) => c.value_type(table),
            ComparisonOperand::Literal(v) => Ok(v.value_type()),
        }
    }

    fn eval(&self, row: &TableRow, lookup: &dyn ColumnLookup, value_types: &dyn Fn(&ColumnExpr) -> ValueType) -> EngineResult<Value> {
        match self {
            ComparisonOperand::Column(c) => c.eval(row, lookup, value_types),
            ComparisonOperand::Literal(v) => Ok(v.clone()),
        }
    }

    fn all_simple_column_ids(&self) -> Vec<String> {
        match self {
            ComparisonOperand::Column(c) => c.all_simple_column_ids(),
            ComparisonOperand::Literal(_) => Vec::new(),
        }
    }

    fn to_query_string(&self) -> String {
        match self {
            ComparisonOperand::Column(c) => c.to_query_string(),
            ComparisonOperand::Literal(v) => v.inner_query_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub op: ComparisonOp,
    pub left: ComparisonOperand,
    pub right: ComparisonOperand,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    IsNull(ComparisonOperand),
    Compare(Comparison),
    /// An unconditional leaf, used by value⊙value comparisons constructed
    /// purely for testing per §3.
    True,
}

impl Filter {
    pub fn is_match(&self, row: &TableRow, lookup: &dyn ColumnLookup, value_types: &dyn Fn(&ColumnExpr) -> ValueType) -> EngineResult<bool> {
        match self {
            Filter::And(children) => {
                for c in children {
                    if !c.is_match(row, lookup, value_types)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Filter::Or(children) => {
                for c in children {
                    if c.is_match(row, lookup, value_types)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Filter::Not(inner) => Ok(!inner.is_match(row, lookup, value_types)?),
            Filter::IsNull(operand) => Ok(operand.eval(row, lookup, value_types)?.is_null()),
            Filter::Compare(cmp) => eval_comparison(cmp, row, lookup, value_types),
            Filter::True => Ok(true),
        }
    }

    pub fn all_column_ids(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.walk_operands(&mut |op| out.extend(op.all_simple_column_ids()));
        out
    }

    pub fn scalar_function_columns(&self) -> Vec<ColumnExpr> {
        let mut out = Vec::new();
        self.walk_operands(&mut |op| {
            if let ComparisonOperand::Column(c) = op {
                out.extend(c.all_scalar_function_columns());
            }
        });
        out
    }

    pub fn aggregation_columns(&self) -> Vec<ColumnExpr> {
        let mut out = Vec::new();
        self.walk_operands(&mut |op| {
            if let ComparisonOperand::Column(c) = op {
                out.extend(c.all_aggregation_columns());
            }
        });
        out
    }

    fn walk_operands(&self, f: &mut dyn FnMut(&ComparisonOperand)) {
        match self {
            Filter::And(children) | Filter::Or(children) => {
                for c in children {
                    c.walk_operands(f);
                }
            }
            Filter::Not(inner) => inner.walk_operands(f),
            Filter::IsNull(operand) => f(operand),
            Filter::Compare(cmp) => {
                f(&cmp.left);
                f(&cmp.right);
            }
            Filter::True => {}
        }
    }

    /// Validates that no leaf references an aggregation column (aggregations
    /// are illegal inside WHERE) and that every referenced column/function
    /// type-checks.
    pub fn validate(&self, table: &DataTable) -> EngineResult<()> {
        if !self.aggregation_columns().is_empty() {
            return Err(EngineError::invalid_query("WHERE", "WHERE may not reference aggregation columns"));
        }
        match self {
            Filter::And(children) | Filter::Or(children) => {
                for c in children {
                    c.validate(table)?;
                }
                Ok(())
            }
            Filter::Not(inner) => inner.validate(table),
            Filter::IsNull(operand) => validate_operand(operand, table),
            Filter::Compare(cmp) => {
                validate_operand(&cmp.left, table)?;
                validate_operand(&cmp.right, table)?;
                let lt = cmp.left.value_type(table)?;
                let rt = cmp.right.value_type(table)?;
                validate_comparison_types(cmp.op, lt, rt)
            }
            Filter::True => Ok(()),
        }
    }

    pub fn to_query_string(&self) -> String {
        match self {
            Filter::And(children) => join_bool(children, "AND"),
            Filter::Or(children) => join_bool(children, "OR"),
            Filter::Not(inner) => format!("NOT ({})", inner.to_query_string()),
            Filter::IsNull(operand) => format!("{} IS NULL", operand.to_query_string()),
            Filter::Compare(cmp) => format!(
                "{} {} {}",
                cmp.left.to_query_string(),
                op_token(cmp.op),
                cmp.right.to_query_string()
            ),
            Filter::True => "TRUE".to_string(),
        }
    }
}

fn join_bool(children: &[Filter], joiner: &str) -> String {
    children
        .iter()
        .map(|c| format!("({})", c.to_query_string()))
        .collect::<Vec<_>>()
        .join(&format!(" {joiner} "))
}

fn op_token(op: ComparisonOp) -> &'static str {
    match op {
        ComparisonOp::Eq => "=",
        ComparisonOp::Ne => "!=",
        ComparisonOp::Lt => "<",
        ComparisonOp::Le => "<=",
        ComparisonOp::Gt => ">",
        ComparisonOp::Ge => ">=",
        ComparisonOp::Like => "LIKE",
        ComparisonOp::Contains => "CONTAINS",
        ComparisonOp::StartsWith => "STARTS WITH",
        ComparisonOp::EndsWith => "ENDS WITH",
        ComparisonOp::Matches => "MATCHES",
    }
}

fn validate_operand(operand: &ComparisonOperand, table: &DataTable) -> EngineResult<()> {
    if let ComparisonOperand::Column(c) = operand {
        c.validate(table)?;
    }
    Ok(())
}

fn validate_comparison_types(op: ComparisonOp, lt: ValueType, rt: ValueType) -> EngineResult<()> {
    match op {
        ComparisonOp::Like | ComparisonOp::Contains | ComparisonOp::StartsWith | ComparisonOp::EndsWith | ComparisonOp::Matches => {
            if lt != ValueType::Text || rt != ValueType::Text {
                return Err(EngineError::invalid_query(
                    "WHERE",
                    format!("{op:?} requires TEXT operands, found {lt:?} and {rt:?}"),
                ));
            }
        }
        ComparisonOp::Eq | ComparisonOp::Ne | ComparisonOp::Lt | ComparisonOp::Le | ComparisonOp::Gt | ComparisonOp::Ge => {
            if lt != rt {
                return Err(EngineError::invalid_query(
                    "WHERE",
                    format!("cannot compare {lt:?} with {rt:?}"),
                ));
            }
        }
    }
    Ok(())
}

fn eval_comparison(cmp: &Comparison, row: &TableRow, lookup: &dyn ColumnLookup, value_types: &dyn Fn(&ColumnExpr) -> ValueType) -> EngineResult<bool> {
    let left = cmp.left.eval(row, lookup, value_types)?;
    let right = cmp.right.eval(row, lookup, value_types)?;
    // SQL three-valued logic collapses to false on either side being null.
    if left.is_null() || right.is_null() {
        return Ok(false);
    }
    Ok(match cmp.op {
        ComparisonOp::Eq => left == right,
        ComparisonOp::Ne => left != right,
        ComparisonOp::Lt => left.compare_to(&right, None).is_lt(),
        ComparisonOp::Le => left.compare_to(&right, None).is_le(),
        ComparisonOp::Gt => left.compare_to(&right, None).is_gt(),
        ComparisonOp::Ge => left.compare_to(&right, None).is_ge(),
        ComparisonOp::Like => like_match(left.as_text().unwrap_or(""), right.as_text().unwrap_or("")),
        ComparisonOp::Contains => left.as_text().unwrap_or("").contains(right.as_text().unwrap_or("")),
        ComparisonOp::StartsWith => left.as_text().unwrap_or("").starts_with(right.as_text().unwrap_or("")),
        ComparisonOp::EndsWith => left.as_text().unwrap_or("").ends_with(right.as_text().unwrap_or("")),
        ComparisonOp::Matches => matches_regex(left.as_text().unwrap_or(""), right.as_text().unwrap_or(""))?,
    })
}

/// Translates a SQL `LIKE` pattern (`%` = any run, `_` = one char) into an
/// anchored regex and matches it. Not cached across rows: the pattern is
/// usually a literal, and matching a table's worth of rows against one WHERE
/// clause is still O(rows), not O(rows²).
fn like_match(text: &str, pattern: &str) -> bool {
    let mut regex_str = String::from("^");
    for c in pattern.chars() {
        match c {
            '%' => regex_str.push_str(".*"),
            '_' => regex_str.push('.'),
            other => regex_str.push_str(&regex::escape(&other.to_string())),
        }
    }
    regex_str.push('$');
    Regex::new(&regex_str).map(|re| re.is_match(text)).unwrap_or(false)
}

fn matches_regex(text: &str, pattern: &str) -> EngineResult<bool> {
    let anchored = format!("^(?:{pattern})$");
    let re = Regex::new(&anchored).map_err(|e| EngineError::invalid_query("WHERE", format!("invalid MATCHES pattern: {e}")))?;
    Ok(re.is_match(text))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::table::{ColumnDescription, TableCell};

    fn row_with_text(s: &str) -> (DataTable, TableRow, usize) {
        let mut t = DataTable::new();
        t.add_column(ColumnDescription::new("s", ValueType::Text)).unwrap();
        t.add_row(vec![TableCell::new(Value::text(s))]).unwrap();
        let row = t.rows()[0].clone();
        (t, row, 0)
    }

    #[rstest]
    #[case("application", "app%", true)]
    #[case("apple", "app%", true)]
    #[case("banana", "app%", false)]
    #[case("cat", "c_t", true)]
    #[case("ct", "c_t", false)]
    fn like_translates_sql_wildcards(#[case] text: &str, #[case] pattern: &str, #[case] expected: bool) {
        assert_eq!(like_match(text, pattern), expected);
    }

    #[test]
    fn comparison_with_null_is_false() {
        let (t, row, _idx) = row_with_text("apple");
        let lookup = crate::lookup::DataTableColumnLookup::new(&t);
        let cmp = Comparison {
            op: ComparisonOp::Eq,
            left: ComparisonOperand::Column(ColumnExpr::simple("s")),
            right: ComparisonOperand::Literal(Value::null_of(ValueType::Text)),
        };
        let filter = Filter::Compare(cmp);
        let result = filter.is_match(&row, &lookup, &|e| e.value_type(&t).unwrap()).unwrap();
        assert!(!result);
    }

    #[test]
    fn where_rejects_aggregation_column() {
        let mut t = DataTable::new();
        t.add_column(ColumnDescription::new("a", ValueType::Number)).unwrap();
        let filter = Filter::Compare(Comparison {
            op: ComparisonOp::Gt,
            left: ComparisonOperand::Column(ColumnExpr::aggregation(ColumnExpr::simple("a"), crate::column::AggregationType::Sum)),
            right: ComparisonOperand::Literal(Value::number(1.0)),
        });
        assert!(filter.validate(&t).is_err());
    }

    #[test]
    fn string_operator_requires_text_operands() {
        let mut t = DataTable::new();
        t.add_column(ColumnDescription::new("n", ValueType::Number)).unwrap();
        let filter = Filter::Compare(Comparison {
            op: ComparisonOp::Like,
            left: ComparisonOperand::Column(ColumnExpr::simple("n")),
            right: ComparisonOperand::Literal(Value::text("x%")),
        });
        assert!(filter.validate(&t).is_err());
    }
}
