//! The built-in per-cell scalar function catalog: arithmetic, date parts,
//! date-diff, date truncation and text helpers. The catalog is an immutable,
//! process-wide registry, mirroring how the teacher repo treats its static
//! keyword/type tables as data rather than hand-rolled `match` ladders spread
//! across call sites.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::error::{EngineError, EngineResult};
use crate::value::{DateValue, Value, ValueType};

/// Fixed or open-ended argument count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    AtLeast(usize),
}

impl Arity {
    fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Fixed(k) => n == k,
            Arity::AtLeast(k) => n >= k,
        }
    }

    fn describe(self) -> String {
        match self {
            Arity::Fixed(k) => format!("{k} argument(s)"),
            Arity::AtLeast(k) => format!("at least {k} argument(s)"),
        }
    }
}

/// A single entry in the scalar function catalog.
pub trait ScalarFunction: Send + Sync {
    fn name(&self) -> &'static str;
    fn arity(&self) -> Arity;

    /// Validates argument types for a single call; independent of any row.
    fn validate_args(&self, arg_types: &[ValueType]) -> EngineResult<()>;

    /// The return type given argument types (assumed already validated).
    fn return_type(&self, arg_types: &[ValueType]) -> ValueType;

    /// Evaluates over concrete argument values. Implementations may rely on
    /// [`evaluate_scalar`] having already short-circuited the any-null case.
    fn evaluate_non_null(&self, args: &[Value]) -> EngineResult<Value>;
}

/// Runs a function's null-propagation rule, then delegates to its
/// implementation. Every catalog function documents no exception to "any
/// null argument yields a typed null result", so this is applied uniformly.
pub fn evaluate_scalar(f: &dyn ScalarFunction, arg_types: &[ValueType], args: &[Value]) -> EngineResult<Value> {
    if args.iter().any(Value::is_null) {
        return Ok(Value::null_of(f.return_type(arg_types)));
    }
    f.evaluate_non_null(args)
}

fn require_types(name: &str, arg_types: &[ValueType], expected: &[ValueType]) -> EngineResult<()> {
    if arg_types.len() != expected.len() {
        return Err(EngineError::invalid_query(
            "SELECT",
            format!("{name} expects {} argument(s), got {}", expected.len(), arg_types.len()),
        ));
    }
    Ok(())
}

fn require_number(name: &str, arg_types: &[ValueType]) -> EngineResult<()> {
    for t in arg_types {
        if *t != ValueType::Number {
            return Err(EngineError::invalid_query(
                "SELECT",
                format!("{name} requires NUMBER arguments, found {t:?}"),
            ));
        }
    }
    Ok(())
}

fn require_one_of(name: &str, t: ValueType, allowed: &[ValueType]) -> EngineResult<()> {
    if !allowed.contains(&t) {
        return Err(EngineError::invalid_query(
            "SELECT",
            format!("{name} does not accept {t:?}; expected one of {allowed:?}"),
        ));
    }
    Ok(())
}

macro_rules! binary_arith {
    ($struct_name:ident, $fn_name:literal, $op:expr) => {
        struct $struct_name;
        impl ScalarFunction for $struct_name {
            fn name(&self) -> &'static str {
                $fn_name
            }
            fn arity(&self) -> Arity {
                Arity::Fixed(2)
            }
            fn validate_args(&self, arg_types: &[ValueType]) -> EngineResult<()> {
                require_types($fn_name, arg_types, &[ValueType::Number, ValueType::Number])?;
                require_number($fn_name, arg_types)
            }
            fn return_type(&self, _arg_types: &[ValueType]) -> ValueType {
                ValueType::Number
            }
            fn evaluate_non_null(&self, args: &[Value]) -> EngineResult<Value> {
                let a = args[0].as_number().expect("validated NUMBER");
                let b = args[1].as_number().expect("validated NUMBER");
                Ok(Value::number(($op)(a, b)))
            }
        }
    };
}

binary_arith!(SumFn, "sum", |a: f64, b: f64| a + b);
binary_arith!(DifferenceFn, "difference", |a: f64, b: f64| a - b);
binary_arith!(ProductFn, "product", |a: f64, b: f64| a * b);
binary_arith!(QuotientFn, "quotient", |a: f64, b: f64| if b == 0.0 { f64::NAN } else { a / b });
binary_arith!(ModuloFn, "modulo", |a: f64, b: f64| a % b);

macro_rules! date_part {
    ($struct_name:ident, $fn_name:literal, $allowed:expr, $extract:expr) => {
        struct $struct_name;
        impl ScalarFunction for $struct_name {
            fn name(&self) -> &'static str {
                $fn_name
            }
            fn arity(&self) -> Arity {
                Arity::Fixed(1)
            }
            fn validate_args(&self, arg_types: &[ValueType]) -> EngineResult<()> {
                if arg_types.len() != 1 {
                    return Err(EngineError::invalid_query(
                        "SELECT",
                        format!("{} expects 1 argument, got {}", $fn_name, arg_types.len()),
                    ));
                }
                require_one_of($fn_name, arg_types[0], $allowed)
            }
            fn return_type(&self, _arg_types: &[ValueType]) -> ValueType {
                ValueType::Number
            }
            fn evaluate_non_null(&self, args: &[Value]) -> EngineResult<Value> {
                Ok(Value::number(($extract)(&args[0])))
            }
        }
    };
}

const DATE_TYPES: &[ValueType] = &[ValueType::Date, ValueType::DateTime];
const TIME_TYPES: &[ValueType] = &[ValueType::TimeOfDay, ValueType::DateTime];

date_part!(YearFn, "year", DATE_TYPES, |v: &Value| v.as_date().unwrap().year as f64);
date_part!(MonthFn, "month", DATE_TYPES, |v: &Value| v.as_date().unwrap().month as f64);
date_part!(DayFn, "day", DATE_TYPES, |v: &Value| v.as_date().unwrap().day as f64);
date_part!(QuarterFn, "quarter", DATE_TYPES, |v: &Value| v.as_date().unwrap().quarter() as f64);
date_part!(DayOfWeekFn, "dayOfWeek", DATE_TYPES, |v: &Value| v
    .as_date()
    .unwrap()
    .day_of_week() as f64);
date_part!(HourFn, "hour", TIME_TYPES, |v: &Value| v.as_time_of_day().unwrap().hour as f64);
date_part!(MinuteFn, "minute", TIME_TYPES, |v: &Value| v
    .as_time_of_day()
    .unwrap()
    .minute as f64);
date_part!(SecondFn, "second", TIME_TYPES, |v: &Value| v
    .as_time_of_day()
    .unwrap()
    .second as f64);
date_part!(MillisecondFn, "millisecond", TIME_TYPES, |v: &Value| v
    .as_time_of_day()
    .unwrap()
    .millisecond as f64);

struct DateDiffFn;
impl ScalarFunction for DateDiffFn {
    fn name(&self) -> &'static str {
        "dateDiff"
    }
    fn arity(&self) -> Arity {
        Arity::Fixed(2)
    }
    fn validate_args(&self, arg_types: &[ValueType]) -> EngineResult<()> {
        if arg_types.len() != 2 {
            return Err(EngineError::invalid_query(
                "SELECT",
                format!("dateDiff expects 2 arguments, got {}", arg_types.len()),
            ));
        }
        require_one_of("dateDiff", arg_types[0], DATE_TYPES)?;
        require_one_of("dateDiff", arg_types[1], DATE_TYPES)
    }
    fn return_type(&self, _arg_types: &[ValueType]) -> ValueType {
        ValueType::Number
    }
    fn evaluate_non_null(&self, args: &[Value]) -> EngineResult<Value> {
        let a = args[0].as_date().expect("validated DATE/DATETIME");
        let b = args[1].as_date().expect("validated DATE/DATETIME");
        let days = naive(a).signed_duration_since(naive(b)).num_days();
        Ok(Value::number(days as f64))
    }
}

fn naive(d: DateValue) -> chrono::NaiveDate {
    chrono::NaiveDate::from_ymd_opt(d.year, d.month + 1, d.day).expect("DateValue was validated at construction")
}

struct ToDateFn;
impl ScalarFunction for ToDateFn {
    fn name(&self) -> &'static str {
        "toDate"
    }
    fn arity(&self) -> Arity {
        Arity::Fixed(1)
    }
    fn validate_args(&self, arg_types: &[ValueType]) -> EngineResult<()> {
        if arg_types.len() != 1 {
            return Err(EngineError::invalid_query(
                "SELECT",
                format!("toDate expects 1 argument, got {}", arg_types.len()),
            ));
        }
        require_one_of("toDate", arg_types[0], &[ValueType::Date, ValueType::DateTime, ValueType::Number])
    }
    fn return_type(&self, _arg_types: &[ValueType]) -> ValueType {
        ValueType::Date
    }
    fn evaluate_non_null(&self, args: &[Value]) -> EngineResult<Value> {
        match &args[0] {
            Value::Date(d) => Ok(Value::Date(*d)),
            Value::DateTime(dt) => Ok(Value::Date(dt.map(|v| v.date))),
            Value::Number(Some(millis)) => {
                let dt = crate::value::DateTimeValue::from_millis_since_epoch(*millis as i64)?;
                Ok(Value::Date(Some(dt.date)))
            }
            other => Err(EngineError::Internal(format!("toDate called with {:?}", other.value_type()))),
        }
    }
}

macro_rules! text_unary {
    ($struct_name:ident, $fn_name:literal, $op:expr) => {
        struct $struct_name;
        impl ScalarFunction for $struct_name {
            fn name(&self) -> &'static str {
                $fn_name
            }
            fn arity(&self) -> Arity {
                Arity::Fixed(1)
            }
            fn validate_args(&self, arg_types: &[ValueType]) -> EngineResult<()> {
                require_types($fn_name, arg_types, &[ValueType::Text])
            }
            fn return_type(&self, _arg_types: &[ValueType]) -> ValueType {
                ValueType::Text
            }
            fn evaluate_non_null(&self, args: &[Value]) -> EngineResult<Value> {
                let s = args[0].as_text().expect("validated TEXT");
                Ok(Value::text(($op)(s)))
            }
        }
    };
}

text_unary!(LowerFn, "lower", |s: &str| s.to_lowercase());
text_unary!(UpperFn, "upper", |s: &str| s.to_uppercase());

struct ConcatFn;
impl ScalarFunction for ConcatFn {
    fn name(&self) -> &'static str {
        "concat"
    }
    fn arity(&self) -> Arity {
        Arity::AtLeast(1)
    }
    fn validate_args(&self, arg_types: &[ValueType]) -> EngineResult<()> {
        if arg_types.is_empty() {
            return Err(EngineError::invalid_query("SELECT", "concat requires at least 1 argument"));
        }
        for t in arg_types {
            require_one_of("concat", *t, &[ValueType::Text])?;
        }
        Ok(())
    }
    fn return_type(&self, _arg_types: &[ValueType]) -> ValueType {
        ValueType::Text
    }
    fn evaluate_non_null(&self, args: &[Value]) -> EngineResult<Value> {
        let mut out = String::new();
        for a in args {
            out.push_str(a.as_text().expect("validated TEXT"));
        }
        Ok(Value::text(out))
    }
}

fn build_catalog() -> HashMap<&'static str, Box<dyn ScalarFunction>> {
    let mut m: HashMap<&'static str, Box<dyn ScalarFunction>> = HashMap::new();
    macro_rules! register {
        ($f:expr) => {
            let f = Box::new($f);
            m.insert(f.name(), f as Box<dyn ScalarFunction>);
        };
    }
    register!(SumFn);
    register!(DifferenceFn);
    register!(ProductFn);
    register!(QuotientFn);
    register!(ModuloFn);
    register!(YearFn);
    register!(MonthFn);
    register!(DayFn);
    register!(QuarterFn);
    register!(DayOfWeekFn);
    register!(HourFn);
    register!(MinuteFn);
    register!(SecondFn);
    register!(MillisecondFn);
    register!(DateDiffFn);
    register!(ToDateFn);
    register!(LowerFn);
    register!(UpperFn);
    register!(ConcatFn);
    m
}

static CATALOG: OnceLock<HashMap<&'static str, Box<dyn ScalarFunction>>> = OnceLock::new();

/// Looks up a scalar function by its query-string name (case sensitive,
/// matching the spelling used in the grammar, e.g. `dayOfWeek`).
pub fn lookup(name: &str) -> Option<&'static dyn ScalarFunction> {
    CATALOG.get_or_init(build_catalog).get(name).map(|b| b.as_ref())
}

pub fn arity_error(name: &str, arity: Arity, got: usize) -> EngineError {
    if arity.accepts(got) {
        EngineError::Internal(format!("arity_error called with a valid count for {name}"))
    } else {
        EngineError::invalid_query("SELECT", format!("{name} expects {}, got {got}", arity.describe()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{DateValue, TimeOfDayValue};

    #[test]
    fn quotient_by_zero_is_nan_not_error() {
        let f = lookup("quotient").unwrap();
        let result = evaluate_scalar(f, &[ValueType::Number, ValueType::Number], &[Value::number(5.0), Value::number(0.0)]).unwrap();
        assert!(result.as_number().unwrap().is_nan());
    }

    #[test]
    fn null_argument_propagates_typed_null() {
        let f = lookup("sum").unwrap();
        let result = evaluate_scalar(
            f,
            &[ValueType::Number, ValueType::Number],
            &[Value::Number(None), Value::number(2.0)],
        )
        .unwrap();
        assert!(result.is_null());
        assert_eq!(result.value_type(), ValueType::Number);
    }

    #[test]
    fn month_is_zero_based() {
        let f = lookup("month").unwrap();
        let d = Value::Date(Some(DateValue::new(2020, 2, 15).unwrap()));
        let result = evaluate_scalar(f, &[ValueType::Date], std::slice::from_ref(&d)).unwrap();
        assert_eq!(result.as_number(), Some(2.0));
    }

    #[test]
    fn date_diff_counts_whole_days() {
        let f = lookup("dateDiff").unwrap();
        let a = Value::Date(Some(DateValue::new(2020, 0, 10).unwrap()));
        let b = Value::Date(Some(DateValue::new(2020, 0, 1).unwrap()));
        let result = evaluate_scalar(f, &[ValueType::Date, ValueType::Date], &[a, b]).unwrap();
        assert_eq!(result.as_number(), Some(9.0));
    }

    #[test]
    fn hour_rejects_date_only_value() {
        let f = lookup("hour").unwrap();
        assert!(f.validate_args(&[ValueType::Date]).is_err());
        assert!(f.validate_args(&[ValueType::TimeOfDay]).is_ok());
    }

    #[test]
    fn concat_requires_at_least_one_text_arg() {
        let f = lookup("concat").unwrap();
        assert!(f.validate_args(&[]).is_err());
        assert!(f.validate_args(&[ValueType::Text, ValueType::Text]).is_ok());
        let result = evaluate_scalar(
            f,
            &[ValueType::Text, ValueType::Text],
            &[Value::text("foo"), Value::text("bar")],
        )
        .unwrap();
        assert_eq!(result.as_text(), Some("foobar"));
    }

    #[test]
    fn to_date_truncates_datetime() {
        let f = lookup("toDate").unwrap();
        let dt = Value::DateTime(Some(crate::value::DateTimeValue::new(
            DateValue::new(2021, 6, 1).unwrap(),
            TimeOfDayValue::new(10, 30, 0, 0).unwrap(),
        )));
        let result = evaluate_scalar(f, &[ValueType::DateTime], std::slice::from_ref(&dt)).unwrap();
        assert_eq!(result.value_type(), ValueType::Date);
    }
}
