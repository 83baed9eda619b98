//! The typed, possibly-null cell datum that flows through every stage of the
//! engine. A [`Value`] never changes variant after construction; each variant
//! owns a distinguished null instance produced by [`Value::null_of`].

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::error::{EngineError, EngineResult};

/// The six cell types known to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum ValueType {
    Text,
    Number,
    Boolean,
    Date,
    TimeOfDay,
    DateTime,
}

/// Calendar date, month is 0-based (January = 0) per the external query-string
/// grammar; validated at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateValue {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl DateValue {
    pub fn new(year: i32, month: u32, day: u32) -> EngineResult<Self> {
        if month > 11 {
            return Err(EngineError::invalid_query(
                "VALUE",
                format!("month {month} out of range 0-11"),
            ));
        }
        NaiveDate::from_ymd_opt(year, month + 1, day).ok_or_else(|| {
            EngineError::invalid_query("VALUE", format!("invalid date {year}-{month}-{day}"))
        })?;
        Ok(DateValue { year, month, day })
    }

    fn to_naive_date(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month + 1, self.day)
            .expect("DateValue was validated at construction")
    }

    fn from_naive_date(d: NaiveDate) -> Self {
        DateValue {
            year: d.year(),
            month: d.month0(),
            day: d.day(),
        }
    }

    pub fn quarter(self) -> u32 {
        self.month / 3
    }

    /// ISO day-of-week number, Sunday = 0 .. Saturday = 6, matching the
    /// conventional SQL `DAYOFWEEK` semantics.
    pub fn day_of_week(self) -> u32 {
        self.to_naive_date().weekday().num_days_from_sunday()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDayValue {
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub millisecond: u32,
}

impl TimeOfDayValue {
    pub fn new(hour: u32, minute: u32, second: u32, millisecond: u32) -> EngineResult<Self> {
        if hour > 23 || minute > 59 || second > 59 || millisecond > 999 {
            return Err(EngineError::invalid_query(
                "VALUE",
                format!("time-of-day fields out of range {hour}:{minute}:{second}.{millisecond}"),
            ));
        }
        Ok(TimeOfDayValue {
            hour,
            minute,
            second,
            millisecond,
        })
    }

    fn to_naive_time(self) -> NaiveTime {
        NaiveTime::from_hms_milli_opt(self.hour, self.minute, self.second, self.millisecond)
            .expect("TimeOfDayValue was validated at construction")
    }

    fn from_naive_time(t: NaiveTime) -> Self {
        TimeOfDayValue {
            hour: t.hour(),
            minute: t.minute(),
            second: t.second(),
            millisecond: t.nanosecond() / 1_000_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateTimeValue {
    pub date: DateValue,
    pub time: TimeOfDayValue,
}

impl DateTimeValue {
    pub fn new(date: DateValue, time: TimeOfDayValue) -> Self {
        DateTimeValue { date, time }
    }

    fn to_naive_datetime(self) -> NaiveDateTime {
        NaiveDateTime::new(self.date.to_naive_date(), self.time.to_naive_time())
    }

    /// Construct from a GMT/UTC calendar; rejects anything else, matching the
    /// source system's refusal to accept non-GMT calendars.
    pub fn from_millis_since_epoch(millis: i64) -> EngineResult<Self> {
        let dt = chrono::DateTime::from_timestamp_millis(millis).ok_or_else(|| {
            EngineError::invalid_query("VALUE", format!("{millis} is not a valid epoch millisecond"))
        })?;
        let naive = dt.naive_utc();
        Ok(DateTimeValue {
            date: DateValue::from_naive_date(naive.date()),
            time: TimeOfDayValue::from_naive_time(naive.time()),
        })
    }
}

/// A typed, possibly-null cell value. `None` is the variant's null instance;
/// for `Number`, `Some(f64::NAN)` is a distinct non-null value (quotient by
/// zero yields NaN, not null).
#[derive(Debug, Clone)]
pub enum Value {
    Text(Option<String>),
    Number(Option<f64>),
    Boolean(Option<bool>),
    Date(Option<DateValue>),
    TimeOfDay(Option<TimeOfDayValue>),
    DateTime(Option<DateTimeValue>),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Text(_) => ValueType::Text,
            Value::Number(_) => ValueType::Number,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Date(_) => ValueType::Date,
            Value::TimeOfDay(_) => ValueType::TimeOfDay,
            Value::DateTime(_) => ValueType::DateTime,
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            Value::Text(v) => v.is_none(),
            Value::Number(v) => v.is_none(),
            Value::Boolean(v) => v.is_none(),
            Value::Date(v) => v.is_none(),
            Value::TimeOfDay(v) => v.is_none(),
            Value::DateTime(v) => v.is_none(),
        }
    }

    pub fn null_of(value_type: ValueType) -> Value {
        match value_type {
            ValueType::Text => Value::Text(None),
            ValueType::Number => Value::Number(None),
            ValueType::Boolean => Value::Boolean(None),
            ValueType::Date => Value::Date(None),
            ValueType::TimeOfDay => Value::TimeOfDay(None),
            ValueType::DateTime => Value::DateTime(None),
        }
    }

    pub fn text(s: impl Into<String>) -> Value {
        Value::Text(Some(s.into()))
    }

    pub fn number(n: f64) -> Value {
        // -0.0 == 0.0 under IEEE equality but the two have distinct bit
        // patterns; canonicalize so Eq/Ord/Hash agree on a single value.
        let n = if n == 0.0 { 0.0 } else { n };
        Value::Number(Some(n))
    }

    pub fn boolean(b: bool) -> Value {
        Value::Boolean(Some(b))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(Some(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => *n,
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => *b,
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateValue> {
        match self {
            Value::Date(d) => *d,
            Value::DateTime(Some(dt)) => Some(dt.date),
            _ => None,
        }
    }

    pub fn as_time_of_day(&self) -> Option<TimeOfDayValue> {
        match self {
            Value::TimeOfDay(t) => *t,
            Value::DateTime(Some(dt)) => Some(dt.time),
            _ => None,
        }
    }

    /// Total ordering within a type. `other` must share this value's type;
    /// callers (filter, sort, aggregation tree) only ever compare same-typed
    /// values because query validation rejects cross-type comparisons before
    /// execution. `collator` is consulted for TEXT when locale-sensitive
    /// ordering was requested; `None` falls back to codepoint order.
    pub fn compare_to(&self, other: &Value, collator: Option<&dyn Fn(&str, &str) -> Ordering>) -> Ordering {
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => match (a, b) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(a), Some(b)) => match collator {
                    Some(f) => f(a, b),
                    None => a.cmp(b),
                },
            },
            (Value::Number(a), Value::Number(b)) => match (a, b) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(a), Some(b)) => a.total_cmp(b),
            },
            (Value::Boolean(a), Value::Boolean(b)) => match (a, b) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(a), Some(b)) => a.cmp(b),
            },
            (Value::Date(a), Value::Date(b)) => cmp_option(a, b),
            (Value::TimeOfDay(a), Value::TimeOfDay(b)) => cmp_option(a, b),
            (Value::DateTime(a), Value::DateTime(b)) => cmp_option(a, b),
            _ => panic!(
                "compare_to called on mismatched types: {:?} vs {:?}",
                self.value_type(),
                other.value_type()
            ),
        }
    }

    /// Reverse-parseable literal, e.g. `"hi"`, `42`, `date '2020-03-15'`.
    pub fn inner_query_string(&self) -> String {
        match self {
            Value::Text(None) => "null".to_string(),
            Value::Text(Some(s)) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            Value::Number(None) => "null".to_string(),
            Value::Number(Some(n)) if n.is_nan() => "NaN".to_string(),
            Value::Number(Some(n)) => format!("{n}"),
            Value::Boolean(None) => "null".to_string(),
            Value::Boolean(Some(b)) => b.to_string(),
            Value::Date(None) => "null".to_string(),
            Value::Date(Some(d)) => format!("date '{:04}-{:02}-{:02}'", d.year, d.month + 1, d.day),
            Value::TimeOfDay(None) => "null".to_string(),
            Value::TimeOfDay(Some(t)) => format!(
                "timeofday '{:02}:{:02}:{:02}.{:03}'",
                t.hour, t.minute, t.second, t.millisecond
            ),
            Value::DateTime(None) => "null".to_string(),
            Value::DateTime(Some(dt)) => format!(
                "datetime '{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:03}'",
                dt.date.year,
                dt.date.month + 1,
                dt.date.day,
                dt.time.hour,
                dt.time.minute,
                dt.time.second,
                dt.time.millisecond
            ),
        }
    }
}

fn cmp_option<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.cmp(b),
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => match (a, b) {
                (None, None) => true,
                (Some(a), Some(b)) => a.to_bits() == b.to_bits(),
                _ => false,
            },
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::TimeOfDay(a), Value::TimeOfDay(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Ord for Value {
    /// A total order used only for positioning values inside the
    /// aggregation tree's ordered maps. Within a type this matches
    /// [`Value::compare_to`] with codepoint TEXT ordering; across types it
    /// falls back to an arbitrary but stable type rank so the tree never
    /// needs to special-case mixed-type keys (query validation guarantees a
    /// single GROUP/PIVOT column never mixes types across rows).
    fn cmp(&self, other: &Self) -> Ordering {
        fn rank(v: &Value) -> u8 {
            match v {
                Value::Text(_) => 0,
                Value::Number(_) => 1,
                Value::Boolean(_) => 2,
                Value::Date(_) => 3,
                Value::TimeOfDay(_) => 4,
                Value::DateTime(_) => 5,
            }
        }
        if self.value_type() == other.value_type() {
            self.compare_to(other, None)
        } else {
            rank(self).cmp(&rank(other))
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Text(v) => v.hash(state),
            Value::Number(v) => match v {
                None => 0u8.hash(state),
                Some(n) if n.is_nan() => f64::NAN.to_bits().hash(state),
                Some(n) => n.to_bits().hash(state),
            },
            Value::Boolean(v) => v.hash(state),
            Value::Date(v) => v.hash(state),
            Value::TimeOfDay(v) => v.hash(state),
            Value::DateTime(v) => v.hash(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_sorts_before_non_null() {
        let null = Value::null_of(ValueType::Number);
        let five = Value::number(5.0);
        assert_eq!(null.compare_to(&five, None), Ordering::Less);
    }

    #[test]
    fn nan_is_a_non_null_number() {
        let nan = Value::number(f64::NAN);
        assert!(!nan.is_null());
        assert_eq!(nan.value_type(), ValueType::Number);
    }

    #[test]
    fn date_rejects_month_out_of_range() {
        assert!(DateValue::new(2020, 12, 1).is_err());
        assert!(DateValue::new(2020, 0, 1).is_ok());
    }

    #[test]
    fn text_equality_and_hash_are_consistent() {
        use std::collections::hash_map::DefaultHasher;
        let a = Value::text("hi");
        let b = Value::text("hi");
        assert_eq!(a, b);
        let mut ha = DefaultHasher::new();
        a.hash(&mut ha);
        let mut hb = DefaultHasher::new();
        b.hash(&mut hb);
        assert_eq!(ha.finish(), hb.finish());
    }

    #[test]
    fn negative_zero_and_zero_are_one_equal_hashable_value() {
        use std::collections::hash_map::DefaultHasher;
        let neg = Value::number(-0.0);
        let pos = Value::number(0.0);
        assert_eq!(neg, pos);
        assert_eq!(neg.cmp(&pos), Ordering::Equal);
        let mut hn = DefaultHasher::new();
        neg.hash(&mut hn);
        let mut hp = DefaultHasher::new();
        pos.hash(&mut hp);
        assert_eq!(hn.finish(), hp.finish());
    }

    #[test]
    fn inner_query_string_round_trips_literals() {
        assert_eq!(Value::text("a\"b").inner_query_string(), "\"a\\\"b\"");
        assert_eq!(Value::number(42.0).inner_query_string(), "42");
        assert_eq!(
            Value::Date(Some(DateValue::new(2020, 2, 15).unwrap())).inner_query_string(),
            "date '2020-03-15'"
        );
    }
}
