//! Pattern-driven cell formatters invoked by the LABELS/FORMATS pipeline
//! stage. A fresh formatter is built per formatted column per execution.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{EngineError, EngineResult};
use crate::value::Value;

pub trait Formatter {
    fn format(&self, value: &Value) -> String;
}

/// The value's plain, pattern-free textual form; used both when no pattern
/// was supplied and as the fallback when a pattern fails to parse.
pub fn default_display(value: &Value) -> String {
    match value {
        Value::Text(None)
        | Value::Number(None)
        | Value::Boolean(None)
        | Value::Date(None)
        | Value::TimeOfDay(None)
        | Value::DateTime(None) => String::new(),
        Value::Text(Some(s)) => s.clone(),
        Value::Number(Some(n)) if n.is_nan() => "NaN".to_string(),
        Value::Number(Some(n)) if n.fract() == 0.0 => format!("{n:.0}"),
        Value::Number(Some(n)) => format!("{n}"),
        Value::Boolean(Some(b)) => b.to_string(),
        Value::Date(Some(d)) => format!("{:04}-{:02}-{:02}", d.year, d.month + 1, d.day),
        Value::TimeOfDay(Some(t)) => format!("{:02}:{:02}:{:02}.{:03}", t.hour, t.minute, t.second, t.millisecond),
        Value::DateTime(Some(dt)) => format!(
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:03}",
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

/// An ICU/`SimpleDateFormat`-style pattern translated to `chrono` strftime
/// tokens; always renders in UTC. Supports the documented token subset:
/// `yyyy`, `MM`, `dd`, `HH`, `mm`, `ss`, `SSS`.
pub struct DateFormatter {
    strftime_pattern: String,
}

impl DateFormatter {
    pub fn new(pattern: &str) -> EngineResult<Self> {
        let mut out = String::new();
        let mut chars = pattern.chars().peekable();
        while let Some(c) = chars.next() {
            let mut run = String::from(c);
            while chars.peek() == Some(&c) {
                run.push(chars.next().unwrap());
            }
            let token = match run.as_str() {
                "yyyy" => "%Y",
                "MM" => "%m",
                "dd" => "%d",
                "HH" => "%H",
                "mm" => "%M",
                "ss" => "%S",
                "SSS" => "%3f",
                other if other.chars().all(|c| c.is_ascii_alphabetic()) => {
                    return Err(EngineError::invalid_query("FORMAT", format!("unsupported date pattern token '{other}'")));
                }
                literal => {
                    out.push_str(literal);
                    continue;
                }
            };
            out.push_str(token);
        }
        Ok(DateFormatter { strftime_pattern: out })
    }

    fn to_naive_datetime(value: &Value) -> Option<NaiveDateTime> {
        match value {
            Value::Date(Some(d)) => {
                NaiveDate::from_ymd_opt(d.year, d.month + 1, d.day).map(|d| NaiveDateTime::new(d, NaiveTime::MIN))
            }
            Value::TimeOfDay(Some(t)) => NaiveTime::from_hms_milli_opt(t.hour, t.minute, t.second, t.millisecond)
                .map(|t| NaiveDateTime::new(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap(), t)),
            Value::DateTime(Some(dt)) => {
                let date = NaiveDate::from_ymd_opt(dt.date.year, dt.date.month + 1, dt.date.day)?;
                let time = NaiveTime::from_hms_milli_opt(dt.time.hour, dt.time.minute, dt.time.second, dt.time.millisecond)?;
                Some(NaiveDateTime::new(date, time))
            }
            _ => None,
        }
    }
}

impl Formatter for DateFormatter {
    fn format(&self, value: &Value) -> String {
        match Self::to_naive_datetime(value) {
            Some(dt) => dt.format(&self.strftime_pattern).to_string(),
            None => default_display(value),
        }
    }
}

/// A minimal `DecimalFormat`-style renderer: `#,##0.00` drives grouping and
/// fixed decimal-place count. An empty pattern falls back to plain display.
pub struct NumberFormatter {
    decimal_places: Option<usize>,
    grouped: bool,
}

impl NumberFormatter {
    pub fn new(pattern: &str) -> EngineResult<Self> {
        if pattern.is_empty() {
            return Ok(NumberFormatter {
                decimal_places: None,
                grouped: false,
            });
        }
        if !pattern.chars().all(|c| matches!(c, '0' | '#' | ',' | '.')) {
            return Err(EngineError::invalid_query("FORMAT", format!("unsupported number pattern '{pattern}'")));
        }
        let grouped = pattern.contains(',');
        let decimal_places = pattern.split('.').nth(1).map(str::len);
        Ok(NumberFormatter { decimal_places, grouped })
    }
}

impl Formatter for NumberFormatter {
    fn format(&self, value: &Value) -> String {
        let Some(n) = value.as_number() else {
            return default_display(value);
        };
        if n.is_nan() {
            return "NaN".to_string();
        }
        let Some(places) = self.decimal_places else {
            return default_display(value);
        };
        let rendered = format!("{n:.places$}");
        if self.grouped { group_thousands(&rendered) } else { rendered }
    }
}

fn group_thousands(rendered: &str) -> String {
    let (sign, rest) = match rendered.strip_prefix('-') {
        Some(r) => ("-", r),
        None => ("", rendered),
    };
    let (int_part, frac_part) = match rest.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (rest, None),
    };
    let mut reversed = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            reversed.push(',');
        }
        reversed.push(c);
    }
    let int_grouped: String = reversed.chars().rev().collect();
    match frac_part {
        Some(f) => format!("{sign}{int_grouped}.{f}"),
        None => format!("{sign}{int_grouped}"),
    }
}

/// Two-token boolean rendering, constructed from a `"TRUE_TOKEN:FALSE_TOKEN"`
/// pattern.
pub struct BooleanFormatter {
    true_token: String,
    false_token: String,
}

impl BooleanFormatter {
    pub fn new(true_token: impl Into<String>, false_token: impl Into<String>) -> Self {
        BooleanFormatter {
            true_token: true_token.into(),
            false_token: false_token.into(),
        }
    }

    pub fn from_pattern(pattern: &str) -> EngineResult<Self> {
        match pattern.split_once(':') {
            Some((t, f)) => Ok(BooleanFormatter::new(t, f)),
            None => Err(EngineError::invalid_query("FORMAT", format!("boolean pattern '{pattern}' is not TRUE_TOKEN:FALSE_TOKEN"))),
        }
    }
}

impl Formatter for BooleanFormatter {
    fn format(&self, value: &Value) -> String {
        match value.as_boolean() {
            Some(true) => self.true_token.clone(),
            Some(false) => self.false_token.clone(),
            None => default_display(value),
        }
    }
}

/// Builds the formatter for a column's declared type and pattern; `pattern`
/// is empty when no FORMAT clause targeted the column.
pub fn build_formatter(value_type: crate::value::ValueType, pattern: &str) -> EngineResult<Box<dyn Formatter>> {
    use crate::value::ValueType;
    match value_type {
        ValueType::Date | ValueType::TimeOfDay | ValueType::DateTime if !pattern.is_empty() => {
            Ok(Box::new(DateFormatter::new(pattern)?))
        }
        ValueType::Number if !pattern.is_empty() => Ok(Box::new(NumberFormatter::new(pattern)?)),
        ValueType::Boolean if !pattern.is_empty() => Ok(Box::new(BooleanFormatter::from_pattern(pattern)?)),
        _ => Ok(Box::new(NumberFormatter::new("")?)),
    }
}
