//! Schema + rows: the engine's universal input and output unit.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::value::{Value, ValueType};

/// A non-fatal deviation recorded on the result table instead of raised.
#[derive(Debug, Clone, PartialEq, Eq, strum::Display)]
pub enum WarningReason {
    DataTruncated,
    NotSupported,
    IllegalFormattingPattern,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub reason: WarningReason,
    pub message: String,
}

impl Warning {
    pub fn data_truncated() -> Self {
        Warning {
            reason: WarningReason::DataTruncated,
            message: "Results were truncated by LIMIT/OFFSET".to_string(),
        }
    }

    pub fn illegal_formatting_pattern(column_id: &str) -> Self {
        Warning {
            reason: WarningReason::IllegalFormattingPattern,
            message: format!("column '{column_id}' has an illegal formatting pattern; using default"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescription {
    pub id: String,
    pub value_type: ValueType,
    pub label: String,
    pub properties: HashMap<String, String>,
    pub default_pattern: Option<String>,
}

impl ColumnDescription {
    pub fn new(id: impl Into<String>, value_type: ValueType) -> Self {
        let id = id.into();
        ColumnDescription {
            label: id.clone(),
            id,
            value_type,
            properties: HashMap::new(),
            default_pattern: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableCell {
    pub value: Value,
    pub formatted_value: Option<String>,
    pub properties: HashMap<String, String>,
}

impl TableCell {
    pub fn new(value: Value) -> Self {
        TableCell {
            value,
            formatted_value: None,
            properties: HashMap::new(),
        }
    }

    pub fn with_formatted_value(mut self, formatted: impl Into<String>) -> Self {
        self.formatted_value = Some(formatted.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

impl TableRow {
    pub fn new(cells: Vec<TableCell>) -> Self {
        TableRow { cells }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DataTable {
    columns: Vec<ColumnDescription>,
    rows: Vec<TableRow>,
    warnings: Vec<Warning>,
    properties: HashMap<String, String>,
    locale: String,
}

impl DataTable {
    pub fn new() -> Self {
        DataTable {
            columns: Vec::new(),
            rows: Vec::new(),
            warnings: Vec::new(),
            properties: HashMap::new(),
            locale: "en".to_string(),
        }
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn columns(&self) -> &[ColumnDescription] {
        &self.columns
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    pub fn add_warning(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    pub fn column_index(&self, id: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.id == id)
    }

    pub fn column(&self, id: &str) -> Option<&ColumnDescription> {
        self.columns.iter().find(|c| c.id == id)
    }

    /// Appends a column. Fails if the id already exists. An existing
    /// non-empty table grows a null cell onto every row.
    pub fn add_column(&mut self, description: ColumnDescription) -> EngineResult<()> {
        if self.column_index(&description.id).is_some() {
            return Err(EngineError::invalid_query(
                "SCHEMA",
                format!("duplicate column id '{}'", description.id),
            ));
        }
        debug!(column = %description.id, "DataTable::add_column");
        let null_cell = TableCell::new(Value::null_of(description.value_type));
        for row in &mut self.rows {
            row.cells.push(null_cell.clone());
        }
        self.columns.push(description);
        Ok(())
    }

    /// Appends a row. Every supplied cell's type must match its column;
    /// missing trailing cells are padded with null.
    pub fn add_row(&mut self, mut cells: Vec<TableCell>) -> EngineResult<()> {
        if cells.len() > self.columns.len() {
            return Err(EngineError::invalid_query(
                "SCHEMA",
                format!(
                    "row has {} cells but table has {} columns",
                    cells.len(),
                    self.columns.len()
                ),
            ));
        }
        for (cell, column) in cells.iter().zip(self.columns.iter()) {
            if cell.value.value_type() != column.value_type {
                return Err(EngineError::type_mismatch(column.value_type, cell.value.value_type()));
            }
        }
        while cells.len() < self.columns.len() {
            let value_type = self.columns[cells.len()].value_type;
            cells.push(TableCell::new(Value::null_of(value_type)));
        }
        self.rows.push(TableRow::new(cells));
        Ok(())
    }

    pub fn set_cell(&mut self, row: usize, col: usize, cell: TableCell) -> EngineResult<()> {
        let existing = &self.rows[row].cells[col];
        if existing.value.value_type() != cell.value.value_type() {
            return Err(EngineError::type_mismatch(existing.value.value_type(), cell.value.value_type()));
        }
        self.rows[row].cells[col] = cell;
        Ok(())
    }

    /// Distinct values of column `i` in ascending [`Value`] order; null (if
    /// present) sorts first.
    pub fn column_distinct_values(&self, i: usize) -> Vec<Value> {
        let mut values: Vec<Value> = self.rows.iter().map(|r| r.cells[i].value.clone()).collect();
        values.sort();
        values.dedup();
        values
    }

    /// Distinct cells of column `i`, deduplicated by `cmp` rather than
    /// `Value` equality; the first-seen cell for each equivalence class is
    /// kept, and the result is ordered by `cmp`.
    pub fn column_distinct_cells_sorted(
        &self,
        i: usize,
        cmp: impl Fn(&Value, &Value) -> std::cmp::Ordering,
    ) -> Vec<TableCell> {
        let mut cells: Vec<TableCell> = self.rows.iter().map(|r| r.cells[i].clone()).collect();
        cells.sort_by(|a, b| cmp(&a.value, &b.value));
        cells.dedup_by(|a, b| cmp(&a.value, &b.value) == std::cmp::Ordering::Equal);
        cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> DataTable {
        let mut t = DataTable::new();
        t.add_column(ColumnDescription::new("name", ValueType::Text)).unwrap();
        t.add_column(ColumnDescription::new("age", ValueType::Number)).unwrap();
        t
    }

    #[test]
    fn add_row_pads_with_null() {
        let mut t = sample_table();
        t.add_row(vec![TableCell::new(Value::text("Ann"))]).unwrap();
        assert_eq!(t.rows()[0].cells.len(), 2);
        assert!(t.rows()[0].cells[1].value.is_null());
    }

    #[test]
    fn add_row_rejects_type_mismatch() {
        let mut t = sample_table();
        let err = t
            .add_row(vec![TableCell::new(Value::number(1.0)), TableCell::new(Value::number(2.0))])
            .unwrap_err();
        assert!(matches!(err, EngineError::TypeMismatch { .. }));
    }

    #[test]
    fn add_column_on_nonempty_table_appends_null() {
        let mut t = sample_table();
        t.add_row(vec![TableCell::new(Value::text("Ann")), TableCell::new(Value::number(30.0))])
            .unwrap();
        t.add_column(ColumnDescription::new("active", ValueType::Boolean)).unwrap();
        assert_eq!(t.rows()[0].cells.len(), 3);
        assert!(t.rows()[0].cells[2].value.is_null());
    }

    #[test]
    fn add_column_rejects_duplicate_id() {
        let mut t = sample_table();
        let err = t.add_column(ColumnDescription::new("name", ValueType::Text)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidQuery { .. }));
    }

    #[test]
    fn distinct_values_places_null_first() {
        let mut t = DataTable::new();
        t.add_column(ColumnDescription::new("n", ValueType::Number)).unwrap();
        t.add_row(vec![TableCell::new(Value::number(3.0))]).unwrap();
        t.add_row(vec![TableCell::new(Value::null_of(ValueType::Number))]).unwrap();
        t.add_row(vec![TableCell::new(Value::number(1.0))]).unwrap();
        let distinct = t.column_distinct_values(0);
        assert!(distinct[0].is_null());
        assert_eq!(distinct[1].as_number(), Some(1.0));
        assert_eq!(distinct[2].as_number(), Some(3.0));
    }
}
