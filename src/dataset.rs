//! Quickstat - In-memory tabular dataset
//!
//! A dataset is an ordered list of named columns that all share one row
//! count. Missing cells are kept as an explicit variant so that the
//! statistics never confuse "absent" with zero.

use thiserror::Error;

/// A column whose length disagrees with the dataset row count
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("column '{name}' has {found} values, expected {expected}")]
pub struct ShapeError {
    pub name: String,
    pub found: usize,
    pub expected: usize,
}

/// A single cell value
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Absent value (empty field, NA token, non-finite number)
    Missing,
    /// Finite floating-point number
    Number(f64),
    /// Anything else, stored verbatim
    Text(String),
}

impl Cell {
    /// Build a numeric cell. NaN and infinities become `Missing`.
    pub fn number(value: f64) -> Self {
        if value.is_finite() {
            Cell::Number(value)
        } else {
            Cell::Missing
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::number(value)
    }
}

impl From<Option<f64>> for Cell {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Cell::Missing, Cell::number)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

/// A named column of cells
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub cells: Vec<Cell>,
}

impl Column {
    pub fn new(name: impl Into<String>, cells: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            cells,
        }
    }

    /// Number of missing cells
    pub fn missing_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_missing()).count()
    }

    /// True when no cell holds a value
    pub fn is_all_missing(&self) -> bool {
        self.cells.iter().all(Cell::is_missing)
    }

    /// A column is numeric when every non-missing cell is a number.
    /// Columns without any value are vacuously numeric.
    pub fn is_numeric(&self) -> bool {
        self.cells
            .iter()
            .all(|c| matches!(c, Cell::Missing | Cell::Number(_)))
    }

    /// Numeric view of the column, `None` for non-numeric columns
    pub fn as_numeric(&self) -> Option<NumericColumn<'_>> {
        if !self.is_numeric() {
            return None;
        }
        Some(NumericColumn {
            name: &self.name,
            values: self.cells.iter().map(Cell::as_number).collect(),
        })
    }
}

/// Borrowed numeric projection of a column
#[derive(Debug, Clone, PartialEq)]
pub struct NumericColumn<'a> {
    pub name: &'a str,
    /// One entry per row, `None` where the cell is missing
    pub values: Vec<Option<f64>>,
}

impl NumericColumn<'_> {
    /// The non-missing values in row order
    pub fn present(&self) -> Vec<f64> {
        self.values.iter().flatten().copied().collect()
    }
}

/// Tabular dataset with an explicit row count
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    rows: usize,
}

impl Dataset {
    /// Create an empty dataset with a fixed row count
    pub fn with_rows(rows: usize) -> Self {
        Self {
            columns: Vec::new(),
            rows,
        }
    }

    /// Build a dataset from columns. All columns must have the same length.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self, ShapeError> {
        let rows = columns.first().map_or(0, |c| c.cells.len());
        let mut dataset = Self::with_rows(rows);
        for column in columns {
            dataset.push_column(column)?;
        }
        Ok(dataset)
    }

    /// Append a column, checking it matches the row count
    pub fn push_column(&mut self, column: Column) -> Result<(), ShapeError> {
        if column.cells.len() != self.rows {
            return Err(ShapeError {
                found: column.cells.len(),
                expected: self.rows,
                name: column.name,
            });
        }
        self.columns.push(column);
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Total number of missing cells across all columns
    pub fn missing_count(&self) -> usize {
        self.columns.iter().map(Column::missing_count).sum()
    }

    /// Whether `column` survives pruning.
    ///
    /// A zero-row dataset keeps its columns: there is no value to be missing,
    /// so a header-only file still reports its header width.
    fn keeps(&self, column: &Column) -> bool {
        self.rows == 0 || !column.is_all_missing()
    }

    /// Columns that survive pruning, in order
    pub fn retained_columns(&self) -> impl Iterator<Item = &Column> + '_ {
        self.columns.iter().filter(move |c| self.keeps(c))
    }

    /// Drop every column whose cells are all missing
    pub fn prune(mut self) -> Self {
        let columns = std::mem::take(&mut self.columns);
        self.columns = columns.into_iter().filter(|c| self.keeps(c)).collect();
        self
    }

    /// Numeric projections of the retained numeric columns, in column order
    pub fn numeric_columns(&self) -> Vec<NumericColumn<'_>> {
        self.retained_columns().filter_map(Column::as_numeric).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn numbers(name: &str, values: &[Option<f64>]) -> Column {
        Column::new(name, values.iter().map(|v| Cell::from(*v)).collect())
    }

    #[test]
    fn test_non_finite_numbers_are_missing() {
        assert_eq!(Cell::number(f64::NAN), Cell::Missing);
        assert_eq!(Cell::number(f64::INFINITY), Cell::Missing);
        assert_eq!(Cell::number(1.5), Cell::Number(1.5));
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let result = Dataset::from_columns(vec![
            numbers("a", &[Some(1.0), Some(2.0)]),
            numbers("b", &[Some(1.0)]),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_prune_drops_all_missing_columns() -> Result<()> {
        let dataset = Dataset::from_columns(vec![
            numbers("a", &[Some(1.0), None]),
            numbers("empty", &[None, None]),
            Column::new("label", vec![Cell::from("x"), Cell::Missing]),
        ])?
        .prune();

        assert_eq!(dataset.rows(), 2);
        assert_eq!(dataset.column_count(), 2);
        assert_eq!(dataset.missing_count(), 2);
        let names: Vec<&str> = dataset.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "label"]);
        Ok(())
    }

    #[test]
    fn test_prune_keeps_columns_of_zero_row_dataset() -> Result<()> {
        let dataset = Dataset::from_columns(vec![numbers("a", &[]), numbers("b", &[])])?.prune();
        assert_eq!(dataset.rows(), 0);
        assert_eq!(dataset.column_count(), 2);
        Ok(())
    }

    #[test]
    fn test_retained_columns_match_prune() -> Result<()> {
        let dataset = Dataset::from_columns(vec![
            numbers("empty", &[None]),
            numbers("a", &[Some(3.0)]),
        ])?;
        let retained: Vec<&str> = dataset.retained_columns().map(|c| c.name.as_str()).collect();
        assert_eq!(retained, vec!["a"]);
        assert_eq!(dataset.clone().prune().column_count(), 1);
        assert_eq!(dataset.missing_count(), 1);
        Ok(())
    }

    #[test]
    fn test_numeric_detection() -> Result<()> {
        let dataset = Dataset::from_columns(vec![
            numbers("a", &[Some(1.0), None]),
            numbers("all_missing", &[None, None]),
            Column::new("mixed", vec![Cell::Number(1.0), Cell::from("two")]),
        ])?;
        let numeric = dataset.numeric_columns();
        assert_eq!(numeric.len(), 1);
        assert_eq!(numeric[0].name, "a");
        assert_eq!(numeric[0].values, vec![Some(1.0), None]);
        assert_eq!(numeric[0].present(), vec![1.0]);
        Ok(())
    }
}
