//! Quickstat - CSV input
//!
//! Turns raw CSV bytes into a typed [`Dataset`]. Type inference is explicit:
//! a column is numeric when every non-missing value matches a fixed number
//! grammar (optional sign, digits, optional decimal point, optional
//! exponent). Everything else is text.

use std::collections::HashSet;
use std::sync::LazyLock;

use csv::ReaderBuilder;
use regex::Regex;
use thiserror::Error;

use crate::dataset::{Cell, Column, Dataset, ShapeError};

/// Tokens read as missing, compared after trimming surrounding whitespace
pub const NA_TOKENS: [&str; 18] = [
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

static NUMBER_GRAMMAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?$")
        .expect("valid regex: number grammar")
});

/// Errors produced while reading CSV input
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("No columns to parse from file")]
    NoColumns,
    #[error("Error tokenizing data. Expected {expected} fields in line {line}, saw {found}")]
    TooManyFields {
        expected: usize,
        line: u64,
        found: usize,
    },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Shape(#[from] ShapeError),
}

/// True when `value` is an empty field or one of the NA tokens
pub fn is_missing_token(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || NA_TOKENS.contains(&value)
}

/// True when `value` matches the number grammar
pub fn is_number_literal(value: &str) -> bool {
    NUMBER_GRAMMAR.is_match(value.trim())
}

/// Parse CSV bytes (header row first) into a typed dataset
pub fn parse_csv(data: &[u8]) -> Result<Dataset, ParseError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data);

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(ParseError::NoColumns);
    }
    let names = column_names(headers.iter());
    let width = names.len();

    let mut raw: Vec<Vec<Option<String>>> = vec![Vec::new(); width];
    for result in reader.records() {
        let record = result?;
        if record.len() > width {
            return Err(ParseError::TooManyFields {
                expected: width,
                line: record.position().map_or(0, |p| p.line()),
                found: record.len(),
            });
        }
        // Short rows are padded with missing cells
        for (i, column) in raw.iter_mut().enumerate() {
            let value = record.get(i).filter(|v| !is_missing_token(v));
            column.push(value.map(str::to_string));
        }
    }

    let rows = raw.first().map_or(0, Vec::len);
    let mut dataset = Dataset::with_rows(rows);
    for (name, values) in names.into_iter().zip(raw) {
        dataset.push_column(type_column(name, values))?;
    }
    Ok(dataset)
}

/// Name blank headers `Unnamed: i` and suffix duplicates with `.1`, `.2`, ...
fn column_names<'a>(headers: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();

    for (i, header) in headers.enumerate() {
        let base = if header.trim().is_empty() {
            format!("Unnamed: {}", i)
        } else {
            header.to_string()
        };

        let mut name = base.clone();
        let mut suffix = 1;
        while seen.contains(&name) {
            name = format!("{}.{}", base, suffix);
            suffix += 1;
        }
        seen.insert(name.clone());
        names.push(name);
    }

    names
}

/// Decide the column type from its non-missing values and build the cells
fn type_column(name: String, values: Vec<Option<String>>) -> Column {
    let numeric = values.iter().flatten().all(|v| is_number_literal(v));

    let cells = if numeric {
        values
            .into_iter()
            .map(|v| match v {
                // Grammar matches can still overflow to infinity
                Some(v) => v.trim().parse::<f64>().map_or(Cell::Missing, Cell::number),
                None => Cell::Missing,
            })
            .collect()
    } else {
        values
            .into_iter()
            .map(|v| v.map_or(Cell::Missing, Cell::Text))
            .collect()
    };

    Column::new(name, cells)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(dataset: &Dataset) -> Vec<&str> {
        dataset.columns().iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_number_grammar() {
        for ok in ["1", "-2", "+3.5", "4.", ".5", "1e10", "2.5E-3", " 7 "] {
            assert!(is_number_literal(ok), "{ok:?} should be numeric");
        }
        for bad in ["", "abc", "1,000", "1e", "--1", "0x10", "inf", "1.2.3", "."] {
            assert!(!is_number_literal(bad), "{bad:?} should not be numeric");
        }
    }

    #[test]
    fn test_missing_tokens() {
        assert!(is_missing_token(""));
        assert!(is_missing_token("  "));
        assert!(is_missing_token("NA"));
        assert!(is_missing_token(" null "));
        assert!(!is_missing_token("0"));
        assert!(!is_missing_token("missing"));
    }

    #[test]
    fn test_parse_types_columns() -> anyhow::Result<()> {
        let csv = b"id,score,name\n1,2.5,alice\n2,,bob\n3,NA,\n";
        let dataset = parse_csv(csv)?;

        assert_eq!(dataset.rows(), 3);
        assert_eq!(names(&dataset), vec!["id", "score", "name"]);
        let numeric: Vec<&str> = dataset.numeric_columns().iter().map(|c| c.name).collect();
        assert_eq!(numeric, vec!["id", "score"]);

        let score = &dataset.columns()[1];
        assert_eq!(score.cells, vec![Cell::Number(2.5), Cell::Missing, Cell::Missing]);
        let name = &dataset.columns()[2];
        assert_eq!(name.cells[2], Cell::Missing);
        Ok(())
    }

    #[test]
    fn test_mixed_column_is_text() -> anyhow::Result<()> {
        let dataset = parse_csv(b"v\n1\ntwo\n3\n")?;
        let column = &dataset.columns()[0];
        assert!(!column.is_numeric());
        assert_eq!(column.cells[0], Cell::Text("1".into()));
        Ok(())
    }

    #[test]
    fn test_overflowing_number_is_missing() -> anyhow::Result<()> {
        let dataset = parse_csv(b"v\n1e999\n2\n")?;
        let column = &dataset.columns()[0];
        assert!(column.is_numeric());
        assert_eq!(column.cells, vec![Cell::Missing, Cell::Number(2.0)]);
        Ok(())
    }

    #[test]
    fn test_header_only() -> anyhow::Result<()> {
        let dataset = parse_csv(b"a,b,c\n")?;
        assert_eq!(dataset.rows(), 0);
        assert_eq!(dataset.column_count(), 3);
        Ok(())
    }

    #[test]
    fn test_empty_input_is_an_error() {
        assert!(matches!(parse_csv(b""), Err(ParseError::NoColumns)));
    }

    #[test]
    fn test_short_rows_are_padded() -> anyhow::Result<()> {
        let dataset = parse_csv(b"a,b\n1,2\n3\n")?;
        assert_eq!(dataset.rows(), 2);
        assert_eq!(dataset.columns()[1].cells, vec![Cell::Number(2.0), Cell::Missing]);
        Ok(())
    }

    #[test]
    fn test_long_rows_are_rejected() {
        let err = parse_csv(b"a,b\n1,2\n3,4,5\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Error tokenizing data. Expected 2 fields in line 3, saw 3"
        );
    }

    #[test]
    fn test_blank_lines_are_skipped() -> anyhow::Result<()> {
        let dataset = parse_csv(b"a\n1\n\n2\n")?;
        assert_eq!(dataset.rows(), 2);
        Ok(())
    }

    #[test]
    fn test_header_names_are_unique() -> anyhow::Result<()> {
        let dataset = parse_csv(b"a,,a,a\n1,2,3,4\n")?;
        assert_eq!(names(&dataset), vec!["a", "Unnamed: 1", "a.1", "a.2"]);
        Ok(())
    }

    #[test]
    fn test_invalid_utf8_is_an_error() {
        assert!(matches!(parse_csv(b"a\n\xff\xfe\n"), Err(ParseError::Csv(_))));
    }
}
