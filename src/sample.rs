//! Quickstat - Chart sample
//!
//! A display-only projection of the numeric columns: the first rows in file
//! order, with missing cells drawn as `0`. Not a statistical sample.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::dataset::Dataset;
use crate::summary::ColumnMap;

/// Default number of leading rows kept in a sample
pub const DEFAULT_SAMPLE_LIMIT: usize = 200;

/// Key holding the row labels in the serialized sample
pub const INDEX_KEY: &str = "index";

/// Leading rows of every numeric column plus their row labels.
///
/// Serializes flat, as `{"<column>": [..], ..., "index": ["0", "1", ..]}`,
/// or `{}` when empty. A numeric column named `index` is left out of the
/// map since its key holds the labels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sample {
    pub columns: ColumnMap<Vec<f64>>,
    pub index: Vec<String>,
}

impl Sample {
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of sampled rows
    pub fn len(&self) -> usize {
        self.index.len()
    }
}

impl Serialize for Sample {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.is_empty() {
            return serializer.serialize_map(Some(0))?.end();
        }

        let mut map = serializer.serialize_map(None)?;
        for (name, values) in self.columns.iter().filter(|(name, _)| *name != INDEX_KEY) {
            map.serialize_entry(name, values)?;
        }
        map.serialize_entry(INDEX_KEY, &self.index)?;
        map.end()
    }
}

/// Take the first `limit` rows of the retained numeric columns.
///
/// Returns an empty sample when there are no numeric columns or no rows.
pub fn sample(dataset: &Dataset, limit: usize) -> Sample {
    let numeric = dataset.numeric_columns();
    let rows = dataset.rows().min(limit);
    if numeric.is_empty() || rows == 0 {
        return Sample::default();
    }

    let columns = numeric
        .iter()
        .map(|column| {
            let values = column.values[..rows]
                .iter()
                .map(|v| v.unwrap_or(0.0))
                .collect();
            (column.name.to_string(), values)
        })
        .collect();

    Sample {
        columns,
        index: (0..rows).map(|i| i.to_string()).collect(),
    }
}
