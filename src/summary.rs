//! Quickstat Summarizer
//!
//! Turns a [`Dataset`] into row/column/missing counts, per-column KPIs and a
//! z-score outlier count.
//!
//! # Pipeline
//!
//! ```text
//! ┌──────────┐   prune    ┌──────────────┐  rayon par   ┌──────────────┐
//! │ Dataset  │───────────▶│   numeric    │─────────────▶│  KPI records │
//! │          │            │   columns    │              │ (per column) │
//! └──────────┘            └──────┬───────┘              └──────────────┘
//!                                │ jointly complete rows
//!                         ┌──────▼───────┐
//!                         │   z-scores   │──▶ outlier_rows
//!                         └──────────────┘
//! ```
//!
//! KPIs are computed independently per column, so that phase runs in
//! parallel. The outlier phase looks at rows across all numeric columns and
//! is sequential.
//!
//! Statistical conventions:
//! - `std` in a KPI record is the sample standard deviation (N−1). It is
//!   `null` for fewer than two values.
//! - z-scores use the population standard deviation (N) over the rows where
//!   every numeric column has a value, with mean and std recomputed over that
//!   subset. A zero-variance column scores 0.

use rayon::prelude::*;
use serde::{Serialize, Serializer};

use crate::dataset::{Dataset, NumericColumn};

/// |z| above this marks a row as an outlier
pub const Z_THRESHOLD: f64 = 3.0;

// ─── ColumnMap ──────────────────────────────────────────────────────────────

/// Column-name keyed map that serializes as a JSON object in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMap<V>(Vec<(String, V)>);

impl<V> Default for ColumnMap<V> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<V> ColumnMap<V> {
    pub fn get(&self, name: &str) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<V> FromIterator<(String, V)> for ColumnMap<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<V: Serialize> Serialize for ColumnMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k, v)))
    }
}

// ─── Records ────────────────────────────────────────────────────────────────

/// The five summary statistics of one numeric column
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct KpiRecord {
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl KpiRecord {
    /// Compute the record over the non-missing values of a column
    pub fn from_values(values: &[f64]) -> Self {
        let (Some((min, max)), Some(spread)) = (min_max(values), Spread::of(values)) else {
            return Self::default();
        };

        Self {
            mean: Some(spread.mean),
            median: Some(median(values)),
            std: sample_std(&spread),
            min: Some(min),
            max: Some(max),
        }
    }
}

/// Rows flagged by the z-score test
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutlierReport {
    pub outlier_rows: usize,
}

/// Full statistical summary of a dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub rows: usize,
    pub columns: usize,
    pub missing_values: usize,
    pub numeric_columns: Vec<String>,
    pub kpis: ColumnMap<KpiRecord>,
    pub outliers: OutlierReport,
}

// ─── Summarizer ─────────────────────────────────────────────────────────────

/// Summarize a dataset. All-missing columns are pruned before counting.
pub fn summarize(dataset: &Dataset) -> Summary {
    let numeric = dataset.numeric_columns();

    let kpis: Vec<(String, KpiRecord)> = numeric
        .par_iter()
        .map(|column| (column.name.to_string(), KpiRecord::from_values(&column.present())))
        .collect();

    Summary {
        rows: dataset.rows(),
        columns: dataset.retained_columns().count(),
        missing_values: dataset.retained_columns().map(|c| c.missing_count()).sum(),
        numeric_columns: numeric.iter().map(|c| c.name.to_string()).collect(),
        kpis: kpis.into_iter().collect(),
        outliers: OutlierReport {
            outlier_rows: count_outliers(&numeric),
        },
    }
}

/// Count rows where some numeric column has |z| > [`Z_THRESHOLD`].
///
/// Only rows with a value in every numeric column take part, and each
/// column's mean/std is computed over exactly those rows.
pub fn count_outliers(numeric: &[NumericColumn<'_>]) -> usize {
    let Some(first) = numeric.first() else {
        return 0;
    };

    let complete: Vec<usize> = (0..first.values.len())
        .filter(|&row| numeric.iter().all(|c| c.values[row].is_some()))
        .collect();
    if complete.is_empty() {
        return 0;
    }

    let scales: Vec<ZScale> = numeric
        .iter()
        .map(|c| {
            let values: Vec<f64> = complete.iter().filter_map(|&row| c.values[row]).collect();
            ZScale::fit(&values)
        })
        .collect();

    complete
        .iter()
        .filter(|&&row| {
            numeric
                .iter()
                .zip(&scales)
                .filter_map(|(c, scale)| c.values[row].map(|v| scale.score(v)))
                .any(|z| z.abs() > Z_THRESHOLD)
        })
        .count()
}

/// Mean and population std of one column
#[derive(Debug, Clone, Copy, PartialEq)]
struct ZScale {
    mean: f64,
    std: f64,
}

impl ZScale {
    fn fit(values: &[f64]) -> Self {
        match Spread::of(values) {
            Some(spread) => Self {
                mean: spread.mean,
                std: spread.std(0),
            },
            None => Self { mean: 0.0, std: 0.0 },
        }
    }

    fn score(&self, value: f64) -> f64 {
        if self.std == 0.0 {
            0.0
        } else {
            let z = (value - self.mean) / self.std;
            if z.is_finite() {
                z
            } else {
                // The difference overflowed near f64::MAX
                value / self.std - self.mean / self.std
            }
        }
    }
}

// ─── Statistics helpers ─────────────────────────────────────────────────────

fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let first = *values.first()?;
    Some(
        values
            .iter()
            .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
    )
}

/// Mean and spread of a column, computed on values divided by their largest
/// magnitude so that no intermediate sum overflows for finite input.
#[derive(Debug, Clone, Copy)]
struct Spread {
    n: usize,
    mean: f64,
    scale: f64,
    /// Sum of squared deviations, in units of `scale²`
    scaled_m2: f64,
}

impl Spread {
    fn of(values: &[f64]) -> Option<Self> {
        let (min, max) = min_max(values)?;
        let n = values.len();
        if min == max {
            return Some(Self {
                n,
                mean: min,
                scale: 0.0,
                scaled_m2: 0.0,
            });
        }

        let scale = min.abs().max(max.abs());
        let count = n as f64;
        let mean = values.iter().map(|v| v / count).sum::<f64>().clamp(min, max);
        let scaled_mean = mean / scale;
        let scaled_m2 = values
            .iter()
            .map(|v| (v / scale - scaled_mean).powi(2))
            .sum();
        Some(Self {
            n,
            mean,
            scale,
            scaled_m2,
        })
    }

    /// Standard deviation with `ddof` delta degrees of freedom
    fn std(&self, ddof: usize) -> f64 {
        if self.scale == 0.0 {
            return 0.0;
        }
        (self.scaled_m2 / (self.n - ddof) as f64).sqrt() * self.scale
    }
}

/// 50th percentile, interpolating between the middle pair for even counts.
/// `values` must be non-empty.
fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        sorted[mid - 1] / 2.0 + sorted[mid] / 2.0
    }
}

/// Sample standard deviation (N−1); undefined below two values
fn sample_std(spread: &Spread) -> Option<f64> {
    (spread.n >= 2).then(|| spread.std(1))
}

// ─── Tests ──────────────────────────────────────────────────────────────────
