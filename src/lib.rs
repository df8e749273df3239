//! Quickstat - statistical profile of an uploaded CSV file.
//!
//! Parses a CSV into a typed [`dataset::Dataset`], then reports row/column
//! and missing-value counts, per-column mean/median/std/min/max and a z-score
//! outlier count, plus a short numeric sample for charting.
//!
//! ## Layout
//!
//! - **Dataset** (`dataset`) - columns of numeric/text/missing cells.
//! - **Input** (`format`) - CSV parsing with explicit numeric type inference.
//! - **Summarizer** (`summary`) - KPIs and outlier detection.
//! - **Sample** (`sample`) - leading numeric rows for client-side plots.
//! - **Storage** (`storage`) - flat upload directory with atomic writes.
//! - **HTTP** (`server`) - axum routes for upload and download.

pub mod dataset;
pub mod format;
pub mod sample;
pub mod server;
pub mod storage;
pub mod summary;
