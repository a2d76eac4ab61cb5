//! # Orders ETL - clean and enrich order exports
//!
//! Reads a CSV export of orders, drops duplicates, incomplete rows and
//! countries outside the allow-list, adds VAT and a high-value flag, and
//! writes a clean CSV next to the input.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Parser    │────▶│   Stages    │────▶│  Clean CSV  │
//! │  (ISO/UTF8) │     │  (auto-enc) │     │ (pure fns)  │     │  + report   │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use orders_etl::{run, EtlConfig, RunOptions};
//!
//! let config = EtlConfig::default().validated()?;
//! let report = run(&RunOptions::new("eu_orders.csv"), &config)?;
//! println!("{} rows written", report.rows_written);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types
//! - [`models`] - Order rows and exclusions
//! - [`config`] - Layered run configuration
//! - [`parser`] - CSV reading with auto-detection
//! - [`transform`] - Stages and pipeline
//! - [`writer`] - CSV output
//! - [`logs`] - Progress logging
//! - [`sample`] - Sample input file

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Input / output
pub mod parser;
pub mod writer;

// Transformation
pub mod transform;

// Logging
pub mod logs;

pub mod sample;

// =============================================================================
// Re-exports - Errors
// =============================================================================

pub use error::{ConfigError, CsvError, PipelineError};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{CoercedOrder, Exclusion, ExclusionReason, Order, RawOrder};

// =============================================================================
// Re-exports - Config
// =============================================================================

pub use config::{ConfigOverrides, EtlConfig, InvalidAmountPolicy};

// =============================================================================
// Re-exports - Parsing / Writing
// =============================================================================

pub use parser::{parse_bytes, parse_file, to_raw_orders, ParseResult};
pub use writer::{render_orders, write_orders};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    default_output_path, load, run, run_at, save, RunOptions, RunReport, Table,
};
pub use transform::stages::{
    apply_all, coerce_amount, deduplicate, enrich, filter_required, normalize,
    restrict_countries, Filtered, StageOutcome,
};
