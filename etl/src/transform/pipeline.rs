//! High-level pipeline API: load, transform, save.
//!
//! # Example
//!
//! ```rust,ignore
//! use orders_etl::{run, EtlConfig, RunOptions};
//!
//! let report = run(&RunOptions::new("eu_orders.csv"), &EtlConfig::default())?;
//! println!("Wrote {} of {} rows", report.rows_written, report.rows_read);
//! ```

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::stages::{apply_all, StageOutcome};
use crate::config::EtlConfig;
use crate::error::{CsvError, PipelineError, PipelineResult};
use crate::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::models::{Exclusion, ExclusionReason, Order, RawOrder};
use crate::parser::{parse_file, to_raw_orders};
use crate::writer::{format_decimal, write_orders, PROCESSED_AT_FORMAT};

/// Input file used when none is given.
pub const DEFAULT_INPUT: &str = "eu_orders.csv";

/// Suffix added to the input file stem to name the output.
pub const OUTPUT_SUFFIX: &str = "_clean";

/// Options for one run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Input CSV file
    pub input: PathBuf,
    /// Output CSV file (default: next to the input, see [`default_output_path`])
    pub output: Option<PathBuf>,
    /// Rows shown before and after transformation
    pub preview_rows: usize,
}

impl RunOptions {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: None,
            preview_rows: 5,
        }
    }

    /// The output path this run writes to.
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| default_output_path(&self.input))
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::new(DEFAULT_INPUT)
    }
}

/// Output path next to `input`: `orders.csv` becomes `orders_clean.csv`.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "orders".to_string());
    input.with_file_name(format!("{}{}.csv", stem, OUTPUT_SUFFIX))
}

/// Orders read from the input, with the header they came with.
#[derive(Debug, Clone)]
pub struct Table {
    pub headers: Vec<String>,
    pub encoding: String,
    pub delimiter: char,
    pub orders: Vec<RawOrder>,
}

/// Summary of a completed run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: Uuid,
    pub processed_at: NaiveDateTime,
    pub input: PathBuf,
    pub output: PathBuf,
    pub encoding: String,
    pub delimiter: char,
    pub rows_read: usize,
    pub rows_written: usize,
    /// Number of dropped rows per reason
    pub excluded_by_reason: BTreeMap<ExclusionReason, usize>,
    pub exclusions: Vec<Exclusion>,
}

impl RunReport {
    pub fn excluded_count(&self) -> usize {
        self.exclusions.len()
    }

    pub fn to_json(&self) -> PipelineResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| PipelineError::Report(e.to_string()))
    }

    /// Write the report as pretty JSON.
    pub fn write_json(&self, path: &Path) -> PipelineResult<()> {
        let json = self.to_json()?;
        std::fs::write(path, json)
            .map_err(|e| PipelineError::Report(format!("{}: {}", path.display(), e)))
    }
}

/// Read the input file into [`RawOrder`]s.
///
/// A missing file is reported as [`PipelineError::SourceNotFound`].
pub fn load(path: &Path, config: &EtlConfig) -> PipelineResult<Table> {
    let parsed = match parse_file(path, config.delimiter) {
        Ok(parsed) => parsed,
        Err(CsvError::Io(e)) if e.kind() == ErrorKind::NotFound => {
            return Err(PipelineError::SourceNotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    let orders = to_raw_orders(&parsed, config)?;

    Ok(Table {
        headers: parsed.headers,
        encoding: parsed.encoding,
        delimiter: parsed.delimiter,
        orders,
    })
}

/// Write the transformed orders, replacing any existing file.
pub fn save(path: &Path, headers: &[String], orders: &[Order]) -> PipelineResult<()> {
    write_orders(path, headers, orders).map_err(|e| PipelineError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Run the pipeline, stamping rows with the current local time.
pub fn run(options: &RunOptions, config: &EtlConfig) -> PipelineResult<RunReport> {
    run_at(options, config, Local::now().naive_local())
}

/// Run the pipeline with an explicit processing timestamp.
///
/// Nothing is written when the input cannot be loaded.
pub fn run_at(
    options: &RunOptions,
    config: &EtlConfig,
    processed_at: NaiveDateTime,
) -> PipelineResult<RunReport> {
    let output = options.output_path();

    log_info(format!("📂 Extracting data from {}...", options.input.display()));
    let table = load(&options.input, config)?;
    log_success(format!("Detected encoding: {}", table.encoding));
    log_success(format!("Detected separator: '{}'", format_delimiter(table.delimiter)));
    log_success(format!("Read {} rows", table.orders.len()));

    if options.preview_rows > 0 && !table.orders.is_empty() {
        log_info("Preview of raw data:");
        for row in table.orders.iter().take(options.preview_rows) {
            log_info_indent(describe_raw(row), 1);
        }
    }

    let rows_read = table.orders.len();

    log_info("🔄 Transforming data...");
    let StageOutcome { orders, exclusions } = apply_all(table.orders, config, processed_at);
    print_exclusions(&exclusions);

    if options.preview_rows > 0 && !orders.is_empty() {
        log_success("Transformed data sample:");
        for order in orders.iter().take(options.preview_rows) {
            log_info_indent(describe_order(order), 1);
        }
    }

    save(&output, &table.headers, &orders)?;
    log_success(format!(
        "📊 Clean data saved to {} with {} records.",
        output.display(),
        orders.len()
    ));

    let mut excluded_by_reason = BTreeMap::new();
    for exclusion in &exclusions {
        *excluded_by_reason.entry(exclusion.reason).or_insert(0) += 1;
    }

    Ok(RunReport {
        run_id: Uuid::new_v4(),
        processed_at,
        input: options.input.clone(),
        output,
        encoding: table.encoding,
        delimiter: table.delimiter,
        rows_read,
        rows_written: orders.len(),
        excluded_by_reason,
        exclusions,
    })
}

/// Format delimiter for display
fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "TAB".to_string(),
        c => c.to_string(),
    }
}

fn show(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("∅")
}

fn describe_raw(row: &RawOrder) -> String {
    format!(
        "line {}: OrderID={} CustomerName={} Amount={} Email={} Country={}",
        row.line,
        show(&row.order_id),
        show(&row.customer_name),
        show(&row.amount),
        show(&row.email),
        show(&row.country),
    )
}

fn describe_order(order: &Order) -> String {
    format!(
        "OrderID={} CustomerName={} Amount={} Email={} Country={} AmountWithVAT={} HighValue={} ProcessedDate={}",
        show(&order.order_id),
        order.customer_name,
        order.amount.map(format_decimal).unwrap_or_else(|| "∅".into()),
        order.email,
        order.country,
        order.amount_with_vat.map(format_decimal).unwrap_or_else(|| "∅".into()),
        order.high_value,
        order.processed_at.format(PROCESSED_AT_FORMAT),
    )
}

/// Log dropped rows grouped by reason
fn print_exclusions(exclusions: &[Exclusion]) {
    if exclusions.is_empty() {
        log_success("No rows excluded");
        return;
    }
    log_warning(format!("{} rows excluded", exclusions.len()));

    let mut by_reason: BTreeMap<ExclusionReason, Vec<usize>> = BTreeMap::new();
    for exclusion in exclusions {
        by_reason.entry(exclusion.reason).or_default().push(exclusion.line);
    }

    for (reason, lines) in &by_reason {
        let sample: Vec<String> = lines.iter().take(5).map(|l| l.to_string()).collect();
        let more = if lines.len() > 5 {
            format!("... +{}", lines.len() - 5)
        } else {
            String::new()
        };
        log_warning(format!("• {} (lines: {}{})", reason, sample.join(", "), more));
    }
}
