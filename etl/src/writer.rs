//! CSV output for processed orders.
//!
//! The output keeps the input columns in their original order and appends
//! `AmountWithVAT`, `HighValue` and `ProcessedDate`.

use std::path::Path;

use crate::error::{CsvError, CsvResult};
use crate::models::{Order, DERIVED_COLUMNS};
use crate::parser::ColumnMap;

/// Format of the `ProcessedDate` column.
pub const PROCESSED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Where each output cell comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    OrderId,
    CustomerName,
    Amount,
    Email,
    Country,
    Extra(usize),
}

fn layout(headers: &[String]) -> CsvResult<Vec<Slot>> {
    let columns = ColumnMap::resolve(headers)?;
    let mut extra = 0;
    let slots = (0..headers.len())
        .map(|i| {
            if i == columns.order_id {
                Slot::OrderId
            } else if i == columns.customer_name {
                Slot::CustomerName
            } else if i == columns.amount {
                Slot::Amount
            } else if i == columns.email {
                Slot::Email
            } else if i == columns.country {
                Slot::Country
            } else {
                extra += 1;
                Slot::Extra(extra - 1)
            }
        })
        .collect();
    Ok(slots)
}

/// Format a decimal the way it reads back unchanged; integral values keep a `.0`.
pub fn format_decimal(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

fn format_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

fn cell(order: &Order, slot: Slot) -> String {
    match slot {
        Slot::OrderId => order.order_id.clone().unwrap_or_default(),
        Slot::CustomerName => order.customer_name.clone(),
        Slot::Amount => order.amount.map(format_decimal).unwrap_or_default(),
        Slot::Email => order.email.clone(),
        Slot::Country => order.country.clone(),
        Slot::Extra(i) => order.extra.get(i).cloned().unwrap_or_default(),
    }
}

/// Render orders as comma-separated CSV with a header line.
pub fn render_orders(headers: &[String], orders: &[Order]) -> CsvResult<Vec<u8>> {
    let slots = layout(headers)?;
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    let header_row = headers
        .iter()
        .map(String::as_str)
        .chain(DERIVED_COLUMNS.iter().copied());
    writer.write_record(header_row)?;

    for order in orders {
        let mut row: Vec<String> = slots.iter().map(|slot| cell(order, *slot)).collect();
        row.push(order.amount_with_vat.map(format_decimal).unwrap_or_default());
        row.push(format_bool(order.high_value).to_string());
        row.push(order.processed_at.format(PROCESSED_AT_FORMAT).to_string());
        writer.write_record(&row)?;
    }

    writer
        .into_inner()
        .map_err(|e| CsvError::Io(e.into_error()))
}

/// Write orders to `path`, replacing any existing file.
pub fn write_orders(path: &Path, headers: &[String], orders: &[Order]) -> CsvResult<()> {
    let bytes = render_orders(headers, orders)?;
    std::fs::write(path, bytes)?;
    Ok(())
}
