//! Domain models for the orders ETL pipeline.
//!
//! Rows move through three shapes as the stages run:
//!
//! - [`RawOrder`] - One input row, every named field still text
//! - [`CoercedOrder`] - Amount parsed to a number (or marked invalid)
//! - [`Order`] - Final enriched record, ready to be written
//!
//! Rows dropped along the way are described by [`Exclusion`].

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Column names
// =============================================================================

/// Input column holding the order identifier.
pub const COL_ORDER_ID: &str = "OrderID";
/// Input column holding the customer name.
pub const COL_CUSTOMER_NAME: &str = "CustomerName";
/// Input column holding the order amount.
pub const COL_AMOUNT: &str = "Amount";
/// Input column holding the customer email.
pub const COL_EMAIL: &str = "Email";
/// Input column holding the country code.
pub const COL_COUNTRY: &str = "Country";

/// Columns the transformer reads. All must be present in the input header.
pub const REQUIRED_COLUMNS: [&str; 5] = [
    COL_ORDER_ID,
    COL_CUSTOMER_NAME,
    COL_AMOUNT,
    COL_EMAIL,
    COL_COUNTRY,
];

/// Derived columns appended to the output, in order.
pub const DERIVED_COLUMNS: [&str; 3] = ["AmountWithVAT", "HighValue", "ProcessedDate"];

// =============================================================================
// Rows
// =============================================================================

/// One order as read from the input.
///
/// Null cells (empty or an NA token) are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawOrder {
    /// 1-based line in the source file.
    pub line: usize,
    pub order_id: Option<String>,
    pub customer_name: Option<String>,
    pub amount: Option<String>,
    pub email: Option<String>,
    pub country: Option<String>,
    /// Values of the non-required columns, in header order.
    pub extra: Vec<String>,
}

/// An order whose amount has gone through numeric coercion.
#[derive(Debug, Clone, PartialEq)]
pub struct CoercedOrder {
    pub line: usize,
    pub order_id: Option<String>,
    pub customer_name: Option<String>,
    /// `None` when the source text was not a finite number.
    pub amount: Option<f64>,
    pub email: Option<String>,
    pub country: Option<String>,
    pub extra: Vec<String>,
}

/// A fully processed order.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub line: usize,
    pub order_id: Option<String>,
    pub customer_name: String,
    pub email: String,
    pub amount: Option<f64>,
    pub country: String,
    pub amount_with_vat: Option<f64>,
    pub high_value: bool,
    pub processed_at: NaiveDateTime,
    pub extra: Vec<String>,
}

// =============================================================================
// Exclusions
// =============================================================================

/// Why a row did not reach the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    /// Another row with the same `OrderID` came first.
    DuplicateOrderId,
    /// `CustomerName` was empty or null.
    MissingCustomerName,
    /// `Amount` was empty or null.
    MissingAmount,
    /// `Country` is not in the allow-list.
    CountryNotAllowed,
    /// `Amount` was present but not a number.
    InvalidAmount,
}

impl ExclusionReason {
    /// Short human-readable description.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::DuplicateOrderId => "duplicate OrderID",
            Self::MissingCustomerName => "missing CustomerName",
            Self::MissingAmount => "missing Amount",
            Self::CountryNotAllowed => "country not allowed",
            Self::InvalidAmount => "unparseable Amount",
        }
    }
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// A row dropped by one of the stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exclusion {
    pub line: usize,
    pub order_id: Option<String>,
    pub reason: ExclusionReason,
}

impl Exclusion {
    pub fn new(line: usize, order_id: Option<String>, reason: ExclusionReason) -> Self {
        Self {
            line,
            order_id,
            reason,
        }
    }
}
