//! Run configuration.
//!
//! Values are layered, later sources winning:
//!
//! 1. [`EtlConfig::default`]
//! 2. a JSON file ([`EtlConfig::from_json_file`])
//! 3. `ORDERS_ETL_*` environment variables ([`EtlConfig::apply_env`])
//! 4. command-line flags ([`ConfigOverrides`])
//!
//! [`EtlConfig::validated`] normalizes the allow-list and rejects unusable values.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;

use crate::error::{ConfigError, ConfigResult};

/// Countries kept by default.
pub const DEFAULT_ALLOW_LIST: [&str; 5] = ["DE", "FR", "IT", "ES", "NL"];

/// Flat VAT rate applied to every amount.
pub const DEFAULT_VAT_RATE: f64 = 0.19;

/// Orders strictly above this amount are flagged as high value.
pub const DEFAULT_HIGH_VALUE_THRESHOLD: f64 = 200.0;

/// Placeholder written when an order has no email.
pub const DEFAULT_EMAIL: &str = "noemail@example.com";

/// Cell values read as null (pandas' default NA tokens).
pub const DEFAULT_NA_VALUES: [&str; 18] = [
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

pub const ENV_ALLOW_LIST: &str = "ORDERS_ETL_ALLOW_LIST";
pub const ENV_VAT_RATE: &str = "ORDERS_ETL_VAT_RATE";
pub const ENV_HIGH_VALUE_THRESHOLD: &str = "ORDERS_ETL_HIGH_VALUE_THRESHOLD";
pub const ENV_DEFAULT_EMAIL: &str = "ORDERS_ETL_DEFAULT_EMAIL";
pub const ENV_INVALID_AMOUNT: &str = "ORDERS_ETL_INVALID_AMOUNT";

static COUNTRY_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{2}$").expect("valid country code pattern"));

/// What to do with a row whose `Amount` is present but not a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidAmountPolicy {
    /// Exclude the row.
    #[default]
    Drop,
    /// Keep the row with an empty amount, no VAT, and `HighValue = False`.
    Keep,
}

impl FromStr for InvalidAmountPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "keep" => Ok(Self::Keep),
            other => Err(format!("expected 'drop' or 'keep', got '{}'", other)),
        }
    }
}

/// Settings for one ETL run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EtlConfig {
    /// Permitted country codes (uppercase, two letters).
    pub allow_list: BTreeSet<String>,
    /// VAT rate as a fraction (`0.19` for 19%).
    pub vat_rate: f64,
    /// Amount above which an order is high value.
    pub high_value_threshold: f64,
    /// Email written for orders that have none.
    pub default_email: String,
    /// Handling of unparseable amounts.
    pub invalid_amount: InvalidAmountPolicy,
    /// Cell values treated as null.
    pub na_values: Vec<String>,
    /// Input delimiter; detected from the header line when `None`.
    pub delimiter: Option<char>,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            allow_list: DEFAULT_ALLOW_LIST.iter().map(|c| c.to_string()).collect(),
            vat_rate: DEFAULT_VAT_RATE,
            high_value_threshold: DEFAULT_HIGH_VALUE_THRESHOLD,
            default_email: DEFAULT_EMAIL.to_string(),
            invalid_amount: InvalidAmountPolicy::default(),
            na_values: DEFAULT_NA_VALUES.iter().map(|v| v.to_string()).collect(),
            delimiter: None,
        }
    }
}

/// Flag values given on the command line. `None` leaves the field alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub allow_list: Option<Vec<String>>,
    pub vat_rate: Option<f64>,
    pub high_value_threshold: Option<f64>,
    pub default_email: Option<String>,
    pub invalid_amount: Option<InvalidAmountPolicy>,
    pub delimiter: Option<char>,
}

impl EtlConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(content: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load a config from a JSON file.
    pub fn from_json_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Build the effective config: defaults, then `file`, then the variables
    /// read through `lookup`, then `overrides`, then validation.
    pub fn resolve<F>(
        file: Option<&Path>,
        lookup: F,
        overrides: ConfigOverrides,
    ) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = match file {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };
        base.apply_env_with(lookup)?
            .apply_overrides(overrides)
            .validated()
    }

    /// Apply `ORDERS_ETL_*` variables from the process environment.
    pub fn apply_env(self) -> ConfigResult<Self> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply `ORDERS_ETL_*` variables using `lookup` to read them.
    pub fn apply_env_with<F>(mut self, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_ALLOW_LIST) {
            self.allow_list = split_codes(&value).into_iter().collect();
        }
        if let Some(value) = lookup(ENV_VAT_RATE) {
            self.vat_rate = parse_env(ENV_VAT_RATE, &value)?;
        }
        if let Some(value) = lookup(ENV_HIGH_VALUE_THRESHOLD) {
            self.high_value_threshold = parse_env(ENV_HIGH_VALUE_THRESHOLD, &value)?;
        }
        if let Some(value) = lookup(ENV_DEFAULT_EMAIL) {
            self.default_email = value;
        }
        if let Some(value) = lookup(ENV_INVALID_AMOUNT) {
            self.invalid_amount = parse_env(ENV_INVALID_AMOUNT, &value)?;
        }
        Ok(self)
    }

    /// Apply command-line overrides.
    pub fn apply_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(codes) = overrides.allow_list {
            self.allow_list = codes.into_iter().collect();
        }
        if let Some(rate) = overrides.vat_rate {
            self.vat_rate = rate;
        }
        if let Some(threshold) = overrides.high_value_threshold {
            self.high_value_threshold = threshold;
        }
        if let Some(email) = overrides.default_email {
            self.default_email = email;
        }
        if let Some(policy) = overrides.invalid_amount {
            self.invalid_amount = policy;
        }
        if overrides.delimiter.is_some() {
            self.delimiter = overrides.delimiter;
        }
        self
    }

    /// Normalize the allow-list to uppercase and check every value.
    pub fn validated(mut self) -> ConfigResult<Self> {
        let mut codes = BTreeSet::new();
        for code in &self.allow_list {
            let normalized = code.trim().to_uppercase();
            if !COUNTRY_CODE.is_match(&normalized) {
                return Err(ConfigError::InvalidCountryCode(code.clone()));
            }
            codes.insert(normalized);
        }
        if codes.is_empty() {
            return Err(ConfigError::EmptyAllowList);
        }
        self.allow_list = codes;

        if !self.vat_rate.is_finite() || self.vat_rate < 0.0 {
            return Err(ConfigError::InvalidVatRate(self.vat_rate));
        }
        if !self.high_value_threshold.is_finite() {
            return Err(ConfigError::InvalidThreshold(self.high_value_threshold));
        }

        self.default_email = self.default_email.trim().to_string();
        if self.default_email.is_empty() {
            return Err(ConfigError::EmptyDefaultEmail);
        }

        Ok(self)
    }

    /// Multiplier applied to amounts (`1 + vat_rate`).
    pub fn vat_multiplier(&self) -> f64 {
        1.0 + self.vat_rate
    }

    /// Whether `value` (already trimmed) is a null token.
    pub fn is_na(&self, value: &str) -> bool {
        value.is_empty() || self.na_values.iter().any(|na| na == value)
    }
}

/// Split a comma-separated list of country codes.
pub fn split_codes(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn parse_env<T: FromStr>(var: &str, value: &str) -> ConfigResult<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
    })
}
