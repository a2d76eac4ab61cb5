//! Transformation stages.
//!
//! Each stage takes ownership of the rows from the previous one and returns
//! new rows; nothing is shared or mutated across stages. Stages that drop
//! rows return a [`Filtered`] carrying the reason for every dropped row.
//!
//! ```text
//! deduplicate → filter_required → normalize → restrict_countries → coerce_amount → enrich
//! ```
//!
//! `restrict_countries` relies on `normalize` having upper-cased the country,
//! and `enrich` relies on `coerce_amount` having parsed the amount.

use chrono::NaiveDateTime;
use std::collections::{BTreeSet, HashSet};

use crate::config::{EtlConfig, InvalidAmountPolicy};
use crate::models::{CoercedOrder, Exclusion, ExclusionReason, Order, RawOrder};

/// Rows kept by a stage, plus the ones it dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Filtered<T> {
    pub kept: Vec<T>,
    pub excluded: Vec<Exclusion>,
}

impl<T> Filtered<T> {
    fn with_capacity(n: usize) -> Self {
        Self {
            kept: Vec::with_capacity(n),
            excluded: Vec::new(),
        }
    }
}

/// Output of the full stage sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome {
    /// Orders to write, in input order
    pub orders: Vec<Order>,
    /// Every dropped row, in the order stages dropped them
    pub exclusions: Vec<Exclusion>,
}

/// Keep the first row for each `OrderID`.
///
/// Rows without an id share one key, so only the first of them survives.
pub fn deduplicate(rows: Vec<RawOrder>) -> Filtered<RawOrder> {
    let mut seen: HashSet<Option<String>> = HashSet::with_capacity(rows.len());
    let mut out = Filtered::with_capacity(rows.len());

    for row in rows {
        if seen.insert(row.order_id.clone()) {
            out.kept.push(row);
        } else {
            out.excluded.push(Exclusion::new(
                row.line,
                row.order_id,
                ExclusionReason::DuplicateOrderId,
            ));
        }
    }
    out
}

/// Drop rows without a customer name or an amount.
pub fn filter_required(rows: Vec<RawOrder>) -> Filtered<RawOrder> {
    let mut out = Filtered::with_capacity(rows.len());

    for row in rows {
        let reason = if row.customer_name.is_none() {
            Some(ExclusionReason::MissingCustomerName)
        } else if row.amount.is_none() {
            Some(ExclusionReason::MissingAmount)
        } else {
            None
        };

        match reason {
            Some(reason) => out
                .excluded
                .push(Exclusion::new(row.line, row.order_id, reason)),
            None => out.kept.push(row),
        }
    }
    out
}

/// Upper-case the country and fill in missing emails.
pub fn normalize(rows: Vec<RawOrder>, default_email: &str) -> Vec<RawOrder> {
    rows.into_iter()
        .map(|row| RawOrder {
            country: row.country.map(|c| c.to_uppercase()),
            email: row.email.or_else(|| Some(default_email.to_string())),
            ..row
        })
        .collect()
}

/// Keep rows whose country is in `allow_list`.
pub fn restrict_countries(
    rows: Vec<RawOrder>,
    allow_list: &BTreeSet<String>,
) -> Filtered<RawOrder> {
    let mut out = Filtered::with_capacity(rows.len());

    for row in rows {
        let allowed = row
            .country
            .as_ref()
            .is_some_and(|c| allow_list.contains(c));
        if allowed {
            out.kept.push(row);
        } else {
            out.excluded.push(Exclusion::new(
                row.line,
                row.order_id,
                ExclusionReason::CountryNotAllowed,
            ));
        }
    }
    out
}

/// Parse an amount. Anything that is not a finite number yields `None`.
pub fn parse_amount(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Parse every amount; never fails.
///
/// Rows whose amount does not parse are dropped or kept with a null
/// amount, depending on `policy`.
pub fn coerce_amount(rows: Vec<RawOrder>, policy: InvalidAmountPolicy) -> Filtered<CoercedOrder> {
    let mut out = Filtered::with_capacity(rows.len());

    for row in rows {
        let amount = row.amount.as_deref().and_then(parse_amount);

        if amount.is_none() && policy == InvalidAmountPolicy::Drop {
            out.excluded.push(Exclusion::new(
                row.line,
                row.order_id,
                ExclusionReason::InvalidAmount,
            ));
            continue;
        }

        out.kept.push(CoercedOrder {
            line: row.line,
            order_id: row.order_id,
            customer_name: row.customer_name,
            amount,
            email: row.email,
            country: row.country,
            extra: row.extra,
        });
    }
    out
}

/// Add VAT, the high-value flag and the processing timestamp.
///
/// Every order gets the same `processed_at`.
pub fn enrich(
    rows: Vec<CoercedOrder>,
    vat_multiplier: f64,
    high_value_threshold: f64,
    processed_at: NaiveDateTime,
) -> Vec<Order> {
    rows.into_iter()
        .map(|row| Order {
            line: row.line,
            order_id: row.order_id,
            customer_name: row.customer_name.unwrap_or_default(),
            email: row.email.unwrap_or_default(),
            amount: row.amount,
            country: row.country.unwrap_or_default(),
            amount_with_vat: row.amount.map(|a| a * vat_multiplier),
            high_value: row.amount.is_some_and(|a| a > high_value_threshold),
            processed_at,
            extra: row.extra,
        })
        .collect()
}

/// Run every stage in order.
pub fn apply_all(
    rows: Vec<RawOrder>,
    config: &EtlConfig,
    processed_at: NaiveDateTime,
) -> StageOutcome {
    let mut exclusions = Vec::new();

    let deduped = deduplicate(rows);
    exclusions.extend(deduped.excluded);

    let complete = filter_required(deduped.kept);
    exclusions.extend(complete.excluded);

    let normalized = normalize(complete.kept, &config.default_email);

    let allowed = restrict_countries(normalized, &config.allow_list);
    exclusions.extend(allowed.excluded);

    let coerced = coerce_amount(allowed.kept, config.invalid_amount);
    exclusions.extend(coerced.excluded);

    let orders = enrich(
        coerced.kept,
        config.vat_multiplier(),
        config.high_value_threshold,
        processed_at,
    );

    StageOutcome { orders, exclusions }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn raw(
        line: usize,
        id: &str,
        name: &str,
        amount: &str,
        email: &str,
        country: &str,
    ) -> RawOrder {
        let opt = |s: &str| (!s.is_empty()).then(|| s.to_string());
        RawOrder {
            line,
            order_id: opt(id),
            customer_name: opt(name),
            amount: opt(amount),
            email: opt(email),
            country: opt(country),
            extra: Vec::new(),
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 15)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn ids<T>(rows: &[T], id: impl Fn(&T) -> Option<&str>) -> Vec<Option<&str>> {
        rows.iter().map(id).collect()
    }

    #[test]
    fn test_deduplicate_keeps_first() {
        let rows = vec![
            raw(2, "4", "First", "10", "", "DE"),
            raw(3, "5", "Other", "10", "", "DE"),
            raw(4, "4", "Second", "99", "", "FR"),
        ];
        let out = deduplicate(rows);

        assert_eq!(out.kept.len(), 2);
        assert_eq!(out.kept[0].customer_name.as_deref(), Some("First"));
        assert_eq!(out.kept[1].order_id.as_deref(), Some("5"));
        assert_eq!(
            out.excluded,
            vec![Exclusion::new(4, Some("4".into()), ExclusionReason::DuplicateOrderId)]
        );
    }

    #[test]
    fn test_deduplicate_missing_ids_collapse() {
        let rows = vec![
            raw(2, "", "A", "1", "", "DE"),
            raw(3, "", "B", "1", "", "DE"),
        ];
        let out = deduplicate(rows);
        assert_eq!(out.kept.len(), 1);
        assert_eq!(out.kept[0].customer_name.as_deref(), Some("A"));
    }

    #[test]
    fn test_filter_required() {
        let rows = vec![
            raw(2, "1", "A", "10", "", "DE"),
            raw(3, "2", "", "50", "", "FR"),
            raw(4, "3", "C", "", "", "IT"),
        ];
        let out = filter_required(rows);

        assert_eq!(ids(&out.kept, |r| r.order_id.as_deref()), vec![Some("1")]);
        assert_eq!(out.excluded[0].reason, ExclusionReason::MissingCustomerName);
        assert_eq!(out.excluded[1].reason, ExclusionReason::MissingAmount);
        assert_eq!(out.excluded[1].line, 4);
    }

    #[test]
    fn test_normalize() {
        let rows = vec![
            raw(2, "1", "A", "10", "", "de"),
            raw(3, "2", "B", "10", "b@shop.eu", "Fr"),
            raw(4, "3", "C", "10", "", ""),
        ];
        let out = normalize(rows, "noemail@example.com");

        assert_eq!(out[0].country.as_deref(), Some("DE"));
        assert_eq!(out[0].email.as_deref(), Some("noemail@example.com"));
        assert_eq!(out[1].country.as_deref(), Some("FR"));
        assert_eq!(out[1].email.as_deref(), Some("b@shop.eu"));
        assert_eq!(out[2].country, None);
    }

    #[test]
    fn test_restrict_countries() {
        let allow: BTreeSet<String> = ["DE", "FR"].iter().map(|s| s.to_string()).collect();
        let rows = vec![
            raw(2, "1", "A", "10", "", "DE"),
            raw(3, "2", "B", "10", "", "US"),
            raw(4, "3", "C", "10", "", ""),
            raw(5, "4", "D", "10", "", "de"),
        ];
        let out = restrict_countries(rows, &allow);

        assert_eq!(ids(&out.kept, |r| r.order_id.as_deref()), vec![Some("1")]);
        assert_eq!(out.excluded.len(), 3);
        assert!(out
            .excluded
            .iter()
            .all(|e| e.reason == ExclusionReason::CountryNotAllowed));
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("250"), Some(250.0));
        assert_eq!(parse_amount(" 12.5 "), Some(12.5));
        assert_eq!(parse_amount("-3"), Some(-3.0));
        assert_eq!(parse_amount("1e3"), Some(1000.0));
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount("12,50"), None);
        assert_eq!(parse_amount("inf"), None);
        assert_eq!(parse_amount("NaN"), None);
    }

    #[test]
    fn test_coerce_amount_drop() {
        let rows = vec![
            raw(2, "1", "A", "100", "", "DE"),
            raw(3, "2", "B", "lots", "", "DE"),
        ];
        let out = coerce_amount(rows, InvalidAmountPolicy::Drop);

        assert_eq!(out.kept.len(), 1);
        assert_eq!(out.kept[0].amount, Some(100.0));
        assert_eq!(
            out.excluded,
            vec![Exclusion::new(3, Some("2".into()), ExclusionReason::InvalidAmount)]
        );
    }

    #[test]
    fn test_coerce_amount_keep() {
        let rows = vec![raw(3, "2", "B", "lots", "", "DE")];
        let out = coerce_amount(rows, InvalidAmountPolicy::Keep);

        assert!(out.excluded.is_empty());
        assert_eq!(out.kept[0].amount, None);

        let orders = enrich(out.kept, 1.19, 200.0, now());
        assert_eq!(orders[0].amount_with_vat, None);
        assert!(!orders[0].high_value);
    }

    #[test]
    fn test_enrich() {
        let rows = coerce_amount(
            vec![
                raw(2, "1", "A", "250", "x@y.z", "DE"),
                raw(3, "2", "B", "200", "x@y.z", "FR"),
                raw(4, "3", "C", "100", "x@y.z", "IT"),
            ],
            InvalidAmountPolicy::Drop,
        )
        .kept;
        let orders = enrich(rows, 1.19, 200.0, now());

        assert_eq!(orders[0].amount_with_vat, Some(297.5));
        assert!(orders[0].high_value);
        assert!(!orders[1].high_value, "threshold is exclusive");
        assert!((orders[2].amount_with_vat.unwrap() - 119.0).abs() < 1e-9);
        assert!(orders.iter().all(|o| o.processed_at == now()));
    }

    #[test]
    fn test_apply_all_scenarios() {
        let rows = vec![
            raw(2, "1", "A", "250", "", "de"),
            raw(3, "2", "", "50", "", "FR"),
            raw(4, "3", "B", "100", "", "US"),
            raw(5, "4", "C", "80", "c@shop.eu", "NL"),
            raw(6, "4", "D", "90", "d@shop.eu", "ES"),
        ];
        let outcome = apply_all(rows, &EtlConfig::default(), now());

        assert_eq!(outcome.orders.len(), 2);
        let first = &outcome.orders[0];
        assert_eq!(first.order_id.as_deref(), Some("1"));
        assert_eq!(first.country, "DE");
        assert_eq!(first.email, "noemail@example.com");
        assert_eq!(first.amount_with_vat, Some(297.5));
        assert!(first.high_value);

        let second = &outcome.orders[1];
        assert_eq!(second.customer_name, "C");
        assert!(!second.high_value);

        let reasons: Vec<_> = outcome.exclusions.iter().map(|e| (e.line, e.reason)).collect();
        assert_eq!(
            reasons,
            vec![
                (6, ExclusionReason::DuplicateOrderId),
                (3, ExclusionReason::MissingCustomerName),
                (4, ExclusionReason::CountryNotAllowed),
            ]
        );
    }

    #[test]
    fn test_dedupe_runs_before_filtering() {
        // The first row for id 7 is incomplete; the later complete one is still a duplicate.
        let rows = vec![
            raw(2, "7", "", "10", "", "DE"),
            raw(3, "7", "Kept?", "10", "", "DE"),
        ];
        let outcome = apply_all(rows, &EtlConfig::default(), now());
        assert!(outcome.orders.is_empty());
        assert_eq!(outcome.exclusions.len(), 2);
    }
}
