//! Purchase order models and GST / discount computation

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::supplier::MaterialType;
use crate::amount_words::amount_in_words;
use crate::state::StateMachine;
use crate::validation::{validate_non_negative, validate_percent, validate_positive_quantity};

/// Purchase order lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoStatus {
    Ordered,
    Approved,
    Cancelled,
    Completed,
}

impl PoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoStatus::Ordered => "Ordered",
            PoStatus::Approved => "Approved",
            PoStatus::Cancelled => "Cancelled",
            PoStatus::Completed => "Completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Ordered" => Some(PoStatus::Ordered),
            "Approved" => Some(PoStatus::Approved),
            "Cancelled" => Some(PoStatus::Cancelled),
            "Completed" => Some(PoStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for PoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StateMachine for PoStatus {
    const ENTITY: &'static str = "Purchase order";
    const TRANSITIONS: &'static [(Self, Self)] = &[
        (PoStatus::Ordered, PoStatus::Approved),
        (PoStatus::Ordered, PoStatus::Cancelled),
        (PoStatus::Approved, PoStatus::Cancelled),
        (PoStatus::Approved, PoStatus::Completed),
        (PoStatus::Cancelled, PoStatus::Ordered),
    ];
}

/// Requested order line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoItemInput {
    pub material_id: Uuid,
    pub quantity: Decimal,
    pub rate: Decimal,
    #[serde(default)]
    pub discount_percent: Decimal,
    #[serde(default)]
    pub gst_percent: Decimal,
    #[serde(default)]
    pub extra_allowed_qty: Decimal,
}

/// Computed amounts for one line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineAmounts {
    pub gross: Decimal,
    pub discount_amount: Decimal,
    pub taxable: Decimal,
    pub gst_amount: Decimal,
    pub cgst: Decimal,
    pub sgst: Decimal,
    pub line_total: Decimal,
}

/// A stored order line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoLine {
    pub material_id: Uuid,
    pub material_name: String,
    pub quantity: Decimal,
    pub rate: Decimal,
    pub discount_percent: Decimal,
    pub gst_percent: Decimal,
    pub extra_allowed_qty: Decimal,
    #[serde(flatten)]
    pub amounts: LineAmounts,
}

/// Order-level rollup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoTotals {
    pub taxable_amount: Decimal,
    #[serde(rename = "totalCGST")]
    pub total_cgst: Decimal,
    #[serde(rename = "totalSGST")]
    pub total_sgst: Decimal,
    pub grand_total: Decimal,
    pub round_off: Decimal,
    pub total_amount: Decimal,
    pub amount_in_words: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PoError {
    #[error("At least one item is required")]
    NoItems,

    #[error("Item {index}: {message}")]
    InvalidItem { index: usize, message: &'static str },

    #[error("Item {index}: material {material_id} is already on this order")]
    DuplicateMaterial { index: usize, material_id: Uuid },
}

fn percent_of(amount: Decimal, percent: Decimal) -> Decimal {
    amount * percent / Decimal::ONE_HUNDRED
}

fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Per-line GST and discount amounts, exact
pub fn compute_line(
    quantity: Decimal,
    rate: Decimal,
    discount_percent: Decimal,
    gst_percent: Decimal,
) -> LineAmounts {
    let gross = quantity * rate;
    let discount_amount = percent_of(gross, discount_percent);
    let taxable = gross - discount_amount;
    let gst_amount = percent_of(taxable, gst_percent);
    let half = gst_amount / Decimal::TWO;
    LineAmounts {
        gross,
        discount_amount,
        taxable,
        gst_amount,
        cgst: half,
        sgst: half,
        line_total: taxable + gst_amount,
    }
}

/// Aggregate line amounts into order totals
///
/// Sums are rounded to paise; `roundOff` brings the grand total to the
/// nearest rupee, half away from zero.
pub fn compute_totals<'a>(lines: impl IntoIterator<Item = &'a LineAmounts>) -> PoTotals {
    let (taxable, cgst, sgst) = lines.into_iter().fold(
        (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
        |(t, c, s), l| (t + l.taxable, c + l.cgst, s + l.sgst),
    );
    let taxable_amount = round2(taxable);
    let total_cgst = round2(cgst);
    let total_sgst = round2(sgst);
    let grand_total = taxable_amount + total_cgst + total_sgst;
    let round_off =
        grand_total.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero) - grand_total;
    let total_amount = grand_total + round_off;

    PoTotals {
        taxable_amount,
        total_cgst,
        total_sgst,
        grand_total,
        round_off,
        total_amount,
        amount_in_words: amount_in_words(total_amount),
    }
}

pub fn validate_po_items(items: &[PoItemInput]) -> Result<(), PoError> {
    if items.is_empty() {
        return Err(PoError::NoItems);
    }
    let mut seen = HashSet::new();
    for (index, item) in items.iter().enumerate() {
        if !seen.insert(item.material_id) {
            return Err(PoError::DuplicateMaterial {
                index,
                material_id: item.material_id,
            });
        }
        let check = validate_positive_quantity(item.quantity)
            .and_then(|_| validate_non_negative(item.rate))
            .and_then(|_| validate_percent(item.discount_percent))
            .and_then(|_| validate_percent(item.gst_percent))
            .and_then(|_| validate_non_negative(item.extra_allowed_qty));
        check.map_err(|message| PoError::InvalidItem { index, message })?;
    }
    Ok(())
}

/// Format a PO number: `PO-<seq>/<YY>-<MM>`
pub fn format_po_number(year: i32, month: u32, sequence: i64) -> String {
    format!("PO-{:03}/{:02}-{:02}", sequence, year.rem_euclid(100), month)
}

/// Sequence scope for a calendar month
pub fn po_sequence_scope(year: i32, month: u32) -> String {
    format!("po:{:02}-{:02}", year.rem_euclid(100), month)
}

/// Parse `PO-<seq>/<YY>-<MM>` into `(seq, yy, mm)`
pub fn parse_po_number(po_number: &str) -> Option<(i64, u32, u32)> {
    let rest = po_number.strip_prefix("PO-")?;
    let (seq, period) = rest.split_once('/')?;
    let (yy, mm) = period.split_once('-')?;
    let month: u32 = mm.parse().ok()?;
    if !(1..=12).contains(&month) || yy.len() != 2 {
        return None;
    }
    Some((seq.parse().ok()?, yy.parse().ok()?, month))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub po_number: String,
    pub supplier_id: Uuid,
    pub supplier_name: String,
    pub material_type: MaterialType,
    pub items: Vec<PoLine>,
    #[serde(flatten)]
    pub totals: PoTotals,
    pub status: PoStatus,
    pub order_date: NaiveDate,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Orders created on one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyStat {
    pub date: NaiveDate,
    pub count: i64,
    pub total_amount: Decimal,
}

/// Seven daily buckets ending at `today`, oldest first, zero-filled
pub fn weekly_stats(today: NaiveDate, per_day: &[WeeklyStat]) -> Vec<WeeklyStat> {
    let by_day: HashMap<NaiveDate, &WeeklyStat> = per_day.iter().map(|s| (s.date, s)).collect();
    (0..7)
        .rev()
        .map(|back| {
            let date = today - Duration::days(back);
            match by_day.get(&date) {
                Some(s) => (*s).clone(),
                None => WeeklyStat {
                    date,
                    count: 0,
                    total_amount: Decimal::ZERO,
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_reference_line() {
        let l = compute_line(d("10"), d("100"), d("10"), d("5"));
        assert_eq!(l.gross, d("1000"));
        assert_eq!(l.discount_amount, d("100"));
        assert_eq!(l.taxable, d("900"));
        assert_eq!(l.gst_amount, d("45"));
        assert_eq!(l.cgst, d("22.5"));
        assert_eq!(l.sgst, d("22.5"));
        assert_eq!(l.line_total, d("945"));
    }

    #[test]
    fn test_round_off() {
        let lines = [compute_line(d("3"), d("33.33"), d("0"), d("18"))];
        let t = compute_totals(&lines);
        // 99.99 taxable, 9.00 + 9.00 gst
        assert_eq!(t.taxable_amount, d("99.99"));
        assert_eq!(t.grand_total, d("117.99"));
        assert_eq!(t.round_off, d("0.01"));
        assert_eq!(t.total_amount, d("118"));
        assert_eq!(t.amount_in_words, "Rupees One Hundred Eighteen Only");
    }

    #[test]
    fn test_status_transitions() {
        assert!(PoStatus::Ordered.can_transition_to(PoStatus::Approved));
        assert!(PoStatus::Cancelled.can_transition_to(PoStatus::Ordered));
        assert!(!PoStatus::Ordered.can_transition_to(PoStatus::Completed));
        assert!(PoStatus::Completed.is_terminal());
    }

    #[test]
    fn test_po_number_format() {
        assert_eq!(format_po_number(2025, 3, 7), "PO-007/25-03");
        assert_eq!(parse_po_number("PO-007/25-03"), Some((7, 25, 3)));
        assert_eq!(parse_po_number("PO-1234/25-11"), Some((1234, 25, 11)));
        assert_eq!(parse_po_number("PO-007/25-13"), None);
        assert_eq!(po_sequence_scope(2025, 3), "po:25-03");
    }

    #[test]
    fn test_item_validation() {
        let item = PoItemInput {
            material_id: Uuid::nil(),
            quantity: d("10"),
            rate: d("100"),
            discount_percent: d("10"),
            gst_percent: d("5"),
            extra_allowed_qty: Decimal::ZERO,
        };
        assert!(validate_po_items(&[item.clone()]).is_ok());
        assert_eq!(validate_po_items(&[]), Err(PoError::NoItems));

        let bad = PoItemInput {
            gst_percent: d("120"),
            ..item
        };
        assert!(matches!(
            validate_po_items(&[bad]),
            Err(PoError::InvalidItem { index: 0, .. })
        ));
    }

    #[test]
    fn test_repeated_material_rejected() {
        let item = PoItemInput {
            material_id: Uuid::new_v4(),
            quantity: d("10"),
            rate: d("100"),
            discount_percent: Decimal::ZERO,
            gst_percent: d("5"),
            extra_allowed_qty: Decimal::ZERO,
        };
        let other = PoItemInput {
            material_id: Uuid::new_v4(),
            ..item.clone()
        };
        assert!(validate_po_items(&[item.clone(), other.clone()]).is_ok());
        assert_eq!(
            validate_po_items(&[item.clone(), other, item.clone()]),
            Err(PoError::DuplicateMaterial {
                index: 2,
                material_id: item.material_id
            })
        );
    }

    #[test]
    fn test_weekly_stats_zero_fill() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        let stats = weekly_stats(
            today,
            &[WeeklyStat {
                date: NaiveDate::from_ymd_opt(2025, 6, 8).unwrap(),
                count: 2,
                total_amount: d("1890"),
            }],
        );
        assert_eq!(stats.len(), 7);
        assert_eq!(stats[0].date, NaiveDate::from_ymd_opt(2025, 6, 4).unwrap());
        assert_eq!(stats[6].date, today);
        assert_eq!(stats[4].count, 2);
        assert_eq!(stats.iter().map(|s| s.count).sum::<i64>(), 2);
    }
}
