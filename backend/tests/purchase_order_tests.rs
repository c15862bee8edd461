//! Purchase order tests
//!
//! Tests for GST and discount computation including:
//! - Property: totalAmount = taxable + CGST + SGST + roundOff
//! - Property: roundOff stays within half a rupee and lands on a whole rupee
//! - Property: CGST and SGST split the line GST evenly
//! - Property: PO numbers parse back to their parts

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

use shared::{
    compute_line, compute_totals, format_po_number, grn_number_for, parse_po_number,
    po_sequence_scope, validate_po_items, weekly_stats, LineAmounts, PoError, PoItemInput,
    PoStatus, StateMachine, TransitionError, WeeklyStat,
};

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn item(quantity: &str, rate: &str, discount: &str, gst: &str) -> PoItemInput {
    PoItemInput {
        material_id: Uuid::new_v4(),
        quantity: dec(quantity),
        rate: dec(rate),
        discount_percent: dec(discount),
        gst_percent: dec(gst),
        extra_allowed_qty: Decimal::ZERO,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// 10 × 100 with 10% discount and 5% GST
    #[test]
    fn test_reference_order() {
        let line = compute_line(dec("10"), dec("100"), dec("10"), dec("5"));
        assert_eq!(line.taxable, dec("900"));
        assert_eq!(line.cgst, dec("22.5"));
        assert_eq!(line.sgst, dec("22.5"));
        assert_eq!(line.line_total, dec("945"));

        let totals = compute_totals(&[line]);
        assert_eq!(totals.taxable_amount, dec("900"));
        assert_eq!(totals.total_cgst, dec("22.5"));
        assert_eq!(totals.total_sgst, dec("22.5"));
        assert_eq!(totals.grand_total, dec("945"));
        assert_eq!(totals.round_off, Decimal::ZERO);
        assert_eq!(totals.total_amount, dec("945"));
        assert_eq!(totals.amount_in_words, "Rupees Nine Hundred Forty Five Only");
    }

    #[test]
    fn test_round_off_up_and_down() {
        // 100.50 rounds away from zero
        let up = compute_totals(&[compute_line(dec("1"), dec("100.50"), dec("0"), dec("0"))]);
        assert_eq!(up.round_off, dec("0.50"));
        assert_eq!(up.total_amount, dec("101"));

        let down = compute_totals(&[compute_line(dec("1"), dec("100.49"), dec("0"), dec("0"))]);
        assert_eq!(down.round_off, dec("-0.49"));
        assert_eq!(down.total_amount, dec("100"));
    }

    #[test]
    fn test_multiple_lines_are_summed() {
        let lines = vec![
            compute_line(dec("10"), dec("100"), dec("10"), dec("5")),
            compute_line(dec("4"), dec("250"), dec("0"), dec("12")),
        ];
        let totals = compute_totals(&lines);
        assert_eq!(totals.taxable_amount, dec("1900"));
        assert_eq!(totals.total_cgst, dec("82.5"));
        assert_eq!(totals.total_amount, dec("2065"));
    }

    #[test]
    fn test_totals_serialize_with_gst_keys() {
        let totals = compute_totals(&[compute_line(dec("10"), dec("100"), dec("10"), dec("5"))]);
        let json = serde_json::to_value(&totals).unwrap();
        assert!(json.get("totalCGST").is_some());
        assert!(json.get("totalSGST").is_some());
        assert!(json.get("roundOff").is_some());
        assert!(json.get("amountInWords").is_some());
    }

    #[test]
    fn test_item_validation() {
        assert_eq!(validate_po_items(&[]), Err(PoError::NoItems));
        assert!(validate_po_items(&[item("10", "100", "10", "5")]).is_ok());
        assert!(matches!(
            validate_po_items(&[item("10", "100", "0", "5"), item("0", "100", "0", "5")]),
            Err(PoError::InvalidItem { index: 1, .. })
        ));
        assert!(matches!(
            validate_po_items(&[item("1", "100", "101", "5")]),
            Err(PoError::InvalidItem { index: 0, .. })
        ));
    }

    #[test]
    fn test_po_number_format() {
        assert_eq!(format_po_number(2025, 1, 1), "PO-001/25-01");
        assert_eq!(format_po_number(2025, 11, 123), "PO-123/25-11");
        assert_eq!(po_sequence_scope(2025, 1), "po:25-01");
        assert_eq!(parse_po_number("PO-007/25-03"), Some((7, 25, 3)));
        assert_eq!(parse_po_number("PO-007/25-13"), None);
        assert_eq!(grn_number_for("PO-007/25-03"), "GRN-007/25-03");
    }

    #[test]
    fn test_status_table() {
        assert_eq!(PoStatus::Ordered.transition_to(PoStatus::Approved), Ok(PoStatus::Approved));
        assert_eq!(PoStatus::Cancelled.transition_to(PoStatus::Ordered), Ok(PoStatus::Ordered));
        assert!(matches!(
            PoStatus::Completed.transition_to(PoStatus::Cancelled),
            Err(TransitionError::Terminal { .. })
        ));
        assert!(matches!(
            PoStatus::Ordered.transition_to(PoStatus::Completed),
            Err(TransitionError::Illegal { .. })
        ));
    }

    #[test]
    fn test_weekly_stats_zero_fill() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let stats = weekly_stats(
            today,
            &[WeeklyStat {
                date: NaiveDate::from_ymd_opt(2025, 3, 8).unwrap(),
                count: 2,
                total_amount: dec("1890"),
            }],
        );

        assert_eq!(stats.len(), 7);
        assert_eq!(stats[0].date, NaiveDate::from_ymd_opt(2025, 3, 4).unwrap());
        assert_eq!(stats[6].date, today);
        assert_eq!(stats[4].count, 2);
        assert_eq!(stats.iter().map(|s| s.count).sum::<i64>(), 2);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    /// Quantity strategy (0.01 to 10,000.00)
    fn quantity_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=1_000_000).prop_map(|n| Decimal::new(n, 2))
    }

    /// Rate strategy (0.01 to 5,000.00)
    fn rate_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=500_000).prop_map(|n| Decimal::new(n, 2))
    }

    /// Whole-number percentages up to 30
    fn percent_strategy() -> impl Strategy<Value = Decimal> {
        (0i64..=30).prop_map(Decimal::from)
    }

    fn line_strategy() -> impl Strategy<Value = LineAmounts> {
        (quantity_strategy(), rate_strategy(), percent_strategy(), percent_strategy())
            .prop_map(|(q, r, d, g)| compute_line(q, r, d, g))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// totalAmount = taxable + CGST + SGST + roundOff
        #[test]
        fn prop_total_identity(lines in prop::collection::vec(line_strategy(), 1..8)) {
            let t = compute_totals(&lines);
            prop_assert_eq!(
                t.total_amount,
                t.taxable_amount + t.total_cgst + t.total_sgst + t.round_off
            );
        }

        /// roundOff = round(grandTotal) − grandTotal, |roundOff| <= 0.5
        #[test]
        fn prop_round_off_bounded(lines in prop::collection::vec(line_strategy(), 1..8)) {
            let t = compute_totals(&lines);
            prop_assert!(t.round_off.abs() <= dec("0.5"));
            prop_assert_eq!(t.total_amount, t.total_amount.trunc());
            prop_assert_eq!(t.round_off, t.total_amount - t.grand_total);
        }

        /// CGST and SGST each carry half of the line GST
        #[test]
        fn prop_gst_split_evenly(line in line_strategy()) {
            prop_assert_eq!(line.cgst, line.sgst);
            prop_assert_eq!(line.cgst + line.sgst, line.gst_amount);
            prop_assert_eq!(line.line_total, line.taxable + line.gst_amount);
        }

        /// Discount never makes the taxable amount negative
        #[test]
        fn prop_taxable_within_gross(line in line_strategy()) {
            prop_assert!(line.taxable >= Decimal::ZERO);
            prop_assert!(line.taxable <= line.gross);
        }

        /// Formatted PO numbers parse back to (seq, yy, mm)
        #[test]
        fn prop_po_number_parses(year in 2000i32..2100, month in 1u32..=12, seq in 1i64..1000) {
            let po_number = format_po_number(year, month, seq);
            prop_assert_eq!(
                parse_po_number(&po_number),
                Some((seq, (year % 100) as u32, month))
            );
        }
    }
}
