//! Reconciliation tests
//!
//! Tests for used / not-used bookkeeping including:
//! - Property: a line is accepted exactly when used + notUsed <= qtySent
//! - Property: the remainder still with the jobber is never negative for accepted lines
//! - Property: every offending line is reported, not just the first

use proptest::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;

use shared::{
    still_with_jobber, validate_completion, validate_reconciliation, BatchStatus, ReconciledLine,
    ReconciliationError, ReconciliationLine, StateMachine, ViolationKind,
};

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn line(name: &str, sent: &str, used: &str, not_used: &str) -> ReconciliationLine {
    ReconciliationLine {
        material_name: name.to_string(),
        qty_sent: dec(sent),
        used: dec(used),
        not_used: dec(not_used),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// 60 used and 50 not used out of 100 sent is rejected
    #[test]
    fn test_over_reconciled_line_names_material() {
        let err = validate_reconciliation(&[line("Poly Bag", "100", "60", "50")]).unwrap_err();

        match &err {
            ReconciliationError::InvalidLines(violations) => {
                assert_eq!(violations.len(), 1);
                assert_eq!(violations[0].material_name, "Poly Bag");
                assert_eq!(violations[0].kind, ViolationKind::ExceedsSent);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err.to_string().contains("Poly Bag"));
    }

    #[test]
    fn test_exact_reconciliation_is_accepted() {
        let l = line("Carton", "100", "60", "40");
        assert!(validate_reconciliation(&[l.clone()]).is_ok());
        assert_eq!(l.still_with_jobber(), Decimal::ZERO);
    }

    #[test]
    fn test_negative_quantities_rejected() {
        let err = validate_reconciliation(&[line("Tag", "10", "-1", "0")]).unwrap_err();
        match err {
            ReconciliationError::InvalidLines(v) => assert_eq!(v[0].kind, ViolationKind::Negative),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_all_violations_reported() {
        let err = validate_reconciliation(&[
            line("Carton", "10", "11", "0"),
            line("Hanger", "10", "5", "5"),
            line("Tape", "10", "0", "12"),
        ])
        .unwrap_err();

        match err {
            ReconciliationError::InvalidLines(v) => {
                let names: Vec<&str> = v.iter().map(|x| x.material_name.as_str()).collect();
                assert_eq!(names, vec!["Carton", "Tape"]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_completion_requires_products_produced() {
        assert!(validate_completion(false, None).is_ok());
        assert!(validate_completion(true, Some(dec("120"))).is_ok());
        assert_eq!(
            validate_completion(true, None),
            Err(ReconciliationError::MissingProductsProduced)
        );
        assert_eq!(
            validate_completion(true, Some(Decimal::ZERO)),
            Err(ReconciliationError::MissingProductsProduced)
        );
    }

    #[test]
    fn test_reconciled_line_carries_remainder() {
        let reconciled = ReconciledLine::from(line("Poly Bag", "100", "50", "10"));
        assert_eq!(reconciled.still_with_jobber, dec("40"));

        let json = serde_json::to_value(&reconciled).unwrap();
        assert_eq!(json["materialName"], "Poly Bag");
        assert_eq!(json["stillWithJobber"], "40");
    }

    #[test]
    fn test_batch_status_table() {
        assert!(BatchStatus::Open.can_transition_to(BatchStatus::Partial));
        assert!(BatchStatus::Partial.can_transition_to(BatchStatus::Completed));
        assert!(!BatchStatus::Partial.can_transition_to(BatchStatus::Open));
        assert!(BatchStatus::Completed.is_terminal());
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    /// Quantity strategy with two decimal places
    fn qty_strategy() -> impl Strategy<Value = Decimal> {
        (0i64..=100_000).prop_map(|n| Decimal::new(n, 2))
    }

    fn line_strategy() -> impl Strategy<Value = ReconciliationLine> {
        (qty_strategy(), qty_strategy(), qty_strategy()).prop_map(|(sent, used, not_used)| {
            ReconciliationLine {
                material_name: "Poly Bag".to_string(),
                qty_sent: sent,
                used,
                not_used,
            }
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Accepted exactly when used + notUsed <= qtySent
        #[test]
        fn prop_line_rule(l in line_strategy()) {
            let ok = validate_reconciliation(&[l.clone()]).is_ok();
            prop_assert_eq!(ok, l.used + l.not_used <= l.qty_sent);
        }

        /// Accepted lines leave a non-negative remainder
        #[test]
        fn prop_remainder_non_negative(l in line_strategy()) {
            if validate_reconciliation(&[l.clone()]).is_ok() {
                prop_assert!(still_with_jobber(l.qty_sent, l.used, l.not_used) >= Decimal::ZERO);
            }
        }

        /// Remainder plus accounted quantity equals quantity sent
        #[test]
        fn prop_remainder_balances(l in line_strategy()) {
            prop_assert_eq!(l.still_with_jobber() + l.used + l.not_used, l.qty_sent);
        }

        /// The violation count equals the number of offending lines
        #[test]
        fn prop_every_violation_reported(lines in prop::collection::vec(line_strategy(), 1..10)) {
            let offending = lines.iter().filter(|l| l.used + l.not_used > l.qty_sent).count();
            match validate_reconciliation(&lines) {
                Ok(()) => prop_assert_eq!(offending, 0),
                Err(ReconciliationError::InvalidLines(v)) => prop_assert_eq!(v.len(), offending),
                Err(other) => prop_assert!(false, "unexpected error: {:?}", other),
            }
        }
    }
}
