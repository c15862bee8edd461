//! Stock tests
//!
//! Tests for material and finished-goods stock including:
//! - Property: alerts fire strictly below the threshold
//! - Property: outbound ledger entries are always negative
//! - Property: completing a DC books every carton to exactly one bucket

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use shared::{
    completion_entries, ledger_amounts, DcProduct, LedgerEntryType, Material, MaterialKind,
    ProductStock, StockAction, UnitType,
};

fn material(quantity: Decimal, threshold: Decimal) -> Material {
    Material {
        id: Uuid::new_v4(),
        kind: MaterialKind::Packing,
        name: "Poly Bag 12x16".to_string(),
        quantity,
        per_quantity_price: Decimal::new(150, 2),
        used_qty: Decimal::ZERO,
        own_unit_wip: Decimal::ZERO,
        jobber_wip: Decimal::ZERO,
        stock_alert_threshold: threshold,
        unit: Some("pcs".to_string()),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn product_stock(own_unit: i32, jobber: i32, threshold: i32) -> ProductStock {
    ProductStock {
        id: Uuid::new_v4(),
        product_name: "Premium T-Shirt".to_string(),
        own_unit_stock: own_unit,
        jobber_stock: jobber,
        alert_threshold: threshold,
        last_updated_from: None,
        last_production_details: None,
        last_updated: Utc::now(),
    }
}

fn dc_product(name: &str, cartons: i32) -> DcProduct {
    DcProduct {
        product_name: name.to_string(),
        carton_qty: cartons,
        materials: vec![],
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_material_at_threshold_is_not_alerted() {
        assert!(!material(Decimal::from(50), Decimal::from(50)).is_alerted());
        assert!(material(Decimal::from(49), Decimal::from(50)).is_alerted());
    }

    #[test]
    fn test_zero_threshold_never_alerts() {
        assert!(!material(Decimal::ZERO, Decimal::ZERO).is_alerted());
        assert!(!product_stock(0, 0, 0).is_alerted());
    }

    #[test]
    fn test_product_alert_uses_both_buckets() {
        assert!(!product_stock(60, 40, 100).is_alerted());
        assert!(product_stock(60, 39, 100).is_alerted());
    }

    #[test]
    fn test_ledger_signs() {
        let (qty, total) = ledger_amounts(LedgerEntryType::DcOut, Decimal::from(300), Decimal::from(2));
        assert_eq!(qty, Decimal::from(-300));
        assert_eq!(total, Decimal::from(-600));

        let (qty, _) = ledger_amounts(LedgerEntryType::DcReturn, Decimal::from(10), Decimal::ONE);
        assert_eq!(qty, Decimal::from(10));

        let (qty, _) = ledger_amounts(LedgerEntryType::GrnIn, Decimal::from(-5), Decimal::ONE);
        assert_eq!(qty, Decimal::from(5));
    }

    #[test]
    fn test_ledger_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&LedgerEntryType::DcOut).unwrap(),
            "\"DC-OUT\""
        );
        assert_eq!(LedgerEntryType::from_str("GRN-IN"), Some(LedgerEntryType::GrnIn));
        assert_eq!(LedgerEntryType::from_str("grn-in"), None);
    }

    #[test]
    fn test_material_serializes_wip_keys() {
        let json = serde_json::to_value(material(Decimal::ONE, Decimal::ONE)).unwrap();
        assert!(json.get("ownUnitWIP").is_some());
        assert!(json.get("jobberWIP").is_some());
        assert!(json.get("stockAlertThreshold").is_some());
    }

    #[test]
    fn test_stock_action_by_unit() {
        assert_eq!(StockAction::for_unit(UnitType::OwnUnit), StockAction::Add);
        assert_eq!(StockAction::for_unit(UnitType::Jobber), StockAction::Transfer);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn qty_strategy() -> impl Strategy<Value = Decimal> {
        (0i64..=1_000_000).prop_map(|n| Decimal::new(n, 3))
    }

    fn entry_type_strategy() -> impl Strategy<Value = LedgerEntryType> {
        prop_oneof![
            Just(LedgerEntryType::Opening),
            Just(LedgerEntryType::StockIn),
            Just(LedgerEntryType::DcOut),
            Just(LedgerEntryType::DcReturn),
            Just(LedgerEntryType::GrnIn),
            Just(LedgerEntryType::Damage),
            Just(LedgerEntryType::Issue),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Materials alert exactly when quantity < threshold
        #[test]
        fn prop_material_alert_is_strict(q in qty_strategy(), t in qty_strategy()) {
            prop_assert_eq!(material(q, t).is_alerted(), q < t);
        }

        /// Products alert exactly when ownUnit + jobber < threshold
        #[test]
        fn prop_product_alert_is_strict(
            own in 0i32..10_000,
            jobber in 0i32..10_000,
            threshold in 0i32..20_000
        ) {
            prop_assert_eq!(product_stock(own, jobber, threshold).is_alerted(), own + jobber < threshold);
        }

        /// Ledger quantity sign follows the movement direction
        #[test]
        fn prop_ledger_sign(kind in entry_type_strategy(), q in qty_strategy(), price in qty_strategy()) {
            let (signed, total) = ledger_amounts(kind, q, price);
            prop_assert_eq!(signed.abs(), q);
            if kind.is_outbound() {
                prop_assert!(signed <= Decimal::ZERO);
            } else {
                prop_assert!(signed >= Decimal::ZERO);
            }
            prop_assert_eq!(total, signed * price);
        }

        /// Every carton goes to the bucket matching the unit type
        #[test]
        fn prop_completion_buckets(
            cartons in prop::collection::vec(1i32..=1000, 1..6),
            jobber in any::<bool>()
        ) {
            let unit = if jobber { UnitType::Jobber } else { UnitType::OwnUnit };
            let products: Vec<DcProduct> = cartons
                .iter()
                .enumerate()
                .map(|(i, c)| dc_product(&format!("Product {}", i), *c))
                .collect();

            let entries = completion_entries(unit, &products);
            prop_assert_eq!(entries.len(), products.len());
            for (entry, cartons) in entries.iter().zip(cartons.iter()) {
                prop_assert_eq!(entry.own_unit_delta + entry.jobber_delta, *cartons);
                prop_assert_eq!(entry.action, StockAction::for_unit(unit));
                if jobber {
                    prop_assert_eq!(entry.own_unit_delta, 0);
                } else {
                    prop_assert_eq!(entry.jobber_delta, 0);
                }
            }
        }
    }
}
