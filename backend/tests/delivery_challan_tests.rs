//! Delivery challan tests
//!
//! Tests for material planning and the challan lifecycle including:
//! - Property: deducted totals equal the per-carton recipe times cartons
//! - Property: shortage reporting names exactly the under-stocked materials
//! - Property: a Completed challan accepts no further transition
//! - Property: DC numbers are distinct for distinct sequence values

use std::collections::{BTreeMap, HashMap};

use proptest::prelude::*;
use rust_decimal::Decimal;

use shared::{
    apply_material_usage, completion_entries, find_shortages, format_dc_no, parse_dc_no,
    plan_material_requirements, DcStatus, MaterialPerCarton, MaterialUsageUpdate, PlanningError,
    ProductMaterialMapping, ProductOrder, StateMachine, StockAction, UnitType,
};

fn mapping(product: &str, materials: &[(&str, i64)]) -> ProductMaterialMapping {
    ProductMaterialMapping {
        product_name: product.to_string(),
        materials: materials
            .iter()
            .map(|(name, qty)| MaterialPerCarton {
                material_name: name.to_string(),
                qty_per_carton: Decimal::from(*qty),
            })
            .collect(),
    }
}

fn order(product: &str, cartons: i32) -> ProductOrder {
    ProductOrder {
        product_name: product.to_string(),
        carton_qty: cartons,
    }
}

fn stock(entries: &[(&str, i64)]) -> HashMap<String, Decimal> {
    entries
        .iter()
        .map(|(name, qty)| (name.to_string(), Decimal::from(*qty)))
        .collect()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// 150 cartons at 2 per carton draws 300
    #[test]
    fn test_premium_tshirt_scenario() {
        let plan = plan_material_requirements(
            &[order("Premium T-Shirt", 150)],
            &[mapping("Premium T-Shirt", &[("materialA", 2)])],
        )
        .unwrap();

        assert_eq!(plan.aggregated.len(), 1);
        assert_eq!(plan.aggregated[0].material_name, "materialA");
        assert_eq!(plan.aggregated[0].total_qty, Decimal::from(300));

        let shortages = find_shortages(&plan.aggregated, &stock(&[("materialA", 300)])).unwrap();
        assert!(shortages.is_empty());
    }

    /// Only the under-stocked material is reported
    #[test]
    fn test_one_of_two_materials_short() {
        let plan = plan_material_requirements(
            &[order("Shirt", 10)],
            &[mapping("Shirt", &[("Carton", 1), ("Poly Bag", 12)])],
        )
        .unwrap();

        let shortages =
            find_shortages(&plan.aggregated, &stock(&[("Carton", 50), ("Poly Bag", 100)])).unwrap();

        assert_eq!(shortages.len(), 1);
        assert_eq!(shortages[0].material_name, "Poly Bag");
        assert_eq!(shortages[0].required, Decimal::from(120));
        assert_eq!(shortages[0].available, Decimal::from(100));
    }

    #[test]
    fn test_stock_equal_to_requirement_is_enough() {
        let plan = plan_material_requirements(
            &[order("Shirt", 5)],
            &[mapping("Shirt", &[("Tag", 3)])],
        )
        .unwrap();
        assert!(find_shortages(&plan.aggregated, &stock(&[("Tag", 15)]))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_same_material_across_products_is_summed() {
        let plan = plan_material_requirements(
            &[order("Shirt", 10), order("Trouser", 4)],
            &[
                mapping("Shirt", &[("Carton", 1)]),
                mapping("Trouser", &[("Carton", 2)]),
            ],
        )
        .unwrap();

        assert_eq!(plan.aggregated.len(), 1);
        assert_eq!(plan.aggregated[0].total_qty, Decimal::from(18));
        assert_eq!(plan.products.len(), 2);
    }

    /// Each product appears once, so every usage update has exactly one line
    #[test]
    fn test_repeated_product_is_rejected() {
        let err = plan_material_requirements(
            &[order("Shirt", 10), order("Shirt", 10)],
            &[mapping("Shirt", &[("Poly Bag", 1)])],
        )
        .unwrap_err();
        assert_eq!(err, PlanningError::DuplicateProduct("Shirt".to_string()));
    }

    #[test]
    fn test_completion_books_by_unit_type() {
        let plan = plan_material_requirements(
            &[order("Shirt", 12)],
            &[mapping("Shirt", &[("Carton", 1)])],
        )
        .unwrap();

        let own = completion_entries(UnitType::OwnUnit, &plan.products);
        assert_eq!(own[0].action, StockAction::Add);
        assert_eq!((own[0].own_unit_delta, own[0].jobber_delta), (12, 0));

        let jobber = completion_entries(UnitType::Jobber, &plan.products);
        assert_eq!(jobber[0].action, StockAction::Transfer);
        assert_eq!((jobber[0].own_unit_delta, jobber[0].jobber_delta), (0, 12));
    }

    #[test]
    fn test_completed_is_terminal() {
        for target in [DcStatus::Pending, DcStatus::Partial, DcStatus::Completed] {
            assert!(DcStatus::Completed.transition_to(target).is_err());
        }
    }

    #[test]
    fn test_update_targets() {
        assert_eq!(DcStatus::from_update_target("Partial"), Some(DcStatus::Partial));
        assert_eq!(DcStatus::from_update_target("Completed"), Some(DcStatus::Completed));
        assert_eq!(DcStatus::from_update_target("Pending"), None);
        assert_eq!(DcStatus::from_update_target("completed"), None);
    }

    #[test]
    fn test_partial_resubmission_is_allowed() {
        assert_eq!(
            DcStatus::Partial.transition_to(DcStatus::Partial),
            Ok(DcStatus::Partial)
        );
    }

    #[test]
    fn test_material_return_moves_wip() {
        let mut plan = plan_material_requirements(
            &[order("Shirt", 10)],
            &[mapping("Shirt", &[("Poly Bag", 10)])],
        )
        .unwrap();

        let first = apply_material_usage(
            &mut plan.products,
            &[MaterialUsageUpdate {
                product_name: "Shirt".to_string(),
                material_name: "Poly Bag".to_string(),
                used: Decimal::from(50),
                not_used: Decimal::from(10),
            }],
        )
        .unwrap();
        assert_eq!(first[0].wip_release(), Decimal::from(60));

        // Second submission only books the difference
        let second = apply_material_usage(
            &mut plan.products,
            &[MaterialUsageUpdate {
                product_name: "Shirt".to_string(),
                material_name: "Poly Bag".to_string(),
                used: Decimal::from(80),
                not_used: Decimal::from(20),
            }],
        )
        .unwrap();
        assert_eq!(second[0].used_delta, Decimal::from(30));
        assert_eq!(second[0].not_used_delta, Decimal::from(10));
        assert_eq!(plan.products[0].materials[0].still_with_jobber, Decimal::ZERO);
    }

    #[test]
    fn test_dc_numbers() {
        assert_eq!(format_dc_no(2025, 1), "DC-2025-0001");
        assert_eq!(format_dc_no(2025, 42), "DC-2025-0042");
        assert_eq!(parse_dc_no("DC-2025-0042"), Some((2025, 42)));
        assert_eq!(parse_dc_no("DC-2025"), None);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    const MATERIALS: [&str; 5] = ["Carton", "Hanger", "Poly Bag", "Tag", "Tape"];

    /// A recipe over a subset of the material names
    fn recipe_strategy() -> impl Strategy<Value = Vec<(usize, i64)>> {
        prop::collection::vec(prop::option::of(1i64..=25), MATERIALS.len()).prop_map(|slots| {
            slots
                .into_iter()
                .enumerate()
                .filter_map(|(i, qty)| qty.map(|q| (i, q)))
                .collect()
        })
    }

    /// Up to four products, each with a recipe and a carton count
    fn dc_strategy() -> impl Strategy<Value = Vec<(Vec<(usize, i64)>, i32)>> {
        prop::collection::vec((recipe_strategy(), 1i32..=500), 1..=4)
    }

    fn build(dc: &[(Vec<(usize, i64)>, i32)]) -> (Vec<ProductOrder>, Vec<ProductMaterialMapping>) {
        let mut orders = Vec::new();
        let mut mappings = Vec::new();
        for (i, (recipe, cartons)) in dc.iter().enumerate() {
            let product = format!("Product {}", i);
            let materials: Vec<(&str, i64)> =
                recipe.iter().map(|(m, q)| (MATERIALS[*m], *q)).collect();
            mappings.push(mapping(&product, &materials));
            orders.push(order(&product, *cartons));
        }
        (orders, mappings)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Aggregated totals equal sum(qty_per_carton × carton_qty) per material
        #[test]
        fn prop_aggregation_matches_recipes(dc in dc_strategy()) {
            let (orders, mappings) = build(&dc);
            let plan = plan_material_requirements(&orders, &mappings).unwrap();

            let mut expected: BTreeMap<String, Decimal> = BTreeMap::new();
            for (recipe, cartons) in &dc {
                for (m, q) in recipe {
                    *expected.entry(MATERIALS[*m].to_string()).or_default() +=
                        Decimal::from(*q) * Decimal::from(*cartons);
                }
            }

            let actual: BTreeMap<String, Decimal> = plan
                .aggregated
                .iter()
                .map(|r| (r.material_name.clone(), r.total_qty))
                .collect();
            prop_assert_eq!(actual, expected);
        }

        /// Product lines and aggregate carry the same total quantity
        #[test]
        fn prop_lines_sum_to_aggregate(dc in dc_strategy()) {
            let (orders, mappings) = build(&dc);
            let plan = plan_material_requirements(&orders, &mappings).unwrap();

            let lines: Decimal = plan
                .products
                .iter()
                .flat_map(|p| p.materials.iter())
                .map(|l| l.total_qty)
                .sum();
            let aggregated: Decimal = plan.aggregated.iter().map(|r| r.total_qty).sum();
            prop_assert_eq!(lines, aggregated);
        }

        /// Shortages are exactly the materials whose stock is below the requirement
        #[test]
        fn prop_shortages_are_exact(
            dc in dc_strategy(),
            on_hand in prop::collection::vec(0i64..=5000, MATERIALS.len())
        ) {
            let (orders, mappings) = build(&dc);
            let plan = plan_material_requirements(&orders, &mappings).unwrap();
            let available: HashMap<String, Decimal> = MATERIALS
                .iter()
                .zip(on_hand.iter())
                .map(|(name, qty)| (name.to_string(), Decimal::from(*qty)))
                .collect();

            let shortages = find_shortages(&plan.aggregated, &available).unwrap();
            let short_names: Vec<&str> =
                shortages.iter().map(|s| s.material_name.as_str()).collect();
            let expected: Vec<&str> = plan
                .aggregated
                .iter()
                .filter(|r| available[&r.material_name] < r.total_qty)
                .map(|r| r.material_name.as_str())
                .collect();
            prop_assert_eq!(short_names, expected);
        }

        /// Completed rejects every requested status
        #[test]
        fn prop_completed_is_immutable(
            target in prop_oneof![
                Just(DcStatus::Pending),
                Just(DcStatus::Partial),
                Just(DcStatus::Completed)
            ]
        ) {
            prop_assert!(DcStatus::Completed.transition_to(target).is_err());
        }

        /// Distinct sequence values give distinct, parseable numbers
        #[test]
        fn prop_dc_numbers_distinct(year in 2000i32..2100, n in 1i64..300) {
            let numbers: Vec<String> = (1..=n).map(|seq| format_dc_no(year, seq)).collect();
            let unique: std::collections::HashSet<&String> = numbers.iter().collect();
            prop_assert_eq!(unique.len(), numbers.len());
            for (i, dc_no) in numbers.iter().enumerate() {
                prop_assert_eq!(parse_dc_no(dc_no), Some((year, i as i64 + 1)));
            }
        }
    }
}
