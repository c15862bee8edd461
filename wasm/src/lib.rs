//! WebAssembly module for the Millstock back office
//!
//! Provides client-side previews for:
//! - Purchase order GST, discount and round-off totals
//! - Delivery challan material requirements and shortages
//! - Reconciliation line checks
//! - Goods receipt pending quantities
//!
//! Decimals cross the boundary as strings so no precision is lost.

use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

use shared::{
    amount_in_words, compute_line, compute_totals, find_shortages, grn_extra_pending, grn_pending,
    plan_material_requirements, still_with_jobber, validate_gstin, validate_indian_phone,
    validate_reconciliation, LineAmounts, MaterialRequirement, PoTotals, ProductMaterialMapping,
    ProductOrder, ReconciliationLine,
};

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    web_sys::console::debug_1(&JsValue::from_str("millstock-wasm loaded"));
}

fn js_error(message: String) -> JsValue {
    js_sys::Error::new(&message).into()
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, String> {
    Decimal::from_str(value.trim()).map_err(|e| format!("Invalid {}: {}", field, e))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DraftLine {
    quantity: Decimal,
    rate: Decimal,
    #[serde(default)]
    discount_percent: Decimal,
    #[serde(default)]
    gst_percent: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderPreview {
    lines: Vec<LineAmounts>,
    #[serde(flatten)]
    totals: PoTotals,
}

fn order_preview(items_json: &str) -> Result<String, String> {
    let drafts: Vec<DraftLine> =
        serde_json::from_str(items_json).map_err(|e| format!("Invalid items JSON: {}", e))?;
    let lines: Vec<LineAmounts> = drafts
        .iter()
        .map(|d| compute_line(d.quantity, d.rate, d.discount_percent, d.gst_percent))
        .collect();
    let totals = compute_totals(&lines);
    serde_json::to_string(&OrderPreview { lines, totals }).map_err(|e| e.to_string())
}

/// Line amounts and order totals for a draft purchase order
#[wasm_bindgen]
pub fn preview_purchase_order(items_json: &str) -> Result<String, JsValue> {
    order_preview(items_json).map_err(js_error)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChallanPreview {
    #[serde(flatten)]
    plan: shared::RequirementPlan,
    shortages: Vec<shared::Shortage>,
}

fn challan_preview(orders_json: &str, mappings_json: &str, stock_json: &str) -> Result<String, String> {
    let orders: Vec<ProductOrder> =
        serde_json::from_str(orders_json).map_err(|e| format!("Invalid products JSON: {}", e))?;
    let mappings: Vec<ProductMaterialMapping> =
        serde_json::from_str(mappings_json).map_err(|e| format!("Invalid mappings JSON: {}", e))?;
    let stock: HashMap<String, Decimal> =
        serde_json::from_str(stock_json).map_err(|e| format!("Invalid stock JSON: {}", e))?;

    let plan = plan_material_requirements(&orders, &mappings).map_err(|e| e.to_string())?;
    let shortages = find_shortages(&plan.aggregated, &stock).map_err(|e| e.to_string())?;
    serde_json::to_string(&ChallanPreview { plan, shortages }).map_err(|e| e.to_string())
}

/// Material requirements for a draft delivery challan, with any shortages
///
/// `stock_json` maps material name to on-hand quantity.
#[wasm_bindgen]
pub fn preview_delivery_challan(
    orders_json: &str,
    mappings_json: &str,
    stock_json: &str,
) -> Result<String, JsValue> {
    challan_preview(orders_json, mappings_json, stock_json).map_err(js_error)
}

fn requirement_total(requirements_json: &str) -> Result<String, String> {
    let reqs: Vec<MaterialRequirement> = serde_json::from_str(requirements_json)
        .map_err(|e| format!("Invalid requirements JSON: {}", e))?;
    Ok(reqs.iter().map(|r| r.total_qty).sum::<Decimal>().to_string())
}

/// Sum of an aggregated requirement list
#[wasm_bindgen]
pub fn total_requirement(requirements_json: &str) -> Result<String, JsValue> {
    requirement_total(requirements_json).map_err(js_error)
}

fn remainder(qty_sent: &str, used: &str, not_used: &str) -> Result<String, String> {
    let sent = parse_decimal("qtySent", qty_sent)?;
    let used = parse_decimal("used", used)?;
    let not_used = parse_decimal("notUsed", not_used)?;
    Ok(still_with_jobber(sent, used, not_used).to_string())
}

/// Quantity still with the jobber for one line
#[wasm_bindgen]
pub fn calculate_still_with_jobber(
    qty_sent: &str,
    used: &str,
    not_used: &str,
) -> Result<String, JsValue> {
    remainder(qty_sent, used, not_used).map_err(js_error)
}

fn reconciliation_errors(lines_json: &str) -> Result<Option<String>, String> {
    let lines: Vec<ReconciliationLine> =
        serde_json::from_str(lines_json).map_err(|e| format!("Invalid lines JSON: {}", e))?;
    Ok(validate_reconciliation(&lines).err().map(|e| e.to_string()))
}

/// Check reconciliation lines; returns the violation message, if any
#[wasm_bindgen]
pub fn check_reconciliation(lines_json: &str) -> Result<Option<String>, JsValue> {
    reconciliation_errors(lines_json).map_err(js_error)
}

fn receipt_pending(
    ordered: &str,
    previous_received: &str,
    received: &str,
    extra_allowed: &str,
    previous_extra: &str,
    extra_received: &str,
) -> Result<String, String> {
    let pending = grn_pending(
        parse_decimal("orderedQuantity", ordered)?,
        parse_decimal("previousReceived", previous_received)?,
        parse_decimal("receivedQuantity", received)?,
    );
    let extra_pending = grn_extra_pending(
        parse_decimal("extraAllowedQty", extra_allowed)?,
        parse_decimal("previousExtraReceived", previous_extra)?,
        parse_decimal("extraReceivedQty", extra_received)?,
    );
    serde_json::to_string(&serde_json::json!({
        "pending": pending,
        "extraPending": extra_pending,
    }))
    .map_err(|e| e.to_string())
}

/// Pending and extra-pending for a goods receipt line
#[wasm_bindgen]
pub fn calculate_grn_pending(
    ordered: &str,
    previous_received: &str,
    received: &str,
    extra_allowed: &str,
    previous_extra: &str,
    extra_received: &str,
) -> Result<String, JsValue> {
    receipt_pending(
        ordered,
        previous_received,
        received,
        extra_allowed,
        previous_extra,
        extra_received,
    )
    .map_err(js_error)
}

fn words(amount: &str) -> Result<String, String> {
    Ok(amount_in_words(parse_decimal("amount", amount)?))
}

/// Rupee amount in words
#[wasm_bindgen]
pub fn amount_to_words(amount: &str) -> Result<String, JsValue> {
    words(amount).map_err(js_error)
}

#[wasm_bindgen]
pub fn is_valid_gstin(gstin: &str) -> bool {
    validate_gstin(gstin).is_ok()
}

#[wasm_bindgen]
pub fn is_valid_phone(phone: &str) -> bool {
    validate_indian_phone(phone).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_preview() {
        let json = order_preview(
            r#"[{"quantity": "10", "rate": "100", "discountPercent": "10", "gstPercent": "5"}]"#,
        )
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let amount = |v: &serde_json::Value| Decimal::from_str(v.as_str().unwrap()).unwrap();
        assert_eq!(amount(&value["totalAmount"]), Decimal::from(945));
        assert_eq!(amount(&value["totalCGST"]), Decimal::new(225, 1));
        assert_eq!(amount(&value["lines"][0]["taxable"]), Decimal::from(900));
        assert_eq!(value["amountInWords"], "Rupees Nine Hundred Forty Five Only");
    }

    #[test]
    fn test_order_preview_rejects_bad_json() {
        assert!(order_preview("not json").is_err());
    }

    #[test]
    fn test_challan_preview_reports_shortage() {
        let json = challan_preview(
            r#"[{"product_name": "Premium T-Shirt", "carton_qty": 150}]"#,
            r#"[{"product_name": "Premium T-Shirt", "materials": [{"material_name": "materialA", "qty_per_carton": "2"}]}]"#,
            r#"{"materialA": "250"}"#,
        )
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["aggregated"][0]["total_qty"], "300");
        assert_eq!(value["shortages"][0]["material_name"], "materialA");
    }

    #[test]
    fn test_remainder() {
        assert_eq!(remainder("100", "50", "10").unwrap(), "40");
        assert!(remainder("abc", "0", "0").is_err());
    }

    #[test]
    fn test_reconciliation_check() {
        let ok = reconciliation_errors(
            r#"[{"materialName": "Poly Bag", "qtySent": "100", "used": "60", "notUsed": "40"}]"#,
        )
        .unwrap();
        assert_eq!(ok, None);

        let bad = reconciliation_errors(
            r#"[{"materialName": "Poly Bag", "qtySent": "100", "used": "60", "notUsed": "50"}]"#,
        )
        .unwrap();
        assert!(bad.unwrap().contains("Poly Bag"));
    }

    #[test]
    fn test_receipt_pending() {
        let json = receipt_pending("100", "40", "30", "5", "0", "2").unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["pending"], "30");
        assert_eq!(value["extraPending"], "3");
    }

    #[test]
    fn test_words_and_formats() {
        assert_eq!(words("945").unwrap(), "Rupees Nine Hundred Forty Five Only");
        assert!(is_valid_gstin("27AAPFU0939F1ZV"));
        assert!(!is_valid_phone("12345"));
    }
}
