//! Finished-goods stock ledger

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::delivery_challan::{DcProduct, UnitType};

/// Stock history action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StockAction {
    Add,
    Transfer,
    Adjust,
}

impl StockAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockAction::Add => "ADD",
            StockAction::Transfer => "TRANSFER",
            StockAction::Adjust => "ADJUST",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ADD" => Some(StockAction::Add),
            "TRANSFER" => Some(StockAction::Transfer),
            "ADJUST" => Some(StockAction::Adjust),
            _ => None,
        }
    }

    /// Own-unit production adds stock; jobber production arrives as a transfer
    pub fn for_unit(unit_type: UnitType) -> Self {
        match unit_type {
            UnitType::OwnUnit => StockAction::Add,
            UnitType::Jobber => StockAction::Transfer,
        }
    }
}

impl fmt::Display for StockAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastProductionDetails {
    pub unit_type: UnitType,
    pub carton_qty: i32,
    pub date: NaiveDate,
}

/// Aggregated finished-goods stock for one product
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductStock {
    pub id: Uuid,
    pub product_name: String,
    pub own_unit_stock: i32,
    pub jobber_stock: i32,
    pub alert_threshold: i32,
    pub last_updated_from: Option<String>,
    pub last_production_details: Option<LastProductionDetails>,
    pub last_updated: DateTime<Utc>,
}

impl ProductStock {
    pub fn current_stock(&self) -> i32 {
        self.own_unit_stock + self.jobber_stock
    }

    /// Below the configured alert threshold (strict)
    pub fn is_alerted(&self) -> bool {
        self.current_stock() < self.alert_threshold
    }
}

/// Append-only stock history entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockHistoryEntry {
    pub id: Uuid,
    pub product_name: String,
    pub action: StockAction,
    pub quantity: i32,
    pub unit_type: Option<UnitType>,
    pub reference: Option<String>,
    pub date: DateTime<Utc>,
}

/// Stock change booked for one product line of a completed DC
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockCompletion {
    pub product_name: String,
    pub action: StockAction,
    pub own_unit_delta: i32,
    pub jobber_delta: i32,
    pub carton_qty: i32,
}

/// Stock changes for every product line of a DC being completed
pub fn completion_entries(unit_type: UnitType, products: &[DcProduct]) -> Vec<StockCompletion> {
    products
        .iter()
        .map(|p| {
            let (own_unit_delta, jobber_delta) = match unit_type {
                UnitType::OwnUnit => (p.carton_qty, 0),
                UnitType::Jobber => (0, p.carton_qty),
            };
            StockCompletion {
                product_name: p.product_name.clone(),
                action: StockAction::for_unit(unit_type),
                own_unit_delta,
                jobber_delta,
                carton_qty: p.carton_qty,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str, cartons: i32) -> DcProduct {
        DcProduct {
            product_name: name.to_string(),
            carton_qty: cartons,
            materials: vec![],
        }
    }

    #[test]
    fn test_own_unit_completion_adds() {
        let entries = completion_entries(UnitType::OwnUnit, &[product("Shirt", 40)]);
        assert_eq!(entries[0].own_unit_delta, 40);
        assert_eq!(entries[0].jobber_delta, 0);
        assert_eq!(entries[0].action, StockAction::Add);
    }

    #[test]
    fn test_jobber_completion_transfers() {
        let entries =
            completion_entries(UnitType::Jobber, &[product("Shirt", 40), product("Trouser", 7)]);
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.action == StockAction::Transfer));
        assert_eq!(entries[1].jobber_delta, 7);
    }

    #[test]
    fn test_alert_uses_current_stock() {
        let stock = ProductStock {
            id: Uuid::nil(),
            product_name: "Shirt".to_string(),
            own_unit_stock: 4,
            jobber_stock: 5,
            alert_threshold: 10,
            last_updated_from: None,
            last_production_details: None,
            last_updated: Utc::now(),
        };
        assert_eq!(stock.current_stock(), 9);
        assert!(stock.is_alerted());
    }

    #[test]
    fn test_action_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&StockAction::Transfer).unwrap(), "\"TRANSFER\"");
    }
}
