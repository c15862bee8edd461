//! Packing and raw material catalog models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog a material belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialKind {
    Packing,
    Raw,
}

impl MaterialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialKind::Packing => "packing",
            MaterialKind::Raw => "raw",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "packing" => Some(MaterialKind::Packing),
            "raw" => Some(MaterialKind::Raw),
            _ => None,
        }
    }
}

impl std::fmt::Display for MaterialKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaterialKind::Packing => write!(f, "Packing Material"),
            MaterialKind::Raw => write!(f, "Raw Material"),
        }
    }
}

/// A packing or raw material with its on-hand and work-in-progress counters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub id: Uuid,
    pub kind: MaterialKind,
    pub name: String,
    /// On-hand quantity
    pub quantity: Decimal,
    pub per_quantity_price: Decimal,
    pub used_qty: Decimal,
    #[serde(rename = "ownUnitWIP")]
    pub own_unit_wip: Decimal,
    #[serde(rename = "jobberWIP")]
    pub jobber_wip: Decimal,
    pub stock_alert_threshold: Decimal,
    pub unit: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Material {
    /// Below the configured alert threshold (strict)
    pub fn is_alerted(&self) -> bool {
        self.quantity < self.stock_alert_threshold
    }

    pub fn total_wip(&self) -> Decimal {
        self.own_unit_wip + self.jobber_wip
    }

    pub fn stock_value(&self) -> Decimal {
        self.quantity * self.per_quantity_price
    }
}

/// Kind of movement recorded in a material's price history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEntryType {
    #[serde(rename = "OPENING")]
    Opening,
    #[serde(rename = "STOCK-IN")]
    StockIn,
    #[serde(rename = "DC-OUT")]
    DcOut,
    #[serde(rename = "DC-RETURN")]
    DcReturn,
    #[serde(rename = "GRN-IN")]
    GrnIn,
    #[serde(rename = "DAMAGE")]
    Damage,
    #[serde(rename = "ISSUE")]
    Issue,
}

impl LedgerEntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerEntryType::Opening => "OPENING",
            LedgerEntryType::StockIn => "STOCK-IN",
            LedgerEntryType::DcOut => "DC-OUT",
            LedgerEntryType::DcReturn => "DC-RETURN",
            LedgerEntryType::GrnIn => "GRN-IN",
            LedgerEntryType::Damage => "DAMAGE",
            LedgerEntryType::Issue => "ISSUE",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "OPENING" => Some(LedgerEntryType::Opening),
            "STOCK-IN" => Some(LedgerEntryType::StockIn),
            "DC-OUT" => Some(LedgerEntryType::DcOut),
            "DC-RETURN" => Some(LedgerEntryType::DcReturn),
            "GRN-IN" => Some(LedgerEntryType::GrnIn),
            "DAMAGE" => Some(LedgerEntryType::Damage),
            "ISSUE" => Some(LedgerEntryType::Issue),
            _ => None,
        }
    }

    /// Outbound movements carry a negative quantity in the ledger
    pub fn is_outbound(&self) -> bool {
        matches!(
            self,
            LedgerEntryType::DcOut | LedgerEntryType::Damage | LedgerEntryType::Issue
        )
    }

    /// Apply the ledger sign convention to an unsigned quantity
    pub fn signed(&self, quantity: Decimal) -> Decimal {
        if self.is_outbound() {
            -quantity.abs()
        } else {
            quantity.abs()
        }
    }
}

/// One append-only price history entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceHistoryEntry {
    pub id: Uuid,
    pub material_id: Uuid,
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub entry_type: LedgerEntryType,
    pub supplier: Option<String>,
    /// Signed quantity delta
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub total: Decimal,
    pub reference: Option<String>,
}

/// Signed ledger quantity and total for a movement
pub fn ledger_amounts(
    entry_type: LedgerEntryType,
    quantity: Decimal,
    unit_price: Decimal,
) -> (Decimal, Decimal) {
    let signed = entry_type.signed(quantity);
    (signed, signed * unit_price)
}
