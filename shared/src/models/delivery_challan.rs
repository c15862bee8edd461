//! Delivery challan models and the material requirement planner
//!
//! A delivery challan (DC) issues packing material to a jobber or to an own
//! production unit for a set of products. Requirements are derived from the
//! product recipes, aggregated by material name, and checked against a
//! stock snapshot before anything is written.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::mapping::ProductMaterialMapping;
use super::reconciliation::{ReconciliationError, ReconciliationLine};
use crate::state::StateMachine;

/// Where the material is issued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitType {
    #[serde(rename = "Own Unit")]
    OwnUnit,
    Jobber,
}

impl UnitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitType::OwnUnit => "Own Unit",
            UnitType::Jobber => "Jobber",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Own Unit" => Some(UnitType::OwnUnit),
            "Jobber" => Some(UnitType::Jobber),
            _ => None,
        }
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery challan status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DcStatus {
    Pending,
    Partial,
    Completed,
}

impl DcStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DcStatus::Pending => "Pending",
            DcStatus::Partial => "Partial",
            DcStatus::Completed => "Completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(DcStatus::Pending),
            "Partial" => Some(DcStatus::Partial),
            "Completed" => Some(DcStatus::Completed),
            _ => None,
        }
    }

    /// Statuses a client may request on update
    pub fn from_update_target(s: &str) -> Option<Self> {
        match Self::from_str(s)? {
            DcStatus::Pending => None,
            status => Some(status),
        }
    }
}

impl fmt::Display for DcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StateMachine for DcStatus {
    const ENTITY: &'static str = "Delivery challan";
    const TRANSITIONS: &'static [(Self, Self)] = &[
        (DcStatus::Pending, DcStatus::Partial),
        (DcStatus::Pending, DcStatus::Completed),
        (DcStatus::Partial, DcStatus::Partial),
        (DcStatus::Partial, DcStatus::Completed),
    ];
}

/// One material line on a DC product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcMaterialLine {
    pub material_name: String,
    pub qty_per_carton: Decimal,
    pub total_qty: Decimal,
    #[serde(default)]
    pub used: Decimal,
    #[serde(default, rename = "notUsed")]
    pub not_used: Decimal,
    #[serde(rename = "stillWithJobber")]
    pub still_with_jobber: Decimal,
}

impl DcMaterialLine {
    fn issued(material_name: &str, qty_per_carton: Decimal, carton_qty: i32) -> Self {
        let total_qty = qty_per_carton * Decimal::from(carton_qty);
        Self {
            material_name: material_name.to_string(),
            qty_per_carton,
            total_qty,
            used: Decimal::ZERO,
            not_used: Decimal::ZERO,
            still_with_jobber: total_qty,
        }
    }
}

/// A product line on a DC
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcProduct {
    pub product_name: String,
    pub carton_qty: i32,
    pub materials: Vec<DcMaterialLine>,
}

/// A persisted delivery challan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryChallan {
    pub id: Uuid,
    pub dc_no: String,
    pub unit_type: UnitType,
    pub supplier_id: Option<Uuid>,
    pub person_name: Option<String>,
    pub products: Vec<DcProduct>,
    pub status: DcStatus,
    pub date: NaiveDate,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Requested product and carton count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductOrder {
    pub product_name: String,
    pub carton_qty: i32,
}

/// Total quantity of one material across a whole DC
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialRequirement {
    pub material_name: String,
    pub total_qty: Decimal,
}

/// Planned product lines plus their by-material aggregate (sorted by name)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementPlan {
    pub products: Vec<DcProduct>,
    pub aggregated: Vec<MaterialRequirement>,
}

/// Material with less stock on hand than the DC needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shortage {
    pub material_name: String,
    pub required: Decimal,
    pub available: Decimal,
}

impl fmt::Display for Shortage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (required {}, available {})",
            self.material_name, self.required, self.available
        )
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanningError {
    #[error("At least one product is required")]
    NoProducts,

    #[error("Carton quantity for {0} must be positive")]
    InvalidCartonQty(String),

    #[error("Product {0} is listed more than once")]
    DuplicateProduct(String),

    #[error("No material mapping found for product {0}")]
    MissingMapping(String),

    #[error("Material {0} not found")]
    MissingMaterial(String),
}

/// Resolve recipes, multiply by cartons, and aggregate identical materials
pub fn plan_material_requirements(
    orders: &[ProductOrder],
    mappings: &[ProductMaterialMapping],
) -> Result<RequirementPlan, PlanningError> {
    if orders.is_empty() {
        return Err(PlanningError::NoProducts);
    }

    let recipes: HashMap<&str, &ProductMaterialMapping> = mappings
        .iter()
        .map(|m| (m.product_name.as_str(), m))
        .collect();

    let mut products = Vec::with_capacity(orders.len());
    let mut totals: BTreeMap<String, Decimal> = BTreeMap::new();
    let mut seen = HashSet::new();

    for order in orders {
        if order.carton_qty <= 0 {
            return Err(PlanningError::InvalidCartonQty(order.product_name.clone()));
        }
        if !seen.insert(order.product_name.as_str()) {
            return Err(PlanningError::DuplicateProduct(order.product_name.clone()));
        }
        let recipe = recipes
            .get(order.product_name.as_str())
            .ok_or_else(|| PlanningError::MissingMapping(order.product_name.clone()))?;

        let materials: Vec<DcMaterialLine> = recipe
            .materials
            .iter()
            .map(|m| DcMaterialLine::issued(&m.material_name, m.qty_per_carton, order.carton_qty))
            .collect();

        for line in &materials {
            *totals.entry(line.material_name.clone()).or_default() += line.total_qty;
        }

        products.push(DcProduct {
            product_name: order.product_name.clone(),
            carton_qty: order.carton_qty,
            materials,
        });
    }

    let aggregated = totals
        .into_iter()
        .map(|(material_name, total_qty)| MaterialRequirement {
            material_name,
            total_qty,
        })
        .collect();

    Ok(RequirementPlan {
        products,
        aggregated,
    })
}

/// Every requirement that exceeds the on-hand quantity in `available`
///
/// A requirement whose material is absent from the snapshot is a not-found
/// error rather than a shortage.
pub fn find_shortages(
    requirements: &[MaterialRequirement],
    available: &HashMap<String, Decimal>,
) -> Result<Vec<Shortage>, PlanningError> {
    let mut shortages = Vec::new();
    for req in requirements {
        let on_hand = *available
            .get(&req.material_name)
            .ok_or_else(|| PlanningError::MissingMaterial(req.material_name.clone()))?;
        if on_hand < req.total_qty {
            shortages.push(Shortage {
                material_name: req.material_name.clone(),
                required: req.total_qty,
                available: on_hand,
            });
        }
    }
    Ok(shortages)
}

/// Format a DC number: `DC-<year>-<0001>`
pub fn format_dc_no(year: i32, sequence: i64) -> String {
    format!("DC-{}-{:04}", year, sequence)
}

/// Parse `DC-<year>-<seq>` into its parts
pub fn parse_dc_no(dc_no: &str) -> Option<(i32, i64)> {
    let mut parts = dc_no.split('-');
    if parts.next()? != "DC" {
        return None;
    }
    let year = parts.next()?.parse().ok()?;
    let seq = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((year, seq))
}

/// New used / not-used figures for one material line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialUsageUpdate {
    pub product_name: String,
    pub material_name: String,
    pub used: Decimal,
    #[serde(rename = "notUsed")]
    pub not_used: Decimal,
}

/// Net change a usage update makes to one material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageDelta {
    pub material_name: String,
    pub used_delta: Decimal,
    pub not_used_delta: Decimal,
}

impl UsageDelta {
    /// Quantity leaving work-in-progress because it has been accounted for
    pub fn wip_release(&self) -> Decimal {
        self.used_delta + self.not_used_delta
    }
}

/// Apply usage updates to DC product lines
///
/// All lines are validated before any is changed; on error `products` is
/// left untouched. Returns the per-material deltas, sorted by name.
pub fn apply_material_usage(
    products: &mut [DcProduct],
    updates: &[MaterialUsageUpdate],
) -> Result<Vec<UsageDelta>, ReconciliationError> {
    if updates.is_empty() {
        return Err(ReconciliationError::Empty);
    }

    let mut staged = products.to_vec();
    let mut checks = Vec::with_capacity(updates.len());

    for update in updates {
        let line = staged
            .iter_mut()
            .filter(|p| p.product_name == update.product_name)
            .flat_map(|p| p.materials.iter_mut())
            .find(|m| m.material_name == update.material_name)
            .ok_or_else(|| ReconciliationError::UnknownLine {
                product_name: update.product_name.clone(),
                material_name: update.material_name.clone(),
            })?;
        line.used = update.used;
        line.not_used = update.not_used;
        line.still_with_jobber = line.total_qty - (line.used + line.not_used);
        checks.push(ReconciliationLine {
            material_name: line.material_name.clone(),
            qty_sent: line.total_qty,
            used: line.used,
            not_used: line.not_used,
        });
    }

    super::reconciliation::validate_reconciliation(&checks)?;

    let mut deltas: BTreeMap<String, (Decimal, Decimal)> = BTreeMap::new();
    for (before, after) in products.iter().zip(staged.iter()) {
        for (old, new) in before.materials.iter().zip(after.materials.iter()) {
            let used = new.used - old.used;
            let not_used = new.not_used - old.not_used;
            if used.is_zero() && not_used.is_zero() {
                continue;
            }
            let entry = deltas.entry(new.material_name.clone()).or_default();
            entry.0 += used;
            entry.1 += not_used;
        }
    }

    products.clone_from_slice(&staged);

    Ok(deltas
        .into_iter()
        .map(|(material_name, (used_delta, not_used_delta))| UsageDelta {
            material_name,
            used_delta,
            not_used_delta,
        })
        .collect())
}

/// Quantity still out with the unit, aggregated by material name
pub fn outstanding_by_material(products: &[DcProduct]) -> Vec<MaterialRequirement> {
    let mut totals: BTreeMap<String, Decimal> = BTreeMap::new();
    for line in products.iter().flat_map(|p| p.materials.iter()) {
        if line.still_with_jobber > Decimal::ZERO {
            *totals.entry(line.material_name.clone()).or_default() += line.still_with_jobber;
        }
    }
    totals
        .into_iter()
        .map(|(material_name, total_qty)| MaterialRequirement {
            material_name,
            total_qty,
        })
        .collect()
}
