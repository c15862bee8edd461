//! Goods receipt note models

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::state::StateMachine;
use crate::validation::validate_quantity_scale;

/// Goods receipt status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrnStatus {
    Pending,
    Partial,
    Completed,
}

impl GrnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrnStatus::Pending => "Pending",
            GrnStatus::Partial => "Partial",
            GrnStatus::Completed => "Completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(GrnStatus::Pending),
            "Partial" => Some(GrnStatus::Partial),
            "Completed" => Some(GrnStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for GrnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StateMachine for GrnStatus {
    const ENTITY: &'static str = "GRN";
    const TRANSITIONS: &'static [(Self, Self)] = &[
        (GrnStatus::Pending, GrnStatus::Pending),
        (GrnStatus::Pending, GrnStatus::Partial),
        (GrnStatus::Pending, GrnStatus::Completed),
        (GrnStatus::Partial, GrnStatus::Partial),
        (GrnStatus::Partial, GrnStatus::Completed),
    ];
}

/// One received material line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrnItem {
    pub material_id: Uuid,
    pub material_name: String,
    pub ordered_quantity: Decimal,
    /// Cumulative quantity received before the latest receipt
    pub previous_received: Decimal,
    /// Quantity received in the latest receipt
    pub received_quantity: Decimal,
    pub extra_allowed_qty: Decimal,
    pub previous_extra_received: Decimal,
    pub extra_received_qty: Decimal,
    pub damaged_quantity: Decimal,
    pub pending: Decimal,
    pub extra_pending: Decimal,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GrnError {
    #[error("{material_name}: quantities cannot be negative")]
    NegativeQuantity { material_name: String },

    #[error("{material_name}: received {received} exceeds pending {pending}")]
    OverReceived {
        material_name: String,
        received: Decimal,
        pending: Decimal,
    },

    #[error("{material_name}: extra received {received} exceeds extra allowance pending {pending}")]
    ExtraExceeded {
        material_name: String,
        received: Decimal,
        pending: Decimal,
    },

    #[error("{material_name}: damaged {damaged} exceeds quantity received {received}")]
    DamagedExceedsReceived {
        material_name: String,
        damaged: Decimal,
        received: Decimal,
    },

    #[error("Material {0} is not on this order")]
    UnknownMaterial(String),

    #[error("{material_name}: quantities allow at most 3 decimal places")]
    TooPrecise { material_name: String },

    #[error("{material_name}: listed more than once")]
    DuplicateMaterial { material_name: String },
}

/// `ordered − (previousReceived + received)`
pub fn grn_pending(ordered: Decimal, previous_received: Decimal, received: Decimal) -> Decimal {
    ordered - (previous_received + received)
}

/// `extraAllowed − (previousExtraReceived + extraReceived)`
pub fn grn_extra_pending(
    extra_allowed: Decimal,
    previous_extra_received: Decimal,
    extra_received: Decimal,
) -> Decimal {
    extra_allowed - (previous_extra_received + extra_received)
}

impl GrnItem {
    /// Fresh line for an ordered material
    pub fn for_order(
        material_id: Uuid,
        material_name: impl Into<String>,
        ordered_quantity: Decimal,
        extra_allowed_qty: Decimal,
    ) -> Self {
        let mut item = Self {
            material_id,
            material_name: material_name.into(),
            ordered_quantity,
            previous_received: Decimal::ZERO,
            received_quantity: Decimal::ZERO,
            extra_allowed_qty,
            previous_extra_received: Decimal::ZERO,
            extra_received_qty: Decimal::ZERO,
            damaged_quantity: Decimal::ZERO,
            pending: Decimal::ZERO,
            extra_pending: Decimal::ZERO,
        };
        item.derive();
        item
    }

    /// Recompute `pending` and `extraPending`
    pub fn derive(&mut self) {
        self.pending = grn_pending(
            self.ordered_quantity,
            self.previous_received,
            self.received_quantity,
        );
        self.extra_pending = grn_extra_pending(
            self.extra_allowed_qty,
            self.previous_extra_received,
            self.extra_received_qty,
        );
    }

    pub fn validate(&self) -> Result<(), GrnError> {
        if self.received_quantity < Decimal::ZERO
            || self.extra_received_qty < Decimal::ZERO
            || self.damaged_quantity < Decimal::ZERO
        {
            return Err(GrnError::NegativeQuantity {
                material_name: self.material_name.clone(),
            });
        }
        let precise = [
            self.received_quantity,
            self.extra_received_qty,
            self.damaged_quantity,
        ]
        .into_iter()
        .all(|q| validate_quantity_scale(q).is_ok());
        if !precise {
            return Err(GrnError::TooPrecise {
                material_name: self.material_name.clone(),
            });
        }
        if self.pending < Decimal::ZERO {
            return Err(GrnError::OverReceived {
                material_name: self.material_name.clone(),
                received: self.received_quantity,
                pending: self.pending + self.received_quantity,
            });
        }
        if self.extra_pending < Decimal::ZERO {
            return Err(GrnError::ExtraExceeded {
                material_name: self.material_name.clone(),
                received: self.extra_received_qty,
                pending: self.extra_pending + self.extra_received_qty,
            });
        }
        let received = self.received_quantity + self.extra_received_qty;
        if self.damaged_quantity > received {
            return Err(GrnError::DamagedExceedsReceived {
                material_name: self.material_name.clone(),
                damaged: self.damaged_quantity,
                received,
            });
        }
        Ok(())
    }

    /// Record a new receipt, rolling the previous one into the running totals
    pub fn receive(
        &mut self,
        received: Decimal,
        extra_received: Decimal,
        damaged: Decimal,
    ) -> Result<(), GrnError> {
        let mut next = self.clone();
        next.previous_received += next.received_quantity;
        next.previous_extra_received += next.extra_received_qty;
        next.received_quantity = received;
        next.extra_received_qty = extra_received;
        next.damaged_quantity = damaged;
        next.derive();
        next.validate()?;
        *self = next;
        Ok(())
    }

    /// Good quantity from the latest receipt that goes into stock
    pub fn accepted_quantity(&self) -> Decimal {
        self.received_quantity + self.extra_received_qty - self.damaged_quantity
    }

    pub fn total_received(&self) -> Decimal {
        self.previous_received + self.received_quantity
    }
}

/// Status implied by the current item figures
pub fn grn_status_for(items: &[GrnItem]) -> GrnStatus {
    if !items.is_empty() && items.iter().all(|i| i.pending <= Decimal::ZERO) {
        GrnStatus::Completed
    } else if items.iter().any(|i| i.total_received() > Decimal::ZERO) {
        GrnStatus::Partial
    } else {
        GrnStatus::Pending
    }
}

/// A stored goods receipt note
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grn {
    pub id: Uuid,
    pub grn_number: String,
    pub po_id: Uuid,
    pub po_number: String,
    pub items: Vec<GrnItem>,
    pub status: GrnStatus,
    pub locked: bool,
    pub received_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// GRN numbers mirror the purchase order they receive against
pub fn grn_number_for(po_number: &str) -> String {
    match po_number.strip_prefix("PO-") {
        Some(rest) => format!("GRN-{}", rest),
        None => format!("GRN-{}", po_number),
    }
}
