//! Approval-gated damage write-offs and material requests

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::material::MaterialKind;
use crate::state::StateMachine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "Pending",
            ApprovalStatus::Approved => "Approved",
            ApprovalStatus::Rejected => "Rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(ApprovalStatus::Pending),
            "Approved" => Some(ApprovalStatus::Approved),
            "Rejected" => Some(ApprovalStatus::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StateMachine for ApprovalStatus {
    const ENTITY: &'static str = "Approval";
    const TRANSITIONS: &'static [(Self, Self)] = &[
        (ApprovalStatus::Pending, ApprovalStatus::Approved),
        (ApprovalStatus::Pending, ApprovalStatus::Rejected),
    ];
}

/// Admin decision on a pending record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalDecision {
    Approve,
    Reject,
}

impl ApprovalDecision {
    pub fn target(&self) -> ApprovalStatus {
        match self {
            ApprovalDecision::Approve => ApprovalStatus::Approved,
            ApprovalDecision::Reject => ApprovalStatus::Rejected,
        }
    }
}

/// Damaged material awaiting write-off
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamagedStock {
    pub id: Uuid,
    pub material_id: Uuid,
    pub material_kind: MaterialKind,
    pub material_name: String,
    pub quantity: Decimal,
    pub reason: String,
    pub reported_by: Uuid,
    pub status: ApprovalStatus,
    pub decided_by: Option<Uuid>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Cross-department request to draw material from stores
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialRequest {
    pub id: Uuid,
    pub material_id: Uuid,
    pub material_kind: MaterialKind,
    pub material_name: String,
    pub quantity: Decimal,
    pub department: String,
    pub purpose: Option<String>,
    pub requested_by: Uuid,
    pub status: ApprovalStatus,
    pub decided_by: Option<Uuid>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
