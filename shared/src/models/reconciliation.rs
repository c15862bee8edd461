//! Material reconciliation: used / not-used bookkeeping against quantity sent
//!
//! The same line rule applies to delivery challan material updates and to
//! the raw-material, packing, and finished-goods reconciliation batches.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::state::StateMachine;
use crate::validation::validate_quantity_scale;

/// One material line under reconciliation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationLine {
    pub material_name: String,
    pub qty_sent: Decimal,
    pub used: Decimal,
    pub not_used: Decimal,
}

impl ReconciliationLine {
    /// `qtySent − (used + notUsed)`
    pub fn still_with_jobber(&self) -> Decimal {
        still_with_jobber(self.qty_sent, self.used, self.not_used)
    }

    pub fn check(&self) -> Result<(), LineViolation> {
        let kind = if self.used < Decimal::ZERO || self.not_used < Decimal::ZERO {
            Some(ViolationKind::Negative)
        } else if validate_quantity_scale(self.used).is_err()
            || validate_quantity_scale(self.not_used).is_err()
        {
            Some(ViolationKind::TooPrecise)
        } else if self.used + self.not_used > self.qty_sent {
            Some(ViolationKind::ExceedsSent)
        } else {
            None
        };

        match kind {
            None => Ok(()),
            Some(kind) => Err(LineViolation {
                material_name: self.material_name.clone(),
                qty_sent: self.qty_sent,
                used: self.used,
                not_used: self.not_used,
                kind,
            }),
        }
    }
}

/// `qtySent − (used + notUsed)`
pub fn still_with_jobber(qty_sent: Decimal, used: Decimal, not_used: Decimal) -> Decimal {
    qty_sent - (used + not_used)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Negative,
    TooPrecise,
    ExceedsSent,
}

/// A line that broke the `used + notUsed ≤ qtySent` rule
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineViolation {
    pub material_name: String,
    pub qty_sent: Decimal,
    pub used: Decimal,
    pub not_used: Decimal,
    pub kind: ViolationKind,
}

impl fmt::Display for LineViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ViolationKind::Negative => write!(
                f,
                "{}: used ({}) and not used ({}) cannot be negative",
                self.material_name, self.used, self.not_used
            ),
            ViolationKind::TooPrecise => write!(
                f,
                "{}: used ({}) and not used ({}) allow at most 3 decimal places",
                self.material_name, self.used, self.not_used
            ),
            ViolationKind::ExceedsSent => write!(
                f,
                "{}: used ({}) + not used ({}) = {} exceeds quantity sent ({})",
                self.material_name,
                self.used,
                self.not_used,
                self.used + self.not_used,
                self.qty_sent
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReconciliationError {
    #[error("Invalid material quantities: {}", join_violations(.0))]
    InvalidLines(Vec<LineViolation>),

    #[error("Total products produced must be a positive number when completing")]
    MissingProductsProduced,

    #[error("No material line {material_name} for product {product_name}")]
    UnknownLine {
        product_name: String,
        material_name: String,
    },

    #[error("At least one material line is required")]
    Empty,
}

fn join_violations(violations: &[LineViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Check every line, reporting all violations at once
pub fn validate_reconciliation(lines: &[ReconciliationLine]) -> Result<(), ReconciliationError> {
    let violations: Vec<LineViolation> = lines.iter().filter_map(|l| l.check().err()).collect();
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ReconciliationError::InvalidLines(violations))
    }
}

/// Completing requires a positive `totalProductsProduced`
pub fn validate_completion(
    completing: bool,
    total_products_produced: Option<Decimal>,
) -> Result<(), ReconciliationError> {
    if !completing {
        return Ok(());
    }
    match total_products_produced {
        Some(n) if n > Decimal::ZERO => Ok(()),
        _ => Err(ReconciliationError::MissingProductsProduced),
    }
}

/// Which module a reconciliation batch belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchKind {
    RawJobber,
    Packing,
    FinishedGoods,
}

impl BatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchKind::RawJobber => "raw_jobber",
            BatchKind::Packing => "packing",
            BatchKind::FinishedGoods => "finished_goods",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "raw_jobber" => Some(BatchKind::RawJobber),
            "packing" => Some(BatchKind::Packing),
            "finished_goods" => Some(BatchKind::FinishedGoods),
            _ => None,
        }
    }
}

/// Reconciliation batch status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchStatus {
    Open,
    Partial,
    Completed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Open => "Open",
            BatchStatus::Partial => "Partial",
            BatchStatus::Completed => "Completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Open" => Some(BatchStatus::Open),
            "Partial" => Some(BatchStatus::Partial),
            "Completed" => Some(BatchStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StateMachine for BatchStatus {
    const ENTITY: &'static str = "Reconciliation batch";
    const TRANSITIONS: &'static [(Self, Self)] = &[
        (BatchStatus::Open, BatchStatus::Partial),
        (BatchStatus::Open, BatchStatus::Completed),
        (BatchStatus::Partial, BatchStatus::Partial),
        (BatchStatus::Partial, BatchStatus::Completed),
    ];
}

/// A reconciliation line together with its derived remainder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledLine {
    #[serde(flatten)]
    pub line: ReconciliationLine,
    pub still_with_jobber: Decimal,
}

impl From<ReconciliationLine> for ReconciledLine {
    fn from(line: ReconciliationLine) -> Self {
        let still_with_jobber = line.still_with_jobber();
        Self {
            line,
            still_with_jobber,
        }
    }
}

/// A stored reconciliation batch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationBatch {
    pub id: Uuid,
    pub kind: BatchKind,
    pub batch_ref: String,
    pub dc_id: Option<Uuid>,
    pub status: BatchStatus,
    pub lines: Vec<ReconciledLine>,
    pub total_products_produced: Option<Decimal>,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(sent: i64, used: i64, not_used: i64) -> ReconciliationLine {
        ReconciliationLine {
            material_name: "Poly Bag".to_string(),
            qty_sent: Decimal::from(sent),
            used: Decimal::from(used),
            not_used: Decimal::from(not_used),
        }
    }

    #[test]
    fn test_still_with_jobber() {
        assert_eq!(line(100, 60, 30).still_with_jobber(), Decimal::from(10));
        assert_eq!(line(100, 60, 40).still_with_jobber(), Decimal::ZERO);
    }

    #[test]
    fn test_over_reconciled_line_is_rejected() {
        let err = validate_reconciliation(&[line(100, 60, 50)]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Poly Bag"));
        assert!(msg.contains("110"));
        assert!(msg.contains("100"));
    }

    #[test]
    fn test_negative_quantities_rejected() {
        assert!(line(100, -1, 0).check().is_err());
    }

    #[test]
    fn test_sub_milli_quantities_rejected() {
        let mut l = line(100, 60, 0);
        l.not_used = Decimal::new(5, 4);
        assert_eq!(l.check().unwrap_err().kind, ViolationKind::TooPrecise);

        l.not_used = Decimal::new(5, 3);
        assert!(l.check().is_ok());
    }

    #[test]
    fn test_completion_requires_products_produced() {
        assert!(validate_completion(false, None).is_ok());
        assert_eq!(
            validate_completion(true, None),
            Err(ReconciliationError::MissingProductsProduced)
        );
        assert!(validate_completion(true, Some(Decimal::ZERO)).is_err());
        assert!(validate_completion(true, Some(Decimal::from(12))).is_ok());
    }

    #[test]
    fn test_batch_status_table() {
        assert!(BatchStatus::Open.can_transition_to(BatchStatus::Completed));
        assert!(BatchStatus::Completed.is_terminal());
        assert!(!BatchStatus::Partial.can_transition_to(BatchStatus::Open));
    }
}
