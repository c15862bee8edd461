//! Approval-gated stock movements: damage write-offs and material requests
//!
//! Both records start Pending and are decided once by an admin. Approval
//! deducts the material in the same transaction as the status write.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use shared::{
    validate_positive_quantity, ApprovalDecision, ApprovalStatus, DamagedStock, LedgerEntryType,
    MaterialKind, MaterialRequest, Shortage, StateMachine,
};

use crate::error::{AppError, AppResult};
use crate::events::{EventBus, StockEvent};
use crate::middleware::AuthUser;
use crate::services::material::{append_ledger, deduct_stock, lock_material, LedgerAppend};

const DAMAGE_SELECT: &str = r#"
    SELECT d.id, d.material_id, m.kind AS material_kind, m.name AS material_name, d.quantity,
           d.reason, d.reported_by, d.status, d.decided_by, d.decided_at, d.created_at
    FROM damaged_stock d
    JOIN materials m ON m.id = d.material_id
"#;

const REQUEST_SELECT: &str = r#"
    SELECT r.id, r.material_id, m.kind AS material_kind, m.name AS material_name, r.quantity,
           r.department, r.purpose, r.requested_by, r.status, r.decided_by, r.decided_at,
           r.created_at
    FROM material_requests r
    JOIN materials m ON m.id = r.material_id
"#;

/// Admin decision body
#[derive(Debug, Deserialize)]
pub struct DecisionInput {
    pub decision: ApprovalDecision,
}

/// Input for reporting damaged stock
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDamageInput {
    pub material_id: Uuid,
    pub quantity: Decimal,
    pub reason: String,
}

/// Input for requesting material issue
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequestInput {
    pub material_id: Uuid,
    pub quantity: Decimal,
    pub department: String,
    pub purpose: Option<String>,
}

#[derive(Debug, FromRow)]
struct DamageRow {
    id: Uuid,
    material_id: Uuid,
    material_kind: String,
    material_name: String,
    quantity: Decimal,
    reason: String,
    reported_by: Uuid,
    status: String,
    decided_by: Option<Uuid>,
    decided_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<DamageRow> for DamagedStock {
    type Error = AppError;

    fn try_from(row: DamageRow) -> Result<Self, Self::Error> {
        Ok(DamagedStock {
            id: row.id,
            material_id: row.material_id,
            material_kind: parse_kind(&row.material_kind)?,
            material_name: row.material_name,
            quantity: row.quantity,
            reason: row.reason,
            reported_by: row.reported_by,
            status: parse_status(&row.status)?,
            decided_by: row.decided_by,
            decided_at: row.decided_at,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct RequestRow {
    id: Uuid,
    material_id: Uuid,
    material_kind: String,
    material_name: String,
    quantity: Decimal,
    department: String,
    purpose: Option<String>,
    requested_by: Uuid,
    status: String,
    decided_by: Option<Uuid>,
    decided_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<RequestRow> for MaterialRequest {
    type Error = AppError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        Ok(MaterialRequest {
            id: row.id,
            material_id: row.material_id,
            material_kind: parse_kind(&row.material_kind)?,
            material_name: row.material_name,
            quantity: row.quantity,
            department: row.department,
            purpose: row.purpose,
            requested_by: row.requested_by,
            status: parse_status(&row.status)?,
            decided_by: row.decided_by,
            decided_at: row.decided_at,
            created_at: row.created_at,
        })
    }
}

fn parse_kind(kind: &str) -> AppResult<MaterialKind> {
    MaterialKind::from_str(kind)
        .ok_or_else(|| AppError::Internal(format!("Unknown material kind {}", kind)))
}

fn parse_status(status: &str) -> AppResult<ApprovalStatus> {
    ApprovalStatus::from_str(status)
        .ok_or_else(|| AppError::Internal(format!("Unknown approval status {}", status)))
}

/// Stock left after an approved deduction
struct Deducted {
    material_id: Uuid,
    kind: MaterialKind,
    name: String,
    quantity: Decimal,
}

/// Deduct an approved quantity and append the matching ledger entry
async fn deduct_approved(
    conn: &mut PgConnection,
    material_id: Uuid,
    quantity: Decimal,
    entry_type: LedgerEntryType,
    reference: &str,
) -> AppResult<Deducted> {
    let material = lock_material(&mut *conn, material_id).await?;
    if !deduct_stock(&mut *conn, material_id, quantity).await? {
        return Err(AppError::InsufficientStock(vec![Shortage {
            material_name: material.name,
            required: quantity,
            available: material.quantity,
        }]));
    }
    append_ledger(
        &mut *conn,
        LedgerAppend {
            material_id,
            entry_type,
            quantity,
            unit_price: material.per_quantity_price,
            supplier: None,
            reference: Some(reference),
        },
    )
    .await?;

    Ok(Deducted {
        material_id,
        kind: material.kind,
        name: material.name,
        quantity: material.quantity - quantity,
    })
}

async fn ensure_material(db: &PgPool, material_id: Uuid) -> AppResult<()> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM materials WHERE id = $1)")
        .bind(material_id)
        .fetch_one(db)
        .await?;
    if exists {
        Ok(())
    } else {
        Err(AppError::NotFound("Material".to_string()))
    }
}

fn publish_deduction(events: &EventBus, deducted: Deducted, reference: String) {
    events.publish(StockEvent::MaterialStockChanged {
        material_id: deducted.material_id,
        kind: deducted.kind,
        name: deducted.name,
        quantity: deducted.quantity,
        reference: Some(reference),
    });
}

/// Damaged stock service
#[derive(Clone)]
pub struct DamagedStockService {
    db: PgPool,
    events: EventBus,
}

impl DamagedStockService {
    pub fn new(db: PgPool, events: EventBus) -> Self {
        Self { db, events }
    }

    pub async fn list(&self) -> AppResult<Vec<DamagedStock>> {
        let rows = sqlx::query_as::<_, DamageRow>(&format!("{} ORDER BY d.created_at DESC", DAMAGE_SELECT))
            .fetch_all(&self.db)
            .await?;

        rows.into_iter().map(DamagedStock::try_from).collect()
    }

    pub async fn get(&self, id: Uuid) -> AppResult<DamagedStock> {
        let row = sqlx::query_as::<_, DamageRow>(&format!("{} WHERE d.id = $1", DAMAGE_SELECT))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Damaged stock record".to_string()))?;

        row.try_into()
    }

    pub async fn report(&self, user: &AuthUser, input: ReportDamageInput) -> AppResult<DamagedStock> {
        validate_positive_quantity(input.quantity).map_err(|msg| AppError::validation("quantity", msg))?;
        if input.reason.trim().is_empty() {
            return Err(AppError::validation("reason", "Reason is required"));
        }
        ensure_material(&self.db, input.material_id).await?;

        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO damaged_stock (material_id, quantity, reason, reported_by, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(input.material_id)
        .bind(input.quantity)
        .bind(input.reason.trim())
        .bind(user.user_id)
        .bind(ApprovalStatus::Pending.as_str())
        .fetch_one(&self.db)
        .await?;

        self.get(id).await
    }

    /// Approve or reject; approval writes the stock off
    pub async fn decide(
        &self,
        id: Uuid,
        user: &AuthUser,
        input: DecisionInput,
    ) -> AppResult<DamagedStock> {
        user.require_admin()?;

        let mut tx = self.db.begin().await?;
        let row = sqlx::query_as::<_, DamageRow>(&format!("{} WHERE d.id = $1 FOR UPDATE OF d", DAMAGE_SELECT))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Damaged stock record".to_string()))?;
        let record: DamagedStock = row.try_into()?;
        let next = record.status.transition_to(input.decision.target())?;

        let reference = format!("DMG-{}", record.id.simple());
        let deducted = if next == ApprovalStatus::Approved {
            Some(
                deduct_approved(
                    &mut tx,
                    record.material_id,
                    record.quantity,
                    LedgerEntryType::Damage,
                    &reference,
                )
                .await?,
            )
        } else {
            None
        };

        sqlx::query(
            "UPDATE damaged_stock SET status = $1, decided_by = $2, decided_at = NOW() WHERE id = $3",
        )
        .bind(next.as_str())
        .bind(user.user_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            record_id = %id,
            material = %record.material_name,
            status = %next,
            "Damaged stock decided"
        );
        if let Some(deducted) = deducted {
            publish_deduction(&self.events, deducted, reference);
        }

        self.get(id).await
    }
}

/// Material request service
#[derive(Clone)]
pub struct MaterialRequestService {
    db: PgPool,
    events: EventBus,
}

impl MaterialRequestService {
    pub fn new(db: PgPool, events: EventBus) -> Self {
        Self { db, events }
    }

    pub async fn list(&self) -> AppResult<Vec<MaterialRequest>> {
        let rows = sqlx::query_as::<_, RequestRow>(&format!("{} ORDER BY r.created_at DESC", REQUEST_SELECT))
            .fetch_all(&self.db)
            .await?;

        rows.into_iter().map(MaterialRequest::try_from).collect()
    }

    pub async fn get(&self, id: Uuid) -> AppResult<MaterialRequest> {
        let row = sqlx::query_as::<_, RequestRow>(&format!("{} WHERE r.id = $1", REQUEST_SELECT))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Material request".to_string()))?;

        row.try_into()
    }

    pub async fn create(&self, user: &AuthUser, input: CreateRequestInput) -> AppResult<MaterialRequest> {
        validate_positive_quantity(input.quantity).map_err(|msg| AppError::validation("quantity", msg))?;
        if input.department.trim().is_empty() {
            return Err(AppError::validation("department", "Department is required"));
        }
        ensure_material(&self.db, input.material_id).await?;

        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO material_requests (material_id, quantity, department, purpose, requested_by, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(input.material_id)
        .bind(input.quantity)
        .bind(input.department.trim())
        .bind(&input.purpose)
        .bind(user.user_id)
        .bind(ApprovalStatus::Pending.as_str())
        .fetch_one(&self.db)
        .await?;

        self.get(id).await
    }

    /// Approve or reject; approval issues the material
    pub async fn decide(
        &self,
        id: Uuid,
        user: &AuthUser,
        input: DecisionInput,
    ) -> AppResult<MaterialRequest> {
        user.require_admin()?;

        let mut tx = self.db.begin().await?;
        let row = sqlx::query_as::<_, RequestRow>(&format!("{} WHERE r.id = $1 FOR UPDATE OF r", REQUEST_SELECT))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Material request".to_string()))?;
        let request: MaterialRequest = row.try_into()?;
        let next = request.status.transition_to(input.decision.target())?;

        let reference = format!("MR-{}", request.id.simple());
        let deducted = if next == ApprovalStatus::Approved {
            Some(
                deduct_approved(
                    &mut tx,
                    request.material_id,
                    request.quantity,
                    LedgerEntryType::Issue,
                    &reference,
                )
                .await?,
            )
        } else {
            None
        };

        sqlx::query(
            "UPDATE material_requests SET status = $1, decided_by = $2, decided_at = NOW() WHERE id = $3",
        )
        .bind(next.as_str())
        .bind(user.user_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            request_id = %id,
            material = %request.material_name,
            department = %request.department,
            status = %next,
            "Material request decided"
        );
        if let Some(deducted) = deducted {
            publish_deduction(&self.events, deducted, reference);
        }

        self.get(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_body() {
        let input: DecisionInput = serde_json::from_value(serde_json::json!({"decision": "approve"})).unwrap();
        assert_eq!(input.decision.target(), ApprovalStatus::Approved);
    }

    #[test]
    fn test_row_status_parsing() {
        assert_eq!(parse_status("Rejected").unwrap(), ApprovalStatus::Rejected);
        assert!(parse_status("Maybe").is_err());
        assert_eq!(parse_kind("raw").unwrap(), MaterialKind::Raw);
    }
}
