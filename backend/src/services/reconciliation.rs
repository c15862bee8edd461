//! Reconciliation batch service

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{types::Json, FromRow, PgPool};
use uuid::Uuid;

use shared::{
    validate_completion, validate_reconciliation, BatchKind, BatchStatus, ReconciledLine,
    ReconciliationBatch, ReconciliationLine, StateMachine,
};

use crate::error::{AppError, AppResult};

const BATCH_COLUMNS: &str = "id, kind, batch_ref, dc_id, status, lines, total_products_produced, \
     remarks, created_at, updated_at";

/// Reconciliation service
#[derive(Clone)]
pub struct ReconciliationService {
    db: PgPool,
}

#[derive(Debug, FromRow)]
struct BatchRow {
    id: Uuid,
    kind: String,
    batch_ref: String,
    dc_id: Option<Uuid>,
    status: String,
    lines: Json<Vec<ReconciledLine>>,
    total_products_produced: Option<Decimal>,
    remarks: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BatchRow> for ReconciliationBatch {
    type Error = AppError;

    fn try_from(row: BatchRow) -> Result<Self, Self::Error> {
        let kind = BatchKind::from_str(&row.kind)
            .ok_or_else(|| AppError::Internal(format!("Unknown batch kind {}", row.kind)))?;
        let status = BatchStatus::from_str(&row.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown batch status {}", row.status)))?;
        Ok(ReconciliationBatch {
            id: row.id,
            kind,
            batch_ref: row.batch_ref,
            dc_id: row.dc_id,
            status,
            lines: row.lines.0,
            total_products_produced: row.total_products_produced,
            remarks: row.remarks,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Input for recording a batch
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBatchInput {
    pub kind: BatchKind,
    pub batch_ref: String,
    pub dc_id: Option<Uuid>,
    pub status: Option<BatchStatus>,
    pub lines: Vec<ReconciliationLine>,
    pub total_products_produced: Option<Decimal>,
    pub remarks: Option<String>,
}

/// Input for re-submitting a batch
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBatchInput {
    pub status: BatchStatus,
    pub lines: Option<Vec<ReconciliationLine>>,
    pub total_products_produced: Option<Decimal>,
    pub remarks: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchListQuery {
    pub kind: Option<BatchKind>,
}

fn check_lines(lines: &[ReconciliationLine]) -> AppResult<Vec<ReconciledLine>> {
    if lines.is_empty() {
        return Err(AppError::validation("lines", "At least one material line is required"));
    }
    validate_reconciliation(lines)?;
    Ok(lines.iter().cloned().map(ReconciledLine::from).collect())
}

impl ReconciliationService {
    /// Create a new ReconciliationService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list(&self, query: BatchListQuery) -> AppResult<Vec<ReconciliationBatch>> {
        let rows = sqlx::query_as::<_, BatchRow>(&format!(
            r#"
            SELECT {} FROM reconciliation_batches
            WHERE ($1::text IS NULL OR kind = $1)
            ORDER BY created_at DESC
            "#,
            BATCH_COLUMNS
        ))
        .bind(query.kind.map(|k| k.as_str()))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(ReconciliationBatch::try_from).collect()
    }

    pub async fn get(&self, id: Uuid) -> AppResult<ReconciliationBatch> {
        let row = sqlx::query_as::<_, BatchRow>(&format!(
            "SELECT {} FROM reconciliation_batches WHERE id = $1",
            BATCH_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Reconciliation batch".to_string()))?;

        row.try_into()
    }

    pub async fn create(&self, input: CreateBatchInput) -> AppResult<ReconciliationBatch> {
        if input.batch_ref.trim().is_empty() {
            return Err(AppError::validation("batchRef", "Batch reference is required"));
        }
        let status = input.status.unwrap_or(BatchStatus::Open);
        let lines = check_lines(&input.lines)?;
        validate_completion(status == BatchStatus::Completed, input.total_products_produced)?;

        if let Some(dc_id) = input.dc_id {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM delivery_challans WHERE id = $1)",
            )
            .bind(dc_id)
            .fetch_one(&self.db)
            .await?;
            if !exists {
                return Err(AppError::NotFound("Delivery challan".to_string()));
            }
        }

        let row = sqlx::query_as::<_, BatchRow>(&format!(
            r#"
            INSERT INTO reconciliation_batches (kind, batch_ref, dc_id, status, lines,
                                                total_products_produced, remarks)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            BATCH_COLUMNS
        ))
        .bind(input.kind.as_str())
        .bind(input.batch_ref.trim())
        .bind(input.dc_id)
        .bind(status.as_str())
        .bind(Json(&lines))
        .bind(input.total_products_produced)
        .bind(&input.remarks)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(
            batch_ref = %row.batch_ref,
            kind = input.kind.as_str(),
            status = %status,
            "Reconciliation batch recorded"
        );
        row.try_into()
    }

    /// Move a batch forward, optionally replacing its lines
    pub async fn update(&self, id: Uuid, input: UpdateBatchInput) -> AppResult<ReconciliationBatch> {
        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, BatchRow>(&format!(
            "SELECT {} FROM reconciliation_batches WHERE id = $1 FOR UPDATE",
            BATCH_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Reconciliation batch".to_string()))?;
        let batch: ReconciliationBatch = row.try_into()?;

        let status = batch.status.transition_to(input.status)?;
        let lines = match &input.lines {
            Some(lines) => check_lines(lines)?,
            None => batch.lines,
        };
        let produced = input.total_products_produced.or(batch.total_products_produced);
        validate_completion(status == BatchStatus::Completed, produced)?;

        let row = sqlx::query_as::<_, BatchRow>(&format!(
            r#"
            UPDATE reconciliation_batches
            SET status = $1, lines = $2, total_products_produced = $3, remarks = $4,
                updated_at = NOW()
            WHERE id = $5
            RETURNING {}
            "#,
            BATCH_COLUMNS
        ))
        .bind(status.as_str())
        .bind(Json(&lines))
        .bind(produced)
        .bind(input.remarks.or(batch.remarks))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            batch_ref = %row.batch_ref,
            from = %batch.status,
            to = %status,
            "Reconciliation batch updated"
        );
        row.try_into()
    }
}
