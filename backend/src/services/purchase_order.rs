//! Purchase order service
//!
//! Line and order totals come from the pure calculators in `shared`; this
//! service resolves material names, draws PO numbers, and guards the status
//! table together with the GRN lock that follows cancellation.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{types::Json, FromRow, PgConnection, PgPool};
use uuid::Uuid;

use shared::{
    compute_line, compute_totals, format_po_number, po_sequence_scope, validate_po_items,
    weekly_stats, GrnStatus, MaterialKind, MaterialType, PoItemInput, PoLine, PoStatus, PoTotals,
    PurchaseOrder, StateMachine, SupplierType, WeeklyStat,
};

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::sequence::next_sequence;

const PO_COLUMNS: &str = "id, po_number, supplier_id, supplier_name, material_type, items, \
     taxable_amount, total_cgst, total_sgst, grand_total, round_off, total_amount, \
     amount_in_words, status, order_date, remarks, created_at, updated_at";

/// Purchase order service
#[derive(Clone)]
pub struct PurchaseOrderService {
    db: PgPool,
}

#[derive(Debug, FromRow)]
struct PoRow {
    id: Uuid,
    po_number: String,
    supplier_id: Uuid,
    supplier_name: String,
    material_type: String,
    items: Json<Vec<PoLine>>,
    taxable_amount: Decimal,
    total_cgst: Decimal,
    total_sgst: Decimal,
    grand_total: Decimal,
    round_off: Decimal,
    total_amount: Decimal,
    amount_in_words: String,
    status: String,
    order_date: NaiveDate,
    remarks: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PoRow> for PurchaseOrder {
    type Error = AppError;

    fn try_from(row: PoRow) -> Result<Self, Self::Error> {
        let material_type = MaterialType::from_str(&row.material_type).ok_or_else(|| {
            AppError::Internal(format!("Unknown material type {}", row.material_type))
        })?;
        let status = PoStatus::from_str(&row.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown PO status {}", row.status)))?;
        Ok(PurchaseOrder {
            id: row.id,
            po_number: row.po_number,
            supplier_id: row.supplier_id,
            supplier_name: row.supplier_name,
            material_type,
            items: row.items.0,
            totals: PoTotals {
                taxable_amount: row.taxable_amount,
                total_cgst: row.total_cgst,
                total_sgst: row.total_sgst,
                grand_total: row.grand_total,
                round_off: row.round_off,
                total_amount: row.total_amount,
                amount_in_words: row.amount_in_words,
            },
            status,
            order_date: row.order_date,
            remarks: row.remarks,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Input for raising a purchase order
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePoInput {
    pub supplier_id: Uuid,
    pub items: Vec<PoItemInput>,
    pub order_date: Option<NaiveDate>,
    pub remarks: Option<String>,
}

/// Input for editing an order still in Ordered
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePoInput {
    pub supplier_id: Option<Uuid>,
    pub items: Vec<PoItemInput>,
    pub order_date: Option<NaiveDate>,
    pub remarks: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PoStatusInput {
    pub status: PoStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoListQuery {
    pub status: Option<PoStatus>,
    pub material_type: Option<MaterialType>,
}

struct OrderSupplier {
    name: String,
    material_type: MaterialType,
}

async fn order_supplier(conn: &mut PgConnection, supplier_id: Uuid) -> AppResult<OrderSupplier> {
    let (name, supplier_type, material_type) = sqlx::query_as::<_, (String, String, String)>(
        "SELECT name, supplier_type, material_type FROM suppliers WHERE id = $1",
    )
    .bind(supplier_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Supplier".to_string()))?;

    if SupplierType::from_str(&supplier_type) == Some(SupplierType::Jobber) {
        return Err(AppError::validation(
            "supplierId",
            "Purchase orders are raised against material suppliers, not jobbers",
        ));
    }
    let material_type = MaterialType::from_str(&material_type)
        .ok_or_else(|| AppError::Internal(format!("Unknown material type {}", material_type)))?;
    Ok(OrderSupplier {
        name,
        material_type,
    })
}

/// Resolve item materials and compute each line
async fn build_lines(
    conn: &mut PgConnection,
    material_type: MaterialType,
    items: &[PoItemInput],
) -> AppResult<Vec<PoLine>> {
    validate_po_items(items)?;

    let ids: Vec<Uuid> = items.iter().map(|i| i.material_id).collect();
    let materials: HashMap<Uuid, (String, String)> =
        sqlx::query_as::<_, (Uuid, String, String)>(
            "SELECT id, name, kind FROM materials WHERE id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(conn)
        .await?
        .into_iter()
        .map(|(id, name, kind)| (id, (name, kind)))
        .collect();

    items
        .iter()
        .map(|item| {
            let (name, kind) = materials
                .get(&item.material_id)
                .ok_or_else(|| AppError::NotFound(format!("Material {}", item.material_id)))?;
            let kind = MaterialKind::from_str(kind)
                .ok_or_else(|| AppError::Internal(format!("Unknown material kind {}", kind)))?;
            if !material_type.accepts(kind) {
                return Err(AppError::validation(
                    "items",
                    format!("{} is a {} material; supplier handles {}", name, kind.as_str(), material_type),
                ));
            }
            Ok(PoLine {
                material_id: item.material_id,
                material_name: name.clone(),
                quantity: item.quantity,
                rate: item.rate,
                discount_percent: item.discount_percent,
                gst_percent: item.gst_percent,
                extra_allowed_qty: item.extra_allowed_qty,
                amounts: compute_line(item.quantity, item.rate, item.discount_percent, item.gst_percent),
            })
        })
        .collect()
}

fn totals_of(lines: &[PoLine]) -> PoTotals {
    compute_totals(lines.iter().map(|l| &l.amounts))
}

impl PurchaseOrderService {
    /// Create a new PurchaseOrderService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list(&self, query: PoListQuery) -> AppResult<Vec<PurchaseOrder>> {
        let rows = sqlx::query_as::<_, PoRow>(&format!(
            r#"
            SELECT {} FROM purchase_orders
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR material_type = $2)
            ORDER BY created_at DESC
            "#,
            PO_COLUMNS
        ))
        .bind(query.status.map(|s| s.as_str()))
        .bind(query.material_type.map(|m| m.as_str()))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(PurchaseOrder::try_from).collect()
    }

    pub async fn get(&self, id: Uuid) -> AppResult<PurchaseOrder> {
        let row = sqlx::query_as::<_, PoRow>(&format!(
            "SELECT {} FROM purchase_orders WHERE id = $1",
            PO_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Purchase order".to_string()))?;

        row.try_into()
    }

    async fn lock(&self, conn: &mut PgConnection, id: Uuid) -> AppResult<PurchaseOrder> {
        let row = sqlx::query_as::<_, PoRow>(&format!(
            "SELECT {} FROM purchase_orders WHERE id = $1 FOR UPDATE",
            PO_COLUMNS
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Purchase order".to_string()))?;

        row.try_into()
    }

    pub async fn create(&self, input: CreatePoInput) -> AppResult<PurchaseOrder> {
        let order_date = input.order_date.unwrap_or_else(|| Utc::now().date_naive());

        let mut tx = self.db.begin().await?;

        let supplier = order_supplier(&mut tx, input.supplier_id).await?;
        let lines = build_lines(&mut tx, supplier.material_type, &input.items).await?;
        let totals = totals_of(&lines);

        let scope = po_sequence_scope(order_date.year(), order_date.month());
        let po_number = format_po_number(
            order_date.year(),
            order_date.month(),
            next_sequence(&mut tx, &scope).await?,
        );

        let row = sqlx::query_as::<_, PoRow>(&format!(
            r#"
            INSERT INTO purchase_orders (po_number, supplier_id, supplier_name, material_type, items,
                                         taxable_amount, total_cgst, total_sgst, grand_total,
                                         round_off, total_amount, amount_in_words, status,
                                         order_date, remarks)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {}
            "#,
            PO_COLUMNS
        ))
        .bind(&po_number)
        .bind(input.supplier_id)
        .bind(&supplier.name)
        .bind(supplier.material_type.as_str())
        .bind(Json(&lines))
        .bind(totals.taxable_amount)
        .bind(totals.total_cgst)
        .bind(totals.total_sgst)
        .bind(totals.grand_total)
        .bind(totals.round_off)
        .bind(totals.total_amount)
        .bind(&totals.amount_in_words)
        .bind(PoStatus::Ordered.as_str())
        .bind(order_date)
        .bind(&input.remarks)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::on_unique_violation(e, "poNumber"))?;

        tx.commit().await?;

        tracing::info!(
            po_number = %po_number,
            supplier = %supplier.name,
            total_amount = %totals.total_amount,
            "Purchase order created"
        );
        row.try_into()
    }

    /// Replace items and recompute totals; only while Ordered
    pub async fn update(&self, id: Uuid, input: UpdatePoInput) -> AppResult<PurchaseOrder> {
        let mut tx = self.db.begin().await?;
        let po = self.lock(&mut tx, id).await?;

        if po.status != PoStatus::Ordered {
            return Err(AppError::InvalidStateTransition(format!(
                "Purchase order {} is {} and can no longer be edited",
                po.po_number, po.status
            )));
        }

        let supplier_id = input.supplier_id.unwrap_or(po.supplier_id);
        let supplier = order_supplier(&mut tx, supplier_id).await?;
        let lines = build_lines(&mut tx, supplier.material_type, &input.items).await?;
        let totals = totals_of(&lines);

        let row = sqlx::query_as::<_, PoRow>(&format!(
            r#"
            UPDATE purchase_orders
            SET supplier_id = $1, supplier_name = $2, material_type = $3, items = $4,
                taxable_amount = $5, total_cgst = $6, total_sgst = $7, grand_total = $8,
                round_off = $9, total_amount = $10, amount_in_words = $11,
                order_date = $12, remarks = $13, updated_at = NOW()
            WHERE id = $14
            RETURNING {}
            "#,
            PO_COLUMNS
        ))
        .bind(supplier_id)
        .bind(&supplier.name)
        .bind(supplier.material_type.as_str())
        .bind(Json(&lines))
        .bind(totals.taxable_amount)
        .bind(totals.total_cgst)
        .bind(totals.total_sgst)
        .bind(totals.grand_total)
        .bind(totals.round_off)
        .bind(totals.total_amount)
        .bind(&totals.amount_in_words)
        .bind(input.order_date.unwrap_or(po.order_date))
        .bind(input.remarks.or(po.remarks))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    /// Move an order through the status table
    ///
    /// Cancelling locks the order's GRN against further receipts; re-ordering
    /// a cancelled PO unlocks it.
    pub async fn update_status(
        &self,
        id: Uuid,
        user: &AuthUser,
        input: PoStatusInput,
    ) -> AppResult<PurchaseOrder> {
        let mut tx = self.db.begin().await?;
        let po = self.lock(&mut tx, id).await?;
        let next = po.status.transition_to(input.status)?;

        match next {
            PoStatus::Approved => user.require_admin()?,
            PoStatus::Cancelled => {
                let grn_status = sqlx::query_scalar::<_, String>(
                    "SELECT status FROM grns WHERE po_id = $1 FOR UPDATE",
                )
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
                if grn_status.as_deref().and_then(GrnStatus::from_str) == Some(GrnStatus::Completed) {
                    return Err(AppError::InvalidStateTransition(format!(
                        "Purchase order {} has a completed GRN and cannot be cancelled",
                        po.po_number
                    )));
                }
                sqlx::query("UPDATE grns SET locked = TRUE, updated_at = NOW() WHERE po_id = $1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
            }
            PoStatus::Ordered => {
                sqlx::query("UPDATE grns SET locked = FALSE, updated_at = NOW() WHERE po_id = $1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
            }
            PoStatus::Completed => {}
        }

        let row = sqlx::query_as::<_, PoRow>(&format!(
            "UPDATE purchase_orders SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING {}",
            PO_COLUMNS
        ))
        .bind(next.as_str())
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            po_number = %po.po_number,
            from = %po.status,
            to = %next,
            user_id = %user.user_id,
            "Purchase order status changed"
        );
        row.try_into()
    }

    /// Delete an order no goods have been received against
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        let po = self.lock(&mut tx, id).await?;

        let has_grn = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM grns WHERE po_id = $1)")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if has_grn {
            return Err(AppError::Conflict {
                resource: "purchase_order".to_string(),
                message: format!("Purchase order {} already has a GRN", po.po_number),
            });
        }

        sqlx::query("DELETE FROM purchase_orders WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(po_number = %po.po_number, "Purchase order deleted");
        Ok(())
    }

    /// Count and value of orders created on each of the last seven days
    pub async fn weekly_stats(&self) -> AppResult<Vec<WeeklyStat>> {
        let today = Utc::now().date_naive();
        let since = today - Duration::days(6);

        let per_day: Vec<WeeklyStat> = sqlx::query_as::<_, (NaiveDate, i64, Decimal)>(
            r#"
            SELECT created_at::date AS day, COUNT(*), COALESCE(SUM(total_amount), 0)
            FROM purchase_orders
            WHERE created_at::date >= $1
            GROUP BY day
            "#,
        )
        .bind(since)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(|(date, count, total_amount)| WeeklyStat {
            date,
            count,
            total_amount,
        })
        .collect();

        Ok(weekly_stats(today, &per_day))
    }
}
