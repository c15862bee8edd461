//! Goods receipt service
//!
//! One GRN per purchase order. The first receipt creates it from the order
//! lines; later receipts roll the previous figures into the running totals.
//! Accepted quantity goes into stock in the same transaction.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{types::Json, FromRow, PgConnection, PgPool};
use uuid::Uuid;

use shared::{
    grn_number_for, grn_status_for, Grn, GrnError, GrnItem, GrnStatus, LedgerEntryType, PoLine,
    PoStatus, StateMachine,
};

use crate::error::{AppError, AppResult};
use crate::events::{EventBus, StockEvent};
use crate::services::material::{add_to_stock, append_ledger, lock_material, LedgerAppend};

const GRN_COLUMNS: &str =
    "id, grn_number, po_id, po_number, items, status, locked, received_date, created_at, updated_at";

/// GRN service
#[derive(Clone)]
pub struct GrnService {
    db: PgPool,
    events: EventBus,
}

#[derive(Debug, FromRow)]
struct GrnRow {
    id: Uuid,
    grn_number: String,
    po_id: Uuid,
    po_number: String,
    items: Json<Vec<GrnItem>>,
    status: String,
    locked: bool,
    received_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<GrnRow> for Grn {
    type Error = AppError;

    fn try_from(row: GrnRow) -> Result<Self, Self::Error> {
        let status = GrnStatus::from_str(&row.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown GRN status {}", row.status)))?;
        Ok(Grn {
            id: row.id,
            grn_number: row.grn_number,
            po_id: row.po_id,
            po_number: row.po_number,
            items: row.items.0,
            status,
            locked: row.locked,
            received_date: row.received_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct OrderRow {
    po_number: String,
    supplier_name: String,
    status: String,
    items: Json<Vec<PoLine>>,
}

/// Quantities received for one material in a receipt
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptLine {
    pub material_id: Uuid,
    #[serde(default)]
    pub received_quantity: Decimal,
    #[serde(default)]
    pub extra_received_qty: Decimal,
    #[serde(default)]
    pub damaged_quantity: Decimal,
}

/// Input for recording a receipt against a purchase order
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveInput {
    pub po_id: Uuid,
    pub items: Vec<ReceiptLine>,
}

/// Apply a receipt to the GRN lines; every line rolls forward
fn apply_receipt(items: &mut [GrnItem], receipt: &[ReceiptLine]) -> Result<(), GrnError> {
    let mut names: HashMap<Uuid, &str> = HashMap::new();
    for item in items.iter() {
        if names.insert(item.material_id, &item.material_name).is_some() {
            return Err(GrnError::DuplicateMaterial {
                material_name: item.material_name.clone(),
            });
        }
    }

    let mut by_material: HashMap<Uuid, &ReceiptLine> = HashMap::new();
    for line in receipt {
        let name = names
            .get(&line.material_id)
            .ok_or_else(|| GrnError::UnknownMaterial(line.material_id.to_string()))?;
        if by_material.insert(line.material_id, line).is_some() {
            return Err(GrnError::DuplicateMaterial {
                material_name: name.to_string(),
            });
        }
    }

    let mut staged = items.to_vec();
    for item in staged.iter_mut() {
        match by_material.get(&item.material_id) {
            Some(line) => item.receive(
                line.received_quantity,
                line.extra_received_qty,
                line.damaged_quantity,
            )?,
            None => item.receive(Decimal::ZERO, Decimal::ZERO, Decimal::ZERO)?,
        }
    }
    items.clone_from_slice(&staged);
    Ok(())
}

impl GrnService {
    /// Create a new GrnService instance
    pub fn new(db: PgPool, events: EventBus) -> Self {
        Self { db, events }
    }

    pub async fn list(&self) -> AppResult<Vec<Grn>> {
        let rows = sqlx::query_as::<_, GrnRow>(&format!(
            "SELECT {} FROM grns ORDER BY created_at DESC",
            GRN_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Grn::try_from).collect()
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Grn> {
        let row = sqlx::query_as::<_, GrnRow>(&format!("SELECT {} FROM grns WHERE id = $1", GRN_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("GRN".to_string()))?;

        row.try_into()
    }

    pub async fn get_by_po(&self, po_id: Uuid) -> AppResult<Grn> {
        let row = sqlx::query_as::<_, GrnRow>(&format!(
            "SELECT {} FROM grns WHERE po_id = $1",
            GRN_COLUMNS
        ))
        .bind(po_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("GRN for purchase order".to_string()))?;

        row.try_into()
    }

    async fn lock_grn(&self, conn: &mut PgConnection, po_id: Uuid) -> AppResult<Option<Grn>> {
        let row = sqlx::query_as::<_, GrnRow>(&format!(
            "SELECT {} FROM grns WHERE po_id = $1 FOR UPDATE",
            GRN_COLUMNS
        ))
        .bind(po_id)
        .fetch_optional(conn)
        .await?;

        row.map(Grn::try_from).transpose()
    }

    /// Record a receipt, creating the GRN on first use
    pub async fn receive(&self, input: ReceiveInput) -> AppResult<Grn> {
        if input.items.is_empty() {
            return Err(AppError::validation("items", "At least one received item is required"));
        }

        let mut tx = self.db.begin().await?;

        let order = sqlx::query_as::<_, OrderRow>(
            "SELECT po_number, supplier_name, status, items FROM purchase_orders WHERE id = $1 FOR UPDATE",
        )
        .bind(input.po_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Purchase order".to_string()))?;
        let po_status = PoStatus::from_str(&order.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown PO status {}", order.status)))?;

        let existing = self.lock_grn(&mut tx, input.po_id).await?;
        if existing.as_ref().is_some_and(|g| g.locked) || po_status == PoStatus::Cancelled {
            return Err(AppError::InvalidStateTransition(format!(
                "GRN for {} is locked because the purchase order was cancelled",
                order.po_number
            )));
        }
        if po_status != PoStatus::Approved {
            return Err(AppError::InvalidStateTransition(format!(
                "Purchase order {} is {}; goods are received only against approved orders",
                order.po_number, po_status
            )));
        }

        let (current, mut items) = match &existing {
            Some(grn) => (grn.status, grn.items.clone()),
            None => (
                GrnStatus::Pending,
                order
                    .items
                    .iter()
                    .map(|l| {
                        GrnItem::for_order(l.material_id, &l.material_name, l.quantity, l.extra_allowed_qty)
                    })
                    .collect(),
            ),
        };
        if current.is_terminal() {
            return Err(AppError::InvalidStateTransition(format!(
                "GRN for {} is already completed",
                order.po_number
            )));
        }

        apply_receipt(&mut items, &input.items)?;
        let status = current.transition_to(grn_status_for(&items))?;
        let grn_number = grn_number_for(&order.po_number);

        let rates: HashMap<Uuid, Decimal> =
            order.items.iter().map(|l| (l.material_id, l.rate)).collect();
        let mut changed = Vec::new();
        for item in &items {
            let accepted = item.accepted_quantity();
            if accepted <= Decimal::ZERO {
                continue;
            }
            let material = lock_material(&mut tx, item.material_id).await?;
            add_to_stock(&mut tx, material.id, accepted).await?;
            append_ledger(
                &mut tx,
                LedgerAppend {
                    material_id: material.id,
                    entry_type: LedgerEntryType::GrnIn,
                    quantity: accepted,
                    unit_price: rates.get(&material.id).copied().unwrap_or(material.per_quantity_price),
                    supplier: Some(&order.supplier_name),
                    reference: Some(&grn_number),
                },
            )
            .await?;
            changed.push((material.id, material.kind, material.name, material.quantity + accepted));
        }

        let row = match &existing {
            Some(grn) => {
                sqlx::query_as::<_, GrnRow>(&format!(
                    r#"
                    UPDATE grns SET items = $1, status = $2, received_date = NOW(), updated_at = NOW()
                    WHERE id = $3
                    RETURNING {}
                    "#,
                    GRN_COLUMNS
                ))
                .bind(Json(&items))
                .bind(status.as_str())
                .bind(grn.id)
                .fetch_one(&mut *tx)
                .await?
            }
            None => {
                sqlx::query_as::<_, GrnRow>(&format!(
                    r#"
                    INSERT INTO grns (grn_number, po_id, po_number, items, status, received_date)
                    VALUES ($1, $2, $3, $4, $5, NOW())
                    RETURNING {}
                    "#,
                    GRN_COLUMNS
                ))
                .bind(&grn_number)
                .bind(input.po_id)
                .bind(&order.po_number)
                .bind(Json(&items))
                .bind(status.as_str())
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| AppError::on_unique_violation(e, "poId"))?
            }
        };

        if status == GrnStatus::Completed {
            let next = po_status.transition_to(PoStatus::Completed)?;
            sqlx::query("UPDATE purchase_orders SET status = $1, updated_at = NOW() WHERE id = $2")
                .bind(next.as_str())
                .bind(input.po_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::info!(
            grn_number = %grn_number,
            from = %current,
            to = %status,
            "Goods received"
        );
        for (material_id, kind, name, quantity) in changed {
            self.events.publish(StockEvent::MaterialStockChanged {
                material_id,
                kind,
                name,
                quantity,
                reference: Some(grn_number.clone()),
            });
        }

        row.try_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: Uuid, ordered: i64) -> GrnItem {
        GrnItem::for_order(id, "Carton", Decimal::from(ordered), Decimal::from(5))
    }

    fn line(id: Uuid, received: i64) -> ReceiptLine {
        ReceiptLine {
            material_id: id,
            received_quantity: Decimal::from(received),
            extra_received_qty: Decimal::ZERO,
            damaged_quantity: Decimal::ZERO,
        }
    }

    #[test]
    fn test_receipt_rolls_untouched_lines() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut items = vec![item(a, 100), item(b, 50)];

        apply_receipt(&mut items, &[line(a, 40), line(b, 10)]).unwrap();
        apply_receipt(&mut items, &[line(a, 60)]).unwrap();

        assert_eq!(items[0].pending, Decimal::ZERO);
        assert_eq!(items[1].previous_received, Decimal::from(10));
        assert_eq!(items[1].received_quantity, Decimal::ZERO);
        assert_eq!(items[1].pending, Decimal::from(40));
        assert_eq!(grn_status_for(&items), GrnStatus::Partial);
    }

    #[test]
    fn test_over_receipt_leaves_items_untouched() {
        let a = Uuid::new_v4();
        let mut items = vec![item(a, 10)];
        let before = items.clone();

        let err = apply_receipt(&mut items, &[line(a, 11)]).unwrap_err();
        assert!(matches!(err, GrnError::OverReceived { .. }));
        assert_eq!(items, before);
    }

    #[test]
    fn test_repeated_receipt_line_rejected() {
        let a = Uuid::new_v4();
        let mut items = vec![item(a, 100)];
        let before = items.clone();

        let err = apply_receipt(&mut items, &[line(a, 10), line(a, 20)]).unwrap_err();
        assert_eq!(
            err,
            GrnError::DuplicateMaterial {
                material_name: "Carton".to_string()
            }
        );
        assert_eq!(items, before);
    }

    #[test]
    fn test_repeated_order_line_never_double_books() {
        let a = Uuid::new_v4();
        let mut items = vec![item(a, 10), item(a, 10)];

        let err = apply_receipt(&mut items, &[line(a, 10)]).unwrap_err();
        assert!(matches!(err, GrnError::DuplicateMaterial { .. }));
        let booked: Decimal = items.iter().map(|i| i.accepted_quantity()).sum();
        assert_eq!(booked, Decimal::ZERO);
    }

    #[test]
    fn test_unknown_material_rejected() {
        let mut items = vec![item(Uuid::new_v4(), 10)];
        let err = apply_receipt(&mut items, &[line(Uuid::new_v4(), 1)]).unwrap_err();
        assert!(matches!(err, GrnError::UnknownMaterial(_)));
    }
}
