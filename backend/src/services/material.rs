//! Packing and raw material catalog service
//!
//! Also hosts the row-locking and ledger helpers the delivery challan, GRN,
//! and approval flows run inside their own transactions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use shared::{
    ledger_amounts, validate_non_negative, validate_positive_quantity, validate_quantity_scale,
    LedgerEntryType, Material, MaterialKind, PriceHistoryEntry,
};

use crate::error::{AppError, AppResult};
use crate::events::{EventBus, StockEvent};

const MATERIAL_COLUMNS: &str = "id, kind, name, quantity, per_quantity_price, used_qty, \
     own_unit_wip, jobber_wip, stock_alert_threshold, unit, created_at, updated_at";

/// Material catalog service
#[derive(Clone)]
pub struct MaterialService {
    db: PgPool,
    events: EventBus,
}

#[derive(Debug, FromRow)]
struct MaterialRow {
    id: Uuid,
    kind: String,
    name: String,
    quantity: Decimal,
    per_quantity_price: Decimal,
    used_qty: Decimal,
    own_unit_wip: Decimal,
    jobber_wip: Decimal,
    stock_alert_threshold: Decimal,
    unit: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MaterialRow> for Material {
    type Error = AppError;

    fn try_from(row: MaterialRow) -> Result<Self, Self::Error> {
        let kind = MaterialKind::from_str(&row.kind)
            .ok_or_else(|| AppError::Internal(format!("Unknown material kind {}", row.kind)))?;
        Ok(Material {
            id: row.id,
            kind,
            name: row.name,
            quantity: row.quantity,
            per_quantity_price: row.per_quantity_price,
            used_qty: row.used_qty,
            own_unit_wip: row.own_unit_wip,
            jobber_wip: row.jobber_wip,
            stock_alert_threshold: row.stock_alert_threshold,
            unit: row.unit,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_materials(rows: Vec<MaterialRow>) -> AppResult<Vec<Material>> {
    rows.into_iter().map(Material::try_from).collect()
}

#[derive(Debug, FromRow)]
struct LedgerRow {
    id: Uuid,
    material_id: Uuid,
    entry_date: DateTime<Utc>,
    entry_type: String,
    supplier: Option<String>,
    quantity: Decimal,
    unit_price: Decimal,
    total: Decimal,
    reference: Option<String>,
}

impl TryFrom<LedgerRow> for PriceHistoryEntry {
    type Error = AppError;

    fn try_from(row: LedgerRow) -> Result<Self, Self::Error> {
        let entry_type = LedgerEntryType::from_str(&row.entry_type).ok_or_else(|| {
            AppError::Internal(format!("Unknown ledger entry type {}", row.entry_type))
        })?;
        Ok(PriceHistoryEntry {
            id: row.id,
            material_id: row.material_id,
            date: row.entry_date,
            entry_type,
            supplier: row.supplier,
            quantity: row.quantity,
            unit_price: row.unit_price,
            total: row.total,
            reference: row.reference,
        })
    }
}

/// Input for creating a material
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMaterialInput {
    pub name: String,
    #[serde(default)]
    pub quantity: Decimal,
    #[serde(default)]
    pub per_quantity_price: Decimal,
    #[serde(default)]
    pub stock_alert_threshold: Decimal,
    pub unit: Option<String>,
}

/// Input for updating a material's master data
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMaterialInput {
    pub name: Option<String>,
    pub per_quantity_price: Option<Decimal>,
    pub stock_alert_threshold: Option<Decimal>,
    pub unit: Option<String>,
}

/// Input for receiving stock outside a purchase order
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddStockInput {
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub supplier: Option<String>,
    pub reference: Option<String>,
}

/// Query for the alert listing
#[derive(Debug, Deserialize)]
pub struct AlertQuery {
    pub kind: Option<MaterialKind>,
}

/// One ledger append
pub struct LedgerAppend<'a> {
    pub material_id: Uuid,
    pub entry_type: LedgerEntryType,
    /// Unsigned; the sign comes from the entry type
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub supplier: Option<&'a str>,
    pub reference: Option<&'a str>,
}

/// Append a price history entry
pub async fn append_ledger(conn: &mut PgConnection, entry: LedgerAppend<'_>) -> AppResult<()> {
    let (signed, total) = ledger_amounts(entry.entry_type, entry.quantity, entry.unit_price);
    sqlx::query(
        r#"
        INSERT INTO material_ledger (material_id, entry_type, supplier, quantity, unit_price, total, reference)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(entry.material_id)
    .bind(entry.entry_type.as_str())
    .bind(entry.supplier)
    .bind(signed)
    .bind(entry.unit_price)
    .bind(total)
    .bind(entry.reference)
    .execute(conn)
    .await?;
    Ok(())
}

/// Lock the named materials of one kind, in name order
pub async fn lock_materials_by_name(
    conn: &mut PgConnection,
    kind: MaterialKind,
    names: &[String],
) -> AppResult<Vec<Material>> {
    let rows = sqlx::query_as::<_, MaterialRow>(&format!(
        "SELECT {} FROM materials WHERE kind = $1 AND name = ANY($2) ORDER BY name FOR UPDATE",
        MATERIAL_COLUMNS
    ))
    .bind(kind.as_str())
    .bind(names)
    .fetch_all(conn)
    .await?;
    into_materials(rows)
}

/// Lock one material row
pub async fn lock_material(conn: &mut PgConnection, id: Uuid) -> AppResult<Material> {
    let row = sqlx::query_as::<_, MaterialRow>(&format!(
        "SELECT {} FROM materials WHERE id = $1 FOR UPDATE",
        MATERIAL_COLUMNS
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Material".to_string()))?;
    row.try_into()
}

/// Conditional decrement; `false` when stock is short
pub async fn deduct_stock(conn: &mut PgConnection, id: Uuid, quantity: Decimal) -> AppResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE materials
        SET quantity = quantity - $1, updated_at = NOW()
        WHERE id = $2 AND quantity >= $1
        "#,
    )
    .bind(quantity)
    .bind(id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Add received stock
pub async fn add_to_stock(conn: &mut PgConnection, id: Uuid, quantity: Decimal) -> AppResult<()> {
    sqlx::query("UPDATE materials SET quantity = quantity + $1, updated_at = NOW() WHERE id = $2")
        .bind(quantity)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

impl MaterialService {
    /// Create a new MaterialService instance
    pub fn new(db: PgPool, events: EventBus) -> Self {
        Self { db, events }
    }

    /// List materials of one kind
    pub async fn list(&self, kind: MaterialKind) -> AppResult<Vec<Material>> {
        let rows = sqlx::query_as::<_, MaterialRow>(&format!(
            "SELECT {} FROM materials WHERE kind = $1 ORDER BY name",
            MATERIAL_COLUMNS
        ))
        .bind(kind.as_str())
        .fetch_all(&self.db)
        .await?;
        into_materials(rows)
    }

    /// Get a material by ID
    pub async fn get(&self, kind: MaterialKind, id: Uuid) -> AppResult<Material> {
        let row = sqlx::query_as::<_, MaterialRow>(&format!(
            "SELECT {} FROM materials WHERE id = $1 AND kind = $2",
            MATERIAL_COLUMNS
        ))
        .bind(id)
        .bind(kind.as_str())
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(kind.to_string()))?;
        row.try_into()
    }

    /// Create a material, recording any opening stock in the ledger
    pub async fn create(&self, kind: MaterialKind, input: CreateMaterialInput) -> AppResult<Material> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(AppError::validation("name", "Material name is required"));
        }
        for (field, value) in [
            ("quantity", input.quantity),
            ("perQuantityPrice", input.per_quantity_price),
            ("stockAlertThreshold", input.stock_alert_threshold),
        ] {
            validate_non_negative(value).map_err(|msg| AppError::validation(field, msg))?;
        }
        validate_quantity_scale(input.quantity)
            .map_err(|msg| AppError::validation("quantity", msg))?;

        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, MaterialRow>(&format!(
            r#"
            INSERT INTO materials (kind, name, quantity, per_quantity_price, stock_alert_threshold, unit)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            MATERIAL_COLUMNS
        ))
        .bind(kind.as_str())
        .bind(name)
        .bind(input.quantity)
        .bind(input.per_quantity_price)
        .bind(input.stock_alert_threshold)
        .bind(&input.unit)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::on_unique_violation(e, "name"))?;

        if input.quantity > Decimal::ZERO {
            append_ledger(
                &mut tx,
                LedgerAppend {
                    material_id: row.id,
                    entry_type: LedgerEntryType::Opening,
                    quantity: input.quantity,
                    unit_price: input.per_quantity_price,
                    supplier: None,
                    reference: None,
                },
            )
            .await?;
        }

        tx.commit().await?;

        tracing::info!(material = %row.name, kind = %kind, "Material created");
        row.try_into()
    }

    /// Update master data; quantities only move through stock operations
    pub async fn update(
        &self,
        kind: MaterialKind,
        id: Uuid,
        input: UpdateMaterialInput,
    ) -> AppResult<Material> {
        let existing = self.get(kind, id).await?;

        let name = input
            .name
            .as_deref()
            .map(str::trim)
            .unwrap_or(existing.name.as_str())
            .to_string();
        if name.is_empty() {
            return Err(AppError::validation("name", "Material name is required"));
        }
        let price = input.per_quantity_price.unwrap_or(existing.per_quantity_price);
        let threshold = input
            .stock_alert_threshold
            .unwrap_or(existing.stock_alert_threshold);
        validate_non_negative(price).map_err(|msg| AppError::validation("perQuantityPrice", msg))?;
        validate_non_negative(threshold)
            .map_err(|msg| AppError::validation("stockAlertThreshold", msg))?;
        let unit = input.unit.or(existing.unit);

        let row = sqlx::query_as::<_, MaterialRow>(&format!(
            r#"
            UPDATE materials
            SET name = $1, per_quantity_price = $2, stock_alert_threshold = $3, unit = $4,
                updated_at = NOW()
            WHERE id = $5
            RETURNING {}
            "#,
            MATERIAL_COLUMNS
        ))
        .bind(&name)
        .bind(price)
        .bind(threshold)
        .bind(&unit)
        .bind(id)
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::on_unique_violation(e, "name"))?;

        row.try_into()
    }

    /// Delete a material that nothing references yet
    pub async fn delete(&self, kind: MaterialKind, id: Uuid) -> AppResult<()> {
        let material = self.get(kind, id).await?;

        let referenced = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(SELECT 1 FROM material_ledger WHERE material_id = $1 AND entry_type <> 'OPENING')
                OR EXISTS(
                    SELECT 1 FROM product_material_mappings
                    WHERE materials @> jsonb_build_array(jsonb_build_object('material_name', $2::text))
                )
                OR EXISTS(
                    SELECT 1 FROM purchase_orders
                    WHERE items @> jsonb_build_array(jsonb_build_object('materialId', $1::text))
                )
                OR EXISTS(SELECT 1 FROM damaged_stock WHERE material_id = $1)
                OR EXISTS(SELECT 1 FROM material_requests WHERE material_id = $1)
            "#,
        )
        .bind(id)
        .bind(&material.name)
        .fetch_one(&self.db)
        .await?;

        if referenced {
            return Err(AppError::Conflict {
                resource: "material".to_string(),
                message: format!("{} is referenced and cannot be deleted", material.name),
            });
        }

        let mut tx = self.db.begin().await?;
        sqlx::query("DELETE FROM material_ledger WHERE material_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM materials WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(())
    }

    /// Receive stock, updating the current price and appending `STOCK-IN`
    pub async fn add_stock(
        &self,
        kind: MaterialKind,
        id: Uuid,
        input: AddStockInput,
    ) -> AppResult<Material> {
        validate_positive_quantity(input.quantity)
            .map_err(|msg| AppError::validation("quantity", msg))?;
        validate_non_negative(input.unit_price)
            .map_err(|msg| AppError::validation("unitPrice", msg))?;

        let mut tx = self.db.begin().await?;

        let material = lock_material(&mut tx, id).await?;
        if material.kind != kind {
            return Err(AppError::NotFound(kind.to_string()));
        }

        let row = sqlx::query_as::<_, MaterialRow>(&format!(
            r#"
            UPDATE materials
            SET quantity = quantity + $1, per_quantity_price = $2, updated_at = NOW()
            WHERE id = $3
            RETURNING {}
            "#,
            MATERIAL_COLUMNS
        ))
        .bind(input.quantity)
        .bind(input.unit_price)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        append_ledger(
            &mut tx,
            LedgerAppend {
                material_id: id,
                entry_type: LedgerEntryType::StockIn,
                quantity: input.quantity,
                unit_price: input.unit_price,
                supplier: input.supplier.as_deref(),
                reference: input.reference.as_deref(),
            },
        )
        .await?;

        tx.commit().await?;

        let updated: Material = row.try_into()?;
        tracing::info!(
            material = %updated.name,
            quantity = %input.quantity,
            on_hand = %updated.quantity,
            "Stock received"
        );
        self.events.publish(StockEvent::MaterialStockChanged {
            material_id: updated.id,
            kind: updated.kind,
            name: updated.name.clone(),
            quantity: updated.quantity,
            reference: input.reference,
        });

        Ok(updated)
    }

    /// Price history, newest first
    pub async fn history(&self, kind: MaterialKind, id: Uuid) -> AppResult<Vec<PriceHistoryEntry>> {
        self.get(kind, id).await?;

        let rows = sqlx::query_as::<_, LedgerRow>(
            r#"
            SELECT id, material_id, entry_date, entry_type, supplier, quantity, unit_price, total, reference
            FROM material_ledger
            WHERE material_id = $1
            ORDER BY entry_date DESC, id
            "#,
        )
        .bind(id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(PriceHistoryEntry::try_from).collect()
    }

    /// Materials below their alert threshold
    pub async fn alerts(&self, kind: Option<MaterialKind>) -> AppResult<Vec<Material>> {
        let rows = sqlx::query_as::<_, MaterialRow>(&format!(
            "SELECT {} FROM materials WHERE ($1::text IS NULL OR kind = $1) ORDER BY kind, name",
            MATERIAL_COLUMNS
        ))
        .bind(kind.map(|k| k.as_str()))
        .fetch_all(&self.db)
        .await?;

        let materials = into_materials(rows)?;
        Ok(materials.into_iter().filter(Material::is_alerted).collect())
    }
}
