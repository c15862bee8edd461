//! Delivery challan service
//!
//! Creation plans material requirements from product recipes, then deducts
//! every material, draws the DC number, and stores the challan in a single
//! transaction. Material rows are locked in name order and every deduction
//! is a conditional decrement, so a shortage anywhere leaves all stock as it
//! was. Status updates book material returns and, on completion, finished
//! goods stock in the same transaction as the status write.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, PgConnection, PgPool};
use uuid::Uuid;

use shared::{
    apply_material_usage, completion_entries, find_shortages, format_dc_no,
    outstanding_by_material, plan_material_requirements, DcProduct, DcStatus, DeliveryChallan,
    LedgerEntryType, Material, MaterialKind, MaterialRequirement, MaterialUsageUpdate,
    ProductOrder, ProductStock, RequirementPlan, Shortage, StateMachine, SupplierType,
    TransitionError, UnitType, UsageDelta,
};

use crate::error::{AppError, AppResult};
use crate::events::{EventBus, StockEvent};
use crate::middleware::AuthUser;
use crate::services::mapping::mappings_for;
use crate::services::material::{
    add_to_stock, append_ledger, deduct_stock, lock_materials_by_name, LedgerAppend,
};
use crate::services::product_stock::book_completion;
use crate::services::sequence::{dc_scope, next_sequence};

/// Challans draw on the packing-material catalog
const DC_MATERIAL_KIND: MaterialKind = MaterialKind::Packing;

const DC_COLUMNS: &str = "id, dc_no, unit_type, supplier_id, person_name, products, status, \
     dc_date, remarks, created_at, updated_at";

/// Delivery challan service
#[derive(Clone)]
pub struct DeliveryChallanService {
    db: PgPool,
    events: EventBus,
}

#[derive(Debug, FromRow)]
struct DcRow {
    id: Uuid,
    dc_no: String,
    unit_type: String,
    supplier_id: Option<Uuid>,
    person_name: Option<String>,
    products: Json<Vec<DcProduct>>,
    status: String,
    dc_date: NaiveDate,
    remarks: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DcRow> for DeliveryChallan {
    type Error = AppError;

    fn try_from(row: DcRow) -> Result<Self, Self::Error> {
        let unit_type = UnitType::from_str(&row.unit_type)
            .ok_or_else(|| AppError::Internal(format!("Unknown unit type {}", row.unit_type)))?;
        let status = DcStatus::from_str(&row.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown DC status {}", row.status)))?;
        Ok(DeliveryChallan {
            id: row.id,
            dc_no: row.dc_no,
            unit_type,
            supplier_id: row.supplier_id,
            person_name: row.person_name,
            products: row.products.0,
            status,
            date: row.dc_date,
            remarks: row.remarks,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Input for creating a delivery challan
///
/// Accepts either `products` or a single `product_name` / `carton_qty` pair.
#[derive(Debug, Deserialize)]
pub struct CreateDcInput {
    pub unit_type: UnitType,
    pub supplier_id: Option<Uuid>,
    pub person_name: Option<String>,
    #[serde(default)]
    pub products: Vec<ProductOrder>,
    pub product_name: Option<String>,
    pub carton_qty: Option<i32>,
    pub date: Option<NaiveDate>,
    pub remarks: Option<String>,
}

impl CreateDcInput {
    fn orders(&self) -> Vec<ProductOrder> {
        if !self.products.is_empty() {
            return self.products.clone();
        }
        match (&self.product_name, self.carton_qty) {
            (Some(product_name), Some(carton_qty)) => vec![ProductOrder {
                product_name: product_name.trim().to_string(),
                carton_qty,
            }],
            _ => Vec::new(),
        }
    }
}

/// Input for a status / material update
#[derive(Debug, Default, Deserialize)]
pub struct UpdateDcInput {
    pub status: Option<String>,
    pub products: Option<Vec<MaterialUsageUpdate>>,
    pub remarks: Option<String>,
}

/// Listing filters
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DcListQuery {
    pub unit_type: Option<UnitType>,
    pub status: Option<DcStatus>,
}

/// Requirement preview: what a challan would draw and what is short
#[derive(Debug, Serialize)]
pub struct DcPreview {
    #[serde(flatten)]
    pub plan: RequirementPlan,
    pub shortages: Vec<Shortage>,
}

fn wip_column(unit_type: UnitType) -> &'static str {
    match unit_type {
        UnitType::OwnUnit => "own_unit_wip",
        UnitType::Jobber => "jobber_wip",
    }
}

/// Move quantity between the usage and WIP counters of one material
async fn shift_usage(
    conn: &mut PgConnection,
    material_id: Uuid,
    unit_type: UnitType,
    used_delta: Decimal,
    wip_delta: Decimal,
) -> AppResult<()> {
    let column = wip_column(unit_type);
    sqlx::query(&format!(
        r#"
        UPDATE materials
        SET used_qty = used_qty + $1, {col} = GREATEST({col} + $2, 0), updated_at = NOW()
        WHERE id = $3
        "#,
        col = column
    ))
    .bind(used_delta)
    .bind(wip_delta)
    .bind(material_id)
    .execute(conn)
    .await?;
    Ok(())
}

fn by_name(materials: Vec<Material>) -> HashMap<String, Material> {
    materials.into_iter().map(|m| (m.name.clone(), m)).collect()
}

fn names_of(requirements: &[MaterialRequirement]) -> Vec<String> {
    requirements.iter().map(|r| r.material_name.clone()).collect()
}

impl DeliveryChallanService {
    /// Create a new DeliveryChallanService instance
    pub fn new(db: PgPool, events: EventBus) -> Self {
        Self { db, events }
    }

    async fn fetch(&self, conn: &mut PgConnection, id: Uuid, lock: bool) -> AppResult<DeliveryChallan> {
        let sql = format!(
            "SELECT {} FROM delivery_challans WHERE id = $1{}",
            DC_COLUMNS,
            if lock { " FOR UPDATE" } else { "" }
        );
        let row = sqlx::query_as::<_, DcRow>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?
            .ok_or_else(|| AppError::NotFound("Delivery challan".to_string()))?;
        row.try_into()
    }

    pub async fn get(&self, id: Uuid) -> AppResult<DeliveryChallan> {
        let mut conn = self.db.acquire().await?;
        self.fetch(&mut conn, id, false).await
    }

    pub async fn list(&self, query: DcListQuery) -> AppResult<Vec<DeliveryChallan>> {
        let rows = sqlx::query_as::<_, DcRow>(&format!(
            r#"
            SELECT {} FROM delivery_challans
            WHERE ($1::text IS NULL OR unit_type = $1)
              AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#,
            DC_COLUMNS
        ))
        .bind(query.unit_type.map(|u| u.as_str()))
        .bind(query.status.map(|s| s.as_str()))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(DeliveryChallan::try_from).collect()
    }

    /// Plan requirements and report shortages without touching stock
    pub async fn preview(&self, orders: Vec<ProductOrder>) -> AppResult<DcPreview> {
        let mut conn = self.db.acquire().await?;
        let names: Vec<String> = orders.iter().map(|o| o.product_name.clone()).collect();
        let mappings = mappings_for(&mut conn, &names).await?;
        let plan = plan_material_requirements(&orders, &mappings)?;

        let materials = sqlx::query_as::<_, (String, Decimal)>(
            "SELECT name, quantity FROM materials WHERE kind = $1 AND name = ANY($2)",
        )
        .bind(DC_MATERIAL_KIND.as_str())
        .bind(names_of(&plan.aggregated))
        .fetch_all(&mut *conn)
        .await?;
        let available: HashMap<String, Decimal> = materials.into_iter().collect();

        let shortages = find_shortages(&plan.aggregated, &available)?;
        Ok(DcPreview { plan, shortages })
    }

    async fn check_recipient(&self, input: &CreateDcInput) -> AppResult<(Option<Uuid>, Option<String>)> {
        match input.unit_type {
            UnitType::Jobber => {
                let supplier_id = input
                    .supplier_id
                    .ok_or_else(|| AppError::validation("supplier_id", "Jobber is required"))?;
                let supplier_type = sqlx::query_scalar::<_, String>(
                    "SELECT supplier_type FROM suppliers WHERE id = $1",
                )
                .bind(supplier_id)
                .fetch_optional(&self.db)
                .await?
                .ok_or_else(|| AppError::NotFound("Supplier".to_string()))?;
                if SupplierType::from_str(&supplier_type) != Some(SupplierType::Jobber) {
                    return Err(AppError::validation(
                        "supplier_id",
                        "Supplier is not registered as a jobber",
                    ));
                }
                Ok((Some(supplier_id), None))
            }
            UnitType::OwnUnit => {
                let person = input
                    .person_name
                    .as_deref()
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .ok_or_else(|| {
                        AppError::validation("person_name", "Person name is required for Own Unit")
                    })?;
                Ok((None, Some(person.to_string())))
            }
        }
    }

    /// Create a challan, deducting all materials or none
    pub async fn create(&self, input: CreateDcInput) -> AppResult<DeliveryChallan> {
        let orders = input.orders();
        let (supplier_id, person_name) = self.check_recipient(&input).await?;
        let date = input.date.unwrap_or_else(|| Utc::now().date_naive());

        let mut tx = self.db.begin().await?;

        let product_names: Vec<String> = orders.iter().map(|o| o.product_name.clone()).collect();
        let mappings = mappings_for(&mut tx, &product_names).await?;
        let plan = plan_material_requirements(&orders, &mappings)?;

        let locked = by_name(
            lock_materials_by_name(&mut tx, DC_MATERIAL_KIND, &names_of(&plan.aggregated)).await?,
        );
        let available: HashMap<String, Decimal> = locked
            .iter()
            .map(|(name, m)| (name.clone(), m.quantity))
            .collect();
        let shortages = find_shortages(&plan.aggregated, &available)?;
        if !shortages.is_empty() {
            tracing::warn!(
                shortages = ?shortages.iter().map(|s| s.material_name.as_str()).collect::<Vec<_>>(),
                "Delivery challan rejected for insufficient stock"
            );
            return Err(AppError::InsufficientStock(shortages));
        }

        let dc_no = format_dc_no(date.year(), next_sequence(&mut tx, &dc_scope(date.year())).await?);

        let mut changed = Vec::with_capacity(plan.aggregated.len());
        for req in &plan.aggregated {
            let material = locked
                .get(&req.material_name)
                .ok_or_else(|| AppError::NotFound(format!("Material {}", req.material_name)))?;

            if !deduct_stock(&mut tx, material.id, req.total_qty).await? {
                return Err(AppError::InsufficientStock(vec![Shortage {
                    material_name: req.material_name.clone(),
                    required: req.total_qty,
                    available: material.quantity,
                }]));
            }
            shift_usage(&mut tx, material.id, input.unit_type, req.total_qty, req.total_qty).await?;
            append_ledger(
                &mut tx,
                LedgerAppend {
                    material_id: material.id,
                    entry_type: LedgerEntryType::DcOut,
                    quantity: req.total_qty,
                    unit_price: material.per_quantity_price,
                    supplier: None,
                    reference: Some(&dc_no),
                },
            )
            .await?;
            changed.push((material.id, material.name.clone(), material.quantity - req.total_qty));
        }

        let row = sqlx::query_as::<_, DcRow>(&format!(
            r#"
            INSERT INTO delivery_challans (dc_no, unit_type, supplier_id, person_name, products,
                                           status, dc_date, remarks)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            DC_COLUMNS
        ))
        .bind(&dc_no)
        .bind(input.unit_type.as_str())
        .bind(supplier_id)
        .bind(&person_name)
        .bind(Json(&plan.products))
        .bind(DcStatus::Pending.as_str())
        .bind(date)
        .bind(&input.remarks)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            dc_no = %dc_no,
            unit_type = %input.unit_type,
            materials = plan.aggregated.len(),
            "Delivery challan created"
        );
        for (material_id, name, quantity) in changed {
            self.events.publish(StockEvent::MaterialStockChanged {
                material_id,
                kind: DC_MATERIAL_KIND,
                name,
                quantity,
                reference: Some(dc_no.clone()),
            });
        }

        row.try_into()
    }

    /// Book usage deltas from a material update against the catalog
    async fn book_usage(
        &self,
        conn: &mut PgConnection,
        dc: &DeliveryChallan,
        deltas: &[UsageDelta],
    ) -> AppResult<Vec<(Uuid, String, Decimal)>> {
        let names: Vec<String> = deltas.iter().map(|d| d.material_name.clone()).collect();
        let locked = by_name(lock_materials_by_name(&mut *conn, DC_MATERIAL_KIND, &names).await?);

        let mut changed = Vec::new();
        for delta in deltas {
            let material = locked
                .get(&delta.material_name)
                .ok_or_else(|| AppError::NotFound(format!("Material {}", delta.material_name)))?;

            let returned = delta.not_used_delta;
            if returned > Decimal::ZERO {
                add_to_stock(&mut *conn, material.id, returned).await?;
                append_ledger(
                    &mut *conn,
                    LedgerAppend {
                        material_id: material.id,
                        entry_type: LedgerEntryType::DcReturn,
                        quantity: returned,
                        unit_price: material.per_quantity_price,
                        supplier: None,
                        reference: Some(&dc.dc_no),
                    },
                )
                .await?;
            } else if returned < Decimal::ZERO {
                // A lowered not-used figure takes the earlier return back out
                if !deduct_stock(&mut *conn, material.id, -returned).await? {
                    return Err(AppError::InsufficientStock(vec![Shortage {
                        material_name: material.name.clone(),
                        required: -returned,
                        available: material.quantity,
                    }]));
                }
                append_ledger(
                    &mut *conn,
                    LedgerAppend {
                        material_id: material.id,
                        entry_type: LedgerEntryType::DcOut,
                        quantity: -returned,
                        unit_price: material.per_quantity_price,
                        supplier: None,
                        reference: Some(&dc.dc_no),
                    },
                )
                .await?;
            }

            shift_usage(
                &mut *conn,
                material.id,
                dc.unit_type,
                -returned,
                -delta.wip_release(),
            )
            .await?;

            if !returned.is_zero() {
                changed.push((material.id, material.name.clone(), material.quantity + returned));
            }
        }
        Ok(changed)
    }

    /// Apply a status and/or material update
    pub async fn update(
        &self,
        id: Uuid,
        user: &AuthUser,
        input: UpdateDcInput,
    ) -> AppResult<DeliveryChallan> {
        let mut tx = self.db.begin().await?;
        let mut dc = self.fetch(&mut tx, id, true).await?;
        let current = dc.status;

        if current.is_terminal() {
            return Err(TransitionError::Terminal {
                entity: DcStatus::ENTITY,
                state: current.to_string(),
            }
            .into());
        }

        let target = match input.status.as_deref() {
            Some(requested) => {
                let target = DcStatus::from_update_target(requested).ok_or_else(|| {
                    AppError::validation("status", "Status must be Partial or Completed")
                })?;
                current.transition_to(target)?
            }
            None => current,
        };

        if target == DcStatus::Completed {
            user.require_admin()?;
        }

        let mut changed = Vec::new();
        if let Some(updates) = &input.products {
            if current != DcStatus::Partial && target != DcStatus::Partial {
                return Err(AppError::InvalidStateTransition(
                    "Material updates are accepted only while the delivery challan is Partial"
                        .to_string(),
                ));
            }
            let deltas = apply_material_usage(&mut dc.products, updates)?;
            changed = self.book_usage(&mut tx, &dc, &deltas).await?;
        }

        let completing = target == DcStatus::Completed && current != DcStatus::Completed;
        let mut stocks: Vec<ProductStock> = Vec::new();
        if completing {
            for entry in completion_entries(dc.unit_type, &dc.products) {
                stocks.push(book_completion(&mut tx, &entry, dc.unit_type, &dc.dc_no, dc.date).await?);
            }

            let outstanding = outstanding_by_material(&dc.products);
            let locked = by_name(
                lock_materials_by_name(&mut tx, DC_MATERIAL_KIND, &names_of(&outstanding)).await?,
            );
            for req in &outstanding {
                if let Some(material) = locked.get(&req.material_name) {
                    shift_usage(&mut tx, material.id, dc.unit_type, Decimal::ZERO, -req.total_qty)
                        .await?;
                }
            }
        }

        let remarks = input.remarks.clone().or_else(|| dc.remarks.clone());
        let row = sqlx::query_as::<_, DcRow>(&format!(
            r#"
            UPDATE delivery_challans
            SET status = $1, products = $2, remarks = $3, updated_at = NOW()
            WHERE id = $4
            RETURNING {}
            "#,
            DC_COLUMNS
        ))
        .bind(target.as_str())
        .bind(Json(&dc.products))
        .bind(&remarks)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let updated: DeliveryChallan = row.try_into()?;
        if target != current {
            tracing::info!(
                dc_no = %updated.dc_no,
                from = %current,
                to = %target,
                user_id = %user.user_id,
                "Delivery challan status changed"
            );
        }

        for (material_id, name, quantity) in changed {
            self.events.publish(StockEvent::MaterialStockChanged {
                material_id,
                kind: DC_MATERIAL_KIND,
                name,
                quantity,
                reference: Some(updated.dc_no.clone()),
            });
        }
        if completing {
            for stock in &stocks {
                self.events.publish(StockEvent::ProductStockUpdated {
                    product_name: stock.product_name.clone(),
                    own_unit_stock: stock.own_unit_stock,
                    jobber_stock: stock.jobber_stock,
                    current_stock: stock.current_stock(),
                });
            }
            self.events.publish(StockEvent::DcCompleted {
                dc_id: updated.id,
                dc_no: updated.dc_no.clone(),
                unit_type: updated.unit_type,
                product_names: updated
                    .products
                    .iter()
                    .map(|p| p.product_name.clone())
                    .collect(),
                products: updated.products.clone(),
            });
        }

        Ok(updated)
    }
}
