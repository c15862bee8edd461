//! Supplier registry service

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use shared::{
    format_supplier_code, resolve_material_type, CreateSupplierInput, MaterialType, Supplier,
    SupplierType, UpdateSupplierInput,
};

use crate::error::{AppError, AppResult};
use crate::services::sequence::{next_sequence, peek_sequence, SUPPLIER_SCOPE};

const SUPPLIER_COLUMNS: &str = "id, supplier_code, name, supplier_type, material_type, \
     contact_person, phone, email, gstin, address, is_active, created_at, updated_at";

/// Supplier service
#[derive(Clone)]
pub struct SupplierService {
    db: PgPool,
}

#[derive(Debug, FromRow)]
struct SupplierRow {
    id: Uuid,
    supplier_code: String,
    name: String,
    supplier_type: String,
    material_type: String,
    contact_person: Option<String>,
    phone: Option<String>,
    email: Option<String>,
    gstin: Option<String>,
    address: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SupplierRow> for Supplier {
    type Error = AppError;

    fn try_from(row: SupplierRow) -> Result<Self, Self::Error> {
        let supplier_type = SupplierType::from_str(&row.supplier_type).ok_or_else(|| {
            AppError::Internal(format!("Unknown supplier type {}", row.supplier_type))
        })?;
        let material_type = MaterialType::from_str(&row.material_type).ok_or_else(|| {
            AppError::Internal(format!("Unknown material type {}", row.material_type))
        })?;
        Ok(Supplier {
            id: row.id,
            supplier_code: row.supplier_code,
            name: row.name,
            supplier_type,
            material_type,
            contact_person: row.contact_person,
            phone: row.phone,
            email: row.email,
            gstin: row.gstin,
            address: row.address,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl SupplierService {
    /// Create a new SupplierService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> AppResult<Vec<Supplier>> {
        let rows = sqlx::query_as::<_, SupplierRow>(&format!(
            "SELECT {} FROM suppliers ORDER BY supplier_code",
            SUPPLIER_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Supplier::try_from).collect()
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Supplier> {
        let row = sqlx::query_as::<_, SupplierRow>(&format!(
            "SELECT {} FROM suppliers WHERE id = $1",
            SUPPLIER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Supplier".to_string()))?;

        row.try_into()
    }

    /// Active jobbers handling `material_type` (or both)
    pub async fn list_jobbers(&self, material_type: MaterialType) -> AppResult<Vec<Supplier>> {
        let rows = sqlx::query_as::<_, SupplierRow>(&format!(
            r#"
            SELECT {} FROM suppliers
            WHERE supplier_type = 'Jobber' AND is_active
              AND (material_type = $1 OR material_type = 'both')
            ORDER BY name
            "#,
            SUPPLIER_COLUMNS
        ))
        .bind(material_type.as_str())
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Supplier::try_from).collect()
    }

    /// The code the next supplier will receive
    pub async fn next_supplier_code(&self) -> AppResult<String> {
        let next = peek_sequence(&self.db, SUPPLIER_SCOPE).await?;
        Ok(format_supplier_code(next))
    }

    pub async fn create(&self, input: CreateSupplierInput) -> AppResult<Supplier> {
        input.validate()?;
        let material_type = resolve_material_type(input.supplier_type, input.material_type)
            .map_err(|msg| AppError::validation("materialType", msg))?;

        let mut tx = self.db.begin().await?;

        let code = format_supplier_code(next_sequence(&mut tx, SUPPLIER_SCOPE).await?);

        let row = sqlx::query_as::<_, SupplierRow>(&format!(
            r#"
            INSERT INTO suppliers (supplier_code, name, supplier_type, material_type,
                                   contact_person, phone, email, gstin, address)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            SUPPLIER_COLUMNS
        ))
        .bind(&code)
        .bind(input.name.trim())
        .bind(input.supplier_type.as_str())
        .bind(material_type.as_str())
        .bind(&input.contact_person)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.gstin)
        .bind(&input.address)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::on_unique_violation(e, "supplierCode"))?;

        tx.commit().await?;

        tracing::info!(supplier_code = %code, "Supplier created");
        row.try_into()
    }

    pub async fn update(&self, id: Uuid, input: UpdateSupplierInput) -> AppResult<Supplier> {
        input.validate()?;
        let existing = self.get(id).await?;

        let supplier_type = input.supplier_type.unwrap_or(existing.supplier_type);
        let requested = input.material_type.or(Some(existing.material_type));
        let material_type = resolve_material_type(supplier_type, requested)
            .map_err(|msg| AppError::validation("materialType", msg))?;

        let row = sqlx::query_as::<_, SupplierRow>(&format!(
            r#"
            UPDATE suppliers
            SET name = $1, supplier_type = $2, material_type = $3, contact_person = $4,
                phone = $5, email = $6, gstin = $7, address = $8, is_active = $9,
                updated_at = NOW()
            WHERE id = $10
            RETURNING {}
            "#,
            SUPPLIER_COLUMNS
        ))
        .bind(input.name.as_deref().map(str::trim).unwrap_or(&existing.name))
        .bind(supplier_type.as_str())
        .bind(material_type.as_str())
        .bind(input.contact_person.or(existing.contact_person))
        .bind(input.phone.or(existing.phone))
        .bind(input.email.or(existing.email))
        .bind(input.gstin.or(existing.gstin))
        .bind(input.address.or(existing.address))
        .bind(input.is_active.unwrap_or(existing.is_active))
        .bind(id)
        .fetch_one(&self.db)
        .await?;

        row.try_into()
    }

    /// Delete a supplier no challan or order refers to
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.get(id).await?;

        let referenced = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(SELECT 1 FROM delivery_challans WHERE supplier_id = $1)
                OR EXISTS(SELECT 1 FROM purchase_orders WHERE supplier_id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(&self.db)
        .await?;

        if referenced {
            return Err(AppError::Conflict {
                resource: "supplier".to_string(),
                message: "Supplier is referenced by delivery challans or purchase orders"
                    .to_string(),
            });
        }

        sqlx::query("DELETE FROM suppliers WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(())
    }
}
