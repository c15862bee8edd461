//! Product to material recipe service

use sqlx::{types::Json, FromRow, PgConnection, PgPool};

use shared::{MaterialPerCarton, ProductMaterialMapping};

use crate::error::{AppError, AppResult};

/// Product-material mapping service
#[derive(Clone)]
pub struct MappingService {
    db: PgPool,
}

#[derive(Debug, FromRow)]
struct MappingRow {
    product_name: String,
    materials: Json<Vec<MaterialPerCarton>>,
}

impl From<MappingRow> for ProductMaterialMapping {
    fn from(row: MappingRow) -> Self {
        ProductMaterialMapping {
            product_name: row.product_name,
            materials: row.materials.0,
        }
    }
}

/// Recipes for the given products; missing ones are simply absent
pub async fn mappings_for(
    conn: &mut PgConnection,
    product_names: &[String],
) -> AppResult<Vec<ProductMaterialMapping>> {
    let rows = sqlx::query_as::<_, MappingRow>(
        "SELECT product_name, materials FROM product_material_mappings WHERE product_name = ANY($1)",
    )
    .bind(product_names)
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

impl MappingService {
    /// Create a new MappingService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> AppResult<Vec<ProductMaterialMapping>> {
        let rows = sqlx::query_as::<_, MappingRow>(
            "SELECT product_name, materials FROM product_material_mappings ORDER BY product_name",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn get(&self, product_name: &str) -> AppResult<ProductMaterialMapping> {
        let row = sqlx::query_as::<_, MappingRow>(
            "SELECT product_name, materials FROM product_material_mappings WHERE product_name = $1",
        )
        .bind(product_name)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Material mapping for product {}", product_name)))?;

        Ok(row.into())
    }

    /// Insert or replace a recipe
    pub async fn upsert(&self, mapping: ProductMaterialMapping) -> AppResult<ProductMaterialMapping> {
        mapping
            .validate()
            .map_err(|msg| AppError::validation("materials", msg))?;

        let names: Vec<String> = mapping
            .materials
            .iter()
            .map(|m| m.material_name.clone())
            .collect();
        let known = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT name FROM materials WHERE name = ANY($1)",
        )
        .bind(&names)
        .fetch_all(&self.db)
        .await?;
        if let Some(missing) = names.iter().find(|n| !known.contains(n)) {
            return Err(AppError::NotFound(format!("Material {}", missing)));
        }

        let row = sqlx::query_as::<_, MappingRow>(
            r#"
            INSERT INTO product_material_mappings (product_name, materials)
            VALUES ($1, $2)
            ON CONFLICT (product_name) DO UPDATE SET materials = EXCLUDED.materials, updated_at = NOW()
            RETURNING product_name, materials
            "#,
        )
        .bind(mapping.product_name.trim())
        .bind(Json(&mapping.materials))
        .fetch_one(&self.db)
        .await?;

        tracing::info!(product = %row.product_name, "Material mapping saved");
        Ok(row.into())
    }

    pub async fn delete(&self, product_name: &str) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM product_material_mappings WHERE product_name = $1")
            .bind(product_name)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Material mapping for product {}",
                product_name
            )));
        }
        Ok(())
    }
}
