//! Finished-goods stock service

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use sqlx::{types::Json, FromRow, PgConnection, PgPool};
use uuid::Uuid;

use shared::{
    LastProductionDetails, ProductStock, StockAction, StockCompletion, StockHistoryEntry, UnitType,
};

use crate::error::{AppError, AppResult};

const STOCK_COLUMNS: &str = "id, product_name, own_unit_stock, jobber_stock, alert_threshold, \
     last_updated_from, last_production_details, last_updated";

/// Product stock service
#[derive(Clone)]
pub struct ProductStockService {
    db: PgPool,
}

#[derive(Debug, FromRow)]
struct ProductStockRow {
    id: Uuid,
    product_name: String,
    own_unit_stock: i32,
    jobber_stock: i32,
    alert_threshold: i32,
    last_updated_from: Option<String>,
    last_production_details: Option<Json<LastProductionDetails>>,
    last_updated: DateTime<Utc>,
}

impl From<ProductStockRow> for ProductStock {
    fn from(row: ProductStockRow) -> Self {
        ProductStock {
            id: row.id,
            product_name: row.product_name,
            own_unit_stock: row.own_unit_stock,
            jobber_stock: row.jobber_stock,
            alert_threshold: row.alert_threshold,
            last_updated_from: row.last_updated_from,
            last_production_details: row.last_production_details.map(|d| d.0),
            last_updated: row.last_updated,
        }
    }
}

#[derive(Debug, FromRow)]
struct HistoryRow {
    id: Uuid,
    product_name: String,
    action: String,
    quantity: i32,
    unit_type: Option<String>,
    reference: Option<String>,
    entry_date: DateTime<Utc>,
}

impl TryFrom<HistoryRow> for StockHistoryEntry {
    type Error = AppError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        let action = StockAction::from_str(&row.action)
            .ok_or_else(|| AppError::Internal(format!("Unknown stock action {}", row.action)))?;
        Ok(StockHistoryEntry {
            id: row.id,
            product_name: row.product_name,
            action,
            quantity: row.quantity,
            unit_type: row.unit_type.as_deref().and_then(UnitType::from_str),
            reference: row.reference,
            date: row.entry_date,
        })
    }
}

/// Input for changing a product's alert threshold
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateThresholdInput {
    pub alert_threshold: i32,
}

/// Book one completed product line: upsert the stock row and append history
pub async fn book_completion(
    conn: &mut PgConnection,
    entry: &StockCompletion,
    unit_type: UnitType,
    dc_no: &str,
    date: NaiveDate,
) -> AppResult<ProductStock> {
    let details = LastProductionDetails {
        unit_type,
        carton_qty: entry.carton_qty,
        date,
    };

    let row = sqlx::query_as::<_, ProductStockRow>(&format!(
        r#"
        INSERT INTO product_stocks (product_name, own_unit_stock, jobber_stock,
                                    last_updated_from, last_production_details, last_updated)
        VALUES ($1, $2, $3, $4, $5, NOW())
        ON CONFLICT (product_name) DO UPDATE
        SET own_unit_stock = product_stocks.own_unit_stock + EXCLUDED.own_unit_stock,
            jobber_stock = product_stocks.jobber_stock + EXCLUDED.jobber_stock,
            last_updated_from = EXCLUDED.last_updated_from,
            last_production_details = EXCLUDED.last_production_details,
            last_updated = NOW()
        RETURNING {}
        "#,
        STOCK_COLUMNS
    ))
    .bind(&entry.product_name)
    .bind(entry.own_unit_delta)
    .bind(entry.jobber_delta)
    .bind(dc_no)
    .bind(Json(&details))
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO product_stock_history (product_name, action, quantity, unit_type, reference)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(&entry.product_name)
    .bind(entry.action.as_str())
    .bind(entry.carton_qty)
    .bind(unit_type.as_str())
    .bind(dc_no)
    .execute(&mut *conn)
    .await?;

    Ok(row.into())
}

impl ProductStockService {
    /// Create a new ProductStockService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> AppResult<Vec<ProductStock>> {
        let rows = sqlx::query_as::<_, ProductStockRow>(&format!(
            "SELECT {} FROM product_stocks ORDER BY product_name",
            STOCK_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn get(&self, product_name: &str) -> AppResult<ProductStock> {
        let row = sqlx::query_as::<_, ProductStockRow>(&format!(
            "SELECT {} FROM product_stocks WHERE product_name = $1",
            STOCK_COLUMNS
        ))
        .bind(product_name)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Product stock for {}", product_name)))?;

        Ok(row.into())
    }

    /// Stock history for a product, newest first
    pub async fn history(&self, product_name: &str) -> AppResult<Vec<StockHistoryEntry>> {
        self.get(product_name).await?;

        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT id, product_name, action, quantity, unit_type, reference, entry_date
            FROM product_stock_history
            WHERE product_name = $1
            ORDER BY entry_date DESC
            "#,
        )
        .bind(product_name)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(StockHistoryEntry::try_from).collect()
    }

    pub async fn update_threshold(
        &self,
        product_name: &str,
        input: UpdateThresholdInput,
    ) -> AppResult<ProductStock> {
        if input.alert_threshold < 0 {
            return Err(AppError::validation(
                "alertThreshold",
                "Alert threshold cannot be negative",
            ));
        }

        let row = sqlx::query_as::<_, ProductStockRow>(&format!(
            r#"
            UPDATE product_stocks SET alert_threshold = $1
            WHERE product_name = $2
            RETURNING {}
            "#,
            STOCK_COLUMNS
        ))
        .bind(input.alert_threshold)
        .bind(product_name)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Product stock for {}", product_name)))?;

        Ok(row.into())
    }

    /// Products whose current stock is below their alert threshold
    pub async fn alerts(&self) -> AppResult<Vec<ProductStock>> {
        let stocks = self.list().await?;
        Ok(stocks.into_iter().filter(ProductStock::is_alerted).collect())
    }
}
