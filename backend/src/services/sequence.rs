//! Atomic document-number counters
//!
//! One row per scope; the upsert increments and returns in a single
//! statement, so concurrent callers never share a value.

use sqlx::{PgConnection, PgPool};

use crate::error::AppResult;

/// Scope for delivery challan numbers in a calendar year
pub fn dc_scope(year: i32) -> String {
    format!("dc:{}", year)
}

pub const SUPPLIER_SCOPE: &str = "supplier";

/// Draw the next value for `scope`, starting at 1
pub async fn next_sequence(conn: &mut PgConnection, scope: &str) -> AppResult<i64> {
    let value = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO sequences (scope, value)
        VALUES ($1, 1)
        ON CONFLICT (scope) DO UPDATE SET value = sequences.value + 1
        RETURNING value
        "#,
    )
    .bind(scope)
    .fetch_one(conn)
    .await?;

    Ok(value)
}

/// Value the next call to [`next_sequence`] would return, without consuming it
pub async fn peek_sequence(db: &PgPool, scope: &str) -> AppResult<i64> {
    let current = sqlx::query_scalar::<_, i64>("SELECT value FROM sequences WHERE scope = $1")
        .bind(scope)
        .fetch_optional(db)
        .await?;

    Ok(current.unwrap_or(0) + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scopes() {
        assert_eq!(dc_scope(2025), "dc:2025");
        assert_eq!(SUPPLIER_SCOPE, "supplier");
    }
}
