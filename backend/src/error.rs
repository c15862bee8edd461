//! Error handling for the Millstock server
//!
//! Every failure reaches the client as `{"error": {"code", "message", ...}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use shared::{GrnError, PlanningError, PoError, ReconciliationError, Shortage, TransitionError};

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Validation error: {message}")]
    InvalidQuantities {
        message: String,
        details: Vec<String>,
    },

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Conflict: {message}")]
    Conflict { resource: String, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Insufficient stock")]
    InsufficientStock(Vec<Shortage>),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Turn a unique-constraint violation into `DuplicateEntry`
    pub fn on_unique_violation(err: sqlx::Error, field: &str) -> Self {
        let unique = matches!(
            &err,
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
        );
        if unique {
            AppError::DuplicateEntry(field.to_string())
        } else {
            AppError::DatabaseError(err)
        }
    }
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        AppError::InvalidStateTransition(err.to_string())
    }
}

impl From<ReconciliationError> for AppError {
    fn from(err: ReconciliationError) -> Self {
        match &err {
            ReconciliationError::InvalidLines(violations) => AppError::InvalidQuantities {
                message: "Used + not used exceeds quantity sent".to_string(),
                details: violations.iter().map(ToString::to_string).collect(),
            },
            ReconciliationError::MissingProductsProduced => {
                AppError::validation("totalProductsProduced", err.to_string())
            }
            ReconciliationError::UnknownLine { .. } => AppError::validation("products", err.to_string()),
            ReconciliationError::Empty => AppError::validation("lines", err.to_string()),
        }
    }
}

impl From<PlanningError> for AppError {
    fn from(err: PlanningError) -> Self {
        match &err {
            PlanningError::MissingMapping(product) => {
                AppError::NotFound(format!("Material mapping for product {}", product))
            }
            PlanningError::MissingMaterial(material) => {
                AppError::NotFound(format!("Material {}", material))
            }
            PlanningError::NoProducts
            | PlanningError::InvalidCartonQty(_)
            | PlanningError::DuplicateProduct(_) => {
                AppError::validation("products", err.to_string())
            }
        }
    }
}

impl From<GrnError> for AppError {
    fn from(err: GrnError) -> Self {
        AppError::validation("items", err.to_string())
    }
}

impl From<PoError> for AppError {
    fn from(err: PoError) -> Self {
        AppError::validation("items", err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(msg) => format!("{}: {}", field, msg),
                    None => format!("{}: invalid value", field),
                })
            })
            .collect();
        details.sort();
        AppError::InvalidQuantities {
            message: "Invalid input".to_string(),
            details,
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl ErrorDetail {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            field: None,
            details: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("TOKEN_EXPIRED", "Token has expired"),
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("INVALID_TOKEN", "Invalid token"),
            ),
            AppError::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                ErrorDetail::new(
                    "INSUFFICIENT_PERMISSIONS",
                    "You do not have permission to perform this action",
                ),
            ),
            AppError::Unauthorized(message) => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("UNAUTHORIZED", message.clone()),
            ),
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    field: Some(field.clone()),
                    ..ErrorDetail::new("VALIDATION_ERROR", message.clone())
                },
            ),
            AppError::InvalidQuantities { message, details } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    details: Some(details.clone()),
                    ..ErrorDetail::new("VALIDATION_ERROR", message.clone())
                },
            ),
            AppError::DuplicateEntry(field) => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    field: Some(field.clone()),
                    ..ErrorDetail::new(
                        "DUPLICATE_ENTRY",
                        format!("A record with this {} already exists", field),
                    )
                },
            ),
            AppError::Conflict { resource, message } => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    field: Some(resource.clone()),
                    ..ErrorDetail::new("CONFLICT", message.clone())
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("NOT_FOUND", format!("{} not found", resource)),
            ),
            AppError::InvalidStateTransition(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("INVALID_STATE_TRANSITION", msg.clone()),
            ),
            AppError::InsufficientStock(shortages) => {
                let names: Vec<&str> = shortages.iter().map(|s| s.material_name.as_str()).collect();
                (
                    StatusCode::BAD_REQUEST,
                    ErrorDetail {
                        details: Some(shortages.iter().map(ToString::to_string).collect()),
                        ..ErrorDetail::new(
                            "INSUFFICIENT_STOCK",
                            format!("Insufficient stock for: {}", names.join(", ")),
                        )
                    },
                )
            }
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("DATABASE_ERROR", "A database error occurred"),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", "An internal server error occurred"),
            ),
        };

        // Log the error for debugging
        tracing::error!("Error: {:?}", self);

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use shared::{LineViolation, ViolationKind};

    #[test]
    fn test_status_codes() {
        let cases = vec![
            (AppError::validation("name", "required"), StatusCode::BAD_REQUEST),
            (AppError::InsufficientPermissions, StatusCode::FORBIDDEN),
            (AppError::NotFound("Delivery challan".into()), StatusCode::NOT_FOUND),
            (AppError::DuplicateEntry("name".into()), StatusCode::CONFLICT),
            (
                AppError::InvalidStateTransition("Delivery challan is Completed".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::Internal("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_insufficient_stock_is_bad_request() {
        let err = AppError::InsufficientStock(vec![Shortage {
            material_name: "Carton".to_string(),
            required: Decimal::from(300),
            available: Decimal::from(120),
        }]);
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_planning_errors_map_to_not_found() {
        let err: AppError = PlanningError::MissingMapping("Premium T-Shirt".into()).into();
        assert!(matches!(err, AppError::NotFound(ref m) if m.contains("Premium T-Shirt")));
        let err: AppError = PlanningError::NoProducts.into();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn test_reconciliation_violations_become_details() {
        let err: AppError = ReconciliationError::InvalidLines(vec![LineViolation {
            material_name: "Poly Bag".to_string(),
            qty_sent: Decimal::from(100),
            used: Decimal::from(60),
            not_used: Decimal::from(50),
            kind: ViolationKind::ExceedsSent,
        }])
        .into();
        match err {
            AppError::InvalidQuantities { details, .. } => {
                assert_eq!(details.len(), 1);
                assert!(details[0].contains("Poly Bag"));
                assert!(details[0].contains("110"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
