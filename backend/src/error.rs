//! Error handling for the LINO back-office
//!
//! Provides consistent error responses in English and Spanish

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::RuleViolations;
use thiserror::Error;

/// PostgreSQL SQLSTATE for a violated CHECK constraint
const CHECK_VIOLATION: &str = "23514";

/// PostgreSQL SQLSTATE for a violated UNIQUE constraint
const UNIQUE_VIOLATION: &str = "23505";

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

    #[error("Unauthorized: {message}")]
    Unauthorized {
        message: String,
        message_es: String,
    },

    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_es: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Business rules violated: {0}")]
    BusinessRules(#[from] RuleViolations),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Conflict: {message}")]
    Conflict {
        resource: String,
        message: String,
        message_es: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Insufficient inventory: {0}")]
    InsufficientInventory(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Field-level validation failure
    pub fn validation(field: &str, message: &str, message_es: &str) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.to_string(),
            message_es: message_es.to_string(),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            match db_err.code().as_deref() {
                Some(CHECK_VIOLATION) => {
                    return AppError::InsufficientInventory(
                        db_err
                            .constraint()
                            .unwrap_or("stock constraint")
                            .to_string(),
                    )
                }
                Some(UNIQUE_VIOLATION) => {
                    return AppError::DuplicateEntry(
                        db_err.constraint().unwrap_or("record").to_string(),
                    )
                }
                _ => {}
            }
        }
        AppError::DatabaseError(err)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
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
    pub message_en: String,
    pub message_es: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl ErrorDetail {
    fn new(code: &str, message_en: String, message_es: String) -> Self {
        Self {
            code: code.to_string(),
            message_en,
            message_es,
            field: None,
            details: None,
        }
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::TokenExpired | AppError::InvalidToken | AppError::Unauthorized { .. } => {
                StatusCode::UNAUTHORIZED
            }
            AppError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AppError::Validation { .. }
            | AppError::ValidationError(_)
            | AppError::BusinessRules(_) => StatusCode::BAD_REQUEST,
            AppError::DuplicateEntry(_) | AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidStateTransition(_) | AppError::InsufficientInventory(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Configuration(_)
            | AppError::DatabaseError(_)
            | AppError::Internal(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> ErrorDetail {
        match self {
            AppError::TokenExpired => ErrorDetail::new(
                "TOKEN_EXPIRED",
                "Token has expired".to_string(),
                "El token ha expirado".to_string(),
            ),
            AppError::InvalidToken => ErrorDetail::new(
                "INVALID_TOKEN",
                "Invalid token".to_string(),
                "Token inválido".to_string(),
            ),
            AppError::InsufficientPermissions => ErrorDetail::new(
                "INSUFFICIENT_PERMISSIONS",
                "You do not have permission to perform this action".to_string(),
                "No tiene permiso para realizar esta acción".to_string(),
            ),
            AppError::Unauthorized { message, message_es } => {
                ErrorDetail::new("UNAUTHORIZED", message.clone(), message_es.clone())
            }
            AppError::Validation {
                field,
                message,
                message_es,
            } => ErrorDetail {
                field: Some(field.clone()),
                ..ErrorDetail::new("VALIDATION_ERROR", message.clone(), message_es.clone())
            },
            AppError::ValidationError(msg) => ErrorDetail::new(
                "VALIDATION_ERROR",
                msg.clone(),
                format!("Datos inválidos: {}", msg),
            ),
            AppError::BusinessRules(violations) => ErrorDetail {
                details: Some(violations.0.clone()),
                ..ErrorDetail::new(
                    "BUSINESS_RULE_VIOLATION",
                    "The request breaks one or more business rules".to_string(),
                    "La solicitud no cumple una o más reglas del negocio".to_string(),
                )
            },
            AppError::DuplicateEntry(field) => ErrorDetail {
                field: Some(field.clone()),
                ..ErrorDetail::new(
                    "DUPLICATE_ENTRY",
                    format!("A record with this {} already exists", field),
                    format!("Ya existe un registro con este {}", field),
                )
            },
            AppError::Conflict {
                resource,
                message,
                message_es,
            } => ErrorDetail {
                field: Some(resource.clone()),
                ..ErrorDetail::new("CONFLICT", message.clone(), message_es.clone())
            },
            AppError::NotFound(resource) => ErrorDetail::new(
                "NOT_FOUND",
                format!("{} not found", resource),
                format!("No se encontró {}", resource),
            ),
            AppError::InvalidStateTransition(msg) => ErrorDetail::new(
                "INVALID_STATE_TRANSITION",
                msg.clone(),
                format!("Operación no permitida en el estado actual: {}", msg),
            ),
            AppError::InsufficientInventory(msg) => ErrorDetail::new(
                "INSUFFICIENT_INVENTORY",
                msg.clone(),
                format!("Inventario insuficiente: {}", msg),
            ),
            AppError::Configuration(msg) => ErrorDetail::new(
                "CONFIGURATION_ERROR",
                format!("Configuration error: {}", msg),
                format!("Error de configuración: {}", msg),
            ),
            AppError::DatabaseError(_) => ErrorDetail::new(
                "DATABASE_ERROR",
                "A database error occurred".to_string(),
                "Ocurrió un error en la base de datos".to_string(),
            ),
            AppError::Internal(msg) => ErrorDetail::new(
                "INTERNAL_ERROR",
                msg.clone(),
                "Error interno del servidor".to_string(),
            ),
            AppError::InternalError(_) => ErrorDetail::new(
                "INTERNAL_ERROR",
                "An internal server error occurred".to_string(),
                "Error interno del servidor".to_string(),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: self.detail() })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
