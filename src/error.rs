use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ShopError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("Admin access required")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),
    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("password hashing failed: {0}")]
    Hashing(#[from] argon2::Error),
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
    #[error("invalid upload encoding: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("csv export failed: {0}")]
    Export(#[from] csv::Error),
    #[error("{0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ShopError>;

impl ShopError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ShopError::Validation(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        ShopError::Unauthorized(msg.into())
    }
}

impl ResponseError for ShopError {
    fn status_code(&self) -> StatusCode {
        match self {
            ShopError::Validation(_) | ShopError::Encoding(_) => StatusCode::BAD_REQUEST,
            ShopError::Unauthorized(_) | ShopError::Token(_) => StatusCode::UNAUTHORIZED,
            ShopError::Forbidden => StatusCode::FORBIDDEN,
            ShopError::NotFound(_) => StatusCode::NOT_FOUND,
            ShopError::Conflict(_) => StatusCode::CONFLICT,
            ShopError::Database(_)
            | ShopError::Hashing(_)
            | ShopError::Storage(_)
            | ShopError::Export(_)
            | ShopError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        // Server faults are logged in full but never echoed to the caller
        let message = if status.is_server_error() {
            log::error!("{}", self);
            "Internal Server Error".to_string()
        } else {
            self.to_string()
        };
        HttpResponse::build(status).json(json!({ "error": message }))
    }
}
