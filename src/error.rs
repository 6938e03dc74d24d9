use axum::Json;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::utils::MutationState;

pub const LOGIN_REQUIRED: &str = "Login to perform this action";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Login to perform this action")]
    Unauthenticated,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidData(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::FORBIDDEN,
            AppError::Unauthenticated | AppError::Jwt(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 转换为对外的结果结构。存储错误只记录日志，客户端只看到 `failure_message`。
    pub fn into_mutation_state(self, failure_message: &str) -> MutationState {
        match self {
            AppError::InvalidData(msg) => MutationState::invalid_data(msg),
            AppError::Unauthorized(msg) => MutationState::unauthorized(msg),
            AppError::NotFound(msg) => MutationState::failed(msg),
            AppError::Unauthenticated => MutationState::failed(LOGIN_REQUIRED),
            AppError::Jwt(e) => {
                tracing::warn!("Rejected session token: {}", e);
                MutationState::failed(LOGIN_REQUIRED)
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                MutationState::failed(failure_message)
            }
        }
    }

    pub fn into_mutation_response(self, failure_message: &str) -> (StatusCode, Json<MutationState>) {
        let status = self.status_code();
        (status, Json(self.into_mutation_state(failure_message)))
    }
}

/// 请求体不是合法 JSON 或字段类型不对
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!("Rejected request body: {}", rejection.body_text());
        AppError::InvalidData("Invalid request body".into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.into_mutation_response("Something went wrong. Please try again.")
            .into_response()
    }
}
