use axum::Json;
use axum::extract::FromRequest;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::AppError;

pub mod validation;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // 用户邮箱
    pub exp: i64,    // 过期时间
    pub iat: i64,    // 签发时间
}

/// 签发会话令牌。正式环境中由身份提供方签发，这里供测试和运维工具使用。
pub fn generate_token(
    email: &str,
    config: &Config,
) -> Result<(String, i64), jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let expiration = (now + Duration::seconds(config.jwt_expiration().as_secs() as i64)).timestamp();

    let claims = Claims {
        sub: email.to_string(),
        exp: expiration,
        iat: now.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?;

    Ok((token, expiration))
}

pub fn verify_token(token: &str, config: &Config) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationStatus {
    Idle,
    InProgress,
    Success,
    Failed,
    InvalidData,
    Unauthorized,
}

/// 所有写操作统一返回的结果结构
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationState {
    pub status: MutationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl MutationState {
    pub fn idle() -> Self {
        Self {
            status: MutationStatus::Idle,
            message: None,
        }
    }

    fn with_message(status: MutationStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: Some(message.into()),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::with_message(MutationStatus::Success, message)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::with_message(MutationStatus::Failed, message)
    }

    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::with_message(MutationStatus::InvalidData, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::with_message(MutationStatus::Unauthorized, message)
    }
}

impl Default for MutationState {
    fn default() -> Self {
        Self::idle()
    }
}

/// JSON 请求体。解析失败按 invalid_data 返回
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct FormJson<T>(pub T);

/// 成功结果，同时用 `Location` 指向新记录
pub fn success_with_location(status: StatusCode, message: &str, location: String) -> Response {
    (
        status,
        [(header::LOCATION, location)],
        Json(MutationState::success(message)),
    )
        .into_response()
}

pub fn success_response(
    status: StatusCode,
    message: &str,
) -> (StatusCode, Json<MutationState>) {
    (status, Json(MutationState::success(message)))
}
