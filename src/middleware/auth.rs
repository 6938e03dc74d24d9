use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{AppState, error::AppError, utils::verify_token};

fn bearer_token(req: &Request<Body>) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// 校验会话令牌，并把 `Claims` 放入请求扩展。
/// 没有令牌或令牌无效时直接返回“需要登录”。
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(&req) else {
        tracing::debug!("Missing session token for {}", req.uri().path());
        return AppError::Unauthenticated.into_response();
    };

    let claims = match verify_token(token, &state.config) {
        Ok(claims) if !claims.sub.trim().is_empty() => claims,
        Ok(_) => return AppError::Unauthenticated.into_response(),
        Err(e) => return AppError::from(e).into_response(),
    };

    req.extensions_mut().insert(claims);
    next.run(req).await
}
