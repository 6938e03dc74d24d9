use axum::{
    body::{Body, to_bytes},
    http::Request,
    middleware::Next,
    response::Response,
};

const MAX_LOGGED_BODY: usize = 4096;

/// 记录所有 5xx 响应，便于排查存储错误。日志只截取开头部分，响应体原样返回
pub async fn log_errors(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    let response = next.run(req).await;
    if !response.status().is_server_error() {
        return response;
    }

    let (parts, body) = response.into_parts();
    match to_bytes(body, usize::MAX).await {
        Ok(bytes) => {
            let logged = &bytes[..bytes.len().min(MAX_LOGGED_BODY)];
            tracing::error!(
                %method,
                %path,
                status = %parts.status,
                body = %String::from_utf8_lossy(logged),
                truncated = bytes.len() > MAX_LOGGED_BODY,
                "Request failed"
            );
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(e) => {
            tracing::error!(%method, %path, status = %parts.status, "Request failed, body unreadable: {}", e);
            Response::from_parts(parts, Body::empty())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, http::StatusCode, routing::get};
    use tower::ServiceExt;

    async fn body_of(app: Router) -> (StatusCode, Vec<u8>) {
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    #[tokio::test]
    async fn large_error_body_reaches_client_unchanged() {
        let big = "x".repeat(MAX_LOGGED_BODY * 3);
        let expected = big.clone();
        let app = Router::new()
            .route(
                "/",
                get(move || async move { (StatusCode::INTERNAL_SERVER_ERROR, big) }),
            )
            .layer(axum::middleware::from_fn(log_errors));

        let (status, body) = body_of(app).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, expected.into_bytes());
    }

    #[tokio::test]
    async fn successful_responses_pass_through() {
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn(log_errors));

        let (status, body) = body_of(app).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ok");
    }
}
