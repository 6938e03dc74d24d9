mod common;

use axum::{
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use clubshare::create_router;
use clubshare::utils::{MutationState, MutationStatus, generate_token};
use serde_json::{Value, json};
use tower::ServiceExt;

use common::offline_state;

fn bearer(email: &str) -> String {
    let state = offline_state();
    let (token, _) = generate_token(email, &state.config).unwrap();
    format!("Bearer {token}")
}

fn json_request(method: Method, uri: &str, auth: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn send(req: Request<Body>) -> (StatusCode, MutationState) {
    let app = create_router(offline_state());
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn missing_token_requires_login() {
    let req = Request::builder()
        .uri("/api/clubs")
        .body(Body::empty())
        .unwrap();
    let (status, state) = send(req).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(state.status, MutationStatus::Failed);
    assert_eq!(state.message.as_deref(), Some("Login to perform this action"));
}

#[tokio::test]
async fn token_signed_with_another_secret_is_rejected() {
    let mut config = offline_state().config;
    config.jwt_secret = "someone-else".into();
    let (token, _) = generate_token("a@x.com", &config).unwrap();

    let req = json_request(
        Method::POST,
        "/api/clubs",
        Some(&format!("Bearer {token}")),
        json!({ "name": "Gym" }),
    );
    let (status, state) = send(req).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(state.status, MutationStatus::Failed);
}

#[tokio::test]
async fn non_bearer_scheme_requires_login() {
    let req = Request::builder()
        .method(Method::DELETE)
        .uri("/api/groups/not-a-uuid")
        .header(header::AUTHORIZATION, "Basic YTpi")
        .body(Body::empty())
        .unwrap();
    let (status, state) = send(req).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(state.message.as_deref(), Some("Login to perform this action"));
}

#[tokio::test]
async fn malformed_club_id_is_invalid_data() {
    let auth = bearer("a@x.com");
    let req = Request::builder()
        .method(Method::DELETE)
        .uri("/api/clubs/not-a-uuid")
        .header(header::AUTHORIZATION, auth)
        .body(Body::empty())
        .unwrap();
    let (status, state) = send(req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(state.status, MutationStatus::InvalidData);
    assert_eq!(state.message.as_deref(), Some("Invalid club ID format"));
}

#[tokio::test]
async fn blank_club_name_is_invalid_data() {
    let auth = bearer("a@x.com");
    let req = json_request(
        Method::POST,
        "/api/clubs",
        Some(&auth),
        json!({ "name": "   ", "member_emails": ["b@x.com"] }),
    );
    let (status, state) = send(req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(state.status, MutationStatus::InvalidData);
    assert_eq!(state.message.as_deref(), Some("Club name cannot be empty"));
}

#[tokio::test]
async fn unparseable_details_are_invalid_data() {
    let auth = bearer("a@x.com");
    let req = json_request(
        Method::POST,
        "/api/clubs",
        Some(&auth),
        json!({ "name": "Gym", "details": "{not json" }),
    );
    let (status, state) = send(req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(state.status, MutationStatus::InvalidData);
    assert_eq!(state.message.as_deref(), Some("Invalid details format."));
}

#[tokio::test]
async fn club_member_email_is_validated() {
    let auth = bearer("a@x.com");
    let req = json_request(
        Method::POST,
        "/api/clubs",
        Some(&auth),
        json!({ "name": "Gym", "member_emails": ["b@x.com", "nope"] }),
    );
    let (status, state) = send(req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(state.message.as_deref(), Some("Invalid member email format"));
}

#[tokio::test]
async fn group_with_bad_member_email_is_invalid_data() {
    let auth = bearer("a@x.com");
    let req = json_request(
        Method::POST,
        "/api/groups",
        Some(&auth),
        json!({ "name": "Team", "member_emails": ["not an email"] }),
    );
    let (status, state) = send(req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(state.status, MutationStatus::InvalidData);
}

#[tokio::test]
async fn group_update_without_owners_is_invalid_data() {
    let auth = bearer("a@x.com");
    let req = json_request(
        Method::PUT,
        &format!("/api/groups/{}", uuid::Uuid::new_v4()),
        Some(&auth),
        json!({ "name": "Team", "owner_emails": [], "member_emails": ["b@x.com"] }),
    );
    let (status, state) = send(req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(state.message.as_deref(), Some("At least one owner is required"));
}

#[tokio::test]
async fn contact_with_invalid_email_is_invalid_data() {
    let auth = bearer("a@x.com");
    let req = json_request(
        Method::POST,
        "/api/contacts",
        Some(&auth),
        json!({ "contact_email": "bob", "first_name": "Bob" }),
    );
    let (status, state) = send(req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(state.status, MutationStatus::InvalidData);
    assert_eq!(state.message.as_deref(), Some("Invalid email format"));
}

#[tokio::test]
async fn wrongly_typed_field_is_invalid_data() {
    let auth = bearer("a@x.com");
    let req = json_request(
        Method::POST,
        "/api/clubs",
        Some(&auth),
        json!({ "name": "Gym", "member_emails": "b@x.com" }),
    );
    let (status, state) = send(req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(state.status, MutationStatus::InvalidData);
    assert_eq!(state.message.as_deref(), Some("Invalid request body"));
}

#[tokio::test]
async fn unparseable_body_is_invalid_data() {
    let auth = bearer("a@x.com");
    let req = Request::builder()
        .method(Method::PUT)
        .uri("/api/contacts/b@x.com")
        .header(header::AUTHORIZATION, auth)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, state) = send(req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(state.status, MutationStatus::InvalidData);
}

#[tokio::test]
async fn missing_content_type_is_invalid_data() {
    let auth = bearer("a@x.com");
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/groups")
        .header(header::AUTHORIZATION, auth)
        .body(Body::from(r#"{"name":"Team"}"#))
        .unwrap();
    let (status, state) = send(req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(state.status, MutationStatus::InvalidData);
}
