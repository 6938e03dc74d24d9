use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
#[cfg(debug_assertions)]
use tower_http::cors::CorsLayer;

use crate::{
    AppState,
    middleware::{auth_middleware, log_errors},
    routes::{club, contact, group, health},
};

// 俱乐部路由
fn club_routes() -> Router<AppState> {
    Router::new()
        .route("/clubs", post(club::create_club).get(club::get_member_clubs))
        .route("/clubs/owned", get(club::get_owned_clubs))
        .route("/clubs/sharing-options", get(club::get_sharing_options))
        .route(
            "/clubs/{club_id}",
            get(club::get_club_details)
                .put(club::update_club)
                .delete(club::delete_club),
        )
        .route("/clubs/{club_id}/edit", get(club::get_club_edit_data))
}

// 群组路由
fn group_routes() -> Router<AppState> {
    Router::new()
        .route("/groups", post(group::create_group).get(group::get_groups))
        .route(
            "/groups/{group_id}",
            get(group::get_group_details)
                .put(group::update_group)
                .delete(group::delete_group),
        )
}

// 联系人路由
fn contact_routes() -> Router<AppState> {
    Router::new()
        .route("/contacts", post(contact::create_contact).get(contact::get_contacts))
        .route(
            "/contacts/{email}",
            get(contact::get_contact)
                .put(contact::update_contact)
                .delete(contact::delete_contact),
        )
}

/// 组装完整路由：公开的健康检查加上需要登录的业务路由，统一挂在 `api_base_uri` 下
pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new().route("/health", get(health::health));

    let protected_routes = Router::new()
        .merge(club_routes())
        .merge(group_routes())
        .merge(contact_routes())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api = Router::new().merge(public_routes).merge(protected_routes);

    // axum 不允许在根路径 nest
    let base = state.config.api_base_uri.trim_end_matches('/');
    let router = if base.is_empty() {
        api
    } else {
        Router::new().nest(base, api)
    };

    let router = router
        .layer(axum::middleware::from_fn(log_errors))
        .layer(TraceLayer::new_for_http());

    // 开发模式下允许所有来源
    #[cfg(debug_assertions)]
    let router = router.layer(CorsLayer::permissive());

    router.with_state(state)
}
