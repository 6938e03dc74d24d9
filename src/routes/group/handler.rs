use axum::{
    Extension,
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::utils::validation::{parse_uuid, require_non_empty, validate_emails};
use crate::utils::{Claims, FormJson, success_response};

use super::model::{
    CreateGroupRequest, Group, GroupDetailsView, GroupWithMembers, UpdateGroupRequest,
};

const INVALID_GROUP_ID: &str = "Invalid group ID format";

/// 所有者至少一位
fn validate_owner_emails(owner_emails: &[String]) -> AppResult<Vec<String>> {
    let owners = validate_emails(owner_emails, "Invalid owner email format")?;
    if owners.is_empty() {
        return Err(AppError::InvalidData("At least one owner is required".into()));
    }
    Ok(owners)
}

#[axum::debug_handler]
pub async fn create_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    FormJson(req): FormJson<CreateGroupRequest>,
) -> impl IntoResponse {
    const FAILED: &str = "Failed to create group. Please try again.";

    // 创建者总是所有者
    let validated = require_non_empty(&req.name, "Group name cannot be empty").and_then(|name| {
        let owners = validate_owner_emails(&[claims.sub.clone()])?;
        let members = validate_emails(&req.member_emails, "Invalid member email format")?;
        Ok((name, owners, members))
    });
    let (name, owners, members) = match validated {
        Ok(v) => v,
        Err(e) => return e.into_mutation_response(FAILED),
    };

    match Group::create(&state.pool, &name, &owners, &members).await {
        Ok(group_id) => {
            tracing::info!("User {} created group {}", claims.sub, group_id);
            success_response(StatusCode::CREATED, "Group created successfully.")
        }
        Err(e) => AppError::from(e).into_mutation_response(FAILED),
    }
}

#[axum::debug_handler]
pub async fn update_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<String>,
    FormJson(req): FormJson<UpdateGroupRequest>,
) -> impl IntoResponse {
    const FAILED: &str = "Failed to update group. Please try again.";

    let validated = parse_uuid(&group_id, INVALID_GROUP_ID).and_then(|group_id| {
        let name = require_non_empty(&req.name, "Group name cannot be empty")?;
        let owners = validate_owner_emails(&req.owner_emails)?;
        let members = validate_emails(&req.member_emails, "Invalid member email format")?;
        Ok((group_id, name, owners, members))
    });
    let (group_id, name, owners, members) = match validated {
        Ok(v) => v,
        Err(e) => return e.into_mutation_response(FAILED),
    };

    match Group::is_owner(&state.pool, &claims.sub, group_id).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!("User {} attempted to edit group {} without ownership", claims.sub, group_id);
            return AppError::Unauthorized("You do not have permission to edit this group.".into())
                .into_mutation_response(FAILED);
        }
        Err(e) => return AppError::from(e).into_mutation_response(FAILED),
    }

    match Group::update(&state.pool, group_id, &name, &owners, &members).await {
        Ok(()) => {
            tracing::info!("User {} updated group {}", claims.sub, group_id);
            success_response(StatusCode::OK, "Group updated successfully.")
        }
        Err(e) => AppError::from(e).into_mutation_response(FAILED),
    }
}

#[axum::debug_handler]
pub async fn delete_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<String>,
) -> impl IntoResponse {
    const FAILED: &str = "Failed to delete group. Please try again.";

    let group_id = match parse_uuid(&group_id, INVALID_GROUP_ID) {
        Ok(id) => id,
        Err(e) => return e.into_mutation_response(FAILED),
    };

    match Group::is_owner(&state.pool, &claims.sub, group_id).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!("User {} attempted to delete group {} without ownership", claims.sub, group_id);
            return AppError::Unauthorized("You do not have permission to delete this group.".into())
                .into_mutation_response(FAILED);
        }
        Err(e) => return AppError::from(e).into_mutation_response(FAILED),
    }

    match Group::delete(&state.pool, group_id).await {
        Ok(()) => {
            tracing::info!("User {} deleted group {}", claims.sub, group_id);
            success_response(StatusCode::OK, "Group deleted successfully.")
        }
        Err(e) => AppError::from(e).into_mutation_response(FAILED),
    }
}

pub async fn get_groups(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<GroupWithMembers>>> {
    let groups = Group::find_all_for_user(&state.pool, &claims.sub).await?;
    Ok(Json(groups))
}

pub async fn get_group_details(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<String>,
) -> AppResult<Json<GroupDetailsView>> {
    let group_id = parse_uuid(&group_id, INVALID_GROUP_ID)?;

    let details = Group::find_details(&state.pool, group_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Group not found".into()))?;

    if !details.has_member(&claims.sub) {
        tracing::warn!(
            "User {} attempted to access group {} they are not a member of",
            claims.sub,
            group_id
        );
        return Err(AppError::NotFound("Group not found".into()));
    }

    let is_owner = details.has_owner(&claims.sub);
    Ok(Json(GroupDetailsView { details, is_owner }))
}
