use axum::{
    Extension,
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::future::try_join;
use serde::Serialize;
use uuid::Uuid;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::routes::contact::model::{Contact, ContactForSharing};
use crate::routes::group::model::{Group, GroupWithMembers};
use crate::utils::validation::{
    dedup_emails, parse_details, parse_uuid, require_non_empty, validate_emails,
};
use crate::utils::{Claims, FormJson, success_response, success_with_location};

use super::model::{
    Club, ClubDetails, ClubEditData, ClubSummary, ClubWithOwnership, CreateClubRequest,
    UpdateClubRequest,
};

const INVALID_CLUB_ID: &str = "Invalid club ID format";

#[derive(Debug, Serialize)]
pub struct SharingOptions {
    pub contacts: Vec<ContactForSharing>,
    pub groups: Vec<GroupWithMembers>,
}

/// 校验后的俱乐部表单
struct ClubForm {
    name: String,
    details: ClubDetails,
    member_emails: Vec<String>,
    group_ids: Vec<Uuid>,
}

fn validate_club_form(req: &CreateClubRequest) -> AppResult<ClubForm> {
    let name = require_non_empty(&req.name, "Club name cannot be empty")?;
    let member_emails = validate_emails(&req.member_emails, "Invalid member email format")?;
    let group_ids = req
        .group_ids
        .iter()
        .map(|id| parse_uuid(id, "Invalid group ID format"))
        .collect::<AppResult<Vec<_>>>()?;
    let details = parse_details(req.details.as_deref())?;

    Ok(ClubForm {
        name,
        details,
        member_emails,
        group_ids,
    })
}

/// 直接选择的成员加上所选群组的成员
async fn resolve_recipients(state: &AppState, user_email: &str, form: &ClubForm) -> AppResult<Vec<String>> {
    let from_groups = Group::member_emails_for_sharing(&state.pool, user_email, &form.group_ids).await?;
    Ok(dedup_emails(
        form.member_emails.iter().cloned().chain(from_groups),
    ))
}

fn club_location(state: &AppState, club_id: Uuid) -> String {
    format!(
        "{}/clubs/{}",
        state.config.api_base_uri.trim_end_matches('/'),
        club_id
    )
}

#[axum::debug_handler]
pub async fn create_club(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    FormJson(req): FormJson<CreateClubRequest>,
) -> Response {
    const FAILED: &str = "Failed to create club. Please try again.";

    let form = match validate_club_form(&req) {
        Ok(form) => form,
        Err(e) => {
            tracing::warn!("Rejected club form from {}: {}", claims.sub, e);
            return e.into_mutation_response(FAILED).into_response();
        }
    };

    let members = match resolve_recipients(&state, &claims.sub, &form).await {
        Ok(members) => members,
        Err(e) => return e.into_mutation_response(FAILED).into_response(),
    };

    match Club::create(&state.pool, &form.name, &claims.sub, &members, &form.details).await {
        Ok(club) => {
            tracing::info!("User {} created club {}", claims.sub, club.id);
            success_with_location(
                StatusCode::CREATED,
                "Club created successfully.",
                club_location(&state, club.id),
            )
        }
        Err(e) => AppError::from(e).into_mutation_response(FAILED).into_response(),
    }
}

#[axum::debug_handler]
pub async fn update_club(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(club_id): Path<String>,
    FormJson(req): FormJson<UpdateClubRequest>,
) -> Response {
    const FAILED: &str = "Failed to update club. Please try again.";

    let club_id = match parse_uuid(&club_id, INVALID_CLUB_ID) {
        Ok(id) => id,
        Err(e) => return e.into_mutation_response(FAILED).into_response(),
    };
    let form = match validate_club_form(&req) {
        Ok(form) => form,
        Err(e) => return e.into_mutation_response(FAILED).into_response(),
    };

    let members = match resolve_recipients(&state, &claims.sub, &form).await {
        Ok(members) => members,
        Err(e) => return e.into_mutation_response(FAILED).into_response(),
    };

    match Club::recreate(
        &state.pool,
        club_id,
        &claims.sub,
        &form.name,
        &members,
        &form.details,
    )
    .await
    {
        Ok(club) => {
            tracing::info!("User {} updated club {} (now {})", claims.sub, club_id, club.id);
            // 编辑后 ID 改变，用 Location 告知新地址
            success_with_location(
                StatusCode::OK,
                "Club updated successfully.",
                club_location(&state, club.id),
            )
        }
        Err(e) => {
            if matches!(e, AppError::Unauthorized(_)) {
                tracing::warn!("User {} attempted to edit club {} without ownership", claims.sub, club_id);
            }
            e.into_mutation_response(FAILED).into_response()
        }
    }
}

#[axum::debug_handler]
pub async fn delete_club(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(club_id): Path<String>,
) -> impl IntoResponse {
    const FAILED: &str = "Failed to delete club. Please try again.";

    let club_id = match parse_uuid(&club_id, INVALID_CLUB_ID) {
        Ok(id) => id,
        Err(e) => return e.into_mutation_response(FAILED),
    };

    match Club::delete(&state.pool, club_id, &claims.sub).await {
        Ok(()) => {
            tracing::info!("User {} deleted club {}", claims.sub, club_id);
            success_response(StatusCode::OK, "Club deleted successfully.")
        }
        Err(e) => {
            if matches!(e, AppError::Unauthorized(_)) {
                tracing::warn!("User {} attempted to delete club {} without ownership", claims.sub, club_id);
            }
            e.into_mutation_response(FAILED)
        }
    }
}

pub async fn get_owned_clubs(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<ClubSummary>>> {
    let clubs = Club::find_owned(&state.pool, &claims.sub).await?;
    Ok(Json(clubs))
}

pub async fn get_member_clubs(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<ClubSummary>>> {
    let clubs = Club::find_all_member(&state.pool, &claims.sub).await?;
    Ok(Json(clubs))
}

pub async fn get_club_details(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(club_id): Path<String>,
) -> AppResult<Json<ClubWithOwnership>> {
    let club_id = parse_uuid(&club_id, INVALID_CLUB_ID)?;

    let details = Club::find_details(&state.pool, club_id, &claims.sub)
        .await?
        .ok_or_else(|| AppError::NotFound("Club not found".into()))?;

    // 只有所有者和成员可以查看详情
    if !details.is_owner && !Club::is_member(&state.pool, &claims.sub, club_id).await? {
        tracing::warn!("User {} attempted to view club {} without access", claims.sub, club_id);
        return Err(AppError::NotFound("Club not found".into()));
    }

    Ok(Json(details))
}

pub async fn get_club_edit_data(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(club_id): Path<String>,
) -> AppResult<Json<ClubEditData>> {
    let club_id = parse_uuid(&club_id, INVALID_CLUB_ID)?;

    if !Club::is_owner(&state.pool, &claims.sub, club_id).await? {
        return Err(AppError::Unauthorized(
            "You do not have permission to edit this club.".into(),
        ));
    }

    let data = Club::find_edit_data(&state.pool, club_id, &claims.sub)
        .await?
        .ok_or_else(|| AppError::NotFound("Club not found".into()))?;

    Ok(Json(data))
}

pub async fn get_sharing_options(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<SharingOptions>> {
    let (contacts, groups) = try_join(
        Contact::find_for_sharing(&state.pool, &claims.sub),
        Group::find_for_sharing(&state.pool, &claims.sub),
    )
    .await?;

    Ok(Json(SharingOptions { contacts, groups }))
}
