use axum::{
    Extension,
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::utils::validation::{require_non_empty, validate_email};
use crate::utils::{Claims, FormJson, success_response};

use super::model::{
    Contact, CreateContactRequest, UpdateContactRequest, display_name_from,
};

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[axum::debug_handler]
pub async fn create_contact(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    FormJson(req): FormJson<CreateContactRequest>,
) -> impl IntoResponse {
    const FAILED: &str = "Failed to create contact. Please try again.";

    let validated = validate_email(&req.contact_email, "Invalid email format").and_then(|email| {
        let first_name = require_non_empty(&req.first_name, "First name is required")?;
        Ok((email, display_name_from(&first_name, req.last_name.as_deref())))
    });
    let (contact_email, display_name) = match validated {
        Ok(v) => v,
        Err(e) => return e.into_mutation_response(FAILED),
    };

    match Contact::create(&state.pool, &claims.sub, &contact_email, &display_name).await {
        Ok(_) => {
            tracing::info!("User {} added contact {}", claims.sub, contact_email);
            success_response(StatusCode::CREATED, "Contact created successfully.")
        }
        Err(e) if is_unique_violation(&e) => {
            AppError::InvalidData("Contact already exists.".into()).into_mutation_response(FAILED)
        }
        Err(e) => AppError::from(e).into_mutation_response(FAILED),
    }
}

#[axum::debug_handler]
pub async fn update_contact(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(contact_email): Path<String>,
    FormJson(req): FormJson<UpdateContactRequest>,
) -> impl IntoResponse {
    const FAILED: &str = "Failed to update contact. Please try again.";

    // display_name 为 null 表示清除，空字符串不合法
    let validated = validate_email(&contact_email, "Invalid contact email format").and_then(|email| {
        let display_name = req
            .display_name
            .as_deref()
            .map(|name| require_non_empty(name, "Display name cannot be empty"))
            .transpose()?;
        Ok((email, display_name))
    });
    let (contact_email, display_name) = match validated {
        Ok(v) => v,
        Err(e) => return e.into_mutation_response(FAILED),
    };

    match Contact::update_display_name(
        &state.pool,
        &claims.sub,
        &contact_email,
        display_name.as_deref(),
    )
    .await
    {
        Ok(true) => success_response(StatusCode::OK, "Contact updated successfully."),
        Ok(false) => {
            AppError::NotFound("Contact not found.".into()).into_mutation_response(FAILED)
        }
        Err(e) => AppError::from(e).into_mutation_response(FAILED),
    }
}

#[axum::debug_handler]
pub async fn delete_contact(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(contact_email): Path<String>,
) -> impl IntoResponse {
    const FAILED: &str = "Failed to delete contact. Please try again.";

    let contact_email = match validate_email(&contact_email, "Invalid contact email format") {
        Ok(email) => email,
        Err(e) => return e.into_mutation_response(FAILED),
    };

    match Contact::delete(&state.pool, &claims.sub, &contact_email).await {
        Ok(removed) => {
            tracing::info!(
                "User {} deleted contact {} (removed: {})",
                claims.sub,
                contact_email,
                removed
            );
            success_response(StatusCode::OK, "Contact deleted successfully.")
        }
        Err(e) => AppError::from(e).into_mutation_response(FAILED),
    }
}

pub async fn get_contacts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<Contact>>> {
    let contacts = Contact::find_all(&state.pool, &claims.sub).await?;
    Ok(Json(contacts))
}

pub async fn get_contact(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(contact_email): Path<String>,
) -> AppResult<Json<Contact>> {
    let contact = Contact::find_by_email(&state.pool, &claims.sub, &contact_email)
        .await?
        .ok_or_else(|| AppError::NotFound("Contact not found".into()))?;
    Ok(Json(contact))
}
