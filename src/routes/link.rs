use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
    Form,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{errors::LinkError, routes::auth::Claims, startup::AppState};

#[derive(serde::Deserialize)]
pub struct CreateLinkForm {
    pub target_url: String,
    pub code: Option<String>,
}

#[derive(serde::Deserialize)]
pub struct UpdateLinkForm {
    pub target_url: String,
    pub code: Option<String>,
}

fn owner_id(claims: &Claims) -> Result<Uuid, LinkError> {
    Uuid::parse_str(&claims.sub).map_err(|_| LinkError::Unauthenticated)
}

/// An empty or whitespace-only form field means "no custom code".
fn desired_code(raw: &Option<String>) -> Option<&str> {
    raw.as_deref().map(str::trim).filter(|c| !c.is_empty())
}

#[instrument(name = "Web: Create link", skip(state, claims, form), fields(user_id = %claims.sub))]
pub async fn create_link_handler(
    State(state): State<AppState>,
    claims: Claims,
    Form(form): Form<CreateLinkForm>,
) -> Result<impl IntoResponse, LinkError> {
    let owner = owner_id(&claims)?;
    state
        .link_service
        .create(owner, form.target_url.trim(), desired_code(&form.code))
        .await?;

    Ok(Redirect::to("/dashboard"))
}

#[instrument(name = "Web: Update link", skip(state, claims, form), fields(user_id = %claims.sub))]
pub async fn update_link_handler(
    State(state): State<AppState>,
    claims: Claims,
    Path(link_id): Path<Uuid>,
    Form(form): Form<UpdateLinkForm>,
) -> Result<impl IntoResponse, LinkError> {
    let owner = owner_id(&claims)?;
    state
        .link_service
        .update(owner, link_id, form.target_url.trim(), desired_code(&form.code))
        .await?;

    Ok(Redirect::to("/dashboard"))
}

#[instrument(name = "Web: Delete link", skip(state, claims), fields(user_id = %claims.sub))]
pub async fn delete_link_handler(
    State(state): State<AppState>,
    claims: Claims,
    Path(link_id): Path<Uuid>,
) -> Result<impl IntoResponse, LinkError> {
    let owner = owner_id(&claims)?;
    state.link_service.delete(owner, link_id).await?;

    Ok(Redirect::to("/dashboard"))
}

#[instrument(name = "Web: Redirect", skip(state))]
pub async fn redirect_handler(
    Path(code): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.link_service.resolve(&code).await {
        Ok(Some(link)) => {
            tracing::info!(code = %code, "Redirecting to {}", link.target_url);
            Redirect::permanent(&link.target_url).into_response()
        }
        Ok(None) => {
            warn!(code = %code, "Short code not found");
            (StatusCode::NOT_FOUND, "short link not found").into_response()
        }
        Err(e) => {
            tracing::error!("Failed to resolve short code: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
        }
    }
}
