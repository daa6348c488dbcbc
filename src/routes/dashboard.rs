use askama::Template;
use axum::{
    extract::State,
    response::{Html, IntoResponse},
};
use tracing::instrument;

use crate::{errors::LinkError, models::link::LinkModel, routes::auth::Claims, startup::AppState};

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    email: String,
    base_url: String,
    links: Vec<LinkModel>,
}

#[instrument(name = "Web: Dashboard", skip(state, claims), fields(user_id = %claims.sub))]
pub async fn dashboard_handler(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<impl IntoResponse, LinkError> {
    let owner = uuid::Uuid::parse_str(&claims.sub).map_err(|_| LinkError::Unauthenticated)?;

    let links = state
        .link_service
        .list_by_owner(owner)
        .await
        .map_err(LinkError::Internal)?;

    let template = DashboardTemplate {
        email: claims.email,
        base_url: state.base_url.clone(),
        links,
    };
    let page = template
        .render()
        .map_err(|e| LinkError::Internal(e.into()))?;

    Ok(Html(page))
}
