use axum::{
    Router,
    response::Redirect,
    routing::{get, post},
};
use sqlx::postgres::PgPoolOptions;
use tower_http::services::ServeDir;

use crate::configuration::get_configuration;
use crate::routes::auth::{login_page, login_post, logout_handler, signup_page, signup_post};
use crate::routes::dashboard::dashboard_handler;
use crate::routes::link::{
    create_link_handler, delete_link_handler, redirect_handler, update_link_handler,
};
use crate::services::auth::AuthService;
use crate::services::link::LinkService;
use crate::store::link::PgLinkRepository;
use crate::store::user::UserRepository;

#[derive(Clone)]
pub struct AppState {
    pub link_service: LinkService,
    pub auth_service: AuthService,
    pub base_url: String,
}

pub async fn run() -> anyhow::Result<()> {
    let cfg = get_configuration()?;

    let pg_pool = PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(2))
        .connect_lazy_with(cfg.database.with_db());

    let link_service = LinkService::new(PgLinkRepository::new(pg_pool.clone()));
    let auth_service = AuthService::new(UserRepository::new(pg_pool));

    let app_state = AppState {
        link_service,
        auth_service,
        base_url: cfg.application.base_url.clone(),
    };

    let app = Router::new()
        .route("/", get(|| async { Redirect::to("/dashboard") }))
        .route("/dashboard", get(dashboard_handler))
        .route("/links", post(create_link_handler))
        .route("/links/{id}", post(update_link_handler))
        .route("/links/{id}/delete", post(delete_link_handler))
        .route("/login", get(login_page).post(login_post))
        .route("/signup", get(signup_page).post(signup_post))
        .route("/logout", get(logout_handler))
        .nest_service("/assets", ServeDir::new("public"))
        // Static routes above win over the catch-all short-code route.
        .route("/{code}", get(redirect_handler))
        .with_state(app_state);

    let address = format!("{}:{}", cfg.application.host, cfg.application.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("Listening on {}", address);
    axum::serve(listener, app).await?;

    Ok(())
}
