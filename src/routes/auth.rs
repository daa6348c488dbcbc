use std::sync::LazyLock;

use askama::Template;
use axum::Form;
use axum::RequestPartsExt;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::response::{Html, IntoResponse, Redirect};
use axum_extra::extract::CookieJar;
use axum_extra::extract::TypedHeader;
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::headers::{Authorization, authorization::Bearer};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::errors::AuthError;
use crate::startup::AppState;

#[derive(Template)]
#[template(path = "signup.html")]
struct SignupTemplate;

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate;

pub async fn signup_page() -> impl IntoResponse {
    Html(SignupTemplate.render().unwrap())
}

pub async fn login_page() -> impl IntoResponse {
    Html(LoginTemplate.render().unwrap())
}

#[derive(Debug, Deserialize)]
pub struct AuthPayload {
    email: String,
    password: String,
}

#[instrument(name = "Web: Signup POST", skip(state, payload))]
pub async fn signup_post(
    State(state): State<AppState>,
    Form(payload): Form<AuthPayload>,
) -> Result<impl IntoResponse, AuthError> {
    state
        .auth_service
        .register(&payload.email, &payload.password)
        .await?;

    Ok(Redirect::to("/login"))
}

#[instrument(name = "Web: Login POST", skip(state, jar, payload))]
pub async fn login_post(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(payload): Form<AuthPayload>,
) -> Result<impl IntoResponse, AuthError> {
    let user = state
        .auth_service
        .login(&payload.email, &payload.password)
        .await?;

    let claims = Claims {
        sub: user.id.to_string(),
        email: user.email,
        exp: (chrono::Utc::now() + chrono::Duration::hours(24)).timestamp() as usize,
    };
    let token = encode(&Header::default(), &claims, &KEYS.encoding).map_err(|e| {
        tracing::error!("JWT encoding failed: {:?}", e);
        AuthError::TokenCreation
    })?;

    let cookie = Cookie::build(("jwt", token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);

    Ok((jar.add(cookie), Redirect::to("/dashboard")))
}

#[instrument(name = "Web: Logout", skip(jar))]
pub async fn logout_handler(jar: CookieJar) -> impl IntoResponse {
    (jar.remove(Cookie::from("jwt")), Redirect::to("/login"))
}

static KEYS: LazyLock<Keys> = LazyLock::new(|| {
    let secret = std::env::var("JWT_SECRET").expect("JWT_SECRET must be set");
    Keys::new(secret.as_bytes())
});

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Keys {
    fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// Verified identity of the current request, decoded from the session JWT.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// The user's id, as issued at login.
    pub sub: String,
    pub email: String,
    pub exp: usize,
}

impl<S> FromRequestParts<S> for Claims
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Browser sessions carry the token in a cookie; API clients may use
        // a Bearer header instead.
        let cookie_token = parts
            .extract::<CookieJar>()
            .await
            .ok()
            .and_then(|jar| jar.get("jwt").map(|c| c.value().to_string()));

        let token = match cookie_token {
            Some(t) => t,
            None => {
                let TypedHeader(Authorization(bearer)) = parts
                    .extract::<TypedHeader<Authorization<Bearer>>>()
                    .await
                    .map_err(|_| {
                        tracing::warn!("No session token in cookies or headers");
                        AuthError::InvalidToken
                    })?;
                bearer.token().to_string()
            }
        };

        let token_data =
            decode::<Claims>(&token, &KEYS.decoding, &Validation::default()).map_err(|e| {
                tracing::warn!("JWT decoding failed: {:?}", e);
                AuthError::InvalidToken
            })?;

        Ok(token_data.claims)
    }
}
