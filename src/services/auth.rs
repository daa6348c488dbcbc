use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tracing::instrument;
use uuid::Uuid;

use crate::{errors::AuthError, models::user::UserModel, store::user::UserRepository};

#[derive(Clone, Debug)]
pub struct AuthService {
    repo: UserRepository,
}

impl AuthService {
    pub fn new(repo: UserRepository) -> Self {
        Self { repo }
    }

    #[instrument(name = "AuthService: Register", skip(self, password), fields(user_email = %email))]
    pub async fn register(&self, email: &str, password: &str) -> Result<Uuid, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| {
                tracing::error!("Failed to hash password: {:?}", e);
                AuthError::Internal
            })?
            .to_string();

        self.repo
            .create_user(email, &hash)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    tracing::warn!("Signup rejected: email already registered");
                    AuthError::UserAlreadyExists
                }
                _ => {
                    tracing::error!("Database error during signup: {:?}", e);
                    AuthError::Internal
                }
            })
    }

    #[instrument(name = "AuthService: Login", skip(self, password), fields(user_email = %email))]
    pub async fn login(&self, email: &str, password: &str) -> Result<UserModel, AuthError> {
        let user = self.repo.find_by_email(email).await.map_err(|e| {
            tracing::error!("Database error during login: {:?}", e);
            AuthError::Internal
        })?;

        let Some(user) = user else {
            tracing::warn!("Login failed: user not found");
            return Err(AuthError::WrongCredentials);
        };

        let parsed_hash = PasswordHash::new(&user.password_hash).map_err(|e| {
            tracing::error!("Failed to parse stored password hash: {:?}", e);
            AuthError::Internal
        })?;

        if Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_err()
        {
            tracing::warn!("Login failed: invalid password");
            return Err(AuthError::WrongCredentials);
        }

        tracing::info!("User authenticated successfully");
        Ok(user)
    }
}
