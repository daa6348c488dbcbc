use sqlx::{Pool, Postgres};
use tracing::instrument;
use uuid::Uuid;

use crate::models::user::UserModel;

#[derive(Clone, Debug)]
pub struct UserRepository {
    pool: Pool<Postgres>,
}

impl UserRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    #[instrument(name = "Store: Insert user", skip(self, password_hash))]
    pub async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<Uuid, sqlx::Error> {
        let row: (Uuid,) =
            sqlx::query_as("INSERT INTO users (email, password_hash) VALUES ($1, $2) RETURNING id")
                .bind(email)
                .bind(password_hash)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to insert user: {:?}", e);
                    e
                })?;
        Ok(row.0)
    }

    #[instrument(name = "Store: Fetch user by email", skip(self))]
    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserModel>, sqlx::Error> {
        sqlx::query_as::<_, UserModel>(
            "SELECT id, email, password_hash, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch user: {:?}", e);
            e
        })
    }
}
