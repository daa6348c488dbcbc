use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use thiserror::Error;
use uuid::Uuid;

use crate::models::link::LinkModel;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The `UNIQUE` constraint on `links.code` rejected the write.
    #[error("short code already exists")]
    DuplicateCode,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Row to insert; `id` and the timestamps are assigned by the database.
#[derive(Debug, Clone)]
pub struct NewLink {
    pub owner_id: Uuid,
    pub target_url: String,
    pub code: String,
}

/// Fields touched by an update. `code: None` leaves the code unchanged.
#[derive(Debug, Clone)]
pub struct LinkChanges {
    pub target_url: String,
    pub code: Option<String>,
}

/// Data access for link records. The service layer only sees this trait, so
/// unit tests can swap in a mock instead of a live pool.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LinkRepository: Send + Sync {
    /// Inserts a new link and returns the stored row.
    async fn insert(&self, link: NewLink) -> Result<LinkModel, StoreError>;

    async fn find_by_code(&self, code: &str) -> Result<Option<LinkModel>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<LinkModel>, StoreError>;

    /// All links owned by `owner_id`, newest first.
    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<LinkModel>, StoreError>;

    /// Applies `changes` and returns the updated row, or `None` if no row
    /// matched `id` (the record vanished between fetch and write).
    async fn update(&self, id: Uuid, changes: LinkChanges) -> Result<Option<LinkModel>, StoreError>;

    /// Hard-deletes and returns the deleted row, or `None` if nothing matched.
    async fn delete(&self, id: Uuid) -> Result<Option<LinkModel>, StoreError>;
}

#[derive(Clone, Debug)]
pub struct PgLinkRepository {
    pool: Pool<Postgres>,
}

impl PgLinkRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

const LINK_COLUMNS: &str = "id, owner_id, target_url, code, created_at, updated_at";

fn map_unique_violation(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateCode,
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl LinkRepository for PgLinkRepository {
    #[tracing::instrument(name = "Store: Insert link", skip(self))]
    async fn insert(&self, link: NewLink) -> Result<LinkModel, StoreError> {
        sqlx::query_as::<_, LinkModel>(&format!(
            "INSERT INTO links (owner_id, target_url, code) \
             VALUES ($1, $2, $3) \
             RETURNING {LINK_COLUMNS}"
        ))
        .bind(link.owner_id)
        .bind(&link.target_url)
        .bind(&link.code)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique_violation)
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<LinkModel>, StoreError> {
        let row = sqlx::query_as::<_, LinkModel>(&format!(
            "SELECT {LINK_COLUMNS} FROM links WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<LinkModel>, StoreError> {
        let row = sqlx::query_as::<_, LinkModel>(&format!(
            "SELECT {LINK_COLUMNS} FROM links WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    #[tracing::instrument(name = "Store: List links by owner", skip(self))]
    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<LinkModel>, StoreError> {
        let rows = sqlx::query_as::<_, LinkModel>(&format!(
            "SELECT {LINK_COLUMNS} FROM links \
             WHERE owner_id = $1 \
             ORDER BY created_at DESC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    #[tracing::instrument(name = "Store: Update link", skip(self))]
    async fn update(&self, id: Uuid, changes: LinkChanges) -> Result<Option<LinkModel>, StoreError> {
        sqlx::query_as::<_, LinkModel>(&format!(
            "UPDATE links \
             SET target_url = $2, code = COALESCE($3, code), updated_at = now() \
             WHERE id = $1 \
             RETURNING {LINK_COLUMNS}"
        ))
        .bind(id)
        .bind(&changes.target_url)
        .bind(changes.code.as_deref())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_unique_violation)
    }

    #[tracing::instrument(name = "Store: Delete link", skip(self))]
    async fn delete(&self, id: Uuid) -> Result<Option<LinkModel>, StoreError> {
        let row = sqlx::query_as::<_, LinkModel>(&format!(
            "DELETE FROM links WHERE id = $1 RETURNING {LINK_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
