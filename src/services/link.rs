use std::sync::Arc;

use tracing::instrument;
use url::Url;
use uuid::Uuid;

use crate::codegen::{self, DEFAULT_CODE_LENGTH};
use crate::errors::LinkError;
use crate::models::link::LinkModel;
use crate::store::link::{LinkChanges, LinkRepository, NewLink, StoreError};

/// Attempt budget for automatic code allocation, lookups included.
const MAX_GENERATION_ATTEMPTS: usize = 10;

const CODE_MIN_LENGTH: usize = 3;
const CODE_MAX_LENGTH: usize = 20;

/// Link CRUD with ownership enforcement and short-code allocation.
///
/// The caller's identity is always an explicit parameter; this service never
/// reads it from ambient request state.
#[derive(Clone)]
pub struct LinkService {
    repo: Arc<dyn LinkRepository>,
}

impl LinkService {
    pub fn new(repo: impl LinkRepository + 'static) -> Self {
        Self {
            repo: Arc::new(repo),
        }
    }

    /// Creates a link for `owner_id`, either under `desired_code` or under a
    /// freshly generated one.
    #[instrument(name = "Service: Create link", skip(self))]
    pub async fn create(
        &self,
        owner_id: Uuid,
        target_url: &str,
        desired_code: Option<&str>,
    ) -> Result<LinkModel, LinkError> {
        // Validate before touching the store, so a bad request costs no I/O
        // and reserves no code.
        validate_target_url(target_url)?;

        let code = match desired_code {
            Some(code) => {
                validate_code(code)?;
                let taken = self
                    .repo
                    .find_by_code(code)
                    .await
                    .map_err(store_failure)?
                    .is_some();
                if taken {
                    return Err(LinkError::CodeConflict);
                }
                code.to_string()
            }
            None => self.allocate_code().await?,
        };

        let inserted = self
            .repo
            .insert(NewLink {
                owner_id,
                target_url: target_url.to_string(),
                code,
            })
            .await;

        match inserted {
            Ok(link) => Ok(link),
            // The pre-check raced a concurrent insert and the unique
            // constraint won; surface the same kind the pre-check would have.
            Err(StoreError::DuplicateCode) if desired_code.is_some() => {
                Err(LinkError::CodeConflict)
            }
            Err(StoreError::DuplicateCode) => Err(LinkError::CodeExhausted),
            Err(other) => Err(store_failure(other)),
        }
    }

    /// Rewrites `target_url` and optionally the code of an owned link.
    #[instrument(name = "Service: Update link", skip(self))]
    pub async fn update(
        &self,
        owner_id: Uuid,
        link_id: Uuid,
        target_url: &str,
        desired_code: Option<&str>,
    ) -> Result<LinkModel, LinkError> {
        // Lookup before the ownership check keeps NotFound and Forbidden
        // distinguishable; delete follows the same policy.
        let link = self
            .repo
            .find_by_id(link_id)
            .await
            .map_err(store_failure)?
            .ok_or(LinkError::NotFound)?;

        if link.owner_id != owner_id {
            return Err(LinkError::Forbidden);
        }

        validate_target_url(target_url)?;

        let new_code = match desired_code {
            // Re-submitting the current code is a no-op, not a conflict.
            Some(code) if code != link.code => {
                validate_code(code)?;
                let taken = self
                    .repo
                    .find_by_code(code)
                    .await
                    .map_err(store_failure)?
                    .is_some();
                if taken {
                    return Err(LinkError::CodeConflict);
                }
                Some(code.to_string())
            }
            _ => None,
        };

        let updated = self
            .repo
            .update(
                link_id,
                LinkChanges {
                    target_url: target_url.to_string(),
                    code: new_code,
                },
            )
            .await;

        match updated {
            Ok(Some(link)) => Ok(link),
            // Zero rows affected: the record vanished between fetch and
            // write. An explicit failure, never a silent success.
            Ok(None) => Err(LinkError::NotFound),
            Err(StoreError::DuplicateCode) => Err(LinkError::CodeConflict),
            Err(other) => Err(store_failure(other)),
        }
    }

    /// Hard-deletes an owned link and returns the deleted record.
    #[instrument(name = "Service: Delete link", skip(self))]
    pub async fn delete(&self, owner_id: Uuid, link_id: Uuid) -> Result<LinkModel, LinkError> {
        let link = self
            .repo
            .find_by_id(link_id)
            .await
            .map_err(store_failure)?
            .ok_or(LinkError::NotFound)?;

        if link.owner_id != owner_id {
            return Err(LinkError::Forbidden);
        }

        match self.repo.delete(link_id).await.map_err(store_failure)? {
            Some(deleted) => Ok(deleted),
            None => Err(LinkError::NotFound),
        }
    }

    /// All links owned by the caller, newest first.
    pub async fn list_by_owner(&self, owner_id: Uuid) -> anyhow::Result<Vec<LinkModel>> {
        Ok(self.repo.list_by_owner(owner_id).await?)
    }

    /// Looks up a link by code for the redirect path. No ownership filter:
    /// anonymous visitors must be able to resolve any code.
    #[instrument(name = "Service: Resolve short code", skip(self))]
    pub async fn resolve(&self, code: &str) -> anyhow::Result<Option<LinkModel>> {
        Ok(self.repo.find_by_code(code).await?)
    }

    /// Generate-check loop: at most [`MAX_GENERATION_ATTEMPTS`] candidates,
    /// then give up without having written anything.
    async fn allocate_code(&self) -> Result<String, LinkError> {
        for attempt in 1..=MAX_GENERATION_ATTEMPTS {
            let candidate = codegen::generate(DEFAULT_CODE_LENGTH);
            let taken = self
                .repo
                .find_by_code(&candidate)
                .await
                .map_err(store_failure)?
                .is_some();
            if !taken {
                return Ok(candidate);
            }
            tracing::warn!(
                attempt,
                code = %candidate,
                "Generated short code already taken, retrying"
            );
        }
        Err(LinkError::CodeExhausted)
    }
}

fn store_failure(err: StoreError) -> LinkError {
    LinkError::Internal(anyhow::Error::from(err))
}

fn validate_target_url(raw: &str) -> Result<(), LinkError> {
    Url::parse(raw)
        .map_err(|_| LinkError::InvalidInput("target must be a well-formed absolute URL".into()))?;
    Ok(())
}

fn validate_code(code: &str) -> Result<(), LinkError> {
    if code.len() < CODE_MIN_LENGTH || code.len() > CODE_MAX_LENGTH {
        return Err(LinkError::InvalidInput(format!(
            "custom code must be between {CODE_MIN_LENGTH} and {CODE_MAX_LENGTH} characters"
        )));
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(LinkError::InvalidInput(
            "custom code may only contain letters, digits, hyphens and underscores".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::link::MockLinkRepository;
    use chrono::Utc;

    fn sample_link(owner_id: Uuid, code: &str) -> LinkModel {
        LinkModel {
            id: Uuid::new_v4(),
            owner_id,
            target_url: "https://example.com".into(),
            code: code.into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn stored(new_link: NewLink) -> LinkModel {
        LinkModel {
            id: Uuid::new_v4(),
            owner_id: new_link.owner_id,
            target_url: new_link.target_url,
            code: new_link.code,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn create_against_empty_store_yields_seven_char_alphanumeric_code() {
        let owner = Uuid::new_v4();
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_code().times(1).returning(|_| Ok(None));
        repo.expect_insert()
            .times(1)
            .returning(|new_link| Ok(stored(new_link)));

        let service = LinkService::new(repo);
        let link = service
            .create(owner, "https://example.com", None)
            .await
            .expect("create should succeed");

        assert_eq!(link.owner_id, owner);
        assert_eq!(link.code.len(), 7);
        assert!(link.code.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    async fn create_with_valid_custom_code_uses_it_verbatim() {
        let owner = Uuid::new_v4();
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_code().times(1).returning(|_| Ok(None));
        repo.expect_insert()
            .times(1)
            .returning(|new_link| Ok(stored(new_link)));

        let service = LinkService::new(repo);
        let link = service
            .create(owner, "https://example.com", Some("my_code-1"))
            .await
            .expect("create should succeed");

        assert_eq!(link.code, "my_code-1");
    }

    #[tokio::test]
    async fn invalid_target_url_is_rejected_before_any_store_access() {
        // No expectations set: any repository call would panic the mock.
        let repo = MockLinkRepository::new();
        let service = LinkService::new(repo);

        let result = service
            .create(Uuid::new_v4(), "not a url", Some("validcode"))
            .await;

        assert!(matches!(result, Err(LinkError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn custom_code_below_minimum_length_is_invalid() {
        let repo = MockLinkRepository::new();
        let service = LinkService::new(repo);

        let result = service
            .create(Uuid::new_v4(), "https://example.com", Some("ab"))
            .await;

        assert!(matches!(result, Err(LinkError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn custom_code_above_maximum_length_is_invalid() {
        let repo = MockLinkRepository::new();
        let service = LinkService::new(repo);

        let result = service
            .create(
                Uuid::new_v4(),
                "https://example.com",
                Some("abcdefghijklmnopqrstu"),
            )
            .await;

        assert!(matches!(result, Err(LinkError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn custom_code_with_forbidden_characters_is_invalid() {
        let repo = MockLinkRepository::new();
        let service = LinkService::new(repo);

        let result = service
            .create(Uuid::new_v4(), "https://example.com", Some("has space"))
            .await;

        assert!(matches!(result, Err(LinkError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn taken_custom_code_conflicts_without_insert() {
        let owner = Uuid::new_v4();
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_code()
            .times(1)
            .returning(move |code| Ok(Some(sample_link(Uuid::new_v4(), code))));
        repo.expect_insert().times(0);

        let service = LinkService::new(repo);
        let result = service.create(owner, "https://x.com", Some("taken")).await;

        assert!(matches!(result, Err(LinkError::CodeConflict)));
    }

    #[tokio::test]
    async fn allocation_gives_up_after_ten_attempts_with_zero_inserts() {
        let mut repo = MockLinkRepository::new();
        // Every candidate collides; the loop must stop at exactly 10 lookups.
        repo.expect_find_by_code()
            .times(10)
            .returning(|code| Ok(Some(sample_link(Uuid::new_v4(), code))));
        repo.expect_insert().times(0);

        let service = LinkService::new(repo);
        let result = service
            .create(Uuid::new_v4(), "https://example.com", None)
            .await;

        assert!(matches!(result, Err(LinkError::CodeExhausted)));
    }

    #[tokio::test]
    async fn racing_duplicate_on_custom_code_insert_maps_to_conflict() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_code().times(1).returning(|_| Ok(None));
        repo.expect_insert()
            .times(1)
            .returning(|_| Err(StoreError::DuplicateCode));

        let service = LinkService::new(repo);
        let result = service
            .create(Uuid::new_v4(), "https://example.com", Some("raced"))
            .await;

        assert!(matches!(result, Err(LinkError::CodeConflict)));
    }

    #[tokio::test]
    async fn racing_duplicate_on_generated_code_insert_maps_to_exhausted() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_code().times(1).returning(|_| Ok(None));
        repo.expect_insert()
            .times(1)
            .returning(|_| Err(StoreError::DuplicateCode));

        let service = LinkService::new(repo);
        let result = service
            .create(Uuid::new_v4(), "https://example.com", None)
            .await;

        assert!(matches!(result, Err(LinkError::CodeExhausted)));
    }

    #[tokio::test]
    async fn update_of_missing_link_is_not_found() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_id().times(1).returning(|_| Ok(None));

        let service = LinkService::new(repo);
        let result = service
            .update(Uuid::new_v4(), Uuid::new_v4(), "https://example.com", None)
            .await;

        assert!(matches!(result, Err(LinkError::NotFound)));
    }

    #[tokio::test]
    async fn update_by_non_owner_is_forbidden_regardless_of_payload() {
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(sample_link(owner, "abc1234"))));
        repo.expect_update().times(0);

        let service = LinkService::new(repo);
        // The payload is deliberately garbage: ownership is checked first.
        let result = service
            .update(stranger, Uuid::new_v4(), "not a url", Some("!"))
            .await;

        assert!(matches!(result, Err(LinkError::Forbidden)));
    }

    #[tokio::test]
    async fn update_with_unchanged_code_skips_the_uniqueness_check() {
        let owner = Uuid::new_v4();
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(sample_link(owner, "same-code"))));
        // find_by_code must not be called at all.
        repo.expect_find_by_code().times(0);
        repo.expect_update().times(1).returning(move |id, changes| {
            assert!(changes.code.is_none(), "unchanged code must not be written");
            let mut link = sample_link(owner, "same-code");
            link.id = id;
            link.target_url = changes.target_url;
            Ok(Some(link))
        });

        let service = LinkService::new(repo);
        let result = service
            .update(owner, Uuid::new_v4(), "https://new.example.com", Some("same-code"))
            .await;

        let link = result.expect("idempotent code update should succeed");
        assert_eq!(link.target_url, "https://new.example.com");
    }

    #[tokio::test]
    async fn update_to_a_taken_code_conflicts() {
        let owner = Uuid::new_v4();
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(sample_link(owner, "old-code"))));
        // Conflicts are global: another link of the same owner counts too.
        repo.expect_find_by_code()
            .times(1)
            .returning(move |code| Ok(Some(sample_link(owner, code))));
        repo.expect_update().times(0);

        let service = LinkService::new(repo);
        let result = service
            .update(owner, Uuid::new_v4(), "https://example.com", Some("new-code"))
            .await;

        assert!(matches!(result, Err(LinkError::CodeConflict)));
    }

    #[tokio::test]
    async fn update_affecting_zero_rows_is_not_found() {
        let owner = Uuid::new_v4();
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(sample_link(owner, "abc1234"))));
        repo.expect_update().times(1).returning(|_, _| Ok(None));

        let service = LinkService::new(repo);
        let result = service
            .update(owner, Uuid::new_v4(), "https://example.com", None)
            .await;

        assert!(matches!(result, Err(LinkError::NotFound)));
    }

    #[tokio::test]
    async fn delete_by_non_owner_is_forbidden_and_deletes_nothing() {
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(sample_link(owner, "abc1234"))));
        repo.expect_delete().times(0);

        let service = LinkService::new(repo);
        let result = service.delete(stranger, Uuid::new_v4()).await;

        assert!(matches!(result, Err(LinkError::Forbidden)));
    }

    #[tokio::test]
    async fn delete_of_missing_link_is_not_found() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_id().times(1).returning(|_| Ok(None));

        let service = LinkService::new(repo);
        let result = service.delete(Uuid::new_v4(), Uuid::new_v4()).await;

        assert!(matches!(result, Err(LinkError::NotFound)));
    }

    #[tokio::test]
    async fn delete_affecting_zero_rows_is_not_found() {
        let owner = Uuid::new_v4();
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(sample_link(owner, "abc1234"))));
        repo.expect_delete().times(1).returning(|_| Ok(None));

        let service = LinkService::new(repo);
        let result = service.delete(owner, Uuid::new_v4()).await;

        assert!(matches!(result, Err(LinkError::NotFound)));
    }

    #[tokio::test]
    async fn delete_by_owner_returns_the_deleted_record() {
        let owner = Uuid::new_v4();
        let link_id = Uuid::new_v4();
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_id().times(1).returning(move |id| {
            let mut link = sample_link(owner, "doomed1");
            link.id = id;
            Ok(Some(link))
        });
        repo.expect_delete().times(1).returning(move |id| {
            let mut link = sample_link(owner, "doomed1");
            link.id = id;
            Ok(Some(link))
        });

        let service = LinkService::new(repo);
        let deleted = service
            .delete(owner, link_id)
            .await
            .expect("owner delete should succeed");

        assert_eq!(deleted.id, link_id);
        assert_eq!(deleted.code, "doomed1");
    }

    #[tokio::test]
    async fn resolving_a_missing_code_returns_none_not_an_error() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_code().times(1).returning(|_| Ok(None));

        let service = LinkService::new(repo);
        let resolved = service.resolve("missing").await.expect("no error expected");

        assert!(resolved.is_none());
    }
}
