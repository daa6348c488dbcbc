pub mod link;
pub mod user;

pub use link::{LinkChanges, LinkRepository, NewLink, PgLinkRepository, StoreError};
pub use user::UserRepository;
