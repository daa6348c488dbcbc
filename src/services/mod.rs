pub mod auth;
pub mod link;

pub use auth::AuthService;
pub use link::LinkService;
