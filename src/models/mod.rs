pub mod link;
pub mod user;

pub use link::LinkModel;
pub use user::UserModel;
