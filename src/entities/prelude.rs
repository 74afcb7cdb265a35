pub use super::content_backups::Entity as ContentBackups;
pub use super::contents::Entity as Contents;
pub use super::users::Entity as Users;
