pub mod prelude;

pub mod content_backups;
pub mod contents;
pub mod users;
