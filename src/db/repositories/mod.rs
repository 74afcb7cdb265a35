pub mod backup;
pub mod content;
pub mod user;
