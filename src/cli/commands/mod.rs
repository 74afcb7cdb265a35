mod backups;
mod content;
mod user;

pub use backups::{cmd_list_backups, cmd_prune_backups};
pub use content::cmd_seed;
pub use user::{cmd_create_user, cmd_set_status};
