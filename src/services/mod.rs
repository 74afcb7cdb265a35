pub mod auth_service;
pub use auth_service::{AuthError, AuthService, AuthenticatedUser, LoginResult, TokenPair};

pub mod auth_service_impl;
pub use auth_service_impl::SeaOrmAuthService;

pub mod content_service;
pub use content_service::{BackupPage, ContentError, ContentService, SectionInfo};

pub mod content_service_impl;
pub use content_service_impl::SeaOrmContentService;

pub mod contact;
pub use contact::{ContactError, ContactMessage, ContactService, HttpMailer, MailTransport};

pub mod rate_limit;
pub use rate_limit::{FixedWindowRateLimiter, RateDecision, RateLimiter};

pub mod retention;
pub use retention::BackupRetention;

pub mod scheduler;
pub use scheduler::Scheduler;

pub mod token_service;
pub use token_service::{Claims, TokenError, TokenKind, TokenService};

pub mod upload;
pub use upload::{StoredUpload, UploadError, UploadKind, UploadService};
