// Vehicle Certificate Service - Core Library
// Exposes all modules for use in CLI, web server, and tests

pub mod auth;
pub mod certificate;
pub mod config;
pub mod error;
pub mod owner;
pub mod resolver;    // Primary/secondary merge + lookup chain
pub mod routing;     // Entity kind → store mapping
pub mod search;
pub mod store;

#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "tui")]
pub mod ui;

// Re-export commonly used types
pub use auth::{authenticate, create_user, Session, SessionStore, User};
pub use certificate::{
    present, render_certificate, CertificateView, DetailUrlBuilder, PngQrEncoder, QrEncoder,
    NOT_FOUND_MESSAGE,
};
pub use config::Config;
pub use error::{CertError, FieldError, Result};
pub use owner::{NewOwner, Owner, OwnerForm};
pub use resolver::{lookup, merge_all, resolve};
pub use routing::{EntityKind, StoreRole, StoreRouting};
pub use search::{filter, SearchCriteria, SearchMode};
pub use store::{import_owners, load_csv, ImportSummary, RecordStore, Stores};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
