//! Shared vocabulary for the papergraph social core: configuration, the error
//! taxonomy, closed enumerations, and the domain models every store and
//! service speaks in.

pub mod config;
pub mod error;
pub mod models;
pub mod pagination;
pub mod types;

pub use config::AppConfig;
pub use error::{PaperGraphError, Result};
pub use models::*;
pub use pagination::{Page, PageRequest, Paginated};
pub use types::*;
