pub mod catalog;
pub mod engine;

pub use catalog::{default_catalog, BadgeKind, BadgeRule};
pub use engine::{BadgeEngine, ReconcileReport};
