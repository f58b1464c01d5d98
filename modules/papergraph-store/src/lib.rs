//! Storage for the papergraph social core.
//!
//! Services depend on the repository traits in [`traits`]; `PgStore` backs
//! them with Postgres and `MemoryStore` keeps everything in process for tests
//! and local runs.

pub mod memory;
pub mod postgres;
pub mod traits;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use traits::{
    ActivityRepository, BadgeRepository, CommentRepository, EvaluationRepository,
    FollowRepository, ReactionChange, ReactionRepository, StatsRepository, Store, TaskRepository,
    UserRepository,
};
