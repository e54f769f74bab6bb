pub mod config;
pub mod engine;
pub mod repository;
pub mod routes;

pub use engine::LifecycleEngine;
pub use repository::{
    InMemoryRepository, LeaderboardEntry, ReportRepository, SqliteRepository,
};

/// Shared application state for the HTTP layer.
pub struct AppState {
    pub engine: LifecycleEngine,
}
