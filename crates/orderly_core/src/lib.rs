//! Core engine for a persisted, reorderable list.
//! This crate owns the consistency between stored items and their order.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, EngineConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::item::{
    validate_text, CommittedId, ItemId, ItemRecord, ItemValidationError, MAX_ITEM_TEXT_CHARS,
};
pub use repo::order_repo::{OrderRepository, SqliteOrderRepository, ORDER_SLOT_KEY};
pub use repo::record_repo::{RecordRepository, SqliteRecordRepository};
pub use repo::{StoreError, StoreResult};
pub use service::list_engine::{
    ConsistencyReport, EditOutcome, EngineError, EngineResult, ListEngine, ListSnapshot,
    MissingEditPolicy,
};
pub use service::worker::{EngineHandle, PendingReply, WorkerStartError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
