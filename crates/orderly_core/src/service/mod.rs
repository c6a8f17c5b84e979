//! List use-case services.
//!
//! # Responsibility
//! - Orchestrate record/order store writes into view-level operations.
//! - Serialize those operations through one worker for threaded callers.

pub mod id_alloc;
pub mod list_engine;
pub mod worker;
