//! Domain model for ordered list items.
//!
//! # Responsibility
//! - Define item identity, item records and text validation rules.
//! - Keep the draft row as a distinct identity variant instead of a magic id.
//!
//! # Invariants
//! - Committed ids are strictly positive.
//! - At most one draft record exists at any time.

pub mod item;
