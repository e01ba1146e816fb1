//! Database layer.
//!
//! The job store contract is [`formvideo_core::JobStore`]; the server's
//! durable implementation is [`sqlite::SqliteJobStore`]. To swap to another
//! database, implement `JobStore` for a new type and change the concrete type
//! in [`crate::state::AppState`].

pub mod sqlite;
