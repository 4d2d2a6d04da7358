//! # guardian-store
//!
//! Durable storage for the Guardian attendance engine, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides a deliberately narrow surface:
//! append/read for the attendance event log (never update or delete),
//! lookups over the directory tables (guards, locations, shifts) and
//! insert/read/clear-all for panic alerts.  The engine treats this as an
//! external collaborator; everything it needs goes through these helpers.

pub mod alerts;
pub mod database;
pub mod directory;
pub mod events;
pub mod migrations;

mod error;

pub use database::Database;
pub use error::StoreError;
