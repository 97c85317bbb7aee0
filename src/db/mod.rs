//! Database module: persisted database accounts.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows and request payloads
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `sqlite.rs`: the `AccountsStorage` repository

pub mod models;
pub mod schema;
pub mod sqlite;

pub use models::{AccountOptions, DbAccount, NewDbAccount};
pub use schema::SQLITE_INIT;
pub use sqlite::{AccountsStorage, SqlitePool};
