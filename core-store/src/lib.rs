//! # Object Store
//!
//! Persistence layer of the offline cache. Provides:
//! - A closed set of named [`Collection`]s
//! - The [`ObjectStore`] trait with strict (`try_*`) and fail-soft access
//! - An SQLite-backed [`EmbeddedObjectStore`] and a filesystem fallback
//! - Exactly-once shared store initialization via [`StoreCell`]
//! - Durable storage negotiation via [`PersistenceGuard`]

pub mod cell;
pub mod collection;
pub mod embedded;
pub mod error;
pub mod file_backed;
pub mod guard;
pub mod record;
pub mod store;

pub use cell::StoreCell;
pub use collection::Collection;
pub use embedded::{EmbeddedObjectStore, StoreConfig};
pub use error::{Result, StoreError};
pub use file_backed::FileBackedObjectStore;
pub use guard::{
    PersistenceGuard, SnapshotSource, StorageInfo, PRIVATE_MODE_QUOTA_THRESHOLD,
};
pub use record::StoredRecord;
pub use store::ObjectStore;
