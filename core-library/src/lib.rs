//! # Library Management Module
//!
//! Owns the canonical offline music library and its metadata.
//!
//! ## Overview
//!
//! This module manages:
//! - Song, playlist and search-history records in the object store
//! - TTL-cached listings with write-through invalidation
//! - Cascade deletes into the media cache via [`SongBlobStore`]
//! - The metadata snapshot used for storage resilience

pub mod blob;
pub mod cache;
pub mod error;
pub mod models;
pub mod store;

pub use blob::SongBlobStore;
pub use error::{LibraryError, Result};
pub use models::{LibraryStats, Playlist, SearchHistoryEntry, Song};
pub use store::MetadataStore;
