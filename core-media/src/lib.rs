//! # Media Cache Module
//!
//! Owns the cached audio and thumbnail payloads and resolves how a song
//! should be played or displayed: offline payload first, remote URL fallback.

pub mod cache;
pub mod error;
pub mod handle;

pub use cache::{MediaBlobCache, MediaUsage, PlayableRef, ThumbnailRef};
pub use error::{MediaError, Result};
pub use handle::MediaHandle;
