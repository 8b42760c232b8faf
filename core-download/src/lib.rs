//! Download pipeline: source validation, server-side processing, media
//! transfer and task management.

mod engine;
mod error;
mod remote;
mod source;
mod task;

pub use engine::{DownloadEngine, EngineConfig};
pub use error::{DownloadError, Result};
pub use remote::{
    no_progress, HttpSongProcessingApi, MediaPayload, ProgressFn, RemoteStatus, SongInfo,
    SongProcessingApi, StatusResponse,
};
pub use source::validate_source_url;
pub use task::{DownloadPhase, DownloadStatus, DownloadTask};
