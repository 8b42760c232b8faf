//! Client for the song processing service.
//!
//! The service resolves a source URL into a song, transcodes it server-side,
//! and serves the finished media. The engine talks to it through
//! [`SongProcessingApi`] so tests can script the server's behavior.

use crate::error::{DownloadError, Result};
use bridge_traits::{HttpClient, HttpMethod, HttpRequest};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Song description returned when a source URL is resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SongInfo {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub duration_secs: Option<u64>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Server-side processing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: RemoteStatus,
    #[serde(default)]
    pub progress: Option<u8>,
    #[serde(default)]
    pub message: Option<String>,
}

/// A fetched media payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPayload {
    pub bytes: Bytes,
    pub mime: Option<String>,
}

/// Progress callback: (bytes transferred, total bytes when known).
pub type ProgressFn = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// A progress callback that does nothing.
pub fn no_progress() -> ProgressFn {
    Arc::new(|_, _| {})
}

#[async_trait]
pub trait SongProcessingApi: Send + Sync {
    /// Asks the server to resolve and process a source URL.
    async fn request_processing(&self, source_url: &str) -> Result<SongInfo>;

    /// Polls the processing state of a song.
    async fn processing_status(&self, song_id: &str) -> Result<StatusResponse>;

    /// Streams the finished audio, reporting transfer progress.
    async fn fetch_audio(&self, song_id: &str, progress: ProgressFn) -> Result<MediaPayload>;

    /// Fetches the thumbnail.
    async fn fetch_thumbnail(&self, song_id: &str) -> Result<MediaPayload>;
}

/// HTTP implementation of the processing API.
pub struct HttpSongProcessingApi {
    http: Arc<dyn HttpClient>,
    base_url: String,
}

impl HttpSongProcessingApi {
    pub fn new(http: Arc<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { http, base_url }
    }

    async fn read_stream(
        &self,
        url: String,
        progress: Option<ProgressFn>,
    ) -> Result<MediaPayload> {
        let mut response = self
            .http
            .stream(url.clone())
            .await
            .map_err(|e| DownloadError::Transport(e.to_string()))?;

        if !(200..300).contains(&response.status) {
            return Err(DownloadError::Transport(format!(
                "HTTP {} fetching {}",
                response.status, url
            )));
        }

        let total = response.content_length;
        let mut buf = BytesMut::with_capacity(total.unwrap_or(64 * 1024) as usize);
        let mut chunk = [0u8; 16 * 1024];

        loop {
            let n = response
                .reader
                .read(&mut chunk)
                .await
                .map_err(|e| DownloadError::Transport(e.to_string()))?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(progress) = &progress {
                progress(buf.len() as u64, total);
            }
        }

        debug!(url = %url, bytes = buf.len(), "Media payload fetched");

        Ok(MediaPayload {
            bytes: buf.freeze(),
            mime: response.content_type,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessingRequest<'a> {
    source_url: &'a str,
}

#[async_trait]
impl SongProcessingApi for HttpSongProcessingApi {
    async fn request_processing(&self, source_url: &str) -> Result<SongInfo> {
        let request = HttpRequest::new(HttpMethod::Post, format!("{}/songs/info", self.base_url))
            .json(&ProcessingRequest { source_url })
            .map_err(|e| DownloadError::RemoteResolution(e.to_string()))?;

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| DownloadError::Transport(e.to_string()))?;

        if !response.is_success() {
            return Err(DownloadError::RemoteResolution(format!(
                "HTTP {} resolving source",
                response.status
            )));
        }

        response
            .json()
            .map_err(|e| DownloadError::RemoteResolution(e.to_string()))
    }

    async fn processing_status(&self, song_id: &str) -> Result<StatusResponse> {
        let request = HttpRequest::new(
            HttpMethod::Get,
            format!("{}/songs/status/{}", self.base_url, song_id),
        );

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| DownloadError::Transport(e.to_string()))?;

        if !response.is_success() {
            return Err(DownloadError::Transport(format!(
                "HTTP {} polling status",
                response.status
            )));
        }

        response
            .json()
            .map_err(|e| DownloadError::Transport(e.to_string()))
    }

    async fn fetch_audio(&self, song_id: &str, progress: ProgressFn) -> Result<MediaPayload> {
        self.read_stream(
            format!("{}/songs/download/{}", self.base_url, song_id),
            Some(progress),
        )
        .await
    }

    async fn fetch_thumbnail(&self, song_id: &str) -> Result<MediaPayload> {
        self.read_stream(
            format!("{}/songs/thumbnail/{}", self.base_url, song_id),
            None,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::{BridgeError, HttpResponse, StreamedResponse};
    use std::collections::HashMap;

    struct ScriptedHttp {
        body: Bytes,
        status: u16,
    }

    #[async_trait]
    impl HttpClient for ScriptedHttp {
        async fn execute(
            &self,
            _request: HttpRequest,
        ) -> std::result::Result<HttpResponse, BridgeError> {
            Ok(HttpResponse {
                status: self.status,
                headers: HashMap::new(),
                body: self.body.clone(),
            })
        }

        async fn stream(
            &self,
            _url: String,
        ) -> std::result::Result<StreamedResponse, BridgeError> {
            Ok(StreamedResponse {
                status: self.status,
                content_type: Some("audio/mpeg".to_string()),
                content_length: Some(self.body.len() as u64),
                reader: Box::new(std::io::Cursor::new(self.body.to_vec())),
            })
        }
    }

    #[tokio::test]
    async fn test_request_processing_parses_song_info() {
        let api = HttpSongProcessingApi::new(
            Arc::new(ScriptedHttp {
                body: Bytes::from_static(br#"{"id":"s1","title":"T","artist":"A"}"#),
                status: 200,
            }),
            "https://api.example.com/",
        );

        let info = api
            .request_processing("https://youtu.be/abc")
            .await
            .unwrap();
        assert_eq!(info.id, "s1");
        assert_eq!(info.artist, "A");
    }

    #[tokio::test]
    async fn test_request_processing_non_2xx_fails() {
        let api = HttpSongProcessingApi::new(
            Arc::new(ScriptedHttp {
                body: Bytes::new(),
                status: 422,
            }),
            "https://api.example.com",
        );

        assert!(matches!(
            api.request_processing("https://youtu.be/abc").await,
            Err(DownloadError::RemoteResolution(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_audio_reports_progress() {
        let api = HttpSongProcessingApi::new(
            Arc::new(ScriptedHttp {
                body: Bytes::from(vec![0u8; 40 * 1024]),
                status: 200,
            }),
            "https://api.example.com",
        );

        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let payload = api
            .fetch_audio(
                "s1",
                Arc::new(move |done, total| {
                    sink.lock().unwrap().push((done, total));
                }),
            )
            .await
            .unwrap();

        assert_eq!(payload.bytes.len(), 40 * 1024);
        assert_eq!(payload.mime.as_deref(), Some("audio/mpeg"));
        let seen = seen.lock().unwrap();
        assert!(!seen.is_empty());
        assert_eq!(seen.last().unwrap().0, 40 * 1024);
        assert_eq!(seen.last().unwrap().1, Some(40 * 1024));
    }

    #[tokio::test]
    async fn test_status_parsing() {
        let api = HttpSongProcessingApi::new(
            Arc::new(ScriptedHttp {
                body: Bytes::from_static(br#"{"status":"processing","progress":40}"#),
                status: 200,
            }),
            "https://api.example.com",
        );

        let status = api.processing_status("s1").await.unwrap();
        assert_eq!(status.status, RemoteStatus::Processing);
        assert_eq!(status.progress, Some(40));
    }
}
