//! Source URL validation.
//!
//! Only YouTube watch pages, shorts and short links are accepted as download
//! sources. Validation happens before anything is sent to the processing
//! service so an obviously bad URL fails locally and immediately.

use crate::error::{DownloadError, Result};

const WATCH_HOSTS: [&str; 4] = [
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
];

/// Checks that `url` points at a supported source.
pub fn validate_source_url(url: &str) -> Result<()> {
    let url = url.trim();

    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| DownloadError::InvalidSource(url.to_string()))?;

    let (host, path) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    };

    if host.is_empty() {
        return Err(DownloadError::InvalidSource(url.to_string()));
    }

    if host == "youtu.be" {
        // Short link: the path is the video id
        let id = path.trim_start_matches('/');
        let id = id.split('?').next().unwrap_or("");
        if id.is_empty() {
            return Err(DownloadError::InvalidSource(url.to_string()));
        }
        return Ok(());
    }

    if WATCH_HOSTS.contains(&host) {
        let path_only = path.split('?').next().unwrap_or("");
        let has_watch_id = path_only == "/watch" && path.contains("v=");
        let has_shorts_id = path_only
            .strip_prefix("/shorts/")
            .map(|id| !id.is_empty())
            .unwrap_or(false);

        if has_watch_id || has_shorts_id {
            return Ok(());
        }
    }

    Err(DownloadError::InvalidSource(url.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_urls_are_accepted() {
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com/watch?v=abc123",
            "https://m.youtube.com/watch?v=abc123&t=42",
            "https://music.youtube.com/watch?v=abc123",
            "http://www.youtube.com/watch?v=abc123",
        ] {
            assert!(validate_source_url(url).is_ok(), "rejected {}", url);
        }
    }

    #[test]
    fn test_short_links_and_shorts_are_accepted() {
        assert!(validate_source_url("https://youtu.be/dQw4w9WgXcQ").is_ok());
        assert!(validate_source_url("https://youtu.be/abc?t=10").is_ok());
        assert!(validate_source_url("https://www.youtube.com/shorts/abc123").is_ok());
    }

    #[test]
    fn test_bad_urls_are_rejected() {
        for url in [
            "",
            "not a url",
            "ftp://youtube.com/watch?v=abc",
            "https://youtu.be/",
            "https://youtube.com/watch",
            "https://youtube.com/playlist?list=xyz",
            "https://vimeo.com/12345",
            "https://evil-youtube.com/watch?v=abc",
        ] {
            assert!(validate_source_url(url).is_err(), "accepted {}", url);
        }
    }
}
