//! Logging system demonstration
//!
//! Run with:
//! ```bash
//! # Pretty format (default in debug)
//! cargo run --example logging_demo
//!
//! # JSON format
//! cargo run --example logging_demo -- json
//!
//! # Compact format
//! cargo run --example logging_demo -- compact
//!
//! # With custom filter
//! cargo run --example logging_demo -- pretty "core_runtime=trace"
//! ```

use core_runtime::{init_logging, LogFormat, LogLevel, LoggingConfig};
use std::env;
use tracing::{debug, error, info, instrument, span, trace, warn, Level};

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    let format = if args.len() > 1 {
        match args[1].as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    } else {
        LogFormat::default()
    };

    let filter = args.get(2).cloned();

    let mut config = LoggingConfig::default()
        .with_format(format)
        .with_level(LogLevel::Trace)
        .with_target(true);

    if let Some(f) = filter {
        config = config.with_filter(f);
    }

    init_logging(config).expect("Failed to initialize logging");

    info!("=== Logging System Demo ===");
    info!(format = ?format, "Logging initialized");

    demo_log_levels();
    demo_structured_logging();
    demo_spans().await;
    demo_instrumentation().await;

    info!("=== Demo Complete ===");
}

fn demo_log_levels() {
    let span = span!(Level::INFO, "log_levels");
    let _enter = span.enter();

    trace!("This is a TRACE level log");
    debug!("This is a DEBUG level log");
    info!("This is an INFO level log");
    warn!("This is a WARN level log");
    error!("This is an ERROR level log");
}

fn demo_structured_logging() {
    let span = span!(Level::INFO, "structured_logging");
    let _enter = span.enter();

    info!("Simple message without fields");

    info!(
        song_id = "abc123",
        title = "Song Title",
        duration_secs = 245,
        "Song information"
    );

    info!(
        queued_downloads = 4,
        active_downloads = 2,
        cache_bytes = 52_428_800u64,
        "Download metrics"
    );
}

async fn demo_spans() {
    let span = span!(Level::INFO, "download_task", task_id = "task-1");
    let _enter = span.enter();

    info!("Starting download");

    {
        let inner_span = span!(Level::DEBUG, "processing_poll");
        let _inner = inner_span.enter();

        debug!(attempt = 3, "Waiting for server-side processing");
        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
    }

    {
        let inner_span = span!(Level::DEBUG, "audio_transfer");
        let _inner = inner_span.enter();

        debug!(transferred = 1_048_576, total = 4_194_304, "Streaming audio");
        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
    }

    info!(percent = 100, "Download completed");
}

#[instrument]
async fn demo_instrumentation() {
    info!("Instrumented function automatically creates spans");

    let songs = vec!["song-1", "song-2", "song-3"];
    process_songs(&songs).await;
}

#[instrument(fields(count = songs.len()))]
async fn process_songs(songs: &[&str]) {
    debug!("Processing songs");

    for (idx, song) in songs.iter().enumerate() {
        process_song(idx, song).await;
    }

    info!("All songs processed");
}

#[instrument(fields(position = idx))]
async fn process_song(idx: usize, song: &str) {
    trace!(song_id = %song, "Processing song");
    tokio::time::sleep(tokio::time::Duration::from_millis(5)).await;
}
