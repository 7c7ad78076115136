//! # unsplash-dl
//!
//! Resumable, quota-aware downloader for a user's complete Unsplash photo
//! collection.
//!
//! ## Design Philosophy
//!
//! unsplash-dl is designed to be:
//! - **Resumable** - Sessions can be stopped at any point and simply re-run
//! - **Quota-aware** - Several access keys share the work under hourly limits
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use unsplash_dl::{Config, CredentialPool, PhotoDownloader, SessionOutcome, run_until_signal};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!
//!     // Tokens come from UNSPLASH_ACCESS_TOKENS or ./config/config.properties
//!     let pool = Arc::new(CredentialPool::from_config(&config.credentials));
//!     let downloader = PhotoDownloader::new(config, pool)?;
//!
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let report = run_until_signal(&downloader, "alice").await?;
//!     if let SessionOutcome::QuotaExhausted { next_reset } = report.outcome {
//!         println!("out of quota, run again after {:?}", next_reset);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Credential pool with hourly quotas and rate-limit cooldowns
pub mod credentials;
/// Resumable collection downloader
pub mod downloader;
/// Error types
pub mod error;
/// Collaborators invoked for each downloaded photo
pub mod sinks;
/// Persisted download progress
pub mod state;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{ApiConfig, Config, CredentialConfig, DownloadConfig, ImageQuality};
pub use credentials::{Clock, Credential, CredentialPool, CredentialStatus, ManualClock, SystemClock};
pub use downloader::PhotoDownloader;
pub use error::{Error, FetchError, Result};
pub use sinks::{
    CatalogSink, DescriptionLog, FileDescriptionLog, MetadataWriter, NoOpMetadataWriter,
    SidecarMetadataWriter,
};
pub use state::{DownloadState, DownloadStateStore};
pub use types::{Event, Photo, SessionOutcome, SessionReport};

use tokio_util::sync::CancellationToken;

/// Run one session for `username`, cancelling it cleanly on a termination signal.
///
/// The session stops at its next cancellation point, so the photo in flight
/// is either finished and recorded or discarded and left for the next run.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_until_signal(downloader: &PhotoDownloader, username: &str) -> Result<SessionReport> {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let watcher = tokio::spawn(async move {
        wait_for_signal().await;
        trigger.cancel();
    });

    let result = downloader.download_user_photos(username, &cancel).await;
    watcher.abort();
    result
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal, stopping session");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C), stopping session");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C), stopping session");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                if tokio::signal::ctrl_c().await.is_err() {
                    // never cancel a session because signal handling is unavailable
                    std::future::pending::<()>().await;
                }
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal, stopping session");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                if tokio::signal::ctrl_c().await.is_err() {
                    // never cancel a session because signal handling is unavailable
                    std::future::pending::<()>().await;
                }
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal, stopping session");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            std::future::pending::<()>().await;
        }
    }
}
