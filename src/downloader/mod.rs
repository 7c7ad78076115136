//! Resumable collection downloader split into focused submodules.
//!
//! The `PhotoDownloader` struct and its methods are organized by concern:
//! - [`api`] - Authorized JSON endpoints (user info, listing, download tracking)
//! - [`transfer`] - Streaming asset transfer with `.part` files
//! - [`session`] - The per-user session state machine and credential failover
//! - [`lookup`] - Single-photo lookups sharing the session's credential pool

mod api;
mod lookup;
mod session;
mod transfer;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::credentials::CredentialPool;
use crate::error::Result;
use crate::sinks::{CatalogSink, DescriptionLog, FileDescriptionLog, MetadataWriter, NoOpMetadataWriter};
use crate::types::Event;
use api::UnsplashApi;
use std::sync::Arc;
use transfer::AssetTransfer;

/// Downloads whole photo collections, one user per session
///
/// Cheap to clone; every field is shared. The credential pool is passed in
/// so several downloaders (or other tasks) can draw from one quota.
#[derive(Clone)]
pub struct PhotoDownloader {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Credential pool shared with whoever else spends the same quota
    pub(crate) pool: Arc<CredentialPool>,
    pub(crate) api: UnsplashApi,
    pub(crate) transfer: AssetTransfer,
    /// Annotates each transferred file (no-op unless replaced)
    pub(crate) metadata: Arc<dyn MetadataWriter>,
    /// Appends to `descriptions.txt` when enabled
    pub(crate) descriptions: Option<Arc<dyn DescriptionLog>>,
    pub(crate) catalog: Option<Arc<dyn CatalogSink>>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
}

impl std::fmt::Debug for PhotoDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhotoDownloader")
            .field("download_dir", &self.config.download.download_dir)
            .field("pool", &self.pool)
            .field("metadata_writer", &self.metadata.name())
            .field("descriptions", &self.descriptions.is_some())
            .field("catalog", &self.catalog.is_some())
            .finish()
    }
}

impl PhotoDownloader {
    /// Create a downloader drawing credentials from `pool`
    ///
    /// Validates the configuration and builds the shared HTTP client. Nothing
    /// is fetched or written until a session starts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) for invalid settings and
    /// [`Error::Network`](crate::Error::Network) if the HTTP client cannot be built.
    pub fn new(config: Config, pool: Arc<CredentialPool>) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .connect_timeout(config.api.connect_timeout)
            .user_agent(config.api.user_agent.as_str())
            .build()?;

        let api = UnsplashApi::new(client.clone(), &config.api)?;
        let transfer = AssetTransfer::new(client, config.api.read_timeout);

        let descriptions: Option<Arc<dyn DescriptionLog>> = if config.download.write_descriptions {
            Some(Arc::new(FileDescriptionLog::in_dir(&config.download.download_dir)))
        } else {
            None
        };

        // 1000 events of backlog per subscriber
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);

        tracing::info!(
            download_dir = %config.download.download_dir.display(),
            credentials = pool.len(),
            track_downloads = config.api.track_downloads,
            "photo downloader initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            pool,
            api,
            transfer,
            metadata: Arc::new(NoOpMetadataWriter),
            descriptions,
            catalog: None,
            event_tx,
        })
    }

    /// Replace the metadata writer
    pub fn with_metadata_writer(mut self, writer: Arc<dyn MetadataWriter>) -> Self {
        self.metadata = writer;
        self
    }

    /// Replace the description log (the default appends to `descriptions.txt`)
    pub fn with_description_log(mut self, log: Arc<dyn DescriptionLog>) -> Self {
        self.descriptions = Some(log);
        self
    }

    /// Hand every downloaded photo to `sink` as well
    pub fn with_catalog_sink(mut self, sink: Arc<dyn CatalogSink>) -> Self {
        self.catalog = Some(sink);
        self
    }

    /// Subscribe to session events
    ///
    /// Each subscriber receives every event independently. A subscriber that
    /// falls more than 1000 events behind gets `RecvError::Lagged`; the
    /// session itself never waits for subscribers.
    ///
    /// ```no_run
    /// use std::sync::Arc;
    /// use tokio_util::sync::CancellationToken;
    /// use unsplash_dl::{Config, CredentialPool, PhotoDownloader};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let config = Config::default();
    ///     let pool = Arc::new(CredentialPool::from_config(&config.credentials));
    ///     let downloader = PhotoDownloader::new(config, pool)?;
    ///
    ///     let mut events = downloader.subscribe();
    ///     tokio::spawn(async move {
    ///         while let Ok(event) = events.recv().await {
    ///             println!("{:?}", event);
    ///         }
    ///     });
    ///
    ///     downloader.download_user_photos("alice", &CancellationToken::new()).await?;
    ///     Ok(())
    /// }
    /// ```
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// The credential pool this downloader draws from
    pub fn pool(&self) -> &Arc<CredentialPool> {
        &self.pool
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Emit an event to all subscribers
    ///
    /// With no subscribers the event is dropped (ok() converts Err to None).
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
