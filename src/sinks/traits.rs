//! Collaborator traits invoked after each photo transfer

use crate::types::{DownloadedPhoto, Photo};
use async_trait::async_trait;

/// Annotates a freshly downloaded file with its photo record
///
/// Called once per transferred photo, after the file is in its final place
/// and before the photo is recorded as downloaded. A failure is logged and
/// does not prevent the photo from being recorded.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use unsplash_dl::sinks::MetadataWriter;
/// use unsplash_dl::types::DownloadedPhoto;
///
/// struct CountingWriter(std::sync::atomic::AtomicUsize);
///
/// #[async_trait]
/// impl MetadataWriter for CountingWriter {
///     async fn write(&self, _photo: &DownloadedPhoto<'_>) -> unsplash_dl::Result<()> {
///         self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
///         Ok(())
///     }
///
///     fn name(&self) -> &'static str {
///         "counting"
///     }
/// }
/// ```
#[async_trait]
pub trait MetadataWriter: Send + Sync {
    /// Attach the record in `photo` to the file at `photo.path`
    ///
    /// # Errors
    ///
    /// Implementations should return [`Error::Metadata`](crate::Error::Metadata)
    /// naming the file they failed to annotate.
    async fn write(&self, photo: &DownloadedPhoto<'_>) -> crate::Result<()>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Append-only human-readable log of downloaded photos
#[async_trait]
pub trait DescriptionLog: Send + Sync {
    /// Append an entry for `photo`
    async fn append(&self, photo: &Photo) -> crate::Result<()>;
}

/// Optional catalog that indexes downloaded photos
///
/// The orchestrator logs and otherwise ignores catalog failures.
#[async_trait]
pub trait CatalogSink: Send + Sync {
    /// Record `photo` as part of its owner's collection
    async fn record(&self, photo: &DownloadedPhoto<'_>) -> crate::Result<()>;
}
