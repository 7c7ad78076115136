//! Metadata writer that leaves files untouched

use super::traits::MetadataWriter;
use crate::types::DownloadedPhoto;
use async_trait::async_trait;

/// Metadata writer used when no annotation is wanted
///
/// Always succeeds without touching the file, so sessions behave the same
/// with or without a real writer configured.
///
/// ```
/// use unsplash_dl::sinks::{MetadataWriter, NoOpMetadataWriter};
///
/// assert_eq!(NoOpMetadataWriter.name(), "noop");
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpMetadataWriter;

#[async_trait]
impl MetadataWriter for NoOpMetadataWriter {
    async fn write(&self, photo: &DownloadedPhoto<'_>) -> crate::Result<()> {
        tracing::trace!(photo_id = %photo.photo.id, "metadata writing disabled");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
