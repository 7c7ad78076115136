//! JSON sidecar metadata writer

use super::traits::MetadataWriter;
use crate::error::Error;
use crate::types::DownloadedPhoto;
use crate::utils::temp_path;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Writes the full photo record next to the image as `<file-stem>.json`
///
/// `alice_p42.jpg` gets `alice_p42.json`. The sidecar is written to a temp
/// file and renamed, so a crash never leaves a truncated document behind.
#[derive(Debug, Default, Clone, Copy)]
pub struct SidecarMetadataWriter;

impl SidecarMetadataWriter {
    /// Sidecar location for `image`
    pub fn sidecar_path(image: &Path) -> PathBuf {
        image.with_extension("json")
    }
}

#[async_trait]
impl MetadataWriter for SidecarMetadataWriter {
    async fn write(&self, photo: &DownloadedPhoto<'_>) -> crate::Result<()> {
        let target = Self::sidecar_path(&photo.path);
        let metadata_error = |reason: String| Error::Metadata {
            path: photo.path.clone(),
            reason,
        };

        let json = serde_json::to_vec_pretty(photo.photo).map_err(|e| metadata_error(e.to_string()))?;

        let tmp = temp_path(&target);
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| metadata_error(format!("writing {}: {}", tmp.display(), e)))?;
        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            tokio::fs::remove_file(&tmp).await.ok();
            return Err(metadata_error(format!("renaming into {}: {}", target.display(), e)));
        }

        tracing::debug!(photo_id = %photo.photo.id, path = %target.display(), "wrote metadata sidecar");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sidecar"
    }
}
