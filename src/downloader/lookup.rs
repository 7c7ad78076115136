//! Single-photo lookups

use super::PhotoDownloader;
use crate::error::Result;
use crate::types::Photo;
use tracing::{debug, info};

impl PhotoDownloader {
    /// Fetch the full record of one photo (`GET /photos/{id}`)
    ///
    /// Spends one credential unit from the same pool as the sessions and
    /// switches credentials on 403 the same way, so a metadata refresh can
    /// run next to a download. `Ok(None)` means no credential is usable
    /// right now; a batch refresh should stop there and try again after
    /// [`CredentialPool::next_reset_time`](crate::CredentialPool::next_reset_time).
    ///
    /// # Errors
    ///
    /// Any failure other than a 403, e.g. a 404 for a deleted photo or a
    /// body that is not a photo record.
    pub async fn fetch_photo(&self, photo_id: &str) -> Result<Option<Photo>> {
        let api = &self.api;
        let photo = self
            .with_credential("photo", move |c| api.photo(photo_id, c))
            .await?;

        match &photo {
            Some(photo) => debug!(photo_id, tags = photo.tags.len(), "fetched photo record"),
            None => info!(
                photo_id,
                next_reset = ?self.pool.next_reset_time(),
                "no credential available for photo lookup"
            ),
        }
        Ok(photo)
    }
}
