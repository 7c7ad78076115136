//! Streaming asset transfer into `<name>.part`, renamed into place on success

use crate::error::{Error, Result};
use crate::utils::temp_path;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

/// Downloads pre-signed asset URLs (no credential involved)
#[derive(Clone, Debug)]
pub(crate) struct AssetTransfer {
    client: reqwest::Client,
    read_timeout: Duration,
}

impl AssetTransfer {
    pub(crate) fn new(client: reqwest::Client, read_timeout: Duration) -> Self {
        Self { client, read_timeout }
    }

    /// Fetch `url` into `dest`, returning the number of bytes written
    ///
    /// A file only ever appears under `dest` complete. On failure or
    /// cancellation the partial file is removed and `dest` is left untouched.
    ///
    /// # Errors
    ///
    /// [`Error::Cancelled`] when `cancel` fires mid-transfer, otherwise
    /// [`Error::AssetTransfer`].
    pub(crate) async fn fetch(
        &self,
        photo_id: &str,
        url: &str,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let part = temp_path(dest);

        let streamed = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            r = self.stream_to(photo_id, url, &part) => r,
        };

        let bytes = match streamed {
            Ok(bytes) => bytes,
            Err(e) => {
                tokio::fs::remove_file(&part).await.ok();
                return Err(e);
            }
        };

        if let Err(e) = tokio::fs::rename(&part, dest).await {
            tokio::fs::remove_file(&part).await.ok();
            return Err(transfer_error(photo_id, format!("moving into place: {}", e)));
        }
        Ok(bytes)
    }

    async fn stream_to(&self, photo_id: &str, url: &str, part: &Path) -> Result<u64> {
        let mut response = match tokio::time::timeout(self.read_timeout, self.client.get(url).send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(transfer_error(photo_id, e.to_string())),
            Err(_) => {
                return Err(transfer_error(
                    photo_id,
                    format!("no response within {:?}", self.read_timeout),
                ));
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(transfer_error(photo_id, format!("asset host returned HTTP {}", status)));
        }

        let mut file = tokio::fs::File::create(part)
            .await
            .map_err(|e| transfer_error(photo_id, format!("creating {}: {}", part.display(), e)))?;

        let mut written: u64 = 0;
        loop {
            let chunk = match tokio::time::timeout(self.read_timeout, response.chunk()).await {
                Ok(Ok(Some(chunk))) => chunk,
                Ok(Ok(None)) => break,
                Ok(Err(e)) => return Err(transfer_error(photo_id, e.to_string())),
                Err(_) => {
                    return Err(transfer_error(
                        photo_id,
                        format!("stalled for {:?} after {} bytes", self.read_timeout, written),
                    ));
                }
            };

            file.write_all(&chunk)
                .await
                .map_err(|e| transfer_error(photo_id, format!("writing {}: {}", part.display(), e)))?;
            written += chunk.len() as u64;
        }

        let sync_error = |e: std::io::Error| transfer_error(photo_id, format!("syncing {}: {}", part.display(), e));
        file.flush().await.map_err(sync_error)?;
        file.sync_all().await.map_err(sync_error)?;

        tracing::debug!(photo_id, bytes = written, "asset transferred");
        Ok(written)
    }
}

fn transfer_error(photo_id: &str, reason: String) -> Error {
    Error::AssetTransfer {
        photo_id: photo_id.to_string(),
        reason,
    }
}
