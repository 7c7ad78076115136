//! Core types for unsplash-dl: photo records, events and session results

use crate::config::ImageQuality;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A photo record as returned by the listing endpoint
///
/// Only the fields the downloader relies on are typed; everything else the
/// upstream sends is kept in `extra` so metadata writers see the whole record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    /// Stable upstream identifier
    pub id: String,

    /// Photographer-supplied description
    #[serde(default)]
    pub description: Option<String>,

    /// Generated alternative text
    #[serde(default)]
    pub alt_description: Option<String>,

    /// Upload timestamp
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    /// Pre-signed rendition URLs (no credential needed)
    pub urls: PhotoUrls,

    /// Related endpoints
    #[serde(default)]
    pub links: PhotoLinks,

    /// Photographer
    #[serde(default)]
    pub user: Option<PhotoUser>,

    /// Tags (absent from some listing responses)
    #[serde(default)]
    pub tags: Vec<PhotoTag>,

    /// Everything else in the upstream record
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Photo {
    /// Asset URL for the requested rendition
    pub fn asset_url(&self, quality: ImageQuality) -> &str {
        match quality {
            ImageQuality::Raw => &self.urls.raw,
            ImageQuality::Full => &self.urls.full,
            ImageQuality::Regular => &self.urls.regular,
        }
    }
}

/// Rendition URLs of a photo
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PhotoUrls {
    /// Original upload
    #[serde(default)]
    pub raw: String,
    /// Full resolution
    #[serde(default)]
    pub full: String,
    /// 1080px wide
    #[serde(default)]
    pub regular: String,
}

/// Endpoint links of a photo
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PhotoLinks {
    /// Authorized endpoint to report a download
    #[serde(default)]
    pub download_location: Option<String>,
}

/// Photographer summary embedded in a photo record
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PhotoUser {
    /// Handle
    #[serde(default)]
    pub username: String,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
}

/// Tag attached to a photo
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhotoTag {
    /// Tag text
    pub title: String,
}

/// Subset of the user-info response we need
#[derive(Clone, Debug, Deserialize)]
pub struct UserInfo {
    /// Number of photos the user has published
    pub total_photos: u32,
}

/// Event emitted during a download session
///
/// Events are broadcast without blocking; a session never waits for, or
/// changes course because of, a subscriber.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Total photo count is known (freshly discovered or restored)
    TotalDiscovered {
        /// Username being downloaded
        username: String,
        /// Total photos upstream
        total: u32,
    },

    /// A photo transfer is starting
    PhotoStarted {
        /// Photo ID
        photo_id: String,
        /// Destination file name
        file_name: String,
        /// Photos completed so far
        completed: usize,
        /// Total photos upstream
        total: u32,
    },

    /// A photo has been downloaded and recorded
    PhotoCompleted {
        /// Photo ID
        photo_id: String,
        /// Destination file name
        file_name: String,
        /// Photos completed so far, including this one
        completed: usize,
        /// Total photos upstream
        total: u32,
    },

    /// A photo already on disk was adopted into the downloaded set
    PhotoRecovered {
        /// Photo ID
        photo_id: String,
        /// Existing file name
        file_name: String,
    },

    /// Something went wrong (photo-level or session-level)
    Error {
        /// Photo ID, if the error concerns a single photo
        #[serde(skip_serializing_if = "Option::is_none")]
        photo_id: Option<String>,
        /// Error message
        error: String,
    },

    /// The session ended without an unrecoverable error
    SessionFinished {
        /// Username that was downloaded
        username: String,
        /// How it ended
        outcome: SessionOutcome,
    },
}

/// How a session that did not fail ended
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionOutcome {
    /// Feed exhausted, or every known photo is downloaded
    Complete,
    /// No credential is currently usable; re-run after `next_reset`
    QuotaExhausted {
        /// Earliest moment a credential is expected back, if known
        next_reset: Option<DateTime<Utc>>,
    },
    /// Caller requested cancellation
    Cancelled,
}

impl SessionOutcome {
    /// Whether a later session has work left to do
    pub fn is_resumable(&self) -> bool {
        !matches!(self, SessionOutcome::Complete)
    }
}

/// Summary of one session
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    /// Username that was downloaded
    pub username: String,
    /// How the session ended
    pub outcome: SessionOutcome,
    /// Known total photo count
    pub total_photos: u32,
    /// Photos transferred in this session
    pub downloaded: usize,
    /// Photos skipped because they were already recorded
    pub already_present: usize,
    /// Photos adopted from disk without a transfer
    pub recovered_from_disk: usize,
    /// Photos whose transfer failed (left for the next session)
    pub failed: usize,
    /// Listing pages fetched
    pub pages_fetched: u32,
    /// Size of the downloaded set when the session ended
    pub downloaded_total: usize,
}

/// A photo that has been written to disk, as handed to collaborators
#[derive(Clone, Debug)]
pub struct DownloadedPhoto<'a> {
    /// The upstream record
    pub photo: &'a Photo,
    /// Where the asset now lives
    pub path: PathBuf,
    /// Whose collection it belongs to
    pub username: &'a str,
}
