//! Per-collection download progress, persisted as a JSON snapshot
//!
//! The snapshot records which photo ids of one user's collection are already
//! on disk and how many photos the collection has. The page number is never
//! stored: every session lists from page one and relies on the downloaded set
//! to skip work.
//!
//! The total is only discovered while it is unknown (zero). Once the
//! downloaded set covers it, later sessions end without listing, so photos
//! uploaded after that point are not picked up.

use crate::error::Result;
use crate::utils::{read_json, write_json_atomic};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Progress of one user's collection
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DownloadState {
    /// Collection owner
    pub username: String,
    /// Total photo count reported upstream (0 = not discovered yet)
    #[serde(default)]
    pub total_photos: u32,
    /// Photo ids known to be on disk
    #[serde(default)]
    pub downloaded_photos: HashSet<String>,
    /// Time of the last save
    pub last_update: DateTime<Utc>,
}

impl DownloadState {
    /// Fresh state for `username`
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            total_photos: 0,
            downloaded_photos: HashSet::new(),
            last_update: Utc::now(),
        }
    }

    /// Whether `photo_id` is already recorded
    pub fn contains(&self, photo_id: &str) -> bool {
        self.downloaded_photos.contains(photo_id)
    }

    /// Record `photo_id`; returns false if it was already present
    pub fn insert(&mut self, photo_id: impl Into<String>) -> bool {
        self.downloaded_photos.insert(photo_id.into())
    }

    /// Number of photos recorded
    pub fn downloaded_count(&self) -> usize {
        self.downloaded_photos.len()
    }

    /// Whether the recorded set covers the known total
    ///
    /// Always false while the total is unknown.
    pub fn is_complete(&self) -> bool {
        self.total_photos > 0 && self.downloaded_count() >= self.total_photos as usize
    }
}

/// Loads and saves [`DownloadState`] snapshots at a fixed path
#[derive(Clone, Debug)]
pub struct DownloadStateStore {
    path: PathBuf,
}

impl DownloadStateStore {
    /// Store backed by `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Snapshot location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the snapshot for `username`, or start a new one
    ///
    /// A missing file, an unreadable or corrupt file, and a snapshot that
    /// belongs to another user all yield a fresh state. The previous file is
    /// only replaced on the next [`save`](Self::save).
    pub fn load_or_create(&self, username: &str) -> DownloadState {
        match read_json::<DownloadState>(&self.path) {
            Ok(Some(state)) if state.username == username => {
                info!(
                    username,
                    downloaded = state.downloaded_count(),
                    total = state.total_photos,
                    "resuming from saved download state"
                );
                state
            }
            Ok(Some(state)) => {
                warn!(
                    path = %self.path.display(),
                    saved_for = %state.username,
                    username,
                    "download state belongs to another user, starting fresh"
                );
                DownloadState::new(username)
            }
            Ok(None) => {
                info!(username, "no saved download state, starting fresh");
                DownloadState::new(username)
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "could not read download state, starting fresh"
                );
                DownloadState::new(username)
            }
        }
    }

    /// Stamp `last_update` and atomically replace the snapshot
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persistence`](crate::Error::Persistence) when the file
    /// cannot be written. The in-memory state is unaffected.
    pub fn save(&self, state: &mut DownloadState) -> Result<()> {
        state.last_update = Utc::now();
        write_json_atomic(&self.path, state)
    }
}
