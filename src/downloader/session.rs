//! One download session for one user
//!
//! ```text
//! INIT -> DISCOVER_TOTAL -> PAGE_FETCH -> PHOTO_LOOP -> { Complete | QuotaExhausted | Cancelled | Err }
//!                              ^              |
//!                              +-- next page -+
//! ```
//!
//! Listing always restarts at page one; the downloaded set and the files on
//! disk decide what is skipped. The state snapshot is saved after every photo
//! that changes it, so a crash loses at most the photo in flight.

use super::PhotoDownloader;
use super::api::Reply;
use crate::credentials::Credential;
use crate::error::{Error, Result};
use crate::state::{DownloadState, DownloadStateStore};
use crate::types::{DownloadedPhoto, Event, Photo, SessionOutcome, SessionReport};
use crate::utils::photo_file_name;
use std::future::Future;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Counters accumulated while a session runs
#[derive(Debug, Default)]
struct Tally {
    downloaded: usize,
    already_present: usize,
    recovered_from_disk: usize,
    failed: usize,
    pages_fetched: u32,
}

/// What the photo loop does after one photo
enum Step {
    Next,
    Stop(SessionOutcome),
}

/// Everything a session threads through its photo loop
struct Session<'a> {
    username: &'a str,
    store: DownloadStateStore,
    state: DownloadState,
    tally: Tally,
    cancel: &'a CancellationToken,
}

impl PhotoDownloader {
    /// Download every photo of `username` that is not on disk yet
    ///
    /// Returns normally when the collection is complete, when no credential
    /// is left ([`SessionOutcome::QuotaExhausted`], re-run later), or when
    /// `cancel` fires. In every case all finished photos are already recorded
    /// in the state snapshot.
    ///
    /// # Errors
    ///
    /// A listing request that fails with anything but a 403, a network
    /// failure on the listing endpoints, or a download directory that cannot
    /// be created. Progress made before the error stays saved.
    pub async fn download_user_photos(
        &self,
        username: &str,
        cancel: &CancellationToken,
    ) -> Result<SessionReport> {
        let download_dir = &self.config.download.download_dir;
        tokio::fs::create_dir_all(download_dir).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create download directory '{}': {}",
                    download_dir.display(),
                    e
                ),
            ))
        })?;

        let store = DownloadStateStore::new(self.config.download.state_path());
        let state = store.load_or_create(username);
        let mut session = Session {
            username,
            store,
            state,
            tally: Tally::default(),
            cancel,
        };

        info!(username, "download session started");
        let result = self.run_session(&mut session).await;

        let Session { state, tally, .. } = session;
        match result {
            Ok(outcome) => {
                let report = SessionReport {
                    username: username.to_string(),
                    outcome: outcome.clone(),
                    total_photos: state.total_photos,
                    downloaded: tally.downloaded,
                    already_present: tally.already_present,
                    recovered_from_disk: tally.recovered_from_disk,
                    failed: tally.failed,
                    pages_fetched: tally.pages_fetched,
                    downloaded_total: state.downloaded_count(),
                };
                info!(
                    username,
                    outcome = ?report.outcome,
                    downloaded = report.downloaded,
                    recovered = report.recovered_from_disk,
                    failed = report.failed,
                    progress = %format!("{}/{}", report.downloaded_total, report.total_photos),
                    "download session finished"
                );
                self.emit_event(Event::SessionFinished {
                    username: username.to_string(),
                    outcome,
                });
                Ok(report)
            }
            Err(e) => {
                error!(
                    username,
                    error = %e,
                    downloaded = tally.downloaded,
                    saved = state.downloaded_count(),
                    "download session aborted"
                );
                self.emit_event(Event::Error {
                    photo_id: None,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run_session(&self, session: &mut Session<'_>) -> Result<SessionOutcome> {
        let username = session.username;
        let api = &self.api;

        if session.state.total_photos == 0 {
            if session.cancel.is_cancelled() {
                return Ok(SessionOutcome::Cancelled);
            }
            let Some(info) = self
                .with_credential("user_info", move |c| api.user_info(username, c))
                .await?
            else {
                return Ok(self.quota_exhausted());
            };

            session.state.total_photos = info.total_photos;
            self.save_state(session);
            info!(username, total = info.total_photos, "discovered collection size");
        }
        self.emit_event(Event::TotalDiscovered {
            username: username.to_string(),
            total: session.state.total_photos,
        });

        if session.state.is_complete() {
            info!(
                username,
                total = session.state.total_photos,
                "every known photo is already downloaded"
            );
            return Ok(SessionOutcome::Complete);
        }

        let per_page = self.config.api.per_page;
        let mut page: u32 = 1;
        loop {
            if session.cancel.is_cancelled() {
                return Ok(SessionOutcome::Cancelled);
            }

            debug!(username, page, "fetching page");
            let fetched = self
                .with_credential("list_photos", move |c| api.list_photos(username, page, per_page, c))
                .await;
            self.page_delay(session.cancel).await;

            let Some(photos) = fetched? else {
                return Ok(self.quota_exhausted());
            };
            session.tally.pages_fetched += 1;

            if photos.is_empty() {
                info!(username, page, "reached the end of the feed");
                return Ok(SessionOutcome::Complete);
            }

            for photo in &photos {
                if session.cancel.is_cancelled() {
                    return Ok(SessionOutcome::Cancelled);
                }
                if let Step::Stop(outcome) = self.process_photo(session, photo).await {
                    return Ok(outcome);
                }
                if session.state.is_complete() {
                    return Ok(SessionOutcome::Complete);
                }
                if !self.pool.has_available() {
                    return Ok(self.quota_exhausted());
                }
            }

            page += 1;
        }
    }

    async fn process_photo(&self, session: &mut Session<'_>, photo: &Photo) -> Step {
        let username = session.username;
        let file_name = photo_file_name(username, &photo.id);
        let path = self.config.download.download_dir.join(&file_name);

        if session.state.contains(&photo.id) {
            session.tally.already_present += 1;
            debug!(photo_id = %photo.id, "already downloaded, skipping");
            return Step::Next;
        }

        if file_exists(&path).await {
            session.state.insert(photo.id.clone());
            self.save_state(session);
            session.tally.recovered_from_disk += 1;
            info!(photo_id = %photo.id, file = %file_name, "file already on disk, recorded without downloading");
            self.emit_event(Event::PhotoRecovered {
                photo_id: photo.id.clone(),
                file_name,
            });
            return Step::Next;
        }

        if self.config.api.track_downloads
            && let Some(location) = photo.links.download_location.as_deref()
        {
            let api = &self.api;
            match self
                .with_credential("track_download", move |c| api.track_download(location, c))
                .await
            {
                Ok(Some(())) => {}
                Ok(None) => return Step::Stop(self.quota_exhausted()),
                Err(e) => {
                    warn!(photo_id = %photo.id, error = %e, "download tracking failed, continuing");
                }
            }
        }

        let total = session.state.total_photos;
        self.emit_event(Event::PhotoStarted {
            photo_id: photo.id.clone(),
            file_name: file_name.clone(),
            completed: session.state.downloaded_count(),
            total,
        });

        let url = photo.asset_url(self.config.api.image_quality);
        match self.transfer.fetch(&photo.id, url, &path, session.cancel).await {
            Ok(_) => {}
            Err(Error::Cancelled) => {
                info!(photo_id = %photo.id, "cancelled during transfer, photo left for the next session");
                return Step::Stop(SessionOutcome::Cancelled);
            }
            Err(e) => {
                warn!(photo_id = %photo.id, error = %e, "photo transfer failed, will retry next session");
                session.tally.failed += 1;
                self.emit_event(Event::Error {
                    photo_id: Some(photo.id.clone()),
                    error: e.to_string(),
                });
                return Step::Next;
            }
        }

        let downloaded = DownloadedPhoto {
            photo,
            path,
            username,
        };
        self.hand_off(&downloaded).await;

        session.state.insert(photo.id.clone());
        self.save_state(session);
        session.tally.downloaded += 1;

        info!(
            photo_id = %photo.id,
            progress = %format!("{}/{}", session.state.downloaded_count(), total),
            "photo downloaded"
        );
        self.emit_event(Event::PhotoCompleted {
            photo_id: photo.id.clone(),
            file_name,
            completed: session.state.downloaded_count(),
            total,
        });
        Step::Next
    }

    /// Pass a transferred photo to the metadata writer, description log and catalog
    async fn hand_off(&self, downloaded: &DownloadedPhoto<'_>) {
        let photo_id = &downloaded.photo.id;

        if let Err(e) = self.metadata.write(downloaded).await {
            warn!(%photo_id, writer = self.metadata.name(), error = %e, "metadata write failed");
        }

        if let Some(log) = &self.descriptions
            && let Err(e) = log.append(downloaded.photo).await
        {
            warn!(%photo_id, error = %e, "description log append failed");
        }

        if let Some(catalog) = &self.catalog
            && let Err(e) = catalog.record(downloaded).await
        {
            warn!(%photo_id, error = %e, "catalog sink failed");
        }
    }

    /// Run `call` with a fresh credential, switching credentials on 403
    ///
    /// At most one attempt per credential in the pool. `Ok(None)` means the
    /// pool had nothing left to offer, which ends the session as
    /// [`SessionOutcome::QuotaExhausted`].
    pub(super) async fn with_credential<T, F, Fut>(&self, request: &str, mut call: F) -> Result<Option<T>>
    where
        F: FnMut(Credential) -> Fut,
        Fut: Future<Output = Result<Reply<T>>>,
    {
        let attempts = self.pool.len().max(1);
        for attempt in 1..=attempts {
            let Some(credential) = self.pool.acquire() else {
                return Ok(None);
            };

            match call(credential.clone()).await? {
                Reply::Ok(value) => return Ok(Some(value)),
                Reply::RateLimited => {
                    warn!(
                        request,
                        key = %credential,
                        attempt,
                        attempts,
                        "credential rate limited upstream, switching"
                    );
                    self.pool.mark_rate_limited(&credential);
                }
            }
        }
        Ok(None)
    }

    /// Fixed pause after a page fetch; returns early on cancellation
    async fn page_delay(&self, cancel: &CancellationToken) {
        let delay = self.config.api.page_delay;
        if delay.is_zero() {
            return;
        }
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(delay) => {}
        }
    }

    fn quota_exhausted(&self) -> SessionOutcome {
        let next_reset = self.pool.next_reset_time();
        info!(
            next_reset = ?next_reset,
            usage = self.pool.total_hourly_usage(),
            capacity = self.pool.max_hourly_limit(),
            "no credential available, pausing session"
        );
        SessionOutcome::QuotaExhausted { next_reset }
    }

    /// Save the snapshot; a failure is logged and the session goes on from memory
    ///
    /// The write is a blocking `std::fs` write plus fsync on the current
    /// worker thread. One small JSON file per photo keeps that short.
    fn save_state(&self, session: &mut Session<'_>) {
        if let Err(e) = session.store.save(&mut session.state) {
            error!(error = %e, "failed to save download state, continuing in memory");
        }
    }
}

async fn file_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
