use super::*;
use crate::config::Config;
use crate::credentials::{CredentialPool, ManualClock};
use crate::state::{DownloadState, DownloadStateStore};
use crate::types::{Event, SessionOutcome, SessionReport};
use chrono::{DateTime, TimeZone, Utc};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod sinks;

pub(super) const KEY_A: &str = "key-alpha-0000000001";
pub(super) const KEY_B: &str = "key-bravo-0000000002";
pub(super) const USER: &str = "alice";

/// Fixed instant for the pool's clock, so no hour rollover happens mid-test
pub(super) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 10, 15, 0).unwrap()
}

pub(super) struct Harness {
    pub(super) server: MockServer,
    pub(super) dir: TempDir,
    pub(super) pool: Arc<CredentialPool>,
    pub(super) downloader: PhotoDownloader,
}

impl Harness {
    pub(super) async fn new(tokens: &[&str], hourly_limit: u32) -> Self {
        Self::with_config(tokens, hourly_limit, |_| {}).await
    }

    pub(super) async fn with_config(
        tokens: &[&str],
        hourly_limit: u32,
        configure: impl FnOnce(&mut Config),
    ) -> Self {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();

        let mut config = Config::default();
        config.api.base_url = server.uri();
        config.api.page_delay = Duration::ZERO;
        config.api.request_timeout = Duration::from_secs(5);
        config.api.read_timeout = Duration::from_secs(5);
        config.download.download_dir = dir.path().join("downloads");
        config.credentials.hourly_limit = hourly_limit;
        config.credentials.state_file = dir.path().join("api_key_state.json");
        config.credentials.properties_file = None;
        configure(&mut config);

        let pool = Arc::new(CredentialPool::with_clock(
            tokens.iter().copied(),
            &config.credentials,
            Arc::new(ManualClock::new(start())),
        ));
        let downloader = PhotoDownloader::new(config, pool.clone()).unwrap();

        Self {
            server,
            dir,
            pool,
            downloader,
        }
    }

    pub(super) fn download_dir(&self) -> std::path::PathBuf {
        self.downloader.get_config().download.download_dir.clone()
    }

    pub(super) fn store(&self) -> DownloadStateStore {
        DownloadStateStore::new(self.downloader.get_config().download.state_path())
    }

    /// Write a state snapshot as a previous session would have left it
    pub(super) fn preseed(&self, total: u32, downloaded: &[&str]) {
        let mut state = DownloadState::new(USER);
        state.total_photos = total;
        for id in downloaded {
            state.insert(*id);
        }
        self.store().save(&mut state).unwrap();
    }

    pub(super) fn saved_state(&self) -> DownloadState {
        self.store().load_or_create(USER)
    }

    pub(super) fn photo(&self, id: &str) -> serde_json::Value {
        let uri = self.server.uri();
        serde_json::json!({
            "id": id,
            "description": format!("photo {id}"),
            "urls": {
                "raw": format!("{uri}/assets/{id}.jpg?raw"),
                "full": format!("{uri}/assets/{id}.jpg"),
                "regular": format!("{uri}/assets/{id}.jpg?w=1080"),
            },
            "links": {"download_location": format!("{uri}/photos/{id}/download")},
            "user": {"username": USER, "name": "Alice A."},
            "tags": [{"title": "nature"}]
        })
    }

    pub(super) async fn mount_user(&self, total: u32) {
        Mock::given(method("GET"))
            .and(path(format!("/users/{USER}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "username": USER,
                "total_photos": total
            })))
            .mount(&self.server)
            .await;
    }

    pub(super) async fn mount_page(&self, page: u32, ids: &[&str]) {
        let photos: Vec<_> = ids.iter().map(|id| self.photo(id)).collect();
        Mock::given(method("GET"))
            .and(path(format!("/users/{USER}/photos")))
            .and(query_param("page", page.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(photos))
            .mount(&self.server)
            .await;
    }

    pub(super) async fn mount_assets(&self) {
        Mock::given(method("GET"))
            .and(path_regex(r"^/assets/[^/]+\.jpg$"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\xff\xd8jpeg-bytes\xff\xd9".to_vec()))
            .mount(&self.server)
            .await;
    }

    pub(super) async fn run(&self) -> crate::Result<SessionReport> {
        self.downloader
            .download_user_photos(USER, &CancellationToken::new())
            .await
    }
}

pub(super) fn drain(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn new_rejects_invalid_config() {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.api.per_page = 0;
    config.credentials.state_file = dir.path().join("api_key_state.json");

    let pool = Arc::new(CredentialPool::new([KEY_A], &config.credentials));
    let err = PhotoDownloader::new(config, pool).unwrap_err();
    assert_eq!(err.code(), "config_error");
}

#[tokio::test]
async fn header_carries_client_id() {
    let h = Harness::new(&[KEY_A], 50).await;
    Mock::given(method("GET"))
        .and(path(format!("/users/{USER}")))
        .and(header("Authorization", format!("Client-ID {KEY_A}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"total_photos": 0})))
        .expect(1)
        .mount(&h.server)
        .await;
    h.mount_page(1, &[]).await;

    let report = h.run().await.unwrap();
    assert_eq!(report.outcome, SessionOutcome::Complete);
    assert_eq!(report.total_photos, 0);
}
