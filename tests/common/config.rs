//! Test configuration helpers for building downloaders against a mock upstream

use chrono::{DateTime, TimeZone, Utc};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use unsplash_dl::{Config, CredentialPool, ManualClock, PhotoDownloader};

/// Start of the simulated timeline shared by the integration tests
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 10, 15, 0).unwrap()
}

/// Config pointing at `base_url` with every file under `root`
///
/// Page delay is disabled and timeouts are short so tests stay fast.
pub fn test_config(base_url: &str, root: &Path, hourly_limit: u32) -> Config {
    let mut config = Config::default();
    config.api.base_url = base_url.to_string();
    config.api.page_delay = Duration::ZERO;
    config.api.request_timeout = Duration::from_secs(5);
    config.api.read_timeout = Duration::from_secs(5);
    config.download.download_dir = root.join("downloads");
    config.credentials.hourly_limit = hourly_limit;
    config.credentials.state_file = root.join("api_key_state.json");
    config.credentials.properties_file = None;
    config
}

/// A downloader as a fresh process would build it: pool state is read back
/// from disk, time comes from `clock`
pub fn start_process(
    config: &Config,
    tokens: &[&str],
    clock: Arc<ManualClock>,
) -> (PhotoDownloader, Arc<CredentialPool>) {
    let pool = Arc::new(CredentialPool::with_clock(
        tokens.iter().copied(),
        &config.credentials,
        clock,
    ));
    let downloader = PhotoDownloader::new(config.clone(), pool.clone()).unwrap();
    (downloader, pool)
}
