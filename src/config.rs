//! Configuration types for unsplash-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};

/// Upstream API access settings (endpoints, timeouts, pagination)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API base URL (default: "https://api.unsplash.com")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// TCP connect timeout (default: 30 seconds)
    #[serde(default = "default_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Whole-request timeout for the JSON endpoints (default: 30 seconds)
    #[serde(default = "default_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Maximum silence between two body chunks during an asset transfer (default: 30 seconds)
    ///
    /// Asset transfers have no overall deadline, since a large original can
    /// legitimately take minutes. A stalled connection is caught by this instead.
    #[serde(default = "default_timeout", with = "duration_serde")]
    pub read_timeout: Duration,

    /// Photos per listing page (default: 30, the upstream maximum)
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// Fixed pause after every page fetch, whatever its outcome (default: 1000 ms)
    #[serde(default = "default_page_delay", with = "millis_serde")]
    pub page_delay: Duration,

    /// Which rendition of each photo to download (default: full)
    #[serde(default)]
    pub image_quality: ImageQuality,

    /// Call the per-photo download tracking endpoint before each transfer (default: false)
    ///
    /// Each tracking call is an authorized request and consumes one unit of
    /// credential quota.
    #[serde(default)]
    pub track_downloads: bool,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connect_timeout: default_timeout(),
            request_timeout: default_timeout(),
            read_timeout: default_timeout(),
            per_page: default_per_page(),
            page_delay: default_page_delay(),
            image_quality: ImageQuality::default(),
            track_downloads: false,
            user_agent: default_user_agent(),
        }
    }
}

/// Photo rendition to fetch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageQuality {
    /// Original upload, unprocessed
    Raw,
    /// Full resolution JPEG
    #[default]
    Full,
    /// 1080px wide JPEG
    Regular,
}

/// Local output settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory receiving photos, descriptions and the download state (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// File name of the download state snapshot inside `download_dir`
    #[serde(default = "default_state_file_name")]
    pub state_file_name: String,

    /// Append a human-readable block per photo to `descriptions.txt` (default: true)
    #[serde(default = "default_true")]
    pub write_descriptions: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            state_file_name: default_state_file_name(),
            write_descriptions: true,
        }
    }
}

impl DownloadConfig {
    /// Full path of the download state snapshot
    pub fn state_path(&self) -> PathBuf {
        self.download_dir.join(&self.state_file_name)
    }
}

/// Credential pool settings (quota, cooldown, token sources)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CredentialConfig {
    /// Requests allowed per credential per clock hour (default: 50, the demo tier)
    #[serde(default = "default_hourly_limit")]
    pub hourly_limit: u32,

    /// How long a credential stays benched after an upstream 403 (default: 1 hour)
    #[serde(default = "default_cooldown", with = "duration_serde")]
    pub rate_limit_cooldown: Duration,

    /// Pool state snapshot (default: "./api_key_state.json")
    #[serde(default = "default_pool_state_file")]
    pub state_file: PathBuf,

    /// Environment variable holding comma-separated tokens
    #[serde(default = "default_env_var")]
    pub env_var: String,

    /// Properties file consulted when the environment variable is empty
    #[serde(default = "default_properties_file")]
    pub properties_file: Option<PathBuf>,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            hourly_limit: default_hourly_limit(),
            rate_limit_cooldown: default_cooldown(),
            state_file: default_pool_state_file(),
            env_var: default_env_var(),
            properties_file: default_properties_file(),
        }
    }
}

/// Main configuration for [`PhotoDownloader`](crate::PhotoDownloader)
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Upstream API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Local output settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Credential pool settings
    #[serde(default)]
    pub credentials: CredentialConfig,
}

impl Config {
    /// Check settings that would otherwise only fail deep inside a session
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.api.base_url)
            .map_err(|e| Error::config("base_url", format!("invalid base URL: {}", e)))?;
        if url.cannot_be_a_base() {
            return Err(Error::config("base_url", "base URL cannot carry a path"));
        }
        if self.api.per_page == 0 {
            return Err(Error::config("per_page", "per_page must be at least 1"));
        }
        if self.credentials.hourly_limit == 0 {
            return Err(Error::config("hourly_limit", "hourly_limit must be at least 1"));
        }
        if self.download.state_file_name.trim().is_empty() {
            return Err(Error::config("state_file_name", "state file name is empty"));
        }
        Ok(())
    }
}

/// Property holding a single token
pub const SINGLE_TOKEN_PROPERTY: &str = "unsplash.access.token";
/// Property holding a comma-separated token list
pub const MULTI_TOKEN_PROPERTY: &str = "unsplash.access.tokens";

/// Load credential tokens from the configured sources
///
/// The environment variable wins; the properties file is only consulted when
/// the variable is unset or yields no tokens. Within the properties file the
/// single-token key comes first, followed by the multi-token key, with
/// duplicates dropped.
///
/// # Errors
///
/// Returns [`Error::Config`] when no source yields a token.
pub fn load_tokens(config: &CredentialConfig) -> Result<Vec<String>> {
    let env_value = std::env::var(&config.env_var).ok();
    load_tokens_from(env_value.as_deref(), config.properties_file.as_deref())
}

/// [`load_tokens`] with the environment value supplied by the caller
pub fn load_tokens_from(env_value: Option<&str>, properties_file: Option<&Path>) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    if let Some(value) = env_value {
        push_token_list(&mut tokens, value);
    }

    if tokens.is_empty()
        && let Some(path) = properties_file
    {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                tracing::info!(path = %path.display(), "loading tokens from properties file");
                let props = parse_properties(&content);
                for (key, value) in &props {
                    if key == SINGLE_TOKEN_PROPERTY {
                        push_token_list(&mut tokens, value);
                    }
                }
                for (key, value) in &props {
                    if key == MULTI_TOKEN_PROPERTY {
                        push_token_list(&mut tokens, value);
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "properties file not found");
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read properties file");
            }
        }
    }

    if tokens.is_empty() {
        return Err(Error::config(
            "credentials",
            "no access tokens found: set the token environment variable or add tokens to the properties file",
        ));
    }

    tracing::info!(count = tokens.len(), "loaded access token(s)");
    Ok(tokens)
}

fn push_token_list(tokens: &mut Vec<String>, list: &str) {
    for token in list.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !tokens.iter().any(|t| t == token) {
            tokens.push(token.to_string());
        }
    }
}

/// Parse the subset of the `.properties` format used for token files
///
/// Supports `key=value` and `key:value`, `#` and `!` comment lines, and
/// surrounding whitespace. Later duplicates of a key are kept in order.
pub fn parse_properties(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| {
            let split = line.find(['=', ':'])?;
            let (key, value) = line.split_at(split);
            Some((key.trim().to_string(), value[1..].trim().to_string()))
        })
        .collect()
}

fn default_base_url() -> String {
    "https://api.unsplash.com".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_per_page() -> u32 {
    30
}

fn default_page_delay() -> Duration {
    Duration::from_millis(1000)
}

fn default_user_agent() -> String {
    concat!("unsplash-dl/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_state_file_name() -> String {
    "download_state.json".to_string()
}

fn default_true() -> bool {
    true
}

fn default_hourly_limit() -> u32 {
    50
}

fn default_cooldown() -> Duration {
    Duration::from_secs(3600)
}

fn default_pool_state_file() -> PathBuf {
    PathBuf::from("./api_key_state.json")
}

fn default_env_var() -> String {
    "UNSPLASH_ACCESS_TOKENS".to_string()
}

fn default_properties_file() -> Option<PathBuf> {
    Some(PathBuf::from("./config/config.properties"))
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Millisecond variant for sub-second settings
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_upstream_demo_tier() {
        let config = Config::default();

        assert_eq!(config.api.base_url, "https://api.unsplash.com");
        assert_eq!(config.api.per_page, 30);
        assert_eq!(config.api.page_delay, Duration::from_secs(1));
        assert_eq!(config.credentials.hourly_limit, 50);
        assert_eq!(config.credentials.rate_limit_cooldown, Duration::from_secs(3600));
        assert_eq!(config.credentials.env_var, "UNSPLASH_ACCESS_TOKENS");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_json_object_yields_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.download.state_file_name, "download_state.json");
        assert_eq!(config.api.image_quality, ImageQuality::Full);
        assert!(config.download.write_descriptions);
    }

    #[test]
    fn durations_serialize_as_seconds_and_page_delay_as_millis() {
        let mut config = Config::default();
        config.api.page_delay = Duration::from_millis(250);
        config.credentials.rate_limit_cooldown = Duration::from_secs(120);

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["api"]["page_delay"], 250);
        assert_eq!(json["api"]["request_timeout"], 30);
        assert_eq!(json["credentials"]["rate_limit_cooldown"], 120);

        let restored: Config = serde_json::from_value(json).unwrap();
        assert_eq!(restored.api.page_delay, Duration::from_millis(250));
        assert_eq!(restored.credentials.rate_limit_cooldown, Duration::from_secs(120));
    }

    #[test]
    fn validate_rejects_bad_settings() {
        let mut config = Config::default();
        config.api.base_url = "not a url".into();
        assert!(matches!(
            config.validate(),
            Err(Error::Config { key: Some(k), .. }) if k == "base_url"
        ));

        let mut config = Config::default();
        config.api.per_page = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.credentials.hourly_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn properties_parser_handles_comments_and_separators() {
        let props = parse_properties(
            "# comment\n! also comment\n\nunsplash.access.token = abc\nother:value\nbroken line\n",
        );
        assert_eq!(
            props,
            vec![
                ("unsplash.access.token".to_string(), "abc".to_string()),
                ("other".to_string(), "value".to_string()),
            ]
        );
    }

    #[test]
    fn env_value_wins_over_properties_file() {
        let dir = TempDir::new().unwrap();
        let props = dir.path().join("config.properties");
        std::fs::write(&props, "unsplash.access.token=from-file\n").unwrap();

        let tokens = load_tokens_from(Some(" k1 , ,k2,k1 "), Some(&props)).unwrap();
        assert_eq!(tokens, vec!["k1", "k2"]);
    }

    #[test]
    fn properties_file_merges_single_and_multi_keys() {
        let dir = TempDir::new().unwrap();
        let props = dir.path().join("config.properties");
        std::fs::write(
            &props,
            "unsplash.access.tokens=k2, k3 ,k1\nunsplash.access.token=k1\n",
        )
        .unwrap();

        let tokens = load_tokens_from(Some("   "), Some(&props)).unwrap();
        assert_eq!(tokens, vec!["k1", "k2", "k3"], "single key first, then list");
    }

    #[test]
    fn no_source_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.properties");

        let err = load_tokens_from(None, Some(&missing)).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(load_tokens_from(None, None).is_err());
    }

    #[test]
    #[serial]
    fn load_tokens_reads_configured_env_var() {
        let config = CredentialConfig {
            env_var: "UNSPLASH_DL_TEST_TOKENS".into(),
            properties_file: None,
            ..Default::default()
        };

        // SAFETY: serialized test; no other thread reads this variable
        unsafe { std::env::set_var("UNSPLASH_DL_TEST_TOKENS", "alpha,beta") };
        let tokens = load_tokens(&config);
        unsafe { std::env::remove_var("UNSPLASH_DL_TEST_TOKENS") };

        assert_eq!(tokens.unwrap(), vec!["alpha", "beta"]);
    }
}
