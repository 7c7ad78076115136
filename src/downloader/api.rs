//! Authorized JSON endpoints of the upstream API

use crate::config::ApiConfig;
use crate::credentials::Credential;
use crate::error::{Error, FetchError, Result};
use crate::types::{Photo, UserInfo};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

/// Answer of an authorized endpoint
#[derive(Debug)]
pub(crate) enum Reply<T> {
    /// 2xx with a usable body
    Ok(T),
    /// 403: the credential has been throttled upstream
    RateLimited,
}

/// Client for the user-info, listing and download-tracking endpoints
#[derive(Clone, Debug)]
pub(crate) struct UnsplashApi {
    client: reqwest::Client,
    base: Url,
    request_timeout: Duration,
}

impl UnsplashApi {
    pub(crate) fn new(client: reqwest::Client, config: &ApiConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| Error::config("base_url", format!("invalid base URL: {}", e)))?;
        Ok(Self {
            client,
            base,
            request_timeout: config.request_timeout,
        })
    }

    /// `GET /users/{username}`
    pub(crate) async fn user_info(&self, username: &str, credential: Credential) -> Result<Reply<UserInfo>> {
        let url = self.endpoint(&["users", username])?;
        self.get_json(url, &credential).await
    }

    /// `GET /users/{username}/photos?page={page}&per_page={per_page}`
    pub(crate) async fn list_photos(
        &self,
        username: &str,
        page: u32,
        per_page: u32,
        credential: Credential,
    ) -> Result<Reply<Vec<Photo>>> {
        let mut url = self.endpoint(&["users", username, "photos"])?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &per_page.to_string());
        self.get_json(url, &credential).await
    }

    /// `GET /photos/{id}`
    pub(crate) async fn photo(&self, id: &str, credential: Credential) -> Result<Reply<Photo>> {
        let url = self.endpoint(&["photos", id])?;
        self.get_json(url, &credential).await
    }

    /// Report a download through the photo's `download_location` link
    ///
    /// The response body is not needed.
    pub(crate) async fn track_download(&self, location: &str, credential: Credential) -> Result<Reply<()>> {
        let url = Url::parse(location).map_err(|e| FetchError::InvalidResponse {
            url: location.to_string(),
            reason: format!("bad download_location: {}", e),
        })?;
        let response = self.authorized_get(url.clone(), &credential).await?;
        check_status(&url, response.status())
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::config("base_url", "base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn authorized_get(&self, url: Url, credential: &Credential) -> Result<reqwest::Response> {
        tracing::debug!(url = %url, key = %credential, "GET");
        let response = self
            .client
            .get(url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Client-ID {}", credential.token()),
            )
            .timeout(self.request_timeout)
            .send()
            .await?;
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, credential: &Credential) -> Result<Reply<T>> {
        let response = self.authorized_get(url.clone(), credential).await?;
        if let Reply::RateLimited = check_status(&url, response.status())? {
            return Ok(Reply::RateLimited);
        }

        let body = response.bytes().await?;
        let value = serde_json::from_slice(&body).map_err(|e| FetchError::InvalidResponse {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Reply::Ok(value))
    }
}

fn check_status(url: &Url, status: StatusCode) -> Result<Reply<()>> {
    if status == StatusCode::FORBIDDEN {
        return Ok(Reply::RateLimited);
    }
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        }
        .into());
    }
    Ok(Reply::Ok(()))
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api_for(server: &MockServer) -> UnsplashApi {
        let config = ApiConfig {
            base_url: server.uri(),
            ..Default::default()
        };
        UnsplashApi::new(reqwest::Client::new(), &config).unwrap()
    }

    #[tokio::test]
    async fn list_photos_sends_page_and_credential() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/alice/photos"))
            .and(query_param("page", "3"))
            .and(query_param("per_page", "30"))
            .and(header("Authorization", "Client-ID key-one-000000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": "p1", "urls": {"full": "https://img/p1"}}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let reply = api_for(&server)
            .list_photos("alice", 3, 30, Credential::new("key-one-000000"))
            .await
            .unwrap();

        match reply {
            Reply::Ok(photos) => assert_eq!(photos[0].id, "p1"),
            Reply::RateLimited => panic!("expected photos"),
        }
    }

    #[tokio::test]
    async fn forbidden_is_rate_limited_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/alice"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Rate Limit Exceeded"))
            .mount(&server)
            .await;

        let reply = api_for(&server)
            .user_info("alice", Credential::new("key-one-000000"))
            .await
            .unwrap();
        assert!(matches!(reply, Reply::RateLimited));
    }

    #[tokio::test]
    async fn other_statuses_are_fetch_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/alice"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = api_for(&server)
            .user_info("alice", Credential::new("key-one-000000"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Fetch(FetchError::Status { status: 503, .. })));
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/alice"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let err = api_for(&server)
            .user_info("alice", Credential::new("key-one-000000"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "fetch_invalid_response");
    }

    #[tokio::test]
    async fn photo_lookup_reads_full_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/photos/p7"))
            .and(header("Authorization", "Client-ID key-one-000000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "p7",
                "urls": {"full": "https://img/p7"},
                "tags": [{"title": "fog"}, {"title": "forest"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = api_for(&server)
            .photo("p7", Credential::new("key-one-000000"))
            .await
            .unwrap();

        match reply {
            Reply::Ok(photo) => {
                assert_eq!(photo.id, "p7");
                assert_eq!(photo.tags.len(), 2);
            }
            Reply::RateLimited => panic!("expected a photo"),
        }
    }

    #[tokio::test]
    async fn username_is_encoded_as_one_path_segment() {
        let server = MockServer::start().await;
        let api = api_for(&server);

        let url = api.endpoint(&["users", "a/b c", "photos"]).unwrap();
        assert_eq!(url.path(), "/users/a%2Fb%20c/photos");
    }
}
