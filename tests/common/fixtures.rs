//! Upstream API fixtures served through wiremock

use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Bytes served for every asset
pub const ASSET_BYTES: &[u8] = b"\xff\xd8\xff\xe0 fake jpeg body \xff\xd9";

/// Listing record for photo `id` owned by `username`
pub fn photo_json(server: &MockServer, username: &str, id: &str) -> serde_json::Value {
    let uri = server.uri();
    serde_json::json!({
        "id": id,
        "created_at": "2024-05-01T10:00:00Z",
        "description": format!("{username}'s photo {id}"),
        "alt_description": null,
        "urls": {
            "raw": format!("{uri}/assets/{id}.jpg?raw"),
            "full": format!("{uri}/assets/{id}.jpg"),
            "regular": format!("{uri}/assets/{id}.jpg?w=1080")
        },
        "links": {"download_location": format!("{uri}/photos/{id}/download")},
        "user": {"username": username, "name": "Test Photographer"},
        "likes": 0
    })
}

/// Serve user info and every listing page for `ids`, followed by an empty page
pub async fn mount_collection(server: &MockServer, username: &str, ids: &[&str], per_page: usize) {
    Mock::given(method("GET"))
        .and(path(format!("/users/{username}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "username": username,
            "total_photos": ids.len()
        })))
        .mount(server)
        .await;

    let mut pages: Vec<&[&str]> = ids.chunks(per_page).collect();
    pages.push(&[]);
    for (i, chunk) in pages.iter().enumerate() {
        let body: Vec<_> = chunk.iter().map(|id| photo_json(server, username, id)).collect();
        Mock::given(method("GET"))
            .and(path(format!("/users/{username}/photos")))
            .and(query_param("page", (i + 1).to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }
}

/// Serve asset bytes, expecting exactly `transfers` requests over the server's lifetime
pub async fn mount_assets(server: &MockServer, transfers: u64) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/assets/[^/]+\.jpg$"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(ASSET_BYTES.to_vec()))
        .expect(transfers)
        .mount(server)
        .await;
}

/// Accept download-tracking calls
pub async fn mount_tracking(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/photos/[^/]+/download$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"url": "ok"})))
        .mount(server)
        .await;
}
