//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per locker endpoint.
//! When API routes or request formats change, update only this file.

#![allow(dead_code)]

use super::constants::*;
use reqwest::{multipart, Response};
use serde_json::json;
use std::time::Duration;

/// HTTP test client with cookie-based session management
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    /// Creates a new unauthenticated client
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    /// Creates a client logged in as `handle` (with `TEST_PASS`)
    ///
    /// # Panics
    ///
    /// Panics if authentication fails (indicates test infrastructure problem).
    pub async fn authenticated(base_url: String, handle: &str) -> Self {
        let client = Self::new(base_url);

        let response = client.login(handle, TEST_PASS).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::CREATED,
            "Test user authentication failed: {:?}",
            response.text().await
        );

        client
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ========================================================================
    // Authentication Endpoints
    // ========================================================================

    /// POST /v1/auth/register
    pub async fn register(&self, handle: &str, password: &str) -> Response {
        self.client
            .post(self.url("/v1/auth/register"))
            .json(&json!({ "user_handle": handle, "password": password }))
            .send()
            .await
            .expect("Register request failed")
    }

    /// POST /v1/auth/login
    pub async fn login(&self, handle: &str, password: &str) -> Response {
        self.client
            .post(self.url("/v1/auth/login"))
            .json(&json!({ "user_handle": handle, "password": password }))
            .send()
            .await
            .expect("Login request failed")
    }

    /// GET /v1/auth/logout
    pub async fn logout(&self) -> Response {
        self.client
            .get(self.url("/v1/auth/logout"))
            .send()
            .await
            .expect("Logout request failed")
    }

    // ========================================================================
    // Media Endpoints
    // ========================================================================

    /// POST /v1/media/upload
    pub async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Response {
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("audio/mpeg")
            .expect("Invalid mime type");
        let form = multipart::Form::new().part("file", part);
        self.client
            .post(self.url("/v1/media/upload"))
            .multipart(form)
            .send()
            .await
            .expect("Upload request failed")
    }

    /// Uploads and returns the storage name of the new record
    ///
    /// # Panics
    ///
    /// Panics if the upload is not accepted.
    pub async fn upload_ok(&self, file_name: &str, bytes: Vec<u8>) -> String {
        let response = self.upload(file_name, bytes).await;
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);
        let record: serde_json::Value = response.json().await.expect("Invalid upload response");
        record["storage_name"]
            .as_str()
            .expect("Missing storage_name")
            .to_string()
    }

    /// GET /v1/media
    pub async fn list_media(&self) -> Response {
        self.client
            .get(self.url("/v1/media"))
            .send()
            .await
            .expect("List request failed")
    }

    /// GET /v1/media, parsed
    pub async fn list_media_json(&self) -> Vec<serde_json::Value> {
        let response = self.list_media().await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        response.json().await.expect("Invalid list response")
    }

    /// GET /v1/media/{storage_name}
    pub async fn get_media(&self, storage_name: &str) -> Response {
        self.client
            .get(self.url(&format!("/v1/media/{}", storage_name)))
            .send()
            .await
            .expect("Get media request failed")
    }

    /// GET /v1/media/{storage_name}/stream
    pub async fn stream(&self, storage_name: &str) -> Response {
        self.client
            .get(self.url(&format!("/v1/media/{}/stream", storage_name)))
            .send()
            .await
            .expect("Stream request failed")
    }

    /// GET /v1/media/{storage_name}/stream with a Range header
    pub async fn stream_range(&self, storage_name: &str, range: &str) -> Response {
        self.client
            .get(self.url(&format!("/v1/media/{}/stream", storage_name)))
            .header("Range", range)
            .send()
            .await
            .expect("Stream request failed")
    }

    /// GET /v1/media/{storage_name}/artwork
    pub async fn artwork(&self, storage_name: &str) -> Response {
        self.client
            .get(self.url(&format!("/v1/media/{}/artwork", storage_name)))
            .send()
            .await
            .expect("Artwork request failed")
    }

    /// DELETE /v1/media/{storage_name}
    pub async fn delete_media(&self, storage_name: &str) -> Response {
        self.client
            .delete(self.url(&format!("/v1/media/{}", storage_name)))
            .send()
            .await
            .expect("Delete request failed")
    }

    /// POST /v1/media/delete
    pub async fn delete_many(&self, storage_names: &[&str], all: bool) -> Response {
        self.client
            .post(self.url("/v1/media/delete"))
            .json(&json!({ "storage_names": storage_names, "all": all }))
            .send()
            .await
            .expect("Bulk delete request failed")
    }

    /// POST /v1/media/playlist
    pub async fn fetch_playlist(&self, playlist_url: &str) -> Response {
        self.client
            .post(self.url("/v1/media/playlist"))
            .json(&json!({ "playlist_url": playlist_url }))
            .send()
            .await
            .expect("Playlist request failed")
    }
}
