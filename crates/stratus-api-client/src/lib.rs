//! HTTP client for the Stratus dashboard backend and the CDN.
//!
//! Provides a minimal client with configurable auth (Bearer token, session cookie
//! or none), generic GET/POST helpers, and the upload endpoints used by the
//! upload pipeline (see [`upload`]).

pub mod upload;

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

pub use upload::StratusClient;

/// Longest response body excerpt carried into error messages.
const ERROR_BODY_LIMIT: usize = 200;

/// Authentication strategy for a remote service.
#[derive(Clone, Debug)]
pub enum Auth {
    /// `Authorization: Bearer {token}`
    Bearer(String),
    /// `Cookie: {cookie}` (dashboard session)
    Cookie(String),
    None,
}

/// HTTP client bound to one origin with configurable auth.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    auth: Auth,
}

impl ApiClient {
    pub fn new(base_url: &str, auth: Auth, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self::with_client(client, base_url, auth))
    }

    /// Share an existing connection pool.
    pub fn with_client(client: Client, base_url: &str, auth: Auth) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn apply_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Auth::Bearer(token) => request.header("Authorization", format!("Bearer {}", token)),
            Auth::Cookie(cookie) => request.header("Cookie", cookie.as_str()),
            Auth::None => request,
        }
    }

    /// Send with auth applied; non-success statuses become errors carrying the
    /// status and an excerpt of the body.
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self
            .apply_auth(request)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow::anyhow!(
                "API request failed with status {}: {}",
                status,
                body_excerpt(&error_text)
            ));
        }

        Ok(response)
    }

    /// GET request. Deserializes JSON response.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = self.client.get(self.build_url(path));
        let response = self.send(request).await?;

        response
            .json()
            .await
            .context("Failed to parse response as JSON")
    }

    /// POST JSON body and deserialize response.
    pub async fn post_json<T: DeserializeOwned, B: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let request = self.client.post(self.build_url(path)).json(body);
        let response = self.send(request).await?;

        response
            .json()
            .await
            .context("Failed to parse response as JSON")
    }

    /// POST multipart form and return the raw response for the caller to decode.
    pub async fn post_multipart(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<Response> {
        let request = self.client.post(self.build_url(path)).multipart(form);
        self.send(request).await
    }
}

fn body_excerpt(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_excerpt_truncates_long_bodies() {
        assert_eq!(body_excerpt("  boom \n"), "boom");
        let long = "x".repeat(ERROR_BODY_LIMIT + 50);
        let excerpt = body_excerpt(&long);
        assert_eq!(excerpt.len(), ERROR_BODY_LIMIT + 3);
        assert!(excerpt.ends_with("..."));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = ApiClient::new("http://localhost:8000/", Auth::None, Duration::from_secs(5))
            .unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(
            client.build_url("/api/cdn/folders/root/"),
            "http://localhost:8000/api/cdn/folders/root/"
        );
    }

    #[tokio::test]
    async fn non_success_status_carries_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/thing")
            .match_header("authorization", "Bearer t0k")
            .with_status(404)
            .with_body("no such thing")
            .create_async()
            .await;

        let client = ApiClient::new(
            &server.url(),
            Auth::Bearer("t0k".into()),
            Duration::from_secs(5),
        )
        .unwrap();
        let err = client.get::<serde_json::Value>("/thing").await.unwrap_err();

        mock.assert_async().await;
        let message = format!("{:#}", err);
        assert!(message.contains("404"), "{}", message);
        assert!(message.contains("no such thing"), "{}", message);
    }
}
