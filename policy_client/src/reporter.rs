use crate::error::{ClientError, Result};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Status and decoded body of a completed request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// `None` when the body was empty or not valid JSON.
    pub body: Option<Value>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Thin JSON client for a REST API rooted at `base_url`.
#[derive(Debug, Clone)]
pub struct HttpReporter {
    client: reqwest::Client,
    base_url: String,
}

impl HttpReporter {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::from_reqwest(&base_url, e))?;
        Ok(Self { client, base_url })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        let url = self.url(path);
        self.send(&url, self.client.get(&url)).await
    }

    pub async fn get_with_query(&self, path: &str, query: &[(&str, &str)]) -> Result<ApiResponse> {
        let url = self.url(path);
        self.send(&url, self.client.get(&url).query(query)).await
    }

    pub async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<ApiResponse> {
        let url = self.url(path);
        self.send(&url, self.client.post(&url).json(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        let url = self.url(path);
        self.send(&url, self.client.delete(&url)).await
    }

    /// Raw body text, for endpoints that do not speak JSON.
    pub async fn get_text(&self, path: &str) -> Result<String> {
        let url = self.url(path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(&url, e))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            return Err(ClientError::Status { url, status });
        }

        response
            .text()
            .await
            .map_err(|e| ClientError::from_reqwest(&url, e))
    }

    async fn send(&self, url: &str, request: reqwest::RequestBuilder) -> Result<ApiResponse> {
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(url, e))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ClientError::from_reqwest(url, e))?;

        debug!("{} -> HTTP {} ({} bytes)", url, status, text.len());

        Ok(ApiResponse {
            status,
            body: decode_body(url, &text),
        })
    }
}

fn decode_body(url: &str, text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }
    match serde_json::from_str(text) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring malformed JSON from {}: {}", url, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Path,
        http::StatusCode,
        routing::{delete, get},
        Json, Router,
    };
    use serde_json::json;
    use tokio::net::TcpListener;

    async fn spawn_api() -> String {
        let app = Router::new()
            .route("/health", get(|| async { Json(json!({ "status": "healthy" })) }))
            .route(
                "/api/items",
                get(|| async { Json(json!([{ "id": 1, "name": "first" }])) })
                    .post(|Json(item): Json<Value>| async move { (StatusCode::CREATED, Json(item)) }),
            )
            .route(
                "/api/items/:id",
                delete(|Path(_id): Path<u64>| async { StatusCode::NO_CONTENT }),
            )
            .route("/broken", get(|| async { "{not json" }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    Json(json!({ "status": "late" }))
                }),
            );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });
        format!("http://{}", addr)
    }

    #[test]
    fn test_url_joining() {
        let reporter = HttpReporter::new("http://localhost:8080/").unwrap();
        assert_eq!(reporter.url("/api/items"), "http://localhost:8080/api/items");
        assert_eq!(reporter.url("health"), "http://localhost:8080/health");
    }

    #[test]
    fn test_decode_body() {
        assert_eq!(decode_body("u", ""), None);
        assert_eq!(decode_body("u", "{oops"), None);
        assert_eq!(decode_body("u", r#"{"a":1}"#), Some(json!({ "a": 1 })));
    }

    #[tokio::test]
    async fn test_crud_round() {
        let reporter = HttpReporter::new(spawn_api().await).unwrap();

        let health = reporter.get("/health").await.unwrap();
        assert!(health.is_success());
        assert_eq!(health.body, Some(json!({ "status": "healthy" })));

        let created = reporter
            .post("/api/items", &json!({ "name": "Test Item" }))
            .await
            .unwrap();
        assert_eq!(created.status, 201);
        assert_eq!(created.body.unwrap()["name"], "Test Item");

        let deleted = reporter.delete("/api/items/1").await.unwrap();
        assert_eq!(deleted.status, 204);
        assert_eq!(deleted.body, None);
    }

    #[tokio::test]
    async fn test_malformed_json_is_no_data() {
        let reporter = HttpReporter::new(spawn_api().await).unwrap();

        let response = reporter.get("/broken").await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, None);
    }

    #[tokio::test]
    async fn test_missing_route_reports_status() {
        let reporter = HttpReporter::new(spawn_api().await).unwrap();

        let response = reporter.get("/nope").await.unwrap();
        assert_eq!(response.status, 404);
        assert!(!response.is_success());
        assert!(matches!(
            reporter.get_text("/nope").await,
            Err(ClientError::Status { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn test_timeout() {
        let reporter =
            HttpReporter::with_timeout(spawn_api().await, Duration::from_millis(100)).unwrap();

        assert!(matches!(
            reporter.get("/slow").await,
            Err(ClientError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let reporter = HttpReporter::new(format!("http://{}", addr)).unwrap();
        assert!(matches!(
            reporter.get("/health").await,
            Err(ClientError::Connect { .. })
        ));
    }
}
