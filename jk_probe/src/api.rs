//! Diagnostics backend client

use async_trait::async_trait;
use jk_core::types::credentials::TurnCredentials;
use jk_core::types::report::{ResultStats, SaveResultRequest, SavedResult, StoredResult};
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Status(u16),
}

#[async_trait]
pub trait DiagnosticsApi: Send + Sync {
    /// `GET /turn-credentials`
    async fn turn_credentials(&self) -> Result<TurnCredentials, ApiError>;

    /// `GET /bandwidth/download`, returning the number of bytes received
    async fn download_payload(&self) -> Result<usize, ApiError>;

    /// `GET /bandwidth/ping`
    async fn ping(&self) -> Result<(), ApiError>;

    /// `HEAD` an arbitrary URL; any HTTP response counts, its status is returned
    async fn head(&self, url: &str) -> Result<u16, ApiError>;

    /// `POST /results`
    async fn save_results(&self, request: &SaveResultRequest) -> Result<SavedResult, ApiError>;

    /// `GET /results/stats`
    async fn stats(&self) -> Result<ResultStats, ApiError>;

    /// `GET /results/:id`
    async fn fetch_result(&self, id: &str) -> Result<StoredResult, ApiError>;
}

/// reqwest-backed client for the diagnostics backend
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    base: String,
}

impl HttpApi {
    pub fn new(api_base: &str) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(concat!("jitsi-kollen/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base: api_base.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.client.get(self.url(path)).send().await?;
        Ok(check(response)?.json().await?)
    }
}

fn check(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ApiError::Status(status.as_u16()))
    }
}

#[async_trait]
impl DiagnosticsApi for HttpApi {
    async fn turn_credentials(&self) -> Result<TurnCredentials, ApiError> {
        self.get_json("/turn-credentials").await
    }

    async fn download_payload(&self) -> Result<usize, ApiError> {
        let response = self
            .client
            .get(self.url("/bandwidth/download"))
            .header(CACHE_CONTROL, "no-cache, no-store")
            .header(PRAGMA, "no-cache")
            .send()
            .await?;
        let mut response = check(response)?;

        let mut received = 0;
        while let Some(chunk) = response.chunk().await? {
            received += chunk.len();
        }
        Ok(received)
    }

    async fn ping(&self) -> Result<(), ApiError> {
        let response = self
            .client
            .get(self.url("/bandwidth/ping"))
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;
        // Drain the body so the round trip covers the whole response
        check(response)?.bytes().await?;
        Ok(())
    }

    async fn head(&self, url: &str) -> Result<u16, ApiError> {
        let response = self.client.head(url).send().await?;
        Ok(response.status().as_u16())
    }

    async fn save_results(&self, request: &SaveResultRequest) -> Result<SavedResult, ApiError> {
        let response = self.client.post(self.url("/results")).json(request).send().await?;
        Ok(check(response)?.json().await?)
    }

    async fn stats(&self) -> Result<ResultStats, ApiError> {
        self.get_json("/results/stats").await
    }

    async fn fetch_result(&self, id: &str) -> Result<StoredResult, ApiError> {
        self.get_json(&format!("/results/{}", id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve a single canned HTTP response and return the base URL
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });

        format!("http://{}/api", addr)
    }

    #[tokio::test]
    async fn test_turn_credentials() {
        let base = serve_once(
            "200 OK",
            r#"{"iceServers":[{"urls":"stun:meet.example.org:3478"}],"jitsiDomain":"meet.example.org","credentialSource":"none"}"#,
        )
        .await;
        let api = HttpApi::new(&base).unwrap();
        let creds = api.turn_credentials().await.unwrap();
        assert!(!creds.has_real_credentials());
        assert_eq!(creds.ice_servers.len(), 1);
    }

    #[tokio::test]
    async fn test_error_status() {
        let base = serve_once("503 Service Unavailable", "{}").await;
        let api = HttpApi::new(&base).unwrap();
        let err = api.stats().await.unwrap_err();
        assert!(matches!(err, ApiError::Status(503)));
        assert_eq!(err.to_string(), "API error: 503");
    }

    #[tokio::test]
    async fn test_download_counts_bytes() {
        let base = serve_once("200 OK", "0123456789").await;
        let api = HttpApi::new(&base).unwrap();
        assert_eq!(api.download_payload().await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_head_reports_any_status() {
        let base = serve_once("404 Not Found", "").await;
        let api = HttpApi::new(&base).unwrap();
        assert_eq!(api.head(&base).await.unwrap(), 404);
    }
}
