use async_trait::async_trait;
use jk_core::types::credentials::TurnCredentials;
use jk_core::types::report::{ResultStats, SaveResultRequest, SavedResult, StoredResult};
use jk_probe::{ApiError, DiagnosticsApi};
use std::sync::Mutex;
use std::time::Duration;

/// In-memory diagnostics backend
pub struct FakeApi {
    /// `None` answers `/turn-credentials` with a 500
    pub credentials: Option<TurnCredentials>,
    pub https_down: bool,
    /// Bytes served by the download endpoint
    pub payload: usize,
    pub download_delay: Duration,
    pub ping_delay: Duration,
    pub ping_fails: bool,
    /// Answer `POST /results` with a 500
    pub save_fails: bool,
    pub save_delay: Duration,
    saved: Mutex<Vec<SaveResultRequest>>,
    heads: Mutex<Vec<String>>,
}

impl FakeApi {
    pub fn new(credentials: Option<TurnCredentials>) -> Self {
        Self {
            credentials,
            https_down: false,
            payload: 5_000_000,
            download_delay: Duration::from_millis(200),
            ping_delay: Duration::from_millis(20),
            ping_fails: false,
            save_fails: false,
            save_delay: Duration::ZERO,
            saved: Mutex::new(Vec::new()),
            heads: Mutex::new(Vec::new()),
        }
    }

    pub fn saved(&self) -> Vec<SaveResultRequest> {
        self.saved.lock().unwrap().clone()
    }

    /// URLs probed with HEAD, in order
    pub fn head_urls(&self) -> Vec<String> {
        self.heads.lock().unwrap().clone()
    }
}

#[async_trait]
impl DiagnosticsApi for FakeApi {
    async fn turn_credentials(&self) -> Result<TurnCredentials, ApiError> {
        self.credentials.clone().ok_or(ApiError::Status(500))
    }

    async fn download_payload(&self) -> Result<usize, ApiError> {
        tokio::time::sleep(self.download_delay).await;
        Ok(self.payload)
    }

    async fn ping(&self) -> Result<(), ApiError> {
        if self.ping_fails {
            return Err(ApiError::Status(502));
        }
        tokio::time::sleep(self.ping_delay).await;
        Ok(())
    }

    async fn head(&self, url: &str) -> Result<u16, ApiError> {
        self.heads.lock().unwrap().push(url.to_string());
        if self.https_down {
            Err(ApiError::Status(503))
        } else {
            Ok(200)
        }
    }

    async fn save_results(&self, request: &SaveResultRequest) -> Result<SavedResult, ApiError> {
        tokio::time::sleep(self.save_delay).await;
        if self.save_fails {
            return Err(ApiError::Status(500));
        }
        let mut saved = self.saved.lock().unwrap();
        saved.push(request.clone());
        Ok(SavedResult {
            id: format!("result-{}", saved.len()),
            timestamp: "2026-03-01T09:30:00Z".to_string(),
        })
    }

    async fn stats(&self) -> Result<ResultStats, ApiError> {
        let saved = self.saved.lock().unwrap();
        let total: f64 = saved.iter().map(|r| r.total_score as f64).sum();
        Ok(ResultStats {
            total_runs: saved.len() as u64,
            average_score: if saved.is_empty() { 0.0 } else { total / saved.len() as f64 },
        })
    }

    async fn fetch_result(&self, id: &str) -> Result<StoredResult, ApiError> {
        let saved = self.saved.lock().unwrap();
        let index = id
            .strip_prefix("result-")
            .and_then(|n| n.parse::<usize>().ok())
            .and_then(|n| n.checked_sub(1))
            .ok_or(ApiError::Status(404))?;
        let request = saved.get(index).ok_or(ApiError::Status(404))?;
        Ok(StoredResult {
            id: id.to_string(),
            organization: request.organization.clone(),
            timestamp: "2026-03-01T09:30:00Z".to_string(),
            total_score: request.total_score,
            rating: request.rating,
            results_json: request.results.clone(),
        })
    }
}
