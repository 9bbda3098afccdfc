//! Result persistence payloads (`/results` endpoints)

use crate::scoring::Rating;
use crate::types::result::TestResult;
use serde::{Deserialize, Serialize};

/// Body of `POST /results`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResultRequest {
    pub organization: Option<String>,
    pub total_score: u8,
    pub rating: Rating,
    pub results: Vec<TestResult>,
}

/// Response of `POST /results`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedResult {
    pub id: String,
    pub timestamp: String,
}

/// Response of `GET /results/stats`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultStats {
    pub total_runs: u64,
    pub average_score: f64,
}

/// Stored run as returned by `GET /results/:id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResult {
    pub id: String,
    #[serde(default)]
    pub organization: Option<String>,
    pub timestamp: String,
    pub total_score: u8,
    pub rating: Rating,
    pub results_json: Vec<TestResult>,
}
