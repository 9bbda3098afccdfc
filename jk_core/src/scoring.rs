//! Score calculation
//!
//! A pure function of the results ledger: per-layer weighted averages,
//! combined with fixed layer weights, capped when a critical test failed.

use crate::types::result::{Layer, TestResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Coarse outcome band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Green,
    Yellow,
    Red,
}

impl Rating {
    pub fn from_score(score: u8) -> Self {
        match score {
            80.. => Rating::Green,
            40..=79 => Rating::Yellow,
            _ => Rating::Red,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Rating::Green => "green",
            Rating::Yellow => "yellow",
            Rating::Red => "red",
        }
    }

    pub fn verdict(self) -> &'static str {
        match self {
            Rating::Green => "Ready for Jitsi meetings",
            Rating::Yellow => "Limited connectivity",
            Rating::Red => "Blocked - changes required",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Rating::Green => {
                "Your network is compatible with Jitsi. Video meetings should work without problems."
            }
            Rating::Yellow => {
                "Jitsi works through fallback paths, but some features may be limited. See the recommendations below."
            }
            Rating::Red => {
                "Your network blocks critical connections. Video meetings will not work. Share the whitelist with your IT department."
            }
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layer weights and the critical-fail cap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringPolicy {
    pub layer_weights: BTreeMap<u8, f64>,
    pub critical_cap: f64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            layer_weights: BTreeMap::from([(1, 0.10), (2, 0.35), (3, 0.25), (4, 0.20), (5, 0.10)]),
            critical_cap: 39.0,
        }
    }
}

impl ScoringPolicy {
    pub fn layer_weight(&self, layer: Layer) -> f64 {
        self.layer_weights.get(&layer.number()).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreData {
    pub total_score: u8,
    pub rating: Rating,
    pub verdict: String,
    pub description: String,
    /// Score 0-100 of each layer that has results
    pub layer_details: BTreeMap<u8, f64>,
    pub has_critical_fail: bool,
}

pub fn calculate_score(results: &[TestResult]) -> ScoreData {
    calculate_score_with(results, &ScoringPolicy::default())
}

pub fn calculate_score_with(results: &[TestResult], policy: &ScoringPolicy) -> ScoreData {
    // layer -> (weighted score sum, weight sum)
    let mut layers: BTreeMap<Layer, (f64, f64)> = BTreeMap::new();
    let mut has_critical_fail = false;

    for r in results {
        let weight = r.category.weight();
        let entry = layers.entry(r.layer).or_insert((0.0, 0.0));
        entry.0 += r.status.score() * weight;
        entry.1 += weight;
        has_critical_fail |= r.is_critical_fail();
    }

    let mut total = 0.0;
    let mut layer_details = BTreeMap::new();
    for (layer, (sum, weight)) in layers {
        let layer_score = if weight > 0.0 { sum / weight * 100.0 } else { 0.0 };
        layer_details.insert(layer.number(), layer_score);
        total += layer_score * policy.layer_weight(layer);
    }

    if has_critical_fail && total > policy.critical_cap {
        total = policy.critical_cap;
    }

    let total_score = total.round().clamp(0.0, 100.0) as u8;
    let rating = Rating::from_score(total_score);

    ScoreData {
        total_score,
        rating,
        verdict: rating.verdict().to_string(),
        description: rating.description().to_string(),
        layer_details,
        has_critical_fail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TestCatalog;
    use crate::types::result::{Status, TestDefinition};

    fn all_with(status_for: impl Fn(&TestDefinition) -> Status) -> Vec<TestResult> {
        TestCatalog::standard()
            .iter()
            .map(|(layer, def)| TestResult::new(layer, def, status_for(def), ""))
            .collect()
    }

    #[test]
    fn test_all_pass_is_green_100() {
        let score = calculate_score(&all_with(|_| Status::Pass));
        assert_eq!(score.total_score, 100);
        assert_eq!(score.rating, Rating::Green);
        assert!(!score.has_critical_fail);
        assert!(score.layer_details.values().all(|s| (*s - 100.0).abs() < f64::EPSILON));
    }

    #[test]
    fn test_all_fail_layer_is_zero() {
        let score = calculate_score(&all_with(|_| Status::Fail));
        assert_eq!(score.total_score, 0);
        assert_eq!(score.layer_details[&3], 0.0);
        assert_eq!(score.rating, Rating::Red);
    }

    #[test]
    fn test_critical_fail_caps_score() {
        // Only STUN fails; everything else passes
        let results = all_with(|d| if d.id == "stun" { Status::Fail } else { Status::Pass });
        let score = calculate_score(&results);
        assert!(score.has_critical_fail);
        assert_eq!(score.total_score, 39);
        assert_eq!(score.rating, Rating::Red);
    }

    #[test]
    fn test_weighted_layer_score() {
        // Layer 1: critical pass (2.0), important warn (0.75 of 1.5), nice fail (0 of 1.0)
        let results = all_with(|d| match d.id.as_str() {
            "camera-mic" => Status::Warn,
            "device-enum" => Status::Fail,
            _ => Status::Pass,
        });
        let score = calculate_score(&results);
        let expected = (2.0 + 0.75) / 4.5 * 100.0;
        assert!((score.layer_details[&1] - expected).abs() < 1e-9);
        // 100 - 0.10 * (100 - 61.1) = 96.1
        assert_eq!(score.total_score, 96);
    }

    #[test]
    fn test_missing_layers_contribute_nothing() {
        let results: Vec<TestResult> = all_with(|_| Status::Pass)
            .into_iter()
            .filter(|r| r.layer == Layer::NETWORK)
            .collect();
        let score = calculate_score(&results);
        assert_eq!(score.total_score, 35);
        assert_eq!(score.layer_details.keys().copied().collect::<Vec<_>>(), vec![2]);
        assert_eq!(score.rating, Rating::Red);
    }

    #[test]
    fn test_rating_bands() {
        assert_eq!(Rating::from_score(100), Rating::Green);
        assert_eq!(Rating::from_score(80), Rating::Green);
        assert_eq!(Rating::from_score(79), Rating::Yellow);
        assert_eq!(Rating::from_score(40), Rating::Yellow);
        assert_eq!(Rating::from_score(39), Rating::Red);
        assert_eq!(Rating::from_score(0), Rating::Red);
    }

    #[test]
    fn test_deterministic() {
        let results = all_with(|d| if d.id.starts_with("turn") { Status::Warn } else { Status::Pass });
        assert_eq!(calculate_score(&results), calculate_score(&results));
    }

    #[test]
    fn test_custom_policy() {
        let policy = ScoringPolicy {
            layer_weights: BTreeMap::from([(2, 1.0)]),
            critical_cap: 10.0,
        };
        let results = all_with(|d| if d.id == "webrtc-support" { Status::Fail } else { Status::Pass });
        let score = calculate_score_with(&results, &policy);
        assert_eq!(score.total_score, 10);
    }
}
