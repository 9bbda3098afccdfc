//! Core data model for the Jitsi connectivity diagnostics.
//!
//! Everything in this crate is free of I/O: the test catalog, the per-run
//! results ledger, the scoring and recommendation engines, and the wire
//! payloads exchanged with the diagnostics backend.

pub mod types;
pub mod catalog;
pub mod ledger;
pub mod scoring;
pub mod recommendations;

pub use catalog::{CatalogError, LayerDefinitions, TestCatalog};
pub use ledger::{Ledger, LedgerError};
pub use recommendations::{get_recommendations, Advice, Recommendation, RecommendationTable, Severity};
pub use scoring::{calculate_score, calculate_score_with, Rating, ScoreData, ScoringPolicy};
pub use types::result::{aggregate_status, Category, Layer, Status, TestDefinition, TestResult};
