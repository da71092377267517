//! Freight Rate Forecasting Pipeline
//!
//! Predicts the next week-over-week change in time-charter-equivalent rates
//! for a set of tanker routes and writes a weekly market summary.
//!
//! ## Architecture
//!
//! ```text
//! Collectors (rates, market, macro, news) ──→ CSV tables in data dir
//!                                                  ↓
//!                         DataAggregator → FeatureBuilder → ModelTrainer
//!                                                  ↓               ↓
//!                                         PredictionService ← model artifact
//!                                                  ↓
//!                          route_predictions.csv + run metadata → Report
//! ```
//!
//! [`pipeline::PipelineOrchestrator`] sequences the stages for one
//! [`context::RunContext`].

pub mod collect;
pub mod config;
pub mod context;
pub mod data;
pub mod error;
pub mod features;
pub mod logging;
pub mod ml;
pub mod pipeline;
pub mod report;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;
