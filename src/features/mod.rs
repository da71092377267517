//! Per-route feature construction
//!
//! Builds one row per route from a [`Bundle`]:
//! - category one-hots over the categories seen in this run
//! - route-local rate fields, the TCE/OPEX ratio and the West Africa flag
//! - route-matched sentiment aggregates when the news file is route-tagged
//!   (zeros for routes nothing matched)
//! - market prices and macro indicators broadcast to every row
//!
//! [`FeatureTable::align_to`] reconciles a freshly built table with the
//! feature list a model was trained on.


use crate::config::FeatureConfig;
use crate::data::{Bundle, SentimentTable};
use crate::error::Result;
use crate::types::{latest_by_date, MacroRecord, MarketRecord, Route};
use std::collections::BTreeSet;
use tracing::{debug, info};

pub const ROUTE_TYPE_PREFIX: &str = "route_type_";

/// Column-major feature matrix keyed by route code and feature name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    routes: Vec<String>,
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
}

/// What [`FeatureTable::align_to`] had to change
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Alignment {
    /// Expected features absent from the table, filled with 0
    pub filled: Vec<String>,
    /// Table features the model does not know, dropped
    pub dropped: Vec<String>,
}

impl Alignment {
    pub fn is_exact(&self) -> bool {
        self.filled.is_empty() && self.dropped.is_empty()
    }
}

impl FeatureTable {
    pub fn new(routes: Vec<String>) -> Self {
        Self {
            routes,
            names: Vec::new(),
            columns: Vec::new(),
        }
    }

    pub fn routes(&self) -> &[String] {
        &self.routes
    }

    /// Feature names in column order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn width(&self) -> usize {
        self.names.len()
    }

    /// Add a column, or overwrite it in place if the name already exists.
    /// `values` must hold one entry per route.
    pub fn set_column(&mut self, name: &str, values: Vec<f64>) {
        debug_assert_eq!(values.len(), self.routes.len());
        match self.names.iter().position(|n| n == name) {
            Some(idx) => self.columns[idx] = values,
            None => {
                self.names.push(name.to_string());
                self.columns.push(values);
            }
        }
    }

    /// Set the same value on every row
    pub fn broadcast(&mut self, name: &str, value: f64) {
        let values = vec![value; self.routes.len()];
        self.set_column(name, values);
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        let idx = self.names.iter().position(|n| n == name)?;
        Some(&self.columns[idx])
    }

    pub fn value(&self, route: &str, name: &str) -> Option<f64> {
        let row = self.routes.iter().position(|r| r == route)?;
        self.column(name).map(|col| col[row])
    }

    /// Row-major copy of the values, one inner vector per route
    pub fn matrix(&self) -> Vec<Vec<f64>> {
        (0..self.routes.len())
            .map(|row| self.columns.iter().map(|col| col[row]).collect())
            .collect()
    }

    /// Reorder to `expected`, zero-filling missing features and dropping
    /// unknown ones. Never fails.
    pub fn align_to(&self, expected: &[String]) -> (FeatureTable, Alignment) {
        let mut aligned = FeatureTable::new(self.routes.clone());
        let mut alignment = Alignment::default();

        for name in expected {
            match self.column(name) {
                Some(values) => aligned.set_column(name, values.to_vec()),
                None => {
                    alignment.filled.push(name.clone());
                    aligned.broadcast(name, 0.0);
                }
            }
        }

        alignment.dropped = self
            .names
            .iter()
            .filter(|n| !expected.contains(n))
            .cloned()
            .collect();

        (aligned, alignment)
    }
}

/// Normalize a macro metric name into a feature name
pub fn macro_feature_name(metric: &str) -> String {
    metric.trim().to_lowercase().replace(' ', "_")
}

/// Route-level sentiment aggregates
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SentimentStats {
    pub avg: f64,
    pub positive: usize,
    pub negative: usize,
    pub count: usize,
}

/// Builds the per-route feature table
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    config: FeatureConfig,
}

impl FeatureBuilder {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    /// Build features and, when any route carries a last change, the
    /// training target. Fails only when the rate table is absent.
    pub fn build(&self, bundle: &Bundle) -> Result<(FeatureTable, Option<Vec<f64>>)> {
        let routes = bundle.routes()?;
        let mut table = FeatureTable::new(routes.iter().map(|r| r.code.clone()).collect());

        self.add_route_features(&mut table, routes);

        match &bundle.sentiment {
            Some(sentiment) if sentiment.has_route_tags => {
                self.add_sentiment_features(&mut table, routes, sentiment)
            }
            Some(_) => debug!("Sentiment table has no route tags, skipping sentiment features"),
            None => {}
        }
        if let Some(market) = &bundle.market {
            self.add_market_features(&mut table, market);
        }
        if let Some(indicators) = &bundle.indicators {
            self.add_macro_features(&mut table, indicators);
        }

        let target = build_target(routes);

        info!(
            "Built {} features for {} routes{}",
            table.width(),
            table.len(),
            if target.is_some() { " with target" } else { "" }
        );
        Ok((table, target))
    }

    fn add_route_features(&self, table: &mut FeatureTable, routes: &[Route]) {
        let categories: BTreeSet<String> = routes.iter().map(Route::category).collect();
        for category in &categories {
            let values = routes
                .iter()
                .map(|r| if &r.category() == category { 1.0 } else { 0.0 })
                .collect();
            table.set_column(&format!("{}{}", ROUTE_TYPE_PREFIX, category), values);
        }

        let locals: [(&str, fn(&Route) -> Option<f64>); 3] = [
            ("current_tce", |r: &Route| r.current_tce),
            ("current_ws", |r: &Route| r.current_ws),
            ("opex", |r: &Route| r.opex),
        ];
        for (name, field) in locals {
            if routes.iter().any(|r| field(r).is_some()) {
                table.set_column(name, routes.iter().map(|r| field(r).unwrap_or(0.0)).collect());
            }
        }

        if table.column("current_tce").is_some() && table.column("opex").is_some() {
            table.set_column(
                "tce_opex_ratio",
                routes.iter().map(|r| r.tce_opex_ratio().unwrap_or(0.0)).collect(),
            );
        }

        if routes.iter().any(|r| r.nigeria_relevant.is_some()) {
            table.set_column(
                "nigeria_relevant",
                routes
                    .iter()
                    .map(|r| if r.nigeria_relevant == Some(true) { 1.0 } else { 0.0 })
                    .collect(),
            );
        }
    }

    fn add_sentiment_features(&self, table: &mut FeatureTable, routes: &[Route], sentiment: &SentimentTable) {
        let stats: Vec<SentimentStats> = routes
            .iter()
            .map(|r| self.sentiment_stats(sentiment, &r.code))
            .collect();

        table.set_column("avg_sentiment", stats.iter().map(|s| s.avg).collect());
        table.set_column("pos_news_count", stats.iter().map(|s| s.positive as f64).collect());
        table.set_column("neg_news_count", stats.iter().map(|s| s.negative as f64).collect());
        table.set_column("news_count", stats.iter().map(|s| s.count as f64).collect());

        let matched = stats.iter().filter(|s| s.count > 0).count();
        debug!("Sentiment matched {}/{} routes", matched, routes.len());
    }

    /// Aggregate the records tagged with `code`. `count` includes unscored
    /// records; the mean and polarity counts use scored ones only.
    pub fn sentiment_stats(&self, sentiment: &SentimentTable, code: &str) -> SentimentStats {
        let mut count = 0;
        let mut scores = Vec::new();
        for record in sentiment.for_route(code) {
            count += 1;
            scores.extend(record.score);
        }

        let avg = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        };
        SentimentStats {
            avg,
            positive: scores.iter().filter(|s| **s > self.config.positive_threshold).count(),
            negative: scores.iter().filter(|s| **s < self.config.negative_threshold).count(),
            count,
        }
    }

    fn add_market_features(&self, table: &mut FeatureTable, market: &[MarketRecord]) {
        let mut ytd = Vec::new();

        for symbol in &self.config.market_symbols {
            let records: Vec<&MarketRecord> = market.iter().filter(|m| &m.symbol == symbol).collect();
            let Some(latest) = latest_by_date(records.iter().copied(), |m| m.date.as_str()) else {
                continue;
            };
            table.broadcast(&format!("{}_price", symbol), latest.close);

            if let Some(change) = records.iter().find_map(|m| m.ytd_change_pct) {
                ytd.push((symbol, change));
            }
        }

        for (symbol, change) in ytd {
            table.broadcast(&format!("{}_ytd_change", symbol), change);
        }
    }

    fn add_macro_features(&self, table: &mut FeatureTable, indicators: &[MacroRecord]) {
        let mut metrics: Vec<&str> = Vec::new();
        for record in indicators {
            if !metrics.contains(&record.metric.as_str()) {
                metrics.push(&record.metric);
            }
        }

        for metric in metrics {
            let latest = latest_by_date(
                indicators.iter().filter(|r| r.metric == metric),
                |r| r.date.as_str(),
            );
            if let Some(record) = latest {
                table.broadcast(&macro_feature_name(metric), record.value);
            }
        }
    }
}

/// Last change per route, zero-filled; `None` when no route has one
fn build_target(routes: &[Route]) -> Option<Vec<f64>> {
    if routes.iter().all(|r| r.last_change.is_none()) {
        return None;
    }
    Some(routes.iter().map(|r| r.last_change.unwrap_or(0.0)).collect())
}
