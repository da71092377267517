//! Input aggregation
//!
//! Loads the rate, market, sentiment and macro tables into a [`Bundle`].
//! Every slot loads independently:
//! - a missing optional table is logged and left empty
//! - a missing rate table leaves `rates` empty; stages that need routes
//!   fail through [`Bundle::routes`]

pub mod tables;

#[cfg(test)]
mod tests;

use crate::context::RunContext;
use crate::error::{PipelineError, Result};
use crate::types::{MacroRecord, MarketRecord, Route, SentimentRecord};
use std::path::{Path, PathBuf};
use tables::{MacroRow, MarketRow, RateRow, SentimentRow};
use tracing::{debug, error, info, warn};

/// Sentiment rows plus whether the file carries the columns needed for
/// route-level aggregation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SentimentTable {
    pub records: Vec<SentimentRecord>,
    pub has_route_tags: bool,
}

impl SentimentTable {
    /// Records tagged with the given route code
    pub fn for_route<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a SentimentRecord> {
        self.records.iter().filter(move |r| r.route_tag == code)
    }

    pub fn unmatched_count(&self) -> usize {
        self.records.iter().filter(|r| !r.is_matched()).count()
    }
}

/// In-memory view of all inputs for one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bundle {
    pub rates: Option<Vec<Route>>,
    pub market: Option<Vec<MarketRecord>>,
    pub sentiment: Option<SentimentTable>,
    pub indicators: Option<Vec<MacroRecord>>,
}

impl Bundle {
    /// Routes from the rate table; its absence is a configuration error
    pub fn routes(&self) -> Result<&[Route]> {
        self.rates
            .as_deref()
            .ok_or_else(|| PipelineError::Configuration("rate table not loaded".into()))
    }

    /// Names of the sources that loaded
    pub fn available_sources(&self) -> Vec<&'static str> {
        let mut sources = Vec::new();
        if self.rates.is_some() {
            sources.push("rates");
        }
        if self.market.is_some() {
            sources.push("market");
        }
        if self.sentiment.is_some() {
            sources.push("sentiment");
        }
        if self.indicators.is_some() {
            sources.push("indicators");
        }
        sources
    }
}

/// Reads the four input tables from the data directory
#[derive(Debug, Clone)]
pub struct DataAggregator {
    rates_path: PathBuf,
    market_path: PathBuf,
    sentiment_path: PathBuf,
    indicators_path: PathBuf,
}

impl DataAggregator {
    pub fn new(ctx: &RunContext) -> Self {
        Self {
            rates_path: ctx.rates_path(),
            market_path: ctx.market_path(),
            sentiment_path: ctx.sentiment_path(),
            indicators_path: ctx.indicators_path(),
        }
    }

    /// Load every table that is present. Never fails; absent or unreadable
    /// tables leave their slot empty.
    pub fn load(&self) -> Bundle {
        let rates = match load_slot("rates", &self.rates_path, load_rates) {
            Some(rates) => Some(rates),
            None => {
                error!("Rate table unavailable: {}", self.rates_path.display());
                None
            }
        };

        let bundle = Bundle {
            rates,
            market: load_slot("market", &self.market_path, load_market),
            sentiment: load_slot("sentiment", &self.sentiment_path, load_sentiment),
            indicators: load_slot("indicators", &self.indicators_path, load_indicators),
        };

        info!("Loaded sources: {}", bundle.available_sources().join(", "));
        bundle
    }
}

fn load_slot<T>(label: &str, path: &Path, loader: fn(&Path) -> Result<T>) -> Option<T> {
    if !path.exists() {
        warn!("{} data file not found: {}", label, path.display());
        return None;
    }

    match loader(path) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Failed to read {} data from {}: {}", label, path.display(), e);
            None
        }
    }
}

/// Load the rate table into routes
pub fn load_rates(path: &Path) -> Result<Vec<Route>> {
    let rows: Vec<RateRow> = tables::read_rows(path)?;
    let routes: Vec<Route> = rows
        .into_iter()
        .map(Route::from)
        .filter(|r| !r.code.is_empty())
        .collect();
    debug!("Loaded {} routes", routes.len());
    Ok(routes)
}

pub fn load_market(path: &Path) -> Result<Vec<MarketRecord>> {
    let rows: Vec<MarketRow> = tables::read_rows(path)?;
    let total = rows.len();
    let records: Vec<MarketRecord> = rows.into_iter().filter_map(MarketRow::into_record).collect();
    if records.len() < total {
        debug!("Dropped {} market rows without a close price", total - records.len());
    }
    Ok(records)
}

pub fn load_sentiment(path: &Path) -> Result<SentimentTable> {
    let headers = tables::read_headers(path)?;
    let has_route_tags = headers.iter().any(|h| h == tables::ROUTE_TAG_COLUMN)
        && headers.iter().any(|h| h == tables::SENTIMENT_SCORE_COLUMN);
    if !has_route_tags {
        warn!(
            "Sentiment file lacks {} or {} column, route sentiment disabled",
            tables::ROUTE_TAG_COLUMN,
            tables::SENTIMENT_SCORE_COLUMN
        );
    }

    let rows: Vec<SentimentRow> = tables::read_rows(path)?;
    let table = SentimentTable {
        records: rows.into_iter().map(SentimentRecord::from).collect(),
        has_route_tags,
    };
    if has_route_tags {
        debug!(
            "Loaded {} sentiment records, {} without a route tag",
            table.records.len(),
            table.unmatched_count()
        );
    }
    Ok(table)
}

pub fn load_indicators(path: &Path) -> Result<Vec<MacroRecord>> {
    let rows: Vec<MacroRow> = tables::read_rows(path)?;
    Ok(rows.into_iter().filter_map(MacroRow::into_record).collect())
}
