//! JSON-over-HTTP feeds for market prices and macro indicators

use super::retry::{FetchError, RetryPolicy};
use super::{SourceCollector, SourceKind};
use crate::config::{FeedConfig, IndicatorSeed};
use crate::context::RunContext;
use crate::data::tables::{self, MacroRow, MarketRow};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Market segment for a ticker, `other` when unknown
pub fn symbol_category(symbol: &str) -> &'static str {
    const CATEGORIES: &[(&str, &[&str])] = &[
        ("tanker", &["FRO", "STNG", "NAT", "TK"]),
        ("lng", &["GLNG"]),
        ("drybulk", &["SBLK", "GOGL", "NMM"]),
        ("container", &["GSL", "DAC"]),
        ("oil", &["CL=F", "BZ=F", "HO=F"]),
        ("metals", &["GC=F", "SI=F"]),
        ("majors", &["SHEL.L", "BP"]),
        ("index", &["BDRY"]),
    ];
    CATEGORIES
        .iter()
        .find(|(_, symbols)| symbols.contains(&symbol))
        .map(|(category, _)| *category)
        .unwrap_or("other")
}

/// HTTP client for one configured feed
#[derive(Clone)]
pub struct FeedClient {
    http: Client,
    url: String,
    api_key: Option<String>,
    retry: RetryPolicy,
}

impl FeedClient {
    pub fn new(feed: &FeedConfig, retry: RetryPolicy, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: feed.url.trim_end_matches('/').to_string(),
            api_key: feed.api_key.clone(),
            retry,
        })
    }

    pub fn from_context(feed: &FeedConfig, ctx: &RunContext) -> Result<Self> {
        Self::new(
            feed,
            RetryPolicy::from(&ctx.config.collection.retry),
            Duration::from_secs(ctx.config.collection.request_timeout_secs),
        )
    }

    async fn get_once<T: DeserializeOwned>(&self, query: &[(&str, String)]) -> std::result::Result<T, FetchError> {
        let mut request = self.http.get(&self.url).query(query);
        if let Some(key) = &self.api_key {
            request = request.query(&[("apikey", key)]);
        }

        let resp = request.send().await?;
        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        resp.json().await.map_err(|e| FetchError::Decode(e.to_string()))
    }

    /// GET with retry; `None` once the retry policy gives up
    pub async fn get<T: DeserializeOwned>(&self, label: &str, query: &[(&str, String)]) -> Option<T> {
        self.retry.run(label, || self.get_once(query)).await
    }
}

/// One close observation from the market feed
#[derive(Debug, Clone, Deserialize)]
pub struct PricePoint {
    pub date: String,
    pub close: f64,
}

/// Latest close this year over last year's mean close, as a percentage
pub fn ytd_change_pct(this_year: &[PricePoint], last_year: &[PricePoint]) -> Option<f64> {
    let latest = crate::types::latest_by_date(this_year, |p| p.date.as_str())?.close;
    if last_year.is_empty() {
        return None;
    }
    let avg = last_year.iter().map(|p| p.close).sum::<f64>() / last_year.len() as f64;
    if avg == 0.0 {
        return None;
    }
    Some((latest / avg - 1.0) * 100.0)
}

/// Writes the market table from a per-symbol price feed
pub struct MarketFeedCollector {
    client: FeedClient,
    symbols: Vec<String>,
}

impl MarketFeedCollector {
    pub fn new(client: FeedClient, symbols: Vec<String>) -> Self {
        Self { client, symbols }
    }

    async fn fetch_range(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Vec<PricePoint> {
        let query = [
            ("symbol", symbol.to_string()),
            ("start", start.format("%Y-%m-%d").to_string()),
            ("end", end.format("%Y-%m-%d").to_string()),
        ];
        self.client
            .get(&format!("market {}", symbol), &query)
            .await
            .unwrap_or_default()
    }
}

#[async_trait]
impl SourceCollector for MarketFeedCollector {
    fn kind(&self) -> SourceKind {
        SourceKind::Market
    }

    async fn collect(&self, ctx: &RunContext) -> Result<Option<PathBuf>> {
        let today = ctx.started_at.date_naive();
        let year = today.year();
        let (Some(year_start), Some(last_start), Some(last_end)) = (
            NaiveDate::from_ymd_opt(year, 1, 1),
            NaiveDate::from_ymd_opt(year - 1, 1, 1),
            NaiveDate::from_ymd_opt(year - 1, 12, 31),
        ) else {
            return Ok(None);
        };

        let mut rows = Vec::new();
        for symbol in &self.symbols {
            let this_year = self.fetch_range(symbol, year_start, today).await;
            if this_year.is_empty() {
                warn!("No market data returned for {}", symbol);
                continue;
            }
            let last_year = self.fetch_range(symbol, last_start, last_end).await;
            let ytd = ytd_change_pct(&this_year, &last_year);

            rows.extend(this_year.into_iter().map(|p| MarketRow {
                date: Some(p.date),
                close: Some(p.close),
                symbol: symbol.clone(),
                category: Some(symbol_category(symbol).to_string()),
                ytd_change_pct: ytd,
            }));
        }

        if rows.is_empty() {
            warn!("Market feed returned no data");
            return Ok(None);
        }

        let path = ctx.market_path();
        tables::write_rows(&path, &rows)?;
        info!("Saved {} market rows to {}", rows.len(), path.display());
        Ok(Some(path))
    }
}

/// Envelope returned by the indicator feed
#[derive(Debug, Clone, Deserialize)]
pub struct IndicatorResponse {
    #[serde(default)]
    pub data: Vec<IndicatorPoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndicatorPoint {
    pub date: String,
    /// Numeric, or a string that may hold a placeholder such as "."
    pub value: serde_json::Value,
}

impl IndicatorPoint {
    pub fn numeric(&self) -> Option<f64> {
        match &self.value {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Writes the combined macro table from an indicator feed
pub struct MacroFeedCollector {
    client: FeedClient,
    indicators: Vec<IndicatorSeed>,
    limit: usize,
}

impl MacroFeedCollector {
    pub fn new(client: FeedClient, indicators: Vec<IndicatorSeed>, limit: usize) -> Self {
        Self {
            client,
            indicators,
            limit,
        }
    }
}

/// Rows for one indicator, keeping the first `limit` observations
pub fn indicator_rows(seed: &IndicatorSeed, points: &[IndicatorPoint], limit: usize, retrieved: &str) -> Vec<MacroRow> {
    points
        .iter()
        .take(limit)
        .map(|p| MacroRow {
            date: Some(p.date.clone()),
            value: p.numeric(),
            metric: seed.metric.clone(),
            retrieved_date: Some(retrieved.to_string()),
        })
        .collect()
}

#[async_trait]
impl SourceCollector for MacroFeedCollector {
    fn kind(&self) -> SourceKind {
        SourceKind::Indicators
    }

    async fn collect(&self, ctx: &RunContext) -> Result<Option<PathBuf>> {
        let retrieved = ctx.run_date();
        let mut rows = Vec::new();

        for seed in &self.indicators {
            let query = [
                ("function", seed.function.clone()),
                ("interval", seed.interval.clone()),
            ];
            let Some(resp) = self
                .client
                .get::<IndicatorResponse>(&format!("indicator {}", seed.metric), &query)
                .await
            else {
                continue;
            };
            if resp.data.is_empty() {
                warn!("No data found for {}", seed.metric);
                continue;
            }
            rows.extend(indicator_rows(seed, &resp.data, self.limit, &retrieved));
        }

        if rows.is_empty() {
            warn!("Indicator feed returned no data");
            return Ok(None);
        }

        let path = ctx.indicators_path();
        tables::write_rows(&path, &rows)?;
        info!("Saved {} indicator rows to {}", rows.len(), path.display());
        Ok(Some(path))
    }
}
