//! CSV row schemas for the file handoffs
//!
//! Column names match the files other tools write. Every column other than
//! the key is optional, and unparseable numeric cells read as `None`, so a
//! file from an older or newer run with a different column set still loads.

use crate::error::Result;
use crate::types::{MacroRecord, MarketRecord, Route, SentimentRecord};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateRow {
    #[serde(rename = "Route")]
    pub route: String,
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
    #[serde(rename = "Worldscale", default, deserialize_with = "csv::invalid_option")]
    pub worldscale: Option<f64>,
    #[serde(rename = "TCE", default, deserialize_with = "csv::invalid_option")]
    pub tce: Option<f64>,
    #[serde(rename = "Change (TCE)", default, deserialize_with = "csv::invalid_option")]
    pub change: Option<f64>,
    #[serde(rename = "OPEX", default, deserialize_with = "csv::invalid_option")]
    pub opex: Option<f64>,
    #[serde(rename = "ProcessedDate", default)]
    pub processed_date: Option<String>,
    #[serde(rename = "RouteType", default)]
    pub route_type: Option<String>,
    /// Whether the lane touches West African ports
    #[serde(rename = "NigeriaRelevant", default, deserialize_with = "csv::invalid_option")]
    pub nigeria_relevant: Option<bool>,
}

impl From<RateRow> for Route {
    fn from(row: RateRow) -> Self {
        Route {
            code: row.route.trim().to_string(),
            description: row.description.unwrap_or_default(),
            current_tce: row.tce,
            current_ws: row.worldscale,
            opex: row.opex,
            last_change: row.change,
            nigeria_relevant: row.nigeria_relevant,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketRow {
    #[serde(rename = "Date", default)]
    pub date: Option<String>,
    #[serde(rename = "Close", default, deserialize_with = "csv::invalid_option")]
    pub close: Option<f64>,
    #[serde(rename = "Symbol")]
    pub symbol: String,
    #[serde(rename = "Category", default)]
    pub category: Option<String>,
    #[serde(rename = "YTD_Change_Pct", default, deserialize_with = "csv::invalid_option")]
    pub ytd_change_pct: Option<f64>,
}

impl MarketRow {
    /// Rows without a close price carry no information
    pub fn into_record(self) -> Option<MarketRecord> {
        Some(MarketRecord {
            symbol: self.symbol.trim().to_string(),
            date: self.date.unwrap_or_default(),
            close: self.close?,
            category: self.category,
            ytd_change_pct: self.ytd_change_pct,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroRow {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub value: Option<f64>,
    pub metric: String,
    #[serde(default)]
    pub retrieved_date: Option<String>,
}

impl MacroRow {
    pub fn into_record(self) -> Option<MacroRecord> {
        Some(MacroRecord {
            metric: self.metric,
            date: self.date.unwrap_or_default(),
            value: self.value?,
        })
    }
}

/// Column that carries the resolved route tag
pub const ROUTE_TAG_COLUMN: &str = "clean_topic";
pub const SENTIMENT_SCORE_COLUMN: &str = "sentiment_score";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SentimentRow {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub sentiment_score: Option<f64>,
    #[serde(default)]
    pub clean_topic: Option<String>,
    #[serde(default)]
    pub clean_text: Option<String>,
}

impl SentimentRow {
    /// Title, description and content joined the way they were scored
    pub fn raw_text(&self) -> String {
        [&self.title, &self.description, &self.content]
            .iter()
            .filter_map(|part| part.as_deref())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string()
    }
}

impl From<SentimentRow> for SentimentRecord {
    fn from(row: SentimentRow) -> Self {
        let raw_text = row.raw_text();
        SentimentRecord {
            topic: row.topic.unwrap_or_default(),
            source: row.source.unwrap_or_default(),
            published_at: row.date,
            title: row.title.unwrap_or_default(),
            clean_text: row.clean_text.unwrap_or_default(),
            raw_text,
            url: row.url.unwrap_or_default(),
            score: row.sentiment_score,
            route_tag: row.clean_topic.map(|t| t.trim().to_string()).unwrap_or_default(),
        }
    }
}

fn open_reader(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    // Appended files can carry rows shorter or longer than the header
    Ok(csv::ReaderBuilder::new().flexible(true).from_path(path)?)
}

/// Read every row of a CSV file with headers
pub fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = open_reader(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Header names of a CSV file
pub fn read_headers(path: &Path) -> Result<Vec<String>> {
    let mut reader = open_reader(path)?;
    Ok(reader.headers()?.iter().map(|h| h.trim().to_string()).collect())
}

/// Write rows to a CSV file, replacing it
pub fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
