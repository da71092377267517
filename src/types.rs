//! Core domain types shared across pipeline stages

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Number of leading code characters that name a route's market segment
pub const CATEGORY_PREFIX_LEN: usize = 2;

/// A tracked freight lane, loaded from the rate table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Route code (e.g. "TD3C")
    pub code: String,
    pub description: String,
    /// Time-charter-equivalent rate ($/day)
    pub current_tce: Option<f64>,
    /// Worldscale index level
    pub current_ws: Option<f64>,
    /// Daily operating cost
    pub opex: Option<f64>,
    /// Last observed week-over-week TCE change
    pub last_change: Option<f64>,
    /// Lane touches West African ports; `None` when the rate table has no flag
    #[serde(default)]
    pub nigeria_relevant: Option<bool>,
}

impl Route {
    /// Market segment derived from the code prefix ("TD" dirty, "TC" clean)
    pub fn category(&self) -> String {
        self.code.chars().take(CATEGORY_PREFIX_LEN).collect()
    }

    /// TCE over OPEX, when both are known and OPEX is non-zero
    pub fn tce_opex_ratio(&self) -> Option<f64> {
        match (self.current_tce, self.opex) {
            (Some(tce), Some(opex)) if opex != 0.0 => Some(tce / opex),
            _ => None,
        }
    }
}

/// A scored news article, optionally tied to a route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentRecord {
    pub topic: String,
    pub source: String,
    pub published_at: Option<String>,
    pub title: String,
    pub raw_text: String,
    pub clean_text: String,
    pub url: String,
    /// Compound sentiment in [-1, 1]
    pub score: Option<f64>,
    /// Route code, empty when unmatched
    pub route_tag: String,
}

impl SentimentRecord {
    pub fn is_matched(&self) -> bool {
        !self.route_tag.is_empty()
    }
}

/// A closing price observation for a market symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRecord {
    pub symbol: String,
    pub date: String,
    pub close: f64,
    pub category: Option<String>,
    pub ytd_change_pct: Option<f64>,
}

/// A macro indicator observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroRecord {
    pub metric: String,
    pub date: String,
    pub value: f64,
}

/// Parse the leading `YYYY-MM-DD` of a date or timestamp string
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let head = raw.trim().get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// Pick the latest item by date, keeping the first one on ties.
/// Items whose date does not parse sort before every dated item.
pub fn latest_by_date<'a, T>(
    items: impl IntoIterator<Item = &'a T>,
    date_of: impl Fn(&T) -> &str,
) -> Option<&'a T>
where
    T: 'a,
{
    let mut best: Option<(&T, Option<NaiveDate>)> = None;
    for item in items {
        let date = parse_date(date_of(item));
        let newer = match best {
            Some((_, best_date)) => date > best_date,
            None => true,
        };
        if newer {
            best = Some((item, date));
        }
    }
    best.map(|(item, _)| item)
}

/// Confidence bucket for a prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    /// Low below 60, Medium from 60 to 80, High above 80
    pub fn from_score(confidence: f64) -> Self {
        if confidence < 60.0 {
            ConfidenceLevel::Low
        } else if confidence <= 80.0 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::High
        }
    }
}

impl std::fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfidenceLevel::Low => write!(f, "Low"),
            ConfidenceLevel::Medium => write!(f, "Medium"),
            ConfidenceLevel::High => write!(f, "High"),
        }
    }
}

/// Direction of a predicted rate change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Improving,
    Declining,
}

impl Trend {
    pub fn from_change(change: f64) -> Self {
        if change > 0.0 {
            Trend::Improving
        } else {
            Trend::Declining
        }
    }
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trend::Improving => write!(f, "Improving"),
            Trend::Declining => write!(f, "Declining"),
        }
    }
}

/// Predicted rate change for one route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    #[serde(rename = "Route")]
    pub route: String,
    #[serde(rename = "Predicted_Change")]
    pub predicted_change: f64,
    #[serde(rename = "Lower_Bound")]
    pub lower_bound: f64,
    #[serde(rename = "Upper_Bound")]
    pub upper_bound: f64,
    /// Percentage in [0, 100]
    #[serde(rename = "Confidence")]
    pub confidence: f64,
    #[serde(rename = "Confidence_Level")]
    pub confidence_level: ConfidenceLevel,
    #[serde(rename = "Trend")]
    pub trend: Trend,
    #[serde(rename = "Prediction_Date")]
    pub prediction_date: String,
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
    #[serde(rename = "Current_TCE", default)]
    pub current_tce: Option<f64>,
    #[serde(rename = "Predicted_TCE", default)]
    pub predicted_tce: Option<f64>,
    #[serde(rename = "Last_Change", default)]
    pub last_change: Option<f64>,
}

impl Prediction {
    pub fn band_width(&self) -> f64 {
        self.upper_bound - self.lower_bound
    }
}
