//! Market analysis over one run's predictions

use crate::ml::PredictionTable;
use crate::types::Prediction;
use serde::{Deserialize, Serialize};

/// Predictions above this confidence are preferred for the featured route
const FEATURED_MIN_CONFIDENCE: f64 = 70.0;

/// Added to the mean magnitude so tiny predictions do not inflate the ratio
const VOLATILITY_OFFSET: f64 = 100.0;

pub const INSUFFICIENT_DATA: &str = "Insufficient data for market analysis";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketTrend {
    #[serde(rename = "strongly positive")]
    StronglyPositive,
    #[serde(rename = "moderately positive")]
    ModeratelyPositive,
    #[serde(rename = "neutral")]
    Neutral,
    #[serde(rename = "moderately negative")]
    ModeratelyNegative,
    #[serde(rename = "strongly negative")]
    StronglyNegative,
}

impl MarketTrend {
    pub fn from_improving_pct(pct: u32) -> Self {
        if pct > 65 {
            MarketTrend::StronglyPositive
        } else if pct > 50 {
            MarketTrend::ModeratelyPositive
        } else if pct < 35 {
            MarketTrend::StronglyNegative
        } else if pct < 50 {
            MarketTrend::ModeratelyNegative
        } else {
            MarketTrend::Neutral
        }
    }
}

impl std::fmt::Display for MarketTrend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            MarketTrend::StronglyPositive => "strongly positive",
            MarketTrend::ModeratelyPositive => "moderately positive",
            MarketTrend::Neutral => "neutral",
            MarketTrend::ModeratelyNegative => "moderately negative",
            MarketTrend::StronglyNegative => "strongly negative",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolatilityLevel {
    Low,
    Moderate,
    High,
}

impl VolatilityLevel {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio > 1.5 {
            VolatilityLevel::High
        } else if ratio > 0.8 {
            VolatilityLevel::Moderate
        } else {
            VolatilityLevel::Low
        }
    }
}

impl std::fmt::Display for VolatilityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VolatilityLevel::Low => write!(f, "low"),
            VolatilityLevel::Moderate => write!(f, "moderate"),
            VolatilityLevel::High => write!(f, "high"),
        }
    }
}

/// Market-wide reading of a prediction table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketAnalysis {
    pub market_trend: MarketTrend,
    /// Share of routes predicted to improve, truncated to a whole percent
    pub trend_percentage: u32,
    pub volatility_level: VolatilityLevel,
    /// Code of the route the summary leads with
    #[serde(default)]
    pub featured_route: Option<String>,
    #[serde(default)]
    pub key_insights: Vec<String>,
}

impl Default for MarketAnalysis {
    fn default() -> Self {
        Self {
            market_trend: MarketTrend::Neutral,
            trend_percentage: 50,
            volatility_level: VolatilityLevel::Moderate,
            featured_route: None,
            key_insights: vec![INSUFFICIENT_DATA.to_string()],
        }
    }
}

impl MarketAnalysis {
    pub fn analyze(table: &PredictionTable) -> Self {
        let predictions = &table.predictions;
        if predictions.is_empty() {
            return Self::default();
        }

        let n = predictions.len() as f64;
        let trend_percentage = (table.improving_count() * 100 / predictions.len()) as u32;

        let mean_width = predictions.iter().map(Prediction::band_width).sum::<f64>() / n;
        let mean_magnitude = predictions.iter().map(|p| p.predicted_change.abs()).sum::<f64>() / n;
        let ratio = mean_width / (mean_magnitude + VOLATILITY_OFFSET);

        let featured = featured_route(predictions);

        Self {
            market_trend: MarketTrend::from_improving_pct(trend_percentage),
            trend_percentage,
            volatility_level: VolatilityLevel::from_ratio(ratio),
            featured_route: featured.map(|p| p.route.clone()),
            key_insights: insights(predictions, featured),
        }
    }
}

/// Largest absolute change among confident predictions, else overall.
/// The first prediction wins ties.
pub fn featured_route(predictions: &[Prediction]) -> Option<&Prediction> {
    let largest = |confident_only: bool| {
        predictions
            .iter()
            .filter(|p| !confident_only || p.confidence > FEATURED_MIN_CONFIDENCE)
            .fold(None::<&Prediction>, |best, p| match best {
                Some(b) if b.predicted_change.abs() >= p.predicted_change.abs() => Some(b),
                _ => Some(p),
            })
    };
    largest(true).or_else(|| largest(false))
}

fn insights(predictions: &[Prediction], featured: Option<&Prediction>) -> Vec<String> {
    let mut out = Vec::new();

    let improving = predictions.iter().filter(|p| p.predicted_change > 0.0).count();
    out.push(format!("{} of {} routes expected to improve", improving, predictions.len()));

    if let Some(p) = featured {
        let direction = if p.predicted_change > 0.0 { "increase" } else { "decrease" };
        out.push(format!(
            "{} projected to {} by {:.0} $/day with {:.0}% confidence",
            p.route,
            direction,
            p.predicted_change.abs(),
            p.confidence
        ));
    }

    let top = predictions.iter().max_by(|a, b| a.predicted_change.total_cmp(&b.predicted_change));
    let bottom = predictions.iter().min_by(|a, b| a.predicted_change.total_cmp(&b.predicted_change));
    if let Some(top) = top.filter(|p| p.predicted_change > 0.0) {
        out.push(format!("Strongest gain: {} ({:+.0} $/day)", top.route, top.predicted_change));
    }
    if let Some(bottom) = bottom.filter(|p| p.predicted_change < 0.0) {
        out.push(format!("Weakest route: {} ({:+.0} $/day)", bottom.route, bottom.predicted_change));
    }

    out
}
