//! Plain-text weekly summary

use super::{MarketAnalysis, ReportGenerator, ReportInput, RunMetadata};
use crate::context::RunContext;
use crate::data::load_rates;
use crate::error::{PipelineError, Result};
use crate::ml::artifact::METRICS_FILE;
use crate::ml::{PredictionTable, TrainingMetrics};
use crate::types::Route;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Routes listed under recent TCE movers
const TOP_MOVERS: usize = 4;

pub const DEFAULT_REPORT_NAME: &str = "freight_weekly_summary.txt";

/// Writes a text summary of the latest results to the reports directory
#[derive(Debug, Clone, Default)]
pub struct SummaryReport;

impl SummaryReport {
    pub fn new() -> Self {
        Self
    }

    fn render(&self, ctx: &RunContext, input: &ReportInput) -> String {
        let predictions = read_optional(&ctx.predictions_path(), "predictions", PredictionTable::read_csv);
        let metadata = read_optional(&ctx.metadata_path(), "run metadata", RunMetadata::read);
        let metrics = metadata
            .as_ref()
            .and_then(|m| m.model_metrics.clone())
            .or_else(|| read_optional(&ctx.paths.models_dir.join(METRICS_FILE), "model metrics", read_json::<TrainingMetrics>));
        let analysis = match (&metadata, &predictions) {
            (Some(m), _) => m.market_analysis.clone(),
            (None, Some(p)) => MarketAnalysis::analyze(p),
            (None, None) => MarketAnalysis::default(),
        };
        let routes = read_optional(&ctx.rates_path(), "rate table", load_rates);

        let mut lines = vec![
            "Freight Market Weekly Summary".to_string(),
            format!("Generated: {}", ctx.started_at.format("%d %B %Y")),
            format!("Run: {}", ctx.run_id),
            String::new(),
            "== Pipeline ==".to_string(),
            input.outcome_table.trim_end().to_string(),
            if input.model_fresh {
                "Model: trained this run".to_string()
            } else {
                "Model: not retrained this run".to_string()
            },
            String::new(),
        ];

        lines.push("== Market analysis ==".to_string());
        lines.push(format!(
            "Trend: {} ({}% of routes improving)",
            analysis.market_trend, analysis.trend_percentage
        ));
        lines.push(format!("Volatility: {}", analysis.volatility_level));
        if let Some(route) = &analysis.featured_route {
            lines.push(format!("Featured route: {}", route));
        }
        lines.extend(analysis.key_insights.iter().map(|i| format!("  - {}", i)));
        lines.push(String::new());

        lines.push("== Predictions ==".to_string());
        match predictions.as_ref().filter(|p| !p.is_empty()) {
            Some(table) => {
                lines.push(format!(
                    "{:<8} {:>12} {:>24} {:>11} {:<10}",
                    "Route", "Change", "Range", "Confidence", "Trend"
                ));
                lines.extend(table.iter().map(|p| {
                    format!(
                        "{:<8} {:>12.0} {:>24} {:>10.0}% {:<10}",
                        p.route,
                        p.predicted_change,
                        format!("[{:.0}, {:.0}]", p.lower_bound, p.upper_bound),
                        p.confidence,
                        p.trend
                    )
                }));
                if let Some(date) = table.iter().next().map(|p| p.prediction_date.as_str()) {
                    lines.push(format!("Predictions dated {}", date));
                }
            }
            None => lines.push("No predictions available".to_string()),
        }
        lines.push(String::new());

        if let Some(routes) = routes {
            lines.push("== Largest recent TCE changes ==".to_string());
            lines.extend(top_movers(&routes).iter().map(|r| {
                format!(
                    "{:<8} {:>8.0} $/day  {}",
                    r.code,
                    r.last_change.unwrap_or_default(),
                    r.description
                )
            }));
            lines.push(String::new());
        }

        lines.push("== Model ==".to_string());
        match metrics {
            Some(m) => {
                lines.push(format!("MAE {:.2}  RMSE {:.2}  R2 {:.3}", m.mae, m.rmse, m.r2));
                lines.push(format!(
                    "Trained {} on {} rows with {} features",
                    m.training_date, m.data_points, m.features
                ));
            }
            None => lines.push("No model metrics available".to_string()),
        }

        lines.join("\n") + "\n"
    }
}

impl ReportGenerator for SummaryReport {
    fn generate(&self, ctx: &RunContext, input: &ReportInput) -> Result<PathBuf> {
        let name = if input.output_name.is_empty() {
            DEFAULT_REPORT_NAME
        } else {
            input.output_name.as_str()
        };
        let path = ctx.paths.reports_dir.join(name);

        let body = self.render(ctx, input);
        std::fs::create_dir_all(&ctx.paths.reports_dir)
            .and_then(|_| std::fs::write(&path, body))
            .map_err(|e| PipelineError::ReportGeneration(format!("{}: {}", path.display(), e)))?;

        info!("Report written to {}", path.display());
        Ok(path)
    }
}

/// Routes with the largest last change, descending
fn top_movers(routes: &[Route]) -> Vec<&Route> {
    let mut sorted: Vec<&Route> = routes.iter().filter(|r| r.last_change.is_some()).collect();
    sorted.sort_by(|a, b| {
        b.last_change
            .unwrap_or_default()
            .total_cmp(&a.last_change.unwrap_or_default())
    });
    sorted.truncate(TOP_MOVERS);
    sorted
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn read_optional<T>(path: &Path, label: &str, reader: fn(&Path) -> Result<T>) -> Option<T> {
    if !path.exists() {
        warn!("No {} found at {}", label, path.display());
        return None;
    }
    match reader(path) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Could not read {} from {}: {}", label, path.display(), e);
            None
        }
    }
}
