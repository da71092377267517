//! Rate table from the configured route list

use super::{SourceCollector, SourceKind};
use crate::config::RouteSeed;
use crate::context::RunContext;
use crate::data::tables::{self, RateRow};
use crate::error::{PipelineError, Result};
use crate::types::CATEGORY_PREFIX_LEN;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

/// Port and region names that flag a lane as West Africa relevant
const WEST_AFRICA_KEYWORDS: &[&str] = &["nigeria", "west africa", "lagos", "lome", "dar es salaam"];

pub fn is_west_africa_relevant(description: &str) -> bool {
    let lower = description.to_lowercase();
    WEST_AFRICA_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Standardize route seeds into rate table rows
pub fn rate_rows(routes: &[RouteSeed], processed_date: &str) -> Vec<RateRow> {
    routes
        .iter()
        .map(|seed| RateRow {
            route: seed.code.clone(),
            description: Some(seed.description.clone()),
            worldscale: seed.worldscale,
            tce: seed.tce,
            change: seed.change,
            opex: seed.opex,
            processed_date: Some(processed_date.to_string()),
            route_type: Some(seed.code.chars().take(CATEGORY_PREFIX_LEN).collect()),
            nigeria_relevant: Some(is_west_africa_relevant(&seed.description)),
        })
        .collect()
}

/// Writes the rate table from configuration
pub struct RateTableCollector {
    routes: Vec<RouteSeed>,
}

impl RateTableCollector {
    pub fn new(routes: Vec<RouteSeed>) -> Self {
        Self { routes }
    }
}

#[async_trait]
impl SourceCollector for RateTableCollector {
    fn kind(&self) -> SourceKind {
        SourceKind::Rates
    }

    async fn collect(&self, ctx: &RunContext) -> Result<Option<PathBuf>> {
        if self.routes.is_empty() {
            return Err(PipelineError::Configuration("no routes configured".into()));
        }

        let rows = rate_rows(&self.routes, &ctx.run_date());
        let path = ctx.rates_path();
        tables::write_rows(&path, &rows)?;
        info!("Saved {} routes to {}", rows.len(), path.display());
        Ok(Some(path))
    }
}
