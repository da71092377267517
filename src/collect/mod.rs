//! Live data collection
//!
//! Each collector writes one input table into the data directory. Failures
//! of optional collectors are logged by the orchestrator and the source is
//! treated as absent.

pub mod feed;
pub mod news;
pub mod rates;
pub mod retry;

#[cfg(test)]
mod tests;

pub use feed::{FeedClient, MacroFeedCollector, MarketFeedCollector};
pub use news::NewsFeedCollector;
pub use rates::RateTableCollector;
pub use retry::{FetchError, RetryPolicy};

use crate::context::RunContext;
use crate::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

/// Input table a collector produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Rates,
    Market,
    Indicators,
    News,
}

impl SourceKind {
    /// Only the rate table is mandatory
    pub fn is_mandatory(&self) -> bool {
        matches!(self, SourceKind::Rates)
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Rates => write!(f, "rates"),
            SourceKind::Market => write!(f, "market"),
            SourceKind::Indicators => write!(f, "indicators"),
            SourceKind::News => write!(f, "news"),
        }
    }
}

/// Fetches one source and writes its table
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceCollector: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Write the table; `Ok(None)` when the source yielded nothing
    async fn collect(&self, ctx: &RunContext) -> Result<Option<PathBuf>>;
}

/// Which optional sources to leave out of a live run
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SourceSkips {
    pub market: bool,
    pub indicators: bool,
    pub news: bool,
}

impl SourceSkips {
    pub fn skips(&self, kind: SourceKind) -> bool {
        match kind {
            SourceKind::Rates => false,
            SourceKind::Market => self.market,
            SourceKind::Indicators => self.indicators,
            SourceKind::News => self.news,
        }
    }
}

/// Collectors for every configured source that is not skipped. Feeds
/// without an endpoint are left out.
pub fn configured_collectors(ctx: &RunContext, skips: SourceSkips) -> Result<Vec<Box<dyn SourceCollector>>> {
    let collection = &ctx.config.collection;
    let mut collectors: Vec<Box<dyn SourceCollector>> =
        vec![Box::new(RateTableCollector::new(ctx.config.routes.clone()))];

    if !skips.market {
        match &collection.market {
            Some(feed) => collectors.push(Box::new(MarketFeedCollector::new(
                FeedClient::from_context(feed, ctx)?,
                collection.market_symbols.clone(),
            ))),
            None => info!("No market feed configured"),
        }
    }

    if !skips.indicators {
        match &collection.indicators {
            Some(feed) => collectors.push(Box::new(MacroFeedCollector::new(
                FeedClient::from_context(feed, ctx)?,
                collection.macro_indicators.clone(),
                collection.indicator_limit,
            ))),
            None => info!("No indicator feed configured"),
        }
    }

    if !skips.news {
        match &collection.news {
            Some(feed) => collectors.push(Box::new(NewsFeedCollector::new(
                FeedClient::from_context(feed, ctx)?,
                collection.news_topics.clone(),
                collection.news_days_back,
                ctx.config.routes.clone(),
            )?)),
            None => info!("No news feed configured"),
        }
    }

    Ok(collectors)
}
