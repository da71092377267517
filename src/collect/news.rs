//! News collection, cleaning, scoring and route tagging
//!
//! Articles are fetched per topic, cleaned, scored, tagged with a route
//! code where one can be resolved, and merged into the sentiment table.
//! Merging keeps every existing row and adds only articles with unseen
//! URLs.

use super::feed::FeedClient;
use super::{SourceCollector, SourceKind};
use crate::config::RouteSeed;
use crate::context::RunContext;
use crate::data::tables::{self, SentimentRow};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use chrono::Duration;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Articles whose cleaned text is shorter than this are dropped
pub const MIN_CLEAN_TEXT_LEN: usize = 50;

/// Route description terms at or below this length never match
const MIN_TERM_LEN: usize = 3;

/// Normalization constant for the compound score
const COMPOUND_ALPHA: f64 = 15.0;

const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "did", "do", "does", "doing", "don", "down", "during", "each", "few", "for",
    "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself",
    "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just",
    "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once",
    "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own", "s", "same", "she",
    "should", "so", "some", "such", "t", "than", "that", "the", "their", "theirs", "them",
    "themselves", "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "you", "your", "yours", "yourself",
    "yourselves",
];

const POSITIVE_WORDS: &[&str] = &[
    "gain", "gains", "growth", "grow", "growing", "rise", "rises", "rising", "rose", "surge",
    "surged", "strong", "stronger", "strength", "robust", "recover", "recovery", "improve",
    "improved", "improving", "boost", "boosted", "record", "profit", "profitable", "expand",
    "expansion", "demand", "opportunity", "positive", "optimistic", "firm", "firmer", "rally",
    "upside", "higher", "increase", "increased", "resume", "resumed", "reopen", "reopened",
];

const NEGATIVE_WORDS: &[&str] = &[
    "decline", "declined", "declining", "drop", "dropped", "fall", "falling", "fell", "weak",
    "weaker", "weakness", "slump", "plunge", "plunged", "loss", "losses", "risk", "risks",
    "crisis", "disruption", "disruptions", "delay", "delays", "congestion", "attack", "attacks",
    "sanction", "sanctions", "shortage", "strike", "closure", "closed", "halt", "halted",
    "negative", "concern", "concerns", "lower", "decrease", "decreased", "oversupply", "war",
];

/// Strips URLs, punctuation and stopwords
#[derive(Debug, Clone)]
pub struct TextCleaner {
    url: Regex,
    non_word: Regex,
    stopwords: HashSet<&'static str>,
}

impl TextCleaner {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| Regex::new(pattern).map_err(|e| PipelineError::Internal(e.to_string()));
        Ok(Self {
            url: compile(r"https?://\S+|www\.\S+")?,
            non_word: compile(r"\W")?,
            stopwords: STOPWORDS.iter().copied().collect(),
        })
    }

    pub fn clean(&self, text: &str) -> String {
        let without_urls = self.url.replace_all(text, "");
        let words_only = self.non_word.replace_all(&without_urls, " ");
        words_only
            .to_lowercase()
            .split_whitespace()
            .filter(|w| !self.stopwords.contains(w))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Word-list sentiment over cleaned text, squashed into [-1, 1]
#[derive(Debug, Clone)]
pub struct LexiconScorer {
    positive: HashSet<&'static str>,
    negative: HashSet<&'static str>,
}

impl Default for LexiconScorer {
    fn default() -> Self {
        Self {
            positive: POSITIVE_WORDS.iter().copied().collect(),
            negative: NEGATIVE_WORDS.iter().copied().collect(),
        }
    }
}

impl LexiconScorer {
    pub fn score(&self, clean_text: &str) -> f64 {
        let raw: f64 = clean_text
            .split_whitespace()
            .map(|w| {
                if self.positive.contains(w) {
                    1.0
                } else if self.negative.contains(w) {
                    -1.0
                } else {
                    0.0
                }
            })
            .sum();
        raw / (raw * raw + COMPOUND_ALPHA).sqrt()
    }
}

/// Description with a leading tonnage token ("270K") removed
fn route_phrase(description: &str) -> String {
    let lower = description.to_lowercase();
    match lower.split_once(' ') {
        Some((head, rest)) if head.starts_with(|c: char| c.is_ascii_digit()) => rest.to_string(),
        _ => lower,
    }
}

/// Route whose description appears verbatim in a search query
pub fn route_for_query<'a>(query: &str, routes: &'a [RouteSeed]) -> Option<&'a RouteSeed> {
    let query = query.to_lowercase();
    routes.iter().find(|r| query.contains(&route_phrase(&r.description)))
}

/// Resolve a route tag: `@CODE` in the topic first, then any description
/// term longer than three characters found in the title or summary.
/// Empty when nothing matches.
pub fn resolve_route_tag(topic: &str, title: &str, summary: &str, routes: &[RouteSeed]) -> String {
    if let Some((_, tail)) = topic.split_once('@') {
        let code: String = tail.chars().take_while(|c| c.is_alphanumeric() || *c == '_').collect();
        if !code.is_empty() {
            return code;
        }
    }

    let text = format!("{} {}", title, summary).to_lowercase();
    routes
        .iter()
        .find(|r| {
            route_phrase(&r.description)
                .split_whitespace()
                .filter(|t| t.len() > MIN_TERM_LEN)
                .any(|t| text.contains(t))
        })
        .map(|r| r.code.clone())
        .unwrap_or_default()
}

/// Merge `incoming` into the table at `path`, skipping URLs already
/// present. Returns how many rows were added.
pub fn merge_articles(path: &Path, incoming: Vec<SentimentRow>) -> Result<usize> {
    let mut rows: Vec<SentimentRow> = if path.exists() {
        tables::read_rows(path)?
    } else {
        Vec::new()
    };

    let mut seen: HashSet<String> = rows.iter().filter_map(|r| r.url.clone()).collect();
    let before = rows.len();
    for row in incoming {
        match row.url.clone().filter(|u| !u.is_empty()) {
            Some(url) => {
                if seen.insert(url) {
                    rows.push(row);
                }
            }
            None => rows.push(row),
        }
    }

    let added = rows.len() - before;
    if added > 0 {
        tables::write_rows(path, &rows)?;
    }
    Ok(added)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticleSource {
    #[serde(default)]
    pub name: Option<String>,
}

/// Article as returned by the news feed
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    #[serde(default)]
    pub source: Option<ArticleSource>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Score supplied by the feed, if any
    #[serde(default, alias = "sentiment_score")]
    pub sentiment_score: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewsResponse {
    #[serde(default)]
    pub articles: Vec<Article>,
}

/// Collects topic news into the sentiment table
pub struct NewsFeedCollector {
    client: FeedClient,
    cleaner: TextCleaner,
    scorer: LexiconScorer,
    topics: Vec<String>,
    days_back: i64,
    routes: Vec<RouteSeed>,
}

impl NewsFeedCollector {
    pub fn new(client: FeedClient, topics: Vec<String>, days_back: i64, routes: Vec<RouteSeed>) -> Result<Self> {
        Ok(Self {
            client,
            cleaner: TextCleaner::new()?,
            scorer: LexiconScorer::default(),
            topics,
            days_back,
            routes,
        })
    }

    /// Clean, score and tag one article; `None` when too short to score
    pub fn to_row(&self, query: &str, article: Article) -> Option<SentimentRow> {
        let title = article.title.unwrap_or_default();
        let description = article.description.unwrap_or_default();
        let content = article.content.unwrap_or_default();

        let raw = format!("{} {} {}", title, description, content);
        let clean = self.cleaner.clean(raw.trim());
        if clean.chars().count() < MIN_CLEAN_TEXT_LEN {
            return None;
        }

        let score = article.sentiment_score.unwrap_or_else(|| self.scorer.score(&clean));
        let topic = match route_for_query(query, &self.routes) {
            Some(route) => format!("{} @{}", query, route.code),
            None => query.to_string(),
        };
        let tag = resolve_route_tag(&topic, &title, &description, &self.routes);

        Some(SentimentRow {
            topic: Some(topic),
            source: article.source.and_then(|s| s.name),
            author: article.author,
            title: Some(title),
            description: Some(description),
            content: Some(content),
            date: article.published_at,
            url: article.url,
            sentiment_score: Some(score),
            clean_topic: Some(tag),
            clean_text: Some(clean),
        })
    }
}

#[async_trait]
impl SourceCollector for NewsFeedCollector {
    fn kind(&self) -> SourceKind {
        SourceKind::News
    }

    async fn collect(&self, ctx: &RunContext) -> Result<Option<PathBuf>> {
        let to = ctx.started_at.date_naive();
        let from = to - Duration::days(self.days_back);
        let path = ctx.sentiment_path();

        let mut rows = Vec::new();
        for topic in &self.topics {
            let query = [
                ("q", topic.clone()),
                ("from", from.format("%Y-%m-%d").to_string()),
                ("to", to.format("%Y-%m-%d").to_string()),
                ("sortBy", "relevancy".to_string()),
                ("language", "en".to_string()),
            ];
            let Some(resp) = self
                .client
                .get::<NewsResponse>(&format!("news '{}'", topic), &query)
                .await
            else {
                continue;
            };

            let fetched = resp.articles.len();
            let kept: Vec<SentimentRow> = resp
                .articles
                .into_iter()
                .filter_map(|a| self.to_row(topic, a))
                .collect();
            debug!("Kept {}/{} articles for '{}'", kept.len(), fetched, topic);
            rows.extend(kept);
        }

        if rows.is_empty() {
            warn!("No news articles collected");
            return Ok(path.exists().then_some(path));
        }

        let tagged = rows.iter().filter(|r| r.clean_topic.as_deref().is_some_and(|t| !t.is_empty())).count();
        let added = merge_articles(&path, rows)?;
        info!(
            "Added {} new articles to {} ({} route-tagged in this batch)",
            added,
            path.display(),
            tagged
        );
        Ok(Some(path))
    }
}
