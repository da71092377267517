//! Tests for live collection helpers

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::collect::feed::{indicator_rows, symbol_category, ytd_change_pct, IndicatorPoint, IndicatorResponse, PricePoint};
    use crate::collect::news::{
        merge_articles, resolve_route_tag, route_for_query, Article, LexiconScorer, TextCleaner, MIN_CLEAN_TEXT_LEN,
    };
    use crate::collect::rates::{is_west_africa_relevant, rate_rows};
    use crate::config::{FeedConfig, IndicatorSeed, RouteSeed};
    use crate::data::load_rates;
    use crate::data::tables::{self, SentimentRow};
    use crate::error::PipelineError;
    use crate::testing::context_in;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tempfile::tempdir;

    fn seed(code: &str, description: &str) -> RouteSeed {
        RouteSeed {
            code: code.to_string(),
            description: description.to_string(),
            worldscale: Some(100.0),
            tce: Some(25000.0),
            change: Some(50.0),
            opex: Some(6876.0),
        }
    }

    fn routes() -> Vec<RouteSeed> {
        vec![
            seed("TD3C", "270K Middle East Gulf to China (VLCC)"),
            seed("TC19", "37K CPP Amsterdam to Lagos (MR)"),
        ]
    }

    fn instant_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::ZERO,
        }
    }

    fn feed_client() -> FeedClient {
        let feed = FeedConfig {
            url: "http://127.0.0.1:9/feed/".to_string(),
            api_key: None,
        };
        FeedClient::new(&feed, instant_policy(1), Duration::from_secs(1)).unwrap()
    }

    fn sentiment_row(url: Option<&str>, title: &str) -> SentimentRow {
        SentimentRow {
            title: Some(title.to_string()),
            url: url.map(|u| u.to_string()),
            sentiment_score: Some(0.1),
            ..Default::default()
        }
    }

    // Retry

    #[tokio::test]
    async fn test_retry_recovers_after_rate_limit() {
        let calls = AtomicU32::new(0);
        let result = instant_policy(3)
            .run("test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(FetchError::RateLimited)
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result, Some(42));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_gives_up_on_status_error() {
        let calls = AtomicU32::new(0);
        let result: Option<u32> = instant_policy(5)
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(FetchError::Status(500)) }
            })
            .await;

        assert_eq!(result, None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_yields_none() {
        let calls = AtomicU32::new(0);
        let result: Option<u32> = instant_policy(3)
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(FetchError::Transport("connection reset".into())) }
            })
            .await;

        assert_eq!(result, None);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_retry_delays() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_for(&FetchError::RateLimited, 1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(&FetchError::RateLimited, 2), Duration::from_millis(400));
        assert_eq!(
            policy.delay_for(&FetchError::Transport("x".into()), 2),
            Duration::from_millis(100)
        );
    }

    #[test]
    fn test_retry_policy_from_config() {
        let config = crate::config::RetryConfig {
            max_attempts: 0,
            base_delay_ms: 250,
        };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.base_delay, Duration::from_millis(250));
        assert!(!FetchError::Decode("bad".into()).is_retryable());
    }

    // Text handling

    #[test]
    fn test_clean_text() {
        let cleaner = TextCleaner::new().unwrap();
        assert_eq!(cleaner.clean("Check https://x.com/a the Rates ROSE!"), "check rates rose");
        assert_eq!(cleaner.clean(""), "");
    }

    #[test]
    fn test_lexicon_score_range() {
        let scorer = LexiconScorer::default();
        assert_eq!(scorer.score("vessel schedule update"), 0.0);

        let up = scorer.score("rates rise strong demand recovery");
        let down = scorer.score("rates fall weak demand congestion delays");
        assert!(up > 0.0 && up < 1.0);
        assert!(down < 0.0 && down > -1.0);
    }

    #[test]
    fn test_resolve_route_tag() {
        let routes = routes();
        assert_eq!(resolve_route_tag("CPP Amsterdam to Lagos @TC19", "", "", &routes), "TC19");
        assert_eq!(resolve_route_tag("port congestion", "Congestion worsens at Lagos", "", &routes), "TC19");
        assert_eq!(resolve_route_tag("port congestion", "Markets calm today", "", &routes), "");
    }

    #[test]
    fn test_route_for_query() {
        let routes = routes();
        let found = route_for_query("CPP Amsterdam to Lagos (MR) news", &routes);
        assert_eq!(found.map(|r| r.code.as_str()), Some("TC19"));
        assert!(route_for_query("Suez Canal", &routes).is_none());
    }

    #[test]
    fn test_short_article_dropped() {
        let collector = NewsFeedCollector::new(feed_client(), vec![], 30, routes()).unwrap();
        let article = Article {
            title: Some("Short".into()),
            ..Default::default()
        };
        assert!(collector.to_row("Suez Canal", article).is_none());
    }

    #[test]
    fn test_article_scored_and_tagged() {
        let collector = NewsFeedCollector::new(feed_client(), vec![], 30, routes()).unwrap();
        let article = Article {
            title: Some("Tanker rates rise on robust demand".into()),
            description: Some("Freight markets in Lagos show strong recovery and growth this week".into()),
            url: Some("https://n/10".into()),
            ..Default::default()
        };

        let row = collector.to_row("Suez Canal", article).unwrap();
        assert!(row.clean_text.as_deref().unwrap().len() >= MIN_CLEAN_TEXT_LEN);
        assert!(row.sentiment_score.unwrap() > 0.0);
        assert_eq!(row.clean_topic.as_deref(), Some("TC19"));
        assert_eq!(row.topic.as_deref(), Some("Suez Canal"));
    }

    #[test]
    fn test_feed_score_preferred_over_lexicon() {
        let collector = NewsFeedCollector::new(feed_client(), vec![], 30, routes()).unwrap();
        let article = Article {
            title: Some("Tanker rates rise on robust demand".into()),
            description: Some("Freight markets in Lagos show strong recovery and growth this week".into()),
            sentiment_score: Some(-0.25),
            ..Default::default()
        };
        let row = collector.to_row("CPP Amsterdam to Lagos (MR)", article).unwrap();
        assert_eq!(row.sentiment_score, Some(-0.25));
        assert_eq!(row.topic.as_deref(), Some("CPP Amsterdam to Lagos (MR) @TC19"));
    }

    #[test]
    fn test_merge_articles_dedupes_by_url() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("news.csv");
        tables::write_rows(
            &path,
            &[sentiment_row(Some("https://n/1"), "a"), sentiment_row(Some("https://n/2"), "b")],
        )
        .unwrap();

        let added = merge_articles(
            &path,
            vec![
                sentiment_row(Some("https://n/2"), "dup"),
                sentiment_row(Some("https://n/3"), "c"),
                sentiment_row(None, "no url"),
            ],
        )
        .unwrap();

        assert_eq!(added, 2);
        let rows: Vec<SentimentRow> = tables::read_rows(&path).unwrap();
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.title.as_deref() != Some("dup")));
    }

    #[test]
    fn test_merge_into_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("news.csv");

        assert_eq!(merge_articles(&path, vec![]).unwrap(), 0);
        assert!(!path.exists());

        assert_eq!(merge_articles(&path, vec![sentiment_row(Some("https://n/1"), "a")]).unwrap(), 1);
        assert!(path.exists());
    }

    // Rates

    #[test]
    fn test_rate_rows() {
        let rows = rate_rows(&routes(), "2025-03-15");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].route_type.as_deref(), Some("TD"));
        assert_eq!(rows[1].nigeria_relevant, Some(true));
        assert_eq!(rows[0].nigeria_relevant, Some(false));
        assert_eq!(rows[1].processed_date.as_deref(), Some("2025-03-15"));
        assert!(is_west_africa_relevant("60K ARA to Offshore Lome (LR1)"));
    }

    #[tokio::test]
    async fn test_rate_collector_writes_loadable_table() {
        let dir = tempdir().unwrap();
        let ctx = context_in(dir.path());
        let collector = RateTableCollector::new(ctx.config.routes.clone());

        let path = collector.collect(&ctx).await.unwrap().unwrap();
        let loaded = load_rates(&path).unwrap();
        assert_eq!(loaded.len(), ctx.config.routes.len());
        assert_eq!(collector.kind(), SourceKind::Rates);
    }

    #[tokio::test]
    async fn test_rate_collector_requires_routes() {
        let dir = tempdir().unwrap();
        let ctx = context_in(dir.path());
        let err = RateTableCollector::new(vec![]).collect(&ctx).await.unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    // Market and indicators

    #[test]
    fn test_symbol_category() {
        assert_eq!(symbol_category("FRO"), "tanker");
        assert_eq!(symbol_category("CL=F"), "oil");
        assert_eq!(symbol_category("BDRY"), "index");
        assert_eq!(symbol_category("ZZZ"), "other");
    }

    #[test]
    fn test_ytd_change() {
        let point = |date: &str, close: f64| PricePoint {
            date: date.to_string(),
            close,
        };
        let this_year = vec![point("2025-03-01", 12.0), point("2025-01-02", 10.0)];
        let last_year = vec![point("2024-02-01", 8.0), point("2024-09-01", 12.0)];

        let ytd = ytd_change_pct(&this_year, &last_year).unwrap();
        assert!((ytd - 20.0).abs() < 1e-9);
        assert!(ytd_change_pct(&this_year, &[]).is_none());
        assert!(ytd_change_pct(&[], &last_year).is_none());
    }

    #[test]
    fn test_indicator_rows() {
        let resp: IndicatorResponse = serde_json::from_str(
            r#"{"data": [
                {"date": "2025-03-14", "value": "66.2"},
                {"date": "2025-03-07", "value": "."},
                {"date": "2025-02-28", "value": 70.5}
            ]}"#,
        )
        .unwrap();
        let seed = IndicatorSeed {
            function: "WTI".into(),
            metric: "Oil Price".into(),
            interval: "weekly".into(),
        };

        let rows = indicator_rows(&seed, &resp.data, 2, "2025-03-15");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].value, Some(66.2));
        assert_eq!(rows[1].value, None);
        assert_eq!(rows[0].metric, "Oil Price");
        assert_eq!(rows[0].retrieved_date.as_deref(), Some("2025-03-15"));

        let numeric = IndicatorPoint {
            date: "2025-02-28".into(),
            value: serde_json::json!(70.5),
        };
        assert_eq!(numeric.numeric(), Some(70.5));
    }

    // Wiring

    #[test]
    fn test_configured_collectors_follow_feeds_and_skips() {
        let dir = tempdir().unwrap();
        let mut ctx = context_in(dir.path());

        let only_rates = configured_collectors(&ctx, SourceSkips::default()).unwrap();
        assert_eq!(only_rates.len(), 1);
        assert_eq!(only_rates[0].kind(), SourceKind::Rates);

        let feed = FeedConfig {
            url: "http://127.0.0.1:9/".into(),
            api_key: Some("key".into()),
        };
        ctx.config.collection.market = Some(feed.clone());
        ctx.config.collection.news = Some(feed);

        let kinds: Vec<SourceKind> = configured_collectors(&ctx, SourceSkips::default())
            .unwrap()
            .iter()
            .map(|c| c.kind())
            .collect();
        assert_eq!(kinds, vec![SourceKind::Rates, SourceKind::Market, SourceKind::News]);

        let skips = SourceSkips {
            news: true,
            ..Default::default()
        };
        assert_eq!(configured_collectors(&ctx, skips).unwrap().len(), 2);
        assert!(skips.skips(SourceKind::News));
        assert!(!skips.skips(SourceKind::Rates));
    }
}
