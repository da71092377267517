//! Unit tests for input aggregation

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::testing::{self, context_in, write_all_sources, write_file};
    use tempfile::tempdir;

    #[test]
    fn test_load_all_sources() {
        let dir = tempdir().unwrap();
        let ctx = context_in(dir.path());
        write_all_sources(&ctx);

        let bundle = DataAggregator::new(&ctx).load();

        let routes = bundle.routes().unwrap();
        assert_eq!(routes.len(), 4);
        assert_eq!(routes[0].code, "TD3C");
        assert_eq!(routes[0].current_tce, Some(57589.0));
        assert_eq!(routes[3].last_change, Some(-2818.0));

        assert_eq!(bundle.market.as_ref().unwrap().len(), 4);
        let sentiment = bundle.sentiment.as_ref().unwrap();
        assert!(sentiment.has_route_tags);
        assert_eq!(sentiment.records.len(), 4);
        assert_eq!(sentiment.for_route("TC19").count(), 3);
        assert_eq!(sentiment.unmatched_count(), 1);
        assert_eq!(bundle.indicators.as_ref().unwrap().len(), 3);
        assert_eq!(
            bundle.available_sources(),
            vec!["rates", "market", "sentiment", "indicators"]
        );
    }

    #[test]
    fn test_optional_sources_absent() {
        let dir = tempdir().unwrap();
        let ctx = context_in(dir.path());
        write_file(&ctx.rates_path(), testing::RATES_CSV);

        let bundle = DataAggregator::new(&ctx).load();

        assert!(bundle.routes().is_ok());
        assert!(bundle.market.is_none());
        assert!(bundle.sentiment.is_none());
        assert!(bundle.indicators.is_none());
        assert_eq!(bundle.available_sources(), vec!["rates"]);
    }

    #[test]
    fn test_missing_rates_is_configuration_error() {
        let dir = tempdir().unwrap();
        let ctx = context_in(dir.path());
        write_file(&ctx.market_path(), testing::MARKET_CSV);

        let bundle = DataAggregator::new(&ctx).load();

        assert!(bundle.market.is_some());
        match bundle.routes() {
            Err(PipelineError::Configuration(_)) => {}
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_rate_table_column_superset_and_gaps() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rates.csv");
        write_file(
            &path,
            "Route,Description,TCE,Change (TCE),NigeriaRelevant,ProcessedDate\n\
             TD2,270K Middle East Gulf to Singapore,60328,183,False,2025-03-14\n\
             TC5,55K CPP Middle East Gulf to Japan (LR1),n/a,,False,2025-03-14\n",
        );

        let routes = load_rates(&path).unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].current_tce, Some(60328.0));
        assert_eq!(routes[0].opex, None);
        assert_eq!(routes[0].current_ws, None);
        assert_eq!(routes[1].current_tce, None);
        assert_eq!(routes[1].last_change, None);
    }

    #[test]
    fn test_sentiment_without_tag_column() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("news.csv");
        write_file(
            &path,
            "topic,title,sentiment_score\nSuez Canal,Canal traffic,0.3\n",
        );

        let table = load_sentiment(&path).unwrap();
        assert!(!table.has_route_tags);
        assert_eq!(table.records.len(), 1);
        assert_eq!(table.records[0].score, Some(0.3));
        assert!(!table.records[0].is_matched());
    }

    #[test]
    fn test_sentiment_short_appended_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("news.csv");
        write_file(
            &path,
            "topic,title,sentiment_score,clean_topic\n\
             Lagos @TC19,Imports,0.5,TC19\n\
             Suez,Traffic,0.1\n",
        );

        let table = load_sentiment(&path).unwrap();
        assert_eq!(table.records.len(), 2);
        assert_eq!(table.records[0].route_tag, "TC19");
        assert_eq!(table.records[1].route_tag, "");
    }

    #[test]
    fn test_market_rows_without_close_dropped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("market.csv");
        write_file(
            &path,
            "Date,Close,Symbol,Category\n2025-03-14,,FRO,tanker\n2025-03-14,9.5,STNG,tanker\n",
        );

        let records = load_market(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].symbol, "STNG");
        assert_eq!(records[0].ytd_change_pct, None);
    }

    #[test]
    fn test_unreadable_optional_source_is_absent() {
        let dir = tempdir().unwrap();
        let ctx = context_in(dir.path());
        write_file(&ctx.rates_path(), testing::RATES_CSV);
        // Missing the required metric column
        write_file(&ctx.indicators_path(), "date,value\n2025-03-14,1.0\n");

        let bundle = DataAggregator::new(&ctx).load();
        assert!(bundle.rates.is_some());
        assert!(bundle.indicators.is_none());
    }

    #[test]
    fn test_write_then_read_rate_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("rates.csv");
        let rows = vec![tables::RateRow {
            route: "TD7".to_string(),
            description: Some("80K North Sea to Continent (Aframax)".to_string()),
            worldscale: Some(110.0),
            tce: Some(20317.0),
            change: Some(1294.0),
            opex: None,
            processed_date: None,
            route_type: Some("TD".to_string()),
            nigeria_relevant: Some(false),
        }];

        tables::write_rows(&path, &rows).unwrap();
        let routes = load_rates(&path).unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].last_change, Some(1294.0));
        assert_eq!(routes[0].opex, None);
    }
}
