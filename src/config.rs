//! Pipeline configuration
//!
//! Loaded from an optional TOML file, then overridden by `FREIGHT__*`
//! environment variables (`.env` is read first). Every field has a default,
//! so an empty or missing file yields a runnable configuration.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub files: FilesConfig,
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub collection: CollectionConfig,
    /// Route table written by live collection
    #[serde(default = "default_routes")]
    pub routes: Vec<RouteSeed>,
}

impl Config {
    /// Load configuration from a TOML file plus environment overrides
    pub fn load(path: &str) -> Result<Self> {
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::File::from(Path::new(path)).required(false))
            .add_source(
                config::Environment::with_prefix("FREIGHT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: Config = settings.try_deserialize()?;
        if config.routes.is_empty() {
            config.routes = default_routes();
        }
        Ok(config)
    }
}

/// Working directories
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_results_dir")]
    pub results_dir: String,
    #[serde(default = "default_models_dir")]
    pub models_dir: String,
    #[serde(default = "default_reports_dir")]
    pub reports_dir: String,
    #[serde(default = "default_logs_dir")]
    pub logs_dir: String,
}

fn default_data_dir() -> String {
    "data".to_string()
}
fn default_results_dir() -> String {
    "results".to_string()
}
fn default_models_dir() -> String {
    "models".to_string()
}
fn default_reports_dir() -> String {
    "reports".to_string()
}
fn default_logs_dir() -> String {
    "logs".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            results_dir: default_results_dir(),
            models_dir: default_models_dir(),
            reports_dir: default_reports_dir(),
            logs_dir: default_logs_dir(),
        }
    }
}

impl PathsConfig {
    /// Expand `~` and environment variables in a configured directory
    pub fn expand(dir: &str) -> PathBuf {
        match shellexpand::full(dir) {
            Ok(expanded) => PathBuf::from(expanded.as_ref()),
            Err(_) => PathBuf::from(dir),
        }
    }
}

/// Input table file names, relative to the data directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    #[serde(default = "default_rates_file")]
    pub rates: String,
    #[serde(default = "default_market_file")]
    pub market: String,
    #[serde(default = "default_sentiment_file")]
    pub sentiment: String,
    #[serde(default = "default_indicators_file")]
    pub indicators: String,
}

fn default_rates_file() -> String {
    "freight_rates.csv".to_string()
}
fn default_market_file() -> String {
    "maritime_data_2025.csv".to_string()
}
fn default_sentiment_file() -> String {
    "news_sentiment.csv".to_string()
}
fn default_indicators_file() -> String {
    "combined_indicators.csv".to_string()
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            rates: default_rates_file(),
            market: default_market_file(),
            sentiment: default_sentiment_file(),
            indicators: default_indicators_file(),
        }
    }
}

/// Feature construction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Market symbols broadcast as global features, in column order
    #[serde(default = "default_market_symbols")]
    pub market_symbols: Vec<String>,
    /// Scores above this count as positive news
    #[serde(default = "default_positive_threshold")]
    pub positive_threshold: f64,
    /// Scores below this count as negative news
    #[serde(default = "default_negative_threshold")]
    pub negative_threshold: f64,
}

fn default_market_symbols() -> Vec<String> {
    ["FRO", "GLNG", "TK", "CL=F", "BZ=F", "STNG", "GC=F", "SI=F"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_positive_threshold() -> f64 {
    0.1
}
fn default_negative_threshold() -> f64 {
    -0.1
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            market_symbols: default_market_symbols(),
            positive_threshold: default_positive_threshold(),
            negative_threshold: default_negative_threshold(),
        }
    }
}

/// Gradient boosting and evaluation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Fraction of training rows sampled per round
    #[serde(default = "default_subsample")]
    pub subsample: f64,
    /// Fraction of feature columns sampled per round
    #[serde(default = "default_colsample")]
    pub colsample: f64,
    #[serde(default = "default_min_samples_leaf")]
    pub min_samples_leaf: usize,
    /// Held-out fraction for evaluation
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_n_estimators() -> usize {
    100
}
fn default_max_depth() -> usize {
    3
}
fn default_learning_rate() -> f64 {
    0.1
}
fn default_subsample() -> f64 {
    0.8
}
fn default_colsample() -> f64 {
    0.8
}
fn default_min_samples_leaf() -> usize {
    1
}
fn default_test_fraction() -> f64 {
    0.2
}
fn default_seed() -> u64 {
    42
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_estimators: default_n_estimators(),
            max_depth: default_max_depth(),
            learning_rate: default_learning_rate(),
            subsample: default_subsample(),
            colsample: default_colsample(),
            min_samples_leaf: default_min_samples_leaf(),
            test_fraction: default_test_fraction(),
            seed: default_seed(),
        }
    }
}

/// Live collection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Market price feed; collection is skipped when unset
    #[serde(default)]
    pub market: Option<FeedConfig>,
    /// Macro indicator feed; collection is skipped when unset
    #[serde(default)]
    pub indicators: Option<FeedConfig>,
    /// News feed; collection is skipped when unset
    #[serde(default)]
    pub news: Option<FeedConfig>,
    #[serde(default = "default_news_days_back")]
    pub news_days_back: i64,
    #[serde(default = "default_news_topics")]
    pub news_topics: Vec<String>,
    /// Symbols fetched from the market feed
    #[serde(default = "default_collect_symbols")]
    pub market_symbols: Vec<String>,
    #[serde(default = "default_macro_indicators")]
    pub macro_indicators: Vec<IndicatorSeed>,
    /// Most recent observations kept per indicator
    #[serde(default = "default_indicator_limit")]
    pub indicator_limit: usize,
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_news_days_back() -> i64 {
    30
}
fn default_news_topics() -> Vec<String> {
    [
        "Nigeria to Europe shipping",
        "Middle East to Europe refined products",
        "Middle East to Africa oil",
        "North African crude to Europe",
        "Rotterdam refined products",
        "Black Sea oil exports",
        "Suez Canal",
        "port congestion",
        "bunker availability",
        "shipping emissions",
        "Cape of Good Hope diversions",
        "maritime oil logistics Africa",
        "Dangote refinery",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_collect_symbols() -> Vec<String> {
    [
        "FRO", "GLNG", "TK", "CL=F", "BZ=F", "STNG", "GC=F", "SI=F", "SHEL.L", "BP", "NMM", "SBLK",
        "GSL", "DAC", "GOGL", "HO=F", "BDRY", "NAT",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_macro_indicators() -> Vec<IndicatorSeed> {
    [
        ("WTI", "Oil Price", "weekly"),
        ("BRENT", "Brent Oil Price", "weekly"),
        ("NATURAL_GAS", "Natural Gas", "weekly"),
        ("COPPER", "Copper", "weekly"),
        ("REAL_GDP", "US GDP", "quarterly"),
        ("CPI", "US Inflation", "monthly"),
    ]
    .iter()
    .map(|(function, metric, interval)| IndicatorSeed {
        function: function.to_string(),
        metric: metric.to_string(),
        interval: interval.to_string(),
    })
    .collect()
}
fn default_indicator_limit() -> usize {
    20
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            request_timeout_secs: default_timeout_secs(),
            market: None,
            indicators: None,
            news: None,
            news_days_back: default_news_days_back(),
            news_topics: default_news_topics(),
            market_symbols: default_collect_symbols(),
            macro_indicators: default_macro_indicators(),
            indicator_limit: default_indicator_limit(),
        }
    }
}

/// One macro series requested from the indicator feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSeed {
    /// Feed-side series identifier
    pub function: String,
    /// Name written to the `metric` column
    pub metric: String,
    #[serde(default = "default_interval")]
    pub interval: String,
}

fn default_interval() -> String {
    "weekly".to_string()
}

/// Bounded retry with exponential backoff for collector fetches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

/// A JSON feed endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// One row of the rate table as configured for live collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSeed {
    pub code: String,
    pub description: String,
    #[serde(default)]
    pub worldscale: Option<f64>,
    #[serde(default)]
    pub tce: Option<f64>,
    #[serde(default)]
    pub change: Option<f64>,
    #[serde(default)]
    pub opex: Option<f64>,
}

impl RouteSeed {
    fn new(code: &str, description: &str, ws: f64, tce: f64, change: f64, opex: f64) -> Self {
        Self {
            code: code.to_string(),
            description: description.to_string(),
            worldscale: Some(ws),
            tce: Some(tce),
            change: Some(change),
            opex: Some(opex),
        }
    }
}

/// Baltic tanker routes tracked by default
pub fn default_routes() -> Vec<RouteSeed> {
    vec![
        RouteSeed::new("TD2", "270K Middle East Gulf to Singapore", 78.00, 60328.0, 183.0, 8080.0),
        RouteSeed::new("TD3C", "270K Middle East Gulf to China (VLCC)", 77.15, 57589.0, 698.0, 8080.0),
        RouteSeed::new("TD6", "135K Black Sea to Mediterranean (Suezmax)", 90.10, 28351.0, 645.0, 7321.0),
        RouteSeed::new("TD7", "80K North Sea to Continent (Aframax)", 110.00, 20317.0, 1294.0, 7030.0),
        RouteSeed::new("TD8", "80K Kuwait to Singapore", 138.21, 28217.0, 2098.0, 7030.0),
        RouteSeed::new("TD9", "70K Caribbean to US Gulf (LR1)", 131.56, 22821.0, -2063.0, 6876.0),
        RouteSeed::new("TD15", "260K West Africa to China (VLCC)", 77.39, 57966.0, 1591.0, 8080.0),
        RouteSeed::new("TD20", "130K West Africa to UK-Continent (Suezmax)", 85.67, 32492.0, 125.0, 7321.0),
        RouteSeed::new("TD22", "270K US Gulf to China", 6820000.00, 29834.0, 2399.0, 8080.0),
        RouteSeed::new("TD25", "70K US Gulf to UK-Continent", 130.28, 27378.0, -1394.0, 7030.0),
        RouteSeed::new("TD27", "130K Guyana to ARA", 79.33, 28226.0, 162.0, 7321.0),
        RouteSeed::new("TC5", "55K CPP Middle East Gulf to Japan (LR1)", 172.81, 25786.0, -141.0, 6876.0),
        RouteSeed::new("TC8", "65K CPP Middle East Gulf to UK-Continent (LR1)", 50.33, 30550.0, -908.0, 6876.0),
        RouteSeed::new("TC12", "35K Naphtha West Coast India to Japan (MR)", 160.31, 13201.0, 236.0, 6876.0),
        RouteSeed::new("TC15", "80K Naphtha Mediterranean to Far East (Aframax)", 3094167.0, 8946.0, -605.0, 7030.0),
        RouteSeed::new("TC16", "60K ARA to Offshore Lome (LR1)", 114.72, 17103.0, 152.0, 6876.0),
        RouteSeed::new("TC17", "35K CPP Jubail to Dar es Salaam (MR)", 216.07, 20319.0, 777.0, 6876.0),
        RouteSeed::new("TC18", "37K CPP US Gulf to Brazil (MR)", 185.00, 20728.0, -2818.0, 6876.0),
        RouteSeed::new("TC19", "37K CPP Amsterdam to Lagos (MR)", 199.06, 26023.0, 55.0, 6876.0),
        RouteSeed::new("TC20", "90K CPP Middle East Gulf to UK-Continent (Aframax)", 3956250.0, 36279.0, 2492.0, 7030.0),
        RouteSeed::new("TC21", "CPP US Gulf to Caribbean (Houston to Pozos Colorados)", 185.00, 38000.0, 15.0, 6876.0),
        RouteSeed::new("TC23", "CPP/UNL/ULSD middle distillate. ARA to UK-Cont (Amsterdam to Le Havre)", 199.06, 30000.0, 15.0, 6876.0),
    ]
}
