//! Fixtures shared by unit tests

use crate::config::Config;
use crate::context::{RunContext, RunPaths};
use crate::types::Route;
use std::path::Path;

pub const RATES_CSV: &str = "\
Route,Description,Worldscale,TCE,Change (TCE),OPEX
TD3C,270K Middle East Gulf to China (VLCC),77.15,57589,698,8080
TD20,130K West Africa to UK-Continent (Suezmax),85.67,32492,125,7321
TC19,37K CPP Amsterdam to Lagos (MR),199.06,26023,55,6876
TC18,37K CPP US Gulf to Brazil (MR),185.00,20728,-2818,6876
";

pub const MARKET_CSV: &str = "\
Date,Close,Symbol,Category,YTD_Change_Pct
2025-03-12,10.5,FRO,tanker,4.2
2025-03-14,11.0,FRO,tanker,4.2
2025-03-13,70.1,CL=F,oil,-2.5
2025-03-14,25.0,XYZ,other,
";

pub const SENTIMENT_CSV: &str = "\
topic,source,author,title,description,content,date,url,sentiment_score,clean_topic
CPP Amsterdam to Lagos @TC19,Reuters,a,Lagos imports rise,,,2025-03-10,https://n/1,0.6,TC19
CPP Amsterdam to Lagos @TC19,Reuters,b,Lagos port delays,,,2025-03-11,https://n/2,-0.4,TC19
CPP Amsterdam to Lagos @TC19,Lloyds,c,Lagos steady,,,2025-03-12,https://n/3,0.05,TC19
Suez Canal,Lloyds,d,Canal traffic,,,2025-03-12,https://n/4,0.9,
";

pub const INDICATORS_CSV: &str = "\
date,value,metric,retrieved_date
2025-03-07,67.9,Oil Price,2025-03-15
2025-03-14,66.2,Oil Price,2025-03-15
2025-01-01,3.1,US Inflation,2025-03-15
";

/// Run context with all directories under `root`
pub fn context_in(root: &Path) -> RunContext {
    RunContext::with_paths(Config::default_for_tests(), RunPaths::under(root))
}

pub fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

/// Write the four standard fixture tables
pub fn write_all_sources(ctx: &RunContext) {
    write_file(&ctx.rates_path(), RATES_CSV);
    write_file(&ctx.market_path(), MARKET_CSV);
    write_file(&ctx.sentiment_path(), SENTIMENT_CSV);
    write_file(&ctx.indicators_path(), INDICATORS_CSV);
}

pub fn route(code: &str, tce: f64, change: f64) -> Route {
    Route {
        code: code.to_string(),
        description: format!("{} lane", code),
        current_tce: Some(tce),
        current_ws: Some(100.0),
        opex: Some(7000.0),
        last_change: Some(change),
        nigeria_relevant: None,
    }
}

impl Config {
    /// Defaults with a small, fast model
    pub fn default_for_tests() -> Self {
        let mut config: Config = toml::from_str("").unwrap();
        config.model.n_estimators = 20;
        config.collection.retry.base_delay_ms = 0;
        config
    }
}
