//! Freight Rate Forecasting Pipeline
//!
//! Collects (or verifies) input tables, trains the rate model, predicts
//! next-week changes and writes the weekly summary.

use clap::Parser;
use freight_forecast::{
    config::Config,
    context::RunContext,
    logging,
    pipeline::{DataMode, PipelineOptions, PipelineOrchestrator},
    report::summary::DEFAULT_REPORT_NAME,
};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "freight-pipeline")]
#[command(about = "Forecast tanker freight rate changes and write the weekly summary")]
struct Cli {
    /// Use tables already in the data directory instead of collecting
    #[arg(long, conflicts_with = "live")]
    use_existing_data: bool,

    /// Collect fresh data before modelling (default)
    #[arg(long)]
    live: bool,

    /// Skip market data collection
    #[arg(long)]
    skip_market: bool,

    /// Skip macroeconomic data collection
    #[arg(long)]
    skip_macro: bool,

    /// Skip news sentiment collection
    #[arg(long)]
    skip_news: bool,

    /// Skip training and predict with the stored model
    #[arg(long)]
    skip_ml: bool,

    /// Report file name
    #[arg(short, long, default_value = DEFAULT_REPORT_NAME)]
    output: String,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

impl Cli {
    fn options(&self) -> PipelineOptions {
        PipelineOptions {
            mode: if self.use_existing_data {
                DataMode::Existing
            } else {
                DataMode::Live
            },
            skip_market: self.skip_market,
            skip_macro: self.skip_macro,
            skip_news: self.skip_news,
            skip_ml: self.skip_ml,
            output_name: self.output.clone(),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;
    let ctx = RunContext::new(config);

    let _log_guard = match logging::init(&ctx.paths.logs_dir) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("File logging unavailable, logging to stdout only: {}", e);
            let _ = tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::new("info"))
                .try_init();
            None
        }
    };

    tracing::info!("Freight pipeline run {} starting", ctx.run_id);

    let orchestrator = PipelineOrchestrator::from_context(ctx, cli.options())?;
    let run = orchestrator.run().await;

    println!("{}", run.render_table());
    if let Some(path) = &run.report_path {
        println!("Report: {}", path.display());
    }
    if !run.model_fresh() {
        println!("Note: predictions did not use a freshly trained model");
    }

    Ok(if run.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
