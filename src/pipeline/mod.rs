//! Stage sequencing for one forecasting run
//!
//! ```text
//! Collect | Verify ─→ Train (optional) ─→ Predict ─→ Report
//! ```
//!
//! Stages run strictly in order and exchange only explicit values. A
//! missing mandatory input stops the run before any output is written.
//! Training and prediction failures degrade the run; the report stage
//! still runs and its result decides the exit status.


use crate::collect::{configured_collectors, SourceCollector, SourceSkips};
use crate::context::RunContext;
use crate::data::{Bundle, DataAggregator};
use crate::error::{PipelineError, Result};
use crate::features::FeatureBuilder;
use crate::ml::{ModelTrainer, PredictionService, TrainedArtifact, ARTIFACT_FILES};
use crate::report::summary::DEFAULT_REPORT_NAME;
use crate::report::{MarketAnalysis, ReportGenerator, ReportInput, RunMetadata, SummaryReport};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{error, info, warn, Instrument};

/// Where raw input tables come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataMode {
    /// Fetch every configured source before modelling
    #[default]
    Live,
    /// Use tables already in the data directory
    Existing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub mode: DataMode,
    pub skip_market: bool,
    pub skip_macro: bool,
    pub skip_news: bool,
    pub skip_ml: bool,
    /// Report file name under the reports directory
    pub output_name: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            mode: DataMode::default(),
            skip_market: false,
            skip_macro: false,
            skip_news: false,
            skip_ml: false,
            output_name: DEFAULT_REPORT_NAME.to_string(),
        }
    }
}

impl PipelineOptions {
    pub fn skips(&self) -> SourceSkips {
        SourceSkips {
            market: self.skip_market,
            indicators: self.skip_macro,
            news: self.skip_news,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Collect,
    Verify,
    Train,
    Predict,
    Report,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Collect => write!(f, "collect"),
            Stage::Verify => write!(f, "verify"),
            Stage::Train => write!(f, "train"),
            Stage::Predict => write!(f, "predict"),
            Stage::Report => write!(f, "report"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StageStatus {
    Completed,
    Skipped,
    /// Finished with reduced output; the run continues
    Degraded(String),
    Failed { fatal: bool, reason: String },
}

impl StageStatus {
    fn from_error(e: &PipelineError) -> Self {
        if e.is_fatal() {
            StageStatus::Failed {
                fatal: true,
                reason: e.to_string(),
            }
        } else {
            StageStatus::Degraded(e.to_string())
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, StageStatus::Failed { fatal: true, .. })
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageStatus::Completed => write!(f, "completed"),
            StageStatus::Skipped => write!(f, "skipped"),
            StageStatus::Degraded(reason) => write!(f, "degraded ({})", reason),
            StageStatus::Failed { reason, .. } => write!(f, "FAILED ({})", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome {
    pub stage: Stage,
    pub status: StageStatus,
    pub elapsed: Duration,
    /// Files this stage wrote or verified
    pub artifacts: Vec<PathBuf>,
}

/// Result of one orchestrated run
#[derive(Debug, Clone, Default)]
pub struct PipelineRun {
    pub outcomes: Vec<StageOutcome>,
    /// True when predictions came from a model trained in this run
    pub model_fresh: bool,
    pub report_path: Option<PathBuf>,
}

impl PipelineRun {
    /// The report stage completed and nothing failed fatally
    pub fn succeeded(&self) -> bool {
        self.outcome(Stage::Report)
            .is_some_and(|o| o.status == StageStatus::Completed)
            && !self.outcomes.iter().any(|o| o.status.is_fatal())
    }

    pub fn model_fresh(&self) -> bool {
        self.model_fresh
    }

    pub fn outcome(&self, stage: Stage) -> Option<&StageOutcome> {
        self.outcomes.iter().find(|o| o.stage == stage)
    }

    pub fn render_table(&self) -> String {
        let mut lines = vec![format!("{:<9} {:>9}  {}", "Stage", "Elapsed", "Status")];
        for o in &self.outcomes {
            lines.push(format!(
                "{:<9} {:>8.2}s  {}",
                o.stage.to_string(),
                o.elapsed.as_secs_f64(),
                o.status
            ));
            for path in &o.artifacts {
                lines.push(format!("{:<9} {:>9}  -> {}", "", "", path.display()));
            }
        }
        lines.join("\n")
    }

    fn record(&mut self, stage: Stage, status: StageStatus, started: Instant, artifacts: Vec<PathBuf>) {
        match &status {
            StageStatus::Completed | StageStatus::Skipped => info!("Stage {}: {}", stage, status),
            StageStatus::Degraded(_) => warn!("Stage {}: {}", stage, status),
            StageStatus::Failed { .. } => error!("Stage {}: {}", stage, status),
        }
        self.outcomes.push(StageOutcome {
            stage,
            status,
            elapsed: started.elapsed(),
            artifacts,
        });
    }
}

/// Runs the stages for one context
pub struct PipelineOrchestrator {
    ctx: RunContext,
    options: PipelineOptions,
    collectors: Vec<Box<dyn SourceCollector>>,
    reporter: Box<dyn ReportGenerator>,
}

impl PipelineOrchestrator {
    /// Orchestrator without collectors; add them with [`with_collector`](Self::with_collector)
    pub fn new(ctx: RunContext, options: PipelineOptions, reporter: Box<dyn ReportGenerator>) -> Self {
        Self {
            ctx,
            options,
            collectors: Vec::new(),
            reporter,
        }
    }

    pub fn with_collector(mut self, collector: Box<dyn SourceCollector>) -> Self {
        self.collectors.push(collector);
        self
    }

    /// Orchestrator with the configured collectors and the summary report
    pub fn from_context(ctx: RunContext, options: PipelineOptions) -> Result<Self> {
        let collectors = match options.mode {
            DataMode::Live => configured_collectors(&ctx, options.skips())?,
            DataMode::Existing => Vec::new(),
        };
        Ok(Self {
            collectors,
            ..Self::new(ctx, options, Box::new(SummaryReport::new()))
        })
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    pub async fn run(&self) -> PipelineRun {
        let span = self.ctx.span();
        self.run_stages().instrument(span).await
    }

    async fn run_stages(&self) -> PipelineRun {
        let mut run = PipelineRun::default();
        info!(
            "Starting pipeline run ({:?} data, ml {})",
            self.options.mode,
            if self.options.skip_ml { "skipped" } else { "enabled" }
        );

        let started = Instant::now();
        let (stage, inputs) = match self.options.mode {
            DataMode::Existing => (Stage::Verify, self.verify_inputs()),
            DataMode::Live => (Stage::Collect, self.collect_inputs().await),
        };
        let bundle = match inputs.and_then(|(status, paths)| self.load_bundle().map(|b| (status, paths, b))) {
            Ok((status, paths, bundle)) => {
                run.record(stage, status, started, paths);
                bundle
            }
            Err(e) => {
                run.record(stage, StageStatus::from_error(&e), started, Vec::new());
                error!("Pipeline aborted: {}", e);
                return run;
            }
        };

        if let Err(e) = self.ctx.paths.ensure_output_dirs() {
            let status = StageStatus::Failed {
                fatal: true,
                reason: e.to_string(),
            };
            run.record(stage, status, Instant::now(), Vec::new());
            return run;
        }

        let started = Instant::now();
        let trained = if self.options.skip_ml {
            run.record(Stage::Train, StageStatus::Skipped, started, Vec::new());
            None
        } else {
            match self.train(&bundle) {
                Ok(artifact) => {
                    let paths = ARTIFACT_FILES.iter().map(|f| self.ctx.paths.models_dir.join(f)).collect();
                    run.record(Stage::Train, StageStatus::Completed, started, paths);
                    Some(artifact)
                }
                Err(e) => {
                    run.record(Stage::Train, StageStatus::from_error(&e), started, Vec::new());
                    None
                }
            }
        };
        run.model_fresh = trained.is_some();

        let started = Instant::now();
        match self.predict(&bundle, trained, run.model_fresh) {
            Ok((paths, training_date)) => {
                let status = if run.model_fresh {
                    StageStatus::Completed
                } else {
                    StageStatus::Degraded(format!("using model trained {}", training_date))
                };
                run.record(Stage::Predict, status, started, paths);
            }
            Err(e) => run.record(Stage::Predict, StageStatus::from_error(&e), started, Vec::new()),
        }

        let started = Instant::now();
        let input = ReportInput {
            output_name: self.options.output_name.clone(),
            outcome_table: run.render_table(),
            model_fresh: run.model_fresh,
        };
        match self.reporter.generate(&self.ctx, &input) {
            Ok(path) => {
                run.record(Stage::Report, StageStatus::Completed, started, vec![path.clone()]);
                run.report_path = Some(path);
            }
            Err(e) => {
                let status = StageStatus::Failed {
                    fatal: true,
                    reason: e.to_string(),
                };
                run.record(Stage::Report, status, started, Vec::new());
            }
        }

        if run.succeeded() {
            info!("Pipeline run completed");
        } else {
            error!("Pipeline run failed");
        }
        run
    }

    /// Check the mandatory tables exist before anything else happens
    fn verify_inputs(&self) -> Result<(StageStatus, Vec<PathBuf>)> {
        let mandatory = [("rate", self.ctx.rates_path()), ("market", self.ctx.market_path())];
        let missing: Vec<String> = mandatory
            .iter()
            .filter(|(_, path)| !path.exists())
            .map(|(label, path)| format!("{} table {}", label, path.display()))
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::Configuration(format!("missing {}", missing.join(", "))));
        }

        let mut missing_optional = Vec::new();
        for (label, path) in [("sentiment", self.ctx.sentiment_path()), ("macro", self.ctx.indicators_path())] {
            if !path.exists() {
                warn!("Optional {} table not found: {}", label, path.display());
                missing_optional.push(label);
            }
        }

        let present = [
            self.ctx.rates_path(),
            self.ctx.market_path(),
            self.ctx.sentiment_path(),
            self.ctx.indicators_path(),
        ]
        .into_iter()
        .filter(|p| p.exists())
        .collect();

        let status = if missing_optional.is_empty() {
            StageStatus::Completed
        } else {
            StageStatus::Degraded(format!("no {} data", missing_optional.join(", ")))
        };
        Ok((status, present))
    }

    /// Run every collector in order. Only a rate collector failure is fatal.
    async fn collect_inputs(&self) -> Result<(StageStatus, Vec<PathBuf>)> {
        let mut written = Vec::new();
        let mut absent = Vec::new();

        for collector in &self.collectors {
            let kind = collector.kind();
            info!("Collecting {} data", kind);
            match collector.collect(&self.ctx).await {
                Ok(Some(path)) => written.push(path),
                Ok(None) if kind.is_mandatory() => {
                    return Err(PipelineError::Configuration(format!("{} collection produced no data", kind)));
                }
                Ok(None) => {
                    warn!("{} collection produced no data", kind);
                    absent.push(kind.to_string());
                }
                Err(e) if kind.is_mandatory() => {
                    return Err(PipelineError::Configuration(format!("{} collection failed: {}", kind, e)));
                }
                Err(e) => {
                    warn!("{} collection failed, continuing without it: {}", kind, e);
                    absent.push(kind.to_string());
                }
            }
        }

        let status = if absent.is_empty() {
            StageStatus::Completed
        } else {
            StageStatus::Degraded(format!("no {} data", absent.join(", ")))
        };
        Ok((status, written))
    }

    fn load_bundle(&self) -> Result<Bundle> {
        let bundle = DataAggregator::new(&self.ctx).load();
        match bundle.routes() {
            Ok(_) => Ok(bundle),
            Err(_) => Err(PipelineError::Configuration(format!(
                "rate table unreadable: {}",
                self.ctx.rates_path().display()
            ))),
        }
    }

    fn train(&self, bundle: &Bundle) -> Result<TrainedArtifact> {
        let builder = FeatureBuilder::new(self.ctx.config.features.clone());
        let (features, target) = builder.build(bundle)?;
        let target = target.ok_or_else(|| {
            PipelineError::TrainingDataInsufficient("rate table has no change column".into())
        })?;
        ModelTrainer::from_context(&self.ctx).train_and_save(&features, &target)
    }

    /// Predict, then write the prediction table and run metadata. Returns
    /// the written paths and the training date of the model used.
    fn predict(
        &self,
        bundle: &Bundle,
        trained: Option<TrainedArtifact>,
        model_fresh: bool,
    ) -> Result<(Vec<PathBuf>, String)> {
        let mut service = PredictionService::from_context(&self.ctx);
        if let Some(artifact) = trained {
            service = service.with_artifact(artifact);
        }
        let table = service.try_predict(bundle)?;

        let predictions_path = self.ctx.predictions_path();
        table.write_csv(&predictions_path)?;

        let model_metrics = service.artifact().map(|a| a.metrics.clone());
        let training_date = model_metrics
            .as_ref()
            .map(|m| m.training_date.clone())
            .unwrap_or_default();
        let market_analysis = MarketAnalysis::analyze(&table);
        info!(
            "Market trend {} ({}% improving), volatility {}",
            market_analysis.market_trend, market_analysis.trend_percentage, market_analysis.volatility_level
        );

        let metadata = RunMetadata {
            run_date: self.ctx.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            routes_analyzed: table.len(),
            model_metrics,
            market_analysis,
            model_fresh,
        };
        let metadata_path = self.ctx.metadata_path();
        metadata.write(&metadata_path)?;

        Ok((vec![predictions_path, metadata_path], training_date))
    }
}
