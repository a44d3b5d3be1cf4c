//! Sync run orchestration: source registry, one traversal worker per source,
//! run report.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use cpr_adapters::{build_extractor, ExtractError, Extractor, ListingTarget, SourceHttp, EXTRACTOR_KINDS};
use cpr_core::AssemblyOptions;
use cpr_storage::{FanoutSink, HttpClientConfig, HttpFetcher, JsonlSink, PgSink, RecordSink, Transport};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::task::JoinSet;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

mod traversal;

pub use traversal::{
    FailureKind, FailureRecord, SourceReport, StopReason, Traversal, TraversalFailure, TraversalSettings,
};

pub const CRATE_NAME: &str = "cpr-sync";

#[derive(Debug, Clone, Deserialize)]
pub struct SourceRegistry {
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub source_id: String,
    pub display_name: String,
    pub enabled: bool,
    /// One of [`EXTRACTOR_KINDS`].
    pub extractor: String,
    pub listing_targets: Vec<ListingTarget>,
    #[serde(default)]
    pub request_delay_ms: u64,
    #[serde(default)]
    pub page_size: Option<usize>,
    #[serde(default)]
    pub max_pages: Option<u32>,
    #[serde(default)]
    pub brand_from_title_words: Option<usize>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl SourceRegistry {
    pub fn from_yaml(text: &str) -> Result<Self> {
        let registry: Self = serde_yaml::from_str(text).context("parsing source registry")?;
        registry.validate()?;
        Ok(registry)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("loading {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        let mut ids = HashSet::new();
        for source in &self.sources {
            if !ids.insert(source.source_id.as_str()) {
                bail!("duplicate source_id {:?}", source.source_id);
            }
            if !EXTRACTOR_KINDS.contains(&source.extractor.as_str()) {
                bail!(
                    "source {:?} uses unknown extractor {:?} (known: {})",
                    source.source_id,
                    source.extractor,
                    EXTRACTOR_KINDS.join(", ")
                );
            }
            if source.listing_targets.is_empty() {
                bail!("source {:?} has no listing_targets", source.source_id);
            }
        }
        Ok(())
    }

    /// Every enabled source, or exactly the named one. Naming a source runs
    /// it even when it is disabled in the registry.
    pub fn select(&self, only: Option<&str>) -> Result<Vec<&SourceConfig>> {
        match only {
            Some(id) => match self.sources.iter().find(|s| s.source_id == id) {
                Some(source) => Ok(vec![source]),
                None => bail!("no source {id:?} in registry"),
            },
            None => Ok(self.sources.iter().filter(|s| s.enabled).collect()),
        }
    }
}

impl SourceConfig {
    pub fn settings(&self, scraped_at: NaiveDate) -> TraversalSettings {
        TraversalSettings {
            scraped_at,
            request_delay: Duration::from_millis(self.request_delay_ms),
            max_pages: self.max_pages,
            assembly: AssemblyOptions {
                brand_from_title_words: self.brand_from_title_words,
            },
        }
    }

    pub fn http(&self, transport: Arc<dyn Transport>, timeout: Duration) -> SourceHttp {
        self.headers
            .iter()
            .fold(SourceHttp::new(transport, timeout), |http, (name, value)| {
                http.with_header(name.as_str(), value.as_str())
            })
    }

    /// One extractor per listing target.
    pub fn extractors(&self, http: &SourceHttp) -> Result<Vec<Box<dyn Extractor>>, ExtractError> {
        self.listing_targets
            .iter()
            .map(|target| {
                build_extractor(
                    &self.extractor,
                    &self.display_name,
                    target.clone(),
                    http.clone(),
                    self.page_size,
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Enables the Postgres sink when set.
    pub database_url: Option<String>,
    pub output_path: PathBuf,
    pub user_agent: String,
    pub http_timeout_secs: u64,
    /// Retries for 5xx, 429 and connect failures. Zero keeps a single attempt.
    pub http_max_retries: usize,
    pub workspace_root: PathBuf,
    pub reports_dir: PathBuf,
}

impl SyncConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let workspace_root = var("CPR_WORKSPACE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_url: var("DATABASE_URL"),
            output_path: var("CPR_OUTPUT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./out/records.jsonl")),
            user_agent: var("CPR_USER_AGENT").unwrap_or_else(|| "cpr-bot/0.1".to_string()),
            http_timeout_secs: var("CPR_HTTP_TIMEOUT_SECS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(30),
            http_max_retries: var("CPR_HTTP_MAX_RETRIES")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0),
            reports_dir: var("CPR_REPORTS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| workspace_root.join("reports")),
            workspace_root,
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn http_client(&self) -> HttpClientConfig {
        let mut client = HttpClientConfig {
            user_agent: Some(self.user_agent.clone()),
            ..Default::default()
        };
        client.backoff.max_retries = self.http_max_retries;
        client
    }

    pub fn registry_path(&self) -> PathBuf {
        self.workspace_root.join("sources.yaml")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub scraped_at: NaiveDate,
    pub records: usize,
    pub failures: usize,
    pub sources: Vec<SourceReport>,
}

impl RunSummary {
    pub fn new(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        scraped_at: NaiveDate,
        sources: Vec<SourceReport>,
    ) -> Self {
        Self {
            run_id,
            started_at,
            finished_at,
            scraped_at,
            records: sources.iter().map(|s| s.records).sum(),
            failures: sources.iter().map(|s| s.failures.len()).sum(),
            sources,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub summary: RunSummary,
    pub report_path: PathBuf,
}

/// Runs sources in parallel, one traversal worker each, all feeding one sink.
pub struct SyncRunner {
    transport: Arc<dyn Transport>,
    sink: Arc<dyn RecordSink>,
    timeout: Duration,
}

impl SyncRunner {
    pub fn new(transport: Arc<dyn Transport>, sink: Arc<dyn RecordSink>, timeout: Duration) -> Self {
        Self {
            transport,
            sink,
            timeout,
        }
    }

    /// A failing source only affects its own report.
    pub async fn run(&self, sources: &[&SourceConfig], scraped_at: NaiveDate) -> Result<Vec<SourceReport>> {
        let mut workers = JoinSet::new();
        for source in sources {
            let http = source.http(self.transport.clone(), self.timeout);
            let extractors = source
                .extractors(&http)
                .with_context(|| format!("building extractors for {}", source.source_id))?;
            let mut traversal = Traversal::new(
                source.source_id.as_str(),
                source.display_name.as_str(),
                source.settings(scraped_at),
                self.sink.clone(),
            );
            let span = info_span!("source", source = %source.source_id);
            workers.spawn(
                async move {
                    for extractor in &extractors {
                        if traversal.run(extractor.as_ref()).await == StopReason::ListingFailed {
                            break;
                        }
                    }
                    traversal.into_report()
                }
                .instrument(span),
            );
        }

        let mut reports = Vec::with_capacity(sources.len());
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(err) => error!(error = %err, "source worker did not finish"),
            }
        }
        reports.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        Ok(reports)
    }

    pub async fn run_and_report(&self, sources: &[&SourceConfig], reports_dir: &Path) -> Result<SyncOutcome> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let scraped_at = started_at.date_naive();
        if sources.is_empty() {
            warn!(%run_id, "no enabled sources");
        }
        info!(%run_id, sources = sources.len(), sink = self.sink.name(), "sync started");

        let reports = self.run(sources, scraped_at).await?;
        let summary = RunSummary::new(run_id, started_at, Utc::now(), scraped_at, reports);
        let report_path = write_run_report(reports_dir, &summary).await?;
        info!(
            %run_id,
            records = summary.records,
            failures = summary.failures,
            report = %report_path.display(),
            "sync finished"
        );
        Ok(SyncOutcome { summary, report_path })
    }
}

/// `<reports_dir>/<run_id>/run_summary.json`
pub async fn write_run_report(reports_dir: &Path, summary: &RunSummary) -> Result<PathBuf> {
    let run_dir = reports_dir.join(summary.run_id.to_string());
    fs::create_dir_all(&run_dir)
        .await
        .with_context(|| format!("creating {}", run_dir.display()))?;
    let path = run_dir.join("run_summary.json");
    let bytes = serde_json::to_vec_pretty(summary).context("serializing run summary")?;
    fs::write(&path, bytes)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

/// JSON-lines output always; Postgres as well when a database URL is configured.
pub async fn open_sinks(config: &SyncConfig) -> Result<Arc<dyn RecordSink>> {
    let jsonl = JsonlSink::open(config.output_path.clone())
        .await
        .with_context(|| format!("opening {}", config.output_path.display()))?;
    let Some(database_url) = config.database_url.as_deref() else {
        return Ok(Arc::new(jsonl));
    };
    let postgres = PgSink::connect(database_url)
        .await
        .context("connecting postgres sink")?;
    Ok(Arc::new(FanoutSink::new(vec![Arc::new(jsonl), Arc::new(postgres)])))
}

pub async fn run_sync(config: &SyncConfig, only: Option<&str>) -> Result<SyncOutcome> {
    let registry = SourceRegistry::load(&config.registry_path()).await?;
    let sources = registry.select(only)?;
    let fetcher = HttpFetcher::new(config.http_client()).context("building http client")?;
    let sink = open_sinks(config).await?;
    let runner = SyncRunner::new(Arc::new(fetcher), sink, config.http_timeout());
    runner.run_and_report(&sources, &config.reports_dir).await
}

pub async fn run_sync_from_env(only: Option<&str>) -> Result<SyncOutcome> {
    run_sync(&SyncConfig::from_env(), only).await
}
