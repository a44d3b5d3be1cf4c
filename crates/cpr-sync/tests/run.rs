use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cpr_core::StockStatus;
use cpr_storage::{FetchError, FetchedResponse, Headers, MemorySink, Transport};
use cpr_sync::{FailureKind, SourceRegistry, StopReason, SyncRunner};

const REGISTRY: &str = r#"
sources:
  - source_id: atlantic-cigar
    display_name: Atlantic Cigar
    enabled: true
    extractor: atlantic-cigar
    listing_targets:
      - url: https://atlanticcigar.com/cigars/all-cigars/?_bc_fsnf=1&Strength=Full
        label: Full
  - source_id: famous-smoke
    display_name: Famous Smoke Shop
    enabled: true
    extractor: famous-smoke
    listing_targets:
      - url: https://www.famous-smoke.com/cigars/strength/full
        label: Full
"#;

struct FixtureTransport {
    routes: HashMap<String, PathBuf>,
}

impl FixtureTransport {
    fn new(routes: &[(&str, &str)]) -> Self {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures");
        Self {
            routes: routes
                .iter()
                .map(|(url, file)| (url.to_string(), root.join(file)))
                .collect(),
        }
    }
}

#[async_trait]
impl Transport for FixtureTransport {
    async fn get(&self, url: &str, _headers: &Headers, _timeout: Duration) -> Result<FetchedResponse, FetchError> {
        let Some(path) = self.routes.get(url) else {
            return Err(FetchError::HttpStatus {
                status: 404,
                url: url.to_string(),
            });
        };
        let body = std::fs::read(path).unwrap_or_else(|err| panic!("reading {}: {err}", path.display()));
        Ok(FetchedResponse {
            status: 200,
            final_url: url.to_string(),
            body,
        })
    }
}

fn transport() -> Arc<FixtureTransport> {
    let full = "https://atlanticcigar.com/cigars/all-cigars/?_bc_fsnf=1&Strength=Full";
    let page_one = format!("{full}&page=1");
    let page_two = format!("{full}&page=2");
    Arc::new(FixtureTransport::new(&[
        (page_one.as_str(), "atlantic-cigar/listing_full_p1.html"),
        (page_two.as_str(), "atlantic-cigar/listing_full_p2.html"),
        (
            "https://atlanticcigar.com/padron-1964-anniversary-exclusivo-maduro/",
            "atlantic-cigar/detail_padron_1964.html",
        ),
    ]))
}

#[tokio::test]
async fn failing_source_does_not_affect_the_other() {
    let registry = SourceRegistry::from_yaml(REGISTRY).expect("registry");
    let sources = registry.select(None).expect("select");
    let sink = Arc::new(MemorySink::new());
    let runner = SyncRunner::new(transport(), sink.clone(), Duration::from_secs(5));
    let reports_dir = tempfile::tempdir().expect("tempdir");

    let outcome = runner
        .run_and_report(&sources, reports_dir.path())
        .await
        .expect("run");
    let summary = &outcome.summary;

    assert_eq!(summary.records, 1);
    assert_eq!(summary.failures, 2);
    assert_eq!(summary.sources.len(), 2);

    let atlantic = &summary.sources[0];
    assert_eq!(atlantic.source_id, "atlantic-cigar");
    assert_eq!(atlantic.pages, 2);
    assert_eq!(atlantic.records, 1);
    assert_eq!(atlantic.stops, vec![StopReason::EmptyPage]);
    assert_eq!(atlantic.failures_of(FailureKind::Detail), 1);
    assert_eq!(
        atlantic.failures[0].url.as_deref(),
        Some("https://atlanticcigar.com/liga-privada-no-9-toro/")
    );

    let famous = &summary.sources[1];
    assert_eq!(famous.source_id, "famous-smoke");
    assert_eq!(famous.records, 0);
    assert_eq!(famous.stops, vec![StopReason::ListingFailed]);
    assert_eq!(famous.failures_of(FailureKind::Listing), 1);

    let records = sink.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].source_name, "Atlantic Cigar");
    assert_eq!(records[0].scraped_at, summary.scraped_at);
    assert_eq!(records[0].stock_status, StockStatus::InStock);

    assert!(outcome.report_path.starts_with(reports_dir.path()));
    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&outcome.report_path).expect("read")).expect("json");
    assert_eq!(written["run_id"], summary.run_id.to_string());
    assert_eq!(written["sources"][1]["failures"][0]["kind"], "listing");
}

#[tokio::test]
async fn named_source_runs_alone() {
    let registry = SourceRegistry::from_yaml(REGISTRY).expect("registry");
    let sources = registry.select(Some("atlantic-cigar")).expect("select");
    let sink = Arc::new(MemorySink::new());
    let runner = SyncRunner::new(transport(), sink.clone(), Duration::from_secs(5));

    let reports = runner
        .run(&sources, chrono::NaiveDate::from_ymd_opt(2026, 3, 2).expect("date"))
        .await
        .expect("run");

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].records, 1);
    assert_eq!(sink.len().await, 1);
}

#[tokio::test]
async fn listing_failure_ends_the_source_before_its_remaining_targets() {
    let registry = SourceRegistry::from_yaml(
        r#"
sources:
  - source_id: atlantic-cigar
    display_name: Atlantic Cigar
    enabled: true
    extractor: atlantic-cigar
    listing_targets:
      - url: https://atlanticcigar.com/cigars/all-cigars/?_bc_fsnf=1&Strength=Mild
        label: Mild
      - url: https://atlanticcigar.com/cigars/all-cigars/?_bc_fsnf=1&Strength=Medium
        label: Medium
      - url: https://atlanticcigar.com/cigars/all-cigars/?_bc_fsnf=1&Strength=Full
        label: Full
"#,
    )
    .expect("registry");
    let sources = registry.select(None).expect("select");
    let sink = Arc::new(MemorySink::new());
    let runner = SyncRunner::new(transport(), sink.clone(), Duration::from_secs(5));

    let reports = runner
        .run(&sources, chrono::NaiveDate::from_ymd_opt(2026, 3, 2).expect("date"))
        .await
        .expect("run");

    let report = &reports[0];
    assert_eq!(report.stops, vec![StopReason::ListingFailed]);
    assert_eq!(report.failures_of(FailureKind::Listing), 1);
    assert_eq!(report.pages, 0);
    assert_eq!(sink.len().await, 0);
}
