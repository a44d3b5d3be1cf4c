//! One source, one worker: walk listing pages to exhaustion and turn every
//! discovered item into a stored record before touching the next one.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use cpr_adapters::{ExtractError, Extractor, PageToken};
use cpr_core::{assemble_record, AssembleError, AssemblyOptions, RawListingItem};
use cpr_storage::{RecordSink, SinkError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct TraversalSettings {
    pub scraped_at: NaiveDate,
    /// Pause before every request except the first one of the traversal.
    pub request_delay: Duration,
    pub max_pages: Option<u32>,
    pub assembly: AssemblyOptions,
}

impl TraversalSettings {
    pub fn new(scraped_at: NaiveDate) -> Self {
        Self {
            scraped_at,
            request_delay: Duration::ZERO,
            max_pages: None,
            assembly: AssemblyOptions::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TraversalFailure {
    #[error("listing {page} failed: {source}")]
    Listing {
        page: PageToken,
        #[source]
        source: ExtractError,
    },
    #[error("detail {url} failed: {source}")]
    Detail {
        url: String,
        #[source]
        source: ExtractError,
    },
    #[error("record {url:?} could not be assembled: {source}")]
    Assembly {
        url: String,
        #[source]
        source: AssembleError,
    },
    #[error("storing {url} failed: {source}")]
    Sink {
        url: String,
        #[source]
        source: SinkError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Listing,
    Detail,
    Assembly,
    Sink,
}

impl TraversalFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Listing { .. } => FailureKind::Listing,
            Self::Detail { .. } => FailureKind::Detail,
            Self::Assembly { .. } => FailureKind::Assembly,
            Self::Sink { .. } => FailureKind::Sink,
        }
    }

    /// Item URL; listing failures have none.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Listing { .. } => None,
            Self::Detail { url, .. } | Self::Assembly { url, .. } | Self::Sink { url, .. } => Some(url),
        }
    }
}

/// One line of the failure log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub kind: FailureKind,
    pub url: Option<String>,
    /// Listing page the failing item (or the failing listing) came from.
    pub page: Option<PageToken>,
    pub cause: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EmptyPage,
    /// No next link, and the page was shorter than the requested size.
    LastPage,
    RepeatedPage,
    MaxPages,
    ListingFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReport {
    pub source_id: String,
    pub source_name: String,
    pub pages: u32,
    pub records: usize,
    pub skipped_duplicates: usize,
    pub parse_failures: usize,
    /// One entry per listing target, in traversal order.
    pub stops: Vec<StopReason>,
    pub failures: Vec<FailureRecord>,
}

impl SourceReport {
    fn new(source_id: String, source_name: String) -> Self {
        Self {
            source_id,
            source_name,
            pages: 0,
            records: 0,
            skipped_duplicates: 0,
            parse_failures: 0,
            stops: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn failures_of(&self, kind: FailureKind) -> usize {
        self.failures.iter().filter(|f| f.kind == kind).count()
    }
}

/// Pagination traversal for one source. Several listing targets can be run
/// through the same traversal; URLs already seen in any of them are skipped.
pub struct Traversal {
    report: SourceReport,
    settings: TraversalSettings,
    sink: Arc<dyn RecordSink>,
    seen_urls: HashSet<String>,
    requests: u64,
}

impl Traversal {
    pub fn new(
        source_id: impl Into<String>,
        source_name: impl Into<String>,
        settings: TraversalSettings,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        Self {
            report: SourceReport::new(source_id.into(), source_name.into()),
            settings,
            sink,
            seen_urls: HashSet::new(),
            requests: 0,
        }
    }

    pub fn report(&self) -> &SourceReport {
        &self.report
    }

    pub fn into_report(self) -> SourceReport {
        self.report
    }

    /// Walk one listing entry point until it is exhausted or its listing fails.
    /// Item-level failures are recorded and skipped; nothing escapes the loop.
    pub async fn run(&mut self, extractor: &dyn Extractor) -> StopReason {
        let stop = self.walk(extractor).await;
        info!(
            source = %self.report.source_id,
            pages = self.report.pages,
            records = self.report.records,
            ?stop,
            "listing target finished"
        );
        self.report.stops.push(stop);
        stop
    }

    async fn walk(&mut self, extractor: &dyn Extractor) -> StopReason {
        let mut token = extractor.first_page();
        let mut visited = HashSet::new();
        let mut fetched = 0u32;

        loop {
            if self.settings.max_pages.is_some_and(|max| fetched >= max) {
                return StopReason::MaxPages;
            }
            if !visited.insert(token.clone()) {
                debug!(source = %self.report.source_id, page = %token, "page token repeated");
                return StopReason::RepeatedPage;
            }

            self.pace().await;
            let page = match extractor.list_page(&token).await {
                Ok(page) => page,
                Err(source) => {
                    let failure = TraversalFailure::Listing {
                        page: token.clone(),
                        source,
                    };
                    self.record(failure, &token);
                    return StopReason::ListingFailed;
                }
            };
            fetched += 1;
            self.report.pages += 1;
            debug!(source = %self.report.source_id, page = %token, items = page.items.len(), "listing page");

            if page.items.is_empty() {
                return StopReason::EmptyPage;
            }
            let item_count = page.items.len();
            for item in page.items {
                self.visit(extractor, item, &token).await;
            }

            match next_token(&token, page.next, item_count, extractor.page_size()) {
                Some(next) => token = next,
                None => return StopReason::LastPage,
            }
        }
    }

    async fn visit(&mut self, extractor: &dyn Extractor, item: RawListingItem, page: &PageToken) {
        if !self.seen_urls.insert(item.url.clone()) {
            self.report.skipped_duplicates += 1;
            debug!(source = %self.report.source_id, url = %item.url, "already emitted");
            return;
        }

        self.pace().await;
        let detail = match extractor.detail(&item.url).await {
            Ok(detail) => detail,
            Err(source) => {
                self.record(TraversalFailure::Detail { url: item.url, source }, page);
                return;
            }
        };

        let assembled = match assemble_record(
            extractor.source_name(),
            &item,
            &detail,
            self.settings.scraped_at,
            &self.settings.assembly,
        ) {
            Ok(assembled) => assembled,
            Err(source) => {
                self.record(TraversalFailure::Assembly { url: item.url, source }, page);
                return;
            }
        };
        self.report.parse_failures += assembled.parse_failures.len();

        match self.sink.store(&assembled.record).await {
            Ok(()) => self.report.records += 1,
            Err(source) => self.record(TraversalFailure::Sink { url: item.url, source }, page),
        }
    }

    async fn pace(&mut self) {
        if self.requests > 0 && !self.settings.request_delay.is_zero() {
            tokio::time::sleep(self.settings.request_delay).await;
        }
        self.requests += 1;
    }

    fn record(&mut self, failure: TraversalFailure, page: &PageToken) {
        let source = self.report.source_id.as_str();
        match failure.kind() {
            FailureKind::Listing => error!(source, page = %page, error = %failure, "listing failed, source stopped"),
            _ => warn!(source, page = %page, error = %failure, "item skipped"),
        }
        self.report.failures.push(FailureRecord {
            kind: failure.kind(),
            url: failure.url().map(str::to_string),
            page: Some(page.clone()),
            cause: failure.to_string(),
        });
    }
}

/// An explicit next token wins. Without one, a page that came back full is
/// followed by the next numbered page; anything else ends the traversal.
pub(crate) fn next_token(
    current: &PageToken,
    next: Option<PageToken>,
    item_count: usize,
    page_size: Option<usize>,
) -> Option<PageToken> {
    if next.is_some() {
        return next;
    }
    match page_size {
        Some(size) if item_count >= size => current.advance(),
        _ => None,
    }
}
