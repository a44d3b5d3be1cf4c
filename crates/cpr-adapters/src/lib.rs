//! Per-source extractors: the only place that knows page markup.
//!
//! Every extractor maps one retailer's (or review site's) listing and detail pages to raw
//! candidate strings ([`RawListingItem`] / [`RawItem`]). Traversal,
//! reconciliation and persistence never look at HTML.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cpr_core::{RawItem, RawListingItem};
use cpr_storage::{FetchError, Transport};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

mod atlantic;
mod cigar_aficionado;
mod cigarbid;
mod cigars_direct;
mod famous_smoke;
mod gotham;
mod html;

pub use atlantic::AtlanticCigar;
pub use cigar_aficionado::CigarAficionado;
pub use cigarbid::CigarBid;
pub use cigars_direct::CigarsDirect;
pub use famous_smoke::FamousSmoke;
pub use gotham::GothamCigars;

pub const CRATE_NAME: &str = "cpr-adapters";

/// Extractor kinds accepted by [`build_extractor`].
pub const EXTRACTOR_KINDS: &[&str] = &[
    "atlantic-cigar",
    "famous-smoke",
    "gotham-cigars",
    "cigars-direct",
    "cigar-aficionado",
    "cigarbid",
];

/// Where the next listing page lives: a page number or an explicit link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PageToken {
    Page(u32),
    Url(String),
}

impl PageToken {
    /// The numbered page after this one. Link tokens cannot be advanced
    /// without the page telling us where to go.
    pub fn advance(&self) -> Option<PageToken> {
        match self {
            Self::Page(n) => n.checked_add(1).map(Self::Page),
            Self::Url(_) => None,
        }
    }
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Page(n) => write!(f, "page {n}"),
            Self::Url(url) => f.write_str(url),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingPage {
    pub items: Vec<RawListingItem>,
    /// `None` when the page has no "next" affordance.
    pub next: Option<PageToken>,
}

/// One listing entry point of a source, e.g. a strength category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingTarget {
    pub url: String,
    /// Category label; becomes the lowest-precedence strength candidate.
    #[serde(default)]
    pub label: Option<String>,
}

impl ListingTarget {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("invalid selector {selector:?}: {message}")]
    Selector { selector: String, message: String },
    #[error("invalid json from {url}: {source}")]
    Json {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid url {url:?}: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unknown extractor {0:?}")]
    UnknownExtractor(String),
}

/// The per-source capability the traversal is parameterized by.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Retailer name stamped on every record.
    fn source_name(&self) -> &str;

    fn first_page(&self) -> PageToken {
        PageToken::Page(1)
    }

    /// Items requested per listing page, when the source lets us ask.
    fn page_size(&self) -> Option<usize> {
        None
    }

    async fn list_page(&self, page: &PageToken) -> Result<ListingPage, ExtractError>;

    async fn detail(&self, url: &str) -> Result<RawItem, ExtractError>;
}

/// Transport plus the per-source request settings.
#[derive(Clone)]
pub struct SourceHttp {
    transport: Arc<dyn Transport>,
    headers: Vec<(String, String)>,
    timeout: Duration,
}

impl fmt::Debug for SourceHttp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceHttp")
            .field("headers", &self.headers)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl SourceHttp {
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        Self {
            transport,
            headers: Vec::new(),
            timeout,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub async fn get_text(&self, url: &str) -> Result<String, ExtractError> {
        debug!(url, "fetching page");
        let response = self.transport.get(url, &self.headers, self.timeout).await?;
        Ok(response.text())
    }
}

pub(crate) fn parse_url(url: &str) -> Result<Url, ExtractError> {
    Url::parse(url).map_err(|source| ExtractError::Url {
        url: url.to_string(),
        source,
    })
}

/// Resolve a possibly relative link against the page it was found on.
pub(crate) fn absolute_url(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    base.join(href).ok().map(String::from)
}

/// `url` with `name=value` appended to its query string.
pub(crate) fn with_query_param(url: &str, name: &str, value: impl fmt::Display) -> Result<String, ExtractError> {
    let mut parsed = parse_url(url)?;
    parsed.query_pairs_mut().append_pair(name, &value.to_string());
    Ok(parsed.into())
}

/// Build the extractor for `kind`, bound to one listing target.
///
/// `page_size` only matters to sources that let the client choose it; the
/// others ignore it.
pub fn build_extractor(
    kind: &str,
    source_name: &str,
    target: ListingTarget,
    http: SourceHttp,
    page_size: Option<usize>,
) -> Result<Box<dyn Extractor>, ExtractError> {
    let source_name = source_name.to_string();
    match kind {
        "atlantic-cigar" => Ok(Box::new(AtlanticCigar::new(source_name, target, http))),
        "famous-smoke" => Ok(Box::new(FamousSmoke::new(source_name, target, http))),
        "gotham-cigars" => Ok(Box::new(GothamCigars::new(source_name, target, http))),
        "cigar-aficionado" => Ok(Box::new(CigarAficionado::new(source_name, target, http))),
        "cigarbid" => Ok(Box::new(CigarBid::new(source_name, target, http))),
        "cigars-direct" => {
            let extractor = CigarsDirect::new(source_name, target, http);
            Ok(Box::new(match page_size {
                Some(size) => extractor.with_page_size(size),
                None => extractor,
            }))
        }
        other => Err(ExtractError::UnknownExtractor(other.to_string())),
    }
}
