//! Serves fixture files in place of the network.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cpr_adapters::SourceHttp;
use cpr_storage::{FetchError, FetchedResponse, Headers, Transport};

pub fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures")
}

#[derive(Debug, Default)]
pub struct FixtureTransport {
    routes: HashMap<String, PathBuf>,
    requested: Mutex<Vec<String>>,
}

impl FixtureTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `url` with `fixtures/<source_id>/<file>`.
    pub fn route(mut self, url: &str, source_id: &str, file: &str) -> Self {
        self.routes
            .insert(url.to_string(), fixtures_root().join(source_id).join(file));
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().expect("lock").clone()
    }
}

#[async_trait]
impl Transport for FixtureTransport {
    async fn get(
        &self,
        url: &str,
        _headers: &Headers,
        _timeout: Duration,
    ) -> Result<FetchedResponse, FetchError> {
        self.requested.lock().expect("lock").push(url.to_string());
        let Some(path) = self.routes.get(url) else {
            return Err(FetchError::HttpStatus {
                status: 404,
                url: url.to_string(),
            });
        };
        let body = std::fs::read(path)
            .unwrap_or_else(|err| panic!("reading fixture {}: {err}", path.display()));
        Ok(FetchedResponse {
            status: 200,
            final_url: url.to_string(),
            body,
        })
    }
}

pub fn http(transport: Arc<FixtureTransport>) -> SourceHttp {
    SourceHttp::new(transport, Duration::from_secs(5))
}
