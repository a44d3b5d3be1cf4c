use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use cpr_core::CanonicalRecord;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serializing record {url}: {source}")]
    Serialize {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("database error for {url}: {source}")]
    Database {
        url: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("connecting to database: {0}")]
    Connect(#[source] sqlx::Error),
    #[error("{failed} of {total} sinks rejected the record; first: {first}")]
    Fanout {
        failed: usize,
        total: usize,
        first: Box<SinkError>,
    },
}

/// Accepts finished records. Implementations must tolerate concurrent calls
/// from several traversals; each `store` is self-contained.
#[async_trait]
pub trait RecordSink: Send + Sync {
    fn name(&self) -> &str;

    async fn store(&self, record: &CanonicalRecord) -> Result<(), SinkError>;
}

/// Appends one JSON document per line.
#[derive(Debug)]
pub struct JsonlSink {
    path: PathBuf,
    file: Mutex<fs::File>,
}

impl JsonlSink {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|source| SinkError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| SinkError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RecordSink for JsonlSink {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn store(&self, record: &CanonicalRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(record).map_err(|source| SinkError::Serialize {
            url: record.url.clone(),
            source,
        })?;
        line.push(b'\n');

        let io_err = |source| SinkError::Io {
            path: self.path.clone(),
            source,
        };
        let mut file = self.file.lock().await;
        file.write_all(&line).await.map_err(io_err)?;
        file.flush().await.map_err(io_err)
    }
}

/// Keeps records in memory; handy for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<CanonicalRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<CanonicalRecord> {
        self.records.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn store(&self, record: &CanonicalRecord) -> Result<(), SinkError> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }
}

/// Writes every record to each inner sink. All sinks are attempted even
/// when an earlier one fails.
pub struct FanoutSink {
    sinks: Vec<Arc<dyn RecordSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn RecordSink>>) -> Self {
        Self { sinks }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl RecordSink for FanoutSink {
    fn name(&self) -> &str {
        "fanout"
    }

    async fn store(&self, record: &CanonicalRecord) -> Result<(), SinkError> {
        let mut errors = Vec::new();
        for sink in &self.sinks {
            if let Err(err) = sink.store(record).await {
                warn!(sink = sink.name(), url = %record.url, error = %err, "sink rejected record");
                errors.push(err);
            }
        }

        let failed = errors.len();
        match errors.into_iter().next() {
            None => Ok(()),
            Some(first) => Err(SinkError::Fanout {
                failed,
                total: self.sinks.len(),
                first: Box::new(first),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use cpr_core::StockStatus;

    fn record(url: &str) -> CanonicalRecord {
        CanonicalRecord {
            source_name: "Test Shop".to_string(),
            url: url.to_string(),
            scraped_at: NaiveDate::from_ymd_opt(2026, 3, 1).expect("date"),
            product_name: Some("Padron 1964 Anniversary Exclusivo".to_string()),
            brand: Some("Padron".to_string()),
            length_inches: Some(5.5),
            ring_gauge: Some(50),
            shape: Some("Robusto".to_string()),
            wrapper_color: Some("Maduro".to_string()),
            wrapper_leaf: None,
            wrapper_origin_country: Some("Nicaragua".to_string()),
            binder: None,
            filler: None,
            country_of_origin: Some("Nicaragua".to_string()),
            price_per_unit: Some(18.5),
            price_per_bundle: None,
            bundle_quantity: None,
            price_per_box: None,
            box_quantity: Some(25),
            stock_status: StockStatus::InStock,
            rating: Some(4.0),
            review_count: Some(12),
            strength_or_profile: Some("Full".to_string()),
            notes: None,
        }
    }

    struct FailingSink;

    #[async_trait]
    impl RecordSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        async fn store(&self, record: &CanonicalRecord) -> Result<(), SinkError> {
            Err(SinkError::Io {
                path: PathBuf::from("/dev/full"),
                source: std::io::Error::other(format!("refusing {}", record.url)),
            })
        }
    }

    #[tokio::test]
    async fn jsonl_appends_one_record_per_line() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested/out/records.jsonl");
        let sink = JsonlSink::open(&path).await.expect("open");

        sink.store(&record("https://shop.test/a")).await.expect("store a");
        sink.store(&record("https://shop.test/b")).await.expect("store b");

        let text = std::fs::read_to_string(&path).expect("read back");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: CanonicalRecord = serde_json::from_str(lines[0]).expect("parse line");
        assert_eq!(first, record("https://shop.test/a"));
        assert!(lines[1].contains("\"stock_status\":\"In Stock\""));
    }

    #[tokio::test]
    async fn jsonl_reopen_appends() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("records.jsonl");
        JsonlSink::open(&path)
            .await
            .expect("open")
            .store(&record("https://shop.test/a"))
            .await
            .expect("store");
        JsonlSink::open(&path)
            .await
            .expect("reopen")
            .store(&record("https://shop.test/b"))
            .await
            .expect("store");

        let text = std::fs::read_to_string(&path).expect("read back");
        assert_eq!(text.lines().count(), 2);
    }

    #[tokio::test]
    async fn concurrent_writers_do_not_interleave() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("records.jsonl");
        let sink = Arc::new(JsonlSink::open(&path).await.expect("open"));

        let mut handles = Vec::new();
        for worker in 0..4 {
            let sink = sink.clone();
            handles.push(tokio::spawn(async move {
                for item in 0..25 {
                    let url = format!("https://shop.test/{worker}/{item}");
                    sink.store(&record(&url)).await.expect("store");
                }
            }));
        }
        for handle in handles {
            handle.await.expect("join");
        }

        let text = std::fs::read_to_string(&path).expect("read back");
        let parsed: Vec<CanonicalRecord> = text
            .lines()
            .map(|line| serde_json::from_str(line).expect("every line is a record"))
            .collect();
        assert_eq!(parsed.len(), 100);
    }

    #[tokio::test]
    async fn fanout_tries_every_sink_and_reports_failure() {
        let memory = Arc::new(MemorySink::new());
        let fanout = FanoutSink::new(vec![Arc::new(FailingSink), memory.clone()]);

        let err = fanout
            .store(&record("https://shop.test/a"))
            .await
            .expect_err("failing sink surfaces");
        assert!(matches!(err, SinkError::Fanout { failed: 1, total: 2, .. }));
        assert_eq!(memory.len().await, 1);
    }
}
