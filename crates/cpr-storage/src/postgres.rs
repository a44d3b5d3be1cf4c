use async_trait::async_trait;
use cpr_core::CanonicalRecord;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::debug;

use crate::sink::{RecordSink, SinkError};

const INSERT_RECORD: &str = r#"
INSERT INTO cigar_data (
    source_name, product_name, brand, length_inches, ring_gauge, shape,
    wrapper_color, wrapper_leaf, wrapper_origin_country, binder, filler,
    country_of_origin, price_per_unit, price_per_bundle, bundle_quantity,
    price_per_box, box_quantity, stock_status, rating, review_count,
    url, scraped_at, strength_or_profile, notes
)
VALUES (
    $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
    $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24
)
"#;

/// One `INSERT` per record into an existing `cigar_data` table. Rows are
/// keyed by `url` + `scraped_at`; the schema itself is managed elsewhere.
#[derive(Debug, Clone)]
pub struct PgSink {
    pool: PgPool,
}

impl PgSink {
    pub async fn connect(database_url: &str) -> Result<Self, SinkError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(SinkError::Connect)?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn as_i32(value: Option<u32>) -> Option<i32> {
    value.and_then(|v| i32::try_from(v).ok())
}

#[async_trait]
impl RecordSink for PgSink {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn store(&self, record: &CanonicalRecord) -> Result<(), SinkError> {
        sqlx::query(INSERT_RECORD)
            .bind(&record.source_name)
            .bind(&record.product_name)
            .bind(&record.brand)
            .bind(record.length_inches)
            .bind(as_i32(record.ring_gauge))
            .bind(&record.shape)
            .bind(&record.wrapper_color)
            .bind(&record.wrapper_leaf)
            .bind(&record.wrapper_origin_country)
            .bind(&record.binder)
            .bind(&record.filler)
            .bind(&record.country_of_origin)
            .bind(record.price_per_unit)
            .bind(record.price_per_bundle)
            .bind(as_i32(record.bundle_quantity))
            .bind(record.price_per_box)
            .bind(as_i32(record.box_quantity))
            .bind(record.stock_status.as_str())
            .bind(record.rating)
            .bind(as_i32(record.review_count))
            .bind(&record.url)
            .bind(record.scraped_at)
            .bind(&record.strength_or_profile)
            .bind(&record.notes)
            .execute(&self.pool)
            .await
            .map_err(|source| SinkError::Database {
                url: record.url.clone(),
                source,
            })?;
        debug!(key = %record.record_key(), "inserted record");
        Ok(())
    }
}
