use crate::domain::CleanedTrip;
use crate::error::Result;
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolCopyExt};
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Destination columns, in COPY / DDL order.
const COLUMNS: &str = "vendor_id, tpep_pickup_datetime, tpep_dropoff_datetime, \
     passenger_count, trip_distance, ratecode_id, store_and_fwd_flag, \
     pu_location_id, do_location_id, payment_type, fare_amount, extra, \
     mta_tax, tip_amount, tolls_amount, improvement_surcharge, total_amount, \
     congestion_surcharge, airport_fee, trip_duration_minutes, avg_speed_mph";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Store port for the destination table. Writes are append-only; existing
/// rows are never modified or removed.
#[async_trait]
pub trait TripStore: Send + Sync {
    /// Creates the destination table when it does not exist yet.
    async fn ensure_table(&self, table: &str) -> Result<()>;

    /// Appends one batch of rows, returning the number written.
    async fn append(&self, table: &str, trips: &[CleanedTrip]) -> Result<u64>;

    /// Total rows currently in the table.
    async fn count(&self, table: &str) -> Result<i64>;

    /// An unordered sample of at most `limit` rows.
    async fn sample(&self, table: &str, limit: i64) -> Result<Vec<CleanedTrip>>;
}

/// PostgreSQL-backed store. Batches go through `COPY ... FROM STDIN` since
/// a 100k-row batch exceeds what a single prepared statement can bind.
pub struct PgTripStore {
    pool: PgPool,
}

impl PgTripStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TripStore for PgTripStore {
    async fn ensure_table(&self, table: &str) -> Result<()> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {table} (\
                vendor_id BIGINT, \
                tpep_pickup_datetime TIMESTAMP NOT NULL, \
                tpep_dropoff_datetime TIMESTAMP NOT NULL, \
                passenger_count DOUBLE PRECISION, \
                trip_distance DOUBLE PRECISION NOT NULL, \
                ratecode_id DOUBLE PRECISION, \
                store_and_fwd_flag TEXT, \
                pu_location_id BIGINT, \
                do_location_id BIGINT, \
                payment_type BIGINT, \
                fare_amount DOUBLE PRECISION, \
                extra DOUBLE PRECISION, \
                mta_tax DOUBLE PRECISION, \
                tip_amount DOUBLE PRECISION, \
                tolls_amount DOUBLE PRECISION, \
                improvement_surcharge DOUBLE PRECISION, \
                total_amount DOUBLE PRECISION NOT NULL, \
                congestion_surcharge DOUBLE PRECISION, \
                airport_fee DOUBLE PRECISION, \
                trip_duration_minutes DOUBLE PRECISION NOT NULL, \
                avg_speed_mph DOUBLE PRECISION NOT NULL\
            )"
        );
        sqlx::query(&ddl).execute(&self.pool).await?;
        Ok(())
    }

    async fn append(&self, table: &str, trips: &[CleanedTrip]) -> Result<u64> {
        if trips.is_empty() {
            return Ok(0);
        }

        let statement = format!("COPY {table} ({COLUMNS}) FROM STDIN WITH (FORMAT csv)");
        let mut copy = self.pool.copy_in_raw(&statement).await?;

        let mut buf = String::new();
        for trip in trips {
            encode_csv_row(&mut buf, trip);
        }
        copy.send(buf.as_bytes()).await?;
        let written = copy.finish().await?;

        debug!(rows = written, table, "batch committed");
        Ok(written)
    }

    async fn count(&self, table: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn sample(&self, table: &str, limit: i64) -> Result<Vec<CleanedTrip>> {
        let rows = sqlx::query_as::<_, CleanedTrip>(&format!(
            "SELECT {COLUMNS} FROM {table} LIMIT {limit}"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

/// One trip as a CSV line in COPY's dialect: empty field means NULL, text
/// fields are RFC-4180 quoted when they need to be.
fn encode_csv_row(buf: &mut String, trip: &CleanedTrip) {
    push_opt_i64(buf, trip.vendor_id);
    buf.push(',');
    let _ = write!(buf, "{}", trip.tpep_pickup_datetime.format(TIMESTAMP_FORMAT));
    buf.push(',');
    let _ = write!(buf, "{}", trip.tpep_dropoff_datetime.format(TIMESTAMP_FORMAT));
    buf.push(',');
    push_opt_f64(buf, trip.passenger_count);
    buf.push(',');
    let _ = write!(buf, "{}", trip.trip_distance);
    buf.push(',');
    push_opt_f64(buf, trip.ratecode_id);
    buf.push(',');
    push_opt_text(buf, trip.store_and_fwd_flag.as_deref());
    buf.push(',');
    push_opt_i64(buf, trip.pu_location_id);
    buf.push(',');
    push_opt_i64(buf, trip.do_location_id);
    buf.push(',');
    push_opt_i64(buf, trip.payment_type);
    buf.push(',');
    push_opt_f64(buf, trip.fare_amount);
    buf.push(',');
    push_opt_f64(buf, trip.extra);
    buf.push(',');
    push_opt_f64(buf, trip.mta_tax);
    buf.push(',');
    push_opt_f64(buf, trip.tip_amount);
    buf.push(',');
    push_opt_f64(buf, trip.tolls_amount);
    buf.push(',');
    push_opt_f64(buf, trip.improvement_surcharge);
    buf.push(',');
    let _ = write!(buf, "{}", trip.total_amount);
    buf.push(',');
    push_opt_f64(buf, trip.congestion_surcharge);
    buf.push(',');
    push_opt_f64(buf, trip.airport_fee);
    buf.push(',');
    let _ = write!(buf, "{}", trip.trip_duration_minutes);
    buf.push(',');
    let _ = write!(buf, "{}", trip.avg_speed_mph);
    buf.push('\n');
}

fn push_opt_i64(buf: &mut String, value: Option<i64>) {
    if let Some(v) = value {
        let _ = write!(buf, "{v}");
    }
}

fn push_opt_f64(buf: &mut String, value: Option<f64>) {
    if let Some(v) = value {
        let _ = write!(buf, "{v}");
    }
}

fn push_opt_text(buf: &mut String, value: Option<&str>) {
    match value {
        // An unquoted empty field is NULL to COPY; a quoted one is ''.
        Some(s) if s.is_empty() => buf.push_str("\"\""),
        Some(s) if s.contains([',', '"', '\n', '\r']) => {
            buf.push('"');
            buf.push_str(&s.replace('"', "\"\""));
            buf.push('"');
        }
        Some(s) => buf.push_str(s),
        None => {}
    }
}

/// In-memory store for tests and dry runs, one `Vec` per table.
#[derive(Default)]
pub struct InMemoryTripStore {
    tables: Arc<Mutex<HashMap<String, Vec<CleanedTrip>>>>,
}

impl InMemoryTripStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TripStore for InMemoryTripStore {
    async fn ensure_table(&self, table: &str) -> Result<()> {
        let mut tables = self.tables.lock().unwrap();
        tables.entry(table.to_string()).or_default();
        Ok(())
    }

    async fn append(&self, table: &str, trips: &[CleanedTrip]) -> Result<u64> {
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(table.to_string()).or_default();
        rows.extend_from_slice(trips);
        debug!(rows = trips.len(), table, "batch committed (in-memory)");
        Ok(trips.len() as u64)
    }

    async fn count(&self, table: &str) -> Result<i64> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.get(table).map_or(0, |rows| rows.len()) as i64)
    }

    async fn sample(&self, table: &str, limit: i64) -> Result<Vec<CleanedTrip>> {
        let tables = self.tables.lock().unwrap();
        let rows = tables
            .get(table)
            .map(|rows| rows.iter().take(limit as usize).cloned().collect())
            .unwrap_or_default();
        Ok(rows)
    }
}
