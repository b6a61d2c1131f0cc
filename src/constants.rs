/// Compiled-in defaults for the job. `config.toml` (and `DATABASE_URL`) can
/// override any of these at startup; nothing reads them after `Config::load`.

// Source dataset
pub const DEFAULT_DATA_PATH: &str = "data/yellow_tripdata_2025-01.parquet";

// Destination database
pub const DEFAULT_DB_USER: &str = "postgres";
pub const DEFAULT_DB_PASSWORD: &str = "4121";
pub const DEFAULT_DB_HOST: &str = "localhost";
pub const DEFAULT_DB_PORT: u16 = 5432;
pub const DEFAULT_DB_NAME: &str = "nyc_taxi";
pub const DEFAULT_TABLE_NAME: &str = "yellow_taxi_trips";

// Rows per COPY round trip
pub const DEFAULT_BATCH_SIZE: usize = 100_000;

// Rows fetched by the post-load validation sample
pub const VALIDATION_SAMPLE_SIZE: i64 = 5;

// Config file looked up when --config is not given
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
