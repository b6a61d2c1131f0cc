use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

use taxi_etl::config::Config;
use taxi_etl::logging;
use taxi_etl::pipeline::{extract, load, transform, validate};
use taxi_etl::storage::PgTripStore;

#[derive(Parser)]
#[command(name = "taxi_etl")]
#[command(about = "Batch ETL for NYC yellow-taxi trip records")]
#[command(version = "0.1.0")]
struct Cli {
    /// Alternate config file (defaults to ./config.toml, falling back to
    /// compiled-in settings)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let _guard = logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    let start = Instant::now();

    let raw = extract::extract(&config.source.path)?;
    let cleaned = transform::transform(raw);

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&config.database.connection_url())
        .await?;
    let store = PgTripStore::new(pool);

    load::load(&store, &config.load, &cleaned).await?;
    validate::validate(&store, &config.load.table).await?;

    info!(
        "etl completed in {:.1} seconds",
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
