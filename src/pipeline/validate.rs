use crate::constants::VALIDATION_SAMPLE_SIZE;
use crate::error::Result;
use crate::storage::TripStore;
use tracing::info;

/// Post-load sanity check: a row count and a small unordered sample, both
/// logged for eyeballing. Read-only; any database error is as fatal here as
/// it would be during the load.
pub async fn validate(store: &dyn TripStore, table: &str) -> Result<()> {
    let count = store.count(table).await?;
    info!(table, "rows in database: {count}");

    let sample = store.sample(table, VALIDATION_SAMPLE_SIZE).await?;
    for trip in &sample {
        info!(
            pickup = %trip.tpep_pickup_datetime,
            dropoff = %trip.tpep_dropoff_datetime,
            distance = trip.trip_distance,
            total = trip.total_amount,
            duration_minutes = trip.trip_duration_minutes,
            avg_speed_mph = trip.avg_speed_mph,
            "sample row"
        );
    }
    Ok(())
}
