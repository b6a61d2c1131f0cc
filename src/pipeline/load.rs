use crate::config::LoadConfig;
use crate::domain::CleanedTrip;
use crate::error::Result;
use crate::storage::TripStore;
use tracing::{debug, info};

/// Appends the cleaned table to the destination, one batch per round trip.
///
/// Batches commit independently; a failure mid-load leaves earlier batches
/// in place. That matches the job's fail-fast posture: the run is simply
/// re-executed, duplicates and all.
pub async fn load(store: &dyn TripStore, config: &LoadConfig, trips: &[CleanedTrip]) -> Result<()> {
    info!(
        table = %config.table,
        rows = trips.len(),
        "loading {} rows into {}",
        trips.len(),
        config.table
    );

    store.ensure_table(&config.table).await?;

    for (index, batch) in trips.chunks(config.batch_size).enumerate() {
        let written = store.append(&config.table, batch).await?;
        debug!(batch = index, rows = written, "batch written");
    }

    info!("load finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryTripStore;
    use chrono::NaiveDate;

    fn trip() -> CleanedTrip {
        let pickup = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        CleanedTrip {
            vendor_id: Some(1),
            tpep_pickup_datetime: pickup,
            tpep_dropoff_datetime: pickup + chrono::Duration::minutes(20),
            passenger_count: Some(1.0),
            trip_distance: 5.0,
            ratecode_id: Some(1.0),
            store_and_fwd_flag: Some("N".to_string()),
            pu_location_id: Some(142),
            do_location_id: Some(236),
            payment_type: Some(1),
            fare_amount: Some(18.4),
            extra: Some(1.0),
            mta_tax: Some(0.5),
            tip_amount: Some(4.0),
            tolls_amount: Some(0.0),
            improvement_surcharge: Some(1.0),
            total_amount: 24.9,
            congestion_surcharge: Some(2.5),
            airport_fee: Some(0.0),
            trip_duration_minutes: 20.0,
            avg_speed_mph: 15.0,
        }
    }

    fn config(batch_size: usize) -> LoadConfig {
        LoadConfig {
            table: "trips_test".to_string(),
            batch_size,
        }
    }

    #[tokio::test]
    async fn load_appends_to_existing_rows() {
        let store = InMemoryTripStore::new();

        // Pre-existing rows in the destination must survive a load.
        load(&store, &config(100), &[trip(), trip()]).await.unwrap();
        load(&store, &config(100), &[trip(), trip(), trip()]).await.unwrap();

        assert_eq!(store.count("trips_test").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn load_batches_cover_every_row() {
        let store = InMemoryTripStore::new();
        let trips: Vec<CleanedTrip> = (0..7).map(|_| trip()).collect();

        // batch_size 3 -> batches of 3, 3, 1
        load(&store, &config(3), &trips).await.unwrap();

        assert_eq!(store.count("trips_test").await.unwrap(), 7);
    }

    #[tokio::test]
    async fn empty_table_loads_zero_rows() {
        let store = InMemoryTripStore::new();
        load(&store, &config(100), &[]).await.unwrap();

        assert_eq!(store.count("trips_test").await.unwrap(), 0);
    }
}
