use crate::domain::{CleanedTrip, RawTrip, Trip};
use chrono::NaiveDateTime;
use tracing::info;

/// Trips shorter than this are considered bogus odometer readings.
pub const MIN_TRIP_DISTANCE_MILES: f64 = 0.01;
/// Duration window, inclusive on both ends.
pub const MIN_DURATION_MINUTES: f64 = 1.0;
pub const MAX_DURATION_MINUTES: f64 = 360.0;
/// Plausible average speed window, inclusive on both ends.
pub const MIN_SPEED_MPH: f64 = 2.0;
pub const MAX_SPEED_MPH: f64 = 80.0;

/// Guards the speed division against zero-minute trips.
const SPEED_EPSILON_HOURS: f64 = 1e-6;

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Runs the full cleaning pipeline over the extracted table.
///
/// The step order is load-bearing: the median fill sees the table after the
/// null drop, and the duration/speed filters need the derived columns.
/// Degenerate input flows through as an empty table rather than an error.
pub fn transform(raw: Vec<RawTrip>) -> Vec<CleanedTrip> {
    info!("cleaning and transforming data");
    let before = raw.len();

    let trips = parse_and_drop_missing(raw);
    let trips = fill_passenger_count(trips);
    let trips = filter_distance(trips);
    let trips = filter_fare(trips);
    let trips = derive_columns(trips);
    let trips = filter_duration(trips);
    let trips = filter_speed(trips);
    let cleaned = round_float_columns(trips);

    info!(
        before,
        after = cleaned.len(),
        "after cleaning: {} rows remain",
        cleaned.len()
    );
    cleaned
}

/// Accepts `YYYY-MM-DD HH:MM:SS[.fff]` and the `T`-separated variant;
/// anything else becomes a null and drops the row in the next step.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw.trim(), format).ok())
}

/// Steps 1 and 2: parse the timestamp columns, then drop every row missing a
/// pickup, a dropoff or a distance. Survivors are narrowed to `Trip`, whose
/// type guarantees those three fields from here on.
fn parse_and_drop_missing(raw: Vec<RawTrip>) -> Vec<Trip> {
    raw.into_iter()
        .filter_map(|r| {
            let pickup = r.tpep_pickup_datetime.as_deref().and_then(parse_timestamp)?;
            let dropoff = r.tpep_dropoff_datetime.as_deref().and_then(parse_timestamp)?;
            let distance = r.trip_distance?;
            Some(Trip {
                vendor_id: r.vendor_id,
                tpep_pickup_datetime: pickup,
                tpep_dropoff_datetime: dropoff,
                passenger_count: r.passenger_count,
                trip_distance: distance,
                ratecode_id: r.ratecode_id,
                store_and_fwd_flag: r.store_and_fwd_flag,
                pu_location_id: r.pu_location_id,
                do_location_id: r.do_location_id,
                payment_type: r.payment_type,
                fare_amount: r.fare_amount,
                extra: r.extra,
                mta_tax: r.mta_tax,
                tip_amount: r.tip_amount,
                tolls_amount: r.tolls_amount,
                improvement_surcharge: r.improvement_surcharge,
                total_amount: r.total_amount,
                congestion_surcharge: r.congestion_surcharge,
                airport_fee: r.airport_fee,
            })
        })
        .collect()
}

/// Median over the non-null population; even lengths average the two middle
/// values. `None` when the population is empty.
fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Step 3: fill null passenger counts with the median of the current table.
/// With no non-null counts at all there is nothing to fill with, and the
/// nulls ride through untouched.
fn fill_passenger_count(mut trips: Vec<Trip>) -> Vec<Trip> {
    let observed: Vec<f64> = trips.iter().filter_map(|t| t.passenger_count).collect();
    if let Some(median) = median(observed) {
        for trip in &mut trips {
            trip.passenger_count.get_or_insert(median);
        }
    }
    trips
}

/// Step 4: drop sub-hundredth-mile trips.
fn filter_distance(mut trips: Vec<Trip>) -> Vec<Trip> {
    trips.retain(|t| t.trip_distance >= MIN_TRIP_DISTANCE_MILES);
    trips
}

/// Step 5: drop negative fares. Rows with no total at all go with them.
fn filter_fare(mut trips: Vec<Trip>) -> Vec<Trip> {
    trips.retain(|t| matches!(t.total_amount, Some(total) if total >= 0.0));
    trips
}

/// Step 6: compute duration and average speed for every remaining row.
fn derive_columns(trips: Vec<Trip>) -> Vec<CleanedTrip> {
    trips
        .into_iter()
        .filter_map(|t| {
            // Guaranteed present by the fare filter.
            let total_amount = t.total_amount?;
            let duration_minutes = (t.tpep_dropoff_datetime - t.tpep_pickup_datetime)
                .num_milliseconds() as f64
                / 60_000.0;
            let avg_speed_mph =
                t.trip_distance / (duration_minutes / 60.0 + SPEED_EPSILON_HOURS);
            Some(CleanedTrip {
                vendor_id: t.vendor_id,
                tpep_pickup_datetime: t.tpep_pickup_datetime,
                tpep_dropoff_datetime: t.tpep_dropoff_datetime,
                passenger_count: t.passenger_count,
                trip_distance: t.trip_distance,
                ratecode_id: t.ratecode_id,
                store_and_fwd_flag: t.store_and_fwd_flag,
                pu_location_id: t.pu_location_id,
                do_location_id: t.do_location_id,
                payment_type: t.payment_type,
                fare_amount: t.fare_amount,
                extra: t.extra,
                mta_tax: t.mta_tax,
                tip_amount: t.tip_amount,
                tolls_amount: t.tolls_amount,
                improvement_surcharge: t.improvement_surcharge,
                total_amount,
                congestion_surcharge: t.congestion_surcharge,
                airport_fee: t.airport_fee,
                trip_duration_minutes: duration_minutes,
                avg_speed_mph,
            })
        })
        .collect()
}

/// Step 7: keep durations within the inclusive window.
fn filter_duration(mut trips: Vec<CleanedTrip>) -> Vec<CleanedTrip> {
    trips.retain(|t| {
        (MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&t.trip_duration_minutes)
    });
    trips
}

/// Step 8: keep speeds within the inclusive window.
fn filter_speed(mut trips: Vec<CleanedTrip>) -> Vec<CleanedTrip> {
    trips.retain(|t| (MIN_SPEED_MPH..=MAX_SPEED_MPH).contains(&t.avg_speed_mph));
    trips
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round2_opt(value: Option<f64>) -> Option<f64> {
    value.map(round2)
}

/// Step 9: round every float column, derived ones included, to two decimals.
fn round_float_columns(trips: Vec<CleanedTrip>) -> Vec<CleanedTrip> {
    trips
        .into_iter()
        .map(|t| CleanedTrip {
            passenger_count: round2_opt(t.passenger_count),
            trip_distance: round2(t.trip_distance),
            ratecode_id: round2_opt(t.ratecode_id),
            fare_amount: round2_opt(t.fare_amount),
            extra: round2_opt(t.extra),
            mta_tax: round2_opt(t.mta_tax),
            tip_amount: round2_opt(t.tip_amount),
            tolls_amount: round2_opt(t.tolls_amount),
            improvement_surcharge: round2_opt(t.improvement_surcharge),
            total_amount: round2(t.total_amount),
            congestion_surcharge: round2_opt(t.congestion_surcharge),
            airport_fee: round2_opt(t.airport_fee),
            trip_duration_minutes: round2(t.trip_duration_minutes),
            avg_speed_mph: round2(t.avg_speed_mph),
            ..t
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A raw trip that survives every cleaning rule: 20 minutes, 5 miles.
    fn good_trip() -> RawTrip {
        RawTrip {
            vendor_id: Some(2),
            tpep_pickup_datetime: Some("2025-01-01 08:00:00".to_string()),
            tpep_dropoff_datetime: Some("2025-01-01 08:20:00".to_string()),
            passenger_count: Some(1.0),
            trip_distance: Some(5.0),
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
            total_amount: Some(24.9),
            congestion_surcharge: Some(2.5),
            airport_fee: Some(0.0),
        }
    }

    #[test]
    fn good_trip_is_retained_with_expected_derived_columns() {
        let cleaned = transform(vec![good_trip()]);
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].trip_duration_minutes, 20.0);
        assert_eq!(cleaned[0].avg_speed_mph, 15.0);
        assert_eq!(cleaned[0].total_amount, 24.9);
    }

    #[test]
    fn null_or_unparseable_timestamps_drop_the_row() {
        let mut missing = good_trip();
        missing.tpep_pickup_datetime = None;
        let mut garbage = good_trip();
        garbage.tpep_dropoff_datetime = Some("around eightish".to_string());

        assert!(transform(vec![missing, garbage]).is_empty());
    }

    #[test]
    fn null_distance_drops_the_row() {
        let mut trip = good_trip();
        trip.trip_distance = None;
        assert!(transform(vec![trip]).is_empty());
    }

    #[test]
    fn iso_t_separator_parses_too() {
        assert!(parse_timestamp("2025-01-01T08:00:00").is_some());
        assert!(parse_timestamp("2025-01-01 08:00:00.250").is_some());
        assert!(parse_timestamp("01/01/2025 08:00").is_none());
    }

    #[test]
    fn sub_hundredth_mile_trip_is_dropped() {
        let mut trip = good_trip();
        trip.trip_distance = Some(0.005);
        assert!(transform(vec![trip]).is_empty());
    }

    #[test]
    fn negative_total_amount_is_dropped() {
        let mut trip = good_trip();
        trip.total_amount = Some(-0.01);
        assert!(transform(vec![trip]).is_empty());

        let mut free = good_trip();
        free.total_amount = Some(0.0);
        assert_eq!(transform(vec![free]).len(), 1);
    }

    #[test]
    fn overlong_trip_is_dropped() {
        let mut trip = good_trip();
        // 400 minutes over 5 miles
        trip.tpep_dropoff_datetime = Some("2025-01-01 14:40:00".to_string());
        assert!(transform(vec![trip]).is_empty());
    }

    #[test]
    fn duration_bounds_are_inclusive() {
        let mut one_minute = good_trip();
        one_minute.tpep_dropoff_datetime = Some("2025-01-01 08:01:00".to_string());
        // 0.5 miles in 1 minute is 30 mph, inside the speed window
        one_minute.trip_distance = Some(0.5);
        assert_eq!(transform(vec![one_minute]).len(), 1);

        let mut six_hours = good_trip();
        six_hours.tpep_dropoff_datetime = Some("2025-01-01 14:00:00".to_string());
        // 6 hours at 10 mph
        six_hours.trip_distance = Some(60.0);
        assert_eq!(transform(vec![six_hours]).len(), 1);
    }

    #[test]
    fn implausible_speed_is_dropped() {
        let mut crawl = good_trip();
        // 0.5 miles in 20 minutes -> 1.5 mph
        crawl.trip_distance = Some(0.5);
        assert!(transform(vec![crawl]).is_empty());

        let mut rocket = good_trip();
        // 30 miles in 20 minutes -> 90 mph
        rocket.trip_distance = Some(30.0);
        assert!(transform(vec![rocket]).is_empty());
    }

    #[test]
    fn passenger_count_fill_uses_post_drop_median() {
        // One row with an unparseable pickup carries an outlier count; it is
        // dropped before the median is taken, so the fill value is 2, the
        // median of [1, 2, 4], not of [1, 2, 4, 9].
        let mut dropped = good_trip();
        dropped.tpep_pickup_datetime = Some("not a timestamp".to_string());
        dropped.passenger_count = Some(9.0);

        let mut filled = good_trip();
        filled.passenger_count = None;

        let mut a = good_trip();
        a.passenger_count = Some(1.0);
        let mut b = good_trip();
        b.passenger_count = Some(2.0);
        let mut c = good_trip();
        c.passenger_count = Some(4.0);

        let cleaned = transform(vec![dropped, filled, a, b, c]);
        assert_eq!(cleaned.len(), 4);
        assert_eq!(cleaned[0].passenger_count, Some(2.0));
    }

    #[test]
    fn median_averages_middles_for_even_populations() {
        assert_eq!(median(vec![1.0, 2.0, 3.0, 4.0]), Some(2.5));
        assert_eq!(median(vec![3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(vec![]), None);
    }

    #[test]
    fn all_null_passenger_counts_stay_null() {
        let mut trip = good_trip();
        trip.passenger_count = None;
        let cleaned = transform(vec![trip]);
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].passenger_count, None);
    }

    #[test]
    fn float_columns_are_rounded_to_two_decimals() {
        let mut trip = good_trip();
        trip.trip_distance = Some(5.12345);
        trip.tip_amount = Some(4.005);
        let cleaned = transform(vec![trip]);
        assert_eq!(cleaned[0].trip_distance, 5.12);
        assert_eq!(cleaned[0].tip_amount, Some(4.01));
    }

    #[test]
    fn rounding_is_idempotent() {
        for value in [0.0, 1.0, 2.5, 13.37, -4.25, 359.99] {
            assert_eq!(round2(round2(value)), round2(value));
        }
    }

    #[test]
    fn row_counts_never_grow_through_the_pipeline() {
        let mut bad_distance = good_trip();
        bad_distance.trip_distance = Some(0.001);
        let mut no_pickup = good_trip();
        no_pickup.tpep_pickup_datetime = None;

        let input = vec![good_trip(), bad_distance, no_pickup];
        let extracted = input.len();
        let post_drop = parse_and_drop_missing(input.clone()).len();
        let cleaned = transform(input).len();

        assert!(cleaned <= post_drop);
        assert!(post_drop <= extracted);
    }

    #[test]
    fn empty_input_degrades_to_empty_output() {
        assert!(transform(Vec::new()).is_empty());
    }
}
