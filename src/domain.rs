use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One trip record exactly as read from the source file: every field is
/// optional and the timestamps are still raw text. Nothing is interpreted
/// at extraction time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTrip {
    pub vendor_id: Option<i64>,
    pub tpep_pickup_datetime: Option<String>,
    pub tpep_dropoff_datetime: Option<String>,
    pub passenger_count: Option<f64>,
    pub trip_distance: Option<f64>,
    pub ratecode_id: Option<f64>,
    pub store_and_fwd_flag: Option<String>,
    pub pu_location_id: Option<i64>,
    pub do_location_id: Option<i64>,
    pub payment_type: Option<i64>,
    pub fare_amount: Option<f64>,
    pub extra: Option<f64>,
    pub mta_tax: Option<f64>,
    pub tip_amount: Option<f64>,
    pub tolls_amount: Option<f64>,
    pub improvement_surcharge: Option<f64>,
    pub total_amount: Option<f64>,
    pub congestion_surcharge: Option<f64>,
    pub airport_fee: Option<f64>,
}

/// A trip that survived timestamp parsing and the null drop: both timestamps
/// and the distance are guaranteed present, everything else is passthrough.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub vendor_id: Option<i64>,
    pub tpep_pickup_datetime: NaiveDateTime,
    pub tpep_dropoff_datetime: NaiveDateTime,
    pub passenger_count: Option<f64>,
    pub trip_distance: f64,
    pub ratecode_id: Option<f64>,
    pub store_and_fwd_flag: Option<String>,
    pub pu_location_id: Option<i64>,
    pub do_location_id: Option<i64>,
    pub payment_type: Option<i64>,
    pub fare_amount: Option<f64>,
    pub extra: Option<f64>,
    pub mta_tax: Option<f64>,
    pub tip_amount: Option<f64>,
    pub tolls_amount: Option<f64>,
    pub improvement_surcharge: Option<f64>,
    pub total_amount: Option<f64>,
    pub congestion_surcharge: Option<f64>,
    pub airport_fee: Option<f64>,
}

/// The persisted row shape: the source columns plus the two derived columns.
/// Field names match the destination table's columns one to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CleanedTrip {
    pub vendor_id: Option<i64>,
    pub tpep_pickup_datetime: NaiveDateTime,
    pub tpep_dropoff_datetime: NaiveDateTime,
    pub passenger_count: Option<f64>,
    pub trip_distance: f64,
    pub ratecode_id: Option<f64>,
    pub store_and_fwd_flag: Option<String>,
    pub pu_location_id: Option<i64>,
    pub do_location_id: Option<i64>,
    pub payment_type: Option<i64>,
    pub fare_amount: Option<f64>,
    pub extra: Option<f64>,
    pub mta_tax: Option<f64>,
    pub tip_amount: Option<f64>,
    pub tolls_amount: Option<f64>,
    pub improvement_surcharge: Option<f64>,
    pub total_amount: f64,
    pub congestion_surcharge: Option<f64>,
    pub airport_fee: Option<f64>,
    pub trip_duration_minutes: f64,
    pub avg_speed_mph: f64,
}
