use crate::domain::RawTrip;
use crate::error::Result;
use chrono::DateTime;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::{Field, Row};
use std::fs::File;
use std::path::Path;
use tracing::info;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Reads the whole Parquet file into memory, all rows and all columns
/// verbatim. Timestamp columns are rendered to text here; interpreting them
/// is the transform stage's job.
///
/// A missing, unreadable or malformed file is fatal for the run.
pub fn extract(path: &Path) -> Result<Vec<RawTrip>> {
    info!("reading parquet file {}", path.display());

    let file = File::open(path)?;
    let reader = SerializedFileReader::new(file)?;
    let num_rows = reader.metadata().file_metadata().num_rows();

    let mut trips = Vec::with_capacity(num_rows.max(0) as usize);
    for row in reader.get_row_iter(None)? {
        trips.push(raw_trip_from_row(&row?));
    }

    info!(rows = trips.len(), "loaded {} rows", trips.len());
    Ok(trips)
}

/// Maps one Parquet row onto `RawTrip` by column name, so the job is
/// indifferent to column order. Unknown columns are ignored; missing ones
/// stay `None` and fall out later in the cleaning pipeline.
fn raw_trip_from_row(row: &Row) -> RawTrip {
    let mut trip = RawTrip::default();
    for (name, field) in row.get_column_iter() {
        match name.as_str() {
            "VendorID" | "vendor_id" => trip.vendor_id = field_to_i64(field),
            "tpep_pickup_datetime" => trip.tpep_pickup_datetime = field_to_text(field),
            "tpep_dropoff_datetime" => trip.tpep_dropoff_datetime = field_to_text(field),
            "passenger_count" => trip.passenger_count = field_to_f64(field),
            "trip_distance" => trip.trip_distance = field_to_f64(field),
            "RatecodeID" | "ratecode_id" => trip.ratecode_id = field_to_f64(field),
            "store_and_fwd_flag" => trip.store_and_fwd_flag = field_to_text(field),
            "PULocationID" | "pu_location_id" => trip.pu_location_id = field_to_i64(field),
            "DOLocationID" | "do_location_id" => trip.do_location_id = field_to_i64(field),
            "payment_type" => trip.payment_type = field_to_i64(field),
            "fare_amount" => trip.fare_amount = field_to_f64(field),
            "extra" => trip.extra = field_to_f64(field),
            "mta_tax" => trip.mta_tax = field_to_f64(field),
            "tip_amount" => trip.tip_amount = field_to_f64(field),
            "tolls_amount" => trip.tolls_amount = field_to_f64(field),
            "improvement_surcharge" => trip.improvement_surcharge = field_to_f64(field),
            "total_amount" => trip.total_amount = field_to_f64(field),
            "congestion_surcharge" => trip.congestion_surcharge = field_to_f64(field),
            "Airport_fee" | "airport_fee" => trip.airport_fee = field_to_f64(field),
            _ => {}
        }
    }
    trip
}

fn field_to_i64(field: &Field) -> Option<i64> {
    match field {
        Field::Byte(v) => Some(i64::from(*v)),
        Field::Short(v) => Some(i64::from(*v)),
        Field::Int(v) => Some(i64::from(*v)),
        Field::Long(v) => Some(*v),
        Field::UByte(v) => Some(i64::from(*v)),
        Field::UShort(v) => Some(i64::from(*v)),
        Field::UInt(v) => Some(i64::from(*v)),
        Field::ULong(v) => i64::try_from(*v).ok(),
        _ => None,
    }
}

fn field_to_f64(field: &Field) -> Option<f64> {
    match field {
        Field::Float(v) => Some(f64::from(*v)),
        Field::Double(v) => Some(*v),
        _ => field_to_i64(field).map(|v| v as f64),
    }
}

/// Text rendering for string and timestamp columns. The tripdata files have
/// carried both representations over the years, so both are accepted.
fn field_to_text(field: &Field) -> Option<String> {
    match field {
        Field::Str(s) => Some(s.clone()),
        Field::TimestampMillis(ms) => DateTime::from_timestamp_millis(*ms)
            .map(|dt| dt.naive_utc().format(TIMESTAMP_FORMAT).to_string()),
        Field::TimestampMicros(us) => DateTime::from_timestamp_micros(*us)
            .map(|dt| dt.naive_utc().format(TIMESTAMP_FORMAT).to_string()),
        _ => None,
    }
}
