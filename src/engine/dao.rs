//! Sample persistence for the poll cycle.

use chrono::{NaiveDateTime, Timelike};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tokio::task;
use tracing::{debug, error};

use crate::database::models::NewSample;
use crate::database::{Pool, PooledConn};
use crate::Timestamp;

use super::Reading;

/// Truncates a capture time to its minute bucket.
pub fn minute_bucket(now: Timestamp) -> NaiveDateTime {
    let naive = now.naive_utc();
    naive
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(naive)
}

/// Persists one minute-bucketed sample per reading with a temperature.
///
/// One sample's failure never blocks the rest of the batch, and a
/// duplicate `(probe, minute)` key is success: some other writer already
/// recorded this minute.
pub async fn store_samples(pool: Pool, readings: Vec<Reading>, recorded_at: NaiveDateTime) {
    let rows: Vec<NewSample> = readings
        .iter()
        .filter_map(|reading| {
            reading.temperature.map(|temperature| NewSample {
                probe_id: reading.probe_id,
                temperature,
                recorded_at,
            })
        })
        .collect();
    if rows.is_empty() {
        return;
    }

    let result = task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        for row in &rows {
            if let Err(e) = insert_once(&mut conn, row) {
                error!("failed to store sample for probe {}: {}", row.probe_id, e);
            }
        }
        Ok::<(), anyhow::Error>(())
    })
    .await;

    match result {
        Ok(Ok(())) => (),
        Ok(Err(e)) => error!("sample batch aborted: {}", e),
        Err(e) => error!("sample writer panicked: {}", e),
    }
}

pub fn insert_once(conn: &mut PooledConn, row: &NewSample) -> anyhow::Result<()> {
    use crate::database::schema::samples_t::dsl::*;

    let existing: i64 = samples_t
        .filter(probe_id.eq(row.probe_id))
        .filter(recorded_at.eq(row.recorded_at))
        .count()
        .get_result(conn)?;
    if existing > 0 {
        debug!(
            "probe {} already has a sample for {}",
            row.probe_id, row.recorded_at
        );
        return Ok(());
    }
    match diesel::insert_into(samples_t).values(row).execute(conn) {
        Ok(_) => Ok(()),
        // benign race: another writer claimed this minute between the
        // check and the insert
        Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => Ok(()),
        Err(e) => Err(e.into()),
    }
}
