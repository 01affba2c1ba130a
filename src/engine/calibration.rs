//! One-shot calibration against an operator-supplied reference
//! temperature.
//!
//! Works on the most recently published reading set, not a live one, so
//! it can run while the poll loop keeps cycling. The corrections are
//! written in one transaction and only then applied to the registry.

use anyhow::{bail, Result};
use diesel::prelude::*;
use tokio::task;
use tracing::{info, warn};

use crate::database::models::Probe;
use crate::database::Pool;
use crate::registry::{ConfigEvent, Registry};
use crate::rtd;

use super::Reading;

/// The correction that would have made this cycle's reading resolve to
/// `implied` ohms. `observed` already includes the previous correction,
/// so it is backed out first.
fn corrected(implied: f64, observed: f64, previous: f64) -> f64 {
    rtd::round2(implied - (observed - previous))
}

pub async fn calibrate(
    pool: Pool,
    registry: &Registry,
    latest: &[Reading],
    reference: f64,
) -> Result<usize> {
    let mut updates: Vec<Probe> = Vec::new();
    for reading in latest {
        let Some(mut probe) = registry.probe(reading.probe_id) else {
            warn!(
                "no active probe {} for its reading, skipping calibration",
                reading.probe_id
            );
            continue;
        };
        let implied = rtd::resistance_from_temp(reference, probe.nominal_type);
        let previous = probe.correction_resistance.unwrap_or(0.0);
        probe.correction_resistance = Some(corrected(implied, reading.resistance, previous));
        updates.push(probe);
    }
    if updates.is_empty() {
        bail!("no current readings to calibrate against");
    }

    let written = updates.clone();
    task::spawn_blocking(move || persist(pool, written)).await??;

    for probe in updates.iter() {
        // probe upserts cannot be rejected
        let _ = registry.apply(ConfigEvent::ProbeUpserted(probe.clone()));
    }
    info!(
        "calibrated {} probes against {:.1} degrees",
        updates.len(),
        reference
    );
    Ok(updates.len())
}

/// All corrections land or none do.
fn persist(pool: Pool, probes: Vec<Probe>) -> Result<()> {
    use crate::database::schema::probes_t::dsl::*;

    let mut conn = pool.get()?;
    conn.transaction::<_, diesel::result::Error, _>(|conn| {
        for probe in &probes {
            diesel::update(probes_t.find(probe.id))
                .set(correction_resistance.eq(probe.correction_resistance))
                .execute(conn)?;
        }
        Ok(())
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::run_migrations;
    use crate::database::schema::probes_t;
    use chrono::Utc;
    use diesel::r2d2::ConnectionManager;

    #[test]
    fn correction_matches_the_closed_form() {
        // implied 2000.00, observed 2099.61 carrying a previous 1.50
        assert_eq!(corrected(2000.0, 2099.61, 1.5), -98.11);
        // a probe already reading true keeps its correction
        let implied = rtd::resistance_from_temp(25.0, 1000);
        assert_eq!(corrected(implied, implied, 1.5), 1.5);
    }

    fn memory_pool_with_probe(correction: Option<f64>) -> Pool {
        let manager = ConnectionManager::<SqliteConnection>::new(":memory:");
        let pool = r2d2::Pool::builder().max_size(1).build(manager).expect("pool");
        let mut conn = pool.get().expect("conn");
        run_migrations(&mut conn).expect("migrations");
        diesel::insert_into(probes_t::table)
            .values((
                probes_t::id.eq(1),
                probes_t::label.eq("up"),
                probes_t::nominal_type.eq(1000),
                probes_t::pin.eq(8),
                probes_t::location.eq("up"),
                probes_t::disabled.eq(false),
                probes_t::correction_resistance.eq(correction),
            ))
            .execute(&mut conn)
            .expect("probe fixture");
        pool
    }

    fn stored_correction(pool: &Pool) -> Option<f64> {
        let mut conn = pool.get().expect("conn");
        probes_t::table
            .find(1)
            .select(probes_t::correction_resistance)
            .get_result(&mut conn)
            .expect("probe row")
    }

    #[tokio::test]
    async fn calibrate_updates_store_and_registry() {
        let previous = 1.5;
        let pool = memory_pool_with_probe(Some(previous));
        let registry = Registry::load(&pool).expect("registry");

        let observed = 2099.61;
        let latest = vec![Reading {
            probe_id: 1,
            pin: 8,
            rtd: 16000,
            temperature: Some(294.1),
            resistance: observed,
            label: "up".to_string(),
            captured_at: Utc::now(),
        }];

        let reference = 25.0;
        let count = calibrate(pool.clone(), &registry, &latest, reference)
            .await
            .expect("calibration");
        assert_eq!(count, 1);

        let expected = corrected(
            rtd::resistance_from_temp(reference, 1000),
            observed,
            previous,
        );
        assert_eq!(stored_correction(&pool), Some(expected));
        assert_eq!(
            registry.probe(1).unwrap().correction_resistance,
            Some(expected)
        );
    }

    #[tokio::test]
    async fn calibrate_without_readings_is_an_error() {
        let pool = memory_pool_with_probe(None);
        let registry = Registry::load(&pool).expect("registry");
        assert!(calibrate(pool, &registry, &[], 25.0).await.is_err());
    }

    #[tokio::test]
    async fn unknown_probe_readings_are_skipped_not_fatal() {
        let pool = memory_pool_with_probe(None);
        let registry = Registry::load(&pool).expect("registry");
        let latest = vec![
            Reading {
                probe_id: 99,
                pin: 30,
                rtd: 16000,
                temperature: Some(20.0),
                resistance: 2000.0,
                label: "gone".to_string(),
                captured_at: Utc::now(),
            },
            Reading {
                probe_id: 1,
                pin: 8,
                rtd: 16000,
                temperature: Some(20.0),
                resistance: 2000.0,
                label: "up".to_string(),
                captured_at: Utc::now(),
            },
        ];
        let count = calibrate(pool, &registry, &latest, 25.0)
            .await
            .expect("partial calibration");
        assert_eq!(count, 1);
    }
}
