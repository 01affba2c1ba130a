//! In-memory mirror of the probe and relay configuration.
//!
//! The store owns the records; this mirror is kept current through
//! explicit insert/update/delete notifications so the poll loop never
//! queries the database. Readers always see whole records.

use std::sync::{PoisonError, RwLock};

use diesel::prelude::*;
use thiserror::Error;
use tracing::warn;

use crate::database::models::{Probe, Relay};
use crate::database::Pool;

/// Configuration-change notification from the store.
#[derive(Debug, Clone)]
pub enum ConfigEvent {
    ProbeUpserted(Probe),
    ProbeDeleted(i32),
    RelayUpserted(Relay),
    RelayDeleted(i32),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("relay {candidate} claims fire_on_threshold, already held by relay {holder}")]
    DuplicateAlarmRelay { candidate: i32, holder: i32 },
}

#[derive(Default)]
struct Tables {
    probes: Vec<Probe>,
    relays: Vec<Relay>,
}

pub struct Registry {
    tables: RwLock<Tables>,
}

impl Registry {
    pub fn new(probes: Vec<Probe>, relays: Vec<Relay>) -> Self {
        let mut kept: Vec<Relay> = Vec::with_capacity(relays.len());
        for relay in relays {
            if relay.fire_on_threshold {
                if let Some(holder) = kept.iter().find(|r| r.fire_on_threshold) {
                    warn!(
                        "relay {} also claims fire_on_threshold (held by relay {}), skipping it",
                        relay.id, holder.id
                    );
                    continue;
                }
            }
            kept.push(relay);
        }
        Self {
            tables: RwLock::new(Tables {
                probes,
                relays: kept,
            }),
        }
    }

    /// Initial state from the store.
    pub fn load(pool: &Pool) -> anyhow::Result<Self> {
        let mut conn = pool.get()?;
        let probes = {
            use crate::database::schema::probes_t::dsl::*;
            probes_t.select(Probe::as_select()).load(&mut conn)?
        };
        let relays = {
            use crate::database::schema::relays_t::dsl::*;
            relays_t.select(Relay::as_select()).load(&mut conn)?
        };
        Ok(Self::new(probes, relays))
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Probe by id, excluding disabled ones.
    pub fn probe(&self, id: i32) -> Option<Probe> {
        self.read()
            .probes
            .iter()
            .find(|p| p.id == id && !p.disabled)
            .cloned()
    }

    /// Probe by reported hardware pin, excluding disabled ones.
    pub fn probe_by_pin(&self, pin: i32) -> Option<Probe> {
        self.read()
            .probes
            .iter()
            .find(|p| p.pin == pin && !p.disabled)
            .cloned()
    }

    /// Relay by id, excluding disabled ones.
    pub fn relay(&self, id: i32) -> Option<Relay> {
        self.read()
            .relays
            .iter()
            .find(|r| r.id == id && !r.disabled)
            .cloned()
    }

    /// The global alarm relay. Disabled relays are still returned because
    /// a disabled alarm relay must be commanded OFF every cycle.
    pub fn alarm_relay(&self) -> Option<Relay> {
        self.read()
            .relays
            .iter()
            .find(|r| r.fire_on_threshold)
            .cloned()
    }

    pub fn active_probes(&self) -> Vec<Probe> {
        self.read()
            .probes
            .iter()
            .filter(|p| !p.disabled)
            .cloned()
            .collect()
    }

    /// Applies one store notification. A relay update that would create a
    /// second fire_on_threshold holder is rejected; the mirror keeps
    /// serving its previous state.
    pub fn apply(&self, event: ConfigEvent) -> Result<(), ConfigError> {
        let mut tables = self.write();
        match event {
            ConfigEvent::ProbeUpserted(probe) => {
                match tables.probes.iter_mut().find(|p| p.id == probe.id) {
                    Some(slot) => *slot = probe,
                    None => tables.probes.push(probe),
                }
            }
            ConfigEvent::ProbeDeleted(id) => tables.probes.retain(|p| p.id != id),
            ConfigEvent::RelayUpserted(relay) => {
                if relay.fire_on_threshold {
                    if let Some(holder) = tables
                        .relays
                        .iter()
                        .find(|r| r.fire_on_threshold && r.id != relay.id)
                    {
                        return Err(ConfigError::DuplicateAlarmRelay {
                            candidate: relay.id,
                            holder: holder.id,
                        });
                    }
                }
                match tables.relays.iter_mut().find(|r| r.id == relay.id) {
                    Some(slot) => *slot = relay,
                    None => tables.relays.push(relay),
                }
            }
            ConfigEvent::RelayDeleted(id) => {
                tables.relays.retain(|r| r.id != id);
                // the store sets relay_id to NULL on relay deletion; keep
                // the mirror in step
                for probe in tables.probes.iter_mut() {
                    if probe.relay_id == Some(id) {
                        probe.relay_id = None;
                    }
                }
            }
        }
        Ok(())
    }
}
