//! The control engine: one poll-convert-persist-control-publish loop.
//!
//! Owns the link exclusively. Each cycle reads one frame, maps the
//! entries to configured probes, converts, persists minute samples on a
//! background task (at most one outstanding; the next cycle joins it),
//! runs the pairing/threshold control, and publishes the reading set.
//! The loop never terminates on error; only `shutdown()` stops it, after
//! the in-flight cycle.

pub mod calibration;
pub mod control;
pub mod dao;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::prelude::*;
use serde::Serialize;
use tokio::io::AsyncRead;
use tokio::task::JoinHandle;
use tokio_serial::SerialStream;
use tracing::{debug, error, info, warn};

use crate::channel::{Distributor, Observer};
use crate::database::Pool;
use crate::link::{FrameError, Link, RawPoint};
use crate::outputs::RelayOutputs;
use crate::registry::Registry;
use crate::{rtd, Timestamp, IDLE_RETRY, RETRY_IN};

/// One probe's converted measurement for one cycle.
#[derive(Serialize, Clone, Debug)]
pub struct Reading {
    pub probe_id: i32,
    pub pin: i32,
    pub rtd: u32,
    /// Absent when the raw code converts outside the representable range.
    pub temperature: Option<f64>,
    pub resistance: f64,
    pub label: String,
    pub captured_at: Timestamp,
}

/// What observers receive once per cycle.
#[derive(Serialize, Clone, Debug, Default)]
pub struct CycleResult {
    pub readings: Vec<Reading>,
    /// Empty on a clean cycle, otherwise the human-readable reason there
    /// are no readings.
    pub error: String,
}

pub struct Engine<S = SerialStream>
where
    S: AsyncRead + Unpin,
{
    link: Link<S>,
    registry: Arc<Registry>,
    pool: Pool,
    outputs: Arc<dyn RelayOutputs>,
    distributor: Distributor<CycleResult>,
    latest: Arc<Mutex<Vec<Reading>>>,
    running: Arc<AtomicBool>,
    pending: Option<JoinHandle<()>>,
}

impl<S> Engine<S>
where
    S: AsyncRead + Unpin,
{
    pub fn new(
        link: Link<S>,
        registry: Arc<Registry>,
        pool: Pool,
        outputs: Arc<dyn RelayOutputs>,
        capacity: usize,
    ) -> Self {
        Self {
            link,
            registry,
            pool,
            outputs,
            distributor: Distributor::new(capacity),
            latest: Arc::new(Mutex::new(Vec::new())),
            running: Arc::new(AtomicBool::new(true)),
            pending: None,
        }
    }

    /// External surface of the engine; cheap to clone around.
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            registry: self.registry.clone(),
            pool: self.pool.clone(),
            latest: self.latest.clone(),
            running: self.running.clone(),
            distributor: self.distributor.clone(),
        }
    }

    async fn cycle(&mut self) {
        if self.registry.active_probes().is_empty() {
            tokio::time::sleep(IDLE_RETRY).await;
            self.publish(Vec::new(), "no active probes");
            return;
        }

        let (readings, error) = match self.link.read_frame().await {
            Ok(points) => (self.to_readings(&points), String::new()),
            Err(e @ FrameError::Transport(_)) => {
                warn!("{}", e);
                (Vec::new(), e.to_string())
            }
            // device diagnostics, not a link problem
            Err(e @ FrameError::Content(_)) => {
                info!("{}", e);
                (Vec::new(), e.to_string())
            }
        };

        // join last cycle's persistence before spawning this one's
        if let Some(task) = self.pending.take() {
            if let Err(e) = task.await {
                error!("sample persistence task failed: {}", e);
            }
        }

        if !readings.is_empty() {
            for command in control::plan(&readings, &self.registry) {
                self.outputs.command(command.pin, command.on);
            }
            let pool = self.pool.clone();
            let batch = readings.clone();
            let minute = dao::minute_bucket(Utc::now());
            self.pending = Some(tokio::spawn(async move {
                dao::store_samples(pool, batch, minute).await;
            }));
        }

        self.publish(readings, &error);
    }

    fn to_readings(&self, points: &[RawPoint]) -> Vec<Reading> {
        let mut readings = Vec::with_capacity(points.len());
        for point in points {
            let Some(probe) = self.registry.probe_by_pin(point.pin) else {
                debug!("dropping reading from unconfigured pin {}", point.pin);
                continue;
            };
            let wire = probe.wire_resistance.unwrap_or(0.0);
            let correction = probe.correction_resistance.unwrap_or(0.0);
            let resistance =
                rtd::resistance_from_code(point.rtd, probe.nominal_type, wire, correction);
            let temperature = rtd::temp_from_resistance(resistance, probe.nominal_type);
            readings.push(Reading {
                probe_id: probe.id,
                pin: point.pin,
                rtd: point.rtd,
                temperature: temperature.is_finite().then_some(temperature),
                resistance,
                label: probe.label,
                captured_at: Utc::now(),
            });
        }
        readings
    }

    fn publish(&self, readings: Vec<Reading>, error: &str) {
        *self
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = readings.clone();
        self.distributor.publish(CycleResult {
            readings,
            error: error.to_string(),
        });
    }
}

impl Engine<SerialStream> {
    /// Runs until shutdown. The first connect happens here; afterwards
    /// the loop reconnects whenever the link tears itself down.
    pub async fn run(mut self) {
        self.link.connect().await;
        while self.running.load(Ordering::SeqCst) {
            if !self.link.connected() {
                tokio::time::sleep(RETRY_IN).await;
                self.publish(Vec::new(), "cannot connect to the probes");
                self.link.connect().await;
                continue;
            }
            self.cycle().await;
        }
        if let Some(task) = self.pending.take() {
            let _ = task.await;
        }
        info!("control engine stopped, link released");
    }
}

#[derive(Clone)]
pub struct EngineHandle {
    registry: Arc<Registry>,
    pool: Pool,
    latest: Arc<Mutex<Vec<Reading>>>,
    running: Arc<AtomicBool>,
    distributor: Distributor<CycleResult>,
}

impl EngineHandle {
    /// A new observer with its own cursor; it sees cycles published from
    /// now on.
    pub fn subscribe(&self) -> Observer<CycleResult> {
        self.distributor.subscribe()
    }

    /// The registry, for applying configuration-change notifications.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Calibrates every probe of the last published reading set against
    /// the reference temperature.
    pub async fn calibrate(&self, reference: f64) -> anyhow::Result<usize> {
        let latest = self
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        calibration::calibrate(self.pool.clone(), &self.registry, &latest, reference).await
    }

    /// Stops the loop after the in-flight cycle completes.
    pub fn shutdown(&self) {
        info!("shutdown requested");
        self.running.store(false, Ordering::SeqCst);
    }
}
