//! Relay output drivers.
//!
//! Commands are idempotent physical pin writes issued every cycle; no
//! edge triggering, no state kept here. The relay board is active-low,
//! which only matters to a real GPIO driver.

use tracing::info;

/// Header pins wired to the relay bank.
pub const RELAY_PINS: [i32; 8] = [8, 10, 12, 11, 13, 15, 16, 18];

pub trait RelayOutputs: Send + Sync {
    fn command(&self, pin: i32, on: bool);
}

/// Logs commands instead of driving pins. Stands in where the controller
/// runs without relay hardware attached; every configured pin starts OFF.
pub struct LoggingRelays;

impl LoggingRelays {
    pub fn new(pins: &[i32]) -> Self {
        for &pin in pins {
            info!("relay output on pin {} initialised OFF", pin);
        }
        Self
    }
}

impl RelayOutputs for LoggingRelays {
    fn command(&self, pin: i32, on: bool) {
        info!("relay pin {} -> {}", pin, if on { "ON" } else { "OFF" });
    }
}
