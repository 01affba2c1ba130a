pub mod channel;
pub mod database;
pub mod engine;
pub mod link;
pub mod outputs;
pub mod registry;
pub mod rtd;

use chrono::prelude::*;
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

pub type Timestamp = DateTime<Utc>;

/// Serial line speed of the probe bus.
pub const BAUD_RATE: u32 = 250_000;
/// Consecutive transport failures tolerated before the link is torn down.
pub const MAX_FAILED_READS: u32 = 4;
/// Pause between connection attempts while the device is absent.
pub const CONNECT_RETRY: Duration = Duration::from_secs(2);
/// Pause before the next cycle when disconnected.
pub const RETRY_IN: Duration = Duration::from_secs(10);
/// Pause before the next cycle when no probe is active.
pub const IDLE_RETRY: Duration = Duration::from_secs(2);
/// Unread cycle results kept per observer before the oldest are dropped.
pub const CHANNEL_CAPACITY: usize = 16;

const DATABASE_URL: &str = "DATABASE_URL";

pub fn get_database_url() -> String {
    dotenv().ok();
    env::var(DATABASE_URL).expect("DATABASE_URL must be set")
}
