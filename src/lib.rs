//! Controller for a hybrid TDMA/CSMA MAC on Atheros WiFi radios.
//!
//! - `mac`: slot tables and per-slot access policies
//! - `control`: lifecycle of the userspace enforcement process
//! - `csi`: periodic channel state information sampling
//! - `device`: chipset capabilities and debugfs knobs
//! - `radio`: one facade per physical radio

pub mod common;
pub mod control;
pub mod csi;
pub mod device;
pub mod mac;
pub mod radio;
mod time_driver;

use env_logger::Builder;
use log::LevelFilter;

pub use common::error::{Error, Result};
pub use radio::{PhyResolver, RadioModule};

/// Install the process-wide logger. Later calls are no-ops.
pub fn init_logging() {
    let _ = Builder::new()
        .filter_level(LevelFilter::Info)
        .filter(Some("wifi_hmac_controller"), LevelFilter::Debug)
        .try_init();
}
