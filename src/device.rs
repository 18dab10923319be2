//! Chipset capabilities and debugfs knobs of Atheros radios.
//!
//! Both supported drivers expose their tuning knobs as debugfs files under
//! `/sys/kernel/debug/ieee80211/<phy>/<driver>/`. Which knobs exist, and which
//! values they accept, depends on the chipset; a [`DeviceProfile`] records
//! that instead of a driver class per chipset.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};

use crate::common::error::{Error, Result};

/// Root of the mac80211 debugfs tree.
pub const DEBUGFS_ROOT: &str = "/sys/kernel/debug/ieee80211";

/// Value written to the per-flow TX power knob to clear the whole table.
pub const CLEAR_PER_FLOW_TX_POWER: &str = "0 0 0";

const ATH5K_ANI_MODES: &[&str] = &[
    "sens-low",
    "sens-high",
    "ani-off",
    "ani-on",
    "noise-low",
    "noise-high",
    "spur-low",
    "spur-high",
    "fir-low",
    "fir-high",
    "ofdm-off",
    "ofdm-on",
    "cck-off",
    "cck-on",
];

// 0 disables ANI, 1 re-enables it
const ATH9K_ANI_MODES: &[&str] = &["0", "1"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chipset {
    Ath5k,
    Ath9k,
}

impl Chipset {
    /// Driver directory name under each phy's debugfs node.
    pub fn driver_name(&self) -> &'static str {
        match self {
            Chipset::Ath5k => "ath5k",
            Chipset::Ath9k => "ath9k",
        }
    }
}

impl fmt::Display for Chipset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.driver_name())
    }
}

/// EDCA parameters of one hardware transmit queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdcaParameters {
    pub aifs: u8,
    pub cw_min: u16,
    pub cw_max: u16,
    /// TXOP limit in units of 32 us
    pub txop: u16,
}

/// What a chipset can do and where its knobs live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceProfile {
    pub chipset: Chipset,
    pub ani_modes: &'static [&'static str],
    pub hybrid_mac: bool,
    pub edca_queue_params: bool,
    pub per_flow_tx_power: bool,
    pub csi: bool,
    debugfs_root: PathBuf,
}

impl DeviceProfile {
    pub fn for_chipset(chipset: Chipset) -> Self {
        let full = chipset == Chipset::Ath9k;
        Self {
            chipset,
            ani_modes: match chipset {
                Chipset::Ath5k => ATH5K_ANI_MODES,
                Chipset::Ath9k => ATH9K_ANI_MODES,
            },
            hybrid_mac: full,
            edca_queue_params: full,
            per_flow_tx_power: full,
            csi: full,
            debugfs_root: PathBuf::from(DEBUGFS_ROOT),
        }
    }

    /// Relocate the debugfs tree, e.g. to a scratch directory on a bench host.
    pub fn with_debugfs_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.debugfs_root = root.into();
        self
    }

    pub fn debugfs_root(&self) -> &Path {
        &self.debugfs_root
    }

    pub fn driver_name(&self) -> &'static str {
        self.chipset.driver_name()
    }

    fn phy_dir(&self, phy_name: &str) -> PathBuf {
        self.debugfs_root.join(phy_name).join(self.driver_name())
    }
}

/// Path of the ANI knob of `phy_name` (e.g. `phy0`).
pub fn ani_knob_path(phy_name: &str, profile: &DeviceProfile) -> PathBuf {
    profile.phy_dir(phy_name).join("ani")
}

pub fn txq_params_path(phy_index: u32, profile: &DeviceProfile) -> PathBuf {
    profile.phy_dir(&format!("phy{}", phy_index)).join("txq_params")
}

pub fn per_flow_tx_power_path(phy_index: u32, profile: &DeviceProfile) -> PathBuf {
    profile.phy_dir(&format!("phy{}", phy_index)).join("per_flow_tx_power")
}

/// Render one `txq_params` line: `<queue> <aifs> <cw_min> <cw_max> <txop>`.
pub fn format_txq_params(queue_id: u8, params: &EdcaParameters) -> String {
    format!(
        "{} {} {} {} {}",
        queue_id, params.aifs, params.cw_min, params.cw_max, params.txop
    )
}

/// Render one `per_flow_tx_power` entry for packets carrying firewall `mark`.
pub fn format_per_flow_tx_power(mark: u32, tx_power: u8) -> String {
    format!("{} {} 0", mark, tx_power)
}

/// Extract the phy index from `iw <iface> info` output.
///
/// The relevant line reads `wiphy N`; when several match the last one wins.
pub fn parse_wiphy_index(iw_info_output: &str) -> Result<u32> {
    let line = iw_info_output
        .lines()
        .rfind(|line| line.contains("wiphy"))
        .ok_or_else(|| Error::Device("no wiphy line in iw info output".to_string()))?;

    line.split_whitespace()
        .find_map(|token| token.parse::<u32>().ok())
        .ok_or_else(|| Error::Device(format!("no phy index in '{}'", line.trim())))
}

/// Ask `iw` which phy backs `interface`.
pub fn query_wiphy_index(interface: &str) -> Result<u32> {
    let output = Command::new("iw")
        .arg(interface)
        .arg("info")
        .output()
        .map_err(|e| Error::Device(format!("failed to run iw {} info: {}", interface, e)))?;
    if !output.status.success() {
        return Err(Error::Device(format!(
            "iw {} info exited with {}: {}",
            interface,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    parse_wiphy_index(&String::from_utf8_lossy(&output.stdout))
}

pub fn validate_ani_mode(profile: &DeviceProfile, mode: &str) -> Result<()> {
    if profile.ani_modes.contains(&mode) {
        Ok(())
    } else {
        Err(Error::Unsupported(format!(
            "ANI mode '{}' on {} (supported: {})",
            mode,
            profile.chipset,
            profile.ani_modes.join(", ")
        )))
    }
}

pub fn write_knob(path: &Path, value: &str) -> Result<()> {
    log::debug!("{} <- {}", path.display(), value);
    fs::write(path, value).map_err(|e| Error::Device(format!("failed to write {}: {}", path.display(), e)))
}

pub fn read_knob(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::Device(format!("failed to read {}: {}", path.display(), e)))
}
