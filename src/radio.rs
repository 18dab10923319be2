//! Per-radio facade owning the MAC program controller and CSI collector.
//!
//! Every operation first checks the chipset's [`DeviceProfile`]; a radio that
//! lacks a capability answers `Unsupported` without touching the hardware.

use std::sync::Arc;
use std::time::Duration;

use crate::common::error::{Error, Result};
use crate::control::{ControlChannel, ControllerConfig, MacProgramController, ProcessLauncher, ProcessSupervisor, RequestReply};
use crate::csi::{CsiCollector, CsiSink, CsiSource};
use crate::device::{self, DeviceProfile, EdcaParameters};
use crate::mac::HybridMacProgram;

/// Resolves a network interface name to the index of the phy backing it.
pub type PhyResolver = fn(&str) -> Result<u32>;

pub struct RadioModule<C = ControlChannel, L = ProcessSupervisor> {
    profile: DeviceProfile,
    controller: MacProgramController<C, L>,
    collector: CsiCollector,
    csi_interval: Duration,
    resolve_phy: PhyResolver,
}

impl RadioModule<ControlChannel, ProcessSupervisor> {
    pub fn from_config(
        name: &str,
        profile: DeviceProfile,
        config: &ControllerConfig,
        source: Arc<dyn CsiSource>,
        sink: Arc<dyn CsiSink>,
    ) -> Self {
        Self::new(
            profile,
            MacProgramController::from_config(config),
            CsiCollector::new(name, source, sink),
            config.csi_interval(),
        )
    }
}

impl<C: RequestReply, L: ProcessLauncher> RadioModule<C, L> {
    pub fn new(
        profile: DeviceProfile,
        controller: MacProgramController<C, L>,
        collector: CsiCollector,
        csi_interval: Duration,
    ) -> Self {
        Self {
            profile,
            controller,
            collector,
            csi_interval,
            resolve_phy: device::query_wiphy_index,
        }
    }

    /// Replace the `iw`-based interface to phy lookup, e.g. on bench hosts.
    pub fn with_phy_resolver(mut self, resolve_phy: PhyResolver) -> Self {
        self.resolve_phy = resolve_phy;
        self
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    pub fn controller(&self) -> &MacProgramController<C, L> {
        &self.controller
    }

    fn require(&self, supported: bool, capability: &str) -> Result<()> {
        if supported {
            Ok(())
        } else {
            Err(Error::Unsupported(format!("{} on {}", capability, self.profile.chipset)))
        }
    }

    pub fn install_mac_program(&mut self, interface: &str, program: HybridMacProgram) -> Result<()> {
        self.require(self.profile.hybrid_mac, "hybrid MAC")?;
        self.controller.activate(program, interface)
    }

    pub fn update_mac_program(&mut self, program: HybridMacProgram) -> Result<()> {
        self.require(self.profile.hybrid_mac, "hybrid MAC")?;
        self.controller.update(program)
    }

    /// Tear down the active program and hand it back.
    pub fn uninstall_mac_program(&mut self) -> Result<HybridMacProgram> {
        self.require(self.profile.hybrid_mac, "hybrid MAC")?;
        self.controller.deactivate()
    }

    /// Start the CSI collector; `None` samples at the configured interval.
    pub fn start_csi_collector(&mut self, interval: Option<Duration>) -> Result<()> {
        self.require(self.profile.csi, "CSI collection")?;
        self.collector.start(interval.unwrap_or(self.csi_interval))
    }

    pub fn stop_csi_collector(&mut self) -> Result<()> {
        self.require(self.profile.csi, "CSI collection")?;
        self.collector.stop()
    }

    pub fn is_csi_collector_running(&self) -> Result<bool> {
        self.require(self.profile.csi, "CSI collection")?;
        self.collector.is_running()
    }

    /// Write an ANI mode to `phy_name`'s sensitivity knob.
    pub fn configure_radio_sensitivity(&self, phy_name: &str, ani_mode: &str) -> Result<()> {
        device::validate_ani_mode(&self.profile, ani_mode)?;
        log::info!("Setting ANI sensitivity of {} to {}", phy_name, ani_mode);
        device::write_knob(&device::ani_knob_path(phy_name, &self.profile), ani_mode)
    }

    fn phy_index(&self, interface: &str) -> Result<u32> {
        let phy_index = (self.resolve_phy)(interface)?;
        log::debug!("{} is backed by phy{}", interface, phy_index);
        Ok(phy_index)
    }

    pub fn set_mac_access_parameters(&self, interface: &str, queue_id: u8, params: &EdcaParameters) -> Result<()> {
        self.require(self.profile.edca_queue_params, "EDCA queue parameters")?;
        let phy_index = self.phy_index(interface)?;
        log::info!("Setting EDCA parameters of queue {} on {}: {:?}", queue_id, interface, params);
        device::write_knob(
            &device::txq_params_path(phy_index, &self.profile),
            &device::format_txq_params(queue_id, params),
        )
    }

    pub fn get_mac_access_parameters(&self, interface: &str) -> Result<String> {
        self.require(self.profile.edca_queue_params, "EDCA queue parameters")?;
        let phy_index = self.phy_index(interface)?;
        device::read_knob(&device::txq_params_path(phy_index, &self.profile))
    }

    /// Transmit packets carrying firewall `mark` at `tx_power`.
    pub fn set_per_flow_tx_power(&self, interface: &str, mark: u32, tx_power: u8) -> Result<()> {
        self.require(self.profile.per_flow_tx_power, "per-flow TX power")?;
        let phy_index = self.phy_index(interface)?;
        device::write_knob(
            &device::per_flow_tx_power_path(phy_index, &self.profile),
            &device::format_per_flow_tx_power(mark, tx_power),
        )
    }

    pub fn clean_per_flow_tx_power_table(&self, interface: &str) -> Result<()> {
        self.require(self.profile.per_flow_tx_power, "per-flow TX power")?;
        let phy_index = self.phy_index(interface)?;
        device::write_knob(
            &device::per_flow_tx_power_path(phy_index, &self.profile),
            device::CLEAR_PER_FLOW_TX_POWER,
        )
    }

    pub fn get_per_flow_tx_power_table(&self, interface: &str) -> Result<String> {
        self.require(self.profile.per_flow_tx_power, "per-flow TX power")?;
        let phy_index = self.phy_index(interface)?;
        device::read_knob(&device::per_flow_tx_power_path(phy_index, &self.profile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::LaunchRequest;
    use crate::csi::{CsiMatrix, CsiSampleEvent};
    use crate::device::Chipset;
    use crate::mac::{AccessPolicy, MacAddress};
    use std::cell::Cell;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Default)]
    struct AckChannel {
        connected: bool,
        sent: Vec<String>,
    }

    impl RequestReply for AckChannel {
        fn connect(&mut self) -> Result<()> {
            self.connected = true;
            Ok(())
        }

        fn send_and_receive(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
            self.sent.push(String::from_utf8_lossy(payload).into_owned());
            Ok(b"OK".to_vec())
        }

        fn release(&mut self) {
            self.connected = false;
        }

        fn is_connected(&self) -> bool {
            self.connected
        }
    }

    #[derive(Default)]
    struct CountingLauncher {
        launches: Cell<usize>,
    }

    impl ProcessLauncher for CountingLauncher {
        fn launch(&self, _request: &LaunchRequest) -> Result<u32> {
            self.launches.set(self.launches.get() + 1);
            Ok(1)
        }
    }

    struct ConstantSource;

    impl CsiSource for ConstantSource {
        fn acquire(&self) -> Result<CsiMatrix> {
            Ok(CsiMatrix::zeros([1, 1, 1, 4]))
        }
    }

    #[derive(Default)]
    struct CountingSink {
        events: Mutex<usize>,
    }

    impl CsiSink for CountingSink {
        fn publish(&self, _event: CsiSampleEvent) {
            *self.events.lock().unwrap() += 1;
        }
    }

    fn radio(chipset: Chipset, debugfs_root: PathBuf) -> RadioModule<AckChannel, CountingLauncher> {
        let profile = DeviceProfile::for_chipset(chipset).with_debugfs_root(debugfs_root);
        let controller = MacProgramController::new(AckChannel::default(), CountingLauncher::default(), Duration::ZERO);
        let collector = CsiCollector::new("wlan0", Arc::new(ConstantSource), Arc::new(CountingSink::default()));
        RadioModule::new(profile, controller, collector, Duration::from_millis(5)).with_phy_resolver(bench_phy)
    }

    /// `wlan<N>` sits on `phy<N>`.
    fn bench_phy(interface: &str) -> Result<u32> {
        interface
            .strip_prefix("wlan")
            .and_then(|index| index.parse().ok())
            .ok_or_else(|| Error::Device(format!("no phy for {}", interface)))
    }

    fn scratch_root(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("hmac-radio-{}-{}", tag, std::process::id()))
    }

    fn program() -> HybridMacProgram {
        let mut program = HybridMacProgram::new(2, 20_000).unwrap();
        let mut policy = AccessPolicy::new();
        policy.add_entry(MacAddress::BROADCAST, 255).unwrap();
        program.set_slot_policy(0, policy).unwrap();
        program.set_slot_policy(1, AccessPolicy::guard()).unwrap();
        program
    }

    #[test]
    fn test_ath5k_rejects_unsupported_operations() {
        let mut radio = radio(Chipset::Ath5k, scratch_root("ath5k"));
        assert!(matches!(radio.install_mac_program("wlan0", program()), Err(Error::Unsupported(_))));
        assert!(matches!(radio.update_mac_program(program()), Err(Error::Unsupported(_))));
        assert!(matches!(radio.uninstall_mac_program(), Err(Error::Unsupported(_))));
        assert!(matches!(radio.start_csi_collector(None), Err(Error::Unsupported(_))));
        assert!(matches!(radio.is_csi_collector_running(), Err(Error::Unsupported(_))));
        assert!(matches!(radio.set_per_flow_tx_power("wlan0", 1, 10), Err(Error::Unsupported(_))));
        assert_eq!(radio.controller().launcher().launches.get(), 0);
    }

    #[test]
    fn test_mac_program_lifecycle() {
        let mut radio = radio(Chipset::Ath9k, scratch_root("lifecycle"));
        radio.install_mac_program("wlan0", program()).unwrap();
        assert!(radio.controller().is_active());
        assert_eq!(radio.controller().launcher().launches.get(), 1);

        radio.update_mac_program(program()).unwrap();
        let removed = radio.uninstall_mac_program().unwrap();
        assert_eq!(removed.slot_count(), 2);
        assert!(!radio.controller().is_active());
        assert_eq!(radio.controller().channel().sent.last().map(String::as_str), Some("TERMINATE"));
    }

    #[test]
    fn test_csi_collector_lifecycle() {
        let mut radio = radio(Chipset::Ath9k, scratch_root("csi"));
        assert!(matches!(radio.is_csi_collector_running(), Err(Error::NotConfigured(_))));
        radio.start_csi_collector(None).unwrap();
        assert!(radio.is_csi_collector_running().unwrap());
        radio.stop_csi_collector().unwrap();
        assert!(!radio.is_csi_collector_running().unwrap());
    }

    #[test]
    fn test_debugfs_knobs() {
        let root = scratch_root("knobs");
        fs::create_dir_all(root.join("phy0").join("ath9k")).unwrap();
        let radio = radio(Chipset::Ath9k, root.clone());

        radio.configure_radio_sensitivity("phy0", "0").unwrap();
        assert_eq!(fs::read_to_string(root.join("phy0/ath9k/ani")).unwrap(), "0");
        assert!(matches!(
            radio.configure_radio_sensitivity("phy0", "sens-low"),
            Err(Error::Unsupported(_))
        ));

        let params = EdcaParameters {
            aifs: 1,
            cw_min: 3,
            cw_max: 7,
            txop: 0,
        };
        radio.set_mac_access_parameters("wlan0", 2, &params).unwrap();
        assert_eq!(fs::read_to_string(root.join("phy0/ath9k/txq_params")).unwrap(), "2 1 3 7 0");
        assert_eq!(radio.get_mac_access_parameters("wlan0").unwrap(), "2 1 3 7 0");

        radio.set_per_flow_tx_power("wlan0", 5, 12).unwrap();
        assert_eq!(radio.get_per_flow_tx_power_table("wlan0").unwrap(), "5 12 0");
        radio.clean_per_flow_tx_power_table("wlan0").unwrap();
        assert_eq!(radio.get_per_flow_tx_power_table("wlan0").unwrap(), "0 0 0");

        // wlan9 resolves to phy9, which has no debugfs node.
        assert!(matches!(radio.get_mac_access_parameters("wlan9"), Err(Error::Device(_))));
        assert!(matches!(radio.set_per_flow_tx_power("eth0", 1, 1), Err(Error::Device(_))));
        fs::remove_dir_all(&root).unwrap();
    }
}
