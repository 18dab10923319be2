//! Activation state machine for the hybrid MAC enforcement process.
//!
//! ```text
//!              activate                     update (ok)
//!   Inactive ────────────▶ Active(program) ◀──────────┐
//!      ▲                        │  └──────────────────┘
//!      └────── deactivate ──────┘
//! ```
//!
//! All operations are synchronous and must be serialized by the caller.
//! A failed `update` keeps the previous program recorded; a failed
//! `deactivate` keeps the controller `Active` so a still-running enforcement
//! process is never mistaken for a stopped one.

use std::thread;
use std::time::Duration;

use super::client::{ControlChannel, RequestReply};
use super::command::ControlCommand;
use super::supervisor::{LaunchRequest, ProcessLauncher, ProcessSupervisor};
use super::ControllerConfig;
use crate::common::error::{Error, Result};
use crate::mac::HybridMacProgram;

/// Activation lifecycle of the radio's MAC program.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RadioProgramState {
    #[default]
    Inactive,
    Active { program: HybridMacProgram, interface: String },
}

/// Installs, updates and removes hybrid MAC programs on one radio interface.
pub struct MacProgramController<C = ControlChannel, L = ProcessSupervisor> {
    channel: C,
    launcher: L,
    settle_delay: Duration,
    state: RadioProgramState,
}

impl MacProgramController<ControlChannel, ProcessSupervisor> {
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self::new(
            ControlChannel::from_config(config),
            ProcessSupervisor::from_config(config),
            config.settle_delay(),
        )
    }
}

impl<C: RequestReply, L: ProcessLauncher> MacProgramController<C, L> {
    pub fn new(channel: C, launcher: L, settle_delay: Duration) -> Self {
        Self {
            channel,
            launcher,
            settle_delay,
            state: RadioProgramState::Inactive,
        }
    }

    pub fn state(&self) -> &RadioProgramState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, RadioProgramState::Active { .. })
    }

    pub fn active_program(&self) -> Option<&HybridMacProgram> {
        match &self.state {
            RadioProgramState::Active { program, .. } => Some(program),
            RadioProgramState::Inactive => None,
        }
    }

    pub fn interface(&self) -> Option<&str> {
        match &self.state {
            RadioProgramState::Active { interface, .. } => Some(interface),
            RadioProgramState::Inactive => None,
        }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Start enforcing `program` on `interface`.
    ///
    /// Only valid while `Inactive`; an active program must be deactivated
    /// first (`AlreadyActive` otherwise). On any error the state is unchanged.
    /// Validation errors (`InvalidArgument`, `NotConfigured`) are returned
    /// as-is, spawn errors as `ActivationFailed`.
    pub fn activate(&mut self, program: HybridMacProgram, interface: &str) -> Result<()> {
        if let RadioProgramState::Active { interface: active, .. } = &self.state {
            return Err(Error::AlreadyActive {
                operation: "activate",
                interface: active.clone(),
            });
        }
        if interface.trim().is_empty() {
            return Err(Error::InvalidArgument("interface name must not be empty".to_string()));
        }
        let configuration = program.build_configuration_string()?;

        let request = LaunchRequest {
            interface: interface.to_string(),
            slot_duration_ns: program.slot_duration_ns(),
            slot_count: program.slot_count(),
            configuration,
        };
        log::info!(
            "Activating MAC program on {}: {} slots of {} ns",
            interface,
            request.slot_count,
            request.slot_duration_ns
        );
        log::debug!("Initial configuration: {}", request.configuration);

        if let Err(e) = self.launcher.launch(&request) {
            log::error!("Failed to activate MAC program on {}: {}", interface, e);
            return Err(Error::ActivationFailed {
                operation: "activate",
                cause: Box::new(e),
            });
        }

        // The new process starts with fresh command-loop state.
        self.channel.release();
        self.state = RadioProgramState::Active {
            program,
            interface: interface.to_string(),
        };
        Ok(())
    }

    /// Push `new_program` to the running enforcement process.
    pub fn update(&mut self, new_program: HybridMacProgram) -> Result<()> {
        let RadioProgramState::Active { program, interface } = &self.state else {
            return Err(Error::NotActive("update"));
        };
        if program.slot_count() != new_program.slot_count() || program.slot_duration_ns() != new_program.slot_duration_ns() {
            log::warn!(
                "Updated program on {} changes the superframe ({} x {} ns -> {} x {} ns); the running process keeps its startup timing",
                interface,
                program.slot_count(),
                program.slot_duration_ns(),
                new_program.slot_count(),
                new_program.slot_duration_ns()
            );
        }
        let configuration = new_program.build_configuration_string()?;

        if let Err(e) = self.exchange(&ControlCommand::Configure(configuration)) {
            log::error!("Failed to update MAC program: {}", e);
            return Err(Error::UpdateFailed {
                operation: "update",
                cause: Box::new(e),
            });
        }

        if let RadioProgramState::Active { program, .. } = &mut self.state {
            *program = new_program;
        }
        Ok(())
    }

    /// Open the medium, let it settle, then terminate enforcement.
    ///
    /// Returns the program that was active. On failure the controller stays
    /// `Active` and the whole sequence may be retried.
    pub fn deactivate(&mut self) -> Result<HybridMacProgram> {
        let RadioProgramState::Active { program, interface } = &self.state else {
            return Err(Error::NotActive("deactivate"));
        };
        let allow_all = program.build_allow_all_configuration_string();
        log::info!("Deactivating MAC program on {}", interface);

        let teardown = self
            .exchange(&ControlCommand::Configure(allow_all))
            .and_then(|_| {
                thread::sleep(self.settle_delay);
                self.exchange(&ControlCommand::Terminate)
            });
        if let Err(e) = teardown {
            log::error!("Failed to deactivate MAC program: {}", e);
            return Err(Error::DeactivationFailed {
                operation: "deactivate",
                cause: Box::new(e),
            });
        }

        self.channel.release();
        match std::mem::take(&mut self.state) {
            RadioProgramState::Active { program, interface } => {
                log::info!("MAC program on {} deactivated", interface);
                Ok(program)
            }
            RadioProgramState::Inactive => Err(Error::NotActive("deactivate")),
        }
    }

    fn exchange(&mut self, command: &ControlCommand) -> Result<Vec<u8>> {
        self.channel.connect()?;
        log::debug!("Sending {} request: {}", command.label(), command);
        let reply = self.channel.send_and_receive(&command.to_payload())?;
        log::info!(
            "Received {} reply from enforcement process: {}",
            command.label(),
            String::from_utf8_lossy(&reply)
        );
        Ok(reply)
    }
}
