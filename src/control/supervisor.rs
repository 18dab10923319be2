//! Launching the external enforcement process.
//!
//! The process is started detached and never killed from here: once running,
//! its only sanctioned teardown path is the `TERMINATE` control command.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

use super::ControllerConfig;
use crate::common::error::{Error, Result};

/// Startup parameters of one enforcement process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub interface: String,
    pub slot_duration_ns: u64,
    pub slot_count: usize,
    pub configuration: String,
}

impl LaunchRequest {
    /// Positional arguments in the order the enforcement binary expects:
    /// `-d <level> -i<iface> -f<slot ns> -n<slots> -c<configuration>`.
    pub fn to_args(&self, debug_level: u8) -> Vec<String> {
        vec![
            "-d".to_string(),
            debug_level.to_string(),
            format!("-i{}", self.interface),
            format!("-f{}", self.slot_duration_ns),
            format!("-n{}", self.slot_count),
            format!("-c{}", self.configuration),
        ]
    }
}

/// Starts the enforcement process in the background.
pub trait ProcessLauncher {
    /// Start the process and return its OS process id.
    fn launch(&self, request: &LaunchRequest) -> Result<u32>;
}

/// Spawns the enforcement executable as a detached child process.
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    executable: PathBuf,
    debug_level: u8,
}

impl ProcessSupervisor {
    pub fn new(executable: impl Into<PathBuf>, debug_level: u8) -> Self {
        Self {
            executable: executable.into(),
            debug_level,
        }
    }

    pub fn from_config(config: &ControllerConfig) -> Self {
        Self::new(&config.executable, config.debug_level)
    }
}

impl ProcessLauncher for ProcessSupervisor {
    fn launch(&self, request: &LaunchRequest) -> Result<u32> {
        let args = request.to_args(self.debug_level);
        log::info!("Starting {} {}", self.executable.display(), args.join(" "));

        let mut child = Command::new(&self.executable)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| Error::ProcessSpawnFailed {
                executable: self.executable.display().to_string(),
                source,
            })?;
        let pid = child.id();

        // Reap the child whenever it exits so it does not linger as a zombie.
        let name = self.executable.display().to_string();
        let reaper = thread::Builder::new()
            .name(format!("hmac-reaper-{}", pid))
            .spawn(move || match child.wait() {
                Ok(status) => log::debug!("{} (pid {}) exited: {}", name, pid, status),
                Err(e) => log::warn!("Failed to wait for {} (pid {}): {}", name, pid, e),
            });
        if let Err(e) = reaper {
            log::warn!("Could not start reaper thread for pid {}: {}", pid, e);
        }

        log::info!("Enforcement process started with pid {}", pid);
        Ok(pid)
    }
}
