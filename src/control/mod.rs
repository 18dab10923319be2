//! Control plane for the hybrid MAC enforcement process.
//!
//! The controller launches the userspace enforcement daemon, pushes slot
//! configurations to it over a line-framed TCP request/reply channel and
//! tears it down again.

pub mod client;
pub mod command;
pub mod config;
pub mod controller;
pub mod supervisor;

pub use client::{ControlChannel, RequestReply};
pub use command::ControlCommand;
pub use config::ControllerConfig;
pub use controller::{MacProgramController, RadioProgramState};
pub use supervisor::{LaunchRequest, ProcessLauncher, ProcessSupervisor};
