//! Slot-based access-policy data model of the hybrid TDMA/CSMA MAC.
//!
//! - `policy`: per-slot allow/deny rules and peer addresses
//! - `program`: the superframe slot table and its configuration strings

pub mod policy;
pub mod program;

pub use policy::{AccessPolicy, MacAddress, PolicyEntry};
pub use program::HybridMacProgram;
