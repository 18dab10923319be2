//! Per-slot access policies.
//!
//! An access policy lists which peers may transmit which traffic classes
//! during one slot of the superframe, or marks the slot as a guard slot in
//! which nothing may be sent.

use std::str::FromStr;

use crate::common::error::{Error, Result};

/// 48-bit hardware address of a peer station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// Wildcard address used by the allow-all configuration.
    pub const BROADCAST: MacAddress = MacAddress([0xFF; 6]);

    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for MacAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut octets = [0u8; 6];
        let mut parts = s.trim().split(':');
        for octet in octets.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| Error::InvalidArgument(format!("MAC address '{}' has fewer than 6 octets", s)))?;
            if part.len() != 2 {
                return Err(Error::InvalidArgument(format!("MAC address '{}' has a malformed octet '{}'", s, part)));
            }
            *octet = u8::from_str_radix(part, 16)
                .map_err(|_| Error::InvalidArgument(format!("MAC address '{}' has a non-hex octet '{}'", s, part)))?;
        }
        if parts.next().is_some() {
            return Err(Error::InvalidArgument(format!("MAC address '{}' has more than 6 octets", s)));
        }
        Ok(Self(octets))
    }
}

impl std::fmt::Display for MacAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}", a, b, c, d, e, g)
    }
}

/// One allow rule: the peer and the bitmask of traffic classes it may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyEntry {
    pub peer: MacAddress,
    pub traffic_class_mask: u8,
}

/// Allow/deny rule set for a single slot.
///
/// A guard policy never holds entries; a policy that is not a guard needs at
/// least one entry before it can be attached to a program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    entries: Vec<PolicyEntry>,
    guard: bool,
}

impl AccessPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy denying all traffic in its slot.
    pub fn guard() -> Self {
        Self { entries: Vec::new(), guard: true }
    }

    /// Allow `peer` to transmit the traffic classes set in `traffic_class_mask`.
    pub fn add_entry(&mut self, peer: MacAddress, traffic_class_mask: u8) -> Result<&mut Self> {
        if self.guard {
            return Err(Error::InvalidArgument(format!(
                "cannot allow {} in a guard slot policy",
                peer
            )));
        }
        self.entries.push(PolicyEntry { peer, traffic_class_mask });
        Ok(self)
    }

    /// Like [`add_entry`](Self::add_entry) for masks arriving as wider integers.
    pub fn add_entry_checked(&mut self, peer: MacAddress, traffic_class_mask: u32) -> Result<&mut Self> {
        let mask = u8::try_from(traffic_class_mask).map_err(|_| {
            Error::InvalidArgument(format!("traffic class mask {} exceeds 255", traffic_class_mask))
        })?;
        self.add_entry(peer, mask)
    }

    /// Turn this policy into a guard slot, dropping all entries. Idempotent.
    pub fn disable_all(&mut self) -> &mut Self {
        self.entries.clear();
        self.guard = true;
        self
    }

    pub fn entries(&self) -> &[PolicyEntry] {
        &self.entries
    }

    pub fn is_guard(&self) -> bool {
        self.guard
    }

    /// Check the guard/entry invariant before the policy is attached to a slot.
    pub(crate) fn validate(&self) -> Result<()> {
        if !self.guard && self.entries.is_empty() {
            return Err(Error::InvalidArgument(
                "access policy has no entries and is not a guard slot".to_string(),
            ));
        }
        Ok(())
    }
}
