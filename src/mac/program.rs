//! Hybrid TDMA/CSMA MAC program: the slot table handed to the enforcement
//! process, and its serialization into control-plane configuration strings.
//!
//! Configuration strings are the wire payload understood by the enforcement
//! process. Records are `<slot>,<mac>,<mask>` joined by `#`, emitted in
//! ascending slot order and, within a slot, in entry insertion order.

use super::policy::{AccessPolicy, MacAddress};
use crate::common::error::{Error, Result};

/// Separator between configuration records.
pub const RECORD_SEPARATOR: &str = "#";

/// Traffic class mask allowing every class, used by the allow-all configuration.
pub const ALLOW_ALL_MASK: u8 = 255;

/// Full superframe description: slot count, slot length and one policy per slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HybridMacProgram {
    slot_duration_ns: u64,
    slots: Vec<Option<AccessPolicy>>,
}

impl HybridMacProgram {
    /// Create a program with `slot_count` unconfigured slots.
    pub fn new(slot_count: usize, slot_duration_ns: u64) -> Result<Self> {
        if slot_count == 0 {
            return Err(Error::InvalidArgument("slot count must be positive".to_string()));
        }
        if slot_duration_ns == 0 {
            return Err(Error::InvalidArgument("slot duration must be positive".to_string()));
        }
        Ok(Self {
            slot_duration_ns,
            slots: vec![None; slot_count],
        })
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slot_duration_ns(&self) -> u64 {
        self.slot_duration_ns
    }

    /// Assign `policy` to `slot_index`, replacing any earlier assignment.
    pub fn set_slot_policy(&mut self, slot_index: usize, policy: AccessPolicy) -> Result<()> {
        let slot_count = self.slots.len();
        let slot = self
            .slots
            .get_mut(slot_index)
            .ok_or(Error::OutOfRange { index: slot_index, slot_count })?;
        policy.validate()?;
        *slot = Some(policy);
        Ok(())
    }

    pub fn get_slot_policy(&self, slot_index: usize) -> Result<&AccessPolicy> {
        self.slots
            .get(slot_index)
            .ok_or(Error::OutOfRange { index: slot_index, slot_count: self.slots.len() })?
            .as_ref()
            .ok_or_else(|| Error::NotConfigured(format!("slot {} has no access policy", slot_index)))
    }

    pub fn first_unconfigured_slot(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }

    pub fn is_fully_configured(&self) -> bool {
        self.first_unconfigured_slot().is_none()
    }

    /// Fail with `NotConfigured` naming the first slot that was never set.
    pub fn ensure_fully_configured(&self) -> Result<()> {
        match self.first_unconfigured_slot() {
            Some(slot) => Err(Error::NotConfigured(format!(
                "slot {} of {} has no access policy",
                slot,
                self.slots.len()
            ))),
            None => Ok(()),
        }
    }

    /// Build the configuration string sent to the enforcement process.
    ///
    /// Guard slots contribute no records, so a program made only of guard
    /// slots yields an empty string.
    pub fn build_configuration_string(&self) -> Result<String> {
        self.ensure_fully_configured()?;
        let records: Vec<String> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|policy| (index, policy)))
            .flat_map(|(index, policy)| {
                policy
                    .entries()
                    .iter()
                    .map(move |entry| format_record(index, &entry.peer, entry.traffic_class_mask))
            })
            .collect();
        Ok(join_records(&records))
    }

    /// Build the configuration opening every slot to every peer and traffic class.
    pub fn build_allow_all_configuration_string(&self) -> String {
        let records: Vec<String> = (0..self.slots.len())
            .map(|index| format_record(index, &MacAddress::BROADCAST, ALLOW_ALL_MASK))
            .collect();
        join_records(&records)
    }
}

fn format_record(slot_index: usize, peer: &MacAddress, traffic_class_mask: u8) -> String {
    format!("{},{},{}", slot_index, peer, traffic_class_mask)
}

fn join_records(records: &[String]) -> String {
    records.join(RECORD_SEPARATOR)
}
