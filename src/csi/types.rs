//! Type definitions for channel state information samples.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::error::{Error, Result};

/// CSI values indexed `[sample][tx_antenna][rx_antenna][subcarrier]`,
/// stored row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsiMatrix {
    shape: [usize; 4],
    data: Vec<f64>,
}

impl CsiMatrix {
    /// Build a matrix from row-major `data`; its length must match `shape`.
    pub fn new(shape: [usize; 4], data: Vec<f64>) -> Result<Self> {
        let expected = shape.iter().product::<usize>();
        if data.len() != expected {
            return Err(Error::InvalidArgument(format!(
                "CSI shape {:?} needs {} values, got {}",
                shape,
                expected,
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    pub fn zeros(shape: [usize; 4]) -> Self {
        Self {
            shape,
            data: vec![0.0; shape.iter().product()],
        }
    }

    /// `[samples, tx_antennas, rx_antennas, subcarriers]`
    pub fn shape(&self) -> [usize; 4] {
        self.shape
    }

    pub fn get(&self, sample: usize, tx: usize, rx: usize, subcarrier: usize) -> Option<f64> {
        let [samples, txs, rxs, subcarriers] = self.shape;
        if sample >= samples || tx >= txs || rx >= rxs || subcarrier >= subcarriers {
            return None;
        }
        let index = ((sample * txs + tx) * rxs + rx) * subcarriers + subcarrier;
        self.data.get(index).copied()
    }

    pub fn values(&self) -> &[f64] {
        &self.data
    }
}

/// One CSI capture with the time it was taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsiSample {
    pub matrix: CsiMatrix,
    pub captured_at: DateTime<Utc>,
}

/// Event published once per acquired sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsiSampleEvent {
    /// Name of the collector that produced the sample
    pub collector: String,
    /// Per-collector-task counter of published samples, starting at 0
    pub sequence: u64,
    pub sample: CsiSample,
}

impl CsiSampleEvent {
    /// Encode the event for forwarding over an event bus.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidArgument(format!("CSI event not serializable: {}", e)))
    }
}
