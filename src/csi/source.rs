//! Where CSI samples come from.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use super::types::CsiMatrix;
use crate::common::error::{Error, Result};

/// Blocking access to the radio's channel state information.
pub trait CsiSource: Send + Sync {
    /// Acquire one CSI matrix from the radio.
    fn acquire(&self) -> Result<CsiMatrix>;
}

/// Generates Gaussian CSI amplitudes, for bench setups without CSI-capable hardware.
pub struct SimulatedCsiSource {
    shape: [usize; 4],
    amplitude: Normal<f64>,
    failure_rate: f64,
}

impl SimulatedCsiSource {
    /// * `shape` - `[samples, tx_antennas, rx_antennas, subcarriers]`
    /// * `mean` / `std_dev` - amplitude distribution
    pub fn new(shape: [usize; 4], mean: f64, std_dev: f64) -> Result<Self> {
        if !mean.is_finite() || !std_dev.is_finite() || std_dev < 0.0 {
            return Err(Error::InvalidArgument(format!(
                "invalid CSI amplitude distribution: mean {}, std dev {}",
                mean, std_dev
            )));
        }
        let amplitude = Normal::new(mean, std_dev)
            .map_err(|e| Error::InvalidArgument(format!("invalid CSI amplitude distribution: {}", e)))?;
        Ok(Self {
            shape,
            amplitude,
            failure_rate: 0.0,
        })
    }

    /// Make a fraction of acquisitions fail, to mimic transient hardware outages.
    /// The rate must lie in `[0, 1]`.
    pub fn with_failure_rate(mut self, failure_rate: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&failure_rate) {
            return Err(Error::InvalidArgument(format!("CSI failure rate {} outside [0, 1]", failure_rate)));
        }
        self.failure_rate = failure_rate;
        Ok(self)
    }
}

impl CsiSource for SimulatedCsiSource {
    fn acquire(&self) -> Result<CsiMatrix> {
        let mut rng = rand::thread_rng();
        if self.failure_rate > 0.0 && rng.gen_bool(self.failure_rate) {
            return Err(Error::SampleFailed("simulated radio did not deliver CSI".to_string()));
        }
        let len = self.shape.iter().product::<usize>();
        let data = (0..len).map(|_| self.amplitude.sample(&mut rng)).collect();
        CsiMatrix::new(self.shape, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_source_shape() {
        let source = SimulatedCsiSource::new([1, 2, 3, 56], 10.0, 0.5).unwrap();
        let matrix = source.acquire().unwrap();
        assert_eq!(matrix.shape(), [1, 2, 3, 56]);
        assert_eq!(matrix.values().len(), 336);
        let mean = matrix.values().iter().sum::<f64>() / matrix.values().len() as f64;
        assert!((mean - 10.0).abs() < 1.0, "mean {} far from 10", mean);
    }

    #[test]
    fn test_failure_rate_one_always_fails() {
        let source = SimulatedCsiSource::new([1, 1, 1, 1], 0.0, 1.0)
            .unwrap()
            .with_failure_rate(1.0)
            .unwrap();
        assert!(matches!(source.acquire(), Err(Error::SampleFailed(_))));
    }

    #[test]
    fn test_invalid_distribution() {
        for (mean, std_dev) in [(0.0, -1.0), (0.0, f64::NAN), (0.0, f64::INFINITY), (f64::NAN, 1.0)] {
            assert!(
                matches!(SimulatedCsiSource::new([1, 1, 1, 1], mean, std_dev), Err(Error::InvalidArgument(_))),
                "accepted mean {} std dev {}",
                mean,
                std_dev
            );
        }
        assert!(SimulatedCsiSource::new([1, 1, 1, 1], 3.0, 0.0).is_ok());
    }

    #[test]
    fn test_invalid_failure_rate() {
        for rate in [-0.1, 1.5, f64::NAN] {
            let source = SimulatedCsiSource::new([1, 1, 1, 1], 0.0, 1.0).unwrap();
            assert!(matches!(source.with_failure_rate(rate), Err(Error::InvalidArgument(_))));
        }
    }
}
