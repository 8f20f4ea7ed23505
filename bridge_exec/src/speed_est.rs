//! # Speed Estimator
//!
//! Converts the pulse-count delta accumulated since the previous sample into an estimated linear
//! speed, using the wheel geometry and the sensor pulses-per-revolution.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::Arc;

use crate::params::BridgeExecParams;
use crate::pulse_counter::PulseCounter;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Conversion factor from metres per second to kilometres per hour
const MS_TO_KMH: f64 = 3.6;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Wheel speed estimator.
pub struct SpeedEstimator {
    counter: Arc<PulseCounter>,

    /// Number of sensor pulses per wheel revolution
    pulses_per_rev: f64,

    /// Wheel diameter in metres
    wheel_diameter_m: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SpeedEstimator {
    /// Create a new estimator sampling the given counter.
    pub fn new(counter: Arc<PulseCounter>, params: &BridgeExecParams) -> Self {
        Self {
            counter,
            pulses_per_rev: params.pulses_per_rev,
            wheel_diameter_m: params.wheel_diameter_m,
        }
    }

    /// Estimate the current speed in km/h over the elapsed interval `dt_s`.
    ///
    /// Samples and resets the pulse counter exactly once, so that pulses are attributed to the
    /// correct interval and never double-counted. If `dt_s` is not positive (a clock anomaly)
    /// `0.0` is returned and the counter is left untouched.
    pub fn estimate(&self, dt_s: f64) -> f64 {
        if dt_s <= 0.0 {
            return 0.0;
        }

        let pulses = self.counter.sample_and_reset() as f64;

        let revs_per_sec = pulses / self.pulses_per_rev / dt_s;
        let speed_ms = revs_per_sec * std::f64::consts::PI * self.wheel_diameter_m;

        speed_ms * MS_TO_KMH
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn estimator(counter: Arc<PulseCounter>) -> SpeedEstimator {
        SpeedEstimator {
            counter,
            pulses_per_rev: 6.0,
            wheel_diameter_m: 0.1,
        }
    }

    #[test]
    fn test_non_positive_dt_returns_zero_without_sampling() {
        let counter = Arc::new(PulseCounter::new());
        let est = estimator(Arc::clone(&counter));

        for _ in 0..6 {
            counter.on_edge();
        }

        assert_eq!(est.estimate(0.0), 0.0);
        assert_eq!(est.estimate(-0.1), 0.0);

        // The pulses must still be there for the next valid sample
        assert_eq!(counter.sample_and_reset(), 6);
    }

    #[test]
    fn test_estimate_from_known_pulse_count() {
        let counter = Arc::new(PulseCounter::new());
        let est = estimator(Arc::clone(&counter));

        // 6 pulses at 6 pulses/rev over 1 s is exactly one revolution per second
        for _ in 0..6 {
            counter.on_edge();
        }

        let speed_kmh = est.estimate(1.0);
        let expected = std::f64::consts::PI * 0.1 * 3.6;

        assert!((speed_kmh - expected).abs() < 1e-12);

        // Counter was reset by the sample
        assert_eq!(est.estimate(1.0), 0.0);
    }
}
