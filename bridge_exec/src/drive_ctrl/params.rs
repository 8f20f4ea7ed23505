//! Parameters for the DriveCtrl module

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// Internal
use super::Gear;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// DriveCtrl tuning parameters, loaded from `drive_ctrl.toml`.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Params {
    /// Proportional gain of the feedback term
    pub k_p: f64,

    /// Integral gain of the feedback term
    pub k_i: f64,

    /// Tolerance band on the full-throttle detection: the feedback term may activate while
    /// `y <= -1.0 + full_throttle_tol`. A value of `0.0` requires the joystick to report exactly
    /// full throttle.
    pub full_throttle_tol: f64,

    /// Maximum open-loop PWM per gear symbol, in `[-1.0, 1.0]`. Negative for reverse.
    pub max_pwm: HashMap<String, f64>,

    /// Target speed per gear symbol
    ///
    /// Units: km/h
    pub speed_target_kmh: HashMap<String, f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Maximum open-loop PWM for the gear. Gears absent from the table map to `0.0`.
    pub fn max_pwm_for(&self, gear: Gear) -> f64 {
        self.max_pwm.get(gear.as_str()).copied().unwrap_or(0.0)
    }

    /// Target speed in km/h for the gear. Gears absent from the table map to `0.0`.
    pub fn speed_target_for(&self, gear: Gear) -> f64 {
        self.speed_target_kmh
            .get(gear.as_str())
            .copied()
            .unwrap_or(0.0)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_missing_gear_maps_to_zero() {
        let params = Params::default();

        assert_eq!(params.max_pwm_for(Gear::F3), 0.0);
        assert_eq!(params.speed_target_for(Gear::R), 0.0);
    }

    #[test]
    fn test_params_parse_from_toml() {
        let params: Params = toml::from_str(
            r#"
            k_p = 0.1
            k_i = 0.02
            full_throttle_tol = 0.0

            [max_pwm]
            R = -0.2
            N = 0.0
            "1" = 0.2

            [speed_target_kmh]
            R = 8.0
            N = 0.0
            "1" = 15.0
            "#,
        )
        .unwrap();

        assert_eq!(params.k_p, 0.1);
        assert_eq!(params.max_pwm_for(Gear::R), -0.2);
        assert_eq!(params.speed_target_for(Gear::F1), 15.0);
    }
}
