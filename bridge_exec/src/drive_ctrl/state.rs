//! Implementations for the DriveCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
use super::{DriveCtrlError, Gear, Params};
use util::{module::State, params, session::Session};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Drive control module state
#[derive(Default)]
pub struct DriveCtrl {
    pub(crate) params: Params,

    /// Accumulated integral of the speed error. The sole piece of control-loop memory, reset to
    /// zero on every cycle in which the feedback term is inactive.
    integral_error_kmh_s: f64,
}

/// Input data to Drive Control, one inbound command cycle.
#[derive(Clone, Copy, Debug)]
pub struct InputData {
    /// Lateral joystick axis in `[-1, 1]`
    pub x: f64,

    /// Throttle/brake joystick axis in `[-1, 1]`. `-1.0` is full throttle, values above `0.0`
    /// mean no throttle.
    pub y: f64,

    /// Active gear
    pub gear: Gear,

    /// Current speed estimate
    ///
    /// Units: km/h
    pub speed_kmh: f64,

    /// Time elapsed since the previous command cycle
    ///
    /// Units: seconds
    pub dt_s: f64,
}

/// Output demand from DriveCtrl that the downstream motor controller must execute.
#[derive(Clone, Copy, Serialize, Debug)]
pub struct OutputData {
    /// Steering servo angle demand
    ///
    /// Units: degrees, in `[0, 180]`, 90 is straight ahead
    pub steer_deg: f64,

    /// Throttle/brake duty demand, in `[-1, 1]`
    pub pwm: f64,
}

/// Status report for DriveCtrl processing.
#[derive(Clone, Copy, Default, Serialize, Debug)]
pub struct StatusReport {
    /// True if the feedback term was active on this cycle
    pub smc_active: bool,

    /// True if the combined PWM demand had to be saturated
    pub pwm_saturated: bool,

    /// Speed error against the gear's target on this cycle
    ///
    /// Units: km/h
    pub speed_error_kmh: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for DriveCtrl {
    type InitData = &'static str;
    type InitError = params::LoadError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = DriveCtrlError;

    /// Initialise the DriveCtrl module.
    ///
    /// Expected init data is the path to the parameter file
    fn init(&mut self, init_data: Self::InitData, _session: &Session) -> Result<(), Self::InitError> {
        self.params = params::load(init_data)?;

        Ok(())
    }

    /// Perform cyclic processing of Drive Control.
    ///
    /// For any finite input the output PWM is within `[-1, 1]` and the steering angle within
    /// `[0, 180]` degrees.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        // Arithmetic below is only meaningful for finite axes/estimates, reject anything else
        if !input_data.x.is_finite() {
            return Err(DriveCtrlError::NonFiniteInput("x"));
        }
        if !input_data.y.is_finite() {
            return Err(DriveCtrlError::NonFiniteInput("y"));
        }
        if !input_data.speed_kmh.is_finite() {
            return Err(DriveCtrlError::NonFiniteInput("speed_kmh"));
        }
        if !input_data.dt_s.is_finite() {
            return Err(DriveCtrlError::NonFiniteInput("dt_s"));
        }

        let mut report = StatusReport::default();

        // Open-loop term: scale the gear's maximum PWM by the throttle depression, negated in
        // reverse so the demand drives the motor backwards
        let throttle = (-input_data.y).max(0.0);
        let mut pwm_open_loop = throttle * self.params.max_pwm_for(input_data.gear).abs();
        if input_data.gear == Gear::R {
            pwm_open_loop = -pwm_open_loop;
        }

        // Feedback term, active only while the throttle is fully depressed, the vehicle trails
        // the gear's target speed, and the target is not neutral
        let speed_ref_kmh = self.params.speed_target_for(input_data.gear);
        let error_kmh = speed_ref_kmh - input_data.speed_kmh;
        report.speed_error_kmh = error_kmh;

        let full_throttle = input_data.y <= -1.0 + self.params.full_throttle_tol;

        let pwm_smc = if full_throttle
            && input_data.speed_kmh < speed_ref_kmh
            && speed_ref_kmh != 0.0
        {
            report.smc_active = true;

            self.integral_error_kmh_s += error_kmh * input_data.dt_s;

            self.params.k_p * error_kmh + self.params.k_i * self.integral_error_kmh_s
        } else {
            // Anti-windup: integral memory does not persist across mode transitions
            self.integral_error_kmh_s = 0.0;

            0.0
        };

        // Combine and saturate
        let pwm_raw = pwm_open_loop + pwm_smc;
        let pwm = pwm_raw.clamp(-1.0, 1.0);
        report.pwm_saturated = pwm != pwm_raw;

        // Steering is independent of the speed-control path
        let steer_deg = (90.0 + input_data.x * 90.0).clamp(0.0, 180.0);

        Ok((OutputData { steer_deg, pwm }, report))
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    /// The tuning used on the vehicle
    fn test_params() -> Params {
        let mut max_pwm = std::collections::HashMap::new();
        max_pwm.insert("R".into(), -0.2);
        max_pwm.insert("N".into(), 0.0);
        max_pwm.insert("1".into(), 0.2);
        max_pwm.insert("2".into(), 0.35);
        max_pwm.insert("3".into(), 0.45);

        let mut speed_target_kmh = std::collections::HashMap::new();
        speed_target_kmh.insert("R".into(), 8.0);
        speed_target_kmh.insert("N".into(), 0.0);
        speed_target_kmh.insert("1".into(), 15.0);
        speed_target_kmh.insert("2".into(), 30.0);
        speed_target_kmh.insert("3".into(), 45.0);

        Params {
            k_p: 0.1,
            k_i: 0.02,
            full_throttle_tol: 0.0,
            max_pwm,
            speed_target_kmh,
        }
    }

    fn test_ctrl() -> DriveCtrl {
        DriveCtrl {
            params: test_params(),
            ..Default::default()
        }
    }

    #[test]
    fn test_full_throttle_below_target_saturates() {
        let mut ctrl = test_ctrl();

        // Gear code "2" is forward 1, target 15 km/h. At standstill with full throttle the
        // feedback activates: error 15, integral 1.5, smc 1.53, open loop 0.2, saturated to 1.0
        let (out, report) = ctrl
            .proc(&InputData {
                x: 0.0,
                y: -1.0,
                gear: Gear::from_code("2"),
                speed_kmh: 0.0,
                dt_s: 0.1,
            })
            .unwrap();

        assert!(report.smc_active);
        assert!(report.pwm_saturated);
        assert_eq!(report.speed_error_kmh, 15.0);
        assert_eq!(out.pwm, 1.0);
        assert_eq!(out.steer_deg, 90.0);
        assert!((ctrl.integral_error_kmh_s - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_neutral_never_activates_feedback() {
        let mut ctrl = test_ctrl();

        // Gear code "1" is neutral: target speed 0 so the feedback never activates and the open
        // loop maps to 0 whatever the throttle
        for &y in &[-1.0, -0.5, 0.0, 1.0] {
            let (out, report) = ctrl
                .proc(&InputData {
                    x: 0.3,
                    y,
                    gear: Gear::from_code("1"),
                    speed_kmh: -5.0,
                    dt_s: 0.1,
                })
                .unwrap();

            assert!(!report.smc_active);
            assert_eq!(out.pwm, 0.0);
        }
    }

    #[test]
    fn test_reverse_negates_open_loop() {
        let mut ctrl = test_ctrl();

        // Part throttle in reverse, above the 8 km/h target so no feedback
        let (out, report) = ctrl
            .proc(&InputData {
                x: 0.0,
                y: -0.5,
                gear: Gear::R,
                speed_kmh: 10.0,
                dt_s: 0.1,
            })
            .unwrap();

        assert!(!report.smc_active);
        assert!((out.pwm - (-0.1)).abs() < 1e-12);
    }

    #[test]
    fn test_integral_reset_is_idempotent() {
        let mut ctrl = test_ctrl();

        let active = InputData {
            x: 0.0,
            y: -1.0,
            gear: Gear::F1,
            speed_kmh: 0.0,
            dt_s: 0.1,
        };
        let inactive = InputData { y: 0.0, ..active };

        ctrl.proc(&active).unwrap();
        assert!(ctrl.integral_error_kmh_s > 0.0);

        // Two consecutive inactive cycles both leave the integral at exactly zero
        ctrl.proc(&inactive).unwrap();
        assert_eq!(ctrl.integral_error_kmh_s, 0.0);
        ctrl.proc(&inactive).unwrap();
        assert_eq!(ctrl.integral_error_kmh_s, 0.0);
    }

    #[test]
    fn test_outputs_always_bounded() {
        let mut ctrl = test_ctrl();

        let axis_values = [-1.0, -0.999, -0.5, 0.0, 0.5, 1.0];
        let speeds = [-100.0, 0.0, 14.9, 15.0, 50.0, 1.0e6];
        let gears = [Gear::R, Gear::N, Gear::F1, Gear::F2, Gear::F3];

        for &x in &axis_values {
            for &y in &axis_values {
                for &speed_kmh in &speeds {
                    for &gear in &gears {
                        let (out, _) = ctrl
                            .proc(&InputData {
                                x,
                                y,
                                gear,
                                speed_kmh,
                                dt_s: 0.1,
                            })
                            .unwrap();

                        assert!(out.pwm >= -1.0 && out.pwm <= 1.0);
                        assert!(out.steer_deg >= 0.0 && out.steer_deg <= 180.0);
                    }
                }
            }
        }
    }

    #[test]
    fn test_non_finite_input_rejected() {
        let mut ctrl = test_ctrl();

        let result = ctrl.proc(&InputData {
            x: f64::NAN,
            y: 0.0,
            gear: Gear::N,
            speed_kmh: 0.0,
            dt_s: 0.1,
        });

        assert!(result.is_err());
    }
}
