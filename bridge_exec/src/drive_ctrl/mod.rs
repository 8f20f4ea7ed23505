//! Drive control module
//!
//! DriveCtrl converts a raw joystick/gear command plus the current speed estimate into a bounded
//! steering angle and throttle/brake PWM demand. The throttle path is the sum of an open-loop
//! gear-dependent mapping and a conditionally-active proportional-plus-integral correction (a
//! simplified sliding-mode-style boost towards the gear's target speed).

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod gear;
mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use gear::*;
pub use params::*;
pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during DriveCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum DriveCtrlError {
    #[error("Non-finite `{0}` input to the controller")]
    NonFiniteInput(&'static str),
}
