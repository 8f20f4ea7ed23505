//! # Bridge library.
//!
//! This library exposes the modules making up the vehicle-side control
//! bridge, so that they can be tested and reused by other binaries in the
//! workspace.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Command channel worker - recieves joystick/gear lines over TCP and drives the control cycle
pub mod cmd_worker;

/// Drive control module - computes steering and throttle/brake PWM from joystick, gear and speed
pub mod drive_ctrl;

/// Parameters for the bridge executable
pub mod params;

/// Pulse counter - interrupt-driven counter fed by the hall-effect wheel sensors
pub mod pulse_counter;

/// Serial downstream - formats and writes actuator commands to the motor controller
pub mod serial_out;

/// Speed estimator - converts pulse-count deltas into a linear speed estimate
pub mod speed_est;

/// Telemetry channel worker - publishes speed/gear snapshots over a WebSocket
pub mod tm_worker;

/// Shared vehicle state - mutex-guarded speed/gear record shared between the workers
pub mod vehicle_state;
