//! # Bridge Executable Parameters
//!
//! This module provides parameters for the bridge executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Clone, Serialize, Deserialize)]
pub struct BridgeExecParams {
    /// Network endpoint (`host:port`) of the command server the bridge connects to
    pub command_endpoint: String,

    /// Delay between command channel reconnection attempts
    ///
    /// Units: seconds
    pub command_retry_delay_s: f64,

    /// Read timeout on the command socket, bounding how long the worker can block before it
    /// rechecks the shutdown flag
    ///
    /// Units: seconds
    pub command_read_timeout_s: f64,

    /// WebSocket URL of the telemetry dashboard server
    pub telemetry_url: String,

    /// Delay between telemetry channel reconnection attempts
    ///
    /// Units: seconds
    pub telemetry_retry_delay_s: f64,

    /// Period between telemetry packets
    ///
    /// Units: seconds
    pub telemetry_period_s: f64,

    /// Device path of the downstream serial line to the motor controller
    pub serial_device: String,

    /// Baud rate of the downstream serial line
    pub serial_baud: u32,

    /// BCM pin numbers of the redundant hall-effect wheel sensors
    pub hall_sensor_pins: Vec<u8>,

    /// Number of sensor pulses per wheel revolution
    pub pulses_per_rev: f64,

    /// Wheel diameter
    ///
    /// Units: metres
    pub wheel_diameter_m: f64,
}
