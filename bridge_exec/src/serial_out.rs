//! # Serial Downstream
//!
//! Point-to-point serial line to the motor controller. Each cycle's demand is formatted as a
//! fixed two-field text line, `"<angle>,<pwm>\n"`, which the downstream firmware decodes into a
//! steering pulse-width and a throttle pulse-width.
//!
//! The port handle is released when the [`SerialOut`] is dropped, so the line is freed on every
//! exit path of the owning worker, including an interrupt-driven shutdown.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::io::Write;
use std::time::Duration;

use serialport::SerialPort;

use crate::drive_ctrl::OutputData;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Write timeout on the serial port. Writes are best-effort, a slow port must not stall the
/// command loop for longer than this.
const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Actuator command as sent down the serial line.
#[derive(Clone, Copy, Debug)]
pub struct OutboundCommand {
    /// Steering servo angle in `[0, 180]`
    ///
    /// Units: degrees
    pub steer_deg: f64,

    /// Throttle/brake duty in `[-1, 1]`
    pub pwm: f64,
}

/// Downstream serial writer.
pub struct SerialOut {
    port: Box<dyn SerialPort>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SerialOutError {
    #[error("Could not open the serial port: {0}")]
    OpenError(serialport::Error),

    #[error("Could not write the command line: {0}")]
    WriteError(std::io::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl OutboundCommand {
    /// Format the command as the downstream wire line, without the trailing newline.
    ///
    /// The angle is formatted to one decimal place and the PWM to two, the precision the
    /// actuator firmware is calibrated against.
    pub fn to_line(&self) -> String {
        format!("{:.1},{:.2}", self.steer_deg, self.pwm)
    }
}

impl From<OutputData> for OutboundCommand {
    fn from(output: OutputData) -> Self {
        Self {
            steer_deg: output.steer_deg,
            pwm: output.pwm,
        }
    }
}

impl SerialOut {
    /// Open the serial device at the given baud rate.
    pub fn open(device: &str, baud: u32) -> Result<Self, SerialOutError> {
        let port = serialport::new(device, baud)
            .timeout(WRITE_TIMEOUT)
            .open()
            .map_err(SerialOutError::OpenError)?;

        Ok(Self { port })
    }

    /// Write one command line to the downstream controller.
    pub fn send(&mut self, cmd: &OutboundCommand) -> Result<(), SerialOutError> {
        let mut line = cmd.to_line();
        line.push('\n');

        self.port
            .write_all(line.as_bytes())
            .map_err(SerialOutError::WriteError)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_line_format() {
        let cmd = OutboundCommand {
            steer_deg: 45.0,
            pwm: 0.30,
        };

        assert_eq!(cmd.to_line(), "45.0,0.30");
    }

    #[test]
    fn test_line_format_rounding() {
        let cmd = OutboundCommand {
            steer_deg: 90.0 + 0.25 * 90.0,
            pwm: -1.0,
        };

        assert_eq!(cmd.to_line(), "112.5,-1.00");
    }
}
