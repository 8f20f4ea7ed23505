//! # Command Channel Worker
//!
//! Long-lived worker owning the reconnecting TCP client on which joystick/gear command lines
//! arrive. For each valid line it runs one control cycle: sample the speed estimator, publish
//! the new speed/gear snapshot to the shared vehicle state, evaluate the drive controller, and
//! write the resulting demand down the serial line.
//!
//! The connection is modelled as an explicit state machine
//! (`Disconnected -> Connecting -> Connected`) with a fixed backoff between reconnection
//! attempts and no terminal state while the process runs. Malformed lines and serial write
//! failures are logged and dropped without disturbing the control state or the connection.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use log::{debug, error, info, trace, warn};
use std::io::{ErrorKind, Read};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

// Internal
use crate::drive_ctrl::{DriveCtrl, Gear, InputData};
use crate::params::BridgeExecParams;
use crate::serial_out::{OutboundCommand, SerialOut};
use crate::speed_est::SpeedEstimator;
use crate::vehicle_state::SharedVehicleState;
use util::module::State;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Granularity of the backoff sleep, bounding shutdown latency while disconnected.
const BACKOFF_POLL_PERIOD: Duration = Duration::from_millis(100);

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Command channel worker
pub struct CmdWorker {
    params: BridgeExecParams,

    estimator: SpeedEstimator,

    drive_ctrl: DriveCtrl,

    shared_state: SharedVehicleState,

    /// Downstream serial line, or `None` when running degraded without an actuator link
    serial: Option<SerialOut>,

    shutdown: Arc<AtomicBool>,

    /// Instant of the previous successful sample, used to attribute pulses to the correct
    /// interval
    last_sample: Instant,
}

/// Raw joystick/gear command parsed from one line of the command channel.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundCommand {
    /// Lateral joystick axis in `[-1, 1]`
    pub x: f64,

    /// Throttle/brake joystick axis in `[-1, 1]`
    pub y: f64,

    /// Numeric gear code, `"0"` to `"4"`
    pub gear_code: String,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Connection state of the worker.
enum ConnState {
    /// Not connected, waiting out the backoff delay
    Disconnected,

    /// Attempting to establish a connection
    Connecting,

    /// Connected and serving inbound lines
    Connected(TcpStream),
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CmdParseError {
    #[error("Expected 3 comma-separated fields, found {0}")]
    WrongFieldCount(usize),

    #[error("Could not parse `{0}` as a number")]
    NonNumericField(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CmdWorker {
    /// Create a new command worker.
    ///
    /// `serial` may be `None`, in which case demands are computed and logged but not actuated.
    pub fn new(
        params: BridgeExecParams,
        estimator: SpeedEstimator,
        drive_ctrl: DriveCtrl,
        shared_state: SharedVehicleState,
        serial: Option<SerialOut>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            params,
            estimator,
            drive_ctrl,
            shared_state,
            serial,
            shutdown,
            last_sample: Instant::now(),
        }
    }

    /// Run the worker until shutdown is requested.
    ///
    /// Consumes the worker so the serial handle is dropped, and the line released, when this
    /// returns on any path.
    pub fn run(mut self) {
        let mut conn = ConnState::Connecting;

        while !self.shutdown.load(Ordering::Relaxed) {
            conn = match conn {
                ConnState::Disconnected => {
                    self.backoff(self.params.command_retry_delay_s);
                    ConnState::Connecting
                }

                ConnState::Connecting => match self.connect() {
                    Ok(stream) => ConnState::Connected(stream),
                    Err(e) => {
                        error!(
                            "Could not connect to the command server at {}: {}",
                            self.params.command_endpoint, e
                        );
                        ConnState::Disconnected
                    }
                },

                ConnState::Connected(stream) => {
                    self.serve(stream);
                    ConnState::Disconnected
                }
            };
        }

        info!("Command worker stopped");
    }

    /// Attempt to establish the command connection.
    fn connect(&self) -> std::io::Result<TcpStream> {
        let stream = TcpStream::connect(self.params.command_endpoint.as_str())?;

        // A bounded read lets the serve loop observe the shutdown flag while idle
        stream.set_read_timeout(Some(Duration::from_secs_f64(
            self.params.command_read_timeout_s,
        )))?;

        Ok(stream)
    }

    /// Serve inbound command lines until the connection is lost or shutdown is requested.
    fn serve(&mut self, mut stream: TcpStream) {
        info!(
            "Connected to the command server at {}",
            self.params.command_endpoint
        );

        // dt is measured from here so the first sample doesn't inherit the reconnect gap
        self.last_sample = Instant::now();

        let mut buf = [0u8; 1024];

        while !self.shutdown.load(Ordering::Relaxed) {
            let num_bytes = match stream.read(&mut buf) {
                Ok(0) => {
                    warn!("Command connection closed by the server, reconnecting");
                    return;
                }
                Ok(n) => n,
                // Read timeout elapsed with no data, go round to recheck the shutdown flag
                Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                    continue
                }
                Err(e) => {
                    error!("Command socket read error: {}, reconnecting", e);
                    return;
                }
            };

            let text = match std::str::from_utf8(&buf[..num_bytes]) {
                Ok(t) => t,
                Err(_) => {
                    warn!("Discarding non-UTF-8 data on the command channel");
                    continue;
                }
            };

            for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
                match parse_line(line) {
                    Ok(cmd) => self.cycle(&cmd),
                    // A bad line is dropped without touching the control state
                    Err(e) => warn!("Discarding malformed command line \"{}\": {}", line, e),
                }
            }
        }
    }

    /// Run one control cycle for a successfully parsed command.
    fn cycle(&mut self, cmd: &InboundCommand) {
        let gear = Gear::from_code(&cmd.gear_code);

        // Time since the previous successful sample, from the monotonic clock
        let now = Instant::now();
        let dt_s = now.duration_since(self.last_sample).as_secs_f64();
        self.last_sample = now;

        let speed_kmh = self.estimator.estimate(dt_s);

        self.shared_state.write(speed_kmh, gear);

        let (output, report) = match self.drive_ctrl.proc(&InputData {
            x: cmd.x,
            y: cmd.y,
            gear,
            speed_kmh,
            dt_s,
        }) {
            Ok(r) => r,
            Err(e) => {
                warn!("Error during DriveCtrl processing: {}", e);
                return;
            }
        };

        let out_cmd = OutboundCommand::from(output);

        debug!(
            "Gear: {} | Speed: {:.2} km/h (error: {:.2}) | PWM: {:.2} (smc: {}) | Serial: {}",
            gear.as_str(),
            speed_kmh,
            report.speed_error_kmh,
            output.pwm,
            report.smc_active,
            out_cmd.to_line()
        );

        // Best-effort actuation, a failed write is retried implicitly on the next cycle
        match self.serial {
            Some(ref mut serial) => {
                if let Err(e) = serial.send(&out_cmd) {
                    warn!("Serial write failed, demand dropped: {}", e);
                }
            }
            None => trace!("No serial line, demand \"{}\" dropped", out_cmd.to_line()),
        }
    }

    /// Wait out the reconnect delay, polling the shutdown flag.
    fn backoff(&self, delay_s: f64) {
        let deadline = Instant::now() + Duration::from_secs_f64(delay_s);

        while Instant::now() < deadline && !self.shutdown.load(Ordering::Relaxed) {
            thread::sleep(BACKOFF_POLL_PERIOD);
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Parse one command line of the form `"<x>,<y>,<gearCode>"`.
pub fn parse_line(line: &str) -> Result<InboundCommand, CmdParseError> {
    let fields: Vec<&str> = line.split(',').collect();

    if fields.len() != 3 {
        return Err(CmdParseError::WrongFieldCount(fields.len()));
    }

    let x = fields[0]
        .trim()
        .parse::<f64>()
        .map_err(|_| CmdParseError::NonNumericField(fields[0].trim().into()))?;
    let y = fields[1]
        .trim()
        .parse::<f64>()
        .map_err(|_| CmdParseError::NonNumericField(fields[1].trim().into()))?;

    Ok(InboundCommand {
        x,
        y,
        gear_code: fields[2].trim().to_string(),
    })
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::pulse_counter::PulseCounter;

    fn test_params() -> BridgeExecParams {
        BridgeExecParams {
            command_endpoint: "127.0.0.1:1112".into(),
            command_retry_delay_s: 5.0,
            command_read_timeout_s: 0.5,
            telemetry_url: "ws://127.0.0.1:2222/ws/pi".into(),
            telemetry_retry_delay_s: 5.0,
            telemetry_period_s: 0.08,
            serial_device: "/dev/serial0".into(),
            serial_baud: 115_200,
            hall_sensor_pins: vec![17, 22, 27],
            pulses_per_rev: 6.0,
            wheel_diameter_m: 0.1,
        }
    }

    #[test]
    fn test_parse_valid_line() {
        assert_eq!(
            parse_line("0.5,-1.0,2").unwrap(),
            InboundCommand {
                x: 0.5,
                y: -1.0,
                gear_code: "2".into()
            }
        );

        // Whitespace around fields and the line is tolerated
        assert_eq!(
            parse_line(" 0.0 , 0.25 , 4 ").unwrap(),
            InboundCommand {
                x: 0.0,
                y: 0.25,
                gear_code: "4".into()
            }
        );
    }

    #[test]
    fn test_parse_malformed_lines() {
        assert_eq!(parse_line("abc,def"), Err(CmdParseError::WrongFieldCount(2)));
        assert_eq!(
            parse_line("0.0,0.0,1,extra"),
            Err(CmdParseError::WrongFieldCount(4))
        );
        assert_eq!(
            parse_line("abc,def,2"),
            Err(CmdParseError::NonNumericField("abc".into()))
        );
        assert_eq!(
            parse_line("0.0,nope,2"),
            Err(CmdParseError::NonNumericField("nope".into()))
        );
    }

    #[test]
    fn test_worker_serves_lines_from_socket() {
        use std::io::Write;
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();

        let mut params = test_params();
        params.command_endpoint = listener.local_addr().unwrap().to_string();
        params.command_retry_delay_s = 0.1;
        params.command_read_timeout_s = 0.05;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shared_state = SharedVehicleState::new();
        let counter = Arc::new(PulseCounter::new());

        let worker = CmdWorker::new(
            params.clone(),
            SpeedEstimator::new(counter, &params),
            DriveCtrl::default(),
            shared_state.clone(),
            None,
            Arc::clone(&shutdown),
        );
        let handle = thread::spawn(move || worker.run());

        let (mut conn, _) = listener.accept().unwrap();

        // A malformed line followed by a valid one: the bad line must be dropped without
        // derailing the loop, the good one must land in the shared state
        conn.write_all(b"abc,def\n").unwrap();
        conn.write_all(b"0.0,-1.0,3\n").unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while shared_state.read().gear != Gear::F2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(shared_state.read().gear, Gear::F2);

        shutdown.store(true, Ordering::Relaxed);
        drop(conn);
        handle.join().unwrap();
    }

    #[test]
    fn test_cycle_updates_shared_state() {
        let params = test_params();
        let counter = Arc::new(PulseCounter::new());
        let shared_state = SharedVehicleState::new();

        let mut worker = CmdWorker::new(
            params.clone(),
            SpeedEstimator::new(counter, &params),
            DriveCtrl::default(),
            shared_state.clone(),
            None,
            Arc::new(AtomicBool::new(false)),
        );

        worker.cycle(&InboundCommand {
            x: 0.0,
            y: -1.0,
            gear_code: "2".into(),
        });

        // Gear code "2" is forward 1, no pulses recorded so speed stays zero
        let snap = shared_state.read();
        assert_eq!(snap.gear, Gear::F1);
        assert_eq!(snap.speed_kmh, 0.0);
    }
}
