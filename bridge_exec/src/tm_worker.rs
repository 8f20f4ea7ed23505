//! # Telemetry Channel Worker
//!
//! Long-lived worker owning the reconnecting WebSocket client on which speed/gear telemetry is
//! published to the dashboard. At a fixed cadence it snapshots the shared vehicle state,
//! serializes a [`TmPacket`] and sends it as a JSON text frame.
//!
//! The connection follows the same explicit state machine as the command worker
//! (`Disconnected -> Connecting -> Connected`), with its own independent backoff delay.
//! Telemetry is non-authoritative: a lost connection never affects the control loop.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use log::{error, info, trace};
use serde::Serialize;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

// Internal
use crate::params::BridgeExecParams;
use crate::vehicle_state::{SharedVehicleState, VehicleState};
use crate::drive_ctrl::Gear;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Granularity of the backoff sleep, bounding shutdown latency while disconnected.
const BACKOFF_POLL_PERIOD: Duration = Duration::from_millis(100);

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Telemetry channel worker
pub struct TmWorker {
    params: BridgeExecParams,

    shared_state: SharedVehicleState,

    shutdown: Arc<AtomicBool>,
}

/// Telemetry packet published to the dashboard.
///
/// Constructed fresh from a state snapshot on each publish tick.
#[derive(Debug, Serialize)]
pub struct TmPacket {
    /// Speed estimate rounded to the nearest km/h
    pub speed: i64,

    /// Active gear symbol
    pub gear: Gear,
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

    /// Connected and publishing
    Connected(Box<WebSocket<MaybeTlsStream<TcpStream>>>),
}

#[derive(Debug, thiserror::Error)]
pub enum TmWorkerError {
    #[error("Could not connect to the telemetry server: {0}")]
    ConnectError(tungstenite::Error),

    #[error("Could not send telemetry: {0}")]
    SendError(tungstenite::Error),

    #[error("Could not serialize the telemetry: {0}")]
    SerializationError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TmPacket {
    /// Build a packet from a vehicle state snapshot.
    pub fn from_state(state: &VehicleState) -> Self {
        Self {
            speed: state.speed_kmh.round() as i64,
            gear: state.gear,
        }
    }
}

impl TmWorker {
    /// Create a new telemetry worker.
    pub fn new(
        params: BridgeExecParams,
        shared_state: SharedVehicleState,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            params,
            shared_state,
            shutdown,
        }
    }

    /// Run the worker until shutdown is requested.
    pub fn run(self) {
        let mut conn = ConnState::Connecting;

        while !self.shutdown.load(Ordering::Relaxed) {
            conn = match conn {
                ConnState::Disconnected => {
                    self.backoff(self.params.telemetry_retry_delay_s);
                    ConnState::Connecting
                }

                ConnState::Connecting => match self.connect() {
                    Ok(ws) => ConnState::Connected(Box::new(ws)),
                    Err(e) => {
                        error!("{}", e);
                        ConnState::Disconnected
                    }
                },

                ConnState::Connected(mut ws) => {
                    if let Err(e) = self.publish(&mut ws) {
                        error!("{}, reconnecting", e);
                    }
                    ws.close(None).ok();
                    ConnState::Disconnected
                }
            };
        }

        info!("Telemetry worker stopped");
    }

    /// Attempt to establish the telemetry connection.
    fn connect(&self) -> Result<WebSocket<MaybeTlsStream<TcpStream>>, TmWorkerError> {
        let (ws, _response) = tungstenite::connect(self.params.telemetry_url.as_str())
            .map_err(TmWorkerError::ConnectError)?;

        info!(
            "Connected to the telemetry server at {}",
            self.params.telemetry_url
        );

        Ok(ws)
    }

    /// Publish packets at the configured cadence until a send fails or shutdown is requested.
    fn publish(
        &self,
        ws: &mut WebSocket<MaybeTlsStream<TcpStream>>,
    ) -> Result<(), TmWorkerError> {
        let period = Duration::from_secs_f64(self.params.telemetry_period_s);

        while !self.shutdown.load(Ordering::Relaxed) {
            thread::sleep(period);

            // Snapshot under the mutex, serialize outside it
            let packet = TmPacket::from_state(&self.shared_state.read());

            let packet_string =
                serde_json::to_string(&packet).map_err(TmWorkerError::SerializationError)?;

            trace!("Sending telemetry: {}", packet_string);

            ws.send(Message::Text(packet_string))
                .map_err(TmWorkerError::SendError)?;
        }

        Ok(())
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
// TESTS
// ------------------------------------------------------------------------------------------------
