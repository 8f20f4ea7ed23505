//! Main vehicle-side bridge executable entry point.
//!
//! # Architecture
//!
//! The executable runs two independent long-lived workers plus this supervising thread:
//!
//!     - Command channel worker:
//!         - Recieves joystick/gear lines over a reconnecting TCP client
//!         - Samples the speed estimator and evaluates the drive controller
//!         - Updates the shared vehicle state
//!         - Writes the resulting demand to the downstream serial line
//!     - Telemetry channel worker:
//!         - Snapshots the shared vehicle state at a fixed cadence
//!         - Publishes speed/gear packets over a reconnecting WebSocket client
//!
//! The workers only share the mutex-guarded vehicle state and the shutdown flag; each owns its
//! connection and recovers from connectivity loss locally with its own backoff. An interrupt
//! sets the shutdown flag, both workers exit at their next blocking-call boundary, and the
//! serial handle is released when the command worker drops it.

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use bridge_lib::{
    cmd_worker::CmdWorker,
    drive_ctrl::DriveCtrl,
    params::BridgeExecParams,
    pulse_counter::{HallSensors, PulseCounter},
    serial_out::SerialOut,
    speed_est::SpeedEstimator,
    tm_worker::TmWorker,
    vehicle_state::SharedVehicleState,
};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

// Internal
use util::{
    logger::{logger_init, LevelFilter},
    module::State,
    session::Session,
};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session =
        Session::new("bridge_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Trace, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("RC Vehicle Control Bridge\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let params: BridgeExecParams =
        util::params::load("bridge_exec.toml").wrap_err("Could not load exec params")?;

    info!("Exec parameters loaded");

    // ---- SHUTDOWN HANDLING ----

    let shutdown = Arc::new(AtomicBool::new(false));

    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::Relaxed);
        })
        .wrap_err("Failed to install the interrupt handler")?;
    }

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let counter = Arc::new(PulseCounter::new());

    // The bridge degrades to a zero speed estimate rather than exiting if the sensor stack is
    // unavailable
    let _hall_sensors = match HallSensors::attach(&counter, &params.hall_sensor_pins) {
        Ok(h) => {
            info!("Hall sensors attached on pins {:?}", params.hall_sensor_pins);
            Some(h)
        }
        Err(e) => {
            warn!("Hall sensor bring-up failed, speed will read zero: {}", e);
            None
        }
    };

    let estimator = SpeedEstimator::new(Arc::clone(&counter), &params);

    let mut drive_ctrl = DriveCtrl::default();
    drive_ctrl
        .init("drive_ctrl.toml", &session)
        .wrap_err("Failed to initialise DriveCtrl")?;
    info!("DriveCtrl init complete");

    // Likewise a missing actuator link is degraded, not fatal
    let serial = match SerialOut::open(&params.serial_device, params.serial_baud) {
        Ok(s) => {
            info!(
                "Serial line open on {} at {} baud",
                params.serial_device, params.serial_baud
            );
            Some(s)
        }
        Err(e) => {
            warn!("Serial bring-up failed, demands will not be actuated: {}", e);
            None
        }
    };

    let shared_state = SharedVehicleState::new();

    info!("Module initialisation complete\n");

    // ---- START WORKERS ----

    let cmd_worker = CmdWorker::new(
        params.clone(),
        estimator,
        drive_ctrl,
        shared_state.clone(),
        serial,
        Arc::clone(&shutdown),
    );

    let tm_worker = TmWorker::new(params, shared_state, Arc::clone(&shutdown));

    let cmd_handle = thread::Builder::new()
        .name("cmd_worker".into())
        .spawn(move || cmd_worker.run())
        .wrap_err("Failed to spawn the command worker")?;

    let tm_handle = thread::Builder::new()
        .name("tm_worker".into())
        .spawn(move || tm_worker.run())
        .wrap_err("Failed to spawn the telemetry worker")?;

    info!("Workers started, bridge running\n");

    // ---- SHUTDOWN ----

    // Block until both workers observe the shutdown flag and return. The command worker drops
    // the serial handle on return, releasing the line on every exit path.
    cmd_handle
        .join()
        .map_err(|_| eyre!("The command worker panicked"))?;
    tm_handle
        .join()
        .map_err(|_| eyre!("The telemetry worker panicked"))?;

    info!("End of execution");

    Ok(())
}
