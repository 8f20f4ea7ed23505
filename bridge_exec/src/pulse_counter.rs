//! # Pulse Counter
//!
//! Interrupt-driven counter fed by the redundant hall-effect sensors on the drivetrain. The
//! hardware delivers edges asynchronously while the speed estimator samples at irregular,
//! command-driven intervals, so the counter is a single atomic integer with an atomic
//! read-and-reset rather than a plain shared variable. Pulses arriving concurrently with a
//! sample are attributed to the next interval, never lost or double-counted.
//!
//! Edges from all three sensors are counted without distinguishing source or direction, so the
//! counter measures magnitude of rotation only.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Free-running pulse counter.
///
/// The hardware interrupt callbacks are the only writers (via [`PulseCounter::on_edge`]), the
/// speed estimator is the only reader (via [`PulseCounter::sample_and_reset`]).
#[derive(Default)]
pub struct PulseCounter {
    count: AtomicU32,
}

/// Guard holding the GPIO input pins with their interrupt callbacks registered.
///
/// Dropping this detaches the interrupts, so the supervisor keeps it alive for the life of the
/// process.
pub struct HallSensors {
    #[cfg(feature = "rpi")]
    _pins: Vec<rppal::gpio::InputPin>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum HallSensorError {
    #[cfg(feature = "rpi")]
    #[error("GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),

    #[cfg(not(feature = "rpi"))]
    #[error("GPIO support not compiled in (enable the `rpi` feature)")]
    NotAvailable,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PulseCounter {
    /// Create a new counter starting at zero.
    pub fn new() -> Self {
        Self {
            count: AtomicU32::new(0),
        }
    }

    /// Record one qualifying edge from any of the hall sensors.
    ///
    /// Called from the GPIO interrupt context. Dropped edges due to hardware bounce are accepted
    /// as measurement noise, not a fault.
    pub fn on_edge(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Atomically read the current count and reset it to zero.
    pub fn sample_and_reset(&self) -> u32 {
        self.count.swap(0, Ordering::Relaxed)
    }
}

impl HallSensors {
    /// Register edge interrupts on the given BCM pins, each incrementing `counter`.
    #[cfg(feature = "rpi")]
    pub fn attach(counter: &Arc<PulseCounter>, pins: &[u8]) -> Result<Self, HallSensorError> {
        use rppal::gpio::{Gpio, Trigger};

        let gpio = Gpio::new()?;
        let mut held = Vec::with_capacity(pins.len());

        for &bcm in pins {
            let mut pin = gpio.get(bcm)?.into_input_pullup();

            let counter = Arc::clone(counter);
            pin.set_async_interrupt(Trigger::RisingEdge, move |_| counter.on_edge())?;

            held.push(pin);
        }

        Ok(Self { _pins: held })
    }

    /// Without the `rpi` feature there is no GPIO stack to attach to, the caller is expected to
    /// fall back to a degraded zero-speed estimate.
    #[cfg(not(feature = "rpi"))]
    pub fn attach(_counter: &Arc<PulseCounter>, _pins: &[u8]) -> Result<Self, HallSensorError> {
        Err(HallSensorError::NotAvailable)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::thread;

    #[test]
    fn test_sample_resets_count() {
        let counter = PulseCounter::new();

        counter.on_edge();
        counter.on_edge();
        counter.on_edge();

        assert_eq!(counter.sample_and_reset(), 3);
        assert_eq!(counter.sample_and_reset(), 0);
    }

    #[test]
    fn test_no_pulses_lost_across_samples() {
        const NUM_WRITERS: usize = 4;
        const EDGES_PER_WRITER: u32 = 10_000;

        let counter = Arc::new(PulseCounter::new());

        // Writers hammer the counter while the main thread samples concurrently, as the GPIO
        // interrupts do while the estimator runs
        let writers: Vec<_> = (0..NUM_WRITERS)
            .map(|_| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..EDGES_PER_WRITER {
                        counter.on_edge();
                    }
                })
            })
            .collect();

        let mut total: u64 = 0;
        loop {
            total += counter.sample_and_reset() as u64;

            if writers.iter().all(|w| w.is_finished()) {
                break;
            }
        }

        for writer in writers {
            writer.join().unwrap();
        }

        // Pick up anything delivered after the last sample
        total += counter.sample_and_reset() as u64;

        assert_eq!(total, (NUM_WRITERS as u64) * (EDGES_PER_WRITER as u64));
    }
}
