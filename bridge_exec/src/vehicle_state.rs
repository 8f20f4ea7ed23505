//! # Shared Vehicle State
//!
//! The single object mutated from more than one task: the latest speed estimate and active gear,
//! written once per command cycle by the command worker and read once per publish tick by the
//! telemetry worker. All access goes through a mutex held only for the duration of the copy, so
//! a reader never observes a partially updated pair and no caller can hold the lock across
//! blocking I/O.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::{Arc, Mutex};

use crate::drive_ctrl::Gear;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Latest speed/gear snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VehicleState {
    /// Latest speed estimate
    ///
    /// Units: km/h
    pub speed_kmh: f64,

    /// Active gear
    pub gear: Gear,
}

/// Cloneable handle onto the mutex-guarded [`VehicleState`].
#[derive(Clone, Default)]
pub struct SharedVehicleState {
    inner: Arc<Mutex<VehicleState>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SharedVehicleState {
    /// Create a new shared state, initialised to zero speed in neutral.
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically replace both fields of the state.
    pub fn write(&self, speed_kmh: f64, gear: Gear) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.speed_kmh = speed_kmh;
        state.gear = gear;
    }

    /// Take a consistent snapshot of the state.
    pub fn read(&self) -> VehicleState {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner())
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
    fn test_initial_state() {
        let shared = SharedVehicleState::new();

        assert_eq!(
            shared.read(),
            VehicleState {
                speed_kmh: 0.0,
                gear: Gear::N
            }
        );
    }

    #[test]
    fn test_readers_never_see_mixed_pairs() {
        let shared = SharedVehicleState::new();

        // The writer only ever stores matched pairs, so any snapshot must be one of them
        let writer = {
            let shared = shared.clone();
            thread::spawn(move || {
                for i in 0..10_000u32 {
                    let (speed, gear) = if i % 2 == 0 {
                        (15.0, Gear::F1)
                    } else {
                        (8.0, Gear::R)
                    };
                    shared.write(speed, gear);
                }
            })
        };

        for _ in 0..10_000 {
            let snap = shared.read();
            let valid = snap
                == VehicleState {
                    speed_kmh: 0.0,
                    gear: Gear::N,
                }
                || snap
                    == VehicleState {
                        speed_kmh: 15.0,
                        gear: Gear::F1,
                    }
                || snap
                    == VehicleState {
                        speed_kmh: 8.0,
                        gear: Gear::R,
                    };

            assert!(valid, "observed a mixed snapshot: {:?}", snap);
        }

        writer.join().unwrap();
    }
}
