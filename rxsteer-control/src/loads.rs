use std::sync::atomic::{AtomicU8, Ordering};

use rxsteer_common::UnitId;

/// Read side of the per-unit statistics subsystem: one derived load scalar per unit.
pub trait LoadSource: Send + Sync + 'static {
    /// Load of `unit` as a percentage. Unknown units report 0.
    fn load(&self, unit: UnitId) -> u8;
}

/// A [`LoadSource`] holding fixed per-unit values, settable at runtime.
#[derive(Debug)]
pub struct StaticLoads {
    loads: Box<[AtomicU8]>,
}

impl StaticLoads {
    /// All `units` start at load 0.
    pub fn new(units: usize) -> Self {
        Self { loads: (0..units).map(|_| AtomicU8::new(0)).collect() }
    }

    /// Sets the load of `unit`. Out-of-range units are ignored.
    pub fn set(&self, unit: UnitId, load: u8) {
        if let Some(slot) = self.loads.get(unit.index()) {
            slot.store(load, Ordering::Relaxed);
        }
    }
}

impl FromIterator<u8> for StaticLoads {
    fn from_iter<I: IntoIterator<Item = u8>>(iter: I) -> Self {
        Self { loads: iter.into_iter().map(AtomicU8::new).collect() }
    }
}

impl LoadSource for StaticLoads {
    fn load(&self, unit: UnitId) -> u8 {
        self.loads.get(unit.index()).map_or(0, |slot| slot.load(Ordering::Relaxed))
    }
}
