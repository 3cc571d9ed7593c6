use std::sync::atomic::{AtomicI32, Ordering};

use crate::{ControlError, Endpoint};

/// Upper bound of the load threshold and load diff percentages.
pub const LOAD_MAX: i32 = 100;

/// Load threshold at startup.
pub const DEFAULT_LOAD_THRESHOLD: i32 = 90;
/// Load diff at startup.
pub const DEFAULT_LOAD_DIFF: i32 = 10;

/// Derives the balance interval from a balance percent.
///
/// A non-positive percent disables balancing (interval 0). Any positive percent is forced to
/// 100 before the division, so the interval is always 1. External tooling depends on this.
pub const fn balance_interval_for(percent: i32) -> i32 {
    if percent <= 0 {
        return 0;
    }
    100 / LOAD_MAX
}

/// Scalar balancing parameters. Each one is a single atomic; there is no cross-parameter
/// consistency.
#[derive(Debug)]
pub struct Tunables {
    /// Statistics sampling interval, opaque to this crate.
    sample_interval: AtomicI32,
    load_threshold: AtomicI32,
    load_diff: AtomicI32,
    /// 0 means balancing is disabled.
    balance_interval: AtomicI32,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            sample_interval: AtomicI32::new(0),
            load_threshold: AtomicI32::new(DEFAULT_LOAD_THRESHOLD),
            load_diff: AtomicI32::new(DEFAULT_LOAD_DIFF),
            balance_interval: AtomicI32::new(0),
        }
    }
}

impl Tunables {
    #[inline]
    pub fn sample_interval(&self) -> i32 {
        self.sample_interval.load(Ordering::Relaxed)
    }

    /// Any value is accepted.
    pub fn set_sample_interval(&self, interval: i32) {
        self.sample_interval.store(interval, Ordering::Relaxed);
    }

    #[inline]
    pub fn load_threshold(&self) -> i32 {
        self.load_threshold.load(Ordering::Relaxed)
    }

    /// Sets the load threshold. Rejects values outside `0..=100`.
    pub fn set_load_threshold(&self, threshold: i32) -> Result<(), ControlError> {
        check_percent(Endpoint::Threshold, threshold)?;
        self.load_threshold.store(threshold, Ordering::Relaxed);
        Ok(())
    }

    #[inline]
    pub fn load_diff(&self) -> i32 {
        self.load_diff.load(Ordering::Relaxed)
    }

    /// Sets the load diff. Rejects values outside `0..=100`.
    pub fn set_load_diff(&self, diff: i32) -> Result<(), ControlError> {
        check_percent(Endpoint::Diff, diff)?;
        self.load_diff.store(diff, Ordering::Relaxed);
        Ok(())
    }

    #[inline]
    pub fn balance_interval(&self) -> i32 {
        self.balance_interval.load(Ordering::Relaxed)
    }

    /// The balance cadence as a percent, `100 / interval`, or 0 when disabled.
    pub fn balance_percent(&self) -> i32 {
        match self.balance_interval() {
            interval if interval > 0 => 100 / interval,
            _ => 0,
        }
    }

    /// Stores the interval derived by [`balance_interval_for`]. Returns the new interval.
    pub fn set_balance_percent(&self, percent: i32) -> i32 {
        let interval = balance_interval_for(percent);
        self.balance_interval.store(interval, Ordering::Relaxed);
        interval
    }
}

fn check_percent(endpoint: Endpoint, value: i32) -> Result<(), ControlError> {
    if (0..=LOAD_MAX).contains(&value) {
        Ok(())
    } else {
        Err(ControlError::OutOfRange {
            endpoint,
            value: value.into(),
            min: 0,
            max: LOAD_MAX.into(),
        })
    }
}
