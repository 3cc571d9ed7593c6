#![doc(issue_tracker_base_url = "https://github.com/chainbound/rxsteer/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! The control plane read and written by an external balancing policy.
//!
//! Each parameter is independent: there is no cross-parameter transaction. Every write is
//! validated before anything is stored, so a rejected write leaves the old value in place.
//! Reads never block and never fail.
//!
//! The same parameters are exposed as text [`Endpoint`]s, one value per endpoint, written in
//! a single bounded write.

use thiserror::Error;

mod endpoint;
pub use endpoint::{Endpoint, EndpointFile, MAX_WRITE_LEN};

mod loads;
pub use loads::{LoadSource, StaticLoads};

mod plane;
pub use plane::{ControlPlane, SelectionKind};

mod selection;
pub use selection::{UnitSelection, MAX_SELECTED_UNITS};

mod tunables;
pub use tunables::{
    balance_interval_for, Tunables, DEFAULT_LOAD_DIFF, DEFAULT_LOAD_THRESHOLD, LOAD_MAX,
};

/// Why a control-plane write was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControlError {
    /// The text did not parse as the endpoint's format.
    #[error("Unparseable value for {endpoint}: {input:?}")]
    Parse { endpoint: Endpoint, input: String },
    /// The value parsed but is outside the accepted range.
    #[error("Value {value} out of range for {endpoint}, expected {min}..={max}")]
    OutOfRange { endpoint: Endpoint, value: i64, min: i64, max: i64 },
    /// The list holds more entries than the endpoint accepts.
    #[error("Too many entries for {endpoint}: {count} (max {max})")]
    TooManyEntries { endpoint: Endpoint, count: usize, max: usize },
    /// The write did not start at position 0.
    #[error("Writes must start at position 0, got {0}")]
    Position(u64),
    /// The write exceeds [`MAX_WRITE_LEN`] bytes.
    #[error("Write of {0} bytes exceeds the {} byte limit", MAX_WRITE_LEN)]
    TooLarge(usize),
    /// The endpoint does not accept writes.
    #[error("Endpoint {0} is read-only")]
    ReadOnly(Endpoint),
    /// No endpoint has this name.
    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),
}
