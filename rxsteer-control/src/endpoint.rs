use std::{fmt, str::FromStr};

use crate::{ControlError, ControlPlane};

/// Largest write accepted by any endpoint, in bytes.
pub const MAX_WRITE_LEN: usize = 100;

/// A control-plane parameter exposed as a text endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Unit selection set A, as a hex bitmap over online positions.
    FalconCpus,
    /// Unit selection set B, same format as [`Endpoint::FalconCpus`].
    GrosplitCpus,
    /// Statistics sampling interval.
    CpustatInterval,
    /// One glyph per online unit. Read-only.
    Loads,
    /// Load percentage at or above which a unit counts as loaded.
    Threshold,
    /// Load difference the balancer tolerates between units.
    Diff,
    /// Balance cadence as a percent.
    BalancePercent,
    /// The high-priority port list.
    PpsyncPorts,
}

impl Endpoint {
    /// Every endpoint, in registration order.
    pub const ALL: [Endpoint; 8] = [
        Self::FalconCpus,
        Self::GrosplitCpus,
        Self::CpustatInterval,
        Self::Loads,
        Self::Threshold,
        Self::Diff,
        Self::BalancePercent,
        Self::PpsyncPorts,
    ];

    /// The endpoint's file name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::FalconCpus => "falcon_cpus",
            Self::GrosplitCpus => "grosplit_cpus",
            Self::CpustatInterval => "cpustat_interval",
            Self::Loads => "loads",
            Self::Threshold => "threshold",
            Self::Diff => "diff",
            Self::BalancePercent => "balance_percent",
            Self::PpsyncPorts => "ppsync_ports",
        }
    }

    /// Whether writes are accepted. Only [`Endpoint::Loads`] is read-only.
    pub const fn is_writable(&self) -> bool {
        !matches!(self, Self::Loads)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Endpoint {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|endpoint| endpoint.name() == s)
            .ok_or_else(|| ControlError::UnknownEndpoint(s.to_owned()))
    }
}

/// An open handle on an [`Endpoint`].
///
/// Reads always render the whole current value. Only one write is accepted per handle: it
/// must start at position 0, after which the position moves to the number of bytes consumed.
#[derive(Debug)]
pub struct EndpointFile<'a> {
    plane: &'a ControlPlane,
    endpoint: Endpoint,
    pos: u64,
}

impl<'a> EndpointFile<'a> {
    pub(crate) fn new(plane: &'a ControlPlane, endpoint: Endpoint) -> Self {
        Self { plane, endpoint, pos: 0 }
    }

    /// The endpoint this handle was opened on.
    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    /// Current file position: 0 until the first successful write.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Renders the endpoint's current value.
    pub fn read(&self) -> String {
        self.plane.read(self.endpoint)
    }

    /// Writes `buf` in full and returns the number of bytes consumed. Later writes on this
    /// handle fail with [`ControlError::Position`].
    pub fn write(&mut self, buf: &[u8]) -> Result<usize, ControlError> {
        let consumed = self.plane.write(self.endpoint, self.pos, buf)?;
        // An empty write still uses up the handle.
        self.pos = consumed.max(1) as u64;
        Ok(consumed)
    }
}
