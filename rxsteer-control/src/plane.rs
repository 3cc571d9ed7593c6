use std::{fmt, sync::Arc};

use arc_swap::ArcSwap;
use rxsteer_common::OnlineUnits;
use rxsteer_wire::{PortSet, PortSetError, PriorityPorts, MAX_PRIORITY_PORTS};
use tracing::{debug, warn};

use crate::{
    ControlError, Endpoint, EndpointFile, LoadSource, Tunables, UnitSelection, MAX_SELECTED_UNITS,
    MAX_WRITE_LEN,
};

/// Which of the two published unit selections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionKind {
    /// Set A, published on `falcon_cpus`.
    Falcon,
    /// Set B, published on `grosplit_cpus`.
    Grosplit,
}

impl SelectionKind {
    /// The text endpoint publishing this selection.
    pub const fn endpoint(&self) -> Endpoint {
        match self {
            Self::Falcon => Endpoint::FalconCpus,
            Self::Grosplit => Endpoint::GrosplitCpus,
        }
    }
}

/// The externally tunable parameters, plus the read-only views an external balancer needs.
///
/// The unit selections are published for an outside policy and are not consumed here. The
/// priority port set is shared with the classifier, so a write to
/// [`Endpoint::PpsyncPorts`] takes effect on the next classified packet.
pub struct ControlPlane {
    online: ArcSwap<OnlineUnits>,
    falcon: ArcSwap<UnitSelection>,
    grosplit: ArcSwap<UnitSelection>,
    tunables: Tunables,
    ports: PriorityPorts,
    loads: Arc<dyn LoadSource>,
}

impl fmt::Debug for ControlPlane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlPlane")
            .field("online", &**self.online.load())
            .field("falcon", &**self.falcon.load())
            .field("grosplit", &**self.grosplit.load())
            .field("tunables", &self.tunables)
            .field("ports", &**self.ports.load())
            .finish_non_exhaustive()
    }
}

impl ControlPlane {
    /// Creates a control plane with default tunables and empty unit selections.
    pub fn new(online: OnlineUnits, ports: PriorityPorts, loads: Arc<dyn LoadSource>) -> Self {
        Self {
            online: ArcSwap::from_pointee(online),
            falcon: ArcSwap::from_pointee(UnitSelection::default()),
            grosplit: ArcSwap::from_pointee(UnitSelection::default()),
            tunables: Tunables::default(),
            ports,
            loads,
        }
    }

    /// Snapshot of the online topology.
    pub fn online(&self) -> Arc<OnlineUnits> {
        self.online.load_full()
    }

    /// Replaces the online topology. Existing selections are kept as unit identifiers;
    /// their bitmaps are re-rendered against the new topology on the next read.
    pub fn set_online(&self, online: OnlineUnits) {
        debug!(units = online.len(), "Online units updated");
        self.online.store(Arc::new(online));
    }

    /// The scalar balancing parameters.
    pub fn tunables(&self) -> &Tunables {
        &self.tunables
    }

    /// The priority port set, shared with the classifier.
    pub fn ports(&self) -> &PriorityPorts {
        &self.ports
    }

    /// Snapshot of one unit selection.
    pub fn selection(&self, kind: SelectionKind) -> Arc<UnitSelection> {
        self.selection_slot(kind).load_full()
    }

    /// Replaces a selection. Applies without validation against the topology.
    pub fn set_selection(&self, kind: SelectionKind, selection: UnitSelection) {
        self.selection_slot(kind).store(Arc::new(selection));
    }

    fn selection_slot(&self, kind: SelectionKind) -> &ArcSwap<UnitSelection> {
        match kind {
            SelectionKind::Falcon => &self.falcon,
            SelectionKind::Grosplit => &self.grosplit,
        }
    }

    /// One glyph per online unit, `|` when its load is at or above the threshold, else `.`.
    pub fn load_glyphs(&self) -> String {
        let threshold = self.tunables.load_threshold();
        let online = self.online.load();

        let mut out: String = online
            .iter()
            .map(|unit| if i32::from(self.loads.load(unit)) >= threshold { '|' } else { '.' })
            .collect();
        out.push('\n');
        out
    }

    /// Opens a handle with single-write semantics on `endpoint`.
    pub fn open(&self, endpoint: Endpoint) -> EndpointFile<'_> {
        EndpointFile::new(self, endpoint)
    }

    /// Renders the current value of `endpoint`, newline-terminated.
    pub fn read(&self, endpoint: Endpoint) -> String {
        match endpoint {
            Endpoint::FalconCpus | Endpoint::GrosplitCpus => {
                let kind = selection_kind(endpoint);
                let map = self.selection_slot(kind).load().to_bitmap(&self.online.load());
                format!("{map:x}\n")
            }
            Endpoint::CpustatInterval => format!("{}\n", self.tunables.sample_interval()),
            Endpoint::Loads => self.load_glyphs(),
            Endpoint::Threshold => format!("{}\n", self.tunables.load_threshold()),
            Endpoint::Diff => format!("{}\n", self.tunables.load_diff()),
            Endpoint::BalancePercent => format!("{}\n", self.tunables.balance_percent()),
            Endpoint::PpsyncPorts => format!("{}\n", **self.ports.load()),
        }
    }

    /// Applies a single text write to `endpoint` at file position `pos`.
    ///
    /// The text runs up to the first NUL byte (or the end of `buf`) and must parse in full.
    /// On success the consumed length is returned. On failure nothing is modified.
    pub fn write(&self, endpoint: Endpoint, pos: u64, buf: &[u8]) -> Result<usize, ControlError> {
        let res = self.try_write(endpoint, pos, buf);
        match &res {
            Ok(_) => debug!(%endpoint, value = %self.read(endpoint).trim_end(), "Endpoint updated"),
            Err(e) => warn!(%endpoint, error = %e, "Rejected endpoint write"),
        }
        res
    }

    fn try_write(&self, endpoint: Endpoint, pos: u64, buf: &[u8]) -> Result<usize, ControlError> {
        if pos > 0 {
            return Err(ControlError::Position(pos));
        }
        if buf.len() > MAX_WRITE_LEN {
            return Err(ControlError::TooLarge(buf.len()));
        }
        if !endpoint.is_writable() {
            return Err(ControlError::ReadOnly(endpoint));
        }

        let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        let text = std::str::from_utf8(&buf[..len]).map_err(|_| parse_error(endpoint, buf))?;

        match endpoint {
            Endpoint::FalconCpus | Endpoint::GrosplitCpus => {
                let map = parse_hex(endpoint, text)?;
                let selection = UnitSelection::from_bitmap(map, &self.online.load()).map_err(
                    |count| ControlError::TooManyEntries {
                        endpoint,
                        count,
                        max: MAX_SELECTED_UNITS,
                    },
                )?;
                self.set_selection(selection_kind(endpoint), selection);
            }
            Endpoint::CpustatInterval => {
                self.tunables.set_sample_interval(parse_decimal(endpoint, text)?);
            }
            Endpoint::Threshold => {
                self.tunables.set_load_threshold(parse_decimal(endpoint, text)?)?;
            }
            Endpoint::Diff => self.tunables.set_load_diff(parse_decimal(endpoint, text)?)?,
            Endpoint::BalancePercent => {
                self.tunables.set_balance_percent(parse_decimal(endpoint, text)?);
            }
            Endpoint::PpsyncPorts => self.ports.store(parse_ports(endpoint, text)?),
            Endpoint::Loads => return Err(ControlError::ReadOnly(endpoint)),
        }

        Ok(len)
    }
}

fn selection_kind(endpoint: Endpoint) -> SelectionKind {
    match endpoint {
        Endpoint::GrosplitCpus => SelectionKind::Grosplit,
        _ => SelectionKind::Falcon,
    }
}

fn parse_error(endpoint: Endpoint, input: impl AsRef<[u8]>) -> ControlError {
    ControlError::Parse { endpoint, input: String::from_utf8_lossy(input.as_ref()).into_owned() }
}

fn parse_hex(endpoint: Endpoint, text: &str) -> Result<u64, ControlError> {
    let digits = text.trim();
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(digits);

    u64::from_str_radix(digits, 16).map_err(|_| parse_error(endpoint, text))
}

fn parse_decimal(endpoint: Endpoint, text: &str) -> Result<i32, ControlError> {
    text.trim().parse().map_err(|_| parse_error(endpoint, text))
}

fn parse_ports(endpoint: Endpoint, text: &str) -> Result<PortSet, ControlError> {
    let ports = text
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| token.parse::<u16>().map_err(|_| parse_error(endpoint, text)))
        .collect::<Result<Vec<_>, _>>()?;

    PortSet::new(ports).map_err(|PortSetError::TooMany(count)| ControlError::TooManyEntries {
        endpoint,
        count,
        max: MAX_PRIORITY_PORTS,
    })
}
