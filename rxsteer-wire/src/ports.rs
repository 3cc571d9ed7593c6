use std::{fmt, sync::Arc};

use arc_swap::{ArcSwap, Guard};
use thiserror::Error;

/// Maximum number of entries in a [`PortSet`].
pub const MAX_PRIORITY_PORTS: usize = 10;

/// Errors building a [`PortSet`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PortSetError {
    /// More than [`MAX_PRIORITY_PORTS`] distinct ports.
    #[error("Too many priority ports: {0} (max {})", MAX_PRIORITY_PORTS)]
    TooMany(usize),
}

/// An ordered set of up to [`MAX_PRIORITY_PORTS`] ports. Insertion order is kept and
/// duplicates are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortSet {
    ports: Vec<u16>,
}

impl PortSet {
    /// Builds a set from `ports`, dropping duplicates.
    pub fn new(ports: impl IntoIterator<Item = u16>) -> Result<Self, PortSetError> {
        let mut set = Vec::with_capacity(MAX_PRIORITY_PORTS);
        for port in ports {
            if set.contains(&port) {
                continue;
            }
            if set.len() == MAX_PRIORITY_PORTS {
                return Err(PortSetError::TooMany(set.len() + 1));
            }
            set.push(port);
        }

        Ok(Self { ports: set })
    }

    /// Linear scan; the set never holds more than ten entries.
    #[inline]
    pub fn contains(&self, port: u16) -> bool {
        self.ports.contains(&port)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Ports in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.ports.iter().copied()
    }
}

impl fmt::Display for PortSet {
    /// Space-separated decimal ports.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, port) in self.ports.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{port}")?;
        }
        Ok(())
    }
}

/// The live priority port set, shared between the classifier (reader) and the control
/// plane (writer). Reads are lock-free snapshots; writes replace the whole set.
#[derive(Debug, Clone, Default)]
pub struct PriorityPorts(Arc<ArcSwap<PortSet>>);

impl PriorityPorts {
    /// Creates a handle holding `set`.
    pub fn new(set: PortSet) -> Self {
        Self(Arc::new(ArcSwap::from_pointee(set)))
    }

    /// Cheap, non-blocking snapshot for the hot path.
    #[inline]
    pub fn load(&self) -> Guard<Arc<PortSet>> {
        self.0.load()
    }

    /// An owned snapshot of the current set.
    pub fn snapshot(&self) -> Arc<PortSet> {
        self.0.load_full()
    }

    /// Replaces the whole set. Readers see the old or the new set, never a mix.
    pub fn store(&self, set: PortSet) {
        self.0.store(Arc::new(set));
    }
}
