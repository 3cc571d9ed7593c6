use rxsteer_common::constants::ETH_HLEN;
use tracing::trace;

use crate::{
    ports::{PortSet, PriorityPorts},
    walker::{HeaderWalker, DEFAULT_MAX_DEPTH, VXLAN_PORT},
};

/// The hard-coded UDP destination port that always classifies as high priority.
pub const DEFAULT_LEGACY_PORT: u16 = 12345;

/// Options for a [`Classifier`].
#[derive(Debug, Clone)]
pub struct ClassifierOptions {
    /// UDP destination port matched before the port set. `None` disables the fast path.
    legacy_port: Option<u16>,
    /// UDP destination port identifying tunnel encapsulation.
    tunnel_port: u16,
    /// Maximum number of tunnel layers decapsulated before giving up.
    max_depth: usize,
}

impl Default for ClassifierOptions {
    fn default() -> Self {
        Self {
            legacy_port: Some(DEFAULT_LEGACY_PORT),
            tunnel_port: VXLAN_PORT,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ClassifierOptions {
    /// Sets the legacy priority port.
    pub fn legacy_port(mut self, port: u16) -> Self {
        self.legacy_port = Some(port);
        self
    }

    /// Disables the legacy port fast path, leaving only the port set.
    pub fn without_legacy_port(mut self) -> Self {
        self.legacy_port = None;
        self
    }

    /// Sets the tunnel signature port. If it equals the legacy port, the tunnel wins.
    pub fn tunnel_port(mut self, port: u16) -> Self {
        self.tunnel_port = port;
        self
    }

    /// Sets the tunnel depth bound.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}

/// Tags packets as high priority.
///
/// A packet is high priority if its innermost headers (after tunnel decapsulation) are a UDP
/// datagram to the legacy port, or a UDP/TCP segment whose source or destination port is in
/// the live port set. Anything the walker cannot parse is normal priority.
#[derive(Debug, Clone)]
pub struct Classifier {
    legacy_port: Option<u16>,
    walker: HeaderWalker,
    ports: PriorityPorts,
}

impl Classifier {
    /// Creates a classifier reading the live `ports`.
    pub fn new(options: ClassifierOptions, ports: PriorityPorts) -> Self {
        Self {
            legacy_port: options.legacy_port,
            walker: HeaderWalker::new(options.tunnel_port, options.max_depth),
            ports,
        }
    }

    /// The live port set this classifier reads.
    pub fn ports(&self) -> &PriorityPorts {
        &self.ports
    }

    /// The legacy fast-path port, if enabled.
    pub fn legacy_port(&self) -> Option<u16> {
        self.legacy_port
    }

    /// Classifies a frame whose Ethernet header starts at `mac_offset`.
    #[inline]
    pub fn classify_frame(&self, data: &[u8], mac_offset: usize) -> bool {
        self.classify(data, mac_offset.saturating_add(ETH_HLEN))
    }

    /// Classifies the packet whose L3 header starts at `network_offset`, against the current
    /// port set.
    #[inline]
    pub fn classify(&self, data: &[u8], network_offset: usize) -> bool {
        let ports = self.ports.load();
        self.classify_with(data, network_offset, &ports)
    }

    /// Classifies against an explicit port set.
    pub fn classify_with(&self, data: &[u8], network_offset: usize, ports: &PortSet) -> bool {
        let headers = match self.walker.walk(data, network_offset) {
            Ok(headers) => headers,
            Err(e) => {
                trace!(err = %e, network_offset, "Header walk failed, normal priority");
                return false;
            }
        };

        if let Some(legacy) = self.legacy_port {
            if headers.is_udp_to(legacy) {
                return true;
            }
        }

        match headers.ports() {
            Some((src, dst)) => ports.contains(src) || ports.contains(dst),
            None => false,
        }
    }
}
