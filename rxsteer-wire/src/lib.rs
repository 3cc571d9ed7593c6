#![doc(issue_tracker_base_url = "https://github.com/chainbound/rxsteer/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! Inbound header inspection.
//!
//! The [`HeaderWalker`] parses L3/L4 headers from a known offset with bounded trust: every
//! read goes through a checked [`Cursor`] and tunnel decapsulation is depth-limited. The
//! [`Classifier`] builds on it to tag packets as high priority from a legacy port and a live
//! [`PriorityPorts`] set.

mod classify;
pub use classify::{Classifier, ClassifierOptions, DEFAULT_LEGACY_PORT};

pub mod frame;

mod ports;
pub use ports::{PortSet, PortSetError, PriorityPorts, MAX_PRIORITY_PORTS};

pub mod walker;
pub use walker::{
    Cursor, HeaderWalker, Headers, L4Protocol, NetworkProtocol, WalkError, DEFAULT_MAX_DEPTH,
    VXLAN_PORT,
};
