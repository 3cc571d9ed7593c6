#![doc(issue_tracker_base_url = "https://github.com/chainbound/rxsteer/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod task;
pub use task::JoinMap;

mod unit;
pub use unit::{OnlineUnits, UnitId};

/// Shared defaults and header sizes.
pub mod constants {
    /// Length of an Ethernet II header (no VLAN tags).
    pub const ETH_HLEN: usize = 14;
    /// Default receive backlog per unit, mirrors `netdev_max_backlog`.
    pub const DEFAULT_MAX_BACKLOG: usize = 1000;
    /// Default poll budget per scheduling turn, mirrors `NAPI_POLL_WEIGHT`.
    pub const DEFAULT_POLL_BUDGET: usize = 64;
}
