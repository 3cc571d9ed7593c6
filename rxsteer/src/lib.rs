#![doc(issue_tracker_base_url = "https://github.com/chainbound/rxsteer/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! Receive-side packet steering.
//!
//! Buffers handed to [`CellRegistry::receive`] are tagged high or normal priority by the
//! [`Classifier`] and queued on a bounded per-unit [`ReceiveCell`], drained in budgeted turns
//! by one poller task per unit. The [`ControlPlane`] exposes the tunables an external balancer
//! reads and writes. [`Steering`] wires the two together around one live priority port set.

use std::sync::Arc;

use tracing::debug;

pub use rxsteer_cell::*;
pub use rxsteer_common::*;
pub use rxsteer_control::*;
pub use rxsteer_wire::*;

/// Options for [`Steering`].
#[derive(Debug, Clone, Default)]
pub struct SteeringOptions {
    classifier: ClassifierOptions,
    cells: CellOptions,
}

impl SteeringOptions {
    /// Sets the classifier options.
    pub fn classifier(mut self, options: ClassifierOptions) -> Self {
        self.classifier = options;
        self
    }

    /// Sets the receive cell options.
    pub fn cells(mut self, options: CellOptions) -> Self {
        self.cells = options;
        self
    }
}

/// A cell registry and a control plane sharing one priority port set.
///
/// Writes to the `ppsync_ports` endpoint are seen by the classifier on the next buffer.
#[derive(Debug)]
pub struct Steering<D, S> {
    registry: Arc<CellRegistry<D, S>>,
    control: Arc<ControlPlane>,
}

impl<D, S> Clone for Steering<D, S> {
    fn clone(&self) -> Self {
        Self { registry: Arc::clone(&self.registry), control: Arc::clone(&self.control) }
    }
}

impl<D: Destination, S: Sink> Steering<D, S> {
    /// Creates and initializes the steering core with default options.
    pub fn new(
        online: OnlineUnits,
        destination: Arc<D>,
        sink: Arc<S>,
        loads: Arc<dyn LoadSource>,
    ) -> Result<Self, RegistryError> {
        Self::with_options(SteeringOptions::default(), online, destination, sink, loads)
    }

    /// Creates the control plane and one receive cell for every unit up to the highest
    /// online identifier.
    pub fn with_options(
        options: SteeringOptions,
        online: OnlineUnits,
        destination: Arc<D>,
        sink: Arc<S>,
        loads: Arc<dyn LoadSource>,
    ) -> Result<Self, RegistryError> {
        let units = online.iter().last().map_or(0, |unit| unit.index() + 1);

        let ports = PriorityPorts::default();
        let classifier = Classifier::new(options.classifier, ports.clone());
        let registry = CellRegistry::new(options.cells, classifier, destination, sink);
        registry.init(units)?;

        let control = ControlPlane::new(online, ports, loads);
        debug!(units, "Steering initialized");

        Ok(Self { registry: Arc::new(registry), control: Arc::new(control) })
    }

    /// The cell registry buffers are received through.
    pub fn registry(&self) -> &Arc<CellRegistry<D, S>> {
        &self.registry
    }

    /// The control plane sharing the registry's port set.
    pub fn control(&self) -> &Arc<ControlPlane> {
        &self.control
    }

    /// See [`CellRegistry::receive`].
    #[inline]
    pub fn receive(&self, unit: UnitId, buf: PacketBuffer) -> RxOutcome {
        self.registry.receive(unit, buf)
    }

    /// Spawns the per-unit pollers. See [`CellRegistry::spawn_pollers`].
    pub fn spawn_pollers(&self) -> JoinMap<UnitId, PollerExit> {
        self.registry.spawn_pollers()
    }

    /// Tears down every cell. Pollers exit on their next wakeup.
    pub fn shutdown(&self) {
        self.registry.destroy();
    }
}
