//! Node capability traits.
//!
//! Every participant on the bus is a [`Node`]: addressable by a unique
//! name, receiving broadcasts, and stepped once per tick. Physical
//! models additionally implement [`Plant`], which splits the tick into
//! continuous-state integration and sensor publication.
//!
//! Receivers are expected to be total over the payload domain they
//! accept: malformed input (wrong variant, [`Corrupted`], non-finite
//! values) is handled locally by falling back to the component's safe
//! state. A `NodeError` returned from a callback is a genuine component
//! failure and aborts the surrounding broadcast or tick.
//!
//! [`Corrupted`]: vvb_common::msg::Payload::Corrupted

use std::any::Any;

use thiserror::Error;
use vvb_common::msg::Message;

use crate::bus::{Bus, BusError};

/// Stable node handle: index into the bus registry, assigned in
/// registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Registration-order index of this node.
    pub const fn index(&self) -> usize {
        self.0
    }
}

/// Errors a node callback can surface to the substrate.
#[derive(Debug, Error)]
pub enum NodeError {
    /// NVM file I/O failed.
    #[error("NVM I/O failed: {0}")]
    Nvm(#[from] std::io::Error),

    /// NVM document could not be encoded.
    #[error("NVM document malformed: {0}")]
    NvmFormat(String),

    /// A broadcast issued by this node failed downstream.
    #[error("bus failure: {0}")]
    Bus(Box<BusError>),
}

impl From<BusError> for NodeError {
    fn from(e: BusError) -> Self {
        Self::Bus(Box::new(e))
    }
}

/// A bus participant: plant or ECU.
///
/// `receive` and `step` run to completion on the engine thread; there
/// are no suspension points. Both may broadcast through the supplied
/// bus handle.
pub trait Node: Any {
    /// Unique node name (the bus address).
    fn name(&self) -> &str;

    /// Callback for every broadcast whose sender is not this node.
    fn receive(&mut self, bus: &mut Bus, msg: &Message) -> Result<(), NodeError> {
        let _ = (bus, msg);
        Ok(())
    }

    /// Periodic logic tick; ECUs place periodic emissions here.
    fn step(&mut self, bus: &mut Bus, dt: f64) -> Result<(), NodeError> {
        let _ = (bus, dt);
        Ok(())
    }

    /// Inspection seam for the harness (typed downcasts).
    fn as_any(&self) -> &dyn Any;

    /// Mutable inspection seam for the harness.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A stateful physical model.
///
/// The engine invokes `advance_physics` and `publish_sensors`
/// back-to-back for each plant, before any ECU steps. Plants that emit
/// during integration (power accounting) get the bus handle in both
/// phases.
pub trait Plant: Node {
    /// Integrate continuous state forward by `dt`.
    fn advance_physics(&mut self, bus: &mut Bus, dt: f64) -> Result<(), NodeError>;

    /// Emit sensor broadcasts reflecting current state.
    fn publish_sensors(&mut self, bus: &mut Bus) -> Result<(), NodeError>;
}
