//! Virtual message bus.
//!
//! Simulates the in-vehicle network (CAN/Ethernet) as a fan-out
//! broadcast medium. The bus owns the node registry (an arena of boxed
//! nodes, iterated in registration order), the bounded ring log, and at
//! most one fault injector.
//!
//! # Delivery semantics
//!
//! `broadcast` delivers synchronously to every registered node except
//! the sender, in registration order. Receivers may themselves
//! broadcast; the nested fan-out completes before the outer one
//! continues (depth-first emission order).
//!
//! Because a node is mutably borrowed while its `receive` runs, it is
//! moved out of its registry slot for the duration of the call. A
//! nested broadcast addressed to a node that is currently mid-`receive`
//! further up the stack lands on that slot's pending queue and is
//! drained, in FIFO order, the moment the node returns. Every
//! non-dropped broadcast therefore reaches every non-sender node
//! exactly once.
//!
//! Registration mid-tick is unrepresentable: `register_*` needs the
//! same `&mut Bus` the delivery loop holds.

use std::collections::VecDeque;

use thiserror::Error;
use tracing::debug;
use vvb_common::msg::{Message, MsgId, Payload};

use crate::fault::{FaultInjector, FaultVerdict};
use crate::log::MessageLog;
use crate::node::{Node, NodeError, NodeId, Plant};

/// Substrate-level bus failures. These are fatal to the engine caller;
/// receivers handle their own malformed input instead of surfacing it
/// here.
#[derive(Debug, Error)]
pub enum BusError {
    /// A node with this name is already registered.
    #[error("duplicate node name: {0}")]
    DuplicateNode(String),

    /// No node with this id exists, or it is busy mid-dispatch.
    #[error("unknown or busy node: index {}", .0.index())]
    UnknownNode(NodeId),

    /// The slot exists but does not hold a plant.
    #[error("node '{0}' is not a plant")]
    NotAPlant(String),

    /// A receiver failed while handling a delivery; remaining
    /// deliveries for that broadcast were aborted.
    #[error("receiver '{name}' failed handling {id}: {source}")]
    Receiver {
        /// Failing node.
        name: String,
        /// Message id being delivered.
        id: MsgId,
        /// Underlying node failure.
        source: NodeError,
    },

    /// A node's periodic step failed.
    #[error("node '{name}' step failed: {source}")]
    Step {
        /// Failing node.
        name: String,
        /// Underlying node failure.
        source: NodeError,
    },
}

/// Registered node handle: ECUs carry the base capability, plants the
/// physics capability on top.
enum Handle {
    Plant(Box<dyn Plant>),
    Ecu(Box<dyn Node>),
}

impl Handle {
    fn node_mut(&mut self) -> &mut dyn Node {
        match self {
            Self::Plant(p) => p.as_mut(),
            Self::Ecu(e) => e.as_mut(),
        }
    }

    fn node(&self) -> &dyn Node {
        match self {
            Self::Plant(p) => p.as_ref(),
            Self::Ecu(e) => e.as_ref(),
        }
    }
}

/// One registry slot. `node` is `None` while the node executes a
/// callback; messages addressed to it meanwhile queue in `pending`.
struct Slot {
    name: String,
    node: Option<Handle>,
    pending: VecDeque<Message>,
}

/// The virtual bus: registry arena, ring log, fault hook.
#[derive(Default)]
pub struct Bus {
    slots: Vec<Slot>,
    log: MessageLog,
    injector: Option<FaultInjector>,
}

impl Bus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            log: MessageLog::new(),
            injector: None,
        }
    }

    // ─── Registry ───────────────────────────────────────────────────

    fn register(&mut self, handle: Handle) -> Result<NodeId, BusError> {
        let name = handle.node().name().to_string();
        if self.slots.iter().any(|s| s.name == name) {
            return Err(BusError::DuplicateNode(name));
        }
        debug!(node = %name, "node registered");
        self.slots.push(Slot {
            name,
            node: Some(handle),
            pending: VecDeque::new(),
        });
        Ok(NodeId(self.slots.len() - 1))
    }

    /// Register a plant. Fails if the name is already taken.
    pub fn register_plant(&mut self, plant: Box<dyn Plant>) -> Result<NodeId, BusError> {
        self.register(Handle::Plant(plant))
    }

    /// Register an ECU. Fails if the name is already taken.
    pub fn register_ecu(&mut self, ecu: Box<dyn Node>) -> Result<NodeId, BusError> {
        self.register(Handle::Ecu(ecu))
    }

    /// Number of registered nodes.
    pub fn node_count(&self) -> usize {
        self.slots.len()
    }

    /// Registered node names in registration order.
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|s| s.name.as_str())
    }

    // ─── Fault hook ─────────────────────────────────────────────────

    /// Attach a fault injector, discarding any prior one. Only callable
    /// between ticks (`&mut Bus` is held by the delivery loop mid-tick).
    pub fn set_fault_injector(&mut self, injector: FaultInjector) {
        self.injector = Some(injector);
    }

    /// Detach the fault injector.
    pub fn clear_fault_injector(&mut self) -> Option<FaultInjector> {
        self.injector.take()
    }

    /// Mutable access to the attached injector, for adding faults
    /// between ticks.
    pub fn fault_injector_mut(&mut self) -> Option<&mut FaultInjector> {
        self.injector.as_mut()
    }

    // ─── Log ────────────────────────────────────────────────────────

    /// The ring log of delivered broadcasts.
    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    // ─── Broadcast ──────────────────────────────────────────────────

    /// Broadcast a message to all registered nodes except the sender.
    ///
    /// The fault injector (if attached) may drop, corrupt, or hold the
    /// message first. Delivered messages are recorded in the ring log
    /// before fan-out. A receiver failure propagates and aborts the
    /// remaining deliveries of this broadcast.
    pub fn broadcast(&mut self, id: MsgId, payload: Payload, sender: &str) -> Result<(), BusError> {
        let msg = Message::new(id, payload, sender);
        self.broadcast_msg(msg, true)
    }

    fn broadcast_msg(&mut self, msg: Message, through_injector: bool) -> Result<(), BusError> {
        let msg = if through_injector {
            match self.injector.as_mut() {
                Some(inj) => match inj.process(msg) {
                    FaultVerdict::Pass(m) => m,
                    FaultVerdict::Drop | FaultVerdict::Hold => return Ok(()),
                },
                None => msg,
            }
        } else {
            msg
        };

        self.log.append(msg.clone());

        for idx in 0..self.slots.len() {
            if self.slots[idx].name == msg.sender {
                continue;
            }
            self.deliver(idx, &msg)?;
        }
        Ok(())
    }

    /// Deliver one message to one slot. A busy slot (node mid-callback
    /// up-stack) queues the message instead.
    fn deliver(&mut self, idx: usize, msg: &Message) -> Result<(), BusError> {
        match self.slots[idx].node.take() {
            Some(mut handle) => {
                let result = handle.node_mut().receive(self, msg);
                self.slots[idx].node = Some(handle);
                result.map_err(|e| BusError::Receiver {
                    name: self.slots[idx].name.clone(),
                    id: msg.id,
                    source: e,
                })?;
                self.drain_pending(idx)
            }
            None => {
                self.slots[idx].pending.push_back(msg.clone());
                Ok(())
            }
        }
    }

    fn drain_pending(&mut self, idx: usize) -> Result<(), BusError> {
        while let Some(queued) = self.slots[idx].pending.pop_front() {
            self.deliver(idx, &queued)?;
        }
        Ok(())
    }

    // ─── Tick boundary ──────────────────────────────────────────────

    /// Start-of-tick maintenance: age fault durations and release
    /// messages the injector held last tick. Released messages do not
    /// pass through the injector again.
    pub(crate) fn begin_tick(&mut self) -> Result<(), BusError> {
        let released = match self.injector.as_mut() {
            Some(inj) => inj.start_tick(),
            None => Vec::new(),
        };
        for msg in released {
            self.broadcast_msg(msg, false)?;
        }
        Ok(())
    }

    // ─── Node access ────────────────────────────────────────────────

    /// Run a plant's physics-then-publish phase.
    pub(crate) fn run_plant_phase(&mut self, id: NodeId, dt: f64) -> Result<(), BusError> {
        let slot = self
            .slots
            .get_mut(id.0)
            .ok_or(BusError::UnknownNode(id))?;
        let handle = slot.node.take().ok_or(BusError::UnknownNode(id))?;
        let mut plant = match handle {
            Handle::Plant(p) => p,
            ecu @ Handle::Ecu(_) => {
                let name = slot.name.clone();
                slot.node = Some(ecu);
                return Err(BusError::NotAPlant(name));
            }
        };

        let result = plant
            .advance_physics(self, dt)
            .and_then(|()| plant.publish_sensors(self));
        self.slots[id.0].node = Some(Handle::Plant(plant));
        result.map_err(|e| BusError::Step {
            name: self.slots[id.0].name.clone(),
            source: e,
        })?;
        self.drain_pending(id.0)
    }

    /// Run a node's periodic step.
    pub(crate) fn run_step_phase(&mut self, id: NodeId, dt: f64) -> Result<(), BusError> {
        let slot = self
            .slots
            .get_mut(id.0)
            .ok_or(BusError::UnknownNode(id))?;
        let mut handle = slot.node.take().ok_or(BusError::UnknownNode(id))?;

        let result = handle.node_mut().step(self, dt);
        self.slots[id.0].node = Some(handle);
        result.map_err(|e| BusError::Step {
            name: self.slots[id.0].name.clone(),
            source: e,
        })?;
        self.drain_pending(id.0)
    }

    /// Borrow a registered node for typed inspection. Returns `None`
    /// for an unknown id, a busy node, or a type mismatch.
    pub fn node<T: Node>(&self, id: NodeId) -> Option<&T> {
        self.slots
            .get(id.0)?
            .node
            .as_ref()?
            .node()
            .as_any()
            .downcast_ref::<T>()
    }

    /// Run a closure with mutable access to a node and the bus — the
    /// harness seam for mid-run mutation (plugging a charge cable,
    /// editing radar tracks).
    pub fn with_node<R>(
        &mut self,
        id: NodeId,
        f: impl FnOnce(&mut dyn Node, &mut Bus) -> R,
    ) -> Result<R, BusError> {
        let slot = self
            .slots
            .get_mut(id.0)
            .ok_or(BusError::UnknownNode(id))?;
        let mut handle = slot.node.take().ok_or(BusError::UnknownNode(id))?;

        let result = f(handle.node_mut(), self);
        self.slots[id.0].node = Some(handle);
        self.drain_pending(id.0)?;
        Ok(result)
    }
}
