//! Bus fault injection.
//!
//! The injector sits between `broadcast` and the ring log. Each active
//! fault targets one message id or all traffic and either drops the
//! message, replaces its payload with the corruption sentinel, or holds
//! it for one tick. Faults may carry a tick-count duration; durations
//! are decremented at the start of each engine tick and expired faults
//! are retired.
//!
//! When several faults match one message the most severe effect wins:
//! drop over delay over corrupt.

use tracing::{debug, info};
use vvb_common::msg::{Message, MsgId, Payload};

/// Effect of an active fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Discard the message entirely.
    Drop,
    /// Deliver with the payload replaced by [`Payload::Corrupted`].
    Corrupt,
    /// Hold the message and release it at the next tick boundary.
    Delay,
}

/// Which traffic a fault applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultTarget {
    /// A single message id.
    One(MsgId),
    /// All bus traffic.
    All,
}

impl FaultTarget {
    /// True if this target covers the given id.
    pub fn matches(&self, id: MsgId) -> bool {
        match self {
            Self::One(t) => *t == id,
            Self::All => true,
        }
    }
}

/// One active fault.
#[derive(Debug, Clone, Copy)]
pub struct Fault {
    /// Effect.
    pub kind: FaultKind,
    /// Targeted traffic.
    pub target: FaultTarget,
    /// Remaining lifetime in engine ticks; `None` = until cleared.
    pub remaining: Option<u32>,
}

/// Verdict of [`FaultInjector::process`] for one message.
#[derive(Debug)]
pub enum FaultVerdict {
    /// Deliver this (possibly transformed) message.
    Pass(Message),
    /// Message dropped; no log entry, no delivery.
    Drop,
    /// Message held by the injector; released at the next tick.
    Hold,
}

/// Set of active faults plus the one-tick hold queue.
#[derive(Debug, Default)]
pub struct FaultInjector {
    faults: Vec<Fault>,
    held: Vec<Message>,
}

impl FaultInjector {
    /// Create an injector with no active faults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Activate a fault. `duration` is a tick count; `None` keeps the
    /// fault active until [`clear`](Self::clear).
    pub fn inject(&mut self, kind: FaultKind, target: FaultTarget, duration: Option<u32>) {
        info!(?kind, ?target, ?duration, "injecting bus fault");
        self.faults.push(Fault {
            kind,
            target,
            remaining: duration,
        });
    }

    /// Deactivate all faults. Messages already held stay queued for the
    /// next tick.
    pub fn clear(&mut self) {
        self.faults.clear();
    }

    /// Number of active faults.
    pub fn active_faults(&self) -> usize {
        self.faults.len()
    }

    /// Apply active faults to one message.
    pub fn process(&mut self, mut msg: Message) -> FaultVerdict {
        let mut drop = false;
        let mut delay = false;
        let mut corrupt = false;

        for fault in &self.faults {
            if !fault.target.matches(msg.id) {
                continue;
            }
            match fault.kind {
                FaultKind::Drop => drop = true,
                FaultKind::Delay => delay = true,
                FaultKind::Corrupt => corrupt = true,
            }
        }

        if drop {
            debug!(id = %msg.id, "fault: dropped message");
            return FaultVerdict::Drop;
        }
        if delay {
            debug!(id = %msg.id, "fault: holding message for one tick");
            self.held.push(msg);
            return FaultVerdict::Hold;
        }
        if corrupt {
            debug!(id = %msg.id, "fault: corrupted message");
            msg.payload = Payload::Corrupted;
        }
        FaultVerdict::Pass(msg)
    }

    /// Tick boundary: retire faults whose duration ran out, age the
    /// remaining finite durations, and drain the hold queue for
    /// release. A fault injected with duration `n` is retired at the
    /// start of the `n+1`-th tick after injection, so it covers exactly
    /// `n` ticks of traffic.
    pub fn start_tick(&mut self) -> Vec<Message> {
        self.faults.retain(|f| f.remaining != Some(0));
        for fault in &mut self.faults {
            if let Some(remaining) = fault.remaining.as_mut() {
                *remaining = remaining.saturating_sub(1);
            }
        }
        std::mem::take(&mut self.held)
    }
}
