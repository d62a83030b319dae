//! Node identity, flags, and the `NodeBehavior` trait every vertex in a
//! `Graph` implements.
//!
//! A concrete node owns its typed inputs and output directly as struct
//! fields (see `ts::scalar::TS` and friends for the handle types); the
//! graph arena only ever sees the type-erased `Box<dyn NodeBehavior>`
//! plus the bookkeeping flags below. This is the "resolve generics at
//! wiring time" strategy from the design notes: Rust's own monomorphization
//! does the type resolution the source's runtime type introspection did,
//! so the engine proper never needs to know a node's concrete input/output
//! types.

use bitflags::bitflags;

use dataflow_common::{EngineError, EngineTime};

use crate::context::RuntimeContext;

/// Opaque index into a `Graph`'s node arena. Topological rank is implied
/// by the order nodes were added during build: ascending `NodeId` is the
/// evaluation order within one engine cycle (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Construct a `NodeId` for a given arena index. Exposed beyond the
    /// crate boundary because wiring code routinely predicts the
    /// `NodeId` a not-yet-added node will receive (its `GraphBuilder`
    /// position is known ahead of `add_node`) so it can bind an input
    /// to it before the node itself exists.
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

bitflags! {
    /// Per-node participation flags resolved once at build time.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NodeFlags: u8 {
        /// Node has at least one active input (may be woken by ticks).
        const HAS_ACTIVE_INPUTS = 0b0001;
        /// Node has `valid_inputs` that must hold before the first eval.
        const HAS_VALID_GATE = 0b0010;
        /// Node has `all_valid_inputs` checked on every eval.
        const HAS_ALL_VALID_GATE = 0b0100;
        /// Node is a source (no time-series inputs at all).
        const IS_SOURCE = 0b1000;
    }
}

/// The context handed to a node during `start`/`eval`/`stop`.
///
/// Exposes only what §4.3's eval protocol allows a node to do: read the
/// frozen `evaluation_time`, and request to be woken again later.
pub struct EvalContext<'a> {
    pub(crate) node_id: NodeId,
    pub(crate) evaluation_time: EngineTime,
    pub(crate) scheduler: &'a mut crate::scheduler::Scheduler,
    pub(crate) runtime: &'a RuntimeContext,
    pub(crate) stop_requested: &'a mut Option<String>,
}

impl<'a> EvalContext<'a> {
    pub fn evaluation_time(&self) -> EngineTime {
        self.evaluation_time
    }

    pub fn runtime(&self) -> &RuntimeContext {
        self.runtime
    }

    /// §5 cancellation: a node self-cancels the whole engine loop.
    /// Terminal — the engine drains in-flight post-evaluation callbacks
    /// for the current cycle then exits `evaluate_graph` cooperatively
    /// rather than unwinding (§9 design notes: no exceptions for
    /// control flow).
    pub fn stop_engine(&mut self, reason: impl Into<String>) {
        *self.stop_requested = Some(reason.into());
    }

    /// Wake this node again at `time`. Per §4.3 rule 4, this never fires
    /// within the current cycle: a request for `evaluation_time` itself
    /// is bumped to the next representable instant (§8 boundary behavior).
    pub fn schedule_self(&mut self, time: EngineTime) {
        let time = if time <= self.evaluation_time {
            self.evaluation_time + dataflow_common::MIN_TD
        } else {
            time
        };
        self.scheduler.schedule(self.node_id, time);
    }

    pub fn schedule_self_labeled(&mut self, time: EngineTime, label: &'static str) {
        let time = if time <= self.evaluation_time {
            self.evaluation_time + dataflow_common::MIN_TD
        } else {
            time
        };
        self.scheduler.schedule_labeled(self.node_id, time, label);
    }

    pub fn unschedule_self(&mut self, label: &'static str) {
        self.scheduler.unschedule(self.node_id, label);
    }
}

/// The behavior every graph vertex implements. Type-erased so a `Graph`
/// can hold a homogeneous `Vec<Box<dyn NodeBehavior>>` regardless of each
/// node's concrete input/output types.
pub trait NodeBehavior {
    /// Human-readable name used in `NodePath`s and error messages.
    fn label(&self) -> &str;

    /// Flags resolved once when the node is added to a graph.
    fn flags(&self) -> NodeFlags {
        NodeFlags::empty()
    }

    /// Whether `valid_inputs` hold, gating the very first evaluation.
    /// Checked once; once it returns `true` the node is never gated
    /// again even if those inputs later become invalid.
    fn ready_for_first_eval(&self) -> bool {
        true
    }

    /// Whether `all_valid_inputs` hold. Checked before every evaluation.
    fn ready_for_eval(&self) -> bool {
        true
    }

    /// Acquire external resources. Brackets `stop`; if a later `start`
    /// in the same batch fails, the engine still calls `stop` on every
    /// node that already started, in reverse order (§5).
    fn start(&mut self, _ctx: &mut EvalContext) -> Result<(), EngineError> {
        Ok(())
    }

    /// Read modified inputs, compute, optionally write the output.
    fn eval(&mut self, ctx: &mut EvalContext) -> Result<(), EngineError>;

    /// Release external resources.
    fn stop(&mut self, _ctx: &mut EvalContext) -> Result<(), EngineError> {
        Ok(())
    }

    /// NodeIds that must be scheduled at `now` because one of this
    /// node's own outputs ticked at `now` during the eval that just
    /// ran. The `Graph` driving the cycle calls this right after
    /// `eval` returns and schedules whatever comes back, which is how
    /// "notify observers" (§3) turns into the next engine-cycle
    /// iteration rather than a direct call stack (§4.4 fixed point).
    ///
    /// Default empty: sink nodes, and nodes whose output didn't tick
    /// this cycle, have nothing to propagate.
    fn ticked_observers(&self, _now: EngineTime) -> smallvec::SmallVec<[NodeId; 4]> {
        smallvec::SmallVec::new()
    }
}
