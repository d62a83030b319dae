//! `Graph` (§4.4): an ordered arena of nodes plus the scheduler that
//! drives them. Ascending `NodeId` is evaluation order within a cycle
//! (§4.2); a sub-graph owned by a `NestedNode` is just another `Graph`,
//! whose `peek_next_time` the parent forwards into its own
//! `EvalContext::schedule_self` call (§4.4, §4.5 "nested evaluation
//! clock" — there is no separate clock type, the parent node's own
//! scheduling request *is* the forwarding).

use dataflow_common::{EngineError, EngineTime, NodePath};

use crate::context::RuntimeContext;
use crate::node::{EvalContext, NodeBehavior, NodeId};
use crate::scheduler::Scheduler;

/// One graph's worth of nodes and the scheduler driving them.
pub struct Graph {
    nodes: Vec<Box<dyn NodeBehavior>>,
    scheduler: Scheduler,
    started: Vec<bool>,
    passed_first_gate: Vec<bool>,
}

impl Graph {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            scheduler: Scheduler::new(),
            started: Vec::new(),
            passed_first_gate: Vec::new(),
        }
    }

    /// Append a node; its `NodeId` is its arena index, which is also
    /// its evaluation rank within a cycle (§4.2).
    pub fn add_node(&mut self, node: Box<dyn NodeBehavior>) -> NodeId {
        let id = NodeId::new(self.nodes.len() as u32);
        self.nodes.push(node);
        self.started.push(false);
        self.passed_first_gate.push(false);
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn label_of(&self, id: NodeId) -> &str {
        self.nodes[id.index()].label()
    }

    pub fn node_path(&self, id: NodeId) -> NodePath {
        NodePath::leaf(self.label_of(id))
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    pub fn peek_next_time(&self) -> Option<EngineTime> {
        self.scheduler.peek_next_time()
    }

    /// Schedule `node` to run at `time` from outside any node's own
    /// `eval` (e.g. a push-source handler, or a nested operator wiring
    /// a freshly-instantiated child to run immediately).
    pub fn schedule(&mut self, node: NodeId, time: EngineTime) {
        self.scheduler.schedule(node, time);
    }

    /// `build → start` (§3): calls `start` on every node in index
    /// order. If one fails, every node already started is stopped in
    /// reverse order (§5 resource scoping) and the error is returned.
    pub fn start_all(&mut self, time: EngineTime, runtime: &RuntimeContext) -> Result<(), EngineError> {
        let mut stop_requested = None;
        for i in 0..self.nodes.len() {
            let id = NodeId::new(i as u32);
            let mut ctx = EvalContext {
                node_id: id,
                evaluation_time: time,
                scheduler: &mut self.scheduler,
                runtime,
                stop_requested: &mut stop_requested,
            };
            match self.nodes[i].start(&mut ctx) {
                Ok(()) => self.started[i] = true,
                Err(err) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(node = self.nodes[i].label(), %err, "node start failed, stopping already-started nodes");
                    self.stop_all(time, runtime);
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// `stop → release` (§3): calls `stop` on every started node in
    /// reverse order. Errors are swallowed per-node so that teardown is
    /// never partial; a future `recordable` hook may want to surface
    /// them, but the core has no collaborator to report to here.
    pub fn stop_all(&mut self, time: EngineTime, runtime: &RuntimeContext) {
        let mut stop_requested = None;
        for i in (0..self.nodes.len()).rev() {
            if !self.started[i] {
                continue;
            }
            let id = NodeId::new(i as u32);
            let mut ctx = EvalContext {
                node_id: id,
                evaluation_time: time,
                scheduler: &mut self.scheduler,
                runtime,
                stop_requested: &mut stop_requested,
            };
            let _ = self.nodes[i].stop(&mut ctx);
            self.started[i] = false;
        }
    }

    /// Evaluate every node due at `time`, in ascending node-index
    /// order, and keep draining newly-due nodes (propagation within the
    /// same engine time) until nothing is left due at `time` — the
    /// within-cycle fixed point (§4.4). Returns the stop reason if a
    /// node called `stop_engine` during the cycle; the caller (the
    /// `EvaluationEngine` loop) is responsible for honoring it after
    /// this cycle finishes draining.
    pub fn evaluate_cycle(
        &mut self,
        time: EngineTime,
        runtime: &RuntimeContext,
    ) -> Result<Option<String>, EngineError> {
        let mut stop_requested = None;
        loop {
            let due = self.scheduler.pop_due(time);
            if due.is_empty() {
                break;
            }
            for id in due {
                self.eval_node(id, time, runtime, &mut stop_requested)?;
            }
            if stop_requested.is_some() {
                break;
            }
        }
        Ok(stop_requested)
    }

    fn eval_node(
        &mut self,
        id: NodeId,
        time: EngineTime,
        runtime: &RuntimeContext,
        stop_requested: &mut Option<String>,
    ) -> Result<(), EngineError> {
        let i = id.index();
        if !self.passed_first_gate[i] {
            if !self.nodes[i].ready_for_first_eval() {
                return Ok(());
            }
            self.passed_first_gate[i] = true;
        }
        if !self.nodes[i].ready_for_eval() {
            return Ok(());
        }

        let mut ctx = EvalContext {
            node_id: id,
            evaluation_time: time,
            scheduler: &mut self.scheduler,
            runtime,
            stop_requested,
        };
        self.nodes[i].eval(&mut ctx)?;

        let observers = self.nodes[i].ticked_observers(time);
        for obs in observers {
            self.scheduler.schedule(obs, time);
        }
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> &dyn NodeBehavior {
        self.nodes[id.index()].as_ref()
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut (dyn NodeBehavior + 'static) {
        self.nodes[id.index()].as_mut()
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}
