//! The wiring-layer boundary (§6): `build_node`/`build_graph`/`instantiate`.
//!
//! Rust resolves generics at compile time rather than the source's
//! runtime type introspection (§9 "dynamic typing → static dispatch"),
//! so there is no type-erased edge-wiring step here: binding an input to
//! an output is already a typed, compile-time-checked call on the
//! concrete container (`TS::bind`, `TSD::bind`, …) made before the node
//! is handed to `GraphBuilder::add`. What this module gives the wiring
//! layer is the other half of §6: a way to assemble a `NodeBehavior`
//! from plain closures instead of a hand-written struct per node, and a
//! thin `GraphBuilder` that turns a sequence of such nodes into a
//! `Graph` ready for `EvaluationEngine::evaluate_graph`.

use smallvec::SmallVec;

use dataflow_common::{EngineError, EngineTime};

use crate::graph::Graph;
use crate::node::{EvalContext, NodeBehavior, NodeFlags, NodeId};

type StartStopFn<S> = Box<dyn FnMut(&mut S, &mut EvalContext) -> Result<(), EngineError>>;
type EvalFn<S> = Box<dyn FnMut(&mut S, &mut EvalContext) -> Result<(), EngineError>>;
type GateFn<S> = Box<dyn Fn(&S) -> bool>;
type ObserversFn<S> = Box<dyn Fn(&S, EngineTime) -> SmallVec<[NodeId; 4]>>;

/// A `NodeBehavior` assembled from closures over a user-supplied state
/// `S` (typically a struct of already-bound `TS`/`TSS`/… fields plus an
/// `OutputHandle` for the node's own output). `build_node` is the only
/// way to construct one.
pub struct FnNode<S> {
    label: String,
    state: S,
    flags: NodeFlags,
    ready_for_first_eval: Option<GateFn<S>>,
    ready_for_eval: Option<GateFn<S>>,
    eval_fn: EvalFn<S>,
    start_fn: Option<StartStopFn<S>>,
    stop_fn: Option<StartStopFn<S>>,
    ticked_observers_fn: Option<ObserversFn<S>>,
}

impl<S: 'static> NodeBehavior for FnNode<S> {
    fn label(&self) -> &str {
        &self.label
    }

    fn flags(&self) -> NodeFlags {
        self.flags
    }

    fn ready_for_first_eval(&self) -> bool {
        self.ready_for_first_eval.as_ref().is_none_or(|f| f(&self.state))
    }

    fn ready_for_eval(&self) -> bool {
        self.ready_for_eval.as_ref().is_none_or(|f| f(&self.state))
    }

    fn start(&mut self, ctx: &mut EvalContext) -> Result<(), EngineError> {
        match &mut self.start_fn {
            Some(f) => f(&mut self.state, ctx),
            None => Ok(()),
        }
    }

    fn eval(&mut self, ctx: &mut EvalContext) -> Result<(), EngineError> {
        (self.eval_fn)(&mut self.state, ctx)
    }

    fn stop(&mut self, ctx: &mut EvalContext) -> Result<(), EngineError> {
        match &mut self.stop_fn {
            Some(f) => f(&mut self.state, ctx),
            None => Ok(()),
        }
    }

    fn ticked_observers(&self, now: EngineTime) -> SmallVec<[NodeId; 4]> {
        match &self.ticked_observers_fn {
            Some(f) => f(&self.state, now),
            None => SmallVec::new(),
        }
    }
}

/// §6 `build_node(signature, eval_fn, start_fn?, stop_fn?) -> NodeBuilder`.
/// `signature` is the state struct `S` itself here (already holding the
/// typed, pre-bound inputs/output) rather than a separate descriptor,
/// since Rust's type system is the signature.
pub struct NodeBuilder<S> {
    label: String,
    state: S,
    flags: NodeFlags,
    ready_for_first_eval: Option<GateFn<S>>,
    ready_for_eval: Option<GateFn<S>>,
    eval_fn: Option<EvalFn<S>>,
    start_fn: Option<StartStopFn<S>>,
    stop_fn: Option<StartStopFn<S>>,
    ticked_observers_fn: Option<ObserversFn<S>>,
}

impl<S> NodeBuilder<S> {
    pub fn new(label: impl Into<String>, state: S) -> Self {
        Self {
            label: label.into(),
            state,
            flags: NodeFlags::empty(),
            ready_for_first_eval: None,
            ready_for_eval: None,
            eval_fn: None,
            start_fn: None,
            stop_fn: None,
            ticked_observers_fn: None,
        }
    }

    pub fn flags(mut self, flags: NodeFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn ready_for_first_eval(mut self, f: impl Fn(&S) -> bool + 'static) -> Self {
        self.ready_for_first_eval = Some(Box::new(f));
        self
    }

    pub fn ready_for_eval(mut self, f: impl Fn(&S) -> bool + 'static) -> Self {
        self.ready_for_eval = Some(Box::new(f));
        self
    }

    pub fn eval(mut self, f: impl FnMut(&mut S, &mut EvalContext) -> Result<(), EngineError> + 'static) -> Self {
        self.eval_fn = Some(Box::new(f));
        self
    }

    pub fn start(mut self, f: impl FnMut(&mut S, &mut EvalContext) -> Result<(), EngineError> + 'static) -> Self {
        self.start_fn = Some(Box::new(f));
        self
    }

    pub fn stop(mut self, f: impl FnMut(&mut S, &mut EvalContext) -> Result<(), EngineError> + 'static) -> Self {
        self.stop_fn = Some(Box::new(f));
        self
    }

    pub fn ticked_observers(mut self, f: impl Fn(&S, EngineTime) -> SmallVec<[NodeId; 4]> + 'static) -> Self {
        self.ticked_observers_fn = Some(Box::new(f));
        self
    }

    /// Finish building. Panics if `eval` was never set: every node must
    /// have something to do when dispatched.
    pub fn build(self) -> FnNode<S>
    where
        S: 'static,
    {
        FnNode {
            label: self.label,
            state: self.state,
            flags: self.flags,
            ready_for_first_eval: self.ready_for_first_eval,
            ready_for_eval: self.ready_for_eval,
            eval_fn: self.eval_fn.expect("build_node: no eval function supplied"),
            start_fn: self.start_fn,
            stop_fn: self.stop_fn,
            ticked_observers_fn: self.ticked_observers_fn,
        }
    }
}

/// §6 `build_node(...) -> NodeBuilder`.
pub fn build_node<S>(label: impl Into<String>, state: S) -> NodeBuilder<S> {
    NodeBuilder::new(label, state)
}

/// §6 `build_graph(nodes, edges) -> GraphBuilder`. `edges` has no
/// separate representation here — each node arrives already wired, via
/// `TS::bind`/`TSD::bind`/… calls the caller made against the output
/// handles of nodes added earlier. `GraphBuilder` exists as the named
/// §6 boundary type rather than handing callers a bare `Graph` to push
/// nodes onto directly.
#[derive(Default)]
pub struct GraphBuilder {
    graph: Graph,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self { graph: Graph::new() }
    }

    /// Append a node; returns its `NodeId` so the caller can bind
    /// subsequent nodes' inputs to this one's output.
    pub fn add_node(&mut self, node: impl NodeBehavior + 'static) -> NodeId {
        self.graph.add_node(Box::new(node))
    }

    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    /// §6 `instantiate(GraphBuilder, scalars) -> Graph`. `scalars` (the
    /// source's per-instantiation scalar parameters) are already baked
    /// into each node's closed-over state by the time it reached
    /// `add_node`, so this is just the builder → `Graph` handoff.
    pub fn instantiate(self) -> Graph {
        self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RuntimeContext;
    use crate::ts::output::{new_output_handle, OutputHandle};
    use crate::ts::scalar::TS;

    struct ConstState {
        out: OutputHandle<i64>,
        value: i64,
    }

    struct AddState {
        a: TS<i64>,
        b: TS<i64>,
        out: OutputHandle<i64>,
    }

    #[test]
    fn build_node_and_graph_builder_reproduce_simple_add() {
        // §8 scenario 1, built through the §6 surface instead of a
        // hand-written `NodeBehavior` impl.
        let mut gb = GraphBuilder::new();
        let out_a = new_output_handle(0i64);
        let out_b = new_output_handle(0i64);

        let c1 = build_node("c1", ConstState { out: out_a.clone(), value: 1 })
            .eval(|s, ctx| {
                s.out.borrow_mut().set(s.value, ctx.evaluation_time());
                Ok(())
            })
            .ticked_observers(|s, now| {
                if s.out.borrow().core().modified_at(now) {
                    s.out.borrow().core().observers().into()
                } else {
                    SmallVec::new()
                }
            })
            .build();
        let c1_id = gb.add_node(c1);

        let c2 = build_node("c2", ConstState { out: out_b.clone(), value: 2 })
            .eval(|s, ctx| {
                s.out.borrow_mut().set(s.value, ctx.evaluation_time());
                Ok(())
            })
            .ticked_observers(|s, now| {
                if s.out.borrow().core().modified_at(now) {
                    s.out.borrow().core().observers().into()
                } else {
                    SmallVec::new()
                }
            })
            .build();
        let c2_id = gb.add_node(c2);

        let out_sum = new_output_handle(0i64);
        let sum_id_expected = NodeId::new(2);
        let mut a = TS::new(true);
        a.bind_handle(out_a.clone(), sum_id_expected);
        let mut b = TS::new(true);
        b.bind_handle(out_b.clone(), sum_id_expected);

        let add = build_node("sum", AddState { a, b, out: out_sum.clone() })
            .flags(NodeFlags::HAS_ACTIVE_INPUTS)
            .eval(|s, ctx| {
                let sum = s.a.value().unwrap_or(0) + s.b.value().unwrap_or(0);
                s.out.borrow_mut().set(sum, ctx.evaluation_time());
                Ok(())
            })
            .build();
        let sum_id = gb.add_node(add);
        assert_eq!(sum_id, sum_id_expected);

        let mut graph = gb.instantiate();
        graph.schedule(c1_id, EngineTime::from_micros(0));
        graph.schedule(c2_id, EngineTime::from_micros(0));
        let runtime = RuntimeContext::default();
        graph.start_all(EngineTime::from_micros(0), &runtime).unwrap();
        graph.evaluate_cycle(EngineTime::from_micros(0), &runtime).unwrap();

        assert_eq!(*out_sum.borrow().value(), 3);
    }
}
