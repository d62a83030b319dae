//! Test and fixture helpers for exercising a single node (or small
//! subgraph) against a scripted input sequence without hand-writing the
//! `Graph`/`EvaluationEngine` wiring every caller would otherwise
//! repeat.
//!
//! Grounded on the source's own `eval_node` test harness (builds a
//! throwaway graph around the node under test, drives it with a fixed
//! input sequence, and collects every tick of its output) and on the
//! `PullSourceNode`/`IterGenerator`/manual-`NodeId`-prediction pattern
//! already used by `dataflow-core`'s own in-crate tests (`engine.rs`,
//! `nested.rs`, `tests.rs`) — this crate just gives that pattern a
//! reusable name instead of leaving every test to reconstruct it.

use std::cell::RefCell;
use std::rc::Rc;

use dataflow_core::{
    clock::ClockMode,
    context::RuntimeContext,
    engine::{EngineResult, EvaluationEngine},
    node::{EvalContext, NodeBehavior, NodeFlags, NodeId},
    source::{IterGenerator, PullSourceNode},
    ts::output::{new_output_handle, OutputHandle},
    ts::scalar::TS,
    EngineTime, GraphBuilder,
};
use dataflow_common::EngineError;

/// A node that binds to one scalar output and appends every tick it
/// sees to a shared `Vec`, for the harness to read back once the run
/// finishes.
struct Recorder<Out> {
    input: TS<Out>,
    ticks: Rc<RefCell<Vec<(EngineTime, Out)>>>,
}

impl<Out: Clone + 'static> NodeBehavior for Recorder<Out> {
    fn label(&self) -> &str {
        "recorder"
    }

    fn flags(&self) -> NodeFlags {
        NodeFlags::HAS_ACTIVE_INPUTS
    }

    fn eval(&mut self, ctx: &mut EvalContext) -> Result<(), EngineError> {
        let now = ctx.evaluation_time();
        if let Some(value) = self.input.delta_value(now) {
            self.ticks.borrow_mut().push((now, value));
        }
        Ok(())
    }
}

/// Drive a single-input, single-output node (or the handful of nodes a
/// `build` closure wires up) through a scripted `(time, value)`
/// sequence and collect every tick of its declared output.
///
/// `build` receives the builder to add the node(s) under test to, and
/// the `OutputHandle` the scripted input ticks arrive on; it returns
/// the `OutputHandle` whose ticks should be recorded. The harness owns
/// everything else: the pull source feeding `input`, the recorder
/// tailing the returned output, and the `EvaluationEngine` run to
/// quiescence in `Simulation` mode.
pub fn eval_node<In, Out, F>(input_initial: In, script: Vec<(EngineTime, In)>, build: F) -> Vec<(EngineTime, Out)>
where
    In: Clone + 'static,
    Out: Clone + 'static,
    F: FnOnce(&mut GraphBuilder, OutputHandle<In>) -> OutputHandle<Out>,
{
    let mut gb = GraphBuilder::new();

    let input_out = new_output_handle(input_initial);
    let gen = IterGenerator::new(script.into_iter());
    gb.add_node(PullSourceNode::new("input", input_out.clone(), Box::new(gen)));

    let output = build(&mut gb, input_out);

    let recorder_id = NodeId::new(gb.len() as u32);
    let mut recorder_input: TS<Out> = TS::new(true);
    recorder_input.bind_handle(output, recorder_id);
    let ticks = Rc::new(RefCell::new(Vec::new()));
    let recorder_id_actual = gb.add_node(Recorder {
        input: recorder_input,
        ticks: ticks.clone(),
    });
    debug_assert_eq!(recorder_id, recorder_id_actual, "recorder NodeId prediction drifted from GraphBuilder::len");

    let mut graph = gb.instantiate();
    let engine = EvaluationEngine::new(RuntimeContext::default());
    run_quiescent(&engine, &mut graph, EngineTime::from_micros(0))
        .expect("eval_node harness run failed");

    Rc::try_unwrap(ticks)
        .unwrap_or_else(|_| panic!("recorder still has outstanding references after the run"))
        .into_inner()
}

/// Run `graph` to quiescence in simulation mode, starting at `start`.
/// A thin wrapper for callers building their own multi-node graphs by
/// hand (rather than through `eval_node`'s single-input convenience)
/// who still want the "run until nothing is scheduled" behavior without
/// repeating the `EvaluationEngine` setup.
pub fn run_quiescent(
    engine: &EvaluationEngine,
    graph: &mut dataflow_core::Graph,
    start: EngineTime,
) -> Result<EngineResult, EngineError> {
    engine.evaluate_graph_until_quiescent(graph, start, ClockMode::Simulation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataflow_core::builder::build_node;

    #[test]
    fn eval_node_doubles_a_scripted_sequence() {
        let script = vec![
            (EngineTime::from_micros(0), 1i64),
            (EngineTime::from_micros(1), 2i64),
            (EngineTime::from_micros(2), 3i64),
        ];

        let ticks = eval_node(0i64, script, |gb, input_handle| {
            let node_id = NodeId::new(gb.len() as u32);
            let mut ts: TS<i64> = TS::new(true);
            ts.bind_handle(input_handle, node_id);
            let out = new_output_handle(0i64);
            let out_for_eval = out.clone();
            let out_for_observers = out.clone();
            gb.add_node(
                build_node("double", ts)
                    .eval(move |ts, ctx| {
                        if let Some(v) = ts.value() {
                            out_for_eval.borrow_mut().set(v * 2, ctx.evaluation_time());
                        }
                        Ok(())
                    })
                    .ticked_observers(move |_ts: &TS<i64>, now| {
                        if out_for_observers.borrow().core().modified_at(now) {
                            out_for_observers.borrow().core().observers().into()
                        } else {
                            smallvec::SmallVec::new()
                        }
                    })
                    .build(),
            );
            out
        });

        assert_eq!(ticks, vec![
            (EngineTime::from_micros(0), 2i64),
            (EngineTime::from_micros(1), 4i64),
            (EngineTime::from_micros(2), 6i64),
        ]);
    }
}
