//! Minimal end-to-end setup used by this crate's doc comments, so
//! examples don't repeat the `GraphBuilder`/`EvaluationEngine`
//! boilerplate inline.

use dataflow_core::builder::{build_node, GraphBuilder};
use dataflow_core::context::RuntimeContext;
use dataflow_core::node::NodeId;
use dataflow_core::ts::output::{new_output_handle, Ticked};
use dataflow_core::ts::scalar::TS;
use dataflow_core::{ClockMode, EngineResult, EngineTime, EvaluationEngine};

fn forward_if_ticked(out: &dataflow_core::ts::output::OutputHandle<i64>, now: EngineTime) -> smallvec::SmallVec<[NodeId; 4]> {
    if out.borrow().core().modified_at(now) {
        out.borrow().core().observers().into()
    } else {
        smallvec::SmallVec::new()
    }
}

/// Build `out = const(a) + const(b)`, run it to quiescence, and return
/// `out`'s final value.
///
/// ```rust
/// # use dataflow::doc_examples::sum_two_constants;
/// let sum = sum_two_constants(1, 2).unwrap();
/// assert_eq!(sum, 3);
/// ```
pub fn sum_two_constants(a: i64, b: i64) -> Result<i64, dataflow_common::EngineError> {
    let mut gb = GraphBuilder::new();
    let out_a = new_output_handle(0i64);
    let out_b = new_output_handle(0i64);
    let out_sum = new_output_handle(0i64);

    let sum_id = NodeId::new(2);
    let mut a_ts = TS::new(true);
    let mut b_ts = TS::new(true);
    a_ts.bind_handle(out_a.clone(), sum_id);
    b_ts.bind_handle(out_b.clone(), sum_id);

    let c1 = build_node("c1", out_a.clone())
        .eval(move |out, ctx| {
            out.borrow_mut().set(a, ctx.evaluation_time());
            Ok(())
        })
        .ticked_observers(|out, now| forward_if_ticked(out, now))
        .build();
    let c1_id = gb.add_node(c1);

    let c2 = build_node("c2", out_b.clone())
        .eval(move |out, ctx| {
            out.borrow_mut().set(b, ctx.evaluation_time());
            Ok(())
        })
        .ticked_observers(|out, now| forward_if_ticked(out, now))
        .build();
    let c2_id = gb.add_node(c2);

    let sum_out = out_sum.clone();
    let sum = build_node("sum", (a_ts, b_ts, sum_out))
        .eval(|(a, b, out), ctx| {
            out.borrow_mut().set(a.value().unwrap_or(0) + b.value().unwrap_or(0), ctx.evaluation_time());
            Ok(())
        })
        .build();
    assert_eq!(gb.add_node(sum), sum_id);

    let mut graph = gb.instantiate();
    graph.schedule(c1_id, EngineTime::from_micros(0));
    graph.schedule(c2_id, EngineTime::from_micros(0));

    let engine = EvaluationEngine::new(RuntimeContext::default());
    let _: EngineResult =
        engine.evaluate_graph_until_quiescent(&mut graph, EngineTime::from_micros(0), ClockMode::Simulation)?;
    Ok(*out_sum.borrow().value())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_example_matches_scenario_1() {
        assert_eq!(sum_two_constants(1, 2).unwrap(), 3);
    }
}
