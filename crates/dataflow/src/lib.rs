//! Meta crate that re-exports the dataflow runtime's building blocks
//! with sensible defaults. Downstream users depend on this crate and
//! opt into the `Bundle` derive, the test harness, or tracing
//! instrumentation via feature flags while still being able to reach
//! the underlying crates directly for deeper integration.

pub use dataflow_common::{
    EngineDuration, EngineError, EngineErrorKind, EngineTime, NodePath, MAX_DT, MIN_DT, MIN_TD,
};

pub use dataflow_core::{
    build_node, builder, clock, context, engine, feedback, graph, nested, node, recordable,
    scheduler, source, ts, ClockMode, EngineResult, EvaluationClock, EvaluationEngine, FnNode,
    Graph, GraphBuilder, MapBodyInstance, MapOverTsd, MapOverTsl, NodeBuilder, NodeFlags, NodeId,
    RecordSink, RecordableState, ReduceBodyInstance, ReduceOverTsdAssoc, ReduceOverTsdChain,
    RuntimeContext, Scheduler, StateRecord, Switch, SwitchBodyInstance, VecRecordSink,
};

#[cfg(feature = "macros")]
pub use dataflow_macros::Bundle;

#[cfg(feature = "testkit")]
pub use dataflow_testkit as testkit;

pub mod doc_examples;
