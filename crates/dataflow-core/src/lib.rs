//! Dataflow Evaluation Engine
//!
//! Provides the functional-reactive core: a scheduler-driven evaluation
//! engine, the time-series container type system (TS/TSL/TSS/TSD/TSB/TSW/REF),
//! and the nested-graph operators (`map_`, `reduce_`, `switch_`) that
//! instantiate and tear down sub-graphs at runtime.
//!
//! Wiring DSLs, I/O adaptors, and persistence are deliberately out of
//! scope here; see `RuntimeContext` for the seam collaborators hang off.

pub mod clock;
pub mod context;
pub mod engine;
pub mod feedback;
pub mod graph;
pub mod node;
pub mod scheduler;
pub mod source;
pub mod ts;

pub mod builder;
pub mod nested;
pub mod recordable;

pub use dataflow_common::{
    EngineDuration, EngineError, EngineErrorKind, EngineTime, NodePath, MAX_DT, MIN_DT, MIN_TD,
};

pub use builder::{build_node, FnNode, GraphBuilder, NodeBuilder};
pub use clock::{ClockMode, EvaluationClock};
pub use context::RuntimeContext;
pub use engine::{EngineResult, EvaluationEngine};
pub use graph::Graph;
pub use nested::{
    MapBodyInstance, MapOverTsd, MapOverTsl, ReduceBodyInstance, ReduceOverTsdAssoc, ReduceOverTsdChain, Switch,
    SwitchBodyInstance,
};
pub use node::{NodeFlags, NodeId};
pub use recordable::{RecordSink, RecordableState, StateRecord, VecRecordSink};
pub use scheduler::Scheduler;
