//! The engine's error taxonomy.
//!
//! - **`EngineErrorKind`** : the five kinds of failure the core recognises
//! - **`NodePath`**        : where in the (possibly nested) graph an error
//!   originated
//! - **`EngineError`**     : one struct that glues the two together plus a
//!   message and the time the error was observed
//!
//! Only `NodeEvalError` is ever meant to be caught and continue the run
//! (via `capture_exception`, see `EngineErrorKind::is_recoverable`); the
//! rest are fatal and unwind `evaluate_graph`.

use std::{error::Error, fmt};

use crate::time::EngineTime;

/// All recognised engine error kinds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EngineErrorKind {
    /// Type mismatch, unresolved generic, or a cycle detected while
    /// building the graph. Raised during `build`/`instantiate`; the
    /// engine never starts.
    Wiring,
    /// An exception raised inside a node's `eval`. Captured in a
    /// per-node error output if `capture_exception` was set at build
    /// time; otherwise propagates and stops the engine.
    NodeEval,
    /// An attempt to schedule a node at or before a time already
    /// passed. Fatal; indicates an engine bug.
    Scheduling,
    /// Rebinding a `REF` (or a nested-node stub input) to an output of
    /// an incompatible type at runtime. Fatal within the enclosing
    /// nested node.
    Binding,
    /// Push-queue overflow or thread-pool exhaustion reported by an
    /// adaptor. The core does not interpret it further.
    Resource,
}

impl fmt::Display for EngineErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Wiring => "WiringError",
            Self::NodeEval => "NodeEvalError",
            Self::Scheduling => "SchedulingError",
            Self::Binding => "BindingError",
            Self::Resource => "ResourceError",
        })
    }
}

impl EngineErrorKind {
    /// Whether this kind may be captured at a node boundary and turned
    /// into a value instead of unwinding the engine loop.
    pub fn is_recoverable(self) -> bool {
        matches!(self, Self::NodeEval)
    }
}

/// The path to the node that raised an error: the sequence of nested-node
/// indices from the root graph down to the leaf, plus the leaf's label.
///
/// E.g. a node `scale` inside the body graph instantiated for key `"b"`
/// of a `map_` at node index 3 of the root graph would read
/// `NodePath { segments: [3, <key b's instance index>], leaf: "scale" }`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct NodePath {
    pub segments: Vec<usize>,
    pub leaf: String,
}

impl NodePath {
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            segments: Vec::new(),
            leaf: name.into(),
        }
    }

    /// Prepend a nesting level (used when an error bubbles up out of a
    /// child graph through its owning nested node).
    pub fn nested_under(mut self, index: usize) -> Self {
        self.segments.insert(0, index);
        self
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for seg in &self.segments {
            write!(f, "{seg}/")?;
        }
        f.write_str(&self.leaf)
    }
}

/// The single struct the engine's public API returns on failure.
///
/// Combines the error `kind`, the `node` that raised it, the
/// `evaluation_time` the engine was at, and a human `message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub node: NodePath,
    pub evaluation_time: EngineTime,
    pub message: String,
}

impl EngineError {
    pub fn new(kind: EngineErrorKind, node: NodePath, evaluation_time: EngineTime) -> Self {
        Self {
            kind,
            node,
            evaluation_time,
            message: String::new(),
        }
    }

    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = msg.into();
        self
    }

    pub fn wiring(node: NodePath, msg: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Wiring, node, crate::time::MIN_DT).with_message(msg)
    }

    pub fn scheduling(node: NodePath, at: EngineTime, msg: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Scheduling, node, at).with_message(msg)
    }

    pub fn binding(node: NodePath, at: EngineTime, msg: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Binding, node, at).with_message(msg)
    }

    pub fn resource(node: NodePath, at: EngineTime, msg: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Resource, node, at).with_message(msg)
    }

    pub fn node_eval(node: NodePath, at: EngineTime, msg: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::NodeEval, node, at).with_message(msg)
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {} ({}): {}",
            self.kind, self.node, self.evaluation_time, self.message
        )
    }
}

impl Error for EngineError {}
