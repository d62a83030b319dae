//! Forward references that would otherwise form a cycle (§4.6).
//!
//! **`feedback`** breaks a real runtime cycle: the value written in
//! cycle N only becomes observable in the cycle after N, so reading and
//! writing the same feedback within one node's `eval` never
//! read-after-writes itself. **`delayed_binding`** breaks a *wiring*-time
//! forward reference — a placeholder port bound once, later, before the
//! graph starts; it does nothing at runtime and does not itself prevent
//! a cycle (misuse is a `WiringError` caught at `instantiate`, not here).

use std::cell::RefCell;
use std::rc::Rc;

use dataflow_common::{EngineError, EngineTime, NodePath};

use crate::node::NodeId;
use crate::ts::output::{Binding, OutputCore, Ticked};

/// The producer side of a feedback loop: a value that can be read
/// immediately (starting from `init`) but whose writes are staged and
/// only promoted to the readable value the first time it is queried at
/// a later engine time than the write (§4.6, §8 scenario 6).
pub struct FeedbackOutput<T> {
    core: OutputCore,
    current: T,
    staged: Option<(EngineTime, T)>,
}

impl<T> Ticked for FeedbackOutput<T> {
    fn core(&self) -> &OutputCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut OutputCore {
        &mut self.core
    }
}

impl<T> FeedbackOutput<T> {
    pub fn new(init: T) -> Self {
        let mut core = OutputCore::new();
        // Valid from construction so `prev()` is readable in the very
        // first cycle, but never "modified" until a staged write is
        // actually promoted (MIN_DT never equals a real engine time).
        core.mark_ticked(dataflow_common::MIN_DT);
        Self {
            core,
            current: init,
            staged: None,
        }
    }

    /// Promote a staged write into `current` if it was written strictly
    /// before `now`; ticks the output at `now`, the cycle in which it
    /// actually becomes visible, not the cycle it was written in.
    fn commit_if_due(&mut self, now: EngineTime) {
        if let Some((written_at, _)) = &self.staged {
            if *written_at < now {
                let (_, value) = self.staged.take().unwrap();
                self.current = value;
                self.core.mark_ticked(now);
            }
        }
    }

    /// Stage `value` for next cycle. Calling this more than once in the
    /// same cycle keeps only the latest write, matching the "last write
    /// in a cycle wins" idiom used elsewhere in the container types.
    pub fn set(&mut self, value: T, time: EngineTime) {
        self.staged = Some((time, value));
    }
}

impl<T: Clone> FeedbackOutput<T> {
    /// The value as of `now`, committing a due staged write first.
    pub fn prev(&mut self, now: EngineTime) -> T {
        self.commit_if_due(now);
        self.current.clone()
    }
}

pub type FeedbackHandle<T> = Rc<RefCell<FeedbackOutput<T>>>;

pub fn new_feedback_handle<T>(init: T) -> FeedbackHandle<T> {
    Rc::new(RefCell::new(FeedbackOutput::new(init)))
}

/// The consumer side, bound like any other time-series input.
pub struct Feedback<T> {
    binding: Binding<FeedbackOutput<T>>,
}

impl<T> Default for Feedback<T> {
    fn default() -> Self {
        Self {
            binding: Binding::default(),
        }
    }
}

impl<T> Feedback<T> {
    pub fn new(active: bool) -> Self {
        Self {
            binding: Binding::new(active),
        }
    }

    pub fn bind(&mut self, output: FeedbackHandle<T>, owner: NodeId) {
        self.binding.bind(output, owner);
    }

    pub fn unbind(&mut self, owner: NodeId) {
        self.binding.unbind(owner);
    }

    pub fn is_valid(&self) -> bool {
        self.binding.is_valid()
    }

    pub fn modified(&self, now: EngineTime) -> bool {
        self.binding.modified(now)
    }

    pub fn set(&self, value: T, time: EngineTime) {
        if let Some(t) = self.binding.target() {
            t.borrow_mut().set(value, time);
        }
    }
}

impl<T: Clone> Feedback<T> {
    pub fn prev(&self, now: EngineTime) -> Option<T> {
        self.binding.target().map(|t| t.borrow_mut().prev(now))
    }
}

/// A wiring-time placeholder for a forward reference (§4.6). The real
/// port is substituted once, later in the same build, via `bind`;
/// `resolve` is called by `instantiate` to turn an unresolved
/// placeholder into a `WiringError` before the engine ever starts.
pub struct DelayedBinding<T> {
    label: &'static str,
    resolved: Option<T>,
}

impl<T> DelayedBinding<T> {
    pub fn new(label: &'static str) -> Self {
        Self { label, resolved: None }
    }

    /// Substitute the real port. Panics on a double-bind — that is a
    /// build-script bug, not a runtime condition, so it is not worth
    /// threading a `Result` through every wiring call site for.
    pub fn bind(&mut self, port: T) {
        assert!(self.resolved.is_none(), "delayed binding '{}' already resolved", self.label);
        self.resolved = Some(port);
    }

    pub fn resolve(self) -> Result<T, EngineError> {
        self.resolved.ok_or_else(|| {
            EngineError::wiring(
                NodePath::leaf(self.label),
                format!("delayed binding '{}' was never bound before instantiate", self.label),
            )
        })
    }
}
