//! The generic producer/consumer primitives every time-series container
//! is built from (§3: `TimeSeriesOutput<V>` / `TimeSeriesInput<V>`).
//!
//! Containers differ in what "value" means (a scalar, a set, a window…)
//! but share the same bookkeeping: a last-modified time, a validity
//! flag, and an observer list the engine notifies. That shared part
//! lives here as `OutputCore`; each container wraps it with its own
//! value representation and delta semantics (see `ts::scalar`,
//! `ts::set`, …).

use std::cell::RefCell;
use std::rc::Rc;

use dataflow_common::{EngineTime, MIN_DT};

use crate::node::NodeId;

/// Implemented by every consumer-side container (`TS`, `TSS`, `TSD`,
/// `TSW`, `TSL`, `TSB`) so that a node's `ready_for_eval`/`ready_for_first_eval`
/// gates and a bundle's aggregate `modified`/`is_valid` can be written
/// generically instead of per container type. `#[derive(Bundle)]` in
/// `dataflow-macros` relies on every field implementing this.
pub trait TimeSeriesInput {
    fn modified(&self, now: EngineTime) -> bool;
    fn is_valid(&self) -> bool;
}

/// Bookkeeping shared by every output regardless of value shape.
#[derive(Debug, Default)]
pub struct OutputCore {
    last_modified_time: EngineTime,
    valid: bool,
    observers: Vec<NodeId>,
}

impl OutputCore {
    pub fn new() -> Self {
        Self {
            last_modified_time: MIN_DT,
            valid: false,
            observers: Vec::new(),
        }
    }

    pub fn last_modified_time(&self) -> EngineTime {
        self.last_modified_time
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// §3 invariant: once `valid=true` it remains so until explicit
    /// `invalidate()`.
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    /// Record a tick at `time`. Idempotent within a cycle: calling this
    /// twice at the same time is a no-op on the modified-time, satisfying
    /// "notifying observers is idempotent within a cycle".
    pub fn mark_ticked(&mut self, time: EngineTime) {
        self.last_modified_time = time;
        self.valid = true;
    }

    pub fn modified_at(&self, time: EngineTime) -> bool {
        self.valid && self.last_modified_time == time
    }

    pub fn observers(&self) -> &[NodeId] {
        &self.observers
    }

    pub fn add_observer(&mut self, node: NodeId) {
        if !self.observers.contains(&node) {
            self.observers.push(node);
        }
    }

    pub fn remove_observer(&mut self, node: NodeId) {
        self.observers.retain(|&n| n != node);
    }
}

/// A scalar-valued output: `OutputCore` plus the value itself. Used
/// directly by `TS<T>` and as the backing store for containers whose
/// "whole value" is itself a simple owned type (`TSS`'s set, `TSW`'s
/// buffer).
#[derive(Debug)]
pub struct Output<V> {
    core: OutputCore,
    value: V,
}

impl<V> Output<V> {
    pub fn new(initial: V) -> Self {
        Self {
            core: OutputCore::new(),
            value: initial,
        }
    }

    pub fn core(&self) -> &OutputCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut OutputCore {
        &mut self.core
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut V {
        &mut self.value
    }

    /// Overwrite the value and mark it ticked at `time`.
    pub fn set(&mut self, value: V, time: EngineTime) {
        self.value = value;
        self.core.mark_ticked(time);
    }
}

/// Implemented by every container's output-side representation so that
/// binding/notification bookkeeping (`Binding<C>` below) can be written
/// once and reused by `TSS`, `TSD`, `TSW`, `TSL` and `TSB`, each of which
/// has a different value shape but identical observer semantics.
pub trait Ticked {
    fn core(&self) -> &OutputCore;
    fn core_mut(&mut self) -> &mut OutputCore;
}

impl<V> Ticked for Output<V> {
    fn core(&self) -> &OutputCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut OutputCore {
        &mut self.core
    }
}

/// Shared-ownership handle to an output, the unit inputs bind to.
pub type OutputHandle<V> = Rc<RefCell<Output<V>>>;

/// Generic bind/unbind/modified bookkeeping for a consumer observing a
/// `Ticked` producer, independent of the producer's value shape. `TS`
/// implements the same behavior directly via `Input<V>`; the compound
/// containers build on this instead so the bookkeeping isn't
/// re-implemented per variant.
pub struct Binding<C: Ticked> {
    bound: Option<Rc<RefCell<C>>>,
    active: bool,
}

impl<C: Ticked> Default for Binding<C> {
    fn default() -> Self {
        Self {
            bound: None,
            active: true,
        }
    }
}

impl<C: Ticked> Binding<C> {
    pub fn new(active: bool) -> Self {
        Self {
            bound: None,
            active,
        }
    }

    pub fn bind(&mut self, target: Rc<RefCell<C>>, owner: NodeId) {
        if self.active {
            target.borrow_mut().core_mut().add_observer(owner);
        }
        self.bound = Some(target);
    }

    pub fn unbind(&mut self, owner: NodeId) {
        if let Some(target) = self.bound.take() {
            target.borrow_mut().core_mut().remove_observer(owner);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    pub fn target(&self) -> Option<&Rc<RefCell<C>>> {
        self.bound.as_ref()
    }

    pub fn is_valid(&self) -> bool {
        self.bound.as_ref().is_some_and(|t| t.borrow().core().is_valid())
    }

    pub fn modified(&self, now: EngineTime) -> bool {
        self.active
            && self
                .bound
                .as_ref()
                .is_some_and(|t| t.borrow().core().modified_at(now))
    }
}

pub fn new_output_handle<V>(initial: V) -> OutputHandle<V> {
    Rc::new(RefCell::new(Output::new(initial)))
}

/// The consumer side: an optional bound output, an activity flag, and
/// the last time this input was sampled (used by lazily-sampled/passive
/// inputs that only read `value()` without ever observing `modified`).
pub struct Input<V> {
    bound: Option<OutputHandle<V>>,
    active: bool,
    sampled_time: EngineTime,
}

impl<V> Default for Input<V> {
    fn default() -> Self {
        Self {
            bound: None,
            active: true,
            sampled_time: MIN_DT,
        }
    }
}

impl<V> Input<V> {
    pub fn new(active: bool) -> Self {
        Self {
            bound: None,
            active,
            sampled_time: MIN_DT,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    pub fn bound(&self) -> Option<&OutputHandle<V>> {
        self.bound.as_ref()
    }

    /// Bind to `output`. If `active`, registers `owner` as an observer
    /// so the engine schedules it whenever `output` ticks.
    pub fn bind(&mut self, output: OutputHandle<V>, owner: NodeId) {
        if self.active {
            output.borrow_mut().core_mut().add_observer(owner);
        }
        self.bound = Some(output);
    }

    /// Un-bind, removing the observer registration if it was active.
    /// Per §3 ownership rules this is always called before the
    /// producing node is released.
    pub fn unbind(&mut self, owner: NodeId) {
        if let Some(output) = self.bound.take() {
            output.borrow_mut().core_mut().remove_observer(owner);
        }
    }

    pub fn is_valid(&self) -> bool {
        self.bound
            .as_ref()
            .is_some_and(|o| o.borrow().core().is_valid())
    }

    pub fn modified(&self, now: EngineTime) -> bool {
        self.active
            && self
                .bound
                .as_ref()
                .is_some_and(|o| o.borrow().core().modified_at(now))
    }

    pub fn last_modified_time(&self) -> EngineTime {
        self.bound
            .as_ref()
            .map(|o| o.borrow().core().last_modified_time())
            .unwrap_or(MIN_DT)
    }
}

impl<V: Clone> Input<V> {
    /// Full current value, sampling the bound output.
    pub fn value(&self) -> Option<V> {
        self.bound.as_ref().map(|o| o.borrow().value().clone())
    }

    /// Scalar delta semantics: `delta_value == value` (§3). Compound
    /// containers with richer delta shapes provide their own
    /// `delta_value` instead of relying on this.
    pub fn delta_value(&self, now: EngineTime) -> Option<V> {
        if self.modified(now) {
            self.value()
        } else {
            None
        }
    }

    pub fn sample(&mut self, now: EngineTime) -> Option<V> {
        self.sampled_time = now;
        self.value()
    }

    pub fn sampled_time(&self) -> EngineTime {
        self.sampled_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_delta_equals_value_on_tick() {
        let out = new_output_handle(0i64);
        let mut input: Input<i64> = Input::new(true);
        input.bind(out.clone(), NodeId::new(1));
        out.borrow_mut().set(42, EngineTime::from_micros(5));
        assert!(input.modified(EngineTime::from_micros(5)));
        assert_eq!(input.delta_value(EngineTime::from_micros(5)), Some(42));
        assert_eq!(input.value(), Some(42));
        assert!(!input.modified(EngineTime::from_micros(6)));
    }

    #[test]
    fn unbind_removes_observer_registration() {
        let out = new_output_handle(0i64);
        let owner = NodeId::new(3);
        let mut input: Input<i64> = Input::new(true);
        input.bind(out.clone(), owner);
        assert_eq!(out.borrow().core().observers(), &[owner]);
        input.unbind(owner);
        assert!(out.borrow().core().observers().is_empty());
    }

    #[test]
    fn passive_input_never_reports_modified() {
        let out = new_output_handle(0i64);
        let mut input: Input<i64> = Input::new(false);
        input.bind(out.clone(), NodeId::new(1));
        out.borrow_mut().set(7, EngineTime::from_micros(1));
        assert!(!input.modified(EngineTime::from_micros(1)));
        assert_eq!(input.value(), Some(7));
    }
}
