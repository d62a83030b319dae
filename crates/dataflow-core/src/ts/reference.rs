//! `REF<V>`: a first-class, rebindable pointer to an `Output<V>` (§3, §4.7).
//!
//! A `RefOutput` holds a stable identity but a swappable `target`. Its own
//! observer list is re-registered onto whichever output is current
//! whenever `rebind` runs, so downstream inputs bound to the `REF` see
//! both (a) ticks of the current target, forwarded directly because
//! they are registered as real observers of it, and (b) the rebind
//! itself, via `last_rebind_time` — the tiebreak the open question in
//! §9 asks for: a rebind always ticks the `REF` at the time of the
//! rebind, on top of whatever the new target's own modified-time says.

use std::cell::RefCell;
use std::rc::Rc;

use dataflow_common::{EngineTime, MIN_DT};

use crate::node::NodeId;
use crate::ts::output::{OutputHandle, Ticked};

pub struct RefOutput<V> {
    target: Option<OutputHandle<V>>,
    observers: Vec<NodeId>,
    last_rebind_time: EngineTime,
}

impl<V> Default for RefOutput<V> {
    fn default() -> Self {
        Self {
            target: None,
            observers: Vec::new(),
            last_rebind_time: MIN_DT,
        }
    }
}

impl<V> RefOutput<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(&self) -> Option<&OutputHandle<V>> {
        self.target.as_ref()
    }

    /// Point this REF at a new (or no) output, transferring every
    /// registered observer from the old target to the new one and
    /// ticking the REF at `time`.
    pub fn rebind(&mut self, new_target: Option<OutputHandle<V>>, time: EngineTime) {
        if let Some(old) = &self.target {
            let mut old = old.borrow_mut();
            for &obs in &self.observers {
                old.core_mut().remove_observer(obs);
            }
        }
        if let Some(new) = &new_target {
            let mut new = new.borrow_mut();
            for &obs in &self.observers {
                new.core_mut().add_observer(obs);
            }
        }
        self.target = new_target;
        self.last_rebind_time = time;
    }

    fn add_observer(&mut self, owner: NodeId) {
        if !self.observers.contains(&owner) {
            self.observers.push(owner);
        }
        if let Some(t) = &self.target {
            t.borrow_mut().core_mut().add_observer(owner);
        }
    }

    fn remove_observer(&mut self, owner: NodeId) {
        self.observers.retain(|&o| o != owner);
        if let Some(t) = &self.target {
            t.borrow_mut().core_mut().remove_observer(owner);
        }
    }

    pub fn is_valid(&self) -> bool {
        self.target.as_ref().is_some_and(|t| t.borrow().core().is_valid())
    }

    pub fn modified(&self, now: EngineTime) -> bool {
        self.last_rebind_time == now
            || self
                .target
                .as_ref()
                .is_some_and(|t| t.borrow().core().modified_at(now))
    }

    /// Nodes registered as observers of this REF, for a `switch_` node's
    /// `ticked_observers` to forward (§4.5.5: downstream of a REF never
    /// re-subscribes, but still needs to be scheduled on a rebind).
    pub fn observers(&self) -> &[NodeId] {
        &self.observers
    }
}

pub type RefHandle<V> = Rc<RefCell<RefOutput<V>>>;

pub fn new_ref_handle<V>() -> RefHandle<V> {
    Rc::new(RefCell::new(RefOutput::new()))
}

/// The consumer side: binds to a `RefHandle<V>` (not directly to the
/// target), so that rebinds transparently move the observation.
pub struct REF<V> {
    bound: Option<RefHandle<V>>,
    owner: Option<NodeId>,
    active: bool,
}

impl<V> Default for REF<V> {
    fn default() -> Self {
        Self {
            bound: None,
            owner: None,
            active: true,
        }
    }
}

impl<V> REF<V> {
    pub fn new(active: bool) -> Self {
        Self {
            bound: None,
            owner: None,
            active,
        }
    }

    pub fn bind(&mut self, ref_handle: RefHandle<V>, owner: NodeId) {
        if self.active {
            ref_handle.borrow_mut().add_observer(owner);
        }
        self.bound = Some(ref_handle);
        self.owner = Some(owner);
    }

    pub fn unbind(&mut self) {
        if let (Some(bound), Some(owner)) = (self.bound.take(), self.owner.take()) {
            if self.active {
                bound.borrow_mut().remove_observer(owner);
            }
        }
    }

    pub fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    pub fn is_valid(&self) -> bool {
        self.bound.as_ref().is_some_and(|b| b.borrow().is_valid())
    }

    pub fn modified(&self, now: EngineTime) -> bool {
        self.active && self.bound.as_ref().is_some_and(|b| b.borrow().modified(now))
    }

    /// The output currently pointed at, for a nested operator wiring a
    /// downstream stub directly to whatever the REF resolves to.
    pub fn target(&self) -> Option<OutputHandle<V>> {
        self.bound.as_ref().and_then(|b| b.borrow().target().cloned())
    }
}

impl<V: Clone> REF<V> {
    /// Dereference: the target's current value (§4.7).
    pub fn value(&self) -> Option<V> {
        self.target().map(|t| t.borrow().value().clone())
    }

    pub fn delta_value(&self, now: EngineTime) -> Option<V> {
        if self.modified(now) {
            self.value()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ts::output::new_output_handle;

    #[test]
    fn rebind_ticks_the_ref_even_if_target_didnt_tick_this_cycle() {
        let a = new_output_handle(1i64);
        a.borrow_mut().set(1, EngineTime::from_micros(0));
        let r = new_ref_handle::<i64>();
        r.borrow_mut().rebind(Some(a.clone()), EngineTime::from_micros(5));

        let mut input: REF<i64> = REF::new(true);
        input.bind(r.clone(), NodeId::new(1));
        assert!(input.modified(EngineTime::from_micros(5)));
        assert_eq!(input.value(), Some(1));
        assert!(!input.modified(EngineTime::from_micros(6)));
    }

    #[test]
    fn ref_forwards_target_ticks_after_rebind() {
        let a = new_output_handle(1i64);
        let r = new_ref_handle::<i64>();
        let mut input: REF<i64> = REF::new(true);
        input.bind(r.clone(), NodeId::new(7));
        r.borrow_mut().rebind(Some(a.clone()), EngineTime::from_micros(0));

        a.borrow_mut().set(42, EngineTime::from_micros(10));
        assert!(input.modified(EngineTime::from_micros(10)));
        assert_eq!(input.value(), Some(42));
    }

    #[test]
    fn bind_via_ref_matches_direct_binding_round_trip() {
        // §8 round-trip law: ref(output) then unbind == binding directly.
        let a = new_output_handle(7i64);
        a.borrow_mut().set(7, EngineTime::from_micros(0));

        let direct_owner = NodeId::new(2);
        let mut direct: crate::ts::output::Input<i64> = crate::ts::output::Input::new(true);
        direct.bind(a.clone(), direct_owner);

        let r = new_ref_handle::<i64>();
        r.borrow_mut().rebind(Some(a.clone()), EngineTime::from_micros(0));
        let mut via_ref: REF<i64> = REF::new(true);
        via_ref.bind(r.clone(), direct_owner);

        a.borrow_mut().set(9, EngineTime::from_micros(1));
        assert_eq!(direct.modified(EngineTime::from_micros(1)), via_ref.modified(EngineTime::from_micros(1)));
        assert_eq!(direct.value(), via_ref.value());

        via_ref.unbind();
        assert!(a.borrow().core().observers().contains(&direct_owner));
    }
}
