//! `TSL<T, N>`: a fixed-length list of `N` time-series (§3). `modified`
//! holds iff any child modified this cycle; `delta_value` is a sparse
//! index→delta map rather than a dense `[Option<T>; N]` so that a large
//! `N` with few ticking children stays cheap (§4.5.2 relies on this for
//! the fixed-size map-over-list case).

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use dataflow_common::EngineTime;

use crate::node::NodeId;
use crate::ts::output::{new_output_handle, OutputCore, OutputHandle, Ticked};

pub struct TslOutput<T> {
    core: OutputCore,
    children: Vec<OutputHandle<T>>,
    touched_this_cycle: Vec<usize>,
}

impl<T> Ticked for TslOutput<T> {
    fn core(&self) -> &OutputCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut OutputCore {
        &mut self.core
    }
}

impl<T: Default> TslOutput<T> {
    /// Build a list of `n` children, each initialised with `T::default()`
    /// and never ticked until the first `set_at`.
    pub fn new(n: usize) -> Self {
        Self {
            core: OutputCore::new(),
            children: (0..n).map(|_| new_output_handle(T::default())).collect(),
            touched_this_cycle: Vec::new(),
        }
    }
}

impl<T> TslOutput<T> {
    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn child(&self, index: usize) -> OutputHandle<T> {
        self.children[index].clone()
    }

    fn begin_cycle_if_needed(&mut self, time: EngineTime) {
        if !self.core.modified_at(time) {
            self.touched_this_cycle.clear();
        }
    }

    pub fn set_at(&mut self, index: usize, value: T, time: EngineTime) {
        self.begin_cycle_if_needed(time);
        self.children[index].borrow_mut().set(value, time);
        self.touched_this_cycle.push(index);
        self.core.mark_ticked(time);
    }
}

impl<T: Clone> TslOutput<T> {
    pub fn value(&self) -> Vec<T> {
        self.children.iter().map(|c| c.borrow().value().clone()).collect()
    }

    pub fn delta(&self) -> FxHashMap<usize, T> {
        self.touched_this_cycle
            .iter()
            .map(|&i| (i, self.children[i].borrow().value().clone()))
            .collect()
    }
}

pub type TslHandle<T> = Rc<RefCell<TslOutput<T>>>;

pub fn new_tsl_handle<T: Default>(n: usize) -> TslHandle<T> {
    Rc::new(RefCell::new(TslOutput::new(n)))
}

pub struct TSL<T, const N: usize> {
    bound: Option<TslHandle<T>>,
    owner: Option<NodeId>,
    active: bool,
}

impl<T, const N: usize> Default for TSL<T, N> {
    fn default() -> Self {
        Self {
            bound: None,
            owner: None,
            active: true,
        }
    }
}

impl<T, const N: usize> TSL<T, N> {
    pub fn new(active: bool) -> Self {
        Self {
            bound: None,
            owner: None,
            active,
        }
    }

    pub fn bind(&mut self, output: TslHandle<T>, owner: NodeId) {
        if self.active {
            output.borrow_mut().core_mut().add_observer(owner);
        }
        self.bound = Some(output);
        self.owner = Some(owner);
    }

    pub fn unbind(&mut self) {
        if let (Some(bound), Some(owner)) = (self.bound.take(), self.owner.take()) {
            bound.borrow_mut().core_mut().remove_observer(owner);
        }
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

    /// The `i`-th child's output, for wiring a `map_`-over-`TSL` stub
    /// input directly to `TSL[i]` without going through the parent's
    /// `value()`/`delta_value()`.
    pub fn child(&self, i: usize) -> Option<OutputHandle<T>> {
        self.bound.as_ref().map(|t| t.borrow().child(i))
    }

    pub fn len(&self) -> usize {
        N
    }
}

impl<T: Clone, const N: usize> TSL<T, N> {
    pub fn value(&self) -> Option<[T; N]> {
        let handle = self.bound.as_ref()?;
        let v = handle.borrow().value();
        v.try_into().ok()
    }

    pub fn delta_value(&self, now: EngineTime) -> Option<FxHashMap<usize, T>> {
        if self.modified(now) {
            self.bound.as_ref().map(|t| t.borrow().delta())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_delta_only_contains_ticked_indices() {
        let handle = new_tsl_handle::<i64>(4);
        handle.borrow_mut().set_at(1, 10, EngineTime::from_micros(0));
        handle.borrow_mut().set_at(3, 30, EngineTime::from_micros(0));

        let mut input: TSL<i64, 4> = TSL::new(true);
        input.bind(handle.clone(), NodeId::new(9));

        assert!(input.modified(EngineTime::from_micros(0)));
        let delta = input.delta_value(EngineTime::from_micros(0)).unwrap();
        assert_eq!(delta.len(), 2);
        assert_eq!(delta.get(&1), Some(&10));
        assert_eq!(delta.get(&3), Some(&30));
    }

    #[test]
    fn modified_holds_iff_any_child_ticked() {
        let handle = new_tsl_handle::<i64>(2);
        let mut input: TSL<i64, 2> = TSL::new(true);
        input.bind(handle.clone(), NodeId::new(0));
        assert!(!input.modified(EngineTime::from_micros(0)));
        handle.borrow_mut().set_at(0, 1, EngineTime::from_micros(0));
        assert!(input.modified(EngineTime::from_micros(0)));
        assert!(!input.modified(EngineTime::from_micros(1)));
    }
}
