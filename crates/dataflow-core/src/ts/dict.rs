//! `TSD<K, V>`: a dynamic dict of time-series, keyed by scalar `K` (§3).
//!
//! Owns a child `TSS<K>` `key_set` output: adding/removing a key always
//! ticks the key set, and callers are expected to wire nodes that
//! observe `key_set` ahead of nodes that observe individual values so
//! that key-set observers fire first within a cycle (§4.5.1). `REMOVE`
//! on an absent key is an error; `REMOVE_IF_EXISTS` is silent. A key
//! cannot be re-added in the same cycle it was removed in (§8 boundary
//! behavior).

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use dataflow_common::{EngineError, EngineTime, NodePath};

use crate::node::NodeId;
use crate::ts::output::{new_output_handle, Binding, OutputCore, OutputHandle, Ticked};
use crate::ts::set::{new_tss_handle, TssHandle, TSS};

/// One entry in a `TSD`'s delta map.
#[derive(Debug, Clone)]
pub enum DictDelta<V> {
    Value(V),
    Remove,
}

/// How `remove` behaves when the key is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovePolicy {
    /// `REMOVE`: errors if the key does not exist.
    Strict,
    /// `REMOVE_IF_EXISTS`: silently accepted for an absent key.
    IfExists,
}

pub struct TsdOutput<K: std::hash::Hash + Eq + Clone, V> {
    core: OutputCore,
    children: FxHashMap<K, OutputHandle<V>>,
    key_set: TssHandle<K>,
    /// Keys removed in the cycle currently being written, to reject a
    /// same-cycle re-add.
    removed_this_cycle: std::collections::HashSet<K>,
    /// Keys added, modified, or removed in the cycle currently being
    /// written, used to build `delta_value`.
    touched_this_cycle: Vec<K>,
}

impl<K: std::hash::Hash + Eq + Clone, V> Ticked for TsdOutput<K, V> {
    fn core(&self) -> &OutputCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut OutputCore {
        &mut self.core
    }
}

impl<K: std::hash::Hash + Eq + Clone, V> Default for TsdOutput<K, V> {
    fn default() -> Self {
        Self {
            core: OutputCore::new(),
            children: FxHashMap::default(),
            key_set: new_tss_handle(),
            removed_this_cycle: Default::default(),
            touched_this_cycle: Vec::new(),
        }
    }
}

impl<K: std::hash::Hash + Eq + Clone, V> TsdOutput<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    fn begin_cycle_if_needed(&mut self, time: EngineTime) {
        if !self.core.modified_at(time) {
            self.removed_this_cycle.clear();
            self.touched_this_cycle.clear();
        }
    }

    pub fn key_set_handle(&self) -> TssHandle<K> {
        self.key_set.clone()
    }

    pub fn contains_key(&self, k: &K) -> bool {
        self.children.contains_key(k)
    }

    pub fn child(&self, k: &K) -> Option<OutputHandle<V>> {
        self.children.get(k).cloned()
    }

    pub fn keys(&self) -> Vec<K> {
        self.children.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Add a new key or overwrite an existing one's value.
    pub fn set(&mut self, k: K, value: V, time: EngineTime) -> Result<(), EngineError> {
        self.begin_cycle_if_needed(time);
        if self.removed_this_cycle.contains(&k) {
            return Err(EngineError::binding(
                NodePath::leaf("TSD"),
                time,
                "key re-added in the same cycle it was removed",
            ));
        }
        match self.children.get(&k) {
            Some(existing) => {
                existing.borrow_mut().set(value, time);
            }
            None => {
                self.children
                    .insert(k.clone(), new_output_handle_set(value, time));
                self.key_set.borrow_mut().add(k.clone(), time);
            }
        }
        self.touched_this_cycle.push(k);
        self.core.mark_ticked(time);
        Ok(())
    }

    pub fn remove(&mut self, k: &K, time: EngineTime, policy: RemovePolicy) -> Result<(), EngineError> {
        self.begin_cycle_if_needed(time);
        if !self.children.contains_key(k) {
            return match policy {
                RemovePolicy::IfExists => Ok(()),
                RemovePolicy::Strict => Err(EngineError::binding(
                    NodePath::leaf("TSD"),
                    time,
                    "REMOVE on a key that does not exist",
                )),
            };
        }
        self.children.remove(k);
        self.key_set.borrow_mut().remove(k, time);
        self.removed_this_cycle.insert(k.clone());
        self.touched_this_cycle.push(k.clone());
        self.core.mark_ticked(time);
        Ok(())
    }
}

impl<K: std::hash::Hash + Eq + Clone, V: Clone> TsdOutput<K, V> {
    pub fn value(&self) -> FxHashMap<K, V> {
        self.children
            .iter()
            .map(|(k, v)| (k.clone(), v.borrow().value().clone()))
            .collect()
    }

    pub fn get(&self, k: &K) -> Option<V> {
        self.children.get(k).map(|v| v.borrow().value().clone())
    }

    pub fn delta(&self) -> FxHashMap<K, DictDelta<V>> {
        self.touched_this_cycle
            .iter()
            .map(|k| {
                let delta = match self.children.get(k) {
                    Some(v) => DictDelta::Value(v.borrow().value().clone()),
                    None => DictDelta::Remove,
                };
                (k.clone(), delta)
            })
            .collect()
    }
}

fn new_output_handle_set<V>(value: V, time: EngineTime) -> OutputHandle<V> {
    let handle = new_output_handle(value);
    handle.borrow_mut().core_mut().mark_ticked(time);
    handle
}

pub type TsdHandle<K, V> = Rc<RefCell<TsdOutput<K, V>>>;

pub fn new_tsd_handle<K: std::hash::Hash + Eq + Clone, V>() -> TsdHandle<K, V> {
    Rc::new(RefCell::new(TsdOutput::new()))
}

pub struct TSD<K: std::hash::Hash + Eq + Clone, V> {
    binding: Binding<TsdOutput<K, V>>,
}

impl<K: std::hash::Hash + Eq + Clone, V> Default for TSD<K, V> {
    fn default() -> Self {
        Self {
            binding: Binding::default(),
        }
    }
}

impl<K: std::hash::Hash + Eq + Clone, V> TSD<K, V> {
    pub fn new(active: bool) -> Self {
        Self {
            binding: Binding::new(active),
        }
    }

    pub fn bind(&mut self, output: TsdHandle<K, V>, owner: NodeId) {
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

    pub fn keys(&self) -> Vec<K> {
        self.binding
            .target()
            .map(|t| t.borrow().keys())
            .unwrap_or_default()
    }

    pub fn child(&self, k: &K) -> Option<OutputHandle<V>> {
        self.binding.target().and_then(|t| t.borrow().child(k))
    }

    /// A `TSS<K>` view bound to this TSD's key set, used to wire a
    /// `map_`'s `keys` driver.
    pub fn key_set(&self, owner: NodeId) -> TSS<K> {
        let mut ts = TSS::new(true);
        if let Some(t) = self.binding.target() {
            ts.bind(t.borrow().key_set_handle(), owner);
        }
        ts
    }
}

impl<K: std::hash::Hash + Eq + Clone, V: Clone> TSD<K, V> {
    pub fn value(&self) -> FxHashMap<K, V> {
        self.binding
            .target()
            .map(|t| t.borrow().value())
            .unwrap_or_default()
    }

    pub fn get(&self, k: &K) -> Option<V> {
        self.binding.target().and_then(|t| t.borrow().get(k))
    }

    pub fn delta_value(&self, now: EngineTime) -> Option<FxHashMap<K, DictDelta<V>>> {
        if self.modified(now) {
            self.binding.target().map(|t| t.borrow().delta())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tsd_map_scaling_scenario() {
        // §8 scenario 3.
        let out = new_tsd_handle::<String, i64>();

        out.borrow_mut().set("a".into(), 1, EngineTime::from_micros(0)).unwrap();
        assert_eq!(out.borrow().get(&"a".to_string()), Some(1));

        out.borrow_mut().set("b".into(), 2, EngineTime::from_micros(1)).unwrap();
        assert_eq!(out.borrow().keys().len(), 2);

        out.borrow_mut()
            .remove(&"a".to_string(), EngineTime::from_micros(2), RemovePolicy::Strict)
            .unwrap();
        assert!(!out.borrow().contains_key(&"a".to_string()));
    }

    #[test]
    fn same_cycle_readd_after_remove_is_rejected() {
        let out = new_tsd_handle::<&'static str, i64>();
        out.borrow_mut().set("a", 1, EngineTime::from_micros(0)).unwrap();
        out.borrow_mut()
            .remove(&"a", EngineTime::from_micros(1), RemovePolicy::Strict)
            .unwrap();
        let err = out.borrow_mut().set("a", 2, EngineTime::from_micros(1));
        assert!(err.is_err());
        // A later cycle is fine.
        out.borrow_mut().set("a", 2, EngineTime::from_micros(2)).unwrap();
        assert_eq!(out.borrow().get(&"a"), Some(2));
    }

    #[test]
    fn remove_if_exists_is_silent_for_absent_key() {
        let out = new_tsd_handle::<&'static str, i64>();
        let r = out
            .borrow_mut()
            .remove(&"ghost", EngineTime::from_micros(0), RemovePolicy::IfExists);
        assert!(r.is_ok());
    }

    #[test]
    fn remove_errors_for_absent_key_when_strict() {
        let out = new_tsd_handle::<&'static str, i64>();
        let r = out
            .borrow_mut()
            .remove(&"ghost", EngineTime::from_micros(0), RemovePolicy::Strict);
        assert!(r.is_err());
    }

    #[test]
    fn key_set_matches_valid_keys_invariant() {
        // §8 universal invariant: D.key_set.value == {k | D[k].valid}.
        let out = new_tsd_handle::<i32, i32>();
        out.borrow_mut().set(1, 10, EngineTime::from_micros(0)).unwrap();
        out.borrow_mut().set(2, 20, EngineTime::from_micros(0)).unwrap();
        let key_set = out.borrow().key_set_handle();
        let keys: std::collections::HashSet<i32> = key_set.borrow().value().iter().copied().collect();
        let valid: std::collections::HashSet<i32> = out.borrow().keys().into_iter().collect();
        assert_eq!(keys, valid);
    }
}
