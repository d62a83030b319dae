//! The per-graph scheduler (§4.2): a min-heap keyed by `(time, node)`
//! plus an authoritative table of pending entries so that re-scheduling,
//! named slots, and un-scheduling are all idempotent.
//!
//! The heap itself is allowed to carry stale entries (a node rescheduled
//! to a later time, or unscheduled) — `pop_due` cross-checks every
//! popped entry against the authoritative table and silently drops
//! ghosts. This is the standard "lazy deletion" pattern for a
//! decrease-key-less binary heap.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use rustc_hash::FxHashMap;

use dataflow_common::EngineTime;

use crate::node::NodeId;

/// A label identifying one of a node's named scheduling slots.
pub type Label = &'static str;

#[derive(Debug, Default)]
struct NodeEntries {
    /// The unlabeled slot: at most one pending time, "earliest wins" on
    /// repeated `schedule` calls for the same node.
    unlabeled: Option<EngineTime>,
    labeled: FxHashMap<Label, EngineTime>,
}

impl NodeEntries {
    fn earliest(&self) -> Option<EngineTime> {
        self.labeled
            .values()
            .copied()
            .chain(self.unlabeled)
            .min()
    }

    fn is_empty(&self) -> bool {
        self.unlabeled.is_none() && self.labeled.is_empty()
    }

    /// Remove every sub-entry due at or before `current_time`. Returns
    /// whether anything was removed (i.e. the node is due).
    fn drain_due(&mut self, current_time: EngineTime) -> bool {
        let mut any = false;
        if let Some(t) = self.unlabeled {
            if t <= current_time {
                self.unlabeled = None;
                any = true;
            }
        }
        self.labeled.retain(|_, t| {
            if *t <= current_time {
                any = true;
                false
            } else {
                true
            }
        });
        any
    }
}

#[derive(Debug, Default)]
pub struct Scheduler {
    heap: BinaryHeap<Reverse<(EngineTime, NodeId)>>,
    entries: FxHashMap<NodeId, NodeEntries>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent for the same node: repeated calls keep the earliest
    /// requested time.
    pub fn schedule(&mut self, node: NodeId, time: EngineTime) {
        let entry = self.entries.entry(node).or_default();
        entry.unlabeled = Some(match entry.unlabeled {
            Some(existing) => existing.min(time),
            None => time,
        });
        self.heap.push(Reverse((time, node)));
    }

    /// Named slot: re-scheduling with the same label replaces the prior
    /// entry for that label rather than taking the min.
    pub fn schedule_labeled(&mut self, node: NodeId, time: EngineTime, label: Label) {
        let entry = self.entries.entry(node).or_default();
        entry.labeled.insert(label, time);
        self.heap.push(Reverse((time, node)));
    }

    pub fn unschedule(&mut self, node: NodeId, label: Label) {
        if let Some(entry) = self.entries.get_mut(&node) {
            entry.labeled.remove(label);
            if entry.is_empty() {
                self.entries.remove(&node);
            }
        }
    }

    /// Remove every pending entry for `node` (used when a node is torn
    /// down, e.g. a `map_` body instance on key removal).
    pub fn unschedule_all(&mut self, node: NodeId) {
        self.entries.remove(&node);
    }

    /// The earliest time any node is currently scheduled at, or `None`
    /// if nothing is pending.
    pub fn peek_next_time(&self) -> Option<EngineTime> {
        self.entries.values().filter_map(|e| e.earliest()).min()
    }

    /// Pop every node due at or before `current_time`, in ascending
    /// node-index order (§4.2 tie-break), clearing their due entries.
    pub fn pop_due(&mut self, current_time: EngineTime) -> Vec<NodeId> {
        let mut due = Vec::new();
        let mut visited = rustc_hash::FxHashSet::default();

        while let Some(&Reverse((t, node))) = self.heap.peek() {
            if t > current_time {
                break;
            }
            self.heap.pop();
            if visited.contains(&node) {
                continue;
            }
            let Some(entry) = self.entries.get_mut(&node) else {
                continue;
            };
            if entry.drain_due(current_time) {
                visited.insert(node);
                due.push(node);
            }
            if entry.is_empty() {
                self.entries.remove(&node);
            }
        }

        due.sort_unstable();
        due
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(i: u32) -> NodeId {
        NodeId::new(i)
    }

    #[test]
    fn earliest_wins_for_unlabeled_reschedule() {
        let mut s = Scheduler::new();
        s.schedule(n(0), EngineTime::from_micros(100));
        s.schedule(n(0), EngineTime::from_micros(50));
        assert_eq!(s.peek_next_time(), Some(EngineTime::from_micros(50)));
        let due = s.pop_due(EngineTime::from_micros(50));
        assert_eq!(due, vec![n(0)]);
        assert!(s.is_empty());
    }

    #[test]
    fn labeled_reschedule_replaces_prior() {
        let mut s = Scheduler::new();
        s.schedule_labeled(n(1), EngineTime::from_micros(100), "timeout");
        s.schedule_labeled(n(1), EngineTime::from_micros(200), "timeout");
        let due = s.pop_due(EngineTime::from_micros(100));
        assert!(due.is_empty(), "stale 100 entry must not fire");
        let due = s.pop_due(EngineTime::from_micros(200));
        assert_eq!(due, vec![n(1)]);
    }

    #[test]
    fn unschedule_removes_named_slot() {
        let mut s = Scheduler::new();
        s.schedule_labeled(n(2), EngineTime::from_micros(10), "poll");
        s.unschedule(n(2), "poll");
        let due = s.pop_due(EngineTime::from_micros(10));
        assert!(due.is_empty());
    }

    #[test]
    fn pop_due_orders_by_ascending_node_index() {
        let mut s = Scheduler::new();
        s.schedule(n(5), EngineTime::from_micros(0));
        s.schedule(n(1), EngineTime::from_micros(0));
        s.schedule(n(3), EngineTime::from_micros(0));
        let due = s.pop_due(EngineTime::from_micros(0));
        assert_eq!(due, vec![n(1), n(3), n(5)]);
    }
}
