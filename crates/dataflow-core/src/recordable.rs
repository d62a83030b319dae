//! Recordable state (§6 persisted-state layout): a time-series value
//! that is local to one node, never activates anything when written,
//! and can be explicitly snapshotted for an external collaborator to
//! persist.
//!
//! Grounded on the source's `RECORDABLE_STATE`: "similar to a feed-back,
//! but the feed-back is limited to the current node only. Additionally,
//! there is no activation of the node when the time-series values are
//! modified." `feedback.rs` already covers the graph-wide, activating
//! case (§4.6); this module is its node-local, non-activating sibling.
//! The core does not persist anything itself — `record` produces a
//! plain `StateRecord` and a `RecordSink` is the seam a collaborator
//! (a snapshot store, a replay log) attaches to, matching §9's rule
//! that the engine proper stays free of ambient globals.

use dataflow_common::{EngineTime, NodePath, MIN_DT};

/// A single node-local, non-activating value. Reading never triggers a
/// `ready_for_eval` check and writing never schedules an observer:
/// nothing outside the owning node is allowed to see this directly, so
/// there is nothing to notify.
pub struct RecordableState<V> {
    path: NodePath,
    value: V,
    last_set: EngineTime,
}

impl<V> RecordableState<V> {
    pub fn new(path: NodePath, initial: V) -> Self {
        Self {
            path,
            value: initial,
            last_set: MIN_DT,
        }
    }

    pub fn path(&self) -> &NodePath {
        &self.path
    }

    pub fn get(&self) -> &V {
        &self.value
    }

    pub fn get_mut(&mut self) -> &mut V {
        &mut self.value
    }

    /// Overwrite the value. Unlike `Output::set`, this does not mark
    /// anything "ticked" — there is no observer list to wake.
    pub fn set(&mut self, value: V, now: EngineTime) {
        self.value = value;
        self.last_set = now;
    }

    pub fn last_set(&self) -> EngineTime {
        self.last_set
    }
}

impl<V: Clone> RecordableState<V> {
    /// Snapshot the current value as a `(node_path, time, value)` tuple
    /// (§6) for a `RecordSink` to persist. `now` is the evaluation time
    /// the snapshot is taken at, which need not equal `last_set` — a
    /// node may choose to record on every eval rather than only on
    /// write.
    pub fn record(&self, now: EngineTime) -> StateRecord<V> {
        StateRecord {
            node_path: self.path.clone(),
            time: now,
            value: self.value.clone(),
        }
    }
}

/// One snapshot of a `RecordableState`, in the wire format §6
/// describes: the owning node's path, the time it was taken, and the
/// value itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateRecord<V> {
    pub node_path: NodePath,
    pub time: EngineTime,
    pub value: V,
}

/// The collaborator seam a `RecordableState` snapshot is handed to.
/// The core has no opinion on where records end up (a file, a
/// database, an in-memory ring buffer for a replay test) — it only
/// produces them.
pub trait RecordSink<V> {
    fn record(&mut self, record: StateRecord<V>);
}

/// A `RecordSink` that keeps every record in memory, for tests and
/// small examples that don't need a real persistence layer.
#[derive(Debug, Default)]
pub struct VecRecordSink<V> {
    records: Vec<StateRecord<V>>,
}

impl<V> VecRecordSink<V> {
    pub fn new() -> Self {
        Self { records: Vec::new() }
    }

    pub fn records(&self) -> &[StateRecord<V>] {
        &self.records
    }
}

impl<V> RecordSink<V> for VecRecordSink<V> {
    fn record(&mut self, record: StateRecord<V>) {
        self.records.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_never_advances_a_modified_flag_because_there_is_none() {
        let mut state = RecordableState::new(NodePath::leaf("n"), 0i64);
        state.set(5, EngineTime::from_micros(3));
        assert_eq!(*state.get(), 5);
        assert_eq!(state.last_set(), EngineTime::from_micros(3));
    }

    #[test]
    fn record_and_sink_round_trip() {
        let mut state = RecordableState::new(NodePath::leaf("acc"), 10i64);
        state.set(20, EngineTime::from_micros(1));

        let mut sink = VecRecordSink::new();
        sink.record(state.record(EngineTime::from_micros(1)));
        sink.record(state.record(EngineTime::from_micros(2)));

        assert_eq!(sink.records().len(), 2);
        assert_eq!(sink.records()[0].value, 20);
        assert_eq!(sink.records()[0].node_path, NodePath::leaf("acc"));
        assert_eq!(sink.records()[1].time, EngineTime::from_micros(2));
    }
}
