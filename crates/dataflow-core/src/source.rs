//! External input sources (§4.3, §6): the two flavors of source node.
//!
//! **Push.** An adaptor's own thread calls `PushSender::send(value)`
//! from anywhere; the engine drains the shared queue at the top of
//! every real-time cycle and turns queued values into output ticks
//! (§5: "producer threads never touch graph state directly"). Disallowed
//! in simulation mode — there is no wall-clock thread to produce from.
//!
//! **Pull.** A generator advances on the engine's own schedule: it
//! yields `(EngineTime, V)` pairs and the engine arranges for the next
//! one to fire by scheduling the owning node at the advertised time
//! (§9: "coroutine generators... map to an iterator trait").

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use dataflow_common::EngineTime;

use crate::node::{EvalContext, NodeBehavior, NodeFlags, NodeId};
use crate::ts::output::OutputHandle;

/// Shared wake signal: push producers ring it; the real-time engine
/// loop waits on it instead of polling (§5 suspension points).
#[derive(Default)]
pub struct Doorbell {
    rung: Mutex<bool>,
    condvar: Condvar,
}

impl Doorbell {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn ring(&self) {
        let mut rung = self.rung.lock().unwrap();
        *rung = true;
        self.condvar.notify_all();
    }

    /// Block until rung, or `deadline` passes, or a spurious wake;
    /// returns whether the bell was rung. Used by `EvaluationEngine`'s
    /// real-time wait step; a `None` deadline blocks indefinitely.
    pub fn wait_until(&self, deadline: Option<Instant>) -> bool {
        let rung = self.rung.lock().unwrap();
        let (mut rung, _) = match deadline {
            Some(d) => {
                let timeout = d.saturating_duration_since(Instant::now());
                self.condvar.wait_timeout(rung, timeout).unwrap()
            }
            None => (self.condvar.wait(rung).unwrap(), ()),
        };
        let was_rung = *rung;
        *rung = false;
        was_rung
    }
}

/// The adaptor-facing handle returned by `register_push_source`. `Send
/// + Sync`: safe to hand to any producer thread (§6).
pub struct PushSender<V> {
    queue: Arc<Mutex<VecDeque<V>>>,
    doorbell: Arc<Doorbell>,
}

impl<V> Clone for PushSender<V> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            doorbell: self.doorbell.clone(),
        }
    }
}

impl<V: Send> PushSender<V> {
    /// Enqueue a value. Never blocks the producer thread; the queue is
    /// an unbounded `VecDeque` behind a short-held mutex (§5: the core
    /// does not interpret overflow — a bounded variant belongs to a
    /// collaborator adaptor that wants a `ResourceError`).
    pub fn send(&self, value: V) {
        self.queue.lock().unwrap().push_back(value);
        self.doorbell.ring();
    }
}

/// The engine-facing half: a source node with no time-series inputs
/// whose output is fed by whatever accumulated in the shared queue.
pub struct PushSourceNode<V> {
    label: String,
    output: OutputHandle<V>,
    queue: Arc<Mutex<VecDeque<V>>>,
}

impl<V> PushSourceNode<V> {
    pub fn new(label: impl Into<String>, output: OutputHandle<V>, queue: Arc<Mutex<VecDeque<V>>>) -> Self {
        Self {
            label: label.into(),
            output,
            queue,
        }
    }

    /// Drain every value currently queued, writing each to the output
    /// in order and ticking it at `now`; the last value written wins
    /// (§3: a single `last_modified_time` per cycle). Returns whether
    /// anything was drained, so the caller knows to schedule this node.
    pub fn drain(&self, now: EngineTime) -> bool {
        let mut queue = self.queue.lock().unwrap();
        let mut any = false;
        while let Some(value) = queue.pop_front() {
            self.output.borrow_mut().set(value, now);
            any = true;
        }
        any
    }

    pub fn node_id_observers(&self, now: EngineTime) -> smallvec::SmallVec<[NodeId; 4]> {
        if self.output.borrow().core().modified_at(now) {
            self.output.borrow().core().observers().into()
        } else {
            smallvec::SmallVec::new()
        }
    }
}

impl<V: 'static> NodeBehavior for PushSourceNode<V> {
    fn label(&self) -> &str {
        &self.label
    }

    fn flags(&self) -> NodeFlags {
        NodeFlags::IS_SOURCE
    }

    fn eval(&mut self, _ctx: &mut EvalContext) -> Result<(), dataflow_common::EngineError> {
        // Values are written by `drain`, invoked by the engine before
        // this node is scheduled; eval itself has nothing left to do.
        Ok(())
    }

    fn ticked_observers(&self, now: EngineTime) -> smallvec::SmallVec<[NodeId; 4]> {
        self.node_id_observers(now)
    }
}

/// Construct a push source: the queue + doorbell wiring, a sender for
/// the adaptor thread, and the node the engine schedules from
/// `drain_push_sources` (§6 `register_push_source`).
pub fn push_source<V>(
    label: impl Into<String>,
    output: OutputHandle<V>,
    doorbell: Arc<Doorbell>,
) -> (PushSourceNode<V>, PushSender<V>) {
    let queue = Arc::new(Mutex::new(VecDeque::new()));
    (
        PushSourceNode::new(label, output, queue.clone()),
        PushSender { queue, doorbell },
    )
}

/// A pull-source generator (§9: the source's coroutine `yield (dt,
/// value)` becomes this trait). `next` returns the absolute
/// `EngineTime` the value should tick at, or `None` when exhausted.
pub trait PullGenerator<V> {
    fn next(&mut self) -> Option<(EngineTime, V)>;
}

/// Adapts a plain iterator of `(EngineTime, V)` pairs into a
/// `PullGenerator`, the common case when the sequence is known ahead of
/// time (tests, replay, fixed schedules).
pub struct IterGenerator<I> {
    iter: I,
}

impl<I> IterGenerator<I> {
    pub fn new(iter: I) -> Self {
        Self { iter }
    }
}

impl<V, I: Iterator<Item = (EngineTime, V)>> PullGenerator<V> for IterGenerator<I> {
    fn next(&mut self) -> Option<(EngineTime, V)> {
        self.iter.next()
    }
}

/// A source node whose output is driven entirely by a `PullGenerator`;
/// the engine never pushes into it, it pulls itself onto the schedule.
pub struct PullSourceNode<V> {
    label: String,
    output: OutputHandle<V>,
    generator: Box<dyn PullGenerator<V>>,
    pending: Option<(EngineTime, V)>,
}

impl<V> PullSourceNode<V> {
    pub fn new(label: impl Into<String>, output: OutputHandle<V>, generator: Box<dyn PullGenerator<V>>) -> Self {
        Self {
            label: label.into(),
            output,
            generator,
            pending: None,
        }
    }
}

impl<V: 'static> NodeBehavior for PullSourceNode<V> {
    fn label(&self) -> &str {
        &self.label
    }

    fn flags(&self) -> NodeFlags {
        NodeFlags::IS_SOURCE
    }

    fn start(&mut self, ctx: &mut EvalContext) -> Result<(), dataflow_common::EngineError> {
        if let Some((t, v)) = self.generator.next() {
            ctx.schedule_self(t);
            self.pending = Some((t, v));
        }
        Ok(())
    }

    fn eval(&mut self, ctx: &mut EvalContext) -> Result<(), dataflow_common::EngineError> {
        if let Some((t, v)) = self.pending.take() {
            debug_assert_eq!(t, ctx.evaluation_time(), "pull source fired ahead of its own schedule");
            self.output.borrow_mut().set(v, ctx.evaluation_time());
        }
        if let Some((t, v)) = self.generator.next() {
            ctx.schedule_self(t);
            self.pending = Some((t, v));
        }
        Ok(())
    }

    fn ticked_observers(&self, now: EngineTime) -> smallvec::SmallVec<[NodeId; 4]> {
        if self.output.borrow().core().modified_at(now) {
            self.output.borrow().core().observers().into()
        } else {
            smallvec::SmallVec::new()
        }
    }
}

/// A duration-based pacing helper for pull generators that want "every
/// `step`" semantics instead of hand-computing absolute times.
pub fn periodic<V: Clone>(start: EngineTime, step: dataflow_common::EngineDuration, values: Vec<V>) -> IterGenerator<std::vec::IntoIter<(EngineTime, V)>> {
    let mut t = start;
    let timed = values
        .into_iter()
        .map(|v| {
            let this_t = t;
            t += step;
            (this_t, v)
        })
        .collect::<Vec<_>>();
    IterGenerator::new(timed.into_iter())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ts::output::new_output_handle;

    #[test]
    fn push_source_drains_queued_values() {
        let doorbell = Doorbell::new();
        let out = new_output_handle(0i64);
        let (node, sender) = push_source("feed", out.clone(), doorbell);
        sender.send(1);
        sender.send(2);
        assert!(node.drain(EngineTime::from_micros(5)));
        assert_eq!(*out.borrow().value(), 2);
        assert!(out.borrow().core().modified_at(EngineTime::from_micros(5)));
        assert!(!node.drain(EngineTime::from_micros(6)));
    }

    #[test]
    fn doorbell_wakes_on_send() {
        let doorbell = Doorbell::new();
        let out = new_output_handle(0i64);
        let (_node, sender) = push_source("feed", out, doorbell.clone());
        sender.send(7);
        assert!(doorbell.wait_until(Some(Instant::now() + Duration::from_millis(50))));
    }
}
