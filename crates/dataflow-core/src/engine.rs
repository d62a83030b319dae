//! The `EvaluationEngine` outer loop (§2, §6): pop the next scheduled
//! time, advance the clock, evaluate every node due at that time, and
//! repeat until nothing is left scheduled, the horizon is reached, or a
//! node cooperatively stops the run (§5, §9 — no exception unwinding
//! for control flow, a plain `EngineResult` instead).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use dataflow_common::{EngineError, EngineTime, MAX_DT};

use crate::clock::{ClockMode, EvaluationClock};
use crate::context::RuntimeContext;
use crate::graph::Graph;
use crate::node::NodeId;
use crate::source::Doorbell;
use crate::ts::output::OutputHandle;

/// What `evaluate_graph` returns on success (§6). An error case is a
/// separate `Result::Err(EngineError)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineResult {
    /// The run reached `end_time` (or ran out of scheduled work) with
    /// no node requesting a stop.
    Completed { last_evaluation_time: EngineTime },
    /// A node called `EvalContext::stop_engine` during the cycle at
    /// `at`; `reason` is whatever it passed.
    StopRequested { reason: String, at: EngineTime },
}

fn wall_clock_now() -> EngineTime {
    let micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before the Unix epoch")
        .as_micros() as i64;
    EngineTime::from_micros(micros)
}

fn instant_for(target: EngineTime, now: EngineTime) -> Instant {
    let delta = (target - now).as_micros().max(0) as u64;
    Instant::now() + Duration::from_micros(delta)
}

/// Drives exactly one `Graph` from `start_time` to `end_time`. Owns the
/// registry of push sources so `evaluate_graph` can drain them at the
/// top of every real-time cycle without the `Graph` itself knowing
/// anything about adaptors (§6: push-source registration is an engine
/// concern, not a graph one).
pub struct EvaluationEngine {
    runtime: RuntimeContext,
    doorbell: Arc<Doorbell>,
    push_sources: Vec<(NodeId, Box<dyn Fn(EngineTime) -> bool>)>,
}

impl EvaluationEngine {
    pub fn new(runtime: RuntimeContext) -> Self {
        Self {
            runtime,
            doorbell: Doorbell::new(),
            push_sources: Vec::new(),
        }
    }

    /// The doorbell producer threads ring; share it with every
    /// `PushSender` constructed for this engine's push sources.
    pub fn doorbell(&self) -> Arc<Doorbell> {
        self.doorbell.clone()
    }

    /// Register a push source's queue so `evaluate_graph` drains it at
    /// the top of every real-time cycle and schedules `node` when it
    /// yields anything (§6 `register_push_source`). Safe to call
    /// multiple times for independent sources feeding the same graph.
    pub fn register_push_source<V: 'static>(
        &mut self,
        node: NodeId,
        output: OutputHandle<V>,
        queue: Arc<Mutex<VecDeque<V>>>,
    ) {
        self.push_sources.push((
            node,
            Box::new(move |now: EngineTime| {
                let mut queue = queue.lock().unwrap();
                let mut any = false;
                while let Some(value) = queue.pop_front() {
                    output.borrow_mut().set(value, now);
                    any = true;
                }
                any
            }),
        ));
    }

    fn drain_push_sources(&self, now: EngineTime, graph: &mut Graph) -> bool {
        let mut any = false;
        for (node, drain) in &self.push_sources {
            if drain(now) {
                graph.schedule(*node, now);
                any = true;
            }
        }
        any
    }

    /// §6 `evaluate_graph`: runs `graph` from `start_time` to
    /// `end_time` inclusive. In `Simulation` mode the clock advances
    /// freely to whatever is next scheduled and push sources are
    /// disallowed (§4.1, §4.3); in `RealTime` mode the engine blocks
    /// until wall-clock time catches up, woken early by a push source
    /// ringing the doorbell.
    pub fn evaluate_graph(
        &self,
        graph: &mut Graph,
        start_time: EngineTime,
        end_time: EngineTime,
        mode: ClockMode,
    ) -> Result<EngineResult, EngineError> {
        if mode == ClockMode::Simulation && !self.push_sources.is_empty() {
            return Err(EngineError::wiring(
                dataflow_common::NodePath::leaf("engine"),
                "push sources are disallowed in simulation mode (§4.3)",
            ));
        }

        let mut clock = EvaluationClock::new(mode, start_time);
        graph.start_all(start_time, &self.runtime)?;

        let mut last_time = start_time;
        let result = loop {
            if mode == ClockMode::RealTime {
                let wall_now = wall_clock_now();
                clock.advance_wall_clock(wall_now);
                self.drain_push_sources(wall_now, graph);
            }

            let next = match graph.peek_next_time() {
                Some(t) => t,
                None => {
                    if mode == ClockMode::RealTime {
                        // Nothing scheduled; block until a push source
                        // rings or give up if none are registered.
                        if self.push_sources.is_empty() {
                            break EngineResult::Completed { last_evaluation_time: last_time };
                        }
                        self.doorbell.wait_until(None);
                        continue;
                    }
                    break EngineResult::Completed { last_evaluation_time: last_time };
                }
            };

            if next > end_time {
                break EngineResult::Completed { last_evaluation_time: last_time };
            }

            if mode == ClockMode::RealTime {
                let wall_now = wall_clock_now();
                if next > wall_now {
                    let deadline = instant_for(next, wall_now);
                    let rung = self.doorbell.wait_until(Some(deadline));
                    if rung {
                        // A push source may have produced something due
                        // sooner than `next`; re-evaluate from the top.
                        continue;
                    }
                }
            }

            clock.begin_cycle(next);
            last_time = next;
            let stop = graph.evaluate_cycle(next, &self.runtime).inspect_err(|err| {
                #[cfg(feature = "tracing")]
                tracing::error!(%err, at = %next, "node eval failed, unwinding the engine loop");
                let _ = err;
            })?;
            clock.reset_next_scheduled();
            if let Some(t) = graph.peek_next_time() {
                clock.note_scheduled(t);
            }

            if let Some(reason) = stop {
                #[cfg(feature = "tracing")]
                tracing::info!(%reason, at = %next, "engine stopped cooperatively");
                break EngineResult::StopRequested { reason, at: next };
            }
        };

        graph.stop_all(last_time, &self.runtime);
        Ok(result)
    }

    /// Run with no explicit horizon: equivalent to `end_time = MAX_DT`,
    /// i.e. until the schedule empties out or a node stops the engine.
    pub fn evaluate_graph_until_quiescent(
        &self,
        graph: &mut Graph,
        start_time: EngineTime,
        mode: ClockMode,
    ) -> Result<EngineResult, EngineError> {
        self.evaluate_graph(graph, start_time, MAX_DT, mode)
    }
}
