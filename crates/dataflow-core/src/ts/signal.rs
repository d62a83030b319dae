//! `SIGNAL`: an input that only cares *that* something ticked, never
//! *what* it ticked to (§9 GLOSSARY doesn't name this one explicitly,
//! but §3's "each container is both Input and Output" family omits the
//! one case that drops the value entirely).
//!
//! Grounded on the source's `PythonTimeSeriesSignal`: "its value is
//! always True" — every concrete container already exposes
//! `modified`/`is_valid` through `TimeSeriesInput`, so a `Signal<I>` is
//! a zero-cost wrapper around any of them that only forwards those two
//! and never the value, for nodes that want to be woken by a tick
//! without caring about value equality/clone cost (a wide `TSB`'s
//! signal field, a "any key changed" driver next to a `TSD` a node
//! otherwise samples passively).

use dataflow_common::EngineTime;

use crate::ts::output::TimeSeriesInput;

/// Wraps any bound time-series input and exposes only whether it
/// ticked this cycle, never its value.
pub struct Signal<I> {
    inner: I,
}

impl<I> Signal<I> {
    pub fn new(inner: I) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> I {
        self.inner
    }

    pub fn inner(&self) -> &I {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut I {
        &mut self.inner
    }
}

impl<I: TimeSeriesInput> Signal<I> {
    pub fn modified(&self, now: EngineTime) -> bool {
        self.inner.modified(now)
    }

    pub fn is_valid(&self) -> bool {
        self.inner.is_valid()
    }

    /// Always `true` once bound and valid — the source's "value is
    /// always True" contract, kept as an explicit accessor rather than
    /// folded into `TimeSeriesInput` so a `Signal` is never mistaken
    /// for carrying real data in a generic context.
    pub fn value(&self) -> bool {
        self.inner.is_valid()
    }
}

impl<I: TimeSeriesInput> TimeSeriesInput for Signal<I> {
    fn modified(&self, now: EngineTime) -> bool {
        self.inner.modified(now)
    }

    fn is_valid(&self) -> bool {
        self.inner.is_valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeId;
    use crate::ts::output::new_output_handle;
    use crate::ts::scalar::TS;

    #[test]
    fn signal_forwards_tick_but_hides_value() {
        let out = new_output_handle("payload".to_string());
        let mut ts: TS<String> = TS::new(true);
        ts.bind_handle(out.clone(), NodeId::new(1));
        let signal = Signal::new(ts);

        assert!(!signal.modified(EngineTime::from_micros(0)));
        out.borrow_mut().set("ignored".to_string(), EngineTime::from_micros(3));
        assert!(signal.modified(EngineTime::from_micros(3)));
        assert!(signal.value());
    }

    #[test]
    fn signal_is_invalid_until_bound_output_ticks() {
        let ts: TS<i64> = TS::new(true);
        let signal = Signal::new(ts);
        assert!(!signal.is_valid());
        assert!(!signal.value());
    }
}
