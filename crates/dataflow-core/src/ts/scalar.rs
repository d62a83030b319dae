//! `TS<T>`: the scalar time-series (§3). `delta_value == value` on every
//! tick; there is no richer delta shape to track, so this is a thin,
//! ergonomically-named wrapper over the generic `Output`/`Input`
//! primitives in `ts::output`.

use dataflow_common::EngineTime;

use crate::node::NodeId;
use crate::ts::output::{new_output_handle, Input, Output, OutputHandle, TimeSeriesInput};

/// The producer side of a scalar time-series.
pub struct TsOutput<T> {
    inner: OutputHandle<T>,
}

impl<T> TsOutput<T> {
    pub fn new(initial: T) -> Self {
        Self {
            inner: new_output_handle(initial),
        }
    }

    pub fn handle(&self) -> OutputHandle<T> {
        self.inner.clone()
    }

    pub fn set(&self, value: T, time: EngineTime) {
        self.inner.borrow_mut().set(value, time);
    }

    pub fn last_modified_time(&self) -> EngineTime {
        self.inner.borrow().core().last_modified_time()
    }
}

impl<T: Clone> TsOutput<T> {
    pub fn value(&self) -> T {
        self.inner.borrow().value().clone()
    }
}

/// The consumer side of a scalar time-series.
pub struct TS<T> {
    input: Input<T>,
}

impl<T> Default for TS<T> {
    fn default() -> Self {
        Self {
            input: Input::default(),
        }
    }
}

impl<T> TS<T> {
    pub fn new(active: bool) -> Self {
        Self {
            input: Input::new(active),
        }
    }

    pub fn bind(&mut self, output: &TsOutput<T>, owner: NodeId) {
        self.input.bind(output.handle(), owner);
    }

    pub fn bind_handle(&mut self, output: OutputHandle<T>, owner: NodeId) {
        self.input.bind(output, owner);
    }

    pub fn unbind(&mut self, owner: NodeId) {
        self.input.unbind(owner);
    }

    pub fn is_bound(&self) -> bool {
        self.input.is_bound()
    }

    pub fn is_valid(&self) -> bool {
        self.input.is_valid()
    }

    pub fn modified(&self, now: EngineTime) -> bool {
        self.input.modified(now)
    }
}

impl<T: Clone> TS<T> {
    pub fn value(&self) -> Option<T> {
        self.input.value()
    }

    pub fn delta_value(&self, now: EngineTime) -> Option<T> {
        self.input.delta_value(now)
    }
}

impl<T> TimeSeriesInput for TS<T> {
    fn modified(&self, now: EngineTime) -> bool {
        self.input.modified(now)
    }

    fn is_valid(&self) -> bool {
        self.input.is_valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_add_scenario() {
        // §8 scenario 1: c1=const(1), c2=const(2), out=c1+c2.
        let c1 = TsOutput::new(1i64);
        let c2 = TsOutput::new(2i64);
        c1.set(1, EngineTime::from_micros(0));
        c2.set(2, EngineTime::from_micros(0));

        let mut in1: TS<i64> = TS::new(true);
        let mut in2: TS<i64> = TS::new(true);
        in1.bind(&c1, NodeId::new(2));
        in2.bind(&c2, NodeId::new(2));

        let out = in1.value().unwrap() + in2.value().unwrap();
        assert_eq!(out, 3);
        assert!(in1.modified(EngineTime::from_micros(0)));
        assert!(!in1.modified(EngineTime::from_micros(1)));
    }
}
