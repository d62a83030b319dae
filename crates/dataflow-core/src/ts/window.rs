//! `TSW<T>`: a count- or duration-based window (§3). Exposes `value`
//! (a chronological buffer view), `removed_value` (the last evicted
//! element), and only becomes valid once it holds at least `min_size`
//! elements.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use dataflow_common::{EngineDuration, EngineTime};

use crate::node::NodeId;
use crate::ts::output::{Binding, OutputCore, Ticked};

#[derive(Debug, Clone, Copy)]
pub enum WindowSize {
    Count(usize),
    Duration(EngineDuration),
}

pub struct TswOutput<T> {
    core: OutputCore,
    buffer: VecDeque<(EngineTime, T)>,
    size: WindowSize,
    min_size: usize,
    removed_value: Option<T>,
}

impl<T> Ticked for TswOutput<T> {
    fn core(&self) -> &OutputCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut OutputCore {
        &mut self.core
    }
}

impl<T> TswOutput<T> {
    pub fn new(size: WindowSize, min_size: usize) -> Self {
        Self {
            core: OutputCore::new(),
            buffer: VecDeque::new(),
            size,
            min_size,
            removed_value: None,
        }
    }

    pub fn push(&mut self, value: T, time: EngineTime) {
        self.buffer.push_back((time, value));
        self.evict(time);
        if self.buffer.len() >= self.min_size {
            self.core.mark_ticked(time);
        }
    }

    fn evict(&mut self, now: EngineTime) {
        match self.size {
            WindowSize::Count(n) => {
                while self.buffer.len() > n {
                    self.removed_value = self.buffer.pop_front().map(|(_, v)| v);
                }
            }
            WindowSize::Duration(d) => {
                while let Some(&(t, _)) = self.buffer.front() {
                    if now - t > d && self.buffer.len() > 1 {
                        self.removed_value = self.buffer.pop_front().map(|(_, v)| v);
                    } else {
                        break;
                    }
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Chronological buffer contents, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = (EngineTime, &T)> {
        self.buffer.iter().map(|(t, v)| (*t, v))
    }
}

impl<T: Clone> TswOutput<T> {
    pub fn values(&self) -> Vec<T> {
        self.buffer.iter().map(|(_, v)| v.clone()).collect()
    }

    pub fn removed_value(&self) -> Option<T> {
        self.removed_value.clone()
    }
}

pub type TswHandle<T> = Rc<RefCell<TswOutput<T>>>;

pub fn new_tsw_handle<T>(size: WindowSize, min_size: usize) -> TswHandle<T> {
    Rc::new(RefCell::new(TswOutput::new(size, min_size)))
}

pub struct TSW<T> {
    binding: Binding<TswOutput<T>>,
}

impl<T> Default for TSW<T> {
    fn default() -> Self {
        Self {
            binding: Binding::default(),
        }
    }
}

impl<T> TSW<T> {
    pub fn new(active: bool) -> Self {
        Self {
            binding: Binding::new(active),
        }
    }

    pub fn bind(&mut self, output: TswHandle<T>, owner: NodeId) {
        self.binding.bind(output, owner);
    }

    pub fn unbind(&mut self, owner: NodeId) {
        self.binding.unbind(owner);
    }

    /// Valid once the window holds `min_size` elements (§3 MinSize).
    pub fn is_valid(&self) -> bool {
        self.binding.is_valid()
    }

    pub fn modified(&self, now: EngineTime) -> bool {
        self.binding.modified(now)
    }
}

impl<T: Clone> TSW<T> {
    pub fn value(&self) -> Vec<T> {
        self.binding
            .target()
            .map(|t| t.borrow().values())
            .unwrap_or_default()
    }

    pub fn removed_value(&self) -> Option<T> {
        self.binding.target().and_then(|t| t.borrow().removed_value())
    }
}
