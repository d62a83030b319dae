//! `RuntimeContext`: the one thing the engine threads through its API
//! instead of reaching for process-wide state.
//!
//! The source's `GlobalState`/`DataCatalogue` singletons are collaborator
//! concerns (§9 design notes); the core itself must stay free of
//! ambient globals so that two engines can run in the same process
//! (tests commonly build dozens).

use std::sync::Arc;

/// Opaque, cheaply-clonable bag of engine-wide settings passed into
/// `instantiate` and visible to every node via `EvalContext::runtime`.
///
/// Collaborators (a catalogue, a metrics sink, a config resolver) attach
/// themselves by extending this struct or by stashing a handle the node
/// closures capture directly; the core places no requirements on it
/// beyond `Send + Sync` so it can be shared across a push-source's
/// producer thread.
#[derive(Clone)]
pub struct RuntimeContext {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
}

impl RuntimeContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner { name: name.into() }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }
}

impl Default for RuntimeContext {
    fn default() -> Self {
        Self::new("unnamed")
    }
}

impl std::fmt::Debug for RuntimeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeContext")
            .field("name", &self.inner.name)
            .finish()
    }
}
