//! The time-series container type system (§3): the producer/consumer
//! primitives (`ts::output`) and one module per container variant.
//!
//! Every variant is both an `Output` side (owned by the producing node
//! or, for `TSD`'s children, by the dict itself) and an `Input` side
//! (bound by an observing node). The variants share the `OutputCore` /
//! `Binding` bookkeeping from `output.rs`; what differs per variant is
//! the shape of `value()` and `delta_value()` (§9: "trait for the
//! observer interface, tagged union for the value shape" — here that
//! tagged union is simply "one concrete Rust type per module").

pub mod bundle;
pub mod dict;
pub mod list;
pub mod output;
pub mod reference;
pub mod scalar;
pub mod set;
pub mod signal;
pub mod window;

pub use bundle::{BundleField, PeerBinding};
pub use dict::{new_tsd_handle, DictDelta, RemovePolicy, TsdHandle, TsdOutput, TSD};
pub use list::{new_tsl_handle, TslHandle, TslOutput, TSL};
pub use output::{new_output_handle, Binding, Input, Output, OutputCore, OutputHandle, Ticked, TimeSeriesInput};
pub use reference::{new_ref_handle, RefHandle, RefOutput, REF};
pub use scalar::{TsOutput, TS};
pub use set::{new_tss_handle, SetDelta, TssHandle, TssOutput, TSS};
pub use signal::Signal;
pub use window::{new_tsw_handle, TswHandle, TswOutput, WindowSize, TSW};
