//! `TSB<Schema>`: a named bundle of time-series, fixed at compile time
//! (§3). A bundle's "schema" is an ordinary Rust struct whose fields are
//! themselves time-series containers (`TS<T>`, `TSS<K>`, …); there is no
//! type-erased bundle value here, in keeping with §9's "resolve generics
//! at wiring time" strategy — the schema is monomorphized, not looked up
//! at runtime.
//!
//! `#[derive(Bundle)]` (in `dataflow-macros`) implements the `Bundle`
//! trait below for such a struct: aggregate `modified`/`is_valid` across
//! every field, used by the node gating flags (`valid_inputs`,
//! `all_valid_inputs`) when a whole bundle is declared as one of them.
//!
//! **Peered vs non-peered** (§4.5/glossary) is a wiring-time decision,
//! not a different Rust type: a peered bundle's fields are all bound in
//! one `bind_peered` call sourced from a single producer's matching
//! fields; a non-peered bundle's fields are bound independently, one
//! `bind_field` call per field, possibly from different producers. Both
//! paths end up with the same per-field `Binding`/`Input` state — the
//! distinction is purely about *who issues the bind calls together*.

use dataflow_common::EngineTime;

use crate::ts::output::TimeSeriesInput;

/// Implemented (normally via `#[derive(Bundle)]`) by a fixed-schema
/// struct of time-series fields.
pub trait Bundle {
    /// Field names in declaration order, for error paths and for
    /// `bind_peered`'s mismatch checks.
    fn field_names(&self) -> &'static [&'static str];

    /// True iff any field modified this cycle.
    fn modified(&self, now: EngineTime) -> bool;

    /// True iff every field is valid (the `all_valid_inputs` gate, when
    /// the whole bundle is declared as one).
    fn is_valid(&self) -> bool;
}

/// Marker implemented by every concrete time-series field type so the
/// derive macro can fold `modified`/`is_valid` across a struct's fields
/// without hand-writing it per schema. Blanket-implemented for anything
/// that is already a `TimeSeriesInput`.
pub trait BundleField: TimeSeriesInput {}

impl<T: TimeSeriesInput + ?Sized> BundleField for T {}

/// Recorded at wiring time on a nested operator's stub input so that a
/// later rebind can be checked against the original binding mode
/// (§3: peered bundles rebind as a unit; non-peered fields rebind
/// independently and mixing the two on the same port is a `BindingError`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerBinding {
    Peered,
    NonPeered,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeId;
    use crate::ts::output::new_output_handle;
    use crate::ts::scalar::TS;
    use crate::ts::set::{new_tss_handle, TSS};

    /// A hand-expanded stand-in for what `#[derive(Bundle)]` generates,
    /// used here to exercise the aggregate semantics without requiring
    /// the proc-macro crate to run.
    struct Quote {
        bid: TS<f64>,
        tags: TSS<&'static str>,
    }

    impl Bundle for Quote {
        fn field_names(&self) -> &'static [&'static str] {
            &["bid", "tags"]
        }

        fn modified(&self, now: EngineTime) -> bool {
            self.bid.modified(now) || self.tags.modified(now)
        }

        fn is_valid(&self) -> bool {
            self.bid.is_valid() && self.tags.is_valid()
        }
    }

    #[test]
    fn aggregate_modified_is_any_field() {
        let bid_out = new_output_handle(0.0f64);
        let tags_out = new_tss_handle::<&'static str>();

        let mut bid = TS::new(true);
        bid.bind_handle(bid_out.clone(), NodeId::new(0));
        let mut tags = TSS::new(true);
        tags.bind(tags_out.clone(), NodeId::new(0));

        let quote = Quote { bid, tags };
        assert!(!quote.modified(EngineTime::from_micros(0)));

        bid_out.borrow_mut().set(1.5, EngineTime::from_micros(0));
        assert!(quote.modified(EngineTime::from_micros(0)));
        assert!(!quote.modified(EngineTime::from_micros(1)));
    }

    #[test]
    fn aggregate_valid_requires_every_field() {
        let bid_out = new_output_handle(0.0f64);
        let tags_out = new_tss_handle::<&'static str>();
        bid_out.borrow_mut().set(1.0, EngineTime::from_micros(0));

        let mut bid = TS::new(true);
        bid.bind_handle(bid_out.clone(), NodeId::new(1));
        let mut tags = TSS::new(true);
        tags.bind(tags_out.clone(), NodeId::new(1));

        let quote = Quote { bid, tags };
        assert!(!quote.is_valid(), "tags never ticked, still invalid");

        tags_out.borrow_mut().add("x", EngineTime::from_micros(1));
        assert!(quote.is_valid());
    }
}
