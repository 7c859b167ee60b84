// crates/core/src/lib.rs
//! Text canonicalization for live job output.
//!
//! Everything here is pure: functions take a decoded text blob and return a
//! normalized copy. The multiplexer stores raw output and viewers call into
//! this crate when rendering.

pub mod ansi;
pub mod canon;
pub mod snapshot;

pub use ansi::{strip_ansi, truncate_visible, visible_width};
pub use canon::{
    classify, collapse, collapse_settled, is_blank, is_separator, preview, strip_separators,
    CanonOptions, LineKind, DEFAULT_SEPARATOR_WIDTH,
};
pub use snapshot::SnapshotDiff;
