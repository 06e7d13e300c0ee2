//! Validation reports
//!
//! Rules return [`RawResult`]s (lists of error and warning messages plus
//! optional data). [`consolidate`] flattens them into one [`Report`] per
//! message, which is what the engines emit and hosts store.

mod consolidate;
mod merge;
mod types;

pub use consolidate::{RawReport, consolidate};
pub use merge::merge_reports;
pub use types::*;
