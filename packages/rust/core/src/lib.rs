//! Core pipeline orchestration and domain logic for SheetSync.
//!
//! This crate ties together the tabular source, asset fetching, and the
//! record store into the end-to-end [`pipeline::sync`] run.

pub mod layout;
pub mod pipeline;
pub mod reconcile;
pub mod slug;

pub use layout::{AssetKind, AssetLayout};
pub use pipeline::{ProgressReporter, SilentProgress, sync};
pub use reconcile::{AssetFailure, SyncReport, reconcile};
