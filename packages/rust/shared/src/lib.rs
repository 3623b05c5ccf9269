//! Shared types, error model, and configuration for SheetSync.
//!
//! This crate is the foundation depended on by all other SheetSync crates.
//! It provides:
//! - [`SheetSyncError`] — the unified error type
//! - Domain types ([`Row`], [`Record`], [`RecordKey`])
//! - Configuration ([`AppConfig`], [`SyncConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, AssetsConfig, CONFIG_FILE_NAME, HttpConfig, MissingStorePolicy, SourceConfig,
    StoreConfig, SyncConfig, config_search_paths, dir_segments, init_config_at, load_config,
    load_config_from,
};
pub use error::{Result, SheetSyncError};
pub use types::{Record, RecordKey, Row};
