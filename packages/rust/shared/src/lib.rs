//! Shared types, error model, and configuration for SignalWatch.
//!
//! This crate is the foundation depended on by all other SignalWatch crates.
//! It provides:
//! - [`SignalWatchError`], the unified error type
//! - Domain types ([`TrackedDataset`], [`Source`], [`CandidateSignal`], [`WeeklyUpdateRow`])
//! - Configuration ([`AppConfig`], [`ScanSettings`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ConferenceWindow, NewsDefaults, PathsConfig, ScanDefaults, ScanMode, ScanSettings,
    SearchConfig, VocabularyConfig, config_dir, config_file_path, default_conference_windows,
    init_config, load_config, load_config_from, validate_config,
};
pub use error::{Result, SignalWatchError};
pub use types::{
    CacheEntry, CachedItem, CandidateSignal, Category, DEFAULT_PRIORITY, RunId, Source,
    SourceSpec, TrackedDataset, TrackedItem, WatchlistSource, Watchlists, WeeklyUpdateRow,
    iso_date_or_empty,
};
