// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Packy Store
//!
//! State management for packy-usage.
//!
//! This crate provides:
//!
//! - **SettingsStore**: User settings with persistence, change notification,
//!   and the fetch configuration the API client reads
//! - **BudgetCache**: Latest snapshot with a freshness window
//! - **PollingScheduler**: Periodic refresh that feeds the cache
//! - **Persistence**: File I/O helpers for JSON data
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use packy_store::{BudgetCache, LogReporter, PollingScheduler, SettingsStore};
//!
//! let settings = SettingsStore::load_default().await?;
//! let cache = Arc::new(BudgetCache::new(packy_core::system_clock()));
//! let scheduler = PollingScheduler::new(client, cache.clone(), Arc::new(LogReporter))
//!     .with_interval(settings.get().await.polling_interval());
//! scheduler.start();
//!
//! let mut rx = cache.subscribe();
//! while let Ok(snapshot) = rx.recv().await {
//!     println!("{:.1}% used today", snapshot.daily.percentage);
//! }
//! ```

pub mod budget_cache;
pub mod error;
pub mod persistence;
pub mod scheduler;
pub mod settings_store;

pub use budget_cache::{BudgetCache, DEFAULT_FRESHNESS};
pub use error::StoreError;
pub use persistence::{
    default_config_dir, default_settings_path, ensure_dir, load_json, load_json_or_default,
    save_json,
};
pub use scheduler::{
    ErrorReporter, FreshnessPolicy, LogReporter, PollingScheduler, SchedulerState, TickOutcome,
};
pub use settings_store::{
    Settings, SettingsStore, DEFAULT_POLLING_INTERVAL_MS, MIN_POLLING_INTERVAL_MS,
};
