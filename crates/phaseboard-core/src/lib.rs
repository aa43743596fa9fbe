//! phaseboard-core library.
//!
//! Loads phase roll-up snapshots from an ordered list of candidate sources,
//! validates their shape, keeps the last good snapshot across failed refreshes,
//! and derives filtered per-phase views for the dashboard.
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` enums at the pipeline and config seams
//!   ([`error`], [`config::ConfigError`]); `anyhow::Result` inside transports.
//! - **Logging**: use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod config;
pub mod debounce;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod model;
pub mod refresh;
pub mod status;
pub mod validate;

pub use config::ConfigError;
pub use error::{AttemptError, ErrorCode, RefreshError};
pub use filter::{FilterState, FilteredSnapshot};
pub use model::{Issue, IsaFilter, LinkedIssue, Phase, Snapshot, Subtask, Track};
pub use refresh::{Reconciler, RefreshTiming};
pub use status::{StatusClass, StatusConfig};
