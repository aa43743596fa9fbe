//! Shared setup for commands that read a snapshot.
//!
//! Loads the project config, resolves the candidate source list, loads the
//! status sets, and builds the fetcher. Errors are rendered through the
//! output layer before being returned.

use crate::output::{CliError, OutputMode, render_error};
use anyhow::bail;
use phaseboard_core::config::{
    ProjectConfig, candidate_sources, load_project_config, resolve_location,
};
use phaseboard_core::fetch::{DefaultTransport, Fetcher};
use phaseboard_core::refresh::{Loaded, SnapshotLoader};
use phaseboard_core::status::StatusConfig;
use std::path::Path;
use tracing::debug;

pub struct Session {
    pub project: ProjectConfig,
    pub status: StatusConfig,
    pub fetcher: Fetcher<DefaultTransport>,
}

impl Session {
    /// # Errors
    ///
    /// Returns an error if the project config or status config is malformed.
    pub fn open(project_root: &Path, source: Option<&str>, output: OutputMode) -> anyhow::Result<Self> {
        let project = match load_project_config(project_root) {
            Ok(project) => project,
            Err(err) => {
                render_error(output, &CliError::from(&err))?;
                bail!(err);
            }
        };

        let transport = DefaultTransport::default();
        let status_location = project
            .status
            .config
            .as_deref()
            .map(|location| resolve_location(project_root, location));
        let status = match StatusConfig::load(&transport, status_location.as_deref()) {
            Ok(status) => status,
            Err(err) => {
                render_error(output, &CliError::from(&err))?;
                bail!(err);
            }
        };

        let candidates = candidate_sources(project_root, &project.sources, source);
        debug!(?candidates, "resolved snapshot sources");

        Ok(Self {
            project,
            status,
            fetcher: Fetcher::new(transport, candidates),
        })
    }

    #[must_use]
    pub const fn progress_all_subtasks(&self) -> bool {
        self.project.status.progress_all_subtasks
    }

    /// Fetch and validate one snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error (already rendered) if no valid snapshot was loaded.
    pub fn load(&mut self, output: OutputMode) -> anyhow::Result<Loaded> {
        match self.fetcher.load() {
            Ok(loaded) => Ok(loaded),
            Err(err) => {
                render_error(output, &CliError::from(&err))?;
                bail!(err);
            }
        }
    }
}
