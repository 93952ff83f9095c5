//! Scenario lifecycle hooks
//!
//! Run before each scenario: the store is always emptied, and fixtures are
//! loaded only for scenarios carrying the fixtures tag. Any failure here is
//! fatal for the scenario and is reported as [`E2eError::Setup`].

use std::sync::Arc;

use catalog_store::{Database, ExecuteMode, FixtureExecutor, FixtureRegistry, LoadReport};
use tracing::{debug, info};

use crate::error::{E2eError, E2eResult, SetupStage};

/// What a before-scenario hook did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupReport {
    pub purged: usize,
    pub fixtures: Option<LoadReport>,
}

#[derive(Debug, Clone)]
pub struct LifecycleHooks {
    store: Database,
    fixtures: Arc<FixtureRegistry>,
    fixtures_tag: String,
}

impl LifecycleHooks {
    pub fn new(store: Database, fixtures: Arc<FixtureRegistry>, fixtures_tag: impl Into<String>) -> Self {
        Self {
            store,
            fixtures,
            fixtures_tag: fixtures_tag.into(),
        }
    }

    /// Remove every product and actor; safe on an empty store
    pub fn reset_store(&self) -> E2eResult<usize> {
        let removed = self
            .store
            .purge_all()
            .map_err(|e| E2eError::setup(SetupStage::ResetStore, e))?;
        debug!("Store reset, {} record(s) removed", removed);
        Ok(removed)
    }

    /// Load the registered fixtures in one transaction.
    ///
    /// `already_purged` skips the executor's own purge when the store was
    /// just reset.
    pub fn load_fixtures(&self, already_purged: bool) -> E2eResult<LoadReport> {
        let mode = if already_purged {
            ExecuteMode::Append
        } else {
            ExecuteMode::Purge
        };
        let report = FixtureExecutor::new(&self.store)
            .execute(&self.fixtures, mode)
            .map_err(|e| E2eError::setup(SetupStage::LoadFixtures, e))?;

        info!(
            "Loaded fixtures [{}] ({} record(s))",
            report.fixtures.join(", "),
            report.records
        );
        Ok(report)
    }

    pub fn wants_fixtures<S: AsRef<str>>(&self, tags: &[S]) -> bool {
        tags.iter().any(|tag| {
            let tag = tag.as_ref();
            tag.strip_prefix('@').unwrap_or(tag) == self.fixtures_tag
        })
    }

    pub fn before_scenario<S: AsRef<str>>(&self, tags: &[S]) -> E2eResult<SetupReport> {
        let purged = self.reset_store()?;
        let fixtures = if self.wants_fixtures(tags) {
            Some(self.load_fixtures(true)?)
        } else {
            None
        };
        Ok(SetupReport { purged, fixtures })
    }
}
