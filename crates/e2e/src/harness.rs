//! Run-wide shared resources
//!
//! A [`Harness`] is built once per test run. It holds only resources that
//! are safe to share between scenarios; everything scenario-specific lives in
//! the [`ScenarioContext`] it hands out.

use std::path::Path;
use std::sync::Arc;

use catalog_store::{Database, FixtureRegistry};
use tracing::{debug, info};

use crate::browser::SessionLauncher;
use crate::config::HarnessConfig;
use crate::context::{ScenarioContext, StepSettings};
use crate::error::{E2eError, E2eResult, SetupStage};
use crate::hooks::LifecycleHooks;

/// Seed files loaded for scenarios tagged for fixtures, in load order
pub const DEFAULT_FIXTURES: &[(&str, &str)] = &[("users", "users.yaml"), ("products", "products.yaml")];

pub struct Harness {
    config: HarnessConfig,
    store: Database,
    fixtures: Arc<FixtureRegistry>,
    launcher: Arc<dyn SessionLauncher>,
}

impl std::fmt::Debug for Harness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("fixtures", &self.fixtures)
            .finish_non_exhaustive()
    }
}

impl Harness {
    pub fn new(
        config: HarnessConfig,
        store: Database,
        fixtures: FixtureRegistry,
        launcher: Arc<dyn SessionLauncher>,
    ) -> Self {
        Self {
            config,
            store,
            fixtures: Arc::new(fixtures),
            launcher,
        }
    }

    /// Open the configured store: a file when `db_path` is set, memory otherwise
    pub fn open_store(config: &HarnessConfig) -> E2eResult<Database> {
        config.validate()?;
        let store = match &config.db_path {
            Some(path) => {
                info!("Using store at {}", path.display());
                Database::open(path)?
            }
            None => Database::open_memory()?,
        };
        Ok(store)
    }

    /// Register every default seed file present in `dir`
    pub fn default_fixtures(dir: &Path) -> E2eResult<FixtureRegistry> {
        let mut registry = FixtureRegistry::new();
        for (name, file) in DEFAULT_FIXTURES {
            let path = dir.join(file);
            if path.exists() {
                registry.register_yaml(*name, &path)?;
            } else {
                debug!("No {} fixture at {}", name, path.display());
            }
        }
        Ok(registry)
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn store(&self) -> &Database {
        &self.store
    }

    pub fn hooks(&self) -> LifecycleHooks {
        LifecycleHooks::new(
            self.store.clone(),
            self.fixtures.clone(),
            self.config.fixtures_tag.clone(),
        )
    }

    /// Fresh context with its own browser session
    pub async fn new_context(&self) -> E2eResult<ScenarioContext> {
        let browser = self
            .launcher
            .launch()
            .await
            .map_err(|e| E2eError::setup(SetupStage::OpenSession, e))?;
        Ok(ScenarioContext::new(
            self.store.clone(),
            browser,
            StepSettings::from(&self.config),
        ))
    }
}
