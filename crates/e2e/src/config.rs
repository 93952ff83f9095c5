//! Harness configuration
//!
//! Loaded from an optional TOML file, then overridden by `CATALOG_E2E_*`
//! environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::AppConfig;
use crate::error::{E2eError, E2eResult};
use crate::locator::RowMatchPolicy;
use crate::playwright::{Browser, PlaywrightConfig};

/// Prefix shared by every environment override
pub const ENV_PREFIX: &str = "CATALOG_E2E_";

/// Which browser backend scenarios run against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Driver {
    /// In-process stand-in for the application, used by the harness's own features
    #[default]
    Simulated,
    /// Real browser through Playwright against `base_url`
    Playwright,
}

impl std::str::FromStr for Driver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simulated" | "sim" => Ok(Driver::Simulated),
            "playwright" => Ok(Driver::Playwright),
            other => Err(format!("unknown driver '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Base URL of the application under test
    pub base_url: String,
    pub driver: Driver,
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// `node_modules` holding the `playwright` package
    pub node_path: Option<PathBuf>,

    /// Application database; `None` opens an in-memory store
    pub db_path: Option<PathBuf>,
    pub fixtures_dir: PathBuf,
    /// Scenario tag that requests fixture loading
    pub fixtures_tag: String,
    pub screenshot_dir: PathBuf,

    pub modal_timeout_ms: u64,
    pub screenshot_settle_ms: u64,
    pub row_match: RowMatchPolicy,
    /// Let `break` steps block on operator input
    pub breakpoints: bool,

    pub admin_username: String,
    pub admin_password: String,
    /// Seed for generated prices; random when unset
    pub price_seed: Option<u64>,

    /// Spawn the application before the run
    pub app: Option<AppConfig>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            driver: Driver::default(),
            browser: Browser::default(),
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            node_path: None,
            db_path: None,
            fixtures_dir: PathBuf::from("fixtures"),
            fixtures_tag: "fixtures".to_string(),
            screenshot_dir: PathBuf::from("test-results/screenshots"),
            modal_timeout_ms: 5000,
            screenshot_settle_ms: 1000,
            row_match: RowMatchPolicy::default(),
            breakpoints: false,
            admin_username: "admin".to_string(),
            admin_password: "admin".to_string(),
            price_seed: None,
            app: None,
        }
    }
}

impl HarnessConfig {
    /// Load configuration from file, or defaults when it does not exist
    pub fn load(path: &Path) -> E2eResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            debug!("Loaded harness config from {}", path.display());
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// File named by `CATALOG_E2E_CONFIG` (if any) plus environment overrides
    pub fn from_env() -> E2eResult<Self> {
        let lookup = |key: &str| std::env::var(key).ok();
        let mut config = match lookup(&format!("{}CONFIG", ENV_PREFIX)) {
            Some(path) => Self::load(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations that would point the harness at the wrong data.
    ///
    /// A live application only sees the harness's resets and fixtures through
    /// a shared database file, so the Playwright driver requires `db_path`.
    pub fn validate(&self) -> E2eResult<()> {
        if self.driver == Driver::Playwright && self.db_path.is_none() {
            return Err(E2eError::Config(format!(
                "the playwright driver needs the application's database; set {}DB_PATH or db_path",
                ENV_PREFIX
            )));
        }
        Ok(())
    }

    /// Apply `CATALOG_E2E_*` overrides from an arbitrary variable source
    pub fn apply_overrides<F>(&mut self, lookup: F) -> E2eResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(v) = get("BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = get("DRIVER") {
            self.driver = parse("DRIVER", &v)?;
        }
        if let Some(v) = get("BROWSER") {
            self.browser = parse("BROWSER", &v)?;
        }
        if let Some(v) = get("HEADLESS") {
            self.headless = parse_flag("HEADLESS", &v)?;
        }
        if let Some(v) = get("NODE_PATH") {
            self.node_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("DB_PATH") {
            self.db_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("FIXTURES_DIR") {
            self.fixtures_dir = PathBuf::from(v);
        }
        if let Some(v) = get("SCREENSHOT_DIR") {
            self.screenshot_dir = PathBuf::from(v);
        }
        if let Some(v) = get("MODAL_TIMEOUT_MS") {
            self.modal_timeout_ms = parse("MODAL_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("SCREENSHOT_SETTLE_MS") {
            self.screenshot_settle_ms = parse("SCREENSHOT_SETTLE_MS", &v)?;
        }
        if let Some(v) = get("ROW_MATCH") {
            self.row_match = parse("ROW_MATCH", &v)?;
        }
        if let Some(v) = get("BREAKPOINTS") {
            self.breakpoints = parse_flag("BREAKPOINTS", &v)?;
        }
        if let Some(v) = get("ADMIN_USERNAME") {
            self.admin_username = v;
        }
        if let Some(v) = get("ADMIN_PASSWORD") {
            self.admin_password = v;
        }
        if let Some(v) = get("PRICE_SEED") {
            self.price_seed = Some(parse("PRICE_SEED", &v)?);
        }
        if let Some(v) = get("APP_BINARY") {
            let app = self.app.get_or_insert_with(AppConfig::default);
            app.binary_path = PathBuf::from(v);
            if app.db_path.is_none() {
                app.db_path = self.db_path.clone();
            }
        }

        Ok(())
    }

    pub fn modal_timeout(&self) -> Duration {
        Duration::from_millis(self.modal_timeout_ms)
    }

    pub fn screenshot_settle(&self) -> Duration {
        Duration::from_millis(self.screenshot_settle_ms)
    }

    /// Playwright settings derived from this configuration
    pub fn playwright(&self) -> PlaywrightConfig {
        PlaywrightConfig {
            base_url: self.base_url.clone(),
            viewport_width: self.viewport_width,
            viewport_height: self.viewport_height,
            browser: self.browser,
            headless: self.headless,
            node_path: self.node_path.clone(),
        }
    }
}

fn parse<T>(name: &str, value: &str) -> E2eResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| E2eError::Config(format!("{}{}: {}", ENV_PREFIX, name, e)))
}

fn parse_flag(name: &str, value: &str) -> E2eResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(E2eError::Config(format!(
            "{}{}: expected a boolean, got '{}'",
            ENV_PREFIX, name, other
        ))),
    }
}
