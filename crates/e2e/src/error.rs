//! Error types for the scenario harness

use thiserror::Error;

/// Lifecycle stage a setup failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStage {
    ResetStore,
    LoadFixtures,
    OpenSession,
}

impl std::fmt::Display for SetupStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SetupStage::ResetStore => write!(f, "store reset"),
            SetupStage::LoadFixtures => write!(f, "fixture load"),
            SetupStage::OpenSession => write!(f, "browser session"),
        }
    }
}

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Scenario setup failed during {stage}: {source}")]
    Setup {
        stage: SetupStage,
        #[source]
        source: Box<E2eError>,
    },

    #[error("Could not find the {what} ({locator})")]
    ElementNotFound { what: String, locator: String },

    #[error("Cannot find a table row with text '{0}'")]
    RowNotFound(String),

    #[error("{count} table rows contain '{text}'; expected exactly one")]
    AmbiguousRow { text: String, count: usize },

    #[error("Assertion failed: {what}: expected {expected}, got {actual}")]
    AssertionFailed {
        what: String,
        expected: String,
        actual: String,
    },

    #[error("Element '{0}' belongs to a page that is no longer displayed")]
    StaleElement(String),

    #[error("Invalid step table: {0}")]
    InvalidTable(String),

    #[error("No actor is logged in for this scenario")]
    NoCurrentActor,

    #[error("Playwright not found. Install with: npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Application failed to start: {0}")]
    AppStartup(String),

    #[error("Application health check failed after {0} attempts")]
    AppHealthCheck(usize),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(#[from] catalog_store::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl E2eError {
    /// Wrap an error as a fatal setup failure
    pub fn setup(stage: SetupStage, source: impl Into<E2eError>) -> Self {
        E2eError::Setup {
            stage,
            source: Box::new(source.into()),
        }
    }

    pub fn not_found(what: impl Into<String>, locator: impl Into<String>) -> Self {
        E2eError::ElementNotFound {
            what: what.into(),
            locator: locator.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, E2eError::ElementNotFound { .. } | E2eError::RowNotFound(_))
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
