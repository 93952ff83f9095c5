//! Catalog Scenario Harness
//!
//! Step handlers and lifecycle hooks for behaviour scenarios against the
//! product catalog web application:
//! - Resets the shared store before every scenario, loading seed fixtures
//!   for scenarios tagged `@fixtures`
//! - Opens an isolated browser session per scenario (Playwright, or an
//!   in-process simulation)
//! - Carries the logged-in actor between the steps of one scenario only
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Harness (one per run)                    │
//! │    ├── HarnessConfig   (TOML + CATALOG_E2E_* overrides)     │
//! │    ├── Database        (catalog-store, shared)              │
//! │    ├── FixtureRegistry (users.yaml, products.yaml)          │
//! │    └── SessionLauncher (Playwright | simulated)             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  LifecycleHooks::before_scenario(tags)                      │
//! │    ├── reset_store()                                        │
//! │    └── load_fixtures()        only when tagged              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ScenarioContext (one per scenario)                         │
//! │    ├── browser: Box<dyn BrowserSession>                     │
//! │    ├── current_actor: Option<ActorRef>                      │
//! │    ├── data setup      create_actor, create_products, ...   │
//! │    ├── interaction     login, search, click, press in row   │
//! │    └── assertions      product count, check marks, path     │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod app;
pub mod breakpoint;
pub mod browser;
pub mod config;
pub mod context;
pub mod error;
pub mod harness;
pub mod hooks;
pub mod locator;
pub mod playwright;

#[cfg(test)]
mod fake;

pub use browser::{BrowserSession, Element, SessionLauncher};
pub use config::{Driver, HarnessConfig};
pub use context::{ProductRow, ScenarioContext, StepSettings};
pub use error::{E2eError, E2eResult, SetupStage};
pub use harness::Harness;
pub use hooks::{LifecycleHooks, SetupReport};
pub use locator::RowMatchPolicy;

use tracing_subscriber::EnvFilter;

/// Install the run's log subscriber; `RUST_LOG` wins over `default_level`
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
