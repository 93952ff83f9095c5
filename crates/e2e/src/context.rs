//! Per-scenario context and step handlers
//!
//! A [`ScenarioContext`] is created for every scenario and dropped when it
//! ends. It owns the scenario's browser session, shares the run-wide store
//! handle and carries the only cross-step state: the actor logged in by an
//! authentication step.

use std::path::PathBuf;
use std::time::Duration;

use catalog_store::{Actor, ActorRef, Database, Product};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::breakpoint;
use crate::browser::{BrowserSession, Element};
use crate::config::HarnessConfig;
use crate::error::{E2eError, E2eResult};
use crate::locator::{self, LocateError, RowMatchPolicy};

pub const LOGIN_PATH: &str = "/login";
pub const SEARCH_BOX: &str = r#"input[name="searchTerm"]"#;
pub const SEARCH_BUTTON: &str = "#search_submit";
pub const RESULTS_TABLE: &str = "table.table";
pub const RESULT_ROWS: &str = "tbody tr";
pub const TABLE_ROWS: &str = "table tr";
pub const MODAL_VISIBLE: &str = "$('.modal:visible').length > 0";
pub const CHECK_MARK: &str = "fa-check";
/// The only table value that marks a product as published
pub const PUBLISHED_TOKEN: &str = "yes";

/// Step behaviour knobs taken from the harness configuration
#[derive(Debug, Clone)]
pub struct StepSettings {
    pub admin_username: String,
    pub admin_password: String,
    pub modal_timeout: Duration,
    pub screenshot_settle: Duration,
    pub screenshot_dir: PathBuf,
    pub row_match: RowMatchPolicy,
    pub breakpoints: bool,
    pub price_seed: Option<u64>,
}

impl From<&HarnessConfig> for StepSettings {
    fn from(config: &HarnessConfig) -> Self {
        Self {
            admin_username: config.admin_username.clone(),
            admin_password: config.admin_password.clone(),
            modal_timeout: config.modal_timeout(),
            screenshot_settle: config.screenshot_settle(),
            screenshot_dir: config.screenshot_dir.clone(),
            row_match: config.row_match,
            breakpoints: config.breakpoints,
            price_seed: config.price_seed,
        }
    }
}

impl Default for StepSettings {
    fn default() -> Self {
        Self::from(&HarnessConfig::default())
    }
}

/// One row of a "the following products exist" table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRow {
    pub name: String,
    pub is_published: Option<String>,
}

impl ProductRow {
    pub fn new(name: impl Into<String>, is_published: Option<&str>) -> Self {
        Self {
            name: name.into(),
            is_published: is_published.map(String::from),
        }
    }

    /// Read rows from a table whose first row holds the column names.
    ///
    /// `name` is required; `is published` is optional.
    pub fn from_table(table: &[Vec<String>]) -> E2eResult<Vec<Self>> {
        let Some((header, body)) = table.split_first() else {
            return Err(E2eError::InvalidTable("table is empty".to_string()));
        };
        let column = |name: &str| header.iter().position(|h| h.trim() == name);
        let name_col = column("name")
            .ok_or_else(|| E2eError::InvalidTable("missing 'name' column".to_string()))?;
        let published_col = column("is published");

        body.iter()
            .enumerate()
            .map(|(i, row)| {
                let name = row.get(name_col).ok_or_else(|| {
                    E2eError::InvalidTable(format!("row {} has no 'name' cell", i + 1))
                })?;
                Ok(Self {
                    name: name.clone(),
                    is_published: published_col.and_then(|col| row.get(col).cloned()),
                })
            })
            .collect()
    }

    /// Published only for the exact affirmative token
    pub fn is_published(&self) -> bool {
        self.is_published.as_deref() == Some(PUBLISHED_TOKEN)
    }
}

pub struct ScenarioContext {
    store: Database,
    browser: Box<dyn BrowserSession>,
    settings: StepSettings,
    rng: StdRng,
    current_actor: Option<ActorRef>,
}

impl std::fmt::Debug for ScenarioContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioContext")
            .field("current_actor", &self.current_actor)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ScenarioContext {
    pub fn new(store: Database, browser: Box<dyn BrowserSession>, settings: StepSettings) -> Self {
        let rng = match settings.price_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            store,
            browser,
            settings,
            rng,
            current_actor: None,
        }
    }

    pub fn current_actor(&self) -> Option<&ActorRef> {
        self.current_actor.as_ref()
    }

    pub fn store(&self) -> &Database {
        &self.store
    }

    pub fn browser(&mut self) -> &mut dyn BrowserSession {
        self.browser.as_mut()
    }

    // ========================================================================
    // Data setup
    // ========================================================================

    /// Persist an admin actor with one durable write
    pub fn create_actor(&mut self, username: &str, password: &str) -> E2eResult<ActorRef> {
        let actor = Actor::admin(username, password);
        let reference = actor.reference();
        self.store.persist(actor);
        self.store.flush()?;

        info!("Created admin actor '{}'", username);
        Ok(reference)
    }

    /// Stage `count` generated products and flush them together
    pub fn create_products(&mut self, count: usize, author: Option<&ActorRef>) -> E2eResult<Vec<Product>> {
        let mut products = Vec::with_capacity(count);
        for i in 0..count {
            let mut product = Product::with_random_price(format!("Product {}", i), &mut self.rng);
            if let Some(author) = author {
                product = product.authored_by(author.clone());
            }
            self.store.persist(product.clone());
            products.push(product);
        }
        self.store.flush()?;

        debug!(
            "Created {} product(s){}",
            count,
            author.map(|a| format!(" by {}", a.username)).unwrap_or_default()
        );
        Ok(products)
    }

    pub fn there_are_products(&mut self, count: usize) -> E2eResult<Vec<Product>> {
        self.create_products(count, None)
    }

    /// Products authored by the logged-in actor
    pub fn author_products(&mut self, count: usize) -> E2eResult<Vec<Product>> {
        let author = self.current_actor.clone().ok_or(E2eError::NoCurrentActor)?;
        self.create_products(count, Some(&author))
    }

    pub fn declare_products_from_table(&mut self, rows: &[ProductRow]) -> E2eResult<Vec<Product>> {
        let mut products = Vec::with_capacity(rows.len());
        for row in rows {
            let product = Product::with_random_price(row.name.clone(), &mut self.rng)
                .published(row.is_published());
            self.store.persist(product.clone());
            products.push(product);
        }
        self.store.flush()?;
        Ok(products)
    }

    // ========================================================================
    // Browser interaction
    // ========================================================================

    pub async fn login_as_admin(&mut self) -> E2eResult<()> {
        let username = self.settings.admin_username.clone();
        let password = self.settings.admin_password.clone();

        let actor = self.create_actor(&username, &password)?;
        self.current_actor = Some(actor);

        self.browser.visit(LOGIN_PATH).await?;
        self.browser.fill_field("Username", &username).await?;
        self.browser.fill_field("Password", &password).await?;
        self.browser.press_button("Login", None).await
    }

    pub async fn visit(&mut self, path: &str) -> E2eResult<()> {
        self.browser.visit(path).await
    }

    /// Fail unless the browser shows `expected`, e.g. after a redirect
    pub async fn assert_current_path(&mut self, expected: &str) -> E2eResult<()> {
        let actual = self.browser.current_path().await?;
        let path_only = actual.split('?').next().unwrap_or_default();
        if actual == expected || path_only == expected {
            Ok(())
        } else {
            Err(E2eError::AssertionFailed {
                what: "current page".to_string(),
                expected: expected.to_string(),
                actual,
            })
        }
    }

    pub async fn fill_search_box(&mut self, term: &str) -> E2eResult<()> {
        let search_box = self.require(SEARCH_BOX, "search box").await?;
        self.browser.set_value(&search_box, term).await
    }

    pub async fn press_search_button(&mut self) -> E2eResult<()> {
        let button = self.require(SEARCH_BUTTON, "search button").await?;
        self.browser.press(&button).await
    }

    pub async fn click_link(&mut self, name: &str) -> E2eResult<()> {
        self.browser.click_link(name).await
    }

    pub async fn assert_product_count(&mut self, expected: usize) -> E2eResult<()> {
        let table = self.require(RESULTS_TABLE, "table").await?;
        let rows = self.browser.find_all(Some(&table), RESULT_ROWS).await?;
        if rows.len() == expected {
            Ok(())
        } else {
            Err(E2eError::AssertionFailed {
                what: "product rows".to_string(),
                expected: expected.to_string(),
                actual: rows.len().to_string(),
            })
        }
    }

    /// Give a modal up to the configured timeout to appear; never fails on timeout
    pub async fn wait_for_modal_visible(&mut self) -> E2eResult<()> {
        let visible = self
            .browser
            .wait(self.settings.modal_timeout, MODAL_VISIBLE)
            .await?;
        if !visible {
            warn!(
                "No modal became visible within {} ms",
                self.settings.modal_timeout.as_millis()
            );
        }
        Ok(())
    }

    pub async fn find_row_by_text(&mut self, text: &str) -> E2eResult<Element> {
        let rows = self.browser.find_all(None, TABLE_ROWS).await?;
        match locator::find_row_by_text(&rows, text, self.settings.row_match) {
            Ok(row) => Ok(row.clone()),
            Err(LocateError::NotFound) => Err(E2eError::RowNotFound(text.to_string())),
            Err(LocateError::Ambiguous { count }) => Err(E2eError::AmbiguousRow {
                text: text.to_string(),
                count,
            }),
        }
    }

    pub async fn row_has_check_mark(&mut self, text: &str) -> E2eResult<()> {
        let row = self.find_row_by_text(text).await?;
        if row.html.contains(CHECK_MARK) {
            Ok(())
        } else {
            Err(E2eError::AssertionFailed {
                what: format!("'{}' row", text),
                expected: format!("a {} element", CHECK_MARK),
                actual: "none in the row".to_string(),
            })
        }
    }

    pub async fn row_lacks_check_mark(&mut self, text: &str) -> E2eResult<()> {
        let row = self.find_row_by_text(text).await?;
        if row.html.contains(CHECK_MARK) {
            Err(E2eError::AssertionFailed {
                what: format!("'{}' row", text),
                expected: format!("no {} element", CHECK_MARK),
                actual: "a check mark".to_string(),
            })
        } else {
            Ok(())
        }
    }

    pub async fn press_button_in_row(&mut self, text: &str, button: &str) -> E2eResult<()> {
        let row = self.find_row_by_text(text).await?;
        self.browser.press_button(button, Some(&row)).await
    }

    /// Let rendering settle, then capture the page under the screenshot directory
    pub async fn save_screenshot(&mut self, filename: &str) -> E2eResult<PathBuf> {
        tokio::time::sleep(self.settings.screenshot_settle).await;

        std::fs::create_dir_all(&self.settings.screenshot_dir)?;
        let path = self.settings.screenshot_dir.join(filename);
        self.browser.screenshot(&path).await?;

        info!("Saved screenshot to {}", path.display());
        Ok(path)
    }

    /// Block on operator input when breakpoints are enabled
    pub async fn break_for_debugging(&mut self) -> E2eResult<()> {
        if !self.settings.breakpoints {
            warn!("Breakpoint step skipped; set CATALOG_E2E_BREAKPOINTS=1 to pause here");
            return Ok(());
        }
        breakpoint::wait_on_terminal().await?;
        Ok(())
    }

    async fn require(&mut self, selector: &str, what: &str) -> E2eResult<Element> {
        self.browser
            .find(None, selector)
            .await?
            .ok_or_else(|| E2eError::not_found(what, selector))
    }
}
