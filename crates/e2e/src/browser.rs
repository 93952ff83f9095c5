//! Browser session facade
//!
//! The harness talks to the page under test only through [`BrowserSession`].
//! Lookups hand back [`Element`] handles that stay valid until the next
//! navigation; every action that may change the page bumps the session's
//! generation, and a handle from an older generation is rejected as stale.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{E2eError, E2eResult};

/// One step of a locator path: the `index`-th match of `selector`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub selector: String,
    pub index: usize,
}

/// Handle to a rendered element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Locator path from the document root
    pub path: Vec<Segment>,
    /// Rendered text content
    pub text: String,
    /// Inner markup
    pub html: String,
    /// Page generation the handle was captured in
    pub generation: u64,
}

impl Element {
    /// Handle for the `index`-th match of `selector` below `scope`
    pub fn child_of(
        scope: Option<&Element>,
        selector: &str,
        index: usize,
        text: String,
        html: String,
        generation: u64,
    ) -> Self {
        let mut path = scope.map(|s| s.path.clone()).unwrap_or_default();
        path.push(Segment {
            selector: selector.to_string(),
            index,
        });
        Self {
            path,
            text,
            html,
            generation,
        }
    }

    /// Human-readable locator, e.g. `table tr[2]`
    pub fn locator(&self) -> String {
        self.path
            .iter()
            .map(|s| format!("{}[{}]", s.selector, s.index))
            .collect::<Vec<_>>()
            .join(" >> ")
    }

    pub fn contains_text(&self, fragment: &str) -> bool {
        self.text.contains(fragment)
    }

    /// Reject the handle when the page has moved on
    pub fn ensure_current(&self, generation: u64) -> E2eResult<()> {
        if self.generation == generation {
            Ok(())
        } else {
            Err(E2eError::StaleElement(self.locator()))
        }
    }
}

/// Page-level operations the harness needs from a browser
///
/// Locator-based calls report a missing target as
/// [`E2eError::ElementNotFound`]; `find` and `find_all` report absence as
/// `None` / an empty list and leave the decision to the caller.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate to a path relative to the application base URL
    async fn visit(&mut self, path: &str) -> E2eResult<()>;

    /// Path (and query) of the page currently displayed
    async fn current_path(&mut self) -> E2eResult<String>;

    /// All matches of a CSS selector, optionally below `scope`
    async fn find_all(&mut self, scope: Option<&Element>, selector: &str) -> E2eResult<Vec<Element>>;

    /// First match of a CSS selector, optionally below `scope`
    async fn find(&mut self, scope: Option<&Element>, selector: &str) -> E2eResult<Option<Element>> {
        Ok(self.find_all(scope, selector).await?.into_iter().next())
    }

    async fn set_value(&mut self, element: &Element, value: &str) -> E2eResult<()>;

    /// Click or submit the element
    async fn press(&mut self, element: &Element) -> E2eResult<()>;

    /// Follow a link identified by id, title or text
    async fn click_link(&mut self, text: &str) -> E2eResult<()>;

    /// Fill a form field identified by label, id, name or placeholder
    async fn fill_field(&mut self, label: &str, value: &str) -> E2eResult<()>;

    /// Press a button identified by label, id, name or value, optionally below `scope`
    async fn press_button(&mut self, label: &str, scope: Option<&Element>) -> E2eResult<()>;

    /// Poll a JavaScript condition until it holds or `timeout` passes.
    ///
    /// Returns whether the condition held; timing out is not an error.
    async fn wait(&mut self, timeout: Duration, condition: &str) -> E2eResult<bool>;

    /// Capture the current page
    async fn screenshot(&mut self, path: &Path) -> E2eResult<()>;
}

/// Opens one fresh, isolated session per scenario
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self) -> E2eResult<Box<dyn BrowserSession>>;
}
