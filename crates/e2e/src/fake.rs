//! Scripted browser session for unit tests

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::browser::{BrowserSession, Element};
use crate::error::{E2eError, E2eResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Visit(String),
    Fill(String, String),
    SetValue(String, String),
    Press(String),
    ClickLink(String),
    PressButton(String, Option<String>),
    Wait(u64, String),
}

/// Serves canned elements per selector and records every action
#[derive(Default)]
pub struct FakeSession {
    elements: HashMap<String, Vec<(String, String)>>,
    log: Arc<Mutex<Vec<Recorded>>>,
    path: String,
    generation: u64,
    no_login_form: bool,
}

impl FakeSession {
    pub fn with_element(mut self, selector: &str, text: &str, html: &str) -> Self {
        self.elements
            .entry(selector.to_string())
            .or_default()
            .push((text.to_string(), html.to_string()));
        self
    }

    pub fn without_login_form(mut self) -> Self {
        self.no_login_form = true;
        self
    }

    pub fn log(&self) -> Arc<Mutex<Vec<Recorded>>> {
        self.log.clone()
    }

    fn record(&self, entry: Recorded) {
        self.log.lock().push(entry);
    }

    fn selector_of(element: &Element) -> String {
        element
            .path
            .last()
            .map(|s| s.selector.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn visit(&mut self, path: &str) -> E2eResult<()> {
        self.record(Recorded::Visit(path.to_string()));
        self.path = path.to_string();
        self.generation += 1;
        Ok(())
    }

    async fn current_path(&mut self) -> E2eResult<String> {
        Ok(self.path.clone())
    }

    async fn find_all(&mut self, scope: Option<&Element>, selector: &str) -> E2eResult<Vec<Element>> {
        let found = self.elements.get(selector).cloned().unwrap_or_default();
        Ok(found
            .into_iter()
            .enumerate()
            .map(|(i, (text, html))| Element::child_of(scope, selector, i, text, html, self.generation))
            .collect())
    }

    async fn set_value(&mut self, element: &Element, value: &str) -> E2eResult<()> {
        element.ensure_current(self.generation)?;
        self.record(Recorded::SetValue(Self::selector_of(element), value.to_string()));
        Ok(())
    }

    async fn press(&mut self, element: &Element) -> E2eResult<()> {
        element.ensure_current(self.generation)?;
        self.record(Recorded::Press(Self::selector_of(element)));
        self.generation += 1;
        Ok(())
    }

    async fn click_link(&mut self, text: &str) -> E2eResult<()> {
        self.record(Recorded::ClickLink(text.to_string()));
        self.generation += 1;
        Ok(())
    }

    async fn fill_field(&mut self, label: &str, value: &str) -> E2eResult<()> {
        if self.no_login_form {
            return Err(E2eError::not_found("form field", label));
        }
        self.record(Recorded::Fill(label.to_string(), value.to_string()));
        Ok(())
    }

    async fn press_button(&mut self, label: &str, scope: Option<&Element>) -> E2eResult<()> {
        if let Some(scope) = scope {
            scope.ensure_current(self.generation)?;
        }
        self.record(Recorded::PressButton(
            label.to_string(),
            scope.map(Element::locator),
        ));
        self.generation += 1;
        Ok(())
    }

    async fn wait(&mut self, timeout: Duration, condition: &str) -> E2eResult<bool> {
        self.record(Recorded::Wait(timeout.as_millis() as u64, condition.to_string()));
        Ok(false)
    }

    async fn screenshot(&mut self, path: &Path) -> E2eResult<()> {
        std::fs::write(path, self.path.as_bytes())?;
        Ok(())
    }
}
