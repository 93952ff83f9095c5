//! Playwright browser automation
//!
//! A generated Node script keeps one browser alive for the whole run and
//! answers JSON requests, one per line, on stdin/stdout. Each scenario opens a
//! fresh browser context so cookies never leak between scenarios.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::browser::{BrowserSession, Element, SessionLauncher};
use crate::error::{E2eError, E2eResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for Browser {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chromium" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" => Ok(Browser::Webkit),
            other => Err(format!("unknown browser '{}'", other)),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub base_url: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub browser: Browser,
    pub headless: bool,
    /// `node_modules` directory holding the `playwright` package
    pub node_path: Option<PathBuf>,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            viewport_width: 1280,
            viewport_height: 720,
            browser: Browser::Chromium,
            headless: true,
            node_path: None,
        }
    }
}

const DRIVER_TEMPLATE: &str = r#"
const { chromium, firefox, webkit } = require('playwright');
const readline = require('readline');

class NotFound extends Error {
  constructor(what, locator) {
    super(`Could not find the ${what} (${locator})`);
    this.what = what;
    this.locator = locator;
  }
}

const respond = (msg) => process.stdout.write(JSON.stringify(msg) + '\n');
const attr = (name, value) => `[${name}=${JSON.stringify(value)}]`;

(async () => {
  const browser = await __BROWSER__.launch({ headless: __HEADLESS__ });
  const baseUrl = __BASE_URL__;
  let context = null;
  let page = null;

  const resolve = (path) => {
    let loc = page;
    for (const seg of path || []) {
      loc = loc.locator(seg.selector).nth(seg.index);
    }
    return loc;
  };

  const first = async (candidates) => {
    for (const loc of candidates) {
      if ((await loc.count()) > 0) return loc.first();
    }
    return null;
  };

  const handlers = {
    async open() {
      if (context) await context.close();
      context = await browser.newContext({
        viewport: { width: __WIDTH__, height: __HEIGHT__ }
      });
      page = await context.newPage();
      return null;
    },
    async visit({ path }) {
      await page.goto(baseUrl + path);
      return null;
    },
    async current_path() {
      const url = new URL(page.url());
      return url.pathname + url.search;
    },
    async find_all({ scope, selector }) {
      const loc = resolve(scope).locator(selector);
      const found = [];
      const count = await loc.count();
      for (let i = 0; i < count; i++) {
        const el = loc.nth(i);
        found.push({ text: await el.innerText(), html: await el.innerHTML() });
      }
      return found;
    },
    async set_value({ path, value }) {
      await resolve(path).fill(value);
      return null;
    },
    async press({ path }) {
      await resolve(path).click();
      return null;
    },
    async click_link({ text }) {
      const link = await first([
        page.locator('a' + attr('id', text)),
        page.locator('a' + attr('title', text)),
        page.getByRole('link', { name: text, exact: true }),
        page.locator('a', { hasText: text }),
      ]);
      if (!link) throw new NotFound('link', text);
      await link.click();
      return null;
    },
    async fill_field({ label, value }) {
      const field = await first([
        page.getByLabel(label, { exact: true }),
        page.locator('input' + attr('id', label) + ', textarea' + attr('id', label)),
        page.locator('input' + attr('name', label) + ', textarea' + attr('name', label)),
        page.getByPlaceholder(label, { exact: true }),
      ]);
      if (!field) throw new NotFound('form field', label);
      await field.fill(value);
      return null;
    },
    async press_button({ scope, label }) {
      const base = resolve(scope);
      const field = await first([
        base.locator('button' + attr('id', label) + ', input' + attr('id', label)),
        base.locator('button' + attr('name', label) + ', input' + attr('name', label)),
        base.locator('input[type=submit]' + attr('value', label) + ', input[type=button]' + attr('value', label)),
        base.getByRole('button', { name: label, exact: true }),
      ]);
      if (!field) throw new NotFound('button', label);
      await field.click();
      return null;
    },
    async wait({ timeout, condition }) {
      try {
        await page.waitForFunction(condition, null, { timeout, polling: 100 });
        return true;
      } catch (e) {
        if (e.name === 'TimeoutError') return false;
        throw e;
      }
    },
    async screenshot({ path }) {
      await page.screenshot({ path, fullPage: true });
      return null;
    },
  };

  respond({ ready: true });

  const rl = readline.createInterface({ input: process.stdin });
  for await (const line of rl) {
    if (!line.trim()) continue;
    const req = JSON.parse(line);
    if (req.cmd === 'close') break;
    try {
      const handler = handlers[req.cmd];
      if (!handler) throw new Error(`unknown command ${req.cmd}`);
      respond({ id: req.id, ok: true, value: await handler(req.args || {}) });
    } catch (e) {
      const notFound = e instanceof NotFound ? { what: e.what, locator: e.locator } : null;
      respond({ id: req.id, ok: false, error: e.message, not_found: notFound });
    }
  }
  await browser.close();
})().catch((e) => {
  respond({ ready: false, error: e.message });
  process.exit(1);
});
"#;

/// Render the driver script for a configuration
pub fn build_driver_script(config: &PlaywrightConfig) -> String {
    DRIVER_TEMPLATE
        .replace("__BROWSER__", config.browser.as_str())
        .replace("__HEADLESS__", if config.headless { "true" } else { "false" })
        .replace("__BASE_URL__", &Value::String(config.base_url.clone()).to_string())
        .replace("__WIDTH__", &config.viewport_width.to_string())
        .replace("__HEIGHT__", &config.viewport_height.to_string())
}

#[derive(Debug, Serialize)]
struct Request<'a> {
    id: u64,
    cmd: &'a str,
    args: Value,
}

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    ready: Option<bool>,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    not_found: Option<NotFoundInfo>,
}

#[derive(Debug, Deserialize)]
struct NotFoundInfo {
    what: String,
    locator: String,
}

#[derive(Debug, Deserialize)]
struct FoundElement {
    text: String,
    html: String,
}

impl Response {
    fn into_result(self) -> E2eResult<Value> {
        if self.ok {
            return Ok(self.value);
        }
        match self.not_found {
            Some(nf) => Err(E2eError::not_found(nf.what, nf.locator)),
            None => Err(E2eError::Playwright(
                self.error.unwrap_or_else(|| "unknown driver error".to_string()),
            )),
        }
    }
}

/// The Node process running the driver script
pub struct PlaywrightDriver {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    _script_dir: TempDir,
}

impl PlaywrightDriver {
    /// Start Node with the driver script and wait until the browser is up
    pub async fn spawn(config: &PlaywrightConfig) -> E2eResult<Self> {
        Self::check_playwright_installed()?;

        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("driver.js");
        std::fs::write(&script_path, build_driver_script(config))?;

        debug!("Starting Playwright driver: {}", script_path.display());

        let mut cmd = TokioCommand::new("node");
        cmd.arg(&script_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(node_path) = &config.node_path {
            cmd.env("NODE_PATH", node_path);
        }

        let mut child = cmd.spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Playwright("driver stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Playwright("driver stdout unavailable".to_string()))?;

        let mut driver = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 0,
            _script_dir: script_dir,
        };
        driver.wait_ready().await?;

        info!("Playwright driver ready ({})", config.browser.as_str());
        Ok(driver)
    }

    /// Check if Playwright is installed
    fn check_playwright_installed() -> E2eResult<()> {
        let output = Command::new("npx")
            .args(["playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    async fn wait_ready(&mut self) -> E2eResult<()> {
        let response = self.read_response().await?;
        match response.ready {
            Some(true) => Ok(()),
            _ => Err(E2eError::Playwright(
                response
                    .error
                    .unwrap_or_else(|| "driver failed to start".to_string()),
            )),
        }
    }

    async fn read_response(&mut self) -> E2eResult<Response> {
        match self.stdout.next_line().await? {
            Some(line) => Ok(serde_json::from_str(&line)?),
            None => Err(E2eError::Playwright("driver exited unexpectedly".to_string())),
        }
    }

    /// Send one command and wait for its answer
    pub async fn request(&mut self, cmd: &str, args: Value) -> E2eResult<Value> {
        self.next_id += 1;
        let id = self.next_id;

        let mut line = serde_json::to_string(&Request { id, cmd, args })?;
        line.push('\n');
        debug!("playwright -> {}", line.trim_end());
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;

        loop {
            let response = self.read_response().await?;
            if response.id == Some(id) {
                return response.into_result();
            }
            warn!("Ignoring out-of-order driver response {:?}", response.id);
        }
    }

    /// Ask the driver to close the browser and wait for it to exit
    pub async fn shutdown(&mut self) -> E2eResult<()> {
        self.stdin.write_all(b"{\"id\":0,\"cmd\":\"close\"}\n").await?;
        self.stdin.flush().await?;
        let status = self.child.wait().await?;
        debug!("Playwright driver exited with {}", status);
        Ok(())
    }
}

/// Shares one driver between the sessions of a run
#[derive(Clone)]
pub struct PlaywrightLauncher {
    driver: Arc<Mutex<PlaywrightDriver>>,
}

impl PlaywrightLauncher {
    pub async fn start(config: &PlaywrightConfig) -> E2eResult<Self> {
        let driver = PlaywrightDriver::spawn(config).await?;
        Ok(Self {
            driver: Arc::new(Mutex::new(driver)),
        })
    }

    pub async fn shutdown(&self) -> E2eResult<()> {
        self.driver.lock().await.shutdown().await
    }
}

#[async_trait]
impl SessionLauncher for PlaywrightLauncher {
    async fn launch(&self) -> E2eResult<Box<dyn BrowserSession>> {
        self.driver.lock().await.request("open", json!({})).await?;
        Ok(Box::new(PlaywrightSession {
            driver: Arc::clone(&self.driver),
            generation: 0,
        }))
    }
}

/// One scenario's browser context
pub struct PlaywrightSession {
    driver: Arc<Mutex<PlaywrightDriver>>,
    generation: u64,
}

impl PlaywrightSession {
    async fn request(&self, cmd: &str, args: Value) -> E2eResult<Value> {
        self.driver.lock().await.request(cmd, args).await
    }

    async fn navigating(&mut self, cmd: &str, args: Value) -> E2eResult<()> {
        let result = self.request(cmd, args).await;
        self.generation += 1;
        result.map(|_| ())
    }
}

#[async_trait]
impl BrowserSession for PlaywrightSession {
    async fn visit(&mut self, path: &str) -> E2eResult<()> {
        self.navigating("visit", json!({ "path": path })).await
    }

    async fn current_path(&mut self) -> E2eResult<String> {
        match self.request("current_path", json!({})).await? {
            Value::String(path) => Ok(path),
            other => Err(E2eError::Playwright(format!("unexpected path value {}", other))),
        }
    }

    async fn find_all(&mut self, scope: Option<&Element>, selector: &str) -> E2eResult<Vec<Element>> {
        if let Some(scope) = scope {
            scope.ensure_current(self.generation)?;
        }
        let value = self
            .request(
                "find_all",
                json!({ "scope": scope.map(|s| &s.path), "selector": selector }),
            )
            .await?;
        let found: Vec<FoundElement> = serde_json::from_value(value)?;

        Ok(found
            .into_iter()
            .enumerate()
            .map(|(i, f)| Element::child_of(scope, selector, i, f.text, f.html, self.generation))
            .collect())
    }

    async fn set_value(&mut self, element: &Element, value: &str) -> E2eResult<()> {
        element.ensure_current(self.generation)?;
        self.request("set_value", json!({ "path": element.path, "value": value }))
            .await
            .map(|_| ())
    }

    async fn press(&mut self, element: &Element) -> E2eResult<()> {
        element.ensure_current(self.generation)?;
        self.navigating("press", json!({ "path": element.path })).await
    }

    async fn click_link(&mut self, text: &str) -> E2eResult<()> {
        self.navigating("click_link", json!({ "text": text })).await
    }

    async fn fill_field(&mut self, label: &str, value: &str) -> E2eResult<()> {
        self.request("fill_field", json!({ "label": label, "value": value }))
            .await
            .map(|_| ())
    }

    async fn press_button(&mut self, label: &str, scope: Option<&Element>) -> E2eResult<()> {
        if let Some(scope) = scope {
            scope.ensure_current(self.generation)?;
        }
        self.navigating(
            "press_button",
            json!({ "scope": scope.map(|s| &s.path), "label": label }),
        )
        .await
    }

    async fn wait(&mut self, timeout: Duration, condition: &str) -> E2eResult<bool> {
        let value = self
            .request(
                "wait",
                json!({ "timeout": timeout.as_millis() as u64, "condition": condition }),
            )
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn screenshot(&mut self, path: &Path) -> E2eResult<()> {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };
        self.request("screenshot", json!({ "path": path }))
            .await
            .map(|_| ())
    }
}
