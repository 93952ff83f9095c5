//! In-process stand-in for the catalog application
//!
//! Renders the handful of pages the features touch straight from the shared
//! store, so scenarios run end to end without a browser or a web server.
//!
//! | Path                   | Access | Content                                   |
//! |------------------------|--------|-------------------------------------------|
//! | `/`                    | public | product table, search box                 |
//! | `/login`               | public | `Username`/`Password` form, `Login`       |
//! | `/admin/products`      | admin  | every product, check marks, `Delete`      |
//! | `/admin/products/mine` | admin  | products authored by the logged-in actor  |

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use catalog_e2e::context::{RESULTS_TABLE, RESULT_ROWS, SEARCH_BOX, SEARCH_BUTTON, TABLE_ROWS};
use catalog_e2e::{BrowserSession, E2eError, E2eResult, Element, SessionLauncher};
use catalog_store::crypto::verify_password;
use catalog_store::{Actor, Database, Product, ProductFilter, RecordKind, Role};
use tracing::debug;

const CHECK_MARK_HTML: &str = r#"<i class="fa fa-check"></i>"#;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Page {
    Catalog { search: Option<String> },
    Login,
    AdminProducts,
    MyProducts,
    Missing,
}

impl Page {
    fn route(path: &str) -> Self {
        let (route, query) = match path.split_once('?') {
            Some((route, query)) => (route, Some(query)),
            None => (path, None),
        };
        match route {
            "/" | "" => Page::Catalog {
                search: query
                    .and_then(|q| q.split('&').find_map(|kv| kv.strip_prefix("searchTerm=")))
                    .filter(|term| !term.is_empty())
                    .map(String::from),
            },
            "/login" => Page::Login,
            "/admin/products" => Page::AdminProducts,
            "/admin/products/mine" => Page::MyProducts,
            _ => Page::Missing,
        }
    }

    fn requires_admin(&self) -> bool {
        matches!(self, Page::AdminProducts | Page::MyProducts)
    }

    fn has_table(&self) -> bool {
        matches!(self, Page::Catalog { .. } | Page::AdminProducts | Page::MyProducts)
    }

    fn links(&self) -> &'static [(&'static str, Link)] {
        match self {
            Page::Catalog { .. } => &[("Log In", Link::Go("/login"))],
            Page::AdminProducts | Page::MyProducts => &[
                ("New Product", Link::OpenModal),
                ("My Products", Link::Go("/admin/products/mine")),
                ("All Products", Link::Go("/admin/products")),
                ("Catalog", Link::Go("/")),
            ],
            Page::Login | Page::Missing => &[],
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Link {
    Go(&'static str),
    OpenModal,
}

/// Hands every scenario its own simulated session over the shared store
pub struct SimLauncher {
    store: Database,
}

impl SimLauncher {
    pub fn new(store: Database) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SessionLauncher for SimLauncher {
    async fn launch(&self) -> E2eResult<Box<dyn BrowserSession>> {
        Ok(Box::new(SimSession::new(self.store.clone())))
    }
}

pub struct SimSession {
    store: Database,
    path: String,
    page: Page,
    user: Option<Actor>,
    generation: u64,
    modal_open: bool,
    search_input: String,
    username_input: String,
    password_input: String,
}

impl SimSession {
    pub fn new(store: Database) -> Self {
        Self {
            store,
            path: "/".to_string(),
            page: Page::route("/"),
            user: None,
            generation: 0,
            modal_open: false,
            search_input: String::new(),
            username_input: String::new(),
            password_input: String::new(),
        }
    }

    fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.has_role(Role::Admin))
    }

    fn navigate(&mut self, path: &str) {
        let page = Page::route(path);
        if page.requires_admin() && !self.is_admin() {
            debug!("Redirecting {} to /login", path);
            self.path = "/login".to_string();
            self.page = Page::Login;
        } else {
            self.path = path.to_string();
            self.page = page;
        }
        self.modal_open = false;
        self.search_input.clear();
        self.username_input.clear();
        self.password_input.clear();
        self.generation += 1;
    }

    fn products(&self) -> E2eResult<Vec<Product>> {
        let filter = match &self.page {
            Page::Catalog { search } => ProductFilter {
                search: search.clone(),
                ..Default::default()
            },
            Page::AdminProducts => ProductFilter::default(),
            Page::MyProducts => ProductFilter {
                author_id: self.user.as_ref().map(|u| u.id.clone()),
                ..Default::default()
            },
            Page::Login | Page::Missing => return Ok(Vec::new()),
        };
        Ok(self.store.list_products(&filter)?)
    }

    fn admin_view(&self) -> bool {
        matches!(self.page, Page::AdminProducts | Page::MyProducts)
    }

    fn row_markup(&self, product: &Product) -> (String, String) {
        let text = format!("{} {}", product.name, product.price);
        let mut html = format!("<td>{}</td><td>{}</td>", product.name, product.price);
        if self.admin_view() {
            let check = if product.is_published { CHECK_MARK_HTML } else { "" };
            html.push_str(&format!(
                r#"<td>{}</td><td><button class="btn btn-danger">Delete</button></td>"#,
                check
            ));
        }
        (text, html)
    }

    fn header_markup(&self) -> (String, String) {
        if self.admin_view() {
            (
                "Name Price Published".to_string(),
                "<th>Name</th><th>Price</th><th>Published</th><th></th>".to_string(),
            )
        } else {
            ("Name Price".to_string(), "<th>Name</th><th>Price</th>".to_string())
        }
    }

    fn render(&self) -> E2eResult<String> {
        let mut html = format!("<html><body data-path=\"{}\">", self.path);
        if self.page == Page::Login {
            html.push_str(r#"<form><label>Username <input name="_username"></label><label>Password <input name="_password" type="password"></label><button>Login</button></form>"#);
        }
        if self.page.has_table() {
            if matches!(self.page, Page::Catalog { .. }) {
                html.push_str(r#"<input name="searchTerm"><button id="search_submit">Search</button>"#);
            }
            html.push_str(r#"<table class="table"><thead><tr>"#);
            html.push_str(&self.header_markup().1);
            html.push_str("</tr></thead><tbody>");
            for product in self.products()? {
                html.push_str(&format!("<tr>{}</tr>", self.row_markup(&product).1));
            }
            html.push_str("</tbody></table>");
        }
        if self.modal_open {
            html.push_str(r#"<div class="modal" style="display: block"></div>"#);
        }
        html.push_str("</body></html>");
        Ok(html)
    }

    fn login(&mut self) -> E2eResult<()> {
        let actor = self.store.find_actor_by_username(&self.username_input)?;
        match actor {
            Some(actor) if verify_password(&self.password_input, &actor.password_hash) => {
                debug!("Simulated login for {}", actor.username);
                let landing = if actor.has_role(Role::Admin) { "/admin/products" } else { "/" };
                self.user = Some(actor);
                self.navigate(landing);
            }
            _ => {
                debug!("Simulated login rejected for {}", self.username_input);
                self.navigate("/login");
            }
        }
        Ok(())
    }

    fn search(&mut self) {
        let target = format!("/?searchTerm={}", self.search_input);
        self.navigate(&target);
    }

    fn delete_row(&mut self, row: &Element) -> E2eResult<()> {
        let Some(segment) = row.path.last() else {
            return Err(E2eError::not_found("row", row.locator()));
        };
        let index = match segment.selector.as_str() {
            TABLE_ROWS => segment.index.checked_sub(1),
            RESULT_ROWS => Some(segment.index),
            _ => None,
        };
        let products = self.products()?;
        let product = index
            .and_then(|i| products.into_iter().nth(i))
            .ok_or_else(|| E2eError::not_found("row", row.locator()))?;

        self.store.delete(RecordKind::Product, &product.id)?;
        let path = self.path.clone();
        self.navigate(&path);
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for SimSession {
    async fn visit(&mut self, path: &str) -> E2eResult<()> {
        self.navigate(path);
        Ok(())
    }

    async fn current_path(&mut self) -> E2eResult<String> {
        Ok(self.path.clone())
    }

    async fn find_all(&mut self, scope: Option<&Element>, selector: &str) -> E2eResult<Vec<Element>> {
        let scope_selector = scope.and_then(|s| s.path.last()).map(|s| s.selector.as_str());
        let generation = self.generation;
        let element = |index: usize, (text, html): (String, String)| {
            Element::child_of(scope, selector, index, text, html, generation)
        };

        let is_catalog = matches!(self.page, Page::Catalog { .. });
        let found = match selector {
            SEARCH_BOX if is_catalog => vec![element(0, (String::new(), String::new()))],
            SEARCH_BUTTON if is_catalog => vec![element(0, ("Search".to_string(), "Search".to_string()))],
            RESULTS_TABLE if self.page.has_table() => {
                let html = self.render()?;
                vec![element(0, (String::new(), html))]
            }
            RESULT_ROWS if self.page.has_table() && scope_selector.map_or(true, |s| s == RESULTS_TABLE) => self
                .products()?
                .iter()
                .enumerate()
                .map(|(i, p)| element(i, self.row_markup(p)))
                .collect(),
            TABLE_ROWS if self.page.has_table() => std::iter::once(self.header_markup())
                .chain(self.products()?.iter().map(|p| self.row_markup(p)))
                .enumerate()
                .map(|(i, markup)| element(i, markup))
                .collect(),
            _ => Vec::new(),
        };
        Ok(found)
    }

    async fn set_value(&mut self, element: &Element, value: &str) -> E2eResult<()> {
        element.ensure_current(self.generation)?;
        match element.path.last().map(|s| s.selector.as_str()) {
            Some(SEARCH_BOX) => {
                self.search_input = value.to_string();
                Ok(())
            }
            _ => Err(E2eError::not_found("input", element.locator())),
        }
    }

    async fn press(&mut self, element: &Element) -> E2eResult<()> {
        element.ensure_current(self.generation)?;
        match element.path.last().map(|s| s.selector.as_str()) {
            Some(SEARCH_BUTTON) => {
                self.search();
                Ok(())
            }
            _ => Err(E2eError::not_found("button", element.locator())),
        }
    }

    async fn click_link(&mut self, text: &str) -> E2eResult<()> {
        let link = self
            .page
            .links()
            .iter()
            .find(|(label, _)| *label == text)
            .map(|(_, link)| *link)
            .ok_or_else(|| E2eError::not_found("link", text))?;

        match link {
            Link::Go(path) => self.navigate(path),
            Link::OpenModal => self.modal_open = true,
        }
        Ok(())
    }

    async fn fill_field(&mut self, label: &str, value: &str) -> E2eResult<()> {
        match (&self.page, label) {
            (Page::Login, "Username" | "_username") => self.username_input = value.to_string(),
            (Page::Login, "Password" | "_password") => self.password_input = value.to_string(),
            (Page::Catalog { .. }, "searchTerm") => self.search_input = value.to_string(),
            _ => return Err(E2eError::not_found("form field", label)),
        }
        Ok(())
    }

    async fn press_button(&mut self, label: &str, scope: Option<&Element>) -> E2eResult<()> {
        if let Some(row) = scope {
            row.ensure_current(self.generation)?;
            return match label {
                "Delete" if self.admin_view() => self.delete_row(row),
                _ => Err(E2eError::not_found("button", format!("{} in {}", label, row.locator()))),
            };
        }

        match (&self.page, label) {
            (Page::Login, "Login") => self.login(),
            (Page::Catalog { .. }, "Search" | "search_submit") => {
                self.search();
                Ok(())
            }
            _ => Err(E2eError::not_found("button", label)),
        }
    }

    async fn wait(&mut self, _timeout: Duration, condition: &str) -> E2eResult<bool> {
        if condition.contains(".modal") {
            Ok(self.modal_open)
        } else {
            Ok(false)
        }
    }

    async fn screenshot(&mut self, path: &Path) -> E2eResult<()> {
        std::fs::write(path, self.render()?)?;
        Ok(())
    }
}
