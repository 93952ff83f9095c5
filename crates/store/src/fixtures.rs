//! Fixture loading
//!
//! Fixtures are registered by name in a [`FixtureRegistry`] and executed in
//! registration order. The [`FixtureExecutor`] stages everything the fixtures
//! produce and writes it with a single flush, so a set either loads
//! completely or not at all.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::types::{random_price, Actor, ActorRef, Product, Record, Role, PLACEHOLDER_DESCRIPTION};
use crate::{Error, Result};

/// A unit that constructs records and registers them with the store
pub trait Fixture: Send + Sync {
    fn load(&self, manager: &mut FixtureManager<'_>) -> Result<()>;
}

/// Handed to each fixture while a set is executing
pub struct FixtureManager<'a> {
    db: &'a Database,
    references: HashMap<String, ActorRef>,
    staged: usize,
}

impl<'a> FixtureManager<'a> {
    fn new(db: &'a Database) -> Self {
        Self {
            db,
            references: HashMap::new(),
            staged: 0,
        }
    }

    /// Stage a record; it is written when the whole set has loaded
    pub fn persist(&mut self, record: impl Into<Record>) {
        self.db.persist(record);
        self.staged += 1;
    }

    /// Make an actor available to fixtures that run later
    pub fn add_reference(&mut self, name: impl Into<String>, actor: ActorRef) {
        self.references.insert(name.into(), actor);
    }

    pub fn actor_reference(&self, name: &str) -> Result<ActorRef> {
        self.references
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownReference(name.to_string()))
    }

    /// Records staged so far in this execution
    pub fn staged(&self) -> usize {
        self.staged
    }
}

/// Adapts a closure into a [`Fixture`]
pub struct FnFixture<F>(F);

impl<F> FnFixture<F>
where
    F: Fn(&mut FixtureManager<'_>) -> Result<()> + Send + Sync,
{
    pub fn new(load: F) -> Self {
        Self(load)
    }
}

impl<F> Fixture for FnFixture<F>
where
    F: Fn(&mut FixtureManager<'_>) -> Result<()> + Send + Sync,
{
    fn load(&self, manager: &mut FixtureManager<'_>) -> Result<()> {
        (self.0)(manager)
    }
}

/// Declarative seed file
///
/// ```yaml
/// users:
///   - username: editor
///     password: editor
///     roles: [ROLE_ADMIN]
/// products:
///   - name: Samsung Galaxy
///     price: 500
///     is_published: true
///     author: editor
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub users: Vec<SeedUser>,
    #[serde(default)]
    pub products: Vec<SeedProduct>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedUser {
    pub username: String,
    pub password: String,
    #[serde(default = "default_roles")]
    pub roles: Vec<Role>,
    /// Reference name for later products; defaults to the username
    #[serde(default)]
    pub reference: Option<String>,
}

fn default_roles() -> Vec<Role> {
    vec![Role::User]
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedProduct {
    pub name: String,
    /// Drawn from the generated price range when absent
    #[serde(default)]
    pub price: Option<u32>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_published: bool,
    /// Reference name of a user defined earlier in the set
    #[serde(default)]
    pub author: Option<String>,
}

/// Fixture backed by a YAML seed file
#[derive(Debug, Clone)]
pub struct YamlFixture {
    source: PathBuf,
    seed: SeedFile,
}

impl YamlFixture {
    /// Parse a seed document held in memory
    pub fn from_yaml(source: impl Into<PathBuf>, yaml: &str) -> Result<Self> {
        Ok(Self {
            source: source.into(),
            seed: serde_yaml::from_str(yaml)?,
        })
    }

    /// Parse a seed file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(path.as_ref(), &content)
    }

    pub fn seed(&self) -> &SeedFile {
        &self.seed
    }
}

impl Fixture for YamlFixture {
    fn load(&self, manager: &mut FixtureManager<'_>) -> Result<()> {
        debug!("Loading seed file {}", self.source.display());
        let mut rng = rand::thread_rng();

        for user in &self.seed.users {
            let actor = Actor::new(user.username.clone(), &user.password, user.roles.clone());
            let name = user.reference.clone().unwrap_or_else(|| user.username.clone());
            manager.add_reference(name, actor.reference());
            manager.persist(actor);
        }

        for seed in &self.seed.products {
            let mut product = Product::new(
                seed.name.clone(),
                seed.price.unwrap_or_else(|| random_price(&mut rng)),
                seed.description.clone().unwrap_or_else(|| PLACEHOLDER_DESCRIPTION.to_string()),
            )
            .published(seed.is_published);
            if let Some(author) = &seed.author {
                product = product.authored_by(manager.actor_reference(author)?);
            }
            manager.persist(product);
        }

        Ok(())
    }
}

/// Named fixtures in declaration order
#[derive(Default)]
pub struct FixtureRegistry {
    fixtures: Vec<(String, Box<dyn Fixture>)>,
}

impl std::fmt::Debug for FixtureRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixtureRegistry")
            .field("fixtures", &self.names())
            .finish()
    }
}

impl FixtureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fixture; names must be unique
    pub fn register(&mut self, name: impl Into<String>, fixture: impl Fixture + 'static) -> Result<&mut Self> {
        let name = name.into();
        if self.fixtures.iter().any(|(existing, _)| *existing == name) {
            return Err(Error::DuplicateFixture(name));
        }
        self.fixtures.push((name, Box::new(fixture)));
        Ok(self)
    }

    /// Register a YAML seed file under the given name
    pub fn register_yaml(&mut self, name: impl Into<String>, path: impl AsRef<Path>) -> Result<&mut Self> {
        let fixture = YamlFixture::from_file(path)?;
        self.register(name, fixture)
    }

    pub fn names(&self) -> Vec<&str> {
        self.fixtures.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }

    fn iter(&self) -> impl Iterator<Item = (&str, &dyn Fixture)> {
        self.fixtures.iter().map(|(name, fixture)| (name.as_str(), fixture.as_ref()))
    }
}

/// Whether the executor clears the store before loading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteMode {
    Purge,
    Append,
}

/// Outcome of a fixture execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub fixtures: Vec<String>,
    pub records: usize,
    pub purged: bool,
}

/// Runs a registry against the store as one transactional unit
pub struct FixtureExecutor<'a> {
    db: &'a Database,
}

impl<'a> FixtureExecutor<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn execute(&self, registry: &FixtureRegistry, mode: ExecuteMode) -> Result<LoadReport> {
        let purged = mode == ExecuteMode::Purge;
        if purged {
            self.db.purge_all()?;
        }

        let stray = self.db.discard_staged();
        if stray > 0 {
            warn!("Discarded {} staged record(s) left before fixture load", stray);
        }

        let mut manager = FixtureManager::new(self.db);
        let mut loaded = Vec::with_capacity(registry.len());
        for (name, fixture) in registry.iter() {
            debug!("Running fixture {}", name);
            if let Err(e) = fixture.load(&mut manager) {
                self.db.discard_staged();
                return Err(Error::Fixture {
                    name: name.to_string(),
                    reason: e.to_string(),
                });
            }
            loaded.push(name.to_string());
        }

        let records = self.db.flush()?;
        info!("Loaded {} fixture(s), {} record(s)", loaded.len(), records);

        Ok(LoadReport {
            fixtures: loaded,
            records,
            purged,
        })
    }
}
