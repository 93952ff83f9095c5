//! Core record types for the catalog store

use std::ops::RangeInclusive;

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto;

/// Inclusive bounds for generated product prices
pub const PRICE_RANGE: RangeInclusive<u32> = 10..=1000;

/// Placeholder description given to generated products
pub const PLACEHOLDER_DESCRIPTION: &str = "lorem";

/// Security role granted to an actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "ROLE_USER")]
    User,
    #[serde(rename = "ROLE_ADMIN")]
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "ROLE_USER",
            Role::Admin => "ROLE_ADMIN",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A test-created identity with credentials and a role set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub username: String,
    /// Salted digest; the plaintext never leaves [`Actor::new`]
    pub password_hash: String,
    pub roles: Vec<Role>,
}

impl Actor {
    /// Build an actor, hashing the plaintext password immediately
    pub fn new(username: impl Into<String>, plain_password: &str, roles: Vec<Role>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            username: username.into(),
            password_hash: crypto::hash_password(plain_password),
            roles,
        }
    }

    /// Build an actor holding the admin role
    pub fn admin(username: impl Into<String>, plain_password: &str) -> Self {
        Self::new(username, plain_password, vec![Role::Admin])
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Non-owning handle to this actor
    pub fn reference(&self) -> ActorRef {
        ActorRef {
            id: self.id.clone(),
            username: self.username.clone(),
        }
    }
}

/// Non-owning reference to a persisted actor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorRef {
    pub id: String,
    pub username: String,
}

/// A catalog product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: u32,
    pub description: String,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub author: Option<ActorRef>,
}

impl Product {
    /// Build an unpublished, unauthored product
    pub fn new(name: impl Into<String>, price: u32, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            price,
            description: description.into(),
            is_published: false,
            author: None,
        }
    }

    /// Build a product with a price drawn from [`PRICE_RANGE`]
    pub fn with_random_price<R: Rng + ?Sized>(name: impl Into<String>, rng: &mut R) -> Self {
        Self::new(name, random_price(rng), PLACEHOLDER_DESCRIPTION)
    }

    pub fn published(mut self, is_published: bool) -> Self {
        self.is_published = is_published;
        self
    }

    pub fn authored_by(mut self, author: ActorRef) -> Self {
        self.author = Some(author);
        self
    }
}

/// Draw a price uniformly from [`PRICE_RANGE`]
pub fn random_price<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    rng.gen_range(PRICE_RANGE)
}

/// Kind of managed record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Actor,
    Product,
}

impl RecordKind {
    pub fn table(&self) -> &'static str {
        match self {
            RecordKind::Actor => "users",
            RecordKind::Product => "products",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::Actor => write!(f, "actor"),
            RecordKind::Product => write!(f, "product"),
        }
    }
}

/// A record staged for the next flush
#[derive(Debug, Clone)]
pub enum Record {
    Actor(Actor),
    Product(Product),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Actor(_) => RecordKind::Actor,
            Record::Product(_) => RecordKind::Product,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Record::Actor(a) => &a.id,
            Record::Product(p) => &p.id,
        }
    }
}

impl From<Actor> for Record {
    fn from(actor: Actor) -> Self {
        Record::Actor(actor)
    }
}

impl From<Product> for Record {
    fn from(product: Product) -> Self {
        Record::Product(product)
    }
}

/// Filter for product listings
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub published_only: bool,
    pub author_id: Option<String>,
    /// Case-insensitive substring of the product name
    pub search: Option<String>,
}
