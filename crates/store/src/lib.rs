//! Catalog Store
//!
//! Data store gateway, record types and fixture loading shared by the catalog
//! scenario harness.

pub mod crypto;
pub mod db;
pub mod error;
pub mod fixtures;
pub mod types;

pub use db::Database;
pub use error::{Error, Result};
pub use fixtures::{
    ExecuteMode, FixtureExecutor, FixtureManager, FixtureRegistry, FnFixture, LoadReport,
    YamlFixture,
};
pub use types::*;
