//! SQLite gateway to the catalog application's database
//!
//! Writes go through a small unit of work: [`Database::persist`] stages a
//! record, [`Database::flush`] writes everything staged in one transaction.
//! Staged records are invisible to reads until flushed.

use crate::types::{Actor, ActorRef, Product, ProductFilter, Record, RecordKind, Role};
use crate::{Error, Result};
use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Database wrapper shared by every scenario of a run
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    staged: Arc<Mutex<Vec<Record>>>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Open or create database at path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let db = Self::from_connection(conn)?;
        info!("Opened database at {:?}", path.as_ref());
        Ok(db)
    }

    /// Open in-memory database (for testing)
    pub fn open_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            staged: Arc::new(Mutex::new(Vec::new())),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                roles TEXT NOT NULL DEFAULT '[]',
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS products (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                price INTEGER NOT NULL,
                description TEXT NOT NULL,
                is_published INTEGER NOT NULL DEFAULT 0,
                author_id TEXT REFERENCES users(id),
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_products_author ON products(author_id);
            "#,
        )?;

        debug!("Database schema initialized");
        Ok(())
    }

    // ========================================================================
    // Unit of work
    // ========================================================================

    /// Delete every managed record and drop anything staged.
    ///
    /// Products go first so the author foreign key never blocks the purge.
    pub fn purge_all(&self) -> Result<usize> {
        let discarded = self.discard_staged();

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut deleted = 0;
        for kind in [RecordKind::Product, RecordKind::Actor] {
            deleted += tx.execute(&format!("DELETE FROM {}", kind.table()), [])?;
        }
        tx.commit()?;

        debug!("Purged {} record(s), discarded {} staged", deleted, discarded);
        Ok(deleted)
    }

    /// Stage a record for the next flush
    pub fn persist(&self, record: impl Into<Record>) {
        let record = record.into();
        debug!("Staged {} {}", record.kind(), record.id());
        self.staged.lock().push(record);
    }

    /// Number of staged, unflushed records
    pub fn pending(&self) -> usize {
        self.staged.lock().len()
    }

    /// Drop staged records without writing them
    pub fn discard_staged(&self) -> usize {
        let mut staged = self.staged.lock();
        let count = staged.len();
        staged.clear();
        count
    }

    /// Write every staged record in a single transaction.
    ///
    /// All-or-nothing: on error nothing is written and the staged records are
    /// dropped.
    pub fn flush(&self) -> Result<usize> {
        let records = std::mem::take(&mut *self.staged.lock());
        if records.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let now = chrono::Utc::now().timestamp();
        for record in &records {
            match record {
                Record::Actor(actor) => insert_actor(&tx, actor, now)?,
                Record::Product(product) => insert_product(&tx, product, now)?,
            }
        }
        tx.commit()?;

        debug!("Flushed {} record(s)", records.len());
        Ok(records.len())
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Count flushed records of one kind
    pub fn count(&self, kind: RecordKind) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", kind.table()),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// True when no managed record is stored
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.count(RecordKind::Actor)? == 0 && self.count(RecordKind::Product)? == 0)
    }

    /// Look an actor up by username
    pub fn find_actor_by_username(&self, username: &str) -> Result<Option<Actor>> {
        let conn = self.conn.lock();

        let row = conn
            .query_row(
                "SELECT id, username, password_hash, roles FROM users WHERE username = ?1",
                params![username],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((id, username, password_hash, roles)) => {
                let roles: Vec<Role> = serde_json::from_str(&roles)?;
                Ok(Some(Actor {
                    id,
                    username,
                    password_hash,
                    roles,
                }))
            }
            None => Ok(None),
        }
    }

    /// List products in insertion order
    pub fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        let mut clauses = Vec::new();
        let mut args: Vec<String> = Vec::new();

        if filter.published_only {
            clauses.push("p.is_published = 1".to_string());
        }
        if let Some(author_id) = &filter.author_id {
            args.push(author_id.clone());
            clauses.push(format!("p.author_id = ?{}", args.len()));
        }
        if let Some(search) = &filter.search {
            args.push(format!("%{}%", search.to_lowercase()));
            clauses.push(format!("LOWER(p.name) LIKE ?{}", args.len()));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT p.id, p.name, p.price, p.description, p.is_published, u.id, u.username
             FROM products p LEFT JOIN users u ON p.author_id = u.id
             {} ORDER BY p.created_at, p.rowid",
            where_sql
        ))?;

        let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
            let author = match (row.get::<_, Option<String>>(5)?, row.get::<_, Option<String>>(6)?) {
                (Some(id), Some(username)) => Some(ActorRef { id, username }),
                _ => None,
            };
            Ok(Product {
                id: row.get(0)?,
                name: row.get(1)?,
                price: row.get(2)?,
                description: row.get(3)?,
                is_published: row.get(4)?,
                author,
            })
        })?;

        let mut products = Vec::new();
        for row in rows {
            products.push(row?);
        }
        Ok(products)
    }

    /// Delete one flushed record
    pub fn delete(&self, kind: RecordKind, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", kind.table()),
            params![id],
        )?;

        if rows > 0 {
            debug!("Deleted {} with id {}", kind, id);
        }

        Ok(rows > 0)
    }
}

fn insert_actor(tx: &Transaction<'_>, actor: &Actor, now: i64) -> Result<()> {
    let taken: i64 = tx.query_row(
        "SELECT COUNT(*) FROM users WHERE username = ?1",
        params![actor.username],
        |row| row.get(0),
    )?;
    if taken > 0 {
        return Err(Error::AlreadyExists {
            kind: RecordKind::Actor.to_string(),
            key: actor.username.clone(),
        });
    }

    tx.execute(
        "INSERT INTO users (id, username, password_hash, roles, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            actor.id,
            actor.username,
            actor.password_hash,
            serde_json::to_string(&actor.roles)?,
            now,
        ],
    )?;
    Ok(())
}

fn insert_product(tx: &Transaction<'_>, product: &Product, now: i64) -> Result<()> {
    if let Some(author) = &product.author {
        let exists: i64 = tx.query_row(
            "SELECT COUNT(*) FROM users WHERE id = ?1",
            params![author.id],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(Error::DanglingReference {
                kind: RecordKind::Product.to_string(),
                target: RecordKind::Actor.to_string(),
                id: author.id.clone(),
            });
        }
    }

    tx.execute(
        "INSERT INTO products (id, name, price, description, is_published, author_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            product.id,
            product.name,
            product.price,
            product.description,
            product.is_published,
            product.author.as_ref().map(|a| a.id.as_str()),
            now,
        ],
    )?;
    Ok(())
}
