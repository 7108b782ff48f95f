//! Per-request scopes hanging off a global scope.

use std::convert::Infallible;
use std::result::Result;
use std::sync::Arc;

use parking_lot::Mutex;
use warren::injectable;
use warren::prelude::*;

// === Define your types ===

struct Config {
    database_url: String,
}

struct Database {
    url: String,
}

impl Database {
    fn query(&self, sql: &str) -> String {
        format!("{sql} @ {}", self.url)
    }
}

/// Per-request unit of work; statements are applied on `commit`.
struct Transaction {
    db: Arc<Database>,
    statements: Mutex<Vec<String>>,
}

struct UserService {
    tx: Arc<Transaction>,
}

impl UserService {
    fn rename(&self, id: u64, name: &str) {
        self.tx
            .statements
            .lock()
            .push(format!("UPDATE users SET name = '{name}' WHERE id = {id}"));
    }
}

// === Factories ===

#[injectable]
async fn connect(config: Arc<Config>) -> Result<Database, Infallible> {
    Ok(Database {
        url: config.database_url.clone(),
    })
}

#[injectable]
fn begin(db: Arc<Database>) -> Result<Transaction, Infallible> {
    Ok(Transaction {
        db,
        statements: Mutex::new(Vec::new()),
    })
}

#[injectable]
fn commit(#[receiver] tx: Arc<Transaction>) -> Result<usize, Infallible> {
    let statements = tx.statements.lock();
    for sql in statements.iter() {
        println!("💾 {}", tx.db.query(sql));
    }
    Ok(statements.len())
}

#[injectable]
fn user_service(tx: Arc<Transaction>) -> Result<UserService, Infallible> {
    Ok(UserService { tx })
}

#[tokio::main]
async fn main() -> warren::prelude::Result<()> {
    // Initialize tracing (logging)
    tracing_subscriber::fmt()
        .with_env_filter("warren=debug,warren_container=debug")
        .init();

    let registry = Registry::new();

    // Global scope: one database for the whole process
    registry
        .define("global", None)?
        .constant(
            "config",
            Config {
                database_url: "postgres://localhost/myapp".to_string(),
            },
        )?
        .resolver("db", connect())?;

    // Request scope: one transaction per request, committed at the end
    registry
        .define("request", Some("global"))?
        .resolver("tx", Actions::create(begin()).action("commit", commit()))?
        .resolver("users", user_service())?;

    println!("✅ Registry built: {:?}", registry.definitions());

    let global = registry.create_root("global")?;

    for (id, name) in [(1, "ada"), (2, "grace")] {
        let request = global.create_child("request")?;

        let users: Arc<UserService> = request.resolve_as("users").await?;
        users.rename(id, name);

        let committed = request.action("commit").await?;
        let count = committed[0].downcast_ref::<usize>().copied().unwrap_or_default();
        println!("👤 request {id}: committed {count} statement(s)");
    }
    // request scopes dropped; the database lives on in the global scope

    let db_a = global.resolve("db").await?;
    let db_b = global.resolve("db").await?;
    println!("🔁 Same database instance: {}", db_a.ptr_eq(&db_b));

    println!("\n🎉 Everything works!");
    Ok(())
}
