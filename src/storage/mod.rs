//! Account persistence.
//!
//! Two backends implement [`AccountStore`]: a JSON file holding an array of
//! account records, and a SQLite database with `accounts` and `transactions`
//! tables. [`Store`] picks one at runtime.

mod json;
mod sqlite;

use anyhow::Result;

use crate::domain::{Account, Accounts};

pub use json::JsonStore;
pub use sqlite::SqliteStore;

/// SQL migration for the initial schema
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");

/// Loads and persists the full set of accounts.
///
/// Errors from any method mean the backing medium could not be read, parsed
/// or written.
#[allow(async_fn_in_trait)]
pub trait AccountStore {
    /// Prepare the backing medium. Safe to call on an existing store.
    async fn init(&self) -> Result<()>;

    /// Read every account, with its transaction log.
    async fn load(&self) -> Result<Accounts>;

    /// Write back every account in `accounts`.
    async fn save(&self, accounts: &Accounts) -> Result<()>;

    /// Insert or replace a single account.
    async fn save_account(&self, account: &Account) -> Result<()>;

    async fn find(&self, account_number: &str) -> Result<Option<Account>> {
        Ok(self.load().await?.remove(account_number))
    }
}

/// Which backend a [`Store`] should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    #[default]
    Json,
    Sqlite,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Json => "json",
            Backend::Sqlite => "sqlite",
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Backend::Json),
            "sqlite" | "sqlite3" | "db" => Ok(Backend::Sqlite),
            other => Err(format!("unknown backend '{}' (expected json or sqlite)", other)),
        }
    }
}

/// A store whose backend is chosen at runtime.
pub enum Store {
    Json(JsonStore),
    Sqlite(SqliteStore),
}

impl Store {
    /// Open the store at `path`. The SQLite file is created if missing.
    pub async fn open(backend: Backend, path: &str) -> Result<Self> {
        Ok(match backend {
            Backend::Json => Store::Json(JsonStore::new(path)),
            Backend::Sqlite => Store::Sqlite(SqliteStore::open(path).await?),
        })
    }
}

impl AccountStore for Store {
    async fn init(&self) -> Result<()> {
        match self {
            Store::Json(store) => store.init().await,
            Store::Sqlite(store) => store.init().await,
        }
    }

    async fn load(&self) -> Result<Accounts> {
        match self {
            Store::Json(store) => store.load().await,
            Store::Sqlite(store) => store.load().await,
        }
    }

    async fn save(&self, accounts: &Accounts) -> Result<()> {
        match self {
            Store::Json(store) => store.save(accounts).await,
            Store::Sqlite(store) => store.save(accounts).await,
        }
    }

    async fn save_account(&self, account: &Account) -> Result<()> {
        match self {
            Store::Json(store) => store.save_account(account).await,
            Store::Sqlite(store) => store.save_account(account).await,
        }
    }

    async fn find(&self, account_number: &str) -> Result<Option<Account>> {
        match self {
            Store::Json(store) => store.find(account_number).await,
            Store::Sqlite(store) => store.find(account_number).await,
        }
    }
}
