// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use atm_ledger::application::AtmService;
use atm_ledger::storage::{AccountStore, JsonStore, SqliteStore};
use tempfile::TempDir;

/// Helper to create a test service backed by a JSON file in a temporary directory
pub async fn json_service() -> Result<(AtmService<JsonStore>, TempDir)> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("accounts.json");
    let service = AtmService::new(JsonStore::new(path));
    service.init().await?;
    Ok((service, temp_dir))
}

/// Helper to create a test service backed by a temporary SQLite database
pub async fn sqlite_service() -> Result<(AtmService<SqliteStore>, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let store = SqliteStore::open(db_path.to_str().unwrap()).await?;
    let service = AtmService::new(store);
    service.init().await?;
    Ok((service, temp_dir))
}

/// Test fixture: the two accounts used throughout the ATM scenarios
pub struct StandardAccounts;

impl StandardAccounts {
    pub const RAVI: &'static str = "1001";
    pub const RAVI_PIN: &'static str = "1234";
    pub const PRIYA: &'static str = "1002";
    pub const PRIYA_PIN: &'static str = "5678";

    /// Ravi with 1000.00, Priya with 50.00
    pub async fn create<S: AccountStore>(service: &AtmService<S>) -> Result<()> {
        service
            .open_account(Self::RAVI, "Ravi", Self::RAVI_PIN, 100_000)
            .await?;
        service
            .open_account(Self::PRIYA, "Priya", Self::PRIYA_PIN, 5_000)
            .await?;
        Ok(())
    }
}
