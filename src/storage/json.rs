use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::debug;

use crate::domain::{Account, Accounts};

use super::AccountStore;

/// File-backed store: a pretty-printed JSON array of account records.
///
/// Every save replaces the whole file by writing a sibling `.tmp` file and
/// renaming it over the original, so readers never see a half-written file.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Parse a JSON array of accounts, rejecting duplicate account numbers.
    pub fn parse(bytes: &[u8]) -> Result<Accounts> {
        let records: Vec<Account> =
            serde_json::from_slice(bytes).context("Failed to parse accounts file")?;

        let mut accounts = Accounts::new();
        for account in records {
            let number = account.account_number.clone();
            if accounts.insert(number.clone(), account).is_some() {
                bail!("Duplicate account number in accounts file: {}", number);
            }
        }
        Ok(accounts)
    }

    async fn write(&self, accounts: &Accounts) -> Result<()> {
        let records: Vec<&Account> = accounts.values().collect();
        let json = serde_json::to_vec_pretty(&records).context("Failed to serialize accounts")?;

        let temp = self.temp_path();
        tokio::fs::write(&temp, &json)
            .await
            .with_context(|| format!("Failed to write {}", temp.display()))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!(path = %self.path.display(), accounts = records.len(), "wrote accounts file");
        Ok(())
    }
}

impl AccountStore for JsonStore {
    async fn init(&self) -> Result<()> {
        let exists = tokio::fs::try_exists(&self.path)
            .await
            .with_context(|| format!("Failed to access {}", self.path.display()))?;
        if exists {
            // Make sure what is there is usable.
            self.load().await?;
            return Ok(());
        }
        self.write(&Accounts::new()).await
    }

    async fn load(&self) -> Result<Accounts> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "accounts file missing, starting empty");
                return Ok(Accounts::new());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.path.display()));
            }
        };

        let accounts = Self::parse(&bytes)
            .with_context(|| format!("Invalid accounts file {}", self.path.display()))?;
        debug!(path = %self.path.display(), accounts = accounts.len(), "loaded accounts file");
        Ok(accounts)
    }

    async fn save(&self, accounts: &Accounts) -> Result<()> {
        self.write(accounts).await
    }

    async fn save_account(&self, account: &Account) -> Result<()> {
        let mut accounts = self.load().await?;
        accounts.insert(account.account_number.clone(), account.clone());
        self.write(&accounts).await
    }
}
