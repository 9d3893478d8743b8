use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::domain::{Account, AccountNumber, Accounts, EntryKind, PinHash, TransactionEntry};

use super::{AccountStore, MIGRATION_001_INITIAL};

/// SQLite-backed store: one row per account, one row per log entry.
/// Every save runs inside a single database transaction.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new store with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Open (creating if needed) the database file at `path`.
    pub async fn open(path: &str) -> Result<Self> {
        Self::connect(&format!("sqlite:{}?mode=rwc", path)).await
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    async fn load_entries(
        &self,
        account_number: Option<&str>,
    ) -> Result<Vec<(AccountNumber, TransactionEntry)>> {
        let rows = match account_number {
            Some(number) => sqlx::query(
                r#"
                SELECT id, account_number, kind, amount_cents, balance_after, counterparty, timestamp
                FROM transactions
                WHERE account_number = ?
                ORDER BY sequence
                "#,
            )
            .bind(number)
            .fetch_all(&self.pool)
            .await,
            None => sqlx::query(
                r#"
                SELECT id, account_number, kind, amount_cents, balance_after, counterparty, timestamp
                FROM transactions
                ORDER BY account_number, sequence
                "#,
            )
            .fetch_all(&self.pool)
            .await,
        }
        .context("Failed to load transactions")?;

        rows.iter().map(Self::row_to_entry).collect()
    }

    async fn write_account(tx: &mut Transaction<'_, Sqlite>, account: &Account) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (account_number, name, pin, balance_cents, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(account_number) DO UPDATE SET
                name = excluded.name,
                pin = excluded.pin,
                balance_cents = excluded.balance_cents,
                created_at = excluded.created_at
            "#,
        )
        .bind(&account.account_number)
        .bind(&account.name)
        .bind(account.pin.encode())
        .bind(account.balance_cents)
        .bind(account.created_at.to_rfc3339())
        .execute(&mut **tx)
        .await
        .with_context(|| format!("Failed to save account {}", account.account_number))?;

        // Entries already stored keep their rows. A log that does not extend
        // the stored one (an overwritten account) replaces it.
        let stored: Vec<String> = sqlx::query_scalar(
            "SELECT id FROM transactions WHERE account_number = ? ORDER BY sequence",
        )
        .bind(&account.account_number)
        .fetch_all(&mut **tx)
        .await
        .with_context(|| format!("Failed to read log of account {}", account.account_number))?;

        let extends_stored = stored.len() <= account.transactions.len()
            && stored
                .iter()
                .zip(&account.transactions)
                .all(|(id, entry)| *id == entry.id.to_string());
        if !extends_stored {
            debug!(
                account = %account.account_number,
                replaced = stored.len(),
                "replacing stored transaction log"
            );
            sqlx::query("DELETE FROM transactions WHERE account_number = ?")
                .bind(&account.account_number)
                .execute(&mut **tx)
                .await
                .with_context(|| {
                    format!("Failed to clear log of account {}", account.account_number)
                })?;
        }

        for (sequence, entry) in account.transactions.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO transactions (id, account_number, sequence, kind, amount_cents, balance_after, counterparty, timestamp)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO NOTHING
                "#,
            )
            .bind(entry.id.to_string())
            .bind(&account.account_number)
            .bind(sequence as i64)
            .bind(entry.kind.as_str())
            .bind(entry.amount_cents)
            .bind(entry.balance_after)
            .bind(&entry.counterparty)
            .bind(entry.timestamp.to_rfc3339())
            .execute(&mut **tx)
            .await
            .with_context(|| {
                format!(
                    "Failed to save transaction {} for account {}",
                    entry.id, account.account_number
                )
            })?;
        }
        Ok(())
    }

    fn row_to_account(row: &sqlx::sqlite::SqliteRow) -> Result<Account> {
        let pin_str: String = row.get("pin");
        let created_at_str: String = row.get("created_at");

        Ok(Account {
            account_number: row.get("account_number"),
            name: row.get("name"),
            pin: PinHash::decode(&pin_str).context("Invalid PIN hash")?,
            balance_cents: row.get("balance_cents"),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
            transactions: Vec::new(),
        })
    }

    fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<(AccountNumber, TransactionEntry)> {
        let id_str: String = row.get("id");
        let kind_str: String = row.get("kind");
        let timestamp_str: String = row.get("timestamp");

        let entry = TransactionEntry {
            id: Uuid::parse_str(&id_str).context("Invalid transaction ID")?,
            kind: EntryKind::from_str(&kind_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid transaction kind: {}", kind_str))?,
            amount_cents: row.get("amount_cents"),
            balance_after: row.get("balance_after"),
            counterparty: row.get("counterparty"),
            timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                .context("Invalid transaction timestamp")?
                .with_timezone(&Utc),
        };
        Ok((row.get("account_number"), entry))
    }
}

impl AccountStore for SqliteStore {
    async fn init(&self) -> Result<()> {
        self.migrate().await
    }

    async fn load(&self) -> Result<Accounts> {
        let rows = sqlx::query(
            "SELECT account_number, name, pin, balance_cents, created_at FROM accounts ORDER BY account_number",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to load accounts")?;

        let mut accounts = Accounts::new();
        for row in &rows {
            let account = Self::row_to_account(row)?;
            accounts.insert(account.account_number.clone(), account);
        }

        for (number, entry) in self.load_entries(None).await? {
            let account = accounts.get_mut(&number).ok_or_else(|| {
                anyhow::anyhow!(
                    "Transaction {} references unknown account {}",
                    entry.id,
                    number
                )
            })?;
            account.transactions.push(entry);
        }

        debug!(accounts = accounts.len(), "loaded accounts from database");
        Ok(accounts)
    }

    async fn save(&self, accounts: &Accounts) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        for account in accounts.values() {
            Self::write_account(&mut tx, account).await?;
        }
        tx.commit().await.context("Failed to commit accounts")?;

        debug!(accounts = accounts.len(), "saved accounts to database");
        Ok(())
    }

    async fn save_account(&self, account: &Account) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        Self::write_account(&mut tx, account).await?;
        tx.commit().await.context("Failed to commit account")?;

        debug!(account = %account.account_number, "saved account to database");
        Ok(())
    }

    async fn find(&self, account_number: &str) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT account_number, name, pin, balance_cents, created_at
            FROM accounts
            WHERE account_number = ?
            "#,
        )
        .bind(account_number)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut account = Self::row_to_account(&row)?;
        account.transactions = self
            .load_entries(Some(account_number))
            .await?
            .into_iter()
            .map(|(_, entry)| entry)
            .collect();
        Ok(Some(account))
    }
}
