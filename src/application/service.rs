use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::domain::{self, Account, AccountNumber, Accounts, Cents, TransactionEntry};
use crate::storage::AccountStore;

use super::AppError;

/// Application service providing the ATM operations.
///
/// Every call reloads the accounts from the store, applies one ledger
/// operation and persists the result; nothing is cached between calls.
pub struct AtmService<S> {
    store: S,
}

/// Proof of a successful login. Only [`AtmService::login`] creates one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    account_number: AccountNumber,
}

impl Session {
    pub fn account_number(&self) -> &str {
        &self.account_number
    }
}

/// Account overview without any PIN data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSummary {
    pub account_number: AccountNumber,
    pub name: String,
    pub balance_cents: Cents,
    pub transaction_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_activity: Option<DateTime<Utc>>,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        Self {
            account_number: account.account_number.clone(),
            name: account.name.clone(),
            balance_cents: account.balance_cents,
            transaction_count: account.transactions.len(),
            created_at: account.created_at,
            last_activity: account.last_activity(),
        }
    }
}

/// Result of a completed transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub to_account: AccountNumber,
    pub to_name: String,
    pub amount_cents: Cents,
    /// Sender's balance after the transfer
    pub balance_cents: Cents,
}

impl<S: AccountStore> AtmService<S> {
    /// Create a new service on top of the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Prepare the backing store.
    pub async fn init(&self) -> Result<(), AppError> {
        self.store.init().await?;
        Ok(())
    }

    // ========================
    // Registration
    // ========================

    /// Open a new account, optionally funded with an opening balance.
    pub async fn open_account(
        &self,
        account_number: &str,
        name: &str,
        pin: &str,
        opening_cents: Cents,
    ) -> Result<AccountSummary, AppError> {
        let mut accounts = self.store.load().await?;
        domain::open_account(&mut accounts, account_number, name, pin, opening_cents)
            .inspect_err(|e| {
                warn!(account = account_number, error = %e, "account not opened")
            })?;

        let account = Self::expect_account(&accounts, account_number)?;
        self.store.save_account(account).await?;

        info!(account = account_number, opening_cents, "opened account");
        Ok(AccountSummary::from(account))
    }

    /// List every account (no PIN data).
    pub async fn list_accounts(&self) -> Result<Vec<AccountSummary>, AppError> {
        let accounts = self.store.load().await?;
        Ok(accounts.values().map(AccountSummary::from).collect())
    }

    // ========================
    // Session operations
    // ========================

    /// Check the account number and PIN, returning a session on success.
    pub async fn login(&self, account_number: &str, pin: &str) -> Result<Session, AppError> {
        let accounts = self.store.load().await?;
        if !domain::authenticate(&accounts, account_number, pin) {
            warn!(account = account_number, "authentication failed");
            return Err(AppError::AuthenticationFailed);
        }

        info!(account = account_number, "authenticated");
        Ok(Session {
            account_number: account_number.to_string(),
        })
    }

    /// Get the full account record for a session.
    pub async fn account(&self, session: &Session) -> Result<Account, AppError> {
        self.store
            .find(session.account_number())
            .await?
            .ok_or_else(|| AppError::AccountNotFound(session.account_number.clone()))
    }

    pub async fn balance(&self, session: &Session) -> Result<Cents, AppError> {
        let accounts = self.store.load().await?;
        domain::get_balance(&accounts, session.account_number())
            .ok_or_else(|| AppError::AccountNotFound(session.account_number.clone()))
    }

    /// Deposit into the session's account and return the new balance.
    pub async fn deposit(&self, session: &Session, amount_cents: Cents) -> Result<Cents, AppError> {
        let number = session.account_number();
        let mut accounts = self.store.load().await?;
        let balance = domain::deposit(&mut accounts, number, amount_cents)
            .inspect_err(|e| {
                warn!(account = number, amount_cents, error = %e, "deposit rejected")
            })?;

        self.store
            .save_account(Self::expect_account(&accounts, number)?)
            .await?;

        info!(account = number, amount_cents, balance, "deposit completed");
        Ok(balance)
    }

    /// Withdraw from the session's account and return the new balance.
    pub async fn withdraw(
        &self,
        session: &Session,
        amount_cents: Cents,
    ) -> Result<Cents, AppError> {
        let number = session.account_number();
        let mut accounts = self.store.load().await?;
        let balance = domain::withdraw(&mut accounts, number, amount_cents)
            .inspect_err(|e| {
                warn!(account = number, amount_cents, error = %e, "withdrawal rejected")
            })?;

        self.store
            .save_account(Self::expect_account(&accounts, number)?)
            .await?;

        info!(account = number, amount_cents, balance, "withdrawal completed");
        Ok(balance)
    }

    /// Transfer from the session's account to `to_account`.
    /// Both sides are persisted in one save.
    pub async fn transfer(
        &self,
        session: &Session,
        to_account: &str,
        amount_cents: Cents,
    ) -> Result<TransferReceipt, AppError> {
        let number = session.account_number();
        let mut accounts = self.store.load().await?;
        domain::transfer(&mut accounts, number, to_account, amount_cents).inspect_err(|e| {
            warn!(
                from = number,
                to = to_account,
                amount_cents,
                error = %e,
                "transfer rejected"
            )
        })?;

        self.store.save(&accounts).await?;

        let sender = Self::expect_account(&accounts, number)?;
        let receiver = Self::expect_account(&accounts, to_account)?;
        info!(
            from = number,
            to = to_account,
            amount_cents,
            balance = sender.balance_cents,
            "transfer completed"
        );
        Ok(TransferReceipt {
            to_account: receiver.account_number.clone(),
            to_name: receiver.name.clone(),
            amount_cents,
            balance_cents: sender.balance_cents,
        })
    }

    /// The session's transaction log, oldest first.
    /// With a limit, only the most recent `limit` entries are returned.
    pub async fn history(
        &self,
        session: &Session,
        limit: Option<usize>,
    ) -> Result<Vec<TransactionEntry>, AppError> {
        let mut entries = self.account(session).await?.transactions;
        if let Some(limit) = limit {
            let skip = entries.len().saturating_sub(limit);
            entries.drain(..skip);
        }
        Ok(entries)
    }

    fn expect_account<'a>(accounts: &'a Accounts, number: &str) -> Result<&'a Account, AppError> {
        accounts
            .get(number)
            .ok_or_else(|| AppError::AccountNotFound(number.to_string()))
    }
}
