use thiserror::Error;

use crate::domain::{Cents, LedgerError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Account already exists: {0}")]
    AccountExists(String),

    #[error("Invalid amount: {0} (amounts must be positive)")]
    InvalidAmount(Cents),

    #[error("Insufficient funds in account {account_number}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        account_number: String,
        balance: Cents,
        requested: Cents,
    },

    #[error("Cannot transfer to the same account")]
    SameAccountTransfer,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Deliberately does not say whether the account exists.
    #[error("Invalid account number or PIN")]
    AuthenticationFailed,

    #[error("Storage unavailable: {0:#}")]
    StorageUnavailable(#[from] anyhow::Error),
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(account) => AppError::AccountNotFound(account),
            LedgerError::InvalidAmount(amount) => AppError::InvalidAmount(amount),
            LedgerError::InsufficientFunds {
                account_number,
                balance,
                requested,
            } => AppError::InsufficientFunds {
                account_number,
                balance,
                requested,
            },
            LedgerError::SameAccountTransfer => AppError::SameAccountTransfer,
            LedgerError::AccountExists(account) => AppError::AccountExists(account),
            LedgerError::InvalidInput(msg) => AppError::InvalidInput(msg),
        }
    }
}
