//! Ledger operations over an in-memory account mapping.
//!
//! Nothing here persists anything: callers load [`Accounts`] from a store,
//! apply one operation and save the result. Every failure is reported as a
//! [`LedgerError`] and leaves the mapping exactly as it was.

use super::{
    validate_account_number, validate_pin, Account, Accounts, Cents, EntryKind, TransactionEntry,
};

/// True iff the account exists and `pin` matches its stored hash.
pub fn authenticate(accounts: &Accounts, account_number: &str, pin: &str) -> bool {
    accounts
        .get(account_number)
        .is_some_and(|account| account.verify_pin(pin))
}

pub fn get_balance(accounts: &Accounts, account_number: &str) -> Option<Cents> {
    accounts.get(account_number).map(|a| a.balance_cents)
}

/// Withdraw `amount` and return the new balance.
pub fn withdraw(
    accounts: &mut Accounts,
    account_number: &str,
    amount: Cents,
) -> Result<Cents, LedgerError> {
    let account = accounts
        .get_mut(account_number)
        .ok_or_else(|| LedgerError::NotFound(account_number.to_string()))?;
    let new_balance = debit(account, amount)?;

    account.record(TransactionEntry::new(EntryKind::Withdraw, amount, new_balance));
    Ok(new_balance)
}

/// Deposit `amount` and return the new balance.
pub fn deposit(
    accounts: &mut Accounts,
    account_number: &str,
    amount: Cents,
) -> Result<Cents, LedgerError> {
    let account = accounts
        .get_mut(account_number)
        .ok_or_else(|| LedgerError::NotFound(account_number.to_string()))?;
    let new_balance = credit(account, amount)?;

    account.record(TransactionEntry::new(EntryKind::Deposit, amount, new_balance));
    Ok(new_balance)
}

/// Move `amount` from one account to another.
///
/// Both accounts and the amount are validated before either balance is
/// touched, so a transfer to an unknown account fails without debiting the
/// sender.
pub fn transfer(
    accounts: &mut Accounts,
    from_account: &str,
    to_account: &str,
    amount: Cents,
) -> Result<(), LedgerError> {
    if from_account == to_account {
        return Err(LedgerError::SameAccountTransfer);
    }
    if amount <= 0 {
        return Err(LedgerError::InvalidAmount(amount));
    }

    let sender = accounts
        .get(from_account)
        .ok_or_else(|| LedgerError::NotFound(from_account.to_string()))?;
    let receiver = accounts
        .get(to_account)
        .ok_or_else(|| LedgerError::NotFound(to_account.to_string()))?;
    let sender_balance = debit(sender, amount)?;
    let receiver_balance = credit(receiver, amount)?;

    // Validation is done; from here on nothing can fail.
    if let Some(sender) = accounts.get_mut(from_account) {
        sender.record(
            TransactionEntry::new(EntryKind::TransferOut, amount, sender_balance)
                .with_counterparty(to_account),
        );
    }
    if let Some(receiver) = accounts.get_mut(to_account) {
        receiver.record(
            TransactionEntry::new(EntryKind::TransferIn, amount, receiver_balance)
                .with_counterparty(from_account),
        );
    }
    Ok(())
}

/// Register a new account, optionally funded with an opening balance.
pub fn open_account(
    accounts: &mut Accounts,
    account_number: &str,
    name: &str,
    pin: &str,
    opening_cents: Cents,
) -> Result<(), LedgerError> {
    validate_account_number(account_number).map_err(LedgerError::InvalidInput)?;
    validate_pin(pin).map_err(LedgerError::InvalidInput)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(LedgerError::InvalidInput(
            "account holder name must not be empty".to_string(),
        ));
    }
    if opening_cents < 0 {
        return Err(LedgerError::InvalidAmount(opening_cents));
    }
    if accounts.contains_key(account_number) {
        return Err(LedgerError::AccountExists(account_number.to_string()));
    }

    let mut account = Account::new(account_number, name, pin);
    if opening_cents > 0 {
        account.record(TransactionEntry::new(
            EntryKind::Opening,
            opening_cents,
            opening_cents,
        ));
    }
    accounts.insert(account_number.to_string(), account);
    Ok(())
}

/// Balance after taking `amount` out of `account`, without applying it.
fn debit(account: &Account, amount: Cents) -> Result<Cents, LedgerError> {
    if amount <= 0 {
        return Err(LedgerError::InvalidAmount(amount));
    }
    if amount > account.balance_cents {
        return Err(LedgerError::InsufficientFunds {
            account_number: account.account_number.clone(),
            balance: account.balance_cents,
            requested: amount,
        });
    }
    Ok(account.balance_cents - amount)
}

/// Balance after putting `amount` into `account`, without applying it.
fn credit(account: &Account, amount: Cents) -> Result<Cents, LedgerError> {
    if amount <= 0 {
        return Err(LedgerError::InvalidAmount(amount));
    }
    account
        .balance_cents
        .checked_add(amount)
        .ok_or(LedgerError::InvalidAmount(amount))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    NotFound(String),
    InvalidAmount(Cents),
    InsufficientFunds {
        account_number: String,
        balance: Cents,
        requested: Cents,
    },
    SameAccountTransfer,
    AccountExists(String),
    InvalidInput(String),
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::NotFound(account) => write!(f, "account {} not found", account),
            LedgerError::InvalidAmount(amount) => {
                write!(f, "invalid amount: {} (must be positive)", amount)
            }
            LedgerError::InsufficientFunds {
                account_number,
                balance,
                requested,
            } => write!(
                f,
                "insufficient funds in account {}: balance {}, requested {}",
                account_number, balance, requested
            ),
            LedgerError::SameAccountTransfer => {
                write!(f, "cannot transfer to the same account")
            }
            LedgerError::AccountExists(account) => write!(f, "account {} already exists", account),
            LedgerError::InvalidInput(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for LedgerError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Accounts {
        let mut accounts = Accounts::new();
        open_account(&mut accounts, "1001", "Ravi", "1234", 1000).unwrap();
        open_account(&mut accounts, "1002", "Priya", "5678", 50).unwrap();
        accounts
    }

    #[test]
    fn test_authenticate() {
        let accounts = fixture();
        assert!(authenticate(&accounts, "1001", "1234"));
        assert!(!authenticate(&accounts, "1001", "5678"));
        assert!(!authenticate(&accounts, "9999", "1234"));
    }

    #[test]
    fn test_get_balance() {
        let accounts = fixture();
        assert_eq!(get_balance(&accounts, "1001"), Some(1000));
        assert_eq!(get_balance(&accounts, "9999"), None);
    }

    #[test]
    fn test_atm_session_scenario() {
        let mut accounts = fixture();

        assert_eq!(withdraw(&mut accounts, "1001", 500), Ok(500));
        assert_eq!(deposit(&mut accounts, "1001", 200), Ok(700));
        assert_eq!(transfer(&mut accounts, "1001", "1002", 300), Ok(()));

        assert_eq!(get_balance(&accounts, "1001"), Some(400));
        assert_eq!(get_balance(&accounts, "1002"), Some(350));

        let kinds: Vec<_> = accounts["1001"].transactions.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EntryKind::Opening,
                EntryKind::Withdraw,
                EntryKind::Deposit,
                EntryKind::TransferOut
            ]
        );
        let last = accounts["1002"].transactions.last().unwrap();
        assert_eq!(last.kind, EntryKind::TransferIn);
        assert_eq!(last.amount_cents, 300);
        assert_eq!(last.counterparty.as_deref(), Some("1001"));
        assert!(accounts.values().all(Account::log_is_consistent));
    }

    #[test]
    fn test_withdraw_rejects_non_positive_amounts() {
        let mut accounts = fixture();
        let before = accounts.clone();
        assert_eq!(
            withdraw(&mut accounts, "1001", -10),
            Err(LedgerError::InvalidAmount(-10))
        );
        assert_eq!(
            withdraw(&mut accounts, "1001", 0),
            Err(LedgerError::InvalidAmount(0))
        );
        assert_eq!(accounts, before);
        assert_eq!(get_balance(&accounts, "1001"), Some(1000));
    }

    #[test]
    fn test_withdraw_more_than_balance_changes_nothing() {
        let mut accounts = fixture();
        let before = accounts.clone();

        let result = withdraw(&mut accounts, "1001", 1001);
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientFunds {
                balance: 1000,
                requested: 1001,
                ..
            })
        ));
        assert_eq!(accounts, before);
    }

    #[test]
    fn test_withdraw_whole_balance() {
        let mut accounts = fixture();
        assert_eq!(withdraw(&mut accounts, "1001", 1000), Ok(0));
    }

    #[test]
    fn test_unknown_account() {
        let mut accounts = fixture();
        assert_eq!(
            deposit(&mut accounts, "4242", 10),
            Err(LedgerError::NotFound("4242".into()))
        );
        assert_eq!(
            withdraw(&mut accounts, "4242", 10),
            Err(LedgerError::NotFound("4242".into()))
        );
    }

    #[test]
    fn test_deposit_rejects_non_positive_amounts() {
        let mut accounts = fixture();
        let before = accounts.clone();
        assert!(deposit(&mut accounts, "1001", 0).is_err());
        assert!(deposit(&mut accounts, "1001", -5).is_err());
        assert_eq!(accounts, before);
    }

    #[test]
    fn test_deposit_overflow_is_rejected() {
        let mut accounts = fixture();
        let before = accounts.clone();
        assert_eq!(
            deposit(&mut accounts, "1001", i64::MAX),
            Err(LedgerError::InvalidAmount(i64::MAX))
        );
        assert_eq!(accounts, before);
    }

    #[test]
    fn test_deposit_then_withdraw_restores_balance() {
        let mut accounts = fixture();
        deposit(&mut accounts, "1001", 375).unwrap();
        withdraw(&mut accounts, "1001", 375).unwrap();
        assert_eq!(get_balance(&accounts, "1001"), Some(1000));

        let snapshots: Vec<_> = accounts["1001"]
            .transactions
            .iter()
            .map(|e| e.balance_after)
            .collect();
        assert_eq!(snapshots, vec![1000, 1375, 1000]);
    }

    #[test]
    fn test_transfer_to_self_always_fails() {
        let mut accounts = fixture();
        for amount in [-1, 0, 1, 1000, 5000] {
            assert_eq!(
                transfer(&mut accounts, "1001", "1001", amount),
                Err(LedgerError::SameAccountTransfer)
            );
        }
        assert_eq!(
            transfer(&mut accounts, "9999", "9999", 1),
            Err(LedgerError::SameAccountTransfer)
        );
    }

    #[test]
    fn test_transfer_to_missing_account_keeps_sender_funds() {
        let mut accounts = fixture();
        let before = accounts.clone();
        assert_eq!(
            transfer(&mut accounts, "1001", "7777", 300),
            Err(LedgerError::NotFound("7777".into()))
        );
        assert_eq!(accounts, before);
    }

    #[test]
    fn test_transfer_with_insufficient_funds() {
        let mut accounts = fixture();
        let before = accounts.clone();
        assert!(matches!(
            transfer(&mut accounts, "1002", "1001", 51),
            Err(LedgerError::InsufficientFunds { .. })
        ));
        assert_eq!(accounts, before);
    }

    #[test]
    fn test_transfer_from_missing_account() {
        let mut accounts = fixture();
        assert_eq!(
            transfer(&mut accounts, "7777", "1001", 1),
            Err(LedgerError::NotFound("7777".into()))
        );
    }

    #[test]
    fn test_open_account_validation() {
        let mut accounts = fixture();
        assert_eq!(
            open_account(&mut accounts, "1001", "Again", "1111", 0),
            Err(LedgerError::AccountExists("1001".into()))
        );
        assert!(matches!(
            open_account(&mut accounts, "ab", "X", "1111", 0),
            Err(LedgerError::InvalidInput(_))
        ));
        assert!(matches!(
            open_account(&mut accounts, "2001", "X", "12", 0),
            Err(LedgerError::InvalidInput(_))
        ));
        assert!(matches!(
            open_account(&mut accounts, "2001", "   ", "1111", 0),
            Err(LedgerError::InvalidInput(_))
        ));
        assert_eq!(
            open_account(&mut accounts, "2001", "X", "1111", -1),
            Err(LedgerError::InvalidAmount(-1))
        );
        assert_eq!(accounts.len(), 2);
    }

    #[test]
    fn test_open_account_without_funding_has_empty_log() {
        let mut accounts = Accounts::new();
        open_account(&mut accounts, "3001", " Meera ", "0000", 0).unwrap();
        let account = &accounts["3001"];
        assert_eq!(account.name, "Meera");
        assert_eq!(account.balance_cents, 0);
        assert!(account.transactions.is_empty());
    }
}
