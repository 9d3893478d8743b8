use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Cents, PinHash, TransactionEntry};

pub type AccountNumber = String;

/// All accounts known to a store, keyed by account number.
/// Ordered so that anything written back out is stable.
pub type Accounts = BTreeMap<AccountNumber, Account>;

const MAX_ACCOUNT_NUMBER_LEN: usize = 20;
const MIN_PIN_LEN: usize = 4;
const MAX_PIN_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub account_number: AccountNumber,
    pub name: String,
    pub pin: PinHash,
    /// Never negative
    pub balance_cents: Cents,
    pub created_at: DateTime<Utc>,
    /// Append-only, oldest first
    #[serde(default)]
    pub transactions: Vec<TransactionEntry>,
}

impl Account {
    /// Create an empty account. The PIN is hashed immediately.
    pub fn new(
        account_number: impl Into<AccountNumber>,
        name: impl Into<String>,
        pin: &str,
    ) -> Self {
        Self {
            account_number: account_number.into(),
            name: name.into(),
            pin: PinHash::new(pin),
            balance_cents: 0,
            created_at: Utc::now(),
            transactions: Vec::new(),
        }
    }

    pub fn verify_pin(&self, pin: &str) -> bool {
        self.pin.verify(pin)
    }

    /// Apply a log entry: the balance moves to the entry's snapshot.
    pub(crate) fn record(&mut self, entry: TransactionEntry) {
        self.balance_cents = entry.balance_after;
        self.transactions.push(entry);
    }

    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.transactions.last().map(|e| e.timestamp)
    }

    /// Check that every log entry chains from the one before it and that the
    /// last snapshot equals the current balance.
    pub fn log_is_consistent(&self) -> bool {
        let mut expected_before: Option<Cents> = None;
        for entry in &self.transactions {
            if entry.balance_after < 0 {
                return false;
            }
            if let Some(before) = expected_before {
                if entry.balance_before() != Some(before) {
                    return false;
                }
            }
            expected_before = Some(entry.balance_after);
        }
        expected_before.unwrap_or(self.balance_cents) == self.balance_cents
    }
}

/// Account numbers are 1-20 ASCII digits.
pub fn validate_account_number(account_number: &str) -> Result<(), String> {
    if account_number.is_empty() || account_number.len() > MAX_ACCOUNT_NUMBER_LEN {
        return Err(format!(
            "account number must be 1-{} digits",
            MAX_ACCOUNT_NUMBER_LEN
        ));
    }
    if !account_number.chars().all(|c| c.is_ascii_digit()) {
        return Err("account number must contain only digits".to_string());
    }
    Ok(())
}

/// PINs are 4-12 ASCII digits.
pub fn validate_pin(pin: &str) -> Result<(), String> {
    if pin.len() < MIN_PIN_LEN || pin.len() > MAX_PIN_LEN {
        return Err(format!("PIN must be {}-{} digits", MIN_PIN_LEN, MAX_PIN_LEN));
    }
    if !pin.chars().all(|c| c.is_ascii_digit()) {
        return Err("PIN must contain only digits".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EntryKind;

    #[test]
    fn test_new_account_is_empty() {
        let account = Account::new("1001", "Ravi", "1234");
        assert_eq!(account.balance_cents, 0);
        assert!(account.transactions.is_empty());
        assert!(account.verify_pin("1234"));
        assert!(!account.verify_pin("4321"));
        assert!(account.log_is_consistent());
    }

    #[test]
    fn test_record_moves_balance_to_snapshot() {
        let mut account = Account::new("1001", "Ravi", "1234");
        account.record(TransactionEntry::new(EntryKind::Deposit, 1000, 1000));
        account.record(TransactionEntry::new(EntryKind::Withdraw, 250, 750));
        assert_eq!(account.balance_cents, 750);
        assert_eq!(account.transactions.len(), 2);
        assert!(account.log_is_consistent());
    }

    #[test]
    fn test_inconsistent_log_is_detected() {
        let mut account = Account::new("1001", "Ravi", "1234");
        account.record(TransactionEntry::new(EntryKind::Deposit, 1000, 1000));
        // Snapshot does not follow from the previous entry
        account.record(TransactionEntry::new(EntryKind::Withdraw, 100, 800));
        assert!(!account.log_is_consistent());
    }

    #[test]
    fn test_json_uses_encoded_pin() {
        let account = Account::new("1001", "Ravi", "1234");
        let json = serde_json::to_value(&account).unwrap();
        let pin = json["pin"].as_str().unwrap();
        assert!(pin.starts_with("sha256$"));
        assert_ne!(pin, "1234");

        let back: Account = serde_json::from_value(json).unwrap();
        assert!(back.verify_pin("1234"));
    }

    #[test]
    fn test_validate_account_number() {
        assert!(validate_account_number("1001").is_ok());
        assert!(validate_account_number("").is_err());
        assert!(validate_account_number("10a1").is_err());
        assert!(validate_account_number(&"9".repeat(21)).is_err());
    }

    #[test]
    fn test_validate_pin() {
        assert!(validate_pin("1234").is_ok());
        assert!(validate_pin("123456789012").is_ok());
        assert!(validate_pin("123").is_err());
        assert!(validate_pin("12a4").is_err());
        assert!(validate_pin("1234567890123").is_err());
    }
}
