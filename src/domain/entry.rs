use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AccountNumber, Cents};

pub type EntryId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Initial funding recorded when the account was opened
    Opening,
    Deposit,
    Withdraw,
    /// Credit received from another account
    TransferIn,
    /// Debit sent to another account
    TransferOut,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Opening => "opening",
            EntryKind::Deposit => "deposit",
            EntryKind::Withdraw => "withdraw",
            EntryKind::TransferIn => "transfer_in",
            EntryKind::TransferOut => "transfer_out",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "opening" => Some(EntryKind::Opening),
            "deposit" => Some(EntryKind::Deposit),
            "withdraw" => Some(EntryKind::Withdraw),
            "transfer_in" => Some(EntryKind::TransferIn),
            "transfer_out" => Some(EntryKind::TransferOut),
            _ => None,
        }
    }

    /// Returns true if entries of this kind decrease the balance.
    pub fn is_debit(&self) -> bool {
        matches!(self, EntryKind::Withdraw | EntryKind::TransferOut)
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One line of an account's transaction log.
/// Entries are append-only; their order in the log is chronological order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEntry {
    pub id: EntryId,
    pub kind: EntryKind,
    /// Signed delta applied to the balance
    pub amount_cents: Cents,
    /// Balance immediately after this entry was applied
    pub balance_after: Cents,
    /// The other side of a transfer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<AccountNumber>,
    pub timestamp: DateTime<Utc>,
}

impl TransactionEntry {
    /// Create an entry stamped with the current time.
    /// `magnitude` is the unsigned amount; the sign is derived from `kind`.
    pub fn new(kind: EntryKind, magnitude: Cents, balance_after: Cents) -> Self {
        let amount_cents = if kind.is_debit() { -magnitude } else { magnitude };
        Self {
            id: Uuid::new_v4(),
            kind,
            amount_cents,
            balance_after,
            counterparty: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_counterparty(mut self, counterparty: impl Into<AccountNumber>) -> Self {
        self.counterparty = Some(counterparty.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Balance before this entry was applied, `None` on overflow.
    pub fn balance_before(&self) -> Option<Cents> {
        self.balance_after.checked_sub(self.amount_cents)
    }

    /// Human-readable description, e.g. "Transfer to 1002".
    pub fn describe(&self) -> String {
        match (self.kind, &self.counterparty) {
            (EntryKind::TransferOut, Some(to)) => format!("Transfer to {}", to),
            (EntryKind::TransferIn, Some(from)) => format!("Transfer from {}", from),
            (EntryKind::Opening, _) => "Opening balance".to_string(),
            (EntryKind::Deposit, _) => "Deposit".to_string(),
            (EntryKind::Withdraw, _) => "Withdraw".to_string(),
            (EntryKind::TransferOut, None) => "Transfer out".to_string(),
            (EntryKind::TransferIn, None) => "Transfer in".to_string(),
        }
    }
}
