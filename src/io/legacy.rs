//! Import of the older `accounts.json` layout.
//!
//! That format stored `acc_no`, `name`, a plaintext `pin`, a decimal
//! `balance` and a list of free-text log lines such as `"Withdraw: -500"`.
//! Imported accounts get a hashed PIN, an integer balance, and structured log
//! entries whose balance snapshots are rebuilt backwards from the final
//! balance.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::io::Read;
use tracing::{info, warn};

use crate::domain::{
    parse_cents, validate_account_number, validate_pin, Account, Cents, EntryKind, PinHash, TransactionEntry,
};
use crate::storage::AccountStore;

/// A value the old files wrote either as a JSON string or as a number.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Loose {
    Text(String),
    Number(serde_json::Number),
}

impl Loose {
    fn into_string(self) -> String {
        match self {
            Loose::Text(s) => s,
            Loose::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LegacyAccount {
    pub acc_no: Loose,
    pub name: String,
    pub pin: Loose,
    pub balance: Loose,
    #[serde(default)]
    pub transactions: Vec<String>,
}

/// Result of an import operation
#[derive(Debug, Clone, Default)]
pub struct ImportResult {
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<ImportError>,
}

/// Problem with one record (or one log line) of the input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportError {
    /// Position of the record in the input array, starting at 1
    pub record: usize,
    pub account_number: Option<String>,
    pub error: String,
}

/// Options for import operations
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub dry_run: bool,
    /// Replace accounts that already exist instead of skipping them
    pub overwrite: bool,
}

/// Loads legacy account files into a store.
pub struct LegacyImporter<'a, S> {
    store: &'a S,
}

impl<'a, S: AccountStore> LegacyImporter<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub async fn import_accounts_json<R: Read>(
        &self,
        reader: R,
        options: ImportOptions,
    ) -> Result<ImportResult> {
        let records: Vec<LegacyAccount> =
            serde_json::from_reader(reader).context("Failed to parse legacy accounts file")?;

        let mut accounts = self.store.load().await?;
        let mut result = ImportResult::default();
        let now = Utc::now();

        for (index, record) in records.into_iter().enumerate() {
            let position = index + 1;
            let converted = match convert_account(record, now) {
                Ok(converted) => converted,
                Err(error) => {
                    result.errors.push(ImportError {
                        record: position,
                        account_number: None,
                        error,
                    });
                    continue;
                }
            };

            let number = converted.account.account_number.clone();
            for warning in converted.warnings {
                result.errors.push(ImportError {
                    record: position,
                    account_number: Some(number.clone()),
                    error: warning,
                });
            }

            if accounts.contains_key(&number) && !options.overwrite {
                result.skipped += 1;
                continue;
            }
            accounts.insert(number, converted.account);
            result.imported += 1;
        }

        if options.dry_run {
            info!(imported = result.imported, "dry run, nothing written");
        } else if result.imported > 0 {
            self.store.save(&accounts).await?;
            info!(
                imported = result.imported,
                skipped = result.skipped,
                "imported legacy accounts"
            );
        }
        if !result.errors.is_empty() {
            warn!(problems = result.errors.len(), "legacy import reported problems");
        }
        Ok(result)
    }
}

/// An account converted from the legacy layout, plus non-fatal problems.
#[derive(Debug)]
pub struct ConvertedAccount {
    pub account: Account,
    pub warnings: Vec<String>,
}

/// Convert one legacy record. Fails only if the record itself is unusable;
/// unreadable log lines become warnings.
pub fn convert_account(
    record: LegacyAccount,
    imported_at: DateTime<Utc>,
) -> Result<ConvertedAccount, String> {
    let account_number = record.acc_no.into_string();
    validate_account_number(&account_number)
        .map_err(|e| format!("account {}: {}", account_number, e))?;

    let pin = record.pin.into_string();
    validate_pin(&pin).map_err(|e| format!("account {}: {}", account_number, e))?;

    let balance_str = record.balance.into_string();
    let balance_cents = parse_cents(&balance_str)
        .map_err(|e| format!("account {}: balance '{}': {}", account_number, balance_str, e))?;
    if balance_cents < 0 {
        return Err(format!("account {}: negative balance", account_number));
    }

    let mut warnings = Vec::new();
    let mut parsed = Vec::new();
    for line in &record.transactions {
        match parse_log_line(line) {
            Some(item) => parsed.push(item),
            None => warnings.push(format!("skipped unreadable log line '{}'", line)),
        }
    }

    let transactions = match rebuild_snapshots(&parsed, balance_cents, imported_at) {
        Some(entries) => entries,
        None => {
            warnings.push("log does not add up to the balance, history dropped".to_string());
            opening_entry(balance_cents, imported_at).into_iter().collect()
        }
    };

    Ok(ConvertedAccount {
        account: Account {
            account_number,
            name: record.name.trim().to_string(),
            pin: PinHash::new(&pin),
            balance_cents,
            created_at: imported_at,
            transactions,
        },
        warnings,
    })
}

/// One parsed legacy log line: kind, unsigned amount, counterparty.
type LogLine = (EntryKind, Cents, Option<String>);

/// Parse `Deposit: +200`, `Withdraw: -500`, `Transfer to 1002: -300` and
/// `Transfer from 1001: +300`.
pub fn parse_log_line(line: &str) -> Option<LogLine> {
    let (label, amount) = line.rsplit_once(':')?;
    let amount = amount.trim();
    let (negative, digits) = match amount.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, amount.strip_prefix('+').unwrap_or(amount)),
    };
    let cents = parse_cents(digits).ok().filter(|c| *c > 0)?;

    let label = label.trim();
    let (kind, counterparty) = if label.eq_ignore_ascii_case("deposit") {
        (EntryKind::Deposit, None)
    } else if label.eq_ignore_ascii_case("withdraw") {
        (EntryKind::Withdraw, None)
    } else if let Some(to) = label.strip_prefix("Transfer to ") {
        (EntryKind::TransferOut, Some(to.trim().to_string()))
    } else if let Some(from) = label.strip_prefix("Transfer from ") {
        (EntryKind::TransferIn, Some(from.trim().to_string()))
    } else {
        return None;
    };

    // The sign in the text has to agree with the kind.
    if negative != kind.is_debit() {
        return None;
    }
    Some((kind, cents, counterparty))
}

/// Walk the log backwards from the final balance to recover each snapshot.
/// Returns `None` if some intermediate balance would be negative or overflow.
fn rebuild_snapshots(
    lines: &[LogLine],
    final_balance: Cents,
    at: DateTime<Utc>,
) -> Option<Vec<TransactionEntry>> {
    let mut running = final_balance;
    let mut entries = Vec::with_capacity(lines.len() + 1);

    for (kind, cents, counterparty) in lines.iter().rev() {
        let mut entry = TransactionEntry::new(*kind, *cents, running).with_timestamp(at);
        if let Some(other) = counterparty {
            entry = entry.with_counterparty(other.clone());
        }
        running = entry.balance_before().filter(|before| *before >= 0)?;
        entries.push(entry);
    }

    entries.extend(opening_entry(running, at));
    entries.reverse();
    Some(entries)
}

fn opening_entry(balance: Cents, at: DateTime<Utc>) -> Option<TransactionEntry> {
    (balance > 0)
        .then(|| TransactionEntry::new(EntryKind::Opening, balance, balance).with_timestamp(at))
}
