use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::{AtmService, Session};
use crate::domain::{format_cents, AccountNumber, Cents, TransactionEntry};
use crate::storage::AccountStore;

/// Account statement for JSON export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub account_number: AccountNumber,
    pub name: String,
    pub balance_cents: Cents,
    pub transactions: Vec<TransactionEntry>,
}

/// Writes a logged-in account's transaction log out as a statement.
pub struct Exporter<'a, S> {
    service: &'a AtmService<S>,
}

impl<'a, S: AccountStore> Exporter<'a, S> {
    pub fn new(service: &'a AtmService<S>) -> Self {
        Self { service }
    }

    /// Export the statement as CSV. Returns the number of entries written.
    pub async fn export_statement_csv<W: Write>(
        &self,
        session: &Session,
        writer: W,
    ) -> Result<usize> {
        let account = self.service.account(session).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "timestamp",
            "kind",
            "description",
            "amount",
            "balance_after",
            "counterparty",
        ])?;

        for entry in &account.transactions {
            csv_writer.write_record([
                entry.timestamp.to_rfc3339(),
                entry.kind.to_string(),
                entry.describe(),
                format_cents(entry.amount_cents),
                format_cents(entry.balance_after),
                entry.counterparty.clone().unwrap_or_default(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(account.transactions.len())
    }

    /// Export the statement as pretty-printed JSON.
    pub async fn export_statement_json<W: Write>(
        &self,
        session: &Session,
        mut writer: W,
    ) -> Result<Statement> {
        let account = self.service.account(session).await?;

        let statement = Statement {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            account_number: account.account_number,
            name: account.name,
            balance_cents: account.balance_cents,
            transactions: account.transactions,
        };

        let json = serde_json::to_string_pretty(&statement)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(statement)
    }
}
