use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::application::{AtmService, Session};
use crate::domain::{format_cents, parse_cents, Cents};
use crate::storage::{Backend, Store};

/// atm - a small ATM simulator
#[derive(Parser)]
#[command(name = "atm")]
#[command(about = "PIN-protected accounts with deposits, withdrawals, transfers and a transaction log")]
#[command(version)]
pub struct Cli {
    /// Account store path (JSON file or SQLite database)
    #[arg(short, long, env = "ATM_STORE", default_value = "atm.json", global = true)]
    pub store: String,

    /// Storage backend: json or sqlite
    #[arg(short, long, env = "ATM_BACKEND", default_value = "json", global = true)]
    pub backend: Backend,

    /// Currency label used when printing amounts
    #[arg(long, env = "ATM_CURRENCY", default_value = "INR", global = true)]
    pub currency: String,

    /// Enable verbose output (debug logs on stderr)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Account number and PIN for commands that act on one account
#[derive(Args)]
pub struct Credentials {
    /// Account number
    #[arg(long, env = "ATM_ACCOUNT")]
    pub account: String,

    /// Account PIN
    #[arg(long, env = "ATM_PIN", hide_env_values = true)]
    pub pin: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new account store
    Init,

    /// Open a new account
    Open {
        /// Account number (digits, must be unique)
        number: String,

        /// Account holder name
        #[arg(long)]
        name: String,

        /// PIN for the new account (4-12 digits)
        #[arg(long, env = "ATM_NEW_PIN", hide_env_values = true)]
        pin: String,

        /// Opening balance (e.g., "1000" or "1000.00")
        #[arg(long, default_value = "0")]
        initial: String,
    },

    /// List all accounts
    Accounts,

    /// Show the balance of an account
    Balance {
        #[command(flatten)]
        auth: Credentials,
    },

    /// Deposit money into an account
    Deposit {
        /// Amount to deposit (e.g., "50.00" or "50")
        #[arg(allow_hyphen_values = true)]
        amount: String,

        #[command(flatten)]
        auth: Credentials,
    },

    /// Withdraw money from an account
    Withdraw {
        /// Amount to withdraw (e.g., "50.00" or "50")
        #[arg(allow_hyphen_values = true)]
        amount: String,

        #[command(flatten)]
        auth: Credentials,
    },

    /// Transfer money to another account
    Transfer {
        /// Amount to transfer (e.g., "50.00" or "50")
        #[arg(allow_hyphen_values = true)]
        amount: String,

        /// Destination account number
        #[arg(long)]
        to: String,

        #[command(flatten)]
        auth: Credentials,
    },

    /// Show the transaction log of an account
    History {
        /// Show only the most recent entries
        #[arg(short, long)]
        limit: Option<usize>,

        #[command(flatten)]
        auth: Credentials,
    },

    /// Export an account statement
    Export {
        /// Format: csv, json
        #[arg(short, long, default_value = "csv")]
        format: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        #[command(flatten)]
        auth: Credentials,
    },

    /// Import accounts from a legacy accounts.json file
    ImportLegacy {
        /// Legacy accounts file
        input: String,

        /// Preview without importing
        #[arg(long)]
        dry_run: bool,

        /// Replace accounts that already exist
        #[arg(long)]
        overwrite: bool,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        init_tracing(self.verbose);

        let store = Store::open(self.backend, &self.store).await?;
        let service = AtmService::new(store);
        let currency = self.currency.as_str();

        match self.command {
            Commands::Init => {
                service.init().await?;
                println!(
                    "Account store initialized: {} ({})",
                    self.store,
                    self.backend.as_str()
                );
            }

            Commands::Open {
                number,
                name,
                pin,
                initial,
            } => {
                let opening = parse_amount(&initial)?;
                let summary = service.open_account(&number, &name, &pin, opening).await?;
                println!(
                    "Opened account {} for {} with balance {} {}",
                    summary.account_number,
                    summary.name,
                    format_cents(summary.balance_cents),
                    currency
                );
            }

            Commands::Accounts => run_accounts_command(&service, currency).await?,

            Commands::Balance { auth } => {
                let session = login(&service, &auth).await?;
                let balance = service.balance(&session).await?;
                println!(
                    "{}: {} {}",
                    session.account_number(),
                    format_cents(balance),
                    currency
                );
            }

            Commands::Deposit { amount, auth } => {
                let amount_cents = parse_amount(&amount)?;
                let session = login(&service, &auth).await?;
                let balance = service.deposit(&session, amount_cents).await?;
                println!(
                    "Deposited {} {}. New balance: {} {}",
                    format_cents(amount_cents),
                    currency,
                    format_cents(balance),
                    currency
                );
            }

            Commands::Withdraw { amount, auth } => {
                let amount_cents = parse_amount(&amount)?;
                let session = login(&service, &auth).await?;
                let balance = service.withdraw(&session, amount_cents).await?;
                println!(
                    "Withdrew {} {}. New balance: {} {}",
                    format_cents(amount_cents),
                    currency,
                    format_cents(balance),
                    currency
                );
            }

            Commands::Transfer { amount, to, auth } => {
                let amount_cents = parse_amount(&amount)?;
                let session = login(&service, &auth).await?;
                let receipt = service.transfer(&session, &to, amount_cents).await?;
                println!(
                    "Transferred {} {} to {} ({}). New balance: {} {}",
                    format_cents(receipt.amount_cents),
                    currency,
                    receipt.to_account,
                    receipt.to_name,
                    format_cents(receipt.balance_cents),
                    currency
                );
            }

            Commands::History { limit, auth } => {
                let session = login(&service, &auth).await?;
                run_history_command(&service, &session, limit).await?;
            }

            Commands::Export {
                format,
                output,
                auth,
            } => {
                let session = login(&service, &auth).await?;
                run_export_command(&service, &session, &format, output.as_deref()).await?;
            }

            Commands::ImportLegacy {
                input,
                dry_run,
                overwrite,
            } => {
                run_import_command(&service, &input, dry_run, overwrite).await?;
            }
        }

        Ok(())
    }
}

/// Install the tracing subscriber. `RUST_LOG` wins over `--verbose`.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "error" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // Logs go to stderr so command output stays clean on stdout.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn parse_amount(input: &str) -> Result<Cents> {
    parse_cents(input)
        .with_context(|| format!("Invalid amount '{}'. Use '50.00' or '50'", input))
}

async fn login(service: &AtmService<Store>, auth: &Credentials) -> Result<Session> {
    Ok(service.login(&auth.account, &auth.pin).await?)
}

async fn run_accounts_command(service: &AtmService<Store>, currency: &str) -> Result<()> {
    let accounts = service.list_accounts().await?;
    if accounts.is_empty() {
        println!("No accounts found.");
        return Ok(());
    }

    println!(
        "{:<12} {:<20} {:>14} {:>6}  LAST ACTIVITY",
        "ACCOUNT", "NAME", "BALANCE", "TXNS"
    );
    println!("{}", "-".repeat(72));
    for account in accounts {
        let last = account
            .last_activity
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<12} {:<20} {:>14} {:>6}  {}",
            account.account_number,
            truncate(&account.name, 20),
            format!("{} {}", format_cents(account.balance_cents), currency),
            account.transaction_count,
            last
        );
    }
    Ok(())
}

async fn run_history_command(
    service: &AtmService<Store>,
    session: &Session,
    limit: Option<usize>,
) -> Result<()> {
    let entries = service.history(session, limit).await?;
    if entries.is_empty() {
        println!("No transactions found.");
        return Ok(());
    }

    println!(
        "{:<17} {:<24} {:>12} {:>12}",
        "DATE", "DESCRIPTION", "AMOUNT", "BALANCE"
    );
    println!("{}", "-".repeat(68));
    for entry in &entries {
        let amount = if entry.amount_cents > 0 {
            format!("+{}", format_cents(entry.amount_cents))
        } else {
            format_cents(entry.amount_cents)
        };
        println!(
            "{:<17} {:<24} {:>12} {:>12}",
            entry.timestamp.format("%Y-%m-%d %H:%M"),
            truncate(&entry.describe(), 24),
            amount,
            format_cents(entry.balance_after)
        );
    }
    Ok(())
}

async fn run_export_command(
    service: &AtmService<Store>,
    session: &Session,
    format: &str,
    output: Option<&str>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{stdout, Write};

    let exporter = Exporter::new(service);

    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("Failed to create output file {}", path))?,
        ),
        None => Box::new(stdout()),
    };

    match format.to_lowercase().as_str() {
        "csv" => {
            let count = exporter.export_statement_csv(session, writer).await?;
            if let Some(path) = output {
                eprintln!("Exported {} transactions to {}", count, path);
            }
        }
        "json" => {
            let statement = exporter.export_statement_json(session, writer).await?;
            if let Some(path) = output {
                eprintln!(
                    "Exported {} transactions to {}",
                    statement.transactions.len(),
                    path
                );
            }
        }
        other => anyhow::bail!("Unknown export format '{}'. Use csv or json", other),
    }
    Ok(())
}

async fn run_import_command(
    service: &AtmService<Store>,
    input: &str,
    dry_run: bool,
    overwrite: bool,
) -> Result<()> {
    use crate::io::{ImportOptions, LegacyImporter};
    use std::fs::File;

    let file = File::open(input).with_context(|| format!("Failed to open {}", input))?;
    let importer = LegacyImporter::new(service.store());
    let result = importer
        .import_accounts_json(file, ImportOptions { dry_run, overwrite })
        .await?;

    if dry_run {
        println!("Dry run: {} account(s) would be imported", result.imported);
    } else {
        println!("Imported {} account(s)", result.imported);
    }
    if result.skipped > 0 {
        println!(
            "Skipped {} existing account(s) (use --overwrite to replace)",
            result.skipped
        );
    }
    for problem in &result.errors {
        let account = problem.account_number.as_deref().unwrap_or("?");
        eprintln!(
            "  record {} (account {}): {}",
            problem.record, account, problem.error
        );
    }
    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_negative_amount_reaches_the_ledger() {
        let cli = Cli::try_parse_from([
            "atm", "withdraw", "-10", "--account", "1001", "--pin", "1234",
        ])
        .unwrap();
        match cli.command {
            Commands::Withdraw { amount, auth } => {
                assert_eq!(amount, "-10");
                assert_eq!(auth.account, "1001");
            }
            _ => panic!("expected withdraw"),
        }
    }

    #[test]
    fn test_backend_flag() {
        let cli = Cli::try_parse_from(["atm", "--backend", "sqlite", "--store", "x.db", "init"])
            .unwrap();
        assert_eq!(cli.backend, Backend::Sqlite);
        assert_eq!(cli.store, "x.db");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Ravi", 10), "Ravi");
        assert_eq!(truncate("Transfer from 1234567890", 12), "Transfer ...");
    }
}
