use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Extended help shown after `receiptreg register --help`.
pub const REGISTER_AFTER_HELP: &str = "\
How registration works:
  A batch is a set of loosely-typed receipt records. Each record is resolved
  in order against the billing context: period, property, account, category,
  recipient, and finally the receipt itself. Records fail individually; one
  bad record never aborts the batch.

  Accepted formats:
    JSON: an object keyed by integer index, or a top-level array
    CSV:  one header row; services as `;`-separated names

  <path> is a local file path.
  To read stdin explicitly, use `-` as the path.
  Example: cat batch.json | receiptreg register - --context ctx.toml

Record fields:
  accountNumber (required)  Account number; `л/с`, `№` and similar markers are stripped
  address (required)        Property address as printed on the receipt
  month, year (required)    Billing period; month 0..12, year near the current year
  services (required)       [{ name, toPay, toPayDetails }]
  addressMeta               { globalId, importId, unitName, unitType }
  accountMeta               { globalId, importId, fullName, isClosed }
  category                  Billing category id; detected from services when absent
  tin, routingNumber, bankAccount
                            Payee details; the recipient is approved when tin
                            matches the organization
  toPay, toPayDetails       Totals; money is rounded to 2 decimals
  importId                  Upstream receipt id

What to do next:
  1. Register the organization's buildings with `receiptreg property add`.
  2. Run `receiptreg register <path> --context <file>`.
  3. Review `problems` and `error_receipts` in the output.
";

#[derive(Debug, Parser)]
#[command(
    name = "receiptreg",
    version,
    about = "utility receipt registration",
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Log pipeline progress to stderr
    #[arg(long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Resolve and persist a batch of receipts
    #[command(after_long_help = REGISTER_AFTER_HELP)]
    Register {
        /// Path to a JSON or CSV batch (use `-` for stdin)
        path: String,
        /// Billing context TOML file
        #[arg(long)]
        context: PathBuf,
        /// Emit machine-readable JSON output
        #[arg(long)]
        json: bool,
    },
    /// Inspect registered receipts
    #[command(arg_required_else_help = true)]
    Receipt {
        #[command(subcommand)]
        command: ReceiptCommand,
    },
    /// Manage the organization's properties
    #[command(arg_required_else_help = true)]
    Property {
        #[command(subcommand)]
        command: PropertyCommand,
    },
    /// Inspect billing categories
    #[command(arg_required_else_help = true)]
    Category {
        #[command(subcommand)]
        command: CategoryCommand,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum ReceiptCommand {
    /// List receipts registered under a billing context
    List {
        /// Billing context TOML file
        #[arg(long)]
        context: PathBuf,
        /// Emit machine-readable JSON output
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum PropertyCommand {
    /// Register a building as belonging to the context's organization
    Add {
        /// Billing context TOML file
        #[arg(long)]
        context: PathBuf,
        /// Address as it appears on receipts
        #[arg(long)]
        address: String,
        /// Normalized address key; derived from the address when omitted
        #[arg(long)]
        address_key: Option<String>,
        /// Emit machine-readable JSON output
        #[arg(long)]
        json: bool,
    },
    /// List organization and billing properties
    List {
        /// Billing context TOML file
        #[arg(long)]
        context: PathBuf,
        /// Emit machine-readable JSON output
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum CategoryCommand {
    /// List billing categories and their service keywords
    List {
        /// Emit machine-readable JSON output
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
pub fn parse_from<I, T>(itr: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(itr)
}
