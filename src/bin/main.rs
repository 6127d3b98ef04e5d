// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use boleto_ledger::money::parse_amount;
use boleto_ledger::{
    BankAccountId, BoletoId, CallerContext, CreditReversalPolicy, CustomerId, Engine, LedgerConfig,
    LedgerError, NewBoleto, NewReceivable, OrderId, PaymentMethod, ReceivableId, ReceivePayment,
    UnknownPaymentMethod,
};
use chrono::NaiveDate;
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Boleto Ledger - Replay an operations CSV
///
/// Reads ledger operations from a CSV file and writes bank account balances
/// to stdout. Rejected rows are logged to stderr and skipped.
#[derive(Parser, Debug)]
#[command(name = "boleto-ledger")]
#[command(about = "Replays receivable and boleto operations against a bank ledger", long_about = None)]
struct Args {
    /// Path to CSV file with operations
    ///
    /// Expected header: op,id,amount,fee,date,method,account,customer,order,label
    /// Example: cargo run -- operations.csv > accounts.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// What a reversal does to restored credit (keep | debit)
    #[arg(long, value_name = "POLICY")]
    credit_on_reversal: Option<CreditReversalPolicy>,

    /// Never match untagged ledger entries when reversing
    #[arg(long)]
    no_legacy_fallback: bool,

    /// Reruns allowed when a unit of work conflicts
    #[arg(long, value_name = "N")]
    max_conflict_retries: Option<u32>,
}

impl Args {
    fn config(&self) -> Result<LedgerConfig, LedgerError> {
        let mut config = LedgerConfig::from_env()?;
        if let Some(policy) = self.credit_on_reversal {
            config.credit_on_reversal = policy;
        }
        if self.no_legacy_fallback {
            config.legacy_transaction_fallback = false;
        }
        if let Some(retries) = self.max_conflict_retries {
            config.max_conflict_retries = retries;
        }
        Ok(config)
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match args.config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            process::exit(1);
        }
    };

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let engine = match process_operations(BufReader::new(file), config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error processing operations: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = write_accounts(&engine, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Why a row was skipped.
#[derive(Debug, Error)]
enum RowError {
    #[error("unknown operation '{0}'")]
    UnknownOperation(String),

    #[error("missing field '{0}'")]
    Missing(&'static str),

    #[error(transparent)]
    Method(#[from] UnknownPaymentMethod),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Raw CSV record.
///
/// Fields: `op, id, amount, fee, date, method, account, customer, order, label`.
/// Which fields an operation reads:
///
/// | op | fields |
/// |----|--------|
/// | account | amount (initial balance), label (name) |
/// | customer | amount (credit limit), label (name) |
/// | order | customer |
/// | receivable | amount, date (due), method, customer, order, label |
/// | boleto | amount, date (due), customer, order, label (number) |
/// | receive | id, amount, fee, date, method, account |
/// | reverse | id (receivable or boleto) |
/// | delete | id |
#[derive(Debug, Deserialize)]
struct CsvRecord {
    op: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    id: Option<u32>,
    #[serde(default)]
    amount: String,
    #[serde(default)]
    fee: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    date: Option<NaiveDate>,
    #[serde(default)]
    method: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    account: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    customer: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    order: Option<u32>,
    #[serde(default)]
    label: String,
}

impl CsvRecord {
    fn amount(&self) -> Result<Decimal, RowError> {
        Ok(parse_amount(&self.amount)?)
    }

    fn method(&self) -> Result<Option<PaymentMethod>, RowError> {
        if self.method.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.method.parse()?))
    }

    fn due_date(&self) -> Result<NaiveDate, RowError> {
        self.date.ok_or(RowError::Missing("date"))
    }

    fn id(&self) -> Result<u32, RowError> {
        self.id.ok_or(RowError::Missing("id"))
    }

    /// Applies this row to the engine as `caller`.
    fn apply(&self, engine: &Engine, caller: &CallerContext) -> Result<(), RowError> {
        let customer = self.customer.map(CustomerId);
        let order = self.order.map(OrderId);

        match self.op.to_lowercase().as_str() {
            "account" => {
                engine.open_bank_account(caller, &self.label, self.amount()?)?;
            }
            "customer" => {
                engine.register_customer(&self.label, self.amount()?)?;
            }
            "order" => {
                engine.register_order(customer)?;
            }
            "receivable" => {
                let mut new = NewReceivable::new(&self.label, self.amount()?, self.due_date()?);
                new.customer_id = customer;
                new.order_id = order;
                new.payment_method = self.method()?;
                engine.create_receivable(new)?;
            }
            "boleto" => {
                let mut new = NewBoleto::new(&self.label, self.amount()?, self.due_date()?);
                new.customer_id = customer;
                new.order_id = order;
                engine.create_boleto(new)?;
            }
            "receive" => {
                let mut request = ReceivePayment::new(self.id()?, self.amount()?);
                request.fee = parse_amount(&self.fee)?;
                request.payment_date = self.date;
                request.payment_method = self.method()?;
                request.bank_account_id = self.account.map(BankAccountId);
                engine.receive_payment(caller, request)?;
            }
            "reverse" => {
                let id = self.id()?;
                if engine.boleto(BoletoId(id)).is_some() {
                    engine.reverse_boleto(caller, BoletoId(id), true)?;
                } else {
                    engine.reverse_receivable(caller, ReceivableId(id), true)?;
                }
            }
            "delete" => {
                engine.delete_receivable(caller, ReceivableId(self.id()?))?;
            }
            other => return Err(RowError::UnknownOperation(other.to_string())),
        }
        Ok(())
    }
}

/// Replays operations from a CSV reader.
///
/// Rows are streamed. Malformed rows and rows the engine rejects are logged
/// and skipped; later rows still run. Operations run as an administrator
/// named `cli`.
///
/// # Example
///
/// ```csv
/// op,id,amount,fee,date,method,account,customer,order,label
/// account,,0,,,,,,,Caixa
/// receivable,,100.00,,2025-03-10,,,,,Order #1
/// receive,1,100.00,1.50,2025-03-09,pix,1,,,
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the header is unreadable.
pub fn process_operations<R: Read>(
    reader: R,
    config: LedgerConfig,
) -> Result<Engine, csv::Error> {
    let engine = Engine::with_config(config);
    let caller = CallerContext::administrator("cli");

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);
    rdr.headers()?;

    for (index, result) in rdr.deserialize::<CsvRecord>().enumerate() {
        let row = index + 2;
        match result {
            Ok(record) => {
                if let Err(e) = record.apply(&engine, &caller) {
                    warn!(row, op = %record.op, error = %e, "skipping rejected row");
                }
            }
            Err(e) => {
                warn!(row, error = %e, "skipping malformed row");
            }
        }
    }

    info!(events = engine.events().len(), "replay finished");
    Ok(engine)
}

/// Writes bank account balances as CSV.
///
/// # CSV Format
///
/// Columns: `account, name, initial_balance, balance`
///
/// ```csv
/// account,name,initial_balance,balance
/// 1,Caixa,0.00,98.50
/// ```
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_accounts<W: Write>(engine: &Engine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for account in engine.bank_accounts() {
        wtr.serialize(&account)?;
    }

    wtr.flush()?;
    Ok(())
}
