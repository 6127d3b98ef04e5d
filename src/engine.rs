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

//! Payment reconciliation engine.
//!
//! The [`Engine`] is the entry point for every operation the surrounding
//! application performs: registering accounts, customers, orders and debts,
//! receiving payments, correcting and reversing them, and polling the payment
//! processor for boleto status.
//!
//! # Atomicity
//!
//! Each operation runs inside one [`UnitOfWork`]. Status changes, ledger
//! posts, credit restoration and card projections either all commit or none
//! do. A unit that loses a race against a concurrent commit is rerun from
//! scratch, up to [`LedgerConfig::max_conflict_retries`] times; a rerun
//! receive then sees the debt as PAID and fails with
//! [`LedgerError::AlreadyPaid`].
//!
//! # Thread Safety
//!
//! `Engine` is `Send + Sync`; share it behind an `Arc` and call it from as
//! many threads as needed.

mod correction;
mod receive;

pub use correction::DeleteOutcome;

use crate::account::BankAccount;
use crate::base::{BankAccountId, BoletoId, CustomerId, OrderId, ReceivableId};
use crate::boleto::{Boleto, BoletoStatus, NewBoleto};
use crate::caller::CallerContext;
use crate::card::{CardFeeConfig, CardTransaction, CardType};
use crate::config::LedgerConfig;
use crate::credit;
use crate::customer::{Customer, Order, OrderPaymentStatus};
use crate::events::EventLog;
use crate::ledger;
use crate::money;
use crate::receivable::{Installment, InstallmentPlan, NewReceivable, Receivable, ReceivableStatus};
use crate::store::{Store, UnitOfWork};
use crate::transaction::{Posting, Transaction};
use crate::LedgerError;
use chrono::{Days, Local, NaiveDate};
use crossbeam::utils::Backoff;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

/// Reconciles payments against receivables, boletos and bank accounts.
///
/// # Invariants
///
/// - `balance == initial_balance + Σ signed transaction amounts` for every account.
/// - `0 ≤ available_credit ≤ credit_limit` for every customer.
/// - At most one ledger row per tagged reference.
/// - At most one card projection per sale.
pub struct Engine {
    store: Store,
    events: EventLog,
    config: LedgerConfig,
}

impl Engine {
    /// Creates an empty engine with default configuration.
    pub fn new() -> Self {
        Self::with_config(LedgerConfig::default())
    }

    pub fn with_config(config: LedgerConfig) -> Self {
        Engine {
            store: Store::new(),
            events: EventLog::new(),
            config,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Journal of committed events.
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Runs `work` in a unit of work, retrying on [`LedgerError::Conflict`]
    /// with exponential backoff between attempts.
    ///
    /// `work` must be rerunnable: it sees a fresh unit of work each attempt.
    fn transact<T>(
        &self,
        operation: &'static str,
        mut work: impl FnMut(&mut UnitOfWork<'_>) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let backoff = Backoff::new();
        let mut attempt = 0;
        loop {
            let mut uow = self.store.begin();
            let value = work(&mut uow)?;
            match uow.commit() {
                Ok(events) => {
                    self.events.publish(events);
                    return Ok(value);
                }
                Err(LedgerError::Conflict) if attempt < self.config.max_conflict_retries => {
                    attempt += 1;
                    debug!(operation, attempt, "unit of work conflicted, retrying");
                    backoff.snooze();
                }
                Err(err) => {
                    warn!(operation, attempt, %err, "unit of work aborted");
                    return Err(err);
                }
            }
        }
    }

    // Registration

    /// Opens a bank account with `initial_balance`.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Unauthorized`] unless the caller is an administrator.
    pub fn open_bank_account(
        &self,
        caller: &CallerContext,
        name: &str,
        initial_balance: Decimal,
    ) -> Result<BankAccount, LedgerError> {
        caller.require_admin()?;
        let initial_balance = money::round2(initial_balance);
        self.transact("open_bank_account", |uow| {
            let id = BankAccountId(uow.next_id::<BankAccount>());
            let account = BankAccount::new(id, name, initial_balance);
            uow.put(account.clone());
            Ok(account)
        })
    }

    /// Registers a customer with all of `credit_limit` available.
    pub fn register_customer(
        &self,
        name: &str,
        credit_limit: Decimal,
    ) -> Result<Customer, LedgerError> {
        let credit_limit = money::non_negative(credit_limit)?;
        self.transact("register_customer", |uow| {
            let customer = Customer {
                id: CustomerId(uow.next_id::<Customer>()),
                name: name.to_string(),
                credit_limit,
                available_credit: credit_limit,
            };
            uow.put(customer.clone());
            Ok(customer)
        })
    }

    /// Registers an order so its payment status can be tracked.
    ///
    /// # Errors
    ///
    /// [`LedgerError::CustomerNotFound`] if `customer_id` does not exist.
    pub fn register_order(&self, customer_id: Option<CustomerId>) -> Result<Order, LedgerError> {
        self.transact("register_order", |uow| {
            if let Some(customer_id) = customer_id {
                uow.get::<Customer>(customer_id)
                    .ok_or(LedgerError::CustomerNotFound)?;
            }
            let order = Order {
                id: OrderId(uow.next_id::<Order>()),
                customer_id,
                payment_status: OrderPaymentStatus::Pending,
            };
            uow.put(order.clone());
            Ok(order)
        })
    }

    /// Removes an order. Its receivables become deletable.
    pub fn remove_order(&self, order_id: OrderId) -> Result<(), LedgerError> {
        self.transact("remove_order", |uow| {
            uow.get::<Order>(order_id).ok_or(LedgerError::NotFound)?;
            uow.delete::<Order>(order_id);
            Ok(())
        })
    }

    /// Sets the fee percentage for a card type. Inactive configs fall back to defaults.
    pub fn configure_card_fee(
        &self,
        caller: &CallerContext,
        card_type: CardType,
        fee_percentage: Decimal,
        active: bool,
    ) -> Result<CardFeeConfig, LedgerError> {
        caller.require_admin()?;
        let fee_percentage = money::non_negative(fee_percentage)?;
        self.transact("configure_card_fee", |uow| {
            let config = CardFeeConfig {
                card_type,
                fee_percentage,
                active,
            };
            uow.put(config.clone());
            Ok(config)
        })
    }

    /// Books a receivable, optionally against the customer's credit.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] - Amount is zero or negative.
    /// - [`LedgerError::CustomerNotFound`] - Unknown customer, or credit booking without one.
    /// - [`LedgerError::NotFound`] - Unknown order or boleto.
    /// - [`LedgerError::InsufficientCredit`] - Credit booking beyond available credit.
    pub fn create_receivable(&self, new: NewReceivable) -> Result<Receivable, LedgerError> {
        let amount = money::positive(new.amount)?;
        self.transact("create_receivable", |uow| {
            let receivable = book_receivable(uow, &new, amount)?;
            debug!(receivable = %receivable.id, %amount, "receivable created");
            Ok(receivable)
        })
    }

    /// Books a boleto, optionally against the customer's credit.
    ///
    /// # Errors
    ///
    /// Same as [`Engine::create_receivable`].
    pub fn create_boleto(&self, new: NewBoleto) -> Result<Boleto, LedgerError> {
        let amount = money::positive(new.amount)?;
        self.transact("create_boleto", |uow| {
            check_links(uow, new.customer_id, new.order_id, None)?;
            if new.consume_credit {
                let customer_id = new.customer_id.ok_or(LedgerError::CustomerNotFound)?;
                credit::consume(uow, customer_id, amount)?;
            }
            let boleto = Boleto {
                id: BoletoId(uow.next_id::<Boleto>()),
                boleto_number: new.boleto_number.clone(),
                amount,
                due_date: new.due_date,
                status: BoletoStatus::Pending,
                paid_date: None,
                paid_amount: None,
                paid_by: None,
                customer_id: new.customer_id,
                order_id: new.order_id,
                pix_payment_id: new.pix_payment_id.clone(),
            };
            uow.put(boleto.clone());
            debug!(boleto = %boleto.id, %amount, "boleto created");
            Ok(boleto)
        })
    }

    /// Splits `plan.total` into `plan.count` receivables.
    ///
    /// Each installment is `round2(total / count)`; the last one absorbs the
    /// rounding remainder. Due dates step by `interval_days`.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidInstallmentPlan`] for a zero count or a split
    /// that would leave the last installment empty, plus the errors of
    /// [`Engine::create_receivable`].
    pub fn create_installments(
        &self,
        plan: InstallmentPlan,
    ) -> Result<Vec<Receivable>, LedgerError> {
        let total = money::positive(plan.total)?;
        let amounts = split_installments(total, plan.count)?;
        self.transact("create_installments", |uow| {
            if plan.consume_credit {
                let customer_id = plan.customer_id.ok_or(LedgerError::CustomerNotFound)?;
                credit::consume(uow, customer_id, total)?;
            }
            let mut created = Vec::with_capacity(amounts.len());
            for (index, amount) in amounts.iter().enumerate() {
                let number = u16::try_from(index + 1)
                    .map_err(|_| LedgerError::InvalidInstallmentPlan)?;
                let due_date = plan
                    .first_due_date
                    .checked_add_days(Days::new(plan.interval_days * u64::from(number - 1)))
                    .ok_or(LedgerError::InvalidInstallmentPlan)?;
                let new = NewReceivable {
                    description: format!("{} ({}/{})", plan.description, number, plan.count),
                    amount: *amount,
                    due_date,
                    customer_id: plan.customer_id,
                    order_id: plan.order_id,
                    boleto_id: None,
                    payment_method: plan.payment_method,
                    installment: Some(Installment {
                        number,
                        total: plan.count,
                    }),
                    notes: None,
                    consume_credit: false,
                };
                created.push(book_receivable(uow, &new, *amount)?);
            }
            info!(count = plan.count, %total, "installment plan booked");
            Ok(created)
        })
    }

    /// Writes a ledger entry directly. Used for opening adjustments and data
    /// carried over from systems that did not tag entries with a reference.
    pub fn post_entry(
        &self,
        caller: &CallerContext,
        posting: Posting,
    ) -> Result<Transaction, LedgerError> {
        caller.require_admin()?;
        self.transact("post_entry", |uow| {
            ledger::post(uow, posting.clone()).map(|outcome| outcome.transaction().clone())
        })
    }

    // Queries

    pub fn receivable(&self, id: ReceivableId) -> Option<Receivable> {
        self.store.get(id)
    }

    pub fn receivables(&self) -> Vec<Receivable> {
        self.store.all()
    }

    pub fn boleto(&self, id: BoletoId) -> Option<Boleto> {
        self.store.get(id)
    }

    pub fn bank_account(&self, id: BankAccountId) -> Option<BankAccount> {
        self.store.get(id)
    }

    pub fn bank_accounts(&self) -> Vec<BankAccount> {
        self.store.all()
    }

    pub fn customer(&self, id: CustomerId) -> Option<Customer> {
        self.store.get(id)
    }

    pub fn order(&self, id: OrderId) -> Option<Order> {
        self.store.get(id)
    }

    pub fn card_transactions(&self) -> Vec<CardTransaction> {
        self.store.all()
    }

    /// Every ledger row, in id order.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.store.all()
    }

    /// Ledger rows of one account, oldest first.
    ///
    /// # Errors
    ///
    /// [`LedgerError::AccountNotFound`] if the account does not exist.
    pub fn account_statement(&self, id: BankAccountId) -> Result<Vec<Transaction>, LedgerError> {
        self.bank_account(id).ok_or(LedgerError::AccountNotFound)?;
        let mut rows: Vec<Transaction> = self
            .transactions()
            .into_iter()
            .filter(|tx| tx.bank_account_id == id)
            .collect();
        rows.sort_by_key(|tx| (tx.date, tx.id));
        Ok(rows)
    }

    /// Difference between the stored balance and `initial + Σ signed amounts`.
    /// Zero when the account is consistent.
    pub fn verify_account(&self, id: BankAccountId) -> Result<Decimal, LedgerError> {
        let (account, rows) = self
            .store
            .get_with_all::<BankAccount, Transaction>(id)
            .ok_or(LedgerError::AccountNotFound)?;
        let expected = rows
            .iter()
            .filter(|tx| tx.bank_account_id == id)
            .fold(account.initial_balance, |sum, tx| sum + tx.signed_amount());
        let discrepancy = money::round2(account.balance - expected);
        if !discrepancy.is_zero() {
            warn!(account = %id, %discrepancy, "account balance does not match its ledger");
        }
        Ok(discrepancy)
    }

    /// Open receivables whose due date is before `today`.
    pub fn overdue_receivables(&self, today: NaiveDate) -> Vec<Receivable> {
        self.receivables()
            .into_iter()
            .filter(|r| r.effective_status(today) == ReceivableStatus::Overdue)
            .collect()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Checks that the customer, order and boleto a new debt points at exist.
fn check_links(
    uow: &mut UnitOfWork<'_>,
    customer_id: Option<CustomerId>,
    order_id: Option<OrderId>,
    boleto_id: Option<BoletoId>,
) -> Result<(), LedgerError> {
    if let Some(customer_id) = customer_id {
        uow.get::<Customer>(customer_id)
            .ok_or(LedgerError::CustomerNotFound)?;
    }
    if let Some(order_id) = order_id {
        uow.get::<Order>(order_id).ok_or(LedgerError::NotFound)?;
    }
    if let Some(boleto_id) = boleto_id {
        uow.get::<Boleto>(boleto_id).ok_or(LedgerError::NotFound)?;
    }
    Ok(())
}

fn book_receivable(
    uow: &mut UnitOfWork<'_>,
    new: &NewReceivable,
    amount: Decimal,
) -> Result<Receivable, LedgerError> {
    check_links(uow, new.customer_id, new.order_id, new.boleto_id)?;
    if new.consume_credit {
        let customer_id = new.customer_id.ok_or(LedgerError::CustomerNotFound)?;
        credit::consume(uow, customer_id, amount)?;
    }
    let receivable = Receivable {
        id: ReceivableId(uow.next_id::<Receivable>()),
        description: new.description.clone(),
        amount,
        due_date: new.due_date,
        status: ReceivableStatus::Pending,
        payment_date: None,
        payment_method: new.payment_method,
        bank_account_id: None,
        fee_amount: Decimal::ZERO,
        net_amount: None,
        interest_amount: Decimal::ZERO,
        fine_amount: Decimal::ZERO,
        customer_id: new.customer_id,
        order_id: new.order_id,
        boleto_id: new.boleto_id,
        settlement_of: None,
        installment: new.installment,
        notes: new.notes.clone(),
    };
    uow.put(receivable.clone());
    Ok(receivable)
}

/// Per-installment amounts; the last absorbs the rounding remainder.
fn split_installments(total: Decimal, count: u16) -> Result<Vec<Decimal>, LedgerError> {
    if count == 0 {
        return Err(LedgerError::InvalidInstallmentPlan);
    }
    let each = money::round2(total / Decimal::from(count));
    let last = money::round2(total - each * Decimal::from(count - 1));
    if each <= Decimal::ZERO || last <= Decimal::ZERO {
        return Err(LedgerError::InvalidInstallmentPlan);
    }
    let mut amounts = vec![each; usize::from(count - 1)];
    amounts.push(last);
    Ok(amounts)
}
