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

//! # Boleto Ledger
//!
//! Payment reconciliation for an ERP: receivables and boletos (Brazilian bank
//! slips) are received fully or partially against a multi-account bank
//! ledger, customer credit is restored, and card payments are turned into
//! pending card-network settlements instead of bank income.
//!
//! ## Core Components
//!
//! - [`Engine`]: Entry point for receive, edit, reverse, delete and processor polling
//! - [`Receivable`] / [`Boleto`]: Debts and their lifecycle
//! - [`BankAccount`] / [`Transaction`]: The ledger, balance always equal to its entries
//! - [`CardTransaction`]: Projected card settlement
//! - [`LedgerError`]: Error types for rejected operations
//! - [`EventLog`]: Journal of committed events, including guarded no-ops
//!
//! ## Example
//!
//! ```
//! use boleto_ledger::{CallerContext, Engine, NewReceivable, ReceivePayment, ReceivableStatus};
//! use chrono::NaiveDate;
//! use rust_decimal_macros::dec;
//!
//! let engine = Engine::new();
//! let admin = CallerContext::administrator("ana");
//! let account = engine.open_bank_account(&admin, "Caixa", dec!(0)).unwrap();
//! let due = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
//! let receivable = engine
//!     .create_receivable(NewReceivable::new("Order #7", dec!(100.00), due))
//!     .unwrap();
//!
//! // Receive 60 of 100: the receivable stays open for the remaining 40.
//! let outcome = engine
//!     .receive_payment(
//!         &admin,
//!         ReceivePayment::new(receivable.id.0, dec!(60.00)).into_account(account.id),
//!     )
//!     .unwrap();
//! assert!(outcome.is_partial);
//! assert_eq!(outcome.remaining_balance, dec!(40.00));
//!
//! let open = engine.receivable(receivable.id).unwrap();
//! assert_eq!(open.status, ReceivableStatus::Pending);
//! assert_eq!(engine.bank_account(account.id).unwrap().balance, dec!(60.00));
//! ```
//!
//! ## Thread Safety
//!
//! Every operation is one optimistic unit of work. Concurrent receives of the
//! same debt are serialized at commit: exactly one succeeds, the others fail
//! with [`LedgerError::AlreadyPaid`].

mod account;
mod base;
mod boleto;
mod caller;
mod card;
mod config;
mod credit;
mod customer;
mod debt;
mod engine;
pub mod error;
mod events;
mod gateway;
mod ledger;
pub mod money;
mod payment;
mod receivable;
mod settlement;
mod store;
mod transaction;

pub use account::BankAccount;
pub use base::{
    BankAccountId, BoletoId, CardTransactionId, CustomerId, OrderId, ReceivableId, TransactionId,
};
pub use boleto::{Boleto, BoletoStatus, NewBoleto};
pub use caller::{CallerContext, Role};
pub use card::{CardFeeConfig, CardSale, CardStatus, CardTransaction, CardType};
pub use config::{CreditReversalPolicy, LedgerConfig};
pub use customer::{CreditRestoration, Customer, Order, OrderPaymentStatus};
pub use debt::DebtRef;
pub use engine::{DeleteOutcome, Engine};
pub use error::LedgerError;
pub use events::{EventLog, LedgerEvent, MatchKind};
pub use gateway::{BoletoCheck, BoletoStatusProvider, ProcessorStatus};
pub use payment::{
    PaymentMethod, ReceiveOutcome, ReceivePayment, ReceiveStatus, UnknownPaymentMethod,
};
pub use receivable::{
    Installment, InstallmentPlan, NewReceivable, Receivable, ReceivablePatch, ReceivableStatus,
};
pub use transaction::{Posting, Reference, ReferenceType, Transaction, TransactionKind};
