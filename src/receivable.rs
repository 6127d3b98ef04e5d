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

//! Receivables: amounts owed to the business.
//!
//! ```text
//!  Pending ──receive (full)────► Paid ──reverse──► Pending
//!     │
//!     ├──receive (partial)──► Pending (amount = remaining) + Paid settlement record
//!     └──edit──► Cancelled
//! ```
//!
//! `Overdue` is derived from the due date by [`Receivable::effective_status`];
//! receive and reverse never store it.

use crate::base::{BankAccountId, BoletoId, CustomerId, OrderId, ReceivableId};
use crate::payment::PaymentMethod;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReceivableStatus {
    Pending,
    Paid,
    Overdue,
    Partial,
    Cancelled,
}

impl ReceivableStatus {
    /// Statuses that still expect money.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::Overdue | Self::Partial)
    }
}

/// Position of a receivable within an installment plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installment {
    pub number: u16,
    pub total: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receivable {
    pub id: ReceivableId,
    pub description: String,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub status: ReceivableStatus,
    pub payment_date: Option<NaiveDate>,
    pub payment_method: Option<PaymentMethod>,
    pub bank_account_id: Option<BankAccountId>,
    pub fee_amount: Decimal,
    pub net_amount: Option<Decimal>,
    pub interest_amount: Decimal,
    pub fine_amount: Decimal,
    pub customer_id: Option<CustomerId>,
    pub order_id: Option<OrderId>,
    pub boleto_id: Option<BoletoId>,
    /// Set on the paid snapshot created for a partial payment.
    pub settlement_of: Option<ReceivableId>,
    pub installment: Option<Installment>,
    pub notes: Option<String>,
}

impl Receivable {
    pub fn is_paid(&self) -> bool {
        self.status == ReceivableStatus::Paid
    }

    /// Historical rows created to audit a partial payment.
    pub fn is_settlement_record(&self) -> bool {
        self.settlement_of.is_some()
    }

    /// Stored status, with open entries past their due date reported as overdue.
    pub fn effective_status(&self, today: NaiveDate) -> ReceivableStatus {
        if self.status.is_open() && self.due_date < today {
            ReceivableStatus::Overdue
        } else {
            self.status
        }
    }

    /// Drops every trace of a payment and reopens the entry.
    pub(crate) fn reopen(&mut self) {
        self.status = ReceivableStatus::Pending;
        self.payment_date = None;
        self.bank_account_id = None;
        self.fee_amount = Decimal::ZERO;
        self.net_amount = None;
    }
}

/// Input of [`Engine::create_receivable`](crate::Engine::create_receivable).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReceivable {
    pub description: String,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub customer_id: Option<CustomerId>,
    pub order_id: Option<OrderId>,
    pub boleto_id: Option<BoletoId>,
    pub payment_method: Option<PaymentMethod>,
    pub installment: Option<Installment>,
    pub notes: Option<String>,
    /// Debit the customer's available credit when booking.
    pub consume_credit: bool,
}

impl NewReceivable {
    pub fn new(description: impl Into<String>, amount: Decimal, due_date: NaiveDate) -> Self {
        Self {
            description: description.into(),
            amount,
            due_date,
            customer_id: None,
            order_id: None,
            boleto_id: None,
            payment_method: None,
            installment: None,
            notes: None,
            consume_credit: false,
        }
    }

    pub fn for_customer(mut self, customer_id: CustomerId) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn for_order(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn mirroring(mut self, boleto_id: BoletoId) -> Self {
        self.boleto_id = Some(boleto_id);
        self
    }

    pub fn paid_with(mut self, method: PaymentMethod) -> Self {
        self.payment_method = Some(method);
        self
    }

    pub fn on_credit(mut self) -> Self {
        self.consume_credit = true;
        self
    }
}

/// Installment plan split into one receivable per installment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallmentPlan {
    pub description: String,
    pub total: Decimal,
    pub count: u16,
    pub first_due_date: NaiveDate,
    pub interval_days: u64,
    pub customer_id: Option<CustomerId>,
    pub order_id: Option<OrderId>,
    pub payment_method: Option<PaymentMethod>,
    pub consume_credit: bool,
}

/// In-place correction of a receivable. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceivablePatch {
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    pub status: Option<ReceivableStatus>,
    pub payment_method: Option<PaymentMethod>,
    pub bank_account_id: Option<BankAccountId>,
    pub notes: Option<String>,
}
