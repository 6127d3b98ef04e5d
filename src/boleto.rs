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

//! Boletos: bank-slip invoices, payable with or without a mirrored receivable.

use crate::base::{BoletoId, CustomerId, OrderId};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BoletoStatus {
    Pending,
    Paid,
    Overdue,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Boleto {
    pub id: BoletoId,
    pub boleto_number: String,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub status: BoletoStatus,
    pub paid_date: Option<NaiveDate>,
    /// What was actually received; less than `amount` after a partial payment.
    pub paid_amount: Option<Decimal>,
    pub paid_by: Option<String>,
    pub customer_id: Option<CustomerId>,
    pub order_id: Option<OrderId>,
    /// Payment-processor reference used by status polling.
    pub pix_payment_id: Option<String>,
}

impl Boleto {
    pub fn is_paid(&self) -> bool {
        self.status == BoletoStatus::Paid
    }

    pub fn effective_status(&self, today: NaiveDate) -> BoletoStatus {
        if self.status == BoletoStatus::Pending && self.due_date < today {
            BoletoStatus::Overdue
        } else {
            self.status
        }
    }

    pub(crate) fn mark_paid(&mut self, amount: Decimal, date: NaiveDate, paid_by: &str) {
        self.status = BoletoStatus::Paid;
        self.paid_amount = Some(amount);
        self.paid_date = Some(date);
        self.paid_by = Some(paid_by.to_string());
    }

    pub(crate) fn reopen(&mut self) {
        self.status = BoletoStatus::Pending;
        self.paid_amount = None;
        self.paid_date = None;
        self.paid_by = None;
    }
}

/// Input of [`Engine::create_boleto`](crate::Engine::create_boleto).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBoleto {
    pub boleto_number: String,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub customer_id: Option<CustomerId>,
    pub order_id: Option<OrderId>,
    pub pix_payment_id: Option<String>,
    pub consume_credit: bool,
}

impl NewBoleto {
    pub fn new(boleto_number: impl Into<String>, amount: Decimal, due_date: NaiveDate) -> Self {
        Self {
            boleto_number: boleto_number.into(),
            amount,
            due_date,
            customer_id: None,
            order_id: None,
            pix_payment_id: None,
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

    pub fn with_processor_ref(mut self, pix_payment_id: impl Into<String>) -> Self {
        self.pix_payment_id = Some(pix_payment_id.into());
        self
    }

    pub fn on_credit(mut self) -> Self {
        self.consume_credit = true;
        self
    }
}
