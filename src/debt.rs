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

//! A debt that can be received: either a receivable or a boleto.
//!
//! Resolved once at the start of an operation, then driven through the same
//! methods regardless of which table it came from.

use crate::LedgerError;
use crate::base::{BankAccountId, BoletoId, CustomerId, OrderId, ReceivableId};
use crate::boleto::Boleto;
use crate::payment::PaymentMethod;
use crate::receivable::{Receivable, ReceivableStatus};
use crate::store::UnitOfWork;
use crate::transaction::Reference;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Typed pointer to a debt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DebtRef {
    Receivable(ReceivableId),
    Boleto(BoletoId),
}

/// Everything known about a payment once amounts are validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Settlement {
    pub collected: Decimal,
    pub interest: Decimal,
    pub fine: Decimal,
    pub fee: Decimal,
    pub date: NaiveDate,
    pub method: PaymentMethod,
    pub bank_account_id: Option<BankAccountId>,
    pub paid_by: String,
    pub notes: Option<String>,
}

impl Settlement {
    pub fn net(&self) -> Decimal {
        crate::money::round2(self.collected - self.fee)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Debt {
    Receivable(Receivable),
    Boleto(Boleto),
}

impl Debt {
    /// Looks `id` up as a receivable, then as a boleto.
    ///
    /// Both tables draw ids from one sequence, so at most one of them holds `id`.
    pub fn resolve(uow: &mut UnitOfWork<'_>, id: u32) -> Result<Self, LedgerError> {
        if let Some(receivable) = uow.get::<Receivable>(ReceivableId(id)) {
            return Ok(Self::Receivable(receivable));
        }
        uow.get::<Boleto>(BoletoId(id))
            .map(Self::Boleto)
            .ok_or(LedgerError::NotFound)
    }

    pub fn load(uow: &mut UnitOfWork<'_>, target: DebtRef) -> Result<Self, LedgerError> {
        match target {
            DebtRef::Receivable(id) => uow.get::<Receivable>(id).map(Self::Receivable),
            DebtRef::Boleto(id) => uow.get::<Boleto>(id).map(Self::Boleto),
        }
        .ok_or(LedgerError::NotFound)
    }

    pub fn reference(&self) -> DebtRef {
        match self {
            Self::Receivable(r) => DebtRef::Receivable(r.id),
            Self::Boleto(b) => DebtRef::Boleto(b.id),
        }
    }

    /// Ledger reference used when this debt is posted to a bank account.
    pub fn ledger_reference(&self) -> Reference {
        match self {
            Self::Receivable(r) => Reference::receivable(r.id),
            Self::Boleto(b) => Reference::boleto(b.id),
        }
    }

    pub fn amount(&self) -> Decimal {
        match self {
            Self::Receivable(r) => r.amount,
            Self::Boleto(b) => b.amount,
        }
    }

    pub fn is_paid(&self) -> bool {
        match self {
            Self::Receivable(r) => r.is_paid(),
            Self::Boleto(b) => b.is_paid(),
        }
    }

    pub fn customer_id(&self) -> Option<CustomerId> {
        match self {
            Self::Receivable(r) => r.customer_id,
            Self::Boleto(b) => b.customer_id,
        }
    }

    pub fn order_id(&self) -> Option<OrderId> {
        match self {
            Self::Receivable(r) => r.order_id,
            Self::Boleto(b) => b.order_id,
        }
    }

    /// Boleto whose prior status decides whether credit was already restored.
    pub fn linked_boleto(&self) -> Option<BoletoId> {
        match self {
            Self::Receivable(r) => r.boleto_id,
            Self::Boleto(_) => None,
        }
    }

    pub fn description(&self) -> String {
        match self {
            Self::Receivable(r) => r.description.clone(),
            Self::Boleto(b) => format!("Boleto {}", b.boleto_number),
        }
    }

    pub fn default_method(&self) -> PaymentMethod {
        match self {
            Self::Receivable(r) => r.payment_method.unwrap_or(PaymentMethod::Cash),
            Self::Boleto(_) => PaymentMethod::Boleto,
        }
    }

    pub fn bank_account_id(&self) -> Option<BankAccountId> {
        match self {
            Self::Receivable(r) => r.bank_account_id,
            Self::Boleto(_) => None,
        }
    }

    /// Amount that reached the bank for this debt, used for legacy reversal matching.
    pub fn posted_amount(&self) -> Decimal {
        match self {
            Self::Receivable(r) => r.net_amount.unwrap_or(r.amount),
            Self::Boleto(b) => b.paid_amount.unwrap_or(b.amount),
        }
    }

    pub fn mark_paid(&mut self, settlement: &Settlement) {
        match self {
            Self::Receivable(r) => {
                r.status = ReceivableStatus::Paid;
                r.payment_date = Some(settlement.date);
                r.payment_method = Some(settlement.method);
                r.bank_account_id = settlement.bank_account_id;
                r.interest_amount = settlement.interest;
                r.fine_amount = settlement.fine;
                r.fee_amount = settlement.fee;
                r.net_amount = Some(settlement.net());
                if settlement.notes.is_some() {
                    r.notes = settlement.notes.clone();
                }
            }
            Self::Boleto(b) => b.mark_paid(settlement.collected, settlement.date, &settlement.paid_by),
        }
    }

    pub fn mark_pending(&mut self) {
        match self {
            Self::Receivable(r) => r.reopen(),
            Self::Boleto(b) => b.reopen(),
        }
    }

    pub fn save(self, uow: &mut UnitOfWork<'_>) {
        match self {
            Self::Receivable(r) => uow.put(r),
            Self::Boleto(b) => uow.put(b),
        }
    }
}
