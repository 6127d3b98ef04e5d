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

//! Journal of committed ledger events.
//!
//! Events are queued inside a unit of work and pushed here only when it
//! commits, so retried or failed attempts never show up.

use crate::base::{
    BankAccountId, BoletoId, CardTransactionId, CustomerId, OrderId, ReceivableId, TransactionId,
};
use crate::card::CardType;
use crate::customer::{CreditRestoration, OrderPaymentStatus};
use crate::debt::DebtRef;
use crate::transaction::Reference;
use crossbeam::queue::SegQueue;
use rust_decimal::Decimal;
use serde::Serialize;

/// How a ledger row was found for reversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchKind {
    /// By `(referenceType, referenceId)`.
    Exact,
    /// By account, INCOME and amount, on a row with no reference.
    LegacyFallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    PaymentReceived {
        target: DebtRef,
        amount: Decimal,
        partial: bool,
    },
    SettlementRecorded {
        receivable_id: ReceivableId,
        settlement_id: ReceivableId,
        amount: Decimal,
    },
    ShortfallCreated {
        boleto_id: BoletoId,
        receivable_id: ReceivableId,
        amount: Decimal,
    },
    TransactionPosted {
        transaction_id: TransactionId,
        bank_account_id: BankAccountId,
        reference: Option<Reference>,
        amount: Decimal,
    },
    DuplicatePostSkipped {
        existing: TransactionId,
        reference: Reference,
    },
    TransactionReversed {
        transaction_id: TransactionId,
        bank_account_id: BankAccountId,
        amount: Decimal,
        matched_by: MatchKind,
    },
    ReversalTransactionMissing {
        reference: Reference,
    },
    CreditRestored(CreditRestoration),
    CreditRestorationSkipped {
        customer_id: CustomerId,
        boleto_id: BoletoId,
    },
    CreditWithdrawn {
        customer_id: CustomerId,
        amount: Decimal,
    },
    CardSettlementProjected {
        card_transaction_id: CardTransactionId,
        card_type: CardType,
        gross_amount: Decimal,
    },
    CardSettlementSkipped {
        existing: CardTransactionId,
    },
    CardSettlementRemoved {
        card_transaction_id: CardTransactionId,
    },
    OrderStatusChanged {
        order_id: OrderId,
        status: OrderPaymentStatus,
    },
    EntryReversed {
        target: DebtRef,
    },
    EntryDeleted {
        receivable_id: ReceivableId,
        reversed: bool,
    },
    BoletoCancelled {
        boleto_id: BoletoId,
    },
}

/// Lock-free, ordered journal of [`LedgerEvent`]s.
#[derive(Debug)]
pub struct EventLog {
    events: SegQueue<LedgerEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            events: SegQueue::new(),
        }
    }

    pub(crate) fn publish(&self, events: Vec<LedgerEvent>) {
        for event in events {
            self.events.push(event);
        }
    }

    /// Removes and returns every event published so far, oldest first.
    pub fn drain(&self) -> Vec<LedgerEvent> {
        std::iter::from_fn(|| self.events.pop()).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}
