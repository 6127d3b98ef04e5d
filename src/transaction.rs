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

//! Ledger transactions.
//!
//! A [`Transaction`] is immutable once written. A row only leaves the ledger
//! through reversal, which restores the account balance in the same unit of work.

use crate::base::{BankAccountId, BoletoId, ReceivableId, TransactionId};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    /// `amount` with the sign this kind applies to a balance.
    pub fn signed(self, amount: Decimal) -> Decimal {
        match self {
            Self::Income => amount,
            Self::Expense => -amount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceType {
    Receivable,
    Boleto,
    ReceivableReversal,
}

/// What a ledger entry was posted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub kind: ReferenceType,
    pub id: u32,
}

impl Reference {
    pub fn receivable(id: ReceivableId) -> Self {
        Self {
            kind: ReferenceType::Receivable,
            id: id.0,
        }
    }

    pub fn boleto(id: BoletoId) -> Self {
        Self {
            kind: ReferenceType::Boleto,
            id: id.0,
        }
    }

    pub fn receivable_reversal(id: ReceivableId) -> Self {
        Self {
            kind: ReferenceType::ReceivableReversal,
            id: id.0,
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ReferenceType::Receivable => "RECEIVABLE",
            ReferenceType::Boleto => "BOLETO",
            ReferenceType::ReceivableReversal => "RECEIVABLE_REVERSAL",
        };
        write!(f, "{}#{}", kind, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub bank_account_id: BankAccountId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub description: String,
    /// `None` only on legacy rows written before references were recorded.
    pub reference: Option<Reference>,
    pub balance_after: Decimal,
    pub notes: Option<String>,
}

impl Transaction {
    pub fn signed_amount(&self) -> Decimal {
        self.kind.signed(self.amount)
    }
}

/// A request to write one ledger entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub bank_account_id: BankAccountId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub description: String,
    pub reference: Option<Reference>,
    pub notes: Option<String>,
}
