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

//! Bank accounts.
//!
//! A [`BankAccount`] is a named money pool. Its balance only moves together
//! with a ledger [`Transaction`](crate::Transaction), written by the engine.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use boleto_ledger::{BankAccount, BankAccountId};
//!
//! let account = BankAccount::new(BankAccountId(1), "Caixa", dec!(50.00));
//! assert_eq!(account.balance, dec!(50.00));
//! ```

use crate::base::BankAccountId;
use crate::money::{fixed2, round2};
use crate::transaction::TransactionKind;
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeStruct, Serializer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankAccount {
    pub id: BankAccountId,
    pub name: String,
    pub initial_balance: Decimal,
    pub balance: Decimal,
}

impl BankAccount {
    pub fn new(id: BankAccountId, name: impl Into<String>, initial_balance: Decimal) -> Self {
        let initial_balance = round2(initial_balance);
        Self {
            id,
            name: name.into(),
            initial_balance,
            balance: initial_balance,
        }
    }

    /// Moves the balance by `amount` in the direction of `kind`; returns the new balance.
    pub(crate) fn apply(&mut self, kind: TransactionKind, amount: Decimal) -> Decimal {
        self.balance = round2(self.balance + kind.signed(amount));
        self.balance
    }

    /// Undoes a previous [`apply`](Self::apply) with the same arguments.
    pub(crate) fn unapply(&mut self, kind: TransactionKind, amount: Decimal) -> Decimal {
        self.balance = round2(self.balance - kind.signed(amount));
        self.balance
    }
}

impl Serialize for BankAccount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("BankAccount", 4)?;
        state.serialize_field("account", &self.id)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("initial_balance", &fixed2(self.initial_balance))?;
        state.serialize_field("balance", &fixed2(self.balance))?;
        state.end()
    }
}
