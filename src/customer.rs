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

//! Customer credit fields and orders, as far as the ledger touches them.

use crate::LedgerError;
use crate::base::{CustomerId, OrderId};
use crate::money::round2;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Credit line of a customer.
///
/// Invariant: `0 <= available_credit <= credit_limit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub credit_limit: Decimal,
    pub available_credit: Decimal,
}

/// Outcome of returning credit to a customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditRestoration {
    pub customer_id: CustomerId,
    pub restored: Decimal,
    pub new_available_credit: Decimal,
    /// The candidate exceeded the limit and was cut down to it.
    pub clamped: bool,
}

impl Customer {
    fn assert_invariants(&self) {
        debug_assert!(
            self.available_credit >= Decimal::ZERO,
            "Invariant violated: available credit went negative: {}",
            self.available_credit
        );
        debug_assert!(
            self.available_credit <= self.credit_limit,
            "Invariant violated: available credit {} above limit {}",
            self.available_credit,
            self.credit_limit
        );
    }

    /// Adds `amount` back to available credit, capped at the limit.
    pub(crate) fn restore(&mut self, amount: Decimal) -> CreditRestoration {
        let before = self.available_credit;
        let candidate = round2(before + amount.max(Decimal::ZERO));
        let clamped = candidate > self.credit_limit;
        self.available_credit = candidate.min(self.credit_limit);
        self.assert_invariants();
        CreditRestoration {
            customer_id: self.id,
            restored: round2(self.available_credit - before),
            new_available_credit: self.available_credit,
            clamped,
        }
    }

    /// Books `amount` against available credit.
    pub(crate) fn consume(&mut self, amount: Decimal) -> Result<Decimal, LedgerError> {
        let candidate = round2(self.available_credit - amount);
        if candidate < Decimal::ZERO {
            return Err(LedgerError::InsufficientCredit);
        }
        self.available_credit = candidate;
        self.assert_invariants();
        Ok(self.available_credit)
    }

    /// Takes back up to `amount` of credit, stopping at zero. Returns what was taken.
    pub(crate) fn withdraw(&mut self, amount: Decimal) -> Decimal {
        let taken = amount.max(Decimal::ZERO).min(self.available_credit);
        self.available_credit = round2(self.available_credit - taken);
        self.assert_invariants();
        taken
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderPaymentStatus {
    Pending,
    Partial,
    Paid,
}

/// The slice of an order the ledger owns: its payment status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: Option<CustomerId>,
    pub payment_status: OrderPaymentStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn customer(limit: Decimal, available: Decimal) -> Customer {
        Customer {
            id: CustomerId(1),
            name: "Padaria Central".into(),
            credit_limit: limit,
            available_credit: available,
        }
    }

    #[test]
    fn restore_below_limit() {
        let mut c = customer(dec!(1000), dec!(300));
        let r = c.restore(dec!(500));
        assert_eq!(r.new_available_credit, dec!(800));
        assert_eq!(r.restored, dec!(500));
        assert!(!r.clamped);
    }

    #[test]
    fn restore_clamps_to_limit() {
        let mut c = customer(dec!(1000), dec!(900));
        let r = c.restore(dec!(500));
        assert_eq!(r.new_available_credit, dec!(1000));
        assert_eq!(r.restored, dec!(100));
        assert!(r.clamped);
    }

    #[test]
    fn consume_rejects_overdraft() {
        let mut c = customer(dec!(100), dec!(50));
        assert_eq!(c.consume(dec!(60)), Err(LedgerError::InsufficientCredit));
        assert_eq!(c.available_credit, dec!(50));
        assert_eq!(c.consume(dec!(50)), Ok(Decimal::ZERO));
    }

    #[test]
    fn withdraw_stops_at_zero() {
        let mut c = customer(dec!(100), dec!(30));
        assert_eq!(c.withdraw(dec!(45)), dec!(30));
        assert_eq!(c.available_credit, Decimal::ZERO);
    }
}
