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

//! Card-network settlement projections.
//!
//! A card payment is not money in the bank yet: the acquirer pays the net
//! amount later. A [`CardTransaction`] records what is expected and when.

use crate::base::{CardTransactionId, OrderId, ReceivableId};
use crate::money::{percent_of, round2};
use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardType {
    Debit,
    Credit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardStatus {
    Pending,
    Received,
}

/// Fee configured for a card type. Only active configs are used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardFeeConfig {
    pub card_type: CardType,
    pub fee_percentage: Decimal,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardTransaction {
    pub id: CardTransactionId,
    pub gross_amount: Decimal,
    pub fee_percentage: Decimal,
    pub fee_amount: Decimal,
    pub net_amount: Decimal,
    pub card_type: CardType,
    pub status: CardStatus,
    pub sale_date: NaiveDate,
    pub expected_date: NaiveDate,
    pub order_id: Option<OrderId>,
    pub receivable_id: Option<ReceivableId>,
}

/// A card sale waiting to become a [`CardTransaction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardSale {
    pub gross_amount: Decimal,
    pub card_type: CardType,
    pub sale_date: NaiveDate,
    pub order_id: Option<OrderId>,
    pub receivable_id: Option<ReceivableId>,
}

impl CardSale {
    /// Computes fee, net and expected settlement date for this sale.
    pub(crate) fn project(
        &self,
        id: CardTransactionId,
        fee_percentage: Decimal,
        settlement_days: u64,
    ) -> CardTransaction {
        let gross_amount = round2(self.gross_amount);
        let fee_amount = percent_of(gross_amount, fee_percentage);
        CardTransaction {
            id,
            gross_amount,
            fee_percentage,
            fee_amount,
            net_amount: round2(gross_amount - fee_amount),
            card_type: self.card_type,
            status: CardStatus::Pending,
            sale_date: self.sale_date,
            expected_date: self
                .sale_date
                .checked_add_days(Days::new(settlement_days))
                .unwrap_or(self.sale_date),
            order_id: self.order_id,
            receivable_id: self.receivable_id,
        }
    }

    /// Whether `existing` already projects this sale.
    ///
    /// Sales tied to an order match on the order; otherwise on the
    /// receivable; otherwise on gross amount and sale date.
    pub(crate) fn is_projected_by(&self, existing: &CardTransaction) -> bool {
        if let Some(order_id) = self.order_id {
            return existing.order_id == Some(order_id);
        }
        if let Some(receivable_id) = self.receivable_id {
            return existing.receivable_id == Some(receivable_id);
        }
        existing.gross_amount == round2(self.gross_amount) && existing.sale_date == self.sale_date
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sale(card_type: CardType) -> CardSale {
        CardSale {
            gross_amount: dec!(150.00),
            card_type,
            sale_date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            order_id: None,
            receivable_id: None,
        }
    }

    #[test]
    fn credit_projection_settles_in_thirty_days() {
        let projected = sale(CardType::Credit).project(CardTransactionId(1), dec!(3.24), 30);
        assert_eq!(projected.fee_amount, dec!(4.86));
        assert_eq!(projected.net_amount, dec!(145.14));
        assert_eq!(
            projected.expected_date,
            NaiveDate::from_ymd_opt(2025, 2, 9).unwrap()
        );
        assert_eq!(projected.status, CardStatus::Pending);
    }

    #[test]
    fn debit_projection_settles_next_day() {
        let projected = sale(CardType::Debit).project(CardTransactionId(1), dec!(0.9), 1);
        assert_eq!(projected.fee_amount, dec!(1.35));
        assert_eq!(
            projected.expected_date,
            NaiveDate::from_ymd_opt(2025, 1, 11).unwrap()
        );
    }

    #[test]
    fn order_sales_match_on_order_only() {
        let mut with_order = sale(CardType::Credit);
        with_order.order_id = Some(OrderId(9));
        let mut existing = with_order.project(CardTransactionId(1), dec!(3.24), 30);
        assert!(with_order.is_projected_by(&existing));

        existing.order_id = Some(OrderId(10));
        assert!(!with_order.is_projected_by(&existing));
    }

    #[test]
    fn loose_sales_match_on_amount_and_date() {
        let loose = sale(CardType::Debit);
        let existing = loose.project(CardTransactionId(1), dec!(0.9), 1);
        assert!(loose.is_projected_by(&existing));

        let mut other = sale(CardType::Debit);
        other.gross_amount = dec!(151.00);
        assert!(!other.is_projected_by(&existing));
    }
}
