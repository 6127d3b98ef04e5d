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

//! Card settlement spin-off.
//!
//! Card payments never reach a bank account directly. They produce a pending
//! [`CardTransaction`] instead, at most one per sale.

use crate::LedgerError;
use crate::base::{CardTransactionId, OrderId, ReceivableId};
use crate::card::{CardFeeConfig, CardSale, CardTransaction};
use crate::config::LedgerConfig;
use crate::events::LedgerEvent;
use crate::money;
use crate::store::UnitOfWork;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SpinOff {
    Created(CardTransaction),
    /// The sale was already projected; nothing was written.
    Existing(CardTransaction),
}

/// Records a pending settlement for `sale` unless one already exists.
pub(crate) fn spin_off(
    uow: &mut UnitOfWork<'_>,
    config: &LedgerConfig,
    sale: CardSale,
) -> Result<SpinOff, LedgerError> {
    money::positive(sale.gross_amount)?;

    let candidate = sale.clone();
    if let Some(existing) = uow
        .scan_where::<CardTransaction>(move |existing| candidate.is_projected_by(existing))
        .into_iter()
        .next()
    {
        info!(
            existing = %existing.id,
            order = ?sale.order_id,
            receivable = ?sale.receivable_id,
            "card settlement already projected, skipping"
        );
        uow.record(LedgerEvent::CardSettlementSkipped {
            existing: existing.id,
        });
        return Ok(SpinOff::Existing(existing));
    }

    let fee_percentage = uow
        .get::<CardFeeConfig>(sale.card_type)
        .filter(|fee| fee.active)
        .map_or_else(|| config.default_fee(sale.card_type), |fee| fee.fee_percentage);
    let id = CardTransactionId(uow.next_id::<CardTransaction>());
    let projected = sale.project(id, fee_percentage, config.settlement_days(sale.card_type));
    debug!(
        card_transaction = %projected.id,
        card_type = ?projected.card_type,
        gross = %projected.gross_amount,
        net = %projected.net_amount,
        expected = %projected.expected_date,
        "card settlement projected"
    );
    uow.put(projected.clone());
    uow.record(LedgerEvent::CardSettlementProjected {
        card_transaction_id: projected.id,
        card_type: projected.card_type,
        gross_amount: projected.gross_amount,
    });
    Ok(SpinOff::Created(projected))
}

/// Deletes projections tied to `order_id` or `receivable_id`; returns how many.
pub(crate) fn remove_projections(
    uow: &mut UnitOfWork<'_>,
    order_id: Option<OrderId>,
    receivable_id: Option<ReceivableId>,
) -> usize {
    let doomed: Vec<CardTransactionId> = uow
        .scan_where::<CardTransaction>(move |card| {
            (order_id.is_some() && card.order_id == order_id)
                || (receivable_id.is_some() && card.receivable_id == receivable_id)
        })
        .into_iter()
        .map(|card| card.id)
        .collect();
    for id in &doomed {
        uow.delete::<CardTransaction>(*id);
        uow.record(LedgerEvent::CardSettlementRemoved {
            card_transaction_id: *id,
        });
    }
    if doomed.is_empty() {
        debug!(order = ?order_id, receivable = ?receivable_id, "no card settlement to remove");
    }
    doomed.len()
}
