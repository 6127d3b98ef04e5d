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

//! Credit restoration.
//!
//! Paying a debt gives credit back to the customer, never beyond the limit,
//! and never twice for the same boleto.

use crate::LedgerError;
use crate::base::{BoletoId, CustomerId};
use crate::boleto::BoletoStatus;
use crate::customer::{CreditRestoration, Customer};
use crate::events::LedgerEvent;
use crate::store::UnitOfWork;
use rust_decimal::Decimal;
use tracing::{debug, info};

/// Status a linked boleto had before the current operation touched it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PriorBoleto {
    pub id: BoletoId,
    pub status: BoletoStatus,
}

/// Restores `amount` of credit to `customer_id`.
///
/// When the debt is paid through a receivable mirroring a boleto that was
/// already PAID (for example by a processor webhook), credit was restored
/// then; this call is a logged no-op and returns `None`.
///
/// # Errors
///
/// [`LedgerError::CustomerNotFound`] if the customer does not exist.
pub(crate) fn restore(
    uow: &mut UnitOfWork<'_>,
    customer_id: CustomerId,
    amount: Decimal,
    prior_boleto: Option<PriorBoleto>,
) -> Result<Option<CreditRestoration>, LedgerError> {
    if let Some(prior) = prior_boleto.filter(|prior| prior.status == BoletoStatus::Paid) {
        info!(
            customer = %customer_id,
            boleto = %prior.id,
            "boleto already paid, credit was restored then"
        );
        uow.record(LedgerEvent::CreditRestorationSkipped {
            customer_id,
            boleto_id: prior.id,
        });
        return Ok(None);
    }

    let mut customer: Customer = uow
        .get(customer_id)
        .ok_or(LedgerError::CustomerNotFound)?;
    let restoration = customer.restore(amount);
    if restoration.clamped {
        info!(
            customer = %customer_id,
            requested = %amount,
            restored = %restoration.restored,
            limit = %customer.credit_limit,
            "credit restoration clamped to limit"
        );
    } else {
        debug!(customer = %customer_id, restored = %restoration.restored, "credit restored");
    }
    uow.put(customer);
    uow.record(LedgerEvent::CreditRestored(restoration));
    Ok(Some(restoration))
}

/// Books `amount` against the customer's available credit.
///
/// # Errors
///
/// - [`LedgerError::CustomerNotFound`] - The customer does not exist.
/// - [`LedgerError::InsufficientCredit`] - Not enough credit available.
pub(crate) fn consume(
    uow: &mut UnitOfWork<'_>,
    customer_id: CustomerId,
    amount: Decimal,
) -> Result<Decimal, LedgerError> {
    let mut customer: Customer = uow
        .get(customer_id)
        .ok_or(LedgerError::CustomerNotFound)?;
    let available = customer.consume(amount)?;
    uow.put(customer);
    Ok(available)
}

/// Takes back up to `amount` of credit after a reversal; returns what was taken.
pub(crate) fn withdraw(
    uow: &mut UnitOfWork<'_>,
    customer_id: CustomerId,
    amount: Decimal,
) -> Result<Decimal, LedgerError> {
    let mut customer: Customer = uow
        .get(customer_id)
        .ok_or(LedgerError::CustomerNotFound)?;
    let taken = customer.withdraw(amount);
    uow.put(customer);
    uow.record(LedgerEvent::CreditWithdrawn {
        customer_id,
        amount: taken,
    });
    Ok(taken)
}
