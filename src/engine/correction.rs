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

//! Administrative corrections: edit, reverse and delete.
//!
//! Every step of a reversal is best-effort: a step that finds nothing to undo
//! is logged and the reversal carries on.

use super::receive::refresh_order;
use super::{Engine, today};
use crate::account::BankAccount;
use crate::base::{BankAccountId, BoletoId, ReceivableId};
use crate::boleto::Boleto;
use crate::caller::CallerContext;
use crate::card::CardSale;
use crate::config::CreditReversalPolicy;
use crate::credit;
use crate::customer::Order;
use crate::debt::DebtRef;
use crate::events::LedgerEvent;
use crate::ledger::{self, LegacyIncome, Locate, PostOutcome};
use crate::money;
use crate::receivable::{Receivable, ReceivablePatch};
use crate::settlement;
use crate::store::UnitOfWork;
use crate::transaction::{Posting, Reference, TransactionKind};
use crate::LedgerError;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Result of [`Engine::delete_receivable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    /// The entry was PAID and its effects were undone before removal.
    pub reversed: bool,
}

impl Engine {
    /// Corrects a receivable in place.
    ///
    /// Two side effects follow from the change, never from the patch alone:
    /// attaching a bank account to a PAID receivable that had none posts the
    /// missing ledger entry (once), and switching the method to a card projects
    /// a pending card settlement.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Unauthorized`] - Caller is not an administrator.
    /// - [`LedgerError::NotFound`] - No such receivable.
    /// - [`LedgerError::InvalidAmount`] - Patched amount is zero or negative.
    /// - [`LedgerError::AccountNotFound`] - Patched bank account does not exist.
    pub fn edit_receivable(
        &self,
        caller: &CallerContext,
        id: ReceivableId,
        patch: ReceivablePatch,
    ) -> Result<Receivable, LedgerError> {
        caller.require_admin()?;
        let amount = patch.amount.map(money::positive).transpose()?;

        self.transact("edit_receivable", |uow| {
            let before: Receivable = uow.get(id).ok_or(LedgerError::NotFound)?;
            let mut receivable = before.clone();
            if let Some(description) = &patch.description {
                receivable.description = description.clone();
            }
            if let Some(amount) = amount {
                receivable.amount = amount;
            }
            if let Some(due_date) = patch.due_date {
                receivable.due_date = due_date;
            }
            if let Some(status) = patch.status {
                receivable.status = status;
            }
            if let Some(method) = patch.payment_method {
                receivable.payment_method = Some(method);
            }
            if let Some(account_id) = patch.bank_account_id {
                uow.get::<BankAccount>(account_id)
                    .ok_or(LedgerError::AccountNotFound)?;
                receivable.bank_account_id = Some(account_id);
            }
            if let Some(notes) = &patch.notes {
                receivable.notes = Some(notes.clone());
            }

            let is_card = receivable.payment_method.is_some_and(|m| m.is_card());
            if receivable.is_paid() && before.bank_account_id.is_none() && !is_card {
                if let Some(bank_account_id) = receivable.bank_account_id {
                    post_retroactively(uow, &receivable, bank_account_id)?;
                }
            }

            let was_card = before.payment_method.is_some_and(|m| m.is_card());
            let card_type = receivable.payment_method.and_then(|m| m.card_type());
            if let (false, Some(card_type)) = (was_card, card_type) {
                settlement::spin_off(
                    uow,
                    &self.config,
                    CardSale {
                        gross_amount: receivable.amount,
                        card_type,
                        sale_date: receivable.payment_date.unwrap_or_else(today),
                        order_id: receivable.order_id,
                        receivable_id: Some(receivable.id),
                    },
                )?;
            }

            uow.put(receivable.clone());
            if let Some(order_id) = receivable.order_id {
                refresh_order(uow, order_id);
            }
            debug!(receivable = %id, "receivable edited");
            Ok(receivable)
        })
    }

    /// Sends a PAID receivable back to PENDING.
    ///
    /// Undoes, in order: the ledger entry, the linked boleto's PAID status,
    /// any card projection for the same order or receivable, and the payment
    /// fields. Credit restored on receipt is kept unless the engine is
    /// configured with [`CreditReversalPolicy::Debit`].
    ///
    /// Reversing a partial-payment settlement record folds its amount back
    /// into the still open original, which is returned.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Unauthorized`] - Caller is not an administrator.
    /// - [`LedgerError::ConfirmationRequired`] - `confirmed` is `false`.
    /// - [`LedgerError::NotFound`] - No such receivable.
    /// - [`LedgerError::NotPaid`] - The receivable is not PAID.
    pub fn reverse_receivable(
        &self,
        caller: &CallerContext,
        id: ReceivableId,
        confirmed: bool,
    ) -> Result<Receivable, LedgerError> {
        caller.require_admin()?;
        if !confirmed {
            return Err(LedgerError::ConfirmationRequired);
        }

        self.transact("reverse_receivable", |uow| {
            let mut receivable: Receivable = uow.get(id).ok_or(LedgerError::NotFound)?;
            if !receivable.is_paid() {
                return Err(LedgerError::NotPaid);
            }
            let collected = collected_amount(&receivable);
            info!(receivable = %id, %collected, actor = %caller.actor, "reversing receipt");

            let fallback = self.legacy_hint(&receivable);
            ledger::reverse(uow, Reference::receivable(id), fallback)?;

            if !receivable.is_settlement_record() {
                if let Some(boleto_id) = receivable.boleto_id {
                    match uow.get::<Boleto>(boleto_id) {
                        Some(mut boleto) if boleto.is_paid() => {
                            boleto.reopen();
                            uow.put(boleto);
                            debug!(boleto = %boleto_id, "linked boleto reopened");
                        }
                        _ => debug!(boleto = %boleto_id, "linked boleto not paid, left as is"),
                    }
                }
            }

            settlement::remove_projections(uow, receivable.order_id, Some(id));

            if self.config.credit_on_reversal == CreditReversalPolicy::Debit {
                if let Some(customer_id) = receivable.customer_id {
                    credit::withdraw(uow, customer_id, collected)?;
                }
            }

            let reverted = match receivable
                .settlement_of
                .and_then(|origin| uow.get::<Receivable>(origin))
                .filter(|origin| origin.status.is_open())
            {
                Some(mut origin) => {
                    origin.amount = money::round2(origin.amount + receivable.amount);
                    uow.delete::<Receivable>(id);
                    uow.put(origin.clone());
                    origin
                }
                None => {
                    receivable.reopen();
                    receivable.settlement_of = None;
                    uow.put(receivable.clone());
                    receivable
                }
            };

            if let Some(order_id) = reverted.order_id {
                refresh_order(uow, order_id);
            }
            uow.record(LedgerEvent::EntryReversed {
                target: DebtRef::Receivable(id),
            });
            Ok(reverted)
        })
    }

    /// Sends a PAID boleto back to PENDING.
    ///
    /// Undoes its `BOLETO` ledger entry and the card projection of its order,
    /// and applies the configured [`CreditReversalPolicy`] to the amount it
    /// collected. A shortfall receivable left by a partial payment stays open.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Unauthorized`] - Caller is not an administrator.
    /// - [`LedgerError::ConfirmationRequired`] - `confirmed` is `false`.
    /// - [`LedgerError::NotFound`] - No such boleto.
    /// - [`LedgerError::NotPaid`] - The boleto is not PAID.
    pub fn reverse_boleto(
        &self,
        caller: &CallerContext,
        id: BoletoId,
        confirmed: bool,
    ) -> Result<Boleto, LedgerError> {
        caller.require_admin()?;
        if !confirmed {
            return Err(LedgerError::ConfirmationRequired);
        }

        self.transact("reverse_boleto", |uow| {
            let mut boleto: Boleto = uow.get(id).ok_or(LedgerError::NotFound)?;
            if !boleto.is_paid() {
                return Err(LedgerError::NotPaid);
            }
            let collected = boleto.paid_amount.unwrap_or(boleto.amount);
            info!(boleto = %id, %collected, actor = %caller.actor, "reversing boleto receipt");

            ledger::reverse(uow, Reference::boleto(id), None)?;
            settlement::remove_projections(uow, boleto.order_id, None);

            if self.config.credit_on_reversal == CreditReversalPolicy::Debit {
                if let Some(customer_id) = boleto.customer_id {
                    credit::withdraw(uow, customer_id, collected)?;
                }
            }

            boleto.reopen();
            uow.put(boleto.clone());
            if let Some(order_id) = boleto.order_id {
                refresh_order(uow, order_id);
            }
            uow.record(LedgerEvent::EntryReversed {
                target: DebtRef::Boleto(id),
            });
            Ok(boleto)
        })
    }

    /// Deletes a receivable no live order references.
    ///
    /// A PAID entry has its money effect undone first: an EXPENSE tagged
    /// `RECEIVABLE_REVERSAL` offsets the original income, which stays in the
    /// ledger as audit trail, and its card projection is removed.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Unauthorized`] - Caller is not an administrator.
    /// - [`LedgerError::NotFound`] - No such receivable.
    /// - [`LedgerError::BlockedByOrder`] - Its order still exists.
    pub fn delete_receivable(
        &self,
        caller: &CallerContext,
        id: ReceivableId,
    ) -> Result<DeleteOutcome, LedgerError> {
        caller.require_admin()?;

        self.transact("delete_receivable", |uow| {
            let receivable: Receivable = uow.get(id).ok_or(LedgerError::NotFound)?;
            if let Some(order_id) = receivable.order_id {
                if uow.get::<Order>(order_id).is_some() {
                    return Err(LedgerError::BlockedByOrder);
                }
            }

            let reversed = receivable.is_paid();
            if reversed {
                self.offset_income(uow, &receivable)?;
                settlement::remove_projections(uow, receivable.order_id, Some(id));
            }
            uow.delete::<Receivable>(id);
            uow.record(LedgerEvent::EntryDeleted {
                receivable_id: id,
                reversed,
            });
            info!(receivable = %id, reversed, actor = %caller.actor, "receivable deleted");
            Ok(DeleteOutcome { reversed })
        })
    }

    fn legacy_hint(&self, receivable: &Receivable) -> Option<LegacyIncome> {
        if !self.config.legacy_transaction_fallback {
            return None;
        }
        receivable.bank_account_id.map(|bank_account_id| LegacyIncome {
            bank_account_id,
            amount: receivable.net_amount.unwrap_or(receivable.amount),
        })
    }

    /// Writes the EXPENSE that cancels a deleted receivable's income.
    fn offset_income(
        &self,
        uow: &mut UnitOfWork<'_>,
        receivable: &Receivable,
    ) -> Result<(), LedgerError> {
        let original = ledger::find_by_reference(uow, Reference::receivable(receivable.id))
            .or_else(|| self.legacy_hint(receivable).and_then(|hint| hint.locate(uow)));
        let Some(original) = original else {
            warn!(receivable = %receivable.id, "no ledger entry to offset on delete");
            uow.record(LedgerEvent::ReversalTransactionMissing {
                reference: Reference::receivable(receivable.id),
            });
            return Ok(());
        };

        ledger::post(
            uow,
            Posting {
                bank_account_id: original.bank_account_id,
                kind: TransactionKind::Expense,
                amount: original.amount,
                date: today(),
                description: format!(
                    "Reversal of deleted receivable: {}",
                    receivable.description
                ),
                reference: Some(Reference::receivable_reversal(receivable.id)),
                notes: Some(format!("Offsets transaction #{}", original.id)),
            },
        )?;
        Ok(())
    }
}

/// Posts the income of a PAID receivable that was received without an account.
///
/// The duplicate guard makes this a no-op when the entry already exists.
fn post_retroactively(
    uow: &mut UnitOfWork<'_>,
    receivable: &Receivable,
    bank_account_id: BankAccountId,
) -> Result<(), LedgerError> {
    let amount = receivable.net_amount.unwrap_or(receivable.amount);
    if amount <= Decimal::ZERO {
        return Ok(());
    }
    let outcome = ledger::post(
        uow,
        Posting {
            bank_account_id,
            kind: TransactionKind::Income,
            amount,
            date: receivable.payment_date.unwrap_or_else(today),
            description: format!("Receipt: {}", receivable.description),
            reference: Some(Reference::receivable(receivable.id)),
            notes: receivable.notes.clone(),
        },
    )?;
    if let PostOutcome::Posted(transaction) = outcome {
        info!(
            receivable = %receivable.id,
            transaction = %transaction.id,
            %amount,
            "posted income retroactively after account was attached"
        );
    }
    Ok(())
}

/// Amount actually received for a PAID receivable.
fn collected_amount(receivable: &Receivable) -> Decimal {
    receivable
        .net_amount
        .map_or(receivable.amount, |net| money::round2(net + receivable.fee_amount))
}
