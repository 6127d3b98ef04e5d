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

//! Receiving payments, full or partial, and polling the payment processor.

use super::{Engine, today};
use crate::account::BankAccount;
use crate::base::{BoletoId, OrderId, ReceivableId};
use crate::boleto::{Boleto, BoletoStatus};
use crate::caller::CallerContext;
use crate::card::CardSale;
use crate::credit::{self, PriorBoleto};
use crate::customer::{Order, OrderPaymentStatus};
use crate::debt::{Debt, DebtRef, Settlement};
use crate::events::LedgerEvent;
use crate::gateway::{BoletoCheck, BoletoStatusProvider, ProcessorStatus};
use crate::ledger;
use crate::money;
use crate::payment::{PaymentMethod, ReceiveOutcome, ReceivePayment, ReceiveStatus};
use crate::receivable::{Receivable, ReceivableStatus};
use crate::settlement;
use crate::store::UnitOfWork;
use crate::transaction::{Posting, Reference, TransactionKind};
use crate::LedgerError;
use rust_decimal::Decimal;
use tracing::{debug, info};

/// How the target of a receive is looked up.
#[derive(Debug, Clone, Copy)]
enum Target {
    /// Bare id of a receivable or a boleto.
    Any(u32),
    Exact(DebtRef),
}

/// Validated amounts of a [`ReceivePayment`].
struct Amounts {
    paid: Decimal,
    interest: Decimal,
    fine: Decimal,
    fee: Decimal,
}

impl Amounts {
    fn validate(request: &ReceivePayment) -> Result<Self, LedgerError> {
        let amounts = Self {
            paid: money::positive(request.amount)?,
            interest: money::non_negative(request.interest)?,
            fine: money::non_negative(request.fine)?,
            fee: money::non_negative(request.fee)?,
        };
        if amounts.fee > amounts.paid {
            return Err(LedgerError::InvalidAmount);
        }
        Ok(amounts)
    }
}

impl Engine {
    /// Applies a payment to the receivable or boleto named by `request.id`.
    ///
    /// | Outcome | Effect |
    /// |---------|--------|
    /// | Full | Debt marked PAID with payment date, method, account and net amount |
    /// | Partial receivable | Paid settlement record for the amount received; original reduced to the remainder |
    /// | Partial boleto | Boleto PAID with `paid_amount` = amount received; new receivable for the shortfall |
    ///
    /// In every case credit is restored by the amount collected, the order
    /// status is recomputed, and the net amount is posted to the bank account
    /// unless the method is a card, which projects a card settlement instead.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] - Non-positive payment, negative charge, or fee above payment.
    /// - [`LedgerError::NotFound`] - `id` is neither a receivable nor a boleto.
    /// - [`LedgerError::AlreadyPaid`] - The debt is already PAID.
    /// - [`LedgerError::AccountNotFound`] - The bank account does not exist.
    /// - [`LedgerError::CustomerNotFound`] - The debt names a customer that does not exist.
    pub fn receive_payment(
        &self,
        caller: &CallerContext,
        request: ReceivePayment,
    ) -> Result<ReceiveOutcome, LedgerError> {
        self.receive(caller, Target::Any(request.id), &request)
    }

    /// Asks the payment processor about a boleto and applies what it reports.
    ///
    /// A paid report runs the receive path with no bank account; the processor
    /// settles into the bank separately. Boletos without a processor reference,
    /// or no longer pending, are not polled. A boleto paid by a concurrent
    /// receive while the processor was being asked is reported unchanged.
    pub fn check_boleto_status(
        &self,
        caller: &CallerContext,
        boleto_id: BoletoId,
        provider: &dyn BoletoStatusProvider,
    ) -> Result<BoletoCheck, LedgerError> {
        let boleto: Boleto = self.store.get(boleto_id).ok_or(LedgerError::NotFound)?;
        let unchanged = BoletoCheck {
            was_updated: false,
            new_status: boleto.status,
        };
        let Some(pix_payment_id) = boleto.pix_payment_id.as_deref() else {
            debug!(boleto = %boleto_id, "boleto has no processor reference, not polling");
            return Ok(unchanged);
        };
        if boleto.status != BoletoStatus::Pending {
            return Ok(unchanged);
        }

        match provider.status(pix_payment_id) {
            ProcessorStatus::Pending => Ok(unchanged),
            ProcessorStatus::Paid { amount, paid_on } => {
                info!(boleto = %boleto_id, pix_payment_id, "processor reports boleto paid");
                let paid = amount.unwrap_or(boleto.amount);
                let mut request =
                    ReceivePayment::new(boleto_id.0, paid).with_method(PaymentMethod::Boleto);
                request.payment_date = paid_on;
                match self.receive(caller, Target::Exact(DebtRef::Boleto(boleto_id)), &request) {
                    Ok(_) => Ok(BoletoCheck {
                        was_updated: true,
                        new_status: BoletoStatus::Paid,
                    }),
                    Err(LedgerError::AlreadyPaid) => {
                        debug!(boleto = %boleto_id, "boleto was paid while polling, nothing to apply");
                        Ok(BoletoCheck {
                            was_updated: false,
                            new_status: BoletoStatus::Paid,
                        })
                    }
                    Err(err) => Err(err),
                }
            }
            ProcessorStatus::Cancelled => {
                info!(boleto = %boleto_id, pix_payment_id, "processor reports boleto cancelled");
                self.transact("cancel_boleto", |uow| {
                    let mut boleto: Boleto = uow.get(boleto_id).ok_or(LedgerError::NotFound)?;
                    if boleto.is_paid() {
                        return Err(LedgerError::AlreadyPaid);
                    }
                    boleto.status = BoletoStatus::Cancelled;
                    uow.put(boleto);
                    uow.record(LedgerEvent::BoletoCancelled { boleto_id });
                    Ok(())
                })?;
                Ok(BoletoCheck {
                    was_updated: true,
                    new_status: BoletoStatus::Cancelled,
                })
            }
        }
    }

    fn receive(
        &self,
        caller: &CallerContext,
        target: Target,
        request: &ReceivePayment,
    ) -> Result<ReceiveOutcome, LedgerError> {
        let amounts = Amounts::validate(request)?;
        let date = request.payment_date.unwrap_or_else(today);

        self.transact("receive_payment", |uow| {
            let debt = match target {
                Target::Any(id) => Debt::resolve(uow, id)?,
                Target::Exact(reference) => Debt::load(uow, reference)?,
            };
            if debt.is_paid() {
                return Err(LedgerError::AlreadyPaid);
            }
            if let Some(account_id) = request.bank_account_id {
                uow.get::<BankAccount>(account_id)
                    .ok_or(LedgerError::AccountNotFound)?;
            }

            let method = request
                .payment_method
                .unwrap_or_else(|| debt.default_method());
            let settlement = Settlement {
                collected: amounts.paid,
                interest: amounts.interest,
                fine: amounts.fine,
                fee: amounts.fee,
                date,
                method,
                // Card money reaches the bank through the acquirer, not this account.
                bank_account_id: request.bank_account_id.filter(|_| !method.is_card()),
                paid_by: caller.actor.clone(),
                notes: request.notes.clone(),
            };
            self.apply_receipt(uow, debt, &settlement)
        })
    }

    fn apply_receipt(
        &self,
        uow: &mut UnitOfWork<'_>,
        mut debt: Debt,
        settlement: &Settlement,
    ) -> Result<ReceiveOutcome, LedgerError> {
        let target = debt.reference();
        let total_owed = money::round2(debt.amount() + settlement.interest + settlement.fine);
        let remaining = money::round2(total_owed - settlement.collected);
        let is_partial = !money::is_settled(remaining);
        let prior_boleto = debt
            .linked_boleto()
            .and_then(|id| uow.get::<Boleto>(id))
            .map(|boleto| PriorBoleto {
                id: boleto.id,
                status: boleto.status,
            });

        info!(
            ?target,
            collected = %settlement.collected,
            %total_owed,
            %remaining,
            is_partial,
            method = %settlement.method,
            "receiving payment"
        );

        // A partial payment's card projection belongs to its settlement record.
        let mut card_receivable = match &debt {
            Debt::Receivable(receivable) => Some(receivable.id),
            Debt::Boleto(_) => None,
        };
        let ledger_reference = if is_partial {
            match &mut debt {
                Debt::Receivable(original) => {
                    let record = settlement_record(uow, original, settlement);
                    original.amount = remaining;
                    original.status = ReceivableStatus::Pending;
                    uow.record(LedgerEvent::SettlementRecorded {
                        receivable_id: original.id,
                        settlement_id: record.id,
                        amount: record.amount,
                    });
                    let reference = Reference::receivable(record.id);
                    card_receivable = Some(record.id);
                    uow.put(record);
                    reference
                }
                Debt::Boleto(boleto) => {
                    boleto.mark_paid(settlement.collected, settlement.date, &settlement.paid_by);
                    let shortfall = shortfall_receivable(uow, boleto, remaining);
                    uow.record(LedgerEvent::ShortfallCreated {
                        boleto_id: boleto.id,
                        receivable_id: shortfall.id,
                        amount: remaining,
                    });
                    uow.put(shortfall);
                    Reference::boleto(boleto.id)
                }
            }
        } else {
            debt.mark_paid(settlement);
            debt.ledger_reference()
        };

        // A fully paid mirror pays its boleto too, with everything it collected.
        if let (false, Some(prior), Debt::Receivable(mirror)) = (is_partial, prior_boleto, &debt) {
            if prior.status != BoletoStatus::Paid {
                if let Some(mut boleto) = uow.get::<Boleto>(prior.id) {
                    let collected = collected_so_far(uow, mirror.id, settlement.collected);
                    boleto.mark_paid(collected, settlement.date, &settlement.paid_by);
                    uow.put(boleto);
                }
            }
        }

        if let Some(customer_id) = debt.customer_id() {
            credit::restore(uow, customer_id, settlement.collected, prior_boleto)?;
        }

        if let Some(card_type) = settlement.method.card_type() {
            settlement::spin_off(
                uow,
                &self.config,
                CardSale {
                    gross_amount: settlement.collected,
                    card_type,
                    sale_date: settlement.date,
                    order_id: debt.order_id(),
                    receivable_id: card_receivable,
                },
            )?;
        } else if let Some(bank_account_id) = settlement.bank_account_id {
            let net = settlement.net();
            if net > Decimal::ZERO {
                ledger::post(
                    uow,
                    Posting {
                        bank_account_id,
                        kind: TransactionKind::Income,
                        amount: net,
                        date: settlement.date,
                        description: format!("Receipt: {}", debt.description()),
                        reference: Some(ledger_reference),
                        notes: settlement.notes.clone(),
                    },
                )?;
            } else {
                debug!(?target, "net amount is zero, nothing to post");
            }
        }

        let order_id = debt.order_id();
        let status = if debt.is_paid() {
            ReceiveStatus::Paid
        } else {
            ReceiveStatus::Pending
        };
        debt.save(uow);
        if let Some(order_id) = order_id {
            refresh_order(uow, order_id);
        }
        uow.record(LedgerEvent::PaymentReceived {
            target,
            amount: settlement.collected,
            partial: is_partial,
        });

        Ok(ReceiveOutcome {
            status,
            remaining_balance: if is_partial { remaining } else { Decimal::ZERO },
            is_partial,
        })
    }
}

/// `last` plus every amount earlier partial payments of `original` collected.
fn collected_so_far(uow: &mut UnitOfWork<'_>, original: ReceivableId, last: Decimal) -> Decimal {
    let earlier: Decimal = uow
        .scan_where::<Receivable>(move |r| r.settlement_of == Some(original) && r.is_paid())
        .iter()
        .map(|record| record.amount)
        .sum();
    money::round2(earlier + last)
}

/// Paid snapshot of the amount received, for the audit trail.
fn settlement_record(
    uow: &mut UnitOfWork<'_>,
    original: &Receivable,
    settlement: &Settlement,
) -> Receivable {
    Receivable {
        id: ReceivableId(uow.next_id::<Receivable>()),
        description: format!("{} (partial payment)", original.description),
        amount: settlement.collected,
        due_date: original.due_date,
        status: ReceivableStatus::Paid,
        payment_date: Some(settlement.date),
        payment_method: Some(settlement.method),
        bank_account_id: settlement.bank_account_id,
        fee_amount: settlement.fee,
        net_amount: Some(settlement.net()),
        interest_amount: settlement.interest,
        fine_amount: settlement.fine,
        customer_id: original.customer_id,
        order_id: original.order_id,
        boleto_id: original.boleto_id,
        settlement_of: Some(original.id),
        installment: original.installment,
        notes: settlement.notes.clone(),
    }
}

/// Receivable for what a partially paid boleto still owes.
///
/// Not linked through `boleto_id`: the boleto is already PAID and paying the
/// shortfall must still restore credit.
fn shortfall_receivable(
    uow: &mut UnitOfWork<'_>,
    boleto: &Boleto,
    remaining: Decimal,
) -> Receivable {
    Receivable {
        id: ReceivableId(uow.next_id::<Receivable>()),
        description: format!("Boleto {} shortfall", boleto.boleto_number),
        amount: remaining,
        due_date: boleto.due_date,
        status: ReceivableStatus::Pending,
        payment_date: None,
        payment_method: None,
        bank_account_id: None,
        fee_amount: Decimal::ZERO,
        net_amount: None,
        interest_amount: Decimal::ZERO,
        fine_amount: Decimal::ZERO,
        customer_id: boleto.customer_id,
        order_id: boleto.order_id,
        boleto_id: None,
        settlement_of: None,
        installment: None,
        notes: Some(format!("Remainder of boleto #{}", boleto.id)),
    }
}

/// Recomputes an order's payment status from its debts.
///
/// Counts the order's receivables (settlement records and cancelled entries
/// excluded) plus any boleto of the order no receivable mirrors.
pub(super) fn refresh_order(uow: &mut UnitOfWork<'_>, order_id: OrderId) {
    let Some(mut order) = uow.get::<Order>(order_id) else {
        debug!(order = %order_id, "order no longer exists, status not tracked");
        return;
    };

    let receivables: Vec<Receivable> =
        uow.scan_where::<Receivable>(move |r| r.order_id == Some(order_id));
    let boletos: Vec<Boleto> = uow
        .scan_where::<Boleto>(move |b| b.order_id == Some(order_id))
        .into_iter()
        .filter(|b| b.status != BoletoStatus::Cancelled)
        .filter(|b| !receivables.iter().any(|r| r.boleto_id == Some(b.id)))
        .collect();
    let debts: Vec<bool> = receivables
        .iter()
        .filter(|r| !r.is_settlement_record() && r.status != ReceivableStatus::Cancelled)
        .map(Receivable::is_paid)
        .chain(boletos.iter().map(Boleto::is_paid))
        .collect();
    let any_settled = receivables.iter().any(Receivable::is_settlement_record);

    let status = if !debts.is_empty() && debts.iter().all(|paid| *paid) {
        OrderPaymentStatus::Paid
    } else if any_settled || debts.iter().any(|paid| *paid) {
        OrderPaymentStatus::Partial
    } else {
        OrderPaymentStatus::Pending
    };

    if order.payment_status != status {
        info!(
            order = %order_id,
            from = ?order.payment_status,
            to = ?status,
            "order payment status changed"
        );
        order.payment_status = status;
        uow.put(order);
        uow.record(LedgerEvent::OrderStatusChanged { order_id, status });
    }
}
