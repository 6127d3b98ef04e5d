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

//! Bank ledger: the only code that moves a [`BankAccount`] balance.
//!
//! Each balance change is paired with a [`Transaction`] row in the same
//! [`UnitOfWork`], so `balance == initial_balance + Σ signed amounts` holds
//! after every commit.
//!
//! Reversal finds the row to undo through a chain of [`Locate`]
//! implementations: the exact reference first, then, when enabled, the
//! legacy heuristic for rows written before references were recorded. The
//! heuristic can pick the wrong row when two untagged incomes share an
//! account and amount.

use crate::LedgerError;
use crate::account::BankAccount;
use crate::base::{BankAccountId, TransactionId};
use crate::events::{LedgerEvent, MatchKind};
use crate::money;
use crate::store::UnitOfWork;
use crate::transaction::{Posting, Reference, Transaction, TransactionKind};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

/// Result of [`post`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PostOutcome {
    Posted(Transaction),
    /// A row with the same reference already exists; nothing was written.
    Duplicate(Transaction),
}

impl PostOutcome {
    pub fn transaction(&self) -> &Transaction {
        match self {
            Self::Posted(tx) | Self::Duplicate(tx) => tx,
        }
    }
}

/// Writes `posting` and moves the account balance.
///
/// # Errors
///
/// - [`LedgerError::InvalidAmount`] - Amount is zero or negative.
/// - [`LedgerError::AccountNotFound`] - The bank account does not exist.
pub(crate) fn post(
    uow: &mut UnitOfWork<'_>,
    posting: Posting,
) -> Result<PostOutcome, LedgerError> {
    let amount = money::positive(posting.amount)?;
    let mut account: BankAccount = uow
        .get(posting.bank_account_id)
        .ok_or(LedgerError::AccountNotFound)?;

    if let Some(reference) = posting.reference {
        if let Some(existing) = find_by_reference(uow, reference) {
            info!(%reference, existing = %existing.id, "ledger entry already exists, skipping post");
            uow.record(LedgerEvent::DuplicatePostSkipped {
                existing: existing.id,
                reference,
            });
            return Ok(PostOutcome::Duplicate(existing));
        }
    }

    let balance_after = account.apply(posting.kind, amount);
    let transaction = Transaction {
        id: TransactionId(uow.next_id::<Transaction>()),
        bank_account_id: account.id,
        kind: posting.kind,
        amount,
        date: posting.date,
        description: posting.description,
        reference: posting.reference,
        balance_after,
        notes: posting.notes,
    };
    debug!(
        account = %account.id,
        transaction = %transaction.id,
        %amount,
        %balance_after,
        "posted ledger entry"
    );
    uow.put(account);
    uow.put(transaction.clone());
    uow.record(LedgerEvent::TransactionPosted {
        transaction_id: transaction.id,
        bank_account_id: transaction.bank_account_id,
        reference: transaction.reference,
        amount,
    });
    Ok(PostOutcome::Posted(transaction))
}

pub(crate) fn find_by_reference(
    uow: &mut UnitOfWork<'_>,
    reference: Reference,
) -> Option<Transaction> {
    ByReference(reference).locate(uow)
}

/// Strategy for finding the ledger row a reversal should undo.
///
/// Locators read through filtered scans, so a reversal only conflicts with
/// commits that touch the rows it could match.
pub(crate) trait Locate {
    fn locate(&self, uow: &mut UnitOfWork<'_>) -> Option<Transaction>;
    fn kind(&self) -> MatchKind;
}

/// Exact `(referenceType, referenceId)` match.
pub(crate) struct ByReference(pub Reference);

impl Locate for ByReference {
    fn locate(&self, uow: &mut UnitOfWork<'_>) -> Option<Transaction> {
        let reference = self.0;
        uow.scan_where::<Transaction>(move |tx| tx.reference == Some(reference))
            .into_iter()
            .next()
    }

    fn kind(&self) -> MatchKind {
        MatchKind::Exact
    }
}

/// Most recent untagged INCOME on the account with the same amount.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LegacyIncome {
    pub bank_account_id: BankAccountId,
    pub amount: Decimal,
}

impl Locate for LegacyIncome {
    fn locate(&self, uow: &mut UnitOfWork<'_>) -> Option<Transaction> {
        let LegacyIncome {
            bank_account_id,
            amount,
        } = *self;
        let amount = money::round2(amount);
        uow.scan_where::<Transaction>(move |tx| {
            tx.reference.is_none()
                && tx.bank_account_id == bank_account_id
                && tx.kind == TransactionKind::Income
                && tx.amount == amount
        })
        .into_iter()
        .max_by_key(|tx| (tx.date, tx.id))
    }

    fn kind(&self) -> MatchKind {
        MatchKind::LegacyFallback
    }
}

/// Undoes the ledger row for `reference`: restores the balance and deletes the row.
///
/// Finding nothing is not an error; it is logged and `None` is returned.
pub(crate) fn reverse(
    uow: &mut UnitOfWork<'_>,
    reference: Reference,
    fallback: Option<LegacyIncome>,
) -> Result<Option<Transaction>, LedgerError> {
    let mut locators: Vec<Box<dyn Locate>> = vec![Box::new(ByReference(reference))];
    if let Some(fallback) = fallback {
        locators.push(Box::new(fallback));
    }

    let Some((transaction, matched_by)) = locators
        .iter()
        .find_map(|locator| locator.locate(uow).map(|tx| (tx, locator.kind())))
    else {
        warn!(%reference, "no ledger entry found to reverse");
        uow.record(LedgerEvent::ReversalTransactionMissing { reference });
        return Ok(None);
    };

    if matched_by == MatchKind::LegacyFallback {
        warn!(
            %reference,
            transaction = %transaction.id,
            "reversing untagged ledger entry matched by account and amount"
        );
    }

    let mut account: BankAccount = uow
        .get(transaction.bank_account_id)
        .ok_or(LedgerError::AccountNotFound)?;
    let balance = account.unapply(transaction.kind, transaction.amount);
    debug!(account = %account.id, transaction = %transaction.id, %balance, "reversed ledger entry");
    uow.put(account);
    uow.delete::<Transaction>(transaction.id);
    uow.record(LedgerEvent::TransactionReversed {
        transaction_id: transaction.id,
        bank_account_id: transaction.bank_account_id,
        amount: transaction.amount,
        matched_by,
    });
    Ok(Some(transaction))
}
