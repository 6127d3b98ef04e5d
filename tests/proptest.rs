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

//! Property-based tests for the reconciliation engine.
//!
//! These tests verify invariants that should hold for any sequence of
//! receipts, reversals and deletions.

use boleto_ledger::{
    BankAccountId, CallerContext, CreditReversalPolicy, Engine, InstallmentPlan, LedgerConfig,
    LedgerError, NewReceivable, ReceivePayment, ReferenceType,
};
use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::HashSet;

// =============================================================================
// Arbitrary Strategies
// =============================================================================

/// Generate a positive amount (0.01 to 10000.00).
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (1i64..=1_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

#[derive(Debug, Clone)]
enum Op {
    Receive {
        pick: usize,
        amount: Decimal,
        fee_cents: i64,
        account: u32,
    },
    Reverse {
        pick: usize,
    },
    Delete {
        pick: usize,
    },
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (any::<usize>(), arb_amount(), 0i64..500, 1u32..=2).prop_map(
            |(pick, amount, fee_cents, account)| Op::Receive { pick, amount, fee_cents, account }
        ),
        2 => any::<usize>().prop_map(|pick| Op::Reverse { pick }),
        1 => any::<usize>().prop_map(|pick| Op::Delete { pick }),
    ]
}

fn due() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
}

/// Applies `op` to the receivable at `pick` in the current listing.
/// Rejected operations are ignored.
fn apply(engine: &Engine, admin: &CallerContext, op: &Op) {
    let receivables = engine.receivables();
    if receivables.is_empty() {
        return;
    }
    match op {
        Op::Receive { pick, amount, fee_cents, account } => {
            let target = &receivables[pick % receivables.len()];
            let fee = Decimal::new(*fee_cents, 2).min(*amount);
            let request = ReceivePayment::new(target.id.0, *amount)
                .into_account(BankAccountId(*account))
                .with_charges(Decimal::ZERO, Decimal::ZERO, fee);
            let _ = engine.receive_payment(admin, request);
        }
        Op::Reverse { pick } => {
            let target = &receivables[pick % receivables.len()];
            let _ = engine.reverse_receivable(admin, target.id, true);
        }
        Op::Delete { pick } => {
            let target = &receivables[pick % receivables.len()];
            let _ = engine.delete_receivable(admin, target.id);
        }
    }
}

// =============================================================================
// Ledger Invariant Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Every account balance equals its opening balance plus its entries.
    #[test]
    fn balance_matches_entries(
        amounts in prop::collection::vec(arb_amount(), 1..6),
        ops in prop::collection::vec(arb_op(), 1..30),
    ) {
        let engine = Engine::new();
        let admin = CallerContext::administrator("prop");
        engine.open_bank_account(&admin, "Caixa", Decimal::new(10_000, 2)).unwrap();
        engine.open_bank_account(&admin, "Banco", Decimal::ZERO).unwrap();
        for amount in &amounts {
            engine.create_receivable(NewReceivable::new("Order", *amount, due())).unwrap();
        }

        for op in &ops {
            apply(&engine, &admin, op);
            for account in engine.bank_accounts() {
                prop_assert_eq!(engine.verify_account(account.id), Ok(Decimal::ZERO));
                let entries: Decimal = engine
                    .account_statement(account.id)
                    .unwrap()
                    .iter()
                    .map(|tx| tx.signed_amount())
                    .sum();
                prop_assert_eq!(account.balance, account.initial_balance + entries);
            }
        }
    }

    /// A receipt reference is never posted twice.
    #[test]
    fn receipt_references_are_unique(
        amounts in prop::collection::vec(arb_amount(), 1..6),
        ops in prop::collection::vec(arb_op(), 1..30),
    ) {
        let engine = Engine::new();
        let admin = CallerContext::administrator("prop");
        engine.open_bank_account(&admin, "Caixa", Decimal::ZERO).unwrap();
        engine.open_bank_account(&admin, "Banco", Decimal::ZERO).unwrap();
        for amount in &amounts {
            engine.create_receivable(NewReceivable::new("Order", *amount, due())).unwrap();
        }

        for op in &ops {
            apply(&engine, &admin, op);
        }

        let mut seen = HashSet::new();
        for tx in engine.transactions() {
            if let Some(reference) = tx.reference {
                if reference.kind != ReferenceType::ReceivableReversal {
                    prop_assert!(seen.insert(reference), "duplicate entry for {}", reference);
                }
            }
        }
    }

    /// Available credit stays within `[0, limit]` whatever is booked, paid or reversed.
    #[test]
    fn credit_stays_within_limit(
        limit in arb_amount(),
        amounts in prop::collection::vec(arb_amount(), 1..6),
        ops in prop::collection::vec(arb_op(), 1..30),
        debit_on_reversal in any::<bool>(),
    ) {
        let policy = if debit_on_reversal {
            CreditReversalPolicy::Debit
        } else {
            CreditReversalPolicy::Keep
        };
        let engine = Engine::with_config(LedgerConfig {
            credit_on_reversal: policy,
            ..LedgerConfig::default()
        });
        let admin = CallerContext::administrator("prop");
        engine.open_bank_account(&admin, "Caixa", Decimal::ZERO).unwrap();
        engine.open_bank_account(&admin, "Banco", Decimal::ZERO).unwrap();
        let customer = engine.register_customer("Cliente", limit).unwrap();
        for amount in &amounts {
            let booked = engine.create_receivable(
                NewReceivable::new("Order", *amount, due())
                    .for_customer(customer.id)
                    .on_credit(),
            );
            prop_assert!(booked.is_ok() || booked == Err(LedgerError::InsufficientCredit));
        }

        for op in &ops {
            apply(&engine, &admin, op);
            let customer = engine.customer(customer.id).unwrap();
            prop_assert!(customer.available_credit >= Decimal::ZERO);
            prop_assert!(customer.available_credit <= customer.credit_limit);
        }
    }
}

// =============================================================================
// Partial Payment Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// A short receipt leaves exactly the difference open.
    #[test]
    fn partial_receipt_leaves_difference(
        amount in arb_amount(),
        ratio in 1u32..99,
    ) {
        let paid = (amount * Decimal::from(ratio) / Decimal::from(100)).round_dp(2);
        let remaining = amount - paid;
        prop_assume!(paid > Decimal::ZERO && remaining > Decimal::new(1, 2));

        let engine = Engine::new();
        let admin = CallerContext::administrator("prop");
        let receivable = engine
            .create_receivable(NewReceivable::new("Order", amount, due()))
            .unwrap();

        let outcome = engine
            .receive_payment(&admin, ReceivePayment::new(receivable.id.0, paid))
            .unwrap();

        prop_assert!(outcome.is_partial);
        prop_assert_eq!(outcome.remaining_balance, remaining);
        prop_assert_eq!(engine.receivable(receivable.id).unwrap().amount, remaining);
        let recorded: Decimal = engine
            .receivables()
            .iter()
            .filter(|r| r.settlement_of == Some(receivable.id))
            .map(|r| r.amount)
            .sum();
        prop_assert_eq!(recorded + remaining, amount);
    }

    /// Accepted installment plans add up to the total.
    #[test]
    fn installments_sum_to_total(
        total in arb_amount(),
        count in 1u16..=24,
    ) {
        let engine = Engine::new();
        let result = engine.create_installments(InstallmentPlan {
            description: "Plan".to_string(),
            total,
            count,
            first_due_date: due(),
            interval_days: 30,
            customer_id: None,
            order_id: None,
            payment_method: None,
            consume_credit: false,
        });

        match result {
            Ok(installments) => {
                prop_assert_eq!(installments.len(), usize::from(count));
                prop_assert!(installments.iter().all(|r| r.amount > Decimal::ZERO));
                let sum: Decimal = installments.iter().map(|r| r.amount).sum();
                prop_assert_eq!(sum, total);
            }
            Err(err) => prop_assert_eq!(err, LedgerError::InvalidInstallmentPlan),
        }
    }
}
