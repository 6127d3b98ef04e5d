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

//! Reversing and deleting received entries.

use boleto_ledger::{
    BankAccount, BoletoId, BoletoStatus, CallerContext, CreditReversalPolicy, DebtRef,
    DeleteOutcome, Engine, LedgerConfig, LedgerError, LedgerEvent, MatchKind, NewBoleto,
    NewReceivable, OrderPaymentStatus, PaymentMethod, Posting, ReceivablePatch, ReceivableStatus,
    ReceivePayment, Receivable, Reference, ReferenceType, TransactionKind,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn make_admin() -> CallerContext {
    CallerContext::administrator("ana")
}

fn make_account(engine: &Engine) -> BankAccount {
    engine
        .open_bank_account(&make_admin(), "Caixa", dec!(100.00))
        .unwrap()
}

fn make_paid(engine: &Engine, account: &BankAccount, amount: Decimal) -> Receivable {
    let receivable = engine
        .create_receivable(NewReceivable::new("Order", amount, date(2025, 5, 1)))
        .unwrap();
    engine
        .receive_payment(
            &make_admin(),
            ReceivePayment::new(receivable.id.0, amount).into_account(account.id),
        )
        .unwrap();
    receivable
}

/// Paid receivable whose income was posted without a reference, as older
/// data was.
fn make_legacy_paid(engine: &Engine, account: &BankAccount, amount: Decimal) -> Receivable {
    let admin = make_admin();
    let receivable = engine
        .create_receivable(NewReceivable::new("Legacy order", amount, date(2025, 1, 1)))
        .unwrap();
    let attach = ReceivablePatch {
        bank_account_id: Some(account.id),
        ..ReceivablePatch::default()
    };
    engine
        .edit_receivable(&admin, receivable.id, attach)
        .unwrap();
    engine
        .post_entry(
            &admin,
            Posting {
                bank_account_id: account.id,
                kind: TransactionKind::Income,
                amount,
                date: date(2025, 1, 5),
                description: "Receipt imported from spreadsheet".to_string(),
                reference: None,
                notes: None,
            },
        )
        .unwrap();
    let settle = ReceivablePatch {
        status: Some(ReceivableStatus::Paid),
        ..ReceivablePatch::default()
    };
    engine
        .edit_receivable(&admin, receivable.id, settle)
        .unwrap()
}

// ============================================================================
// Reversal
// ============================================================================

/// Receive then reverse leaves the account exactly where it started.
#[test]
fn test_reverse_round_trip() {
    let engine = Engine::new();
    let account = make_account(&engine);
    let receivable = make_paid(&engine, &account, dec!(40.00));
    assert_eq!(engine.bank_account(account.id).unwrap().balance, dec!(140.00));

    let reverted = engine
        .reverse_receivable(&make_admin(), receivable.id, true)
        .unwrap();

    assert_eq!(reverted.status, ReceivableStatus::Pending);
    assert_eq!(reverted.amount, dec!(40.00));
    assert_eq!(reverted.payment_date, None);
    assert_eq!(reverted.bank_account_id, None);
    assert!(engine.transactions().is_empty());
    assert_eq!(engine.bank_account(account.id).unwrap().balance, dec!(100.00));
    assert_eq!(engine.verify_account(account.id), Ok(dec!(0)));
}

#[test]
fn test_reverse_guards() {
    let engine = Engine::new();
    let account = make_account(&engine);
    let paid = make_paid(&engine, &account, dec!(10));
    let pending = engine
        .create_receivable(NewReceivable::new("Open", dec!(10), date(2025, 5, 1)))
        .unwrap();

    assert_eq!(
        engine.reverse_receivable(&CallerContext::operator("caixa"), paid.id, true),
        Err(LedgerError::Unauthorized)
    );
    assert_eq!(
        engine.reverse_receivable(&make_admin(), paid.id, false),
        Err(LedgerError::ConfirmationRequired)
    );
    assert_eq!(
        engine.reverse_receivable(&make_admin(), pending.id, true),
        Err(LedgerError::NotPaid)
    );
    assert_eq!(
        engine.reverse_receivable(&make_admin(), boleto_ledger::ReceivableId(99), true),
        Err(LedgerError::NotFound)
    );
    assert_eq!(engine.receivable(paid.id).unwrap().status, ReceivableStatus::Paid);
}

/// Entries posted before references existed are found by account and amount.
#[test]
fn test_reverse_falls_back_to_untagged_income() {
    let engine = Engine::new();
    let account = make_account(&engine);
    let receivable = make_legacy_paid(&engine, &account, dec!(25.00));
    assert_eq!(engine.bank_account(account.id).unwrap().balance, dec!(125.00));
    engine.events().drain();

    engine
        .reverse_receivable(&make_admin(), receivable.id, true)
        .unwrap();

    assert!(engine.transactions().is_empty());
    assert_eq!(engine.bank_account(account.id).unwrap().balance, dec!(100.00));
    let fallback = engine.events().drain().into_iter().any(|event| {
        matches!(
            event,
            LedgerEvent::TransactionReversed { matched_by: MatchKind::LegacyFallback, .. }
        )
    });
    assert!(fallback);
}

/// With the fallback disabled, an untagged entry is left alone and the
/// reversal still completes.
#[test]
fn test_reverse_without_fallback_keeps_untagged_income() {
    let config = LedgerConfig {
        legacy_transaction_fallback: false,
        ..LedgerConfig::default()
    };
    let engine = Engine::with_config(config);
    let account = make_account(&engine);
    let receivable = make_legacy_paid(&engine, &account, dec!(25.00));
    engine.events().drain();

    let reverted = engine
        .reverse_receivable(&make_admin(), receivable.id, true)
        .unwrap();

    assert_eq!(reverted.status, ReceivableStatus::Pending);
    assert_eq!(engine.transactions().len(), 1);
    assert_eq!(engine.bank_account(account.id).unwrap().balance, dec!(125.00));
    let missing = engine.events().drain().into_iter().any(|event| {
        matches!(event, LedgerEvent::ReversalTransactionMissing { reference } if reference == Reference::receivable(receivable.id))
    });
    assert!(missing);
}

/// The fallback never matches tagged rows or expenses.
#[test]
fn test_fallback_ignores_tagged_and_expense_rows() {
    let engine = Engine::new();
    let account = make_account(&engine);
    let admin = make_admin();
    let other = make_paid(&engine, &account, dec!(25.00));
    engine
        .post_entry(
            &admin,
            Posting {
                bank_account_id: account.id,
                kind: TransactionKind::Expense,
                amount: dec!(25.00),
                date: date(2025, 1, 6),
                description: "Supplies".to_string(),
                reference: None,
                notes: None,
            },
        )
        .unwrap();
    let receivable = engine
        .create_receivable(NewReceivable::new("Order", dec!(25.00), date(2025, 1, 1)))
        .unwrap();
    engine
        .edit_receivable(
            &admin,
            receivable.id,
            ReceivablePatch {
                bank_account_id: Some(account.id),
                ..ReceivablePatch::default()
            },
        )
        .unwrap();
    engine
        .edit_receivable(
            &admin,
            receivable.id,
            ReceivablePatch {
                status: Some(ReceivableStatus::Paid),
                ..ReceivablePatch::default()
            },
        )
        .unwrap();

    engine
        .reverse_receivable(&admin, receivable.id, true)
        .unwrap();

    assert_eq!(engine.transactions().len(), 2);
    assert_eq!(engine.receivable(other.id).unwrap().status, ReceivableStatus::Paid);
    assert_eq!(engine.verify_account(account.id), Ok(dec!(0)));
}

/// Credit restored on receipt is kept by default.
#[test]
fn test_reverse_keeps_credit_by_default() {
    let engine = Engine::new();
    let customer = engine.register_customer("Oficina", dec!(1000)).unwrap();
    let receivable = engine
        .create_receivable(
            NewReceivable::new("Order", dec!(300), date(2025, 5, 1))
                .for_customer(customer.id)
                .on_credit(),
        )
        .unwrap();
    engine
        .receive_payment(&make_admin(), ReceivePayment::new(receivable.id.0, dec!(300)))
        .unwrap();

    engine
        .reverse_receivable(&make_admin(), receivable.id, true)
        .unwrap();

    assert_eq!(
        engine.customer(customer.id).unwrap().available_credit,
        dec!(1000)
    );
}

/// The debit policy takes back the credit restored on receipt.
#[test]
fn test_reverse_debits_credit_when_configured() {
    let engine = Engine::with_config(LedgerConfig {
        credit_on_reversal: CreditReversalPolicy::Debit,
        ..LedgerConfig::default()
    });
    let customer = engine.register_customer("Oficina", dec!(1000)).unwrap();
    let receivable = engine
        .create_receivable(
            NewReceivable::new("Order", dec!(300), date(2025, 5, 1))
                .for_customer(customer.id)
                .on_credit(),
        )
        .unwrap();
    engine
        .receive_payment(&make_admin(), ReceivePayment::new(receivable.id.0, dec!(300)))
        .unwrap();

    engine
        .reverse_receivable(&make_admin(), receivable.id, true)
        .unwrap();

    assert_eq!(
        engine.customer(customer.id).unwrap().available_credit,
        dec!(700)
    );
}

/// Reversing a mirrored receivable reopens its boleto.
#[test]
fn test_reverse_reopens_linked_boleto() {
    let engine = Engine::new();
    let boleto = engine
        .create_boleto(NewBoleto::new("B-0100", dec!(50), date(2025, 5, 1)))
        .unwrap();
    let mirror = engine
        .create_receivable(
            NewReceivable::new("Boleto B-0100", dec!(50), date(2025, 5, 1)).mirroring(boleto.id),
        )
        .unwrap();
    engine
        .receive_payment(&make_admin(), ReceivePayment::new(mirror.id.0, dec!(50)))
        .unwrap();
    assert_eq!(engine.boleto(boleto.id).unwrap().status, BoletoStatus::Paid);

    engine
        .reverse_receivable(&make_admin(), mirror.id, true)
        .unwrap();

    let reopened = engine.boleto(boleto.id).unwrap();
    assert_eq!(reopened.status, BoletoStatus::Pending);
    assert_eq!(reopened.paid_amount, None);
    assert_eq!(reopened.paid_by, None);
}

/// A boleto received directly goes back to PENDING with its ledger entry
/// undone, and can be received again.
#[test]
fn test_reverse_boleto_round_trip() {
    let engine = Engine::new();
    let admin = make_admin();
    let account = make_account(&engine);
    let order = engine.register_order(None).unwrap();
    let boleto = engine
        .create_boleto(NewBoleto::new("B-0200", dec!(200), date(2025, 5, 1)).for_order(order.id))
        .unwrap();
    let receive = ReceivePayment::new(boleto.id.0, dec!(200)).into_account(account.id);
    engine.receive_payment(&admin, receive.clone()).unwrap();
    assert_eq!(engine.bank_account(account.id).unwrap().balance, dec!(300.00));
    assert_eq!(
        engine.order(order.id).unwrap().payment_status,
        OrderPaymentStatus::Paid
    );
    engine.events().drain();

    let reopened = engine.reverse_boleto(&admin, boleto.id, true).unwrap();

    assert_eq!(reopened.status, BoletoStatus::Pending);
    assert_eq!(reopened.paid_amount, None);
    assert_eq!(engine.boleto(boleto.id).unwrap(), reopened);
    assert_eq!(engine.bank_account(account.id).unwrap().balance, dec!(100.00));
    assert!(engine.account_statement(account.id).unwrap().is_empty());
    assert_eq!(
        engine.order(order.id).unwrap().payment_status,
        OrderPaymentStatus::Pending
    );
    let reversed = engine.events().drain().into_iter().any(|event| {
        event
            == LedgerEvent::EntryReversed {
                target: DebtRef::Boleto(boleto.id),
            }
    });
    assert!(reversed);

    engine.receive_payment(&admin, receive).unwrap();
    assert_eq!(engine.bank_account(account.id).unwrap().balance, dec!(300.00));
}

#[test]
fn test_reverse_boleto_guards() {
    let engine = Engine::new();
    let admin = make_admin();
    let boleto = engine
        .create_boleto(NewBoleto::new("B-0201", dec!(20), date(2025, 5, 1)))
        .unwrap();

    assert_eq!(
        engine.reverse_boleto(&admin, boleto.id, true),
        Err(LedgerError::NotPaid)
    );
    assert_eq!(
        engine.reverse_boleto(&admin, BoletoId(99), true),
        Err(LedgerError::NotFound)
    );
    engine
        .receive_payment(&admin, ReceivePayment::new(boleto.id.0, dec!(20)))
        .unwrap();
    assert_eq!(
        engine.reverse_boleto(&admin, boleto.id, false),
        Err(LedgerError::ConfirmationRequired)
    );
    assert_eq!(
        engine.reverse_boleto(&CallerContext::operator("caio"), boleto.id, true),
        Err(LedgerError::Unauthorized)
    );
    assert_eq!(engine.boleto(boleto.id).unwrap().status, BoletoStatus::Paid);
}

/// The debit policy takes back what a reversed boleto restored.
#[test]
fn test_reverse_boleto_debits_credit_when_configured() {
    let engine = Engine::with_config(LedgerConfig {
        credit_on_reversal: CreditReversalPolicy::Debit,
        ..LedgerConfig::default()
    });
    let admin = make_admin();
    let customer = engine.register_customer("Padaria", dec!(1000)).unwrap();
    let boleto = engine
        .create_boleto(
            NewBoleto::new("B-0202", dec!(300), date(2025, 5, 1))
                .for_customer(customer.id)
                .on_credit(),
        )
        .unwrap();
    engine
        .receive_payment(&admin, ReceivePayment::new(boleto.id.0, dec!(300)))
        .unwrap();
    assert_eq!(
        engine.customer(customer.id).unwrap().available_credit,
        dec!(1000)
    );

    engine.reverse_boleto(&admin, boleto.id, true).unwrap();

    assert_eq!(
        engine.customer(customer.id).unwrap().available_credit,
        dec!(700)
    );
}

/// Reversing a partial settlement puts its amount back on the open original.
#[test]
fn test_reverse_settlement_record_restores_original() {
    let engine = Engine::new();
    let account = make_account(&engine);
    let receivable = engine
        .create_receivable(NewReceivable::new("Order", dec!(100), date(2025, 5, 1)))
        .unwrap();
    engine
        .receive_payment(
            &make_admin(),
            ReceivePayment::new(receivable.id.0, dec!(60)).into_account(account.id),
        )
        .unwrap();
    let record = engine
        .receivables()
        .into_iter()
        .find(|r| r.settlement_of == Some(receivable.id))
        .unwrap();

    let origin = engine
        .reverse_receivable(&make_admin(), record.id, true)
        .unwrap();

    assert_eq!(origin.id, receivable.id);
    assert_eq!(origin.amount, dec!(100));
    assert_eq!(origin.status, ReceivableStatus::Pending);
    assert_eq!(engine.receivables().len(), 1);
    assert!(engine.receivable(record.id).is_none());
    assert_eq!(engine.bank_account(account.id).unwrap().balance, dec!(100.00));
}

/// Reversal drops the card projection and the order goes back to PENDING.
#[test]
fn test_reverse_card_receipt_updates_order() {
    let engine = Engine::new();
    let order = engine.register_order(None).unwrap();
    let receivable = engine
        .create_receivable(
            NewReceivable::new("Order", dec!(150), date(2025, 5, 1)).for_order(order.id),
        )
        .unwrap();
    engine
        .receive_payment(
            &make_admin(),
            ReceivePayment::new(receivable.id.0, dec!(150)).with_method(PaymentMethod::CreditCard),
        )
        .unwrap();
    assert_eq!(engine.card_transactions().len(), 1);
    assert_eq!(
        engine.order(order.id).unwrap().payment_status,
        OrderPaymentStatus::Paid
    );

    engine
        .reverse_receivable(&make_admin(), receivable.id, true)
        .unwrap();

    assert!(engine.card_transactions().is_empty());
    assert_eq!(
        engine.order(order.id).unwrap().payment_status,
        OrderPaymentStatus::Pending
    );
}

// ============================================================================
// Deletion
// ============================================================================

#[test]
fn test_delete_blocked_while_order_exists() {
    let engine = Engine::new();
    let order = engine.register_order(None).unwrap();
    let receivable = engine
        .create_receivable(
            NewReceivable::new("Order", dec!(10), date(2025, 5, 1)).for_order(order.id),
        )
        .unwrap();

    assert_eq!(
        engine.delete_receivable(&make_admin(), receivable.id),
        Err(LedgerError::BlockedByOrder)
    );

    engine.remove_order(order.id).unwrap();
    assert_eq!(
        engine.delete_receivable(&make_admin(), receivable.id),
        Ok(DeleteOutcome { reversed: false })
    );
    assert!(engine.receivable(receivable.id).is_none());
}

/// Deleting a paid entry offsets its income instead of erasing it.
#[test]
fn test_delete_paid_writes_offsetting_expense() {
    let engine = Engine::new();
    let account = make_account(&engine);
    let receivable = make_paid(&engine, &account, dec!(80.00));

    let outcome = engine
        .delete_receivable(&make_admin(), receivable.id)
        .unwrap();

    assert!(outcome.reversed);
    assert!(engine.receivable(receivable.id).is_none());
    let rows = engine.account_statement(account.id).unwrap();
    assert_eq!(rows.len(), 2);
    let income = rows
        .iter()
        .find(|tx| tx.kind == TransactionKind::Income)
        .unwrap();
    let expense = rows
        .iter()
        .find(|tx| tx.kind == TransactionKind::Expense)
        .unwrap();
    assert_eq!(expense.amount, dec!(80.00));
    assert_eq!(
        expense.reference.map(|r| r.kind),
        Some(ReferenceType::ReceivableReversal)
    );
    assert_eq!(
        expense.notes.as_deref(),
        Some(format!("Offsets transaction #{}", income.id).as_str())
    );
    assert_eq!(engine.bank_account(account.id).unwrap().balance, dec!(100.00));
    assert_eq!(engine.verify_account(account.id), Ok(dec!(0)));
}

#[test]
fn test_delete_requires_admin() {
    let engine = Engine::new();
    let receivable = engine
        .create_receivable(NewReceivable::new("Order", dec!(10), date(2025, 5, 1)))
        .unwrap();
    assert_eq!(
        engine.delete_receivable(&CallerContext::operator("caixa"), receivable.id),
        Err(LedgerError::Unauthorized)
    );
    assert!(engine.receivable(receivable.id).is_some());
}
