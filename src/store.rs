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

//! In-memory datastore with optimistic units of work.
//!
//! Every row carries the stamp of the commit that last wrote it.
//!
//! A [`UnitOfWork`] never writes to the tables directly. Reads record the
//! stamp they saw, scans record the stamps of the rows their predicate
//! matched. Writes are staged. On
//! [`commit`](UnitOfWork::commit) the store takes its write lock, checks that
//! nothing read has changed since, and applies every staged write under one
//! new stamp. If anything changed, nothing is applied and the caller gets
//! [`LedgerError::Conflict`]. This check is the compare-and-swap that keeps two
//! concurrent receives from both seeing `PENDING`.

use crate::LedgerError;
use crate::account::BankAccount;
use crate::base::{
    BankAccountId, BoletoId, CardTransactionId, CustomerId, OrderId, ReceivableId, TransactionId,
};
use crate::boleto::Boleto;
use crate::card::{CardFeeConfig, CardTransaction, CardType};
use crate::customer::{Customer, Order};
use crate::events::LedgerEvent;
use crate::receivable::Receivable;
use crate::transaction::Transaction;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug, Clone)]
struct Versioned<V> {
    stamp: u64,
    row: V,
}

#[derive(Debug)]
pub(crate) struct Table<K, V> {
    rows: BTreeMap<K, Versioned<V>>,
    next_id: AtomicU32,
}

impl<K: Ord + Copy, V: Clone> Table<K, V> {
    fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: AtomicU32::new(1),
        }
    }

    /// Stamp of the row, `0` when absent.
    fn stamp_of(&self, key: &K) -> u64 {
        self.rows.get(key).map_or(0, |versioned| versioned.stamp)
    }

    fn get(&self, key: &K) -> Option<V> {
        self.rows.get(key).map(|versioned| versioned.row.clone())
    }

    fn values(&self) -> Vec<V> {
        self.rows.values().map(|versioned| versioned.row.clone()).collect()
    }
}

/// A predicate read: still valid while the rows it matches are unchanged.
struct Filter<K, V> {
    matches: Box<dyn Fn(&V) -> bool>,
    seen: BTreeMap<K, u64>,
}

impl<K: Ord + Copy, V> Filter<K, V> {
    fn matching(table: &Table<K, V>, matches: &dyn Fn(&V) -> bool) -> BTreeMap<K, u64> {
        table
            .rows
            .iter()
            .filter(|(_, versioned)| matches(&versioned.row))
            .map(|(key, versioned)| (*key, versioned.stamp))
            .collect()
    }

    fn is_current(&self, table: &Table<K, V>) -> bool {
        Self::matching(table, self.matches.as_ref()) == self.seen
    }
}

impl<K: fmt::Debug, V> fmt::Debug for Filter<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter").field("seen", &self.seen).finish()
    }
}

/// Writes and read-set of one table inside a unit of work.
#[derive(Debug)]
pub(crate) struct Staged<K, V> {
    reads: BTreeMap<K, u64>,
    writes: BTreeMap<K, Option<V>>,
    filters: Vec<Filter<K, V>>,
}

impl<K: Ord + Copy, V: Clone> Staged<K, V> {
    fn new() -> Self {
        Self {
            reads: BTreeMap::new(),
            writes: BTreeMap::new(),
            filters: Vec::new(),
        }
    }

    fn get(&mut self, table: &Table<K, V>, key: K) -> Option<V> {
        if let Some(staged) = self.writes.get(&key) {
            return staged.clone();
        }
        self.reads.entry(key).or_insert_with(|| table.stamp_of(&key));
        table.get(&key)
    }

    /// Rows matching `matches`, committed rows overlaid with this unit's own
    /// writes. Only a change to a matching row, or a new matching row,
    /// invalidates the read.
    fn scan_where(
        &mut self,
        table: &Table<K, V>,
        matches: Box<dyn Fn(&V) -> bool>,
    ) -> Vec<V> {
        let seen = Filter::matching(table, matches.as_ref());
        let mut rows: BTreeMap<K, V> = table
            .rows
            .iter()
            .filter(|(key, versioned)| {
                !self.writes.contains_key(*key) && matches(&versioned.row)
            })
            .map(|(key, versioned)| (*key, versioned.row.clone()))
            .collect();
        rows.extend(self.writes.iter().filter_map(|(key, staged)| {
            staged
                .as_ref()
                .filter(|row| matches(*row))
                .map(|row| (*key, row.clone()))
        }));
        self.filters.push(Filter { matches, seen });
        rows.into_values().collect()
    }

    fn put(&mut self, key: K, row: V) {
        self.writes.insert(key, Some(row));
    }

    fn delete(&mut self, key: K) {
        self.writes.insert(key, None);
    }

    fn is_dirty(&self) -> bool {
        !self.writes.is_empty()
    }

    fn is_current(&self, table: &Table<K, V>) -> bool {
        self.filters.iter().all(|filter| filter.is_current(table))
            && self
                .reads
                .iter()
                .all(|(key, stamp)| table.stamp_of(key) == *stamp)
    }

    fn apply(self, table: &mut Table<K, V>, stamp: u64) {
        for (key, staged) in self.writes {
            match staged {
                Some(row) => {
                    table.rows.insert(key, Versioned { stamp, row });
                }
                None => {
                    table.rows.remove(&key);
                }
            }
        }
    }
}

/// All tables of the store.
#[derive(Debug)]
pub(crate) struct Tables {
    receivables: Table<ReceivableId, Receivable>,
    boletos: Table<BoletoId, Boleto>,
    accounts: Table<BankAccountId, BankAccount>,
    transactions: Table<TransactionId, Transaction>,
    card_transactions: Table<CardTransactionId, CardTransaction>,
    customers: Table<CustomerId, Customer>,
    orders: Table<OrderId, Order>,
    card_fees: Table<CardType, CardFeeConfig>,
    /// Receivables and boletos share one id space so a bare id names one debt.
    debt_ids: AtomicU32,
    stamp: u64,
}

impl Tables {
    fn new() -> Self {
        Self {
            receivables: Table::new(),
            boletos: Table::new(),
            accounts: Table::new(),
            transactions: Table::new(),
            card_transactions: Table::new(),
            customers: Table::new(),
            orders: Table::new(),
            card_fees: Table::new(),
            debt_ids: AtomicU32::new(1),
            stamp: 0,
        }
    }
}

#[derive(Debug)]
pub(crate) struct Changes {
    receivables: Staged<ReceivableId, Receivable>,
    boletos: Staged<BoletoId, Boleto>,
    accounts: Staged<BankAccountId, BankAccount>,
    transactions: Staged<TransactionId, Transaction>,
    card_transactions: Staged<CardTransactionId, CardTransaction>,
    customers: Staged<CustomerId, Customer>,
    orders: Staged<OrderId, Order>,
    card_fees: Staged<CardType, CardFeeConfig>,
}

impl Changes {
    fn new() -> Self {
        Self {
            receivables: Staged::new(),
            boletos: Staged::new(),
            accounts: Staged::new(),
            transactions: Staged::new(),
            card_transactions: Staged::new(),
            customers: Staged::new(),
            orders: Staged::new(),
            card_fees: Staged::new(),
        }
    }

    fn is_dirty(&self) -> bool {
        self.receivables.is_dirty()
            || self.boletos.is_dirty()
            || self.accounts.is_dirty()
            || self.transactions.is_dirty()
            || self.card_transactions.is_dirty()
            || self.customers.is_dirty()
            || self.orders.is_dirty()
            || self.card_fees.is_dirty()
    }

    fn is_current(&self, tables: &Tables) -> bool {
        self.receivables.is_current(&tables.receivables)
            && self.boletos.is_current(&tables.boletos)
            && self.accounts.is_current(&tables.accounts)
            && self.transactions.is_current(&tables.transactions)
            && self.card_transactions.is_current(&tables.card_transactions)
            && self.customers.is_current(&tables.customers)
            && self.orders.is_current(&tables.orders)
            && self.card_fees.is_current(&tables.card_fees)
    }

    fn apply(self, tables: &mut Tables, stamp: u64) {
        self.receivables.apply(&mut tables.receivables, stamp);
        self.boletos.apply(&mut tables.boletos, stamp);
        self.accounts.apply(&mut tables.accounts, stamp);
        self.transactions.apply(&mut tables.transactions, stamp);
        self.card_transactions
            .apply(&mut tables.card_transactions, stamp);
        self.customers.apply(&mut tables.customers, stamp);
        self.orders.apply(&mut tables.orders, stamp);
        self.card_fees.apply(&mut tables.card_fees, stamp);
    }
}

/// A persisted entity with its table and key.
pub(crate) trait Row: Clone + 'static {
    type Key: Ord + Copy;

    fn key(&self) -> Self::Key;
    fn table(tables: &Tables) -> &Table<Self::Key, Self>;
    fn staged(changes: &mut Changes) -> &mut Staged<Self::Key, Self>;

    /// Id sequence new rows draw from.
    fn sequence(tables: &Tables) -> &AtomicU32 {
        &Self::table(tables).next_id
    }
}

macro_rules! row {
    ($row:ty, $key:ty, $field:ident, shared $sequence:ident) => {
        impl Row for $row {
            type Key = $key;

            fn key(&self) -> Self::Key {
                self.id
            }

            fn table(tables: &Tables) -> &Table<Self::Key, Self> {
                &tables.$field
            }

            fn staged(changes: &mut Changes) -> &mut Staged<Self::Key, Self> {
                &mut changes.$field
            }

            fn sequence(tables: &Tables) -> &AtomicU32 {
                &tables.$sequence
            }
        }
    };
    ($row:ty, $key:ty, $field:ident) => {
        impl Row for $row {
            type Key = $key;

            fn key(&self) -> Self::Key {
                self.id
            }

            fn table(tables: &Tables) -> &Table<Self::Key, Self> {
                &tables.$field
            }

            fn staged(changes: &mut Changes) -> &mut Staged<Self::Key, Self> {
                &mut changes.$field
            }
        }
    };
}

row!(Receivable, ReceivableId, receivables, shared debt_ids);
row!(Boleto, BoletoId, boletos, shared debt_ids);
row!(BankAccount, BankAccountId, accounts);
row!(Transaction, TransactionId, transactions);
row!(CardTransaction, CardTransactionId, card_transactions);
row!(Customer, CustomerId, customers);
row!(Order, OrderId, orders);

impl Row for CardFeeConfig {
    type Key = CardType;

    fn key(&self) -> Self::Key {
        self.card_type
    }

    fn table(tables: &Tables) -> &Table<Self::Key, Self> {
        &tables.card_fees
    }

    fn staged(changes: &mut Changes) -> &mut Staged<Self::Key, Self> {
        &mut changes.card_fees
    }
}

/// The in-memory datastore.
#[derive(Debug)]
pub struct Store {
    tables: RwLock<Tables>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::new()),
        }
    }

    /// Starts a unit of work. Nothing it does is visible until it commits.
    pub(crate) fn begin(&self) -> UnitOfWork<'_> {
        UnitOfWork {
            store: self,
            changes: Changes::new(),
            events: Vec::new(),
        }
    }

    /// Committed row, outside any unit of work.
    pub(crate) fn get<R: Row>(&self, key: R::Key) -> Option<R> {
        R::table(&self.tables.read()).get(&key)
    }

    /// All committed rows of a table, in key order.
    pub(crate) fn all<R: Row>(&self) -> Vec<R> {
        R::table(&self.tables.read()).values()
    }

    /// A committed row of `A` and every row of `B`, read under one lock.
    pub(crate) fn get_with_all<A: Row, B: Row>(&self, key: A::Key) -> Option<(A, Vec<B>)> {
        let tables = self.tables.read();
        let row = A::table(&tables).get(&key)?;
        Some((row, B::table(&tables).values()))
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

/// Staged reads and writes that commit atomically or not at all.
#[derive(Debug)]
pub struct UnitOfWork<'s> {
    store: &'s Store,
    changes: Changes,
    events: Vec<LedgerEvent>,
}

impl UnitOfWork<'_> {
    pub(crate) fn get<R: Row>(&mut self, key: R::Key) -> Option<R> {
        let tables = self.store.tables.read();
        R::staged(&mut self.changes).get(R::table(&tables), key)
    }

    /// Rows of `R` for which `matches` holds, committed and staged.
    ///
    /// Commits touching only non-matching rows do not conflict with this read.
    pub(crate) fn scan_where<R: Row>(
        &mut self,
        matches: impl Fn(&R) -> bool + 'static,
    ) -> Vec<R> {
        let tables = self.store.tables.read();
        R::staged(&mut self.changes).scan_where(R::table(&tables), Box::new(matches))
    }

    pub(crate) fn put<R: Row>(&mut self, row: R) {
        R::staged(&mut self.changes).put(row.key(), row);
    }

    pub(crate) fn delete<R: Row>(&mut self, key: R::Key) {
        R::staged(&mut self.changes).delete(key);
    }

    /// Next id of the table. Ids burnt by a rolled-back unit are not reused.
    pub(crate) fn next_id<R: Row>(&self) -> u32 {
        R::sequence(&self.store.tables.read()).fetch_add(1, Ordering::SeqCst)
    }

    /// Queues an event, published only if this unit commits.
    pub(crate) fn record(&mut self, event: LedgerEvent) {
        self.events.push(event);
    }

    /// Validates the read-set and applies every staged write.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Conflict`] if a row or table this unit read was changed by
    /// another commit in the meantime. Nothing is applied in that case.
    pub(crate) fn commit(self) -> Result<Vec<LedgerEvent>, LedgerError> {
        if !self.changes.is_dirty() {
            return Ok(self.events);
        }
        let mut tables = self.store.tables.write();
        if !self.changes.is_current(&tables) {
            return Err(LedgerError::Conflict);
        }
        tables.stamp += 1;
        let stamp = tables.stamp;
        self.changes.apply(&mut tables, stamp);
        Ok(self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn customer(id: u32, available: rust_decimal::Decimal) -> Customer {
        Customer {
            id: CustomerId(id),
            name: format!("customer {id}"),
            credit_limit: dec!(1000),
            available_credit: available,
        }
    }

    #[test]
    fn writes_are_invisible_until_commit() {
        let store = Store::new();
        let mut uow = store.begin();
        uow.put(customer(1, dec!(10)));

        assert!(store.get::<Customer>(CustomerId(1)).is_none());
        assert_eq!(
            uow.get::<Customer>(CustomerId(1)).map(|c| c.available_credit),
            Some(dec!(10))
        );

        uow.commit().unwrap();
        assert!(store.get::<Customer>(CustomerId(1)).is_some());
    }

    #[test]
    fn dropped_unit_applies_nothing() {
        let store = Store::new();
        {
            let mut uow = store.begin();
            uow.put(customer(1, dec!(10)));
        }
        assert!(store.all::<Customer>().is_empty());
    }

    #[test]
    fn stale_read_conflicts() {
        let store = Store::new();
        let mut seed = store.begin();
        seed.put(customer(1, dec!(10)));
        seed.commit().unwrap();

        let mut first = store.begin();
        let mut second = store.begin();
        let mut a: Customer = first.get(CustomerId(1)).unwrap();
        let mut b: Customer = second.get(CustomerId(1)).unwrap();
        a.available_credit = dec!(20);
        b.available_credit = dec!(30);
        first.put(a);
        second.put(b);

        assert!(first.commit().is_ok());
        assert_eq!(second.commit().unwrap_err(), LedgerError::Conflict);
        assert_eq!(
            store.get::<Customer>(CustomerId(1)).unwrap().available_credit,
            dec!(20)
        );
    }

    #[test]
    fn scan_conflicts_with_concurrent_insert() {
        let store = Store::new();
        let mut scanner = store.begin();
        assert!(scanner.scan_where::<Customer>(|_| true).is_empty());
        scanner.put(customer(2, dec!(5)));

        let mut inserter = store.begin();
        inserter.put(customer(1, dec!(1)));
        inserter.commit().unwrap();

        assert_eq!(scanner.commit().unwrap_err(), LedgerError::Conflict);
    }

    #[test]
    fn scan_merges_staged_writes_and_deletes() {
        let store = Store::new();
        let mut seed = store.begin();
        seed.put(customer(1, dec!(1)));
        seed.put(customer(2, dec!(2)));
        seed.commit().unwrap();

        let mut uow = store.begin();
        uow.delete::<Customer>(CustomerId(1));
        uow.put(customer(3, dec!(3)));
        let ids: Vec<u32> = uow
            .scan_where::<Customer>(|_| true)
            .iter()
            .map(|c| c.id.0)
            .collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn ids_are_sequential_per_table() {
        let store = Store::new();
        let uow = store.begin();
        assert_eq!(uow.next_id::<Customer>(), 1);
        assert_eq!(uow.next_id::<Customer>(), 2);
        assert_eq!(uow.next_id::<Order>(), 1);
    }

    #[test]
    fn receivables_and_boletos_share_ids() {
        let store = Store::new();
        let uow = store.begin();
        assert_eq!(uow.next_id::<Receivable>(), 1);
        assert_eq!(uow.next_id::<Boleto>(), 2);
        assert_eq!(uow.next_id::<Receivable>(), 3);
        assert_eq!(uow.next_id::<Customer>(), 1);
    }

    #[test]
    fn filtered_scan_ignores_unrelated_inserts() {
        let store = Store::new();
        let mut seed = store.begin();
        seed.put(customer(1, dec!(10)));
        seed.commit().unwrap();

        let mut reader = store.begin();
        let rich = reader.scan_where::<Customer>(|c| c.available_credit >= dec!(10));
        assert_eq!(rich.len(), 1);
        reader.put(customer(9, dec!(0)));

        let mut unrelated = store.begin();
        unrelated.put(customer(2, dec!(1)));
        unrelated.commit().unwrap();

        assert!(reader.commit().is_ok());
    }

    #[test]
    fn filtered_scan_conflicts_with_matching_insert() {
        let store = Store::new();
        let mut reader = store.begin();
        assert!(reader.scan_where::<Customer>(|c| c.available_credit >= dec!(10)).is_empty());
        reader.put(customer(9, dec!(0)));

        let mut matching = store.begin();
        matching.put(customer(2, dec!(50)));
        matching.commit().unwrap();

        assert_eq!(reader.commit().unwrap_err(), LedgerError::Conflict);
    }
}
