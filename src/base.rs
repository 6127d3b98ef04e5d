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

//! Core identifier types.
//!
//! Every table gets its own newtype so a boleto id can never be handed to a
//! function expecting a receivable id by accident. The raw `u32` is public
//! because external callers (UI, webhooks, CSV replay) only know numbers.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identifier of a [`Receivable`](crate::Receivable).
    ReceivableId
);
id_type!(
    /// Identifier of a [`Boleto`](crate::Boleto).
    BoletoId
);
id_type!(
    /// Identifier of a [`BankAccount`](crate::BankAccount).
    BankAccountId
);
id_type!(
    /// Identifier of a ledger [`Transaction`](crate::Transaction).
    TransactionId
);
id_type!(
    /// Identifier of a [`CardTransaction`](crate::CardTransaction).
    CardTransactionId
);
id_type!(
    /// Identifier of a [`Customer`](crate::Customer).
    CustomerId
);
id_type!(
    /// Identifier of an [`Order`](crate::Order), owned by the order subsystem.
    OrderId
);
