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

//! Error types for ledger operations.
//!
//! Duplicate ledger posts, repeated credit restoration and duplicate card
//! projections are not errors: they are logged no-ops recorded in the
//! [`EventLog`](crate::EventLog).

use thiserror::Error;

/// Ledger operation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Id resolves to neither a receivable nor a boleto
    #[error("receivable or boleto not found")]
    NotFound,

    /// Receive attempted on an entry that is already paid
    #[error("entry is already paid")]
    AlreadyPaid,

    /// Reverse attempted on an entry that is not paid
    #[error("entry is not paid")]
    NotPaid,

    /// Negative amount, non-positive payment, or fee larger than the payment
    #[error("invalid amount")]
    InvalidAmount,

    /// Bank account id does not resolve
    #[error("bank account not found")]
    AccountNotFound,

    /// Customer id does not resolve
    #[error("customer not found")]
    CustomerNotFound,

    /// Booking on credit would take available credit below zero
    #[error("insufficient available credit")]
    InsufficientCredit,

    /// Delete attempted while the parent order still exists
    #[error("entry is referenced by a live order")]
    BlockedByOrder,

    /// Caller lacks the administrative capability the operation needs
    #[error("caller is not authorized for this operation")]
    Unauthorized,

    /// Reversal requested without explicit operator confirmation
    #[error("reversal requires explicit confirmation")]
    ConfirmationRequired,

    /// Installment count is zero or the total is not positive
    #[error("invalid installment plan")]
    InvalidInstallmentPlan,

    /// A concurrent writer changed rows this unit of work depended on
    #[error("concurrent modification, retries exhausted")]
    Conflict,

    /// Configuration value could not be parsed
    #[error("configuration error: {0}")]
    Configuration(String),
}

#[cfg(test)]
mod tests {
    use super::LedgerError;

    #[test]
    fn error_display_messages() {
        assert_eq!(
            LedgerError::NotFound.to_string(),
            "receivable or boleto not found"
        );
        assert_eq!(LedgerError::AlreadyPaid.to_string(), "entry is already paid");
        assert_eq!(LedgerError::InvalidAmount.to_string(), "invalid amount");
        assert_eq!(
            LedgerError::AccountNotFound.to_string(),
            "bank account not found"
        );
        assert_eq!(
            LedgerError::BlockedByOrder.to_string(),
            "entry is referenced by a live order"
        );
        assert_eq!(
            LedgerError::Configuration("LEDGER_X".into()).to_string(),
            "configuration error: LEDGER_X"
        );
    }

    #[test]
    fn errors_are_cloneable() {
        let error = LedgerError::Conflict;
        let cloned = error.clone();
        assert_eq!(error, cloned);
    }
}
