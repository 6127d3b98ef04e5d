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

//! Fixed-point money helpers.
//!
//! Every amount that is compared, summed or persisted goes through [`round2`].
//!
//! # Example
//!
//! ```
//! use boleto_ledger::money::{round2, is_settled};
//! use rust_decimal_macros::dec;
//!
//! assert_eq!(round2(dec!(0.1) + dec!(0.2)), dec!(0.30));
//! assert_eq!(round2(dec!(2.345)), dec!(2.35));
//! assert!(is_settled(dec!(0.01)));
//! assert!(!is_settled(dec!(0.02)));
//! ```

use crate::LedgerError;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use std::str::FromStr;

/// Number of decimal places kept for every monetary value.
pub const DECIMAL_PRECISION: u32 = 2;

/// One cent. A remaining balance at or below this is treated as paid.
pub const TOLERANCE: Decimal = dec!(0.01);

/// Rounds to two decimal places, half away from zero.
pub fn round2(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(DECIMAL_PRECISION, RoundingStrategy::MidpointAwayFromZero)
}

/// [`round2`] with the scale fixed at two places, so `10` renders as `10.00`.
pub fn fixed2(amount: Decimal) -> Decimal {
    let mut fixed = round2(amount);
    fixed.rescale(DECIMAL_PRECISION);
    fixed
}

/// Returns `true` when `remaining` is within one cent of zero (or negative).
///
/// Callers pass an already rounded value.
pub fn is_settled(remaining: Decimal) -> bool {
    remaining <= TOLERANCE
}

/// `amount × percentage / 100`, rounded.
pub fn percent_of(amount: Decimal, percentage: Decimal) -> Decimal {
    round2(amount * percentage / dec!(100))
}

/// Rejects negative amounts; returns the rounded value otherwise.
pub fn non_negative(amount: Decimal) -> Result<Decimal, LedgerError> {
    if amount < Decimal::ZERO {
        return Err(LedgerError::InvalidAmount);
    }
    Ok(round2(amount))
}

/// Rejects zero and negative amounts; returns the rounded value otherwise.
pub fn positive(amount: Decimal) -> Result<Decimal, LedgerError> {
    let rounded = round2(amount);
    if rounded <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount);
    }
    Ok(rounded)
}

/// Parses a user-supplied amount. A decimal comma (`"150,00"`) is accepted,
/// thousands separators are not. Blank input is zero.
pub fn parse_amount(raw: &str) -> Result<Decimal, LedgerError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Decimal::ZERO);
    }
    let normalized = trimmed.replace(',', ".");
    Decimal::from_str(&normalized)
        .map(round2)
        .map_err(|_| LedgerError::InvalidAmount)
}
