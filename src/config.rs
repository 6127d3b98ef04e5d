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

//! Engine configuration.

use crate::LedgerError;
use crate::card::CardType;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::env;
use std::str::FromStr;

/// What happens to customer credit when a received payment is reversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditReversalPolicy {
    /// Leave the restored credit in place.
    #[default]
    Keep,
    /// Take back the credit restored on receipt, stopping at zero.
    Debit,
}

impl FromStr for CreditReversalPolicy {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep" => Ok(Self::Keep),
            "debit" => Ok(Self::Debit),
            other => Err(LedgerError::Configuration(format!(
                "LEDGER_CREDIT_ON_REVERSAL: unknown policy '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LedgerConfig {
    /// Fee used for debit cards when no active config exists.
    #[serde(default = "default_debit_fee")]
    pub debit_fee_percentage: Decimal,
    /// Fee used for credit cards when no active config exists.
    #[serde(default = "default_credit_fee")]
    pub credit_fee_percentage: Decimal,
    #[serde(default = "default_debit_days")]
    pub debit_settlement_days: u64,
    #[serde(default = "default_credit_days")]
    pub credit_settlement_days: u64,
    /// Match untagged INCOME rows by account and amount when reversing.
    #[serde(default = "default_true")]
    pub legacy_transaction_fallback: bool,
    #[serde(default)]
    pub credit_on_reversal: CreditReversalPolicy,
    #[serde(default = "default_retries")]
    pub max_conflict_retries: u32,
}

fn default_debit_fee() -> Decimal {
    dec!(0.90)
}

fn default_credit_fee() -> Decimal {
    dec!(3.24)
}

fn default_debit_days() -> u64 {
    1
}

fn default_credit_days() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_retries() -> u32 {
    3
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            debit_fee_percentage: default_debit_fee(),
            credit_fee_percentage: default_credit_fee(),
            debit_settlement_days: default_debit_days(),
            credit_settlement_days: default_credit_days(),
            legacy_transaction_fallback: default_true(),
            credit_on_reversal: CreditReversalPolicy::default(),
            max_conflict_retries: default_retries(),
        }
    }
}

impl LedgerConfig {
    /// Loads `.env` if present, then overrides defaults from `LEDGER_*` variables.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Configuration`] naming the first variable that fails to parse.
    pub fn from_env() -> Result<Self, LedgerError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        Ok(Self {
            debit_fee_percentage: var_or(
                "LEDGER_DEBIT_FEE_PERCENTAGE",
                defaults.debit_fee_percentage,
            )?,
            credit_fee_percentage: var_or(
                "LEDGER_CREDIT_FEE_PERCENTAGE",
                defaults.credit_fee_percentage,
            )?,
            debit_settlement_days: var_or(
                "LEDGER_DEBIT_SETTLEMENT_DAYS",
                defaults.debit_settlement_days,
            )?,
            credit_settlement_days: var_or(
                "LEDGER_CREDIT_SETTLEMENT_DAYS",
                defaults.credit_settlement_days,
            )?,
            legacy_transaction_fallback: var_or(
                "LEDGER_LEGACY_TRANSACTION_FALLBACK",
                defaults.legacy_transaction_fallback,
            )?,
            credit_on_reversal: match env::var("LEDGER_CREDIT_ON_REVERSAL") {
                Ok(raw) => raw.parse()?,
                Err(_) => defaults.credit_on_reversal,
            },
            max_conflict_retries: var_or(
                "LEDGER_MAX_CONFLICT_RETRIES",
                defaults.max_conflict_retries,
            )?,
        })
    }

    /// Fee percentage for `card_type` when no active fee config exists.
    pub fn default_fee(&self, card_type: CardType) -> Decimal {
        match card_type {
            CardType::Debit => self.debit_fee_percentage,
            CardType::Credit => self.credit_fee_percentage,
        }
    }

    /// Days between sale and expected settlement for `card_type`.
    pub fn settlement_days(&self, card_type: CardType) -> u64 {
        match card_type {
            CardType::Debit => self.debit_settlement_days,
            CardType::Credit => self.credit_settlement_days,
        }
    }
}

fn var_or<T: FromStr>(name: &str, default: T) -> Result<T, LedgerError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| LedgerError::Configuration(format!("{name}: invalid value '{raw}'"))),
        Err(_) => Ok(default),
    }
}
