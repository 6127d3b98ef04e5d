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

//! Payment methods and the request/response shapes of the receive operation.

use crate::base::BankAccountId;
use crate::card::CardType;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How a debt was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Pix,
    Boleto,
    BankTransfer,
    DebitCard,
    CreditCard,
    Check,
}

impl PaymentMethod {
    /// Card network the method settles through, if any.
    ///
    /// Card methods never post to a bank account directly.
    pub fn card_type(self) -> Option<CardType> {
        match self {
            Self::DebitCard => Some(CardType::Debit),
            Self::CreditCard => Some(CardType::Credit),
            _ => None,
        }
    }

    pub fn is_card(self) -> bool {
        self.card_type().is_some()
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cash => "CASH",
            Self::Pix => "PIX",
            Self::Boleto => "BOLETO",
            Self::BankTransfer => "BANK_TRANSFER",
            Self::DebitCard => "DEBIT_CARD",
            Self::CreditCard => "CREDIT_CARD",
            Self::Check => "CHECK",
        };
        f.write_str(name)
    }
}

/// Error returned when a payment method name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown payment method '{0}'")]
pub struct UnknownPaymentMethod(pub String);

impl FromStr for PaymentMethod {
    type Err = UnknownPaymentMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "CASH" | "DINHEIRO" => Ok(Self::Cash),
            "PIX" => Ok(Self::Pix),
            "BOLETO" => Ok(Self::Boleto),
            "BANK_TRANSFER" | "TRANSFER" | "TED" => Ok(Self::BankTransfer),
            "DEBIT_CARD" | "DEBIT" => Ok(Self::DebitCard),
            "CREDIT_CARD" | "CREDIT" => Ok(Self::CreditCard),
            "CHECK" | "CHEQUE" => Ok(Self::Check),
            _ => Err(UnknownPaymentMethod(s.to_string())),
        }
    }
}

/// Input of [`Engine::receive_payment`](crate::Engine::receive_payment).
///
/// `id` may name a receivable or a boleto; the two never share an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivePayment {
    pub id: u32,
    pub amount: Decimal,
    pub interest: Decimal,
    pub fine: Decimal,
    pub fee: Decimal,
    pub bank_account_id: Option<BankAccountId>,
    pub payment_date: Option<NaiveDate>,
    pub payment_method: Option<PaymentMethod>,
    pub notes: Option<String>,
}

impl ReceivePayment {
    /// A payment of `amount` with no interest, fine, fee or bank account.
    pub fn new(id: u32, amount: Decimal) -> Self {
        Self {
            id,
            amount,
            interest: Decimal::ZERO,
            fine: Decimal::ZERO,
            fee: Decimal::ZERO,
            bank_account_id: None,
            payment_date: None,
            payment_method: None,
            notes: None,
        }
    }

    pub fn into_account(mut self, account: BankAccountId) -> Self {
        self.bank_account_id = Some(account);
        self
    }

    pub fn with_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = Some(method);
        self
    }

    pub fn with_charges(mut self, interest: Decimal, fine: Decimal, fee: Decimal) -> Self {
        self.interest = interest;
        self.fine = fine;
        self.fee = fee;
        self
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.payment_date = Some(date);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Status reported back to the caller of a receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReceiveStatus {
    Paid,
    Pending,
}

/// Result of [`Engine::receive_payment`](crate::Engine::receive_payment).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveOutcome {
    pub status: ReceiveStatus,
    pub remaining_balance: Decimal,
    pub is_partial: bool,
}
