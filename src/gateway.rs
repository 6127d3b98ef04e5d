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

//! Payment-processor status source for boletos.

use crate::boleto::BoletoStatus;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What the payment processor reports for an external payment id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessorStatus {
    Pending,
    /// `amount` is `None` when the processor does not report it; the boleto
    /// amount is assumed then.
    Paid {
        amount: Option<Decimal>,
        paid_on: Option<NaiveDate>,
    },
    Cancelled,
}

/// Polls an external processor. Implemented by the webhook/poll layer.
pub trait BoletoStatusProvider {
    fn status(&self, pix_payment_id: &str) -> ProcessorStatus;
}

impl<F> BoletoStatusProvider for F
where
    F: Fn(&str) -> ProcessorStatus,
{
    fn status(&self, pix_payment_id: &str) -> ProcessorStatus {
        self(pix_payment_id)
    }
}

/// Result of [`Engine::check_boleto_status`](crate::Engine::check_boleto_status).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoletoCheck {
    pub was_updated: bool,
    pub new_status: BoletoStatus,
}
