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

//! Pre-authorized caller context.
//!
//! Authentication happens in the surrounding application; the engine only
//! checks the role it is handed.

use crate::LedgerError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Operator,
    Administrator,
    /// Automated callers such as payment-processor webhooks.
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerContext {
    pub actor: String,
    pub role: Role,
}

impl CallerContext {
    pub fn operator(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            role: Role::Operator,
        }
    }

    pub fn administrator(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            role: Role::Administrator,
        }
    }

    pub fn system(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            role: Role::System,
        }
    }

    /// # Errors
    ///
    /// [`LedgerError::Unauthorized`] unless the caller is an administrator.
    pub fn require_admin(&self) -> Result<(), LedgerError> {
        match self.role {
            Role::Administrator => Ok(()),
            _ => Err(LedgerError::Unauthorized),
        }
    }
}
