// Gatekeep - An OAuth2 authorization server built with Rust
// Copyright (C) 2025 Gatekeep Project Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scope::ScopeSet;

/// A record that an account consented to `scope` for a client. Approvals are
/// additive: a new consent is a new record, never an update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientApproval {
    pub uuid: Uuid,
    pub client_uuid: Uuid,
    pub account_uuid: Uuid,
    pub scope: ScopeSet,
    pub created_at: DateTime<Utc>,
}

impl ClientApproval {
    pub fn new(client_uuid: Uuid, account_uuid: Uuid, scope: ScopeSet) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            client_uuid,
            account_uuid,
            scope,
            created_at: Utc::now(),
        }
    }

    /// Union of the scope of every approval in `approvals`.
    pub fn union_of<'a>(approvals: impl IntoIterator<Item = &'a ClientApproval>) -> ScopeSet {
        approvals
            .into_iter()
            .fold(ScopeSet::new(), |acc, approval| acc.union(&approval.scope))
    }
}
