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

use tracing::debug;

use super::GrantEngine;
use crate::error::{GrantError, GrantResult};
use crate::models::{ClientApproval, GrantRequest};
use crate::ports::WriteOutcome;

/// Outcome of resolving a request against prior approvals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Approval {
    Approved,
    NeedsConsent,
}

impl GrantEngine {
    /// Approve the request if everything it asks for was approved before
    /// for this client and account.
    ///
    /// On success the approved scope is set to exactly the requested scope
    /// and persisted. A request that already holds a code is left alone.
    pub async fn approve_scopes(&self, request: &mut GrantRequest) -> GrantResult<Approval> {
        let account_uuid = request.account_uuid.ok_or(GrantError::NotAuthenticated)?;

        let approvals = self
            .store
            .list_client_approvals(request.client_uuid, account_uuid)
            .await?;
        let approved = ClientApproval::union_of(&approvals);

        if !request.scope_requested.is_subset(&approved) {
            debug!(
                missing = %request.scope_requested.difference(&approved),
                "Grant request needs consent"
            );
            return Ok(Approval::NeedsConsent);
        }

        match self
            .store
            .approve_grant_request_scope(&request.token, &request.scope_requested)
            .await?
        {
            WriteOutcome::Applied => {
                request.scope_approved = request.scope_requested.clone();
                Ok(Approval::Approved)
            }
            WriteOutcome::Conflict => Err(GrantError::AlreadyFinalized),
            WriteOutcome::NotFound => Err(GrantError::RequestNotFound),
            WriteOutcome::DuplicateKey => Err(GrantError::invariant(
                "approving scope collided on a unique key",
            )),
        }
    }
}
