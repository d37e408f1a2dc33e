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

use chrono::Utc;
use tracing::debug;

use super::GrantEngine;
use crate::error::GrantResult;

impl GrantEngine {
    /// Delete every grant request past its expiry.
    ///
    /// Runs at the start of each entry point instead of on a timer. Each
    /// request is keyed independently, so concurrent sweeps and in-flight
    /// flows on live requests do not interfere.
    pub async fn sweep_expired(&self) -> GrantResult<u64> {
        let removed = self
            .store
            .delete_expired_grant_requests(Utc::now())
            .await?;

        if removed > 0 {
            debug!(removed, "Swept expired grant requests");
        }

        Ok(removed)
    }
}
