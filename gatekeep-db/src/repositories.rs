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

pub mod access_token_repository;
pub mod account_repository;
pub mod client_approval_repository;
pub mod client_repository;
pub mod grant_request_repository;
pub mod refresh_token_repository;

pub use access_token_repository::*;
pub use account_repository::*;
pub use client_approval_repository::*;
pub use client_repository::*;
pub use grant_request_repository::*;
pub use refresh_token_repository::*;

use anyhow::{Context, Result};
use gatekeep_core::{ScopeSet, WriteOutcome};
use sqlx::sqlite::SqliteQueryResult;
use uuid::Uuid;

pub(crate) fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("Invalid UUID '{}' in database", raw))
}

pub(crate) fn scope_to_json(scope: &ScopeSet) -> Result<String> {
    serde_json::to_string(scope).context("Failed to encode scope")
}

pub(crate) fn scope_from_json(raw: &str) -> Result<ScopeSet> {
    serde_json::from_str(raw).with_context(|| format!("Invalid scope '{}' in database", raw))
}

/// Map a keyed write onto a [`WriteOutcome`]. Unique constraint violations
/// are an expected outcome, every other failure is an error.
pub(crate) fn write_outcome(
    result: std::result::Result<SqliteQueryResult, sqlx::Error>,
    context: &'static str,
) -> Result<WriteOutcome> {
    match result {
        Ok(done) if done.rows_affected() == 0 => Ok(WriteOutcome::NotFound),
        Ok(_) => Ok(WriteOutcome::Applied),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(WriteOutcome::DuplicateKey),
        Err(e) => Err(e).context(context),
    }
}
