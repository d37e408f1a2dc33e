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

use thiserror::Error;

pub type GrantResult<T> = Result<T, GrantError>;

/// Failures of the grant flow. Everything except `Internal` is the caller's
/// fault and is reported back with its reason; `Internal` carries detail for
/// the log only.
#[derive(Error, Debug)]
pub enum GrantError {
    #[error("Unsupported response type '{0}'")]
    InvalidResponseType(String),

    #[error("Redirect URI is not registered for this client")]
    InvalidRedirectUri,

    #[error("Requested scope is not permitted for this client")]
    InvalidScope,

    #[error("Client '{0}' does not exist")]
    UnknownClient(String),

    #[error("Grant request does not exist")]
    RequestNotFound,

    #[error("Grant request has already been finalized")]
    AlreadyFinalized,

    #[error("Grant request belongs to a different account")]
    AccountMismatch,

    #[error("Grant request has no authenticated account")]
    NotAuthenticated,

    #[error("Approved scope exceeds the requested scope")]
    ConsentExceedsRequest,

    #[error("Invalid credentials")]
    Unauthorized,

    #[error("Unsupported grant type '{0}'")]
    UnsupportedGrantType(String),

    #[error("Invalid grant code")]
    InvalidCode,

    #[error("Grant code has expired")]
    Expired,

    #[error("Invalid access token")]
    InvalidToken,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl GrantError {
    pub fn is_client_error(&self) -> bool {
        !matches!(self, GrantError::Internal(_))
    }

    /// An invariant the engine relies on did not hold.
    pub fn invariant(message: impl Into<String>) -> Self {
        GrantError::Internal(anyhow::anyhow!(message.into()))
    }
}
