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

pub mod catalog;
pub mod engine;
pub mod error;
pub mod models;
pub mod ports;
pub mod scope;
pub mod token;

#[cfg(test)]
pub mod test_store;

pub use catalog::{ScopeCatalog, StaticScopeCatalog};
pub use engine::{
    Approval, Completion, ConsentDetails, Denial, FlowStep, GrantEngine, GrantSettings, TokenPair,
};
pub use error::{GrantError, GrantResult};
pub use ports::{AccountVerifier, OAuthStore, WriteOutcome};
pub use scope::ScopeSet;
