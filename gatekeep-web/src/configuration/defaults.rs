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

//! Default configuration values for Gatekeep
//!
//! Each function returns the default value for one configuration field.

use std::collections::BTreeMap;

// Server defaults
pub fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub fn default_port() -> u16 {
    4000
}

// Database defaults
pub fn default_database_url() -> String {
    "sqlite:gatekeep.db".to_string()
}

// Grant flow defaults
pub fn default_grant_request_lifetime_minutes() -> i64 {
    15
}

pub fn default_access_token_lifetime_minutes() -> i64 {
    3 * 24 * 60 // 3 days
}

// Rate limit defaults
pub fn default_login_attempts_per_minute() -> u32 {
    10
}

// Scope catalog defaults
pub fn default_scopes() -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "read".to_string(),
            "Read your account information".to_string(),
        ),
        (
            "write".to_string(),
            "Modify your account information".to_string(),
        ),
    ])
}

// Development mode default
pub fn default_development_mode() -> bool {
    false
}
