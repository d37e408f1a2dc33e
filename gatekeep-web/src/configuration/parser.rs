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

//! TOML configuration parser for Gatekeep
//!
//! Reads configuration files from standard locations and merges them. All
//! keys are top-level except the `[scopes]` table:
//!
//! ```toml
//! host = "127.0.0.1"
//! port = 4000
//! grant_request_lifetime_minutes = 10
//!
//! [scopes]
//! read = "Read your account information"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

/// Raw TOML configuration structure that mirrors the main Configuration
/// but with all fields optional to support partial configuration files
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    #[serde(flatten)]
    pub server: Option<TomlServerConfig>,
    #[serde(flatten)]
    pub grant: Option<TomlGrantConfig>,
    #[serde(flatten)]
    pub rate_limit: Option<TomlRateLimitConfig>,
    pub database_url: Option<String>,
    pub development_mode: Option<bool>,
    pub scopes: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlGrantConfig {
    pub grant_request_lifetime_minutes: Option<i64>,
    pub access_token_lifetime_minutes: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlRateLimitConfig {
    pub rate_limit_login_attempts: Option<u32>,
}

/// Parse a TOML configuration file if it exists
pub fn parse_toml_file<P: AsRef<Path>>(path: P) -> Result<TomlConfig> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(TomlConfig::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;

    let config: TomlConfig = toml::from_str(&content).with_context(|| {
        format!(
            "Failed to parse TOML configuration file: {}",
            path.display()
        )
    })?;

    Ok(config)
}

/// Get standard configuration file paths in order of precedence (lowest to highest)
pub fn get_config_file_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // System-wide configuration
    paths.push(PathBuf::from("/etc/gatekeep.conf"));

    // User-specific configuration
    if let Ok(home) = std::env::var("HOME") {
        paths.push(PathBuf::from(home).join(".gatekeep.conf"));
    }

    // Explicit configuration file
    if let Ok(path) = std::env::var("GATEKEEP_CONFIG") {
        paths.push(PathBuf::from(path));
    }

    paths
}

/// Merge multiple TOML configurations, with later configs taking precedence
pub fn merge_toml_configs(configs: Vec<TomlConfig>) -> TomlConfig {
    let mut merged = TomlConfig::default();

    for config in configs {
        if let Some(server) = config.server {
            let mut merged_server = merged.server.unwrap_or_default();
            if server.host.is_some() {
                merged_server.host = server.host;
            }
            if server.port.is_some() {
                merged_server.port = server.port;
            }
            merged.server = Some(merged_server);
        }

        if let Some(grant) = config.grant {
            let mut merged_grant = merged.grant.unwrap_or_default();
            if grant.grant_request_lifetime_minutes.is_some() {
                merged_grant.grant_request_lifetime_minutes = grant.grant_request_lifetime_minutes;
            }
            if grant.access_token_lifetime_minutes.is_some() {
                merged_grant.access_token_lifetime_minutes = grant.access_token_lifetime_minutes;
            }
            merged.grant = Some(merged_grant);
        }

        if let Some(rate_limit) = config.rate_limit {
            let mut merged_rate_limit = merged.rate_limit.unwrap_or_default();
            if rate_limit.rate_limit_login_attempts.is_some() {
                merged_rate_limit.rate_limit_login_attempts = rate_limit.rate_limit_login_attempts;
            }
            merged.rate_limit = Some(merged_rate_limit);
        }

        // Scope tables are merged key by key
        if let Some(scopes) = config.scopes {
            merged.scopes.get_or_insert_with(BTreeMap::new).extend(scopes);
        }

        if config.database_url.is_some() {
            merged.database_url = config.database_url;
        }
        if config.development_mode.is_some() {
            merged.development_mode = config.development_mode;
        }
    }

    merged
}
