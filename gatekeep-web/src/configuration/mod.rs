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

use anyhow::{Context, Result};
use chrono::Duration;
use gatekeep_core::{GrantSettings, StaticScopeCatalog};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, env};

pub mod defaults;
pub mod parser;

/// Main configuration structure containing all sub-configurations
///
/// # Example
///
/// ```rust,no_run
/// use gatekeep_web::configuration::Configuration;
///
/// let config = Configuration::load().expect("Failed to load configuration");
/// println!("Server running on: {}", config.bind_addr());
/// println!("Known scopes: {:?}", config.scopes.keys());
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Configuration {
    pub server: ServerConfig,
    pub grant: GrantConfig,
    pub rate_limit: RateLimitConfig,
    /// Scope identifier to human readable description
    pub scopes: BTreeMap<String, String>,
    pub database_url: String,
    pub development_mode: bool,
}

/// Server configuration for host and port settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Lifetimes of the records the grant flow creates
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GrantConfig {
    pub request_lifetime_minutes: i64,
    pub access_token_lifetime_minutes: i64,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    pub login_attempts_per_minute: u32,
}

impl Configuration {
    /// Load configuration from environment variables and optional configuration files
    ///
    /// Configuration loading order (later sources override earlier ones):
    /// 1. Default values
    /// 2. /etc/gatekeep.conf (if exists)
    /// 3. ~/.gatekeep.conf (if exists)
    /// 4. The file named by GATEKEEP_CONFIG (if set)
    /// 5. Environment variables
    pub fn load() -> Result<Self> {
        let toml_config = Self::load_toml_config()?;
        Self::from_toml(&toml_config)
    }

    /// Apply environment variables and defaults on top of parsed files
    pub fn from_toml(toml_config: &parser::TomlConfig) -> Result<Self> {
        let server = ServerConfig::load(toml_config)?;
        let grant = GrantConfig::load(toml_config)?;
        let rate_limit = RateLimitConfig::load(toml_config)?;

        let scopes = toml_config
            .scopes
            .clone()
            .unwrap_or_else(defaults::default_scopes);

        let database_url = env::var("DATABASE_URL")
            .or_else(|_| {
                toml_config
                    .database_url
                    .clone()
                    .ok_or(env::VarError::NotPresent)
            })
            .unwrap_or_else(|_| defaults::default_database_url());

        let development_mode = env::var("DEVELOPMENT_MODE")
            .or_else(|_| {
                toml_config
                    .development_mode
                    .map(|b| b.to_string())
                    .ok_or(env::VarError::NotPresent)
            })
            .unwrap_or_else(|_| defaults::default_development_mode().to_string())
            .parse()
            .unwrap_or_else(|_| defaults::default_development_mode());

        Ok(Self {
            server,
            grant,
            rate_limit,
            scopes,
            database_url,
            development_mode,
        })
    }

    /// Load and merge TOML configuration files from standard locations
    fn load_toml_config() -> Result<parser::TomlConfig> {
        let mut configs = Vec::new();

        for path in parser::get_config_file_paths() {
            match parser::parse_toml_file(&path) {
                Ok(config) => configs.push(config),
                Err(e) => {
                    // A broken file is skipped, the remaining layers still apply
                    tracing::warn!("Could not load config file {}: {:#}", path.display(), e);
                }
            }
        }

        Ok(parser::merge_toml_configs(configs))
    }

    /// Convert the current configuration to TOML format
    pub fn to_toml(&self) -> Result<String> {
        let toml_config = parser::TomlConfig {
            server: Some(parser::TomlServerConfig {
                host: Some(self.server.host.clone()),
                port: Some(self.server.port),
            }),
            grant: Some(parser::TomlGrantConfig {
                grant_request_lifetime_minutes: Some(self.grant.request_lifetime_minutes),
                access_token_lifetime_minutes: Some(self.grant.access_token_lifetime_minutes),
            }),
            rate_limit: Some(parser::TomlRateLimitConfig {
                rate_limit_login_attempts: Some(self.rate_limit.login_attempts_per_minute),
            }),
            database_url: Some(self.database_url.clone()),
            development_mode: Some(self.development_mode),
            scopes: Some(self.scopes.clone()),
        };

        toml::to_string_pretty(&toml_config).context("Failed to serialize configuration to TOML")
    }

    /// Get the server bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn grant_settings(&self) -> GrantSettings {
        GrantSettings {
            request_lifetime: Duration::minutes(self.grant.request_lifetime_minutes),
            access_token_lifetime: Duration::minutes(self.grant.access_token_lifetime_minutes),
            ..GrantSettings::default()
        }
    }

    pub fn scope_catalog(&self) -> StaticScopeCatalog {
        StaticScopeCatalog::new(self.scopes.clone())
    }
}

impl ServerConfig {
    fn load(toml_config: &parser::TomlConfig) -> Result<Self> {
        let host = env::var("HOST")
            .or_else(|_| {
                toml_config
                    .server
                    .as_ref()
                    .and_then(|s| s.host.clone())
                    .ok_or(env::VarError::NotPresent)
            })
            .unwrap_or_else(|_| defaults::default_host());

        let port = env::var("PORT")
            .or_else(|_| {
                toml_config
                    .server
                    .as_ref()
                    .and_then(|s| s.port.map(|p| p.to_string()))
                    .ok_or(env::VarError::NotPresent)
            })
            .unwrap_or_else(|_| defaults::default_port().to_string())
            .parse()
            .context("Invalid PORT environment variable")?;

        Ok(Self { host, port })
    }
}

impl GrantConfig {
    fn load(toml_config: &parser::TomlConfig) -> Result<Self> {
        let request_lifetime_minutes: i64 = env::var("GRANT_REQUEST_LIFETIME_MINUTES")
            .or_else(|_| {
                toml_config
                    .grant
                    .as_ref()
                    .and_then(|g| g.grant_request_lifetime_minutes.map(|m| m.to_string()))
                    .ok_or(env::VarError::NotPresent)
            })
            .unwrap_or_else(|_| defaults::default_grant_request_lifetime_minutes().to_string())
            .parse()
            .context("Invalid GRANT_REQUEST_LIFETIME_MINUTES environment variable")?;

        let access_token_lifetime_minutes: i64 = env::var("ACCESS_TOKEN_LIFETIME_MINUTES")
            .or_else(|_| {
                toml_config
                    .grant
                    .as_ref()
                    .and_then(|g| g.access_token_lifetime_minutes.map(|m| m.to_string()))
                    .ok_or(env::VarError::NotPresent)
            })
            .unwrap_or_else(|_| defaults::default_access_token_lifetime_minutes().to_string())
            .parse()
            .context("Invalid ACCESS_TOKEN_LIFETIME_MINUTES environment variable")?;

        if request_lifetime_minutes <= 0 || access_token_lifetime_minutes <= 0 {
            anyhow::bail!("Grant request and access token lifetimes must be positive");
        }

        Ok(Self {
            request_lifetime_minutes,
            access_token_lifetime_minutes,
        })
    }
}

impl RateLimitConfig {
    fn load(toml_config: &parser::TomlConfig) -> Result<Self> {
        let login_attempts_per_minute = env::var("RATE_LIMIT_LOGIN_ATTEMPTS")
            .or_else(|_| {
                toml_config
                    .rate_limit
                    .as_ref()
                    .and_then(|r| r.rate_limit_login_attempts.map(|a| a.to_string()))
                    .ok_or(env::VarError::NotPresent)
            })
            .unwrap_or_else(|_| defaults::default_login_attempts_per_minute().to_string())
            .parse()
            .context("Invalid RATE_LIMIT_LOGIN_ATTEMPTS environment variable")?;

        Ok(Self {
            login_attempts_per_minute,
        })
    }
}
