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

use anyhow::Result;
use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2,
};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

static LOGIN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z][a-zA-Z0-9_.-]*$").expect("login regex is valid")
});

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9._%+-]*[a-zA-Z0-9])?@[a-zA-Z0-9]([a-zA-Z0-9.-]*[a-zA-Z0-9])?\.[a-zA-Z]{2,}$")
        .expect("email regex is valid")
});

/// Checked in place of a real hash when a login matches no usable account.
static PLACEHOLDER_HASH: Lazy<Option<String>> =
    Lazy::new(|| Account::hash_password("gatekeep-placeholder-password").ok());

/// A resource owner who can log in and approve client access.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub uuid: Uuid,
    pub login: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with a hashed password
    pub fn new(login: String, email: String, password: &str) -> Result<Self> {
        Self::validate_login(&login).map_err(|e| anyhow::anyhow!("Invalid login: {}", e))?;
        Self::validate_email(&email).map_err(|e| anyhow::anyhow!("Invalid email: {}", e))?;

        let password_hash = Self::hash_password(password)?;
        let now = Utc::now();

        Ok(Self {
            uuid: Uuid::new_v4(),
            login,
            email,
            password_hash,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Hash a password using Argon2
    pub fn hash_password(password: &str) -> Result<String> {
        use argon2::password_hash::rand_core::OsRng;

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
            .to_string();
        Ok(password_hash)
    }

    pub fn set_password(&mut self, password: &str) -> Result<()> {
        self.password_hash = Self::hash_password(password)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Verify a password against the stored hash
    pub fn verify_password(&self, password: &str) -> Result<bool> {
        verify_hash(&self.password_hash, password)
    }

    /// Verify `password` for a login lookup. Without an account the
    /// password is still run through argon2 against a placeholder hash and
    /// the answer is always `false`, so a miss costs the same as a wrong
    /// password.
    pub fn verify_login(account: Option<&Account>, password: &str) -> Result<bool> {
        match account {
            Some(account) => account.verify_password(password),
            None => {
                if let Some(hash) = PLACEHOLDER_HASH.as_deref() {
                    verify_hash(hash, password)?;
                }
                Ok(false)
            }
        }
    }

    pub fn validate_login(login: &str) -> Result<(), String> {
        if login.len() < 3 {
            return Err("Login must be at least 3 characters".to_string());
        }

        if login.len() > 50 {
            return Err("Login cannot exceed 50 characters".to_string());
        }

        if !LOGIN_REGEX.is_match(login) {
            return Err("Login must start with a letter and contain only letters, numbers, dots, underscores, and hyphens".to_string());
        }

        Ok(())
    }

    pub fn validate_email(email: &str) -> Result<(), String> {
        if email.is_empty() {
            return Err("Email cannot be empty".to_string());
        }

        if email.len() > 255 {
            return Err("Email cannot exceed 255 characters".to_string());
        }

        if !EMAIL_REGEX.is_match(email) {
            return Err("Invalid email format".to_string());
        }

        Ok(())
    }
}

fn verify_hash(hash: &str, password: &str) -> Result<bool> {
    use argon2::password_hash::{PasswordHash, PasswordVerifier};

    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(_) => Ok(false),
    }
}
