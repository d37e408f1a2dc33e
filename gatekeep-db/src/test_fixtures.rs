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
use gatekeep_core::models::{Account, Client};
use gatekeep_core::ScopeSet;
use sqlx::SqlitePool;

use crate::{AccountRepository, ClientRepository};

pub const CALLBACK: &str = "http://localhost:8080/callback";
pub const CLIENT_SECRET: &str = "gin-secret-123";

pub fn sample_client(name: &str) -> Client {
    Client::new(
        name.to_string(),
        CLIENT_SECRET.to_string(),
        vec![CALLBACK.to_string()],
        ScopeSet::from_iter(["read", "write"]),
    )
    .unwrap()
}

pub fn sample_account(login: &str, password: &str) -> Account {
    Account::new(login.to_string(), format!("{}@example.com", login), password).unwrap()
}

/// Store the client "gin" and the account "alice" (password "wonderland").
pub async fn seed(pool: &SqlitePool) -> Result<(Client, Account)> {
    let client = sample_client("gin");
    let account = sample_account("alice", "wonderland");

    ClientRepository::new(pool.clone()).create(&client).await?;
    AccountRepository::new(pool.clone()).create(&account).await?;

    Ok((client, account))
}
