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
use chrono::Utc;
use clap::{Parser, Subcommand};
use gatekeep_core::models::{Account, Client};
use gatekeep_core::token::generate_secure_token;
use gatekeep_core::ScopeSet;
use gatekeep_db::{AccountRepository, ClientRepository, GrantRequestRepository};
use gatekeep_web::Configuration;
use sqlx::SqlitePool;
use std::io::Write;

/// Length of generated client secrets
const GENERATED_SECRET_LENGTH: usize = 40;

#[derive(Parser)]
#[command(name = "gatekeep")]
#[command(about = "Gatekeep CLI tool for client and account management")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database (create tables)
    Init,

    /// Print the effective configuration as TOML
    Config,

    /// Client management commands
    Client {
        #[command(subcommand)]
        command: ClientCommands,
    },

    /// Account management commands
    Account {
        #[command(subcommand)]
        command: AccountCommands,
    },

    /// Delete grant requests that have expired
    Sweep {
        /// Only report what would be deleted
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum ClientCommands {
    /// Register a client application
    Add {
        /// Client name, used as client_id
        name: String,
        /// Allowed redirect URI (repeat for several)
        #[arg(long = "redirect-uri", required = true)]
        redirect_uris: Vec<String>,
        /// Scope the client may request, space or comma separated
        #[arg(long)]
        scope: String,
        /// Client secret (generated if not provided)
        #[arg(long)]
        secret: Option<String>,
    },

    /// List registered clients
    List,

    /// Remove a client and everything issued to it
    Remove {
        /// Client name
        name: String,
    },
}

#[derive(Subcommand)]
enum AccountCommands {
    /// Create a new account
    Create {
        /// Login name
        login: String,
        /// Email address
        email: String,
        /// Password (will prompt if not provided)
        #[arg(long)]
        password: Option<String>,
    },

    /// Change account password
    Password {
        /// Login name
        login: String,
        /// New password (will prompt if not provided)
        #[arg(long)]
        password: Option<String>,
    },

    /// Prevent an account from logging in
    Disable {
        /// Login name
        login: String,
    },

    /// Allow a disabled account to log in again
    Enable {
        /// Login name
        login: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Configuration::load()?;

    match cli.command {
        Commands::Init => init_database(&config.database_url).await,
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
        Commands::Client { command } => {
            let pool = gatekeep_db::init_database(&config.database_url).await?;
            handle_client_command(command, pool, &config).await
        }
        Commands::Account { command } => {
            let pool = gatekeep_db::init_database(&config.database_url).await?;
            handle_account_command(command, pool).await
        }
        Commands::Sweep { dry_run } => {
            let pool = gatekeep_db::init_database(&config.database_url).await?;
            let count = sweep(pool, dry_run).await?;
            if dry_run {
                println!("{} expired grant request(s) would be deleted", count);
            } else {
                println!("Deleted {} expired grant request(s)", count);
            }
            Ok(())
        }
    }
}

async fn init_database(database_url: &str) -> Result<()> {
    println!("Initializing database at: {}", database_url);

    let _pool = gatekeep_db::init_database(database_url).await?;

    println!("Database initialized successfully!");
    Ok(())
}

async fn handle_client_command(
    command: ClientCommands,
    pool: SqlitePool,
    config: &Configuration,
) -> Result<()> {
    let client_repo = ClientRepository::new(pool);

    match command {
        ClientCommands::Add {
            name,
            redirect_uris,
            scope,
            secret,
        } => {
            let (client, generated) = build_client(name, redirect_uris, &scope, secret, config)?;

            client_repo
                .create(&client)
                .await
                .context("Failed to create client")?;

            println!("Client '{}' created with ID: {}", client.name, client.uuid);
            if generated {
                println!("Client secret: {}", client.secret);
                println!("Store it now, it will not be shown again.");
            }
            Ok(())
        }

        ClientCommands::List => {
            let clients = client_repo.list().await?;
            if clients.is_empty() {
                println!("No clients registered");
            }
            for client in clients {
                println!(
                    "{}  scope: {}  redirect: {}",
                    client.name,
                    client.scope,
                    client.redirect_uris.join(", ")
                );
            }
            Ok(())
        }

        ClientCommands::Remove { name } => {
            if !client_repo.delete(&name).await? {
                anyhow::bail!("Client '{}' not found", name);
            }
            println!("Client '{}' removed", name);
            Ok(())
        }
    }
}

/// Validate the arguments of `client add` against the configured scopes.
/// The flag tells whether the secret was generated.
fn build_client(
    name: String,
    redirect_uris: Vec<String>,
    scope: &str,
    secret: Option<String>,
    config: &Configuration,
) -> Result<(Client, bool)> {
    let scope = ScopeSet::parse(scope);
    if scope.is_empty() {
        anyhow::bail!("A client needs at least one scope");
    }

    let catalog = config.scope_catalog();
    let unknown: Vec<&str> = scope.iter().filter(|s| !catalog.is_known(s)).collect();
    if !unknown.is_empty() {
        anyhow::bail!(
            "Unknown scope: {}. Add it to the [scopes] table of the configuration first",
            unknown.join(", ")
        );
    }

    let generated = secret.is_none();
    let secret = secret.unwrap_or_else(|| generate_secure_token(GENERATED_SECRET_LENGTH));

    let client = Client::new(name, secret, redirect_uris, scope)?;
    Ok((client, generated))
}

async fn handle_account_command(command: AccountCommands, pool: SqlitePool) -> Result<()> {
    let account_repo = AccountRepository::new(pool);

    match command {
        AccountCommands::Create {
            login,
            email,
            password,
        } => {
            println!("Creating account: {} ({})", login, email);

            let password = match password {
                Some(pwd) => pwd,
                None => prompt_password("Password: ")?,
            };

            let account = Account::new(login, email, &password)?;

            account_repo
                .create(&account)
                .await
                .context("Failed to create account")?;

            println!("Account created successfully with ID: {}", account.uuid);
            Ok(())
        }

        AccountCommands::Password { login, password } => {
            println!("Changing password for {}", login);

            let mut account = find_account(&account_repo, &login).await?;

            let password = match password {
                Some(p) => p,
                None => prompt_password("New password: ")?,
            };

            account.set_password(&password)?;
            account_repo.update(&account).await?;

            println!("Password changed successfully!");
            Ok(())
        }

        AccountCommands::Disable { login } => set_active(&account_repo, &login, false).await,
        AccountCommands::Enable { login } => set_active(&account_repo, &login, true).await,
    }
}

async fn find_account(repo: &AccountRepository, login: &str) -> Result<Account> {
    repo.find_by_login(login)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Account '{}' not found", login))
}

async fn set_active(repo: &AccountRepository, login: &str, active: bool) -> Result<()> {
    let mut account = find_account(repo, login).await?;
    account.is_active = active;
    account.updated_at = Utc::now();
    repo.update(&account).await?;

    println!(
        "Account '{}' {}",
        login,
        if active { "enabled" } else { "disabled" }
    );
    Ok(())
}

fn prompt_password(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    std::io::stdout().flush()?;
    rpassword::read_password().context("Failed to read password")
}

/// Count, and unless `dry_run` delete, the grant requests past their expiry.
async fn sweep(pool: SqlitePool, dry_run: bool) -> Result<u64> {
    let repo = GrantRequestRepository::new(pool);
    let now = Utc::now();

    if dry_run {
        Ok(repo.list_expired(now).await?.len() as u64)
    } else {
        repo.delete_expired(now).await
    }
}
