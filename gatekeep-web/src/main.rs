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
use gatekeep_core::GrantEngine;
use gatekeep_db::{init_database, SqliteAccountVerifier, SqliteStore};
use gatekeep_web::{
    configuration::Configuration, rate_limit::create_login_rate_limiter, routes, state::AppState,
    templates::init_templates,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "gatekeep_web=debug,gatekeep_core=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Configuration::load()?;
    info!("Starting Gatekeep authorization server");
    info!("Known scopes: {:?}", config.scopes.keys().collect::<Vec<_>>());

    // Initialize database
    info!("Initializing database: {}", config.database_url);
    let db = init_database(&config.database_url).await?;

    // Initialize templates
    let templates = init_templates(config.development_mode)?;

    // Wire the grant engine to SQLite
    let engine = GrantEngine::new(
        Arc::new(SqliteStore::new(db.clone())),
        Arc::new(SqliteAccountVerifier::new(db)),
        Arc::new(config.scope_catalog()),
        config.grant_settings(),
    );

    // Create rate limiter
    let login_rate_limiter = create_login_rate_limiter(config.rate_limit.login_attempts_per_minute);

    // Create application state
    let state = AppState::new(engine, Arc::new(templates), config.clone(), login_rate_limiter);

    // Create router
    let app = routes::create_router(state);

    // Start server
    let listener = TcpListener::bind(&config.bind_addr()).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
