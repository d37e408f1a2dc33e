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

use gatekeep_core::GrantEngine;
use std::sync::Arc;
use tera::Tera;

use crate::configuration::Configuration;
use crate::rate_limit::SharedRateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub engine: GrantEngine,
    pub templates: Arc<Tera>,
    pub config: Configuration,
    pub login_rate_limiter: SharedRateLimiter,
}

impl AppState {
    pub fn new(
        engine: GrantEngine,
        templates: Arc<Tera>,
        config: Configuration,
        login_rate_limiter: SharedRateLimiter,
    ) -> Self {
        Self {
            engine,
            templates,
            config,
            login_rate_limiter,
        }
    }
}
