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
use tera::Tera;

const TEMPLATES: [(&str, &str); 3] = [
    ("base.html", include_str!("../templates/base.html")),
    ("login.html", include_str!("../templates/login.html")),
    ("approve.html", include_str!("../templates/approve.html")),
];

/// Build the template engine.
///
/// Production uses the pages compiled into the binary. Development mode reads
/// them from the crate's `templates/` directory so edits only need a restart.
pub fn init_templates(development_mode: bool) -> Result<Tera> {
    if development_mode {
        let pattern = concat!(env!("CARGO_MANIFEST_DIR"), "/templates/**/*.html");
        tracing::info!("Loading templates from {} (development mode)", pattern);
        return Tera::new(pattern).context("Failed to load templates from disk");
    }

    let mut tera = Tera::default();
    tera.add_raw_templates(TEMPLATES)
        .context("Failed to load built-in templates")?;
    tracing::debug!(count = TEMPLATES.len(), "Templates loaded");
    Ok(tera)
}
