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

use std::collections::BTreeMap;

use crate::models::Client;
use crate::scope::ScopeSet;

/// Knows which scope identifiers exist and what they mean.
pub trait ScopeCatalog: Send + Sync {
    /// Human readable description of every member of `scope`, or `None` if
    /// any member is unknown.
    fn describe(&self, scope: &ScopeSet) -> Option<BTreeMap<String, String>>;

    /// Whether `client` may request `scope`.
    fn permits(&self, client: &Client, scope: &ScopeSet) -> bool;
}

/// Catalog backed by a fixed table, usually loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticScopeCatalog {
    descriptions: BTreeMap<String, String>,
}

impl StaticScopeCatalog {
    pub fn new(descriptions: BTreeMap<String, String>) -> Self {
        Self { descriptions }
    }

    pub fn is_known(&self, scope: &str) -> bool {
        self.descriptions.contains_key(scope)
    }
}

impl ScopeCatalog for StaticScopeCatalog {
    fn describe(&self, scope: &ScopeSet) -> Option<BTreeMap<String, String>> {
        scope
            .iter()
            .map(|s| {
                self.descriptions
                    .get(s)
                    .map(|description| (s.to_string(), description.clone()))
            })
            .collect()
    }

    fn permits(&self, client: &Client, scope: &ScopeSet) -> bool {
        scope.is_subset(&client.scope) && scope.iter().all(|s| self.is_known(s))
    }
}
