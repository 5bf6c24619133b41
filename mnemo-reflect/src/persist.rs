// Copyright 2025 Mnemo Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! JSON persistence for reflector outputs.
//!
//! Same contract as the other stores: saving can fail loudly, loading
//! cannot - a missing or corrupt file yields an empty store.

use crate::reflector::{MentalModel, Reflection};
use mnemo_core::MemoryResult;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Durable collection of synthesized knowledge. Records are replaced
/// wholesale (a model keyed by topic supersedes the previous one), never
/// patched in place.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReflectionStore {
    pub reflections: Vec<Reflection>,
    pub mental_models: Vec<MentalModel>,
}

impl ReflectionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a reflection by id.
    pub fn upsert_reflection(&mut self, reflection: Reflection) {
        self.reflections.retain(|r| r.id != reflection.id);
        self.reflections.push(reflection);
    }

    /// Insert or replace a mental model by topic.
    pub fn upsert_model(&mut self, model: MentalModel) {
        self.mental_models.retain(|m| m.topic != model.topic);
        self.mental_models.push(model);
    }

    /// Look up a mental model by topic.
    pub fn model_for_topic(&self, topic: &str) -> Option<&MentalModel> {
        self.mental_models.iter().find(|m| m.topic == topic)
    }

    /// Save to a JSON file.
    pub fn save(&self, path: &Path) -> MemoryResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load from a JSON file. Missing or corrupt files yield an empty
    /// store with a warning.
    pub fn load(path: &Path) -> Self {
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read reflection file, starting empty");
                return Self::new();
            }
        };
        match serde_json::from_str(&data) {
            Ok(store) => store,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt reflection file, starting empty");
                Self::new()
            }
        }
    }
}
