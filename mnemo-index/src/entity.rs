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

//! Entity nodes tracked across learnings.

use mnemo_core::{EntityId, LearningId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Kind of tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A technology, library, or tool.
    Tech,
    /// A file or path in the workspace.
    File,
    /// A person.
    Person,
    /// An abstract concept.
    Concept,
}

impl EntityKind {
    /// Stable wire name, also the hash-canonical form.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Tech => "tech",
            EntityKind::File => "file",
            EntityKind::Person => "person",
            EntityKind::Concept => "concept",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named entity in the knowledge graph.
///
/// Lifecycle is strictly monotonic: created on first extraction, then
/// reinforced on every subsequent mention. `mention_count` never
/// decreases, `related_learnings` never shrinks, and nodes are never
/// deleted by this component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityNode {
    /// Content-derived id over `kind:lowercase(canonical_name)`.
    pub id: EntityId,
    /// Kind of entity.
    pub kind: EntityKind,
    /// Canonical display name.
    pub canonical_name: String,
    /// Alternative names observed for this entity.
    #[serde(default)]
    pub aliases: BTreeSet<String>,
    /// How many times this entity has been mentioned.
    pub mention_count: u32,
    /// Learnings this entity appears in.
    #[serde(default)]
    pub related_learnings: BTreeSet<LearningId>,
}

impl EntityNode {
    /// Create a fresh node for its first mention.
    pub fn new(kind: EntityKind, canonical_name: impl Into<String>) -> Self {
        let canonical_name = canonical_name.into();
        Self {
            id: Self::derive_id(kind, &canonical_name),
            kind,
            canonical_name,
            aliases: BTreeSet::new(),
            mention_count: 1,
            related_learnings: BTreeSet::new(),
        }
    }

    /// Deterministic id for a (kind, name) pair. Case-insensitive on the
    /// name so "Redis" and "redis" resolve to one node.
    pub fn derive_id(kind: EntityKind, canonical_name: &str) -> EntityId {
        let canonical = format!("{}:{}", kind.as_str(), canonical_name.to_lowercase());
        EntityId::from_content(canonical.as_bytes())
    }

    /// Add an alias.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.insert(alias.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_case_insensitive_on_name() {
        let a = EntityNode::new(EntityKind::Tech, "Redis");
        let b = EntityNode::new(EntityKind::Tech, "redis");
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn id_varies_with_kind() {
        let tech = EntityNode::new(EntityKind::Tech, "parser");
        let concept = EntityNode::new(EntityKind::Concept, "parser");
        assert_ne!(tech.id, concept.id);
    }

    #[test]
    fn fresh_node_counts_first_mention() {
        let node = EntityNode::new(EntityKind::Person, "Ada");
        assert_eq!(node.mention_count, 1);
        assert!(node.related_learnings.is_empty());
    }
}
