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

//! Typed directed edges between memory graph nodes.
//!
//! Node keys are opaque strings (turn/learning/entity id hex), so edges
//! can connect any two stores without the edge type caring which.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Relation carried by a [`ConceptEdge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// A learning mentions an entity.
    Mentions,
    /// Two entities appeared in the same learning. The only symmetric
    /// relation: both directions are always materialized with equal weight.
    CoOccurs,
    /// One entity is an alias of another.
    AliasOf,
    /// Generic semantic relatedness.
    RelatesTo,
    /// Source expands on the target.
    Elaborates,
    /// Source condenses the target.
    Summarizes,
    /// Source conflicts with the target.
    Contradicts,
    /// Source provides evidence for the target.
    Supports,
    /// Source cannot hold without the target.
    DependsOn,
    /// Source replaces the target.
    Supersedes,
}

impl Relation {
    /// Stable wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Mentions => "mentions",
            Relation::CoOccurs => "co_occurs",
            Relation::AliasOf => "alias_of",
            Relation::RelatesTo => "relates_to",
            Relation::Elaborates => "elaborates",
            Relation::Summarizes => "summarizes",
            Relation::Contradicts => "contradicts",
            Relation::Supports => "supports",
            Relation::DependsOn => "depends_on",
            Relation::Supersedes => "supersedes",
        }
    }

    /// Whether inserting A->B must also materialize B->A.
    pub fn is_symmetric(&self) -> bool {
        matches!(self, Relation::CoOccurs)
    }
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed typed edge between two graph node keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptEdge {
    /// Source node key.
    pub source_id: String,
    /// Target node key.
    pub target_id: String,
    /// Relation type.
    pub relation: Relation,
    /// Confidence in this relation (0-1).
    pub confidence: f32,
    /// Free-text justification; for co-occurrence, the observation count.
    pub evidence: String,
    /// Whether this edge came from automatic extraction rather than an
    /// explicit caller statement.
    pub auto_extracted: bool,
    /// When the edge was recorded or last strengthened.
    pub timestamp: DateTime<Utc>,
}

impl ConceptEdge {
    /// Create an edge.
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        relation: Relation,
        confidence: f32,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            relation,
            confidence: confidence.clamp(0.0, 1.0),
            evidence: String::new(),
            auto_extracted: false,
            timestamp: Utc::now(),
        }
    }

    /// Attach evidence text.
    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = evidence.into();
        self
    }

    /// Mark as automatically extracted.
    pub fn auto(mut self) -> Self {
        self.auto_extracted = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_cooccurrence_is_symmetric() {
        for relation in [
            Relation::Mentions,
            Relation::AliasOf,
            Relation::RelatesTo,
            Relation::Elaborates,
            Relation::Summarizes,
            Relation::Contradicts,
            Relation::Supports,
            Relation::DependsOn,
            Relation::Supersedes,
        ] {
            assert!(!relation.is_symmetric(), "{relation} should be directed");
        }
        assert!(Relation::CoOccurs.is_symmetric());
    }

    #[test]
    fn confidence_clamped() {
        let edge = ConceptEdge::new("a", "b", Relation::RelatesTo, 1.5);
        assert_eq!(edge.confidence, 1.0);
    }
}
