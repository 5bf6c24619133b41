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

//! Entity graph construction with idempotent upsert semantics.
//!
//! Processing one learning with N entities yields N mention edges and
//! C(N,2) symmetric co-occurrence pairs - topical density emerges from
//! ingestion alone, without manual graph construction.

use crate::edge::{ConceptEdge, Relation};
use crate::entity::EntityNode;
use crate::store::TopologyStore;
use mnemo_core::{EntityId, LearningId};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Builds and owns the entity layer of the knowledge graph.
///
/// All methods take `&self`; the entity map and the topology store carry
/// their own locks, so concurrent ingestion paths can reinforce the graph
/// without external synchronization.
#[derive(Debug, Default)]
pub struct EntityGraphBuilder {
    entities: RwLock<HashMap<EntityId, EntityNode>>,
    topology: TopologyStore,
}

impl EntityGraphBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// The underlying topology store.
    pub fn topology(&self) -> &TopologyStore {
        &self.topology
    }

    /// Upsert an entity observed in a learning.
    ///
    /// An existing node is merged: mention count incremented, aliases and
    /// related learnings unioned. Nothing ever decreases and nodes are
    /// never deleted here.
    pub fn add_entity(&self, entity: EntityNode, learning_id: LearningId) -> EntityId {
        let id = entity.id;
        let mut entities = self.entities.write();
        match entities.get_mut(&id) {
            Some(existing) => {
                existing.mention_count += 1;
                existing.aliases.extend(entity.aliases);
                existing.related_learnings.insert(learning_id);
            }
            None => {
                let mut fresh = entity;
                fresh.related_learnings.insert(learning_id);
                entities.insert(id, fresh);
            }
        }
        id
    }

    /// Record that a learning mentions an entity.
    pub fn add_mention_edge(&self, learning_id: LearningId, entity_id: EntityId) -> bool {
        self.topology.add_edge(
            ConceptEdge::new(learning_id.to_hex(), entity_id.to_hex(), Relation::Mentions, 1.0)
                .with_evidence("entity extracted from learning")
                .auto(),
        )
    }

    /// Record a co-occurrence observation between two entities. Symmetric
    /// and additive; returns the accumulated pair weight.
    pub fn add_cooccurrence_edge(&self, a: EntityId, b: EntityId, weight: f32) -> f32 {
        self.topology.add_cooccurrence(&a.to_hex(), &b.to_hex(), weight)
    }

    /// Record that `alias` names the same thing as `canonical`, both as an
    /// edge and on the canonical node's alias set.
    pub fn add_alias_edge(&self, alias: &str, canonical_id: EntityId) -> bool {
        {
            let mut entities = self.entities.write();
            if let Some(node) = entities.get_mut(&canonical_id) {
                node.aliases.insert(alias.to_string());
            }
        }
        self.topology.add_edge(
            ConceptEdge::new(alias, canonical_id.to_hex(), Relation::AliasOf, 1.0)
                .with_evidence("alias observed")
                .auto(),
        )
    }

    /// Ingest one learning's extracted entities: every entity is
    /// upserted, gets a mention edge, and co-occurs with every other
    /// entity of the same learning.
    pub fn process_learning(&self, learning_id: LearningId, entities: Vec<EntityNode>) {
        let ids: Vec<EntityId> = entities
            .into_iter()
            .map(|e| self.add_entity(e, learning_id))
            .collect();

        for &id in &ids {
            self.add_mention_edge(learning_id, id);
        }

        for (i, &a) in ids.iter().enumerate() {
            for &b in &ids[i + 1..] {
                if a != b {
                    self.add_cooccurrence_edge(a, b, 1.0);
                }
            }
        }
    }

    /// Entities co-occurring with `entity_id` at or above `min_weight`,
    /// strongest first.
    pub fn get_cooccurring_entities(
        &self,
        entity_id: EntityId,
        min_weight: f32,
        limit: usize,
    ) -> Vec<(EntityNode, f32)> {
        let neighbors = self.topology.cooccurring(&entity_id.to_hex(), min_weight, limit);

        let entities = self.entities.read();
        neighbors
            .into_iter()
            .filter_map(|(key, weight)| {
                let id = EntityId::from_hex(&key).ok()?;
                entities.get(&id).map(|node| (node.clone(), weight))
            })
            .collect()
    }

    /// Entities mentioned by a learning. Pure read over the edge index.
    pub fn get_entities_by_learning(&self, learning_id: LearningId) -> Vec<EntityNode> {
        let targets = self.topology.targets_of(&learning_id.to_hex(), Relation::Mentions);

        let entities = self.entities.read();
        targets
            .into_iter()
            .filter_map(|key| {
                let id = EntityId::from_hex(&key).ok()?;
                entities.get(&id).cloned()
            })
            .collect()
    }

    /// Look up an entity node.
    pub fn get_entity(&self, id: EntityId) -> Option<EntityNode> {
        self.entities.read().get(&id).cloned()
    }

    /// Number of distinct entities.
    pub fn entity_count(&self) -> usize {
        self.entities.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityKind;
    use mnemo_core::{Learning, LearningCategory};

    fn learning_id(fact: &str) -> LearningId {
        Learning::new(LearningCategory::Fact, fact, vec![], 0.8).id()
    }

    #[test]
    fn entity_merge_is_monotonic() {
        let builder = EntityGraphBuilder::new();
        let l1 = learning_id("uses redis");
        let l2 = learning_id("redis eviction is lru");

        let id = builder.add_entity(EntityNode::new(EntityKind::Tech, "redis"), l1);
        builder.add_entity(EntityNode::new(EntityKind::Tech, "redis"), l2);
        builder.add_entity(EntityNode::new(EntityKind::Tech, "redis"), l1);

        let node = builder.get_entity(id).unwrap();
        assert_eq!(node.mention_count, 3);
        assert!(node.related_learnings.contains(&l1));
        assert!(node.related_learnings.contains(&l2));
        assert_eq!(builder.entity_count(), 1);
    }

    #[test]
    fn process_learning_density() {
        let builder = EntityGraphBuilder::new();
        let lid = learning_id("redis caches oauth sessions in memory");

        let e1 = EntityNode::new(EntityKind::Tech, "redis");
        let e2 = EntityNode::new(EntityKind::Concept, "oauth");
        let e3 = EntityNode::new(EntityKind::Concept, "session");
        let (id1, id2, id3) = (e1.id, e2.id, e3.id);

        builder.process_learning(lid, vec![e1, e2, e3]);

        // Exactly 3 mention edges.
        let mentions = builder
            .topology()
            .edges_from(&lid.to_hex(), Some(Relation::Mentions));
        assert_eq!(mentions.len(), 3);

        // Exactly 3 co-occurrence pairs, each with identical nonzero weight.
        for (a, b) in [(id1, id2), (id1, id3), (id2, id3)] {
            let from_a = builder.get_cooccurring_entities(a, 0.0, 10);
            let hit = from_a.iter().find(|(node, _)| node.id == b).unwrap();
            assert_eq!(hit.1, 1.0);

            let from_b = builder.get_cooccurring_entities(b, 0.0, 10);
            let reverse = from_b.iter().find(|(node, _)| node.id == a).unwrap();
            assert_eq!(reverse.1, 1.0);
        }
        assert_eq!(builder.topology().stats().cooccurring_pairs, 3);
    }

    #[test]
    fn cooccurrence_weight_equal_in_both_directions() {
        let builder = EntityGraphBuilder::new();
        let a = EntityNode::new(EntityKind::Tech, "tokio");
        let b = EntityNode::new(EntityKind::Tech, "hyper");
        let (ida, idb) = (a.id, b.id);
        builder.add_entity(a, learning_id("x"));
        builder.add_entity(b, learning_id("x"));

        builder.add_cooccurrence_edge(ida, idb, 2.0);
        builder.add_cooccurrence_edge(idb, ida, 1.0);

        let from_a = builder.get_cooccurring_entities(ida, 0.0, 10);
        let from_b = builder.get_cooccurring_entities(idb, 0.0, 10);
        assert_eq!(from_a[0].1, 3.0);
        assert_eq!(from_b[0].1, 3.0);
    }

    #[test]
    fn entities_by_learning_reads_edge_index() {
        let builder = EntityGraphBuilder::new();
        let lid = learning_id("serde and chrono");
        builder.process_learning(
            lid,
            vec![
                EntityNode::new(EntityKind::Tech, "serde"),
                EntityNode::new(EntityKind::Tech, "chrono"),
            ],
        );

        let mut names: Vec<String> = builder
            .get_entities_by_learning(lid)
            .into_iter()
            .map(|e| e.canonical_name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["chrono".to_string(), "serde".to_string()]);
    }

    #[test]
    fn alias_edge_updates_canonical_node() {
        let builder = EntityGraphBuilder::new();
        let lid = learning_id("postgres");
        let id = builder.add_entity(EntityNode::new(EntityKind::Tech, "postgresql"), lid);

        builder.add_alias_edge("postgres", id);

        let node = builder.get_entity(id).unwrap();
        assert!(node.aliases.contains("postgres"));
        let edges = builder.topology().edges_to(&id.to_hex(), Some(Relation::AliasOf));
        assert_eq!(edges.len(), 1);
    }

    #[test]
    fn min_weight_floor_in_cooccurring_query() {
        let builder = EntityGraphBuilder::new();
        let lid = learning_id("y");
        let a = builder.add_entity(EntityNode::new(EntityKind::Tech, "a"), lid);
        let b = builder.add_entity(EntityNode::new(EntityKind::Tech, "b"), lid);
        let c = builder.add_entity(EntityNode::new(EntityKind::Tech, "c"), lid);

        builder.add_cooccurrence_edge(a, b, 1.0);
        builder.add_cooccurrence_edge(a, c, 1.0);
        builder.add_cooccurrence_edge(a, c, 1.0);

        let strong = builder.get_cooccurring_entities(a, 2.0, 10);
        assert_eq!(strong.len(), 1);
        assert_eq!(strong[0].0.id, c);
    }
}
