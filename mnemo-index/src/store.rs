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

//! Topology store: adjacency indexes over typed concept edges.
//!
//! All state lives behind one `RwLock`. Write sections are kept to the
//! index update itself; query methods clone the matching edges under the
//! read guard and release it before any formatting or scoring happens.

use crate::edge::{ConceptEdge, Relation};
use mnemo_core::MemoryResult;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

/// Accumulated co-occurrence strength for one neighbor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct CoStat {
    weight: f32,
    observations: u32,
    confidence: f32,
}

#[derive(Debug, Default)]
struct Adjacency {
    /// source -> edges out of it
    outgoing: BTreeMap<String, Vec<ConceptEdge>>,
    /// target -> edges into it
    incoming: BTreeMap<String, Vec<ConceptEdge>>,
    /// node -> neighbor -> accumulated co-occurrence (stored in both
    /// directions, always equal)
    cooccurrence: BTreeMap<String, BTreeMap<String, CoStat>>,
}

impl Adjacency {
    fn insert_edge(&mut self, edge: ConceptEdge) {
        self.incoming
            .entry(edge.target_id.clone())
            .or_default()
            .push(edge.clone());
        self.outgoing.entry(edge.source_id.clone()).or_default().push(edge);
    }

    fn has_edge(&self, source: &str, target: &str, relation: Relation) -> bool {
        self.outgoing
            .get(source)
            .map(|edges| {
                edges
                    .iter()
                    .any(|e| e.target_id == target && e.relation == relation)
            })
            .unwrap_or(false)
    }

    fn update_cooccurrence_edge(&mut self, source: &str, target: &str, stat: CoStat) {
        let evidence = format!("co-occurred {} times", stat.observations);
        if let Some(edges) = self.outgoing.get_mut(source) {
            if let Some(edge) = edges
                .iter_mut()
                .find(|e| e.target_id == target && e.relation == Relation::CoOccurs)
            {
                edge.confidence = stat.confidence;
                edge.evidence = evidence.clone();
            }
        }
        if let Some(edges) = self.incoming.get_mut(target) {
            if let Some(edge) = edges
                .iter_mut()
                .find(|e| e.source_id == source && e.relation == Relation::CoOccurs)
            {
                edge.confidence = stat.confidence;
                edge.evidence = evidence;
            }
        }
    }
}

/// Store statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyStats {
    /// Nodes with at least one edge.
    pub nodes: usize,
    /// Total directed edges (symmetric pairs count twice).
    pub edges: usize,
    /// Unordered co-occurring pairs.
    pub cooccurring_pairs: usize,
}

/// Thread-safe store of typed edges between memory graph nodes.
#[derive(Debug, Default)]
pub struct TopologyStore {
    inner: RwLock<Adjacency>,
}

impl TopologyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directed edge. Duplicate (source, target, relation) triples
    /// are dropped, returning `false`. Co-occurrence edges are routed
    /// through [`TopologyStore::add_cooccurrence`] so symmetry and
    /// strengthening hold no matter which entry point the caller used.
    pub fn add_edge(&self, edge: ConceptEdge) -> bool {
        if edge.relation == Relation::CoOccurs {
            self.add_cooccurrence(&edge.source_id, &edge.target_id, 1.0);
            return true;
        }

        let mut inner = self.inner.write();
        if inner.has_edge(&edge.source_id, &edge.target_id, edge.relation) {
            return false;
        }
        inner.insert_edge(edge);
        true
    }

    /// Observe a co-occurrence between two nodes, adding `weight` to the
    /// accumulated strength of the pair. Both directions are materialized
    /// with equal weight; repeated observations strengthen the edge
    /// (confidence approaches 1.0) instead of duplicating it. Returns the
    /// new accumulated weight.
    pub fn add_cooccurrence(&self, a: &str, b: &str, weight: f32) -> f32 {
        let mut inner = self.inner.write();

        let stat = {
            let entry = inner
                .cooccurrence
                .entry(a.to_string())
                .or_default()
                .entry(b.to_string())
                .or_insert(CoStat {
                    weight: 0.0,
                    observations: 0,
                    confidence: 0.0,
                });
            entry.weight += weight;
            entry.observations += 1;
            entry.confidence = if entry.observations == 1 {
                0.5
            } else {
                entry.confidence + (1.0 - entry.confidence) * 0.1
            };
            *entry
        };
        inner
            .cooccurrence
            .entry(b.to_string())
            .or_default()
            .insert(a.to_string(), stat);

        if stat.observations == 1 {
            let evidence = format!("co-occurred {} times", stat.observations);
            let forward = ConceptEdge::new(a, b, Relation::CoOccurs, stat.confidence)
                .with_evidence(evidence.clone())
                .auto();
            let backward = ConceptEdge::new(b, a, Relation::CoOccurs, stat.confidence)
                .with_evidence(evidence)
                .auto();
            inner.insert_edge(forward);
            inner.insert_edge(backward);
        } else {
            inner.update_cooccurrence_edge(a, b, stat);
            inner.update_cooccurrence_edge(b, a, stat);
        }

        stat.weight
    }

    /// Neighbors co-occurring with `id` at or above `min_weight`,
    /// descending by weight, ties by key.
    pub fn cooccurring(&self, id: &str, min_weight: f32, limit: usize) -> Vec<(String, f32)> {
        let snapshot: Vec<(String, f32)> = {
            let inner = self.inner.read();
            inner
                .cooccurrence
                .get(id)
                .map(|neighbors| {
                    neighbors
                        .iter()
                        .filter(|(_, stat)| stat.weight >= min_weight)
                        .map(|(key, stat)| (key.clone(), stat.weight))
                        .collect()
                })
                .unwrap_or_default()
        };

        let mut result = snapshot;
        result.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        result.truncate(limit);
        result
    }

    /// Edges out of a node, optionally filtered by relation.
    pub fn edges_from(&self, id: &str, relation: Option<Relation>) -> Vec<ConceptEdge> {
        let inner = self.inner.read();
        inner
            .outgoing
            .get(id)
            .map(|edges| {
                edges
                    .iter()
                    .filter(|e| relation.map_or(true, |r| e.relation == r))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Edges into a node, optionally filtered by relation.
    pub fn edges_to(&self, id: &str, relation: Option<Relation>) -> Vec<ConceptEdge> {
        let inner = self.inner.read();
        inner
            .incoming
            .get(id)
            .map(|edges| {
                edges
                    .iter()
                    .filter(|e| relation.map_or(true, |r| e.relation == r))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Distinct node keys reachable from `id` via the given relation.
    pub fn targets_of(&self, id: &str, relation: Relation) -> Vec<String> {
        let mut targets: Vec<String> = self
            .edges_from(id, Some(relation))
            .into_iter()
            .map(|e| e.target_id)
            .collect();
        targets.sort();
        targets.dedup();
        targets
    }

    /// Store statistics.
    pub fn stats(&self) -> TopologyStats {
        let inner = self.inner.read();
        let mut nodes: std::collections::BTreeSet<&str> = std::collections::BTreeSet::new();
        let mut edges = 0;
        for (source, list) in &inner.outgoing {
            nodes.insert(source);
            edges += list.len();
            for edge in list {
                nodes.insert(&edge.target_id);
            }
        }
        let pair_entries: usize = inner.cooccurrence.values().map(|n| n.len()).sum();
        TopologyStats {
            nodes: nodes.len(),
            edges,
            cooccurring_pairs: pair_entries / 2,
        }
    }

    /// Remove everything.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.outgoing.clear();
        inner.incoming.clear();
        inner.cooccurrence.clear();
    }

    // === Persistence ===

    /// Save to a JSON file. Only outgoing edges and the pair weights are
    /// written; the incoming index is rebuilt on load so index and data
    /// cannot diverge.
    pub fn save(&self, path: &Path) -> MemoryResult<()> {
        let doc = {
            let inner = self.inner.read();
            let edges: Vec<ConceptEdge> =
                inner.outgoing.values().flat_map(|v| v.iter().cloned()).collect();
            let mut pairs = Vec::new();
            for (a, neighbors) in &inner.cooccurrence {
                for (b, stat) in neighbors {
                    if a < b {
                        pairs.push(SavedPair {
                            a: a.clone(),
                            b: b.clone(),
                            weight: stat.weight,
                            observations: stat.observations,
                            confidence: stat.confidence,
                        });
                    }
                }
            }
            SavedTopology { edges, pairs }
        };

        let json = serde_json::to_string_pretty(&doc)?;
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
                warn!(path = %path.display(), error = %e, "failed to read topology file, starting empty");
                return Self::new();
            }
        };

        let doc: SavedTopology = match serde_json::from_str(&data) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt topology file, starting empty");
                return Self::new();
            }
        };

        let store = Self::new();
        {
            let mut inner = store.inner.write();
            for edge in doc.edges {
                inner.insert_edge(edge);
            }
            for pair in doc.pairs {
                let stat = CoStat {
                    weight: pair.weight,
                    observations: pair.observations,
                    confidence: pair.confidence,
                };
                inner
                    .cooccurrence
                    .entry(pair.a.clone())
                    .or_default()
                    .insert(pair.b.clone(), stat);
                inner.cooccurrence.entry(pair.b).or_default().insert(pair.a, stat);
            }
        }
        store
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SavedPair {
    a: String,
    b: String,
    weight: f32,
    observations: u32,
    confidence: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct SavedTopology {
    edges: Vec<ConceptEdge>,
    pairs: Vec<SavedPair>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn cooccurrence_is_symmetric() {
        let store = TopologyStore::new();
        store.add_cooccurrence("redis", "cache", 1.0);

        let from_a = store.cooccurring("redis", 0.0, 10);
        let from_b = store.cooccurring("cache", 0.0, 10);

        assert_eq!(from_a, vec![("cache".to_string(), 1.0)]);
        assert_eq!(from_b, vec![("redis".to_string(), 1.0)]);
    }

    #[test]
    fn repeated_cooccurrence_strengthens_not_duplicates() {
        let store = TopologyStore::new();
        store.add_cooccurrence("redis", "cache", 1.0);
        store.add_cooccurrence("redis", "cache", 1.0);
        store.add_cooccurrence("cache", "redis", 1.0);

        let edges = store.edges_from("redis", Some(Relation::CoOccurs));
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].evidence, "co-occurred 3 times");
        assert!(edges[0].confidence > 0.5);
        assert!(edges[0].confidence < 1.0);

        let weights = store.cooccurring("redis", 0.0, 10);
        assert_eq!(weights, vec![("cache".to_string(), 3.0)]);
    }

    #[test]
    fn confidence_approaches_one() {
        let store = TopologyStore::new();
        let mut last = 0.0f32;
        for _ in 0..50 {
            store.add_cooccurrence("a", "b", 1.0);
            let edge = &store.edges_from("a", Some(Relation::CoOccurs))[0];
            assert!(edge.confidence >= last);
            assert!(edge.confidence <= 1.0);
            last = edge.confidence;
        }
        assert!(last > 0.9);
    }

    #[test]
    fn directed_edges_deduplicate() {
        let store = TopologyStore::new();
        let edge = ConceptEdge::new("l1", "e1", Relation::Mentions, 1.0);
        assert!(store.add_edge(edge.clone()));
        assert!(!store.add_edge(edge));
        assert_eq!(store.edges_from("l1", None).len(), 1);
    }

    #[test]
    fn min_weight_floor_filters() {
        let store = TopologyStore::new();
        store.add_cooccurrence("a", "weak", 1.0);
        store.add_cooccurrence("a", "strong", 1.0);
        store.add_cooccurrence("a", "strong", 1.0);

        let strong = store.cooccurring("a", 2.0, 10);
        assert_eq!(strong, vec![("strong".to_string(), 2.0)]);
    }

    #[test]
    fn edges_to_mirrors_edges_from() {
        let store = TopologyStore::new();
        store.add_edge(ConceptEdge::new("l1", "e1", Relation::Mentions, 1.0));
        assert_eq!(store.edges_to("e1", Some(Relation::Mentions)).len(), 1);
        assert!(store.edges_to("l1", None).is_empty());
    }

    #[test]
    fn persistence_roundtrip() {
        let store = TopologyStore::new();
        store.add_edge(ConceptEdge::new("l1", "e1", Relation::Mentions, 1.0));
        store.add_cooccurrence("e1", "e2", 1.0);
        store.add_cooccurrence("e1", "e2", 1.0);

        let dir = tempdir().unwrap();
        let path = dir.path().join("topology.json");
        store.save(&path).unwrap();
        let loaded = TopologyStore::load(&path);

        assert_eq!(loaded.stats(), store.stats());
        assert_eq!(
            loaded.cooccurring("e1", 0.0, 10),
            store.cooccurring("e1", 0.0, 10)
        );
        assert_eq!(loaded.edges_to("e1", Some(Relation::Mentions)).len(), 1);
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "not json").unwrap();
        let store = TopologyStore::load(&path);
        assert_eq!(store.stats().edges, 0);
    }
}
