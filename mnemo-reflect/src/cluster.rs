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

//! Greedy single-link clustering of learnings by semantic similarity.

use mnemo_core::{jaccard_similarity, Learning, SimilarityScorer};
use std::collections::BTreeMap;
use tracing::debug;

const THEME_STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "was", "were", "has", "have", "had", "not", "use", "must",
    "should", "with", "when", "that", "this", "from", "into", "always", "never", "dont",
];

/// A group of semantically related learnings.
#[derive(Debug, Clone)]
pub struct LearningCluster {
    /// Dominant shared vocabulary of the cluster.
    pub theme: String,
    /// Member learnings.
    pub learnings: Vec<Learning>,
    /// Mean pairwise similarity of the members (1.0 for singletons).
    pub coherence: f32,
}

/// Cluster learnings whose similarity to a cluster seed meets `threshold`.
///
/// The embedding-backed `scorer` is used when supplied; a missing or
/// erroring scorer falls back to lexical Jaccard, so clustering always
/// completes. Clusters smaller than `min_cluster_size` are dropped.
pub fn cluster_learnings(
    learnings: &[Learning],
    scorer: Option<&dyn SimilarityScorer>,
    threshold: f32,
    min_cluster_size: usize,
) -> Vec<LearningCluster> {
    let mut clusters: Vec<Vec<Learning>> = Vec::new();

    for learning in learnings {
        let mut best: Option<(usize, f32)> = None;
        for (index, cluster) in clusters.iter().enumerate() {
            let similarity = similarity(scorer, &learning.fact, &cluster[0].fact);
            if similarity >= threshold
                && best.map_or(true, |(_, best_sim)| similarity > best_sim)
            {
                best = Some((index, similarity));
            }
        }
        match best {
            Some((index, _)) => clusters[index].push(learning.clone()),
            None => clusters.push(vec![learning.clone()]),
        }
    }

    clusters
        .into_iter()
        .filter(|members| members.len() >= min_cluster_size.max(1))
        .map(|members| {
            let coherence = mean_pairwise_similarity(scorer, &members);
            LearningCluster {
                theme: dominant_theme(&members),
                learnings: members,
                coherence,
            }
        })
        .collect()
}

fn similarity(scorer: Option<&dyn SimilarityScorer>, a: &str, b: &str) -> f32 {
    if let Some(scorer) = scorer {
        match scorer.similarity(a, b) {
            Ok(score) => return score.clamp(0.0, 1.0),
            Err(e) => debug!(error = %e, "similarity backend failed, using lexical fallback"),
        }
    }
    jaccard_similarity(a, b)
}

fn mean_pairwise_similarity(scorer: Option<&dyn SimilarityScorer>, members: &[Learning]) -> f32 {
    if members.len() < 2 {
        return 1.0;
    }
    let mut total = 0.0;
    let mut pairs = 0u32;
    for (i, a) in members.iter().enumerate() {
        for b in &members[i + 1..] {
            total += similarity(scorer, &a.fact, &b.fact);
            pairs += 1;
        }
    }
    total / pairs as f32
}

/// Most frequent meaningful tokens across member facts, up to three,
/// frequency then alphabetical.
fn dominant_theme(members: &[Learning]) -> String {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for member in members {
        for token in member
            .fact
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() >= 3 && !THEME_STOPWORDS.contains(t))
        {
            *counts.entry(token.to_string()).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
        .into_iter()
        .take(3)
        .map(|(token, _)| token)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_core::{CollaboratorError, LearningCategory};

    fn learning(fact: &str) -> Learning {
        Learning::new(LearningCategory::Constraint, fact, vec![], 0.8)
    }

    #[test]
    fn similar_learnings_cluster_together() {
        let learnings = vec![
            learning("redis cache eviction must be lru"),
            learning("redis cache eviction needs monitoring"),
            learning("postgres index bloat needs vacuuming"),
        ];

        let clusters = cluster_learnings(&learnings, None, 0.3, 1);

        let redis = clusters
            .iter()
            .find(|c| c.theme.contains("redis"))
            .unwrap();
        assert_eq!(redis.learnings.len(), 2);
        assert!(redis.coherence > 0.0);
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn min_cluster_size_enforced() {
        let learnings = vec![
            learning("redis cache eviction must be lru"),
            learning("redis cache eviction needs monitoring"),
            learning("postgres index bloat needs vacuuming"),
        ];

        let clusters = cluster_learnings(&learnings, None, 0.3, 2);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].learnings.len(), 2);
    }

    #[test]
    fn empty_input_yields_no_clusters() {
        assert!(cluster_learnings(&[], None, 0.7, 1).is_empty());
    }

    #[test]
    fn singleton_cluster_has_full_coherence() {
        let clusters = cluster_learnings(&[learning("one lonely fact")], None, 0.7, 1);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].coherence, 1.0);
    }

    struct AllSimilar;

    impl SimilarityScorer for AllSimilar {
        fn similarity(&self, _a: &str, _b: &str) -> Result<f32, CollaboratorError> {
            Ok(0.95)
        }
    }

    struct BrokenScorer;

    impl SimilarityScorer for BrokenScorer {
        fn similarity(&self, _a: &str, _b: &str) -> Result<f32, CollaboratorError> {
            Err(CollaboratorError::new("embedding service down"))
        }
    }

    #[test]
    fn scorer_overrides_lexical_similarity() {
        let learnings = vec![learning("completely different"), learning("nothing shared")];
        let clusters = cluster_learnings(&learnings, Some(&AllSimilar), 0.7, 1);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].learnings.len(), 2);
    }

    #[test]
    fn broken_scorer_falls_back_to_lexical() {
        let learnings = vec![
            learning("redis cache eviction must be lru"),
            learning("redis cache eviction needs monitoring"),
        ];
        let clusters = cluster_learnings(&learnings, Some(&BrokenScorer), 0.3, 1);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].learnings.len(), 2);
    }
}
