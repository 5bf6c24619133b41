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

//! Relation extraction strategies.
//!
//! Two strategies share one output contract: a lexical heuristic that
//! needs no external backend, and a model-assisted strategy that asks a
//! [`TextGenerator`] and parses its line-oriented reply. Extraction is
//! best effort - bad model output or a failed call produces fewer edges,
//! never an error.

use crate::edge::{ConceptEdge, Relation};
use mnemo_core::{jaccard_similarity, TextGenerator};
use regex::Regex;
use tracing::{debug, warn};

/// A candidate node a source text may relate to.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Node key the emitted edge will point at.
    pub id: String,
    /// Text to compare the source against.
    pub text: String,
}

impl Candidate {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// Strategy interface for proposing typed edges from a source text.
pub trait RelationExtractor: Send + Sync {
    /// Propose edges from `source_id` to any of the candidates. Never
    /// fails: strategies degrade to an empty list.
    fn extract(&self, source_id: &str, source_text: &str, candidates: &[Candidate])
        -> Vec<ConceptEdge>;
}

/// Tunables for the lexical strategy.
#[derive(Debug, Clone)]
pub struct HeuristicExtractorConfig {
    /// Jaccard floor for a plain relatedness edge.
    pub relates_threshold: f32,
    /// Jaccard floor when a contradiction marker is present.
    pub contradiction_gate: f32,
    /// Jaccard floor when a dependency marker is present.
    pub dependency_gate: f32,
    /// Jaccard floor when an elaboration marker is present.
    pub elaboration_gate: f32,
    /// Jaccard floor when a summary marker is present.
    pub summary_gate: f32,
}

impl Default for HeuristicExtractorConfig {
    fn default() -> Self {
        Self {
            relates_threshold: 0.30,
            contradiction_gate: 0.15,
            dependency_gate: 0.10,
            elaboration_gate: 0.15,
            summary_gate: 0.10,
        }
    }
}

/// Lexical extraction: Jaccard token overlap plus signal-phrase scans.
///
/// Marker patterns are compiled once at construction, not per call.
#[derive(Debug)]
pub struct HeuristicExtractor {
    config: HeuristicExtractorConfig,
    contradiction_re: Regex,
    dependency_re: Regex,
    elaboration_re: Regex,
    summary_re: Regex,
}

impl Default for HeuristicExtractor {
    fn default() -> Self {
        Self::new(HeuristicExtractorConfig::default())
    }
}

impl HeuristicExtractor {
    pub fn new(config: HeuristicExtractorConfig) -> Self {
        Self {
            config,
            contradiction_re: Regex::new(
                r"\b(contradicts|conflicts with|however|but actually|instead of|no longer true|incorrect|wrong)\b",
            )
            .unwrap(),
            dependency_re: Regex::new(
                r"\b(depends on|requires|relies on|needs|prerequisite|blocked by)\b",
            )
            .unwrap(),
            elaboration_re: Regex::new(
                r"\b(specifically|in more detail|furthermore|in addition|builds on|expands on)\b",
            )
            .unwrap(),
            summary_re: Regex::new(r"\b(in summary|to summarize|in short|overall)\b|tl;dr")
                .unwrap(),
        }
    }
}

impl RelationExtractor for HeuristicExtractor {
    fn extract(
        &self,
        source_id: &str,
        source_text: &str,
        candidates: &[Candidate],
    ) -> Vec<ConceptEdge> {
        let source_lower = source_text.to_lowercase();
        let mut edges = Vec::new();

        for candidate in candidates {
            if candidate.id == source_id {
                continue;
            }

            let similarity = jaccard_similarity(source_text, &candidate.text);

            // A literal mention of the candidate's identifier is a strong
            // signal regardless of overall token overlap.
            if !candidate.id.is_empty() && source_lower.contains(&candidate.id.to_lowercase()) {
                edges.push(
                    ConceptEdge::new(source_id, &candidate.id, Relation::RelatesTo, 0.9)
                        .with_evidence("identifier mentioned directly")
                        .auto(),
                );
            } else if similarity >= self.config.relates_threshold {
                edges.push(
                    ConceptEdge::new(source_id, &candidate.id, Relation::RelatesTo, similarity)
                        .with_evidence(format!("token overlap {similarity:.2}"))
                        .auto(),
                );
            }

            if similarity >= self.config.contradiction_gate
                && self.contradiction_re.is_match(&source_lower)
            {
                edges.push(
                    ConceptEdge::new(source_id, &candidate.id, Relation::Contradicts, 0.7)
                        .with_evidence("contradiction marker with shared vocabulary")
                        .auto(),
                );
            }

            if similarity >= self.config.dependency_gate
                && self.dependency_re.is_match(&source_lower)
            {
                edges.push(
                    ConceptEdge::new(source_id, &candidate.id, Relation::DependsOn, 0.8)
                        .with_evidence("dependency marker with shared vocabulary")
                        .auto(),
                );
            }

            if similarity >= self.config.elaboration_gate
                && self.elaboration_re.is_match(&source_lower)
            {
                edges.push(
                    ConceptEdge::new(source_id, &candidate.id, Relation::Elaborates, 0.6)
                        .with_evidence("elaboration marker with shared vocabulary")
                        .auto(),
                );
            }

            if similarity >= self.config.summary_gate
                && self.summary_re.is_match(&source_lower)
            {
                edges.push(
                    ConceptEdge::new(source_id, &candidate.id, Relation::Summarizes, 0.7)
                        .with_evidence("summary marker with shared vocabulary")
                        .auto(),
                );
            }
        }

        edges
    }
}

/// Model-assisted extraction behind a [`TextGenerator`].
///
/// The generator is asked for one line per related candidate in the form
/// `RELATION: [id] - reason`. Lines that do not parse, or ids that match
/// no candidate, are skipped. Confidence is fixed at 0.8 pending
/// confirmation from later observations.
pub struct ModelExtractor<G: TextGenerator> {
    generator: G,
}

impl<G: TextGenerator> ModelExtractor<G> {
    pub fn new(generator: G) -> Self {
        Self { generator }
    }

    fn build_prompt(source_text: &str, candidates: &[Candidate]) -> String {
        let mut prompt = String::from(
            "Identify which of the numbered items relate to the source text.\n\
             Answer with one line per related item, formatted exactly as:\n\
             RELATION: [id] - reason\n\
             Skip items that are unrelated.\n\n",
        );
        prompt.push_str(&format!("Source:\n{source_text}\n\nItems:\n"));
        for candidate in candidates {
            prompt.push_str(&format!("[{}] {}\n", candidate.id, candidate.text));
        }
        prompt
    }

    fn parse_line(line: &str) -> Option<(String, String)> {
        let rest = line.trim().strip_prefix("RELATION:")?.trim();
        let open = rest.find('[')?;
        let close = rest.find(']')?;
        if close <= open + 1 {
            return None;
        }
        let id = rest[open + 1..close].trim().to_string();
        let reason = rest[close + 1..]
            .trim_start_matches(|c: char| c == '-' || c == ' ')
            .trim()
            .to_string();
        Some((id, reason))
    }
}

impl<G: TextGenerator> RelationExtractor for ModelExtractor<G> {
    fn extract(
        &self,
        source_id: &str,
        source_text: &str,
        candidates: &[Candidate],
    ) -> Vec<ConceptEdge> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let prompt = Self::build_prompt(source_text, candidates);
        let reply = match self.generator.generate(&prompt) {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "relation extraction call failed, emitting no edges");
                return Vec::new();
            }
        };

        let mut edges = Vec::new();
        for line in reply.lines() {
            let Some((id, reason)) = Self::parse_line(line) else {
                continue;
            };
            if !candidates.iter().any(|c| c.id == id) {
                debug!(id, "model proposed unknown candidate id, skipping");
                continue;
            }
            if id == source_id {
                continue;
            }
            edges.push(
                ConceptEdge::new(source_id, id, Relation::RelatesTo, 0.8)
                    .with_evidence(reason)
                    .auto(),
            );
        }
        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_core::CollaboratorError;

    fn candidates() -> Vec<Candidate> {
        vec![
            Candidate::new("e-redis", "redis cache eviction policy configuration"),
            Candidate::new("e-auth", "oauth token refresh flow"),
        ]
    }

    #[test]
    fn heuristic_emits_relates_above_threshold() {
        let extractor = HeuristicExtractor::default();
        let edges = extractor.extract(
            "l-1",
            "redis cache eviction policy tuning",
            &candidates(),
        );

        let relates: Vec<_> = edges
            .iter()
            .filter(|e| e.relation == Relation::RelatesTo)
            .collect();
        assert_eq!(relates.len(), 1);
        assert_eq!(relates[0].target_id, "e-redis");
        assert!(relates[0].confidence >= 0.30);
        assert!(relates[0].auto_extracted);
    }

    #[test]
    fn heuristic_skips_unrelated() {
        let extractor = HeuristicExtractor::default();
        let edges = extractor.extract("l-1", "completely different topic entirely", &candidates());
        assert!(edges.is_empty());
    }

    #[test]
    fn identifier_substring_is_high_confidence() {
        let extractor = HeuristicExtractor::default();
        let edges = extractor.extract("l-1", "we switched e-redis to lru", &candidates());

        let hit = edges
            .iter()
            .find(|e| e.target_id == "e-redis" && e.relation == Relation::RelatesTo)
            .unwrap();
        assert_eq!(hit.confidence, 0.9);
    }

    #[test]
    fn dependency_marker_with_low_overlap() {
        let extractor = HeuristicExtractor::default();
        // Only "redis" and "cache" overlap - under the 0.30 relates
        // threshold but over the 0.10 dependency gate.
        let edges = extractor.extract(
            "l-1",
            "the ingestion worker requires a redis cache to run at all",
            &candidates(),
        );

        assert!(edges
            .iter()
            .any(|e| e.relation == Relation::DependsOn && e.target_id == "e-redis"));
    }

    #[test]
    fn contradiction_marker_emits_contradicts() {
        let extractor = HeuristicExtractor::default();
        let edges = extractor.extract(
            "l-1",
            "however the redis cache eviction policy configuration is wrong",
            &candidates(),
        );

        let hit = edges
            .iter()
            .find(|e| e.relation == Relation::Contradicts)
            .unwrap();
        assert_eq!(hit.target_id, "e-redis");
        assert_eq!(hit.confidence, 0.7);
    }

    struct CannedGenerator(String);

    impl TextGenerator for CannedGenerator {
        fn generate(&self, _prompt: &str) -> Result<String, CollaboratorError> {
            Ok(self.0.clone())
        }
    }

    struct FailingGenerator;

    impl TextGenerator for FailingGenerator {
        fn generate(&self, _prompt: &str) -> Result<String, CollaboratorError> {
            Err(CollaboratorError::new("backend down"))
        }
    }

    #[test]
    fn model_extractor_parses_relation_lines() {
        let reply = "RELATION: [e-redis] - both discuss cache eviction\n\
                     some stray commentary\n\
                     RELATION: [e-auth] - mentions token refresh";
        let extractor = ModelExtractor::new(CannedGenerator(reply.to_string()));
        let edges = extractor.extract("l-1", "cache and tokens", &candidates());

        assert_eq!(edges.len(), 2);
        assert!(edges.iter().all(|e| e.confidence == 0.8));
        assert!(edges.iter().all(|e| e.relation == Relation::RelatesTo));
        assert_eq!(edges[0].evidence, "both discuss cache eviction");
    }

    #[test]
    fn model_extractor_skips_malformed_and_unknown() {
        let reply = "RELATION: e-redis - missing brackets\n\
                     RELATION: [] - empty id\n\
                     RELATION: [e-unknown] - not a candidate\n\
                     RELATION: [e-auth] - valid";
        let extractor = ModelExtractor::new(CannedGenerator(reply.to_string()));
        let edges = extractor.extract("l-1", "text", &candidates());

        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].target_id, "e-auth");
    }

    #[test]
    fn model_extractor_tolerates_backend_failure() {
        let extractor = ModelExtractor::new(FailingGenerator);
        let edges = extractor.extract("l-1", "text", &candidates());
        assert!(edges.is_empty());
    }
}
