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

//! Reflection and mental-model synthesis.

use crate::cluster::{cluster_learnings, LearningCluster};
use mnemo_core::{
    estimate_tokens, Learning, LearningCategory, LearningId, MemoryId, SimilarityScorer,
    TextGenerator,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

/// Why a cluster of related learnings exists. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reflection {
    /// Deterministic id derived from the theme.
    pub id: MemoryId,
    /// Shared theme of the cluster.
    pub theme: String,
    /// The underlying cause the cluster points at.
    pub causality: String,
    /// One-line synthesis.
    pub summary: String,
    /// Learnings this reflection was drawn from.
    pub source_learnings: Vec<LearningId>,
    /// Confidence, taken from the cluster's coherence.
    pub confidence: f32,
}

impl Reflection {
    /// Deterministic id so re-reflecting the same theme converges on the
    /// same record.
    pub fn derive_id(theme: &str) -> MemoryId {
        MemoryId::from_content(format!("reflection:{}", theme.to_lowercase()).as_bytes())
    }
}

/// A coherent, deduplicated synthesis of many learnings on one topic.
/// Never mutated in place: updates produce a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MentalModel {
    pub topic: String,
    pub principles: BTreeSet<String>,
    pub patterns: BTreeSet<String>,
    pub anti_patterns: BTreeSet<String>,
    /// Arithmetic mean of source-learning confidences.
    pub confidence: f32,
    /// How many learnings fed this model.
    pub source_learning_count: usize,
}

impl MentalModel {
    /// Render for injection into a planning prompt.
    pub fn to_prompt(&self) -> String {
        let mut out = format!("## Mental Model: {}\n", self.topic);
        let section = |title: &str, items: &BTreeSet<String>| -> String {
            if items.is_empty() {
                return String::new();
            }
            let mut s = format!("\n{title}:\n");
            for item in items {
                s.push_str(&format!("- {item}\n"));
            }
            s
        };
        out.push_str(&section("Core Principles", &self.principles));
        out.push_str(&section("Key Patterns", &self.patterns));
        out.push_str(&section("Anti-Patterns", &self.anti_patterns));
        out
    }
}

/// Parsed output of a causality analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct CausalityAnalysis {
    pub theme: String,
    pub causality: String,
    pub summary: String,
}

/// Model-assisted explanation of why a cluster's constraints exist, with
/// a heuristic fallback when the collaborator is absent or unparseable.
pub struct CausalityAnalyzer {
    generator: Option<Box<dyn TextGenerator>>,
}

impl CausalityAnalyzer {
    /// Heuristic-only analyzer.
    pub fn heuristic() -> Self {
        Self { generator: None }
    }

    /// Model-assisted analyzer.
    pub fn with_generator(generator: Box<dyn TextGenerator>) -> Self {
        Self {
            generator: Some(generator),
        }
    }

    /// Analyze one cluster. Never fails: discarded model output degrades
    /// to the heuristic result.
    pub fn analyze(&self, cluster: &LearningCluster) -> CausalityAnalysis {
        if let Some(generator) = &self.generator {
            let prompt = Self::build_prompt(cluster);
            match generator.generate(&prompt) {
                Ok(reply) => {
                    if let Some(parsed) = Self::parse_reply(&reply) {
                        return parsed;
                    }
                    warn!(theme = %cluster.theme, "unparseable causality reply, using heuristic");
                }
                Err(e) => {
                    warn!(theme = %cluster.theme, error = %e, "causality call failed, using heuristic");
                }
            }
        }
        Self::heuristic_analysis(cluster)
    }

    fn build_prompt(cluster: &LearningCluster) -> String {
        let mut prompt = String::from(
            "These related constraints were learned over time. Explain why \
             they exist as a group.\n\nConstraints:\n",
        );
        for learning in &cluster.learnings {
            prompt.push_str(&format!("- {}\n", learning.fact));
        }
        prompt.push_str(
            "\nAnswer with exactly three lines:\n\
             THEME: <short topic name>\n\
             CAUSALITY: <the underlying reason these constraints exist>\n\
             SUMMARY: <one sentence takeaway>\n",
        );
        prompt
    }

    fn parse_reply(reply: &str) -> Option<CausalityAnalysis> {
        let mut theme = None;
        let mut causality = None;
        let mut summary = None;
        for line in reply.lines() {
            let line = line.trim();
            if let Some(rest) = line.strip_prefix("THEME:") {
                theme = Some(rest.trim().to_string());
            } else if let Some(rest) = line.strip_prefix("CAUSALITY:") {
                causality = Some(rest.trim().to_string());
            } else if let Some(rest) = line.strip_prefix("SUMMARY:") {
                summary = Some(rest.trim().to_string());
            }
        }
        match (theme, causality, summary) {
            (Some(theme), Some(causality), Some(summary))
                if !theme.is_empty() && !causality.is_empty() =>
            {
                Some(CausalityAnalysis {
                    theme,
                    causality,
                    summary,
                })
            }
            _ => None,
        }
    }

    fn heuristic_analysis(cluster: &LearningCluster) -> CausalityAnalysis {
        let first = cluster
            .learnings
            .first()
            .map(|l| l.fact.clone())
            .unwrap_or_default();
        CausalityAnalysis {
            theme: cluster.theme.clone(),
            causality: format!(
                "{} related constraints share the vocabulary \"{}\"",
                cluster.learnings.len(),
                cluster.theme
            ),
            summary: first,
        }
    }
}

/// Reflector tuning.
#[derive(Debug, Clone)]
pub struct ReflectorConfig {
    /// Similarity floor for clustering.
    pub similarity_threshold: f32,
}

impl Default for ReflectorConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.7,
        }
    }
}

/// Estimated token cost comparison between a mental model and the
/// learnings it replaces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenSavings {
    pub individual_tokens: usize,
    pub model_tokens: usize,
    pub saved_tokens: usize,
    pub saved_percent: f32,
}

/// Batch synthesizer of learnings into reflections and mental models.
pub struct Reflector {
    config: ReflectorConfig,
    analyzer: CausalityAnalyzer,
    scorer: Option<Box<dyn SimilarityScorer>>,
}

impl Reflector {
    /// Fully heuristic reflector.
    pub fn new(config: ReflectorConfig) -> Self {
        Self {
            config,
            analyzer: CausalityAnalyzer::heuristic(),
            scorer: None,
        }
    }

    /// Attach a causality analyzer.
    pub fn with_analyzer(mut self, analyzer: CausalityAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Attach an embedding-backed similarity scorer for clustering.
    pub fn with_scorer(mut self, scorer: Box<dyn SimilarityScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// Cluster related learnings and emit one immutable reflection per
    /// cluster meeting the size floor.
    pub fn reflect_on_constraints(
        &self,
        learnings: &[Learning],
        min_cluster_size: usize,
    ) -> Vec<Reflection> {
        let clusters = cluster_learnings(
            learnings,
            self.scorer.as_deref(),
            self.config.similarity_threshold,
            min_cluster_size,
        );

        clusters
            .iter()
            .map(|cluster| {
                let analysis = self.analyzer.analyze(cluster);
                Reflection {
                    id: Reflection::derive_id(&analysis.theme),
                    theme: analysis.theme,
                    causality: analysis.causality,
                    summary: analysis.summary,
                    source_learnings: cluster.learnings.iter().map(|l| l.id()).collect(),
                    confidence: cluster.coherence,
                }
            })
            .collect()
    }

    /// Synthesize a mental model from learnings and optional reflections.
    ///
    /// Dead ends become anti-patterns, pattern learnings become patterns,
    /// and everything else becomes a principle; reflection causalities are
    /// folded in as additional principles. Confidence is the arithmetic
    /// mean of the source-learning confidences.
    pub fn build_mental_model(
        &self,
        topic: impl Into<String>,
        learnings: &[Learning],
        reflections: &[Reflection],
    ) -> MentalModel {
        let mut principles = BTreeSet::new();
        let mut patterns = BTreeSet::new();
        let mut anti_patterns = BTreeSet::new();

        for learning in learnings {
            match learning.category {
                LearningCategory::DeadEnd => {
                    anti_patterns.insert(learning.fact.clone());
                }
                LearningCategory::Pattern => {
                    patterns.insert(learning.fact.clone());
                }
                _ => {
                    principles.insert(learning.fact.clone());
                }
            }
        }
        for reflection in reflections {
            principles.insert(reflection.causality.clone());
        }

        let confidence = if learnings.is_empty() {
            0.0
        } else {
            learnings.iter().map(|l| l.confidence).sum::<f32>() / learnings.len() as f32
        };

        MentalModel {
            topic: topic.into(),
            principles,
            patterns,
            anti_patterns,
            confidence,
            source_learning_count: learnings.len(),
        }
    }

    /// Fold new learnings into an existing model, returning a new value.
    /// Sets are unioned so repeated ideas are not duplicated; confidence
    /// becomes the count-weighted average of old and new evidence. The
    /// old model is untouched, so concurrent readers of the prior version
    /// stay consistent.
    pub fn update_mental_model(
        &self,
        existing: &MentalModel,
        new_learnings: &[Learning],
    ) -> MentalModel {
        let fresh = self.build_mental_model(existing.topic.clone(), new_learnings, &[]);

        let old_count = existing.source_learning_count;
        let new_count = new_learnings.len();
        let total = old_count + new_count;
        let confidence = if total == 0 {
            existing.confidence
        } else {
            (existing.confidence * old_count as f32 + fresh.confidence * new_count as f32)
                / total as f32
        };

        MentalModel {
            topic: existing.topic.clone(),
            principles: existing.principles.union(&fresh.principles).cloned().collect(),
            patterns: existing.patterns.union(&fresh.patterns).cloned().collect(),
            anti_patterns: existing
                .anti_patterns
                .union(&fresh.anti_patterns)
                .cloned()
                .collect(),
            confidence,
            source_learning_count: total,
        }
    }

    /// Pure arithmetic: what replacing the individual learnings with the
    /// model's prompt rendering would save.
    pub fn estimate_token_savings(
        &self,
        model: &MentalModel,
        learnings: &[Learning],
    ) -> TokenSavings {
        let individual_tokens: usize = learnings
            .iter()
            .map(|l| estimate_tokens(&l.as_recall_line()))
            .sum();
        let model_tokens = estimate_tokens(&model.to_prompt());
        let saved_tokens = individual_tokens.saturating_sub(model_tokens);
        let saved_percent = if individual_tokens == 0 {
            0.0
        } else {
            saved_tokens as f32 / individual_tokens as f32 * 100.0
        };
        TokenSavings {
            individual_tokens,
            model_tokens,
            saved_tokens,
            saved_percent,
        }
    }
}
