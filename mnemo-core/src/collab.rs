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

//! External collaborator interfaces.
//!
//! The engine never talks to a model or embedding backend directly; it
//! goes through these traits. Every call site must tolerate an erroring
//! collaborator by degrading to its heuristic path - a hung or failed
//! backend reduces one component's output to "no signal", never a
//! process-level failure.

use std::collections::BTreeSet;
use thiserror::Error;

/// Error from an external collaborator (model or embedding backend).
#[derive(Debug, Error)]
#[error("collaborator error: {0}")]
pub struct CollaboratorError(pub String);

impl CollaboratorError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Text-generation collaborator: prompt in, free text out.
///
/// Used by the relation extractor, the causality analyzer, and optional
/// chunk summarization. Callers discard unparseable output rather than
/// treating it as fatal.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String, CollaboratorError>;
}

/// Embedding-backed similarity collaborator: two texts in, [0, 1] out.
///
/// Absence of this collaborator must not crash any caller; clustering and
/// scoring fall back to [`jaccard_similarity`].
pub trait SimilarityScorer: Send + Sync {
    fn similarity(&self, a: &str, b: &str) -> Result<f32, CollaboratorError>;
}

/// Lexical Jaccard similarity over lower-cased token sets.
///
/// Tokens shorter than 3 characters are discarded. This is the engine-wide
/// fallback measure wherever an embedding backend is unavailable.
pub fn jaccard_similarity(a: &str, b: &str) -> f32 {
    let set_a = token_set(a);
    let set_b = token_set(b);
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f32 / union as f32
}

fn token_set(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 3)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_texts_score_one() {
        let s = jaccard_similarity("redis cache timeout", "redis cache timeout");
        assert!((s - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn disjoint_texts_score_zero() {
        assert_eq!(jaccard_similarity("alpha beta", "gamma delta"), 0.0);
    }

    #[test]
    fn short_tokens_discarded() {
        // "a", "to", "in" are all under 3 chars and contribute nothing.
        assert_eq!(jaccard_similarity("a to in", "a to in"), 0.0);
    }

    #[test]
    fn partial_overlap_in_unit_range() {
        let s = jaccard_similarity("use redis for caching", "redis caching is fast");
        assert!(s > 0.0 && s < 1.0);
    }

    #[test]
    fn case_insensitive() {
        let s = jaccard_similarity("Redis Cache", "redis cache");
        assert!((s - 1.0).abs() < f32::EPSILON);
    }
}
