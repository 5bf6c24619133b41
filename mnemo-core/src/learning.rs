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

//! Learning - a derived fact that outlives the conversation it came from.
//!
//! Learnings are append-mostly: a revised learning supersedes the old one
//! via `superseded_by` rather than editing the stored fact, keeping
//! provenance intact for anything that referenced the prior version.

use crate::id::{LearningId, TurnId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of a learning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningCategory {
    /// "The API timeout is 5 seconds"
    Fact,
    /// "Prefers explicit error handling"
    Preference,
    /// "Tests are required before merge"
    Constraint,
    /// "Uses the factory pattern for stores"
    Pattern,
    /// "Tried X, failed because Y"
    DeadEnd,
    /// Ordering/strategy hint
    Heuristic,
}

impl LearningCategory {
    /// Stable wire name, also the hash-canonical form.
    pub fn as_str(&self) -> &'static str {
        match self {
            LearningCategory::Fact => "fact",
            LearningCategory::Preference => "preference",
            LearningCategory::Constraint => "constraint",
            LearningCategory::Pattern => "pattern",
            LearningCategory::DeadEnd => "dead_end",
            LearningCategory::Heuristic => "heuristic",
        }
    }

    /// First-person framing for context injection. First-person voice
    /// makes the agent treat recalled knowledge as its own memory rather
    /// than a log about someone else.
    fn first_person_prefix(&self) -> &'static str {
        match self {
            LearningCategory::Fact => "I know:",
            LearningCategory::Preference => "I prefer:",
            LearningCategory::Constraint => "I must:",
            LearningCategory::Pattern => "I use:",
            LearningCategory::DeadEnd => "I tried and it failed:",
            LearningCategory::Heuristic => "I've found:",
        }
    }
}

impl std::fmt::Display for LearningCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A derived piece of knowledge extracted from the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Learning {
    /// The fact/insight itself.
    pub fact: String,
    /// Turn ids this was distilled from.
    #[serde(default)]
    pub source_turns: Vec<TurnId>,
    /// Confidence in this learning (0-1).
    pub confidence: f32,
    /// Category of learning.
    pub category: LearningCategory,
    /// When this learning was recorded.
    pub timestamp: DateTime<Utc>,
    /// Pointer to the learning that replaced this one, if any. A learning
    /// with a non-null pointer is excluded from active queries but kept
    /// for provenance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<LearningId>,
    /// How many times this learning has been applied.
    #[serde(default)]
    pub use_count: u32,
}

impl Learning {
    /// Create a learning.
    pub fn new(
        category: LearningCategory,
        fact: impl Into<String>,
        source_turns: Vec<TurnId>,
        confidence: f32,
    ) -> Self {
        Self {
            fact: fact.into(),
            source_turns,
            confidence: confidence.clamp(0.0, 1.0),
            category,
            timestamp: Utc::now(),
            superseded_by: None,
            use_count: 0,
        }
    }

    /// Content-addressable id over `category:fact` only. Usage counters and
    /// supersession pointers are metadata and do not affect identity: the
    /// same fact in the same category is the same learning.
    pub fn id(&self) -> LearningId {
        let canonical = format!("{}:{}", self.category.as_str(), self.fact);
        LearningId::from_content(canonical.as_bytes())
    }

    /// Whether this learning is still current.
    pub fn is_active(&self) -> bool {
        self.superseded_by.is_none()
    }

    /// New value with usage feedback folded in: success nudges confidence
    /// up (capped at 1.0), failure knocks it down (floored at 0.1).
    pub fn with_usage(&self, success: bool) -> Self {
        let confidence = if success {
            (self.confidence + 0.05).min(1.0)
        } else {
            (self.confidence - 0.1).max(0.1)
        };
        Self {
            confidence,
            use_count: self.use_count + 1,
            ..self.clone()
        }
    }

    /// Render for context injection, e.g. `I must: run tests before merge`.
    pub fn as_recall_line(&self) -> String {
        format!("{} {}", self.category.first_person_prefix(), self.fact)
    }
}
