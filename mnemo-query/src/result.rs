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

//! Per-query aggregate types. Ephemeral: nothing here is persisted.

use chrono::{DateTime, Utc};
use mnemo_core::{Learning, Turn};

/// A scored match from the semantic or procedural store.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredItem {
    /// Opaque key into the originating store.
    pub id: String,
    /// Matched text.
    pub text: String,
    /// Subsystem-internal relevance score.
    pub score: f32,
    /// When the underlying item was recorded.
    pub timestamp: DateTime<Utc>,
}

impl ScoredItem {
    pub fn new(id: impl Into<String>, text: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            score,
            timestamp: Utc::now(),
        }
    }
}

/// Outcome of a past session episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeOutcome {
    Succeeded,
    Failed,
}

/// A summarized past session. Failed episodes surface as dead-end
/// warnings during retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    pub summary: String,
    pub outcome: EpisodeOutcome,
    pub timestamp: DateTime<Utc>,
}

impl Episode {
    pub fn new(summary: impl Into<String>, outcome: EpisodeOutcome) -> Self {
        Self {
            summary: summary.into(),
            outcome,
            timestamp: Utc::now(),
        }
    }
}

/// Aggregate of one retrieval pass. Each subsystem's list preserves that
/// subsystem's own ranking; nothing is re-ranked across lists.
#[derive(Debug, Clone, Default)]
pub struct RetrievalResult {
    /// Scored active learnings, best first.
    pub learnings: Vec<(f32, Learning)>,
    /// Failed episodes relevant as dead-end warnings, most recent first.
    pub episodes: Vec<Episode>,
    /// Scored recent turns, best first.
    pub turns: Vec<(f32, Turn)>,
    /// Semantic store matches in store order.
    pub semantic_matches: Vec<ScoredItem>,
    /// Procedural store matches in store order.
    pub procedural: Vec<ScoredItem>,
    /// Focus topics used for scoring, strongest first.
    pub focus_topics: Vec<String>,
}

impl RetrievalResult {
    /// Whether every subsystem came back empty.
    pub fn is_empty(&self) -> bool {
        self.learnings.is_empty()
            && self.episodes.is_empty()
            && self.turns.is_empty()
            && self.semantic_matches.is_empty()
            && self.procedural.is_empty()
    }
}
