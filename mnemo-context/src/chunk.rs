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

//! Compression tiers and chunk records.

use mnemo_core::{MemoryId, TurnId};
use serde::{Deserialize, Serialize};

/// Fidelity tier of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkTier {
    /// Full turns, no summary needed.
    Hot,
    /// Summary attached, turns retained for optional expansion.
    Warm,
    /// Summary only; full turns referenced by range but not assembled.
    Cold,
}

/// A span of consecutive turns grouped for compression.
///
/// Turns are referenced by id; their content lives only in the DAG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Deterministic id over the covered turn ids.
    pub id: String,
    /// Current tier.
    pub tier: ChunkTier,
    /// Covered turns, oldest first.
    pub turn_ids: Vec<TurnId>,
    /// Sequence range (start, end) in ingestion order, end exclusive.
    pub turn_range: (usize, usize),
    /// Summary of the span; present on warm chunks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Total estimated tokens of the covered turns.
    pub token_count: usize,
}

impl Chunk {
    /// Deterministic chunk id from its covered turn ids.
    pub fn derive_id(turn_ids: &[TurnId]) -> String {
        let joined: String = turn_ids.iter().map(|id| id.to_hex()).collect::<Vec<_>>().join(",");
        format!("chunk_{}", MemoryId::from_content(joined.as_bytes()).short())
    }
}

/// Cold-tier record: the summary and the range it replaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkSummary {
    /// Id of the chunk this summary replaced.
    pub chunk_id: String,
    /// Sequence range (start, end) the summary covers, end exclusive.
    pub turn_range: (usize, usize),
    /// The summary text.
    pub summary: String,
    /// Estimated tokens of the summary text itself.
    pub token_count: usize,
}

/// One budgeted selection result handed to the assembler.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextItem {
    /// Full-fidelity turns.
    Hot {
        chunk_id: String,
        turn_ids: Vec<TurnId>,
        turn_range: (usize, usize),
        token_count: usize,
    },
    /// Summarized but expandable.
    Warm {
        chunk_id: String,
        summary: String,
        turn_range: (usize, usize),
        token_count: usize,
    },
    /// Summary only.
    Cold {
        chunk_id: String,
        summary: String,
        turn_range: (usize, usize),
        token_count: usize,
    },
}

impl ContextItem {
    /// Token cost counted against the assembly budget.
    pub fn token_count(&self) -> usize {
        match self {
            ContextItem::Hot { token_count, .. }
            | ContextItem::Warm { token_count, .. }
            | ContextItem::Cold { token_count, .. } => *token_count,
        }
    }

    /// Start of the covered sequence range, for chronological ordering.
    pub fn range_start(&self) -> usize {
        match self {
            ContextItem::Hot { turn_range, .. }
            | ContextItem::Warm { turn_range, .. }
            | ContextItem::Cold { turn_range, .. } => turn_range.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_core::Turn;

    #[test]
    fn chunk_id_deterministic() {
        let a = Turn::user("a", vec![]).id();
        let b = Turn::user("b", vec![]).id();
        assert_eq!(Chunk::derive_id(&[a, b]), Chunk::derive_id(&[a, b]));
        assert_ne!(Chunk::derive_id(&[a, b]), Chunk::derive_id(&[b, a]));
    }
}
