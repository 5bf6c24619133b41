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

//! Memory engine error types.
//!
//! Structural violations (unknown references, cycles) are hard errors and
//! always surface to the caller - they indicate caller-side state drift,
//! not normal operation. Best-effort enrichment paths (extraction,
//! reflection, sub-queries) never produce these; they degrade to empty
//! results at their own boundary.

use crate::id::{EntityId, LearningId, TurnId};
use thiserror::Error;

/// Result type for memory operations.
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Errors that can occur in the memory engine.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Referenced turn id is unknown.
    #[error("turn not found: {0}")]
    TurnNotFound(TurnId),

    /// Referenced branch name is unknown (and is not a turn id either).
    #[error("branch not found: {0}")]
    BranchNotFound(String),

    /// Referenced entity id is unknown.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Referenced learning id is unknown.
    #[error("learning not found: {0}")]
    LearningNotFound(LearningId),

    /// Inserting the turn would create a cycle. The graph is unchanged.
    #[error("turn would create a cycle: {0}")]
    CycleRejected(TurnId),

    /// An operation needed an active head but the DAG is empty.
    #[error("no active head in conversation DAG")]
    NoActiveHead,

    /// IO error during save.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error during save.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for MemoryError {
    fn from(e: serde_json::Error) -> Self {
        MemoryError::Serialization(e.to_string())
    }
}
