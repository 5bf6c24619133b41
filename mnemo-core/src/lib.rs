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

//! Mnemo Core
//!
//! Fundamental data types for the conversational memory engine:
//!
//! - [`Turn`]: one content-addressable unit of conversation history
//! - [`Learning`]: a derived fact distilled from one or more turns
//! - [`MemoryId`]: 128-bit content-derived identifier shared by all stores
//! - Collaborator traits ([`TextGenerator`], [`SimilarityScorer`]) behind
//!   which external model/embedding backends live
//!
//! Everything here is immutable once constructed. Updates are modeled as
//! replacement values (`Learning::with_usage`), never in-place edits, so
//! readers holding a prior version stay consistent.

pub mod collab;
pub mod error;
pub mod id;
pub mod learning;
pub mod token;
pub mod turn;

pub use collab::{jaccard_similarity, CollaboratorError, SimilarityScorer, TextGenerator};
pub use error::{MemoryError, MemoryResult};
pub use id::{EntityId, LearningId, MemoryId, TurnId};
pub use learning::{Learning, LearningCategory};
pub use token::estimate_tokens;
pub use turn::{Role, Turn};
