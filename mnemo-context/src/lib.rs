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

//! Mnemo Context
//!
//! Hierarchical context assembly: recent turns stay at full fidelity
//! (hot), older spans carry a summary but keep their turns for expansion
//! (warm), and old history shrinks to a summary line (cold). The
//! [`ChunkStore`] decides *what fits* a token budget; the [`Focus`]
//! weighting decides only *what comes first* - so a relevance bug can
//! degrade ordering but can never blow the budget.
//!
//! Chunks reference DAG turns by id and never copy their content; the DAG
//! remains the single source of truth for every turn.

pub mod assembler;
pub mod chunk;
pub mod focus;
pub mod store;

pub use assembler::{AssembledContext, ContextAssembler, ContextStats, PromptMessage};
pub use chunk::{Chunk, ChunkSummary, ChunkTier, ContextItem};
pub use focus::Focus;
pub use store::{ChunkStore, ContextConfig};
