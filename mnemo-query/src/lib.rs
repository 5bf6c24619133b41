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

//! Mnemo Query
//!
//! Fan-out retrieval across the memory subsystems: active learnings, past
//! episodes, recent turns, a semantic store, and a procedural store. Each
//! subsystem is queried on its own worker against a private snapshot, so
//! no sub-query shares mutable state with another and a slow or failing
//! subsystem never blocks or fails the rest.
//!
//! Ordering is deterministic within each subsystem (score, then recency,
//! then id). No global ordering across subsystems is promised; callers
//! wanting one ranked list apply their own merge.

pub mod result;
pub mod retriever;

pub use result::{Episode, EpisodeOutcome, RetrievalResult, ScoredItem};
pub use retriever::{
    max_useful_parallelism, ParallelRetriever, ProceduralStore, RetrieverConfig, SemanticStore,
};
