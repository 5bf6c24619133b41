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

//! Mnemo Index
//!
//! The typed-relation knowledge graph layered over the conversation DAG:
//!
//! - [`TopologyStore`]: adjacency indexes of [`ConceptEdge`]s between
//!   learning and entity nodes, with additive symmetric co-occurrence
//! - [`RelationExtractor`]: capability trait with a lexical heuristic
//!   strategy and a model-assisted strategy sharing one output contract
//! - [`EntityGraphBuilder`]: idempotent upsert of entity nodes and their
//!   mention/co-occurrence/alias edges
//!
//! Extraction is best effort by design: a backend that errors or emits
//! garbage degrades to zero edges, never to a failed ingest. The mutation
//! path is thread-safe so concurrent ingestion can build the graph
//! incrementally.

pub mod builder;
pub mod edge;
pub mod entity;
pub mod extract;
pub mod store;

pub use builder::EntityGraphBuilder;
pub use edge::{ConceptEdge, Relation};
pub use entity::{EntityKind, EntityNode};
pub use extract::{Candidate, HeuristicExtractor, HeuristicExtractorConfig, ModelExtractor, RelationExtractor};
pub use store::{TopologyStats, TopologyStore};
