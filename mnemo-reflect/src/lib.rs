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

//! Mnemo Reflect
//!
//! Batch synthesis of learnings into higher-order knowledge:
//!
//! - [`Reflection`]: why a cluster of related constraints exists
//! - [`MentalModel`]: a deduplicated synthesis that replaces many
//!   individual learnings in future context, with an estimated token
//!   saving to decide whether synthesis was worth the model call
//!
//! Clustering uses an embedding-backed similarity collaborator when one
//! is supplied and falls back to lexical Jaccard otherwise; causality
//! analysis is model-assisted with a heuristic fallback. Outputs are
//! immutable - updating a mental model produces a new value, so readers
//! of the prior version are never disturbed.

pub mod cluster;
pub mod persist;
pub mod reflector;

pub use cluster::{cluster_learnings, LearningCluster};
pub use persist::ReflectionStore;
pub use reflector::{
    CausalityAnalysis, CausalityAnalyzer, MentalModel, Reflection, Reflector, ReflectorConfig,
    TokenSavings,
};
