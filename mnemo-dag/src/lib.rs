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

//! Mnemo Conversation DAG
//!
//! Conversations are not linear: they branch when exploring alternatives
//! and hit dead ends that stay queryable but should not be continued. This
//! crate stores turns as a content-addressable directed acyclic graph:
//!
//! - ingesting identical content with identical ancestry is a no-op
//! - named branches are movable bookmarks, like lightweight git refs
//! - dead ends are advisory markers; nothing is ever deleted
//! - learnings are superseded, never rewritten, so provenance survives
//!
//! The DAG is single-writer/multi-reader within a session. Persistence
//! round-trips the full graph to JSON; the children index is always
//! rebuilt from `parent_ids` on load so index and data cannot diverge.

pub mod dag;
pub mod persist;

pub use dag::{ConversationDag, DagStats};
