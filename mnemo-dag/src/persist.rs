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

//! JSON persistence for the conversation DAG.
//!
//! Save failures surface as errors; load failures do not. A missing or
//! corrupt file yields a fresh empty DAG, never a partially populated
//! one - callers always receive a valid structure.

use crate::dag::ConversationDag;
use mnemo_core::{Learning, MemoryResult, Turn, TurnId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::warn;

/// On-disk document shape. Roots and heads are included for inspection by
/// other tooling but are re-derived from `parent_ids` on load; the
/// children index is never written at all.
#[derive(Debug, Serialize, Deserialize)]
struct SavedDag {
    turns: Vec<Turn>,
    learnings: Vec<Learning>,
    roots: Vec<TurnId>,
    heads: Vec<TurnId>,
    active_head: Option<TurnId>,
    branches: BTreeMap<String, TurnId>,
    dead_ends: Vec<TurnId>,
    compressed: Vec<TurnId>,
}

/// Save the DAG to a JSON file.
///
/// Turns are written in topological order and learnings sorted by id, so
/// the same graph always serializes to the same document.
pub fn save(dag: &ConversationDag, path: &Path) -> MemoryResult<()> {
    let turns: Vec<Turn> = dag.iter_topological().into_iter().cloned().collect();

    let mut learnings: Vec<Learning> = dag.learnings().values().cloned().collect();
    learnings.sort_by_key(|l| l.id());

    let doc = SavedDag {
        turns,
        learnings,
        roots: dag.roots().iter().copied().collect(),
        heads: dag.heads().iter().copied().collect(),
        active_head: dag.active_head(),
        branches: dag.branches().clone(),
        dead_ends: dag.dead_ends().iter().copied().collect(),
        compressed: dag.compressed().iter().copied().collect(),
    };

    let json = serde_json::to_string_pretty(&doc)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Load a DAG from a JSON file.
///
/// Missing or corrupt files yield an empty DAG with a warning rather than
/// an error - saved state is a cache of the caller's history, not a source
/// of hard failures.
pub fn load(path: &Path) -> ConversationDag {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return ConversationDag::new();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read DAG file, starting empty");
            return ConversationDag::new();
        }
    };

    let doc: SavedDag = match serde_json::from_str(&data) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "corrupt DAG file, starting empty");
            return ConversationDag::new();
        }
    };

    ConversationDag::from_records(
        doc.turns,
        doc.learnings,
        doc.active_head,
        doc.branches,
        doc.dead_ends.into_iter().collect::<BTreeSet<_>>(),
        doc.compressed.into_iter().collect::<BTreeSet<_>>(),
    )
}
