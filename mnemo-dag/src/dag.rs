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

//! Directed acyclic graph of conversation turns.

use mnemo_core::{
    Learning, LearningId, MemoryError, MemoryResult, Role, Turn, TurnId,
};
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Inline child list. Typical conversations have 1-2 children per turn;
/// 4 covers branching without heap allocation.
type ChildList = SmallVec<[TurnId; 4]>;

/// DAG statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DagStats {
    pub total_turns: usize,
    pub roots: usize,
    pub heads: usize,
    pub branches: usize,
    pub dead_ends: usize,
    pub compressed: usize,
    pub learnings: usize,
    pub active_learnings: usize,
}

/// Directed acyclic graph of conversation turns.
///
/// Turns are identified by content hash and never modified after insert.
/// Roots and heads are derived sets maintained incrementally; the children
/// index is derived from `parent_ids` and never persisted.
#[derive(Debug, Default)]
pub struct ConversationDag {
    turns: HashMap<TurnId, Turn>,
    learnings: HashMap<LearningId, Learning>,
    children: HashMap<TurnId, ChildList>,
    roots: BTreeSet<TurnId>,
    heads: BTreeSet<TurnId>,
    active_head: Option<TurnId>,
    branches: BTreeMap<String, TurnId>,
    dead_ends: BTreeSet<TurnId>,
    compressed: BTreeSet<TurnId>,
}

impl ConversationDag {
    /// Create an empty DAG.
    pub fn new() -> Self {
        Self::default()
    }

    // === Ingestion ===

    /// Add a turn to the DAG, returning its content-addressable id.
    ///
    /// Inserting a turn whose id already exists is a no-op that returns
    /// the existing id. Unknown parents are rejected with
    /// [`MemoryError::TurnNotFound`]; a `parent_ids` value that would make
    /// the new turn its own ancestor is rejected with
    /// [`MemoryError::CycleRejected`] and leaves the graph unchanged.
    pub fn add_turn(&mut self, turn: Turn) -> MemoryResult<TurnId> {
        let id = turn.id();

        if self.turns.contains_key(&id) {
            return Ok(id);
        }

        for parent in &turn.parent_ids {
            if !self.turns.contains_key(parent) {
                return Err(MemoryError::TurnNotFound(*parent));
            }
        }

        // Defense against caller error: a fresh content hash cannot sit in
        // its own ancestry, but verify rather than trust.
        for parent in &turn.parent_ids {
            if self.ancestry_contains(*parent, id) {
                return Err(MemoryError::CycleRejected(id));
            }
        }

        if turn.parent_ids.is_empty() {
            self.roots.insert(id);
        } else {
            for parent in &turn.parent_ids {
                self.children.entry(*parent).or_default().push(id);
                self.heads.remove(parent);
            }
        }

        self.heads.insert(id);
        self.active_head = Some(id);
        self.turns.insert(id, turn);

        Ok(id)
    }

    /// Append a user message at the active head.
    pub fn add_user_message(&mut self, content: impl Into<String>) -> MemoryResult<TurnId> {
        let parents = self.active_head.into_iter().collect();
        self.add_turn(Turn::new(Role::User, content, parents))
    }

    /// Append an assistant message at the active head.
    pub fn add_assistant_message(
        &mut self,
        content: impl Into<String>,
        model: Option<&str>,
    ) -> MemoryResult<TurnId> {
        let parents = self.active_head.into_iter().collect();
        let mut turn = Turn::new(Role::Assistant, content, parents);
        if let Some(model) = model {
            turn = turn.with_model(model);
        }
        self.add_turn(turn)
    }

    // === Learnings ===

    /// Record a learning, returning its content-addressable id.
    pub fn add_learning(&mut self, learning: Learning) -> LearningId {
        let id = learning.id();
        self.learnings.insert(id, learning);
        id
    }

    /// Replace a learning with a newer version. The old record is retained
    /// with its `superseded_by` pointer set; only the pointer changes.
    pub fn supersede_learning(
        &mut self,
        old_id: LearningId,
        replacement: Learning,
    ) -> MemoryResult<LearningId> {
        if !self.learnings.contains_key(&old_id) {
            return Err(MemoryError::LearningNotFound(old_id));
        }
        let new_id = self.add_learning(replacement);
        if let Some(old) = self.learnings.get_mut(&old_id) {
            old.superseded_by = Some(new_id);
        }
        Ok(new_id)
    }

    /// Find a learning by id.
    pub fn find_learning(&self, id: LearningId) -> Option<&Learning> {
        self.learnings.get(&id)
    }

    /// All learnings not superseded by a newer version, newest first,
    /// ties broken by id.
    pub fn get_active_learnings(&self) -> Vec<&Learning> {
        let mut active: Vec<&Learning> =
            self.learnings.values().filter(|l| l.is_active()).collect();
        active.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id().cmp(&b.id())));
        active
    }

    // === Navigation ===

    /// Record a named branch at the given turn (default: active head).
    pub fn branch(&mut self, name: impl Into<String>, from_turn: Option<TurnId>) -> MemoryResult<TurnId> {
        let point = match from_turn {
            Some(id) => id,
            None => self.active_head.ok_or(MemoryError::NoActiveHead)?,
        };
        if !self.turns.contains_key(&point) {
            return Err(MemoryError::TurnNotFound(point));
        }
        self.branches.insert(name.into(), point);
        Ok(point)
    }

    /// Move the active head to a branch name or a turn id (full hex).
    pub fn checkout(&mut self, branch_or_turn: &str) -> MemoryResult<TurnId> {
        if let Some(&id) = self.branches.get(branch_or_turn) {
            self.active_head = Some(id);
            return Ok(id);
        }
        if let Ok(id) = TurnId::from_hex(branch_or_turn) {
            if self.turns.contains_key(&id) {
                self.active_head = Some(id);
                return Ok(id);
            }
        }
        Err(MemoryError::BranchNotFound(branch_or_turn.to_string()))
    }

    /// Mark a turn (default: active head) as a dead end. Idempotent and
    /// purely advisory - the turn stays queryable.
    pub fn mark_dead_end(&mut self, turn_id: Option<TurnId>) -> MemoryResult<TurnId> {
        let id = match turn_id {
            Some(id) => id,
            None => self.active_head.ok_or(MemoryError::NoActiveHead)?,
        };
        if !self.turns.contains_key(&id) {
            return Err(MemoryError::TurnNotFound(id));
        }
        self.dead_ends.insert(id);
        Ok(id)
    }

    /// Mark a turn's full content as demoted to cold storage. Advisory,
    /// used by the chunk store when a chunk goes cold.
    pub fn mark_compressed(&mut self, turn_id: TurnId) -> MemoryResult<()> {
        if !self.turns.contains_key(&turn_id) {
            return Err(MemoryError::TurnNotFound(turn_id));
        }
        self.compressed.insert(turn_id);
        Ok(())
    }

    // === Traversal ===

    /// Path from a root to the given turn, root-first.
    ///
    /// Only the first (primary) parent is followed at each step. Multiple
    /// parents can be recorded on a turn, but merge traversal has no
    /// defined semantics here - a known gap, kept deliberately rather than
    /// invented.
    pub fn get_path_to(&self, turn_id: TurnId) -> MemoryResult<Vec<&Turn>> {
        if !self.turns.contains_key(&turn_id) {
            return Err(MemoryError::TurnNotFound(turn_id));
        }

        let mut path = Vec::new();
        let mut current = Some(turn_id);
        while let Some(id) = current {
            let Some(turn) = self.turns.get(&id) else { break };
            path.push(turn);
            current = turn.parent_ids.first().copied();
        }
        path.reverse();
        Ok(path)
    }

    /// Last `n` turns on the path to the active head.
    pub fn get_recent_turns(&self, n: usize) -> Vec<&Turn> {
        let Some(head) = self.active_head else {
            return Vec::new();
        };
        let path = self.get_path_to(head).unwrap_or_default();
        let skip = path.len().saturating_sub(n);
        path.into_iter().skip(skip).collect()
    }

    /// Turns whose tag set intersects `tags`, most recent first, ties
    /// broken by id. Linear scan - acceptable on the hot tier; full-history
    /// queries belong to the topology store.
    pub fn find_related_turns(&self, tags: &BTreeSet<String>, limit: usize) -> Vec<&Turn> {
        let mut matches: Vec<&Turn> = self
            .turns
            .values()
            .filter(|t| t.tags.intersection(tags).next().is_some())
            .collect();
        matches.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| a.id().cmp(&b.id()))
        });
        matches.truncate(limit);
        matches
    }

    /// All turns in topological order (parents before children).
    pub fn iter_topological(&self) -> Vec<&Turn> {
        let mut visited = HashSet::new();
        let mut out = Vec::with_capacity(self.turns.len());
        for head in &self.heads {
            self.visit_ancestors_first(*head, &mut visited, &mut out);
        }
        out
    }

    fn visit_ancestors_first<'a>(
        &'a self,
        id: TurnId,
        visited: &mut HashSet<TurnId>,
        out: &mut Vec<&'a Turn>,
    ) {
        if !visited.insert(id) {
            return;
        }
        let Some(turn) = self.turns.get(&id) else { return };
        for parent in &turn.parent_ids {
            self.visit_ancestors_first(*parent, visited, out);
        }
        out.push(turn);
    }

    /// Whether `needle` appears in the ancestor closure of `start`
    /// (including `start` itself).
    fn ancestry_contains(&self, start: TurnId, needle: TurnId) -> bool {
        let mut stack = vec![start];
        let mut seen = HashSet::new();
        while let Some(id) = stack.pop() {
            if id == needle {
                return true;
            }
            if !seen.insert(id) {
                continue;
            }
            if let Some(turn) = self.turns.get(&id) {
                stack.extend(turn.parent_ids.iter().copied());
            }
        }
        false
    }

    // === Accessors ===

    pub fn get_turn(&self, id: TurnId) -> MemoryResult<&Turn> {
        self.turns.get(&id).ok_or(MemoryError::TurnNotFound(id))
    }

    pub fn contains_turn(&self, id: TurnId) -> bool {
        self.turns.contains_key(&id)
    }

    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    pub fn children_of(&self, id: TurnId) -> &[TurnId] {
        self.children.get(&id).map(|c| c.as_slice()).unwrap_or(&[])
    }

    pub fn roots(&self) -> &BTreeSet<TurnId> {
        &self.roots
    }

    pub fn heads(&self) -> &BTreeSet<TurnId> {
        &self.heads
    }

    pub fn active_head(&self) -> Option<TurnId> {
        self.active_head
    }

    pub fn branches(&self) -> &BTreeMap<String, TurnId> {
        &self.branches
    }

    pub fn dead_ends(&self) -> &BTreeSet<TurnId> {
        &self.dead_ends
    }

    pub fn compressed(&self) -> &BTreeSet<TurnId> {
        &self.compressed
    }

    pub(crate) fn learnings(&self) -> &HashMap<LearningId, Learning> {
        &self.learnings
    }

    /// Rebuild a DAG from persisted records. The children index and the
    /// derived roots/heads sets are reconstructed purely from `parent_ids`
    /// so persisted indexes can never diverge from the data.
    pub(crate) fn from_records(
        turns: Vec<Turn>,
        learnings: Vec<Learning>,
        active_head: Option<TurnId>,
        branches: BTreeMap<String, TurnId>,
        dead_ends: BTreeSet<TurnId>,
        compressed: BTreeSet<TurnId>,
    ) -> Self {
        let mut dag = Self::new();

        for turn in turns {
            let id = turn.id();
            for parent in &turn.parent_ids {
                dag.children.entry(*parent).or_default().push(id);
            }
            dag.turns.insert(id, turn);
        }

        for (id, turn) in &dag.turns {
            if turn.parent_ids.is_empty() {
                dag.roots.insert(*id);
            }
            if dag.children.get(id).map_or(true, |c| c.is_empty()) {
                dag.heads.insert(*id);
            }
        }

        for learning in learnings {
            dag.learnings.insert(learning.id(), learning);
        }

        dag.active_head = active_head;
        dag.branches = branches;
        dag.dead_ends = dead_ends;
        dag.compressed = compressed;
        dag
    }

    /// Counts snapshot.
    pub fn stats(&self) -> DagStats {
        DagStats {
            total_turns: self.turns.len(),
            roots: self.roots.len(),
            heads: self.heads.len(),
            branches: self.branches.len(),
            dead_ends: self.dead_ends.len(),
            compressed: self.compressed.len(),
            learnings: self.learnings.len(),
            active_learnings: self.learnings.values().filter(|l| l.is_active()).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_core::LearningCategory;

    fn linear_dag() -> (ConversationDag, TurnId, TurnId) {
        let mut dag = ConversationDag::new();
        let a = dag.add_turn(Turn::user("turn a", vec![])).unwrap();
        let b = dag.add_turn(Turn::assistant("turn b", vec![a])).unwrap();
        (dag, a, b)
    }

    #[test]
    fn linear_conversation_path_roots_heads() {
        let (dag, a, b) = linear_dag();

        let path = dag.get_path_to(b).unwrap();
        let ids: Vec<TurnId> = path.iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec![a, b]);

        assert_eq!(dag.roots().iter().copied().collect::<Vec<_>>(), vec![a]);
        assert_eq!(dag.heads().iter().copied().collect::<Vec<_>>(), vec![b]);
        assert_eq!(dag.active_head(), Some(b));
    }

    #[test]
    fn message_helpers_chain_from_active_head() {
        let mut dag = ConversationDag::new();
        let q = dag.add_user_message("does the cache evict?").unwrap();
        let a = dag
            .add_assistant_message("yes, under memory pressure", Some("local-8b"))
            .unwrap();

        assert_eq!(dag.get_turn(a).unwrap().parent_ids, vec![q]);
        assert_eq!(dag.get_turn(a).unwrap().model.as_deref(), Some("local-8b"));
        assert_eq!(dag.active_head(), Some(a));
    }

    #[test]
    fn duplicate_insert_is_noop() {
        let mut dag = ConversationDag::new();
        let first = dag.add_turn(Turn::user("same", vec![])).unwrap();
        let count = dag.turn_count();
        let second = dag.add_turn(Turn::user("same", vec![])).unwrap();

        assert_eq!(first, second);
        assert_eq!(dag.turn_count(), count);
    }

    #[test]
    fn unknown_parent_rejected() {
        let mut dag = ConversationDag::new();
        let ghost = Turn::user("ghost", vec![]).id();
        let err = dag.add_turn(Turn::user("child", vec![ghost])).unwrap_err();
        assert!(matches!(err, MemoryError::TurnNotFound(id) if id == ghost));
        assert_eq!(dag.turn_count(), 0);
    }

    #[test]
    fn branch_and_dead_end_scenario() {
        let (mut dag, a, b) = linear_dag();

        dag.branch("explore-x", None).unwrap();
        let c = dag.add_turn(Turn::user("turn c", vec![b])).unwrap();
        dag.mark_dead_end(Some(c)).unwrap();

        let restored = dag.checkout("explore-x").unwrap();
        assert_eq!(restored, b);
        assert_eq!(dag.active_head(), Some(b));

        assert!(dag.dead_ends().contains(&c));

        // Dead-ended turns stay queryable.
        let path = dag.get_path_to(c).unwrap();
        let ids: Vec<TurnId> = path.iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec![a, b, c]);
    }

    #[test]
    fn checkout_by_turn_id_hex() {
        let (mut dag, a, _b) = linear_dag();
        dag.checkout(&a.to_hex()).unwrap();
        assert_eq!(dag.active_head(), Some(a));
    }

    #[test]
    fn checkout_unknown_fails() {
        let (mut dag, _a, b) = linear_dag();
        let err = dag.checkout("no-such-branch").unwrap_err();
        assert!(matches!(err, MemoryError::BranchNotFound(_)));
        assert_eq!(dag.active_head(), Some(b));
    }

    #[test]
    fn branch_at_unknown_turn_fails() {
        let (mut dag, _a, _b) = linear_dag();
        let ghost = Turn::user("ghost", vec![]).id();
        let err = dag.branch("nope", Some(ghost)).unwrap_err();
        assert!(matches!(err, MemoryError::TurnNotFound(_)));
        assert!(dag.branches().is_empty());
    }

    #[test]
    fn mark_dead_end_idempotent() {
        let (mut dag, _a, b) = linear_dag();
        dag.mark_dead_end(Some(b)).unwrap();
        dag.mark_dead_end(Some(b)).unwrap();
        assert_eq!(dag.dead_ends().len(), 1);
    }

    #[test]
    fn recent_turns_follow_active_head() {
        let mut dag = ConversationDag::new();
        let mut last = None;
        for i in 0..5 {
            let parents = last.into_iter().collect();
            last = Some(dag.add_turn(Turn::user(format!("turn {i}"), parents)).unwrap());
        }

        let recent = dag.get_recent_turns(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "turn 3");
        assert_eq!(recent[1].content, "turn 4");
    }

    #[test]
    fn find_related_turns_by_tags() {
        let mut dag = ConversationDag::new();
        let a = dag
            .add_turn(Turn::user("about caching", vec![]).with_tags(["cache"]))
            .unwrap();
        dag.add_turn(Turn::user("about auth", vec![a]).with_tags(["auth"]))
            .unwrap();

        let tags: BTreeSet<String> = ["cache".to_string()].into();
        let related = dag.find_related_turns(&tags, 10);
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].content, "about caching");
    }

    #[test]
    fn superseded_learnings_excluded_from_active() {
        let mut dag = ConversationDag::new();
        let old = Learning::new(LearningCategory::Fact, "timeout is 5s", vec![], 0.8);
        let old_id = dag.add_learning(old);
        let new = Learning::new(LearningCategory::Fact, "timeout is 10s", vec![], 0.9);
        let new_id = dag.supersede_learning(old_id, new).unwrap();

        let active = dag.get_active_learnings();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id(), new_id);

        // Superseded record retained for provenance.
        let old = dag.find_learning(old_id).unwrap();
        assert_eq!(old.superseded_by, Some(new_id));
    }

    #[test]
    fn topological_order_parents_first() {
        let mut dag = ConversationDag::new();
        let a = dag.add_turn(Turn::user("a", vec![])).unwrap();
        let b = dag.add_turn(Turn::assistant("b", vec![a])).unwrap();
        dag.checkout(&a.to_hex()).unwrap();
        let c = dag.add_turn(Turn::user("c", vec![a])).unwrap();

        let order: Vec<TurnId> = dag.iter_topological().iter().map(|t| t.id()).collect();
        let pos = |id: TurnId| order.iter().position(|&o| o == id).unwrap();
        assert!(pos(a) < pos(b));
        assert!(pos(a) < pos(c));
        assert_eq!(order.len(), 3);
    }

    #[test]
    fn ancestry_closure_guard() {
        // The cycle defense walks the ancestor closure; content-derived
        // ids make a real cycle unreachable through the public API, so
        // exercise the guard directly.
        let (dag, a, b) = linear_dag();
        assert!(dag.ancestry_contains(b, a));
        assert!(dag.ancestry_contains(b, b));
        assert!(!dag.ancestry_contains(a, b));
    }

    #[test]
    fn stats_counts() {
        let (mut dag, _a, b) = linear_dag();
        dag.branch("main", Some(b)).unwrap();
        dag.mark_dead_end(Some(b)).unwrap();
        dag.add_learning(Learning::new(LearningCategory::Fact, "f", vec![], 0.5));

        let stats = dag.stats();
        assert_eq!(stats.total_turns, 2);
        assert_eq!(stats.roots, 1);
        assert_eq!(stats.heads, 1);
        assert_eq!(stats.branches, 1);
        assert_eq!(stats.dead_ends, 1);
        assert_eq!(stats.learnings, 1);
        assert_eq!(stats.active_learnings, 1);
    }
}
