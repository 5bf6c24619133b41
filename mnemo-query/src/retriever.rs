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

//! Parallel retriever.
//!
//! Fan-out happens on `std::thread::scope`. Before any worker starts, the
//! focus is updated exactly once and snapshotted, and every subsystem's
//! data is value-copied - workers own their inputs outright, so a
//! concurrent ingest elsewhere cannot produce an inconsistent read
//! mid-query. A worker that errors or panics contributes an empty partial
//! and the retrieval still returns for the others.

use crate::result::{Episode, EpisodeOutcome, RetrievalResult, ScoredItem};
use mnemo_context::Focus;
use mnemo_core::{jaccard_similarity, CollaboratorError, Learning, Turn};
use mnemo_dag::ConversationDag;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::warn;

/// Semantic (embedding/code) memory behind a read-only query interface.
pub trait SemanticStore: Send + Sync {
    fn query(&self, query: &str, limit: usize) -> Result<Vec<ScoredItem>, CollaboratorError>;
}

/// Procedural (heuristic) memory behind a read-only query interface.
pub trait ProceduralStore: Send + Sync {
    fn query(&self, query: &str, limit: usize) -> Result<Vec<ScoredItem>, CollaboratorError>;
}

/// Worker count the host can actually use. Rust has no interpreter lock,
/// so this is simply the available core count; callers on constrained
/// hosts override it through [`RetrieverConfig::worker_threads`].
pub fn max_useful_parallelism() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Retriever tuning.
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Explicit worker count. `None` uses [`max_useful_parallelism`],
    /// clamped to the subsystem count.
    pub worker_threads: Option<usize>,
    /// Maximum results per subsystem.
    pub limit_per_subsystem: usize,
    /// How many recent turns the turn subsystem snapshots.
    pub recent_turn_window: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            limit_per_subsystem: 5,
            recent_turn_window: 20,
        }
    }
}

const SUBSYSTEM_COUNT: usize = 5;

#[derive(Debug, Clone, Copy)]
enum Kind {
    Learnings,
    Episodes,
    Turns,
    Semantic,
    Procedural,
}

impl Kind {
    fn name(&self) -> &'static str {
        match self {
            Kind::Learnings => "learnings",
            Kind::Episodes => "episodes",
            Kind::Turns => "turns",
            Kind::Semantic => "semantic",
            Kind::Procedural => "procedural",
        }
    }
}

enum Partial {
    Learnings(Vec<(f32, Learning)>),
    Episodes(Vec<Episode>),
    Turns(Vec<(f32, Turn)>),
    Semantic(Vec<ScoredItem>),
    Procedural(Vec<ScoredItem>),
}

impl Partial {
    fn empty(kind: Kind) -> Self {
        match kind {
            Kind::Learnings => Partial::Learnings(Vec::new()),
            Kind::Episodes => Partial::Episodes(Vec::new()),
            Kind::Turns => Partial::Turns(Vec::new()),
            Kind::Semantic => Partial::Semantic(Vec::new()),
            Kind::Procedural => Partial::Procedural(Vec::new()),
        }
    }
}

/// Queries all memory subsystems concurrently and merges one
/// [`RetrievalResult`].
pub struct ParallelRetriever {
    config: RetrieverConfig,
    episodes: Vec<Episode>,
    semantic: Option<Box<dyn SemanticStore>>,
    procedural: Option<Box<dyn ProceduralStore>>,
    focus: Focus,
}

impl ParallelRetriever {
    /// Create a retriever with the given configuration.
    pub fn new(config: RetrieverConfig) -> Self {
        Self {
            config,
            episodes: Vec::new(),
            semantic: None,
            procedural: None,
            focus: Focus::new(),
        }
    }

    /// Attach the semantic store.
    pub fn with_semantic_store(mut self, store: Box<dyn SemanticStore>) -> Self {
        self.semantic = Some(store);
        self
    }

    /// Attach the procedural store.
    pub fn with_procedural_store(mut self, store: Box<dyn ProceduralStore>) -> Self {
        self.procedural = Some(store);
        self
    }

    /// Record a session episode.
    pub fn add_episode(&mut self, episode: Episode) {
        self.episodes.push(episode);
    }

    /// The rolling focus, for callers that reorder assembly output.
    pub fn focus(&self) -> &Focus {
        &self.focus
    }

    /// Query every subsystem concurrently and merge the partials.
    ///
    /// The focus absorbs the query exactly once, before fan-out; all
    /// workers score against that snapshot even if the focus changes
    /// again afterward.
    pub fn retrieve(&mut self, dag: &ConversationDag, query: &str) -> RetrievalResult {
        self.focus.absorb(query);
        let focus = self.focus.snapshot();

        let limit = self.config.limit_per_subsystem;

        // Private value-copies per subsystem, captured before any worker
        // starts.
        let learnings: Vec<Learning> =
            dag.get_active_learnings().into_iter().cloned().collect();
        let turns: Vec<Turn> = dag
            .get_recent_turns(self.config.recent_turn_window)
            .into_iter()
            .cloned()
            .collect();
        let episodes = self.episodes.clone();
        let semantic = self.semantic.as_deref();
        let procedural = self.procedural.as_deref();

        type Task<'s> = Box<dyn FnOnce() -> Partial + Send + 's>;
        let mut tasks: Vec<(Kind, Task<'_>)> = Vec::with_capacity(SUBSYSTEM_COUNT);

        {
            let query = query.to_string();
            let focus = focus.clone();
            tasks.push((
                Kind::Learnings,
                Box::new(move || Partial::Learnings(query_learnings(&query, &focus, learnings, limit))),
            ));
        }
        tasks.push((
            Kind::Episodes,
            Box::new(move || Partial::Episodes(query_episodes(episodes, limit))),
        ));
        {
            let query = query.to_string();
            let focus = focus.clone();
            tasks.push((
                Kind::Turns,
                Box::new(move || Partial::Turns(query_turns(&query, &focus, turns, limit))),
            ));
        }
        {
            let query = query.to_string();
            tasks.push((
                Kind::Semantic,
                Box::new(move || {
                    Partial::Semantic(query_external(Kind::Semantic, semantic.map(|s| {
                        move |q: &str, l: usize| s.query(q, l)
                    }), &query, limit))
                }),
            ));
        }
        {
            let query = query.to_string();
            tasks.push((
                Kind::Procedural,
                Box::new(move || {
                    Partial::Procedural(query_external(Kind::Procedural, procedural.map(|s| {
                        move |q: &str, l: usize| s.query(q, l)
                    }), &query, limit))
                }),
            ));
        }

        let workers = self
            .config
            .worker_threads
            .unwrap_or_else(max_useful_parallelism)
            .clamp(1, SUBSYSTEM_COUNT);

        let mut buckets: Vec<Vec<(Kind, Task<'_>)>> = (0..workers).map(|_| Vec::new()).collect();
        for (index, task) in tasks.into_iter().enumerate() {
            buckets[index % workers].push(task);
        }

        let partials: Vec<Partial> = std::thread::scope(|scope| {
            let handles: Vec<_> = buckets
                .into_iter()
                .filter(|bucket| !bucket.is_empty())
                .map(|bucket| {
                    scope.spawn(move || {
                        bucket
                            .into_iter()
                            .map(|(kind, task)| {
                                match catch_unwind(AssertUnwindSafe(move || task())) {
                                    Ok(partial) => partial,
                                    Err(_) => {
                                        warn!(
                                            subsystem = kind.name(),
                                            "sub-query panicked, contributing empty result"
                                        );
                                        Partial::empty(kind)
                                    }
                                }
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|handle| handle.join().unwrap_or_default())
                .collect()
        });

        let mut result = RetrievalResult {
            focus_topics: focus.topics(),
            ..Default::default()
        };
        for partial in partials {
            match partial {
                Partial::Learnings(items) => result.learnings = items,
                Partial::Episodes(items) => result.episodes = items,
                Partial::Turns(items) => result.turns = items,
                Partial::Semantic(items) => result.semantic_matches = items,
                Partial::Procedural(items) => result.procedural = items,
            }
        }
        result
    }
}

fn query_learnings(
    query: &str,
    focus: &Focus,
    learnings: Vec<Learning>,
    limit: usize,
) -> Vec<(f32, Learning)> {
    let mut scored: Vec<(f32, Learning)> = learnings
        .into_iter()
        .filter_map(|learning| {
            let score = jaccard_similarity(query, &learning.fact)
                + 0.1 * focus.score_text(&learning.fact);
            (score > 0.0).then_some((score, learning))
        })
        .collect();
    sort_scored(&mut scored, |l: &Learning| (l.timestamp, l.id()));
    scored.truncate(limit);
    scored
}

fn query_turns(query: &str, focus: &Focus, turns: Vec<Turn>, limit: usize) -> Vec<(f32, Turn)> {
    let mut scored: Vec<(f32, Turn)> = turns
        .into_iter()
        .map(|turn| {
            let score = jaccard_similarity(query, &turn.content)
                + 0.1 * focus.score_tags(&turn.tags);
            (score, turn)
        })
        .collect();
    sort_scored(&mut scored, |t: &Turn| (t.timestamp, t.id()));
    scored.truncate(limit);
    scored
}

fn query_episodes(episodes: Vec<Episode>, limit: usize) -> Vec<Episode> {
    let mut failed: Vec<Episode> = episodes
        .into_iter()
        .filter(|e| e.outcome == EpisodeOutcome::Failed)
        .collect();
    failed.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| a.summary.cmp(&b.summary))
    });
    failed.truncate(limit);
    failed
}

fn query_external<F>(
    kind: Kind,
    store: Option<F>,
    query: &str,
    limit: usize,
) -> Vec<ScoredItem>
where
    F: FnOnce(&str, usize) -> Result<Vec<ScoredItem>, CollaboratorError>,
{
    let Some(store) = store else {
        return Vec::new();
    };
    match store(query, limit) {
        Ok(items) => items,
        Err(e) => {
            warn!(subsystem = kind.name(), error = %e, "sub-query failed, contributing empty result");
            Vec::new()
        }
    }
}

/// Score descending, then recency descending, then id - the deterministic
/// tie-break used by every internal subsystem.
fn sort_scored<T, K: Ord>(items: &mut [(f32, T)], key: impl Fn(&T) -> (chrono::DateTime<chrono::Utc>, K)) {
    items.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let (ta, ka) = key(&a.1);
                let (tb, kb) = key(&b.1);
                tb.cmp(&ta).then_with(|| ka.cmp(&kb))
            })
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_core::{LearningCategory, Turn};

    struct CannedStore(Vec<ScoredItem>);

    impl SemanticStore for CannedStore {
        fn query(&self, _q: &str, _l: usize) -> Result<Vec<ScoredItem>, CollaboratorError> {
            Ok(self.0.clone())
        }
    }

    impl ProceduralStore for CannedStore {
        fn query(&self, _q: &str, _l: usize) -> Result<Vec<ScoredItem>, CollaboratorError> {
            Ok(self.0.clone())
        }
    }

    struct PanickingStore;

    impl SemanticStore for PanickingStore {
        fn query(&self, _q: &str, _l: usize) -> Result<Vec<ScoredItem>, CollaboratorError> {
            panic!("semantic index corrupted")
        }
    }

    struct ErroringStore;

    impl ProceduralStore for ErroringStore {
        fn query(&self, _q: &str, _l: usize) -> Result<Vec<ScoredItem>, CollaboratorError> {
            Err(CollaboratorError::new("store offline"))
        }
    }

    fn seeded_dag() -> ConversationDag {
        let mut dag = ConversationDag::new();
        let a = dag.add_turn(Turn::user("redis cache keeps evicting", vec![])).unwrap();
        dag.add_turn(Turn::assistant("set maxmemory-policy to lru", vec![a]))
            .unwrap();
        dag.add_learning(Learning::new(
            LearningCategory::Fact,
            "redis eviction policy is lru",
            vec![a],
            0.9,
        ));
        dag.add_learning(Learning::new(
            LearningCategory::Constraint,
            "migrations must run before deploy",
            vec![],
            0.8,
        ));
        dag
    }

    #[test]
    fn merges_all_subsystems() {
        let dag = seeded_dag();
        let mut retriever = ParallelRetriever::new(RetrieverConfig::default())
            .with_semantic_store(Box::new(CannedStore(vec![ScoredItem::new(
                "s1",
                "fn evict_lru()",
                0.8,
            )])))
            .with_procedural_store(Box::new(CannedStore(vec![ScoredItem::new(
                "p1",
                "prefer lru for hot keys",
                0.7,
            )])));
        retriever.add_episode(Episode::new("tried fifo eviction, thrashed", EpisodeOutcome::Failed));
        retriever.add_episode(Episode::new("lru rollout went fine", EpisodeOutcome::Succeeded));

        let result = retriever.retrieve(&dag, "redis eviction policy");

        assert!(!result.learnings.is_empty());
        assert_eq!(result.learnings[0].1.fact, "redis eviction policy is lru");
        assert_eq!(result.episodes.len(), 1);
        assert_eq!(result.episodes[0].summary, "tried fifo eviction, thrashed");
        assert!(!result.turns.is_empty());
        assert_eq!(result.semantic_matches.len(), 1);
        assert_eq!(result.procedural.len(), 1);
        assert_eq!(result.focus_topics.len(), 3);
    }

    #[test]
    fn partial_failure_is_isolated() {
        let dag = seeded_dag();
        let mut retriever = ParallelRetriever::new(RetrieverConfig::default())
            .with_semantic_store(Box::new(PanickingStore))
            .with_procedural_store(Box::new(ErroringStore));
        retriever.add_episode(Episode::new("bad approach", EpisodeOutcome::Failed));

        let result = retriever.retrieve(&dag, "redis eviction policy");

        assert!(result.semantic_matches.is_empty());
        assert!(result.procedural.is_empty());
        assert!(!result.learnings.is_empty());
        assert!(!result.turns.is_empty());
        assert_eq!(result.episodes.len(), 1);
    }

    #[test]
    fn ordering_is_deterministic() {
        let dag = seeded_dag();

        let run = || {
            let mut retriever = ParallelRetriever::new(RetrieverConfig::default());
            let result = retriever.retrieve(&dag, "redis eviction");
            (
                result
                    .learnings
                    .iter()
                    .map(|(s, l)| (s.to_bits(), l.id()))
                    .collect::<Vec<_>>(),
                result
                    .turns
                    .iter()
                    .map(|(s, t)| (s.to_bits(), t.id()))
                    .collect::<Vec<_>>(),
            )
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn single_worker_override_still_covers_everything() {
        let dag = seeded_dag();
        let mut retriever = ParallelRetriever::new(RetrieverConfig {
            worker_threads: Some(1),
            ..Default::default()
        })
        .with_semantic_store(Box::new(CannedStore(vec![ScoredItem::new("s1", "x", 0.5)])));

        let result = retriever.retrieve(&dag, "redis eviction");
        assert!(!result.learnings.is_empty());
        assert_eq!(result.semantic_matches.len(), 1);
    }

    #[test]
    fn focus_absorbed_once_per_retrieve() {
        let dag = seeded_dag();
        let mut retriever = ParallelRetriever::new(RetrieverConfig::default());

        let result = retriever.retrieve(&dag, "redis eviction");
        assert!(result.focus_topics.contains(&"redis".to_string()));
        assert!(result.focus_topics.contains(&"eviction".to_string()));

        let result = retriever.retrieve(&dag, "oauth refresh");
        assert!(result.focus_topics.contains(&"oauth".to_string()));
        // Earlier topics decay but are still tracked.
        assert!(result.focus_topics.contains(&"redis".to_string()));
    }

    #[test]
    fn relevant_learning_outranks_unrelated() {
        let dag = seeded_dag();
        let mut retriever = ParallelRetriever::new(RetrieverConfig::default());
        let result = retriever.retrieve(&dag, "redis eviction policy");

        let facts: Vec<&str> = result.learnings.iter().map(|(_, l)| l.fact.as_str()).collect();
        assert_eq!(facts[0], "redis eviction policy is lru");
        assert!(!facts.contains(&"migrations must run before deploy"));
    }
}
