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

//! Prompt-ready context assembly.
//!
//! Selection is the chunk store's job (what fits the budget); this module
//! renders the selected items and, when a focus is supplied, reorders them
//! by topic overlap. Reordering never changes what was selected.

use crate::chunk::ContextItem;
use crate::focus::Focus;
use crate::store::ChunkStore;
use mnemo_core::Turn;
use mnemo_dag::ConversationDag;

/// One prompt message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMessage {
    pub role: String,
    pub content: String,
}

/// What went into an assembled context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextStats {
    /// Full-fidelity turns included.
    pub hot_turns: usize,
    /// Warm summaries included.
    pub warm_summaries: usize,
    /// Cold summaries included.
    pub cold_summaries: usize,
    /// Whether any compressed content stood in for full turns.
    pub compression_applied: bool,
}

/// Messages plus assembly statistics.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    pub messages: Vec<PromptMessage>,
    pub stats: ContextStats,
}

/// Builds token-budgeted context from the DAG and an optional chunk store.
pub struct ContextAssembler<'a> {
    dag: &'a ConversationDag,
    chunks: Option<&'a ChunkStore>,
}

impl<'a> ContextAssembler<'a> {
    /// Assemble straight from the DAG (fallback path only).
    pub fn new(dag: &'a ConversationDag) -> Self {
        Self { dag, chunks: None }
    }

    /// Use a chunk store for tiered selection.
    pub fn with_chunk_store(mut self, chunks: &'a ChunkStore) -> Self {
        self.chunks = Some(chunks);
        self
    }

    /// Prompt-ready text fragments for a query within a token budget.
    ///
    /// Hot items expand to one `role: content` line per turn; warm items
    /// render as `[Context: summary]`; cold items as
    /// `[Earlier context: summary]`. Selection is budget-driven; the query
    /// is the retrieval cue for future semantic selection and does not
    /// affect the sync path.
    pub fn context_for_prompt(&self, _query: &str, max_tokens: usize) -> Vec<String> {
        let mut lines = Vec::new();
        for item in self.select_items(max_tokens) {
            match item {
                ContextItem::Hot { turn_ids, .. } => {
                    for turn_id in turn_ids {
                        if let Ok(turn) = self.dag.get_turn(turn_id) {
                            lines.push(turn.as_prompt_line());
                        }
                    }
                }
                ContextItem::Warm { summary, .. } => {
                    lines.push(format!("[Context: {summary}]"));
                }
                ContextItem::Cold { summary, .. } => {
                    lines.push(format!("[Earlier context: {summary}]"));
                }
            }
        }
        lines
    }

    /// Build a message list: index 0 is the system prompt plus every
    /// active learning, followed by the budgeted hot/warm/cold items.
    pub fn assemble_messages(
        &self,
        query: &str,
        system_prompt: &str,
        max_tokens: usize,
    ) -> AssembledContext {
        self.assemble(query, system_prompt, max_tokens, None)
    }

    /// Like [`ContextAssembler::assemble_messages`], with items reordered
    /// by descending focus overlap before rendering. The underlying
    /// selection is unchanged - only presentation order moves.
    pub fn assemble_messages_focused(
        &self,
        query: &str,
        system_prompt: &str,
        max_tokens: usize,
        focus: &Focus,
    ) -> AssembledContext {
        self.assemble(query, system_prompt, max_tokens, Some(focus))
    }

    fn assemble(
        &self,
        _query: &str,
        system_prompt: &str,
        max_tokens: usize,
        focus: Option<&Focus>,
    ) -> AssembledContext {
        let mut items = self.select_items(max_tokens);

        if let Some(focus) = focus {
            let mut scored: Vec<(f32, ContextItem)> = items
                .into_iter()
                .map(|item| (self.focus_score(focus, &item), item))
                .collect();
            scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
            items = scored.into_iter().map(|(_, item)| item).collect();
        }

        let mut stats = ContextStats::default();
        let mut messages = vec![PromptMessage {
            role: "system".to_string(),
            content: self.system_content(system_prompt),
        }];

        for item in items {
            match item {
                ContextItem::Hot { turn_ids, .. } => {
                    for turn_id in turn_ids {
                        if let Ok(turn) = self.dag.get_turn(turn_id) {
                            stats.hot_turns += 1;
                            messages.push(PromptMessage {
                                role: turn.role.as_message_role().to_string(),
                                content: turn.content.clone(),
                            });
                        }
                    }
                }
                ContextItem::Warm { summary, .. } => {
                    stats.warm_summaries += 1;
                    messages.push(PromptMessage {
                        role: "system".to_string(),
                        content: format!("[Context: {summary}]"),
                    });
                }
                ContextItem::Cold { summary, .. } => {
                    stats.cold_summaries += 1;
                    messages.push(PromptMessage {
                        role: "system".to_string(),
                        content: format!("[Earlier context: {summary}]"),
                    });
                }
            }
        }

        stats.compression_applied = stats.warm_summaries + stats.cold_summaries > 0;
        AssembledContext { messages, stats }
    }

    fn system_content(&self, system_prompt: &str) -> String {
        let learnings = self.dag.get_active_learnings();
        if learnings.is_empty() {
            return system_prompt.to_string();
        }
        let mut content = String::from(system_prompt);
        content.push('\n');
        for learning in learnings {
            content.push_str(&format!("\n- [{}] {}", learning.category, learning.fact));
        }
        content
    }

    fn select_items(&self, max_tokens: usize) -> Vec<ContextItem> {
        match self.chunks {
            Some(store) => store.context_window(max_tokens),
            None => self.fallback_items(max_tokens),
        }
    }

    /// No chunk store: greedily walk backward from the most recent turn
    /// and stop once the running total would exceed the budget. Not
    /// token-optimal, but it never overshoots.
    fn fallback_items(&self, max_tokens: usize) -> Vec<ContextItem> {
        let Some(head) = self.dag.active_head() else {
            return Vec::new();
        };
        let path: Vec<&Turn> = self.dag.get_path_to(head).unwrap_or_default();

        let mut total = 0usize;
        let mut taken: Vec<(usize, &Turn)> = Vec::new();
        for (index, turn) in path.iter().enumerate().rev() {
            if total + turn.token_count > max_tokens {
                break;
            }
            total += turn.token_count;
            taken.push((index, *turn));
        }
        taken.reverse();

        taken
            .into_iter()
            .map(|(index, turn)| ContextItem::Hot {
                chunk_id: format!("recent_{}", turn.id().short()),
                turn_ids: vec![turn.id()],
                turn_range: (index, index + 1),
                token_count: turn.token_count,
            })
            .collect()
    }

    fn focus_score(&self, focus: &Focus, item: &ContextItem) -> f32 {
        match item {
            ContextItem::Hot { turn_ids, .. } => turn_ids
                .iter()
                .filter_map(|id| self.dag.get_turn(*id).ok())
                .map(|turn| focus.score_tags(&turn.tags) + focus.score_text(&turn.content))
                .sum(),
            ContextItem::Warm { summary, .. } | ContextItem::Cold { summary, .. } => {
                focus.score_text(summary)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ContextConfig;
    use mnemo_core::{Learning, LearningCategory};

    fn dag_with_turns(contents: &[&str]) -> ConversationDag {
        let mut dag = ConversationDag::new();
        for content in contents {
            let parents = dag.active_head().into_iter().collect();
            dag.add_turn(Turn::user(*content, parents)).unwrap();
        }
        dag
    }

    #[test]
    fn system_message_carries_active_learnings() {
        let mut dag = dag_with_turns(&["hello there"]);
        dag.add_learning(Learning::new(
            LearningCategory::Constraint,
            "tests required before merge",
            vec![],
            0.9,
        ));
        let superseded = dag.add_learning(Learning::new(
            LearningCategory::Fact,
            "timeout is 5s",
            vec![],
            0.9,
        ));
        dag.supersede_learning(
            superseded,
            Learning::new(LearningCategory::Fact, "timeout is 10s", vec![], 0.9),
        )
        .unwrap();

        let assembler = ContextAssembler::new(&dag);
        let assembled = assembler.assemble_messages("q", "You are an agent.", 1000);

        let system = &assembled.messages[0];
        assert_eq!(system.role, "system");
        assert!(system.content.starts_with("You are an agent."));
        assert!(system.content.contains("- [constraint] tests required before merge"));
        assert!(system.content.contains("- [fact] timeout is 10s"));
        assert!(!system.content.contains("timeout is 5s"));
    }

    #[test]
    fn fallback_respects_token_budget() {
        let dag = dag_with_turns(&[
            "first turn with a handful of words here",
            "second turn with a handful of words here",
            "third turn with a handful of words here",
        ]);
        let assembler = ContextAssembler::new(&dag);

        let per_turn = dag.get_recent_turns(1)[0].token_count;
        let assembled = assembler.assemble_messages("q", "sys", per_turn * 2);

        assert_eq!(assembled.stats.hot_turns, 2);
        assert!(!assembled.stats.compression_applied);
        // Most recent turns kept, oldest dropped, chronological order.
        assert!(assembled.messages[1].content.starts_with("second"));
        assert!(assembled.messages[2].content.starts_with("third"));
    }

    #[test]
    fn fallback_zero_budget_keeps_nothing() {
        let dag = dag_with_turns(&["some words in a turn"]);
        let assembler = ContextAssembler::new(&dag);
        let assembled = assembler.assemble_messages("q", "sys", 0);
        assert_eq!(assembled.stats.hot_turns, 0);
        assert_eq!(assembled.messages.len(), 1);
    }

    #[test]
    fn tiered_rendering_tags_each_level() {
        let mut dag = ConversationDag::new();
        let mut store = ChunkStore::new(ContextConfig {
            chunk_size: 2,
            hot_chunks: 1,
            warm_chunks: 1,
        });
        for i in 0..8 {
            let parents = dag.active_head().into_iter().collect();
            let id = dag
                .add_turn(Turn::user(format!("conversation turn {i} content"), parents))
                .unwrap();
            store.add_turn(&dag, id).unwrap();
        }

        let assembler = ContextAssembler::new(&dag).with_chunk_store(&store);
        let lines = assembler.context_for_prompt("q", 10_000);

        assert!(lines.iter().any(|l| l.starts_with("user: ")));
        assert!(lines.iter().any(|l| l.starts_with("[Context: ")));
        assert!(lines.iter().any(|l| l.starts_with("[Earlier context: ")));

        let assembled = assembler.assemble_messages("q", "sys", 10_000);
        assert!(assembled.stats.hot_turns > 0);
        assert!(assembled.stats.warm_summaries > 0);
        assert!(assembled.stats.cold_summaries > 0);
        assert!(assembled.stats.compression_applied);
    }

    #[test]
    fn focus_reorders_without_changing_selection() {
        let mut dag = ConversationDag::new();
        let a = dag
            .add_turn(Turn::user("all about redis eviction", vec![]).with_tags(["redis"]))
            .unwrap();
        dag.add_turn(Turn::user("all about oauth tokens", vec![a]).with_tags(["oauth"]))
            .unwrap();
        let assembler = ContextAssembler::new(&dag);

        let mut focus = Focus::new();
        focus.absorb("oauth token refresh");

        let plain = assembler.assemble_messages("q", "sys", 10_000);
        let focused = assembler.assemble_messages_focused("q", "sys", 10_000, &focus);

        // Same contents either way.
        let mut plain_bodies: Vec<&String> =
            plain.messages[1..].iter().map(|m| &m.content).collect();
        let mut focused_bodies: Vec<&String> =
            focused.messages[1..].iter().map(|m| &m.content).collect();
        plain_bodies.sort();
        focused_bodies.sort();
        assert_eq!(plain_bodies, focused_bodies);

        // Plain order is chronological (redis first); focus moves the
        // oauth turn to the front without dropping anything.
        assert!(plain.messages[1].content.contains("redis"));
        assert!(focused.messages[1].content.contains("oauth"));
    }
}
