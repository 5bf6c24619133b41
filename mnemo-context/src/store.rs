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

//! Chunk store: tier lifecycle and token-budgeted selection.

use crate::chunk::{Chunk, ChunkSummary, ChunkTier, ContextItem};
use mnemo_core::{estimate_tokens, MemoryResult, TextGenerator, TurnId};
use mnemo_dag::ConversationDag;
use tracing::warn;

/// Tier sizing configuration.
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Turns per sealed chunk.
    pub chunk_size: usize,
    /// Sealed chunks kept at full fidelity before demotion.
    pub hot_chunks: usize,
    /// Summarized chunks kept expandable before going cold.
    pub warm_chunks: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            chunk_size: 10,
            hot_chunks: 2,
            warm_chunks: 4,
        }
    }
}

/// Counts snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkStoreStats {
    pub hot: usize,
    pub warm: usize,
    pub cold: usize,
    pub pending_turns: usize,
    pub total_ingested: usize,
}

/// Owns the tier-to-chunk mapping for one conversation.
///
/// Single-writer like the DAG it mirrors. Turn content is never copied
/// in; chunks hold ids and resolve them against the DAG at read time.
pub struct ChunkStore {
    config: ContextConfig,
    summarizer: Option<Box<dyn TextGenerator>>,
    /// Sealed hot and warm chunks, oldest first.
    chunks: Vec<Chunk>,
    /// Cold summaries, oldest first.
    cold: Vec<ChunkSummary>,
    /// Turns not yet sealed into a chunk.
    pending: Vec<TurnId>,
    pending_tokens: usize,
    ingested: usize,
}

impl ChunkStore {
    /// Create a store with the given tier sizing and no summarizer.
    pub fn new(config: ContextConfig) -> Self {
        Self {
            config,
            summarizer: None,
            chunks: Vec::new(),
            cold: Vec::new(),
            pending: Vec::new(),
            pending_tokens: 0,
            ingested: 0,
        }
    }

    /// Attach a summarization collaborator used when chunks demote. Its
    /// absence or failure falls back to a heuristic span summary, so
    /// demotion never blocks on a model call.
    pub fn with_summarizer(mut self, summarizer: Box<dyn TextGenerator>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// Ingest one turn (by id, resolved against the DAG). Seals a chunk
    /// every `chunk_size` turns and demotes overflowing tiers.
    pub fn add_turn(&mut self, dag: &ConversationDag, turn_id: TurnId) -> MemoryResult<()> {
        let turn = dag.get_turn(turn_id)?;
        self.pending.push(turn_id);
        self.pending_tokens += turn.token_count;
        self.ingested += 1;

        if self.pending.len() >= self.config.chunk_size {
            self.seal_pending(dag);
        }
        Ok(())
    }

    fn seal_pending(&mut self, dag: &ConversationDag) {
        if self.pending.is_empty() {
            return;
        }
        let turn_ids = std::mem::take(&mut self.pending);
        let token_count = std::mem::take(&mut self.pending_tokens);
        let turn_range = (self.ingested - turn_ids.len(), self.ingested);

        self.chunks.push(Chunk {
            id: Chunk::derive_id(&turn_ids),
            tier: ChunkTier::Hot,
            turn_ids,
            turn_range,
            summary: None,
            token_count,
        });

        self.demote_overflow(dag);
    }

    fn demote_overflow(&mut self, dag: &ConversationDag) {
        // Oldest hot chunks go warm once the hot tier overflows.
        while self.tier_count(ChunkTier::Hot) > self.config.hot_chunks {
            if let Some(pos) = self.chunks.iter().position(|c| c.tier == ChunkTier::Hot) {
                let summary = self.summarize_span(dag, &self.chunks[pos]);
                let chunk = &mut self.chunks[pos];
                chunk.summary = Some(summary);
                chunk.tier = ChunkTier::Warm;
            }
        }

        // Oldest warm chunks collapse to cold summaries.
        while self.tier_count(ChunkTier::Warm) > self.config.warm_chunks {
            if let Some(pos) = self.chunks.iter().position(|c| c.tier == ChunkTier::Warm) {
                let chunk = self.chunks.remove(pos);
                let summary = chunk.summary.unwrap_or_default();
                self.cold.push(ChunkSummary {
                    chunk_id: chunk.id,
                    turn_range: chunk.turn_range,
                    token_count: estimate_tokens(&summary),
                    summary,
                });
            }
        }
    }

    fn tier_count(&self, tier: ChunkTier) -> usize {
        self.chunks.iter().filter(|c| c.tier == tier).count()
    }

    fn summarize_span(&self, dag: &ConversationDag, chunk: &Chunk) -> String {
        if let Some(summarizer) = &self.summarizer {
            let mut prompt = String::from(
                "Summarize this conversation span in one or two sentences, \
                 keeping concrete facts and decisions:\n\n",
            );
            for turn_id in &chunk.turn_ids {
                if let Ok(turn) = dag.get_turn(*turn_id) {
                    let head: String = turn.content.chars().take(200).collect();
                    prompt.push_str(&format!("{}: {}\n", turn.role, head));
                }
            }
            match summarizer.generate(&prompt) {
                Ok(summary) if !summary.trim().is_empty() => return summary.trim().to_string(),
                Ok(_) => warn!(chunk = %chunk.id, "summarizer returned empty text, using heuristic"),
                Err(e) => warn!(chunk = %chunk.id, error = %e, "summarizer failed, using heuristic"),
            }
        }
        self.heuristic_summary(dag, chunk)
    }

    fn heuristic_summary(&self, dag: &ConversationDag, chunk: &Chunk) -> String {
        let head = |turn_id: &TurnId| -> String {
            dag.get_turn(*turn_id)
                .map(|t| t.content.chars().take(80).collect())
                .unwrap_or_default()
        };
        let (start, end) = chunk.turn_range;
        match (chunk.turn_ids.first(), chunk.turn_ids.last()) {
            (Some(first), Some(last)) if first != last => {
                format!(
                    "Turns {}-{}: started with \"{}\", ended with \"{}\"",
                    start + 1,
                    end,
                    head(first),
                    head(last)
                )
            }
            (Some(only), _) => format!("Turn {}: \"{}\"", start + 1, head(only)),
            _ => String::new(),
        }
    }

    /// Greedy token-budgeted selection, preferring full-fidelity recent
    /// content over compressed older content. The returned items are in
    /// chronological order and their summed cost never exceeds
    /// `max_tokens`.
    pub fn context_window(&self, max_tokens: usize) -> Vec<ContextItem> {
        let mut budget = max_tokens;
        let mut selected: Vec<ContextItem> = Vec::new();

        let mut try_take = |item: ContextItem, budget: &mut usize| {
            let cost = item.token_count();
            if cost <= *budget {
                *budget -= cost;
                selected.push(item);
            }
        };

        // Unsealed turns are the newest content of all.
        if !self.pending.is_empty() {
            try_take(
                ContextItem::Hot {
                    chunk_id: Chunk::derive_id(&self.pending),
                    turn_ids: self.pending.clone(),
                    turn_range: (self.ingested - self.pending.len(), self.ingested),
                    token_count: self.pending_tokens,
                },
                &mut budget,
            );
        }

        for chunk in self.chunks.iter().rev() {
            match chunk.tier {
                ChunkTier::Hot => try_take(
                    ContextItem::Hot {
                        chunk_id: chunk.id.clone(),
                        turn_ids: chunk.turn_ids.clone(),
                        turn_range: chunk.turn_range,
                        token_count: chunk.token_count,
                    },
                    &mut budget,
                ),
                ChunkTier::Warm => {
                    let summary = chunk.summary.clone().unwrap_or_default();
                    let token_count = estimate_tokens(&summary);
                    try_take(
                        ContextItem::Warm {
                            chunk_id: chunk.id.clone(),
                            summary,
                            turn_range: chunk.turn_range,
                            token_count,
                        },
                        &mut budget,
                    );
                }
                ChunkTier::Cold => {}
            }
        }

        for summary in self.cold.iter().rev() {
            try_take(
                ContextItem::Cold {
                    chunk_id: summary.chunk_id.clone(),
                    summary: summary.summary.clone(),
                    turn_range: summary.turn_range,
                    token_count: summary.token_count,
                },
                &mut budget,
            );
        }

        selected.sort_by_key(|item| item.range_start());
        selected
    }

    /// A warm chunk's full-fidelity view. Hot chunks return themselves;
    /// cold spans are no longer expandable through the store.
    pub fn expand(&self, chunk_id: &str) -> Option<&Chunk> {
        self.chunks.iter().find(|c| c.id == chunk_id)
    }

    /// Cold-tier summaries, oldest first.
    pub fn cold_summaries(&self) -> &[ChunkSummary] {
        &self.cold
    }

    /// Counts snapshot.
    pub fn stats(&self) -> ChunkStoreStats {
        ChunkStoreStats {
            hot: self.tier_count(ChunkTier::Hot),
            warm: self.tier_count(ChunkTier::Warm),
            cold: self.cold.len(),
            pending_turns: self.pending.len(),
            total_ingested: self.ingested,
        }
    }
}
