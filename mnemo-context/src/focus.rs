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

//! Rolling topic focus.
//!
//! Each absorbed query bumps its topics and decays everything else, so
//! the focus tracks what the conversation is currently about. Consumers
//! score candidate items by topic overlap; scoring affects presentation
//! order only, never selection.

use std::collections::{BTreeMap, BTreeSet};

const DECAY: f32 = 0.8;
const PRUNE_BELOW: f32 = 0.05;

/// Rolling set of weighted topics derived from recent queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Focus {
    topics: BTreeMap<String, f32>,
}

impl Focus {
    /// Create an empty focus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a query into the focus: decay current topics, prune the
    /// negligible ones, then bump every topic token of the query.
    pub fn absorb(&mut self, query: &str) {
        for weight in self.topics.values_mut() {
            *weight *= DECAY;
        }
        self.topics.retain(|_, weight| *weight >= PRUNE_BELOW);

        for token in topic_tokens(query) {
            *self.topics.entry(token).or_insert(0.0) += 1.0;
        }
    }

    /// Overlap score of a set of tags against the current topics.
    pub fn score_tags(&self, tags: &BTreeSet<String>) -> f32 {
        tags.iter()
            .filter_map(|tag| self.topics.get(&tag.to_lowercase()))
            .sum()
    }

    /// Overlap score of free text against the current topics.
    pub fn score_text(&self, text: &str) -> f32 {
        topic_tokens(text)
            .into_iter()
            .filter_map(|token| self.topics.get(&token))
            .sum()
    }

    /// Topics ordered by descending weight, ties alphabetical.
    pub fn topics(&self) -> Vec<String> {
        let mut entries: Vec<(&String, &f32)> = self.topics.iter().collect();
        entries.sort_by(|a, b| {
            b.1.partial_cmp(a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        entries.into_iter().map(|(topic, _)| topic.clone()).collect()
    }

    /// Value snapshot for a worker thread. Scoring against the snapshot is
    /// unaffected by concurrent absorbs on the original.
    pub fn snapshot(&self) -> Focus {
        self.clone()
    }

    /// Whether any topics are tracked.
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

fn topic_tokens(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 3)
        .map(str::to_string)
        .collect()
}
