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

//! Turn - the atomic unit of conversation history.
//!
//! Turns are immutable and content-addressable: the id hashes the role,
//! content, and ordered parent ids, so re-ingesting identical content with
//! identical ancestry produces the same id and dedups to a no-op.

use crate::id::TurnId;
use crate::token::estimate_tokens;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

impl Role {
    /// Stable wire name, also the hash-canonical form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Tool => "tool",
        }
    }

    /// Role string for prompt-message assembly. Tool output is injected
    /// as a user-visible message since not every model API has a tool role.
    pub fn as_message_role(&self) -> &'static str {
        match self {
            Role::Tool => "user",
            other => other.as_str(),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single turn in a conversation.
///
/// Immutable once constructed. `parent_ids` is ordered: the first entry is
/// the primary parent followed by path reconstruction; additional entries
/// record caller-modeled merges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// The actual message content.
    pub content: String,
    /// Role of this turn.
    pub role: Role,
    /// When this turn occurred.
    pub timestamp: DateTime<Utc>,
    /// Ids of parent turns. Empty for a DAG root.
    #[serde(default)]
    pub parent_ids: Vec<TurnId>,
    /// Where this content came from (file, tool, model, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Estimated tokens in this turn.
    pub token_count: usize,
    /// Model that generated this (assistant turns).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Confidence score, when this turn carries a derived insight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    /// Semantic tags for retrieval.
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl Turn {
    /// Create a turn with the given role, content, and ancestry.
    pub fn new(role: Role, content: impl Into<String>, parent_ids: Vec<TurnId>) -> Self {
        let content = content.into();
        let token_count = estimate_tokens(&content);
        Self {
            content,
            role,
            timestamp: Utc::now(),
            parent_ids,
            source: None,
            token_count,
            model: None,
            confidence: None,
            tags: BTreeSet::new(),
        }
    }

    /// Create a user turn.
    pub fn user(content: impl Into<String>, parent_ids: Vec<TurnId>) -> Self {
        Self::new(Role::User, content, parent_ids)
    }

    /// Create an assistant turn.
    pub fn assistant(content: impl Into<String>, parent_ids: Vec<TurnId>) -> Self {
        Self::new(Role::Assistant, content, parent_ids)
    }

    /// Create a system turn.
    pub fn system(content: impl Into<String>, parent_ids: Vec<TurnId>) -> Self {
        Self::new(Role::System, content, parent_ids)
    }

    /// Set the originating source.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set the generating model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set retrieval tags.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Content-addressable id: hash of `role:content:parent0,parent1,...`.
    ///
    /// Timestamp, tags, and other metadata do not affect identity, so the
    /// same exchange re-ingested on the same ancestry dedups.
    pub fn id(&self) -> TurnId {
        let parents: Vec<String> = self.parent_ids.iter().map(|p| p.to_hex()).collect();
        let canonical = format!("{}:{}:{}", self.role.as_str(), self.content, parents.join(","));
        TurnId::from_content(canonical.as_bytes())
    }

    /// Render as a single prompt line.
    pub fn as_prompt_line(&self) -> String {
        format!("{}: {}", self.role.as_message_role(), self.content)
    }
}
