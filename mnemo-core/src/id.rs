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

//! Content-addressable identifiers.
//!
//! A [`MemoryId`] is the first 16 bytes of a BLAKE3 hash over a canonical
//! serialization of the identified record. Same content, same id - which is
//! what makes deduplication an O(1) map probe everywhere in the engine.
//! Ids serialize as hex strings so persisted JSON stays readable.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 128-bit content-derived identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemoryId(pub [u8; 16]);

/// Identifier of a [`crate::Turn`].
pub type TurnId = MemoryId;

/// Identifier of a [`crate::Learning`].
pub type LearningId = MemoryId;

/// Identifier of an entity node in the topology store.
pub type EntityId = MemoryId;

impl MemoryId {
    /// Derive an id from canonical content bytes.
    pub fn from_content(content: &[u8]) -> Self {
        let hash = blake3::hash(content);
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&hash.as_bytes()[..16]);
        Self(bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Full hex representation (32 chars).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex prefix for display (12 chars).
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }

    /// Parse from a full hex string.
    pub fn from_hex(hex_str: &str) -> Result<Self, IdParseError> {
        let bytes = hex::decode(hex_str).map_err(|_| IdParseError::InvalidHex)?;
        if bytes.len() != 16 {
            return Err(IdParseError::InvalidLength);
        }
        let mut arr = [0u8; 16];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl std::fmt::Display for MemoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.short())
    }
}

impl Serialize for MemoryId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for MemoryId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        MemoryId::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Errors parsing a hex id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdParseError {
    InvalidHex,
    InvalidLength,
}

impl std::fmt::Display for IdParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdParseError::InvalidHex => write!(f, "invalid hex string"),
            IdParseError::InvalidLength => write!(f, "invalid length (expected 16 bytes)"),
        }
    }
}

impl std::error::Error for IdParseError {}
