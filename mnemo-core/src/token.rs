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

//! Token estimation.
//!
//! Every budget computation in the workspace goes through this one
//! estimator so hot-tier selection, fallback truncation, and savings
//! arithmetic all agree on what a token costs.

/// Estimate the token count of a text (words x 1.3, minimum 1 for
/// non-empty input).
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    let words = text.split_whitespace().count();
    ((words as f64 * 1.3) as usize).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn nonempty_is_at_least_one() {
        assert_eq!(estimate_tokens("x"), 1);
    }

    #[test]
    fn scales_with_words() {
        // 10 words * 1.3 = 13
        let text = "one two three four five six seven eight nine ten";
        assert_eq!(estimate_tokens(text), 13);
    }
}
