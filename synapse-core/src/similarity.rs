// Copyright 2025 Synapse Contributors
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

//! Keyword Similarity
//!
//! Relatedness score in `[0.0, 1.0]` for two short texts such as problem
//! titles:
//!
//! ```text
//! identical (after lowercase + trim)   → 1.0
//! one contains the other               → 0.8
//! otherwise                            → min(1.0, jaccard(A, B) + bonus)
//! ```
//!
//! `A` and `B` are whitespace tokens with stop words and tokens of two
//! characters or fewer removed. `bonus` is `0.2` when some pair of distinct
//! tokens across the sets looks like the same stem: one is a prefix of the
//! other, or one ends in `ing` while the other ends in `s`.

use std::collections::BTreeSet;

/// Articles, auxiliaries and prepositions ignored by [`similarity`].
pub const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "is", "are", "was", "were", "be", "been", "have", "has", "had", "do", "does", "did", "will",
    "would", "could", "should", "may", "might", "can", "must",
];

const EXACT_SCORE: f64 = 1.0;
const CONTAINMENT_SCORE: f64 = 0.8;
const STEM_BONUS: f64 = 0.2;

/// Tokens this short (in characters) carry no signal.
const MAX_DISCARDED_TOKEN_LEN: usize = 2;

/// Lowercased whitespace tokens with stop words and short tokens removed.
pub fn tokenize_filtered(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .filter(|token| token.chars().count() > MAX_DISCARDED_TOKEN_LEN)
        .filter(|token| !STOP_WORDS.contains(token))
        .map(str::to_owned)
        .collect()
}

/// Score how related two texts are. Symmetric in its arguments.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();

    if a == b {
        return EXACT_SCORE;
    }
    // The empty string is contained in everything.
    if a.contains(&b) || b.contains(&a) {
        return CONTAINMENT_SCORE;
    }

    let left = tokenize_filtered(&a);
    let right = tokenize_filtered(&b);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }

    let shared = left.intersection(&right).count();
    let union = left.union(&right).count();
    let jaccard = shared as f64 / union as f64;

    let bonus = if has_related_stems(&left, &right) {
        STEM_BONUS
    } else {
        0.0
    };

    (jaccard + bonus).min(1.0)
}

fn has_related_stems(left: &BTreeSet<String>, right: &BTreeSet<String>) -> bool {
    left.iter().any(|x| {
        right
            .iter()
            .any(|y| x != y && stems_related(x, y))
    })
}

fn stems_related(x: &str, y: &str) -> bool {
    x.starts_with(y)
        || y.starts_with(x)
        || (x.ends_with("ing") && y.ends_with('s'))
        || (x.ends_with('s') && y.ends_with("ing"))
}
