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

//! Problem Matcher
//!
//! Decides whether an incoming chat message belongs to one of the acting
//! actor's existing problems. Candidates are scanned in the order supplied
//! and the first one that clears the strategy's threshold wins; there is
//! no best-of-N ranking.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::{ActorId, Problem};
use crate::similarity::similarity;

/// How a message is compared against a candidate problem.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Count message tokens (every occurrence) that also appear in the
    /// problem's title + description, keeping only tokens longer than
    /// `min_token_len` characters. Both sides are lowercased and split on
    /// whitespace.
    KeywordOverlap {
        min_shared: usize,
        min_token_len: usize,
    },
    /// Use [`similarity`] between the message and title + description.
    Similarity { threshold: f64 },
}

impl Default for MatchStrategy {
    fn default() -> Self {
        Self::KeywordOverlap {
            min_shared: 2,
            min_token_len: 3,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProblemMatcher {
    strategy: MatchStrategy,
}

impl ProblemMatcher {
    pub fn new(strategy: MatchStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> MatchStrategy {
        self.strategy
    }

    /// First candidate owned by `actor` that matches `message`.
    pub fn match_problem<'a>(
        &self,
        message: &str,
        candidates: &'a [Problem],
        actor: ActorId,
    ) -> Option<&'a Problem> {
        candidates
            .iter()
            .filter(|problem| problem.created_by == actor)
            .find(|problem| self.is_match(message, problem))
    }

    fn is_match(&self, message: &str, problem: &Problem) -> bool {
        match self.strategy {
            MatchStrategy::KeywordOverlap {
                min_shared,
                min_token_len,
            } => shared_keywords(message, problem, min_token_len).len() >= min_shared,
            MatchStrategy::Similarity { threshold } => {
                similarity(message, &problem.searchable_text()) >= threshold
            }
        }
    }
}

/// Message tokens longer than `min_token_len` characters that appear in the
/// problem's searchable text, in message order. Repeats are kept.
pub fn shared_keywords(message: &str, problem: &Problem, min_token_len: usize) -> Vec<String> {
    let problem_tokens: BTreeSet<String> =
        lowercase_tokens(&problem.searchable_text()).into_iter().collect();
    lowercase_tokens(message)
        .into_iter()
        .filter(|token| token.chars().count() > min_token_len)
        .filter(|token| problem_tokens.contains(token))
        .collect()
}

fn lowercase_tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_owned)
        .collect()
}
