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

//! Problem Creation Policy
//!
//! Decides whether a message that matched no existing problem should spawn
//! a new one, and derives the new problem's title from the message.

use serde::{Deserialize, Serialize};

/// Substrings that suggest the message describes something to work on.
/// Entries with a trailing space only match when a space follows them.
pub const PROBLEM_KEYWORDS: &[&str] = &[
    "problem",
    "issue",
    "bug",
    "error",
    "fix",
    "solve",
    "help",
    "trouble",
    "difficulty",
    "challenge",
    "question",
    "how ",
    "why",
    "what ",
    "broken",
    "not working",
    "failed",
    "stuck",
    "confused",
    "need help",
    "chat",
    "discuss",
    "talk",
    "conversation",
    "ask",
    "tell",
    "explain",
];

pub const ELLIPSIS: &str = "...";

const LONG_MESSAGE_CHARS: usize = 20;
const TITLE_WORDS: usize = 6;
const TITLE_MIN_WORD_CHARS: usize = 3;
const TITLE_FALLBACK_CHARS: usize = 80;
const CONVERSATION_TITLE_CHARS: usize = 50;

/// Whether unmatched messages always create a problem or need a signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreationMode {
    /// Every unmatched auto-linked message becomes a problem.
    #[default]
    Always,
    /// At least one of the [`CreationSignals`] must be present.
    Heuristic,
}

/// The individual signals evaluated for a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CreationSignals {
    pub has_keyword: bool,
    pub is_long: bool,
    pub has_question_mark: bool,
    pub is_first_message: bool,
}

impl CreationSignals {
    pub fn any(&self) -> bool {
        self.has_keyword || self.is_long || self.has_question_mark || self.is_first_message
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CreationPolicy {
    mode: CreationMode,
}

impl CreationPolicy {
    pub fn new(mode: CreationMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> CreationMode {
        self.mode
    }

    pub fn signals(message: &str, is_first_message: bool) -> CreationSignals {
        let lowered = message.to_lowercase();
        CreationSignals {
            has_keyword: PROBLEM_KEYWORDS.iter().any(|kw| lowered.contains(kw)),
            is_long: message.chars().count() > LONG_MESSAGE_CHARS,
            has_question_mark: message.contains('?'),
            is_first_message,
        }
    }

    pub fn should_create_problem(&self, message: &str, is_first_message: bool) -> bool {
        match self.mode {
            CreationMode::Always => true,
            CreationMode::Heuristic => Self::signals(message, is_first_message).any(),
        }
    }
}

/// Title for a problem spawned from `message`: the first six words longer
/// than three characters, or the raw message capped at 80 characters when
/// no such word exists.
pub fn synthesize_title(message: &str) -> String {
    let words: Vec<&str> = message
        .split_whitespace()
        .filter(|word| word.chars().count() > TITLE_MIN_WORD_CHARS)
        .collect();

    if words.is_empty() {
        return truncate_with_ellipsis(message, TITLE_FALLBACK_CHARS);
    }

    let mut title = words[..words.len().min(TITLE_WORDS)].join(" ");
    if words.len() > TITLE_WORDS {
        title.push_str(ELLIPSIS);
    }
    title
}

/// Display title for a conversation started by `message`.
pub fn conversation_title(message: &str) -> String {
    truncate_with_ellipsis(message, CONVERSATION_TITLE_CHARS)
}

fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &text[..cut], ELLIPSIS),
        None => text.to_string(),
    }
}
