//! Heuristic "looks like an AI prompt" classifier plus the text normalization
//! and hashing helpers shared by the capture pipeline and the reconciler.
//!
//! Classification is an ordered list of named predicates:
//!
//! 1. Every gate in [`GATES`] must pass, evaluated left to right. The first
//!    failing gate rejects the text and later gates are not evaluated.
//! 2. At least one signal in [`SIGNALS`] must hold, evaluated left to right.
//!    The first matching signal accepts the text.
//!
//! The order is part of the acceptance rule: the reported [`Verdict`] names the
//! first predicate that decided the outcome.

use serde::Serialize;

use crate::config::CaptureConfig;
use crate::patterns::{
    RE_ACTION_VERB, RE_ASSISTANT_CONTEXT, RE_BARE_URL, RE_INSTRUCTION, RE_WHITESPACE_RUN,
};

/// Maximum number of characters fed into the content hash.
pub const HASH_INPUT_CAP: usize = 4000;

/// Minimum word count for a prompt candidate.
pub const MIN_WORDS: usize = 5;

/// Why a text was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    Empty,
    LengthOutOfRange,
    WordCountOutOfRange,
    BareUrl,
    NoPromptSignal,
}

/// Which signal accepted a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Acceptance {
    Question,
    ActionVerb,
    AssistantInstruction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "verdict", content = "predicate")]
pub enum Verdict {
    Accepted(Acceptance),
    Rejected(Rejection),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted(_))
    }
}

/// A rejection gate: `passes` returns false to reject.
pub struct Gate {
    pub name: &'static str,
    pub rejection: Rejection,
    pub passes: fn(&str, &CaptureConfig) -> bool,
}

/// An acceptance signal: `holds` returns true to accept.
pub struct Signal {
    pub name: &'static str,
    pub acceptance: Acceptance,
    pub holds: fn(&str) -> bool,
}

pub const GATES: [Gate; 4] = [
    Gate {
        name: "non_empty",
        rejection: Rejection::Empty,
        passes: gate_non_empty,
    },
    Gate {
        name: "length_in_range",
        rejection: Rejection::LengthOutOfRange,
        passes: gate_length,
    },
    Gate {
        name: "word_count_in_range",
        rejection: Rejection::WordCountOutOfRange,
        passes: gate_word_count,
    },
    Gate {
        name: "not_bare_url",
        rejection: Rejection::BareUrl,
        passes: gate_not_bare_url,
    },
];

pub const SIGNALS: [Signal; 3] = [
    Signal {
        name: "has_question_mark",
        acceptance: Acceptance::Question,
        holds: has_question_mark,
    },
    Signal {
        name: "starts_with_action_verb",
        acceptance: Acceptance::ActionVerb,
        holds: starts_with_action_verb,
    },
    Signal {
        name: "assistant_context_with_instruction",
        acceptance: Acceptance::AssistantInstruction,
        holds: has_assistant_instruction,
    },
];

fn gate_non_empty(text: &str, _: &CaptureConfig) -> bool {
    !text.is_empty()
}

fn gate_length(text: &str, config: &CaptureConfig) -> bool {
    let len = text.chars().count();
    len >= config.min_chars && len <= config.max_chars
}

fn gate_word_count(text: &str, config: &CaptureConfig) -> bool {
    let words = text.split_whitespace().count();
    (MIN_WORDS..=config.max_word_count).contains(&words)
}

fn gate_not_bare_url(text: &str, _: &CaptureConfig) -> bool {
    !RE_BARE_URL.is_match(text)
}

fn has_question_mark(text: &str) -> bool {
    text.contains('?')
}

fn starts_with_action_verb(text: &str) -> bool {
    RE_ACTION_VERB.is_match(text)
}

fn has_assistant_instruction(text: &str) -> bool {
    RE_ASSISTANT_CONTEXT.is_match(text) && RE_INSTRUCTION.is_match(text)
}

/// Classifies clipboard text. The input is trimmed before any predicate runs.
pub fn classify(text: &str, config: &CaptureConfig) -> Verdict {
    let value = text.trim();

    if let Some(gate) = GATES.iter().find(|gate| !(gate.passes)(value, config)) {
        tracing::trace!(gate = gate.name, "Prompt candidate rejected");
        return Verdict::Rejected(gate.rejection);
    }

    match SIGNALS.iter().find(|signal| (signal.holds)(value)) {
        Some(signal) => {
            tracing::trace!(signal = signal.name, "Prompt candidate accepted");
            Verdict::Accepted(signal.acceptance)
        }
        None => Verdict::Rejected(Rejection::NoPromptSignal),
    }
}

pub fn is_likely_prompt(text: &str, config: &CaptureConfig) -> bool {
    classify(text, config).is_accepted()
}

/// Case-folded, whitespace-collapsed, length-capped form used for hashing and
/// duplicate comparison.
pub fn normalize_for_hash(value: &str) -> String {
    let lowered = value.trim().to_lowercase();
    let collapsed = RE_WHITESPACE_RUN.replace_all(&lowered, " ");
    collapsed.chars().take(HASH_INPUT_CAP).collect()
}

/// Stable content hash of the normalized text.
pub fn content_hash(value: &str) -> String {
    format!("{:x}", md5::compute(normalize_for_hash(value).as_bytes()))
}
