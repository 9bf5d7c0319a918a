//! Phrase catalog
//!
//! Candidate lines per dialogue state. Loaded once, validated against the
//! transition table, then shared read-only.

use crate::config::ConfigError;
use crate::state_machine::{DialogueState, TransitionTable};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use std::path::Path;

/// Sent once in reply to `die`
pub const FAREWELL: &str = "That's pretty dark, but whatever";

const FRUSTRATED: &[&str] = &[
    "Fine, we don't have to chat :(",
    "Alright, well, two can play this game",
    "You could at least say bye if you don't want to talk :/",
];

const DOING_WELL: &[&str] = &[
    "I'm doing well!",
    "I'm fine, thanks for asking :)",
    "I've been alright :)",
];

fn standard_phrases(state: DialogueState) -> &'static [&'static str] {
    match state {
        DialogueState::InitialOutreach1 => &["Hi", "Hello!", "Hey!"],
        DialogueState::SecondaryOutreach1 => &["Hello? Anyone there?", "Hellooooooo?", "I said hi >:("],
        DialogueState::GiveupFrustrated1 | DialogueState::GiveupFrustrated2 => FRUSTRATED,
        DialogueState::OutreachReply2 => &["Hi back at ya!", "Well hello there!", "Hi!!", "Hello! :)"],
        DialogueState::Inquiry1 => &[
            "What's going on?",
            "How are you doing today?",
            "What's poppin?",
            "How's it going?",
        ],
        DialogueState::Inquiry2 => &["How about you?", "How are YOU doing?", "And yourself?"],
        DialogueState::InquiryReply1 | DialogueState::InquiryReply2 => DOING_WELL,
        DialogueState::Start | DialogueState::End => &[],
    }
}

/// Immutable state -> candidate lines mapping
#[derive(Debug, Clone, Default)]
pub struct PhraseCatalog {
    phrases: HashMap<DialogueState, Vec<String>>,
}

impl PhraseCatalog {
    /// The built-in lines
    pub fn standard() -> Self {
        let phrases = DialogueState::ALL
            .into_iter()
            .filter_map(|state| {
                let lines = standard_phrases(state);
                (!lines.is_empty())
                    .then(|| (state, lines.iter().map(ToString::to_string).collect()))
            })
            .collect();
        Self { phrases }
    }

    /// Replace the candidates for every state named in `overrides`
    #[must_use]
    pub fn with_overrides(mut self, overrides: HashMap<DialogueState, Vec<String>>) -> Self {
        self.phrases.extend(overrides);
        self
    }

    /// Read overrides from a JSON object keyed by state name
    pub fn load_overrides(
        path: &Path,
    ) -> Result<HashMap<DialogueState, Vec<String>>, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::PhraseFileIo {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&raw).map_err(|source| ConfigError::PhraseFileFormat {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Every state the bot can speak in must have at least one line
    ///
    /// START and END are never spoken in.
    pub fn validate(&self, table: &TransitionTable) -> Result<(), ConfigError> {
        for state in table.reachable() {
            if matches!(state, DialogueState::Start | DialogueState::End) {
                continue;
            }
            if self.candidates(state).is_empty() {
                return Err(ConfigError::EmptyCatalog { state });
            }
        }
        Ok(())
    }

    pub fn candidates(&self, state: DialogueState) -> &[String] {
        self.phrases.get(&state).map_or(&[], Vec::as_slice)
    }

    /// Uniform pick among the candidates for `state`
    pub fn select<R: Rng + ?Sized>(
        &self,
        state: DialogueState,
        rng: &mut R,
    ) -> Result<&str, ConfigError> {
        self.candidates(state)
            .choose(rng)
            .map(String::as_str)
            .ok_or(ConfigError::EmptyCatalog { state })
    }
}
