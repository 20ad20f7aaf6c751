use crate::dialog::TurnResponse;
use crate::resolver::normalize;
use crate::slots::Slots;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Repeats of the same utterance inside this window are dropped.
const DEDUPE_WINDOW_MS: i64 = 2000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastUtterance {
    /// Normalized text.
    pub text: String,
    pub at: DateTime<Utc>,
}

/// Caller-owned state of one conversation, carried between turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    #[serde(default)]
    pub slots: Slots,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_utterance: Option<LastUtterance>,
    #[serde(default)]
    pub turns: u32,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    pub fn with_id(id: Uuid) -> Self {
        Self {
            id,
            slots: Slots::new(),
            last_utterance: None,
            turns: 0,
        }
    }

    /// False for empty input and for an echo of the previous utterance
    /// arriving within the dedupe window.
    pub fn should_process(&self, text: &str, now: DateTime<Utc>) -> bool {
        let text = normalize(text);
        if text.is_empty() {
            return false;
        }
        match &self.last_utterance {
            Some(last) if last.text == text => {
                now - last.at >= TimeDelta::milliseconds(DEDUPE_WINDOW_MS)
            }
            _ => true,
        }
    }

    pub fn record(&mut self, text: &str, now: DateTime<Utc>) {
        self.last_utterance = Some(LastUtterance {
            text: normalize(text),
            at: now,
        });
    }

    /// Adopts the slots returned by a turn.
    pub fn apply(&mut self, response: &TurnResponse) {
        self.slots = response.slots.clone();
        self.turns += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_utterance_is_deduplicated_within_window() {
        let mut conversation = Conversation::new();
        let t0 = Utc::now();

        assert!(conversation.should_process("KFC w Katowicach", t0));
        conversation.record("KFC w Katowicach", t0);

        let echo = t0 + TimeDelta::milliseconds(500);
        assert!(!conversation.should_process("kfc w katowicach!", echo));
        assert!(conversation.should_process("taxi do centrum", echo));

        let later = t0 + TimeDelta::milliseconds(2500);
        assert!(conversation.should_process("KFC w Katowicach", later));
    }

    #[test]
    fn blank_input_is_never_processed() {
        let conversation = Conversation::new();
        assert!(!conversation.should_process("  ...  ", Utc::now()));
    }

    #[test]
    fn apply_replaces_slots_and_counts_turns() {
        let mut conversation = Conversation::new();
        let slots = Slots {
            item: Some("pizza".into()),
            ..Slots::default()
        };
        conversation.apply(&TurnResponse::new("Jaki rozmiar?", slots.clone()));

        assert_eq!(conversation.slots, slots);
        assert_eq!(conversation.turns, 1);
    }

    #[test]
    fn round_trips_through_json() {
        let mut conversation = Conversation::new();
        conversation.record("pizza", Utc::now());
        conversation.turns = 3;

        let json = serde_json::to_string(&conversation).unwrap();
        assert!(json.contains("\"lastUtterance\""));
        let back: Conversation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, conversation);
    }
}
