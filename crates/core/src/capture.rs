//! Speech capture session.
//!
//! Turns a live stream of partial/final recognition results into exactly one
//! finalized utterance per recording attempt. The session is a plain state
//! machine: the caller feeds it [`CaptureInput`]s together with the current
//! time and applies the [`CaptureEvent`]s it returns. Timer expiry is just
//! another input (`Tick`), so silence and hard-stop races can be exercised by
//! passing synthetic instants.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// One recognition hypothesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alternative {
    pub text: String,
    pub is_final: bool,
}

impl Alternative {
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }

    pub fn final_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }
}

/// A single event from the transcription stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionEvent {
    pub results: Vec<Alternative>,
}

impl RecognitionEvent {
    pub fn new(results: Vec<Alternative>) -> Self {
        Self { results }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Listening,
    Interim,
    Final,
    Ending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConfig {
    pub silence_timeout: Duration,
    pub hard_stop: Duration,
    /// Request a stop as soon as any final result arrives instead of
    /// waiting for the silence timer.
    pub stop_on_final: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            silence_timeout: Duration::from_millis(1000),
            hard_stop: Duration::from_millis(9000),
            stop_on_final: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("a capture session is already active")]
    AlreadyActive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureInput {
    Results(RecognitionEvent),
    /// The recognition engine ended on its own or after a stop request.
    EngineEnded,
    EngineFailed(String),
    /// Time has advanced; fire any expired deadline.
    Tick,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    Listening,
    Interim(String),
    /// The engine should be asked to end.
    StopRequested,
    /// The session is no longer active. Always precedes `Finalized`.
    Inactive,
    Finalized(String),
    Aborted(String),
    Unsupported,
}

#[derive(Debug)]
pub struct CaptureSession {
    config: CaptureConfig,
    state: CaptureState,
    final_text: String,
    interim_text: String,
    silence_deadline: Option<Instant>,
    hard_stop_deadline: Option<Instant>,
}

impl CaptureSession {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            state: CaptureState::Idle,
            final_text: String::new(),
            interim_text: String::new(),
            silence_deadline: None,
            hard_stop_deadline: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state != CaptureState::Idle
    }

    pub fn final_text(&self) -> &str {
        &self.final_text
    }

    pub fn interim_text(&self) -> &str {
        &self.interim_text
    }

    /// The earliest armed deadline, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.silence_deadline, self.hard_stop_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn start(&mut self, now: Instant) -> Result<Vec<CaptureEvent>, CaptureError> {
        if self.is_active() {
            return Err(CaptureError::AlreadyActive);
        }
        self.clear();
        self.hard_stop_deadline = Some(now + self.config.hard_stop);
        self.state = CaptureState::Listening;
        tracing::debug!("capture session listening");
        Ok(vec![CaptureEvent::Listening])
    }

    /// Asks the engine to end. No-op while ending or idle.
    pub fn stop(&mut self) -> Vec<CaptureEvent> {
        match self.state {
            CaptureState::Listening | CaptureState::Interim | CaptureState::Final => {
                self.begin_ending()
            }
            CaptureState::Ending | CaptureState::Idle => vec![],
        }
    }

    /// Caller teardown: drop everything without emitting text.
    pub fn cancel(&mut self) {
        if self.is_active() {
            tracing::debug!("capture session cancelled");
        }
        self.clear();
    }

    pub fn handle(&mut self, input: CaptureInput, now: Instant) -> Vec<CaptureEvent> {
        if self.state == CaptureState::Idle {
            // Stale input from a previous cycle.
            return vec![];
        }

        match input {
            CaptureInput::Results(event) => self.on_results(event, now),
            CaptureInput::EngineEnded => self.finalize(),
            CaptureInput::EngineFailed(reason) => {
                tracing::warn!("recognition failed mid-session: {}", reason);
                self.clear();
                vec![CaptureEvent::Inactive, CaptureEvent::Aborted(reason)]
            }
            CaptureInput::Tick => self.on_tick(now),
        }
    }

    fn on_results(&mut self, event: RecognitionEvent, now: Instant) -> Vec<CaptureEvent> {
        if self.state == CaptureState::Ending {
            // Late results still count toward the utterance, but no longer
            // re-arm the silence timer.
            self.accumulate(&event);
            return vec![];
        }

        let has_final = self.accumulate(&event);
        self.silence_deadline = Some(now + self.config.silence_timeout);

        let mut events = Vec::new();
        if has_final {
            self.state = CaptureState::Final;
        } else if !self.interim_text.is_empty() {
            self.state = CaptureState::Interim;
            events.push(CaptureEvent::Interim(self.interim_text.clone()));
        }

        if has_final && self.config.stop_on_final {
            events.extend(self.begin_ending());
        }
        events
    }

    /// Folds one event into the accumulators. Returns whether it carried a
    /// final result.
    fn accumulate(&mut self, event: &RecognitionEvent) -> bool {
        let finals: Vec<&str> = event
            .results
            .iter()
            .filter(|alt| alt.is_final)
            .map(|alt| alt.text.trim())
            .filter(|text| !text.is_empty())
            .collect();

        if !finals.is_empty() {
            if !self.final_text.is_empty() {
                self.final_text.push(' ');
            }
            self.final_text.push_str(&finals.join(" "));
        }

        self.interim_text = event
            .results
            .iter()
            .filter(|alt| !alt.is_final)
            .map(|alt| alt.text.as_str())
            .collect::<String>()
            .trim()
            .to_string();

        event.results.iter().any(|alt| alt.is_final)
    }

    fn on_tick(&mut self, now: Instant) -> Vec<CaptureEvent> {
        if self.hard_stop_deadline.is_some_and(|deadline| now >= deadline) {
            tracing::debug!("hard stop reached, forcing end of capture");
            let mut events = Vec::new();
            if self.state != CaptureState::Ending {
                events.push(CaptureEvent::StopRequested);
            }
            events.extend(self.finalize());
            return events;
        }

        if self.silence_deadline.is_some_and(|deadline| now >= deadline) {
            tracing::debug!("silence detected, ending capture");
            self.silence_deadline = None;
            return self.stop();
        }

        vec![]
    }

    fn begin_ending(&mut self) -> Vec<CaptureEvent> {
        self.state = CaptureState::Ending;
        self.silence_deadline = None;
        vec![CaptureEvent::StopRequested]
    }

    fn finalize(&mut self) -> Vec<CaptureEvent> {
        let text = if self.final_text.trim().is_empty() {
            self.interim_text.trim().to_string()
        } else {
            self.final_text.trim().to_string()
        };
        self.clear();

        let mut events = vec![CaptureEvent::Inactive];
        if !text.is_empty() {
            tracing::info!("captured utterance: \"{}\"", text);
            events.push(CaptureEvent::Finalized(text));
        }
        events
    }

    fn clear(&mut self) {
        self.state = CaptureState::Idle;
        self.final_text.clear();
        self.interim_text.clear();
        self.silence_deadline = None;
        self.hard_stop_deadline = None;
    }
}
