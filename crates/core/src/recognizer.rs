use crate::capture::{
    CaptureConfig, CaptureEvent, CaptureInput, CaptureSession, RecognitionEvent,
};
use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// A speech recognition backend.
///
/// The backend pushes what it hears back into the driver's message channel as
/// [`CaptureMsg::Engine`] signals; the driver only tells it when to begin and
/// when to end.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Recognizer: Send {
    fn is_available(&self) -> bool;

    async fn begin(&mut self) -> Result<()>;

    async fn end(&mut self) -> Result<()>;
}

/// What the recognition backend reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineSignal {
    Results(RecognitionEvent),
    Ended,
    Failed(String),
}

/// Messages accepted by [`run_capture`]. Control and engine traffic share one
/// channel so their relative order is preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureMsg {
    Start,
    Stop,
    Engine(EngineSignal),
    Shutdown,
}

impl From<EngineSignal> for CaptureInput {
    fn from(signal: EngineSignal) -> Self {
        match signal {
            EngineSignal::Results(event) => CaptureInput::Results(event),
            EngineSignal::Ended => CaptureInput::EngineEnded,
            EngineSignal::Failed(reason) => CaptureInput::EngineFailed(reason),
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Drives a [`CaptureSession`] against a recognizer until the message
/// channel closes or `Shutdown` arrives. Lifecycle events are forwarded to
/// `events_tx`; `Finalized` carries the utterance for the dialog.
pub async fn run_capture<R: Recognizer>(
    mut recognizer: R,
    config: CaptureConfig,
    mut msg_rx: mpsc::Receiver<CaptureMsg>,
    events_tx: mpsc::Sender<CaptureEvent>,
) -> Result<()> {
    let mut session = CaptureSession::new(config);

    loop {
        let deadline = session.next_deadline();
        let events = tokio::select! {
            msg = msg_rx.recv() => match msg {
                Some(CaptureMsg::Start) => {
                    if !recognizer.is_available() {
                        tracing::warn!("speech recognition unavailable");
                        vec![CaptureEvent::Unsupported]
                    } else {
                        match session.start(Instant::now()) {
                            Ok(events) => match recognizer.begin().await {
                                Ok(()) => events,
                                Err(e) => {
                                    tracing::error!("recognizer failed to begin: {:?}", e);
                                    session.handle(
                                        CaptureInput::EngineFailed(e.to_string()),
                                        Instant::now(),
                                    )
                                }
                            },
                            Err(e) => {
                                tracing::debug!("ignoring start: {}", e);
                                vec![]
                            }
                        }
                    }
                }
                Some(CaptureMsg::Stop) => session.stop(),
                Some(CaptureMsg::Engine(signal)) => session.handle(signal.into(), Instant::now()),
                Some(CaptureMsg::Shutdown) | None => {
                    session.cancel();
                    break;
                }
            },
            _ = sleep_until(deadline) => session.handle(CaptureInput::Tick, Instant::now()),
        };

        for event in events {
            if event == CaptureEvent::StopRequested {
                if let Err(e) = recognizer.end().await {
                    tracing::warn!("recognizer failed to end: {:?}", e);
                }
                continue;
            }
            if events_tx.send(event).await.is_err() {
                tracing::debug!("capture event receiver dropped, stopping driver");
                return Ok(());
            }
        }
    }

    tracing::debug!("capture driver shut down");
    Ok(())
}

/// A recognizer that is fed from outside, e.g. typed text replayed as speech.
/// Ending it acknowledges immediately with [`EngineSignal::Ended`].
pub struct ChannelRecognizer {
    msg_tx: mpsc::Sender<CaptureMsg>,
}

impl ChannelRecognizer {
    pub fn new(msg_tx: mpsc::Sender<CaptureMsg>) -> Self {
        Self { msg_tx }
    }
}

#[async_trait]
impl Recognizer for ChannelRecognizer {
    fn is_available(&self) -> bool {
        !self.msg_tx.is_closed()
    }

    async fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    async fn end(&mut self) -> Result<()> {
        // `try_send` keeps the driver from waiting on its own full channel.
        self.msg_tx
            .try_send(CaptureMsg::Engine(EngineSignal::Ended))
            .map_err(|e| anyhow::anyhow!("failed to acknowledge end of capture: {e}"))
    }
}

/// Replays a typed line as a burst of growing interim results followed by a
/// single final result.
pub fn simulate_speech(line: &str) -> Vec<EngineSignal> {
    use crate::capture::Alternative;

    let words: Vec<&str> = line.split_whitespace().collect();
    let mut signals: Vec<EngineSignal> = (1..words.len())
        .map(|n| {
            EngineSignal::Results(RecognitionEvent::new(vec![Alternative::interim(
                words[..n].join(" "),
            )]))
        })
        .collect();
    if !words.is_empty() {
        signals.push(EngineSignal::Results(RecognitionEvent::new(vec![
            Alternative::final_text(words.join(" ")),
        ])));
    }
    signals
}
