use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use order_core::Command;
use order_core::capture::CaptureEvent;
use order_core::conversation::Conversation;
use order_core::recognizer::{CaptureMsg, ChannelRecognizer, run_capture, simulate_speech};
use orderbot::config::Config;
use orderbot::{catalog_loader, session_store};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(version, about = "Order food or a ride by talking to a bot")]
struct Cli {
    /// Replay typed lines through the speech capture session as simulated speech
    #[arg(long)]
    speech: bool,
    /// Save the conversation here after every turn and resume it on start
    #[arg(long)]
    session_file: Option<PathBuf>,
    /// Ignore a saved conversation and start fresh
    #[arg(long)]
    reset: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    // Logs go to stderr so the conversation on stdout stays readable.
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Configuration loaded successfully. Starting orderbot...");

    // --- 3. Parse Command-Line Arguments ---
    let args = Cli::parse();

    // --- 4. Build the Dialog ---
    let dialog = Arc::new(
        catalog_loader::build_dialog(&config.dialog)
            .await
            .context("Failed to set up the catalog")?,
    );

    // --- 5. Resume or Start a Conversation ---
    let mut conversation = match (&args.session_file, args.reset) {
        (Some(path), false) => session_store::load_conversation(path)?.unwrap_or_default(),
        _ => Conversation::new(),
    };
    tracing::info!(
        "Conversation {} ready ({} turns so far)",
        conversation.id,
        conversation.turns
    );

    // --- 6. Channels ---
    // Finalized utterances for the dialog task.
    let (utterance_tx, mut utterance_rx) = mpsc::channel::<String>(32);
    // Side effects the dialog asks the runtime to perform.
    let (command_tx, mut command_rx) = mpsc::channel::<Command>(32);

    // --- 7. Speech Capture (simulated) ---
    // In speech mode every typed line goes through a capture session: the reader
    // feeds recognition events, the driver endpoints them, and the forwarder
    // hands finalized text to the dialog and tells the reader when capture is idle.
    let (capture_tx, idle_rx) = if args.speech {
        let (msg_tx, msg_rx) = mpsc::channel::<CaptureMsg>(64);
        let (events_tx, mut events_rx) = mpsc::channel::<CaptureEvent>(64);
        let (idle_tx, idle_rx) = mpsc::channel::<()>(4);

        let recognizer = ChannelRecognizer::new(msg_tx.clone());
        tokio::spawn(async move {
            if let Err(e) = run_capture(recognizer, config.capture, msg_rx, events_tx).await {
                tracing::error!("Capture driver failed: {:?}", e);
            }
        });

        let forward_tx = utterance_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                match event {
                    CaptureEvent::Listening => tracing::debug!("Listening..."),
                    CaptureEvent::Interim(text) => tracing::debug!("Heard so far: \"{}\"", text),
                    CaptureEvent::Finalized(text) => {
                        if let Err(e) = forward_tx.send(text).await {
                            tracing::warn!("Failed to send utterance to dialog: {:?}", e);
                        }
                    }
                    CaptureEvent::Aborted(reason) => {
                        tracing::warn!("Capture aborted: {}", reason);
                    }
                    CaptureEvent::Unsupported => {
                        tracing::warn!("Speech capture is not available");
                        let _ = idle_tx.send(()).await;
                    }
                    CaptureEvent::Inactive => {
                        if let Err(e) = idle_tx.send(()).await {
                            tracing::debug!("Reader no longer waiting for capture: {:?}", e);
                        }
                    }
                    CaptureEvent::StopRequested => {}
                }
            }
        });

        (Some(msg_tx), Some(idle_rx))
    } else {
        (None, None)
    };

    // --- 8. Input Reader ---
    let reader_handle = tokio::spawn(async move {
        let mut idle_rx = idle_rx;
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("Failed to read from stdin: {:?}", e);
                    break;
                }
            };
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }

            match (&capture_tx, &mut idle_rx) {
                (Some(capture_tx), Some(idle_rx)) => {
                    let mut msgs = vec![CaptureMsg::Start];
                    msgs.extend(simulate_speech(&line).into_iter().map(CaptureMsg::Engine));
                    for msg in msgs {
                        if capture_tx.send(msg).await.is_err() {
                            tracing::warn!("Capture driver is gone, stopping reader");
                            return;
                        }
                    }
                    // One utterance at a time.
                    idle_rx.recv().await;
                }
                _ => {
                    if utterance_tx.send(line).await.is_err() {
                        tracing::warn!("Dialog task is gone, stopping reader");
                        return;
                    }
                }
            }
        }
        if let Some(capture_tx) = capture_tx {
            let _ = capture_tx.send(CaptureMsg::Shutdown).await;
        }
    });

    // --- 9. Dialog Task ---
    let session_file = args.session_file.clone();
    let dialog_handle = tokio::spawn(async move {
        while let Some(text) = utterance_rx.recv().await {
            let now = Utc::now();
            if !conversation.should_process(&text, now) {
                tracing::debug!("Skipping repeated utterance: \"{}\"", text);
                continue;
            }
            conversation.record(&text, now);
            tracing::info!("User said: \"{}\"", text);

            let response = dialog.process_turn(&text, &conversation.slots).await;
            conversation.apply(&response);

            if let Some(path) = &session_file {
                if let Err(e) = session_store::save_conversation(path, &conversation) {
                    tracing::warn!("Failed to save conversation: {:?}", e);
                }
            }

            for command in response.commands() {
                if let Err(e) = command_tx.send(command).await {
                    tracing::warn!("Failed to send command to runtime: {:?}", e);
                }
            }
        }
    });

    // --- 10. Command Handler ---
    let command_handler = tokio::spawn(async move {
        while let Some(command) = command_rx.recv().await {
            match command {
                Command::Speak(text) => println!("bot> {}", text),
                Command::Suggest(options) => println!("     [{}]", options.join(" | ")),
                Command::Dispatch {
                    action,
                    slots,
                    search_query,
                } => {
                    tracing::info!(
                        "COMMAND RECEIVED: Dispatch {:?} (query: {:?}, slots: {})",
                        action,
                        search_query,
                        serde_json::to_string(&slots).unwrap_or_default()
                    );
                    println!("     -> {:?}", action);
                }
            }
        }
    });

    // The command handler finishes last, once input ends and every turn is done.
    tokio::select! {
        _ = command_handler => {},
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl-C, shutting down...");
        }
    }
    reader_handle.abort();
    dialog_handle.abort();
    tracing::info!("Shutting down...");
    Ok(())
}
