//! LiveCap dev harness.
//!
//! Streams the default microphone into the mock recognition backend so the
//! whole session plumbing (device lifecycle, stream handles, transcript
//! callbacks) can be exercised without a speech model installed.

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use livecap_audio::{input_device_names, CaptureConfig, MicSource};
use livecap_foundation::LanguageTag;
use livecap_session::{SessionController, TranscriptionSession};
use livecap_stt::{MockBackend, MockScript, TranscriptEvent};

#[derive(Parser, Debug)]
#[command(name = "livecap", about = "Live transcription session harness")]
struct Args {
    /// Recognition language for the session
    #[arg(long, default_value = "en-US")]
    language: LanguageTag,

    /// Capture from a specific input device instead of the default
    #[arg(long)]
    device: Option<String>,

    /// Samples per captured frame
    #[arg(long, default_value_t = 2048)]
    frame_size: usize,

    /// List input devices and exit
    #[arg(long)]
    list_devices: bool,
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

/// Canned utterance so the harness produces visible transcript traffic.
fn demo_script() -> MockScript {
    MockScript {
        per_frame: vec![
            TranscriptEvent::Partial { text: "hel".into() },
            TranscriptEvent::Partial {
                text: "hello".into(),
            },
            TranscriptEvent::Final {
                text: "hello world".into(),
            },
        ],
        on_end: None,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();

    if args.list_devices {
        for name in input_device_names() {
            println!("{name}");
        }
        return Ok(());
    }

    tracing::info!(language = %args.language, frame_size = args.frame_size, "Starting livecap");

    let source = match &args.device {
        Some(name) => MicSource::with_device(name),
        None => MicSource::new(),
    };
    let backend = Arc::new(MockBackend::with_script(demo_script()));
    let session = TranscriptionSession::with_capture_config(
        Box::new(source),
        backend,
        CaptureConfig {
            frame_size: args.frame_size,
        },
    );

    session.on_transcript(Arc::new(|event| {
        tracing::info!(
            is_final = event.is_final(),
            "Transcript: {}",
            event.text()
        );
    }));
    session.on_error(Arc::new(|error| {
        tracing::warn!(%error, "Backend error (session keeps running)");
    }));

    let controller = SessionController::new(session, args.language);
    controller
        .toggle()
        .context("Failed to start transcription session")?;
    tracing::info!("Listening; press ctrl-c to stop");

    tokio::signal::ctrl_c().await?;

    controller.toggle().context("Failed to stop session")?;
    tracing::info!("Session stopped");
    Ok(())
}
