use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use orion_agent::speech::{
    AudioCapture, AudioPlayback, HttpSpeechInput, HttpSpeechOutput, InputEventReceiver,
    NoopSpeechInput, NoopSpeechOutput, OutputEvent, OutputEventReceiver, SpeechInputPort,
    SpeechOutputPort,
};
use orion_agent::{
    AgentConfig, CompletionService, ControllerCommand, ControllerEvent, HttpCompletionService,
    InteractionController, Result, Role, Turn,
};

/// Orion - conversational voice agent
#[derive(Parser)]
#[command(name = "orion", version, about)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, env = "ORION_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable speech features (text-only, for hosts without audio hardware)
    #[arg(long, env = "ORION_DISABLE_VOICE")]
    disable_voice: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Send one query to the remote completion service and print the reply
    Ask {
        /// The query text
        prompt: String,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "On standby.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let config = match AgentConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Some(Command::Ask { prompt }) => ask(&config, &prompt).await,
        Some(Command::TestMic { duration }) => test_mic(duration),
        Some(Command::TestSpeaker) => test_speaker(),
        Some(Command::TestTts { text }) => test_tts(&config, &text).await,
        None => run_interactive(config, cli.disable_voice).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Build the speech ports, degrading silently to no-ops when the host lacks
/// the capability
fn build_ports(
    config: &AgentConfig,
    disable_voice: bool,
) -> (
    Box<dyn SpeechOutputPort>,
    OutputEventReceiver,
    Box<dyn SpeechInputPort>,
    InputEventReceiver,
) {
    if disable_voice {
        tracing::info!("voice explicitly disabled, running text-only");
        let (output, output_rx) = NoopSpeechOutput::with_receiver();
        let (input, input_rx) = NoopSpeechInput::with_receiver();
        return (Box::new(output), output_rx, Box::new(input), input_rx);
    }

    let (output, output_rx): (Box<dyn SpeechOutputPort>, _) =
        match HttpSpeechOutput::with_receiver(config.speech.clone()) {
            Ok((output, rx)) => (Box::new(output), rx),
            Err(e) => {
                tracing::debug!(error = %e, "speech synthesis unavailable");
                let (output, rx) = NoopSpeechOutput::with_receiver();
                (Box::new(output), rx)
            }
        };

    let (input, input_rx): (Box<dyn SpeechInputPort>, _) =
        match HttpSpeechInput::with_receiver(config.speech.clone()) {
            Ok((input, rx)) => (Box::new(input), rx),
            Err(e) => {
                tracing::debug!(error = %e, "speech recognition unavailable");
                let (input, rx) = NoopSpeechInput::with_receiver();
                (Box::new(input), rx)
            }
        };

    (output, output_rx, input, input_rx)
}

/// Run the interactive session; the terminal is the rendering layer
async fn run_interactive(config: AgentConfig, disable_voice: bool) -> Result<()> {
    let (output, output_rx, input, input_rx) = build_ports(&config, disable_voice);

    let remote: Option<Arc<dyn CompletionService>> = match &config.endpoint {
        Some(endpoint) => Some(Arc::new(HttpCompletionService::new(endpoint, &config.name)?)),
        None => {
            tracing::info!("no remote endpoint configured, running local-only");
            None
        }
    };

    let name = config.name.clone();
    let wake_word = config.wake_word.clone();
    let (mut controller, handle, mut events) =
        InteractionController::new(config, output, output_rx, input, input_rx, remote);

    println!("{name} ready. Say \"{wake_word}\" to wake.");
    println!("Type to talk; /mic arms the microphone, /stop cancels, /quit exits.");

    // Ctrl-C is the stop button; a second one shuts down.
    let signal_handle = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_handle.send(ControllerCommand::Stop).await;
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_handle.send(ControllerCommand::Shutdown).await;
        }
    });

    // Terminal input runs on its own thread; lines become commands.
    let stdin_handle = handle.clone();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match stdin.read_line(&mut line) {
                Ok(0) | Err(_) => {
                    stdin_handle.send_blocking(ControllerCommand::Shutdown);
                    break;
                }
                Ok(_) => {}
            }

            let trimmed = line.trim();
            match trimmed {
                "" => {}
                "/quit" => {
                    stdin_handle.send_blocking(ControllerCommand::Shutdown);
                    break;
                }
                "/mic" => stdin_handle.send_blocking(ControllerCommand::StartListening),
                "/stop" => stdin_handle.send_blocking(ControllerCommand::Stop),
                "/standby" => stdin_handle.send_blocking(ControllerCommand::Standby),
                text => stdin_handle.send_blocking(ControllerCommand::SubmitText(text.to_string())),
            }
        }
    });

    // Event printer: the visible half of the rendering layer.
    let agent_name = name.clone();
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ControllerEvent::TurnAppended(Turn { role, content }) => match role {
                    Role::Assistant => println!("{agent_name}> {content}"),
                    Role::User => println!("you> {content}"),
                },
                ControllerEvent::StateChanged(state) => {
                    tracing::debug!(%state, "ui state");
                    if state.is_listening() {
                        println!("[listening]");
                    }
                }
                ControllerEvent::VoiceChanged(profile) => {
                    println!("[voice: {}]", profile.name);
                }
                ControllerEvent::OpenUrl(url) => open_url(&url),
            }
        }
    });

    controller.run().await;
    Ok(())
}

/// Open a URL with the system opener, if one exists
fn open_url(url: &str) {
    for opener in ["xdg-open", "open"] {
        if let Ok(path) = which::which(opener) {
            match std::process::Command::new(path).arg(url).spawn() {
                Ok(_) => return,
                Err(e) => tracing::warn!(error = %e, opener, "failed to open URL"),
            }
        }
    }
    tracing::warn!(url, "no system opener found");
}

/// One-shot remote query
async fn ask(config: &AgentConfig, prompt: &str) -> Result<()> {
    let Some(endpoint) = &config.endpoint else {
        return Err(orion_agent::Error::Config(
            "no remote endpoint configured (set ORION_ENDPOINT)".to_string(),
        ));
    };

    let service = HttpCompletionService::new(endpoint, &config.name)?;
    let reply = service.complete(&[Turn::user(prompt)]).await?;
    println!("{reply}");
    Ok(())
}

/// Capture a few seconds of audio and report what arrived
fn test_mic(duration: u64) -> Result<()> {
    let mut capture = AudioCapture::new()?;
    capture.start()?;
    println!("recording for {duration}s...");
    std::thread::sleep(Duration::from_secs(duration));

    let samples = capture.drain();
    capture.stop();

    let peak = samples.iter().fold(0.0f32, |max, s| max.max(s.abs()));
    println!("captured {} samples, peak amplitude {peak:.3}", samples.len());
    Ok(())
}

/// Play a short tone on the default output device
fn test_speaker() -> Result<()> {
    let playback = AudioPlayback::new()?;

    let samples: Vec<f32> = (0..24000)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let t = i as f32 / 24000.0;
            0.3 * (2.0 * std::f32::consts::PI * 440.0 * t).sin()
        })
        .collect();

    println!("playing test tone...");
    let cancel = Arc::new(std::sync::atomic::AtomicBool::new(false));
    playback.play_samples(&samples, &cancel)?;
    Ok(())
}

/// Synthesize and speak one line
async fn test_tts(config: &AgentConfig, text: &str) -> Result<()> {
    let (mut output, mut events) = HttpSpeechOutput::with_receiver(config.speech.clone())?;

    output.speak(text);
    while let Some(event) = events.recv().await {
        if matches!(event, OutputEvent::Finished) {
            break;
        }
    }
    Ok(())
}
