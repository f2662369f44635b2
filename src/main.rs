//! Command-line entry point.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Open the [`StateStore`] under the platform user-data directory.
//! 4. Dispatch one of the commands:
//!    * `list` (default) — scan the modules root and print what's installed.
//!    * `favorite <name> <on|off>` — persist a favorite flag.
//!    * `dictate [seconds]` — record from the default input device,
//!      transcribe with the configured Whisper model, print the result.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::sync::oneshot;

use modshell::{
    audio::CpalCaptureDevice,
    bus::{StateBus, StateSnapshot, UiComponent},
    config::{AppConfig, AppPaths},
    pipeline::{Pipeline, PipelineConfig, PipelineEvent},
    registry::ModuleRegistry,
    store::{StateStore, KNOWN_OWNERS},
    stt::{EngineHandle, WhisperEngine},
};

const DICTATION_OWNER: &str = "dictation";

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    let paths = AppPaths::new();
    let store = StateStore::new(&paths.user_data_dir, KNOWN_OWNERS)
        .context("failed to open the state store")?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None | Some("list") => cmd_list(&config, &store),
        Some("favorite") => {
            let (name, flag) = match (args.get(1), args.get(2)) {
                (Some(name), Some(flag)) => (name.as_str(), flag.as_str()),
                _ => anyhow::bail!("usage: modshell favorite <name> <on|off>"),
            };
            cmd_favorite(&config, &store, name, flag)
        }
        Some("dictate") => {
            let seconds = match args.get(1) {
                Some(raw) => Some(
                    raw.parse::<u64>()
                        .context("usage: modshell dictate [seconds]")?,
                ),
                None => None,
            };
            cmd_dictate(&config, &paths, &store, seconds)
        }
        Some(other) => {
            anyhow::bail!("unknown command `{other}` (expected list, favorite, or dictate)")
        }
    }
}

// ---------------------------------------------------------------------------
// list / favorite
// ---------------------------------------------------------------------------

fn cmd_list(config: &AppConfig, store: &StateStore) -> Result<()> {
    let mut registry = ModuleRegistry::new(&config.shell.modules_root);
    registry.load_modules(store);

    let modules = registry.get_all_modules();
    if modules.is_empty() {
        println!(
            "no modules found under {}",
            config.shell.modules_root.display()
        );
        return Ok(());
    }

    println!("{} module(s) installed:", modules.len());
    for module in modules {
        let marker = if module.favorite { "*" } else { " " };
        println!(
            " {marker} {:<16} {:<8} {}",
            module.name, module.version, module.description
        );
    }
    Ok(())
}

fn cmd_favorite(config: &AppConfig, store: &StateStore, name: &str, flag: &str) -> Result<()> {
    let favorite = match flag {
        "on" => true,
        "off" => false,
        other => anyhow::bail!("expected `on` or `off`, got `{other}`"),
    };

    let mut registry = ModuleRegistry::new(&config.shell.modules_root);
    registry.load_modules(store);
    registry
        .set_module_favorite(store, name, favorite)
        .context("failed to persist favorite flag")?;

    println!(
        "{} is {} a favorite",
        name,
        if favorite { "now" } else { "no longer" }
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// dictate
// ---------------------------------------------------------------------------

/// Status line driven by the state bus.  Always alive for the lifetime
/// of the command.
struct ConsoleStatus;

impl UiComponent for ConsoleStatus {
    fn is_alive(&self) -> bool {
        true
    }

    fn apply_state(&mut self, snapshot: &StateSnapshot) -> anyhow::Result<()> {
        log::info!(
            "status: recording={} transcribing={} ready={}",
            snapshot.is_recording,
            snapshot.is_transcribing,
            snapshot.ready_to_record
        );
        Ok(())
    }
}

/// Resolve the model path: the persisted user choice wins, the static
/// configuration is the fallback.
fn resolve_model(config: &AppConfig, store: &StateStore) -> Option<PathBuf> {
    if let Some(Value::String(path)) = store.get(DICTATION_OWNER, "model_path") {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    config.stt.model.clone()
}

/// Resolve the recording limit: the persisted user preference wins, the
/// static configuration is the fallback.  An explicit CLI argument
/// overrides both (handled by the caller).
fn resolve_max_duration(config: &AppConfig, store: &StateStore) -> u64 {
    if let Some(value) = store
        .get(DICTATION_OWNER, "max_duration")
        .and_then(|v| v.as_u64())
    {
        if value > 0 {
            return value;
        }
        log::warn!("ignoring persisted max_duration of 0, using configured default");
    }
    config.audio.max_duration_secs
}

/// Resolve the conclusion phrase from persisted dictation settings.
fn resolve_conclusion(store: &StateStore) -> Option<String> {
    let enabled = matches!(
        store.get(DICTATION_OWNER, "include_conclusion"),
        Some(Value::Bool(true))
    );
    if !enabled {
        return None;
    }
    match store.get(DICTATION_OWNER, "conclusion_text") {
        Some(Value::String(text)) if !text.is_empty() => Some(text),
        _ => None,
    }
}

fn cmd_dictate(
    config: &AppConfig,
    paths: &AppPaths,
    store: &StateStore,
    seconds: Option<u64>,
) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;

    let engine = EngineHandle::new(Box::new(WhisperEngine::new(
        config.stt.language.clone(),
        config.stt.threads,
    )));
    if let Some(model) = resolve_model(config, store) {
        if let Err(e) = engine.load(&model.to_string_lossy()) {
            log::warn!("could not load model {}: {e}", model.display());
        }
    } else {
        log::warn!("no speech model configured; transcription will be skipped");
    }

    let max_duration = seconds.unwrap_or_else(|| resolve_max_duration(config, store)) as u32;

    let mut bus = StateBus::new();
    bus.set_max_duration(max_duration);
    bus.set_whisper_ready(engine.is_loaded());
    bus.register_ui_component(Box::new(ConsoleStatus));

    let pipeline_config = PipelineConfig {
        spec: modshell::audio::StreamSpec {
            channels: config.audio.channels,
            sample_rate: config.audio.sample_rate,
            frame_size: config.audio.frame_size,
        },
        max_duration_secs: max_duration,
        output_path: paths.recordings_dir.join("current_record.wav"),
        conclusion: resolve_conclusion(store),
    };
    let (mut pipeline, mut events) = Pipeline::new(
        Box::new(CpalCaptureDevice),
        engine.clone(),
        pipeline_config,
    );

    runtime.block_on(async {
        pipeline
            .start_recording()
            .context("failed to start recording")?;
        bus.set_recording(true);
        println!("recording… (up to {max_duration}s, Ctrl+C to abort)");

        // Drain events until the take lands on disk.  The worker stops
        // on its own at the duration cutoff; the session is closed here
        // either way.
        let take = loop {
            match events.recv().await {
                Some(PipelineEvent::RecordingTick { elapsed }) => {
                    log::info!("recording… {elapsed}s / {max_duration}s");
                }
                Some(PipelineEvent::RecordingFinished { path }) => break path,
                Some(PipelineEvent::RecordingFailed { message }) => {
                    bus.set_recording(false);
                    let _ = pipeline.stop_recording();
                    pipeline.cleanup().await;
                    anyhow::bail!("recording failed: {message}");
                }
                Some(PipelineEvent::TranscribingTick { .. }) => {}
                None => anyhow::bail!("pipeline event channel closed unexpectedly"),
            }
        };
        let _ = pipeline.stop_recording();
        bus.set_recording(false);
        log::info!("take saved to {}", take.display());

        bus.set_transcribing(true);
        let (done_tx, done_rx) = oneshot::channel();
        pipeline
            .transcribe_async(move |text| {
                let _ = done_tx.send(text);
            })
            .context("failed to start transcription")?;

        let text = done_rx
            .await
            .context("transcription ended without a result")?;
        bus.set_transcribing(false);
        pipeline.cleanup().await;

        match text {
            Some(text) => println!("{text}"),
            None => println!("(no transcript — see the log for details)"),
        }
        Ok(())
    })
}
