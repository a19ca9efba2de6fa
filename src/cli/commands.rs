//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use log::{info, warn};
use walkdir::WalkDir;

use crate::cli::{RenderArgs, SettingsAction};
use crate::config::PlayerConfig;
use crate::cover::{Key, KeyEvent, TriggerKey};
use crate::engine::WavSink;
use crate::session::{Event, EventLoop, ParamChange, Session, TransportCommand};
use crate::state::{detect_theme_from_env, SettingsStore};
use crate::track::{mask_title, mime_from_file_name, BlobSource};

// ============================================================================
// Scripted Input
// ============================================================================

/// What a script step does
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptAction {
    Key(Key),
    Transport(TransportCommand),
}

/// One timed action of a `--keys` script
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptStep {
    pub at_secs: f64,
    pub action: ScriptAction,
}

impl ScriptStep {
    pub fn event(&self) -> Event {
        match &self.action {
            ScriptAction::Key(key) => Event::KeyPressed(KeyEvent::down(key.clone())),
            ScriptAction::Transport(command) => Event::Transport(*command),
        }
    }
}

/// Parse `"1.5:KeyP,3:KeyP,4:resume"` into steps ordered by time
///
/// Actions `pause`, `resume`, `toggle` and `shuffle` are transport buttons;
/// anything else is a key code.
pub fn parse_script(script: &str) -> anyhow::Result<Vec<ScriptStep>> {
    let mut steps = Vec::new();

    for entry in script.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let Some((time, action)) = entry.split_once(':') else {
            bail!("Script entry '{}' must look like TIME:ACTION", entry);
        };
        let at_secs: f64 = time
            .trim()
            .parse()
            .with_context(|| format!("Bad time in script entry '{}'", entry))?;
        if !at_secs.is_finite() || at_secs < 0.0 {
            bail!("Script time must be a non-negative number: '{}'", entry);
        }

        let action = match action.trim() {
            "pause" => ScriptAction::Transport(TransportCommand::Pause),
            "resume" => ScriptAction::Transport(TransportCommand::Resume),
            "toggle" => ScriptAction::Transport(TransportCommand::Toggle),
            "shuffle" => ScriptAction::Transport(TransportCommand::Shuffle),
            "" => bail!("Missing action in script entry '{}'", entry),
            code => ScriptAction::Key(Key::parse(code)),
        };
        steps.push(ScriptStep { at_secs, action });
    }

    steps.sort_by(|a, b| a.at_secs.total_cmp(&b.at_secs));
    Ok(steps)
}

/// Expand files and directories into playlist sources
///
/// Directories are walked recursively in file-name order and only files
/// that look like audio are kept; explicit files are always kept.
pub fn collect_sources(inputs: &[PathBuf]) -> anyhow::Result<Vec<BlobSource>> {
    let mut sources = Vec::new();

    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input).sort_by_file_name() {
                let entry = entry.with_context(|| format!("Failed to walk {}", input.display()))?;
                if entry.file_type().is_file() && looks_like_audio(entry.path()) {
                    sources.push(BlobSource::Path(entry.path().to_path_buf()));
                }
            }
        } else if input.is_file() {
            sources.push(BlobSource::Path(input.clone()));
        } else {
            bail!("Input not found: {}", input.display());
        }
    }

    Ok(sources)
}

// ============================================================================
// Commands
// ============================================================================

/// Run a headless session into a WAV file.
pub async fn render(args: RenderArgs, config: PlayerConfig, store: Option<SettingsStore>) -> anyhow::Result<()> {
    let sources = collect_sources(&args.inputs)?;
    let script = parse_script(&args.keys)?;
    info!("Rendering {} track(s) for {:.1}s", sources.len(), args.seconds);

    let persisted = match &store {
        Some(store) => store.load().unwrap_or_else(|e| {
            warn!("Ignoring unreadable state file: {}", e);
            None
        }),
        None => None,
    };

    let sink = WavSink::create(&args.output, config.sample_rate)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    let mut session = Session::new(config.clone(), Box::new(sink), persisted);
    if let Some(seed) = args.seed {
        session = session.with_rng_seed(seed);
    }

    let mut event_loop = EventLoop::new(session, store);
    event_loop.submit(Event::ParamChanged(ParamChange::Volume(args.volume)));
    event_loop.submit(Event::ParamChanged(ParamChange::PlaybackRate(args.rate)));
    event_loop.submit(Event::ParamChanged(ParamChange::EffectIntensity(args.effect)));
    event_loop.submit(Event::ParamChanged(ParamChange::Loop(args.loop_enabled)));
    if let Some(trigger) = args.trigger {
        event_loop.submit(Event::ParamChanged(ParamChange::Trigger(trigger)));
    }
    if let Some(cover) = &args.cover {
        event_loop.submit(Event::AssetSelected(BlobSource::Path(cover.clone())));
    }
    event_loop.submit(Event::FilesSelected(sources));
    event_loop.run_until_idle().await;

    if args.realtime {
        run_realtime(&mut event_loop, script, args.seconds).await?;
    } else {
        run_scripted(&mut event_loop, script, args.seconds, &config).await?;
    }

    let session = event_loop.session();
    let seconds = session.graph().frames_written() as f64 / config.sample_rate as f64;
    println!("Rendered {:.2}s to {}", seconds, args.output.display());
    if let Some(notice) = session.notice() {
        println!("Last notice: {}", notice);
    }
    println!("{}", serde_json::to_string_pretty(&session.screen())?);
    Ok(())
}

/// Tick block by block as fast as possible, firing script steps on time
async fn run_scripted(
    event_loop: &mut EventLoop,
    script: Vec<ScriptStep>,
    seconds: f64,
    config: &PlayerConfig,
) -> anyhow::Result<()> {
    let block_secs = config.block_frames as f64 / config.sample_rate as f64;
    if block_secs <= 0.0 {
        bail!("block_frames and sample_rate must be positive");
    }
    let blocks = (seconds / block_secs).ceil() as usize;
    let mut steps = script.into_iter().peekable();

    for block in 0..blocks {
        let now = block as f64 * block_secs;
        while let Some(step) = steps.next_if(|s| s.at_secs <= now) {
            event_loop.submit(step.event());
        }
        event_loop.submit(Event::Tick);
        event_loop.run_until_idle().await;
    }

    event_loop.submit(Event::Shutdown);
    event_loop.run().await.context("Failed to finish output")
}

/// Let the clock drive rendering and post script steps at wall-clock times
async fn run_realtime(event_loop: &mut EventLoop, script: Vec<ScriptStep>, seconds: f64) -> anyhow::Result<()> {
    let clock = event_loop.spawn_clock();
    let tx = event_loop.sender();

    let driver = tokio::spawn(async move {
        let start = tokio::time::Instant::now();
        for step in script {
            tokio::time::sleep_until(start + Duration::from_secs_f64(step.at_secs)).await;
            let _ = tx.send(step.event());
        }
        tokio::time::sleep_until(start + Duration::from_secs_f64(seconds.max(0.0))).await;
        let _ = tx.send(Event::Shutdown);
    });

    let result = event_loop.run().await;
    clock.abort();
    driver.await.context("Script driver failed")?;
    result.context("Failed to finish output")
}

/// Print masked titles for a list of file names.
pub fn mask(names: &[String]) {
    for (i, name) in names.iter().enumerate() {
        println!("{:>3}. {}", i + 1, mask_title(name, i));
    }
}

/// List the selectable trigger keys.
pub fn keys(config: &PlayerConfig) {
    println!("Trigger keys:");
    for trigger in TriggerKey::ALL {
        let marker = if trigger == config.default_trigger { " (default)" } else { "" };
        println!("  {}{}", trigger, marker);
    }
    println!("Universal escape: {}", config.universal_escape);
}

/// Show or reset the persisted state.
pub fn settings(action: SettingsAction, store: Option<&SettingsStore>) -> anyhow::Result<()> {
    let Some(store) = store else {
        bail!("Persistence is disabled (no state directory)");
    };

    match action {
        SettingsAction::Show => match store.load().context("Failed to read state")? {
            Some(state) => println!("{}", serde_json::to_string_pretty(&state)?),
            None => {
                println!("No saved state in {}", store.dir().display());
                println!("Detected theme: {}", detect_theme_from_env());
            }
        },
        SettingsAction::Reset => {
            if store.reset().context("Failed to remove state")? {
                println!("Removed {}", store.path().display());
            } else {
                println!("Nothing to remove");
            }
        }
    }
    Ok(())
}

/// True when `path` has an extension the decoder is likely to accept
pub fn looks_like_audio(path: &Path) -> bool {
    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    mime_from_file_name(&name).starts_with("audio/")
}
