//! CLI Module
//!
//! Command-line interface for the Veil player.

pub mod commands;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use crate::config::PlayerConfig;
use crate::cover::TriggerKey;
use crate::state::SettingsStore;

/// Veil - a media player that can hide behind a document
#[derive(Parser, Debug)]
#[command(name = "veil-cli")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding state.json (overrides the config file)
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,

    /// Do not read or write state.json
    #[arg(long, global = true)]
    pub no_persist: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a scripted headless session and write the output to a WAV file
    #[command(name = "render")]
    Render(RenderArgs),

    /// Print the masked playlist titles for the given file names
    #[command(name = "mask")]
    Mask {
        /// File names, in playlist order
        names: Vec<String>,
    },

    /// List the keys that can be used as the cover trigger
    #[command(name = "keys")]
    Keys,

    /// Inspect or clear the persisted state
    #[command(name = "settings")]
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsAction {
    /// Print the persisted record
    Show,
    /// Delete the persisted record
    Reset,
}

#[derive(Args, Debug, Clone)]
pub struct RenderArgs {
    /// Audio files or directories (searched recursively)
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output WAV file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Cover image or document
    #[arg(long)]
    pub cover: Option<PathBuf>,

    /// Volume (0..1, clamped)
    #[arg(long, default_value_t = 1.0)]
    pub volume: f32,

    /// Playback rate multiplier (> 0)
    #[arg(long, default_value_t = 1.0)]
    pub rate: f32,

    /// Effect intensity (0..1)
    #[arg(long, default_value_t = 0.0)]
    pub effect: f32,

    /// Restart the track when it ends
    #[arg(long = "loop")]
    pub loop_enabled: bool,

    /// Cover trigger key (see `veil-cli keys`)
    #[arg(long)]
    pub trigger: Option<TriggerKey>,

    /// Timed actions, e.g. "1.5:KeyP,3:KeyP,4:resume"
    #[arg(long, default_value = "")]
    pub keys: String,

    /// Length of the session in seconds
    #[arg(long, default_value_t = 5.0)]
    pub seconds: f64,

    /// Pace the session with the wall clock
    #[arg(long)]
    pub realtime: bool,

    /// Seed for shuffle
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Resolve the configuration and the settings store from global flags
pub fn resolve_config(cli: &Cli) -> anyhow::Result<(PlayerConfig, Option<SettingsStore>)> {
    let mut config = PlayerConfig::load_or_default(cli.config.as_deref())
        .with_context(|| format!("Failed to load config {:?}", cli.config))?;

    if let Some(dir) = &cli.state_dir {
        config.state_dir = Some(dir.clone());
    }
    if config.state_dir.is_none() {
        config.state_dir = PlayerConfig::default_state_dir();
    }

    let store = if cli.no_persist {
        None
    } else {
        config.state_dir.clone().map(SettingsStore::new)
    };
    Ok((config, store))
}

/// Run the parsed command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let (config, store) = resolve_config(&cli)?;

    match cli.command {
        Some(Commands::Render(args)) => commands::render(args, config, store).await,
        Some(Commands::Mask { names }) => {
            commands::mask(&names);
            Ok(())
        }
        Some(Commands::Keys) => {
            commands::keys(&config);
            Ok(())
        }
        Some(Commands::Settings { action }) => commands::settings(action, store.as_ref()),
        None => {
            println!("Veil v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_render() {
        let cli = Cli::parse_from([
            "veil-cli", "render", "a.mp3", "music/", "-o", "out.wav", "--trigger", "KeyP", "--keys",
            "1:P", "--loop",
        ]);
        let Some(Commands::Render(args)) = cli.command else {
            panic!("render expected");
        };
        assert_eq!(args.inputs.len(), 2);
        assert_eq!(args.trigger, Some(TriggerKey::KeyP));
        assert!(args.loop_enabled);
        assert_eq!(args.volume, 1.0);
    }

    #[test]
    fn test_unknown_trigger_rejected() {
        let result = Cli::try_parse_from(["veil-cli", "render", "a.mp3", "-o", "o.wav", "--trigger", "KeyA"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_config_flags() {
        let cli = Cli::parse_from(["veil-cli", "--state-dir", "/tmp/veil-state", "keys"]);
        let (config, store) = resolve_config(&cli).unwrap();
        assert_eq!(config.state_dir, Some(PathBuf::from("/tmp/veil-state")));
        assert_eq!(store.unwrap().dir(), std::path::Path::new("/tmp/veil-state"));

        let cli = Cli::parse_from(["veil-cli", "--no-persist", "keys"]);
        let (_, store) = resolve_config(&cli).unwrap();
        assert!(store.is_none());
    }
}
