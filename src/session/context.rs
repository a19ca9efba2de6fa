//! Session context
//!
//! One `Session` per running player. It owns the audio graph, the cover
//! controller, the cover asset and the playlist, and is the only place any
//! of them are mutated. `dispatch` is synchronous: a handler runs to
//! completion before the next event is looked at, so no event ever sees a
//! half-connected graph.

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::PlayerConfig;
use crate::cover::{CoverController, CoverState, KeyEvent, PanicAsset, Transition};
use crate::engine::{AudioGraph, OutputSink, StreamHandle};
use crate::error::{Result, VeilError};
use crate::session::event::{Command, Event, ParamChange, TransportCommand};
use crate::session::view::{CoverView, PlayerView, PlaylistRow, Screen};
use crate::state::{detect_theme_from_env, PersistedState, Theme};
use crate::track::{BlobSource, Playlist};

/// The per-session context
pub struct Session {
    config: PlayerConfig,
    graph: AudioGraph,
    cover: CoverController,
    asset: PanicAsset,
    playlist: Playlist,
    theme: Theme,
    /// Index of the connected track
    current_index: Option<usize>,
    /// Latest selection still being read or decoded
    pending_index: Option<usize>,
    /// Theme came from the environment and has not been saved yet
    theme_unsaved: bool,
    notice: Option<String>,
    rng: StdRng,
    shutdown: bool,
}

impl Session {
    /// Build a session rendering into `sink`
    ///
    /// A persisted record restores the theme and playlist labels; without
    /// one the theme is detected from the environment.
    pub fn new(config: PlayerConfig, sink: Box<dyn OutputSink>, persisted: Option<PersistedState>) -> Self {
        let graph = AudioGraph::new(sink, config.max_delay_secs);
        let cover = CoverController::new(config.default_trigger, config.universal_escape.clone());

        let mut playlist = Playlist::new();
        let (theme, theme_unsaved) = match persisted {
            Some(state) => {
                playlist.restore_labels(state.playlist_labels);
                (state.theme, false)
            }
            None => (detect_theme_from_env(), true),
        };

        info!(
            "[SESSION] Started: {} Hz, trigger {}, theme {}",
            graph.output_rate(),
            cover.trigger(),
            theme
        );

        Self {
            config,
            graph,
            cover,
            asset: PanicAsset::new(),
            playlist,
            theme,
            current_index: None,
            pending_index: None,
            theme_unsaved,
            notice: None,
            rng: StdRng::from_entropy(),
            shutdown: false,
        }
    }

    /// Replace the shuffle RNG (deterministic tests and scripts)
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Work to run once the session is up
    ///
    /// A theme detected from the environment is saved right away so the
    /// next start does not detect it again. Returns nothing after the first
    /// call.
    pub fn startup_commands(&mut self) -> Vec<Command> {
        if std::mem::take(&mut self.theme_unsaved) {
            info!("[SESSION] Saving detected theme {}", self.theme);
            vec![self.persist_command()]
        } else {
            Vec::new()
        }
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Apply one event and return the asynchronous work it requires
    ///
    /// Errors never escape: they are logged, kept as the user-visible
    /// notice, and the previous state is retained.
    pub fn dispatch(&mut self, event: Event) -> Vec<Command> {
        let result = match event {
            Event::KeyPressed(key) => {
                self.handle_key(&key);
                Ok(Vec::new())
            }
            Event::FilesSelected(sources) => Ok(self.select_files(sources)),
            Event::TrackSelected(index) => self.select_track(index).map(|c| vec![c]),
            Event::TrackLoaded(handle) => self.track_loaded(handle).map(|_| Vec::new()),
            Event::TrackFailed { index, reason } => Err(self.track_failed(index, reason)),
            Event::AssetSelected(source) => Ok(vec![Command::ReadAsset(source)]),
            Event::AssetLoaded { mime, data } => self.asset.set_asset(data, &mime).map(|_| Vec::new()),
            Event::ReadFailed { what, reason } => Err(VeilError::unreadable(format!("{}: {}", what, reason))),
            Event::ParamChanged(change) => self.apply_param(change),
            Event::Transport(command) => self.transport(command),
            Event::TrackRenamed { index, label } => self.rename_track(index, label).map(|c| vec![c]),
            Event::Tick => self.graph.render(self.config.block_frames).map(|_| Vec::new()),
            Event::Shutdown => {
                self.shutdown = true;
                Ok(Vec::new())
            }
        };

        debug_assert!(!self.cover.is_cover_visible() || self.graph.is_paused());

        match result {
            Ok(commands) => commands,
            Err(e) => {
                warn!("[SESSION] {} ({})", e, e.error_code());
                self.notice = Some(e.to_string());
                Vec::new()
            }
        }
    }

    fn handle_key(&mut self, key: &KeyEvent) {
        if self.cover.handle_key(key, &mut self.graph) == Transition::ExitCover {
            // Back in the player; the user resumes manually
            debug!("[SESSION] Player visible, playback stays paused");
        }
    }

    // ========================================================================
    // Playlist
    // ========================================================================

    /// Replace the playlist and start reading the first entry
    pub fn select_files(&mut self, sources: Vec<BlobSource>) -> Vec<Command> {
        self.playlist.replace(sources);
        let mut commands = vec![self.persist_command()];
        if !self.playlist.is_empty() {
            if let Ok(read) = self.select_track(0) {
                commands.insert(0, read);
            }
        }
        commands
    }

    /// Request the content of `index`
    ///
    /// The index only becomes current once its stream connects.
    ///
    /// # Errors
    /// * `TrackOutOfRange` - no playable entry at `index`; nothing changes
    pub fn select_track(&mut self, index: usize) -> Result<Command> {
        let (label, source) = self.playlist.playable(index)?;
        let command = Command::ReadTrack {
            index,
            label: label.to_string(),
            source: source.clone(),
        };
        self.pending_index = Some(index);
        debug!("[SESSION] Selected track {}", index);
        Ok(command)
    }

    /// Connect a freshly decoded stream
    ///
    /// While the cover is up the stream is connected paused.
    pub fn track_loaded(&mut self, handle: StreamHandle) -> Result<()> {
        let index = handle.track().index();
        let autoplay = !self.cover.is_cover_visible();
        self.graph.connect_stream(handle, autoplay)?;

        self.current_index = Some(index);
        if self.pending_index == Some(index) {
            self.pending_index = None;
        }
        Ok(())
    }

    fn track_failed(&mut self, index: usize, reason: String) -> VeilError {
        if self.pending_index == Some(index) {
            self.pending_index = None;
        }
        VeilError::unreadable(format!("track {}: {}", index, reason))
    }

    pub fn rename_track(&mut self, index: usize, label: impl Into<String>) -> Result<Command> {
        let label = label.into();
        self.playlist.rename(index, label.clone())?;
        self.graph.rename_track(index, &label);
        Ok(self.persist_command())
    }

    // ========================================================================
    // Controls
    // ========================================================================

    fn apply_param(&mut self, change: ParamChange) -> Result<Vec<Command>> {
        match change {
            ParamChange::Volume(v) => {
                self.graph.set_volume(v);
            }
            ParamChange::PlaybackRate(r) => self.graph.set_playback_rate(r)?,
            ParamChange::EffectIntensity(x) => {
                self.graph.set_effect_intensity(x);
            }
            ParamChange::Loop(enabled) => self.graph.set_loop(enabled),
            ParamChange::Trigger(trigger) => self.cover.set_trigger(trigger),
            ParamChange::Theme(theme) => {
                self.theme = theme;
                return Ok(vec![self.persist_command()]);
            }
        }
        Ok(Vec::new())
    }

    fn transport(&mut self, command: TransportCommand) -> Result<Vec<Command>> {
        match command {
            TransportCommand::Pause => self.graph.pause(),
            TransportCommand::Resume => self.resume(),
            TransportCommand::Toggle => {
                if self.graph.is_playing() {
                    self.graph.pause();
                } else {
                    self.resume();
                }
            }
            TransportCommand::Shuffle => {
                if let Some(index) = self.playlist.shuffle_pick(self.current_index, &mut self.rng) {
                    return self.select_track(index).map(|c| vec![c]);
                }
            }
        }
        Ok(Vec::new())
    }

    fn resume(&mut self) {
        if self.cover.is_cover_visible() {
            debug!("[SESSION] Ignoring resume while the cover is visible");
            return;
        }
        self.graph.resume();
    }

    fn persist_command(&self) -> Command {
        Command::Persist(PersistedState::new(self.theme, self.playlist.labels()))
    }

    // ========================================================================
    // Views and Queries
    // ========================================================================

    /// Project the session onto exactly one visible screen
    pub fn screen(&self) -> Screen {
        match self.cover.state() {
            CoverState::CoverVisible => Screen::Cover(CoverView {
                display: self.asset.render(),
            }),
            CoverState::PlayerVisible => Screen::Player(self.player_view()),
        }
    }

    fn player_view(&self) -> PlayerView {
        let active = self.graph.current_index();
        let rows = self
            .playlist
            .labels()
            .into_iter()
            .enumerate()
            .map(|(index, label)| PlaylistRow {
                index,
                label,
                active: Some(index) == active,
            })
            .collect();

        PlayerView {
            theme: self.theme,
            playlist: rows,
            now_playing: self.graph.current().map(|h| h.track().display_label().to_string()),
            transport: self.graph.transport_state().to_string(),
            position_secs: self.graph.position_secs(),
            volume: PlayerView::percent(self.graph.volume()),
            speed: PlayerView::percent(self.graph.playback_rate()),
            effect: PlayerView::percent(self.graph.effect_intensity()),
            loop_enabled: self.graph.loop_enabled(),
            trigger: self.cover.trigger(),
            notice: self.notice.clone(),
        }
    }

    pub fn graph(&self) -> &AudioGraph {
        &self.graph
    }

    pub fn cover(&self) -> &CoverController {
        &self.cover
    }

    pub fn asset(&self) -> &PanicAsset {
        &self.asset
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// Playlist index of the connected track
    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    /// Latest selection whose stream has not connected yet
    pub fn pending_index(&self) -> Option<usize> {
        self.pending_index
    }

    /// Last error shown to the user
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    /// Flush the output sink
    pub fn finish(&mut self) -> Result<()> {
        self.graph.finish()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("graph", &self.graph)
            .field("cover", &self.cover.state())
            .field("playlist", &self.playlist.len())
            .field("current_index", &self.current_index)
            .field("pending_index", &self.pending_index)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cover::{DisplayHandle, Key, TriggerKey};
    use crate::engine::{encode_wav_bytes, generate_test_tone, NullSink};
    use crate::track::Track;
    use std::sync::Arc;

    fn session() -> Session {
        let config = PlayerConfig {
            sample_rate: 8000,
            block_frames: 128,
            default_trigger: TriggerKey::KeyP,
            ..PlayerConfig::default()
        };
        let sink = NullSink::new(config.sample_rate);
        Session::new(config, Box::new(sink), None).with_rng_seed(3)
    }

    fn wav(seconds: f32) -> Vec<u8> {
        encode_wav_bytes(&generate_test_tone(220.0, seconds, 8000)).unwrap()
    }

    fn sources(n: usize) -> Vec<BlobSource> {
        (0..n).map(|i| BlobSource::memory(format!("song{}.wav", i), wav(0.5))).collect()
    }

    /// Run read commands inline, the way the event loop would
    fn complete(session: &mut Session, commands: Vec<Command>) {
        for command in commands {
            if let Command::ReadTrack { index, label, source } = command {
                let BlobSource::Memory { data, .. } = source else {
                    panic!("memory source expected");
                };
                let event = match StreamHandle::decode(Track::from_bytes(data, label, index)) {
                    Ok(handle) => Event::TrackLoaded(handle),
                    Err(e) => Event::TrackFailed {
                        index,
                        reason: e.to_string(),
                    },
                };
                session.dispatch(event);
            }
        }
    }

    #[test]
    fn test_file_selection_loads_first_track() {
        let mut session = session();
        let commands = session.dispatch(Event::FilesSelected(sources(3)));
        assert!(matches!(commands[0], Command::ReadTrack { index: 0, .. }));
        assert!(matches!(commands.last(), Some(Command::Persist(_))));

        complete(&mut session, commands);
        assert_eq!(session.current_index(), Some(0));
        assert!(session.graph().is_playing());
    }

    #[test]
    fn test_out_of_range_selection_keeps_state() {
        let mut session = session();
        let commands = session.dispatch(Event::FilesSelected(sources(2)));
        complete(&mut session, commands);

        let err = session.select_track(5).unwrap_err();
        assert!(matches!(err, VeilError::TrackOutOfRange { index: 5, len: 2 }));
        assert_eq!(session.current_index(), Some(0));
        assert_eq!(session.graph().current_index(), Some(0));

        assert!(session.dispatch(Event::TrackSelected(9)).is_empty());
        assert!(session.notice().is_some());
    }

    #[test]
    fn test_trigger_pauses_and_stays_paused() {
        let mut session = session();
        let commands = session.dispatch(Event::FilesSelected(sources(1)));
        complete(&mut session, commands);
        session.dispatch(Event::Tick);

        session.dispatch(Event::KeyPressed(KeyEvent::down(Key::Letter('P'))));
        assert!(matches!(session.screen(), Screen::Cover(_)));
        assert!(session.graph().is_paused());

        session.dispatch(Event::Transport(TransportCommand::Resume));
        assert!(session.graph().is_paused());

        session.dispatch(Event::KeyPressed(KeyEvent::down(Key::Letter('P'))));
        assert!(matches!(session.screen(), Screen::Player(_)));
        assert!(session.graph().is_paused());

        session.dispatch(Event::Transport(TransportCommand::Resume));
        assert!(session.graph().is_playing());
    }

    #[test]
    fn test_track_loaded_under_cover_stays_paused() {
        let mut session = session();
        let commands = session.dispatch(Event::FilesSelected(sources(2)));
        session.dispatch(Event::KeyPressed(KeyEvent::down(Key::Letter('P'))));
        complete(&mut session, commands);

        assert!(session.cover().is_cover_visible());
        assert!(session.graph().is_paused());
        assert_eq!(session.graph().current_index(), Some(0));
    }

    #[test]
    fn test_cover_shows_asset() {
        let mut session = session();
        session.dispatch(Event::AssetLoaded {
            mime: "image/png".to_string(),
            data: Arc::from(vec![1u8, 2, 3]),
        });
        session.dispatch(Event::AssetLoaded {
            mime: "text/plain".to_string(),
            data: Arc::from(b"notes".to_vec()),
        });
        assert!(session.notice().unwrap().contains("text/plain"));

        session.dispatch(Event::KeyPressed(KeyEvent::down(Key::Letter('P'))));
        let Screen::Cover(view) = session.screen() else {
            panic!("cover expected");
        };
        assert!(matches!(view.display, DisplayHandle::Image { .. }));
    }

    #[test]
    fn test_shuffle_picks_another_track() {
        let mut session = session();
        let commands = session.dispatch(Event::FilesSelected(sources(4)));
        complete(&mut session, commands);

        let commands = session.dispatch(Event::Transport(TransportCommand::Shuffle));
        let Some(Command::ReadTrack { index, .. }) = commands.first() else {
            panic!("read expected");
        };
        let index = *index;
        assert_ne!(index, 0);
        assert_eq!(session.pending_index(), Some(index));
        assert_eq!(session.current_index(), Some(0));

        complete(&mut session, commands);
        assert_eq!(session.current_index(), Some(index));
        assert_eq!(session.pending_index(), None);
    }

    #[test]
    fn test_failed_load_keeps_current_index() {
        let mut session = session();
        let mut files = sources(1);
        files.push(BlobSource::memory("broken.mp3", vec![7u8; 64]));
        let commands = session.dispatch(Event::FilesSelected(files));
        complete(&mut session, commands);

        let commands = session.dispatch(Event::TrackSelected(1));
        assert_eq!(session.pending_index(), Some(1));
        complete(&mut session, commands);

        assert_eq!(session.current_index(), Some(0));
        assert_eq!(session.graph().current_index(), Some(0));
        assert_eq!(session.pending_index(), None);
        assert!(session.notice().unwrap().contains("track 1"));

        // Shuffle never picks the track that is already playing
        for _ in 0..20 {
            let commands = session.dispatch(Event::Transport(TransportCommand::Shuffle));
            assert!(matches!(commands.first(), Some(Command::ReadTrack { index: 1, .. })));
        }
    }

    #[test]
    fn test_detected_theme_saved_once() {
        let mut session = session();
        let commands = session.startup_commands();
        let [Command::Persist(state)] = commands.as_slice() else {
            panic!("one persist expected");
        };
        assert_eq!(state.theme, session.theme());
        assert!(state.playlist_labels.is_empty());
        assert!(session.startup_commands().is_empty());
    }

    #[test]
    fn test_rename_updates_playlist_and_persists() {
        let mut session = session();
        let commands = session.dispatch(Event::FilesSelected(sources(2)));
        complete(&mut session, commands);

        let commands = session.dispatch(Event::TrackRenamed {
            index: 0,
            label: "Chemistry".to_string(),
        });
        let Some(Command::Persist(state)) = commands.first() else {
            panic!("persist expected");
        };
        assert_eq!(state.playlist_labels[0], "Chemistry");

        let Screen::Player(view) = session.screen() else {
            panic!("player expected");
        };
        assert_eq!(view.now_playing.as_deref(), Some("Chemistry"));
        assert!(view.playlist[0].active);
    }

    #[test]
    fn test_restored_labels() {
        let config = PlayerConfig::default();
        let persisted = PersistedState::new(Theme::Dark, vec!["Unit 1 - Math Lecture.mp3".to_string()]);
        let mut session = Session::new(config, Box::new(NullSink::new(48000)), Some(persisted));
        assert_eq!(session.theme(), Theme::Dark);
        assert_eq!(session.playlist().len(), 1);
        assert!(session.select_track(0).is_err());
        assert!(session.startup_commands().is_empty());
    }

    #[test]
    fn test_invalid_rate_keeps_old_rate() {
        let mut session = session();
        session.dispatch(Event::ParamChanged(ParamChange::PlaybackRate(1.5)));
        session.dispatch(Event::ParamChanged(ParamChange::PlaybackRate(-2.0)));
        assert_eq!(session.graph().playback_rate(), 1.5);
        assert!(session.notice().is_some());
    }

    #[test]
    fn test_shutdown_flag() {
        let mut session = session();
        assert!(!session.is_shutdown());
        session.dispatch(Event::Shutdown);
        assert!(session.is_shutdown());
    }
}
