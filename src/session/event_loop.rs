//! Single-threaded event loop
//!
//! Owns the `Session` and a queue of events. Commands returned by dispatch
//! run as tasks on the current runtime and post their completion back onto
//! the queue; the session itself is only touched between awaits, on the
//! loop's own task. Track reads decode on a blocking thread, one at a time
//! in request order, so a long decode never holds up a key press. Reads are
//! never cancelled, the latest completion wins.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};

use crate::error::Result;
use crate::session::context::Session;
use crate::session::event::{Command, Event};
use crate::state::SettingsStore;
use crate::engine::StreamHandle;
use crate::track::Track;

/// Drives a session from a queue of events
pub struct EventLoop {
    session: Session,
    store: Option<SettingsStore>,
    tx: UnboundedSender<Event>,
    rx: UnboundedReceiver<Event>,
    in_flight: JoinSet<()>,
    /// Commands the session asked for at startup, spawned on first run
    startup: Vec<Command>,
    /// Serialises track decodes in the order they were requested
    decode_lock: Arc<Mutex<()>>,
    /// Serialises state writes in the order they were requested
    persist_lock: Arc<Mutex<()>>,
}

impl EventLoop {
    /// Wrap `session`; `store` receives persist commands (None drops them)
    pub fn new(mut session: Session, store: Option<SettingsStore>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let startup = session.startup_commands();
        Self {
            session,
            store,
            tx,
            rx,
            in_flight: JoinSet::new(),
            startup,
            decode_lock: Arc::new(Mutex::new(())),
            persist_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Handle for posting events from other tasks
    pub fn sender(&self) -> UnboundedSender<Event> {
        self.tx.clone()
    }

    /// Queue an event
    pub fn submit(&self, event: Event) {
        // The receiver lives in self, so the send cannot fail
        let _ = self.tx.send(event);
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Post a `Tick` every block period until the loop goes away
    pub fn spawn_clock(&self) -> JoinHandle<()> {
        let config = self.session.config();
        let period = Duration::from_secs_f64(config.block_frames as f64 / config.sample_rate.max(1) as f64)
            .max(Duration::from_millis(1));
        let tx = self.sender();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Burst);
            loop {
                interval.tick().await;
                if tx.send(Event::Tick).is_err() {
                    break;
                }
            }
        })
    }

    /// Process events until `Shutdown`, then flush the sink
    pub async fn run(&mut self) -> Result<()> {
        info!("[LOOP] Running");
        self.spawn_startup();
        loop {
            tokio::select! {
                Some(event) = self.rx.recv() => {
                    self.handle(event);
                    if self.session.is_shutdown() {
                        break;
                    }
                }
                Some(joined) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    if let Err(e) = joined {
                        error!("[LOOP] Task failed: {}", e);
                    }
                }
            }
        }

        self.drain_in_flight().await;
        info!("[LOOP] Shut down");
        self.session.finish()
    }

    /// Process queued events and wait for every in-flight command,
    /// including the events their completions post
    pub async fn run_until_idle(&mut self) {
        loop {
            self.process_pending();

            match self.in_flight.join_next().await {
                Some(Err(e)) => error!("[LOOP] Task failed: {}", e),
                Some(Ok(())) => {}
                None => break,
            }
        }
    }

    /// Handle every queued event without waiting on in-flight commands
    ///
    /// Returns the number of events handled.
    pub fn process_pending(&mut self) -> usize {
        self.spawn_startup();
        let mut handled = 0;
        while let Ok(event) = self.rx.try_recv() {
            self.handle(event);
            handled += 1;
        }
        handled
    }

    fn spawn_startup(&mut self) {
        for command in std::mem::take(&mut self.startup) {
            self.spawn(command);
        }
    }

    async fn drain_in_flight(&mut self) {
        while let Some(joined) = self.in_flight.join_next().await {
            if let Err(e) = joined {
                error!("[LOOP] Task failed: {}", e);
            }
        }
    }

    fn handle(&mut self, event: Event) {
        for command in self.session.dispatch(event) {
            self.spawn(command);
        }
    }

    fn spawn(&mut self, command: Command) {
        let tx = self.tx.clone();
        match command {
            Command::ReadTrack { index, label, source } => {
                debug!("[LOOP] Reading track {}", index);
                let lock = Arc::clone(&self.decode_lock);
                self.in_flight.spawn(async move {
                    let _guard = lock.lock().await;
                    let decoded = match source.read().await {
                        Ok(data) => {
                            let track = Track::from_bytes(data, label, index);
                            match tokio::task::spawn_blocking(move || StreamHandle::decode(track)).await {
                                Ok(result) => result.map_err(|e| e.to_string()),
                                Err(e) => Err(format!("decode task failed: {}", e)),
                            }
                        }
                        Err(e) => Err(e.to_string()),
                    };
                    let event = match decoded {
                        Ok(handle) => Event::TrackLoaded(handle),
                        Err(reason) => Event::TrackFailed { index, reason },
                    };
                    let _ = tx.send(event);
                });
            }
            Command::ReadAsset(source) => {
                self.in_flight.spawn(async move {
                    let mime = source.mime();
                    let event = match source.read().await {
                        Ok(data) => Event::AssetLoaded { mime, data },
                        Err(e) => Event::ReadFailed {
                            what: "cover asset".to_string(),
                            reason: e.to_string(),
                        },
                    };
                    let _ = tx.send(event);
                });
            }
            Command::Persist(state) => {
                let Some(store) = self.store.clone() else {
                    return;
                };
                let lock = Arc::clone(&self.persist_lock);
                self.in_flight.spawn(async move {
                    let _guard = lock.lock().await;
                    match tokio::task::spawn_blocking(move || store.save(&state)).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => warn!("[LOOP] Could not save state: {}", e),
                        Err(e) => error!("[LOOP] Persist task failed: {}", e),
                    }
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlayerConfig;
    use crate::cover::{Key, KeyEvent, TriggerKey};
    use crate::engine::{encode_wav_bytes, generate_test_tone, MemorySink};
    use crate::track::BlobSource;
    use tempfile::TempDir;

    fn event_loop(store: Option<SettingsStore>) -> (EventLoop, crate::engine::CapturedAudio) {
        let config = PlayerConfig {
            sample_rate: 8000,
            block_frames: 100,
            default_trigger: TriggerKey::KeyP,
            ..PlayerConfig::default()
        };
        let (sink, captured) = MemorySink::new(8000);
        let session = Session::new(config, Box::new(sink), None);
        (EventLoop::new(session, store), captured)
    }

    fn tone() -> Vec<u8> {
        encode_wav_bytes(&generate_test_tone(440.0, 1.0, 8000)).unwrap()
    }

    #[tokio::test]
    async fn test_selection_reads_and_connects() {
        let (mut event_loop, _) = event_loop(None);
        event_loop.submit(Event::FilesSelected(vec![BlobSource::memory("a.wav", tone())]));
        event_loop.run_until_idle().await;

        assert_eq!(event_loop.session().graph().current_index(), Some(0));
        assert!(event_loop.session().graph().is_playing());
    }

    #[tokio::test]
    async fn test_path_source_and_persist() {
        let temp = TempDir::new().unwrap();
        let audio = temp.path().join("lecture.wav");
        std::fs::write(&audio, tone()).unwrap();

        let store = SettingsStore::new(temp.path().join("state"));
        let (mut event_loop, _) = event_loop(Some(store.clone()));
        event_loop.submit(Event::FilesSelected(vec![BlobSource::Path(audio)]));
        event_loop.run_until_idle().await;

        assert!(event_loop.session().graph().is_playing());
        let saved = store.load().unwrap().unwrap();
        assert_eq!(saved.playlist_labels, vec!["Unit 1 - Math Lecture.mp3".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_file_reports_and_keeps_graph() {
        let temp = TempDir::new().unwrap();
        let (mut event_loop, _) = event_loop(None);
        event_loop.submit(Event::FilesSelected(vec![BlobSource::Path(temp.path().join("gone.wav"))]));
        event_loop.run_until_idle().await;

        assert!(event_loop.session().graph().current_index().is_none());
        assert!(event_loop.session().notice().is_some());
    }

    #[tokio::test]
    async fn test_key_handled_while_track_decodes() {
        let (mut event_loop, _) = event_loop(None);
        let long = encode_wav_bytes(&generate_test_tone(440.0, 60.0, 44100)).unwrap();
        event_loop.submit(Event::FilesSelected(vec![
            BlobSource::memory("a.wav", tone()),
            BlobSource::memory("b.wav", long),
        ]));
        event_loop.run_until_idle().await;
        assert_eq!(event_loop.session().graph().current_index(), Some(0));

        event_loop.submit(Event::TrackSelected(1));
        assert_eq!(event_loop.process_pending(), 1);
        // Let the read finish and hand the bytes to the decoder
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }

        event_loop.submit(Event::KeyPressed(KeyEvent::down(Key::Letter('P'))));
        event_loop.process_pending();
        let session = event_loop.session();
        assert!(session.screen().is_cover());
        assert!(session.graph().is_paused());
        assert_eq!(session.graph().current_index(), Some(0));
        assert_eq!(session.pending_index(), Some(1));

        event_loop.run_until_idle().await;
        let session = event_loop.session();
        assert_eq!(session.current_index(), Some(1));
        assert!(session.screen().is_cover());
        assert!(session.graph().is_paused());
    }

    #[tokio::test]
    async fn test_detected_theme_saved_on_start() {
        let temp = TempDir::new().unwrap();
        let store = SettingsStore::new(temp.path().join("state"));
        let (mut event_loop, _) = event_loop(Some(store.clone()));
        event_loop.run_until_idle().await;

        let saved = store.load().unwrap().unwrap();
        assert_eq!(saved.theme, event_loop.session().theme());
        assert!(saved.playlist_labels.is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (mut event_loop, captured) = event_loop(None);
        event_loop.submit(Event::FilesSelected(vec![BlobSource::memory("a.wav", tone())]));
        event_loop.run_until_idle().await;

        event_loop.submit(Event::Tick);
        event_loop.submit(Event::KeyPressed(KeyEvent::down(Key::Letter('P'))));
        event_loop.submit(Event::Tick);
        event_loop.submit(Event::Shutdown);
        event_loop.run().await.unwrap();

        assert_eq!(captured.frames(), 200);
        assert!(event_loop.session().screen().is_cover());
        assert!(event_loop.session().graph().is_paused());
    }
}
