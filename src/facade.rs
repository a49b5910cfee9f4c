//! The stable control surface front ends drive.
use serde::{Deserialize, Serialize};

use crate::engine::{PlaybackEngine, RunState, StopOutcome};

/// What a host (terminal UI, scripting bridge) may ask of a stream player.
pub trait StreamPlayer {
    /// Whether the player is expected to be running.
    fn is_running(&self) -> bool;
    fn start_player(&self) -> bool;
    fn stop_player(&self) -> bool;
    /// Volume in [0, 1].
    fn volume(&self) -> f32;
    fn set_volume(&self, volume: f32) -> bool;
    /// The configured stream URL, or `None` when there is no player.
    fn stream(&self) -> Option<String>;
    fn set_stream(&self, url: &str) -> bool;
}

/// Snapshot of the facade, as reported to scripts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStatus {
    pub attached: bool,
    pub running: bool,
    pub state: String,
    pub volume: f32,
    pub stream: Option<String>,
}

/// Delegates to a [`PlaybackEngine`] when one is attached. Hosts may query
/// before the engine exists or after it is gone, so every call has a
/// sensible answer for the detached case.
#[derive(Default)]
pub struct StreamPlayerFacade {
    player: Option<PlaybackEngine>,
}

impl StreamPlayerFacade {
    pub fn new(player: PlaybackEngine) -> Self {
        Self { player: Some(player) }
    }

    pub fn detached() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, player: PlaybackEngine) -> Option<PlaybackEngine> {
        self.player.replace(player)
    }

    /// Removes the engine, stopping it first.
    pub fn detach(&mut self) -> Option<PlaybackEngine> {
        let player = self.player.take();
        if let Some(player) = &player {
            player.stop();
        }
        player
    }

    pub fn engine(&self) -> Option<&PlaybackEngine> {
        self.player.as_ref()
    }

    pub fn run_state(&self) -> RunState {
        self.player.as_ref().map_or(RunState::Stopped, PlaybackEngine::state)
    }

    /// Like [`StreamPlayer::stop_player`], but tells a hung stream apart
    /// from a normal stop.
    pub fn stop_with_outcome(&self) -> StopOutcome {
        self.player
            .as_ref()
            .map_or(StopOutcome::AlreadyStopped, PlaybackEngine::stop_with_outcome)
    }

    pub fn status(&self) -> PlayerStatus {
        let state = match self.run_state() {
            RunState::Stopped => "stopped",
            RunState::Starting => "starting",
            RunState::Running => "running",
        };
        PlayerStatus {
            attached: self.player.is_some(),
            running: self.is_running(),
            state: state.to_string(),
            volume: self.volume(),
            stream: self.stream(),
        }
    }
}

impl StreamPlayer for StreamPlayerFacade {
    fn is_running(&self) -> bool {
        self.player.as_ref().is_some_and(PlaybackEngine::is_running)
    }

    fn start_player(&self) -> bool {
        self.player.as_ref().is_some_and(PlaybackEngine::start)
    }

    fn stop_player(&self) -> bool {
        self.player.as_ref().is_some_and(PlaybackEngine::stop)
    }

    fn volume(&self) -> f32 {
        self.player.as_ref().map_or(0.0, PlaybackEngine::volume)
    }

    fn set_volume(&self, volume: f32) -> bool {
        self.player.as_ref().is_some_and(|p| p.set_volume(volume))
    }

    fn stream(&self) -> Option<String> {
        self.player.as_ref().map(PlaybackEngine::url)
    }

    fn set_stream(&self, url: &str) -> bool {
        self.player.as_ref().is_some_and(|p| p.set_url(url))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::decoder::{Decoder, PcmFormat, PcmStream};
    use crate::engine::{Backend, EngineConfig};
    use crate::error::PlayerResult;
    use crate::output::{GainControl, OutputLine, OutputSink};
    use crate::source::{AudioSource, ByteStream};
    use std::io::Cursor;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    struct SilentSource;

    impl AudioSource for SilentSource {
        fn open(&self, _url: &str, _cancel: &CancellationToken) -> PlayerResult<ByteStream> {
            Ok(Box::new(Cursor::new(Vec::new())))
        }
    }

    struct SilenceDecoder;

    struct Silence;

    impl Decoder for SilenceDecoder {
        fn decode(&self, _stream: ByteStream) -> PlayerResult<Box<dyn PcmStream>> {
            Ok(Box::new(Silence))
        }
    }

    impl PcmStream for Silence {
        fn format(&self) -> PcmFormat {
            PcmFormat::new(22_050, 1)
        }

        fn read(&mut self, buf: &mut [u8]) -> PlayerResult<usize> {
            thread::sleep(Duration::from_millis(2));
            buf.fill(0);
            Ok(buf.len())
        }
    }

    struct NullOutput;

    struct NullLine;

    impl OutputSink for NullOutput {
        fn open(&self, _format: PcmFormat) -> PlayerResult<Box<dyn OutputLine>> {
            Ok(Box::new(NullLine))
        }
    }

    impl OutputLine for NullLine {
        fn gain_control(&self) -> GainControl {
            GainControl::Volume
        }
        fn set_gain(&mut self, _value: f32) {}
        fn write(&mut self, _pcm: &[u8]) -> PlayerResult<()> {
            Ok(())
        }
        fn stop(&mut self) {}
        fn close(&mut self) {}
    }

    /// An engine that plays endless silence to nowhere.
    pub(crate) fn silent_engine(url: &str) -> PlaybackEngine {
        let backend = Backend {
            source: Arc::new(SilentSource),
            decoder: Arc::new(SilenceDecoder),
            output: Arc::new(NullOutput),
        };
        PlaybackEngine::with_backend(url, backend, EngineConfig::default())
    }

    #[test]
    fn test_detached_facade_defaults() {
        let facade = StreamPlayerFacade::detached();
        assert!(!facade.is_running());
        assert!(!facade.start_player());
        assert!(!facade.stop_player());
        assert!(!facade.set_volume(0.5));
        assert!(!facade.set_stream("http://example.com/live"));
        assert_eq!(facade.stream(), None);
        assert_eq!(facade.volume(), 0.0);
        assert_eq!(facade.stop_with_outcome(), StopOutcome::AlreadyStopped);
    }

    #[test]
    fn test_facade_delegates_lifecycle() {
        let facade = StreamPlayerFacade::new(silent_engine("http://example.com/live-high"));
        assert!(!facade.is_running());
        assert!(facade.start_player());
        assert!(facade.is_running());
        assert!(!facade.start_player());
        assert!(facade.stop_player());
        assert!(!facade.is_running());
        assert!(!facade.stop_player());
    }

    #[test]
    fn test_facade_stream_policy() {
        let facade = StreamPlayerFacade::new(silent_engine("http://example.com/live-high"));
        assert!(facade.set_stream("http://example.com/live-low"));
        assert_eq!(facade.stream().as_deref(), Some("http://example.com/live-low"));

        assert!(facade.start_player());
        assert!(!facade.set_stream("http://example.com/live-mobile"));
        assert_eq!(facade.stream().as_deref(), Some("http://example.com/live-low"));
        assert!(facade.stop_player());
    }

    #[test]
    fn test_facade_volume() {
        let facade = StreamPlayerFacade::new(silent_engine("http://example.com/live-high"));
        assert_eq!(facade.volume(), 1.0);
        assert!(facade.set_volume(0.25));
        assert_eq!(facade.volume(), 0.25);
    }

    #[test]
    fn test_detach_stops_engine() {
        let mut facade = StreamPlayerFacade::new(silent_engine("http://example.com/live-high"));
        assert!(facade.start_player());

        let engine = facade.detach().expect("engine was attached");
        assert!(!engine.is_running());
        assert!(!facade.is_running());
        assert_eq!(facade.stream(), None);

        assert!(facade.attach(engine).is_none());
        assert!(facade.start_player());
    }

    #[test]
    fn test_status_serializes() {
        let facade = StreamPlayerFacade::new(silent_engine("http://example.com/live-high"));
        let status = facade.status();
        assert_eq!(status.state, "stopped");

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["attached"], true);
        assert_eq!(json["running"], false);
        assert_eq!(json["stream"], "http://example.com/live-high");
    }
}
