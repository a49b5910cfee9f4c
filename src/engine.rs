//! The streaming-decode-playback engine.
//!
//! A [`PlaybackEngine`] owns at most one background playback thread. The
//! thread opens the configured endpoint, decodes it to PCM, and writes
//! fixed-size chunks to an output line until it is cancelled or the stream
//! ends. All control calls are safe to make from any thread; only `stop`
//! blocks, and only for as long as the join timeout allows.

use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::decoder::{Decoder, MpegDecoder, PcmStream};
use crate::error::{PlayerError, PlayerResult};
use crate::output::{gain_for, GainControl, OutputLine, OutputSink, RodioOutput};
use crate::source::{AudioSource, HttpSource};

pub const DEFAULT_CHUNK_SIZE: usize = 4096;
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Bytes of PCM read and written per loop iteration.
    pub chunk_size: usize,
    /// How long `stop` waits for the playback thread before detaching it.
    pub join_timeout: Duration,
    pub connect_timeout: Duration,
    pub gain_control: GainControl,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            join_timeout: DEFAULT_JOIN_TIMEOUT,
            connect_timeout: Duration::from_secs(10),
            gain_control: GainControl::Volume,
        }
    }
}

/// The three capabilities a playback session is built from.
#[derive(Clone)]
pub struct Backend {
    pub source: Arc<dyn AudioSource>,
    pub decoder: Arc<dyn Decoder>,
    pub output: Arc<dyn OutputSink>,
}

impl Backend {
    /// HTTP source, MPEG decoder and the default sound device.
    pub fn system(config: &EngineConfig) -> Self {
        Self {
            source: Arc::new(HttpSource::new(config.connect_timeout)),
            decoder: Arc::new(MpegDecoder),
            output: Arc::new(RodioOutput::new(config.gain_control)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Stopped,
    /// A playback thread exists but has not opened its output line yet.
    Starting,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    /// The thread did not finish within the join timeout and was detached.
    TimedOut,
    AlreadyStopped,
}

/// Volume shared between the control surface and the playback thread.
/// Stored as raw `f32` bits so reads are never torn and never rounded.
#[derive(Debug)]
pub struct AtomicVolume(AtomicU32);

impl AtomicVolume {
    pub fn new(volume: f32) -> Self {
        Self(AtomicU32::new(volume.to_bits()))
    }

    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, volume: f32) {
        self.0.store(volume.to_bits(), Ordering::Release);
    }
}

struct ActiveContext {
    id: u64,
    cancel: CancellationToken,
    streaming: Arc<AtomicBool>,
    handle: JoinHandle<()>,
    done: Receiver<()>,
}

struct Control {
    endpoint: String,
    active: Option<ActiveContext>,
    /// Set while `stop` waits for a context it has already taken out of
    /// `active`. No new context may start until the wait is over.
    stopping: bool,
}

struct EngineInner {
    control: Mutex<Control>,
    volume: AtomicVolume,
    next_id: AtomicU64,
    backend: Backend,
    config: EngineConfig,
}

impl EngineInner {
    fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Called by a playback thread on its way out. Clears the active slot
    /// only if that slot still belongs to the caller.
    fn retire(&self, id: u64) {
        let mut control = self.control();
        if control.active.as_ref().is_some_and(|ctx| ctx.id == id) {
            control.active = None;
            debug!("Playback context {} retired itself", id);
        }
    }
}

/// Lives on the playback thread's stack so the context is retired and `stop`
/// is woken even when the session unwinds.
struct RetireOnExit {
    id: u64,
    inner: Arc<EngineInner>,
    done: mpsc::Sender<()>,
}

impl Drop for RetireOnExit {
    fn drop(&mut self) {
        if thread::panicking() {
            warn!("Playback context {} panicked", self.id);
        }
        self.inner.retire(self.id);
        let _ = self.done.send(());
    }
}

pub struct PlaybackEngine {
    inner: Arc<EngineInner>,
}

impl PlaybackEngine {
    /// Engine on the real network and sound device.
    pub fn new(endpoint: impl Into<String>, config: EngineConfig) -> Self {
        let backend = Backend::system(&config);
        Self::with_backend(endpoint, backend, config)
    }

    pub fn with_backend(endpoint: impl Into<String>, backend: Backend, config: EngineConfig) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                control: Mutex::new(Control {
                    endpoint: endpoint.into(),
                    active: None,
                    stopping: false,
                }),
                volume: AtomicVolume::new(1.0),
                next_id: AtomicU64::new(1),
                backend,
                config,
            }),
        }
    }

    /// Requests playback of the current endpoint. Returns false if a
    /// playback thread already exists, or if a `stop` on another thread is
    /// still waiting for the previous one. Does not wait for the stream to
    /// open.
    pub fn start(&self) -> bool {
        let mut control = self.inner.control();
        if control.active.is_some() {
            debug!("Start ignored: already running");
            return false;
        }
        if control.stopping {
            debug!("Start ignored: previous context is still stopping");
            return false;
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let streaming = Arc::new(AtomicBool::new(false));
        let (done_tx, done) = mpsc::channel();

        let session = Session {
            id,
            url: control.endpoint.clone(),
            cancel: cancel.clone(),
            streaming: Arc::clone(&streaming),
            inner: Arc::clone(&self.inner),
        };

        let spawned = thread::Builder::new()
            .name(format!("playback-{id}"))
            .spawn(move || {
                let _retire = RetireOnExit {
                    id,
                    inner: Arc::clone(&session.inner),
                    done: done_tx,
                };
                session.run();
            });

        match spawned {
            Ok(handle) => {
                info!("Playback context {} started for {}", id, control.endpoint);
                control.active = Some(ActiveContext {
                    id,
                    cancel,
                    streaming,
                    handle,
                    done,
                });
                true
            }
            Err(e) => {
                warn!("Failed to spawn playback thread: {}", e);
                false
            }
        }
    }

    /// Stops playback, waiting for the playback thread to finish.
    /// Returns true only on a clean join.
    pub fn stop(&self) -> bool {
        self.stop_with_outcome() == StopOutcome::Stopped
    }

    pub fn stop_with_outcome(&self) -> StopOutcome {
        // Clear the slot before cancelling so nobody sees a context that is
        // both current and being torn down.
        let ctx = {
            let mut control = self.inner.control();
            let Some(ctx) = control.active.take() else {
                return StopOutcome::AlreadyStopped;
            };
            control.stopping = true;
            ctx
        };

        debug!("Stopping playback context {}", ctx.id);
        ctx.cancel.cancel();

        let outcome = self.await_context(ctx);
        self.inner.control().stopping = false;
        outcome
    }

    fn await_context(&self, ctx: ActiveContext) -> StopOutcome {
        match ctx.done.recv_timeout(self.inner.config.join_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if ctx.handle.join().is_err() {
                    debug!("Playback context {} ended by panic", ctx.id);
                }
                info!("Playback context {} stopped", ctx.id);
                StopOutcome::Stopped
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "Playback context {} did not stop within {:?}; detaching it",
                    ctx.id, self.inner.config.join_timeout
                );
                StopOutcome::TimedOut
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.control().active.is_some()
    }

    pub fn state(&self) -> RunState {
        match self.inner.control().active.as_ref() {
            None => RunState::Stopped,
            Some(ctx) if ctx.streaming.load(Ordering::Acquire) => RunState::Running,
            Some(_) => RunState::Starting,
        }
    }

    /// Stores the volume as given; values outside [0, 1] are the caller's
    /// problem.
    pub fn set_volume(&self, volume: f32) -> bool {
        self.inner.volume.store(volume);
        true
    }

    pub fn volume(&self) -> f32 {
        self.inner.volume.load()
    }

    /// Replaces the endpoint. Refused while a playback thread exists.
    pub fn set_url(&self, url: impl Into<String>) -> bool {
        let mut control = self.inner.control();
        if control.active.is_some() {
            debug!("Endpoint change refused while running");
            return false;
        }
        control.endpoint = url.into();
        debug!("Endpoint set to {}", control.endpoint);
        true
    }

    pub fn url(&self) -> String {
        self.inner.control().endpoint.clone()
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.stop_with_outcome();
    }
}

/// Everything one playback thread needs. Owned by that thread alone.
struct Session {
    id: u64,
    url: String,
    cancel: CancellationToken,
    streaming: Arc<AtomicBool>,
    inner: Arc<EngineInner>,
}

impl Session {
    fn run(self) {
        match self.play() {
            Ok(()) => info!("Stream {} ended", self.url),
            Err(_) if self.cancel.is_cancelled() => debug!("Playback context {} cancelled", self.id),
            Err(e) => warn!("Playback of {} failed: {}", self.url, e),
        }
    }

    fn play(&self) -> PlayerResult<()> {
        let backend = &self.inner.backend;

        let bytes = backend.source.open(&self.url, &self.cancel)?;
        if self.cancel.is_cancelled() {
            return Err(PlayerError::Cancelled);
        }

        let mut pcm = backend.decoder.decode(bytes)?;
        let format = pcm.format();
        debug!(
            "Negotiated PCM: {} Hz, {} channel(s), {}-bit",
            format.sample_rate,
            format.channels,
            crate::decoder::PcmFormat::BITS_PER_SAMPLE
        );

        let mut line = backend.output.open(format)?;
        self.streaming.store(true, Ordering::Release);

        let result = self.pump(pcm.as_mut(), line.as_mut());

        // Draining first hangs some backends; stop then close.
        line.stop();
        line.close();
        result
    }

    fn pump(&self, pcm: &mut dyn PcmStream, line: &mut dyn OutputLine) -> PlayerResult<()> {
        let mut buf = vec![0u8; chunk_len(self.inner.config.chunk_size, pcm.format().frame_size())];
        let mut applied_volume: Option<f32> = None;

        loop {
            if self.cancel.is_cancelled() {
                return Err(PlayerError::Cancelled);
            }

            let n = pcm.read(&mut buf)?;
            if n == 0 {
                return Ok(());
            }
            if self.cancel.is_cancelled() {
                return Err(PlayerError::Cancelled);
            }

            // Polled after the read so a change made while it blocked still
            // reaches this chunk.
            let volume = self.inner.volume.load();
            if applied_volume.map(f32::to_bits) != Some(volume.to_bits()) {
                line.set_gain(gain_for(line.gain_control(), volume));
                applied_volume = Some(volume);
            }

            line.write(&buf[..n])?;
        }
    }
}

/// Largest whole number of frames that fits in `chunk_size`, and never less
/// than one frame. Lines must only ever see complete frames.
fn chunk_len(chunk_size: usize, frame_size: usize) -> usize {
    let frame = frame_size.max(1);
    let len = chunk_size.max(frame);
    len - len % frame
}
