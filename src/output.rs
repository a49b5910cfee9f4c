//! Output lines and the volume-to-gain law.
use clap::ValueEnum;
use log::debug;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, Sink};
use std::thread;
use std::time::{Duration, Instant};

use crate::decoder::PcmFormat;
use crate::error::{PlayerError, PlayerResult};

/// The kind of gain control an output line exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum GainControl {
    /// Linear amplitude, expected in [0, 1].
    #[default]
    Volume,
    /// Logarithmic master gain in decibels.
    MasterGain,
}

/// Converts a volume in [0, 1] to the value the given control expects.
/// A volume of 0 against a master-gain control yields `-inf` dB; lines
/// must treat that as mute.
pub fn gain_for(control: GainControl, volume: f32) -> f32 {
    match control {
        GainControl::Volume => volume,
        GainControl::MasterGain => 20.0 * volume.log10(),
    }
}

/// Inverse of the master-gain law; `-inf` (and NaN) map to silence.
pub fn decibels_to_linear(db: f32) -> f32 {
    if db.is_nan() || db == f32::NEG_INFINITY {
        0.0
    } else {
        10f32.powf(db / 20.0)
    }
}

/// A PCM line open on some output device. Lines live on the playback
/// thread that opened them.
pub trait OutputLine {
    fn gain_control(&self) -> GainControl;
    fn set_gain(&mut self, value: f32);
    fn write(&mut self, pcm: &[u8]) -> PlayerResult<()>;
    /// Halts output immediately, discarding anything still queued.
    fn stop(&mut self);
    fn close(&mut self);
}

/// Opens output lines for a PCM format.
pub trait OutputSink: Send + Sync {
    fn open(&self, format: PcmFormat) -> PlayerResult<Box<dyn OutputLine>>;
}

/// Default sound device, through rodio.
#[derive(Debug, Clone)]
pub struct RodioOutput {
    gain_control: GainControl,
    max_queued: usize,
    stall_limit: Duration,
}

impl Default for RodioOutput {
    fn default() -> Self {
        Self {
            gain_control: GainControl::Volume,
            max_queued: 16,
            stall_limit: Duration::from_secs(2),
        }
    }
}

impl RodioOutput {
    pub fn new(gain_control: GainControl) -> Self {
        Self {
            gain_control,
            ..Self::default()
        }
    }
}

impl OutputSink for RodioOutput {
    fn open(&self, format: PcmFormat) -> PlayerResult<Box<dyn OutputLine>> {
        let (stream, handle) =
            OutputStream::try_default().map_err(|e| PlayerError::LineUnavailable(e.to_string()))?;
        let sink = Sink::try_new(&handle).map_err(|e| PlayerError::LineUnavailable(e.to_string()))?;
        sink.play();

        debug!(
            "Opened output line: {} Hz, {} channel(s), {:?} control",
            format.sample_rate, format.channels, self.gain_control
        );

        Ok(Box::new(RodioLine {
            device: Some((stream, sink)),
            format,
            gain_control: self.gain_control,
            max_queued: self.max_queued,
            stall_limit: self.stall_limit,
        }))
    }
}

struct RodioLine {
    // The stream must outlive the sink that plays on it.
    device: Option<(OutputStream, Sink)>,
    format: PcmFormat,
    gain_control: GainControl,
    max_queued: usize,
    stall_limit: Duration,
}

impl RodioLine {
    fn sink(&self) -> PlayerResult<&Sink> {
        self.device
            .as_ref()
            .map(|(_, sink)| sink)
            .ok_or_else(|| PlayerError::LineUnavailable("line closed".to_string()))
    }
}

impl OutputLine for RodioLine {
    fn gain_control(&self) -> GainControl {
        self.gain_control
    }

    fn set_gain(&mut self, value: f32) {
        let linear = match self.gain_control {
            GainControl::Volume => value,
            GainControl::MasterGain => decibels_to_linear(value),
        };
        if let Some((_, sink)) = self.device.as_ref() {
            debug!("Output gain {:?} = {} (linear {})", self.gain_control, value, linear);
            sink.set_volume(linear);
        }
    }

    fn write(&mut self, pcm: &[u8]) -> PlayerResult<()> {
        let sink = self.sink()?;

        // Block like a sound-card line would while the queue is full.
        let waiting_since = Instant::now();
        while sink.len() >= self.max_queued {
            if waiting_since.elapsed() > self.stall_limit {
                return Err(PlayerError::LineUnavailable("output device stalled".to_string()));
            }
            thread::sleep(Duration::from_millis(5));
        }

        let samples: Vec<i16> = pcm
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        if !samples.is_empty() {
            sink.append(SamplesBuffer::new(self.format.channels, self.format.sample_rate, samples));
        }
        Ok(())
    }

    fn stop(&mut self) {
        if let Some((_, sink)) = self.device.as_ref() {
            sink.stop();
        }
    }

    fn close(&mut self) {
        if self.device.take().is_some() {
            debug!("Output line closed");
        }
    }
}
