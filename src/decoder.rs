//! MPEG bytes to 16-bit PCM.
use log::debug;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions, ReadOnlySource};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};

use crate::error::{PlayerError, PlayerResult};
use crate::source::ByteStream;

/// Target PCM layout: signed 16-bit little-endian, interleaved, same rate
/// and channel count as the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmFormat {
    pub const BITS_PER_SAMPLE: u16 = 16;

    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self { sample_rate, channels }
    }

    /// Bytes per frame (one sample for every channel).
    pub fn frame_size(&self) -> usize {
        self.channels as usize * 2
    }

    pub fn bytes_per_second(&self) -> usize {
        self.frame_size() * self.sample_rate as usize
    }
}

/// A decoded stream of PCM frames in [`PcmFormat`].
pub trait PcmStream {
    fn format(&self) -> PcmFormat;

    /// Fills `buf` with PCM bytes. `Ok(0)` means end of stream.
    fn read(&mut self, buf: &mut [u8]) -> PlayerResult<usize>;
}

/// Negotiates a PCM format for a compressed byte stream.
pub trait Decoder: Send + Sync {
    fn decode(&self, stream: ByteStream) -> PlayerResult<Box<dyn PcmStream>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MpegDecoder;

impl Decoder for MpegDecoder {
    fn decode(&self, stream: ByteStream) -> PlayerResult<Box<dyn PcmStream>> {
        let mss = MediaSourceStream::new(Box::new(ReadOnlySource::new(stream)), MediaSourceStreamOptions::default());

        let mut hint = Hint::new();
        hint.with_extension("mp3");

        let probed = get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| match e {
                SymphoniaError::IoError(io) => PlayerError::Io(io),
                other => PlayerError::UnsupportedFormat(other.to_string()),
            })?;
        let format = probed.format;

        let track = format
            .default_track()
            .ok_or_else(|| PlayerError::UnsupportedFormat("no default track".to_string()))?;
        let track_id = track.id;
        let params = track.codec_params.clone();

        let sample_rate = params
            .sample_rate
            .ok_or_else(|| PlayerError::UnsupportedFormat("unknown sample rate".to_string()))?;
        let channels = params
            .channels
            .ok_or_else(|| PlayerError::UnsupportedFormat("unknown channel layout".to_string()))?
            .count() as u16;

        let decoder = get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| PlayerError::UnsupportedFormat(e.to_string()))?;

        debug!(
            "Found audio track: codec={:?}, sample_rate={}, channels={}",
            params.codec, sample_rate, channels
        );

        Ok(Box::new(MpegPcmStream {
            format,
            decoder,
            track_id,
            pcm: PcmFormat::new(sample_rate, channels),
            pending: Vec::new(),
            pos: 0,
            finished: false,
        }))
    }
}

struct MpegPcmStream {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn symphonia::core::codecs::Decoder>,
    track_id: u32,
    pcm: PcmFormat,
    pending: Vec<u8>,
    pos: usize,
    finished: bool,
}

impl MpegPcmStream {
    /// Decodes packets until some PCM is pending or the stream ends.
    fn refill(&mut self) -> PlayerResult<()> {
        while self.pos >= self.pending.len() && !self.finished {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    debug!("End of stream");
                    self.finished = true;
                    return Ok(());
                }
                Err(SymphoniaError::IoError(e)) => return Err(PlayerError::Io(e)),
                Err(SymphoniaError::ResetRequired) => {
                    return Err(PlayerError::UnsupportedFormat("decoder reset required".to_string()))
                }
                Err(e) => return Err(PlayerError::Decode(e.to_string())),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    // Non-fatal, skip bad frame
                    debug!("Skipping undecodable frame: {}", e);
                    continue;
                }
                Err(SymphoniaError::IoError(e)) => return Err(PlayerError::Io(e)),
                Err(e) => return Err(PlayerError::Decode(e.to_string())),
            };

            let spec = *decoded.spec();
            if spec.channels.count() as u16 != self.pcm.channels {
                return Err(PlayerError::UnsupportedFormat(format!(
                    "channel count changed mid-stream ({} -> {})",
                    self.pcm.channels,
                    spec.channels.count()
                )));
            }
            if decoded.frames() == 0 {
                continue;
            }

            let mut samples = SampleBuffer::<i16>::new(decoded.frames() as u64, spec);
            samples.copy_interleaved_ref(decoded);

            self.pending.clear();
            self.pending.reserve(samples.samples().len() * 2);
            for sample in samples.samples() {
                self.pending.extend_from_slice(&sample.to_le_bytes());
            }
            self.pos = 0;
        }
        Ok(())
    }
}

impl PcmStream for MpegPcmStream {
    fn format(&self) -> PcmFormat {
        self.pcm
    }

    fn read(&mut self, buf: &mut [u8]) -> PlayerResult<usize> {
        self.refill()?;
        if self.pos >= self.pending.len() {
            return Ok(0);
        }

        let n = std::cmp::min(buf.len(), self.pending.len() - self.pos);
        buf[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
