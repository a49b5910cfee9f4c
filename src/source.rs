//! Byte sources for the playback thread.
use log::{debug, warn};
use std::io::{self, Read};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{PlayerError, PlayerResult};
use crate::utils::parsing::ParsingUtils;

/// Compressed bytes handed from an [`AudioSource`] to a decoder.
pub type ByteStream = Box<dyn Read + Send + Sync>;

/// Opens a stream endpoint and yields its bytes.
pub trait AudioSource: Send + Sync {
    fn open(&self, url: &str, cancel: &CancellationToken) -> PlayerResult<ByteStream>;
}

const FETCH_CHUNK_SIZE: usize = 8 * 1024;
const CHANNEL_DEPTH: usize = 64; // ~512KB of compressed audio in flight

/// HTTP(S) source. Playlists are resolved before the stream is opened.
#[derive(Debug, Clone)]
pub struct HttpSource {
    connect_timeout: Duration,
    poll_interval: Duration,
}

impl Default for HttpSource {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl HttpSource {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            ..Self::default()
        }
    }

    fn client(&self, url: &str) -> PlayerResult<reqwest::blocking::Client> {
        // Live streams never finish, so only the connect phase is bounded.
        reqwest::blocking::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(None::<Duration>)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PlayerError::connection(url, e))
    }
}

impl AudioSource for HttpSource {
    fn open(&self, url: &str, cancel: &CancellationToken) -> PlayerResult<ByteStream> {
        let client = self.client(url)?;
        let stream_url = ParsingUtils::resolve_stream_url(&client, url)?;

        debug!("Connecting to stream {}", stream_url);
        let response = client
            .get(&stream_url)
            .send()
            .map_err(|e| PlayerError::connection(&stream_url, e))?;
        if !response.status().is_success() {
            return Err(PlayerError::connection(&stream_url, format!("HTTP {}", response.status())));
        }

        let (tx, rx) = mpsc::sync_channel(CHANNEL_DEPTH);
        let fetch_cancel = cancel.clone();
        thread::Builder::new()
            .name("stream-fetch".to_string())
            .spawn(move || pump_network(response, tx, fetch_cancel))?;

        Ok(Box::new(StreamingSource::new(rx, cancel.clone(), self.poll_interval)))
    }
}

/// Copies the response body into the channel until EOF, error, or the
/// reading side goes away.
fn pump_network(mut body: impl Read, tx: SyncSender<io::Result<Vec<u8>>>, cancel: CancellationToken) {
    let mut total_bytes = 0usize;
    let mut buf = vec![0u8; FETCH_CHUNK_SIZE];

    while !cancel.is_cancelled() {
        match body.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                total_bytes += n;
                if tx.send(Ok(buf[..n].to_vec())).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("Network read failed after {}KB: {}", total_bytes / 1024, e);
                let _ = tx.send(Err(e));
                break;
            }
        }
    }
    debug!("Network stream ended, total bytes: {}KB", total_bytes / 1024);
}

/// A reader fed by the network thread. Blocking reads wake up every
/// `poll_interval` to check for cancellation, so a stuck socket never
/// holds the playback thread hostage.
pub struct StreamingSource {
    rx: Mutex<Receiver<io::Result<Vec<u8>>>>,
    pending: Vec<u8>,
    pos: usize,
    finished: bool,
    cancel: CancellationToken,
    poll_interval: Duration,
}

impl StreamingSource {
    pub fn new(rx: Receiver<io::Result<Vec<u8>>>, cancel: CancellationToken, poll_interval: Duration) -> Self {
        Self {
            rx: Mutex::new(rx),
            pending: Vec::new(),
            pos: 0,
            finished: false,
            cancel,
            poll_interval,
        }
    }
}

impl Read for StreamingSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        while self.pos >= self.pending.len() {
            if self.finished {
                return Ok(0);
            }
            if self.cancel.is_cancelled() {
                return Err(io::Error::new(io::ErrorKind::ConnectionAborted, "stream cancelled"));
            }

            let rx = self
                .rx
                .get_mut()
                .map_err(|_| io::Error::new(io::ErrorKind::Other, "stream receiver poisoned"))?;
            match rx.recv_timeout(self.poll_interval) {
                Ok(Ok(chunk)) => {
                    self.pending = chunk;
                    self.pos = 0;
                }
                Ok(Err(e)) => return Err(e),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => self.finished = true,
            }
        }

        let n = std::cmp::min(buf.len(), self.pending.len() - self.pos);
        buf[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Instant;

    #[test]
    fn test_streaming_source_reads_chunks_then_eof() {
        let (tx, rx) = mpsc::sync_channel(4);
        tx.send(Ok(b"hello ".to_vec())).unwrap();
        tx.send(Ok(b"world".to_vec())).unwrap();
        drop(tx);

        let mut source = StreamingSource::new(rx, CancellationToken::new(), Duration::from_millis(10));
        let mut out = String::new();
        source.read_to_string(&mut out).unwrap();
        assert_eq!(out, "hello world");
    }

    #[test]
    fn test_streaming_source_small_buffer_reads() {
        let (tx, rx) = mpsc::sync_channel(1);
        tx.send(Ok(vec![1, 2, 3, 4, 5])).unwrap();
        drop(tx);

        let mut source = StreamingSource::new(rx, CancellationToken::new(), Duration::from_millis(10));
        let mut buf = [0u8; 2];
        assert_eq!(source.read(&mut buf).unwrap(), 2);
        assert_eq!(buf, [1, 2]);
        assert_eq!(source.read(&mut buf).unwrap(), 2);
        assert_eq!(source.read(&mut buf).unwrap(), 1);
        assert_eq!(source.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_streaming_source_cancel_unblocks_read() {
        let (_tx, rx) = mpsc::sync_channel::<io::Result<Vec<u8>>>(1);
        let cancel = CancellationToken::new();
        let mut source = StreamingSource::new(rx, cancel.clone(), Duration::from_millis(10));

        let started = Instant::now();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            cancel.cancel();
        });

        let mut buf = [0u8; 16];
        let err = source.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionAborted);
        assert!(started.elapsed() < Duration::from_secs(2));
        canceller.join().unwrap();
    }

    #[test]
    fn test_streaming_source_surfaces_network_error() {
        let (tx, rx) = mpsc::sync_channel(1);
        tx.send(Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))).unwrap();

        let mut source = StreamingSource::new(rx, CancellationToken::new(), Duration::from_millis(10));
        let mut buf = [0u8; 4];
        assert_eq!(source.read(&mut buf).unwrap_err().kind(), io::ErrorKind::ConnectionReset);
    }

    #[test]
    fn test_pump_network_forwards_body() {
        let (tx, rx) = mpsc::sync_channel(CHANNEL_DEPTH);
        let body = Cursor::new(vec![7u8; FETCH_CHUNK_SIZE + 10]);
        pump_network(body, tx, CancellationToken::new());

        let received: usize = rx.iter().map(|chunk| chunk.unwrap().len()).sum();
        assert_eq!(received, FETCH_CHUNK_SIZE + 10);
    }
}
