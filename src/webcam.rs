//! Periodic webcam stills.
//!
//! Same shape as the playback engine: at most one background task, started
//! and stopped from the control side, cancelled cooperatively. Each round
//! fetches one JPEG, decodes it, and hands it to the display callback.

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::imageops::FilterType;
use image::{ImageFormat, RgbImage};
use log::{debug, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::streams::{WEBCAM_INTERVAL, WEBCAM_URL};

/// Largest preview kept for display, in pixels.
pub const PREVIEW_WIDTH: u32 = 96;
pub const PREVIEW_HEIGHT: u32 = 72;

#[derive(Debug, Clone)]
pub struct WebcamConfig {
    pub url: String,
    pub interval: Duration,
    pub stop_timeout: Duration,
}

impl Default for WebcamConfig {
    fn default() -> Self {
        Self {
            url: WEBCAM_URL.to_string(),
            interval: WEBCAM_INTERVAL,
            stop_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebcamFrame {
    pub width: u32,
    pub height: u32,
    pub preview: RgbImage,
    pub fetched_at: Instant,
}

impl WebcamFrame {
    pub fn from_jpeg(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)
            .context("webcam image is not a valid JPEG")?;
        let preview = image
            .resize(PREVIEW_WIDTH, PREVIEW_HEIGHT, FilterType::Triangle)
            .to_rgb8();
        Ok(Self {
            width: image.width(),
            height: image.height(),
            preview,
            fetched_at: Instant::now(),
        })
    }
}

#[derive(Debug, Clone)]
pub enum WebcamImage {
    /// Shown while the webcam is off or unreachable.
    Placeholder,
    Frame(WebcamFrame),
}

pub type DisplayCallback = Arc<dyn Fn(WebcamImage) + Send + Sync>;

/// Fetches the raw bytes of one webcam still.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

pub struct HttpFrameSource {
    client: reqwest::Client,
}

impl HttpFrameSource {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FrameSource for HttpFrameSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

struct ActiveFetch {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct WebcamFetcher {
    config: WebcamConfig,
    source: Arc<dyn FrameSource>,
    display: DisplayCallback,
    active: Option<ActiveFetch>,
}

impl WebcamFetcher {
    pub fn new(config: WebcamConfig, source: Arc<dyn FrameSource>, display: DisplayCallback) -> Self {
        Self {
            config,
            source,
            display,
            active: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Spawns the fetch loop on the current tokio runtime.
    pub fn start(&mut self) -> bool {
        if self.active.is_some() {
            return false;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(fetch_loop(
            self.config.clone(),
            Arc::clone(&self.source),
            Arc::clone(&self.display),
            cancel.clone(),
        ));
        self.active = Some(ActiveFetch { cancel, handle });
        debug!("Webcam fetcher started for {}", self.config.url);
        true
    }

    /// Stops the loop and puts the placeholder back.
    pub async fn stop(&mut self) -> bool {
        let stopped = match self.active.take() {
            Some(active) => {
                active.cancel.cancel();
                let mut handle = active.handle;
                if tokio::time::timeout(self.config.stop_timeout, &mut handle).await.is_err() {
                    warn!("Webcam fetcher did not stop in time; aborting it");
                    handle.abort();
                }
                true
            }
            None => false,
        };
        (self.display)(WebcamImage::Placeholder);
        stopped
    }
}

async fn fetch_loop(
    config: WebcamConfig,
    source: Arc<dyn FrameSource>,
    display: DisplayCallback,
    cancel: CancellationToken,
) {
    loop {
        let fetched = tokio::select! {
            _ = cancel.cancelled() => break,
            result = source.fetch(&config.url) => result,
        };

        match fetched.and_then(|bytes| WebcamFrame::from_jpeg(&bytes)) {
            Ok(frame) => {
                debug!("Webcam frame {}x{}", frame.width, frame.height);
                display(WebcamImage::Frame(frame));
            }
            Err(e) => {
                debug!("Webcam fetch failed: {:#}", e);
                display(WebcamImage::Placeholder);
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {},
            _ = cancel.cancelled() => break,
        }
    }
    debug!("Webcam fetch loop ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 30, 30]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Jpeg).unwrap();
        out.into_inner()
    }

    struct FakeCamera {
        reply: Option<Vec<u8>>,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl FrameSource for FakeCamera {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.reply.clone().ok_or_else(|| anyhow::anyhow!("camera offline"))
        }
    }

    fn recorder() -> (DisplayCallback, Arc<Mutex<Vec<WebcamImage>>>) {
        let shown = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&shown);
        let callback: DisplayCallback = Arc::new(move |image| sink.lock().unwrap().push(image));
        (callback, shown)
    }

    fn fast_config() -> WebcamConfig {
        WebcamConfig {
            url: "http://example.com/cam.jpg".to_string(),
            interval: Duration::from_millis(10),
            stop_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_frame_from_jpeg_keeps_dimensions() {
        let frame = WebcamFrame::from_jpeg(&jpeg(320, 240)).unwrap();
        assert_eq!((frame.width, frame.height), (320, 240));
        assert!(frame.preview.width() <= PREVIEW_WIDTH);
        assert!(frame.preview.height() <= PREVIEW_HEIGHT);
    }

    #[test]
    fn test_frame_from_garbage_fails() {
        assert!(WebcamFrame::from_jpeg(b"not a jpeg").is_err());
    }

    #[tokio::test]
    async fn test_fetcher_displays_frames_then_placeholder() {
        let camera = Arc::new(FakeCamera {
            reply: Some(jpeg(64, 48)),
            fetches: AtomicUsize::new(0),
        });
        let (display, shown) = recorder();
        let mut fetcher = WebcamFetcher::new(fast_config(), camera.clone(), display);

        assert!(fetcher.start());
        assert!(!fetcher.start());
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(fetcher.stop().await);
        assert!(!fetcher.is_running());

        let shown = shown.lock().unwrap();
        assert!(camera.fetches.load(Ordering::SeqCst) >= 2);
        assert!(matches!(shown.first(), Some(WebcamImage::Frame(_))));
        assert!(matches!(shown.last(), Some(WebcamImage::Placeholder)));
    }

    #[tokio::test]
    async fn test_fetch_failure_shows_placeholder() {
        let camera = Arc::new(FakeCamera {
            reply: None,
            fetches: AtomicUsize::new(0),
        });
        let (display, shown) = recorder();
        let mut fetcher = WebcamFetcher::new(fast_config(), camera, display);

        assert!(fetcher.start());
        tokio::time::sleep(Duration::from_millis(30)).await;
        fetcher.stop().await;

        let shown = shown.lock().unwrap();
        assert!(!shown.is_empty());
        assert!(shown.iter().all(|image| matches!(image, WebcamImage::Placeholder)));
    }

    #[tokio::test]
    async fn test_stop_when_idle_still_shows_placeholder() {
        let camera = Arc::new(FakeCamera {
            reply: None,
            fetches: AtomicUsize::new(0),
        });
        let (display, shown) = recorder();
        let mut fetcher = WebcamFetcher::new(fast_config(), camera, display);

        assert!(!fetcher.stop().await);
        assert_eq!(shown.lock().unwrap().len(), 1);
    }
}
