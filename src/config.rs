//! Process-start configuration.
use anyhow::{Context, Result};
use clap::{Args, Parser};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::{EngineConfig, DEFAULT_CHUNK_SIZE};
use crate::output::GainControl;
use crate::streams::{Quality, WEBCAM_URL};
use crate::webcam::WebcamConfig;

/// Player options shared by every front end.
#[derive(Debug, Clone, Args)]
pub struct EngineArgs {
    /// Stream quality to start with
    #[arg(short, long, value_enum, default_value_t = Quality::High)]
    pub quality: Quality,

    /// Play this URL instead of one of the URY streams
    #[arg(long)]
    pub url: Option<String>,

    /// Initial volume, 0.0 to 1.0
    #[arg(short, long, default_value_t = 1.0)]
    pub volume: f32,

    /// PCM bytes written per playback iteration
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// How long stopping waits for the stream before giving up on it
    #[arg(long, default_value_t = 5000)]
    pub join_timeout_ms: u64,

    #[arg(long, default_value_t = 10)]
    pub connect_timeout_secs: u64,

    /// Which gain control the output line exposes
    #[arg(long, value_enum, default_value_t = GainControl::Volume)]
    pub gain_control: GainControl,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl EngineArgs {
    pub fn endpoint(&self) -> String {
        self.url.clone().unwrap_or_else(|| self.quality.url().to_string())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            chunk_size: self.chunk_size.max(1),
            join_timeout: Duration::from_millis(self.join_timeout_ms),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            gain_control: self.gain_control,
        }
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "ury-player", version, about = "Listen to University Radio York")]
pub struct Cli {
    #[command(flatten)]
    pub engine: EngineArgs,

    #[arg(long, default_value = WEBCAM_URL)]
    pub webcam_url: String,

    #[arg(long, default_value_t = 2000)]
    pub webcam_interval_ms: u64,

    /// Start the webcam as soon as the player opens
    #[arg(long)]
    pub webcam: bool,
}

impl Cli {
    pub fn webcam_config(&self) -> WebcamConfig {
        WebcamConfig {
            url: self.webcam_url.clone(),
            interval: Duration::from_millis(self.webcam_interval_ms),
            ..WebcamConfig::default()
        }
    }
}

/// `RUST_LOG` picks the filter (default `warn`); records go to `log_file`
/// when one is given so they do not scribble over the terminal UI.
pub fn init_logging(log_file: Option<&PathBuf>) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("cannot open log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streams::MOBILE_STREAM;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["ury-player"]);
        assert_eq!(cli.engine.quality, Quality::High);
        assert_eq!(cli.engine.endpoint(), Quality::High.url());
        assert_eq!(cli.engine.volume, 1.0);

        let engine = cli.engine.engine_config();
        assert_eq!(engine.chunk_size, 4096);
        assert_eq!(engine.join_timeout, Duration::from_secs(5));
        assert_eq!(cli.webcam_config().interval, Duration::from_millis(2000));
    }

    #[test]
    fn test_quality_and_url_override() {
        let cli = Cli::parse_from(["ury-player", "--quality", "mobile"]);
        assert_eq!(cli.engine.endpoint(), MOBILE_STREAM);

        let cli = Cli::parse_from(["ury-player", "-q", "low", "--url", "http://example.com/a.pls"]);
        assert_eq!(cli.engine.endpoint(), "http://example.com/a.pls");
    }

    #[test]
    fn test_gain_control_flag() {
        let cli = Cli::parse_from(["ury-player", "--gain-control", "master-gain"]);
        assert_eq!(cli.engine.engine_config().gain_control, GainControl::MasterGain);
    }

    #[derive(Debug, Parser)]
    #[command(name = "ury-script")]
    struct ScriptOnly {
        #[command(flatten)]
        engine: EngineArgs,
    }

    #[test]
    fn test_engine_args_stand_alone() {
        let args = ScriptOnly::parse_from(["ury-script", "-q", "low", "--chunk-size", "1024"]);
        assert_eq!(args.engine.endpoint(), Quality::Low.url());
        assert_eq!(args.engine.engine_config().chunk_size, 1024);
        assert!(ScriptOnly::try_parse_from(["ury-script", "--webcam"]).is_err());
    }

    #[test]
    fn test_bad_quality_rejected() {
        assert!(Cli::try_parse_from(["ury-player", "--quality", "ultra"]).is_err());
    }
}
