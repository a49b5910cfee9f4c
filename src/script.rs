//! Line-oriented scripting surface over the facade.
//!
//! Mirrors what the applet exposed to page scripts: every command maps to
//! one facade call and replies with a boolean, a value, or a JSON status.

use anyhow::{anyhow, bail, Result};

use crate::facade::{StreamPlayer, StreamPlayerFacade};
use crate::streams::Quality;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Stop,
    Running,
    GetVolume,
    SetVolume(f32),
    GetStream,
    SetStream(String),
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  start | stop | running
  volume [0.0-1.0]
  stream [high|low|mobile|<url>]
  status | help | quit";

impl Command {
    pub fn parse(line: &str) -> Result<Command> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            bail!("empty command");
        };
        let arg = words.next();
        if words.next().is_some() {
            bail!("too many arguments to '{}'", verb);
        }

        let command = match (verb.to_ascii_lowercase().as_str(), arg) {
            ("start", None) => Command::Start,
            ("stop", None) => Command::Stop,
            ("running", None) => Command::Running,
            ("volume", None) => Command::GetVolume,
            ("volume", Some(v)) => Command::SetVolume(
                v.parse()
                    .map_err(|_| anyhow!("volume must be a number, got '{}'", v))?,
            ),
            ("stream", None) => Command::GetStream,
            ("stream", Some(s)) => Command::SetStream(
                Quality::from_name(s).map_or_else(|| s.to_string(), |q| q.url().to_string()),
            ),
            ("status", None) => Command::Status,
            ("help", None) => Command::Help,
            ("quit" | "exit", None) => Command::Quit,
            (other, _) => bail!("unknown command '{}'", other),
        };
        Ok(command)
    }
}

/// Runs one command and renders the reply line.
pub fn execute(facade: &StreamPlayerFacade, command: &Command) -> Result<String> {
    let reply = match command {
        Command::Start => facade.start_player().to_string(),
        Command::Stop => facade.stop_player().to_string(),
        Command::Running => facade.is_running().to_string(),
        Command::GetVolume => facade.volume().to_string(),
        Command::SetVolume(v) => facade.set_volume(*v).to_string(),
        Command::GetStream => facade.stream().unwrap_or_else(|| "null".to_string()),
        Command::SetStream(url) => facade.set_stream(url).to_string(),
        Command::Status => serde_json::to_string(&facade.status())?,
        Command::Help => HELP.to_string(),
        Command::Quit => String::new(),
    };
    Ok(reply)
}
