// Scripting surface: reads one command per line from stdin and prints one
// reply per line, the way the applet answered page scripts.
use anyhow::Result;
use clap::Parser;
use log::{debug, warn};
use std::io::{self, BufRead, Write};
use ury_player::config::{init_logging, EngineArgs};
use ury_player::script::{execute, Command};
use ury_player::{PlaybackEngine, StreamPlayer, StreamPlayerFacade};

#[derive(Debug, Parser)]
#[command(name = "ury-script", version, about = "Drive the URY player from stdin, one command per line")]
struct ScriptCli {
    #[command(flatten)]
    engine: EngineArgs,
}

fn main() -> Result<()> {
    let cli = ScriptCli::parse();
    init_logging(cli.engine.log_file.as_ref())?;

    let facade = StreamPlayerFacade::new(PlaybackEngine::new(cli.engine.endpoint(), cli.engine.engine_config()));
    facade.set_volume(cli.engine.volume);

    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        match Command::parse(&line) {
            Ok(Command::Quit) => break,
            Ok(command) => {
                debug!("script command: {:?}", command);
                writeln!(stdout, "{}", execute(&facade, &command)?)?;
            }
            Err(e) => {
                warn!("bad script command {:?}: {}", line, e);
                writeln!(stdout, "error: {}", e)?;
            }
        }
        stdout.flush()?;
    }

    facade.stop_player();
    Ok(())
}
