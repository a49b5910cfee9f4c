mod actions;
mod app;
mod ui;

use anyhow::Result;
use app::AppController;
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::info;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use ury_player::config::{init_logging, Cli};
use ury_player::webcam::{HttpFrameSource, WebcamFetcher};
use ury_player::{PlaybackEngine, StreamPlayer, StreamPlayerFacade};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.engine.log_file.as_ref())?;

    // Set up panic handler to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic);
    }));

    // Initialize the player
    let engine = PlaybackEngine::new(cli.engine.endpoint(), cli.engine.engine_config());
    let facade = Arc::new(StreamPlayerFacade::new(engine));
    facade.set_volume(cli.engine.volume);
    info!("Player ready on {}", cli.engine.endpoint());

    // Background worker for blocking player calls and the webcam
    let (req_tx, req_rx) = mpsc::channel(16);
    let (resp_tx, mut resp_rx) = mpsc::channel(32);
    let webcam = WebcamFetcher::new(
        cli.webcam_config(),
        Arc::new(HttpFrameSource::new()?),
        app::webcam_display(resp_tx.clone()),
    );
    let worker = tokio::spawn(app::run_worker(Arc::clone(&facade), webcam, req_rx, resp_tx));

    let mut app_controller = AppController::new(Arc::clone(&facade), req_tx.clone());
    if cli.webcam {
        app_controller.handle_key_event(crossterm::event::KeyCode::Char('w'))?;
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the main loop
    let res = run_app(&mut terminal, &mut app_controller, &mut resp_rx).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    // Stop playback and the webcam before exiting. Nobody reads responses
    // any more, so close that side first.
    drop(resp_rx);
    let _ = req_tx.send(actions::Request::Shutdown).await;
    let _ = worker.await;

    res
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    app_controller: &mut AppController,
    resp_rx: &mut mpsc::Receiver<actions::Response>,
) -> Result<()> {
    loop {
        // Apply worker responses and engine state before drawing
        while let Ok(resp) = resp_rx.try_recv() {
            app_controller.process_response(resp);
        }
        app_controller.refresh();

        terminal.draw(|f| ui::render_ui(f, &mut app_controller.ui_app))?;

        // Handle input with shorter timeout for better responsiveness
        if event::poll(Duration::from_millis(50))? {
            match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    if app_controller.handle_key_event(key.code)? {
                        break; // Quit was requested
                    }
                }
                Ok(_) => {} // Resize and other events redraw on the next pass
                Err(_) => {} // Ignore read errors
            }
        }

        // Small delay to prevent high CPU usage but keep responsive
        sleep(Duration::from_millis(16)).await; // ~60 FPS

        if app_controller.should_quit() {
            break;
        }
    }

    Ok(())
}
