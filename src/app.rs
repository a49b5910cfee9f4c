use anyhow::Result;
use crossterm::event::KeyCode;
use log::{debug, warn};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::actions::{Request, Response};
use crate::ui::UIState;
use ury_player::webcam::{WebcamFetcher, WebcamImage};
use ury_player::{Quality, RunState, StopOutcome, StreamPlayer, StreamPlayerFacade};

/// Volume slider step, in percent.
const VOLUME_STEP: u16 = 5;

pub struct AppController {
    pub ui_app: UIState,
    facade: Arc<StreamPlayerFacade>,
    req_tx: mpsc::Sender<Request>,
}

impl AppController {
    pub fn new(facade: Arc<StreamPlayerFacade>, req_tx: mpsc::Sender<Request>) -> Self {
        let quality = facade
            .stream()
            .as_deref()
            .and_then(Quality::from_url);
        let volume_percent = (facade.volume().clamp(0.0, 1.0) * 100.0).round() as u16;
        let mut ui_app = UIState::new(quality, volume_percent);
        ui_app.stream_url = facade.stream().unwrap_or_default();
        Self { ui_app, facade, req_tx }
    }

    pub fn handle_key_event(&mut self, key_code: KeyCode) -> Result<bool> {
        if self.ui_app.show_about {
            // Any key closes the about box
            self.ui_app.show_about = false;
            return Ok(false);
        }

        match key_code {
            KeyCode::Char('q') | KeyCode::Esc | KeyCode::Char('Q') => {
                self.ui_app.quit();
                return Ok(true);
            }
            KeyCode::Enter | KeyCode::Char(' ') => self.toggle_player(),
            KeyCode::Left => self.select_quality(self.current_quality().previous()),
            KeyCode::Right => self.select_quality(self.current_quality().next()),
            KeyCode::Char(c @ '1'..='3') => {
                let index = c as usize - '1' as usize;
                self.select_quality(Quality::ALL[index]);
            }
            KeyCode::Up | KeyCode::Char('+') | KeyCode::Char('=') => {
                self.change_volume(VOLUME_STEP as i32);
            }
            KeyCode::Down | KeyCode::Char('-') => {
                self.change_volume(-(VOLUME_STEP as i32));
            }
            KeyCode::Char('w') | KeyCode::Char('W') => self.toggle_webcam(),
            KeyCode::Char('a') | KeyCode::Char('A') => self.ui_app.show_about = true,
            _ => {}
        }
        Ok(false)
    }

    fn current_quality(&self) -> Quality {
        self.ui_app.quality.unwrap_or_default()
    }

    fn toggle_player(&mut self) {
        if self.ui_app.player_busy {
            return;
        }
        let request = if self.facade.is_running() {
            self.ui_app.status_message = "Stopping…".to_string();
            Request::StopPlayer
        } else {
            self.ui_app.status_message = "Connecting…".to_string();
            Request::StartPlayer
        };
        self.send(request, |ui| ui.player_busy = true);
    }

    fn toggle_webcam(&mut self) {
        if self.ui_app.webcam_busy {
            return;
        }
        let request = if self.ui_app.webcam_running {
            Request::StopWebcam
        } else {
            Request::StartWebcam
        };
        self.send(request, |ui| ui.webcam_busy = true);
    }

    fn send(&mut self, request: Request, mark_busy: impl FnOnce(&mut UIState)) {
        match self.req_tx.try_send(request) {
            Ok(()) => mark_busy(&mut self.ui_app),
            Err(e) => {
                // sending failed; don't leave the UI in a busy state
                warn!("Worker request dropped: {}", e);
                self.ui_app.status_message = "Player is busy, try again".to_string();
            }
        }
    }

    /// Quality can only change while stopped, so nobody switches the URL
    /// under a live stream.
    fn select_quality(&mut self, quality: Quality) {
        if self.ui_app.player_busy || self.facade.is_running() {
            self.ui_app.status_message = "Stop the player to change quality".to_string();
            return;
        }
        if self.facade.set_stream(quality.url()) {
            self.ui_app.select_quality(quality);
            self.ui_app.stream_url = quality.url().to_string();
            self.ui_app.status_message = format!("{} selected", quality.label());
        }
    }

    fn change_volume(&mut self, delta: i32) {
        let percent = (self.ui_app.volume_percent as i32 + delta).clamp(0, 100) as u16;
        self.ui_app.volume_percent = percent;
        self.facade.set_volume(percent as f32 / 100.0);
    }

    /// Pulls engine state the UI cannot be told about, such as a stream
    /// that ended on its own.
    pub fn refresh(&mut self) {
        let state = self.facade.run_state();
        if state == RunState::Stopped && self.ui_app.run_state != RunState::Stopped && !self.ui_app.player_busy {
            debug!("Playback ended without a stop request");
            self.ui_app.status_message = "Stream ended or could not be reached".to_string();
        }
        self.ui_app.run_state = state;
    }

    pub fn should_quit(&self) -> bool {
        self.ui_app.should_quit
    }

    pub fn process_response(&mut self, resp: Response) {
        match resp {
            Response::PlayerStarted(started) => {
                self.ui_app.player_busy = false;
                if !started {
                    self.ui_app.status_message = "Player is already running".to_string();
                }
            }
            Response::PlayerStopped(outcome) => {
                self.ui_app.player_busy = false;
                self.ui_app.status_message = match outcome {
                    StopOutcome::Stopped => "Stopped".to_string(),
                    StopOutcome::TimedOut => "Stream did not respond; abandoned it".to_string(),
                    StopOutcome::AlreadyStopped => String::new(),
                };
            }
            Response::WebcamToggled { running } => {
                self.ui_app.webcam_busy = false;
                self.ui_app.webcam_running = running;
            }
            Response::Webcam(image) => {
                self.ui_app.webcam_image = image;
            }
        }
    }
}

/// Runs blocking player calls and the webcam on behalf of the UI thread.
pub async fn run_worker(
    facade: Arc<StreamPlayerFacade>,
    mut webcam: WebcamFetcher,
    mut req_rx: mpsc::Receiver<Request>,
    resp_tx: mpsc::Sender<Response>,
) {
    while let Some(request) = req_rx.recv().await {
        let response = match request {
            Request::StartPlayer => {
                let facade = Arc::clone(&facade);
                let started = tokio::task::spawn_blocking(move || facade.start_player())
                    .await
                    .unwrap_or(false);
                Response::PlayerStarted(started)
            }
            Request::StopPlayer => Response::PlayerStopped(stop_player(&facade).await),
            Request::StartWebcam => {
                webcam.start();
                Response::WebcamToggled { running: webcam.is_running() }
            }
            Request::StopWebcam => {
                webcam.stop().await;
                Response::WebcamToggled { running: false }
            }
            Request::Shutdown => {
                webcam.stop().await;
                stop_player(&facade).await;
                break;
            }
        };
        if resp_tx.send(response).await.is_err() {
            break;
        }
    }
    debug!("Worker finished");
}

async fn stop_player(facade: &Arc<StreamPlayerFacade>) -> StopOutcome {
    let facade = Arc::clone(facade);
    tokio::task::spawn_blocking(move || facade.stop_with_outcome())
        .await
        .unwrap_or(StopOutcome::TimedOut)
}

/// Display callback for the webcam: frames travel to the UI as responses.
pub fn webcam_display(resp_tx: mpsc::Sender<Response>) -> Arc<dyn Fn(WebcamImage) + Send + Sync> {
    Arc::new(move |image| {
        let _ = resp_tx.try_send(Response::Webcam(image));
    })
}
