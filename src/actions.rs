//! Messages between the terminal UI and its background worker
use ury_player::webcam::WebcamImage;
use ury_player::StopOutcome;

// Requests from UI/controller to the worker
#[derive(Debug, Clone)]
pub enum Request {
    StartPlayer,
    StopPlayer,
    StartWebcam,
    StopWebcam,
    Shutdown,
}

// Responses from worker back to UI/controller
#[derive(Debug)]
pub enum Response {
    PlayerStarted(bool),
    PlayerStopped(StopOutcome),
    WebcamToggled { running: bool },
    Webcam(WebcamImage),
}
