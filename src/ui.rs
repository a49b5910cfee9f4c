use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};
use ury_player::webcam::{WebcamFrame, WebcamImage};
use ury_player::{Quality, RunState};

// Layout constants for better maintainability
const HEADER_HEIGHT: u16 = 3;
const FOOTER_HEIGHT: u16 = 3;
const STATUS_HEIGHT: u16 = 4;
const VOLUME_HEIGHT: u16 = 3;
const MARGIN: u16 = 1;

const ABOUT_MESSAGE: &str = "URY Player\n\n\
    Streams University Radio York in high, low or mobile quality.\n\
    The webcam shows the studio, refreshed every couple of seconds.\n\n\
    Press any key to close.";

pub struct UIState {
    /// `None` when playing a custom URL.
    pub quality: Option<Quality>,
    pub stream_url: String,
    pub run_state: RunState,
    pub volume_percent: u16,
    pub list_state: ListState,
    pub should_quit: bool,
    // Controls are disabled while a request is in flight
    pub player_busy: bool,
    pub webcam_busy: bool,
    pub webcam_running: bool,
    pub webcam_image: WebcamImage,
    pub status_message: String,
    pub show_about: bool,
}

impl UIState {
    pub fn new(quality: Option<Quality>, volume_percent: u16) -> Self {
        let mut list_state = ListState::default();
        list_state.select(quality.and_then(|q| Quality::ALL.iter().position(|&item| item == q)));

        Self {
            quality,
            stream_url: String::new(),
            run_state: RunState::Stopped,
            volume_percent: volume_percent.min(100),
            list_state,
            should_quit: false,
            player_busy: false,
            webcam_busy: false,
            webcam_running: false,
            webcam_image: WebcamImage::Placeholder,
            status_message: String::new(),
            show_about: false,
        }
    }

    pub fn select_quality(&mut self, quality: Quality) {
        self.quality = Some(quality);
        self.list_state
            .select(Quality::ALL.iter().position(|&item| item == quality));
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }
}

pub fn render_ui(f: &mut Frame, app: &mut UIState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(MARGIN)
        .constraints([
            Constraint::Length(HEADER_HEIGHT),
            Constraint::Min(10),
            Constraint::Length(FOOTER_HEIGHT),
        ])
        .split(f.area());

    render_header(f, chunks[0], app);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(chunks[1]);

    render_webcam(f, body[0], app);

    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(5),
            Constraint::Length(VOLUME_HEIGHT),
            Constraint::Length(STATUS_HEIGHT),
        ])
        .split(body[1]);

    render_quality_list(f, side[0], app);
    render_volume(f, side[1], app);
    render_status(f, side[2], app);

    render_footer(f, chunks[2]);

    if app.show_about {
        render_about(f);
    }
}

fn state_label(app: &UIState) -> (&'static str, Color) {
    match app.run_state {
        RunState::Stopped => ("STOPPED", Color::Red),
        RunState::Starting => ("CONNECTING", Color::Yellow),
        RunState::Running => ("ON AIR", Color::Green),
    }
}

fn render_header(f: &mut Frame, area: Rect, app: &UIState) {
    let (status, colour) = state_label(app);
    let header = Paragraph::new(Line::from(vec![
        Span::styled("URY", Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD)),
        Span::styled(" - University Radio York ", Style::default().fg(Color::Cyan)),
        Span::styled(status, Style::default().fg(colour).add_modifier(Modifier::BOLD)),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta))
            .title("URY Player"),
    );

    f.render_widget(header, area);
}

fn render_webcam(f: &mut Frame, area: Rect, app: &UIState) {
    let title = if app.webcam_running { "Webcam" } else { "Webcam (off)" };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue))
        .title(title);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let widget = match &app.webcam_image {
        WebcamImage::Frame(frame) => Paragraph::new(half_block_lines(frame, inner.width, inner.height)),
        WebcamImage::Placeholder => {
            let mut lines = vec![Line::from(""); (inner.height / 2).saturating_sub(1) as usize];
            lines.push(Line::from(Span::styled(
                "U R Y",
                Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(Span::styled(
                "press W for the studio webcam",
                Style::default().fg(Color::Gray),
            )));
            Paragraph::new(Text::from(lines)).alignment(Alignment::Center)
        }
    };
    f.render_widget(widget, inner);
}

/// Renders the preview with one cell per two vertical pixels: the upper
/// half block takes the top pixel as foreground, the bottom as background.
fn half_block_lines(frame: &WebcamFrame, width: u16, height: u16) -> Vec<Line<'static>> {
    let preview = &frame.preview;
    let (pw, ph) = (preview.width(), preview.height());
    if pw == 0 || ph == 0 || width == 0 || height == 0 {
        return Vec::new();
    }

    // Keep the aspect ratio; a cell is roughly twice as tall as wide.
    let scale = f32::min(width as f32 / pw as f32, (height as f32 * 2.0) / ph as f32);
    let cols = ((pw as f32 * scale) as u32).max(1);
    let rows = ((ph as f32 * scale / 2.0) as u32).max(1);
    let pad = " ".repeat(((width as u32).saturating_sub(cols) / 2) as usize);

    let pixel = |x: u32, y: u32| {
        let p = preview.get_pixel((x * pw / cols).min(pw - 1), y.min(ph - 1));
        Color::Rgb(p[0], p[1], p[2])
    };

    (0..rows)
        .map(|row| {
            let top = row * 2 * ph / (rows * 2);
            let bottom = (row * 2 + 1) * ph / (rows * 2);
            let mut spans = vec![Span::raw(pad.clone())];
            spans.extend((0..cols).map(|col| {
                Span::styled("▀", Style::default().fg(pixel(col, top)).bg(pixel(col, bottom)))
            }));
            Line::from(spans)
        })
        .collect()
}

fn render_quality_list(f: &mut Frame, area: Rect, app: &mut UIState) {
    let locked = app.player_busy || app.run_state != RunState::Stopped;
    let items: Vec<ListItem> = Quality::ALL
        .iter()
        .enumerate()
        .map(|(i, quality)| {
            let item = ListItem::new(format!("{} {}", i + 1, quality.label()));
            if locked {
                item.style(Style::default().fg(Color::DarkGray))
            } else {
                item
            }
        })
        .collect();

    let title = match app.quality {
        Some(_) => "Stream Quality".to_string(),
        None => "Stream Quality (custom URL)".to_string(),
    };

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow))
                .title(title),
        )
        .highlight_style(
            Style::default()
                .fg(Color::Black)
                .bg(if locked { Color::DarkGray } else { Color::Yellow })
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol(" > ");

    f.render_stateful_widget(list, area, &mut app.list_state);
}

fn render_volume(f: &mut Frame, area: Rect, app: &UIState) {
    let gauge = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Green))
                .title("Volume"),
        )
        .gauge_style(Style::default().fg(Color::Green).bg(Color::Black))
        .percent(app.volume_percent.min(100))
        .label(format!("{}%", app.volume_percent));

    f.render_widget(gauge, area);
}

fn render_status(f: &mut Frame, area: Rect, app: &UIState) {
    let (state, colour) = state_label(app);
    let mut lines = vec![Line::from(vec![
        Span::styled(state, Style::default().fg(colour).add_modifier(Modifier::BOLD)),
        Span::styled(format!(" {}", app.stream_url), Style::default().fg(Color::Gray)),
    ])];
    if !app.status_message.is_empty() {
        lines.push(Line::from(Span::styled(
            app.status_message.clone(),
            Style::default().fg(Color::White),
        )));
    }

    let status = Paragraph::new(Text::from(lines))
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Blue))
                .title("Status"),
        );

    f.render_widget(status, area);
}

fn render_footer(f: &mut Frame, area: Rect) {
    let controls_text = vec![Line::from(vec![
        Span::styled("SPACE ", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
        Span::styled("Start/Stop • ", Style::default().fg(Color::White)),
        Span::styled("←/→ 1-3 ", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
        Span::styled("Quality • ", Style::default().fg(Color::White)),
        Span::styled("↑/↓ ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::styled("Volume • ", Style::default().fg(Color::White)),
        Span::styled("W ", Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD)),
        Span::styled("Webcam • ", Style::default().fg(Color::White)),
        Span::styled("A ", Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD)),
        Span::styled("About • ", Style::default().fg(Color::White)),
        Span::styled("Q ", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
        Span::styled("Quit", Style::default().fg(Color::White)),
    ])];

    let controls = Paragraph::new(Text::from(controls_text))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Gray))
                .title("Controls"),
        );

    f.render_widget(controls, area);
}

fn render_about(f: &mut Frame) {
    let area = centered_rect(60, 40, f.area());
    let about = Paragraph::new(ABOUT_MESSAGE)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Magenta))
                .title("About"),
        );

    f.render_widget(Clear, area);
    f.render_widget(about, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::time::Instant;

    #[test]
    fn test_new_selects_quality_row() {
        let ui = UIState::new(Some(Quality::Low), 80);
        assert_eq!(ui.list_state.selected(), Some(1));

        let custom = UIState::new(None, 150);
        assert_eq!(custom.list_state.selected(), None);
        assert_eq!(custom.volume_percent, 100);
    }

    #[test]
    fn test_half_block_preview_fits_area() {
        let frame = WebcamFrame {
            width: 320,
            height: 240,
            preview: RgbImage::from_pixel(32, 24, Rgb([10, 20, 30])),
            fetched_at: Instant::now(),
        };
        let lines = half_block_lines(&frame, 40, 10);
        assert!(!lines.is_empty());
        assert!(lines.len() <= 10);
        for line in &lines {
            assert!(line.width() <= 40);
        }
    }
}
