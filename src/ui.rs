use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Widget, Wrap},
};

use crate::connlog::RollingLog;
use crate::session::{ConnectionMethod, Outcome, Phase, SESSION_SECS};
use crate::speed;
use crate::App;

const HORIZONTAL_MARGIN: u16 = 2;

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.session.phase {
            Phase::Idle => render_start(self, area, buf),
            Phase::ModeSelect => render_mode_select(self, area, buf),
            Phase::Running => render_running(self, area, buf),
            Phase::Ended => render_results(self, area, buf),
        }
    }
}

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn dim() -> Style {
    Style::default().add_modifier(Modifier::DIM)
}

fn render_start(app: &App, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(1),
            Constraint::Length(2),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(area);

    Paragraph::new(Span::styled("PEDAL RACE", bold().fg(Color::Cyan)))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    let status = if app.detecting {
        Span::styled("Detecting sensor board...", Style::default().fg(Color::Yellow))
    } else {
        Span::raw(app.status.as_str())
    };
    Paragraph::new(status)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(chunks[1], buf);

    if app.session.state.total_pulse_count > 0 {
        Paragraph::new(Span::styled(
            format!("{} pulses seen so far", app.session.state.total_pulse_count),
            dim(),
        ))
        .alignment(Alignment::Center)
        .render(chunks[2], buf);
    }

    render_log(&app.conn_log, "connection log", chunks[3], buf);

    Paragraph::new(Span::styled(
        "(u)sb / (s)imulated / (m)anual / (q)uit",
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .render(chunks[4], buf);
}

fn render_mode_select(app: &App, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(2),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(area);

    Paragraph::new(connection_line(app))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    Paragraph::new(Span::raw(app.status.as_str()))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(chunks[1], buf);

    Paragraph::new(Span::styled("Pick your ride", bold()))
        .alignment(Alignment::Center)
        .render(chunks[2], buf);

    render_panels(app, chunks[3], buf);

    Paragraph::new(Span::styled(
        "(1) solo ride / (2) race the rival / (t)est sensor / (i)nfo / (esc) disconnect",
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .render(chunks[4], buf);
}

fn render_running(app: &App, area: Rect, buf: &mut Buffer) {
    let state = &app.session.state;
    let rival_lines = if state.is_multiplayer { 2 } else { 0 };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(2),
            Constraint::Length(2),
            Constraint::Length(rival_lines),
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(area);

    Paragraph::new(connection_line(app))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    Paragraph::new(Span::styled(
        format!("{}s left", app.session.seconds_remaining),
        bold().fg(Color::Yellow),
    ))
    .alignment(Alignment::Center)
    .render(chunks[1], buf);

    let rider = if app.is_pedaling() { "d(O_O)b" } else { " (o_o) " };
    Paragraph::new(Line::from(vec![
        Span::styled(rider, bold()),
        Span::raw("  "),
        Span::styled(
            format!("{:.1} km/h", state.speed),
            bold().fg(Color::Green),
        ),
        Span::raw("   "),
        Span::raw(format!("{:.0} m", state.distance)),
    ]))
    .alignment(Alignment::Center)
    .render(chunks[2], buf);

    let ratio = (state.speed / speed::MAX_SPEED_KMH).clamp(0.0, 1.0);
    Gauge::default()
        .block(Block::default().title("speed"))
        .gauge_style(Style::default().fg(Color::Green))
        .label(format!("{:.0} / {:.0} km/h", state.speed, speed::MAX_SPEED_KMH))
        .ratio(ratio)
        .render(chunks[3], buf);

    if state.is_multiplayer {
        Paragraph::new(Line::from(vec![
            Span::styled("rival ", Style::default().fg(Color::Red)),
            Span::raw(format!(
                "{:.1} km/h   {:.0} m",
                state.rival_speed, state.rival_distance
            )),
            Span::raw("   "),
            Span::styled(lead_text(state.distance, state.rival_distance), dim()),
        ]))
        .alignment(Alignment::Center)
        .render(chunks[4], buf);
    }

    let pulses = match &app.last_pulse_at {
        Some(at) => format!("{} pulses, last at {at}", state.pulse_count),
        None => format!("{} pulses", state.pulse_count),
    };
    Paragraph::new(Span::styled(pulses, dim()))
        .alignment(Alignment::Center)
        .render(chunks[5], buf);

    render_panels(app, chunks[6], buf);

    let legend = if state.connection_method == ConnectionMethod::Manual {
        "(space) pedal / (esc) give up"
    } else {
        "(t)est sensor / (i)nfo / (esc) give up"
    };
    Paragraph::new(Span::styled(
        legend,
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .render(chunks[7], buf);
}

fn render_results(app: &App, area: Rect, buf: &mut Buffer) {
    let state = &app.session.state;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area);

    Paragraph::new(Span::styled("TIME!", bold().fg(Color::Cyan)))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    Paragraph::new(Span::styled(
        format!(
            "{:.0} m in {SESSION_SECS}s   avg {:.0} km/h   {} pulses",
            state.final_distance, state.average_speed, state.pulse_count
        ),
        bold(),
    ))
    .alignment(Alignment::Center)
    .render(chunks[1], buf);

    if state.is_multiplayer {
        Paragraph::new(Span::styled(
            format!("rival rode {:.0} m", state.rival_distance),
            dim(),
        ))
        .alignment(Alignment::Center)
        .render(chunks[2], buf);
    }

    if let Some(outcome) = app.session.outcome() {
        let (text, style) = match outcome {
            Outcome::Win => ("YOU WIN!", bold().fg(Color::Green)),
            Outcome::Tie => ("PHOTO FINISH: IT'S A TIE", bold().fg(Color::Yellow)),
            Outcome::Loss => ("the rival takes it", bold().fg(Color::Red)),
        };
        Paragraph::new(Span::styled(text, style))
            .alignment(Alignment::Center)
            .render(chunks[3], buf);
    }

    Paragraph::new(Span::styled(
        "(r)ide again / (q)uit",
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .render(chunks[5], buf);
}

/// One-line connection summary: method, LED, sensor status.
fn connection_line(app: &App) -> Line<'_> {
    let method = app.session.state.connection_method;
    let led = if app.led {
        Span::styled("●", Style::default().fg(Color::Green))
    } else {
        Span::styled("○", dim())
    };
    Line::from(vec![
        Span::styled(format!("[{method}] "), bold()),
        led,
        Span::raw(" "),
        Span::raw(app.sensor_status.as_str()),
    ])
}

fn lead_text(player: f64, rival: f64) -> String {
    let diff = player - rival;
    if diff.abs() < 1.0 {
        "neck and neck".to_string()
    } else if diff > 0.0 {
        format!("you lead by {diff:.0} m")
    } else {
        format!("rival leads by {:.0} m", -diff)
    }
}

/// Side-by-side connection log and raw serial window.
fn render_panels(app: &App, area: Rect, buf: &mut Buffer) {
    if app.raw_window.is_empty() {
        render_log(&app.conn_log, "connection log", area, buf);
        return;
    }
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);
    render_log(&app.conn_log, "connection log", halves[0], buf);
    render_log(&app.raw_window, "serial data", halves[1], buf);
}

fn render_log(log: &RollingLog, title: &str, area: Rect, buf: &mut Buffer) {
    let lines: Vec<Line> = log.iter().map(Line::from).collect();
    Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title))
        .style(dim())
        .render(area, buf);
}
