//! Converter screen rendering
//!
//! Renders the conversion form, the latest result with where its rate came
//! from, the optional rate history panel and a footer with cache status.

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::app::{App, Field, StatusKind, HISTORY_DAYS};
use crate::ui::widgets::RateSparkline;
use fxconvert::data::{format_rate, Provenance};

mod colors {
    use ratatui::style::Color;

    pub const FOCUS: Color = Color::Yellow;
    pub const LIVE: Color = Color::Green;
    pub const FALLBACK: Color = Color::LightRed;
    pub const MUTED: Color = Color::DarkGray;
}

/// Renders the whole converter screen
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let history_height = if app.show_history { 5 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5),              // Form
            Constraint::Min(5),                 // Result
            Constraint::Length(history_height), // History
            Constraint::Length(1),              // Status line
            Constraint::Length(1),              // Key hints and cache info
        ])
        .split(area);

    render_form(frame, app, chunks[0]);
    render_result(frame, app, chunks[1]);
    if app.show_history {
        render_history(frame, app, chunks[2]);
    }
    render_status(frame, app, chunks[3]);
    render_footer(frame, app, chunks[4]);
}

/// Renders a centered loading message
pub fn render_loading(frame: &mut Frame) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(45),
            Constraint::Length(3),
            Constraint::Percentage(45),
        ])
        .split(frame.area());

    let loading_text = Paragraph::new("Fetching exchange rates...")
        .style(Style::default().fg(Color::Cyan))
        .alignment(Alignment::Center);

    frame.render_widget(loading_text, chunks[1]);
}

fn field_style(app: &App, field: Field) -> Style {
    if app.focus == field {
        Style::default()
            .fg(colors::FOCUS)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    }
}

fn render_form(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Currency Converter ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(30),
            Constraint::Percentage(30),
            Constraint::Percentage(40),
        ])
        .split(inner);

    let cursor = |field: Field| if app.focus == field { "▏" } else { "" };
    let selector = |field: Field, code: &str| format!("◂ {} ▸{}", code, cursor(field));

    let fields = [
        ("From", selector(Field::From, &app.from), Field::From),
        ("To", selector(Field::To, &app.to), Field::To),
        (
            "Amount",
            format!("{}{}", app.amount_input, cursor(Field::Amount)),
            Field::Amount,
        ),
    ];

    for ((label, value, field), column) in fields.into_iter().zip(columns.iter()) {
        let lines = vec![
            Line::from(Span::styled(label, Style::default().fg(colors::MUTED))),
            Line::from(Span::styled(value, field_style(app, field))),
        ];
        frame.render_widget(Paragraph::new(lines), *column);
    }
}

fn render_result(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default().title(" Result ").borders(Borders::ALL);

    let lines = match &app.result {
        Some(result) => {
            let source_color = match result.provenance {
                Provenance::Fallback { .. } => colors::FALLBACK,
                Provenance::Live => colors::LIVE,
                Provenance::Direct => Color::Cyan,
            };

            let mut source = vec![Span::styled(
                result.provenance.describe(),
                Style::default().fg(source_color),
            )];
            if let Some(date) = result.rates_date {
                source.push(Span::styled(
                    format!("  published {}", date),
                    Style::default().fg(colors::MUTED),
                ));
            }

            vec![
                Line::from(Span::styled(
                    result.summary(),
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(result.rate_line()),
                Line::from(source),
            ]
        }
        None if app.busy => vec![Line::from(Span::styled(
            "Converting...",
            Style::default().fg(Color::Cyan),
        ))],
        None => vec![Line::from(Span::styled(
            "Press Enter to convert",
            Style::default().fg(colors::MUTED),
        ))],
    };

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_history(frame: &mut Frame, app: &App, area: Rect) {
    let title = format!(" {} → {}, last {} days ", app.from, app.to, HISTORY_DAYS);
    let block = Block::default().title(title).borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let history = match &app.history {
        Some(history) if !history.is_empty() => history,
        Some(_) => {
            let text = Paragraph::new("No history available")
                .style(Style::default().fg(colors::MUTED));
            frame.render_widget(text, inner);
            return;
        }
        None => {
            let text = Paragraph::new("Loading history...").style(Style::default().fg(Color::Cyan));
            frame.render_widget(text, inner);
            return;
        }
    };

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1), Constraint::Min(0)])
        .split(inner);

    let rates: Vec<f64> = history.iter().map(|h| h.rate).collect();
    frame.render_widget(RateSparkline::new(&rates), rows[0]);

    let (Some(first), Some(last)) = (history.first(), history.last()) else {
        return;
    };
    let change = (last.rate - first.rate) / first.rate * 100.0;
    let change_color = if change >= 0.0 { colors::LIVE } else { colors::FALLBACK };
    let summary = Line::from(vec![
        Span::styled(
            format!("{} {}  ", first.date, format_rate(first.rate)),
            Style::default().fg(colors::MUTED),
        ),
        Span::raw(format!("{} {}  ", last.date, format_rate(last.rate))),
        Span::styled(format!("{:+.2}%", change), Style::default().fg(change_color)),
    ]);
    frame.render_widget(Paragraph::new(summary), rows[1]);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
    let Some(status) = &app.status else {
        return;
    };
    let color = match status.kind {
        StatusKind::Info => Color::Cyan,
        StatusKind::Warning => colors::FALLBACK,
        StatusKind::Error => Color::Red,
    };
    let paragraph = Paragraph::new(status.text.as_str()).style(Style::default().fg(color));
    frame.render_widget(paragraph, area);
}

/// Renders key hints with the cache summary
fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled("Tab", Style::default().fg(Color::Yellow)),
        Span::raw(" Field  "),
        Span::styled("Enter", Style::default().fg(Color::Yellow)),
        Span::raw(" Convert  "),
        Span::styled("s", Style::default().fg(Color::Yellow)),
        Span::raw(" Swap  "),
        Span::styled("h", Style::default().fg(Color::Yellow)),
        Span::raw(" History  "),
        Span::styled("?", Style::default().fg(Color::Yellow)),
        Span::raw(" Help  "),
        Span::styled("q", Style::default().fg(Color::Yellow)),
        Span::raw(" Quit"),
    ];

    if let Some(info) = &app.cache_info {
        spans.push(Span::styled(
            format!(" │ {}", info),
            Style::default().fg(colors::MUTED),
        ));
    }

    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().fg(colors::MUTED));
    frame.render_widget(paragraph, area);
}
