use chrono::Local;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Wrap},
    Frame,
};
use std::time::{Duration, Instant};
use unicode_width::UnicodeWidthStr;

use crate::admin::{AdminPanel, CallResult};
use crate::app::App;
use crate::config::KEY_HINTS;
use crate::connection::ConnectionStatus;
use crate::session::ChatSession;
use crate::ui_state::Focus;
use crate::view::{AssistantEntry, EntryKind, CONNECTION_ERROR_BANNER, PLACEHOLDER, SOURCES_TITLE, TRACE_TITLE};

// Copper Sapphire Morning color palette
const BG_DARK: Color = Color::Rgb(12, 12, 16);

// Sapphire blues
const SAPPHIRE: Color = Color::Rgb(101, 150, 243);       // #6596F3 - Primary accent
const CYAN_LIGHT: Color = Color::Rgb(178, 220, 226);     // #B2DCE2 - Light cyan

// Copper/warm tones
const COPPER: Color = Color::Rgb(138, 72, 38);           // #8A4826 - Copper
const WARM_BROWN: Color = Color::Rgb(164, 103, 38);      // #A46726 - Warm brown
const PALE_YELLOW: Color = Color::Rgb(234, 208, 148);    // #EAD094 - Pale yellow

// Accent colors
const BURGUNDY: Color = Color::Rgb(204, 92, 68);         // #CC5C44 - Warnings/errors
const OLIVE: Color = Color::Rgb(131, 179, 102);          // #83B366 - Success/green
const LAVENDER: Color = Color::Rgb(211, 164, 234);       // #D3A4EA - Purple accent

// Text colors
const TEXT_PRIMARY: Color = Color::Rgb(240, 240, 245);
const TEXT_SECONDARY: Color = Color::Rgb(180, 180, 190);
const TEXT_MUTED: Color = Color::Rgb(105, 116, 133);     // #697485 - Medium gray

// Border colors (subtle)
const BORDER_DIM: Color = Color::Rgb(45, 50, 60);
const BORDER_ACCENT: Color = Color::Rgb(70, 85, 110);

const CODE_BG: Color = Color::Rgb(40, 44, 52);
const CODE_FG: Color = Color::Rgb(171, 178, 191);

// Fixed-width label column for the transcript
const LABEL_WIDTH: usize = 12;

fn rgb(color: Color) -> (f64, f64, f64) {
    match color {
        Color::Rgb(r, g, b) => (r as f64, g as f64, b as f64),
        _ => (0.0, 0.0, 0.0),
    }
}

/// Linear blend between two palette colors, `t` in `0.0..=1.0`.
fn blend(from: Color, to: Color, t: f64) -> Color {
    let t = t.clamp(0.0, 1.0);
    let (r0, g0, b0) = rgb(from);
    let (r1, g1, b1) = rgb(to);
    Color::Rgb(
        (r0 + (r1 - r0) * t) as u8,
        (g0 + (g1 - g0) * t) as u8,
        (b0 + (b1 - b0) * t) as u8,
    )
}

/// Greedy word wrap by display width.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    if max_width == 0 {
        return vec![text.to_string()];
    }
    let mut result = Vec::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if current_line.is_empty() {
            current_line = word.to_string();
        } else if current_line.width() + 1 + word.width() <= max_width {
            current_line.push(' ');
            current_line.push_str(word);
        } else {
            result.push(std::mem::take(&mut current_line));
            current_line = word.to_string();
        }
    }
    if !current_line.is_empty() {
        result.push(current_line);
    }
    if result.is_empty() {
        result.push(String::new());
    }
    result
}

fn status_style(status: ConnectionStatus) -> Style {
    let color = match status {
        ConnectionStatus::Connecting => PALE_YELLOW,
        ConnectionStatus::Open => OLIVE,
        ConnectionStatus::ClosedClean => TEXT_MUTED,
        ConnectionStatus::ClosedError => BURGUNDY,
    };
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

/// Pushes lines of a transcript entry behind a label column.
struct EntryWriter<'a> {
    lines: &'a mut Vec<Line<'static>>,
    label: Option<(String, Style)>,
    time: Option<String>,
    indent: String,
}

impl<'a> EntryWriter<'a> {
    fn new(lines: &'a mut Vec<Line<'static>>, label: &str, label_style: Style, time: String) -> Self {
        let formatted = format!("{:>width$} │ ", label, width = LABEL_WIDTH - 3);
        Self {
            lines,
            label: Some((formatted, label_style)),
            time: Some(time),
            indent: " ".repeat(LABEL_WIDTH),
        }
    }

    fn push(&mut self, spans: Vec<Span<'static>>) {
        let mut line = match self.label.take() {
            Some((label, style)) => vec![Span::styled(label, style)],
            None => vec![Span::raw(self.indent.clone())],
        };
        line.extend(spans);
        if let Some(time) = self.time.take() {
            line.push(Span::styled(format!("  {}", time), Style::default().fg(BORDER_ACCENT)));
        }
        self.lines.push(Line::from(line));
    }

    fn push_wrapped(&mut self, text: &str, width: usize, prefix: &str, style: Style) {
        let continuation = " ".repeat(prefix.width());
        for (i, piece) in wrap_text(text, width.saturating_sub(prefix.width())).into_iter().enumerate() {
            let lead = if i == 0 { prefix.to_string() } else { continuation.clone() };
            self.push(vec![Span::styled(format!("{}{}", lead, piece), style)]);
        }
    }
}

fn assistant_lines(
    writer: &mut EntryWriter<'_>,
    entry: &AssistantEntry,
    show_thinking: bool,
    toggle_label: &str,
    width: usize,
    now: Instant,
    fade_in: Duration,
) {
    if entry.placeholder {
        writer.push(vec![Span::styled(
            PLACEHOLDER,
            Style::default().fg(COPPER).add_modifier(Modifier::ITALIC),
        )]);
    }

    // Trace and its toggle always sit above the answer.
    if let Some(trace) = &entry.trace {
        writer.push(vec![
            Span::styled("[", Style::default().fg(BORDER_ACCENT)),
            Span::styled(toggle_label.to_string(), Style::default().fg(CYAN_LIGHT)),
            Span::styled("]", Style::default().fg(BORDER_ACCENT)),
            Span::styled(" F3", Style::default().fg(TEXT_MUTED).add_modifier(Modifier::ITALIC)),
        ]);

        if show_thinking {
            writer.push(vec![Span::styled(
                TRACE_TITLE,
                Style::default().fg(LAVENDER).add_modifier(Modifier::BOLD),
            )]);
            for line in trace {
                let opacity = line.opacity(now, fade_in);
                if line.is_status {
                    let style = Style::default()
                        .fg(blend(BG_DARK, TEXT_MUTED, opacity))
                        .add_modifier(Modifier::ITALIC);
                    writer.push_wrapped(&line.text, width, "  ", style);
                } else {
                    let style = Style::default().fg(blend(BG_DARK, TEXT_SECONDARY, opacity));
                    writer.push_wrapped(&line.text, width, "• ", style);
                }
            }
        }
    }

    if let Some(answer) = &entry.answer {
        for (i, paragraph) in answer.paragraphs.iter().enumerate() {
            if i > 0 {
                writer.push(vec![]);
            }
            writer.push_wrapped(paragraph, width, "", Style::default().fg(TEXT_PRIMARY));
        }

        if !answer.sources.is_empty() {
            writer.push(vec![]);
            writer.push(vec![Span::styled(
                SOURCES_TITLE,
                Style::default().fg(WARM_BROWN).add_modifier(Modifier::BOLD),
            )]);
            for (n, source) in answer.sources.iter().enumerate() {
                writer.push(vec![
                    Span::styled(format!("{}. ", n + 1), Style::default().fg(TEXT_MUTED)),
                    Span::styled(
                        source.title.clone(),
                        Style::default().fg(SAPPHIRE).add_modifier(Modifier::UNDERLINED),
                    ),
                    Span::styled(format!(" [{}]", source.key), Style::default().fg(BORDER_ACCENT)),
                ]);
                writer.push_wrapped(&source.link, width, "   ", Style::default().fg(TEXT_MUTED));
            }
        }
    }
}

/// Transcript lines for the chat panel.
pub fn transcript_lines(session: &ChatSession, width: usize, now: Instant, fade_in: Duration) -> Vec<Line<'static>> {
    let content_width = width.saturating_sub(LABEL_WIDTH);
    let mut lines: Vec<Line<'static>> = Vec::new();

    for entry in session.conversation.entries() {
        let time = entry.timestamp.with_timezone(&Local).format("%H:%M").to_string();
        match &entry.kind {
            EntryKind::User(text) => {
                let mut writer = EntryWriter::new(
                    &mut lines,
                    "you",
                    Style::default().fg(SAPPHIRE).add_modifier(Modifier::BOLD),
                    time,
                );
                for line in text.lines() {
                    writer.push_wrapped(line, content_width, "", Style::default().fg(TEXT_PRIMARY));
                }
            }
            EntryKind::Assistant(assistant) => {
                let mut writer = EntryWriter::new(
                    &mut lines,
                    "assistant",
                    Style::default().fg(COPPER).add_modifier(Modifier::BOLD),
                    time,
                );
                assistant_lines(
                    &mut writer,
                    assistant,
                    session.show_thinking,
                    session.thinking_label(),
                    content_width,
                    now,
                    fade_in,
                );
            }
            EntryKind::System(text) => {
                let mut writer = EntryWriter::new(
                    &mut lines,
                    "system",
                    Style::default().fg(WARM_BROWN).add_modifier(Modifier::BOLD),
                    time,
                );
                writer.push_wrapped(text, content_width, "", Style::default().fg(TEXT_MUTED));
            }
            EntryKind::Error { text, .. } => {
                let mut writer = EntryWriter::new(
                    &mut lines,
                    "error",
                    Style::default().fg(BURGUNDY).add_modifier(Modifier::BOLD),
                    time,
                );
                writer.push_wrapped(text, content_width, "", Style::default().fg(BURGUNDY));
            }
        }

        // Add spacing between messages
        lines.push(Line::from(""));
    }

    lines
}

fn section_title(title: &str) -> Line<'static> {
    Line::from(Span::styled(
        title.to_string(),
        Style::default().fg(SAPPHIRE).add_modifier(Modifier::BOLD),
    ))
}

fn bullet_lines(lines: &mut Vec<Line<'static>>, items: &[String], width: usize) {
    if items.is_empty() {
        lines.push(Line::from(Span::styled("  (none)", Style::default().fg(TEXT_MUTED))));
        return;
    }
    for item in items {
        for (i, piece) in wrap_text(item, width.saturating_sub(4)).into_iter().enumerate() {
            let lead = if i == 0 { "  • " } else { "    " };
            lines.push(Line::from(vec![
                Span::styled(lead, Style::default().fg(COPPER)),
                Span::styled(piece, Style::default().fg(TEXT_SECONDARY)),
            ]));
        }
    }
}

fn preformatted(lines: &mut Vec<Line<'static>>, text: &str) {
    for line in text.lines() {
        lines.push(Line::from(vec![
            Span::raw("    "),
            Span::styled(line.to_string(), Style::default().fg(CODE_FG).bg(CODE_BG)),
        ]));
    }
}

/// Admin panel lines: understanding, function calls, summarization, error.
pub fn admin_lines(panel: &AdminPanel, width: usize) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    lines.push(section_title("Understanding"));
    bullet_lines(&mut lines, &panel.understanding, width);
    lines.push(Line::from(""));

    lines.push(section_title("Function Calls"));
    if panel.calls.is_empty() {
        lines.push(Line::from(Span::styled("  (none)", Style::default().fg(TEXT_MUTED))));
    }
    for call in &panel.calls {
        let mut header = vec![
            Span::styled("  • ", Style::default().fg(COPPER)),
            Span::styled(call.name.clone(), Style::default().fg(TEXT_PRIMARY).add_modifier(Modifier::BOLD)),
            Span::raw(" "),
        ];
        if call.sticky {
            header.push(Span::styled("(Sticky Request) ", Style::default().fg(LAVENDER)));
        }
        if call.rejected {
            header.push(Span::styled("(Rejected) ", Style::default().fg(BURGUNDY)));
        }
        header.push(Span::styled(format!(": {}", call.query), Style::default().fg(TEXT_SECONDARY)));
        if call.result == CallResult::Pending {
            header.push(Span::styled(
                " (Result pending...)",
                Style::default().fg(PALE_YELLOW).add_modifier(Modifier::ITALIC),
            ));
        }
        lines.push(Line::from(header));
        preformatted(&mut lines, &call.args);

        if let Some(reason) = &call.rejection_reason {
            lines.push(Line::from(Span::styled(
                format!("    Reason: {}", reason),
                Style::default().fg(BURGUNDY).add_modifier(Modifier::ITALIC),
            )));
        }

        if let CallResult::Raw(raw) = &call.result {
            let marker = if panel.show_raw { "▾" } else { "▸" };
            lines.push(Line::from(Span::styled(
                format!("    {} Show Raw Result / Details (F4)", marker),
                Style::default().fg(TEXT_MUTED),
            )));
            if panel.show_raw {
                preformatted(&mut lines, raw);
            }
        }
    }
    lines.push(Line::from(""));

    lines.push(section_title("Summarization"));
    bullet_lines(&mut lines, &panel.summarization, width);

    if let Some(error) = &panel.error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Error",
            Style::default().fg(BURGUNDY).add_modifier(Modifier::BOLD),
        )));
        for piece in wrap_text(error, width.saturating_sub(2)) {
            lines.push(Line::from(Span::styled(format!("  {}", piece), Style::default().fg(BURGUNDY))));
        }
    }

    lines
}

pub fn draw(frame: &mut Frame, app: &App) {
    // Fill entire background
    let bg = Block::default().style(Style::default().bg(BG_DARK));
    frame.render_widget(bg, frame.area());

    let area = frame.area();
    let padded = Rect {
        x: area.x + 1,
        y: area.y,
        width: area.width.saturating_sub(2),
        height: area.height,
    };

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header
            Constraint::Min(5),    // Chat + admin
            Constraint::Length(3), // Input
            Constraint::Length(1), // Key hints
        ])
        .split(padded);

    draw_header(frame, app, rows[0]);

    if app.ui.show_admin {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(100 - app.config.admin_panel_percent),
                Constraint::Length(1),
                Constraint::Percentage(app.config.admin_panel_percent),
            ])
            .split(rows[1]);
        draw_messages(frame, app, columns[0]);
        draw_admin(frame, app, columns[2]);
    } else {
        draw_messages(frame, app, rows[1]);
    }

    draw_input(frame, app, rows[2]);
    draw_key_hints(frame, app, rows[3]);
}

fn draw_header(frame: &mut Frame, app: &App, area: Rect) {
    let status = app.session.status;
    let mut header = Line::from(vec![
        Span::styled("◆ planner-chat ", Style::default().fg(SAPPHIRE).add_modifier(Modifier::BOLD)),
        Span::styled(app.endpoint.to_string(), Style::default().fg(TEXT_MUTED)),
        Span::raw("  "),
        Span::styled(format!("● {}", status.label()), status_style(status)),
    ]);

    let in_flight = app
        .session
        .conversation
        .pending_assistant()
        .is_some_and(|entry| !entry.is_finalized());
    if in_flight {
        const SPINNER: [&str; 4] = ["◐", "◓", "◑", "◒"];
        let frame_char = SPINNER[(app.animation_frame / 8) % SPINNER.len()];
        header.spans.push(Span::styled(format!("  {} working", frame_char), Style::default().fg(LAVENDER)));
        if !app.session.queue.is_empty() {
            header.spans.push(Span::styled(
                format!(" ({} queued)", app.session.queue.len()),
                Style::default().fg(TEXT_MUTED),
            ));
        }
    }
    frame.render_widget(Paragraph::new(header), area);
}

fn draw_messages(frame: &mut Frame, app: &App, area: Rect) {
    let border_color = if app.ui.focus == Focus::Chat { SAPPHIRE } else { BORDER_DIM };

    let block = Block::default()
        .title(Span::styled(" Chat ", Style::default().fg(TEXT_PRIMARY).add_modifier(Modifier::BOLD)))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(border_color));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let padded = Rect {
        x: inner.x + 1,
        y: inner.y,
        width: inner.width.saturating_sub(2),
        height: inner.height,
    };

    if app.session.conversation.is_empty() {
        let hint = if app.session.status.is_open() {
            "Ask a question below to get started."
        } else {
            "Waiting for the connection..."
        };
        let welcome = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled(hint, Style::default().fg(TEXT_MUTED).add_modifier(Modifier::ITALIC))),
        ])
        .alignment(Alignment::Center);
        frame.render_widget(welcome, padded);
        return;
    }

    let lines = transcript_lines(
        &app.session,
        padded.width as usize,
        Instant::now(),
        app.config.thought_fade_in,
    );

    let total_lines = lines.len();
    let visible_height = padded.height as usize;

    // Scroll from bottom, clamp scroll_offset to valid range
    let max_scroll = total_lines.saturating_sub(visible_height);
    let clamped_offset = app.ui.scroll_offset.min(max_scroll);
    let scroll_pos = max_scroll.saturating_sub(clamped_offset);

    let messages = Paragraph::new(lines).scroll((scroll_pos as u16, 0));
    frame.render_widget(messages, padded);

    if total_lines > visible_height && clamped_offset > 0 {
        let down_indicator = Paragraph::new("▼").style(Style::default().fg(SAPPHIRE));
        let down_area = Rect {
            x: area.x + area.width.saturating_sub(2),
            y: area.y + area.height.saturating_sub(2),
            width: 1,
            height: 1,
        };
        frame.render_widget(down_indicator, down_area);
    }
}

fn draw_admin(frame: &mut Frame, app: &App, area: Rect) {
    let border_color = if app.ui.focus == Focus::Admin { SAPPHIRE } else { BORDER_DIM };

    let block = Block::default()
        .title(Span::styled(" Admin ", Style::default().fg(TEXT_PRIMARY).add_modifier(Modifier::BOLD)))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(border_color));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let lines = admin_lines(&app.session.admin, inner.width as usize);
    let max_scroll = lines.len().saturating_sub(inner.height as usize);
    let scroll = app.ui.admin_scroll.min(max_scroll);
    frame.render_widget(Paragraph::new(lines).scroll((scroll as u16, 0)), inner);
}

/// Why the input is disabled, shown in its place.
fn disabled_input_text(session: &ChatSession) -> &'static str {
    let status = session.status;
    if status.is_closed() || session.conversation.has_banner(CONNECTION_ERROR_BANNER) {
        "disconnected, restart to reconnect"
    } else if status.is_open() && session.controls.all_disabled() {
        "waiting for the assistant..."
    } else {
        "connecting..."
    }
}

fn draw_input(frame: &mut Frame, app: &App, area: Rect) {
    let enabled = app.can_type();

    // Pulsing border when focused and enabled
    let border_color = if enabled && app.ui.focus == Focus::Input {
        let glow = (app.animation_frame as f64 / 90.0).sin() * 0.3 + 0.7;
        blend(BG_DARK, SAPPHIRE, glow)
    } else {
        BORDER_DIM
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(border_color));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let input = if enabled {
        let cursor = if app.animation_frame % 30 < 15 { "|" } else { " " };
        Paragraph::new(format!(" > {}{}", app.ui.input, cursor)).style(Style::default().fg(TEXT_PRIMARY))
    } else {
        Paragraph::new(format!(" > {}", disabled_input_text(&app.session)))
            .style(Style::default().fg(TEXT_MUTED).add_modifier(Modifier::ITALIC))
    };
    frame.render_widget(input.wrap(Wrap { trim: false }), inner);
}

fn draw_key_hints(frame: &mut Frame, app: &App, area: Rect) {
    if let Some(message) = &app.ui.status_message {
        let status = Paragraph::new(message.as_str()).style(Style::default().fg(CYAN_LIGHT));
        frame.render_widget(status, area);
        return;
    }

    let mut spans = Vec::new();
    for (key, action) in KEY_HINTS {
        let enabled = match *key {
            "Ctrl+R" => app.session.controls.reset,
            "Enter" => app.session.controls.send,
            _ => true,
        };
        let key_color = if enabled { SAPPHIRE } else { BORDER_ACCENT };
        spans.push(Span::styled(*key, Style::default().fg(key_color).add_modifier(Modifier::BOLD)));
        spans.push(Span::styled(format!(" {}  ", action), Style::default().fg(TEXT_MUTED)));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::connection::SocketEvent;
    use ratatui::{backend::TestBackend, Terminal};
    use url::Url;

    fn text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.to_string()).collect()
    }

    fn texts(lines: &[Line]) -> Vec<String> {
        lines.iter().map(text).collect()
    }

    fn open_session(now: Instant) -> ChatSession {
        let mut session = ChatSession::new(&Config::default());
        session.on_socket_event(SocketEvent::Opened, now);
        session
    }

    fn deliver(session: &mut ChatSession, json: &str, now: Instant) {
        session.on_socket_event(SocketEvent::Message(json.to_string()), now);
    }

    #[test]
    fn test_wrap_text() {
        assert_eq!(wrap_text("one two three", 7), vec!["one two", "three"]);
        assert_eq!(wrap_text("", 10), vec![""]);
    }

    #[test]
    fn test_blend_endpoints() {
        assert_eq!(blend(BG_DARK, TEXT_PRIMARY, 0.0), BG_DARK);
        assert_eq!(blend(BG_DARK, TEXT_PRIMARY, 1.0), TEXT_PRIMARY);
    }

    #[test]
    fn test_placeholder_rendered_for_new_turn() {
        let now = Instant::now();
        let mut session = open_session(now);
        session.submit("q", now);

        let lines = texts(&transcript_lines(&session, 80, now, Duration::ZERO));
        assert!(lines.iter().any(|l| l.contains(PLACEHOLDER)));
    }

    #[test]
    fn test_final_answer_paragraphs_blank_line_dropped() {
        let now = Instant::now();
        let mut session = open_session(now);
        session.submit("q", now);
        deliver(
            &mut session,
            r#"{"type": "final_response", "data": {"ai_message": "Line one\n\nLine two", "citations": {}}}"#,
            now,
        );

        let lines = texts(&transcript_lines(&session, 80, now, Duration::ZERO));
        assert_eq!(lines.iter().filter(|l| l.contains("Line one")).count(), 1);
        assert_eq!(lines.iter().filter(|l| l.contains("Line two")).count(), 1);
        assert!(!lines.iter().any(|l| l.contains(PLACEHOLDER)));
        assert!(!lines.iter().any(|l| l.contains(SOURCES_TITLE)));
    }

    #[test]
    fn test_sources_listed_in_rank_order() {
        let now = Instant::now();
        let mut session = open_session(now);
        session.submit("q", now);
        deliver(
            &mut session,
            r#"{"type": "final_response", "data": {"ai_message": "Answer", "citations": {
                "2": {"title": "Second doc", "link": "https://b"},
                "1": {"title": "First doc", "link": "https://a"},
                "3": {"title": "No link"}
            }}}"#,
            now,
        );

        let lines = texts(&transcript_lines(&session, 80, now, Duration::ZERO));
        let first = lines.iter().position(|l| l.contains("1. First doc")).unwrap();
        let second = lines.iter().position(|l| l.contains("2. Second doc")).unwrap();
        assert!(first < second);
        assert!(!lines.iter().any(|l| l.contains("No link")));
    }

    #[test]
    fn test_trace_precedes_answer_and_follows_global_flag() {
        let now = Instant::now();
        let mut session = open_session(now);
        session.submit("q", now);
        deliver(&mut session, r#"{"type": "thought", "data": "checking ledger"}"#, now);
        session.tick(now);
        deliver(
            &mut session,
            r#"{"type": "final_response", "data": {"ai_message": "Done", "citations": {}}}"#,
            now,
        );

        let hidden = texts(&transcript_lines(&session, 80, now, Duration::ZERO));
        assert!(hidden.iter().any(|l| l.contains("[Show thinking]")));
        assert!(!hidden.iter().any(|l| l.contains("checking ledger")));

        session.toggle_thinking(now);
        let shown = texts(&transcript_lines(&session, 80, now, Duration::ZERO));
        let toggle = shown.iter().position(|l| l.contains("[Hide thinking]")).unwrap();
        let thought = shown.iter().position(|l| l.contains("• checking ledger")).unwrap();
        let answer = shown.iter().position(|l| l.contains("Done")).unwrap();
        assert!(toggle < thought && thought < answer);
    }

    #[test]
    fn test_toggle_applies_to_all_entries() {
        let now = Instant::now();
        let mut session = open_session(now);
        for question in ["first", "second"] {
            session.submit(question, now);
            deliver(&mut session, r#"{"type": "thought", "data": "step"}"#, now);
            session.tick(now);
            deliver(
                &mut session,
                r#"{"type": "final_response", "data": {"ai_message": "ok", "citations": {}}}"#,
                now,
            );
        }

        session.toggle_thinking(now);
        let lines = texts(&transcript_lines(&session, 80, now, Duration::ZERO));
        assert_eq!(lines.iter().filter(|l| l.contains("[Hide thinking]")).count(), 2);
        assert_eq!(lines.iter().filter(|l| l.contains("• step")).count(), 2);
    }

    #[test]
    fn test_status_lines_have_no_bullet() {
        let now = Instant::now();
        let mut session = open_session(now);
        session.submit("q", now);
        deliver(&mut session, r#"{"type": "thought", "data": "hello"}"#, now);
        deliver(&mut session, r#"{"type": "status", "data": "working..."}"#, now);
        session.tick(now);
        session.tick(now + Duration::from_millis(100));
        session.toggle_thinking(now);

        let lines = transcript_lines(&session, 80, now + Duration::from_secs(1), Duration::ZERO);
        let all = texts(&lines);
        let hello = all.iter().position(|l| l.contains("• hello")).unwrap();
        let working = all.iter().position(|l| l.contains("working...")).unwrap();
        assert!(hello < working);
        assert!(!all[working].contains("• working"));

        let status_span = lines[working].spans.last().unwrap();
        assert!(status_span.style.add_modifier.contains(Modifier::ITALIC));
    }

    #[test]
    fn test_admin_lines_sections() {
        let mut panel = AdminPanel::new();
        panel.project(
            &serde_json::from_str(
                r#"{
                    "understanding_thoughts": ["wants report"],
                    "function_calls_made": [
                        {"name": "get_report", "query": "P&L", "all_args": {"period": "Q1"},
                         "raw_result": {"rejected": true, "rejection_reason": "No data"}},
                        {"name": "lookup", "query": "x", "raw_result": null}
                    ],
                    "error": "planner failed"
                }"#,
            )
            .unwrap(),
        );

        let lines = texts(&admin_lines(&panel, 60));
        assert!(lines.iter().any(|l| l.contains("wants report")));
        assert!(lines.iter().any(|l| l.contains("get_report") && l.contains("(Rejected)")));
        assert!(lines.iter().any(|l| l.contains("Reason: No data")));
        assert!(lines.iter().any(|l| l.contains("lookup") && l.contains("(Result pending...)")));
        assert!(lines.iter().any(|l| l.contains("\"period\": \"Q1\"")));
        assert!(lines.iter().any(|l| l.contains("planner failed")));
        assert!(!lines.iter().any(|l| l.contains("\"rejection_reason\"")));

        panel.toggle_raw();
        let expanded = texts(&admin_lines(&panel, 60));
        assert!(expanded.iter().any(|l| l.contains("\"rejection_reason\": \"No data\"")));
    }

    #[test]
    fn test_disabled_input_text_follows_connection_state() {
        let now = Instant::now();
        let mut session = ChatSession::new(&Config::default());
        assert_eq!(disabled_input_text(&session), "connecting...");

        session.on_socket_event(SocketEvent::Opened, now);
        session.submit("q", now);
        assert_eq!(disabled_input_text(&session), "waiting for the assistant...");

        session.on_socket_event(SocketEvent::Error("reset by peer".into()), now);
        assert!(session.status.is_open());
        assert_eq!(disabled_input_text(&session), "disconnected, restart to reconnect");
    }

    #[test]
    fn test_admin_error_region_hidden_without_error() {
        let panel = AdminPanel::new();
        let lines = texts(&admin_lines(&panel, 60));
        assert!(!lines.iter().any(|l| l == "Error"));
    }

    #[test]
    fn test_draw_smoke() {
        let now = Instant::now();
        let mut app = App::new(Config::default(), Url::parse("ws://127.0.0.1:8000/ws").unwrap());
        app.on_socket_event(SocketEvent::Opened, now);
        app.insert_text("hello");
        app.submit_message(now);

        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|frame| draw(frame, &app)).unwrap();

        let buffer = terminal.backend().buffer();
        let rendered: String = buffer.content().iter().map(|cell| cell.symbol()).collect();
        assert!(rendered.contains("Chat"));
        assert!(rendered.contains("Admin"));
        assert!(rendered.contains("hello"));
    }
}
