use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{info, warn};
use url::Url;

use crate::config::Config;
use crate::connection::{Connection, SocketEvent};
use crate::error::ClientError;
use crate::protocol::ClientMessage;
use crate::session::ChatSession;
use crate::ui_state::{Focus, UIState};

pub struct App {
    pub session: ChatSession,
    pub ui: UIState,
    pub config: Config,
    pub endpoint: Url,
    pub animation_frame: usize,
    pub animation_tick: u64,
    pub should_quit: bool,
    connection: Option<Connection>,
}

impl App {
    pub fn new(config: Config, endpoint: Url) -> Self {
        Self {
            session: ChatSession::new(&config),
            ui: UIState::new(),
            config,
            endpoint,
            animation_frame: 0,
            animation_tick: 0,
            should_quit: false,
            connection: None,
        }
    }

    /// Open the socket; lifecycle events arrive on `events`.
    pub fn connect(&mut self, events: mpsc::UnboundedSender<SocketEvent>) {
        let connection = Connection::spawn(self.endpoint.clone(), self.config.connect_timeout, events);
        self.connection = Some(connection);
    }

    pub async fn disconnect(&mut self) {
        if let Some(connection) = self.connection.take() {
            info!("disconnecting from {}", connection.url());
            connection.close(self.config.close_grace).await;
        }
    }

    pub fn on_socket_event(&mut self, event: SocketEvent, now: Instant) {
        self.session.on_socket_event(event, now);
        self.sync_focus();
    }

    pub fn tick(&mut self, now: Instant) {
        self.animation_tick += 1;
        self.animation_frame = (self.animation_frame + 1) % 360;

        // Clear status message after ~3 seconds (180 ticks at 16ms)
        if self.animation_tick % 180 == 0 {
            self.ui.status_message = None;
        }

        if self.session.tick(now) {
            self.ui.scroll_offset = 0;
        }
    }

    fn sync_focus(&mut self) {
        if self.session.take_focus_request() {
            self.ui.focus = Focus::Input;
        }
    }

    fn send(&mut self, message: ClientMessage, now: Instant) {
        let result = match &self.connection {
            Some(connection) => connection.send(&message),
            None => Err(ClientError::NotConnected),
        };
        if let Err(err) = result {
            warn!("failed to send message: {}", err);
            self.session.push_error(&format!("Could not send message: {}", err), now);
        }
    }

    pub fn submit_message(&mut self, now: Instant) {
        if let Some(message) = self.session.submit(&self.ui.input, now) {
            self.ui.input.clear();
            self.send(message, now);
        }
    }

    pub fn reset_chat(&mut self, now: Instant) {
        if let Some(message) = self.session.reset(now) {
            self.ui.scroll_offset = 0;
            self.ui.admin_scroll = 0;
            self.send(message, now);
        }
    }

    pub fn toggle_thinking(&mut self, now: Instant) {
        let visible = self.session.toggle_thinking(now);
        self.ui.status_message = Some(if visible { "Thinking shown" } else { "Thinking hidden" }.to_string());
    }

    pub fn can_type(&self) -> bool {
        self.session.controls.input
    }

    /// Insert text from a paste; newlines become spaces in the single-line input.
    pub fn insert_text(&mut self, text: &str) {
        if !self.can_type() {
            return;
        }
        let filtered: String = text
            .chars()
            .filter(|c| *c != '\r')
            .map(|c| if c == '\n' { ' ' } else { c })
            .collect();
        self.ui.input.push_str(&filtered);
    }

    fn paste_clipboard(&mut self) {
        match arboard::Clipboard::new().and_then(|mut clipboard| clipboard.get_text()) {
            Ok(text) => self.insert_text(&text),
            Err(err) => warn!("clipboard unavailable: {}", err),
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if ctrl => self.should_quit = true,
            KeyCode::Char('r') if ctrl => self.reset_chat(now),
            KeyCode::Char('v') if ctrl => self.paste_clipboard(),
            KeyCode::Esc => {
                if self.ui.input.is_empty() {
                    self.should_quit = true;
                } else {
                    self.ui.input.clear();
                }
            }
            KeyCode::Enter => self.submit_message(now),
            KeyCode::F(3) => self.toggle_thinking(now),
            KeyCode::F(4) => {
                let shown = self.session.admin.toggle_raw();
                self.ui.status_message =
                    Some(if shown { "Raw results shown" } else { "Raw results hidden" }.to_string());
            }
            KeyCode::Tab => self.ui.show_admin = !self.ui.show_admin,
            KeyCode::BackTab => self.cycle_focus(),
            KeyCode::Up => self.scroll_up(),
            KeyCode::Down => self.scroll_down(),
            KeyCode::PageUp => {
                for _ in 0..self.config.scroll_step * 3 {
                    self.scroll_up();
                }
            }
            KeyCode::PageDown => {
                for _ in 0..self.config.scroll_step * 3 {
                    self.scroll_down();
                }
            }
            KeyCode::Backspace => {
                if self.can_type() {
                    self.ui.input.pop();
                }
            }
            KeyCode::Char(c) => {
                if self.can_type() {
                    self.ui.input.push(c);
                }
            }
            _ => {}
        }
    }

    pub fn cycle_focus(&mut self) {
        self.ui.focus = match self.ui.focus {
            Focus::Input => Focus::Chat,
            Focus::Chat if self.ui.show_admin => Focus::Admin,
            Focus::Chat | Focus::Admin => Focus::Input,
        };
    }

    pub fn scroll_up(&mut self) {
        if self.ui.focus == Focus::Admin {
            self.ui.admin_scroll = self.ui.admin_scroll.saturating_sub(self.config.scroll_step);
        } else {
            self.ui.scroll_offset += self.config.scroll_step;
        }
    }

    pub fn scroll_down(&mut self) {
        if self.ui.focus == Focus::Admin {
            self.ui.admin_scroll += self.config.scroll_step;
        } else {
            self.ui.scroll_offset = self.ui.scroll_offset.saturating_sub(self.config.scroll_step);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::EntryKind;

    fn app() -> App {
        App::new(Config::default(), Url::parse("ws://127.0.0.1:9/ws").unwrap())
    }

    fn press(app: &mut App, code: KeyCode, now: Instant) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE), now);
    }

    #[test]
    fn test_typing_ignored_while_disabled() {
        let now = Instant::now();
        let mut app = app();
        press(&mut app, KeyCode::Char('h'), now);
        assert!(app.ui.input.is_empty());

        app.on_socket_event(SocketEvent::Opened, now);
        press(&mut app, KeyCode::Char('h'), now);
        press(&mut app, KeyCode::Char('i'), now);
        assert_eq!(app.ui.input, "hi");
    }

    #[test]
    fn test_submit_without_connection_reports_send_error() {
        let now = Instant::now();
        let mut app = app();
        app.on_socket_event(SocketEvent::Opened, now);
        app.insert_text("hello\nthere");
        assert_eq!(app.ui.input, "hello there");

        press(&mut app, KeyCode::Enter, now);
        assert!(app.ui.input.is_empty());

        let last = &app.session.conversation.entries().last().unwrap().kind;
        assert!(matches!(last, EntryKind::Error { text, .. } if text.contains("not connected")));
    }

    #[test]
    fn test_escape_clears_then_quits() {
        let now = Instant::now();
        let mut app = app();
        app.on_socket_event(SocketEvent::Opened, now);
        app.insert_text("draft");

        press(&mut app, KeyCode::Esc, now);
        assert!(app.ui.input.is_empty());
        assert!(!app.should_quit);

        press(&mut app, KeyCode::Esc, now);
        assert!(app.should_quit);
    }

    #[test]
    fn test_f3_toggles_thinking() {
        let now = Instant::now();
        let mut app = app();
        press(&mut app, KeyCode::F(3), now);
        assert!(app.session.show_thinking);
        press(&mut app, KeyCode::F(3), now);
        assert!(!app.session.show_thinking);
    }

    #[test]
    fn test_tick_applies_scroll_to_bottom() {
        let now = Instant::now();
        let mut app = app();
        app.on_socket_event(SocketEvent::Opened, now);
        app.ui.scroll_offset = 12;
        app.session.push_error("x", now);

        app.tick(now);
        assert_eq!(app.ui.scroll_offset, 12);
        app.tick(now + app.config.scroll_settle);
        assert_eq!(app.ui.scroll_offset, 0);
    }
}
