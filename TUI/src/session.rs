//! Chat session state and the message dispatcher.
//!
//! [`ChatSession`] owns everything a single conversation needs: the
//! transcript, the pending assistant entry, the thought queue, the admin
//! panel, connection status, control enablement and the thinking-visibility
//! flag. It is only ever touched from the main loop.

use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::admin::AdminPanel;
use crate::config::Config;
use crate::connection::{ConnectionStatus, SocketEvent};
use crate::protocol::{decode_server_message, AdminSnapshot, ClientMessage, ServerMessage};
use crate::queue::{AnimationQueue, ThoughtItem};
use crate::view::{Conversation, CONNECTION_ERROR_BANNER};

pub const CONNECTION_ERROR_TEXT: &str = "Connection error. Please refresh the page.";
pub const CONNECTION_CLOSED_TEXT: &str = "Connection closed unexpectedly. Please refresh the page.";
pub const RESET_CLOSED_TEXT: &str = "Cannot reset chat. Connection is closed.";

/// Enablement of the message input, send and reset controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Controls {
    pub input: bool,
    pub send: bool,
    pub reset: bool,
}

impl Controls {
    fn set_all(&mut self, enabled: bool) {
        self.input = enabled;
        self.send = enabled;
        self.reset = enabled;
    }

    #[cfg(test)]
    pub fn all_enabled(&self) -> bool {
        self.input && self.send && self.reset
    }

    pub fn all_disabled(&self) -> bool {
        !self.input && !self.send && !self.reset
    }
}

pub struct ChatSession {
    pub conversation: Conversation,
    pub queue: AnimationQueue,
    pub admin: AdminPanel,
    pub status: ConnectionStatus,
    pub controls: Controls,
    /// Applies to every assistant entry at once.
    pub show_thinking: bool,
    focus_requested: bool,
    scroll_due: Option<Instant>,
    scroll_settle: Duration,
}

impl ChatSession {
    pub fn new(config: &Config) -> Self {
        Self {
            conversation: Conversation::new(),
            queue: AnimationQueue::new(config.thought_delay),
            admin: AdminPanel::new(),
            status: ConnectionStatus::Connecting,
            controls: Controls::default(),
            show_thinking: false,
            focus_requested: true,
            scroll_due: None,
            scroll_settle: config.scroll_settle,
        }
    }

    fn request_scroll(&mut self, now: Instant) {
        self.scroll_due = Some(now + self.scroll_settle);
    }

    /// Drop the in-flight turn: no pending entry, nothing queued.
    fn reset_turn(&mut self) {
        self.conversation.discard_pending();
        self.queue.clear();
    }

    fn finish_turn(&mut self) {
        self.reset_turn();
        self.controls.set_all(true);
        self.focus_requested = true;
    }

    pub fn on_socket_event(&mut self, event: SocketEvent, now: Instant) {
        self.status = self.status.apply(&event);

        match event {
            SocketEvent::Opened => {
                info!("socket open, enabling input");
                self.controls.set_all(true);
                self.focus_requested = true;
                if self.conversation.remove_banner(CONNECTION_ERROR_BANNER) {
                    self.request_scroll(now);
                }
            }
            SocketEvent::Message(text) => match decode_server_message(&text) {
                Ok(Some(message)) => self.dispatch(message, now),
                Ok(None) => {}
                Err(err) => {
                    error!("failed to handle server message: {}", err);
                    self.push_error(&format!("Error processing message from server: {}", err), now);
                }
            },
            SocketEvent::Error(reason) => {
                error!("socket error: {}", reason);
                self.conversation.push_error(CONNECTION_ERROR_TEXT, Some(CONNECTION_ERROR_BANNER));
                self.controls.set_all(false);
                self.request_scroll(now);
            }
            SocketEvent::Closed { clean, code, reason } => {
                info!("socket closed: clean={} code={:?} reason={:?}", clean, code, reason);
                if !clean {
                    self.conversation.push_error(CONNECTION_CLOSED_TEXT, Some(CONNECTION_ERROR_BANNER));
                    self.request_scroll(now);
                }
                self.controls.set_all(false);
                self.reset_turn();
            }
        }
    }

    pub fn dispatch(&mut self, message: ServerMessage, now: Instant) {
        debug!("dispatching {}", message.tag());

        match message {
            ServerMessage::Thought(text) => self.queue.enqueue(ThoughtItem::thought(text), now),
            ServerMessage::Status(text) => self.queue.enqueue(ThoughtItem::status(text), now),
            ServerMessage::AdminUpdate(snapshot) => self.admin.project(&snapshot),
            ServerMessage::FinalResponse(response) => {
                self.conversation.finalize_pending(&response);
                self.finish_turn();
                self.request_scroll(now);
            }
            ServerMessage::Error(text) => {
                error!("received error from server: {}", text);
                self.conversation.push_error(&text, None);
                self.finish_turn();
                self.request_scroll(now);
            }
            ServerMessage::SystemMessage(text) => {
                info!("received system message: {}", text);
                self.conversation.push_system(&text);
                self.request_scroll(now);
            }
        }
    }

    /// One-off error entry that does not touch turn state.
    pub fn push_error(&mut self, text: &str, now: Instant) {
        self.conversation.push_error(text, None);
        self.request_scroll(now);
    }

    /// Start a new turn. Returns the request to send, or `None` when the
    /// input is empty or the session cannot send right now.
    pub fn submit(&mut self, input: &str, now: Instant) -> Option<ClientMessage> {
        let message = input.trim();
        if message.is_empty() {
            return None;
        }
        if !self.status.is_open() {
            warn!("socket not open, dropping message");
            return None;
        }
        if !self.controls.send {
            debug!("send disabled, turn still in flight");
            return None;
        }

        self.conversation.push_user(message);
        self.controls.set_all(false);
        self.reset_turn();
        self.conversation.open_assistant();
        self.admin.project(&AdminSnapshot::empty());
        self.request_scroll(now);

        Some(ClientMessage::Query(message.to_string()))
    }

    /// Clear the conversation locally and ask the server to do the same.
    /// The confirmation arrives later as a system message.
    pub fn reset(&mut self, now: Instant) -> Option<ClientMessage> {
        if !self.status.is_open() {
            error!("cannot reset: socket is not open");
            self.push_error(RESET_CLOSED_TEXT, now);
            return None;
        }
        if !self.controls.reset {
            debug!("reset disabled, turn still in flight");
            return None;
        }

        info!("sending reset request");
        self.conversation.clear();
        self.admin.project(&AdminSnapshot::empty());
        self.reset_turn();
        Some(ClientMessage::Reset)
    }

    /// Flip thinking visibility for every assistant entry.
    pub fn toggle_thinking(&mut self, now: Instant) -> bool {
        self.show_thinking = !self.show_thinking;
        info!("global thinking visibility: {}", self.show_thinking);
        if self.show_thinking {
            self.request_scroll(now);
        }
        self.show_thinking
    }

    /// True once after an event that returns focus to the message input.
    pub fn take_focus_request(&mut self) -> bool {
        std::mem::take(&mut self.focus_requested)
    }

    pub fn thinking_label(&self) -> &'static str {
        if self.show_thinking {
            "Hide thinking"
        } else {
            "Show thinking"
        }
    }

    /// Advance timers. Returns true when the view should jump to the bottom.
    pub fn tick(&mut self, now: Instant) -> bool {
        if let Some(item) = self.queue.poll(now) {
            if let Some(entry) = self.conversation.pending_assistant_mut() {
                entry.push_thought(item, now);
            }
            if self.show_thinking {
                self.request_scroll(now);
            }
        }

        match self.scroll_due {
            Some(at) if now >= at => {
                self.scroll_due = None;
                true
            }
            _ => false,
        }
    }
}
