//! Conversation view model: what the chat transcript currently shows.

use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

use crate::protocol::{FinalResponse, Source};
use crate::queue::ThoughtItem;

pub const PLACEHOLDER: &str = "Understanding your request...";
pub const TRACE_TITLE: &str = "Thinking Process:";
pub const SOURCES_TITLE: &str = "Sources:";

/// Banner id shared by every transport failure notice.
pub const CONNECTION_ERROR_BANNER: &str = "connection-error";

pub type EntryId = u64;

#[derive(Debug, Clone, PartialEq)]
pub struct ThoughtLine {
    pub text: String,
    pub is_status: bool,
    /// When the line became visible; drives the fade-in.
    pub shown_at: Instant,
}

impl ThoughtLine {
    /// Fade-in progress in `0.0..=1.0`.
    pub fn opacity(&self, now: Instant, fade_in: Duration) -> f64 {
        if fade_in.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.shown_at);
        (elapsed.as_secs_f64() / fade_in.as_secs_f64()).min(1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FinalAnswer {
    pub paragraphs: Vec<String>,
    pub sources: Vec<Source>,
}

/// Split on newlines, dropping blank lines.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    text.split('\n')
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.trim_end_matches('\r').to_string())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssistantEntry {
    pub placeholder: bool,
    /// Created on the first thought of the turn.
    pub trace: Option<Vec<ThoughtLine>>,
    pub answer: Option<FinalAnswer>,
}

impl AssistantEntry {
    pub fn new() -> Self {
        Self {
            placeholder: true,
            trace: None,
            answer: None,
        }
    }

    pub fn push_thought(&mut self, item: ThoughtItem, now: Instant) {
        self.placeholder = false;
        self.trace.get_or_insert_with(Vec::new).push(ThoughtLine {
            text: item.text,
            is_status: item.is_status,
            shown_at: now,
        });
    }

    pub fn finalize(&mut self, response: &FinalResponse) {
        self.placeholder = false;
        self.answer = Some(FinalAnswer {
            paragraphs: split_paragraphs(&response.ai_message),
            sources: response.sorted_citations(),
        });
    }

    pub fn is_finalized(&self) -> bool {
        self.answer.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryKind {
    User(String),
    Assistant(AssistantEntry),
    System(String),
    Error {
        text: String,
        banner: Option<&'static str>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub id: EntryId,
    pub kind: EntryKind,
    pub timestamp: DateTime<Utc>,
}

/// Ordered transcript plus the pointer to the assistant entry still in progress.
#[derive(Debug, Default)]
pub struct Conversation {
    entries: Vec<Entry>,
    pending: Option<EntryId>,
    next_id: EntryId,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, kind: EntryKind) -> EntryId {
        self.next_id += 1;
        let id = self.next_id;
        self.entries.push(Entry {
            id,
            kind,
            timestamp: Utc::now(),
        });
        id
    }

    pub fn push_user(&mut self, text: &str) -> EntryId {
        self.push(EntryKind::User(text.to_string()))
    }

    pub fn push_system(&mut self, text: &str) -> EntryId {
        self.push(EntryKind::System(text.to_string()))
    }

    /// Append an error entry. With a banner id, an earlier entry carrying the
    /// same id is removed first so repeated failures do not stack.
    pub fn push_error(&mut self, text: &str, banner: Option<&'static str>) -> EntryId {
        if let Some(id) = banner {
            self.remove_banner(id);
        }
        self.push(EntryKind::Error {
            text: format!("Error: {}", text),
            banner,
        })
    }

    pub fn remove_banner(&mut self, banner_id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| {
            !matches!(&entry.kind, EntryKind::Error { banner: Some(id), .. } if *id == banner_id)
        });
        before != self.entries.len()
    }

    pub fn has_banner(&self, banner_id: &str) -> bool {
        self.entries
            .iter()
            .any(|entry| matches!(&entry.kind, EntryKind::Error { banner: Some(id), .. } if *id == banner_id))
    }

    /// Start a new assistant entry and make it the pending one.
    pub fn open_assistant(&mut self) -> EntryId {
        let id = self.push(EntryKind::Assistant(AssistantEntry::new()));
        self.pending = Some(id);
        id
    }

    pub fn pending_id(&self) -> Option<EntryId> {
        self.pending
    }

    /// Forget the pending entry; whatever it shows stays in the transcript.
    pub fn discard_pending(&mut self) {
        self.pending = None;
    }

    pub fn pending_assistant(&self) -> Option<&AssistantEntry> {
        let id = self.pending?;
        self.entries.iter().find(|e| e.id == id).and_then(|e| match &e.kind {
            EntryKind::Assistant(entry) => Some(entry),
            _ => None,
        })
    }

    fn pending_index(&self) -> Option<usize> {
        let id = self.pending?;
        self.entries
            .iter()
            .position(|e| e.id == id && matches!(e.kind, EntryKind::Assistant(_)))
    }

    /// The pending assistant entry, created on the spot if there is none.
    pub fn pending_assistant_mut(&mut self) -> Option<&mut AssistantEntry> {
        let index = match self.pending_index() {
            Some(index) => index,
            None => {
                self.open_assistant();
                self.entries.len() - 1
            }
        };

        match &mut self.entries[index].kind {
            EntryKind::Assistant(entry) => Some(entry),
            _ => None,
        }
    }

    /// Finalize the pending entry (creating one if needed) and clear the pointer.
    pub fn finalize_pending(&mut self, response: &FinalResponse) {
        if let Some(entry) = self.pending_assistant_mut() {
            entry.finalize(response);
        }
        self.pending = None;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use serde_json::json;

    fn response(message: &str) -> FinalResponse {
        FinalResponse {
            ai_message: message.to_string(),
            citations: BTreeMap::new(),
        }
    }

    #[test]
    fn test_split_paragraphs_drops_blank_lines() {
        assert_eq!(split_paragraphs("Line one\n\nLine two"), vec!["Line one", "Line two"]);
        assert_eq!(split_paragraphs("  \n\n"), Vec::<String>::new());
    }

    #[test]
    fn test_new_assistant_entry_shows_placeholder() {
        let mut conversation = Conversation::new();
        conversation.open_assistant();
        let entry = conversation.pending_assistant().unwrap();
        assert!(entry.placeholder);
        assert!(entry.trace.is_none());
    }

    #[test]
    fn test_first_thought_replaces_placeholder_and_creates_trace() {
        let now = Instant::now();
        let mut entry = AssistantEntry::new();
        entry.push_thought(ThoughtItem::thought("hello"), now);
        entry.push_thought(ThoughtItem::status("working..."), now);

        assert!(!entry.placeholder);
        let trace = entry.trace.as_ref().unwrap();
        assert_eq!(trace.len(), 2);
        assert_eq!(trace[0].text, "hello");
        assert!(!trace[0].is_status);
        assert!(trace[1].is_status);
    }

    #[test]
    fn test_finalize_builds_paragraphs_and_sources() {
        let mut conversation = Conversation::new();
        conversation.open_assistant();

        let mut citations = BTreeMap::new();
        citations.insert(
            "2".to_string(),
            json!({"title": "Second", "link": "https://b"}),
        );
        citations.insert(
            "1".to_string(),
            json!({"title": "First", "link": "https://a"}),
        );
        conversation.finalize_pending(&FinalResponse {
            ai_message: "Line one\n\nLine two".to_string(),
            citations,
        });

        assert!(conversation.pending_id().is_none());
        let EntryKind::Assistant(entry) = &conversation.entries()[0].kind else {
            panic!("expected assistant entry");
        };
        let answer = entry.answer.as_ref().unwrap();
        assert_eq!(answer.paragraphs, vec!["Line one", "Line two"]);
        assert_eq!(answer.sources[0].title, "First");
        assert_eq!(answer.sources[1].title, "Second");
        assert!(!entry.placeholder);
    }

    #[test]
    fn test_finalize_without_pending_creates_entry() {
        let mut conversation = Conversation::new();
        conversation.finalize_pending(&response("late answer"));
        assert_eq!(conversation.len(), 1);
        assert!(conversation.pending_id().is_none());
    }

    #[test]
    fn test_pending_mut_lazily_creates_after_discard() {
        let mut conversation = Conversation::new();
        conversation.open_assistant();
        conversation.discard_pending();

        conversation.pending_assistant_mut().unwrap().push_thought(ThoughtItem::thought("stray"), Instant::now());
        assert_eq!(conversation.len(), 2);
        assert!(conversation.pending_id().is_some());
    }

    #[test]
    fn test_banner_errors_replace_each_other() {
        let mut conversation = Conversation::new();
        conversation.push_user("hi");
        conversation.push_error("first", Some(CONNECTION_ERROR_BANNER));
        conversation.push_error("second", Some(CONNECTION_ERROR_BANNER));
        conversation.push_error("one-off", None);

        let errors: Vec<&str> = conversation
            .entries()
            .iter()
            .filter_map(|e| match &e.kind {
                EntryKind::Error { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(errors, vec!["Error: second", "Error: one-off"]);

        assert!(conversation.remove_banner(CONNECTION_ERROR_BANNER));
        assert_eq!(conversation.len(), 2);
    }

    #[test]
    fn test_banner_removal_keeps_pending_pointer_valid() {
        let mut conversation = Conversation::new();
        conversation.push_error("down", Some(CONNECTION_ERROR_BANNER));
        conversation.open_assistant();
        conversation.remove_banner(CONNECTION_ERROR_BANNER);

        conversation.pending_assistant_mut().unwrap().push_thought(ThoughtItem::thought("x"), Instant::now());
        assert_eq!(conversation.len(), 1);
    }

    #[test]
    fn test_pending_pointer_never_resolves_to_other_entry_kinds() {
        let mut conversation = Conversation::new();
        let user = conversation.push_user("hi");
        conversation.pending = Some(user);

        let entry = conversation.pending_assistant_mut().unwrap();
        entry.push_thought(ThoughtItem::thought("t"), Instant::now());

        assert_eq!(conversation.len(), 2);
        assert!(matches!(conversation.entries()[0].kind, EntryKind::User(_)));
        assert!(matches!(conversation.entries()[1].kind, EntryKind::Assistant(_)));
    }

    #[test]
    fn test_opacity_ramps_to_one() {
        let now = Instant::now();
        let line = ThoughtLine { text: "t".into(), is_status: false, shown_at: now };
        let fade = Duration::from_millis(500);
        assert_eq!(line.opacity(now, fade), 0.0);
        assert!((line.opacity(now + Duration::from_millis(250), fade) - 0.5).abs() < 1e-9);
        assert_eq!(line.opacity(now + Duration::from_secs(2), fade), 1.0);
    }
}
