//! Admin panel: a read-only mirror of the server's diagnostic state.
//!
//! Every update replaces the panel contents wholesale; nothing is patched
//! incrementally, so projecting the same snapshot twice is a no-op.

use serde_json::Value;

use crate::protocol::{AdminSnapshot, FunctionCall};

const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallResult {
    Pending,
    /// Pretty-printed raw result.
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallView {
    pub name: String,
    pub query: String,
    pub args: String,
    pub sticky: bool,
    pub rejected: bool,
    pub rejection_reason: Option<String>,
    pub result: CallResult,
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

impl From<&FunctionCall> for CallView {
    fn from(call: &FunctionCall) -> Self {
        let name = call
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
        let query = call
            .query
            .clone()
            .filter(|q| !q.is_empty())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
        let args = match &call.all_args {
            Some(value) if !value.is_null() => pretty(value),
            _ => "{}".to_string(),
        };
        let rejected = call.rejected();
        let rejection_reason = if rejected {
            call.rejection_reason().map(str::to_string)
        } else {
            None
        };
        let result = match &call.raw_result {
            Some(value) if !value.is_null() => CallResult::Raw(pretty(value)),
            _ => CallResult::Pending,
        };

        Self {
            name,
            query,
            args,
            sticky: call.asked_for_sticky(),
            rejected,
            rejection_reason,
            result,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdminPanel {
    pub understanding: Vec<String>,
    pub calls: Vec<CallView>,
    pub summarization: Vec<String>,
    /// `None` hides the error region.
    pub error: Option<String>,
    /// Raw result disclosure, kept across projections.
    pub show_raw: bool,
}

impl AdminPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project(&mut self, snapshot: &AdminSnapshot) {
        self.understanding = snapshot.understanding_thoughts.clone();
        self.calls = snapshot.function_calls_made.iter().map(CallView::from).collect();
        self.summarization = snapshot.summarization_thoughts.clone();
        self.error = snapshot.error.clone().filter(|e| !e.is_empty());
    }

    pub fn toggle_raw(&mut self) -> bool {
        self.show_raw = !self.show_raw;
        self.show_raw
    }

    pub fn is_empty(&self) -> bool {
        self.understanding.is_empty()
            && self.calls.is_empty()
            && self.summarization.is_empty()
            && self.error.is_none()
    }
}
