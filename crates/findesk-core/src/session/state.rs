use std::fmt;
use std::sync::Arc;

use super::message::{Message, ReferenceItem};
use crate::prompts::GREETING;
use crate::search::SearchOutcome;

/// Where the current turn is in its lifecycle.
///
/// `Idle → Sending → Streaming → Idle` on success, `… → Error → Idle` on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnStatus {
    #[default]
    Idle,
    Sending,
    Streaming,
    Error,
}

impl TurnStatus {
    /// True while a turn holds the single-flight slot.
    pub fn is_in_flight(self) -> bool {
        matches!(self, TurnStatus::Sending | TurnStatus::Streaming)
    }
}

impl fmt::Display for TurnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TurnStatus::Idle => "idle",
            TurnStatus::Sending => "sending",
            TurnStatus::Streaming => "streaming",
            TurnStatus::Error => "error",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SearchStatus {
    #[default]
    Idle,
    Loading,
    Done(SearchOutcome),
}

/// Last search query and its results.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchState {
    pub(crate) query: String,
    pub(crate) status: SearchStatus,
    pub(crate) results: Vec<ReferenceItem>,
}

impl SearchState {
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn status(&self) -> &SearchStatus {
        &self.status
    }

    pub fn results(&self) -> &[ReferenceItem] {
        &self.results
    }

    pub fn is_loading(&self) -> bool {
        self.status == SearchStatus::Loading
    }
}

/// The whole session: message log, analysis flag, selection, turn status and search cache.
///
/// Only the reducer in [`super::store`] mutates this.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub(crate) messages: Vec<Arc<Message>>,
    pub(crate) analysis_mode: bool,
    pub(crate) selected_references: Vec<ReferenceItem>,
    pub(crate) turn_status: TurnStatus,
    pub(crate) search: SearchState,
}

impl SessionState {
    /// Fresh session whose log opens with the assistant greeting.
    pub fn with_greeting() -> Self {
        Self {
            messages: vec![Arc::new(Message::assistant(GREETING, false))],
            ..Self::default()
        }
    }

    /// Full log, including an in-flight empty placeholder.
    pub fn messages(&self) -> &[Arc<Message>] {
        &self.messages
    }

    /// Log as it should be rendered.
    ///
    /// While a turn is in flight the trailing assistant placeholder stays hidden
    /// until its first fragment lands.
    pub fn visible_messages(&self) -> &[Arc<Message>] {
        match self.messages.split_last() {
            Some((last, rest))
                if self.turn_status.is_in_flight()
                    && last.is_assistant()
                    && last.content().is_empty() =>
            {
                rest
            }
            _ => &self.messages,
        }
    }

    pub fn last_message(&self) -> Option<&Arc<Message>> {
        self.messages.last()
    }

    pub fn analysis_mode(&self) -> bool {
        self.analysis_mode
    }

    /// Selected references in selection order.
    pub fn selected_references(&self) -> &[ReferenceItem] {
        &self.selected_references
    }

    pub fn is_selected(&self, link: &str) -> bool {
        self.selected_references.iter().any(|r| r.link == link)
    }

    pub fn turn_status(&self) -> TurnStatus {
        self.turn_status
    }

    pub fn search(&self) -> &SearchState {
        &self.search
    }

    /// Most recent assistant message flagged as a report.
    pub fn latest_report(&self) -> Option<&Arc<Message>> {
        self.messages.iter().rev().find(|m| m.is_report())
    }
}
