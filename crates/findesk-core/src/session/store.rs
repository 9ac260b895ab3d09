//! Shared session store.
//!
//! All mutation goes through [`StoreAction`] and the pure [`reduce`] function.
//! The store publishes each reduced state through a `watch` channel, so a reader
//! never observes a half-applied action and subscribers are woken to re-render.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

use super::message::{Message, ReferenceItem};
use super::state::{SearchStatus, SessionState, TurnStatus};
use crate::search::SearchOutcome;

/// The closed set of state transitions.
#[derive(Debug, Clone)]
pub enum StoreAction {
    AppendMessage(Message),
    /// Swap the last entry for a new value of the same role.
    ReplaceLastMessage(Message),
    /// Fold a streamed fragment into the trailing assistant message.
    AppendToLast(String),
    SetAnalysisMode(bool),
    ToggleReference(ReferenceItem),
    /// Turn analysis mode on and make `item` the only selection. Refused
    /// while a turn is in flight.
    SelectOnly(ReferenceItem),
    /// Atomic `Idle → Sending` transition.
    BeginTurn,
    SetTurnStatus(TurnStatus),
    /// Start a new search; clears previous results and the selection.
    BeginSearch(String),
    FinishSearch {
        outcome: SearchOutcome,
        results: Vec<ReferenceItem>,
    },
}

/// Why an action left the state untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionRejected {
    /// Reference selection while analysis mode is off.
    NotAllowed,
    /// A turn is already `Sending` or `Streaming`.
    TurnInProgress,
    /// A search is already loading.
    SearchInProgress,
    /// There is no last message to replace.
    EmptyLog,
    /// The replacement would change the last message's role.
    RoleChange,
}

impl fmt::Display for ActionRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionRejected::NotAllowed => write!(f, "reference selection requires analysis mode"),
            ActionRejected::TurnInProgress => write!(f, "a turn is already in progress"),
            ActionRejected::SearchInProgress => write!(f, "a search is already in progress"),
            ActionRejected::EmptyLog => write!(f, "message log is empty"),
            ActionRejected::RoleChange => write!(f, "message role cannot change"),
        }
    }
}

impl std::error::Error for ActionRejected {}

/// Applies `action` to `state`.
///
/// Every rejection is decided before anything is written, so an `Err` always
/// means the state is exactly as it was.
pub fn reduce(state: &mut SessionState, action: StoreAction) -> Result<(), ActionRejected> {
    match action {
        StoreAction::AppendMessage(message) => {
            state.messages.push(Arc::new(message));
        }
        StoreAction::ReplaceLastMessage(message) => {
            let last = state.messages.last_mut().ok_or(ActionRejected::EmptyLog)?;
            if last.role() != message.role() {
                return Err(ActionRejected::RoleChange);
            }
            *last = Arc::new(message);
        }
        StoreAction::AppendToLast(fragment) => {
            let last = state.messages.last_mut().ok_or(ActionRejected::EmptyLog)?;
            if !last.is_assistant() {
                return Err(ActionRejected::RoleChange);
            }
            *last = Arc::new(last.with_appended(&fragment));
        }
        StoreAction::SetAnalysisMode(on) => {
            state.analysis_mode = on;
        }
        StoreAction::ToggleReference(item) => {
            if !state.analysis_mode {
                return Err(ActionRejected::NotAllowed);
            }
            if let Some(pos) = state
                .selected_references
                .iter()
                .position(|r| r.link == item.link)
            {
                state.selected_references.remove(pos);
            } else {
                state.selected_references.push(item);
            }
        }
        StoreAction::SelectOnly(item) => {
            if state.turn_status.is_in_flight() {
                return Err(ActionRejected::TurnInProgress);
            }
            state.analysis_mode = true;
            state.selected_references = vec![item];
        }
        StoreAction::BeginTurn => {
            if state.turn_status.is_in_flight() {
                return Err(ActionRejected::TurnInProgress);
            }
            state.turn_status = TurnStatus::Sending;
        }
        StoreAction::SetTurnStatus(status) => {
            state.turn_status = status;
        }
        StoreAction::BeginSearch(query) => {
            if state.search.is_loading() {
                return Err(ActionRejected::SearchInProgress);
            }
            state.search.query = query;
            state.search.status = SearchStatus::Loading;
            state.search.results.clear();
            state.selected_references.clear();
        }
        StoreAction::FinishSearch { outcome, results } => {
            state.search.status = SearchStatus::Done(outcome);
            state.search.results = results;
        }
    }
    Ok(())
}

/// Handle to the shared session state. Cloning shares the same state.
#[derive(Debug, Clone)]
pub struct SessionStore {
    tx: Arc<watch::Sender<SessionState>>,
}

impl SessionStore {
    pub fn new(initial: SessionState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Reduces `action` and publishes the result. Subscribers are only woken
    /// when the action was applied.
    pub fn dispatch(&self, action: StoreAction) -> Result<(), ActionRejected> {
        let mut result = Ok(());
        self.tx.send_if_modified(|state| match reduce(state, action) {
            Ok(()) => true,
            Err(rejected) => {
                result = Err(rejected);
                false
            }
        });
        if let Err(rejected) = result {
            tracing::debug!(%rejected, "store action rejected");
        }
        result
    }

    /// Runs `f` against the current state.
    ///
    /// The read lock is held only for the duration of `f`; do not block in it.
    pub fn read<R>(&self, f: impl FnOnce(&SessionState) -> R) -> R {
        f(&self.tx.borrow())
    }

    /// Clones the current state.
    pub fn snapshot(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    /// Receiver that is notified after every applied action.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SessionState::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str) -> ReferenceItem {
        ReferenceItem::new(title, format!("https://news.example/{title}"))
    }

    #[test]
    fn test_append_to_last_replaces_with_new_value() {
        let mut state = SessionState::default();
        reduce(&mut state, StoreAction::AppendMessage(Message::placeholder(false))).unwrap();
        let before = Arc::clone(&state.messages[0]);

        reduce(&mut state, StoreAction::AppendToLast("H".into())).unwrap();
        reduce(&mut state, StoreAction::AppendToLast("i there".into())).unwrap();

        assert_eq!(before.content(), "");
        assert!(!Arc::ptr_eq(&before, &state.messages[0]));
        assert_eq!(state.messages[0].content(), "Hi there");
        assert_eq!(state.messages[0].created_at(), before.created_at());
    }

    #[test]
    fn test_append_to_last_rejects_user_message() {
        let mut state = SessionState::default();
        reduce(&mut state, StoreAction::AppendMessage(Message::user("hi"))).unwrap();

        let err = reduce(&mut state, StoreAction::AppendToLast("x".into())).unwrap_err();
        assert_eq!(err, ActionRejected::RoleChange);
        assert_eq!(state.messages[0].content(), "hi");
    }

    #[test]
    fn test_replace_last_requires_same_role() {
        let mut state = SessionState::default();
        assert_eq!(
            reduce(&mut state, StoreAction::ReplaceLastMessage(Message::user("x"))),
            Err(ActionRejected::EmptyLog)
        );

        reduce(&mut state, StoreAction::AppendMessage(Message::placeholder(true))).unwrap();
        assert_eq!(
            reduce(&mut state, StoreAction::ReplaceLastMessage(Message::user("x"))),
            Err(ActionRejected::RoleChange)
        );

        let replacement = state.messages[0].with_appended("done");
        reduce(&mut state, StoreAction::ReplaceLastMessage(replacement)).unwrap();
        assert_eq!(state.messages[0].content(), "done");
        assert!(state.messages[0].is_report());

        reduce(
            &mut state,
            StoreAction::ReplaceLastMessage(Message::assistant("plain", false)),
        )
        .unwrap();
        assert!(!state.messages[0].is_report());
    }

    #[test]
    fn test_toggle_reference_gated_by_analysis_mode() {
        let mut state = SessionState::default();

        let err = reduce(&mut state, StoreAction::ToggleReference(item("A"))).unwrap_err();
        assert_eq!(err, ActionRejected::NotAllowed);
        assert!(state.selected_references().is_empty());

        reduce(&mut state, StoreAction::SetAnalysisMode(true)).unwrap();
        reduce(&mut state, StoreAction::ToggleReference(item("A"))).unwrap();
        reduce(&mut state, StoreAction::ToggleReference(item("B"))).unwrap();
        assert_eq!(state.selected_references().len(), 2);

        // Toggling a selected link removes it
        reduce(&mut state, StoreAction::ToggleReference(item("A"))).unwrap();
        assert_eq!(state.selected_references().len(), 1);
        assert_eq!(state.selected_references()[0].title, "B");
    }

    #[test]
    fn test_select_only_enables_analysis_mode() {
        let mut state = SessionState::default();
        reduce(&mut state, StoreAction::SetAnalysisMode(true)).unwrap();
        reduce(&mut state, StoreAction::ToggleReference(item("A"))).unwrap();
        reduce(&mut state, StoreAction::SetAnalysisMode(false)).unwrap();

        reduce(&mut state, StoreAction::SelectOnly(item("C"))).unwrap();
        assert!(state.analysis_mode());
        assert_eq!(state.selected_references().len(), 1);
        assert!(state.is_selected("https://news.example/C"));
    }

    #[test]
    fn test_select_only_refused_during_turn() {
        let mut state = SessionState::default();
        reduce(&mut state, StoreAction::SetAnalysisMode(true)).unwrap();
        reduce(&mut state, StoreAction::ToggleReference(item("A"))).unwrap();
        reduce(&mut state, StoreAction::BeginTurn).unwrap();

        assert_eq!(
            reduce(&mut state, StoreAction::SelectOnly(item("C"))),
            Err(ActionRejected::TurnInProgress)
        );
        assert_eq!(state.selected_references().len(), 1);
        assert!(state.is_selected("https://news.example/A"));
    }

    #[test]
    fn test_begin_turn_is_single_flight() {
        let mut state = SessionState::default();
        reduce(&mut state, StoreAction::BeginTurn).unwrap();
        assert_eq!(state.turn_status(), TurnStatus::Sending);

        assert_eq!(
            reduce(&mut state, StoreAction::BeginTurn),
            Err(ActionRejected::TurnInProgress)
        );

        reduce(&mut state, StoreAction::SetTurnStatus(TurnStatus::Streaming)).unwrap();
        assert_eq!(
            reduce(&mut state, StoreAction::BeginTurn),
            Err(ActionRejected::TurnInProgress)
        );

        reduce(&mut state, StoreAction::SetTurnStatus(TurnStatus::Error)).unwrap();
        reduce(&mut state, StoreAction::BeginTurn).unwrap();
    }

    #[test]
    fn test_begin_search_clears_selection_and_results() {
        let mut state = SessionState::default();
        reduce(&mut state, StoreAction::SelectOnly(item("A"))).unwrap();
        state.search.results = vec![item("A")];

        reduce(&mut state, StoreAction::BeginSearch("반도체".into())).unwrap();
        assert!(state.selected_references().is_empty());
        assert!(state.search().results().is_empty());
        assert!(state.search().is_loading());

        assert_eq!(
            reduce(&mut state, StoreAction::BeginSearch("again".into())),
            Err(ActionRejected::SearchInProgress)
        );

        reduce(
            &mut state,
            StoreAction::FinishSearch {
                outcome: SearchOutcome::Found(1),
                results: vec![item("B")],
            },
        )
        .unwrap();
        assert_eq!(state.search().query(), "반도체");
        assert_eq!(state.search().results().len(), 1);
        assert_eq!(
            state.search().status(),
            &SearchStatus::Done(SearchOutcome::Found(1))
        );
    }

    #[tokio::test]
    async fn test_subscribers_only_see_applied_actions() {
        let store = SessionStore::default();
        let mut rx = store.subscribe();

        assert!(store.dispatch(StoreAction::ToggleReference(item("A"))).is_err());
        assert!(!rx.has_changed().unwrap());

        store.dispatch(StoreAction::AppendMessage(Message::user("hi"))).unwrap();
        assert!(rx.has_changed().unwrap());
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().messages().len(), 1);
    }

    #[test]
    fn test_clones_share_state() {
        let store = SessionStore::default();
        let other = store.clone();
        other.dispatch(StoreAction::SetAnalysisMode(true)).unwrap();

        assert!(store.read(SessionState::analysis_mode));
        assert!(store.snapshot().analysis_mode());
    }
}
