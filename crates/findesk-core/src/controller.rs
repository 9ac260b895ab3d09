//! Turn orchestration.
//!
//! A turn runs `Idle → Sending → Streaming → Idle`, or detours through `Error`
//! when the generation call fails. Whatever happens, including the turn future
//! being dropped, the status is back at `Idle` when `send` returns.

use futures_util::StreamExt;

use crate::client::Generator;
use crate::context::{self, OutgoingPayload};
use crate::error::{NotAllowed, SendRejected, TURN_ERROR_TEXT, TransportError};
use crate::prompts::analyze_request;
use crate::search::{NewsSearch, SearchOutcome, SearchRejected};
use crate::session::{
    ActionRejected, Message, ReferenceItem, SessionState, SessionStore, StoreAction, TurnStatus,
};

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The stream ended normally after `fragments` fragments.
    Completed { fragments: usize },
    /// The call failed. `partial` is true when some output had already been
    /// streamed and was kept above the error entry.
    Failed {
        error: TransportError,
        partial: bool,
    },
}

/// Result of a successful reference toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Selected,
    Deselected,
}

/// Transient notice text for a rejected toggle.
pub fn notice_for(rejected: NotAllowed) -> &'static str {
    rejected.notice()
}

/// Drives turns and user actions against a shared [`SessionStore`].
pub struct SessionController<G> {
    store: SessionStore,
    generator: G,
}

impl<G: Generator> SessionController<G> {
    pub fn new(store: SessionStore, generator: G) -> Self {
        Self { store, generator }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Runs one conversational turn.
    ///
    /// Blank text and sends during another turn are rejected before anything
    /// is logged or sent.
    pub async fn send(&self, text: &str) -> Result<TurnOutcome, SendRejected> {
        if text.trim().is_empty() {
            return Err(SendRejected::Blank);
        }

        // Check-and-set in one reducer step
        self.store.dispatch(StoreAction::BeginTurn).map_err(|rejected| {
            tracing::debug!(%rejected, "send rejected");
            SendRejected::TurnInProgress
        })?;
        let guard = TurnGuard::new(&self.store);

        let (history, analysis_mode, selected) = self.store.read(|state| {
            (
                state.messages().to_vec(),
                state.analysis_mode(),
                state.selected_references().to_vec(),
            )
        });
        self.apply(StoreAction::AppendMessage(Message::user(text)));

        let payload = context::build(&history, text, analysis_mode, &selected);
        tracing::info!(
            window = payload.messages.len(),
            is_report = payload.is_report,
            references = selected.len(),
            "turn started"
        );

        self.apply(StoreAction::AppendMessage(Message::placeholder(
            payload.is_report,
        )));
        self.apply(StoreAction::SetTurnStatus(TurnStatus::Streaming));

        let outcome = match self.stream_reply(&payload).await {
            Ok(fragments) => {
                tracing::info!(fragments, "turn completed");
                TurnOutcome::Completed { fragments }
            }
            Err(error) => {
                tracing::warn!(kind = %error.kind, error = %error, "turn failed");
                let partial = self.record_failure();
                self.apply(StoreAction::SetTurnStatus(TurnStatus::Error));
                TurnOutcome::Failed { error, partial }
            }
        };

        guard.finish();
        Ok(outcome)
    }

    /// Quick analysis of a single article: selects only `item`, turns analysis
    /// mode on and asks for a summary with implications.
    pub async fn analyze(&self, item: ReferenceItem) -> Result<TurnOutcome, SendRejected> {
        let request = analyze_request(&item.display_title());
        self.store
            .dispatch(StoreAction::SelectOnly(item))
            .map_err(|rejected| {
                tracing::debug!(%rejected, "quick analysis rejected");
                SendRejected::TurnInProgress
            })?;
        self.send(&request).await
    }

    pub fn set_analysis_mode(&self, on: bool) {
        self.apply(StoreAction::SetAnalysisMode(on));
    }

    /// Adds or removes `item` from the selection. Only allowed in analysis mode.
    pub fn toggle_reference(&self, item: ReferenceItem) -> Result<ToggleOutcome, NotAllowed> {
        let link = item.link.clone();
        self.store
            .dispatch(StoreAction::ToggleReference(item))
            .map_err(|rejected| {
                tracing::debug!(%rejected, %link, "reference toggle rejected");
                NotAllowed
            })?;

        if self.store.read(|state| state.is_selected(&link)) {
            Ok(ToggleOutcome::Selected)
        } else {
            Ok(ToggleOutcome::Deselected)
        }
    }

    /// Runs a news search and caches the classified result.
    ///
    /// Starting a search clears the current selection.
    pub async fn search(
        &self,
        client: &NewsSearch,
        query: &str,
    ) -> Result<SearchOutcome, SearchRejected> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchRejected::Blank);
        }

        self.store
            .dispatch(StoreAction::BeginSearch(query.to_string()))
            .map_err(|rejected| {
                tracing::debug!(%rejected, "search rejected");
                SearchRejected::InProgress
            })?;
        let guard = SearchGuard::new(&self.store);

        let (outcome, results) = SearchOutcome::classify(client.search(query).await);
        match &outcome {
            SearchOutcome::Failed(detail) => {
                tracing::warn!(%query, %detail, "news search failed");
            }
            other => tracing::info!(%query, outcome = ?other, "news search finished"),
        }

        self.apply(StoreAction::FinishSearch {
            outcome: outcome.clone(),
            results,
        });
        guard.disarm();
        Ok(outcome)
    }

    async fn stream_reply(&self, payload: &OutgoingPayload) -> Result<usize, TransportError> {
        let mut fragments = self.generator.open(payload).await?;

        let mut received = 0;
        while let Some(next) = fragments.next().await {
            self.apply(StoreAction::AppendToLast(next?));
            received += 1;
        }

        Ok(received)
    }

    fn record_failure(&self) -> bool {
        record_failure(&self.store)
    }

    fn apply(&self, action: StoreAction) {
        apply(&self.store, action);
    }
}

/// Writes the fixed error text into the log. Returns whether streamed
/// output was kept above it.
fn record_failure(store: &SessionStore) -> bool {
    let placeholder_empty = store.read(|state| {
        state
            .last_message()
            .is_some_and(|m| m.is_assistant() && m.content().is_empty())
    });

    let error_entry = Message::assistant(TURN_ERROR_TEXT, false);
    if placeholder_empty {
        apply(store, StoreAction::ReplaceLastMessage(error_entry));
    } else {
        apply(store, StoreAction::AppendMessage(error_entry));
    }
    !placeholder_empty
}

fn apply(store: &SessionStore, action: StoreAction) {
    if let Err(rejected) = store.dispatch(action) {
        log_rejected(rejected);
    }
}

fn log_rejected(rejected: ActionRejected) {
    tracing::warn!(%rejected, "session action rejected");
}

/// Settles the turn when dropped.
///
/// The status always returns to `Idle`. A turn dropped before `finish` is
/// abandoned mid-flight and gets the error entry like a failed one.
struct TurnGuard<'a> {
    store: &'a SessionStore,
    finished: bool,
}

impl<'a> TurnGuard<'a> {
    fn new(store: &'a SessionStore) -> Self {
        Self {
            store,
            finished: false,
        }
    }

    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        let status = self.store.read(SessionState::turn_status);
        if !self.finished && status.is_in_flight() {
            tracing::warn!(%status, "turn abandoned");
            record_failure(self.store);
        }
        if status != TurnStatus::Idle {
            apply(self.store, StoreAction::SetTurnStatus(TurnStatus::Idle));
        }
    }
}

/// Marks an abandoned search as failed so the panel never stays loading.
struct SearchGuard<'a> {
    store: &'a SessionStore,
    armed: bool,
}

impl<'a> SearchGuard<'a> {
    fn new(store: &'a SessionStore) -> Self {
        Self { store, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for SearchGuard<'_> {
    fn drop(&mut self) {
        if !self.armed || !self.store.read(|state| state.search().is_loading()) {
            return;
        }
        if let Err(rejected) = self.store.dispatch(StoreAction::FinishSearch {
            outcome: SearchOutcome::Failed("search abandoned".to_string()),
            results: Vec::new(),
        }) {
            log_rejected(rejected);
        }
    }
}
