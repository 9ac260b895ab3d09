//! Session state: message model, state shape and the shared store.

mod message;
mod state;
mod store;

pub use message::{Message, MessageKind, ReferenceItem, Role};
pub use state::{SearchState, SearchStatus, SessionState, TurnStatus};
pub use store::{ActionRejected, SessionStore, StoreAction, reduce};
