//! Stack-based dialog engine for multi-turn conversational applications.
//!
//! Each inbound activity is one turn. The [`DialogManager`] loads scoped
//! state, drives a stack of [`Dialog`] activations (resuming the top frame or
//! beginning the root), persists state, and flushes outbound activities
//! through the host's [`ChannelAdapter`]. Dialogs suspend by returning
//! [`TurnResult::Waiting`]; no in-process continuation survives across turns.

mod adapter;
mod auth;
mod dialog;
mod error;
mod manager;
pub mod prompts;
mod state;
mod turn;

pub use adapter::ChannelAdapter;
pub use auth::UserTokenProvider;
pub use dialog::Dialog;
pub use dialog::DialogContext;
pub use dialog::DialogEvent;
pub use dialog::DialogInstance;
pub use dialog::DialogSet;
pub use dialog::DialogState;
pub use dialog::TurnResult;
pub use dialog::ERROR_EVENT;
pub use error::CoreError;
pub use error::Result;
pub use manager::DialogManager;
pub use manager::TurnOutcome;
pub use state::MemoryStore;
pub use state::ScopedState;
pub use state::StateScope;
pub use state::StateStore;
pub use turn::TurnContext;
