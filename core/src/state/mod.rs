//! Scoped key/value persistence.
//!
//! Three lifetimes: turn (in-memory only), conversation, and user. The
//! conversation and user scopes are loaded once at turn start and written
//! once at turn end; that load/save pair is the conversation's
//! mutual-exclusion boundary (see [`crate::DialogManager`]).

mod scopes;
mod store;

pub use scopes::ScopedState;
pub use scopes::StateScope;
pub use store::MemoryStore;
pub use store::StateStore;
