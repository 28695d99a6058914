//! The dialog abstraction and the stack that schedules it.

mod context;
mod stack;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

pub use context::DialogContext;
pub use stack::DialogInstance;
pub use stack::DialogState;

use crate::error::Result;

/// Event name the turn driver uses for uncaught dialog failures.
pub const ERROR_EVENT: &str = "error";

/// Outcome of driving a dialog (or the whole stack) for one turn.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnResult {
    /// The turn is consumed; the dialog suspends until the next inbound
    /// activity. State is persisted, no continuation is kept alive.
    Waiting,
    /// The dialog finished. The value flows to the frame below it, or
    /// becomes the turn's final result once the stack is empty.
    Complete(Option<Value>),
    /// No active dialog; the driver must begin the root.
    Empty,
}

/// A named event travelling up the stack from the active frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogEvent {
    pub name: String,
    pub value: Value,
}

/// A resumable unit of conversational logic.
///
/// `begin` runs exactly once per activation, immediately after the frame is
/// pushed with empty private state. `continue_dialog` runs on every later
/// turn while the activation is on top. Both may send outbound activities
/// through the turn context and may read or write only their own frame's
/// state (via [`DialogContext::active_state_mut`]).
#[async_trait]
pub trait Dialog: Send + Sync {
    fn id(&self) -> &str;

    async fn begin(
        &self,
        dc: &mut DialogContext<'_>,
        options: Option<Value>,
    ) -> Result<TurnResult>;

    async fn continue_dialog(&self, dc: &mut DialogContext<'_>) -> Result<TurnResult> {
        let _ = dc;
        Ok(TurnResult::Waiting)
    }

    /// Called when a child activation completes while this frame is beneath
    /// it, delivering the child's result. The default cascades: this frame
    /// completes with the same value.
    async fn resume(
        &self,
        dc: &mut DialogContext<'_>,
        result: Option<Value>,
    ) -> Result<TurnResult> {
        let _ = dc;
        Ok(TurnResult::Complete(result))
    }

    /// Offered each event bubbling up the stack; return `true` to consume it.
    async fn on_event(&self, dc: &mut DialogContext<'_>, event: &DialogEvent) -> Result<bool> {
        let _ = (dc, event);
        Ok(false)
    }
}

/// Flat registry resolving dialog ids to implementations. Frames hold ids,
/// never live references, so the stack serializes as `id + state` per frame.
#[derive(Default)]
pub struct DialogSet {
    dialogs: HashMap<String, Arc<dyn Dialog>>,
}

impl DialogSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, dialog: Arc<dyn Dialog>) -> &mut Self {
        self.dialogs.insert(dialog.id().to_string(), dialog);
        self
    }

    pub fn find(&self, dialog_id: &str) -> Option<Arc<dyn Dialog>> {
        self.dialogs.get(dialog_id).cloned()
    }
}
