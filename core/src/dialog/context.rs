use std::sync::Arc;

use serde_json::Map;
use serde_json::Value;
use tracing::debug;

use crate::dialog::Dialog;
use crate::dialog::DialogEvent;
use crate::dialog::DialogInstance;
use crate::dialog::DialogSet;
use crate::dialog::DialogState;
use crate::dialog::TurnResult;
use crate::error::CoreError;
use crate::error::Result;
use crate::turn::TurnContext;

/// Borrowed view a dialog works through for the duration of one call:
/// the registry, the conversation's stack, and the turn context.
pub struct DialogContext<'a> {
    dialogs: &'a DialogSet,
    stack: &'a mut DialogState,
    pub turn: &'a mut TurnContext,
}

impl<'a> DialogContext<'a> {
    pub fn new(
        dialogs: &'a DialogSet,
        stack: &'a mut DialogState,
        turn: &'a mut TurnContext,
    ) -> Self {
        Self {
            dialogs,
            stack,
            turn,
        }
    }

    pub fn depth(&self) -> usize {
        self.stack.depth()
    }

    pub fn active_id(&self) -> Option<&str> {
        self.stack
            .stack
            .last()
            .map(|instance| instance.dialog_id.as_str())
    }

    /// Mutable access to the active activation's private state. Only the
    /// dialog currently being driven may use this.
    pub fn active_state_mut(&mut self) -> Result<&mut Map<String, Value>> {
        self.stack
            .stack
            .last_mut()
            .map(|instance| &mut instance.state)
            .ok_or(CoreError::EmptyStack)
    }

    fn resolve(&self, dialog_id: &str) -> Result<Arc<dyn Dialog>> {
        self.dialogs
            .find(dialog_id)
            .ok_or_else(|| CoreError::unknown_dialog(dialog_id))
    }

    /// Push a new activation of `dialog_id` with empty state and run its
    /// `begin`. If the dialog completes without waiting, the frame is popped
    /// before the value is returned to the caller.
    pub async fn begin_dialog(
        &mut self,
        dialog_id: &str,
        options: Option<Value>,
    ) -> Result<TurnResult> {
        let dialog = self.resolve(dialog_id)?;
        debug!(dialog_id, depth = self.stack.depth(), "beginning dialog");
        self.stack.stack.push(DialogInstance::new(dialog_id));
        match dialog.begin(self, options).await? {
            TurnResult::Complete(value) => {
                self.stack.stack.pop();
                debug!(dialog_id, "dialog completed during begin");
                Ok(TurnResult::Complete(value))
            }
            other => Ok(other),
        }
    }

    /// Drive the active activation with the current turn's inbound activity.
    /// Returns [`TurnResult::Empty`] when there is nothing to continue.
    pub async fn continue_dialog(&mut self) -> Result<TurnResult> {
        let Some(dialog_id) = self.active_id().map(str::to_string) else {
            return Ok(TurnResult::Empty);
        };
        let dialog = self.resolve(&dialog_id)?;
        debug!(%dialog_id, depth = self.stack.depth(), "continuing dialog");
        match dialog.continue_dialog(self).await? {
            TurnResult::Complete(value) => self.end_dialog(value).await,
            other => Ok(other),
        }
    }

    /// Pop the active activation and deliver `result` to each new top via
    /// `resume`, cascading pops until a frame keeps the turn or the stack
    /// empties (making `result` the turn's final value).
    pub async fn end_dialog(&mut self, result: Option<Value>) -> Result<TurnResult> {
        let mut value = result;
        loop {
            let Some(popped) = self.stack.stack.pop() else {
                return Err(CoreError::EmptyStack);
            };
            debug!(dialog_id = %popped.dialog_id, "ending dialog");
            let Some(parent_id) = self.active_id().map(str::to_string) else {
                return Ok(TurnResult::Complete(value));
            };
            let parent = self.resolve(&parent_id)?;
            match parent.resume(self, value).await? {
                TurnResult::Complete(next) => value = next,
                other => return Ok(other),
            }
        }
    }

    /// Pop the active activation without resuming the frame below, then
    /// begin `dialog_id` in its place.
    pub async fn replace_dialog(
        &mut self,
        dialog_id: &str,
        options: Option<Value>,
    ) -> Result<TurnResult> {
        self.stack.stack.pop();
        self.begin_dialog(dialog_id, options).await
    }

    /// Drop every activation; no results are delivered.
    pub fn cancel_all_dialogs(&mut self) {
        debug!(depth = self.stack.depth(), "cancelling all dialogs");
        self.stack.stack.clear();
    }

    /// Offer `event` to frames from the leaf toward the root, stopping at
    /// the first consumer. With `bubble` false only the starting frame sees
    /// it. `from_leaf` names the starting frame: the stack is flat (no
    /// nested containers), so the leaf and the raising frame coincide and
    /// traversal starts at the top either way.
    pub async fn emit_event(
        &mut self,
        name: &str,
        value: Value,
        bubble: bool,
        from_leaf: bool,
    ) -> Result<bool> {
        let _ = from_leaf;
        let event = DialogEvent {
            name: name.to_string(),
            value,
        };
        let mut index = self.stack.depth();
        while index > 0 {
            index -= 1;
            // Handlers may mutate the stack; re-check bounds each pass.
            if index >= self.stack.depth() {
                continue;
            }
            let dialog_id = self.stack.stack[index].dialog_id.clone();
            let dialog = self.resolve(&dialog_id)?;
            if dialog.on_event(self, &event).await? {
                debug!(name = %event.name, %dialog_id, "event consumed");
                return Ok(true);
            }
            if !bubble {
                break;
            }
        }
        debug!(name = %event.name, "event not consumed");
        Ok(false)
    }
}
