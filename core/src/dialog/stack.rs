use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

/// One activation of a dialog on the stack.
///
/// `state` is owned exclusively by that activation: created empty at push,
/// dropped at pop, never read by siblings or by the engine itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogInstance {
    #[serde(rename = "dialogId")]
    pub dialog_id: String,
    #[serde(default)]
    pub state: Map<String, Value>,
}

impl DialogInstance {
    pub fn new(dialog_id: impl Into<String>) -> Self {
        Self {
            dialog_id: dialog_id.into(),
            state: Map::new(),
        }
    }
}

/// The persisted dialog stack for one conversation; the last element is the
/// active activation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DialogState {
    #[serde(default)]
    pub stack: Vec<DialogInstance>,
}

impl DialogState {
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}
