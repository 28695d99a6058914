use std::collections::HashMap;

use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::Utc;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateScope {
    /// Lives for the current turn only; never persisted.
    Turn,
    Conversation,
    User,
}

/// The three scope maps resolved for one turn.
///
/// Loaded from the [`crate::StateStore`] at turn start and handed back to it
/// at turn end; components read and write through `get`/`set`/`clear` and
/// never touch the store directly mid-turn.
#[derive(Debug, Default)]
pub struct ScopedState {
    turn: Map<String, Value>,
    conversation: Map<String, Value>,
    user: Map<String, Value>,
    conversation_key: String,
    user_key: String,
}

impl ScopedState {
    pub fn storage_keys(channel_id: &str, conversation_id: &str, user_id: &str) -> (String, String) {
        (
            format!("{channel_id}/conversations/{conversation_id}"),
            format!("{channel_id}/users/{user_id}"),
        )
    }

    pub fn load(
        conversation_key: String,
        user_key: String,
        mut documents: HashMap<String, Value>,
    ) -> Self {
        let take_object = |doc: Option<Value>| match doc {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        Self {
            turn: Map::new(),
            conversation: take_object(documents.remove(&conversation_key)),
            user: take_object(documents.remove(&user_key)),
            conversation_key,
            user_key,
        }
    }

    fn scope(&self, scope: StateScope) -> &Map<String, Value> {
        match scope {
            StateScope::Turn => &self.turn,
            StateScope::Conversation => &self.conversation,
            StateScope::User => &self.user,
        }
    }

    fn scope_mut(&mut self, scope: StateScope) -> &mut Map<String, Value> {
        match scope {
            StateScope::Turn => &mut self.turn,
            StateScope::Conversation => &mut self.conversation,
            StateScope::User => &mut self.user,
        }
    }

    pub fn get(&self, scope: StateScope, key: &str) -> Option<&Value> {
        self.scope(scope).get(key)
    }

    pub fn set(&mut self, scope: StateScope, key: impl Into<String>, value: Value) {
        self.scope_mut(scope).insert(key.into(), value);
    }

    pub fn clear(&mut self, scope: StateScope, key: &str) {
        self.scope_mut(scope).remove(key);
    }

    /// Produce the write set for turn end, stamping the conversation's
    /// last-access time. The turn scope is intentionally absent.
    pub fn into_changes(mut self, now: DateTime<Utc>) -> HashMap<String, Value> {
        self.conversation.insert(
            "lastAccess".to_string(),
            json!(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        HashMap::from([
            (self.conversation_key, Value::Object(self.conversation)),
            (self.user_key, Value::Object(self.user)),
        ])
    }

    /// Full resolved-scope snapshot for the diagnostic trace activity.
    pub fn snapshot(&self) -> Value {
        json!({
            "turn": Value::Object(self.turn.clone()),
            "conversation": Value::Object(self.conversation.clone()),
            "user": Value::Object(self.user.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    #[expect(clippy::unwrap_used)]
    fn turn_scope_is_not_persisted() {
        let (conv_key, user_key) = ScopedState::storage_keys("test", "conv1", "user1");
        let mut state = ScopedState::load(conv_key.clone(), user_key, HashMap::new());
        state.set(StateScope::Turn, "scratch", json!(1));
        state.set(StateScope::Conversation, "count", json!(2));

        let now = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let changes = state.into_changes(now);
        let conversation = &changes[&conv_key];
        assert_eq!(conversation["count"], json!(2));
        assert_eq!(conversation["lastAccess"], json!("2026-01-02T03:04:05.000Z"));
        assert_eq!(conversation.get("scratch"), None);
    }

    #[test]
    fn clear_removes_a_key_from_one_scope_only() {
        let (conv_key, user_key) = ScopedState::storage_keys("test", "conv1", "user1");
        let mut state = ScopedState::load(conv_key, user_key, HashMap::new());
        state.set(StateScope::User, "name", json!("pat"));
        state.set(StateScope::Conversation, "name", json!("thread"));

        state.clear(StateScope::User, "name");
        assert_eq!(state.get(StateScope::User, "name"), None);
        assert_eq!(
            state.get(StateScope::Conversation, "name"),
            Some(&json!("thread"))
        );
    }

    #[test]
    fn load_tolerates_non_object_documents() {
        let (conv_key, user_key) = ScopedState::storage_keys("test", "conv1", "user1");
        let docs = HashMap::from([(conv_key.clone(), json!("corrupt"))]);
        let state = ScopedState::load(conv_key, user_key, docs);
        assert_eq!(state.get(StateScope::Conversation, "anything"), None);
    }
}
