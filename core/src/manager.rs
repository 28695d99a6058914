use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use convo_protocol::Activity;
use serde_json::json;
use tracing::debug;
use tracing::error;
use tracing::warn;

use crate::adapter::ChannelAdapter;
use crate::auth::UserTokenProvider;
use crate::dialog::DialogContext;
use crate::dialog::DialogSet;
use crate::dialog::DialogState;
use crate::dialog::ERROR_EVENT;
use crate::dialog::TurnResult;
use crate::error::CoreError;
use crate::error::Result;
use crate::state::ScopedState;
use crate::state::StateScope;
use crate::state::StateStore;
use crate::turn::TurnContext;

/// Key under the conversation scope holding the serialized dialog stack.
const DIALOG_STATE_KEY: &str = "dialogs";
/// Name of the diagnostic trace activity emitted after each turn.
const SNAPSHOT_TRACE_NAME: &str = "memory/snapshot";

/// What one turn produced, after state was saved and outbound flushed.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub result: TurnResult,
    /// Stack depth at turn end, mostly useful to hosts for diagnostics.
    pub depth: usize,
}

/// The turn driver. For each inbound activity it loads scoped state, drives
/// the dialog stack (resuming the top frame or beginning the root), converts
/// uncaught dialog failures into a bubbled `error` event, saves state, emits
/// a scope-snapshot trace activity, and flushes outbound activities.
pub struct DialogManager {
    dialogs: DialogSet,
    root_id: String,
    store: Arc<dyn StateStore>,
    adapter: Arc<dyn ChannelAdapter>,
}

impl std::fmt::Debug for DialogManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogManager")
            .field("root_id", &self.root_id)
            .finish_non_exhaustive()
    }
}

impl DialogManager {
    pub fn new(
        dialogs: DialogSet,
        root_id: impl Into<String>,
        store: Arc<dyn StateStore>,
        adapter: Arc<dyn ChannelAdapter>,
    ) -> Result<Self> {
        let root_id = root_id.into();
        if dialogs.find(&root_id).is_none() {
            return Err(CoreError::MissingRootDialog);
        }
        Ok(Self {
            dialogs,
            root_id,
            store,
            adapter,
        })
    }

    /// Process one inbound activity. State changes from a turn that fails
    /// with an unconsumed error are not saved.
    pub async fn on_turn(
        &self,
        activity: Activity,
        token_provider: Option<Arc<dyn UserTokenProvider>>,
    ) -> Result<TurnOutcome> {
        let now = Utc::now();
        self.on_turn_at(activity, token_provider, now).await
    }

    /// [`Self::on_turn`] with an explicit turn-start instant. Timeout checks
    /// inside the turn compare against this value.
    pub async fn on_turn_at(
        &self,
        activity: Activity,
        token_provider: Option<Arc<dyn UserTokenProvider>>,
        now: DateTime<Utc>,
    ) -> Result<TurnOutcome> {
        let conversation_id = activity
            .conversation
            .as_ref()
            .map(|c| c.id.clone())
            .ok_or_else(|| CoreError::missing_field("conversation.id"))?;
        let user_id = activity
            .from
            .as_ref()
            .map(|a| a.id.clone())
            .ok_or_else(|| CoreError::missing_field("from.id"))?;

        let (conversation_key, user_key) =
            ScopedState::storage_keys(&activity.channel_id, &conversation_id, &user_id);
        let documents = self
            .store
            .read(&[conversation_key.clone(), user_key.clone()])
            .await?;
        let state = ScopedState::load(conversation_key, user_key, documents);
        debug!(%conversation_id, kind = %activity.kind, "turn started");

        let mut turn = TurnContext::new(activity, now, state, token_provider);
        let mut dialog_state: DialogState = turn
            .state
            .get(StateScope::Conversation, DIALOG_STATE_KEY)
            .cloned()
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default();

        let result = self
            .drive_stack(&mut dialog_state, &mut turn)
            .await;
        let result = match result {
            Ok(result) => result,
            Err(err) => {
                warn!(error = %err, "uncaught dialog failure, bubbling error event");
                let mut dc = DialogContext::new(&self.dialogs, &mut dialog_state, &mut turn);
                let payload = json!({ "message": err.to_string() });
                let consumed = dc
                    .emit_event(ERROR_EVENT, payload, true, true)
                    .await
                    .unwrap_or(false);
                if !consumed {
                    error!(error = %err, "error event not consumed; turn state discarded");
                    // Synchronous invoke replies already queued (e.g. the 502
                    // for an unsupported exchange) still go out; only state
                    // changes from the failed turn are dropped.
                    for activity in turn.take_outbound() {
                        self.adapter.send(activity).await?;
                    }
                    return Err(CoreError::DialogFailure {
                        dialog_id: dialog_state
                            .stack
                            .last()
                            .map(|f| f.dialog_id.clone())
                            .unwrap_or_else(|| self.root_id.clone()),
                        message: err.to_string(),
                    });
                }
                TurnResult::Waiting
            }
        };

        let depth = dialog_state.depth();
        turn.state.set(
            StateScope::Conversation,
            DIALOG_STATE_KEY,
            serde_json::to_value(&dialog_state).map_err(|e| CoreError::state(e.to_string()))?,
        );

        let snapshot = turn.state.snapshot();
        let outbound = turn.take_outbound();
        let inbound = turn.activity().clone();
        self.store.write(turn.state.into_changes(now)).await?;
        debug!(depth, "turn state saved");

        for activity in outbound {
            self.adapter.send(activity).await?;
        }
        let trace = Activity::trace(SNAPSHOT_TRACE_NAME, Some(snapshot)).as_reply_to(&inbound);
        self.adapter.send(trace).await?;

        Ok(TurnOutcome { result, depth })
    }

    /// Resume the active frame, or begin the root when the stack is empty.
    async fn drive_stack(
        &self,
        dialog_state: &mut DialogState,
        turn: &mut TurnContext,
    ) -> Result<TurnResult> {
        let mut dc = DialogContext::new(&self.dialogs, dialog_state, turn);
        match dc.continue_dialog().await? {
            TurnResult::Empty => dc.begin_dialog(&self.root_id, None).await,
            other => Ok(other),
        }
    }
}
