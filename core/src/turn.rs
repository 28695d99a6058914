use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use convo_protocol::Activity;
use serde_json::Value;

use crate::auth::UserTokenProvider;
use crate::error::CoreError;
use crate::error::Result;
use crate::state::ScopedState;

/// Everything a dialog may touch while handling one inbound activity.
///
/// `now` is captured once when the turn starts; all wall-clock decisions in
/// the turn (notably prompt timeouts) compare against it, which keeps them
/// deterministic under test.
pub struct TurnContext {
    activity: Activity,
    now: DateTime<Utc>,
    pub state: ScopedState,
    token_provider: Option<Arc<dyn UserTokenProvider>>,
    outbound: Vec<Activity>,
    responded: bool,
}

impl TurnContext {
    pub fn new(
        activity: Activity,
        now: DateTime<Utc>,
        state: ScopedState,
        token_provider: Option<Arc<dyn UserTokenProvider>>,
    ) -> Self {
        Self {
            activity,
            now,
            state,
            token_provider,
            outbound: Vec::new(),
            responded: false,
        }
    }

    pub fn activity(&self) -> &Activity {
        &self.activity
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn now_epoch_ms(&self) -> i64 {
        self.now.timestamp_millis()
    }

    pub fn token_provider(&self) -> Result<&Arc<dyn UserTokenProvider>> {
        self.token_provider
            .as_ref()
            .ok_or(CoreError::TokenProviderUnavailable)
    }

    /// The id of the user this turn is for, from the inbound activity.
    pub fn user_id(&self) -> Result<&str> {
        self.activity
            .from
            .as_ref()
            .map(|account| account.id.as_str())
            .ok_or_else(|| CoreError::missing_field("from.id"))
    }

    /// Whether anything has been sent on this turn yet. The OAuth prompt's
    /// retry rule keys off this.
    pub fn responded(&self) -> bool {
        self.responded
    }

    /// Queue an outbound activity, addressed as a reply to the inbound one.
    /// Delivery happens when the driver flushes at turn end.
    pub fn send_activity(&mut self, activity: Activity) {
        let reply = activity.as_reply_to(&self.activity);
        tracing::debug!(kind = %reply.kind, "queueing outbound activity");
        self.responded = true;
        self.outbound.push(reply);
    }

    /// Reply synchronously to the inbound invoke.
    pub fn send_invoke_response(&mut self, status: u16, body: Option<Value>) {
        self.send_activity(Activity::invoke_response(status, body));
    }

    pub fn take_outbound(&mut self) -> Vec<Activity> {
        std::mem::take(&mut self.outbound)
    }
}
