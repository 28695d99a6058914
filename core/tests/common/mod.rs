#![allow(dead_code)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::TimeZone;
use chrono::Utc;
use convo_core::ChannelAdapter;
use convo_core::CoreError;
use convo_core::Dialog;
use convo_core::DialogManager;
use convo_core::DialogSet;
use convo_core::MemoryStore;
use convo_core::Result;
use convo_core::TurnOutcome;
use convo_core::UserTokenProvider;
use convo_protocol::Activity;
use convo_protocol::ActivityKind;
use convo_protocol::ChannelAccount;
use convo_protocol::ConversationAccount;
use convo_protocol::InvokeResponseBody;
use convo_protocol::SignInResource;
use convo_protocol::TokenResponse;
use convo_protocol::auth::OAUTH_CARD_CONTENT_TYPE;
use serde_json::Value;

pub const CHANNEL_ID: &str = "test";
pub const USER_ID: &str = "user1";
pub const CONVERSATION_ID: &str = "conv1";

/// Fixed turn-zero instant; tests express time as offsets from this.
pub fn turn_zero() -> DateTime<Utc> {
    Utc.timestamp_millis_opt(1_700_000_000_000).single().expect("valid instant")
}

pub fn token(connection_name: &str) -> TokenResponse {
    TokenResponse {
        channel_id: CHANNEL_ID.to_string(),
        connection_name: connection_name.to_string(),
        token: "secret-token".to_string(),
        expiration: None,
    }
}

fn addressed(mut activity: Activity) -> Activity {
    activity.channel_id = CHANNEL_ID.to_string();
    activity.conversation = Some(ConversationAccount::new(CONVERSATION_ID));
    activity.from = Some(ChannelAccount::new(USER_ID));
    activity.recipient = Some(ChannelAccount::new("bot"));
    activity
}

pub fn message(text: &str) -> Activity {
    addressed(Activity::message(text))
}

pub fn event(name: &str, value: Value) -> Activity {
    addressed(Activity::event(name, Some(value)))
}

pub fn invoke(name: &str, value: Value) -> Activity {
    addressed(Activity::invoke(name, Some(value)))
}

/// Scripted token provider; every call is logged for exclusivity assertions.
#[derive(Default)]
pub struct MockTokenProvider {
    pub silent_token: Option<TokenResponse>,
    pub code_tokens: HashMap<String, TokenResponse>,
    pub exchange_result: Option<TokenResponse>,
    pub supports_exchange: bool,
    pub fail_code_lookup: bool,
    pub calls: Mutex<Vec<String>>,
}

impl MockTokenProvider {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn log(&self, call: impl Into<String>) {
        self.calls.lock().expect("calls lock").push(call.into());
    }
}

#[async_trait]
impl UserTokenProvider for MockTokenProvider {
    async fn get_user_token(
        &self,
        _connection_name: &str,
        _user_id: &str,
        _channel_id: &str,
        code: Option<&str>,
    ) -> Result<Option<TokenResponse>> {
        match code {
            None => {
                self.log("get_user_token(silent)");
                Ok(self.silent_token.clone())
            }
            Some(code) => {
                self.log(format!("get_user_token({code})"));
                if self.fail_code_lookup {
                    return Err(CoreError::provider("token service unreachable"));
                }
                Ok(self.code_tokens.get(code).cloned())
            }
        }
    }

    async fn get_sign_in_resource(
        &self,
        _connection_name: &str,
        _user_id: &str,
    ) -> Result<SignInResource> {
        self.log("get_sign_in_resource");
        Ok(SignInResource {
            sign_in_link: "https://login.contoso.test/auth".to_string(),
            token_exchange_resource: None,
            metadata: Value::Null,
        })
    }

    async fn exchange_token(
        &self,
        _connection_name: &str,
        _user_id: &str,
        _token: &str,
    ) -> Result<Option<TokenResponse>> {
        self.log("exchange_token");
        Ok(self.exchange_result.clone())
    }

    async fn sign_out_user(&self, _connection_name: &str, _user_id: &str) -> Result<()> {
        self.log("sign_out_user");
        Ok(())
    }

    fn supports_token_exchange(&self) -> bool {
        self.supports_exchange
    }
}

/// Collects everything the driver flushes, in order.
#[derive(Default)]
pub struct CapturingAdapter {
    pub sent: Mutex<Vec<Activity>>,
}

impl CapturingAdapter {
    pub fn sent(&self) -> Vec<Activity> {
        self.sent.lock().expect("sent lock").clone()
    }

    pub fn invoke_responses(&self) -> Vec<InvokeResponseBody> {
        self.sent()
            .into_iter()
            .filter(|a| a.kind == ActivityKind::InvokeResponse)
            .filter_map(|a| a.value.and_then(|v| serde_json::from_value(v).ok()))
            .collect()
    }

    pub fn oauth_card_count(&self) -> usize {
        self.sent()
            .iter()
            .flat_map(|a| a.attachments.iter())
            .filter(|att| att.content_type == OAUTH_CARD_CONTENT_TYPE)
            .count()
    }

    pub fn message_texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|a| a.kind == ActivityKind::Message)
            .filter_map(|a| a.text)
            .collect()
    }
}

#[async_trait]
impl ChannelAdapter for CapturingAdapter {
    async fn send(&self, activity: Activity) -> Result<()> {
        self.sent.lock().expect("sent lock").push(activity);
        Ok(())
    }
}

/// One conversation wired to a manager, a scripted provider, and a capturing
/// adapter, with time expressed as offsets from [`turn_zero`].
pub struct Harness {
    pub manager: DialogManager,
    pub provider: Arc<MockTokenProvider>,
    pub adapter: Arc<CapturingAdapter>,
    pub store: Arc<MemoryStore>,
}

impl Harness {
    pub fn new(dialogs: DialogSet, root_id: &str, provider: MockTokenProvider) -> Self {
        let store = Arc::new(MemoryStore::new());
        let adapter = Arc::new(CapturingAdapter::default());
        let manager = DialogManager::new(dialogs, root_id, store.clone(), adapter.clone())
            .expect("root dialog registered");
        Self {
            manager,
            provider: Arc::new(provider),
            adapter,
            store,
        }
    }

    pub fn with_root(root: Arc<dyn Dialog>, provider: MockTokenProvider) -> Self {
        let root_id = root.id().to_string();
        let mut dialogs = DialogSet::new();
        dialogs.add(root);
        Self::new(dialogs, &root_id, provider)
    }

    /// Run one turn `offset_ms` after turn zero.
    pub async fn turn_at(&self, activity: Activity, offset_ms: i64) -> Result<TurnOutcome> {
        self.manager
            .on_turn_at(
                activity,
                Some(self.provider.clone()),
                turn_zero() + chrono::Duration::milliseconds(offset_ms),
            )
            .await
    }
}
