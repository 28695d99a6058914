//! External-authentication prompt.
//!
//! Completes through exactly one of three channel-dependent protocols (a
//! pushed token event, a numeric verification invoke, or a token-exchange
//! invoke) or the universal fallback of a six-digit "magic code" typed by
//! the user, all under one wall-clock deadline. Which protocol fires depends
//! on the channel and on what the user did, so every inbound turn classifies
//! against all four in priority order.

use std::sync::Arc;

use async_trait::async_trait;
use convo_protocol::Activity;
use convo_protocol::ActivityKind;
use convo_protocol::Attachment;
use convo_protocol::InputHint;
use convo_protocol::OAuthCard;
use convo_protocol::TokenExchangeInvokeRequest;
use convo_protocol::TokenExchangeInvokeResponse;
use convo_protocol::TokenResponse;
use convo_protocol::auth::OAUTH_CARD_CONTENT_TYPE;
use convo_protocol::auth::TOKEN_EXCHANGE_INVOKE;
use convo_protocol::auth::TOKEN_RESPONSE_EVENT;
use convo_protocol::auth::VERIFY_STATE_INVOKE;
use regex_lite::Regex;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use tracing::debug;
use tracing::warn;

use crate::dialog::Dialog;
use crate::dialog::DialogContext;
use crate::dialog::TurnResult;
use crate::error::CoreError;
use crate::error::Result;
use crate::turn::TurnContext;

/// Default sign-in deadline: fifteen minutes.
pub const DEFAULT_TIMEOUT_MS: i64 = 900_000;

#[derive(Debug, Clone)]
pub struct OAuthPromptSettings {
    /// Name of the provider connection to acquire a token for.
    pub connection_name: String,
    /// Button title on the generated login affordance.
    pub title: String,
    /// Body text on the generated login affordance.
    pub text: String,
    /// Wall-clock budget for the whole sign-in, in milliseconds.
    pub timeout_ms: i64,
}

impl OAuthPromptSettings {
    pub fn new(connection_name: impl Into<String>) -> Self {
        Self {
            connection_name: connection_name.into(),
            title: "Sign in".to_string(),
            text: "Please sign in".to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Caller-supplied prompt content, copied structurally into the prompt's
/// private state at begin time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<Activity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_prompt: Option<Activity>,
}

/// What the prompt persists between turns, under its own stack frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OAuthPromptState {
    options: PromptOptions,
    expires_at_epoch_ms: i64,
    attempt_count: u32,
    #[serde(default)]
    validator_state: Map<String, Value>,
}

/// Everything a validator sees for one attempt.
pub struct PromptValidatorContext<'a> {
    pub recognized: Option<&'a TokenResponse>,
    pub attempt_count: u32,
    pub options: &'a PromptOptions,
    pub validator_state: &'a mut Map<String, Value>,
}

/// Caller-supplied acceptance check. Without one, bare recognition success
/// completes the prompt.
#[async_trait]
pub trait PromptValidator: Send + Sync {
    async fn validate(&self, ctx: &mut PromptValidatorContext<'_>) -> Result<bool>;
}

pub struct OAuthPrompt {
    id: String,
    settings: OAuthPromptSettings,
    validator: Option<Arc<dyn PromptValidator>>,
}

impl OAuthPrompt {
    pub fn new(id: impl Into<String>, settings: OAuthPromptSettings) -> Self {
        Self {
            id: id.into(),
            settings,
            validator: None,
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn PromptValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Revoke the user's token for `connection_name`.
    pub async fn sign_out(turn: &TurnContext, connection_name: &str) -> Result<()> {
        let provider = turn.token_provider()?.clone();
        let user_id = turn.user_id()?.to_string();
        provider.sign_out_user(connection_name, &user_id).await
    }

    fn read_state(dc: &mut DialogContext<'_>) -> Result<OAuthPromptState> {
        let state = dc.active_state_mut()?;
        serde_json::from_value(Value::Object(state.clone()))
            .map_err(|e| CoreError::state(format!("corrupt oauth prompt state: {e}")))
    }

    fn write_state(dc: &mut DialogContext<'_>, state: &OAuthPromptState) -> Result<()> {
        let serialized = serde_json::to_value(state)
            .map_err(|e| CoreError::state(e.to_string()))?;
        let frame = dc.active_state_mut()?;
        if let Value::Object(map) = serialized {
            *frame = map;
        }
        Ok(())
    }

    /// Textual prompts must advertise that input is expected.
    fn normalize(options: &mut PromptOptions) {
        for prompt in [&mut options.prompt, &mut options.retry_prompt]
            .into_iter()
            .flatten()
        {
            if prompt.kind == ActivityKind::Message && prompt.input_hint.is_none() {
                prompt.input_hint = Some(InputHint::AcceptingInput);
            }
        }
    }

    /// Attempt a token lookup with no user action at all.
    async fn try_silent_token(&self, turn: &TurnContext) -> Result<Option<TokenResponse>> {
        let provider = turn.token_provider()?.clone();
        let user_id = turn.user_id()?.to_string();
        provider
            .get_user_token(
                &self.settings.connection_name,
                &user_id,
                &turn.activity().channel_id,
                None,
            )
            .await
    }

    /// Send the login affordance, building an OAuth card from the provider's
    /// sign-in resource unless the caller's prompt already carries one.
    async fn send_sign_in(&self, turn: &mut TurnContext, options: &PromptOptions) -> Result<()> {
        let mut prompt = options
            .prompt
            .clone()
            .unwrap_or_else(|| Activity::message(self.settings.text.clone()));
        prompt.input_hint.get_or_insert(InputHint::AcceptingInput);

        let already_carded = prompt
            .attachments
            .iter()
            .any(|a| a.content_type == OAUTH_CARD_CONTENT_TYPE);
        if !already_carded {
            let provider = turn.token_provider()?.clone();
            let user_id = turn.user_id()?.to_string();
            let resource = provider
                .get_sign_in_resource(&self.settings.connection_name, &user_id)
                .await?;
            let card = OAuthCard::from_sign_in_resource(
                &self.settings.connection_name,
                &self.settings.title,
                &self.settings.text,
                &resource,
            );
            prompt.attachments.push(Attachment {
                content_type: OAUTH_CARD_CONTENT_TYPE.to_string(),
                content: serde_json::to_value(card)
                    .map_err(|e| CoreError::state(e.to_string()))?,
            });
        }
        turn.send_activity(prompt);
        Ok(())
    }

    /// Classify the inbound activity into at most one of the four
    /// recognition paths and run it. `Ok(None)` means no token this turn;
    /// invoke paths reply synchronously as a side effect.
    async fn recognize_token(&self, turn: &mut TurnContext) -> Result<Option<TokenResponse>> {
        let activity = turn.activity().clone();
        if activity.is_event_named(TOKEN_RESPONSE_EVENT) {
            debug!("token received via channel event");
            return Ok(activity
                .value
                .and_then(|value| serde_json::from_value(value).ok()));
        }
        if activity.is_invoke_named(VERIFY_STATE_INVOKE) {
            return self.verify_state(turn, &activity).await;
        }
        if activity.is_invoke_named(TOKEN_EXCHANGE_INVOKE) {
            return self.exchange(turn, &activity).await;
        }
        if activity.is_message()
            && let Some(code) = activity.text.as_deref().and_then(extract_magic_code)
        {
            debug!("six-digit code found in message text");
            let provider = turn.token_provider()?.clone();
            let user_id = turn.user_id()?.to_string();
            return provider
                .get_user_token(
                    &self.settings.connection_name,
                    &user_id,
                    &activity.channel_id,
                    Some(code.as_str()),
                )
                .await;
        }
        Ok(None)
    }

    /// Numeric verification handshake. Provider failures are fully handled
    /// here: the invoke gets a 500 reply and nothing propagates.
    async fn verify_state(
        &self,
        turn: &mut TurnContext,
        activity: &Activity,
    ) -> Result<Option<TokenResponse>> {
        let code = activity
            .value
            .as_ref()
            .and_then(|value| value.get("state"))
            .map(|state| match state {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            });
        let Some(code) = code else {
            turn.send_invoke_response(404, None);
            return Ok(None);
        };
        let provider = turn.token_provider()?.clone();
        let user_id = turn.user_id()?.to_string();
        match provider
            .get_user_token(
                &self.settings.connection_name,
                &user_id,
                &activity.channel_id,
                Some(code.as_str()),
            )
            .await
        {
            Ok(Some(token)) => {
                turn.send_invoke_response(200, None);
                Ok(Some(token))
            }
            Ok(None) => {
                turn.send_invoke_response(404, None);
                Ok(None)
            }
            Err(err) => {
                warn!(error = %err, "verification-code token lookup failed");
                turn.send_invoke_response(500, None);
                Ok(None)
            }
        }
    }

    /// Token-exchange handshake for SSO-capable channels.
    async fn exchange(
        &self,
        turn: &mut TurnContext,
        activity: &Activity,
    ) -> Result<Option<TokenResponse>> {
        let request: TokenExchangeInvokeRequest = activity
            .value
            .clone()
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or(TokenExchangeInvokeRequest {
                id: None,
                connection_name: String::new(),
                token: None,
            });

        let Some(token) = request.token.filter(|t| !t.is_empty()) else {
            self.exchange_reply(
                turn,
                400,
                request.id,
                Some("The token exchange invoke is missing a 'token' value".to_string()),
            );
            return Ok(None);
        };
        if request.connection_name != self.settings.connection_name {
            self.exchange_reply(
                turn,
                400,
                request.id,
                Some(format!(
                    "The token exchange invoke's connection name '{}' does not match the expected connection name '{}'",
                    request.connection_name, self.settings.connection_name
                )),
            );
            return Ok(None);
        }

        let provider = turn.token_provider()?.clone();
        if !provider.supports_token_exchange() {
            self.exchange_reply(
                turn,
                502,
                request.id,
                Some("The adapter does not support token exchange".to_string()),
            );
            return Err(CoreError::ExchangeNotSupported {
                connection_name: self.settings.connection_name.clone(),
            });
        }

        let user_id = turn.user_id()?.to_string();
        match provider
            .exchange_token(&self.settings.connection_name, &user_id, &token)
            .await
        {
            Ok(Some(exchanged)) => {
                self.exchange_reply(turn, 200, request.id, None);
                Ok(Some(exchanged))
            }
            Ok(None) => {
                self.exchange_reply(
                    turn,
                    409,
                    request.id,
                    Some(
                        "The bot is unable to exchange the token; proceed with regular login"
                            .to_string(),
                    ),
                );
                Ok(None)
            }
            Err(err) => {
                warn!(error = %err, "token exchange failed at the provider");
                self.exchange_reply(
                    turn,
                    409,
                    request.id,
                    Some(
                        "The bot is unable to exchange the token; proceed with regular login"
                            .to_string(),
                    ),
                );
                Ok(None)
            }
        }
    }

    fn exchange_reply(
        &self,
        turn: &mut TurnContext,
        status: u16,
        id: Option<String>,
        failure_detail: Option<String>,
    ) {
        let body = TokenExchangeInvokeResponse {
            id,
            connection_name: self.settings.connection_name.clone(),
            failure_detail,
        };
        turn.send_invoke_response(status, serde_json::to_value(body).ok());
    }
}

#[async_trait]
impl Dialog for OAuthPrompt {
    fn id(&self) -> &str {
        &self.id
    }

    async fn begin(
        &self,
        dc: &mut DialogContext<'_>,
        options: Option<Value>,
    ) -> Result<TurnResult> {
        let mut options: PromptOptions = options
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default();
        Self::normalize(&mut options);

        let state = OAuthPromptState {
            options,
            expires_at_epoch_ms: dc.turn.now_epoch_ms() + self.settings.timeout_ms,
            attempt_count: 0,
            validator_state: Map::new(),
        };
        Self::write_state(dc, &state)?;

        // Completes in a single turn when the provider already holds a
        // token; no card is ever sent in that case.
        if let Some(token) = self.try_silent_token(dc.turn).await? {
            debug!(connection = %self.settings.connection_name, "silent sign-in succeeded");
            let value =
                serde_json::to_value(token).map_err(|e| CoreError::state(e.to_string()))?;
            return Ok(TurnResult::Complete(Some(value)));
        }

        self.send_sign_in(dc.turn, &state.options).await?;
        Ok(TurnResult::Waiting)
    }

    async fn continue_dialog(&self, dc: &mut DialogContext<'_>) -> Result<TurnResult> {
        let mut state = Self::read_state(dc)?;
        let is_message = dc.turn.activity().is_message();

        // Only plain messages can time the prompt out; invoke and event
        // traffic may arrive mid-exchange and must still be answered.
        if is_message && dc.turn.now_epoch_ms() > state.expires_at_epoch_ms {
            debug!("sign-in deadline passed; completing with no token");
            return Ok(TurnResult::Complete(None));
        }

        let recognized = self.recognize_token(dc.turn).await?;

        state.attempt_count += 1;
        let accepted = match &self.validator {
            Some(validator) => {
                let mut ctx = PromptValidatorContext {
                    recognized: recognized.as_ref(),
                    attempt_count: state.attempt_count,
                    options: &state.options,
                    validator_state: &mut state.validator_state,
                };
                validator.validate(&mut ctx).await?
            }
            None => recognized.is_some(),
        };

        if accepted {
            let value = recognized
                .map(serde_json::to_value)
                .transpose()
                .map_err(|e| CoreError::state(e.to_string()))?;
            return Ok(TurnResult::Complete(value));
        }

        // Re-prompt only under this exact conjunction; relaxing any clause
        // changes user-visible retry behavior.
        if is_message
            && !dc.turn.responded()
            && let Some(retry) = state.options.retry_prompt.clone()
        {
            dc.turn.send_activity(retry);
        }

        Self::write_state(dc, &state)?;
        Ok(TurnResult::Waiting)
    }
}

fn extract_magic_code(text: &str) -> Option<String> {
    let re = Regex::new(r"(\d{6})").ok()?;
    re.find(text).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn magic_code_is_first_six_digit_run() {
        assert_eq!(extract_magic_code("Your code is 482913"), Some("482913".to_string()));
        assert_eq!(extract_magic_code("12345"), None);
        assert_eq!(extract_magic_code("1234567"), Some("123456".to_string()));
        assert_eq!(extract_magic_code("no digits here"), None);
    }

    #[test]
    fn normalize_adds_accepting_input_to_textual_prompts() {
        let mut options = PromptOptions {
            prompt: Some(Activity::message("sign in")),
            retry_prompt: Some(Activity::message("try again")),
        };
        OAuthPrompt::normalize(&mut options);
        assert_eq!(
            options.prompt.and_then(|p| p.input_hint),
            Some(InputHint::AcceptingInput)
        );
        assert_eq!(
            options.retry_prompt.and_then(|p| p.input_hint),
            Some(InputHint::AcceptingInput)
        );
    }
}
