//! Wire types for the external-authentication sub-protocol.
//!
//! Field names follow the shapes channels and token services actually put on
//! the wire (camelCase), independent of how a host persists them.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// Event name used by channels that push a token to the bot directly.
pub const TOKEN_RESPONSE_EVENT: &str = "tokens/response";
/// Invoke name for the numeric verification-code handshake.
pub const VERIFY_STATE_INVOKE: &str = "signin/verifyState";
/// Invoke name for the single-sign-on token-exchange handshake.
pub const TOKEN_EXCHANGE_INVOKE: &str = "signin/tokenExchange";

/// Attachment content type identifying a login affordance.
pub const OAUTH_CARD_CONTENT_TYPE: &str = "application/vnd.convo.card.oauth";

/// A token issued by the authentication provider for one connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    #[serde(default)]
    pub channel_id: String,
    pub connection_name: String,
    pub token: String,
    /// ISO-8601 expiration, when the provider reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration: Option<String>,
}

/// Provider-side resource a channel uses to perform token exchange on the
/// user's behalf.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenExchangeResource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
}

/// Descriptor returned by the provider from which a login affordance is
/// built. Owned by the provider; the engine treats it as read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResource {
    pub sign_in_link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_exchange_resource: Option<TokenExchangeResource>,
    /// Provider-specific metadata, passed through untouched.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub metadata: Value,
}

/// Body of a `signin/tokenExchange` invoke from the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenExchangeInvokeRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub connection_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Synchronous reply body for a `signin/tokenExchange` invoke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenExchangeInvokeResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub connection_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CardActionKind {
    Signin,
    OpenUrl,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardAction {
    #[serde(rename = "type")]
    pub kind: CardActionKind,
    pub title: String,
    pub value: String,
}

/// Minimal login-affordance payload. Channel-specific rendering of this
/// shape is a host concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthCard {
    pub text: String,
    pub connection_name: String,
    pub buttons: Vec<CardAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_exchange_resource: Option<TokenExchangeResource>,
}

impl OAuthCard {
    pub fn from_sign_in_resource(
        connection_name: impl Into<String>,
        title: impl Into<String>,
        text: impl Into<String>,
        resource: &SignInResource,
    ) -> Self {
        Self {
            text: text.into(),
            connection_name: connection_name.into(),
            buttons: vec![CardAction {
                kind: CardActionKind::Signin,
                title: title.into(),
                value: resource.sign_in_link.clone(),
            }],
            token_exchange_resource: resource.token_exchange_resource.clone(),
        }
    }
}
