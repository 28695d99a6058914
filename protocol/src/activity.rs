//! The activity envelope exchanged between a channel and the dialog engine.
//!
//! One inbound activity plus the outbound activities produced while handling
//! it make up a single turn. The envelope is deliberately channel-agnostic:
//! transport-specific payloads ride in `value` and `attachments`.

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use strum_macros::Display;
use uuid::Uuid;

/// Discriminates how an [`Activity`] should be interpreted by the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActivityKind {
    /// Free-form user or bot message.
    Message,
    /// Out-of-band named notification; `name` and `value` carry the payload.
    Event,
    /// Channel request that expects a synchronous [`InvokeResponseBody`]
    /// reply within the same turn.
    Invoke,
    /// The synchronous reply to an `Invoke`; `value` is an
    /// [`InvokeResponseBody`].
    InvokeResponse,
    /// Diagnostic output consumed by tooling, never shown to users.
    Trace,
}

/// Hint telling the channel whether the bot is ready for more input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InputHint {
    AcceptingInput,
    IgnoringInput,
    ExpectingInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAccount {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChannelAccount {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationAccount {
    pub id: String,
}

impl ConversationAccount {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Arbitrary content attached to a message, e.g. a sign-in card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub content_type: String,
    pub content: Value,
}

/// Body of an [`ActivityKind::InvokeResponse`] activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeResponseBody {
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub channel_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<ChannelAccount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<ChannelAccount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation: Option<ConversationAccount>,
    /// Id of the activity this one replies to. Invoke responses echo the
    /// invoke's id here so the channel can correlate them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_hint: Option<InputHint>,
    /// Name of the event or invoke operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Activity {
    fn bare(kind: ActivityKind) -> Self {
        Self {
            kind,
            id: Some(Uuid::new_v4().to_string()),
            channel_id: String::new(),
            from: None,
            recipient: None,
            conversation: None,
            reply_to_id: None,
            text: None,
            input_hint: None,
            name: None,
            value: None,
            attachments: Vec::new(),
            timestamp: None,
        }
    }

    pub fn message(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::bare(ActivityKind::Message)
        }
    }

    pub fn event(name: impl Into<String>, value: Option<Value>) -> Self {
        Self {
            name: Some(name.into()),
            value,
            ..Self::bare(ActivityKind::Event)
        }
    }

    pub fn invoke(name: impl Into<String>, value: Option<Value>) -> Self {
        Self {
            name: Some(name.into()),
            value,
            ..Self::bare(ActivityKind::Invoke)
        }
    }

    pub fn invoke_response(status: u16, body: Option<Value>) -> Self {
        Self {
            value: serde_json::to_value(InvokeResponseBody { status, body }).ok(),
            ..Self::bare(ActivityKind::InvokeResponse)
        }
    }

    /// Diagnostic trace activity; `value` is the snapshot payload.
    pub fn trace(name: impl Into<String>, value: Option<Value>) -> Self {
        Self {
            name: Some(name.into()),
            input_hint: Some(InputHint::IgnoringInput),
            ..Self::bare(ActivityKind::Trace)
        }
        .with_value(value)
    }

    fn with_value(mut self, value: Option<Value>) -> Self {
        self.value = value;
        self
    }

    pub fn is_message(&self) -> bool {
        self.kind == ActivityKind::Message
    }

    pub fn is_invoke_named(&self, name: &str) -> bool {
        self.kind == ActivityKind::Invoke && self.name.as_deref() == Some(name)
    }

    pub fn is_event_named(&self, name: &str) -> bool {
        self.kind == ActivityKind::Event && self.name.as_deref() == Some(name)
    }

    /// Address an outbound activity as a reply to `inbound`, flipping the
    /// from/recipient pair and inheriting channel and conversation.
    pub fn as_reply_to(mut self, inbound: &Activity) -> Self {
        self.channel_id = inbound.channel_id.clone();
        self.conversation = inbound.conversation.clone();
        self.from = inbound.recipient.clone();
        self.recipient = inbound.from.clone();
        self.reply_to_id = inbound.id.clone();
        self
    }
}
