use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Required wiring is missing; raised immediately, never retried.
    #[error("no root dialog configured")]
    MissingRootDialog,

    #[error("no dialog registered with id {dialog_id}")]
    UnknownDialog { dialog_id: String },

    #[error("cannot continue: the dialog stack is empty")]
    EmptyStack,

    #[error("inbound activity is missing {field}")]
    MissingActivityField { field: String },

    /// The host did not supply a token provider for this turn.
    #[error("no user token provider available")]
    TokenProviderUnavailable,

    /// The provider cannot perform token exchange for this connection.
    #[error("token exchange is not supported for connection {connection_name}")]
    ExchangeNotSupported { connection_name: String },

    /// Transport or provider failure, distinct from "no token yet".
    #[error("token provider error: {message}")]
    Provider { message: String },

    #[error("state store error: {message}")]
    State { message: String },

    /// An uncaught dialog failure that no frame on the stack consumed.
    #[error("dialog {dialog_id} failed: {message}")]
    DialogFailure { dialog_id: String, message: String },
}

impl CoreError {
    pub fn unknown_dialog(id: &str) -> Self {
        Self::UnknownDialog {
            dialog_id: id.to_string(),
        }
    }

    pub fn missing_field(field: &str) -> Self {
        Self::MissingActivityField {
            field: field.to_string(),
        }
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
        }
    }

    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }
}
