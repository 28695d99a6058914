//! Prompt dialogs: ask the user for something, validate it across turns.

mod oauth;

pub use oauth::OAuthPrompt;
pub use oauth::OAuthPromptSettings;
pub use oauth::PromptOptions;
pub use oauth::PromptValidator;
pub use oauth::PromptValidatorContext;
pub use oauth::DEFAULT_TIMEOUT_MS;
