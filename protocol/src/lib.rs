#![deny(unreachable_pub)]

// Public modules that make up the protocol surface.
pub mod activity;
pub mod auth;

pub use activity::Activity;
pub use activity::ActivityKind;
pub use activity::Attachment;
pub use activity::ChannelAccount;
pub use activity::ConversationAccount;
pub use activity::InputHint;
pub use activity::InvokeResponseBody;
pub use auth::CardAction;
pub use auth::CardActionKind;
pub use auth::OAuthCard;
pub use auth::SignInResource;
pub use auth::TokenExchangeInvokeRequest;
pub use auth::TokenExchangeInvokeResponse;
pub use auth::TokenExchangeResource;
pub use auth::TokenResponse;
