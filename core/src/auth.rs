use async_trait::async_trait;
use convo_protocol::SignInResource;
use convo_protocol::TokenResponse;

use crate::error::Result;

/// Operations the engine requires from the external authentication provider.
///
/// "No token yet" is `Ok(None)`, never an `Err`; errors are reserved for
/// transport and provider failures.
#[async_trait]
pub trait UserTokenProvider: Send + Sync {
    /// Silent lookup when `code` is `None`, one-time-code lookup otherwise.
    async fn get_user_token(
        &self,
        connection_name: &str,
        user_id: &str,
        channel_id: &str,
        code: Option<&str>,
    ) -> Result<Option<TokenResponse>>;

    async fn get_sign_in_resource(
        &self,
        connection_name: &str,
        user_id: &str,
    ) -> Result<SignInResource>;

    /// Exchange a channel-held token for a provider-issued one. `Ok(None)`
    /// means the provider declined the exchange.
    async fn exchange_token(
        &self,
        connection_name: &str,
        user_id: &str,
        token: &str,
    ) -> Result<Option<TokenResponse>>;

    async fn sign_out_user(&self, connection_name: &str, user_id: &str) -> Result<()>;

    /// Capability gate for the token-exchange path. Hosts whose transport
    /// cannot complete an exchange must leave this `false` so the prompt
    /// fails loudly instead of degrading silently.
    fn supports_token_exchange(&self) -> bool;
}
