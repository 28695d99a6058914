use async_trait::async_trait;
use convo_protocol::Activity;

use crate::error::Result;

/// Transport seam through which outbound activities leave the engine.
///
/// The driver queues activities during the turn and flushes them here after
/// state is saved, so a transport failure never loses persisted progress.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    async fn send(&self, activity: Activity) -> Result<()>;
}
