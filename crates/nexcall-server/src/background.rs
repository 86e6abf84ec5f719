//! Background tasks for the nexcall server.

use crate::conversation::ConversationStore;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

/// Starts the idle conversation eviction task.
///
/// Calls that never deliver a terminal status would otherwise keep their
/// conversation in memory forever. This task runs indefinitely and drops
/// conversations untouched for `idle_ttl_secs`.
pub async fn start_eviction_task(
    conversations: Arc<dyn ConversationStore>,
    idle_ttl_secs: u64,
    sweep_interval_secs: u64,
) {
    if idle_ttl_secs == 0 {
        tracing::warn!("conversation eviction disabled (idle_ttl_secs=0)");
        return;
    }

    let ttl = Duration::from_secs(idle_ttl_secs);
    let interval = Duration::from_secs(sweep_interval_secs.max(1));

    tracing::info!(
        idle_ttl_secs,
        sweep_interval_secs = interval.as_secs(),
        "starting conversation eviction task"
    );

    loop {
        sleep(interval).await;

        let evicted = conversations.evict_idle(ttl).await;
        if evicted.is_empty() {
            tracing::debug!("no idle conversations to evict");
        } else {
            tracing::info!(count = evicted.len(), call_sids = ?evicted, "evicted idle conversations");
        }
    }
}
