use crate::store::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Spawn the periodic TTL sweep. The task runs until aborted.
pub fn spawn_sweeper(
    store: Arc<dyn SessionStore>,
    interval: Duration,
    ttl: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = store.sweep(chrono::Utc::now(), ttl).await;
            if removed > 0 {
                let remaining = store.len().await;
                tracing::info!(removed, remaining, "Expired sessions swept");
            } else {
                tracing::debug!("Session sweep found nothing to expire");
            }
        }
    })
}
