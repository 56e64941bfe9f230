use std::sync::Arc;
use std::time::Duration;

use refbot_core::cooldown::CooldownCache;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Evicts expired cooldown entries once per `every`, so idle labels do not linger.
pub fn spawn(cooldown: Arc<CooldownCache>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = cooldown.sweep();
            if removed > 0 {
                debug!(
                    event_name = "system.cooldown.swept",
                    removed,
                    remaining = cooldown.len(),
                    "evicted expired cooldown entries"
                );
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use refbot_core::cooldown::CooldownCache;

    #[tokio::test]
    async fn expired_entries_are_swept_in_the_background() {
        let cooldown = Arc::new(CooldownCache::new(Duration::from_millis(20)));
        assert!(!cooldown.check_and_mark("PR-1"));

        let handle = super::spawn(cooldown.clone(), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.abort();

        assert!(cooldown.is_empty());
    }
}
