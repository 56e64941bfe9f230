use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::debug;

/// Returns the current unix time in milliseconds.
pub type ClockFn = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Per-label cooldown shared by every dispatch task.
///
/// Sweeping expired entries and checking a label happen inside the same
/// critical section, so concurrent messages for one label cannot both pass.
pub struct CooldownCache {
    window: Duration,
    clock: ClockFn,
    entries: Mutex<HashMap<String, u64>>,
}

impl CooldownCache {
    pub fn new(window: Duration) -> Self {
        Self::with_clock(window, Arc::new(current_unix_timestamp_ms))
    }

    pub fn with_clock(window: Duration, clock: ClockFn) -> Self {
        Self { window, clock, entries: Mutex::new(HashMap::new()) }
    }

    /// Returns `true` when `label` was served less than one window ago.
    /// Otherwise records `label` as served now and returns `false`.
    pub fn check_and_mark(&self, label: &str) -> bool {
        let now = (self.clock)();
        let window_ms = self.window_ms();
        let mut entries = lock_or_recover(&self.entries);
        sweep_expired(&mut entries, now, window_ms);

        if let Some(served_at) = entries.get(label) {
            let elapsed = now.saturating_sub(*served_at);
            if elapsed < window_ms {
                debug!(label, elapsed_ms = elapsed, "label still cooling down");
                return true;
            }
        }

        entries.insert(label.to_owned(), now);
        false
    }

    /// Evicts every entry older than the window and returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = (self.clock)();
        let mut entries = lock_or_recover(&self.entries);
        sweep_expired(&mut entries, now, self.window_ms())
    }

    pub fn len(&self) -> usize {
        lock_or_recover(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn window_ms(&self) -> u64 {
        u64::try_from(self.window.as_millis()).unwrap_or(u64::MAX)
    }
}

fn sweep_expired(entries: &mut HashMap<String, u64>, now: u64, window_ms: u64) -> usize {
    let before = entries.len();
    entries.retain(|_, served_at| now.saturating_sub(*served_at) <= window_ms);
    before - entries.len()
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub fn current_unix_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
