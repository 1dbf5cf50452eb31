use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

/// Owner side of a liveness flag. Dropping or killing it invalidates every watch.
#[derive(Debug)]
pub struct Liveness {
    alive: Arc<AtomicBool>,
}

impl Default for Liveness {
    fn default() -> Self {
        Self {
            alive: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl Liveness {
    pub fn watch(&self) -> LivenessWatch {
        LivenessWatch {
            alive: Arc::clone(&self.alive),
        }
    }

    pub fn kill(&self) {
        self.alive.store(false, Ordering::Release);
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}

impl Drop for Liveness {
    fn drop(&mut self) {
        self.kill();
    }
}

#[derive(Debug, Clone)]
pub struct LivenessWatch {
    alive: Arc<AtomicBool>,
}

impl LivenessWatch {
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Wraps a completion so it is discarded once the owner has been torn down.
    pub fn guard<T, F>(self, label: &'static str, on_live: F) -> impl FnOnce(T) + Send + 'static
    where
        T: Send + 'static,
        F: FnOnce(T) + Send + 'static,
    {
        move |value| {
            if self.is_alive() {
                on_live(value);
            } else {
                debug!(completion = label, "stale_completion_discarded");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use super::*;

    #[test]
    fn guard_runs_while_alive_and_discards_after_kill() {
        let liveness = Liveness::default();
        let hits = Arc::new(AtomicU32::new(0));

        let live_hits = Arc::clone(&hits);
        let live = liveness.watch().guard("live", move |value: u32| {
            live_hits.fetch_add(value, Ordering::SeqCst);
        });
        live(2);

        let stale_hits = Arc::clone(&hits);
        let stale = liveness.watch().guard("stale", move |value: u32| {
            stale_hits.fetch_add(value, Ordering::SeqCst);
        });
        liveness.kill();
        stale(5);

        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dropping_owner_invalidates_watch() {
        let watch = {
            let liveness = Liveness::default();
            liveness.watch()
        };
        assert!(!watch.is_alive());
    }
}
