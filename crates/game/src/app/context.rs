use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use engine::{Notifier, PlatformServiceBridge, Preferences, UserNotice};
use tracing::{info, warn};

static TOAST_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

/// Services every screen shares. Lives on the loop thread.
#[derive(Clone)]
pub(crate) struct GameContext {
    pub(crate) preferences: Arc<Preferences>,
    pub(crate) bridge: Rc<PlatformServiceBridge>,
    pub(crate) toasts: Arc<ToastQueue>,
    /// Set when the next round should open with the controls hint.
    pub(crate) controls_hint: Rc<Cell<bool>>,
}

impl GameContext {
    pub(crate) fn new(
        preferences: Arc<Preferences>,
        bridge: Rc<PlatformServiceBridge>,
        toasts: Arc<ToastQueue>,
    ) -> Self {
        Self {
            preferences,
            bridge,
            toasts,
            controls_hint: Rc::new(Cell::new(false)),
        }
    }

    pub(crate) fn flush_preferences(&self, reason: &'static str) {
        if let Err(error) = self.preferences.flush() {
            warn!(reason, error = %error, "preferences_flush_failed");
        }
    }
}

/// Notices waiting to be shown as toasts. Filled from any thread, drained by the
/// toast actor of whichever screen is visible.
#[derive(Debug, Default)]
pub(crate) struct ToastQueue {
    pending: Mutex<VecDeque<UserNotice>>,
}

impl ToastQueue {
    pub(crate) fn pop(&self) -> Option<UserNotice> {
        self.lock().pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<UserNotice>> {
        self.pending.lock().unwrap_or_else(|poisoned| {
            if !TOAST_LOCK_POISON_WARNED.swap(true, Ordering::Relaxed) {
                warn!("toast_queue_lock_poisoned_recovering");
            }
            PoisonError::into_inner(poisoned)
        })
    }
}

impl Notifier for ToastQueue {
    fn notify(&self, notice: UserNotice) {
        info!(notice = notice.message(), "toast_queued");
        self.lock().push_back(notice);
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toasts_are_delivered_in_order() {
        let queue = ToastQueue::default();
        queue.notify(UserNotice::NotAuthenticated);
        queue.notify(UserNotice::NotAuthenticated);

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop(), Some(UserNotice::NotAuthenticated));
        assert_eq!(queue.len(), 1);
    }
}
