use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use futures::future::{self, FutureExt};

use super::{Notifier, PlatformError, PlatformFuture, PlatformServices, UserNotice};

/// Platform double whose answers are decided at request time.
#[derive(Debug, Default)]
pub(crate) struct ScriptedPlatform {
    authenticated: AtomicBool,
    fail_auth_checks: AtomicBool,
    fail_requests: AtomicBool,
    initialize_calls: AtomicUsize,
    auth_checks: AtomicUsize,
    sign_in_calls: AtomicUsize,
    dispatches: AtomicUsize,
    submitted: Mutex<Vec<i64>>,
    unlocked: Mutex<Vec<String>>,
    display_name: Mutex<String>,
    profile_image: Mutex<Option<Vec<u8>>>,
}

impl ScriptedPlatform {
    pub(crate) fn authenticated(authenticated: bool) -> Self {
        let platform = Self::default();
        platform.set_authenticated(authenticated);
        platform.set_display_name("Scripted");
        platform
    }

    pub(crate) fn set_authenticated(&self, authenticated: bool) {
        self.authenticated.store(authenticated, Ordering::SeqCst);
    }

    pub(crate) fn fail_auth_checks(&self, fail: bool) {
        self.fail_auth_checks.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_requests(&self, fail: bool) {
        self.fail_requests.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_display_name(&self, name: &str) {
        *self.display_name.lock().expect("display name") = name.to_string();
    }

    pub(crate) fn set_profile_image(&self, bytes: Option<Vec<u8>>) {
        *self.profile_image.lock().expect("profile image") = bytes;
    }

    pub(crate) fn initialize_calls(&self) -> usize {
        self.initialize_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn auth_checks(&self) -> usize {
        self.auth_checks.load(Ordering::SeqCst)
    }

    pub(crate) fn sign_in_calls(&self) -> usize {
        self.sign_in_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn dispatches(&self) -> usize {
        self.dispatches.load(Ordering::SeqCst)
    }

    pub(crate) fn submitted(&self) -> Vec<i64> {
        self.submitted.lock().expect("submitted").clone()
    }

    pub(crate) fn unlocked(&self) -> Vec<String> {
        self.unlocked.lock().expect("unlocked").clone()
    }

    fn auth_answer(&self, operation: &'static str) -> PlatformFuture<bool> {
        let answer = if self.fail_auth_checks.load(Ordering::SeqCst) {
            Err(PlatformError::Request {
                operation,
                reason: "scripted auth failure".to_string(),
            })
        } else {
            Ok(self.authenticated.load(Ordering::SeqCst))
        };
        future::ready(answer).boxed()
    }

    fn request<T: Send + 'static>(
        &self,
        operation: &'static str,
        value: impl FnOnce() -> T,
    ) -> PlatformFuture<T> {
        self.dispatches.fetch_add(1, Ordering::SeqCst);
        let answer = if self.fail_requests.load(Ordering::SeqCst) {
            Err(PlatformError::Request {
                operation,
                reason: "scripted failure".to_string(),
            })
        } else {
            Ok(value())
        };
        future::ready(answer).boxed()
    }
}

impl PlatformServices for ScriptedPlatform {
    fn initialize(&self) {
        self.initialize_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn check_authenticated(&self) -> PlatformFuture<bool> {
        self.auth_checks.fetch_add(1, Ordering::SeqCst);
        self.auth_answer("check_authenticated")
    }

    fn sign_in(&self) -> PlatformFuture<bool> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        self.set_authenticated(true);
        self.auth_answer("sign_in")
    }

    fn show_leaderboard(&self) -> PlatformFuture<()> {
        self.request("show_leaderboard", || ())
    }

    fn submit_score(&self, score: i64) -> PlatformFuture<()> {
        self.request("submit_score", || {
            self.submitted.lock().expect("submitted").push(score);
        })
    }

    fn show_achievements(&self) -> PlatformFuture<()> {
        self.request("show_achievements", || ())
    }

    fn unlock_achievement(&self, id: &str) -> PlatformFuture<()> {
        self.request("unlock_achievement", || {
            self.unlocked.lock().expect("unlocked").push(id.to_string());
        })
    }

    fn display_name(&self) -> PlatformFuture<String> {
        self.request("display_name", || {
            self.display_name.lock().expect("display name").clone()
        })
    }

    fn profile_image(&self) -> PlatformFuture<Option<Vec<u8>>> {
        self.request("profile_image", || {
            self.profile_image.lock().expect("profile image").clone()
        })
    }
}

#[derive(Debug, Default)]
pub(crate) struct RecordingNotifier {
    notices: Mutex<Vec<UserNotice>>,
}

impl RecordingNotifier {
    pub(crate) fn notices(&self) -> Vec<UserNotice> {
        self.notices.lock().expect("notices").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: UserNotice) {
        self.notices.lock().expect("notices").push(notice);
    }
}
