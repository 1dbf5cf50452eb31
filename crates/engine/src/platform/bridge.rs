use std::future::Future;
use std::sync::Arc;

use futures::task::{Spawn, SpawnExt};
use tracing::{debug, info, warn};

use crate::prefs::Preferences;
use crate::stage::RgbaSprite;

use super::auth::AuthCache;
use super::completion::Completion;
use super::profile_image::decode_profile_image;
use super::{PlatformFuture, PlatformServices};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserNotice {
    NotAuthenticated,
}

impl UserNotice {
    pub fn message(self) -> &'static str {
        match self {
            UserNotice::NotAuthenticated => "Sign in to Play Games to use this feature",
        }
    }
}

/// Surfaces transient, non-blocking notices to the player.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: UserNotice);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ShowLeaderboard,
    SubmitScore,
    ShowAchievements,
    UnlockAchievement,
    DisplayName,
    ProfileImage,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::ShowLeaderboard => "show_leaderboard",
            Capability::SubmitScore => "submit_score",
            Capability::ShowAchievements => "show_achievements",
            Capability::UnlockAchievement => "unlock_achievement",
            Capability::DisplayName => "display_name",
            Capability::ProfileImage => "profile_image",
        }
    }

    /// Sensitive capabilities are skipped entirely while the cached flag says signed out.
    pub fn requires_auth(self) -> bool {
        !matches!(self, Capability::UnlockAchievement)
    }

    /// Whether a blocked call should tell the player why nothing happened.
    pub fn is_user_visible(self) -> bool {
        matches!(
            self,
            Capability::ShowLeaderboard | Capability::ShowAchievements
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Dispatched,
    Blocked,
    SpawnFailed,
}

/// Gated front for a `PlatformServices` variant.
///
/// The bridge owns no threads. Every platform request is spawned as a continuation on
/// the injected executor; failures are logged and trigger a session re-check.
pub struct PlatformServiceBridge {
    platform: Arc<dyn PlatformServices>,
    auth: AuthCache,
    notifier: Arc<dyn Notifier>,
    spawner: Box<dyn Spawn>,
}

impl PlatformServiceBridge {
    pub fn new(
        platform: Arc<dyn PlatformServices>,
        preferences: Arc<Preferences>,
        notifier: Arc<dyn Notifier>,
        spawner: impl Spawn + 'static,
    ) -> Self {
        let auth = AuthCache::new(Arc::clone(&platform), preferences);
        Self {
            platform,
            auth,
            notifier,
            spawner: Box::new(spawner),
        }
    }

    pub fn auth(&self) -> &AuthCache {
        &self.auth
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated()
    }

    /// Initializes the platform layer and schedules the first authentication check.
    pub fn initialize(&self) -> Dispatch {
        info!("initializing_platform_services");
        self.platform.initialize();
        self.refresh()
    }

    pub fn refresh(&self) -> Dispatch {
        let refresh = self.auth.refresh();
        self.spawn("refresh", async move {
            refresh.await;
        })
    }

    pub fn sign_in(&self) -> Dispatch {
        info!("signing_in");
        let sign_in = self.auth.sign_in();
        self.spawn("sign_in", async move {
            sign_in.await;
        })
    }

    pub fn show_leaderboard(&self) -> Dispatch {
        self.fire(Capability::ShowLeaderboard, |platform| {
            platform.show_leaderboard()
        })
    }

    pub fn submit_score(&self, score: i64) -> Dispatch {
        debug!(score, "submitting_score");
        self.fire(Capability::SubmitScore, |platform| {
            platform.submit_score(score)
        })
    }

    pub fn show_achievements(&self) -> Dispatch {
        self.fire(Capability::ShowAchievements, |platform| {
            platform.show_achievements()
        })
    }

    pub fn unlock_achievement(&self, id: &str) -> Dispatch {
        debug!(achievement = id, "unlocking_achievement");
        self.fire(Capability::UnlockAchievement, |platform| {
            platform.unlock_achievement(id)
        })
    }

    /// `callback` runs exactly once, with `None` on every failure path.
    pub fn get_display_name<F>(&self, callback: F) -> Dispatch
    where
        F: FnOnce(Option<String>) + Send + 'static,
    {
        let completion = Completion::new(callback);
        if !self.gate(Capability::DisplayName) {
            completion.complete(None);
            return Dispatch::Blocked;
        }

        let request = self.platform.display_name();
        let auth = self.auth.clone();
        self.spawn(Capability::DisplayName.as_str(), async move {
            match request.await {
                Ok(name) => completion.complete(Some(name)),
                Err(error) => {
                    warn!(operation = "display_name", error = %error, "platform_call_failed");
                    completion.complete(None);
                    recheck_session("display_name", &auth).await;
                }
            }
        })
    }

    /// `callback` runs exactly once, with `None` on every failure path or when the
    /// player has no picture.
    pub fn get_profile_image<F>(&self, callback: F) -> Dispatch
    where
        F: FnOnce(Option<Arc<RgbaSprite>>) + Send + 'static,
    {
        let completion = Completion::new(callback);
        if !self.gate(Capability::ProfileImage) {
            completion.complete(None);
            return Dispatch::Blocked;
        }

        let request = self.platform.profile_image();
        let auth = self.auth.clone();
        self.spawn(Capability::ProfileImage.as_str(), async move {
            match request.await {
                Ok(Some(bytes)) => match decode_profile_image(&bytes) {
                    Ok(sprite) => completion.complete(Some(Arc::new(sprite))),
                    Err(error) => {
                        warn!(error = %error, "profile_image_unreadable");
                        completion.complete(None);
                    }
                },
                Ok(None) => completion.complete(None),
                Err(error) => {
                    warn!(operation = "profile_image", error = %error, "platform_call_failed");
                    completion.complete(None);
                    recheck_session("profile_image", &auth).await;
                }
            }
        })
    }

    fn gate(&self, capability: Capability) -> bool {
        if !capability.requires_auth() || self.auth.is_authenticated() {
            return true;
        }
        info!(
            capability = capability.as_str(),
            "platform_call_blocked_unauthenticated"
        );
        if capability.is_user_visible() {
            self.notifier.notify(UserNotice::NotAuthenticated);
        }
        false
    }

    fn fire<R>(&self, capability: Capability, request: R) -> Dispatch
    where
        R: FnOnce(&dyn PlatformServices) -> PlatformFuture<()>,
    {
        if !self.gate(capability) {
            return Dispatch::Blocked;
        }
        let request = request(self.platform.as_ref());
        let auth = self.auth.clone();
        let operation = capability.as_str();
        self.spawn(operation, async move {
            if let Err(error) = request.await {
                warn!(operation, error = %error, "platform_call_failed");
                recheck_session(operation, &auth).await;
            }
        })
    }

    fn spawn<F>(&self, operation: &'static str, task: F) -> Dispatch
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self.spawner.spawn(task) {
            Ok(()) => Dispatch::Dispatched,
            Err(error) => {
                warn!(operation, error = %error, "platform_task_spawn_failed");
                Dispatch::SpawnFailed
            }
        }
    }
}

/// A failed call may mean the session expired; re-check instead of treating it as fatal.
async fn recheck_session(operation: &'static str, auth: &AuthCache) {
    let outcome = auth.refresh().await;
    debug!(
        operation,
        authenticated = outcome.is_authenticated(),
        "session_rechecked"
    );
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use futures::executor::LocalPool;

    use super::*;
    use crate::platform::test_support::{RecordingNotifier, ScriptedPlatform};
    use crate::platform::{AuthState, DisabledPlatform};
    use crate::prefs::PREF_PGS_AUTH;

    struct Harness {
        pool: LocalPool,
        platform: Arc<ScriptedPlatform>,
        prefs: Arc<Preferences>,
        notifier: Arc<RecordingNotifier>,
        bridge: PlatformServiceBridge,
    }

    fn harness(authenticated: bool) -> Harness {
        let pool = LocalPool::new();
        let platform = Arc::new(ScriptedPlatform::authenticated(authenticated));
        let prefs = Arc::new(Preferences::in_memory());
        let notifier = Arc::new(RecordingNotifier::default());
        let bridge = PlatformServiceBridge::new(
            Arc::clone(&platform) as Arc<dyn PlatformServices>,
            Arc::clone(&prefs),
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            pool.spawner(),
        );
        Harness {
            pool,
            platform,
            prefs,
            notifier,
            bridge,
        }
    }

    fn signed_in_harness() -> Harness {
        let mut harness = harness(true);
        harness.bridge.initialize();
        harness.pool.run_until_stalled();
        assert!(harness.bridge.is_authenticated());
        harness
    }

    fn capture<T: Send + 'static>() -> (
        Arc<Mutex<Vec<Option<T>>>>,
        impl FnOnce(Option<T>) + Send + 'static,
    ) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        (calls, move |value| sink.lock().expect("sink").push(value))
    }

    #[test]
    fn initialize_checks_auth_and_caches_result() {
        let mut harness = harness(true);
        assert_eq!(harness.bridge.initialize(), Dispatch::Dispatched);
        assert!(!harness.bridge.is_authenticated());

        harness.pool.run_until_stalled();
        assert!(harness.bridge.is_authenticated());
        assert_eq!(harness.bridge.auth().state(), AuthState::Authenticated);
        assert_eq!(harness.platform.initialize_calls(), 1);
    }

    #[test]
    fn blocked_leaderboard_shows_exactly_one_notice_and_no_dispatch() {
        let mut harness = harness(false);

        assert_eq!(harness.bridge.show_leaderboard(), Dispatch::Blocked);
        harness.pool.run_until_stalled();

        assert_eq!(harness.platform.dispatches(), 0);
        assert_eq!(harness.notifier.notices(), vec![UserNotice::NotAuthenticated]);
    }

    #[test]
    fn blocked_silent_calls_do_not_notify() {
        let mut harness = harness(false);

        assert_eq!(harness.bridge.submit_score(12), Dispatch::Blocked);
        let (names, callback) = capture::<String>();
        assert_eq!(harness.bridge.get_display_name(callback), Dispatch::Blocked);
        harness.pool.run_until_stalled();

        assert_eq!(harness.platform.dispatches(), 0);
        assert!(harness.notifier.notices().is_empty());
        assert_eq!(*names.lock().expect("names"), vec![None]);
    }

    #[test]
    fn authenticated_calls_reach_the_platform() {
        let mut harness = signed_in_harness();

        harness.bridge.show_leaderboard();
        harness.bridge.submit_score(40);
        harness.bridge.show_achievements();
        harness.pool.run_until_stalled();

        assert_eq!(harness.platform.dispatches(), 3);
        assert_eq!(harness.platform.submitted(), vec![40]);
        assert!(harness.notifier.notices().is_empty());
    }

    #[test]
    fn unlock_is_not_gated() {
        let mut harness = harness(false);
        assert_eq!(
            harness.bridge.unlock_achievement("sharpshooter"),
            Dispatch::Dispatched
        );
        harness.pool.run_until_stalled();
        assert_eq!(harness.platform.unlocked(), vec!["sharpshooter".to_string()]);
    }

    #[test]
    fn platform_failure_triggers_session_recheck() {
        let mut harness = signed_in_harness();
        let checks_before = harness.platform.auth_checks();
        harness.platform.fail_requests(true);
        harness.platform.set_authenticated(false);

        harness.bridge.show_leaderboard();
        harness.pool.run_until_stalled();

        assert_eq!(harness.platform.auth_checks(), checks_before + 1);
        assert!(!harness.bridge.is_authenticated());
        assert!(!harness.prefs.get(PREF_PGS_AUTH));
    }

    #[test]
    fn display_name_delivered_once_on_success() {
        let mut harness = signed_in_harness();
        harness.platform.set_display_name("Hunter");
        let (names, callback) = capture::<String>();

        harness.bridge.get_display_name(callback);
        harness.pool.run_until_stalled();

        assert_eq!(*names.lock().expect("names"), vec![Some("Hunter".to_string())]);
    }

    #[test]
    fn display_name_failure_delivers_none_once() {
        let mut harness = signed_in_harness();
        harness.platform.fail_requests(true);
        let (names, callback) = capture::<String>();

        harness.bridge.get_display_name(callback);
        harness.pool.run_until_stalled();

        assert_eq!(*names.lock().expect("names"), vec![None]);
    }

    #[test]
    fn unreadable_profile_image_delivers_none() {
        let mut harness = signed_in_harness();
        harness.platform.set_profile_image(Some(b"garbage".to_vec()));
        let (images, callback) = capture::<Arc<RgbaSprite>>();

        harness.bridge.get_profile_image(callback);
        harness.pool.run_until_stalled();

        let images = images.lock().expect("images");
        assert_eq!(images.len(), 1);
        assert!(images[0].is_none());
    }

    #[test]
    fn pending_read_dropped_with_executor_still_completes() {
        let harness = signed_in_harness();
        harness.platform.set_display_name("Hunter");
        let (names, callback) = capture::<String>();

        harness.bridge.get_display_name(callback);
        drop(harness.pool);

        assert_eq!(*names.lock().expect("names"), vec![None]);
    }

    #[test]
    fn disabled_variant_behaves_as_unauthenticated() {
        let mut pool = LocalPool::new();
        let notifier = Arc::new(RecordingNotifier::default());
        let bridge = PlatformServiceBridge::new(
            Arc::new(DisabledPlatform),
            Arc::new(Preferences::in_memory()),
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            pool.spawner(),
        );
        bridge.initialize();
        bridge.sign_in();
        pool.run_until_stalled();

        assert!(!bridge.is_authenticated());
        assert_eq!(bridge.show_achievements(), Dispatch::Blocked);
        assert_eq!(bridge.submit_score(3), Dispatch::Blocked);
        assert_eq!(notifier.notices(), vec![UserNotice::NotAuthenticated]);
    }
}
