use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};

use crate::prefs::{Preferences, PREF_PGS_AUTH};

use super::{PlatformError, PlatformServices};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unknown,
    Authenticated,
    Unauthenticated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    /// The platform answered, but there is no signed-in player.
    NotSignedIn,
    Platform(PlatformError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Success,
    Failure(AuthFailure),
}

impl AuthOutcome {
    pub fn from_platform(result: Result<bool, PlatformError>) -> Self {
        match result {
            Ok(true) => AuthOutcome::Success,
            Ok(false) => AuthOutcome::Failure(AuthFailure::NotSignedIn),
            Err(error) => AuthOutcome::Failure(AuthFailure::Platform(error)),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthOutcome::Success)
    }
}

/// The latest completed check always wins; the previous state never influences it.
pub fn reduce_auth_state(_previous: AuthState, outcome: &AuthOutcome) -> AuthState {
    if outcome.is_authenticated() {
        AuthState::Authenticated
    } else {
        AuthState::Unauthenticated
    }
}

/// Preference-backed "is signed in" flag, refreshed asynchronously and read synchronously.
#[derive(Clone)]
pub struct AuthCache {
    platform: Arc<dyn PlatformServices>,
    preferences: Arc<Preferences>,
    session: Arc<Mutex<AuthState>>,
}

impl AuthCache {
    pub fn new(platform: Arc<dyn PlatformServices>, preferences: Arc<Preferences>) -> Self {
        Self {
            platform,
            preferences,
            session: Arc::new(Mutex::new(AuthState::Unknown)),
        }
    }

    /// Last persisted result. `false` until some check has ever completed.
    pub fn is_authenticated(&self) -> bool {
        self.preferences.get(PREF_PGS_AUTH)
    }

    /// State observed by this process; `Unknown` until the first check completes.
    pub fn state(&self) -> AuthState {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn refresh(&self) -> impl Future<Output = AuthOutcome> + Send + 'static {
        let request = self.platform.check_authenticated();
        let cache = self.clone();
        async move {
            let outcome = AuthOutcome::from_platform(request.await);
            cache.apply("refresh", &outcome);
            outcome
        }
    }

    pub fn sign_in(&self) -> impl Future<Output = AuthOutcome> + Send + 'static {
        let request = self.platform.sign_in();
        let cache = self.clone();
        async move {
            let outcome = AuthOutcome::from_platform(request.await);
            cache.apply("sign_in", &outcome);
            outcome
        }
    }

    fn apply(&self, operation: &'static str, outcome: &AuthOutcome) {
        {
            let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
            *session = reduce_auth_state(*session, outcome);
        }

        let authenticated = outcome.is_authenticated();
        match outcome {
            AuthOutcome::Failure(AuthFailure::Platform(error)) => {
                warn!(operation, error = %error, "auth_check_failed");
            }
            _ => info!(operation, authenticated, "auth_result"),
        }

        self.preferences.put(PREF_PGS_AUTH, authenticated);
        if let Err(error) = self.preferences.flush() {
            warn!(operation, error = %error, "auth_flag_flush_failed");
        }
    }
}
