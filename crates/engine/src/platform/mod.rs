//! Platform game-service integration.
//!
//! `PlatformServices` is the contract a platform build implements (sign-in,
//! leaderboards, achievements, player profile). `PlatformServiceBridge` sits in front of
//! it and gates sensitive calls on the cached authentication flag kept by `AuthCache`.

mod auth;
mod bridge;
mod completion;
mod disabled;
mod offline;
mod profile_image;
#[cfg(test)]
pub(crate) mod test_support;

use futures::future::BoxFuture;
use thiserror::Error;

pub use auth::{reduce_auth_state, AuthCache, AuthFailure, AuthOutcome, AuthState};
pub use bridge::{Capability, Dispatch, Notifier, PlatformServiceBridge, UserNotice};
pub use completion::Completion;
pub use disabled::DisabledPlatform;
pub use offline::OfflinePlatform;
pub use profile_image::decode_profile_image;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("platform services are not available in this build")]
    Unavailable,
    #[error("player is not authenticated with the platform service")]
    NotAuthenticated,
    #[error("platform request `{operation}` failed: {reason}")]
    Request {
        operation: &'static str,
        reason: String,
    },
    #[error("failed to read profile data: {0}")]
    ProfileData(String),
}

pub type PlatformFuture<T> = BoxFuture<'static, Result<T, PlatformError>>;

/// Implemented once per platform build.
///
/// Every request returns a future that resolves on whatever thread the platform layer
/// completes on; none of them can be cancelled.
pub trait PlatformServices: Send + Sync {
    fn initialize(&self);

    /// Resolves to `true` only when the platform confirms an authenticated session.
    fn check_authenticated(&self) -> PlatformFuture<bool>;

    /// Prompts the player to sign in, then resolves like `check_authenticated`.
    fn sign_in(&self) -> PlatformFuture<bool>;

    fn show_leaderboard(&self) -> PlatformFuture<()>;

    fn submit_score(&self, score: i64) -> PlatformFuture<()>;

    fn show_achievements(&self) -> PlatformFuture<()>;

    fn unlock_achievement(&self, id: &str) -> PlatformFuture<()>;

    fn display_name(&self) -> PlatformFuture<String>;

    /// Encoded image bytes, or `None` when the player has no picture.
    fn profile_image(&self) -> PlatformFuture<Option<Vec<u8>>>;
}
