use futures::future::{self, FutureExt};
use tracing::info;

use super::{PlatformError, PlatformFuture, PlatformServices};

/// Variant for builds without a platform game service. The player is never
/// authenticated, so every gated call is short-circuited by the bridge.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledPlatform;

impl PlatformServices for DisabledPlatform {
    fn initialize(&self) {
        info!("platform_services_disabled");
    }

    fn check_authenticated(&self) -> PlatformFuture<bool> {
        future::ready(Ok(false)).boxed()
    }

    fn sign_in(&self) -> PlatformFuture<bool> {
        future::ready(Ok(false)).boxed()
    }

    fn show_leaderboard(&self) -> PlatformFuture<()> {
        unavailable()
    }

    fn submit_score(&self, _score: i64) -> PlatformFuture<()> {
        unavailable()
    }

    fn show_achievements(&self) -> PlatformFuture<()> {
        unavailable()
    }

    fn unlock_achievement(&self, _id: &str) -> PlatformFuture<()> {
        unavailable()
    }

    fn display_name(&self) -> PlatformFuture<String> {
        unavailable()
    }

    fn profile_image(&self) -> PlatformFuture<Option<Vec<u8>>> {
        unavailable()
    }
}

fn unavailable<T: Send + 'static>() -> PlatformFuture<T> {
    future::ready(Err(PlatformError::Unavailable)).boxed()
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;

    #[test]
    fn never_authenticates() {
        let platform = DisabledPlatform;
        assert_eq!(block_on(platform.check_authenticated()), Ok(false));
        assert_eq!(block_on(platform.sign_in()), Ok(false));
        assert_eq!(
            block_on(platform.show_leaderboard()),
            Err(PlatformError::Unavailable)
        );
    }
}
