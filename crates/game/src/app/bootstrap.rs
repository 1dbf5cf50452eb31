use std::rc::Rc;
use std::sync::Arc;

use engine::{
    resolve_app_paths, DisabledPlatform, LoopConfig, Notifier, OfflinePlatform,
    PlatformServiceBridge, PlatformServices, Preferences, Screen, StartupError,
};
use futures::executor::LocalPool;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::context::{GameContext, ToastQueue};
use super::menu::MenuScreen;
use super::round::RoundScreen;

const PLATFORM_ENV_VAR: &str = "BIRDHUNT_PLATFORM";
const PLAYER_ENV_VAR: &str = "BIRDHUNT_PLAYER";
const DEFAULT_OFFLINE_PLAYER: &str = "Hunter";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PlatformVariant {
    Disabled,
    Offline,
}

impl PlatformVariant {
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => PlatformVariant::Disabled,
            Some(value) if value.eq_ignore_ascii_case("disabled") => PlatformVariant::Disabled,
            Some(value) if value.eq_ignore_ascii_case("offline") => PlatformVariant::Offline,
            Some(value) => {
                warn!(value, env = PLATFORM_ENV_VAR, "unknown_platform_variant");
                PlatformVariant::Disabled
            }
        }
    }

    fn from_env() -> Self {
        Self::parse(std::env::var(PLATFORM_ENV_VAR).ok().as_deref())
    }

    fn build(self) -> Arc<dyn PlatformServices> {
        match self {
            PlatformVariant::Disabled => Arc::new(DisabledPlatform),
            PlatformVariant::Offline => {
                let player = std::env::var(PLAYER_ENV_VAR)
                    .ok()
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_OFFLINE_PLAYER.to_owned());
                Arc::new(OfflinePlatform::new(player))
            }
        }
    }
}

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) screen_a: Box<dyn Screen>,
    pub(crate) screen_b: Box<dyn Screen>,
    pub(crate) executor: LocalPool,
}

pub(crate) fn build_app() -> Result<AppWiring, StartupError> {
    init_tracing();
    info!("=== Bird Hunt Startup ===");

    let paths = resolve_app_paths()?;
    let preferences = Arc::new(Preferences::open(&paths.preferences_file)?);
    let variant = PlatformVariant::from_env();
    info!(
        data_dir = %paths.data_dir.display(),
        platform = ?variant,
        "app_paths_resolved"
    );

    let executor = LocalPool::new();
    let toasts = Arc::new(ToastQueue::default());
    let bridge = PlatformServiceBridge::new(
        variant.build(),
        Arc::clone(&preferences),
        Arc::clone(&toasts) as Arc<dyn Notifier>,
        executor.spawner(),
    );
    bridge.initialize();

    let context = GameContext::new(preferences, Rc::new(bridge), toasts);
    Ok(AppWiring {
        config: LoopConfig::default(),
        screen_a: Box::new(MenuScreen::new(context.clone())),
        screen_b: Box::new(RoundScreen::new(context)),
        executor,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_variant_defaults_to_disabled() {
        assert_eq!(PlatformVariant::parse(None), PlatformVariant::Disabled);
        assert_eq!(PlatformVariant::parse(Some("  ")), PlatformVariant::Disabled);
        assert_eq!(PlatformVariant::parse(Some("steam")), PlatformVariant::Disabled);
    }

    #[test]
    fn platform_variant_is_case_insensitive() {
        assert_eq!(PlatformVariant::parse(Some("Offline")), PlatformVariant::Offline);
        assert_eq!(PlatformVariant::parse(Some(" DISABLED ")), PlatformVariant::Disabled);
    }
}
