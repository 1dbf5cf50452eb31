use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod app;
pub mod platform;
pub mod prefs;
pub mod stage;

pub use app::{
    run_app, AppError, InputAction, InputSnapshot, LoopConfig, Renderer, Screen, ScreenCommand,
    ScreenKey,
};
pub use platform::{
    AuthCache, AuthState, Capability, Completion, DisabledPlatform, Dispatch, Notifier,
    OfflinePlatform, PlatformError, PlatformFuture, PlatformServiceBridge, PlatformServices,
    UserNotice,
};
pub use prefs::{
    ListenerId, PrefKey, PreferenceError, Preferences, PREF_FIRST_GAME, PREF_GAME_SCALE,
    PREF_HIGH_SCORE, PREF_PGS_AUTH,
};
pub use stage::{
    Actor, ActorId, Batch, Color, Disposable, DrawCommand, FrameFailure, FrameFailureKind,
    FrameReport, LivenessWatch, Orientation, OrientationAware, Rect, Resizable, RgbaSprite,
    StageConfig, StageHost, Vec2, Viewport, ViewportError,
};

pub const DATA_DIR_ENV_VAR: &str = "BIRDHUNT_DATA_DIR";
pub const PREFERENCES_FILE_NAME: &str = "preferences.json";
const DATA_DIR_NAME: &str = "data";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub data_dir: PathBuf,
    pub preferences_file: PathBuf,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error("failed to create data directory at {path}: {source}")]
    CreateDataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to load preferences: {0}")]
    Preferences(#[from] PreferenceError),
}

/// Resolves where persisted preferences live and makes sure the directory exists.
///
/// `BIRDHUNT_DATA_DIR` wins when set. Otherwise the first ancestor of the executable
/// that looks like the project root gets a `data/` directory; failing that, `data/`
/// sits next to the executable.
pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let data_dir = resolve_data_dir()?;
    fs::create_dir_all(&data_dir).map_err(|source| StartupError::CreateDataDir {
        path: data_dir.clone(),
        source,
    })?;

    Ok(AppPaths {
        preferences_file: data_dir.join(PREFERENCES_FILE_NAME),
        data_dir,
    })
}

fn resolve_data_dir() -> Result<PathBuf, StartupError> {
    match env::var(DATA_DIR_ENV_VAR) {
        Ok(value) if !value.trim().is_empty() => Ok(PathBuf::from(value)),
        Ok(_) | Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;
            Ok(default_data_dir(&exe_dir))
        }
        Err(source) => Err(StartupError::EnvVar {
            var: DATA_DIR_ENV_VAR,
            source,
        }),
    }
}

fn default_data_dir(exe_dir: &Path) -> PathBuf {
    exe_dir
        .ancestors()
        .find(|candidate| is_repo_marker(candidate))
        .map(normalize_path)
        .unwrap_or_else(|| normalize_path(exe_dir))
        .join(DATA_DIR_NAME)
}

fn is_repo_marker(path: &Path) -> bool {
    path.join("Cargo.toml").is_file() && path.join("crates").is_dir()
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
