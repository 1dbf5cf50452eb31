use std::collections::BTreeSet;
use std::io::Cursor;
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::future::{self, FutureExt};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use tracing::info;

use super::{PlatformError, PlatformFuture, PlatformServices};

const AVATAR_SIZE_PX: u32 = 16;
const LEADERBOARD_PREVIEW_LEN: usize = 5;

#[derive(Debug, Default)]
struct OfflineState {
    signed_in: bool,
    scores: Vec<i64>,
    unlocked: BTreeSet<String>,
}

/// In-process stand-in for a game service, used on desktop builds.
///
/// Starts signed out; `sign_in` always succeeds. Leaderboard and achievement screens
/// are reported through the log instead of a platform overlay.
#[derive(Debug)]
pub struct OfflinePlatform {
    player_name: String,
    state: Mutex<OfflineState>,
}

impl OfflinePlatform {
    pub fn new(player_name: impl Into<String>) -> Self {
        Self {
            player_name: player_name.into(),
            state: Mutex::new(OfflineState::default()),
        }
    }

    pub fn scores(&self) -> Vec<i64> {
        self.state().scores.clone()
    }

    pub fn unlocked(&self) -> Vec<String> {
        self.state().unlocked.iter().cloned().collect()
    }

    fn state(&self) -> MutexGuard<'_, OfflineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn signed_in_state(&self) -> Result<MutexGuard<'_, OfflineState>, PlatformError> {
        let state = self.state();
        if state.signed_in {
            Ok(state)
        } else {
            Err(PlatformError::NotAuthenticated)
        }
    }
}

impl PlatformServices for OfflinePlatform {
    fn initialize(&self) {
        info!(player = %self.player_name, "offline_platform_initialized");
    }

    fn check_authenticated(&self) -> PlatformFuture<bool> {
        let signed_in = self.state().signed_in;
        future::ready(Ok(signed_in)).boxed()
    }

    fn sign_in(&self) -> PlatformFuture<bool> {
        self.state().signed_in = true;
        info!(player = %self.player_name, "offline_sign_in");
        future::ready(Ok(true)).boxed()
    }

    fn show_leaderboard(&self) -> PlatformFuture<()> {
        let result = self.signed_in_state().map(|state| {
            let mut top = state.scores.clone();
            top.sort_unstable_by(|a, b| b.cmp(a));
            top.truncate(LEADERBOARD_PREVIEW_LEN);
            info!(scores = ?top, "offline_leaderboard");
        });
        future::ready(result).boxed()
    }

    fn submit_score(&self, score: i64) -> PlatformFuture<()> {
        let result = self.signed_in_state().map(|mut state| state.scores.push(score));
        future::ready(result).boxed()
    }

    fn show_achievements(&self) -> PlatformFuture<()> {
        let result = self.signed_in_state().map(|state| {
            info!(unlocked = ?state.unlocked, "offline_achievements");
        });
        future::ready(result).boxed()
    }

    fn unlock_achievement(&self, id: &str) -> PlatformFuture<()> {
        let result = self.signed_in_state().map(|mut state| {
            state.unlocked.insert(id.to_string());
        });
        future::ready(result).boxed()
    }

    fn display_name(&self) -> PlatformFuture<String> {
        let result = self
            .signed_in_state()
            .map(|_state| self.player_name.clone());
        future::ready(result).boxed()
    }

    fn profile_image(&self) -> PlatformFuture<Option<Vec<u8>>> {
        let result = self
            .signed_in_state()
            .and_then(|_state| encode_avatar_png(&self.player_name).map(Some));
        future::ready(result).boxed()
    }
}

/// Deterministic two-tone avatar derived from the player name.
fn encode_avatar_png(player_name: &str) -> Result<Vec<u8>, PlatformError> {
    let seed = player_name
        .bytes()
        .fold(0x9e37_u32, |acc, byte| acc.rotate_left(5) ^ u32::from(byte));
    let [r, g, b, _] = seed.to_le_bytes();
    let avatar = RgbaImage::from_fn(AVATAR_SIZE_PX, AVATAR_SIZE_PX, |x, y| {
        let border = x == 0 || y == 0 || x == AVATAR_SIZE_PX - 1 || y == AVATAR_SIZE_PX - 1;
        if border {
            Rgba([255, 255, 255, 255])
        } else {
            Rgba([r, g, b, 255])
        }
    });

    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(avatar)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|error| PlatformError::ProfileData(format!("encode_failed:{error}")))?;
    Ok(bytes)
}
