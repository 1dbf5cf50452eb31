mod atomic_io;
mod keys;
mod store;

pub use keys::{
    PrefKey, PrefType, PrefValue, PREF_FIRST_GAME, PREF_GAME_SCALE, PREF_HIGH_SCORE,
    PREF_PGS_AUTH,
};
pub use store::{ListenerId, PreferenceError, Preferences};
