use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PrefValue {
    Bool(bool),
    Float(f32),
    Int(i32),
}

pub trait PrefType: Copy + PartialEq + Send + Sync + 'static {
    fn into_value(self) -> PrefValue;
    fn from_value(value: &PrefValue) -> Option<Self>;
}

impl PrefType for bool {
    fn into_value(self) -> PrefValue {
        PrefValue::Bool(self)
    }

    fn from_value(value: &PrefValue) -> Option<Self> {
        match value {
            PrefValue::Bool(inner) => Some(*inner),
            _ => None,
        }
    }
}

impl PrefType for f32 {
    fn into_value(self) -> PrefValue {
        PrefValue::Float(self)
    }

    fn from_value(value: &PrefValue) -> Option<Self> {
        match value {
            PrefValue::Float(inner) => Some(*inner),
            _ => None,
        }
    }
}

impl PrefType for i32 {
    fn into_value(self) -> PrefValue {
        PrefValue::Int(self)
    }

    fn from_value(value: &PrefValue) -> Option<Self> {
        match value {
            PrefValue::Int(inner) => Some(*inner),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PrefKey<T: PrefType> {
    pub name: &'static str,
    pub default: T,
}

impl<T: PrefType> PrefKey<T> {
    pub const fn new(name: &'static str, default: T) -> Self {
        Self { name, default }
    }
}

/// Cached "signed in to the platform service" flag.
pub const PREF_PGS_AUTH: PrefKey<bool> = PrefKey::new("pgs_auth", false);
/// User zoom applied on top of the aspect-ratio scale.
pub const PREF_GAME_SCALE: PrefKey<f32> = PrefKey::new("game_scale", 1.0);
pub const PREF_FIRST_GAME: PrefKey<bool> = PrefKey::new("first_game", true);
pub const PREF_HIGH_SCORE: PrefKey<i32> = PrefKey::new("high_score", 0);
