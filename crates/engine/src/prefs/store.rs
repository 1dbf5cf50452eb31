use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;
use tracing::{debug, warn};

use super::atomic_io::write_text_atomic;
use super::keys::{PrefKey, PrefType, PrefValue};

static PREFERENCES_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_preferences_lock_poison_once(operation: &'static str) {
    if PREFERENCES_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "preferences lock poisoned; recovered inner value");
    }
}

#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("failed to read preferences at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write preferences at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed preferences at {path} (entry `{location}`): {source}")]
    Parse {
        path: PathBuf,
        location: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode preferences: {0}")]
    Encode(#[source] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&PrefValue) + Send + Sync>;

/// Process-wide key/value store with change notification.
///
/// Writes are serialized by an internal lock. Listeners run on the writing thread after
/// the lock is released, so a listener may read or write the store itself.
pub struct Preferences {
    path: Option<PathBuf>,
    values: RwLock<BTreeMap<String, PrefValue>>,
    listeners: Mutex<HashMap<&'static str, Vec<(ListenerId, Listener)>>>,
    next_listener_id: AtomicU64,
}

impl fmt::Debug for Preferences {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Preferences")
            .field("path", &self.path)
            .field("values", &*self.read_values("debug"))
            .finish_non_exhaustive()
    }
}

impl Preferences {
    pub fn in_memory() -> Self {
        Self::with_values(None, BTreeMap::new())
    }

    /// Loads the store backing `path`. A missing file yields an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PreferenceError> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(text) => parse_values(&path, &text)?,
            Err(source) if source.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "preferences_missing_using_defaults");
                BTreeMap::new()
            }
            Err(source) => return Err(PreferenceError::Read { path, source }),
        };
        Ok(Self::with_values(Some(path), values))
    }

    fn with_values(path: Option<PathBuf>, values: BTreeMap<String, PrefValue>) -> Self {
        Self {
            path,
            values: RwLock::new(values),
            listeners: Mutex::new(HashMap::new()),
            next_listener_id: AtomicU64::new(0),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get<T: PrefType>(&self, key: PrefKey<T>) -> T {
        self.read_values("get")
            .get(key.name)
            .and_then(T::from_value)
            .unwrap_or(key.default)
    }

    pub fn put<T: PrefType>(&self, key: PrefKey<T>, value: T) {
        let previous = self.get(key);
        let stored = value.into_value();
        self.write_values("put")
            .insert(key.name.to_string(), stored.clone());

        if previous != value {
            self.notify(key.name, &stored);
        }
    }

    pub fn flush(&self) -> Result<(), PreferenceError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        let text = {
            let values = self.read_values("flush");
            serde_json::to_string_pretty(&*values).map_err(PreferenceError::Encode)?
        };
        write_text_atomic(path, &text).map_err(|source| PreferenceError::Write {
            path: path.clone(),
            source,
        })
    }

    pub fn add_listener<T, F>(&self, key: PrefKey<T>, callback: F) -> ListenerId
    where
        T: PrefType,
        F: Fn(T) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        let listener: Listener = Arc::new(move |value: &PrefValue| {
            if let Some(typed) = T::from_value(value) {
                callback(typed);
            }
        });
        self.lock_listeners("add_listener")
            .entry(key.name)
            .or_default()
            .push((id, listener));
        id
    }

    pub fn remove_listener<T: PrefType>(&self, key: PrefKey<T>, id: ListenerId) -> bool {
        let mut listeners = self.lock_listeners("remove_listener");
        let Some(registered) = listeners.get_mut(key.name) else {
            return false;
        };
        let before = registered.len();
        registered.retain(|(registered_id, _)| *registered_id != id);
        let removed = registered.len() != before;
        if registered.is_empty() {
            listeners.remove(key.name);
        }
        removed
    }

    pub fn listener_count<T: PrefType>(&self, key: PrefKey<T>) -> usize {
        self.lock_listeners("listener_count")
            .get(key.name)
            .map_or(0, Vec::len)
    }

    fn notify(&self, name: &str, value: &PrefValue) {
        let snapshot: Vec<Listener> = self
            .lock_listeners("notify")
            .get(name)
            .map(|registered| {
                registered
                    .iter()
                    .map(|(_, listener)| Arc::clone(listener))
                    .collect()
            })
            .unwrap_or_default();
        for listener in snapshot {
            listener(value);
        }
    }

    fn read_values(
        &self,
        operation: &'static str,
    ) -> RwLockReadGuard<'_, BTreeMap<String, PrefValue>> {
        self.values.read().unwrap_or_else(|poisoned| {
            warn_preferences_lock_poison_once(operation);
            poisoned.into_inner()
        })
    }

    fn write_values(
        &self,
        operation: &'static str,
    ) -> RwLockWriteGuard<'_, BTreeMap<String, PrefValue>> {
        self.values.write().unwrap_or_else(|poisoned| {
            warn_preferences_lock_poison_once(operation);
            poisoned.into_inner()
        })
    }

    fn lock_listeners(
        &self,
        operation: &'static str,
    ) -> MutexGuard<'_, HashMap<&'static str, Vec<(ListenerId, Listener)>>> {
        self.listeners.lock().unwrap_or_else(|poisoned| {
            warn_preferences_lock_poison_once(operation);
            poisoned.into_inner()
        })
    }
}

fn parse_values(path: &Path, text: &str) -> Result<BTreeMap<String, PrefValue>, PreferenceError> {
    let mut deserializer = serde_json::Deserializer::from_str(text);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
        let location = error.path().to_string();
        PreferenceError::Parse {
            path: path.to_path_buf(),
            location,
            source: error.into_inner(),
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use super::*;
    use crate::prefs::{PREF_FIRST_GAME, PREF_GAME_SCALE, PREF_HIGH_SCORE, PREF_PGS_AUTH};

    #[test]
    fn missing_keys_return_defaults() {
        let prefs = Preferences::in_memory();
        assert!(!prefs.get(PREF_PGS_AUTH));
        assert_eq!(prefs.get(PREF_GAME_SCALE), 1.0);
        assert!(prefs.get(PREF_FIRST_GAME));
        assert_eq!(prefs.get(PREF_HIGH_SCORE), 0);
    }

    #[test]
    fn put_then_get_returns_written_value() {
        let prefs = Preferences::in_memory();
        prefs.put(PREF_GAME_SCALE, 1.25);
        assert_eq!(prefs.get(PREF_GAME_SCALE), 1.25);
    }

    #[test]
    fn listeners_fire_only_on_change() {
        let prefs = Preferences::in_memory();
        let calls = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&calls);
        prefs.add_listener(PREF_PGS_AUTH, move |_value: bool| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        prefs.put(PREF_PGS_AUTH, false);
        prefs.put(PREF_PGS_AUTH, true);
        prefs.put(PREF_PGS_AUTH, true);
        prefs.put(PREF_PGS_AUTH, false);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn removed_listener_is_not_called() {
        let prefs = Preferences::in_memory();
        let calls = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&calls);
        let id = prefs.add_listener(PREF_GAME_SCALE, move |_value: f32| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(prefs.listener_count(PREF_GAME_SCALE), 1);

        assert!(prefs.remove_listener(PREF_GAME_SCALE, id));
        assert!(!prefs.remove_listener(PREF_GAME_SCALE, id));
        assert_eq!(prefs.listener_count(PREF_GAME_SCALE), 0);

        prefs.put(PREF_GAME_SCALE, 2.0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn listener_may_read_store_reentrantly() {
        let prefs = Arc::new(Preferences::in_memory());
        let observed = Arc::new(Mutex::new(None));
        let store = Arc::clone(&prefs);
        let sink = Arc::clone(&observed);
        prefs.add_listener(PREF_HIGH_SCORE, move |_value: i32| {
            *sink.lock().expect("sink") = Some(store.get(PREF_HIGH_SCORE));
        });

        prefs.put(PREF_HIGH_SCORE, 42);
        assert_eq!(*observed.lock().expect("sink"), Some(42));
    }

    #[test]
    fn mismatched_type_falls_back_to_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("prefs.json");
        fs::write(
            &path,
            r#"{ "game_scale": { "type": "bool", "value": true } }"#,
        )
        .expect("seed");

        let prefs = Preferences::open(&path).expect("open");
        assert_eq!(prefs.get(PREF_GAME_SCALE), 1.0);
    }

    #[test]
    fn flush_persists_across_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("prefs.json");

        let prefs = Preferences::open(&path).expect("open");
        prefs.put(PREF_PGS_AUTH, true);
        prefs.put(PREF_HIGH_SCORE, 31);
        prefs.flush().expect("flush");
        drop(prefs);

        let reopened = Preferences::open(&path).expect("reopen");
        assert!(reopened.get(PREF_PGS_AUTH));
        assert_eq!(reopened.get(PREF_HIGH_SCORE), 31);
    }

    #[test]
    fn malformed_entry_reports_its_location() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("prefs.json");
        fs::write(&path, r#"{ "pgs_auth": { "type": "bool", "value": "yes" } }"#).expect("seed");

        let error = Preferences::open(&path).expect_err("malformed");
        match error {
            PreferenceError::Parse { location, .. } => assert!(location.starts_with("pgs_auth")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn in_memory_flush_is_a_no_op() {
        let prefs = Preferences::in_memory();
        prefs.put(PREF_FIRST_GAME, false);
        prefs.flush().expect("flush");
        assert!(prefs.path().is_none());
    }
}
