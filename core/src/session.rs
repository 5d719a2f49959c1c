//! Client-held authentication state.
//!
//! # Design
//! `Session` is the single owner of the token and profile. It keeps an
//! in-memory copy and mirrors every write into a `SessionStorage`, the durable
//! key-value store that survives restarts. Reads prefer memory and fall back
//! to storage, caching what they find.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StorageError;

pub const TOKEN_KEY: &str = "token";
pub const USER_INFO_KEY: &str = "userInfo";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, alias = "username")]
    pub nickname: String,
    #[serde(default, alias = "avatarUrl")]
    pub avatar: String,
}

/// Durable string key-value storage.
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Process-local storage. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Storage backed by a single JSON object file. A missing file reads as
/// empty and is created on the first write.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(entries)?)?;
        Ok(())
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock();
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock();
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.to_string());
        self.store(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock();
        let mut entries = self.load()?;
        if entries.remove(key).is_some() {
            self.store(&entries)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct SessionState {
    token: Option<String>,
    profile: Option<UserProfile>,
    /// Set by `clear`. Storage is not consulted for a token until the next
    /// `sign_in` or `restore`, so a failed removal cannot resurrect it.
    cleared: bool,
}

pub struct Session {
    state: RwLock<SessionState>,
    storage: Arc<dyn SessionStorage>,
}

impl Session {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            state: RwLock::new(SessionState::default()),
            storage,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Load token and profile from storage into memory. Returns whether a
    /// token was found.
    pub fn restore(&self) -> Result<bool, StorageError> {
        let token = self.storage.get(TOKEN_KEY)?.filter(|t| !t.is_empty());
        let profile: Option<UserProfile> = match self.storage.get(USER_INFO_KEY)? {
            Some(raw) => Some(serde_json::from_str(&raw)?),
            None => None,
        };
        let found = token.is_some();
        let mut state = self.state.write();
        state.token = token;
        state.profile = profile;
        state.cleared = false;
        debug!(authenticated = found, "session restored");
        Ok(found)
    }

    /// Current token: memory first, then storage. A storage failure reads as
    /// no token, and a cleared session never falls back to storage.
    pub fn token(&self) -> Option<String> {
        {
            let state = self.state.read();
            if let Some(token) = state.token.clone() {
                return Some(token);
            }
            if state.cleared {
                return None;
            }
        }
        match self.storage.get(TOKEN_KEY) {
            Ok(Some(token)) if !token.is_empty() => {
                let mut state = self.state.write();
                if state.cleared {
                    return None;
                }
                state.token = Some(token.clone());
                Some(token)
            }
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "failed to read token from storage");
                None
            }
        }
    }

    pub fn profile(&self) -> Option<UserProfile> {
        self.state.read().profile.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    /// Persist the token and profile, then adopt them in memory. On a
    /// storage failure memory is left as it was and the token write is
    /// undone on a best-effort basis.
    pub fn sign_in(&self, token: &str, profile: Option<UserProfile>) -> Result<(), StorageError> {
        let profile_json = profile.as_ref().map(serde_json::to_string).transpose()?;
        self.storage.set(TOKEN_KEY, token)?;
        let profile_written = match &profile_json {
            Some(raw) => self.storage.set(USER_INFO_KEY, raw),
            None => self.storage.remove(USER_INFO_KEY),
        };
        if let Err(err) = profile_written {
            if let Err(e) = self.storage.remove(TOKEN_KEY) {
                warn!(error = %e, "failed to roll back token after profile write failed");
            }
            return Err(err);
        }

        let mut state = self.state.write();
        state.token = Some(token.to_string());
        state.profile = profile;
        state.cleared = false;
        Ok(())
    }

    /// Forget token and profile in memory and storage. Memory is cleared and
    /// stays cleared even when storage fails; both keys are attempted and the
    /// first failure is returned.
    pub fn clear(&self) -> Result<(), StorageError> {
        {
            let mut state = self.state.write();
            state.token = None;
            state.profile = None;
            state.cleared = true;
        }
        let token_removed = self.storage.remove(TOKEN_KEY);
        let profile_removed = self.storage.remove(USER_INFO_KEY);
        token_removed.and(profile_removed)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Session")
            .field("authenticated", &state.token.is_some())
            .field("profile", &state.profile)
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::testing::FlakyStorage;
    use super::*;

    fn profile() -> UserProfile {
        UserProfile {
            id: Some(3),
            nickname: "grape".to_string(),
            avatar: "https://cdn.example.com/a.png".to_string(),
        }
    }

    #[test]
    fn sign_in_writes_memory_and_storage() {
        let storage = Arc::new(MemoryStorage::new());
        let session = Session::new(storage.clone());
        session.sign_in("tok", Some(profile())).unwrap();

        assert_eq!(session.token().as_deref(), Some("tok"));
        assert_eq!(session.profile(), Some(profile()));
        assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("tok"));
        assert!(storage.get(USER_INFO_KEY).unwrap().is_some());
    }

    #[test]
    fn token_falls_back_to_storage() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(TOKEN_KEY, "stored").unwrap();
        let session = Session::new(storage);
        assert_eq!(session.token().as_deref(), Some("stored"));
        assert!(session.is_authenticated());
    }

    #[test]
    fn empty_stored_token_is_absent() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(TOKEN_KEY, "").unwrap();
        let session = Session::new(storage);
        assert!(session.token().is_none());
    }

    #[test]
    fn clear_removes_everything() {
        let storage = Arc::new(MemoryStorage::new());
        let session = Session::new(storage.clone());
        session.sign_in("tok", Some(profile())).unwrap();
        session.clear().unwrap();

        assert!(session.token().is_none());
        assert!(session.profile().is_none());
        assert!(storage.get(TOKEN_KEY).unwrap().is_none());
        assert!(storage.get(USER_INFO_KEY).unwrap().is_none());
    }

    #[test]
    fn restore_reads_profile_with_aliases() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(TOKEN_KEY, "tok").unwrap();
        storage
            .set(USER_INFO_KEY, r#"{"username":"wx_mock_user","avatarUrl":"a.png"}"#)
            .unwrap();
        let session = Session::new(storage);
        assert!(session.restore().unwrap());
        let p = session.profile().unwrap();
        assert_eq!(p.nickname, "wx_mock_user");
        assert_eq!(p.avatar, "a.png");
        assert_eq!(p.id, None);
    }

    #[test]
    fn file_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/session.json");

        let session = Session::new(Arc::new(FileStorage::new(&path)));
        session.sign_in("persisted", Some(profile())).unwrap();

        let reopened = Session::new(Arc::new(FileStorage::new(&path)));
        assert!(reopened.restore().unwrap());
        assert_eq!(reopened.token().as_deref(), Some("persisted"));
        assert_eq!(reopened.profile(), Some(profile()));

        reopened.clear().unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert_eq!(raw.trim(), "{}");
    }

    #[test]
    fn file_storage_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nope.json"));
        assert!(storage.get(TOKEN_KEY).unwrap().is_none());
        storage.remove(TOKEN_KEY).unwrap();
        assert!(!storage.path().exists());
    }

    #[test]
    fn file_storage_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "[1,2").unwrap();
        let storage = FileStorage::new(&path);
        assert!(matches!(storage.get(TOKEN_KEY), Err(StorageError::Format(_))));
    }

    #[test]
    fn failed_clear_does_not_resurrect_stored_token() {
        let storage = Arc::new(FlakyStorage::seeded("stale"));
        storage.fail_remove.store(true, Ordering::SeqCst);
        let session = Session::new(storage.clone());
        assert_eq!(session.token().as_deref(), Some("stale"));

        assert!(matches!(session.clear(), Err(StorageError::Io(_))));
        assert!(session.token().is_none());
        assert!(!session.is_authenticated());
        assert_eq!(storage.stored(TOKEN_KEY).as_deref(), Some("stale"));
    }

    #[test]
    fn clear_attempts_both_keys() {
        struct TokenRemovalFails(MemoryStorage);

        impl SessionStorage for TokenRemovalFails {
            fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
                self.0.get(key)
            }

            fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
                self.0.set(key, value)
            }

            fn remove(&self, key: &str) -> Result<(), StorageError> {
                if key == TOKEN_KEY {
                    return Err(std::io::Error::other("locked").into());
                }
                self.0.remove(key)
            }
        }

        let storage = Arc::new(TokenRemovalFails(MemoryStorage::new()));
        let session = Session::new(storage.clone());
        session.sign_in("tok", Some(profile())).unwrap();

        assert!(session.clear().is_err());
        assert!(storage.0.get(USER_INFO_KEY).unwrap().is_none());
    }

    #[test]
    fn sign_in_after_clear_uses_storage_again() {
        let storage = Arc::new(MemoryStorage::new());
        let session = Session::new(storage.clone());
        session.clear().unwrap();
        session.sign_in("fresh", None).unwrap();
        assert_eq!(session.token().as_deref(), Some("fresh"));

        // An external write is picked up again after restore.
        session.clear().unwrap();
        storage.set(TOKEN_KEY, "external").unwrap();
        assert!(session.token().is_none());
        assert!(session.restore().unwrap());
        assert_eq!(session.token().as_deref(), Some("external"));
    }

    #[test]
    fn failed_sign_in_leaves_memory_untouched() {
        let storage = Arc::new(FlakyStorage::default());
        storage.fail_set.store(true, Ordering::SeqCst);
        let session = Session::new(storage.clone());

        assert!(matches!(session.sign_in("tok", None), Err(StorageError::Io(_))));
        assert!(session.token().is_none());
        assert!(session.profile().is_none());
        assert!(storage.stored(TOKEN_KEY).is_none());
    }

    #[test]
    fn failed_profile_write_rolls_back_token() {
        struct ProfileWriteFails(MemoryStorage);

        impl SessionStorage for ProfileWriteFails {
            fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
                self.0.get(key)
            }

            fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
                if key == USER_INFO_KEY {
                    return Err(std::io::Error::other("disk full").into());
                }
                self.0.set(key, value)
            }

            fn remove(&self, key: &str) -> Result<(), StorageError> {
                self.0.remove(key)
            }
        }

        let storage = Arc::new(ProfileWriteFails(MemoryStorage::new()));
        let session = Session::new(storage.clone());

        assert!(session.sign_in("tok", Some(profile())).is_err());
        assert!(session.token().is_none());
        assert!(storage.0.get(TOKEN_KEY).unwrap().is_none());
    }

    #[test]
    fn token_read_error_reads_as_absent() {
        let storage = Arc::new(FlakyStorage::seeded("tok"));
        storage.fail_get.store(true, Ordering::SeqCst);
        let session = Session::new(storage.clone());
        assert!(session.token().is_none());

        storage.fail_get.store(false, Ordering::SeqCst);
        assert_eq!(session.token().as_deref(), Some("tok"));
    }
}
