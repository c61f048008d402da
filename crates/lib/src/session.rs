//! Per-conversation form sessions.
//!
//! Each (channel_id, conversation_id) gets its own slot guarded by its own async mutex. A turn
//! locks its conversation's slot for its whole duration, so turns of one conversation run one
//! after another while other conversations proceed in parallel. There is no state shared
//! across conversations beyond the slot map itself.
//!
//! With a sessions directory, a slot is read from disk the first time it is locked and written
//! back by `persist` at the end of the turn. `release` drops slots that hold no session.

use crate::form::FormSession;
use base64::Engine;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Conversation identity: channel id + channel-side conversation id.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct ConversationKey {
    pub channel_id: String,
    pub conversation_id: String,
}

impl ConversationKey {
    pub fn new(channel_id: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            conversation_id: conversation_id.into(),
        }
    }

    /// Filesystem-safe name for this key's session file.
    fn file_name(&self) -> String {
        let raw = format!("{}\n{}", self.channel_id, self.conversation_id);
        format!(
            "{}.json",
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(raw.as_bytes())
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("session file {path} is not a valid session: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Default)]
struct Slot {
    loaded: bool,
    session: Option<FormSession>,
}

/// Exclusive access to one conversation's session for the duration of a turn.
pub struct SessionGuard {
    key: ConversationKey,
    slot: OwnedMutexGuard<Slot>,
}

impl SessionGuard {
    pub fn key(&self) -> &ConversationKey {
        &self.key
    }

    pub fn session(&self) -> Option<&FormSession> {
        self.slot.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut FormSession> {
        self.slot.session.as_mut()
    }

    pub fn is_active(&self) -> bool {
        self.slot
            .session
            .as_ref()
            .is_some_and(|s| !s.is_finished())
    }

    pub fn set(&mut self, session: FormSession) {
        self.slot.session = Some(session);
    }

    pub fn clear(&mut self) -> Option<FormSession> {
        self.slot.session.take()
    }
}

/// Store of form sessions keyed by conversation.
pub struct SessionStore {
    slots: RwLock<HashMap<ConversationKey, Arc<Mutex<Slot>>>>,
    dir: Option<PathBuf>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// In-memory only; sessions are lost on restart.
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            dir: None,
        }
    }

    /// Sessions are persisted as one JSON file per conversation under `dir`.
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            dir: Some(dir.as_ref().to_path_buf()),
        }
    }

    async fn slot(&self, key: &ConversationKey) -> Arc<Mutex<Slot>> {
        if let Some(slot) = self.slots.read().await.get(key) {
            return slot.clone();
        }
        self.slots
            .write()
            .await
            .entry(key.clone())
            .or_default()
            .clone()
    }

    /// Lock a conversation's slot, loading it from disk on first use. Waits for any turn
    /// of the same conversation that is still running.
    pub async fn lock(&self, key: &ConversationKey) -> Result<SessionGuard, SessionError> {
        let mut slot = self.slot(key).await.lock_owned().await;
        if !slot.loaded {
            if let Some(ref dir) = self.dir {
                slot.session = match read_session(&dir.join(key.file_name())).await {
                    Err(SessionError::Json { path, source }) => {
                        log::warn!("discarding unreadable session {}: {}", path.display(), source);
                        None
                    }
                    other => other?,
                };
            }
            slot.loaded = true;
        }
        Ok(SessionGuard {
            key: key.clone(),
            slot,
        })
    }

    /// Write the guarded session to disk (or remove its file when there is none). No-op in memory mode.
    pub async fn persist(&self, guard: &SessionGuard) -> Result<(), SessionError> {
        let Some(ref dir) = self.dir else {
            return Ok(());
        };
        let path = dir.join(guard.key.file_name());
        match guard.session() {
            Some(session) => {
                let json = serde_json::to_string_pretty(session).map_err(|source| {
                    SessionError::Json {
                        path: path.clone(),
                        source,
                    }
                })?;
                tokio::fs::create_dir_all(dir)
                    .await
                    .map_err(|source| SessionError::Io {
                        path: dir.clone(),
                        source,
                    })?;
                tokio::fs::write(&path, json)
                    .await
                    .map_err(|source| SessionError::Io { path, source })
            }
            None => match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(source) => Err(SessionError::Io { path, source }),
            },
        }
    }

    /// End a turn. Slots without a session are forgotten once no other turn holds or waits on them.
    pub async fn release(&self, guard: SessionGuard) {
        if guard.session().is_some() {
            return;
        }
        let mut slots = self.slots.write().await;
        let key = guard.key.clone();
        drop(guard);
        if slots.get(&key).is_some_and(|slot| Arc::strong_count(slot) == 1) {
            slots.remove(&key);
        }
    }

    /// Number of conversations with a form in progress (loaded slots only).
    pub async fn active_count(&self) -> usize {
        let slots: Vec<Arc<Mutex<Slot>>> = self.slots.read().await.values().cloned().collect();
        let mut n = 0;
        for slot in slots {
            // Skip slots held by a running turn rather than waiting on them.
            if let Ok(s) = slot.try_lock() {
                if s.session.as_ref().is_some_and(|f| !f.is_finished()) {
                    n += 1;
                }
            }
        }
        n
    }
}

async fn read_session(path: &Path) -> Result<Option<FormSession>, SessionError> {
    match tokio::fs::read_to_string(path).await {
        Ok(s) => serde_json::from_str(&s)
            .map(Some)
            .map_err(|source| SessionError::Json {
                path: path.to_path_buf(),
                source,
            }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(SessionError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pizza::pizza_form;
    use std::time::Duration;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("pizzabot-sessions-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn conversations_have_separate_slots() {
        let store = SessionStore::new();
        let form = pizza_form(3).unwrap();
        let a = ConversationKey::new("emulator", "a");
        let b = ConversationKey::new("emulator", "b");

        let mut guard = store.lock(&a).await.unwrap();
        guard.set(form.start().0);
        drop(guard);

        assert!(store.lock(&a).await.unwrap().is_active());
        assert!(!store.lock(&b).await.unwrap().is_active());
        assert_eq!(store.active_count().await, 1);
    }

    #[tokio::test]
    async fn second_turn_waits_for_the_first() {
        let store = Arc::new(SessionStore::new());
        let key = ConversationKey::new("emulator", "c");
        let form = Arc::new(pizza_form(3).unwrap());

        let first = store.lock(&key).await.unwrap();
        let waiter = {
            let store = store.clone();
            let key = key.clone();
            tokio::spawn(async move { store.lock(&key).await.unwrap().is_active() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        let mut first = first;
        first.set(form.start().0);
        drop(first);
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn persisted_session_survives_a_new_store() {
        let dir = temp_dir();
        let key = ConversationKey::new("emulator", "conv/with:odd chars");
        let form = pizza_form(3).unwrap();
        let (mut session, _) = form.start();
        form.step(&mut session, "large").unwrap();

        let store = SessionStore::with_dir(&dir);
        let mut guard = store.lock(&key).await.unwrap();
        guard.set(session.clone());
        store.persist(&guard).await.unwrap();
        drop(guard);

        let reopened = SessionStore::with_dir(&dir);
        let mut guard = reopened.lock(&key).await.unwrap();
        assert_eq!(guard.session(), Some(&session));
        form.resume(guard.session().unwrap()).unwrap();

        guard.clear();
        reopened.persist(&guard).await.unwrap();
        assert!(!dir.join(key.file_name()).exists());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn unreadable_session_file_starts_fresh() {
        let dir = temp_dir();
        let key = ConversationKey::new("emulator", "broken");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(key.file_name()), "{ not a session").unwrap();

        let store = SessionStore::with_dir(&dir);
        let guard = store.lock(&key).await.unwrap();
        assert!(guard.session().is_none());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn released_empty_slots_are_forgotten() {
        let store = SessionStore::new();
        for i in 0..1000 {
            let guard = store.lock(&ConversationKey::new("emulator", format!("c{}", i))).await.unwrap();
            store.release(guard).await;
        }
        assert_eq!(store.slots.read().await.len(), 0);

        let form = pizza_form(3).unwrap();
        let key = ConversationKey::new("emulator", "ordering");
        let mut guard = store.lock(&key).await.unwrap();
        guard.set(form.start().0);
        store.release(guard).await;
        assert_eq!(store.slots.read().await.len(), 1);
        assert!(store.lock(&key).await.unwrap().is_active());
    }

    #[tokio::test]
    async fn release_keeps_a_slot_another_turn_is_waiting_on() {
        let store = Arc::new(SessionStore::new());
        let key = ConversationKey::new("emulator", "busy");
        let form = pizza_form(3).unwrap();

        let first = store.lock(&key).await.unwrap();
        let waiter = {
            let store = store.clone();
            let key = key.clone();
            tokio::spawn(async move {
                let mut guard = store.lock(&key).await.unwrap();
                guard.set(form.start().0);
                store.release(guard).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        store.release(first).await;
        waiter.await.unwrap();

        assert_eq!(store.slots.read().await.len(), 1);
        assert!(store.lock(&key).await.unwrap().is_active());
    }
}
