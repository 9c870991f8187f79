//! Durable key/value storage for the client, mirroring the browser's
//! localStorage shape: string keys, string values, no transactions. The
//! conversation record and the usage counters layered on top of it are plain
//! JSON strings, so any `Store` implementation can hold them.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{StoreError, StoreResult};
use crate::models::conversation::Conversation;

/// The key the conversation record lives under.
pub const CONVERSATION_KEY: &str = "conversation";

const RECORD_VERSION: u64 = 1;
const COUNTER_PREFIX: &str = "counter.";

/// String-keyed durable storage.
pub trait Store: Send {
    fn get(&self, key: &str) -> StoreResult<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> StoreResult<()>;
    fn remove(&mut self, key: &str) -> StoreResult<()>;
}

/// In-memory store for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> StoreResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StoreResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// File-backed store holding all entries in one JSON object.
///
/// Every mutation rewrites the file through a temporary sibling and a rename,
/// so a crash mid-write leaves the previous contents intact rather than a
/// half-written file.
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    pub fn open<P: Into<PathBuf>>(path: P) -> StoreResult<Self> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(error) if error.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(error) => return Err(error.into()),
        };
        Ok(FileStore { path, entries })
    }

    /// `~/.config/medichat/store.json`
    pub fn default_path() -> StoreResult<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| StoreError::BadPath("no home directory".to_string()))?;
        Ok(home.join(".config").join("medichat").join("store.json"))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn persist(&self) -> StoreResult<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| StoreError::BadPath(self.path.display().to_string()))?;
        fs::create_dir_all(parent)?;

        let raw = serde_json::to_string_pretty(&self.entries)?;
        let staging = self.path.with_extension("tmp");
        fs::write(&staging, raw)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

impl Store for FileStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> StoreResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        self.persist()
    }

    fn remove(&mut self, key: &str) -> StoreResult<()> {
        if self.entries.remove(key).is_some() {
            self.persist()?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ConversationRecord {
    version: u64,
    updated_at: DateTime<Utc>,
    messages: Conversation,
}

/// Read the persisted conversation. No record means an empty conversation; a
/// record from a future schema version is refused without touching it, so a
/// newer client's data survives being opened by an older one.
pub fn load_conversation(store: &dyn Store) -> StoreResult<Conversation> {
    match store.get(CONVERSATION_KEY)? {
        Some(raw) => decode_record(&raw),
        None => Ok(Conversation::new()),
    }
}

fn decode_record(raw: &str) -> StoreResult<Conversation> {
    let value: Value = serde_json::from_str(raw)?;

    // Version-zero records were the bare message array.
    if value.is_array() {
        return Ok(serde_json::from_value(value)?);
    }

    if let Some(version) = value.get("version").and_then(Value::as_u64) {
        if version != RECORD_VERSION {
            return Err(StoreError::UnsupportedVersion(version));
        }
    }

    let record: ConversationRecord = serde_json::from_value(value)?;
    Ok(record.messages)
}

pub fn save_conversation(store: &mut dyn Store, conversation: &Conversation) -> StoreResult<()> {
    let record = ConversationRecord {
        version: RECORD_VERSION,
        updated_at: Utc::now(),
        messages: conversation.clone(),
    };
    store.set(CONVERSATION_KEY, &serde_json::to_string(&record)?)
}

pub fn clear_conversation(store: &mut dyn Store) -> StoreResult<()> {
    store.remove(CONVERSATION_KEY)
}

/// Read a usage counter. Missing or garbled values count as zero; the
/// counters are cosmetic and never worth failing a turn over.
pub fn read_counter(store: &dyn Store, name: &str) -> u64 {
    let key = format!("{COUNTER_PREFIX}{name}");
    match store.get(&key) {
        Ok(Some(raw)) => raw.trim().parse().unwrap_or(0),
        Ok(None) => 0,
        Err(error) => {
            tracing::warn!("reading counter {name} failed: {error}");
            0
        }
    }
}

pub fn bump_counter(store: &mut dyn Store, name: &str) -> StoreResult<u64> {
    let next = read_counter(store, name) + 1;
    let key = format!("{COUNTER_PREFIX}{name}");
    store.set(&key, &next.to_string())?;
    Ok(next)
}

pub fn reset_counter(store: &mut dyn Store, name: &str) -> StoreResult<()> {
    let key = format!("{COUNTER_PREFIX}{name}");
    store.remove(&key)
}
