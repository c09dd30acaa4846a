//! Persistent client identity for the streaming protocol.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use guessme_types::{config::IdentityConfig, protocol::ClientId, GuessmeError, Result};
use serde_json::{Map, Value};
use tracing::{info, warn};

/// Key under which the identifier is stored.
pub const CLIENT_TOKEN_KEY: &str = "clientToken";

/// Key/value storage surviving restarts.
pub trait ClientIdStore: Send + Sync {
    fn load(&self) -> Result<Option<ClientId>>;
    fn save(&self, id: &ClientId) -> Result<()>;
}

/// Return the stored identifier, generating and persisting one on first use.
///
/// Unreadable storage counts as cleared storage.
pub fn resolve_client_id(store: &dyn ClientIdStore) -> Result<ClientId> {
    match store.load() {
        Ok(Some(id)) => return Ok(id),
        Ok(None) => {}
        Err(err) => warn!(error = %err, "client identity unreadable; generating a new one"),
    }
    let id = ClientId::generate();
    store.save(&id)?;
    info!(client_id = %id, "generated client identity");
    Ok(id)
}

/// JSON object on disk; other keys in the same file are preserved.
#[derive(Debug, Clone)]
pub struct FileIdStore {
    path: PathBuf,
}

impl FileIdStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::data_local_dir().map(|dir| dir.join("guessme").join("storage.json"))
    }

    pub fn from_config(config: &IdentityConfig) -> Result<Self> {
        match &config.store_path {
            Some(path) => Ok(Self::new(path)),
            None => Self::default_path()
                .map(Self::new)
                .ok_or_else(|| identity_error("no data directory available for client identity")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<Option<Map<String, Value>>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(identity_error(format!("{}: {err}", self.path.display()))),
        };
        let value: Value = serde_json::from_str(&raw)
            .map_err(|err| identity_error(format!("{}: {err}", self.path.display())))?;
        match value {
            Value::Object(map) => Ok(Some(map)),
            _ => Err(identity_error(format!(
                "{}: expected a JSON object",
                self.path.display()
            ))),
        }
    }
}

impl ClientIdStore for FileIdStore {
    fn load(&self) -> Result<Option<ClientId>> {
        let Some(map) = self.read_map()? else {
            return Ok(None);
        };
        Ok(map
            .get(CLIENT_TOKEN_KEY)
            .and_then(Value::as_str)
            .and_then(ClientId::from_stored))
    }

    fn save(&self, id: &ClientId) -> Result<()> {
        let mut map = self.read_map().ok().flatten().unwrap_or_default();
        map.insert(CLIENT_TOKEN_KEY.into(), Value::String(id.to_string()));
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| identity_error(err.to_string()))?;
        }
        let body = serde_json::to_string_pretty(&Value::Object(map))
            .map_err(|err| identity_error(err.to_string()))?;
        fs::write(&self.path, body).map_err(|err| identity_error(err.to_string()))
    }
}

/// Process-local store, used by tests and one-off commands.
#[derive(Debug, Default)]
pub struct MemoryIdStore {
    slot: Mutex<Option<ClientId>>,
}

impl MemoryIdStore {
    pub fn with_id(id: ClientId) -> Self {
        Self {
            slot: Mutex::new(Some(id)),
        }
    }
}

impl ClientIdStore for MemoryIdStore {
    fn load(&self) -> Result<Option<ClientId>> {
        Ok(self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, id: &ClientId) -> Result<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(id.clone());
        Ok(())
    }
}

fn identity_error(message: impl Into<String>) -> GuessmeError {
    GuessmeError::Identity(message.into())
}
