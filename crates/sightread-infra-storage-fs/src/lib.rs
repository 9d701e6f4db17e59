use sightread_ports::storage::{SettingsDto, StorageError, StoragePort};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "SightRead";
const SETTINGS_FILE: &str = "settings.json";

/// Settings persisted as pretty JSON under `<config_dir>/SightRead/`.
pub struct FsStorage {
    base_dir: PathBuf,
}

impl FsStorage {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn default_base_dir() -> Result<PathBuf, StorageError> {
        dirs_next::config_dir()
            .map(|base| base.join(APP_DIR))
            .ok_or_else(|| StorageError::Io("no platform config directory".to_string()))
    }

    pub fn settings_path(&self) -> PathBuf {
        self.base_dir.join(SETTINGS_FILE)
    }
}

impl Default for FsStorage {
    fn default() -> Self {
        let base_dir = Self::default_base_dir().unwrap_or_else(|err| {
            log::warn!("storage: {err}, settings go to the working directory");
            PathBuf::from(".")
        });
        Self { base_dir }
    }
}

fn load_or_default<T>(path: &Path) -> Result<T, StorageError>
where
    T: serde::de::DeserializeOwned + Default,
{
    match fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| StorageError::Serde(e.to_string())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            log::debug!("storage: {} missing, using defaults", path.display());
            Ok(T::default())
        }
        Err(err) => Err(StorageError::Io(err.to_string())),
    }
}

// Staged through a sibling temp file; the rename replaces the old document.
fn store<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| StorageError::Serde(e.to_string()))?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StorageError::Io(e.to_string()))?;
    }
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, bytes).map_err(|e| StorageError::Io(e.to_string()))?;
    fs::rename(&staging, path).map_err(|e| StorageError::Io(e.to_string()))
}

impl StoragePort for FsStorage {
    fn load_settings(&self) -> Result<SettingsDto, StorageError> {
        load_or_default(&self.settings_path())
    }

    fn save_settings(&self, s: &SettingsDto) -> Result<(), StorageError> {
        let path = self.settings_path();
        store(&path, s)?;
        log::debug!("storage: settings saved to {}", path.display());
        Ok(())
    }
}
