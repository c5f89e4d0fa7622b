//! The single cached weather blob and the key-value stores that can hold it.

use parking_lot::Mutex;
use std::{
    collections::BTreeMap,
    fmt::Debug,
    fs, io,
    path::{Path, PathBuf},
};

use crate::{WeatherError, WeatherResponse};

/// Name of the store the blob lives in.
pub const PREFERENCE_NAME: &str = "CheckWeatherPreference";
/// Key of the blob inside [`PREFERENCE_NAME`].
pub const WEATHER_RESPONSE_DATA: &str = "weather_response_data";

pub trait KeyValueStore: Send + Sync + Debug {
    fn get_string(&self, key: &str) -> Result<Option<String>, WeatherError>;

    fn put_string(&self, key: &str, value: &str) -> Result<(), WeatherError>;

    fn remove(&self, key: &str) -> Result<(), WeatherError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl KeyValueStore for MemoryStore {
    fn get_string(&self, key: &str) -> Result<Option<String>, WeatherError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn put_string(&self, key: &str, value: &str) -> Result<(), WeatherError> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), WeatherError> {
        self.values.lock().remove(key);
        Ok(())
    }
}

/// A named store persisted as one JSON object per file.
///
/// Every read goes back to disk. Writes land in a sibling temp file first and
/// are renamed over the original.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn open(dir: &Path, name: &str) -> Self {
        Self {
            path: dir.join(format!("{name}.json")),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, WeatherError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    /// Like `read_all`, but a corrupt file is discarded so writes can proceed.
    fn read_for_write(&self) -> Result<BTreeMap<String, String>, WeatherError> {
        match self.read_all() {
            Err(WeatherError::Parse(err)) => {
                tracing::warn!(path = %self.path.display(), error = %err, "store file is corrupt, starting over");
                Ok(BTreeMap::new())
            }
            other => other,
        }
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> Result<(), WeatherError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(values)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get_string(&self, key: &str) -> Result<Option<String>, WeatherError> {
        Ok(self.read_all()?.remove(key))
    }

    fn put_string(&self, key: &str, value: &str) -> Result<(), WeatherError> {
        let _guard = self.write_lock.lock();
        let mut values = self.read_for_write()?;
        values.insert(key.to_string(), value.to_string());
        self.write_all(&values)
    }

    fn remove(&self, key: &str) -> Result<(), WeatherError> {
        let _guard = self.write_lock.lock();
        let mut values = match self.read_all() {
            Ok(values) => values,
            Err(WeatherError::Parse(_)) => return self.write_all(&BTreeMap::new()),
            Err(err) => return Err(err),
        };
        if values.remove(key).is_some() {
            self.write_all(&values)?;
        }
        Ok(())
    }
}

/// Holds at most one weather response: the last one that was fetched.
#[derive(Debug)]
pub struct WeatherCache {
    store: Box<dyn KeyValueStore>,
}

impl WeatherCache {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::default()))
    }

    /// Overwrite the cached blob with `response`.
    pub fn save(&self, response: &WeatherResponse) -> Result<(), WeatherError> {
        let blob = serde_json::to_string(response)?;
        self.store.put_string(WEATHER_RESPONSE_DATA, &blob)?;
        tracing::debug!(bytes = blob.len(), "weather response cached");
        Ok(())
    }

    /// The raw blob, if any was ever stored.
    pub fn blob(&self) -> Result<Option<String>, WeatherError> {
        self.store.get_string(WEATHER_RESPONSE_DATA)
    }

    /// The cached response; `None` when the blob is absent or empty.
    pub fn load(&self) -> Result<Option<WeatherResponse>, WeatherError> {
        match self.blob()? {
            Some(blob) if !blob.is_empty() => Ok(Some(serde_json::from_str(&blob)?)),
            _ => Ok(None),
        }
    }

    pub fn clear(&self) -> Result<(), WeatherError> {
        self.store.remove(WEATHER_RESPONSE_DATA)
    }
}
