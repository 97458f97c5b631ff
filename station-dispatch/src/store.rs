//! JSON files for route configurations and station pools.
//!
//! Layout under the data directory:
//!
//! ```text
//! routes/<train>.json
//! pools/<station>.json
//! ```

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{StationId, TrainId};
use crate::route::RouteConfig;
use crate::transfer::{TransferPool, TransferPools};

/// Errors reading or writing persisted state.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A route configuration together with the train it belongs to. Train ids
/// are not safe file names, so the id is kept inside the file.
#[derive(Debug, Serialize, Deserialize)]
struct SavedRoute {
    train: TrainId,
    config: RouteConfig,
}

/// Saves and loads dispatch state as pretty-printed JSON.
#[derive(Debug, Clone)]
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn save_route(&self, train: &TrainId, config: &RouteConfig) -> Result<(), StoreError> {
        let saved = SavedRoute {
            train: train.clone(),
            config: config.clone(),
        };
        write_json(&self.route_path(train), &saved)
    }

    /// Load a train's configuration. Returns `None` if none was saved.
    pub fn load_route(&self, train: &TrainId) -> Result<Option<RouteConfig>, StoreError> {
        let saved: Option<SavedRoute> = read_json(&self.route_path(train))?;
        Ok(saved.map(|s| s.config))
    }

    /// Every saved route configuration.
    pub fn load_routes(&self) -> Result<Vec<(TrainId, RouteConfig)>, StoreError> {
        let mut routes = Vec::new();
        for path in json_files(&self.root.join("routes"))? {
            if let Some(saved) = read_json::<SavedRoute>(&path)? {
                routes.push((saved.train, saved.config));
            }
        }
        Ok(routes)
    }

    pub fn save_pool(&self, pool: &TransferPool) -> Result<(), StoreError> {
        write_json(&self.pool_path(pool.station()), pool)
    }

    pub fn load_pool(&self, station: &StationId) -> Result<Option<TransferPool>, StoreError> {
        read_json(&self.pool_path(station))
    }

    /// Every saved station pool.
    pub fn load_pools(&self) -> Result<TransferPools, StoreError> {
        let mut pools = TransferPools::new();
        for path in json_files(&self.root.join("pools"))? {
            if let Some(pool) = read_json::<TransferPool>(&path)? {
                pools.insert(pool);
            }
        }
        Ok(pools)
    }

    /// Remove a station's saved pool, if any.
    pub fn delete_pool(&self, station: &StationId) -> Result<(), StoreError> {
        let path = self.pool_path(station);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn route_path(&self, train: &TrainId) -> PathBuf {
        self.root
            .join("routes")
            .join(format!("{}.json", file_stem(train.as_str())))
    }

    fn pool_path(&self, station: &StationId) -> PathBuf {
        self.root
            .join("pools")
            .join(format!("{}.json", station.as_str()))
    }
}

/// Map an arbitrary id to a portable file name.
fn file_stem(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let json = serde_json::to_string_pretty(value).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, json).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "Saved");
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })
}

fn json_files(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(StoreError::Io {
                path: dir.to_path_buf(),
                source,
            });
        }
    };
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Direction;
    use chrono::Utc;
    use tempfile::tempdir;

    fn id(s: &str) -> StationId {
        StationId::parse(s).unwrap()
    }

    #[test]
    fn route_round_trip_keeps_train_id() {
        let dir = tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        let train = TrainId::new("BA 25/2");
        let mut config = RouteConfig::new()
            .with_stops(&[id("a"), id("c")])
            .with_termini(&id("a"), &id("c"));
        config.set_direction(Direction::West);

        store.save_route(&train, &config).unwrap();

        assert!(dir.path().join("routes").join("BA_25_2.json").exists());
        let loaded = store.load_route(&train).unwrap().unwrap();
        assert_eq!(loaded.stop_at(), config.stop_at());
        assert_eq!(loaded.direction(), Direction::West);

        let all = store.load_routes().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].0, train);
    }

    #[test]
    fn missing_files_are_not_errors() {
        let dir = tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("nothing-here"));

        assert!(store.load_route(&TrainId::new("t1")).unwrap().is_none());
        assert!(store.load_pool(&id("hub")).unwrap().is_none());
        assert_eq!(store.load_pools().unwrap().total(), 0);
        store.delete_pool(&id("hub")).unwrap();
    }

    #[test]
    fn pools_are_saved_per_station() {
        let dir = tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        let mut pool = TransferPool::new(id("hub"));
        pool.push_unit(&id("a"), &id("z"), Utc::now());
        pool.push_unit(&id("a"), &id("z"), Utc::now());

        store.save_pool(&pool).unwrap();
        store.save_pool(&TransferPool::new(id("yard"))).unwrap();

        let pools = store.load_pools().unwrap();
        assert_eq!(pools.get(&id("hub")).map(TransferPool::total), Some(2));
        assert!(pools.get(&id("yard")).is_some_and(TransferPool::is_empty));

        store.delete_pool(&id("hub")).unwrap();
        assert!(store.load_pool(&id("hub")).unwrap().is_none());
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        std::fs::create_dir_all(dir.path().join("pools")).unwrap();
        std::fs::write(dir.path().join("pools").join("hub.json"), "{not json").unwrap();

        let err = store.load_pool(&id("hub")).unwrap_err();
        assert!(matches!(err, StoreError::Json { .. }));
        assert!(err.to_string().contains("hub.json"));
    }
}
