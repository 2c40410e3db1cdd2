/// Persisted model artifacts.
///
/// A trained model is stored as one JSON document at a single named location.
/// Saves are atomic (temp file in the same directory, fsync, rename), so a
/// reader sees either the previous artifact or the new one, never a partial
/// write. Each artifact carries a monotonically increasing `version` and its
/// `trained_at` time; `ArtifactHandle` exposes both so callers can detect a
/// stale model.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;
use thiserror::Error;
use tracing::{debug, info};

use crate::analysis::features::{FeatureLayout, FeatureVector};
use crate::forecast::regression::{FitMetrics, LinearModel, RegressionError};

/// Bumped when the artifact document layout changes incompatibly.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("model artifact I/O failed at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("corrupt model artifact at {path}: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize model artifact: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("model artifact at {path} has format version {found}, expected {expected}")]
    UnsupportedFormat {
        path: String,
        found: u32,
        expected: u32,
    },
}

// ---------------------------------------------------------------------------
// Artifact document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub version: u64,
    pub trained_at: DateTime<Utc>,
    pub target_station: String,
    pub horizon_hours: u32,
    pub lag_hours: u32,
    /// Feature column names in model input order.
    pub feature_names: Vec<String>,
    pub samples: usize,
    /// Hours of the first and last training rows.
    pub span_start: DateTime<Utc>,
    pub span_end: DateTime<Utc>,
    /// Fit on the training rows themselves.
    pub in_sample: FitMetrics,
    pub model: LinearModel,
}

impl ModelArtifact {
    pub fn predict(&self, features: &FeatureVector) -> Result<f64, RegressionError> {
        self.model.predict(features.values())
    }

    /// Checks the artifact was trained for this layout, target and horizon.
    /// The error text names the first mismatch.
    pub fn check_compatible(
        &self,
        layout: &FeatureLayout,
        target_station: &str,
        horizon_hours: u32,
    ) -> Result<(), String> {
        if self.target_station != target_station {
            return Err(format!(
                "model targets {}, configuration targets {}",
                self.target_station, target_station
            ));
        }
        if self.horizon_hours != horizon_hours {
            return Err(format!(
                "model horizon is {} h, configuration asks for {} h",
                self.horizon_hours, horizon_hours
            ));
        }
        let expected = layout.feature_names();
        if self.feature_names != expected {
            return Err(format!(
                "model features [{}] differ from configured [{}]",
                self.feature_names.join(", "),
                expected.join(", ")
            ));
        }
        if self.model.width() != expected.len() {
            return Err(format!(
                "model has {} coefficients for {} features",
                self.model.width(),
                expected.len()
            ));
        }
        Ok(())
    }

    pub fn handle(&self, location: &str) -> ArtifactHandle {
        ArtifactHandle {
            location: location.to_string(),
            version: self.version,
            trained_at: self.trained_at,
            samples: self.samples,
        }
    }
}

/// Identifies a persisted artifact without holding the model itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHandle {
    pub location: String,
    pub version: u64,
    pub trained_at: DateTime<Utc>,
    pub samples: usize,
}

impl ArtifactHandle {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.trained_at
    }

    /// True once the artifact is older than `max_age`.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.age(now) > max_age
    }
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

/// The single current-model location.
pub trait ArtifactStore {
    /// The current artifact, or `None` if nothing has been trained yet.
    fn load(&self) -> Result<Option<ModelArtifact>, ArtifactError>;

    /// Replaces the current artifact.
    fn save(&self, artifact: &ModelArtifact) -> Result<ArtifactHandle, ArtifactError>;

    /// Human-readable location for logs and handles.
    fn describe(&self) -> String;
}

fn lock_recovering<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct CachedArtifact {
    modified: SystemTime,
    len: u64,
    file_id: u64,
    artifact: ModelArtifact,
}

/// Identity of the file behind the path. Every save renames a fresh file
/// into place, so this changes even when mtime and length do not.
#[cfg(unix)]
fn file_id(metadata: &fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    metadata.ino()
}

#[cfg(not(unix))]
fn file_id(_metadata: &fs::Metadata) -> u64 {
    0
}

/// JSON file store. Parsed artifacts are cached until the file's
/// modification time, length or inode changes.
pub struct FileArtifactStore {
    path: PathBuf,
    cache: Mutex<Option<CachedArtifact>>,
}

impl FileArtifactStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: io::Error) -> ArtifactError {
        ArtifactError::Io {
            path: self.describe(),
            source,
        }
    }
}

impl ArtifactStore for FileArtifactStore {
    fn load(&self) -> Result<Option<ModelArtifact>, ArtifactError> {
        let mut cache = lock_recovering(&self.cache);

        let metadata = match fs::metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                *cache = None;
                return Ok(None);
            }
            Err(e) => return Err(self.io_error(e)),
        };
        let modified = metadata.modified().map_err(|e| self.io_error(e))?;
        let len = metadata.len();
        let id = file_id(&metadata);

        if let Some(cached) = cache.as_ref() {
            if cached.modified == modified && cached.len == len && cached.file_id == id {
                debug!(path = %self.describe(), version = cached.artifact.version, "Model artifact served from cache");
                return Ok(Some(cached.artifact.clone()));
            }
        }

        let data = fs::read(&self.path).map_err(|e| self.io_error(e))?;
        let artifact: ModelArtifact =
            serde_json::from_slice(&data).map_err(|source| ArtifactError::Corrupt {
                path: self.describe(),
                source,
            })?;
        if artifact.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(ArtifactError::UnsupportedFormat {
                path: self.describe(),
                found: artifact.format_version,
                expected: ARTIFACT_FORMAT_VERSION,
            });
        }

        debug!(path = %self.describe(), version = artifact.version, "Loaded model artifact");
        *cache = Some(CachedArtifact {
            modified,
            len,
            file_id: id,
            artifact: artifact.clone(),
        });
        Ok(Some(artifact))
    }

    fn save(&self, artifact: &ModelArtifact) -> Result<ArtifactHandle, ArtifactError> {
        let json = serde_json::to_vec_pretty(artifact).map_err(ArtifactError::Serialize)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let tmp_path = self.temp_path();
        let mut file = fs::File::create(&tmp_path).map_err(|e| self.io_error(e))?;
        file.write_all(&json).map_err(|e| self.io_error(e))?;
        file.sync_all().map_err(|e| self.io_error(e))?;
        drop(file);
        fs::rename(&tmp_path, &self.path).map_err(|e| self.io_error(e))?;

        *lock_recovering(&self.cache) = None;
        info!(path = %self.describe(), version = artifact.version, "Saved model artifact");
        Ok(artifact.handle(&self.describe()))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-process store for tests and dry runs.
#[derive(Default)]
pub struct MemoryArtifactStore {
    current: Mutex<Option<ModelArtifact>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_artifact(artifact: ModelArtifact) -> Self {
        Self {
            current: Mutex::new(Some(artifact)),
        }
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn load(&self) -> Result<Option<ModelArtifact>, ArtifactError> {
        Ok(lock_recovering(&self.current).clone())
    }

    fn save(&self, artifact: &ModelArtifact) -> Result<ArtifactHandle, ArtifactError> {
        *lock_recovering(&self.current) = Some(artifact.clone());
        Ok(artifact.handle(&self.describe()))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
