use super::layout::{is_valid_profile_name, StateLayout};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Driver tag of profiles that run Kubernetes directly on this host.
pub const DRIVER_NONE: &str = "none";

const DEFAULT_BOOTSTRAPPER: &str = "k3s";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("profile \"{0}\" does not exist")]
    NotFound(String),
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Persisted cluster configuration of a single profile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub driver: String,
    #[serde(default)]
    pub kubernetes_version: String,
    #[serde(default = "default_bootstrapper")]
    pub bootstrapper: String,
}

impl ClusterConfig {
    /// True when the profile has no VM and Kubernetes runs on this host.
    pub fn is_in_place(&self) -> bool {
        self.driver.trim().eq_ignore_ascii_case(DRIVER_NONE)
    }
}

fn default_bootstrapper() -> String {
    DEFAULT_BOOTSTRAPPER.to_string()
}

/// Profile metadata plus the per-profile configuration files.
pub trait ProfileRegistry {
    /// Known profile names in registration order, without duplicates.
    fn list(&self) -> Result<Vec<String>, StoreError>;

    fn load_config(&self, profile: &str) -> Result<ClusterConfig, StoreError>;

    /// Drop the metadata entry of `profile`. Absent entries yield `NotFound`.
    fn remove(&self, profile: &str) -> Result<(), StoreError>;

    /// Clear the `active` setting if it names `profile`. Returns true when cleared.
    fn clear_active(&self, profile: &str) -> Result<bool, StoreError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    active: Option<String>,
    #[serde(default)]
    profiles: Vec<String>,
}

/// Registry persisted as `profiles.json` under the state root.
pub struct FileRegistry {
    layout: StateLayout,
}

impl FileRegistry {
    pub fn new(layout: StateLayout) -> Self {
        Self { layout }
    }

    fn read_document(&self) -> Result<Option<RegistryDocument>, StoreError> {
        let path = self.layout.registry_file();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::Parse { path, source })
    }

    fn write_document(&self, doc: &RegistryDocument) -> Result<(), StoreError> {
        let path = self.layout.registry_file();
        let raw = serde_json::to_string_pretty(doc).map_err(|source| StoreError::Parse {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, format!("{raw}\n")).map_err(|source| StoreError::Io { path, source })
    }
}

impl ProfileRegistry for FileRegistry {
    fn list(&self) -> Result<Vec<String>, StoreError> {
        let Some(doc) = self.read_document()? else {
            return Ok(Vec::new());
        };
        Ok(unique_names(doc.profiles))
    }

    fn load_config(&self, profile: &str) -> Result<ClusterConfig, StoreError> {
        read_config(&self.layout.profile_config(profile), profile)
    }

    fn remove(&self, profile: &str) -> Result<(), StoreError> {
        let Some(mut doc) = self.read_document()? else {
            return Err(StoreError::NotFound(profile.to_string()));
        };
        let before = doc.profiles.len();
        doc.profiles.retain(|name| name.trim() != profile);
        if doc.profiles.len() == before {
            return Err(StoreError::NotFound(profile.to_string()));
        }
        self.write_document(&doc)
    }

    fn clear_active(&self, profile: &str) -> Result<bool, StoreError> {
        let Some(mut doc) = self.read_document()? else {
            return Ok(false);
        };
        if doc.active.as_deref() != Some(profile) {
            return Ok(false);
        }
        doc.active = None;
        self.write_document(&doc)?;
        Ok(true)
    }
}

fn read_config(path: &Path, profile: &str) -> Result<ClusterConfig, StoreError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(StoreError::NotFound(profile.to_string()))
        }
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&raw).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn unique_names(names: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .filter(|name| {
            let valid = is_valid_profile_name(name);
            if !valid {
                log::warn!("Skipping invalid profile name {:?} in the registry", name);
            }
            valid
        })
        .filter(|name| seen.insert(name.clone()))
        .collect()
}
