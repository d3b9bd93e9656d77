//! Snapshot providers for loading and storing the policy graph.

use crate::{
    error::{Error, Result},
    graph::Configuration,
};
use std::sync::{Arc, RwLock};

/// Trait for loading and storing whole configuration snapshots.
pub trait ConfigurationSource: Send + Sync {
    /// Load the full configuration.
    fn load(&self) -> Result<Configuration>;

    /// Store the full configuration, replacing what was stored before.
    fn store(&mut self, configuration: &Configuration) -> Result<()>;
}

/// Adjusts every snapshot read by [`ConfigurationManager::load`] before it is validated.
///
/// When any modifier reports a change, the adjusted snapshot is written back to the
/// source.
///
/// [`ConfigurationManager::load`]: crate::manager::ConfigurationManager::load
pub trait ConfigurationModifier: Send + Sync {
    /// Modify `configuration` in place; return `true` if anything changed.
    fn apply(&self, configuration: &mut Configuration) -> bool;
}

impl<F> ConfigurationModifier for F
where
    F: Fn(&mut Configuration) -> bool + Send + Sync,
{
    fn apply(&self, configuration: &mut Configuration) -> bool {
        self(configuration)
    }
}

/// In-memory snapshot provider. Clones share the same stored snapshot.
#[derive(Debug, Default, Clone)]
pub struct MemoryConfigurationSource {
    snapshot: Arc<RwLock<Configuration>>,
}

impl MemoryConfigurationSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source that initially holds `configuration`.
    pub fn with_configuration(configuration: Configuration) -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(configuration)),
        }
    }

    /// A copy of the stored snapshot.
    pub fn snapshot(&self) -> Result<Configuration> {
        self.load()
    }
}

impl ConfigurationSource for MemoryConfigurationSource {
    fn load(&self) -> Result<Configuration> {
        self.snapshot
            .read()
            .map(|snapshot| snapshot.clone())
            .map_err(|e| Error::Storage(format!("Snapshot lock poisoned: {e}")))
    }

    fn store(&mut self, configuration: &Configuration) -> Result<()> {
        let mut snapshot = self
            .snapshot
            .write()
            .map_err(|e| Error::Storage(format!("Snapshot lock poisoned: {e}")))?;
        *snapshot = configuration.clone();
        Ok(())
    }
}

/// File-based snapshot provider (requires persistence feature).
#[cfg(feature = "persistence")]
pub mod file_storage {
    use super::*;
    use std::{
        fs::{File, OpenOptions},
        io::{BufReader, BufWriter},
        path::{Path, PathBuf},
    };

    /// Stores the configuration as one pretty-printed JSON document.
    #[derive(Debug, Clone)]
    pub struct FileConfigurationSource {
        storage_path: PathBuf,
    }

    impl FileConfigurationSource {
        /// Create a source backed by `storage_path`, creating its directory if needed.
        pub fn new(storage_path: impl AsRef<Path>) -> Result<Self> {
            let storage_path = storage_path.as_ref().to_path_buf();

            if let Some(parent) = storage_path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::Storage(format!("Failed to create storage directory: {}", e))
                })?;
            }

            Ok(Self { storage_path })
        }

        /// Get the storage file path.
        pub fn storage_path(&self) -> &Path {
            &self.storage_path
        }
    }

    impl ConfigurationSource for FileConfigurationSource {
        fn load(&self) -> Result<Configuration> {
            if !self.storage_path.exists() {
                return Ok(Configuration::default());
            }

            let file = File::open(&self.storage_path)
                .map_err(|e| Error::Storage(format!("Failed to open storage file: {}", e)))?;

            serde_json::from_reader(BufReader::new(file))
                .map_err(|e| Error::Storage(format!("Failed to parse storage file: {}", e)))
        }

        fn store(&mut self, configuration: &Configuration) -> Result<()> {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&self.storage_path)
                .map_err(|e| Error::Storage(format!("Failed to create storage file: {}", e)))?;

            serde_json::to_writer_pretty(BufWriter::new(file), configuration)
                .map_err(|e| Error::Storage(format!("Failed to write storage file: {}", e)))
        }
    }
}

#[cfg(feature = "persistence")]
pub use file_storage::FileConfigurationSource;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::Role;

    #[test]
    fn test_memory_source() {
        let mut source = MemoryConfigurationSource::new();
        assert!(source.load().unwrap().is_empty());

        let configuration = Configuration {
            roles: vec![Role::new("r1", "R1")],
            ..Configuration::default()
        };
        source.store(&configuration).unwrap();

        let shared = source.clone();
        assert_eq!(shared.snapshot().unwrap(), configuration);
    }

    #[test]
    fn test_closure_modifier() {
        let rename = |configuration: &mut Configuration| {
            let mut changed = false;
            for role in &mut configuration.roles {
                if role.name == "Old" {
                    role.name = "New".to_string();
                    changed = true;
                }
            }
            changed
        };

        let mut configuration = Configuration {
            roles: vec![Role::new("r1", "Old")],
            ..Configuration::default()
        };
        assert!(rename.apply(&mut configuration));
        assert_eq!(configuration.roles[0].name, "New");
        assert!(!rename.apply(&mut configuration));
    }

    #[cfg(feature = "persistence")]
    #[test]
    fn test_file_source() {
        use std::env;

        let storage_path = env::temp_dir().join("rbac_policy_test_configuration.json");
        let _ = std::fs::remove_file(&storage_path);

        let configuration = Configuration {
            roles: vec![Role::new("file-role", "File Role").add_privilege("p1")],
            ..Configuration::default()
        };

        {
            let mut source = FileConfigurationSource::new(&storage_path).unwrap();
            assert!(source.load().unwrap().is_empty());
            source.store(&configuration).unwrap();
            assert!(storage_path.exists());
        }

        {
            let source = FileConfigurationSource::new(&storage_path).unwrap();
            assert_eq!(source.load().unwrap(), configuration);
        }

        let _ = std::fs::remove_file(&storage_path);
    }
}
