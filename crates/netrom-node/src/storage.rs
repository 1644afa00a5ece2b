//! Routing-table persistence.
//!
//! Tables are written atomically (write `.tmp`, then rename) so a crash
//! mid-save leaves the previous copy intact.

use std::path::{Path, PathBuf};

use tokio::fs;

use netrom_transport::{ClassicRoute, Inp3Route, RouteTable, RoutingTables};

use crate::storage_codec;

/// File name for the serialized routing tables.
const ROUTING_TABLE_FILE: &str = "routing_table";

/// Errors from storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),
}

/// Persistent storage for node state.
#[derive(Debug)]
pub struct Storage {
    base_dir: PathBuf,
}

impl Storage {
    /// Open storage at `base_dir`, creating the directory if needed.
    ///
    /// Blocking; call during startup.
    pub fn new(base_dir: PathBuf) -> Result<Self, StorageError> {
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    /// `~/.netrom/storage`, if a home directory is known.
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".netrom").join("storage"))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub async fn save_routing_table(&self, tables: &RoutingTables) -> Result<(), StorageError> {
        let bytes = storage_codec::serialize_routing_tables(tables)
            .map_err(|e| StorageError::Serialize(e.to_string()))?;
        self.atomic_write(&self.base_dir.join(ROUTING_TABLE_FILE), &bytes)
            .await
    }

    /// Load both tables. Empty tables if nothing was saved yet.
    pub async fn load_routing_table(
        &self,
    ) -> Result<(RouteTable<ClassicRoute>, RouteTable<Inp3Route>), StorageError> {
        let path = self.base_dir.join(ROUTING_TABLE_FILE);
        match fs::read(&path).await {
            Ok(bytes) => storage_codec::deserialize_routing_tables(&bytes)
                .map_err(|e| StorageError::Deserialize(e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok((RouteTable::new(), RouteTable::new()))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn atomic_write(&self, path: &Path, data: &[u8]) -> Result<(), StorageError> {
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, data).await?;
        fs::rename(&tmp_path, path).await?;
        Ok(())
    }
}
