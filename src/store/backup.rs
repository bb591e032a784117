// Online backup and restore
//
// Uses SQLite's native backup API through an open connection, so backups are
// consistent even while readers are active. Restore refuses to overwrite a
// store that looks open (live WAL/SHM sidecars).

use super::GraphStore;
use crate::error::{BombeError, Result};
use rusqlite::MAIN_DB;
use std::path::Path;
use tracing::info;

impl GraphStore {
    /// Online backup of the open store to `destination`.
    pub fn backup_to(&self, destination: &Path) -> Result<()> {
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| BombeError::io(parent.display().to_string(), e))?;
        }
        self.conn
            .backup(MAIN_DB, destination, None)?;
        info!("backed up graph store to {}", destination.display());
        Ok(())
    }

    /// Restore a backup into `target`, then open it. Refuses when the target
    /// appears to be an open store.
    pub fn restore_from(backup_path: &Path, target: &Path) -> Result<GraphStore> {
        for sidecar in ["-wal", "-shm"] {
            let mut live = target.as_os_str().to_owned();
            live.push(sidecar);
            let live = Path::new(&live);
            if live.exists() && std::fs::metadata(live).map(|m| m.len() > 0).unwrap_or(false) {
                return Err(BombeError::Config(format!(
                    "refusing restore: {} appears to be open (live {} sidecar)",
                    target.display(),
                    sidecar
                )));
            }
        }
        if !backup_path.exists() {
            return Err(BombeError::io(
                backup_path.display().to_string(),
                std::io::Error::new(std::io::ErrorKind::NotFound, "backup file not found"),
            ));
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| BombeError::io(parent.display().to_string(), e))?;
        }
        std::fs::copy(backup_path, target)
            .map_err(|e| BombeError::io(target.display().to_string(), e))?;
        info!(
            "restored graph store from {} to {}",
            backup_path.display(),
            target.display()
        );
        GraphStore::open(target)
    }
}
