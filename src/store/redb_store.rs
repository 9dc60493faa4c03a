//! On-disk artifact store backed by redb

use super::{ArtifactStore, StoreError};
use crate::models::ModelParameters;
use redb::{Database, ReadableTable, TableDefinition};
use std::path::{Path, PathBuf};

// redb table definitions
const MODELS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("models");
const PARAMETERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("model_parameters");

/// Model store living in `<dir>/models.redb`
pub struct RedbStore {
    db: Database,
    path: PathBuf,
}

impl RedbStore {
    pub const FILENAME: &'static str = "models.redb";

    /// Create or open the store inside `dir`
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(Self::FILENAME);
        let db = Database::create(&path)?;
        Ok(Self { db, path })
    }

    /// Open a store that must already exist (serving side)
    pub fn open_existing(dir: &Path) -> Result<Self, StoreError> {
        let path = dir.join(Self::FILENAME);
        if !path.is_file() {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no model store at {}", path.display()),
            )));
        }
        let db = Database::open(&path)?;
        Ok(Self { db, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_value(
        &self,
        table: TableDefinition<&str, &[u8]>,
        id: &str,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let read_txn = self.db.begin_read()?;
        // Fresh database: nothing written yet
        let table = match read_txn.open_table(table) {
            Ok(t) => t,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let value = table.get(id)?.map(|v| v.value().to_vec());
        Ok(value)
    }

    fn write_value(
        &self,
        table: TableDefinition<&str, &[u8]>,
        id: &str,
        value: &[u8],
    ) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(table)?;
            table.insert(id, value)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

impl ArtifactStore for RedbStore {
    fn put_blob(&self, id: &str, blob: &[u8]) -> Result<(), StoreError> {
        self.write_value(MODELS_TABLE, id, blob)
    }

    fn get_blob(&self, id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.read_value(MODELS_TABLE, id)
    }

    fn upsert_parameters(&self, id: &str, params: &ModelParameters) -> Result<(), StoreError> {
        let row = serde_json::to_vec(params)?;
        // redb insert replaces any existing value for the key
        self.write_value(PARAMETERS_TABLE, id, &row)
    }

    fn get_parameters(&self, id: &str) -> Result<Option<ModelParameters>, StoreError> {
        match self.read_value(PARAMETERS_TABLE, id)? {
            Some(row) => Ok(Some(serde_json::from_slice(&row)?)),
            None => Ok(None),
        }
    }

    fn blob_ids(&self) -> Result<Vec<String>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = match read_txn.open_table(MODELS_TABLE) {
            Ok(t) => t,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        for item in table.iter()? {
            let (key, _) = item?;
            ids.push(key.value().to_string());
        }
        Ok(ids)
    }

    fn write_batch(&self, entries: &[(String, Vec<u8>, ModelParameters)]) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut models = write_txn.open_table(MODELS_TABLE)?;
            let mut parameters = write_txn.open_table(PARAMETERS_TABLE)?;
            for (id, blob, params) in entries {
                let row = serde_json::to_vec(params)?;
                models.insert(id.as_str(), blob.as_slice())?;
                parameters.insert(id.as_str(), row.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }
}
