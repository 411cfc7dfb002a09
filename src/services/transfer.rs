//! Import and export
//!
//! Export writes every record, ids included, as one pretty-printed JSON
//! file. Import reads one file, requires the payload to be a JSON array,
//! and adds each entry as a brand-new record under a fresh id; incoming
//! ids and unknown fields are ignored, so an import can never overwrite
//! an existing record. Entries added before a malformed one stay added.

use crate::database::{NewProblem, Store};
use crate::error::{AppError, Result};
use std::path::Path;

#[derive(Clone)]
pub struct TransferService {
    store: Store,
}

impl TransferService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Export all problems to a single JSON file. Returns the record count.
    pub async fn export_to_file(&self, path: &Path) -> Result<usize> {
        let problems = self.store.list_all().await?;
        let json = serde_json::to_string_pretty(&problems)?;
        tokio::fs::write(path, json).await?;

        tracing::info!("Exported {} problems to {:?}", problems.len(), path);
        Ok(problems.len())
    }

    /// Import problems from a JSON file. Returns the number added.
    pub async fn import_from_file(&self, path: &Path) -> Result<usize> {
        let text = tokio::fs::read_to_string(path).await?;
        self.import_json(&text).await
    }

    /// Import problems from raw JSON text.
    pub async fn import_json(&self, text: &str) -> Result<usize> {
        let payload: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| AppError::ImportFormat(format!("not valid JSON: {}", e)))?;

        let entries = payload.as_array().ok_or_else(|| {
            AppError::ImportFormat("payload must be a sequence of problems".to_string())
        })?;

        let mut imported = 0;
        for (index, entry) in entries.iter().enumerate() {
            let new: NewProblem = serde_json::from_value(entry.clone())
                .map_err(|e| AppError::ImportFormat(format!("entry {}: {}", index, e)))?;

            self.store.add(new).await?;
            imported += 1;
        }

        tracing::info!("Imported {} problems", imported);
        Ok(imported)
    }
}
