use log::debug;
use shared::protocol::AllTimeEntry;
use std::error::Error;
use std::io::ErrorKind;
use std::path::PathBuf;

/// All-time score persistence: one JSON document, read once at startup,
/// rewritten whole on every save. Writes are throttled and fired from a
/// detached task by the caller; a failed write is logged there and simply
/// retried on the next save opportunity.
#[derive(Debug, Clone)]
pub struct ScoreStore {
    path: PathBuf,
}

impl ScoreStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Loads the persisted rows. A missing file is an empty table, not
    /// an error; anything else (unreadable file, corrupt JSON) surfaces
    /// to the caller.
    pub async fn load(&self) -> Result<Vec<AllTimeEntry>, Box<dyn Error + Send + Sync>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let entries: Vec<AllTimeEntry> = serde_json::from_slice(&bytes)?;
                debug!("Loaded {} all-time rows from {:?}", entries.len(), self.path);
                Ok(entries)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Replaces the document with the given ranked rows.
    pub async fn save(&self, entries: &[AllTimeEntry]) -> Result<(), Box<dyn Error + Send + Sync>> {
        let json = serde_json::to_vec_pretty(entries)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}
