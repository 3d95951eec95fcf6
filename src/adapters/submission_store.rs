//! JSON file store for submission records, one file per protocol number.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::submission::SubmissionRecord;
use crate::domain::types::ProtocolId;
use crate::infra::error::{SifenError, SifenResult};
use crate::infra::logging::Logger;

pub struct SubmissionStore {
    dir: PathBuf,
    logger: Logger,
}

impl SubmissionStore {
    pub fn new(dir: impl AsRef<Path>, logger: &Logger) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            logger: logger.child("store"),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, protocol: &ProtocolId) -> PathBuf {
        self.dir.join(format!("{protocol}.json"))
    }

    /// Write the record, replacing any earlier version atomically.
    pub fn save(&self, record: &SubmissionRecord) -> SifenResult<()> {
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(record)
            .map_err(|e| SifenError::IoError(format!("cannot serialize record: {e}")))?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        std::io::Write::write_all(&mut tmp, json.as_bytes())?;
        tmp.persist(self.path_for(&record.protocol))
            .map_err(|e| SifenError::IoError(e.to_string()))?;
        Ok(())
    }

    pub fn load(&self, protocol: &ProtocolId) -> SifenResult<Option<SubmissionRecord>> {
        let path = self.path_for(protocol);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content).map(Some).map_err(|e| {
            SifenError::IoError(format!("corrupt record {}: {e}", path.display()))
        })
    }

    /// All stored records, oldest first.
    pub fn list(&self) -> SifenResult<Vec<SubmissionRecord>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut records = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let content = fs::read_to_string(&path)?;
                match serde_json::from_str::<SubmissionRecord>(&content) {
                    Ok(record) => records.push(record),
                    Err(e) => self
                        .logger
                        .warn(format!("skipping unreadable record {}: {e}", path.display())),
                }
            }
        }
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }
}
