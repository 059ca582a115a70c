//! File-based job store.
//! The whole job list lives in one JSON file, read fully at startup and
//! rewritten fully after every change. Writes go to a sibling temp file that
//! is renamed over the target, so a crash never leaves a half-written list.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::ScheduleError;
use crate::jobs::ScheduledJob;

pub struct JobStore {
    path: PathBuf,
}

impl JobStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where [`JobStore::quarantine`] moves an unparseable file.
    pub fn corrupt_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".corrupt");
        self.path.with_file_name(name)
    }

    /// Save all jobs to disk.
    pub fn save(&self, jobs: &[ScheduledJob]) -> Result<(), ScheduleError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| ScheduleError::Store(format!("create dir: {e}")))?;
        let json = serde_json::to_string_pretty(jobs).map_err(|e| ScheduleError::Store(format!("serialize: {e}")))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| ScheduleError::Store(format!("temp file in {}: {e}", dir.display())))?;
        tmp.write_all(json.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| ScheduleError::Store(format!("write {}: {e}", tmp.path().display())))?;
        tmp.persist(&self.path)
            .map_err(|e| ScheduleError::Store(format!("replace {}: {}", self.path.display(), e.error)))?;

        tracing::debug!("💾 Saved {} jobs to {}", jobs.len(), self.path.display());
        Ok(())
    }

    /// Load jobs from disk. A missing file is an empty list; content that is
    /// not a job list is [`ScheduleError::CorruptStore`].
    pub fn load(&self) -> Result<Vec<ScheduledJob>, ScheduleError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let json = std::fs::read_to_string(&self.path)
            .map_err(|e| ScheduleError::Store(format!("read {}: {e}", self.path.display())))?;
        serde_json::from_str(&json)
            .map_err(|e| ScheduleError::CorruptStore(format!("parse {}: {e}", self.path.display())))
    }

    /// Move the current file to [`JobStore::corrupt_path`], replacing any
    /// earlier quarantined copy.
    pub fn quarantine(&self) -> Result<PathBuf, ScheduleError> {
        let target = self.corrupt_path();
        std::fs::rename(&self.path, &target)
            .map_err(|e| ScheduleError::Store(format!("move {} aside: {e}", self.path.display())))?;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cadence::ScheduleKind;
    use crate::jobs::JobSpec;
    use sheetmail_core::Template;

    fn job(name: &str) -> ScheduledJob {
        ScheduledJob::new(JobSpec {
            name: name.into(),
            kind: ScheduleKind::Daily,
            schedule_time: "09:00".into(),
            template: Template::new("s", "b"),
            sheet_url: "sheet".into(),
            sheet_name: "Sheet1".into(),
            batch_size: 10,
            time_gap_secs: 0,
        })
    }

    #[test]
    fn test_save_and_load_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::new(dir.path().join("nested").join("jobs.json"));
        let jobs = vec![job("b"), job("a")];
        store.save(&jobs).unwrap();
        assert_eq!(store.load().unwrap(), jobs);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::new(dir.path().join("jobs.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(JobStore::new(path).load(), Err(ScheduleError::CorruptStore(_))));
    }

    #[test]
    fn test_save_replaces_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.json");
        std::fs::write(&path, "x".repeat(4096)).unwrap();
        let store = JobStore::new(&path);
        store.save(&[job("a")]).unwrap();
        assert_eq!(store.load().unwrap().len(), 1);

        // Only the target remains; the temp file was renamed, not left behind.
        let names: Vec<_> = std::fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(names, vec![std::ffi::OsString::from("jobs.json")]);
    }

    #[test]
    fn test_quarantine_moves_file_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = JobStore::new(&path);

        let moved = store.quarantine().unwrap();
        assert_eq!(moved, dir.path().join("jobs.json.corrupt"));
        assert!(!path.exists());
        assert_eq!(std::fs::read_to_string(moved).unwrap(), "{not json");
    }
}
