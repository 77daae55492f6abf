use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Offset, Utc};

use super::record::AuditRecord;
use crate::config::Audit;

/// Writes audit records as pretty JSON into a success or failure directory.
///
/// File names are the local second (`YYYYmmddHHMMSS.log`) in a fixed UTC
/// offset, so two records written within the same second share a name and
/// the later one wins.
#[derive(Debug, Clone)]
pub struct AuditLogger {
    success_dir: PathBuf,
    failure_dir: PathBuf,
    offset: FixedOffset,
}

impl AuditLogger {
    pub fn new(
        success_dir: impl Into<PathBuf>,
        failure_dir: impl Into<PathBuf>,
        utc_offset_hours: i32,
    ) -> Self {
        let offset = utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix());
        Self {
            success_dir: success_dir.into(),
            failure_dir: failure_dir.into(),
            offset,
        }
    }

    pub fn from_config(audit: &Audit) -> Self {
        Self::new(&audit.success_dir, &audit.failure_dir, audit.utc_offset_hours)
    }

    /// Create both bucket directories.
    pub async fn ensure_dirs(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.success_dir).await?;
        tokio::fs::create_dir_all(&self.failure_dir).await
    }

    pub fn bucket(&self, success: bool) -> &Path {
        if success {
            &self.success_dir
        } else {
            &self.failure_dir
        }
    }

    pub fn file_name(&self, now: DateTime<Utc>) -> String {
        now.with_timezone(&self.offset)
            .format("%Y%m%d%H%M%S.log")
            .to_string()
    }

    /// Write `record`. Failures are logged and swallowed; returns the path
    /// written on success.
    pub async fn persist(&self, record: &AuditRecord) -> Option<PathBuf> {
        let dir = self.bucket(record.success);
        let path = dir.join(self.file_name(Utc::now()));

        let json = match serde_json::to_vec_pretty(record) {
            Ok(json) => json,
            Err(err) => {
                tracing::error!(error = %err, "failed to serialize audit record");
                return None;
            }
        };

        if let Err(err) = tokio::fs::create_dir_all(dir).await {
            tracing::error!(dir = %dir.display(), error = %err, "failed to create audit directory");
            return None;
        }

        match tokio::fs::write(&path, json).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "audit record saved");
                Some(path)
            }
            Err(err) => {
                tracing::error!(path = %path.display(), error = %err, "failed to write audit record");
                None
            }
        }
    }
}
