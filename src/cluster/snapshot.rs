//! Snapshot naming
//!
//! Backups without an explicit name are called `snapshot.<timestamp>` with
//! a `yyyyMMddHHmmssSSS` timestamp. A restore without a name picks the
//! latest such snapshot at the location.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::path::Path;
use tracing::debug;

pub const SNAPSHOT_PREFIX: &str = "snapshot.";

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S%3f";

/// Generate the default name for a backup taken at `now`
pub fn default_backup_name(now: DateTime<Utc>) -> String {
    format!("{}{}", SNAPSHOT_PREFIX, now.format(TIMESTAMP_FORMAT))
}

/// Timestamp encoded in a snapshot name, if it follows the naming scheme
pub fn snapshot_timestamp(name: &str) -> Option<NaiveDateTime> {
    let stamp = name.strip_prefix(SNAPSHOT_PREFIX)?;
    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()
}

/// Latest timestamp-named snapshot among `names`
pub fn latest_snapshot<I, S>(names: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .filter_map(|n| {
            let name = n.as_ref();
            snapshot_timestamp(name).map(|ts| (ts, name.to_string()))
        })
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, name)| name)
}

/// Latest snapshot stored in a directory on a shared mount
pub fn resolve_in_directory(location: &Path) -> Result<Option<String>> {
    let pattern = location.join(format!("{}*", SNAPSHOT_PREFIX));
    let pattern = pattern.to_str().ok_or_else(|| {
        Error::InvalidArgument(format!("location is not valid UTF-8: {}", location.display()))
    })?;

    let entries = glob::glob(pattern)
        .map_err(|e| Error::InvalidArgument(format!("invalid location pattern: {}", e)))?;

    let names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|path| path.file_name().and_then(|n| n.to_str()).map(String::from))
        .collect();

    debug!(
        "Found {} snapshot candidates in {}",
        names.len(),
        location.display()
    );

    Ok(latest_snapshot(names))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_backup_name_format() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(default_backup_name(now), "snapshot.20240309140507000");
    }

    #[test]
    fn test_snapshot_timestamp_parsing() {
        assert!(snapshot_timestamp("snapshot.20240309140507123").is_some());
        assert!(snapshot_timestamp("snapshot.latest").is_none());
        assert!(snapshot_timestamp("catalog_backup").is_none());
    }

    #[test]
    fn test_latest_snapshot_ignores_other_names() {
        let names = [
            "snapshot.20230101000000000",
            "nightly",
            "snapshot.20240101000000000",
            "snapshot.garbage",
            "snapshot.20231231235959999",
        ];
        assert_eq!(
            latest_snapshot(names),
            Some("snapshot.20240101000000000".to_string())
        );
        assert_eq!(latest_snapshot(["nightly"]), None);
    }

    #[test]
    fn test_resolve_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("snapshot.20220101000000000")).unwrap();
        std::fs::create_dir(dir.path().join("snapshot.20220601000000000")).unwrap();
        std::fs::create_dir(dir.path().join("unrelated")).unwrap();

        let latest = resolve_in_directory(dir.path()).unwrap();
        assert_eq!(latest.as_deref(), Some("snapshot.20220601000000000"));

        let empty = tempfile::tempdir().unwrap();
        assert_eq!(resolve_in_directory(empty.path()).unwrap(), None);
    }
}
