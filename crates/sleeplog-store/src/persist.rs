//! JSON encoding and atomic file replacement

use sleeplog_api::Snapshot;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::StorageError;

/// Encode a snapshot as pretty JSON with keys in sorted order.
pub(crate) fn encode_snapshot(snapshot: &Snapshot) -> Result<Vec<u8>, StorageError> {
    // serde_json's Map is a BTreeMap without `preserve_order`, so going
    // through Value sorts every object's keys.
    let value = serde_json::to_value(snapshot).map_err(StorageError::Encode)?;
    let mut bytes = serde_json::to_vec_pretty(&value).map_err(StorageError::Encode)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Read the snapshot at `path`; `None` if the file does not exist.
pub(crate) async fn read_snapshot(path: &Path) -> Result<Option<Snapshot>, StorageError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StorageError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| StorageError::Decode {
            path: path.to_path_buf(),
            source,
        })
}

/// Replace the file at `path` with `snapshot`.
///
/// The bytes go to a sibling temp file which is synced and then renamed
/// over the target, so the target holds either the old or the new content.
pub(crate) async fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), StorageError> {
    let bytes = encode_snapshot(snapshot)?;
    let tmp_path = temp_path(path);

    let result: std::io::Result<()> = async {
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp_path, path).await
    }
    .await;

    if let Err(source) = result {
        if let Err(e) = tokio::fs::remove_file(&tmp_path).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %tmp_path.display(), error = %e, "Failed to remove temp file");
        }
        return Err(StorageError::Io {
            path: path.to_path_buf(),
            source,
        });
    }

    debug!(path = %path.display(), bytes = bytes.len(), "Snapshot written");
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("snapshot"));
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use sleeplog_api::{Record, SessionState};

    fn sample() -> Snapshot {
        let at = |h| Utc.with_ymd_and_hms(2026, 2, 14, h, 0, 0).unwrap();
        Snapshot {
            records: vec![Record::new(at(1), at(8), "deep", at(9))],
            active: SessionState::Active { started_at: at(22) },
        }
    }

    #[test]
    fn encoded_keys_are_sorted() {
        let text = String::from_utf8(encode_snapshot(&sample()).unwrap()).unwrap();

        let active = text.find("\"activeSleepStart\"").unwrap();
        let records = text.find("\"records\"").unwrap();
        assert!(active < records);

        let order: Vec<usize> = ["createdAt", "endDate", "\"id\"", "note", "startDate", "updatedAt"]
            .iter()
            .map(|key| text.find(key).unwrap())
            .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]), "keys out of order:\n{}", text);
    }

    #[test]
    fn temp_path_is_a_sibling() {
        let path = Path::new("/data/sleep_records.json");
        assert_eq!(temp_path(path), Path::new("/data/sleep_records.json.tmp"));
    }

    #[tokio::test]
    async fn write_then_read() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("records.json");

        write_snapshot(&path, &sample()).await.unwrap();
        let loaded = read_snapshot(&path).await.unwrap().unwrap();

        assert_eq!(loaded, sample());
        assert!(!temp_path(&path).exists());
    }

    #[tokio::test]
    async fn missing_file_reads_as_none() {
        let tmp = tempfile::tempdir().unwrap();
        let loaded = read_snapshot(&tmp.path().join("absent.json")).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn garbage_is_a_decode_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("records.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let err = read_snapshot(&path).await.unwrap_err();
        assert!(matches!(err, StorageError::Decode { .. }));
    }

    #[tokio::test]
    async fn failed_write_keeps_previous_content() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("records.json");
        write_snapshot(&path, &Snapshot::default()).await.unwrap();
        let before = std::fs::read(&path).unwrap();

        // A directory squatting on the temp path makes the write fail before the rename
        std::fs::create_dir(temp_path(&path)).unwrap();
        let err = write_snapshot(&path, &sample()).await.unwrap_err();

        assert!(matches!(err, StorageError::Io { .. }));
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }
}
