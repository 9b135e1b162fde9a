use std::path::Path;

use conclave_core::{ConclaveError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Writes to `<target>.<tmp-id>` then renames over `target`. A concurrent
/// reader observes only pre-write or post-rename content. Best-effort
/// cleanup of the temp file on any failure.
pub async fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let content = serde_json::to_string_pretty(value).map_err(ConclaveError::Serialization)?;
    let tmp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4()));

    if let Err(e) = fs::write(&tmp_path, &content).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&tmp_path, path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(e.into());
    }
    Ok(())
}

/// Reads `path` as JSON; `Ok(None)` on a missing file.
pub async fn read_json_opt<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(raw) => {
            let value = serde_json::from_str(&raw).map_err(ConclaveError::Serialization)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub async fn remove_file_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Single write of `JSON(record)\n`, appended to the file.
pub async fn append_jsonl<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let mut line = serde_json::to_string(record).map_err(ConclaveError::Serialization)?;
    line.push('\n');

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    Ok(())
}

/// All records in original order. Lines that fail to parse are skipped
/// (logged), never aborting the read.
pub async fn read_jsonl_all<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    match fs::read_to_string(path).await {
        Ok(raw) => Ok(parse_jsonl_lines(&raw)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Last `limit` successfully parsed records, in original order. `None`
/// returns everything.
pub async fn read_jsonl_tail<T: DeserializeOwned>(path: &Path, limit: Option<usize>) -> Result<Vec<T>> {
    let mut records = read_jsonl_all(path).await?;
    if let Some(limit) = limit {
        if records.len() > limit {
            records = records.split_off(records.len() - limit);
        }
    }
    Ok(records)
}

fn parse_jsonl_lines<T: DeserializeOwned>(raw: &str) -> Vec<T> {
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<T>(line) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unparsable jsonl record");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Record {
        n: u32,
    }

    #[tokio::test]
    async fn atomic_write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("value.json");
        atomic_write_json(&path, &Record { n: 7 }).await.unwrap();
        let read: Option<Record> = read_json_opt(&path).await.unwrap();
        assert_eq!(read, Some(Record { n: 7 }));
    }

    #[tokio::test]
    async fn read_json_opt_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let read: Option<Record> = read_json_opt(&path).await.unwrap();
        assert_eq!(read, None);
    }

    #[tokio::test]
    async fn jsonl_tail_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        append_jsonl(&path, &Record { n: 1 }).await.unwrap();
        fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .await
            .unwrap()
            .write_all(b"not json\n")
            .await
            .unwrap();
        append_jsonl(&path, &Record { n: 2 }).await.unwrap();
        append_jsonl(&path, &Record { n: 3 }).await.unwrap();

        let tail: Vec<Record> = read_jsonl_tail(&path, Some(2)).await.unwrap();
        assert_eq!(tail, vec![Record { n: 2 }, Record { n: 3 }]);
    }
}
