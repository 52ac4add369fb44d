//! JSON Lines reading and all-or-nothing writing.

use metalrag_core::{AppError, AppResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Records parsed from a JSONL file plus the number of lines that were skipped.
#[derive(Debug)]
pub struct JsonlRead<T> {
    pub records: Vec<T>,
    pub malformed: usize,
}

/// Read every line of `path` as `T`.
///
/// Blank lines are ignored; lines that fail to parse are logged, counted and
/// skipped. A missing file is a [`AppError::MissingArtifact`].
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> AppResult<JsonlRead<T>> {
    if !path.exists() {
        return Err(AppError::MissingArtifact(format!("{}", path.display())));
    }

    let reader = BufReader::new(fs::File::open(path)?);
    let mut records = Vec::new();
    let mut malformed = 0;

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_str::<T>(trimmed) {
            Ok(record) => records.push(record),
            Err(e) => {
                malformed += 1;
                tracing::warn!(
                    path = %path.display(),
                    line = idx + 1,
                    error = %e,
                    "Skipping malformed JSONL line"
                );
            }
        }
    }

    Ok(JsonlRead { records, malformed })
}

/// Write `records` to `path`, replacing any previous file only once the new
/// one is completely on disk.
pub fn write_jsonl_atomic<T: Serialize>(path: &Path, records: &[T]) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp = temp_sibling(path);
    let result = write_jsonl(&tmp, records);
    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    fs::rename(&tmp, path)?;
    tracing::debug!(path = %path.display(), count = records.len(), "Wrote JSONL");
    Ok(())
}

/// Write `records` to `path` without any replace semantics.
pub(crate) fn write_jsonl<T: Serialize>(path: &Path, records: &[T]) -> AppResult<()> {
    let file = fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    writer
        .into_inner()
        .map_err(|e| AppError::Io(e.into_error()))?
        .sync_all()?;
    Ok(())
}

/// A unique path next to `path` for staging writes.
pub(crate) fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    path.with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Row {
        id: u32,
        name: String,
    }

    #[test]
    fn test_malformed_lines_are_counted_and_skipped() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("rows.jsonl");
        fs::write(
            &path,
            "{\"id\":1,\"name\":\"a\"}\nnot json\n\n{\"id\":2}\n{\"id\":3,\"name\":\"c\"}\n",
        )
        .unwrap();

        let read: JsonlRead<Row> = read_jsonl(&path).unwrap();
        assert_eq!(read.records.len(), 2);
        assert_eq!(read.malformed, 2);
        assert_eq!(read.records[1].id, 3);
    }

    #[test]
    fn test_missing_file_is_missing_artifact() {
        let temp = TempDir::new().unwrap();
        let err = read_jsonl::<Row>(&temp.path().join("absent.jsonl")).unwrap_err();
        assert!(matches!(err, AppError::MissingArtifact(_)));
    }

    #[test]
    fn test_atomic_write_replaces_and_leaves_no_temp_files() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out").join("rows.jsonl");

        let first = vec![Row { id: 1, name: "a".into() }];
        write_jsonl_atomic(&path, &first).unwrap();
        let second = vec![
            Row { id: 2, name: "b".into() },
            Row { id: 3, name: "в".into() },
        ];
        write_jsonl_atomic(&path, &second).unwrap();

        let read: JsonlRead<Row> = read_jsonl(&path).unwrap();
        assert_eq!(read.records, second);

        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
