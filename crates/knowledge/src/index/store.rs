//! On-disk index artifacts.
//!
//! An index directory holds:
//! - `lance/`: the LanceDB database with the `chunks` vector table
//! - `metadata.jsonl`: one chunk per vector, in ordinal order
//! - `manifest.json`: how and from what the index was built
//!
//! The directory is staged next to its final location and renamed into
//! place, so readers see either the previous index or the new one.

use super::{default_nprobe, IndexConfig, IndexKind, LanceIndex, VectorIndex};
use crate::jsonl::{read_jsonl, write_jsonl};
use crate::types::Chunk;
use chrono::{DateTime, Utc};
use metalrag_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

pub const LANCE_DIR: &str = "lance";
pub const METADATA_FILE: &str = "metadata.jsonl";
pub const MANIFEST_FILE: &str = "manifest.json";

pub const FORMAT_VERSION: u32 = 2;

/// Build provenance stored in `manifest.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    pub kind: IndexKind,
    pub dimensions: usize,
    pub count: usize,
    /// IVF partitions, when the table carries an IVF index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nlist: Option<usize>,
    /// Partitions probed per query
    #[serde(default = "default_nprobe")]
    pub nprobe: usize,
    pub embedding_provider: String,
    pub embedding_model: String,
    pub normalized: bool,
    /// SHA-256 of the chunk store the index was built from
    pub chunk_store_sha256: String,
    pub built_at: DateTime<Utc>,
}

/// An index read back from disk.
#[derive(Debug)]
pub struct LoadedIndex {
    pub index: Box<dyn VectorIndex>,
    pub metadata: Vec<Chunk>,
    pub manifest: IndexManifest,
}

/// Write the index directory atomically, replacing any previous index.
///
/// `metadata` and `vectors` are parallel; the table layout is taken from
/// `manifest.kind`.
pub async fn save_index(
    index_dir: &Path,
    metadata: &[Chunk],
    vectors: Vec<Vec<f32>>,
    manifest: &IndexManifest,
    config: &IndexConfig,
) -> AppResult<()> {
    if metadata.len() != vectors.len() || manifest.count != vectors.len() {
        return Err(AppError::Knowledge(format!(
            "Index has {} vectors but {} metadata records (manifest count {})",
            vectors.len(),
            metadata.len(),
            manifest.count
        )));
    }

    let parent = index_dir
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&parent)?;

    let staging = sibling_dir(index_dir, "tmp");
    fs::create_dir_all(&staging)?;

    if let Err(e) = write_artifacts(&staging, metadata, vectors, manifest, config).await {
        let _ = fs::remove_dir_all(&staging);
        return Err(e);
    }

    if index_dir.exists() {
        let retired = sibling_dir(index_dir, "old");
        fs::rename(index_dir, &retired)?;
        fs::rename(&staging, index_dir)?;
        if let Err(e) = fs::remove_dir_all(&retired) {
            tracing::warn!(path = %retired.display(), error = %e, "Failed to remove previous index");
        }
    } else {
        fs::rename(&staging, index_dir)?;
    }

    tracing::info!(
        path = %index_dir.display(),
        kind = %manifest.kind,
        count = manifest.count,
        "Saved index"
    );
    Ok(())
}

async fn write_artifacts(
    dir: &Path,
    metadata: &[Chunk],
    vectors: Vec<Vec<f32>>,
    manifest: &IndexManifest,
    config: &IndexConfig,
) -> AppResult<()> {
    let index = LanceIndex::create(
        &dir.join(LANCE_DIR),
        metadata,
        vectors,
        manifest.dimensions,
        manifest.kind,
        config,
    )
    .await?;
    if index.len() != manifest.count {
        return Err(AppError::Knowledge(format!(
            "Vector table holds {} rows, expected {}",
            index.len(),
            manifest.count
        )));
    }
    drop(index);

    write_jsonl(&dir.join(METADATA_FILE), metadata)?;

    let manifest_json = serde_json::to_string_pretty(manifest)?;
    fs::write(dir.join(MANIFEST_FILE), manifest_json)?;
    Ok(())
}

/// Load an index directory; every artifact must be present and consistent.
pub async fn load_index(index_dir: &Path) -> AppResult<LoadedIndex> {
    for name in [LANCE_DIR, METADATA_FILE, MANIFEST_FILE] {
        let path = index_dir.join(name);
        if !path.exists() {
            return Err(AppError::MissingArtifact(format!(
                "index artifact {} (run `metalrag index` first)",
                path.display()
            )));
        }
    }

    let manifest = read_manifest(index_dir)?;
    if manifest.format_version != FORMAT_VERSION {
        return Err(AppError::Knowledge(format!(
            "Unsupported index format version {} (expected {}); rebuild with `metalrag index`",
            manifest.format_version, FORMAT_VERSION
        )));
    }

    let index = LanceIndex::open(&index_dir.join(LANCE_DIR), manifest.kind, manifest.nprobe).await?;
    if index.dimensions() != manifest.dimensions || index.len() != manifest.count {
        return Err(AppError::Knowledge(format!(
            "Vector table ({}x{}) disagrees with manifest ({}x{})",
            index.len(),
            index.dimensions(),
            manifest.count,
            manifest.dimensions
        )));
    }

    let read = read_jsonl::<Chunk>(&index_dir.join(METADATA_FILE))?;
    if read.malformed > 0 || read.records.len() != index.len() {
        return Err(AppError::Knowledge(format!(
            "Index metadata has {} valid records and {} malformed lines for {} vectors",
            read.records.len(),
            read.malformed,
            index.len()
        )));
    }

    tracing::info!(
        path = %index_dir.display(),
        kind = %manifest.kind,
        count = manifest.count,
        model = %manifest.embedding_model,
        "Loaded index"
    );

    Ok(LoadedIndex {
        index: Box::new(index),
        metadata: read.records,
        manifest,
    })
}

/// Read only `manifest.json`.
pub fn read_manifest(index_dir: &Path) -> AppResult<IndexManifest> {
    let path = index_dir.join(MANIFEST_FILE);
    if !path.exists() {
        return Err(AppError::MissingArtifact(format!("{}", path.display())));
    }
    let content = fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Hex SHA-256 of a file's contents.
pub fn sha256_file(path: &Path) -> AppResult<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect())
}

fn sibling_dir(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "index".to_string());
    path.with_file_name(format!(".{}.{}.{}", name, uuid::Uuid::new_v4(), suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexChoice;
    use tempfile::TempDir;

    fn chunk(i: usize) -> Chunk {
        Chunk {
            chunk_id: format!("arxiv:{}_0", i),
            title: format!("Paper {}", i),
            source: format!("arxiv:{}", i),
            pdf_url: None,
            chunk_text: format!("text {}", i),
            chunk_tokens: 2,
            start_token: 0,
            end_token: 2,
            country: None,
            year: Some(2020),
        }
    }

    fn manifest(kind: IndexKind, count: usize) -> IndexManifest {
        IndexManifest {
            format_version: FORMAT_VERSION,
            kind,
            dimensions: 2,
            count,
            nlist: None,
            nprobe: 8,
            embedding_provider: "trigram".to_string(),
            embedding_model: "trigram-v1".to_string(),
            normalized: true,
            chunk_store_sha256: "00".to_string(),
            built_at: Utc::now(),
        }
    }

    fn vectors(n: usize) -> Vec<Vec<f32>> {
        (0..n).map(|i| vec![i as f32, (i % 3) as f32]).collect()
    }

    async fn save(dir: &Path, n: usize) {
        let metadata: Vec<Chunk> = (0..n).map(chunk).collect();
        save_index(
            dir,
            &metadata,
            vectors(n),
            &manifest(IndexKind::Flat, n),
            &IndexConfig::default(),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_flat_round_trip_preserves_search() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("index");
        save(&dir, 5).await;

        let loaded = load_index(&dir).await.unwrap();
        let metadata: Vec<Chunk> = (0..5).map(chunk).collect();
        assert_eq!(loaded.metadata, metadata);
        assert_eq!(loaded.index.kind(), IndexKind::Flat);
        assert_eq!(loaded.manifest.count, 5);

        let hits = loaded.index.search(&[2.0, 2.0], 2).await.unwrap();
        assert_eq!(hits[0].ordinal, 2);
        assert_eq!(hits[1].ordinal, 1);
    }

    #[tokio::test]
    async fn test_ivf_round_trip() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("index");
        let config = IndexConfig {
            kind: IndexChoice::Ivf,
            ivf_threshold: 10,
            nlist: Some(4),
            nprobe: 4,
            ..Default::default()
        };
        let metadata: Vec<Chunk> = (0..60).map(chunk).collect();
        let manifest = IndexManifest {
            nlist: Some(4),
            nprobe: 4,
            ..manifest(IndexKind::Ivf, 60)
        };

        save_index(&dir, &metadata, vectors(60), &manifest, &config)
            .await
            .unwrap();
        let loaded = load_index(&dir).await.unwrap();

        assert_eq!(loaded.index.kind(), IndexKind::Ivf);
        assert_eq!(loaded.manifest, manifest);
        let hits = loaded.index.search(&[40.0, 1.0], 1).await.unwrap();
        assert_eq!(hits[0].ordinal, 40);
    }

    #[tokio::test]
    async fn test_save_replaces_previous_index() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("index");

        save(&dir, 3).await;
        save(&dir, 6).await;

        assert_eq!(load_index(&dir).await.unwrap().metadata.len(), 6);
        let leftovers = fs::read_dir(temp.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn test_failed_save_keeps_previous_index() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("index");
        save(&dir, 3).await;

        let metadata: Vec<Chunk> = (0..2).map(chunk).collect();
        let result = save_index(
            &dir,
            &metadata,
            vec![vec![0.0, 1.0], vec![0.0]],
            &manifest(IndexKind::Flat, 2),
            &IndexConfig::default(),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(load_index(&dir).await.unwrap().metadata.len(), 3);
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_missing_files_are_missing_artifacts() {
        let temp = TempDir::new().unwrap();
        let err = load_index(&temp.path().join("index")).await.unwrap_err();
        assert!(matches!(err, AppError::MissingArtifact(_)));
    }

    #[tokio::test]
    async fn test_metadata_count_mismatch_is_rejected() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("index");
        save(&dir, 2).await;

        let metadata: Vec<Chunk> = (0..2).map(chunk).collect();
        write_jsonl(&dir.join(METADATA_FILE), &metadata[..1]).unwrap();
        assert!(load_index(&dir).await.is_err());
    }

    #[tokio::test]
    async fn test_manifest_count_mismatch_is_rejected() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("index");
        save(&dir, 4).await;

        let tampered = manifest(IndexKind::Flat, 9);
        fs::write(
            dir.join(MANIFEST_FILE),
            serde_json::to_string(&tampered).unwrap(),
        )
        .unwrap();
        let err = load_index(&dir).await.unwrap_err();
        assert!(err.to_string().contains("disagrees with manifest"));
    }

    #[tokio::test]
    async fn test_old_format_version_is_rejected() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("index");
        save(&dir, 2).await;

        let old = IndexManifest {
            format_version: 1,
            ..manifest(IndexKind::Flat, 2)
        };
        fs::write(dir.join(MANIFEST_FILE), serde_json::to_string(&old).unwrap()).unwrap();
        let err = load_index(&dir).await.unwrap_err();
        assert!(err.to_string().contains("format version"));
    }

    #[test]
    fn test_manifest_defaults_nprobe() {
        let json = serde_json::json!({
            "format_version": 2,
            "kind": "flat",
            "dimensions": 4,
            "count": 1,
            "embedding_provider": "trigram",
            "embedding_model": "trigram-v1",
            "normalized": true,
            "chunk_store_sha256": "00",
            "built_at": "2026-01-01T00:00:00Z"
        });
        let manifest: IndexManifest = serde_json::from_value(json).unwrap();
        assert_eq!(manifest.nprobe, 8);
        assert_eq!(manifest.nlist, None);
    }

    #[test]
    fn test_sha256_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("chunks.jsonl");
        fs::write(&path, "abc").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
