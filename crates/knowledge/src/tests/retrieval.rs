//! Retrieval over a built index: ranking, persistence and build failures.

use super::support::{build_workspace, embedding_config, open_service, TITANIUM_QUESTION};
use crate::config::{chunk_store_path, index_dir};
use crate::embeddings::EmbeddingEngine;
use crate::index::store::{read_manifest, sha256_file};
use crate::index::{IndexChoice, IndexConfig, IndexKind};
use crate::indexer::build_index;
use crate::progress::ProgressReporter;
use crate::rag::{build_context, KnowledgeService};
use metalrag_core::AppError;
use std::fs;
use tempfile::TempDir;

#[tokio::test]
async fn test_own_vector_returns_chunk_first() {
    let temp = TempDir::new().unwrap();
    let service = open_service(temp.path()).await;

    for ordinal in 0..service.len() {
        let vector = service.vector(ordinal).await.unwrap().unwrap();
        let hits = service.search_vector(&vector, 3).await.unwrap();
        let best = hits[0].distance;
        assert!(best.abs() < 1e-5);
        // Either first or tied with the first
        assert!(hits
            .iter()
            .any(|h| h.ordinal == ordinal && (h.distance - best).abs() < 1e-6));
    }
}

#[tokio::test]
async fn test_search_is_deterministic() {
    let temp = TempDir::new().unwrap();
    let service = open_service(temp.path()).await;

    let first = service.engine().embed_query(TITANIUM_QUESTION).await.unwrap();
    let second = service.engine().embed_query(TITANIUM_QUESTION).await.unwrap();
    assert_eq!(first, second);

    let a = service.search(TITANIUM_QUESTION, 5).await.unwrap();
    let b = service.search(TITANIUM_QUESTION, 5).await.unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn test_titanium_question_context_respects_budget() {
    let temp = TempDir::new().unwrap();
    let service = open_service(temp.path()).await;

    let hits = service.search(TITANIUM_QUESTION, 5).await.unwrap();
    assert_eq!(hits.len(), 5);
    assert!(hits.iter().all(|h| !h.title.trim().is_empty()));
    assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    assert_eq!(hits[0].source, "arxiv:2101.00001");

    let budget = 120;
    let context = build_context(hits, budget);
    for (segment, hit) in context.text.split("\n\n").zip(context.hits.iter()) {
        let body = segment
            .strip_prefix(&format!("{}:\n", hit.title))
            .unwrap();
        assert!(body.chars().count() <= budget + 3);
    }
}

#[tokio::test]
async fn test_index_reopens_without_reembedding() {
    let temp = TempDir::new().unwrap();
    let service = open_service(temp.path()).await;
    let before = service.search("vacuum degassing hydrogen", 3).await.unwrap();

    let reopened = KnowledgeService::open(&index_dir(temp.path()), &embedding_config())
        .await
        .unwrap();
    let after = reopened.search("vacuum degassing hydrogen", 3).await.unwrap();
    assert_eq!(before, after);
    assert_eq!(after[0].source, "W3002");

    let manifest = reopened.manifest();
    assert_eq!(manifest.count, 6);
    assert_eq!(manifest.kind, IndexKind::Flat);
    assert_eq!(
        manifest.chunk_store_sha256,
        sha256_file(&chunk_store_path(temp.path())).unwrap()
    );
}

#[tokio::test]
async fn test_open_with_other_model_is_config_error() {
    let temp = TempDir::new().unwrap();
    open_service(temp.path()).await;

    let mut config = embedding_config();
    config.dimensions = 128;
    let result = KnowledgeService::open(&index_dir(temp.path()), &config).await;
    assert!(matches!(result, Err(AppError::Config(_))));
}

#[tokio::test]
async fn test_zero_chunks_fail_index_build() {
    let temp = TempDir::new().unwrap();
    let chunks = temp.path().join("chunks.jsonl");
    fs::write(&chunks, "not json\n\n").unwrap();
    let out = temp.path().join("index");

    let engine = EmbeddingEngine::from_config(&embedding_config()).await.unwrap();
    let result = build_index(
        &chunks,
        &out,
        &engine,
        &IndexConfig::default(),
        &ProgressReporter::noop(),
    )
    .await;

    assert!(matches!(result, Err(AppError::Knowledge(_))));
    assert!(!out.exists());
}

#[tokio::test]
async fn test_ivf_index_finds_own_vectors() {
    let temp = TempDir::new().unwrap();
    let config = IndexConfig {
        kind: IndexChoice::Ivf,
        ivf_threshold: 2,
        nlist: Some(2),
        nprobe: 2,
        ..IndexConfig::default()
    };
    build_workspace(temp.path(), &config).await;

    let manifest = read_manifest(&index_dir(temp.path())).unwrap();
    assert_eq!(manifest.kind, IndexKind::Ivf);
    assert_eq!(manifest.nlist, Some(2));
    assert_eq!(manifest.nprobe, 2);

    let service = KnowledgeService::open(&index_dir(temp.path()), &embedding_config())
        .await
        .unwrap();
    for ordinal in 0..service.len() {
        let vector = service.vector(ordinal).await.unwrap().unwrap();
        let hits = service.search_vector(&vector, 1).await.unwrap();
        assert!(hits[0].distance.abs() < 1e-5);
    }
}

#[tokio::test]
async fn test_stats_cover_built_workspace() {
    let temp = TempDir::new().unwrap();
    build_workspace(temp.path(), &IndexConfig::default()).await;

    let stats = crate::stats(temp.path()).unwrap();
    assert_eq!(stats.raw_articles, Some(6));
    assert_eq!(stats.chunks, Some(6));
    assert_eq!(stats.indexed_vectors, Some(6));
    assert_eq!(stats.index_kind, Some(IndexKind::Flat));
    assert!(stats.index_size_bytes > 0);

    let empty = TempDir::new().unwrap();
    let stats = crate::stats(empty.path()).unwrap();
    assert_eq!(stats.indexed_vectors, None);
    assert_eq!(stats.index_size_bytes, 0);
}
