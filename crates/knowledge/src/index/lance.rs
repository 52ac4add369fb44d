//! LanceDB-backed vector index.
//!
//! One table, `chunks`, with a row per embedded chunk:
//! `ordinal`, `chunk_id`, `source` and a fixed-size `vector` column.
//! Small corpora are searched exhaustively; above the IVF threshold the
//! vector column gets an IVF_FLAT index trained with k-means.

use super::{check_query, rank_neighbors, IndexConfig, IndexKind, Neighbor, VectorIndex};
use crate::types::Chunk;
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
    UInt32Array,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::index::vector::IvfFlatIndexBuilder;
use lancedb::index::Index;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use metalrag_core::{AppError, AppResult};
use std::path::Path;
use std::sync::Arc;

pub const TABLE_NAME: &str = "chunks";

const ORDINAL_COLUMN: &str = "ordinal";
const VECTOR_COLUMN: &str = "vector";
const DISTANCE_COLUMN: &str = "_distance";

/// Vector table opened for search.
pub struct LanceIndex {
    table: Table,
    kind: IndexKind,
    dimensions: usize,
    count: usize,
    nprobe: usize,
}

impl std::fmt::Debug for LanceIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanceIndex")
            .field("table", &self.table.name())
            .field("kind", &self.kind)
            .field("dimensions", &self.dimensions)
            .field("count", &self.count)
            .field("nprobe", &self.nprobe)
            .finish()
    }
}

impl LanceIndex {
    /// Write `vectors` into a new table under `db_dir` and, for
    /// [`IndexKind::Ivf`], train the IVF index on it.
    ///
    /// `chunks` and `vectors` must be parallel; row `i` gets ordinal `i`.
    pub async fn create(
        db_dir: &Path,
        chunks: &[Chunk],
        vectors: Vec<Vec<f32>>,
        dimensions: usize,
        kind: IndexKind,
        config: &IndexConfig,
    ) -> AppResult<Self> {
        if vectors.is_empty() {
            return Err(AppError::Knowledge(
                "Cannot build an index from zero vectors".to_string(),
            ));
        }

        std::fs::create_dir_all(db_dir)?;
        let count = vectors.len();
        let batch = to_batch(chunks, vectors, dimensions)?;
        let schema = batch.schema();

        let conn = connect(db_dir).await?;
        let table = conn
            .create_table(TABLE_NAME, RecordBatchIterator::new(vec![Ok(batch)], schema))
            .execute()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to create vector table: {}", e)))?;

        if kind == IndexKind::Ivf {
            let nlist = config.resolve_nlist(count);
            tracing::info!(vectors = count, nlist, "Training IVF index");
            table
                .create_index(
                    &[VECTOR_COLUMN],
                    Index::IvfFlat(
                        IvfFlatIndexBuilder::default()
                            .distance_type(DistanceType::L2)
                            .num_partitions(to_u32(nlist, "nlist")?)
                            .max_iterations(to_u32(config.kmeans_iterations, "kmeans_iterations")?),
                    ),
                )
                .execute()
                .await
                .map_err(|e| AppError::Knowledge(format!("Failed to build IVF index: {}", e)))?;
        }

        tracing::info!(
            path = %db_dir.display(),
            kind = %kind,
            vectors = count,
            dimensions,
            "Built vector index"
        );

        Ok(Self {
            table,
            kind,
            dimensions,
            count,
            nprobe: config.nprobe,
        })
    }

    /// Open the table under `db_dir`. The stored layout must match `kind`.
    pub async fn open(db_dir: &Path, kind: IndexKind, nprobe: usize) -> AppResult<Self> {
        let conn = connect(db_dir).await?;
        let table = conn
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to open vector table: {}", e)))?;

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to count vectors: {}", e)))?;

        let schema = table
            .schema()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to read table schema: {}", e)))?;
        let dimensions = match schema.field_with_name(VECTOR_COLUMN).map(|f| f.data_type()) {
            Ok(DataType::FixedSizeList(_, size)) => usize::try_from(*size).map_err(|_| {
                AppError::Knowledge(format!("Invalid vector width {} in table", size))
            })?,
            _ => {
                return Err(AppError::Knowledge(format!(
                    "Table {} has no fixed-size '{}' column",
                    TABLE_NAME, VECTOR_COLUMN
                )))
            }
        };

        let indices = table
            .list_indices()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to list table indices: {}", e)))?;
        let stored_kind = if indices.is_empty() {
            IndexKind::Flat
        } else {
            IndexKind::Ivf
        };
        if stored_kind != kind {
            return Err(AppError::Knowledge(format!(
                "Vector table is {} but the manifest says {}",
                stored_kind, kind
            )));
        }

        Ok(Self {
            table,
            kind,
            dimensions,
            count,
            nprobe,
        })
    }
}

#[async_trait]
impl VectorIndex for LanceIndex {
    fn kind(&self) -> IndexKind {
        self.kind
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn len(&self) -> usize {
        self.count
    }

    async fn vector(&self, ordinal: usize) -> AppResult<Option<Vec<f32>>> {
        let batches = self
            .table
            .query()
            .only_if(format!("{} = {}", ORDINAL_COLUMN, ordinal))
            .limit(1)
            .execute()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to read vector: {}", e)))?
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to collect vector: {}", e)))?;

        for batch in batches {
            if batch.num_rows() == 0 {
                continue;
            }
            let list = column::<FixedSizeListArray>(&batch, VECTOR_COLUMN)?;
            let row = list.value(0);
            let values = row
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| AppError::Knowledge("Invalid vector values".to_string()))?;
            return Ok(Some(values.values().to_vec()));
        }
        Ok(None)
    }

    async fn search(&self, query: &[f32], k: usize) -> AppResult<Vec<Neighbor>> {
        check_query(query, self.dimensions)?;
        if k == 0 || self.count == 0 {
            return Ok(Vec::new());
        }

        let mut vector_query = self
            .table
            .query()
            .nearest_to(query.to_vec())
            .map_err(|e| AppError::Knowledge(format!("Failed to create query: {}", e)))?
            .column(VECTOR_COLUMN)
            .distance_type(DistanceType::L2)
            .limit(k);
        if self.kind == IndexKind::Ivf {
            vector_query = vector_query.nprobes(self.nprobe);
        }

        let batches = vector_query
            .execute()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to execute search: {}", e)))?
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to collect results: {}", e)))?;
        let mut neighbors = Vec::with_capacity(k);
        for batch in &batches {
            let ordinals = column::<UInt32Array>(batch, ORDINAL_COLUMN)?;
            let distances = column::<Float32Array>(batch, DISTANCE_COLUMN)?;
            for row in 0..batch.num_rows() {
                neighbors.push(Neighbor {
                    ordinal: ordinals.value(row) as usize,
                    distance: distances.value(row),
                });
            }
        }

        tracing::debug!(
            returned = neighbors.len(),
            requested = k,
            kind = %self.kind,
            "Vector search finished"
        );
        Ok(rank_neighbors(neighbors, k))
    }
}

async fn connect(db_dir: &Path) -> AppResult<Connection> {
    let uri = db_dir.to_string_lossy().to_string();
    lancedb::connect(&uri)
        .execute()
        .await
        .map_err(|e| AppError::Knowledge(format!("Failed to connect to LanceDB: {}", e)))
}

fn schema(list_size: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new(ORDINAL_COLUMN, DataType::UInt32, false),
        Field::new("chunk_id", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, false),
        Field::new(
            VECTOR_COLUMN,
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                list_size,
            ),
            false,
        ),
    ]))
}

/// One record batch holding every row, ordinals in input order.
fn to_batch(chunks: &[Chunk], vectors: Vec<Vec<f32>>, dimensions: usize) -> AppResult<RecordBatch> {
    if chunks.len() != vectors.len() {
        return Err(AppError::Knowledge(format!(
            "{} chunks but {} vectors",
            chunks.len(),
            vectors.len()
        )));
    }
    if dimensions == 0 {
        return Err(AppError::Knowledge("Index dimensions must be positive".to_string()));
    }
    let list_size = i32::try_from(dimensions)
        .map_err(|_| AppError::Knowledge(format!("{} dimensions is too wide", dimensions)))?;
    let rows = to_u32(vectors.len(), "vector count")?;

    let mut values = Vec::with_capacity(vectors.len() * dimensions);
    for (ordinal, vector) in vectors.into_iter().enumerate() {
        if vector.len() != dimensions {
            return Err(AppError::Knowledge(format!(
                "Vector {} has {} dimensions, expected {}",
                ordinal,
                vector.len(),
                dimensions
            )));
        }
        values.extend(vector);
    }

    let ordinals = UInt32Array::from_iter_values(0..rows);
    let chunk_ids = StringArray::from_iter_values(chunks.iter().map(|c| c.chunk_id.as_str()));
    let sources = StringArray::from_iter_values(chunks.iter().map(|c| c.source.as_str()));
    let vectors = FixedSizeListArray::try_new(
        Arc::new(Field::new("item", DataType::Float32, true)),
        list_size,
        Arc::new(Float32Array::from(values)),
        None,
    )
    .map_err(|e| AppError::Knowledge(format!("Failed to build vector column: {}", e)))?;

    RecordBatch::try_new(
        schema(list_size),
        vec![
            Arc::new(ordinals),
            Arc::new(chunk_ids),
            Arc::new(sources),
            Arc::new(vectors),
        ],
    )
    .map_err(|e| AppError::Knowledge(format!("Failed to create RecordBatch: {}", e)))
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> AppResult<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| AppError::Knowledge(format!("Invalid {} column", name)))
}

fn to_u32(value: usize, what: &str) -> AppResult<u32> {
    u32::try_from(value).map_err(|_| AppError::Knowledge(format!("{} {} is out of range", what, value)))
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

    fn vectors(n: usize) -> Vec<Vec<f32>> {
        (0..n).map(|i| vec![i as f32, (i % 3) as f32]).collect()
    }

    async fn flat(dir: &Path, n: usize) -> LanceIndex {
        let chunks: Vec<Chunk> = (0..n).map(chunk).collect();
        LanceIndex::create(dir, &chunks, vectors(n), 2, IndexKind::Flat, &IndexConfig::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_flat_search_is_exact_squared_l2() {
        let temp = TempDir::new().unwrap();
        let index = flat(temp.path(), 5).await;

        let hits = index.search(&[2.0, 2.0], 4).await.unwrap();
        let ordinals: Vec<usize> = hits.iter().map(|h| h.ordinal).collect();
        // (3,0) and (4,1) are both at squared distance 5
        assert_eq!(ordinals, vec![2, 1, 3, 4]);
        assert_eq!(hits[0].distance, 0.0);
        assert!((hits[1].distance - 2.0).abs() < 1e-5);
        assert!((hits[2].distance - 5.0).abs() < 1e-5);
        assert_eq!(hits[2].distance, hits[3].distance);
    }

    #[tokio::test]
    async fn test_search_edge_cases() {
        let temp = TempDir::new().unwrap();
        let index = flat(temp.path(), 3).await;

        assert!(index.search(&[0.0, 0.0], 0).await.unwrap().is_empty());
        assert_eq!(index.search(&[0.0, 0.0], 10).await.unwrap().len(), 3);
        assert!(index.search(&[0.0, 0.0, 0.0], 1).await.is_err());
    }

    #[tokio::test]
    async fn test_vector_by_ordinal() {
        let temp = TempDir::new().unwrap();
        let index = flat(temp.path(), 4).await;

        assert_eq!(index.vector(3).await.unwrap(), Some(vec![3.0, 0.0]));
        assert_eq!(index.vector(7).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reopen_checks_layout() {
        let temp = TempDir::new().unwrap();
        flat(temp.path(), 4).await;

        let reopened = LanceIndex::open(temp.path(), IndexKind::Flat, 8).await.unwrap();
        assert_eq!(reopened.len(), 4);
        assert_eq!(reopened.dimensions(), 2);

        let err = LanceIndex::open(temp.path(), IndexKind::Ivf, 8).await.unwrap_err();
        assert!(err.to_string().contains("manifest"));
    }

    #[tokio::test]
    async fn test_ivf_finds_stored_vectors() {
        let temp = TempDir::new().unwrap();
        let config = IndexConfig {
            kind: IndexChoice::Ivf,
            ivf_threshold: 10,
            nlist: Some(4),
            nprobe: 4,
            ..Default::default()
        };
        let chunks: Vec<Chunk> = (0..60).map(chunk).collect();
        let index = LanceIndex::create(
            temp.path(),
            &chunks,
            vectors(60),
            2,
            config.resolve_kind(60),
            &config,
        )
        .await
        .unwrap();
        assert_eq!(index.kind(), IndexKind::Ivf);

        let hits = index.search(&[17.0, 2.0], 1).await.unwrap();
        assert_eq!(hits[0].ordinal, 17);

        let reopened = LanceIndex::open(temp.path(), IndexKind::Ivf, 4).await.unwrap();
        assert_eq!(reopened.search(&[17.0, 2.0], 1).await.unwrap(), hits);
    }

    #[tokio::test]
    async fn test_mismatched_inputs_are_rejected() {
        let temp = TempDir::new().unwrap();
        let chunks: Vec<Chunk> = (0..2).map(chunk).collect();
        let config = IndexConfig::default();

        let short = LanceIndex::create(
            temp.path(),
            &chunks,
            vectors(1),
            2,
            IndexKind::Flat,
            &config,
        )
        .await;
        assert!(short.is_err());

        let ragged = LanceIndex::create(
            temp.path(),
            &chunks,
            vec![vec![0.0, 1.0], vec![0.0]],
            2,
            IndexKind::Flat,
            &config,
        )
        .await;
        assert!(ragged.is_err());

        let empty = LanceIndex::create(temp.path(), &[], Vec::new(), 2, IndexKind::Flat, &config)
            .await
            .unwrap_err();
        assert!(empty.to_string().contains("zero vectors"));
    }
}
