//! Nearest-neighbour index over chunk embeddings.
//!
//! Vectors live in a LanceDB table and are addressed by ordinal: the
//! position of the chunk in the metadata file written next to the table.
//! Distances are squared L2.

pub mod lance;
pub mod store;

pub use lance::LanceIndex;
pub use store::{load_index, save_index, IndexManifest, LoadedIndex};

use async_trait::async_trait;
use metalrag_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Physical index layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Exhaustive search, no ANN index on the table
    Flat,
    /// IVF_FLAT index on the vector column
    Ivf,
}

impl IndexKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexKind::Flat => "flat",
            IndexKind::Ivf => "ivf",
        }
    }
}

impl std::fmt::Display for IndexKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested index layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexChoice {
    /// IVF above `ivf_threshold` vectors, flat otherwise
    #[default]
    Auto,
    Flat,
    /// IVF, falling back to flat below `ivf_threshold`
    Ivf,
}

impl std::str::FromStr for IndexChoice {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(IndexChoice::Auto),
            "flat" => Ok(IndexChoice::Flat),
            "ivf" => Ok(IndexChoice::Ivf),
            other => Err(AppError::Config(format!(
                "Unknown index kind '{}'. Expected auto, flat or ivf",
                other
            ))),
        }
    }
}

/// Index settings (`index` section of `pipeline.yaml`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default)]
    pub kind: IndexChoice,

    /// Corpus size above which IVF is used
    #[serde(default = "default_ivf_threshold")]
    pub ivf_threshold: usize,

    /// Number of IVF partitions; derived from the corpus size when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nlist: Option<usize>,

    /// Partitions visited per query
    #[serde(default = "default_nprobe")]
    pub nprobe: usize,

    /// k-means iterations when training the IVF partitions
    #[serde(default = "default_kmeans_iterations")]
    pub kmeans_iterations: usize,
}

fn default_ivf_threshold() -> usize {
    10_000
}

pub(crate) fn default_nprobe() -> usize {
    8
}

fn default_kmeans_iterations() -> usize {
    20
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            kind: IndexChoice::Auto,
            ivf_threshold: default_ivf_threshold(),
            nlist: None,
            nprobe: default_nprobe(),
            kmeans_iterations: default_kmeans_iterations(),
        }
    }
}

impl IndexConfig {
    /// Layout used for a corpus of `n` vectors.
    pub fn resolve_kind(&self, n: usize) -> IndexKind {
        match self.kind {
            IndexChoice::Flat => IndexKind::Flat,
            IndexChoice::Auto | IndexChoice::Ivf if n > self.ivf_threshold => IndexKind::Ivf,
            IndexChoice::Ivf => {
                tracing::warn!(
                    vectors = n,
                    threshold = self.ivf_threshold,
                    "Corpus too small for IVF, building a flat index"
                );
                IndexKind::Flat
            }
            IndexChoice::Auto => IndexKind::Flat,
        }
    }

    /// Partition count for `n` vectors: `min(100, n / 39)`, at least 1.
    pub fn resolve_nlist(&self, n: usize) -> usize {
        let nlist = self.nlist.unwrap_or_else(|| (n / 39).min(100));
        nlist.clamp(1, n.max(1))
    }
}

/// One search result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub ordinal: usize,
    /// Squared L2 distance to the query
    pub distance: f32,
}

/// Read-only nearest-neighbour index.
#[async_trait]
pub trait VectorIndex: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> IndexKind;

    fn dimensions(&self) -> usize;

    /// Number of indexed vectors
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored vector for `ordinal`.
    async fn vector(&self, ordinal: usize) -> AppResult<Option<Vec<f32>>>;

    /// Up to `k` nearest vectors, ascending distance, ties by ordinal.
    async fn search(&self, query: &[f32], k: usize) -> AppResult<Vec<Neighbor>>;
}

/// Sort by ascending distance, then ordinal, and keep the first `k`.
pub(crate) fn rank_neighbors(mut neighbors: Vec<Neighbor>, k: usize) -> Vec<Neighbor> {
    neighbors.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then(a.ordinal.cmp(&b.ordinal))
    });
    neighbors.truncate(k);
    neighbors
}

pub(crate) fn check_query(query: &[f32], dimensions: usize) -> AppResult<()> {
    if query.len() != dimensions {
        return Err(AppError::Knowledge(format!(
            "Query has {} dimensions, index has {}",
            query.len(),
            dimensions
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_kind() {
        let config = IndexConfig::default();
        assert_eq!(config.resolve_kind(500), IndexKind::Flat);
        assert_eq!(config.resolve_kind(10_000), IndexKind::Flat);
        assert_eq!(config.resolve_kind(10_001), IndexKind::Ivf);

        let forced_flat = IndexConfig {
            kind: IndexChoice::Flat,
            ..Default::default()
        };
        assert_eq!(forced_flat.resolve_kind(50_000), IndexKind::Flat);

        let forced_ivf = IndexConfig {
            kind: IndexChoice::Ivf,
            ..Default::default()
        };
        assert_eq!(forced_ivf.resolve_kind(20), IndexKind::Flat);
    }

    #[test]
    fn test_resolve_nlist() {
        let config = IndexConfig::default();
        assert_eq!(config.resolve_nlist(10_001), 100);
        assert_eq!(config.resolve_nlist(1_950), 50);
        assert_eq!(config.resolve_nlist(20), 1);

        let explicit = IndexConfig {
            nlist: Some(64),
            ..Default::default()
        };
        assert_eq!(explicit.resolve_nlist(10), 10);
    }

    #[test]
    fn test_rank_neighbors_breaks_ties_by_ordinal() {
        let ranked = rank_neighbors(
            vec![
                Neighbor { ordinal: 4, distance: 0.5 },
                Neighbor { ordinal: 1, distance: 0.5 },
                Neighbor { ordinal: 9, distance: 0.1 },
            ],
            2,
        );
        assert_eq!(ranked[0].ordinal, 9);
        assert_eq!(ranked[1].ordinal, 1);
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn test_check_query_dimensions() {
        assert!(check_query(&[0.0; 4], 4).is_ok());
        assert!(check_query(&[0.0; 3], 4).is_err());
    }

    #[test]
    fn test_index_choice_parse() {
        assert_eq!("IVF".parse::<IndexChoice>().unwrap(), IndexChoice::Ivf);
        assert!("hnsw".parse::<IndexChoice>().is_err());
    }
}
