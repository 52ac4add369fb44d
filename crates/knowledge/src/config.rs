//! Pipeline configuration and workspace paths.
//!
//! Loaded from `.metalrag/pipeline.yaml`; every section and field has a
//! default, so a missing file means the canonical settings.

use crate::chunker::ChunkingConfig;
use crate::embeddings::EmbeddingConfig;
use crate::fetch::FetchConfig;
use crate::index::IndexConfig;
use metalrag_core::config::STATE_DIR;
use metalrag_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Retrieval sizes for each request type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub qa_top_k: usize,
    /// Characters of each chunk placed in a QA prompt
    pub qa_chunk_chars: usize,
    pub hypothesis_top_k: usize,
    /// Characters of each chunk placed in hypothesis prompts
    pub hypothesis_chunk_chars: usize,
    /// Sources reported alongside hypotheses
    pub sources_shown: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            qa_top_k: 5,
            qa_chunk_chars: 1000,
            hypothesis_top_k: 10,
            hypothesis_chunk_chars: 800,
            sources_shown: 5,
        }
    }
}

/// Sampling settings for one model role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRole {
    /// Model override; the active provider's model when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ModelRole {
    pub fn new(temperature: f32) -> Self {
        Self {
            model: None,
            temperature,
            max_tokens: None,
        }
    }

    fn validate(&self, role: &str) -> AppResult<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(AppError::Config(format!(
                "{}.temperature must be between 0 and 2, got {}",
                role, self.temperature
            )));
        }
        Ok(())
    }
}

/// Everything under `pipeline.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub fetch: FetchConfig,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub retrieval: RetrievalConfig,
    pub qa: ModelRole,
    pub generator: ModelRole,
    pub critic: ModelRole,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            index: IndexConfig::default(),
            retrieval: RetrievalConfig::default(),
            qa: ModelRole::new(0.3),
            generator: ModelRole::new(0.6),
            critic: ModelRole::new(0.2),
        }
    }
}

impl PipelineConfig {
    /// Load `.metalrag/pipeline.yaml`, or defaults when it does not exist.
    pub fn load(workspace: &Path) -> AppResult<Self> {
        let path = pipeline_config_path(workspace);

        if !path.exists() {
            tracing::debug!("No pipeline config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content).map_err(|e| {
            AppError::Config(format!("Failed to parse pipeline config at {:?}: {}", path, e))
        })?;
        config.validate()?;

        tracing::debug!("Loaded pipeline config from {:?}", path);
        Ok(config)
    }

    /// Write the configuration to `.metalrag/pipeline.yaml`.
    pub fn save(&self, workspace: &Path) -> AppResult<()> {
        let path = pipeline_config_path(workspace);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, serde_yaml::to_string(self)?)?;
        tracing::debug!("Saved pipeline config to {:?}", path);
        Ok(())
    }

    pub fn validate(&self) -> AppResult<()> {
        self.fetch.validate()?;
        self.chunking.validate()?;
        self.embedding.validate()?;
        self.qa.validate("qa")?;
        self.generator.validate("generator")?;
        self.critic.validate("critic")?;

        let r = &self.retrieval;
        if r.qa_top_k == 0 || r.hypothesis_top_k == 0 {
            return Err(AppError::Config(
                "retrieval top_k values must be positive".to_string(),
            ));
        }
        if self.index.nprobe == 0 || self.index.kmeans_iterations == 0 {
            return Err(AppError::Config(
                "index.nprobe and index.kmeans_iterations must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Path of `pipeline.yaml`.
pub fn pipeline_config_path(workspace: &Path) -> PathBuf {
    workspace.join(STATE_DIR).join("pipeline.yaml")
}

/// Directory holding the raw corpus and chunk store.
pub fn data_dir(workspace: &Path) -> PathBuf {
    workspace.join(STATE_DIR).join("data")
}

/// Default raw corpus location.
pub fn raw_corpus_path(workspace: &Path) -> PathBuf {
    data_dir(workspace).join("raw.jsonl")
}

/// Default chunk store location.
pub fn chunk_store_path(workspace: &Path) -> PathBuf {
    data_dir(workspace).join("chunks.jsonl")
}

/// Index directory.
pub fn index_dir(workspace: &Path) -> PathBuf {
    workspace.join(STATE_DIR).join("index")
}
