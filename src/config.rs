use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::Error;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub root: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_min_score")]
    pub min_score: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_score: default_min_score(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_min_score() -> f32 {
    0.7
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    pub model: String,
    pub dims: usize,
    #[serde(default = "default_embed_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_embed_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_tokens() -> u32 {
    512
}
fn default_temperature() -> f32 {
    0.2
}
fn default_generation_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexingConfig {
    #[serde(default = "default_upsert_batch_size")]
    pub upsert_batch_size: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            upsert_batch_size: default_upsert_batch_size(),
        }
    }
}

/// Vector index payload limit per upsert request.
pub const MAX_UPSERT_BATCH: usize = 100;

fn default_upsert_batch_size() -> usize {
    MAX_UPSERT_BATCH
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        return Err(Error::InvalidConfiguration("chunking.chunk_size must be > 0".into()).into());
    }

    if config.retrieval.top_k == 0 {
        return Err(Error::InvalidConfiguration("retrieval.top_k must be >= 1".into()).into());
    }
    if !(0.0..=1.0).contains(&config.retrieval.min_score) {
        return Err(
            Error::InvalidConfiguration("retrieval.min_score must be in [0.0, 1.0]".into()).into(),
        );
    }

    if config.embedding.model.is_empty() {
        return Err(Error::InvalidConfiguration("embedding.model must be set".into()).into());
    }
    if config.embedding.dims == 0 {
        return Err(Error::InvalidConfiguration("embedding.dims must be > 0".into()).into());
    }
    if config.embedding.batch_size == 0 {
        return Err(Error::InvalidConfiguration("embedding.batch_size must be > 0".into()).into());
    }

    if config.generation.model.is_empty() {
        return Err(Error::InvalidConfiguration("generation.model must be set".into()).into());
    }

    if config.indexing.upsert_batch_size == 0
        || config.indexing.upsert_batch_size > MAX_UPSERT_BATCH
    {
        return Err(Error::InvalidConfiguration(format!(
            "indexing.upsert_batch_size must be in 1..={}",
            MAX_UPSERT_BATCH
        ))
        .into());
    }

    Ok(())
}
