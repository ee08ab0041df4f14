//! Consensus instance configuration
//!
//! Network parameters are selected by name through a [`ParamsRegistry`];
//! everything else (cache sizes, pipeline settings) is local tuning and may be
//! loaded from a TOML file:
//!
//! ```toml
//! network = "jio-simnet"
//!
//! [cache_sizes]
//! headers = 20000
//!
//! [pipeline]
//! worker_count = 4
//! ```

use std::fs;
use std::path::Path;
use std::sync::Arc;

use consensus_core::config::{ConfigError, Params, ParamsRegistry};
use consensus_core::constants::DEFAULT_SIG_CACHE_SIZE;
use serde::{Deserialize, Serialize};

/// Number of entries kept in each store cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSizes {
    pub headers: usize,
    pub block_transactions: usize,
    pub ghostdag: usize,
    pub reachability: usize,
    pub relations: usize,
    pub statuses: usize,
    pub utxo_diffs: usize,
    pub utxo_set: usize,
    pub selected_chain: usize,
    /// Cached difficulty and median time windows
    pub windows: usize,
    /// Verified (signature, message, key) triples
    pub signatures: usize,
}

impl Default for CacheSizes {
    fn default() -> Self {
        Self {
            headers: 10_000,
            block_transactions: 2_000,
            ghostdag: 10_000,
            reachability: 20_000,
            relations: 10_000,
            statuses: 20_000,
            utxo_diffs: 2_000,
            utxo_set: 50_000,
            selected_chain: 10_000,
            windows: 2_000,
            signatures: DEFAULT_SIG_CACHE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub worker_count: usize,
    /// How long a block may wait for missing parents, in milliseconds
    pub pending_timeout_ms: u64,
    pub max_pending_blocks: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { worker_count: 4, pending_timeout_ms: 60_000, max_pending_blocks: 10_000 }
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    network: String,
    #[serde(default)]
    cache_sizes: CacheSizes,
    #[serde(default)]
    pipeline: PipelineConfig,
}

/// Configuration of one consensus instance
#[derive(Debug, Clone)]
pub struct ConsensusConfig {
    pub params: Arc<Params>,
    pub cache_sizes: CacheSizes,
    pub pipeline: PipelineConfig,
}

impl ConsensusConfig {
    pub fn new(params: Arc<Params>) -> Self {
        Self { params, cache_sizes: CacheSizes::default(), pipeline: PipelineConfig::default() }
    }

    /// Default configuration of a registered network
    pub fn for_network(registry: &ParamsRegistry, name: &str) -> Result<Self, ConfigError> {
        Ok(Self::new(registry.by_name(name)?))
    }

    pub fn from_toml_str(registry: &ParamsRegistry, content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        if file.pipeline.worker_count == 0 {
            return Err(ConfigError::InvalidValue("pipeline.worker_count must be positive".into()));
        }
        Ok(Self { params: registry.by_name(&file.network)?, cache_sizes: file.cache_sizes, pipeline: file.pipeline })
    }

    pub fn load(registry: &ParamsRegistry, path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(registry, &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let registry = ParamsRegistry::with_defaults();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "network = \"jio-simnet\"\n\n[cache_sizes]\nheaders = 123\n\n[pipeline]\nworker_count = 2").unwrap();

        let config = ConsensusConfig::load(&registry, file.path()).unwrap();
        assert_eq!(config.params.name, "jio-simnet");
        assert_eq!(config.cache_sizes.headers, 123);
        assert_eq!(config.cache_sizes.ghostdag, CacheSizes::default().ghostdag);
        assert_eq!(config.pipeline.worker_count, 2);
        assert_eq!(config.pipeline.max_pending_blocks, PipelineConfig::default().max_pending_blocks);
    }

    #[test]
    fn test_rejects_bad_files() {
        let registry = ParamsRegistry::with_defaults();
        assert!(matches!(ConsensusConfig::from_toml_str(&registry, "network = \"nope\""), Err(ConfigError::UnknownNetwork(_))));
        assert!(matches!(ConsensusConfig::from_toml_str(&registry, "network = 7"), Err(ConfigError::Parse(_))));
        assert!(matches!(
            ConsensusConfig::from_toml_str(&registry, "network = \"jio-mainnet\"\n[pipeline]\nworker_count = 0"),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(matches!(ConsensusConfig::load(&registry, Path::new("/nonexistent/consensus.toml")), Err(ConfigError::Io(_))));
    }
}
