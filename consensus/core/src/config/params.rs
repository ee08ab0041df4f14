use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::genesis::GenesisBlock;
use super::ConfigError;
use crate::constants::{MAX_COINBASE_PAYLOAD_LEN, SOMPI_PER_JIO};
use crate::KType;

pub const MAINNET_PARAMS_NET: u32 = 0x3ddc_f71d;
pub const TESTNET_PARAMS_NET: u32 = 0xddb8_af8f;
pub const SIMNET_PARAMS_NET: u32 = 0x374d_cf1c;
pub const DEVNET_PARAMS_NET: u32 = 0x732d_87e1;

const DEFAULT_GHOSTDAG_K: KType = 18;
const DEFAULT_TARGET_TIME_PER_BLOCK: u64 = 1_000;
const DEFAULT_FINALITY_DURATION: u64 = 24 * 60 * 60 * 1_000;
const DEFAULT_DIFFICULTY_WINDOW_SIZE: usize = 2641;
const DEFAULT_TIMESTAMP_DEVIATION_TOLERANCE: u64 = 132;
const DEFAULT_MAX_BLOCK_MASS: u64 = 500_000;
const DEFAULT_MAX_BLOCK_PARENTS: usize = 10;
const DEFAULT_MERGE_SET_SIZE_LIMIT: u64 = DEFAULT_GHOSTDAG_K as u64 * 10;
const DEFAULT_PRUNING_PROOF_M: u64 = 1000;
const DEFAULT_COINBASE_MATURITY: u64 = 100;

/// Immutable consensus parameters of one network.
///
/// Built once at startup (see [`ParamsRegistry`]) and shared as `Arc<Params>`.
/// Durations are in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    pub name: String,
    /// Magic identifying the network
    pub net: u32,
    pub genesis: GenesisBlock,
    pub ghostdag_k: KType,
    pub target_time_per_block: u64,
    pub finality_duration: u64,
    pub difficulty_window_size: usize,
    pub timestamp_deviation_tolerance: u64,
    /// Easiest allowed target, in compact form
    pub pow_max_bits: u32,
    pub max_block_mass: u64,
    pub max_block_parents: usize,
    pub mass_per_tx_byte: u64,
    pub mass_per_script_pub_key_byte: u64,
    pub mass_per_sig_op: u64,
    pub merge_set_size_limit: u64,
    pub pruning_proof_m: u64,
    pub coinbase_maturity: u64,
    pub block_subsidy: u64,
    pub max_coinbase_payload_len: usize,
    pub skip_proof_of_work: bool,
    pub disable_difficulty_adjustment: bool,
}

impl Params {
    /// Finality duration expressed in blocks
    pub fn finality_depth(&self) -> u64 {
        self.finality_duration / self.target_time_per_block
    }

    /// Pruning depth in blocks: deep enough to tolerate bounded reorgs below finality
    pub fn pruning_depth(&self) -> u64 {
        let k = self.ghostdag_k as u64;
        2 * self.finality_depth() + 4 * self.merge_set_size_limit * k + 2 * k + 2
    }

    /// Blue score depth below the pruning point covered by pruning proofs and
    /// retained by pruning: the deepest window a new block reads, plus room for
    /// GHOSTDAG to color the blocks at its bottom
    pub fn pruning_proof_window_depth(&self) -> u64 {
        let k = self.ghostdag_k as u64;
        let deepest_window = self.pruning_depth().max(self.difficulty_window_size as u64).max(self.pruning_proof_m);
        deepest_window + 2 * k + 2
    }

    /// Window size for past median time
    pub fn past_median_time_window_size(&self) -> usize {
        (2 * self.timestamp_deviation_tolerance - 1) as usize
    }

    /// Maximum distance, in milliseconds, a timestamp may run ahead of local time
    pub fn max_future_time_offset(&self) -> u64 {
        self.timestamp_deviation_tolerance * self.target_time_per_block
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ghostdag_k == 0 {
            return Err(ConfigError::InvalidValue("ghostdag_k must be positive".into()));
        }
        if self.target_time_per_block == 0 || self.finality_duration < self.target_time_per_block {
            return Err(ConfigError::InvalidValue("finality duration must cover at least one block".into()));
        }
        if self.max_block_parents == 0 || self.difficulty_window_size < 2 || self.timestamp_deviation_tolerance == 0 {
            return Err(ConfigError::InvalidValue("window and parent limits must be positive".into()));
        }
        if self.merge_set_size_limit < self.ghostdag_k as u64 {
            return Err(ConfigError::InvalidValue("merge set size limit must be at least K".into()));
        }
        Ok(())
    }

    pub fn mainnet() -> Self {
        Self {
            name: "jio-mainnet".into(),
            net: MAINNET_PARAMS_NET,
            genesis: GenesisBlock::mainnet(),
            ghostdag_k: DEFAULT_GHOSTDAG_K,
            target_time_per_block: DEFAULT_TARGET_TIME_PER_BLOCK,
            finality_duration: DEFAULT_FINALITY_DURATION,
            difficulty_window_size: DEFAULT_DIFFICULTY_WINDOW_SIZE,
            timestamp_deviation_tolerance: DEFAULT_TIMESTAMP_DEVIATION_TOLERANCE,
            pow_max_bits: 0x1f00_ffff,
            max_block_mass: DEFAULT_MAX_BLOCK_MASS,
            max_block_parents: DEFAULT_MAX_BLOCK_PARENTS,
            mass_per_tx_byte: 1,
            mass_per_script_pub_key_byte: 10,
            mass_per_sig_op: 1000,
            merge_set_size_limit: DEFAULT_MERGE_SET_SIZE_LIMIT,
            pruning_proof_m: DEFAULT_PRUNING_PROOF_M,
            coinbase_maturity: DEFAULT_COINBASE_MATURITY,
            block_subsidy: 50 * SOMPI_PER_JIO,
            max_coinbase_payload_len: MAX_COINBASE_PAYLOAD_LEN,
            skip_proof_of_work: false,
            disable_difficulty_adjustment: false,
        }
    }

    pub fn testnet() -> Self {
        Self { name: "jio-testnet".into(), net: TESTNET_PARAMS_NET, genesis: GenesisBlock::testnet(), ..Self::mainnet() }
    }

    /// Private simulation network: trivial proof of work and fixed difficulty
    pub fn simnet() -> Self {
        Self {
            name: "jio-simnet".into(),
            net: SIMNET_PARAMS_NET,
            genesis: GenesisBlock::simnet(),
            pow_max_bits: 0x207f_ffff,
            skip_proof_of_work: true,
            disable_difficulty_adjustment: true,
            ..Self::mainnet()
        }
    }

    pub fn devnet() -> Self {
        Self {
            name: "jio-devnet".into(),
            net: DEVNET_PARAMS_NET,
            genesis: GenesisBlock::devnet(),
            pow_max_bits: 0x207f_ffff,
            ..Self::mainnet()
        }
    }
}

/// Explicit registry of the networks known to this process.
///
/// A network identity (`net`) may be registered only once.
#[derive(Debug, Default)]
pub struct ParamsRegistry {
    nets: HashMap<u32, Arc<Params>>,
}

impl ParamsRegistry {
    pub fn new() -> Self {
        Self { nets: HashMap::new() }
    }

    /// A registry holding the four standard networks
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for params in [Params::mainnet(), Params::testnet(), Params::simnet(), Params::devnet()] {
            // Standard networks have distinct identities
            let _ = registry.register(params);
        }
        registry
    }

    pub fn register(&mut self, params: Params) -> Result<Arc<Params>, ConfigError> {
        if self.nets.contains_key(&params.net) {
            return Err(ConfigError::DuplicateNetwork(params.net, params.name));
        }
        params.validate()?;
        let params = Arc::new(params);
        self.nets.insert(params.net, params.clone());
        Ok(params)
    }

    pub fn get(&self, net: u32) -> Option<Arc<Params>> {
        self.nets.get(&net).cloned()
    }

    pub fn by_name(&self, name: &str) -> Result<Arc<Params>, ConfigError> {
        self.nets.values().find(|p| p.name == name).cloned().ok_or_else(|| ConfigError::UnknownNetwork(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.nets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depths() {
        let params = Params::mainnet();
        assert_eq!(params.finality_depth(), 86_400);
        assert_eq!(params.pruning_depth(), 2 * 86_400 + 4 * 180 * 18 + 2 * 18 + 2);
        assert_eq!(params.past_median_time_window_size(), 263);
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = ParamsRegistry::with_defaults();
        assert_eq!(registry.len(), 4);
        let err = registry.register(Params::simnet()).unwrap_err();
        assert_eq!(err, ConfigError::DuplicateNetwork(SIMNET_PARAMS_NET, "jio-simnet".into()));

        let custom = Params { name: "custom".into(), net: 7, ..Params::simnet() };
        let registered = registry.register(custom).unwrap();
        assert_eq!(registry.get(7).unwrap(), registered);
        assert!(registry.register(Params { name: "other".into(), net: 7, ..Params::simnet() }).is_err());
        assert_eq!(registry.by_name("custom").unwrap().net, 7);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let mut registry = ParamsRegistry::new();
        let bad = Params { ghostdag_k: 0, ..Params::simnet() };
        assert!(matches!(registry.register(bad), Err(ConfigError::InvalidValue(_))));
        assert!(registry.is_empty());
    }
}
