//! Network parameters and their registry.

pub mod genesis;
pub mod params;

use thiserror::Error;

pub use params::{Params, ParamsRegistry, DEVNET_PARAMS_NET, MAINNET_PARAMS_NET, SIMNET_PARAMS_NET, TESTNET_PARAMS_NET};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("network {1} ({0:#x}) is already registered")]
    DuplicateNetwork(u32, String),

    #[error("unknown network {0}")]
    UnknownNetwork(String),

    #[error("invalid parameter: {0}")]
    InvalidValue(String),

    #[error("failed reading configuration: {0}")]
    Io(String),

    #[error("failed parsing configuration: {0}")]
    Parse(String),
}
