/// Current block version
pub const BLOCK_VERSION: u16 = 1;

/// Current transaction version
pub const TX_VERSION: u16 = 0;

/// Number of sompi (base units) in one Jiocoin
pub const SOMPI_PER_JIO: u64 = 100_000_000;

/// Upper bound of the money supply in sompi
pub const MAX_SOMPI: u64 = 29_000_000_000 * SOMPI_PER_JIO;

/// Maximum coinbase payload length in bytes
pub const MAX_COINBASE_PAYLOAD_LEN: usize = 204;

/// Maximum payload length of a regular transaction
pub const MAX_TX_PAYLOAD_LEN: usize = 10_000;

/// Maximum number of inputs (and outputs) per transaction
pub const MAX_TX_IN_OUT: usize = 10_000;

/// Default number of cached signature verification results
pub const DEFAULT_SIG_CACHE_SIZE: usize = 10_000;

/// Sighash type covering all inputs and outputs (the only supported type)
pub const SIG_HASH_ALL: u8 = 0x01;
