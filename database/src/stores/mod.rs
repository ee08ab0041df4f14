//! Typed stores over the consensus column families.
//!
//! Every read takes the staging area it should observe; pass an empty one to
//! read committed state only. Every write goes to a staging area.

pub mod acceptance_data;
pub mod block_transactions;
pub mod ghostdag;
pub mod headers;
pub mod reachability;
pub mod relations;
pub mod selected_chain;
pub mod statuses;
pub mod utxo_diffs;
pub mod utxo_set;

pub use acceptance_data::DbAcceptanceDataStore;
pub use block_transactions::DbBlockTransactionsStore;
pub use ghostdag::DbGhostdagStore;
pub use headers::DbHeadersStore;
pub use reachability::DbReachabilityStore;
pub use relations::DbRelationsStore;
pub use selected_chain::DbSelectedChainStore;
pub use statuses::DbStatusesStore;
pub use utxo_diffs::DbUtxoDiffsStore;
pub use utxo_set::DbUtxoSetStore;
