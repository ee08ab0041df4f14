mod common;

use std::sync::Arc;

use consensus::test_consensus::{small_params, TestConsensus};
use consensus::ConsensusConfig;
use consensus_core::api::ConsensusApi;
use consensus_core::config::{ConfigError, Params};
use consensus_core::errors::ConsensusError;

fn config(params: Params) -> ConsensusConfig {
    ConsensusConfig::new(Arc::new(params))
}

#[test]
fn test_state_survives_restart() {
    common::init_logger();
    let dir = tempfile::tempdir().unwrap();

    let (tip, tips, utxos, pruning_point) = {
        let tc = TestConsensus::open(dir.path(), config(small_params())).unwrap();
        let genesis = tc.genesis_hash();
        let main = tc.add_chain(genesis, 8).unwrap();
        tc.add_chain(genesis, 2).unwrap();
        assert_eq!(tc.get_virtual_selected_parent().unwrap(), main);
        (main, tc.get_tips().unwrap(), tc.get_virtual_utxo_set(None).unwrap(), tc.get_pruning_point().unwrap())
    };

    let tc = TestConsensus::open(dir.path(), config(small_params())).unwrap();
    assert_eq!(tc.get_virtual_selected_parent().unwrap(), tip);
    assert_eq!(tc.get_tips().unwrap(), tips);
    assert_eq!(tc.get_virtual_utxo_set(None).unwrap(), utxos);
    assert_eq!(tc.get_pruning_point().unwrap(), pruning_point);
    assert!(tc.is_in_selected_parent_chain(tip).unwrap());

    let next = tc.add_block_with_parents(vec![tip]).unwrap();
    assert_eq!(tc.get_virtual_selected_parent().unwrap(), next);
    assert_eq!(tc.get_virtual_utxo_set(None).unwrap().len(), utxos.len() + 1);
}

#[test]
fn test_database_of_another_network_is_refused() {
    common::init_logger();
    let dir = tempfile::tempdir().unwrap();
    drop(TestConsensus::open(dir.path(), config(small_params())).unwrap());

    let result = TestConsensus::open(dir.path(), config(Params::devnet()));
    assert!(matches!(result, Err(ConsensusError::Config(ConfigError::InvalidValue(_)))));

    // The original network still opens it
    assert!(TestConsensus::open(dir.path(), config(small_params())).is_ok());
}
