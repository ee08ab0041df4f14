mod common;

use consensus::test_consensus::{small_params, TestConsensus};
use consensus_core::api::ConsensusApi;
use consensus_core::blockstatus::BlockStatus;
use consensus_core::errors::{ConsensusError, PruningProofError};

fn test_consensus() -> TestConsensus {
    common::init_logger();
    TestConsensus::with_params(small_params()).unwrap()
}

#[test]
fn test_pruning_point_is_monotonic() {
    let tc = test_consensus();
    let genesis = tc.genesis_hash();
    let pruning_depth = tc.params().pruning_depth();
    assert_eq!(tc.get_pruning_point().unwrap(), genesis);

    let mut tip = genesis;
    let mut last_score = 0;
    for _ in 0..pruning_depth + 20 {
        tip = tc.add_block_with_parents(vec![tip]).unwrap();
        let pruning_point = tc.get_pruning_point().unwrap();
        let score = tc.get_block_info(pruning_point).unwrap().unwrap().blue_score;
        assert!(score >= last_score);
        last_score = score;
    }

    let tip_score = tc.get_block_info(tip).unwrap().unwrap().blue_score;
    let pruning_point = tc.get_pruning_point().unwrap();
    assert_ne!(pruning_point, genesis);
    // Depth is measured from the virtual, one blue score above the tip
    assert_eq!(last_score + pruning_depth, tip_score + 1);
    assert!(tc.is_in_selected_parent_chain(pruning_point).unwrap());

    let history = tc.pruning_point_history().unwrap();
    assert_eq!(history.first(), Some(&genesis));
    assert_eq!(history.last(), Some(&pruning_point));
    let scores: Vec<u64> = history.iter().map(|hash| tc.get_block_info(*hash).unwrap().unwrap().blue_score).collect();
    assert!(scores.windows(2).all(|pair| pair[0] < pair[1]));

    // Bodies below the pruning point are gone, headers stay
    let pruned = tc.get_header(pruning_point).unwrap().unwrap().direct_parents()[0];
    assert_eq!(tc.get_block_info(pruned).unwrap().unwrap().status, BlockStatus::StatusHeaderOnly);
    assert!(tc.get_block(pruned).unwrap().is_none());
    assert!(tc.get_header(pruned).unwrap().is_some());
    assert!(tc.get_block(pruning_point).unwrap().is_some());
}

#[test]
fn test_history_below_the_proof_window_is_deleted() {
    let tc = test_consensus();
    let genesis = tc.genesis_hash();
    let pruning_depth = tc.params().pruning_depth();
    let window_depth = tc.params().pruning_proof_window_depth();

    // A side chain that is never merged, then a main chain long enough for
    // the pruning point to rise above the proof window
    let stale = tc.add_chain(genesis, 2).unwrap();
    let mut main = Vec::new();
    let mut tip = genesis;
    for _ in 0..pruning_depth + window_depth + 20 {
        tip = tc.add_block_with_parents(vec![tip]).unwrap();
        main.push(tip);
    }

    let pruning_point = tc.get_pruning_point().unwrap();
    let pruning_score = tc.get_block_info(pruning_point).unwrap().unwrap().blue_score;
    assert_eq!(pruning_score + pruning_depth, main.len() as u64 + 1);
    let bound = pruning_score - window_depth;

    // main[i] has blue score i + 1
    for hash in [genesis, main[0], main[bound as usize - 2], stale] {
        assert!(tc.get_block_info(hash).unwrap().is_none());
        assert!(tc.get_header(hash).unwrap().is_none());
        assert!(!tc.is_in_selected_parent_chain(hash).unwrap());
    }
    let lowest = main[bound as usize - 1];
    assert_eq!(tc.get_block_info(lowest).unwrap().unwrap().status, BlockStatus::StatusHeaderOnly);
    assert!(tc.get_header(lowest).unwrap().is_some());
    assert!(tc.is_in_selected_parent_chain(lowest).unwrap());
    assert_eq!(tc.get_tips().unwrap(), vec![tip]);

    assert_eq!(tc.create_block_locator(genesis, tip).unwrap_err(), ConsensusError::UnknownBlock(genesis));
    let locator = tc.create_block_locator(lowest, tip).unwrap();
    assert_eq!(locator.first(), Some(&tip));
    assert_eq!(locator.last(), Some(&lowest));

    // The pruned node keeps extending its chain and serving proofs
    let extended = tc.add_chain(tip, 3).unwrap();
    assert_eq!(tc.get_virtual_selected_parent().unwrap(), extended);
    let proof = tc.get_pruning_point_proof().unwrap();
    assert!(proof.headers.iter().all(|header| header.hash != genesis));
    assert!(proof.len() as u64 >= tc.params().pruning_proof_m);
    let target = test_consensus();
    target.validate_and_apply_pruning_point_proof(proof.clone()).unwrap();
    assert_eq!(target.get_pruning_point().unwrap(), proof.pruning_point);
}

#[test]
fn test_pruning_proof_sync() {
    let source = test_consensus();
    let pruning_depth = source.params().pruning_depth();
    let tip = source.add_chain(source.genesis_hash(), pruning_depth as usize + 10).unwrap();
    let pruning_point = source.get_pruning_point().unwrap();
    assert_ne!(pruning_point, source.genesis_hash());

    let proof = source.get_pruning_point_proof().unwrap();
    assert_eq!(proof.pruning_point, pruning_point);
    assert_eq!(proof.headers.last().map(|header| header.hash), Some(pruning_point));

    let target = test_consensus();
    target.validate_and_apply_pruning_point_proof(proof).unwrap();
    assert_eq!(target.get_pruning_point().unwrap(), pruning_point);
    assert_eq!(target.get_virtual_selected_parent().unwrap_err(), ConsensusError::AwaitingPruningPointUtxoSet(pruning_point));
    let next = source.get_block(tip).unwrap().unwrap();
    assert_eq!(target.add_block(next).unwrap_err(), ConsensusError::AwaitingPruningPointUtxoSet(pruning_point));

    let pruning_block = source.get_block(pruning_point).unwrap().unwrap();
    let utxos = source.get_pruning_point_utxo_set().unwrap();
    assert!(!utxos.is_empty());

    // A UTXO set not matching the committed one is refused
    let mut partial = utxos.clone();
    partial.pop();
    assert!(matches!(
        target.import_pruning_point_utxo_set(pruning_block.clone(), partial),
        Err(ConsensusError::PruningProof(PruningProofError::UtxoCommitmentMismatch(..)))
    ));

    target.import_pruning_point_utxo_set(pruning_block, utxos.clone()).unwrap();
    assert_eq!(target.get_virtual_selected_parent().unwrap(), pruning_point);
    assert_eq!(target.get_pruning_point_utxo_set().unwrap(), utxos);
    assert_eq!(target.get_block_info(pruning_point).unwrap().unwrap().status, BlockStatus::StatusUtxoValid);

    let extended = target.add_chain(pruning_point, 3).unwrap();
    assert_eq!(target.get_virtual_selected_parent().unwrap(), extended);
    assert_eq!(target.get_virtual_utxo_set(None).unwrap().len(), utxos.len() + 4);
}

#[test]
fn test_pruning_proof_with_insufficient_work_is_rejected() {
    let source = test_consensus();
    let pruning_depth = source.params().pruning_depth() as usize;
    source.add_chain(source.genesis_hash(), pruning_depth + 10).unwrap();
    let proof = source.get_pruning_point_proof().unwrap();

    // The target already holds more work than the proven pruning point
    let target = test_consensus();
    let tip = target.add_chain(target.genesis_hash(), pruning_depth / 2).unwrap();
    let err = target.validate_and_apply_pruning_point_proof(proof).unwrap_err();
    assert!(matches!(err, ConsensusError::PruningProof(PruningProofError::InsufficientWork(..))));
    assert!(!err.is_penalizable());
    assert!(!err.is_fatal());
    assert_eq!(target.get_virtual_selected_parent().unwrap(), tip);
    assert_eq!(target.get_pruning_point().unwrap(), target.genesis_hash());

    let mut forged = source.get_pruning_point_proof().unwrap();
    forged.headers.remove(0);
    let last = forged.headers.len() - 1;
    forged.headers.swap(0, last);
    assert!(matches!(
        test_consensus().validate_and_apply_pruning_point_proof(forged),
        Err(ConsensusError::PruningProof(PruningProofError::PruningPointMismatch(..)))
    ));
}
