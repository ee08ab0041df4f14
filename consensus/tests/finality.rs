mod common;

use consensus::test_consensus::{small_params, TestConsensus};
use consensus_core::api::{ConsensusApi, FinalityConflictResolution};
use consensus_core::blockstatus::BlockStatus;
use consensus_core::errors::{ConsensusError, RuleError};
use consensus_core::Hash;

struct Conflict {
    tc: TestConsensus,
    main: Vec<Hash>,
    side: Vec<Hash>,
    violating: Hash,
}

fn chain(tc: &TestConsensus, from: Hash, len: usize) -> Vec<Hash> {
    let mut blocks = Vec::with_capacity(len);
    let mut tip = from;
    for _ in 0..len {
        tip = tc.add_block_with_parents(vec![tip]).unwrap();
        blocks.push(tip);
    }
    blocks
}

/// A main chain of ten blocks, then a side chain from genesis which overtakes
/// it by merging two tips, without descending from the finality point
fn conflict() -> Conflict {
    common::init_logger();
    let tc = TestConsensus::with_params(small_params()).unwrap();
    let genesis = tc.genesis_hash();
    assert_eq!(tc.params().finality_depth(), 6);

    let main = chain(&tc, genesis, 10);
    let side = chain(&tc, genesis, 9);
    assert_eq!(tc.get_virtual_selected_parent().unwrap(), main[9]);
    assert_eq!(tc.get_finality_point().unwrap(), main[3]);

    let sibling = tc.add_block_with_parents(vec![side[7]]).unwrap();
    let block = tc.build_block_with_parents(vec![side[8], sibling]).unwrap();
    let violating = block.hash();
    assert_eq!(tc.add_block(block).unwrap_err(), ConsensusError::FinalityViolation(violating, main[3]));
    Conflict { tc, main, side, violating }
}

#[test]
fn test_violating_block_is_parked() {
    let Conflict { tc, main, violating, .. } = conflict();

    let info = tc.get_block_info(violating).unwrap().unwrap();
    assert_eq!(info.status, BlockStatus::StatusViolatingFinality);
    assert!(info.blue_work > tc.get_block_info(main[9]).unwrap().unwrap().blue_work);
    assert_eq!(tc.get_virtual_selected_parent().unwrap(), main[9]);
    assert!(!tc.get_tips().unwrap().contains(&violating));
    assert!(!tc.is_halted());

    let conflicts = tc.finality_conflicts().unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].violating_block, violating);
    assert_eq!(conflicts[0].finality_point, main[3]);
    assert_eq!(conflicts[0].selected_tip, main[9]);

    // The main chain keeps growing while the conflict is open
    let tip = tc.add_chain(main[9], 2).unwrap();
    assert_eq!(tc.get_virtual_selected_parent().unwrap(), tip);
}

#[test]
fn test_keep_current_chain() {
    let Conflict { tc, main, violating, .. } = conflict();

    tc.resolve_finality_conflict(violating, FinalityConflictResolution::KeepCurrent).unwrap();
    assert_eq!(tc.get_block_info(violating).unwrap().unwrap().status, BlockStatus::StatusInvalid);
    assert_eq!(tc.get_virtual_selected_parent().unwrap(), main[9]);
    assert!(tc.finality_conflicts().unwrap().is_empty());
    assert_eq!(
        tc.resolve_finality_conflict(violating, FinalityConflictResolution::KeepCurrent).unwrap_err(),
        ConsensusError::UnknownFinalityConflict(violating)
    );

    let child = tc.build_block_with_parents(vec![main[9]]).unwrap();
    let mut orphaned = child.clone();
    orphaned.header.parents_by_level = vec![vec![violating]];
    orphaned.header.finalize();
    let orphaned_hash = orphaned.hash();
    assert_eq!(tc.add_block(orphaned).unwrap_err(), ConsensusError::Rule(RuleError::InvalidParent(orphaned_hash, violating)));
    assert_eq!(tc.add_block(child).unwrap(), BlockStatus::StatusUtxoValid);
}

#[test]
fn test_switch_to_violating_chain() {
    let Conflict { tc, main, side, violating } = conflict();

    tc.resolve_finality_conflict(violating, FinalityConflictResolution::SwitchToViolating).unwrap();
    assert_eq!(tc.get_block_info(violating).unwrap().unwrap().status, BlockStatus::StatusUtxoValid);
    assert_eq!(tc.get_virtual_selected_parent().unwrap(), violating);
    assert!(tc.get_tips().unwrap().contains(&violating));
    assert!(tc.is_in_selected_parent_chain(side[0]).unwrap());
    assert!(!tc.is_in_selected_parent_chain(main[0]).unwrap());
    assert!(tc.finality_conflicts().unwrap().is_empty());

    let next = tc.add_block_with_parents(vec![violating]).unwrap();
    assert_eq!(tc.get_virtual_selected_parent().unwrap(), next);
}

#[test]
fn test_unknown_conflict() {
    common::init_logger();
    let tc = TestConsensus::with_params(small_params()).unwrap();
    let block = tc.add_block_with_parents(vec![tc.genesis_hash()]).unwrap();
    assert_eq!(
        tc.resolve_finality_conflict(block, FinalityConflictResolution::SwitchToViolating).unwrap_err(),
        ConsensusError::UnknownFinalityConflict(block)
    );
}
