//! Tests for a single block chain
//!
//! These tests verify:
//! - Block lookup by key and inclusive range scans across blocks
//! - Split on overflow (two thirds stay, the new entry joins its half)
//! - Unlink of emptied blocks, including the first one
//! - Forward merge when a block and its successor fit together
//! - The upward obligations reported for each structural change
//! - Integrity checking catches broken links and cycles

use blockindex::chain::{Chain, Layout, Propagation};
use blockindex::{IndexError, MemoryStorage, Offset, Storage};

type SmallChain = Chain<u32, 5>;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_chain() -> (MemoryStorage, SmallChain) {
    let mut storage = MemoryStorage::new();
    let chain = SmallChain::create(&mut storage).unwrap();
    (storage, chain)
}

/// Chain with `keys` inserted in the given order
fn chain_with(keys: &[u32]) -> (MemoryStorage, SmallChain) {
    let (mut storage, chain) = setup_chain();
    for &key in keys {
        assert!(chain.insert(&mut storage, key).unwrap().applied);
    }
    (storage, chain)
}

/// Entries of every linked block, in chain order
fn block_contents(storage: &mut MemoryStorage, chain: &SmallChain) -> Vec<Vec<u32>> {
    chain
        .blocks(storage)
        .unwrap()
        .into_iter()
        .map(|(_, block)| block.entries().to_vec())
        .collect()
}

fn block_offsets(storage: &mut MemoryStorage, chain: &SmallChain) -> Vec<Offset> {
    chain
        .blocks(storage)
        .unwrap()
        .into_iter()
        .map(|(offset, _)| offset)
        .collect()
}

// =============================================================================
// Creation Tests
// =============================================================================

#[test]
fn test_create_on_blank_storage_skips_null_offset() {
    let (mut storage, chain) = setup_chain();

    assert_ne!(chain.root_cell(), 0);
    assert!(chain.is_empty(&mut storage).unwrap());
    assert_eq!(chain.first_block(&mut storage).unwrap(), 0);
    assert_eq!(chain.len(&mut storage).unwrap(), 0);
}

#[test]
fn test_first_insert_starts_chain() {
    let (mut storage, chain) = setup_chain();

    let mutation = chain.insert(&mut storage, 42).unwrap();
    let first = chain.first_block(&mut storage).unwrap();

    assert!(mutation.applied);
    assert_eq!(mutation.upward, vec![Propagation::InsertAt { key: 42, offset: first }]);

    let blocks = chain.blocks(&mut storage).unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].1.prev(), chain.root_cell());
    assert_eq!(blocks[0].1.next(), 0);
}

#[test]
fn test_two_chains_share_storage() {
    let mut storage = MemoryStorage::new();
    let odd = SmallChain::create(&mut storage).unwrap();
    let even = SmallChain::create(&mut storage).unwrap();
    assert_ne!(odd.root_cell(), even.root_cell());

    for i in 0..20 {
        let chain = if i % 2 == 0 { &even } else { &odd };
        chain.insert(&mut storage, i).unwrap();
    }

    assert_eq!(even.range(&mut storage, &0, &100).unwrap(), (0..20).step_by(2).collect::<Vec<_>>());
    assert_eq!(odd.range(&mut storage, &0, &100).unwrap(), (1..20).step_by(2).collect::<Vec<_>>());
    even.verify(&mut storage).unwrap();
    odd.verify(&mut storage).unwrap();
}

// =============================================================================
// Lookup Tests
// =============================================================================

#[test]
fn test_find_block_on_empty_chain() {
    let (mut storage, chain) = setup_chain();
    assert_eq!(chain.find_block(&mut storage, &7).unwrap(), 0);
}

#[test]
fn test_find_block_picks_last_block_starting_at_or_before_key() {
    let (mut storage, chain) = chain_with(&[10, 20, 30, 40, 50, 60]);
    let offsets = block_offsets(&mut storage, &chain);
    assert_eq!(block_contents(&mut storage, &chain), vec![vec![10, 20, 30], vec![40, 50, 60]]);

    assert_eq!(chain.find_block(&mut storage, &5).unwrap(), 0);
    assert_eq!(chain.find_block(&mut storage, &10).unwrap(), offsets[0]);
    assert_eq!(chain.find_block(&mut storage, &39).unwrap(), offsets[0]);
    assert_eq!(chain.find_block(&mut storage, &40).unwrap(), offsets[1]);
    assert_eq!(chain.find_block(&mut storage, &1000).unwrap(), offsets[1]);
}

#[test]
fn test_range_spans_blocks() {
    let (mut storage, chain) = chain_with(&[10, 20, 30, 40, 50, 60]);

    assert_eq!(chain.range(&mut storage, &20, &50).unwrap(), vec![20, 30, 40, 50]);
    assert_eq!(chain.range(&mut storage, &0, &15).unwrap(), vec![10]);
    assert_eq!(chain.range(&mut storage, &31, &39).unwrap(), Vec::<u32>::new());
    assert_eq!(chain.range(&mut storage, &0, &u32::MAX).unwrap().len(), 6);
}

#[test]
fn test_range_with_end_before_begin_is_empty() {
    let (mut storage, chain) = chain_with(&[1, 2, 3]);
    assert!(chain.range(&mut storage, &3, &1).unwrap().is_empty());
}

#[test]
fn test_floor() {
    let (mut storage, chain) = chain_with(&[10, 20, 30, 40, 50, 60]);

    assert_eq!(chain.floor(&mut storage, &9).unwrap(), None);
    assert_eq!(chain.floor(&mut storage, &10).unwrap(), Some(10));
    assert_eq!(chain.floor(&mut storage, &45).unwrap(), Some(40));
    assert_eq!(chain.floor(&mut storage, &39).unwrap(), Some(30));
    assert_eq!(chain.floor(&mut storage, &99).unwrap(), Some(60));
}

// =============================================================================
// Insert / Split Tests
// =============================================================================

#[test]
fn test_duplicate_insert_is_noop() {
    let (mut storage, chain) = chain_with(&[1, 2, 3]);
    let before = storage.as_bytes().to_vec();

    let mutation = chain.insert(&mut storage, 2).unwrap();

    assert!(!mutation.applied);
    assert!(mutation.is_noop());
    assert_eq!(storage.as_bytes(), before.as_slice());
}

#[test]
fn test_split_on_ascending_inserts() {
    let (mut storage, chain) = chain_with(&[1, 2, 3, 4, 5]);
    let first = chain.first_block(&mut storage).unwrap();

    let mutation = chain.insert(&mut storage, 6).unwrap();
    let offsets = block_offsets(&mut storage, &chain);

    assert_eq!(block_contents(&mut storage, &chain), vec![vec![1, 2, 3], vec![4, 5, 6]]);
    assert_eq!(offsets[0], first);
    assert_eq!(mutation.upward, vec![Propagation::InsertAt { key: 4, offset: offsets[1] }]);
}

#[test]
fn test_split_with_entry_landing_left() {
    let (mut storage, chain) = chain_with(&[10, 20, 30, 40, 50]);
    let first = chain.first_block(&mut storage).unwrap();

    // Lands at position 0, so the left half keeps it and its first changes
    let mutation = chain.insert(&mut storage, 5).unwrap();
    let offsets = block_offsets(&mut storage, &chain);

    assert_eq!(block_contents(&mut storage, &chain), vec![vec![5, 10, 20, 30], vec![40, 50]]);
    assert_eq!(
        mutation.upward,
        vec![
            Propagation::Replace { offset: first, old: 10, new: 5 },
            Propagation::InsertAt { key: 40, offset: offsets[1] },
        ]
    );
}

#[test]
fn test_split_of_middle_block_relinks_successor() {
    let (mut storage, chain) = chain_with(&[10, 20, 30, 40, 50, 60]);
    // [10 20 30] [40 50 60] -> fill the first block, then overflow it
    for key in [11, 12] {
        chain.insert(&mut storage, key).unwrap();
    }
    assert_eq!(
        block_contents(&mut storage, &chain),
        vec![vec![10, 11, 12, 20, 30], vec![40, 50, 60]]
    );

    chain.insert(&mut storage, 25).unwrap();

    assert_eq!(
        block_contents(&mut storage, &chain),
        vec![vec![10, 11, 12], vec![20, 25, 30], vec![40, 50, 60]]
    );
    let stats = chain.verify(&mut storage).unwrap();
    assert_eq!(stats.blocks, 3);
    assert_eq!(stats.entries, 9);
}

#[test]
fn test_many_inserts_stay_sorted() {
    let keys: Vec<u32> = (0..200).map(|i| (i * 7919) % 1000).collect();
    let (mut storage, chain) = chain_with(&keys);

    let mut expected = keys.clone();
    expected.sort_unstable();
    expected.dedup();

    assert_eq!(chain.range(&mut storage, &0, &u32::MAX).unwrap(), expected);
    let stats = chain.verify(&mut storage).unwrap();
    assert_eq!(stats.entries, expected.len());
}

// =============================================================================
// Erase / Unlink / Merge Tests
// =============================================================================

#[test]
fn test_erase_missing_entry_is_noop() {
    let (mut storage, chain) = chain_with(&[10, 20, 30]);

    let below = chain.erase(&mut storage, &5).unwrap();
    let between = chain.erase(&mut storage, &15).unwrap();

    assert!(!below.applied && below.is_noop());
    assert!(!between.applied && between.is_noop());
    assert_eq!(chain.len(&mut storage).unwrap(), 3);
}

#[test]
fn test_erase_first_entry_reports_replace() {
    let (mut storage, chain) = chain_with(&[10, 20, 30]);
    let first = chain.first_block(&mut storage).unwrap();

    let mutation = chain.erase(&mut storage, &10).unwrap();

    assert!(mutation.applied);
    assert_eq!(mutation.upward, vec![Propagation::Replace { offset: first, old: 10, new: 20 }]);
}

#[test]
fn test_erase_middle_entry_reports_nothing() {
    let (mut storage, chain) = chain_with(&[10, 20, 30]);

    let mutation = chain.erase(&mut storage, &20).unwrap();

    assert!(mutation.applied);
    assert!(mutation.is_noop());
    assert_eq!(chain.range(&mut storage, &0, &100).unwrap(), vec![10, 30]);
}

#[test]
fn test_erase_merges_successor_below_capacity() {
    let (mut storage, chain) = chain_with(&[1, 2, 3, 4, 5, 6]);
    let offsets = block_offsets(&mut storage, &chain);

    // 2 + 3 entries would fill a block: no merge yet
    let mutation = chain.erase(&mut storage, &2).unwrap();
    assert!(mutation.is_noop());
    assert_eq!(block_contents(&mut storage, &chain).len(), 2);

    // 1 + 3 entries fit with room to spare
    let mutation = chain.erase(&mut storage, &3).unwrap();
    assert_eq!(mutation.upward, vec![Propagation::RemoveAt { key: 4, offset: offsets[1] }]);
    assert_eq!(block_contents(&mut storage, &chain), vec![vec![1, 4, 5, 6]]);
    chain.verify(&mut storage).unwrap();
}

#[test]
fn test_erase_first_entry_then_merge_orders_obligations() {
    let (mut storage, chain) = chain_with(&[1, 2, 3, 4, 5, 6]);
    let offsets = block_offsets(&mut storage, &chain);
    chain.erase(&mut storage, &3).unwrap();

    let mutation = chain.erase(&mut storage, &1).unwrap();

    assert_eq!(
        mutation.upward,
        vec![
            Propagation::Replace { offset: offsets[0], old: 1, new: 2 },
            Propagation::RemoveAt { key: 4, offset: offsets[1] },
        ]
    );
    assert_eq!(block_contents(&mut storage, &chain), vec![vec![2, 4, 5, 6]]);
}

#[test]
fn test_erase_last_block_unlinks_it() {
    let (mut storage, chain) = chain_with(&[1, 2, 3, 4, 5, 6]);
    let offsets = block_offsets(&mut storage, &chain);

    chain.erase(&mut storage, &4).unwrap();
    chain.erase(&mut storage, &5).unwrap();
    let mutation = chain.erase(&mut storage, &6).unwrap();

    assert_eq!(mutation.upward, vec![Propagation::RemoveAt { key: 6, offset: offsets[1] }]);
    assert_eq!(block_contents(&mut storage, &chain), vec![vec![1, 2, 3]]);

    let blocks = chain.blocks(&mut storage).unwrap();
    assert_eq!(blocks[0].1.next(), 0);
}

#[test]
fn test_erase_first_block_moves_root() {
    let (mut storage, chain) = chain_with(&[1, 2, 3, 4, 5, 6, 7, 8]);
    let offsets = block_offsets(&mut storage, &chain);
    assert_eq!(block_contents(&mut storage, &chain), vec![vec![1, 2, 3], vec![4, 5, 6, 7, 8]]);

    // The successor is full, so the first block drains instead of merging
    chain.erase(&mut storage, &1).unwrap();
    chain.erase(&mut storage, &2).unwrap();
    let mutation = chain.erase(&mut storage, &3).unwrap();

    assert_eq!(mutation.upward, vec![Propagation::RemoveAt { key: 3, offset: offsets[0] }]);
    assert_eq!(chain.first_block(&mut storage).unwrap(), offsets[1]);

    let blocks = chain.blocks(&mut storage).unwrap();
    assert_eq!(blocks[0].1.prev(), chain.root_cell());
    chain.verify(&mut storage).unwrap();
}

#[test]
fn test_erase_everything_empties_root() {
    let keys: Vec<u32> = (0..40).collect();
    let (mut storage, chain) = chain_with(&keys);

    for key in keys.iter().rev() {
        assert!(chain.erase(&mut storage, key).unwrap().applied);
    }

    assert!(chain.is_empty(&mut storage).unwrap());
    assert!(chain.range(&mut storage, &0, &u32::MAX).unwrap().is_empty());
    assert_eq!(chain.verify(&mut storage).unwrap().blocks, 0);
}

#[test]
fn test_storage_never_shrinks() {
    let (mut storage, chain) = chain_with(&[1, 2, 3, 4, 5, 6]);
    let size = storage.size();

    for key in 1..=6 {
        chain.erase(&mut storage, &key).unwrap();
    }

    assert_eq!(storage.size(), size);
}

// =============================================================================
// Replace Tests
// =============================================================================

#[test]
fn test_replace_first_entry_in_place() {
    let (mut storage, chain) = chain_with(&[10, 20, 30]);
    let first = chain.first_block(&mut storage).unwrap();

    let mutation = chain.replace(&mut storage, &10, 5).unwrap();

    assert_eq!(mutation.upward, vec![Propagation::Replace { offset: first, old: 10, new: 5 }]);
    assert_eq!(chain.range(&mut storage, &0, &100).unwrap(), vec![5, 20, 30]);
}

#[test]
fn test_replace_missing_entry_fails() {
    let (mut storage, chain) = chain_with(&[10, 20, 30]);

    let result = chain.replace(&mut storage, &25, 26);
    assert!(matches!(result, Err(IndexError::StructuralInconsistency(_))));

    let result = chain.replace(&mut storage, &1, 2);
    assert!(matches!(result, Err(IndexError::StructuralInconsistency(_))));
}

// =============================================================================
// Integrity Tests
// =============================================================================

#[test]
fn test_verify_detects_broken_back_link() {
    let (mut storage, chain) = chain_with(&[1, 2, 3, 4, 5, 6]);
    let offsets = block_offsets(&mut storage, &chain);

    let prev_field = offsets[1] + Layout::<u32, 5>::PREV as u64;
    storage.write_u64(prev_field, 12345).unwrap();

    let result = chain.verify(&mut storage);
    assert!(matches!(result, Err(IndexError::StructuralInconsistency(_))));
}

#[test]
fn test_blocks_detects_cycle() {
    let (mut storage, chain) = chain_with(&[1, 2, 3, 4, 5, 6]);
    let offsets = block_offsets(&mut storage, &chain);

    let next_field = offsets[1] + Layout::<u32, 5>::NEXT as u64;
    storage.write_u64(next_field, offsets[0]).unwrap();

    let result = chain.blocks(&mut storage);
    assert!(matches!(result, Err(IndexError::StructuralInconsistency(_))));
}

#[test]
fn test_dangling_link_is_invalid_offset() {
    let (mut storage, chain) = chain_with(&[1, 2, 3]);
    let first = chain.first_block(&mut storage).unwrap();

    storage.write_u64(first + Layout::<u32, 5>::NEXT as u64, 1 << 40).unwrap();

    let result = chain.range(&mut storage, &0, &100);
    assert!(matches!(result, Err(IndexError::InvalidOffset { .. })));
}
