mod common;

use common::*;
use shielded_pool::constants::MAX_LEAVES;
use shielded_pool::utils::crypto::hash_pair;
use shielded_pool::{
    CircuitKind, CommitmentTree, IdentifierKind, LedgerSnapshot, OperationType, PoolError,
    PoolEvent, ShieldedPool, SwapPublicInputs, SwapSide, TransferPublicInputs, VkRegistry,
    WithdrawPublicInputs,
};

fn transfer(new_root: [u8; 32], nullifiers: Vec<[u8; 32]>, outputs: Vec<[u8; 32]>) -> Vec<u8> {
    TransferPublicInputs {
        new_root,
        nullifiers,
        new_commitments: outputs,
        key_image: [0u8; 32],
    }
    .encode()
}

fn withdrawal(nullifiers: Vec<[u8; 32]>, receiver: [u8; 32]) -> Vec<u8> {
    WithdrawPublicInputs {
        new_root: id(0x70),
        nullifiers,
        asset: ASSET,
        amount: 4,
        receiver,
        new_commitments: vec![id(0x71)],
    }
    .encode()
}

fn swap(nullifiers: Vec<[u8; 32]>, order_a: [u8; 32], order_b: [u8; 32]) -> Vec<u8> {
    SwapPublicInputs {
        new_root: id(0x80),
        nullifiers,
        new_commitments: vec![id(0x81), id(0x82)],
        order_a_key_image: order_a,
        order_b_key_image: order_b,
    }
    .encode()
}

#[test]
fn test_deposit_then_private_transfer() {
    let pool = pool();
    let r0 = pool.root().unwrap();
    let c1 = id(0xc1);
    let c2 = id(0xc2);
    let r2 = id(0xe2);

    let deposited = pool.deposit(&DEPOSITOR, &ASSET, 10, &c1, b"enc-note").unwrap();
    let r1 = pool.root().unwrap();
    assert_ne!(r1, r0);
    assert_eq!(deposited.root, r1);
    assert_eq!(
        deposited.events,
        vec![PoolEvent::AccountUpdated { commitment: c1, memo: b"enc-note".to_vec() }]
    );
    assert_eq!(pool.next_index().unwrap(), 1);
    assert_eq!(pool.node(0, 0).unwrap(), Some(c1));
    assert_eq!(
        pool.assets().movements(),
        vec![Movement::Pull { asset: ASSET, from: DEPOSITOR, amount: 10 }]
    );

    let delta = pool.transact(&transfer(r2, vec![], vec![c2]), PROOF).unwrap();
    assert_eq!(pool.root().unwrap(), r2);
    assert_eq!(
        delta.events[0],
        PoolEvent::AccountUpdated { commitment: c2, memo: Vec::new() }
    );
    assert_eq!(
        delta.events[1],
        PoolEvent::TransactionExecuted { new_root: r2, nullifiers: vec![], new_commitments: vec![c2] }
    );
    assert_eq!(delta.events.len(), 2);
    assert_eq!(delta.sequence, deposited.sequence + 1);
}

#[test]
fn test_nullifier_unique_across_operations() {
    let pool = pool();
    let n = id(0x01);

    pool.transact(&transfer(id(0xe1), vec![n], vec![]), PROOF).unwrap();
    assert!(pool.is_used(&n).unwrap());
    let record = pool.read(|s| s.registry().record(&n).copied()).unwrap().unwrap();
    assert_eq!(record.kind, IdentifierKind::Nullifier);
    assert_eq!(record.operation, OperationType::PrivateTransfer);

    assert_eq!(
        pool.transact(&transfer(id(0xe2), vec![n], vec![]), PROOF),
        Err(PoolError::AlreadyUsed(n))
    );
    assert_eq!(
        pool.withdraw(&withdrawal(vec![n], RECEIVER), PROOF, &RECEIVER),
        Err(PoolError::AlreadyUsed(n))
    );
    assert_eq!(
        pool.execute_swap(&swap(vec![id(0x02), n], id(0xa0), id(0xb0)), PROOF),
        Err(PoolError::AlreadyUsed(n))
    );
    // Shared namespace: a key image colliding with a spent nullifier is rejected
    assert_eq!(
        pool.execute_swap(&swap(vec![id(0x03), id(0x04)], n, id(0xb0)), PROOF),
        Err(PoolError::OrderAlreadyExecuted { side: SwapSide::OrderA, key_image: n })
    );
    assert!(pool.assets().movements().is_empty());
}

#[test]
fn test_key_image_blocks_later_nullifier() {
    let pool = pool();
    let order_a = id(0xa0);
    pool.execute_swap(&swap(vec![id(1), id(2)], order_a, id(0xb0)), PROOF).unwrap();
    let record = pool.read(|s| s.registry().record(&order_a).copied()).unwrap().unwrap();
    assert_eq!(record.kind, IdentifierKind::KeyImage);
    assert_eq!(record.operation, OperationType::Swap);
    let before = pool.snapshot().unwrap();

    assert_eq!(
        pool.transact(&transfer(id(0xe1), vec![id(3), order_a], vec![]), PROOF),
        Err(PoolError::AlreadyUsed(order_a))
    );
    assert_eq!(
        pool.withdraw(&withdrawal(vec![order_a], RECEIVER), PROOF, &RECEIVER),
        Err(PoolError::AlreadyUsed(order_a))
    );
    assert!(!pool.is_used(&id(3)).unwrap());
    assert_eq!(pool.snapshot().unwrap(), before);
    assert!(pool.assets().movements().is_empty());
}

#[test]
fn test_swap_is_atomic() {
    let pool = pool();
    let used = id(0x01);
    let fresh = id(0x02);
    pool.transact(&transfer(id(0xe1), vec![used], vec![]), PROOF).unwrap();
    let before = pool.snapshot().unwrap();

    let err = pool
        .execute_swap(&swap(vec![fresh, used], id(0xa0), id(0xb0)), PROOF)
        .unwrap_err();
    assert_eq!(err, PoolError::AlreadyUsed(used));
    assert!(!pool.is_used(&fresh).unwrap());
    assert!(!pool.is_used(&id(0xa0)).unwrap());
    assert_eq!(pool.snapshot().unwrap(), before);
}

#[test]
fn test_swap_order_b_failure_unmarks_order_a() {
    let pool = pool();
    pool.execute_swap(&swap(vec![id(1), id(2)], id(0xa0), id(0xb0)), PROOF).unwrap();

    let err = pool
        .execute_swap(&swap(vec![id(3), id(4)], id(0xa1), id(0xb0)), PROOF)
        .unwrap_err();
    assert_eq!(err, PoolError::OrderAlreadyExecuted { side: SwapSide::OrderB, key_image: id(0xb0) });
    assert_eq!(err.code(), 6012);
    assert!(!pool.is_used(&id(3)).unwrap());
    assert!(!pool.is_used(&id(0xa1)).unwrap());
    assert_eq!(pool.root().unwrap(), id(0x80));
}

#[test]
fn test_receiver_binding() {
    let pool = pool();
    let other = id(0x33);
    let before = pool.snapshot().unwrap();

    let err = pool
        .withdraw(&withdrawal(vec![id(1)], RECEIVER), PROOF, &other)
        .unwrap_err();
    assert_eq!(err, PoolError::ReceiverMismatch { declared: RECEIVER, supplied: other });
    assert!(pool.assets().movements().is_empty());
    assert_eq!(pool.snapshot().unwrap(), before);

    let delta = pool.withdraw(&withdrawal(vec![id(1)], RECEIVER), PROOF, &RECEIVER).unwrap();
    assert_eq!(
        pool.assets().movements(),
        vec![Movement::Push { asset: ASSET, to: RECEIVER, amount: 4 }]
    );
    assert_eq!(
        delta.events.last(),
        Some(&PoolEvent::WithdrawExecuted { receiver: RECEIVER, asset: ASSET, amount: 4 })
    );
}

#[test]
fn test_failed_push_rolls_back_withdrawal() {
    let pool = pool();
    pool.assets().set_fail(true);
    let before = pool.snapshot().unwrap();

    let err = pool
        .withdraw(&withdrawal(vec![id(1)], RECEIVER), PROOF, &RECEIVER)
        .unwrap_err();
    assert!(matches!(err, PoolError::TransferFailed(_)));
    assert!(!pool.is_used(&id(1)).unwrap());
    assert_eq!(pool.snapshot().unwrap(), before);

    pool.assets().set_fail(false);
    let delta = pool.withdraw(&withdrawal(vec![id(1)], RECEIVER), PROOF, &RECEIVER).unwrap();
    assert!(pool.is_used(&id(1)).unwrap());
    // Nothing from the failed attempt leaks into the retry's events
    assert_eq!(delta.sequence, 1);
    assert_eq!(delta.events.len(), 2);
}

#[test]
fn test_rejected_proof_is_final() {
    let pool = ShieldedPool::new(
        StaticVerifier { accept: false },
        VkRegistry::uniform(vec![1]),
        RecordingCustody::default(),
    )
    .unwrap();

    assert_eq!(
        pool.withdraw(&withdrawal(vec![id(1)], RECEIVER), PROOF, &RECEIVER),
        Err(PoolError::ProofRejected(CircuitKind::Withdraw))
    );
    assert!(!pool.is_used(&id(1)).unwrap());
    assert!(pool.assets().movements().is_empty());
}

#[test]
fn test_deposit_validation() {
    let pool = pool();
    assert_eq!(
        pool.deposit(&DEPOSITOR, &[0u8; 32], 10, &id(1), &[]),
        Err(PoolError::InvalidAsset)
    );
    assert_eq!(pool.deposit(&DEPOSITOR, &ASSET, 0, &id(1), &[]), Err(PoolError::InvalidAmount));
    assert_eq!(pool.next_index().unwrap(), 0);
    assert!(pool.assets().movements().is_empty());
}

#[test]
fn test_capacity_exhaustion() {
    let fresh = CommitmentTree::new().unwrap();
    let snapshot = LedgerSnapshot {
        root: fresh.root(),
        next_index: MAX_LEAVES - 1,
        ..LedgerSnapshot::default()
    };
    let pool = ShieldedPool::restore(
        snapshot,
        StaticVerifier { accept: true },
        VkRegistry::uniform(vec![1]),
        RecordingCustody::default(),
    )
    .unwrap();

    pool.deposit(&DEPOSITOR, &ASSET, 1, &id(1), &[]).unwrap();
    assert_eq!(pool.next_index().unwrap(), MAX_LEAVES);
    assert_eq!(pool.node(0, u32::MAX).unwrap(), Some(id(1)));
    let root = pool.root().unwrap();

    assert_eq!(
        pool.deposit(&DEPOSITOR, &ASSET, 1, &id(2), &[]),
        Err(PoolError::CapacityExhausted)
    );
    assert_eq!(pool.root().unwrap(), root);
    assert_eq!(pool.assets().movements().len(), 1);
}

#[test]
fn test_accumulator_determinism() {
    let a = pool();
    let b = pool();
    let leaves = [id(1), id(2), id(3)];

    let roots_a: Vec<_> = leaves
        .iter()
        .map(|c| a.deposit(&DEPOSITOR, &ASSET, 1, c, &[]).unwrap().root)
        .collect();
    let roots_b: Vec<_> = leaves
        .iter()
        .map(|c| b.deposit(&DEPOSITOR, &ASSET, 1, c, &[]).unwrap().root)
        .collect();
    assert_eq!(roots_a, roots_b);
}

#[test]
fn test_first_insertion_root_folds_zero_hashes() {
    let pool = pool();
    let leaf = id(0x42);
    let tree = CommitmentTree::new().unwrap();

    let expected = tree
        .zero_hashes()
        .iter()
        .try_fold(leaf, |acc, zero| hash_pair(&acc, zero))
        .unwrap();

    let delta = pool.deposit(&DEPOSITOR, &ASSET, 1, &leaf, &[]).unwrap();
    assert_eq!(delta.root, expected);
    assert_eq!(pool.node(32, 0).unwrap(), Some(expected));
}

#[test]
fn test_deposit_after_declared_root_recomputes_from_nodes() {
    let pool = pool();
    pool.deposit(&DEPOSITOR, &ASSET, 1, &id(1), &[]).unwrap();
    pool.transact(&transfer(id(0xee), vec![], vec![id(9)]), PROOF).unwrap();
    assert_eq!(pool.root().unwrap(), id(0xee));
    assert_eq!(pool.next_index().unwrap(), 1);

    let delta = pool.deposit(&DEPOSITOR, &ASSET, 1, &id(2), &[]).unwrap();

    let mut reference = CommitmentTree::new().unwrap();
    reference.insert(&id(1)).unwrap();
    let expected = reference.insert(&id(2)).unwrap().root;
    assert_eq!(delta.root, expected);
}

#[test]
fn test_snapshot_restore_preserves_ledger() {
    let pool = pool();
    pool.deposit(&DEPOSITOR, &ASSET, 3, &id(1), &[]).unwrap();
    pool.transact(&transfer(id(0xe1), vec![id(5)], vec![]), PROOF).unwrap();
    let snapshot = pool.snapshot().unwrap();

    let restored = ShieldedPool::restore(
        snapshot.clone(),
        StaticVerifier { accept: true },
        VkRegistry::uniform(vec![1]),
        RecordingCustody::default(),
    )
    .unwrap();

    assert_eq!(restored.snapshot().unwrap(), snapshot);
    assert_eq!(restored.root().unwrap(), id(0xe1));
    assert_eq!(
        restored.transact(&transfer(id(0xe2), vec![id(5)], vec![]), PROOF),
        Err(PoolError::AlreadyUsed(id(5)))
    );
}
