//! Matching miner solutions back to candidates and the chain.

mod common;

use common::*;
use nc_03_mining::{Chain, MiningConfig, MiningOutcome, MiningService, RejectionReason};
use shared_bus::BlockchainEvent;
use shared_types::Nullifier;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(2);

#[tokio::test]
async fn test_solution_is_added_and_announced_once() {
    let mut h = harness(config(1), 1_000);
    let a = transfer(&[0x10], 2);
    let b = transfer(&[0x20], 3);
    h.pool.accept_transaction(a.clone());
    h.pool.accept_transaction(b.clone());

    h.coordinator.start().await.unwrap();
    let ready = next_candidate(&mut h.mining, WAIT).await.unwrap();

    let outcome = h.coordinator.successfully_mined(77, ready.id).await;
    let MiningOutcome::Accepted { hash, sequence } = outcome else {
        panic!("expected acceptance, got {outcome:?}");
    };

    assert_eq!(sequence, 2);
    assert_eq!(h.chain.height(), 2);
    let tip = h.chain.tip();
    assert_eq!(tip.hash(), hash);
    assert_eq!(tip.header.randomness, 77);
    assert_eq!(tip.transactions.len(), 3);

    // Confirmed transactions leave the pool, the candidate leaves the table
    assert!(h.pool.is_empty());
    assert!(h.coordinator.candidate(ready.id).is_none());

    // The block is announced and the head change yields a candidate on top
    let mut mined = Vec::new();
    let mut next_sequence = None;
    while mined.is_empty() || next_sequence.is_none() {
        let event = tokio::time::timeout(WAIT, h.mining.recv())
            .await
            .expect("mining event")
            .expect("bus open");
        match event {
            BlockchainEvent::NewBlockMined(block) => mined.push(block),
            BlockchainEvent::CandidateReady { sequence, .. } => next_sequence = Some(sequence),
            _ => {}
        }
    }
    assert_eq!(next_sequence, Some(3));
    assert_eq!(mined[0].hash(), hash);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(drain_mined(&mut h.mining).is_empty());

    // Reporting the same solution again finds nothing
    assert_eq!(
        h.coordinator.successfully_mined(77, ready.id).await,
        MiningOutcome::UnknownCandidate
    );
    assert_eq!(h.coordinator.status().await.blocks_mined, 1);
    h.coordinator.shutdown().await;
}

#[tokio::test]
async fn test_unknown_candidate_is_silent() {
    let mut h = harness(config(1), 1_000);
    h.coordinator.start().await.unwrap();
    let ready = next_candidate(&mut h.mining, WAIT).await.unwrap();
    assert_eq!(ready.id, 1);

    assert_eq!(
        h.coordinator.successfully_mined(999, 5).await,
        MiningOutcome::UnknownCandidate
    );
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(drain_mined(&mut h.mining).is_empty());
    assert_eq!(h.chain.height(), 1);
    assert_eq!(h.coordinator.metrics().get_solutions_discarded(), 1);
    h.coordinator.shutdown().await;
}

#[tokio::test]
async fn test_solution_for_superseded_head_is_stale() {
    // The coordinator listens on its own bus, so it never learns of the new
    // head and keeps the old candidate around
    let (_chain_bus, chain) = memory_chain(1);
    let coordinator_bus = Arc::new(shared_bus::InMemoryEventBus::new());
    let mut h = build(coordinator_bus, chain, config(1), GENESIS_MS + 1_000);

    let tx = transfer(&[0x33], 1);
    h.pool.accept_transaction(tx.clone());
    h.coordinator.start().await.unwrap();
    let ready = next_candidate(&mut h.mining, WAIT).await.unwrap();

    h.chain.extend_with(vec![]).await.unwrap();
    let height = h.chain.height();

    assert_eq!(
        h.coordinator.successfully_mined(1, ready.id).await,
        MiningOutcome::Stale
    );
    assert_eq!(h.chain.height(), height);
    assert!(drain_mined(&mut h.mining).is_empty());
    assert!(h.pool.contains(&tx.id()));
    h.coordinator.shutdown().await;
}

#[tokio::test]
async fn test_invalidated_transaction_rejects_solution() {
    let (bus, inner) = memory_chain(1);
    let chain = Arc::new(ScriptedChain::new(inner.clone()));
    let mut h = build(bus, chain.clone(), config(1), GENESIS_MS + 1_000);

    let tx = transfer(&[0x44], 1);
    h.pool.accept_transaction(tx.clone());
    h.coordinator.start().await.unwrap();
    let ready = next_candidate(&mut h.mining, WAIT).await.unwrap();

    // The spend shows up as confirmed after the candidate was issued
    *chain.poisoned.lock() = Some(Nullifier([0x44; 32]));

    let outcome = h.coordinator.successfully_mined(5, ready.id).await;
    assert_eq!(
        outcome,
        MiningOutcome::Rejected {
            reason: RejectionReason::InvalidTransaction(tx.id())
        }
    );
    assert_eq!(inner.height(), 1);
    assert!(drain_mined(&mut h.mining).is_empty());
    assert!(h.coordinator.candidate(ready.id).is_none());
    h.coordinator.shutdown().await;
}

#[tokio::test]
async fn test_failed_verification_never_reaches_add_block() {
    let (bus, inner) = memory_chain(1);
    let chain = Arc::new(ScriptedChain::new(inner.clone()));
    chain.tamper_snapshot.store(true, Ordering::SeqCst);
    let mut h = build(bus, chain.clone(), config(1), GENESIS_MS + 1_000);

    h.pool.accept_transaction(transfer(&[0x55], 1));
    h.coordinator.start().await.unwrap();
    let ready = next_candidate(&mut h.mining, WAIT).await.unwrap();
    let candidate = h.coordinator.candidate(ready.id).unwrap();

    let outcome = h.coordinator.successfully_mined(9, ready.id).await;
    assert!(matches!(
        outcome,
        MiningOutcome::Rejected {
            reason: RejectionReason::VerificationFailed(_)
        }
    ));
    assert_eq!(inner.height(), 1);
    assert!(drain_mined(&mut h.mining).is_empty());
    assert_eq!(chain.add_block_calls.load(Ordering::SeqCst), 0);
    assert!(h.coordinator.candidate(ready.id).is_none());

    // The chain would have refused the block anyway
    let direct = inner.add_block(candidate.to_block(9)).await.unwrap();
    assert!(!direct.is_added);
    h.coordinator.shutdown().await;
}

#[tokio::test]
async fn test_block_not_added_is_a_lost_race() {
    let (bus, inner) = memory_chain(1);
    let chain = Arc::new(ScriptedChain::new(inner.clone()));
    chain.refuse_add.store(true, Ordering::SeqCst);
    let mut h = build(bus, chain.clone(), config(1), GENESIS_MS + 1_000);

    let tx = transfer(&[0x66], 1);
    h.pool.accept_transaction(tx.clone());
    h.coordinator.start().await.unwrap();
    let ready = next_candidate(&mut h.mining, WAIT).await.unwrap();

    let outcome = h.coordinator.successfully_mined(3, ready.id).await;
    assert_eq!(
        outcome,
        MiningOutcome::Rejected {
            reason: RejectionReason::NotAdded("lost fork choice".into())
        }
    );
    assert!(drain_mined(&mut h.mining).is_empty());
    assert!(h.pool.contains(&tx.id()));
    assert!(h.coordinator.candidate(ready.id).is_none());
    h.coordinator.shutdown().await;
}

#[tokio::test]
async fn test_chain_outage_during_reconciliation() {
    let mut h = harness(config(1), 1_000);
    h.coordinator.start().await.unwrap();
    let ready = next_candidate(&mut h.mining, WAIT).await.unwrap();

    h.chain.set_available(false);
    let outcome = h.coordinator.successfully_mined(1, ready.id).await;
    assert!(matches!(
        outcome,
        MiningOutcome::Rejected {
            reason: RejectionReason::Chain(_)
        }
    ));

    // The candidate survives the outage
    h.chain.set_available(true);
    assert!(h
        .coordinator
        .successfully_mined(1, ready.id)
        .await
        .is_accepted());
    h.coordinator.shutdown().await;
}

#[tokio::test]
async fn test_solutions_after_shutdown_are_ignored() {
    let mut h = harness(config(1), 1_000);
    h.coordinator.start().await.unwrap();
    let ready = next_candidate(&mut h.mining, WAIT).await.unwrap();

    h.coordinator.shutdown().await;
    assert_eq!(
        h.coordinator.successfully_mined(1, ready.id).await,
        MiningOutcome::NotRunning
    );
    assert_eq!(h.chain.height(), 1);
}

#[tokio::test]
async fn test_concurrent_solutions_for_one_head_add_one_block() {
    let mut h = harness(
        MiningConfig {
            recent_candidates_capacity: 4,
            ..config(1)
        },
        1_000,
    );
    h.coordinator.start().await.unwrap();
    let ready = next_candidate(&mut h.mining, WAIT).await.unwrap();

    let (first, second) = tokio::join!(
        h.coordinator.successfully_mined(1, ready.id),
        h.coordinator.successfully_mined(2, ready.id),
    );
    let accepted = [&first, &second]
        .iter()
        .filter(|outcome| outcome.is_accepted())
        .count();

    assert_eq!(accepted, 1, "outcomes: {first:?} {second:?}");
    assert_eq!(h.chain.height(), 2);
    h.coordinator.shutdown().await;
}
