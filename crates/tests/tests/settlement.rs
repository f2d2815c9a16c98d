// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy::primitives::{Address, U256};
use anyhow::Result;
use cm_auth::{AuthorizationManager, AuthorizationPolicy, AuthorizationSigner};
use cm_config::{MarketOverride, MarketRule, ResolverConfig};
use cm_data::{DataStore, InMemoryStore, SharedStore, SledStore};
use cm_decrypt::{DecryptionCoordinator, DecryptionRequest, ViewStatus};
use cm_evm::{MarketReader, WagerRecord};
use cm_relayer::{ClearValue, ConfidentialRelayer, RawValue, RelayerError, ValueKind};
use cm_resolver::bettor::{amount_requests, place_wager, wagers_of};
use cm_resolver::{
    FailureReason, FixedPriceFeed, ResolutionOutcome, ResolutionPipeline, ResolutionState,
    ResolverService,
};
use cm_test_helpers::{
    init_test_tracing, rand_eth_addr, test_market, CountingSigner, ManualClock, MockChain,
    MockRelayer, TEST_CHAIN_ID, TEST_GENESIS_TIME,
};
use std::{sync::Arc, time::Duration};

const DAY: u64 = 86_400;

async fn place_bet(
    chain: &MockChain,
    relayer: &MockRelayer,
    market_id: u64,
    bettor: Address,
    amount: u64,
) -> Result<WagerRecord> {
    let input = relayer
        .encrypt(
            chain.contract_address(),
            bettor,
            &[ClearValue::Uint(U256::from(amount))],
        )
        .await?;
    Ok(chain.place_wager(market_id, bettor, input.handles[0], input.proof))
}

fn coordinator<S: DataStore>(
    store: &SharedStore<S>,
    relayer: &Arc<MockRelayer>,
    signer: &Arc<CountingSigner>,
    clock: &Arc<ManualClock>,
    validity_days: u64,
) -> DecryptionCoordinator<S> {
    let policy = AuthorizationPolicy {
        validity_days,
        ..AuthorizationPolicy::default()
    };
    let auth = AuthorizationManager::new(store.clone(), signer.clone(), policy)
        .with_clock(clock.clone());
    DecryptionCoordinator::new(relayer.clone(), auth, TEST_CHAIN_ID)
}

fn pipeline<S: DataStore>(
    store: &SharedStore<S>,
    chain: &Arc<MockChain>,
    relayer: &Arc<MockRelayer>,
    operator: &Arc<CountingSigner>,
    clock: &Arc<ManualClock>,
    config: ResolverConfig,
) -> ResolutionPipeline<S> {
    ResolutionPipeline::new(
        chain.clone(),
        chain.clone(),
        relayer.clone(),
        coordinator(store, relayer, operator, clock, 365),
        Arc::new(FixedPriceFeed::new().with_price("bitcoin", 70_000.0)),
        store.clone(),
        config,
    )
}

fn threshold(threshold: u128) -> ResolverConfig {
    ResolverConfig {
        default_rule: MarketRule::AggregateThreshold { threshold },
        ..ResolverConfig::default()
    }
}

/// Bettors decrypt their own wagers, the operator resolves from the aggregate, and
/// everything survives a restart of the store.
#[tokio::test]
#[serial_test::serial]
async fn test_settlement_over_sled() -> Result<()> {
    let _guard = init_test_tracing();

    let dir = tempfile::tempdir()?;
    let db = dir.path().join("db");
    let chain = Arc::new(MockChain::new());
    let relayer = Arc::new(MockRelayer::new());
    let clock = Arc::new(ManualClock::new(TEST_GENESIS_TIME));
    let alice = Arc::new(CountingSigner::random());
    let operator = Arc::new(CountingSigner::random());
    let contract = chain.contract_address();

    chain.add_market(test_market(0, TEST_GENESIS_TIME + 600, 0));
    let alice_bet = place_bet(&chain, &relayer, 0, alice.address(), 40).await?;
    let bob_bet = place_bet(&chain, &relayer, 0, rand_eth_addr(), 25).await?;

    {
        let store = SharedStore::new(SledStore::new(&db, "cmarket")?);

        // Alice reads back her own position
        let alice_coordinator = coordinator(&store, &relayer, &alice, &clock, 365);
        let request = DecryptionRequest::new(alice_bet.handle, contract, ValueKind::Uint);
        let mut view = alice_coordinator.submit(vec![request]).await?;
        view.wait().await;
        assert_eq!(view.status(), ViewStatus::Ready);
        assert_eq!(
            view.values().get(&alice_bet.handle),
            Some(&ClearValue::Uint(U256::from(40)))
        );
        assert_eq!(alice.prompts(), 1);

        // Operator resolves once the deadline has passed
        chain.advance_time(1_000);
        let pipeline = pipeline(&store, &chain, &relayer, &operator, &clock, threshold(50));
        let state = pipeline.run(0).await?;
        let ResolutionState::Resolved(ResolutionOutcome::Submitted {
            winning_side,
            aggregate,
            wagers,
            ..
        }) = state
        else {
            panic!("unexpected state {state:?}");
        };
        assert!(winning_side);
        assert_eq!(aggregate, U256::from(65));
        assert_eq!(wagers, 2);

        // Nobody ever decrypted Bob's wager
        let decrypted = relayer.decrypted_handles();
        assert!(!decrypted.contains(&bob_bet.handle));
        assert_eq!(decrypted.len(), 2);
    }

    SledStore::close_all_connections();

    let store = SharedStore::new(SledStore::new(&db, "cmarket")?);
    let alice_coordinator = coordinator(&store, &relayer, &alice, &clock, 365);
    assert!(alice_coordinator.can_decrypt(&[contract]).await);

    let pipeline = pipeline(&store, &chain, &relayer, &operator, &clock, threshold(50));
    let checkpoint = pipeline.repositories(0).checkpoint().await?;
    assert_eq!(checkpoint.wagers.len(), 2);
    let record = pipeline.repositories(0).record().await?;
    assert!(record.latest().is_some_and(ResolutionState::is_resolved));

    // Re-running after the restart submits nothing
    let again = pipeline.run(0).await?;
    assert!(matches!(
        again,
        ResolutionState::Resolved(ResolutionOutcome::AlreadyResolved { winning_side: true })
    ));
    assert_eq!(chain.resolve_calls().len(), 1);

    SledStore::close_all_connections();
    Ok(())
}

#[tokio::test]
#[serial_test::serial]
async fn test_repeated_access_does_not_prompt() -> Result<()> {
    let _guard = init_test_tracing();
    let store = SharedStore::new(InMemoryStore::new());
    let relayer = Arc::new(MockRelayer::new());
    let clock = Arc::new(ManualClock::new(TEST_GENESIS_TIME));
    let alice = Arc::new(CountingSigner::random());
    let contract = Address::repeat_byte(0xcc);

    let coordinator = coordinator(&store, &relayer, &alice, &clock, 365);
    for i in 0..5u8 {
        let handle = alloy::primitives::B256::repeat_byte(i + 1);
        relayer.set_value(handle, RawValue::Number(i as u64));
        let mut view = coordinator
            .submit(vec![DecryptionRequest::new(handle, contract, ValueKind::Uint)])
            .await?;
        view.wait().await;
        clock.advance(DAY * 30);
    }
    assert_eq!(alice.prompts(), 1);
    assert_eq!(relayer.decrypt_calls(), 5);
    Ok(())
}

#[tokio::test]
#[serial_test::serial]
async fn test_overlapping_submissions_share_one_call() -> Result<()> {
    let _guard = init_test_tracing();
    let store = SharedStore::new(InMemoryStore::new());
    let relayer = Arc::new(MockRelayer::new());
    let clock = Arc::new(ManualClock::new(TEST_GENESIS_TIME));
    let alice = Arc::new(CountingSigner::random());
    let contract = Address::repeat_byte(0xcc);
    let handle = alloy::primitives::B256::repeat_byte(7);
    relayer.set_value(handle, RawValue::Bool(true));

    let coordinator = coordinator(&store, &relayer, &alice, &clock, 365);
    let request = DecryptionRequest::new(handle, contract, ValueKind::Bool);

    relayer.pause();
    let mut first = coordinator.submit(vec![request.clone()]).await?;
    let mut second = coordinator.submit(vec![request.clone()]).await?;
    assert_eq!(second.status(), ViewStatus::Pending);
    relayer.resume();

    first.wait().await;
    second.wait().await;
    assert_eq!(relayer.decrypt_calls(), 1);
    assert_eq!(
        second.values().get(&handle),
        Some(&ClearValue::Bool(true))
    );

    // A third consumer after completion is served from the table
    let third = coordinator.submit(vec![request]).await?;
    assert_eq!(third.status(), ViewStatus::Ready);
    assert_eq!(relayer.decrypt_calls(), 1);
    Ok(())
}

#[tokio::test]
#[serial_test::serial]
async fn test_ready_values_survive_renewal() -> Result<()> {
    let _guard = init_test_tracing();
    let store = SharedStore::new(InMemoryStore::new());
    let relayer = Arc::new(MockRelayer::new());
    let clock = Arc::new(ManualClock::new(TEST_GENESIS_TIME));
    let alice = Arc::new(CountingSigner::random());
    let contract = Address::repeat_byte(0xcc);
    let old = alloy::primitives::B256::repeat_byte(1);
    let new = alloy::primitives::B256::repeat_byte(2);
    relayer.set_value(old, RawValue::Text("11".into()));
    relayer.set_value(new, RawValue::Text("22".into()));

    let coordinator = coordinator(&store, &relayer, &alice, &clock, 1);
    let old_request = DecryptionRequest::new(old, contract, ValueKind::Uint);
    let mut view = coordinator.submit(vec![old_request.clone()]).await?;
    view.wait().await;

    // Two days later the one-day authorization has lapsed
    clock.advance(2 * DAY);
    relayer.set_value(old, RawValue::Text("99".into()));
    let mut renewed = coordinator
        .submit(vec![
            old_request.clone(),
            DecryptionRequest::new(new, contract, ValueKind::Uint),
        ])
        .await?;
    renewed.wait().await;
    assert_eq!(alice.prompts(), 2);

    let values = renewed.values();
    assert_eq!(values.get(&old), Some(&ClearValue::Uint(U256::from(11))));
    assert_eq!(values.get(&new), Some(&ClearValue::Uint(U256::from(22))));
    assert_eq!(relayer.decrypted_batches()[1], vec![new]);
    assert_eq!(
        view.values().get(&old),
        Some(&ClearValue::Uint(U256::from(11)))
    );
    Ok(())
}

#[tokio::test]
#[serial_test::serial]
async fn test_aggregation_recovery_submits_once() -> Result<()> {
    let _guard = init_test_tracing();
    let store = SharedStore::new(InMemoryStore::new());
    let chain = Arc::new(MockChain::new());
    let relayer = Arc::new(MockRelayer::new());
    let clock = Arc::new(ManualClock::new(TEST_GENESIS_TIME));
    let operator = Arc::new(CountingSigner::random());

    chain.add_market(test_market(0, TEST_GENESIS_TIME + 60, 0));
    place_bet(&chain, &relayer, 0, rand_eth_addr(), 3).await?;
    chain.advance_time(120);

    let pipeline = pipeline(&store, &chain, &relayer, &operator, &clock, threshold(2));
    relayer.fail_aggregate(Some(RelayerError::Unavailable("relayer restarting".into())));
    for _ in 0..2 {
        let state = pipeline.run(0).await?;
        assert!(matches!(
            state.failure(),
            Some(FailureReason::AggregationUnavailable(_))
        ));
    }

    relayer.fail_aggregate(None);
    assert!(pipeline.run(0).await?.is_resolved());
    assert!(pipeline.run(0).await?.is_resolved());
    assert_eq!(chain.resolve_calls().len(), 1);
    assert!(chain.resolve_calls()[0].winning_side);
    Ok(())
}

#[tokio::test]
#[serial_test::serial]
async fn test_empty_market_terminates() -> Result<()> {
    let _guard = init_test_tracing();
    let store = SharedStore::new(InMemoryStore::new());
    let chain = Arc::new(MockChain::new());
    let relayer = Arc::new(MockRelayer::new());
    let clock = Arc::new(ManualClock::new(TEST_GENESIS_TIME));
    let operator = Arc::new(CountingSigner::random());

    chain.add_market(test_market(0, TEST_GENESIS_TIME + 60, 0));
    chain.advance_time(120);

    let pipeline = pipeline(&store, &chain, &relayer, &operator, &clock, threshold(1));
    let state = pipeline.run(0).await?;
    assert!(matches!(
        state,
        ResolutionState::Resolved(ResolutionOutcome::NoWagersCollected {
            winning_side: false,
            ..
        })
    ));
    assert!(chain.market_snapshot(0).is_some_and(|m| m.resolved));
    Ok(())
}

#[tokio::test]
#[serial_test::serial]
async fn test_service_resolves_as_deadlines_pass() -> Result<()> {
    let _guard = init_test_tracing();
    let store = SharedStore::new(InMemoryStore::new());
    let chain = Arc::new(MockChain::new());
    let relayer = Arc::new(MockRelayer::new());
    let clock = Arc::new(ManualClock::new(TEST_GENESIS_TIME));
    let operator = Arc::new(CountingSigner::random());

    chain.add_market(test_market(0, TEST_GENESIS_TIME + 100, 0));
    chain.add_market(test_market(1, TEST_GENESIS_TIME + 500, 0));
    chain.add_market(test_market(2, TEST_GENESIS_TIME + 100, 0));
    place_bet(&chain, &relayer, 0, rand_eth_addr(), 5).await?;

    // Market 2 needs a price nobody can supply
    let config = ResolverConfig {
        markets: vec![MarketOverride {
            id: 2,
            rule: MarketRule::PriceTarget {
                coin_id: "ethereum".to_string(),
                decimals: 0,
            },
        }],
        ..threshold(1)
    };
    let pipeline = Arc::new(pipeline(&store, &chain, &relayer, &operator, &clock, config));
    let mut service = ResolverService::new(
        pipeline,
        chain.clone(),
        vec![],
        Duration::from_millis(10),
    );

    let report = service.tick().await?;
    assert!(report.resolved.is_empty());
    assert_eq!(service.queue().len(), 3);

    chain.advance_time(200);
    let report = service.tick().await?;
    assert_eq!(report.resolved, vec![0]);
    assert!(matches!(
        report.failed.as_slice(),
        [(2, FailureReason::ReferenceUnavailable(_))]
    ));
    assert_eq!(service.queue().len(), 1);

    chain.advance_time(400);
    chain.fail_market_reads(1);
    let report = service.tick().await?;
    assert_eq!(report.requeued, vec![1]);

    let report = service.tick().await?;
    assert_eq!(report.resolved, vec![1]);
    assert!(service.queue().is_empty());

    // Operator-action failures are not retried
    chain.advance_time(1_000);
    let report = service.tick().await?;
    assert_eq!(report, Default::default());
    assert_eq!(chain.resolve_calls().len(), 2);
    Ok(())
}

#[tokio::test]
#[serial_test::serial]
async fn test_watch_loop_stops_on_shutdown() -> Result<()> {
    let _guard = init_test_tracing();
    let store = SharedStore::new(InMemoryStore::new());
    let chain = Arc::new(MockChain::new());
    let relayer = Arc::new(MockRelayer::new());
    let clock = Arc::new(ManualClock::new(TEST_GENESIS_TIME));
    let operator = Arc::new(CountingSigner::random());

    chain.add_market(test_market(0, TEST_GENESIS_TIME + 10, 0));
    chain.advance_time(20);

    let pipeline = Arc::new(pipeline(&store, &chain, &relayer, &operator, &clock, threshold(1)));
    let service = ResolverService::new(pipeline, chain.clone(), vec![0], Duration::from_millis(5));

    let watched = chain.clone();
    tokio::time::timeout(
        Duration::from_secs(10),
        service.run(async move {
            while !watched.market_snapshot(0).is_some_and(|m| m.resolved) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }),
    )
    .await??;

    assert_eq!(chain.resolve_calls().len(), 1);
    Ok(())
}

/// A bettor places an encrypted wager, finds it again on-chain and decrypts only their
/// own amount.
#[tokio::test]
#[serial_test::serial]
async fn test_bettor_places_and_decrypts_own_wager() -> Result<()> {
    let _guard = init_test_tracing();

    let alice = Arc::new(CountingSigner::random());
    let chain = Arc::new(MockChain::new().with_sender(alice.address()));
    let relayer = Arc::new(MockRelayer::new());
    let clock = Arc::new(ManualClock::new(TEST_GENESIS_TIME));
    let store = SharedStore::new(InMemoryStore::new());
    chain.add_market(test_market(0, TEST_GENESIS_TIME + 600, 0));

    place_bet(&chain, &relayer, 0, rand_eth_addr(), 25).await?;
    let placed = place_wager(&*relayer, &*chain, &*chain, alice.address(), 0, 40, true).await?;
    assert!(placed.receipt.success);
    assert_eq!(chain.market_snapshot(0).map(|m| m.participant_count), Some(2));

    let mine = wagers_of(&*chain, alice.address(), 0, 0).await?;
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].handle, placed.handle);

    let alice_coordinator = coordinator(&store, &relayer, &alice, &clock, 365);
    let mut view = alice_coordinator
        .submit(amount_requests(chain.contract_address(), &mine))
        .await?;
    view.wait().await;
    assert_eq!(
        view.values().get(&placed.handle),
        Some(&ClearValue::Uint(U256::from(40)))
    );
    assert_eq!(relayer.decrypted_handles(), vec![placed.handle]);
    assert_eq!(alice.prompts(), 1);
    Ok(())
}
