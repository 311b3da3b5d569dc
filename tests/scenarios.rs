//! Integration tests for the event-sourcing workflow.
//!
//! Each test builds its own application over an in-memory backend.

use chronicle::example::{self, Example, ExampleAttribute, ExampleEvent};
use chronicle::prelude::*;
use proptest::prelude::*;
use std::sync::Arc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn registry() -> Arc<TopicRegistry> {
    let mut registry = TopicRegistry::new();
    example::register(&mut registry).unwrap();
    Arc::new(registry)
}

fn app() -> Application<Example, InMemoryStoredEventRepository> {
    init_tracing();
    Application::in_memory(registry(), ApplicationConfig::default()).unwrap()
}

fn versions(stored: &[StoredEvent]) -> Vec<u64> {
    stored.iter().map(|e| e.entity_version).collect()
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_create_persists_created_event() {
    let app = app();

    Example::open(app.bus(), "ex-1", 10, 20).await.unwrap();

    let stored = app
        .store()
        .repository()
        .get_entity_events("ex-1", &StreamQuery::all())
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].entity_version, 0);
    assert_eq!(stored[0].topic, "example#Example.Created");

    let loaded = app.get("ex-1").await.unwrap();
    assert_eq!(loaded.a(), 10);
    assert_eq!(loaded.b(), 20);
    assert_eq!(loaded.version(), 0);
}

#[tokio::test]
async fn test_attribute_change_persists_next_version() {
    let app = app();
    let mut entity = Example::open(app.bus(), "ex-1", 10, 20).await.unwrap();

    entity.set_a(app.bus(), 123).await.unwrap();

    let last = app
        .store()
        .get_most_recent_event("ex-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(last.kind(), "AttributeChanged");
    assert_eq!(last.entity_version(), 1);

    let loaded = app.get("ex-1").await.unwrap();
    assert_eq!(loaded.a(), 123);
    assert_eq!(loaded.b(), 20);
    assert_eq!(loaded.version(), 1);
}

#[tokio::test]
async fn test_discarded_entity_is_not_found() {
    let app = app();
    let entity = Example::open(app.bus(), "ex-1", 10, 20).await.unwrap();

    entity.discard(app.bus()).await.unwrap();

    let err = app.get("ex-1").await.unwrap_err();
    assert!(err.is_entity_not_found());
    assert!(!app.repository().contains("ex-1").await.unwrap());

    // The stream itself is kept
    assert_eq!(app.store().get_domain_events("ex-1", None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_unregistered_topic_fails_to_resolve() {
    let app = app();
    Example::open(app.bus(), "ex-1", 10, 20).await.unwrap();

    let mut stored = app.store().repository().all_events().remove(0);
    stored.topic = "example#Example.Renamed".to_string();

    let err = app.store().decode(&stored).unwrap_err();
    assert!(matches!(
        err,
        EventSourcingError::Registry(RegistryError::UnknownTopic(ref topic)) if topic == "example#Example.Renamed"
    ));
}

#[tokio::test]
async fn test_never_existing_entity_is_not_found() {
    let app = app();
    assert!(app.get("ghost").await.unwrap_err().is_entity_not_found());
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_appends_at_same_version() {
    let app = app();

    for round in 0..20 {
        let id = format!("ex-{}", round);
        let base = Example::open(app.bus(), id.as_str(), 0, 0).await.unwrap();

        // Both writers hold the same version and target the next one
        let (mut left, mut right) = (base.clone(), base);
        let (bus_l, bus_r) = (app.bus().clone(), app.bus().clone());

        let a = tokio::spawn(async move { left.set_a(&bus_l, 1).await });
        let b = tokio::spawn(async move { right.set_a(&bus_r, 2).await });
        let (a, b) = (a.await.unwrap(), b.await.unwrap());

        let results = [a, b];
        let ok = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(ok, 1, "round {}", round);
        assert!(
            results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| e.is_concurrency_conflict())
        );

        let stored = app
            .store()
            .repository()
            .get_entity_events(&id, &StreamQuery::all())
            .await
            .unwrap();
        assert_eq!(versions(&stored), vec![0, 1]);
    }
}

#[tokio::test]
async fn test_losing_writer_retries_from_fresh_state() {
    let app = app();
    let original = Example::open(app.bus(), "ex-1", 0, 0).await.unwrap();

    let mut first = original.clone();
    let mut stale = original;
    first.set_a(app.bus(), 5).await.unwrap();

    let err = stale.set_b(app.bus(), 9).await.unwrap_err();
    assert!(err.is_concurrency_conflict());

    let mut fresh = app.get("ex-1").await.unwrap();
    fresh.set_b(app.bus(), 9).await.unwrap();

    let loaded = app.get("ex-1").await.unwrap();
    assert_eq!((loaded.a(), loaded.b(), loaded.version()), (5, 9, 2));
}

// =============================================================================
// Stream properties
// =============================================================================

#[tokio::test]
async fn test_versions_are_contiguous() {
    let app = app();
    let mut entity = Example::open(app.bus(), "ex-1", 0, 0).await.unwrap();
    for value in 1..=10 {
        entity.set_a(app.bus(), value).await.unwrap();
    }

    let stored = app
        .store()
        .repository()
        .get_entity_events("ex-1", &StreamQuery::all())
        .await
        .unwrap();
    assert_eq!(versions(&stored), (0..=10).collect::<Vec<_>>());
    assert_eq!(app.get("ex-1").await.unwrap().version(), 10);
}

#[tokio::test]
async fn test_gapped_publish_is_rejected() {
    let app = app();
    Example::open(app.bus(), "ex-1", 1, 1).await.unwrap();

    let skipped = ExampleEvent::AttributeChanged {
        header: EventHeader::new("ex-1", 5),
        attribute: ExampleAttribute::A(9),
    };
    let err = app.bus().publish(&skipped).await.unwrap_err();
    assert!(matches!(
        err,
        EventSourcingError::Integrity { expected: 1, found: 5, .. }
    ));

    let late_start = ExampleEvent::Created {
        header: EventHeader::new("ex-9", 3),
        a: 0,
        b: 0,
    };
    let err = app.bus().publish(&late_start).await.unwrap_err();
    assert!(matches!(
        err,
        EventSourcingError::Integrity { expected: 0, found: 3, .. }
    ));

    assert_eq!(app.store().repository().len(), 1);
    let loaded = app.get("ex-1").await.unwrap();
    assert_eq!((loaded.a(), loaded.version()), (1, 0));
    assert!(app.get("ex-9").await.unwrap_err().is_entity_not_found());
}

#[tokio::test]
async fn test_global_log_is_complete_and_ordered() {
    let app = app();
    let mut one = Example::open(app.bus(), "ex-1", 1, 1).await.unwrap();
    let mut two = Example::open(app.bus(), "ex-2", 2, 2).await.unwrap();
    one.set_a(app.bus(), 10).await.unwrap();
    two.set_b(app.bus(), 20).await.unwrap();
    one.discard(app.bus()).await.unwrap();

    let log = app.store().repository().get_all_events(None, None).await.unwrap();
    let order: Vec<(&str, u64)> = log
        .iter()
        .map(|e| (e.entity_id.as_str(), e.entity_version))
        .collect();
    assert_eq!(
        order,
        vec![("ex-1", 0), ("ex-2", 0), ("ex-1", 1), ("ex-2", 1), ("ex-1", 2)]
    );

    let sequences: Vec<u64> = log.iter().filter_map(|e| e.global_sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4, 5]);

    let decoded = app.store().get_all_domain_events(None, None).await.unwrap();
    assert_eq!(decoded.len(), 5);
    assert_eq!(decoded[4].kind(), "Discarded");
}

#[tokio::test]
async fn test_paged_replay_from_config() {
    init_tracing();
    let config = ApplicationConfig::from_vars([("CHRONICLE_PAGE_SIZE", "3")]).unwrap();
    let app: Application<Example, InMemoryStoredEventRepository> =
        Application::in_memory(registry(), config).unwrap();

    let mut entity = Example::open(app.bus(), "ex-1", 0, 0).await.unwrap();
    for value in 1..=7 {
        entity.set_b(app.bus(), value).await.unwrap();
    }

    let loaded = app.get("ex-1").await.unwrap();
    assert_eq!(loaded, entity);
    assert_eq!(loaded.version(), 7);
}

// =============================================================================
// Properties
// =============================================================================

fn arb_attribute() -> impl Strategy<Value = ExampleAttribute> {
    prop_oneof![
        any::<i64>().prop_map(ExampleAttribute::A),
        any::<i64>().prop_map(ExampleAttribute::B),
    ]
}

fn stream(a: i64, b: i64, changes: &[ExampleAttribute]) -> Vec<ExampleEvent> {
    let mut events = vec![ExampleEvent::Created {
        header: EventHeader::first("ex-p"),
        a,
        b,
    }];
    for (i, attribute) in changes.iter().enumerate() {
        events.push(ExampleEvent::AttributeChanged {
            header: EventHeader::new("ex-p", i as u64 + 1),
            attribute: *attribute,
        });
    }
    events
}

proptest! {
    #[test]
    fn prop_replay_is_deterministic(
        a in any::<i64>(),
        b in any::<i64>(),
        changes in prop::collection::vec(arb_attribute(), 0..20),
    ) {
        let events = stream(a, b, &changes);

        let first = chronicle_eventsourcing::fold::<Example, _>(&events).unwrap();
        let second = chronicle_eventsourcing::fold::<Example, _>(&events).unwrap();
        prop_assert_eq!(&first, &second);

        let stored = tokio_test::block_on(async {
            let repository = Arc::new(InMemoryStoredEventRepository::new());
            let store = Arc::new(EventStore::new(repository, registry()).unwrap());
            store.append_all(&events).await.unwrap();
            EventPlayer::<Example, _>::new(store).replay("ex-p").await.unwrap()
        });
        prop_assert_eq!(first.into_live(), Some(stored));
    }

    #[test]
    fn prop_example_events_round_trip(
        a in any::<i64>(),
        b in any::<i64>(),
        changes in prop::collection::vec(arb_attribute(), 0..5),
    ) {
        let codec = chronicle_eventsourcing::EventCodec::<ExampleEvent>::new(registry());
        for event in stream(a, b, &changes) {
            let decoded = codec.deserialize(&codec.serialize(&event).unwrap()).unwrap();
            prop_assert_eq!(decoded, event);
        }
    }
}
