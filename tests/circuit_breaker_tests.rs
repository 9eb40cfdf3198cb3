use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{advance, sleep};
use tokio_test::{assert_err, assert_ok};
use tower::{service_fn, Layer, ServiceExt};
use tripwire::circuit_breaker::{
    CircuitBreakerConfig, CircuitBreakerLayer, CircuitBreakerRegistry, CircuitState,
};
use tripwire::error::BreakerError;
use tripwire::store::{failure_count_key, CounterStore, MemoryCounterStore};
use tripwire::taxonomy::ErrorTaxonomy;

#[derive(Debug, thiserror::Error)]
#[error("payment service unavailable")]
struct PaymentUnavailable {
    #[source]
    source: io::Error,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid card number")]
struct InvalidCard;

fn refused() -> PaymentUnavailable {
    PaymentUnavailable {
        source: io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
    }
}

fn create_registry(
    configs: &[CircuitBreakerConfig],
) -> (CircuitBreakerRegistry, MemoryCounterStore) {
    let store = MemoryCounterStore::new();
    let registry = CircuitBreakerRegistry::from_configs(
        configs,
        Arc::new(store.clone()),
        Arc::new(ErrorTaxonomy::standard()),
    )
    .unwrap();
    (registry, store)
}

#[tokio::test(start_paused = true)]
async fn test_circuit_opens_and_recovers_after_reset_time() {
    let (registry, store) = create_registry(&[CircuitBreakerConfig {
        trip_threshold: 3,
        trip_reset_time_ms: 60000,
        ..CircuitBreakerConfig::named("payments")
    }]);

    // Three matching failures
    for _ in 0..3 {
        assert_eq!(registry.evaluate("payments", "charge").await, Ok("charge"));
        registry
            .record_failure("payments", &refused(), "network")
            .await
            .unwrap();
    }

    // Fourth call is rejected
    assert_eq!(
        registry.evaluate("payments", "charge").await,
        Err(BreakerError::OpenCircuit("payments".to_string()))
    );

    advance(Duration::from_millis(61000)).await;

    assert_eq!(registry.evaluate("payments", "charge").await, Ok("charge"));
    assert_eq!(
        store.get(&failure_count_key("payments")).await.unwrap(),
        Some(0)
    );

    // Counter is back at zero, so the next call passes as well
    assert_eq!(registry.evaluate("payments", "charge").await, Ok("charge"));
}

#[tokio::test]
async fn test_non_matching_failure_is_not_counted() {
    let (registry, store) = create_registry(&[CircuitBreakerConfig {
        trip_threshold: 3,
        ..CircuitBreakerConfig::named("payments")
    }]);

    registry
        .record_failure("payments", &refused(), "network")
        .await
        .unwrap();
    registry
        .record_failure("payments", &refused(), "network")
        .await
        .unwrap();
    registry
        .record_failure("payments", &InvalidCard, "network")
        .await
        .unwrap();

    assert_eq!(registry.evaluate("payments", 42).await, Ok(42));
    assert_eq!(
        store.get(&failure_count_key("payments")).await.unwrap(),
        Some(2)
    );
}

#[tokio::test]
async fn test_trip_on_kind_counts_subtypes_only() {
    let (registry, _store) = create_registry(&[CircuitBreakerConfig {
        trip_threshold: 2,
        trip_on: Some("io".to_string()),
        ..CircuitBreakerConfig::named("inventory")
    }]);

    let missing = io::Error::new(io::ErrorKind::NotFound, "no such file");

    registry.record_error("inventory", &InvalidCard).await.unwrap();
    registry.record_error("inventory", &refused()).await.unwrap();
    assert_eq!(registry.evaluate("inventory", ()).await, Ok(()));

    registry.record_error("inventory", &missing).await.unwrap();
    assert!(registry
        .evaluate("inventory", ())
        .await
        .unwrap_err()
        .is_open_circuit());

    let status = registry.breaker("inventory").unwrap().status().await;
    assert_eq!(status.state, CircuitState::Open);
    assert_eq!(status.failure_count, 2);
}

#[tokio::test]
async fn test_invalid_match_spec_is_surfaced() {
    let (registry, store) = create_registry(&[CircuitBreakerConfig::named("payments")]);

    let result = registry
        .record_failure("payments", &refused(), "network.dns")
        .await;
    assert_eq!(
        result,
        Err(BreakerError::InvalidMatchSpec("network.dns".to_string()))
    );
    assert!(store.is_empty());

    let store: Arc<dyn CounterStore> = Arc::new(MemoryCounterStore::new());
    let result = CircuitBreakerRegistry::from_configs(
        &[CircuitBreakerConfig {
            trip_on: Some("network.dns".to_string()),
            ..CircuitBreakerConfig::named("payments")
        }],
        store,
        Arc::new(ErrorTaxonomy::standard()),
    );
    assert!(matches!(result, Err(BreakerError::InvalidMatchSpec(_))));
}

#[tokio::test]
async fn test_breakers_are_isolated_by_name() {
    let (registry, _store) = create_registry(&[
        CircuitBreakerConfig {
            trip_threshold: 2,
            ..CircuitBreakerConfig::named("payments")
        },
        CircuitBreakerConfig {
            trip_threshold: 2,
            ..CircuitBreakerConfig::named("inventory")
        },
    ]);

    for _ in 0..2 {
        registry.record_error("payments", &refused()).await.unwrap();
    }

    assert_err!(registry.evaluate("payments", ()).await);
    assert_ok!(registry.evaluate("inventory", ()).await);

    let all = registry.all_status().await;
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].name, "inventory");
    assert_eq!(all[0].state, CircuitState::Closed);
    assert_eq!(all[1].name, "payments");
    assert_eq!(all[1].state, CircuitState::Open);

    assert_eq!(
        registry.evaluate("shipping", ()).await,
        Err(BreakerError::NotFound("shipping".to_string()))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_failures_are_all_counted() {
    let (registry, store) = create_registry(&[CircuitBreakerConfig {
        trip_threshold: 3,
        ..CircuitBreakerConfig::named("payments")
    }]);

    let spawn_failures = |count: usize| -> Vec<_> {
        (0..count)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry
                        .record_failure("payments", &refused(), "network")
                        .await
                })
            })
            .collect()
    };

    for handle in spawn_failures(3) {
        handle.await.unwrap().unwrap();
    }
    let breaker = registry.breaker("payments").unwrap();
    assert_eq!(breaker.status().await.state, CircuitState::Open);

    sleep(Duration::from_millis(50)).await;

    for handle in spawn_failures(97) {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(
        store.get(&failure_count_key("payments")).await.unwrap(),
        Some(100)
    );

    // Trip moment still dates from the first crossing
    let status = breaker.status().await;
    assert_eq!(status.state, CircuitState::Open);
    assert!(status.tripped_for_ms.unwrap() >= 50);
}

#[tokio::test]
async fn test_layer_guards_service() {
    let (registry, _store) = create_registry(&[CircuitBreakerConfig {
        trip_threshold: 1,
        trip_on: Some("network".to_string()),
        ..CircuitBreakerConfig::named("payments")
    }]);
    let breaker = registry.breaker("payments").unwrap();

    let failing = service_fn(|_: &'static str| async {
        Err::<&'static str, PaymentUnavailable>(refused())
    });
    let service = CircuitBreakerLayer::new(breaker.clone()).layer(failing);

    let err = service.clone().oneshot("charge").await.unwrap_err();
    assert!(err.is::<PaymentUnavailable>());

    let err = service.oneshot("charge").await.unwrap_err();
    let err = err.downcast::<BreakerError>().unwrap();
    assert_eq!(*err, BreakerError::OpenCircuit("payments".to_string()));
}
