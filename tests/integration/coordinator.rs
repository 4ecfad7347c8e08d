//! Fetch-once behavior of `BoxCoordinator` under concurrency.

use crate::common::machine;
use boxcache_cli::coordinator::{BoxCoordinator, BoxDescriptor, BoxKey, BoxLockRegistry};
use boxcache_cli::core::BoxError;
use boxcache_cli::environment::Machine;
use boxcache_cli::provider::Provider;
use boxcache_cli::test_utils::{
    CountingFetcher, FetchBehavior, MemoryCatalog, RecordingUi, init_test_logging,
};
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;

type TestCoordinator = BoxCoordinator<MemoryCatalog, CountingFetcher>;

fn coordinator(catalog: &MemoryCatalog, fetcher: &CountingFetcher) -> Arc<TestCoordinator> {
    init_test_logging(None);
    Arc::new(BoxCoordinator::with_registry(
        Arc::new(BoxLockRegistry::new()),
        catalog.clone(),
        fetcher.clone(),
        Arc::new(RecordingUi::default()),
    ))
}

async fn run_concurrently(
    coordinator: &Arc<TestCoordinator>,
    machines: Vec<Machine>,
) -> Vec<anyhow::Result<bool>> {
    let handles: Vec<_> = machines
        .into_iter()
        .map(|machine| {
            let coordinator = Arc::clone(coordinator);
            tokio::spawn(async move { coordinator.ensure_present(&machine).await })
        })
        .collect();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    results
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_machines_fetch_shared_box_once() {
    let catalog = MemoryCatalog::new();
    let fetcher = CountingFetcher::new(catalog.clone(), FetchBehavior::Succeed)
        .with_delay(Duration::from_millis(100));
    let coordinator = coordinator(&catalog, &fetcher);

    let machines = (0..8)
        .map(|i| machine(&format!("m{i}"), "base", "http://x/box.box", "virtualbox"))
        .collect();
    let results = run_concurrently(&coordinator, machines).await;

    assert!(results.iter().all(|r| matches!(r, Ok(true))), "{results:?}");
    assert_eq!(fetcher.calls_for("base"), 1);
    assert_eq!(fetcher.max_in_flight(), 1);
    assert!(catalog.contains("base", "virtualbox"));
    assert_eq!(coordinator.registry().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_base_virtualbox_scenario() {
    // Two machines, same box, same URL, same provider: one fetch, both reload.
    let catalog = MemoryCatalog::new();
    let fetcher = CountingFetcher::new(catalog.clone(), FetchBehavior::Succeed)
        .with_delay(Duration::from_millis(50));
    let coordinator = coordinator(&catalog, &fetcher);

    let machines = vec![
        machine("web", "base", "http://x/box.box", "virtualbox"),
        machine("db", "base", "http://x/box.box", "virtualbox"),
    ];
    let results = run_concurrently(&coordinator, machines).await;

    assert!(matches!(results[0], Ok(true)));
    assert!(matches!(results[1], Ok(true)));
    assert_eq!(fetcher.calls(), 1);
    let request = fetcher.last_request().unwrap();
    assert_eq!(request.name, "base");
    assert_eq!(request.url, "http://x/box.box");
    assert_eq!(request.formats, vec!["virtualbox"]);
}

#[tokio::test]
async fn test_distinct_boxes_fetch_in_parallel() {
    let catalog = MemoryCatalog::new();
    let fetcher = CountingFetcher::new(catalog.clone(), FetchBehavior::Succeed)
        .with_delay(Duration::from_millis(200));
    let coordinator = coordinator(&catalog, &fetcher);

    let a = machine("a", "box-a", "http://x/a.box", "virtualbox");
    let b = machine("b", "box-b", "http://x/b.box", "virtualbox");
    let (ra, rb) = tokio::join!(coordinator.ensure_present(&a), coordinator.ensure_present(&b));

    assert!(ra.unwrap());
    assert!(rb.unwrap());
    assert_eq!(fetcher.calls_for("box-a"), 1);
    assert_eq!(fetcher.calls_for("box-b"), 1);
    assert_eq!(fetcher.max_in_flight(), 2);
}

#[tokio::test]
async fn test_held_key_does_not_delay_other_keys() {
    let catalog = MemoryCatalog::new();
    let fetcher = CountingFetcher::new(catalog.clone(), FetchBehavior::Succeed);
    let coordinator = coordinator(&catalog, &fetcher);

    // Simulate a long fetch of "slow" by holding its lock.
    let slow_lock = coordinator.registry().lock_for(&BoxKey::from("slow"));
    let held = slow_lock.lock().await;

    let other = machine("other", "fast", "http://x/fast.box", "virtualbox");
    let fast = tokio::time::timeout(Duration::from_millis(500), coordinator.ensure_present(&other))
        .await
        .expect("a different box must not wait for the held lock");
    assert!(fast.unwrap());

    let blocked = machine("blocked", "slow", "http://x/slow.box", "virtualbox");
    let waited =
        tokio::time::timeout(Duration::from_millis(100), coordinator.ensure_present(&blocked)).await;
    assert!(waited.is_err(), "same box must wait for the held lock");
    assert_eq!(fetcher.calls_for("slow"), 0);

    drop(held);
    assert!(coordinator.ensure_present(&blocked).await.unwrap());
    assert_eq!(fetcher.calls_for("slow"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_find_present_box() {
    let catalog = MemoryCatalog::new();
    let entry = catalog.insert("base", "virtualbox");
    let fetcher = CountingFetcher::new(catalog.clone(), FetchBehavior::Succeed);
    let coordinator = coordinator(&catalog, &fetcher);

    // Half the callers still hold a machine loaded before the box was added.
    let machines = (0..12)
        .map(|i| {
            let stale = machine(&format!("m{i}"), "base", "http://x/box.box", "virtualbox");
            if i % 2 == 0 {
                stale
            } else {
                Machine::new(
                    stale.name(),
                    Provider::with_builtin_options("virtualbox"),
                    stale.descriptor().clone(),
                    "/project",
                    Some(entry.clone()),
                )
            }
        })
        .collect();
    let results = run_concurrently(&coordinator, machines).await;

    for (i, result) in results.iter().enumerate() {
        let reload = *result.as_ref().unwrap();
        assert_eq!(reload, i % 2 == 0, "machine m{i}");
    }
    assert_eq!(fetcher.calls(), 0);
    assert_eq!(catalog.len(), 1);
}

#[tokio::test]
async fn test_box_present_in_catalog_is_not_fetched() {
    let catalog = MemoryCatalog::new();
    catalog.insert("base", "virtualbox");
    let fetcher = CountingFetcher::new(catalog.clone(), FetchBehavior::Succeed);
    let coordinator = coordinator(&catalog, &fetcher);

    let stale = machine("default", "base", "http://x/box.box", "virtualbox");
    assert!(coordinator.ensure_present(&stale).await.unwrap());
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_box_under_alternate_format_is_not_fetched() {
    let catalog = MemoryCatalog::new();
    catalog.insert("base", "vmware_fusion");
    let fetcher = CountingFetcher::new(catalog.clone(), FetchBehavior::Succeed);
    let coordinator = coordinator(&catalog, &fetcher);

    let vmware = machine("default", "base", "http://x/box.box", "vmware_desktop");
    assert!(coordinator.ensure_present(&vmware).await.unwrap());
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_second_call_after_reload_is_noop() {
    let catalog = MemoryCatalog::new();
    let fetcher = CountingFetcher::new(catalog.clone(), FetchBehavior::Succeed);
    let coordinator = coordinator(&catalog, &fetcher);

    let first = machine("default", "base", "http://x/box.box", "virtualbox");
    assert!(coordinator.ensure_present(&first).await.unwrap());

    // What a reload produces: the same machine, now backed by the box.
    let entry = catalog.insert("base", "virtualbox");
    let reloaded = Machine::new(
        "default",
        Provider::with_builtin_options("virtualbox"),
        first.descriptor().clone(),
        "/project",
        Some(entry),
    );
    assert!(!coordinator.ensure_present(&reloaded).await.unwrap());
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(catalog.len(), 1);
}

#[tokio::test]
async fn test_unconfigured_machines_touch_nothing() {
    let catalog = MemoryCatalog::new();
    let fetcher = CountingFetcher::new(catalog.clone(), FetchBehavior::Succeed);
    let coordinator = coordinator(&catalog, &fetcher);

    for descriptor in [
        BoxDescriptor::default(),
        BoxDescriptor {
            name: Some("base".to_string()),
            ..BoxDescriptor::default()
        },
        BoxDescriptor {
            url: Some("http://x/box.box".to_string()),
            ..BoxDescriptor::default()
        },
        BoxDescriptor {
            name: Some(String::new()),
            url: Some("http://x/box.box".to_string()),
            ..BoxDescriptor::default()
        },
    ] {
        let m = Machine::new(
            "default",
            Provider::with_builtin_options("virtualbox"),
            descriptor,
            "/project",
            None,
        );
        assert!(!coordinator.ensure_present(&m).await.unwrap());
    }

    assert_eq!(fetcher.calls(), 0);
    assert_eq!(catalog.find_calls(), 0);
    assert!(coordinator.registry().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_lost_race_is_absorbed() {
    let catalog = MemoryCatalog::new();
    let fetcher = CountingFetcher::new(catalog.clone(), FetchBehavior::AlreadyExists)
        .with_delay(Duration::from_millis(20));
    let coordinator = coordinator(&catalog, &fetcher);

    let machines = (0..4)
        .map(|i| machine(&format!("m{i}"), "base", "http://x/box.box", "virtualbox"))
        .collect();
    let results = run_concurrently(&coordinator, machines).await;

    assert!(results.iter().all(|r| matches!(r, Ok(true))), "{results:?}");
    // The failing "loser" still registered the box, so later waiters find it.
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failures_propagate_and_waiters_retry() {
    let catalog = MemoryCatalog::new();
    let fetcher = CountingFetcher::new(catalog.clone(), FetchBehavior::Fail)
        .with_delay(Duration::from_millis(20));
    let coordinator = coordinator(&catalog, &fetcher);

    let machines = (0..3)
        .map(|i| machine(&format!("m{i}"), "base", "http://x/box.box", "virtualbox"))
        .collect();
    let results = run_concurrently(&coordinator, machines).await;

    for result in &results {
        let err = result.as_ref().unwrap_err();
        assert!(matches!(err.downcast_ref::<BoxError>(), Some(BoxError::DownloadFailed { .. })));
    }
    // Nothing was registered, so each waiter tried again, one at a time.
    assert_eq!(fetcher.calls(), 3);
    assert_eq!(fetcher.max_in_flight(), 1);
    assert!(coordinator.registry().lock_for(&BoxKey::from("base")).try_lock().is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_coordinators_share_the_global_registry() {
    let catalog = MemoryCatalog::new();
    let fetcher = CountingFetcher::new(catalog.clone(), FetchBehavior::Succeed)
        .with_delay(Duration::from_millis(100));
    let ui = Arc::new(RecordingUi::default());
    let first = Arc::new(BoxCoordinator::new(catalog.clone(), fetcher.clone(), ui.clone()));
    let second = Arc::new(BoxCoordinator::new(catalog.clone(), fetcher.clone(), ui));
    assert!(Arc::ptr_eq(first.registry(), second.registry()));

    let a = machine("a", "global-registry-box", "http://x/g.box", "virtualbox");
    let b = machine("b", "global-registry-box", "http://x/g.box", "virtualbox");
    let (ra, rb) = tokio::join!(
        tokio::spawn({
            let first = Arc::clone(&first);
            async move { first.ensure_present(&a).await }
        }),
        tokio::spawn({
            let second = Arc::clone(&second);
            async move { second.ensure_present(&b).await }
        }),
    );

    assert!(ra.unwrap().unwrap());
    assert!(rb.unwrap().unwrap());
    assert_eq!(fetcher.calls_for("global-registry-box"), 1);
}
