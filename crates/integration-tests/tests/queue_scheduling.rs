//! Queue scheduling integration tests
//!
//! Priority-then-FIFO selection, dependency gating and offline admission,
//! exercised through the real driver loop.

use std::sync::Arc;

use recall_core::application::queue::{
    connectivity_channel, shutdown_channel, EnqueueOptions, OperationQueue, QueueSettings,
};
use recall_core::domain::{UserIdentity, WorkItem};
use recall_core::port::id_provider::mocks::SequentialIdProvider;
use recall_core::port::time_provider::SystemTimeProvider;
use recall_core::port::work_executor::mocks::{MockBehavior, MockWorkExecutor};
use recall_core::port::WorkExecutor;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn build_queue(settings: QueueSettings) -> (Arc<OperationQueue>, Arc<MockWorkExecutor>) {
    let executor = Arc::new(MockWorkExecutor::new(MockBehavior::Success));
    let queue = Arc::new(OperationQueue::new(
        Arc::clone(&executor) as Arc<dyn WorkExecutor>,
        Arc::new(SystemTimeProvider),
        Arc::new(SequentialIdProvider::new()),
        settings,
    ));
    (queue, executor)
}

fn lookup(user: &str) -> WorkItem {
    WorkItem::LocateRecord {
        user: UserIdentity::new(user),
    }
}

/// Scenario A: enqueue X (priority 5) then Y (priority 8) with no
/// dependencies; Y completes before X.
#[tokio::test]
async fn test_higher_priority_completes_first() {
    init_logging();
    let (queue, executor) = build_queue(QueueSettings::default());

    // both enqueued before the driver starts, so selection alone decides
    let x = queue.enqueue(lookup("x"), EnqueueOptions::with_priority(5));
    let y = queue.enqueue(lookup("y"), EnqueueOptions::with_priority(8));

    let (shutdown, token) = shutdown_channel();
    let driver = {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move { queue.run(token).await })
    };

    y.wait().await.unwrap();
    x.wait().await.unwrap();
    assert_eq!(executor.executed_users(), vec!["y", "x"]);

    shutdown.shutdown();
    driver.await.unwrap();
}

/// Equal priorities fall back to insertion order
#[tokio::test]
async fn test_equal_priority_is_fifo() {
    let (queue, executor) = build_queue(QueueSettings::default());

    let first = queue.enqueue(lookup("first"), EnqueueOptions::with_priority(5));
    let second = queue.enqueue(lookup("second"), EnqueueOptions::with_priority(5));

    let (shutdown, token) = shutdown_channel();
    let driver = {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move { queue.run(token).await })
    };

    first.wait().await.unwrap();
    second.wait().await.unwrap();
    assert_eq!(executor.executed_users(), vec!["first", "second"]);

    shutdown.shutdown();
    driver.await.unwrap();
}

/// An operation is never selected while a listed dependency is still in
/// the queue, regardless of priority
#[tokio::test]
async fn test_dependency_chain_orders_execution() {
    let (queue, executor) = build_queue(QueueSettings::default());

    let parent = queue.enqueue(lookup("parent"), EnqueueOptions::with_priority(1));
    let child = queue.enqueue(
        lookup("child"),
        EnqueueOptions {
            priority: 10,
            dependencies: vec![parent.id().clone()],
            ..Default::default()
        },
    );
    let grandchild = queue.enqueue(
        lookup("grandchild"),
        EnqueueOptions {
            priority: 10,
            dependencies: vec![child.id().clone()],
            ..Default::default()
        },
    );

    let (shutdown, token) = shutdown_channel();
    let driver = {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move { queue.run(token).await })
    };

    grandchild.wait().await.unwrap();
    assert_eq!(
        executor.executed_users(),
        vec!["parent", "child", "grandchild"]
    );

    shutdown.shutdown();
    driver.await.unwrap();
}

/// A failed dependency unblocks dependents; it does not fail them
/// transitively
#[tokio::test(start_paused = true)]
async fn test_failed_dependency_unblocks_dependent() {
    let (queue, executor) = build_queue(QueueSettings {
        retry_delay_ms: 10,
        ..Default::default()
    });
    executor.set_behavior(MockBehavior::FailTimes(
        1,
        recall_core::SyncError::NotFound("gone".to_string()),
    ));

    let parent = queue.enqueue(
        lookup("parent"),
        EnqueueOptions {
            retries: Some(0),
            ..Default::default()
        },
    );
    let child = queue.enqueue(
        lookup("child"),
        EnqueueOptions {
            dependencies: vec![parent.id().clone()],
            ..Default::default()
        },
    );

    let (shutdown, token) = shutdown_channel();
    let driver = {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move { queue.run(token).await })
    };

    assert!(parent.wait().await.is_err());
    child.wait().await.unwrap();
    assert_eq!(executor.executed_users(), vec!["parent", "child"]);

    shutdown.shutdown();
    driver.await.unwrap();
}

/// Scenario D: while offline, only offline-safe operations execute; the
/// rest drain after connectivity is restored
#[tokio::test]
async fn test_offline_mode_defers_unsafe_operations() {
    init_logging();
    let (queue, executor) = build_queue(QueueSettings::default());

    let (connectivity, watch) = connectivity_channel(false);
    queue.attach_connectivity(watch);
    assert!(queue.is_offline());

    // equal priority, unsafe enqueued first: only admission can explain
    // the safe one running first
    let deferred = queue.enqueue(lookup("deferred"), EnqueueOptions::with_priority(5));
    let safe = queue.enqueue(
        lookup("safe"),
        EnqueueOptions {
            priority: 5,
            offline_safe: true,
            ..Default::default()
        },
    );

    let (shutdown, token) = shutdown_channel();
    let driver = {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move { queue.run(token).await })
    };

    safe.wait().await.unwrap();
    assert_eq!(executor.executed_users(), vec!["safe"]);
    assert_eq!(queue.get_status().queue_len, 1);

    connectivity.set_online();
    deferred.wait().await.unwrap();
    assert_eq!(executor.executed_users(), vec!["safe", "deferred"]);

    shutdown.shutdown();
    driver.await.unwrap();
}

/// getStatus reflects the in-flight operation and pending summaries
#[tokio::test(start_paused = true)]
async fn test_status_reports_current_operation() {
    let (queue, executor) = build_queue(QueueSettings::default());
    executor.set_behavior(MockBehavior::Slow(1_000));

    queue.enqueue(lookup("slow"), EnqueueOptions::default());
    queue.enqueue(lookup("waiting"), EnqueueOptions::default());

    // drive one selection by hand so the first operation is in flight
    let processing = {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move { queue.process_next().await })
    };
    tokio::task::yield_now().await;

    let status = queue.get_status();
    assert!(status.processing);
    assert!(status.current.is_some());
    assert_eq!(status.queue_len, 1);
    assert_eq!(status.pending.len(), 1);

    assert!(processing.await.unwrap());
    let status = queue.get_status();
    assert!(!status.processing);
    assert_eq!(status.stats.successful, 1);
}
