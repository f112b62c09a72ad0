use std::collections::HashSet;
use std::io::Write;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::sleep;
use uplink::concurrency::shutdown::create_shutdown_channel;
use uplink_telemetry::tracing::init_test_tracing;

mod support;

use crate::support::{spawn_test_executor, write_spool};

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_sync_passes_are_serialized() {
    init_test_tracing();

    let fixture = spawn_test_executor().await;
    write_spool(&fixture.spool_file, &["seed=1"]).await;

    // A host collector keeps appending while sync passes contend for the
    // spool, so overlapping transfers would have material to overlap on.
    let writer = {
        let spool_file = fixture.spool_file.clone();
        tokio::spawn(async move {
            for i in 0..50 {
                let mut file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&spool_file)
                    .expect("failed to open the spool file");
                writeln!(file, "point={i}").expect("failed to append to the spool file");
                drop(file);

                sleep(Duration::from_millis(5)).await;
            }
        })
    };

    let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();

    let mut passes = JoinSet::new();
    for _ in 0..8 {
        let executor = fixture.executor.clone();
        let shutdown = shutdown_rx.clone();
        passes.spawn(async move { executor.do_sync(&shutdown).await });

        sleep(Duration::from_millis(15)).await;
    }

    while let Some(joined) = passes.join_next().await {
        joined
            .expect("a sync pass panicked")
            .expect("a sync pass failed");
    }
    writer.await.expect("the spool writer panicked");

    // The critical section serializes every transfer.
    assert_eq!(fixture.transport.max_in_flight(), 1);
    assert!(fixture.transport.call_count().await >= 2);

    // Truncate-on-snapshot means no point is ever sent twice.
    let calls = fixture.transport.calls().await;
    let mut seen = HashSet::new();
    for point in calls.iter().flatten() {
        assert!(seen.insert(point.clone()), "point {point} was sent twice");
    }
}
