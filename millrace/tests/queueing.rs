//! Backpressure through a bounded queue, push upstream and pull downstream.

use std::sync::Arc;
use std::time::{Duration, Instant};

use millrace::{execute, Config, Router};

fn wait_for(router: &Arc<Router>, handler: &str, expected: &str) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let value = router.call_read(handler).unwrap();
        if value.trim() == expected {
            return;
        }
        if Instant::now() > deadline {
            panic!("{} stuck at {:?}, wanted {:?}", handler, value, expected);
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn overfull_queue_drops_at_the_push_side() {
    let (master, router) = execute(Config::thread(), |builder| {
        builder.add_element("src", "InfiniteSource", &["LIMIT 16", "BURST 16"]);
        builder.add_element("q", "Queue", &["CAPACITY 8"]);
        builder.add_element("bridge", "RatedUnqueue", &["INTERVAL 2ms"]);
        builder.add_element("sink", "Discard", &[]);
        builder.connect("src", 0, "q", 0);
        builder.connect("q", 0, "bridge", 0);
        builder.connect("bridge", 0, "sink", 0);
    })
    .unwrap();

    // The whole burst lands in one task body, before the bridge's first
    // pull: eight packets queue, eight drop.
    wait_for(&router, "src.count", "16");
    assert_eq!(router.call_read("q.drops").unwrap().trim(), "8");
    assert_eq!(router.call_read("q.highwater").unwrap().trim(), "8");

    // The bridge drains the survivors at its own rate.
    wait_for(&router, "sink.count", "8");
    wait_for(&router, "q.length", "0");

    master.please_stop();
    master.join();
}

#[test]
fn pull_sink_drains_and_sleeps_on_the_empty_signal() {
    let (master, router) = execute(Config::thread(), |builder| {
        builder.add_element("src", "InfiniteSource", &["LIMIT 5", "BURST 5"]);
        builder.add_element("q", "Queue", &["CAPACITY 32"]);
        builder.add_element("sink", "Discard", &[]);
        builder.connect("src", 0, "q", 0);
        builder.connect("q", 0, "sink", 0);
    })
    .unwrap();

    wait_for(&router, "sink.count", "5");
    wait_for(&router, "q.length", "0");

    // More input reactivates the queue's empty notifier, which wakes the
    // sink's sleeping task; no polling element in between.
    router.call_write("src.reset", "").unwrap();
    wait_for(&router, "sink.count", "10");

    master.please_stop();
    master.join();
}

#[test]
fn queue_counters_reset() {
    let (master, router) = execute(Config::thread(), |builder| {
        builder.add_element("src", "InfiniteSource", &["LIMIT 4", "BURST 4"]);
        builder.add_element("q", "Queue", &["CAPACITY 2"]);
        builder.add_element("sink", "Discard", &[]);
        builder.connect("src", 0, "q", 0);
        builder.connect("q", 0, "sink", 0);
    })
    .unwrap();

    wait_for(&router, "q.length", "0");
    assert_eq!(router.call_read("q.drops").unwrap().trim(), "2");
    router.call_write("q.reset_counts", "").unwrap();
    assert_eq!(router.call_read("q.drops").unwrap().trim(), "0");
    assert_eq!(router.call_read("q.highwater").unwrap().trim(), "0");

    master.please_stop();
    master.join();
}
