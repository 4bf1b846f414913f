//! The handler RPC surface: per-element, built-in, and global.

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

fn counting_pipeline() -> (millrace::Master, Arc<Router>) {
    execute(Config::thread(), |builder| {
        builder.add_element("src", "InfiniteSource", &["DATA hello", "LIMIT 5"]);
        builder.add_element("c", "Counter", &[]);
        builder.add_element("sink", "Discard", &[]);
        builder.connect("src", 0, "c", 0);
        builder.connect("c", 0, "sink", 0);
    })
    .unwrap()
}

#[test]
fn read_write_round_trip() {
    let (master, router) = counting_pipeline();

    wait_for(&router, "c.count", "5");
    router.call_write("c.reset", "").unwrap();
    assert_eq!(router.call_read("c.count").unwrap(), "0\n");
    assert_eq!(router.call_read("c.byte_count").unwrap(), "0\n");

    master.please_stop();
    master.join();
}

#[test]
fn builtin_handlers_describe_the_element() {
    let (master, router) = counting_pipeline();

    assert_eq!(router.call_read("c.class").unwrap(), "Counter\n");
    assert_eq!(router.call_read("c.name").unwrap(), "c\n");
    assert_eq!(router.call_read("src.config").unwrap(), "DATA hello, LIMIT 5\n");

    let ports = router.call_read_with("c.ports", true).unwrap();
    assert!(ports.contains("1 inputs, 1 outputs"), "{}", ports);
    assert!(ports.contains("input 0: push from src[0]"), "{}", ports);
    assert!(ports.contains("output 0: push to sink[0]"), "{}", ports);

    let handlers = router.call_read("c.handlers").unwrap();
    for name in ["byte_count", "class", "config", "count", "handlers", "name", "ports", "reset"] {
        assert!(handlers.contains(name), "{} missing from {}", name, handlers);
    }

    master.please_stop();
    master.join();
}

#[test]
fn global_handlers_cover_the_router() {
    let (master, router) = counting_pipeline();

    assert_eq!(router.call_read("list").unwrap(), "src\nc\nsink\n");
    let classes = router.call_read("classes").unwrap();
    assert!(classes.contains("Counter") && classes.contains("Queue"), "{}", classes);

    router.call_write("stop", "").unwrap();
    assert!(master.stopping());
    master.join();
}

#[test]
fn handler_errors_name_the_problem() {
    let (master, router) = counting_pipeline();

    assert!(router.call_read("c.missing").unwrap_err().contains("missing"));
    assert!(router.call_read("ghost.count").unwrap_err().contains("ghost"));
    assert!(router.call_write("c.count", "9").is_err());
    assert!(router.call_read("nosuchglobal").is_err());

    // A failed write reports the element's parse error.
    let error = router.call_write("src.limit", "many").unwrap_err();
    assert!(error.contains("i64"), "{}", error);

    master.please_stop();
    master.join();
}

#[test]
fn element_handler_lists_are_queryable() {
    let (master, router) = counting_pipeline();

    let index = router.find_element("c").unwrap();
    let names = router.handler_names(index);
    assert!(names.iter().any(|n| n == "count"));
    assert!(router.global_handler_names().contains(&"stop"));

    master.please_stop();
    master.join();
}
