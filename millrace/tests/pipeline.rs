//! A push pipeline end to end: source, counter, sink.

use std::any::Any;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use millrace::element::PortCount;
use millrace::{execute, Config, Context, Element, Packet, Router};

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

struct CaptureSink {
    seen: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl Element for CaptureSink {
    fn class_name(&self) -> &'static str {
        "CaptureSink"
    }
    fn port_count(&self) -> PortCount {
        PortCount::parse("1/0")
    }
    fn push(&mut self, _ctx: &Context<'_>, _port: usize, packet: Packet) {
        self.seen.lock().unwrap().push(packet.data().to_vec());
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[test]
fn limited_source_counts_and_delivers() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Box::new(CaptureSink { seen: Arc::clone(&seen) });

    let (master, router) = execute(Config::thread(), move |builder| {
        builder.add_element("src", "InfiniteSource", &["DATA ABC", "LIMIT 3"]);
        builder.add_element("cnt", "Counter", &[]);
        builder.add_instance("sink", sink, &[]);
        builder.connect("src", 0, "cnt", 0);
        builder.connect("cnt", 0, "sink", 0);
    })
    .unwrap();

    wait_for(&router, "cnt.count", "3");
    assert_eq!(router.call_read("cnt.byte_count").unwrap(), "9\n");
    assert_eq!(router.call_read("src.count").unwrap(), "3\n");

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    for payload in seen.iter() {
        assert_eq!(payload, b"ABC");
    }

    master.please_stop();
    master.join();
}

#[test]
fn tee_fans_out_shared_buffers() {
    let left = Arc::new(Mutex::new(Vec::new()));
    let right = Arc::new(Mutex::new(Vec::new()));
    let left_sink = Box::new(CaptureSink { seen: Arc::clone(&left) });
    let right_sink = Box::new(CaptureSink { seen: Arc::clone(&right) });

    let (master, router) = execute(Config::thread(), move |builder| {
        builder.add_element("src", "InfiniteSource", &["DATA xy", "LIMIT 4"]);
        builder.add_element("tee", "Tee", &[]);
        builder.add_instance("a", left_sink, &[]);
        builder.add_instance("b", right_sink, &[]);
        builder.connect("src", 0, "tee", 0);
        builder.connect("tee", 0, "a", 0);
        builder.connect("tee", 1, "b", 0);
    })
    .unwrap();

    wait_for(&router, "src.count", "4");
    let deadline = Instant::now() + Duration::from_secs(5);
    while left.lock().unwrap().len() < 4 || right.lock().unwrap().len() < 4 {
        assert!(Instant::now() < deadline, "fan-out never completed");
        std::thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(left.lock().unwrap().len(), 4);
    assert_eq!(right.lock().unwrap().len(), 4);

    master.please_stop();
    master.join();
}

#[test]
fn reset_handler_restarts_a_finished_source() {
    let (master, router) = execute(Config::thread(), |builder| {
        builder.add_element("src", "InfiniteSource", &["LIMIT 2"]);
        builder.add_element("cnt", "Counter", &[]);
        builder.add_element("sink", "Discard", &[]);
        builder.connect("src", 0, "cnt", 0);
        builder.connect("cnt", 0, "sink", 0);
    })
    .unwrap();

    wait_for(&router, "cnt.count", "2");
    router.call_write("src.reset", "").unwrap();
    wait_for(&router, "cnt.count", "4");

    master.please_stop();
    master.join();
}
