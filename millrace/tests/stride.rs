//! Stride-scheduler fairness observed through running tasks.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use millrace::element::PortCount;
use millrace::error::ErrorHandler;
use millrace::{execute, Config, Context, Element, Task};

struct Spinner {
    tickets: u32,
    runs: Arc<AtomicU64>,
    task: Option<Task>,
}

impl Element for Spinner {
    fn class_name(&self) -> &'static str {
        "Spinner"
    }
    fn port_count(&self) -> PortCount {
        PortCount::parse("0/0")
    }
    fn initialize(&mut self, ctx: &Context<'_>, _errh: &mut ErrorHandler) -> Result<(), String> {
        let task = ctx.new_task();
        task.set_tickets(self.tickets);
        task.initialize(true);
        self.task = Some(task);
        Ok(())
    }
    fn run_task(&mut self, _ctx: &Context<'_>, task: &Task) -> bool {
        self.runs.fetch_add(1, Ordering::Relaxed);
        task.fast_reschedule();
        true
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[test]
fn tickets_set_relative_dispatch_rates() {
    let runs_a = Arc::new(AtomicU64::new(0));
    let runs_b = Arc::new(AtomicU64::new(0));
    let spinner_a = Box::new(Spinner { tickets: 100, runs: Arc::clone(&runs_a), task: None });
    let spinner_b = Box::new(Spinner { tickets: 300, runs: Arc::clone(&runs_b), task: None });

    let (master, _router) = execute(Config::thread(), move |builder| {
        builder.add_instance("a", spinner_a, &[]);
        builder.add_instance("b", spinner_b, &[]);
    })
    .unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while runs_a.load(Ordering::Relaxed) + runs_b.load(Ordering::Relaxed) < 40_000 {
        assert!(Instant::now() < deadline, "tasks barely ran");
        std::thread::sleep(Duration::from_millis(1));
    }

    master.please_stop();
    master.join();

    let a = runs_a.load(Ordering::Relaxed) as f64;
    let b = runs_b.load(Ordering::Relaxed) as f64;
    let share = a / (a + b);
    // 100 vs 300 tickets: a quarter of dispatches go to A.
    assert!(
        (share - 0.25).abs() < 0.03,
        "A ran {} of {} dispatches ({:.3})",
        a,
        a + b,
        share
    );
}

#[test]
fn equal_tickets_split_evenly() {
    let runs_a = Arc::new(AtomicU64::new(0));
    let runs_b = Arc::new(AtomicU64::new(0));
    let spinner_a = Box::new(Spinner { tickets: 256, runs: Arc::clone(&runs_a), task: None });
    let spinner_b = Box::new(Spinner { tickets: 256, runs: Arc::clone(&runs_b), task: None });

    let (master, _router) = execute(Config::thread(), move |builder| {
        builder.add_instance("a", spinner_a, &[]);
        builder.add_instance("b", spinner_b, &[]);
    })
    .unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while runs_a.load(Ordering::Relaxed) + runs_b.load(Ordering::Relaxed) < 40_000 {
        assert!(Instant::now() < deadline, "tasks barely ran");
        std::thread::sleep(Duration::from_millis(1));
    }

    master.please_stop();
    master.join();

    let a = runs_a.load(Ordering::Relaxed) as f64;
    let b = runs_b.load(Ordering::Relaxed) as f64;
    let share = a / (a + b);
    assert!((share - 0.5).abs() < 0.03, "A share was {:.3}", share);
}

#[test]
fn deactivated_tasks_leave_the_runqueue() {
    let (master, router) = execute(Config::thread(), |builder| {
        builder.add_element("src", "InfiniteSource", &[]);
        builder.add_element("sink", "Discard", &[]);
        builder.connect("src", 0, "sink", 0);
    })
    .unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while router.call_read("src.count").unwrap().trim() == "0" {
        assert!(Instant::now() < deadline, "source never ran");
        std::thread::sleep(Duration::from_millis(1));
    }

    router.call_write("src.active", "false").unwrap();
    // Let any already-queued dispatch finish, then the count must freeze.
    std::thread::sleep(Duration::from_millis(20));
    let frozen = router.call_read("src.count").unwrap();
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(router.call_read("src.count").unwrap(), frozen);

    router.call_write("src.active", "true").unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if router.call_read("src.count").unwrap() != frozen {
            break;
        }
        assert!(Instant::now() < deadline, "source never resumed");
        std::thread::sleep(Duration::from_millis(1));
    }

    master.please_stop();
    master.join();
}
