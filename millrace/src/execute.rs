//! Entry points that build a master, install a router, and hand back the
//! running pair.

use std::sync::Arc;

use crate::builder::RouterBuilder;
use crate::logging::LogHook;
use crate::master::Master;
use crate::router::Router;

/// How many worker threads to run, and where their logs go.
pub struct Config {
    threads: usize,
    log_hook: Option<LogHook>,
}

impl Config {
    /// One worker thread.
    pub fn thread() -> Config {
        Config { threads: 1, log_hook: None }
    }

    /// `threads` worker threads in this process.
    pub fn process(threads: usize) -> Config {
        Config { threads: threads.max(1), log_hook: None }
    }

    /// Binds each worker's event stream through `hook`.
    pub fn log_hook(mut self, hook: LogHook) -> Config {
        self.log_hook = Some(hook);
        self
    }

    /// The configured worker thread count.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Constructs a configuration by parsing supplied text arguments.
    ///
    /// Most commonly, this uses `std::env::args()` as the supplied iterator.
    /// Understood: `-w`/`--threads NUM`.
    #[cfg(feature = "getopts")]
    pub fn from_args<I: Iterator<Item = String>>(args: I) -> Result<Config, String> {
        let mut opts = getopts::Options::new();
        opts.optopt("w", "threads", "number of worker threads", "NUM");
        let matches = opts.parse(args).map_err(|e| e.to_string())?;
        let threads = match matches.opt_str("w") {
            Some(text) => text
                .parse::<usize>()
                .map_err(|_| format!("bad thread count {:?}", text))?,
            None => 1,
        };
        Ok(Config::process(threads))
    }
}

/// Builds a graph with `func`, installs it on a fresh [`Master`], and
/// returns the running pair.
///
/// The computation keeps running until [`Master::please_stop`] (or a write
/// to the router's global `stop` handler); join the master to wait for the
/// workers.
///
/// # Examples
///
/// ```
/// use millrace::{execute, Config};
///
/// let (master, router) = execute(Config::thread(), |builder| {
///     builder.add_element("src", "TimedSource", &["INTERVAL 10ms"]);
///     builder.add_element("sink", "Discard", &[]);
///     builder.connect("src", 0, "sink", 0);
/// }).unwrap();
///
/// assert_eq!(router.call_read("sink.class").unwrap(), "Discard\n");
/// master.please_stop();
/// master.join();
/// ```
pub fn execute<F>(config: Config, func: F) -> Result<(Master, Arc<Router>), String>
where
    F: FnOnce(&mut RouterBuilder),
{
    let master = Master::with_log_hook(config.threads, config.log_hook);
    let mut builder = RouterBuilder::new();
    func(&mut builder);
    let router = master.install(builder)?;
    Ok((master, router))
}

/// [`execute`] with a single worker thread.
pub fn execute_directly<F>(func: F) -> Result<(Master, Arc<Router>), String>
where
    F: FnOnce(&mut RouterBuilder),
{
    execute(Config::thread(), func)
}

/// [`execute`] configured from command-line style arguments.
#[cfg(feature = "getopts")]
pub fn execute_from_args<I, F>(args: I, func: F) -> Result<(Master, Arc<Router>), String>
where
    I: Iterator<Item = String>,
    F: FnOnce(&mut RouterBuilder),
{
    execute(Config::from_args(args)?, func)
}
