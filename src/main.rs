#![deny(clippy::all)]

use log::*;
use parking_lot::Mutex as Samples;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use wordlock::config::{load_config, Config};
use wordlock::metrics::METRICS;
use wordlock::{wait, LockBuffer, LockError, Mutex, Timeout};

fn setup_logger() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", concat!(env!("CARGO_PKG_NAME"), "=debug"));
    }
    env_logger::init();
}

fn print_help() {
    println!("wordlock v{}", env!("CARGO_PKG_VERSION"));
    println!("Drive a contention run against a single shared-word lock\n");
    println!("USAGE:");
    println!("    wordlock [OPTIONS] [CONFIG_FILE]\n");
    println!("OPTIONS:");
    println!("    -h, --help           Show this help message");
    println!("    --threads N          Blocking participants (default 4)");
    println!("    --tasks N            Async participants (default 4)");
    println!("    --iterations N       Critical sections per participant (default 1000)");
    println!("    --hold-us N          Time spent inside each critical section (default 10)");
    println!("    --timeout-ms N       Per-acquisition timeout, 0 = unbounded (default 0)\n");
    println!("ARGUMENTS:");
    println!("    [CONFIG_FILE]        Path to configuration file (default: environment)\n");
    println!("CONFIGURATION:");
    println!("[wait] - Wait/notify strategy");
    println!("  strategy = \"auto\"        # auto | native | polling");
    println!("  poll_slice_ms = 1        # Blocking slice of the polling strategy (ms)\n");
    println!("ENVIRONMENT:");
    println!("  WORDLOCK_CONFIG, WORDLOCK_WAIT_STRATEGY, WORDLOCK_POLL_SLICE_MS, RUST_LOG");
}

#[derive(Clone, Debug)]
struct RunOpts {
    threads: usize,
    tasks: usize,
    iterations: u64,
    hold: Duration,
    timeout: Timeout,
    config: Option<String>,
}

impl Default for RunOpts {
    fn default() -> Self {
        Self {
            threads: 4,
            tasks: 4,
            iterations: 1000,
            hold: Duration::from_micros(10),
            timeout: Timeout::Unbounded,
            config: None,
        }
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Option<RunOpts>, String> {
    let mut opts = RunOpts::default();
    while let Some(arg) = args.next() {
        let mut value = |name: &str| -> Result<u64, String> {
            let v = args.next().ok_or_else(|| format!("{name} needs a value"))?;
            v.parse::<u64>().map_err(|e| format!("{name} {v:?}: {e}"))
        };
        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "--threads" => opts.threads = value("--threads")? as usize,
            "--tasks" => opts.tasks = value("--tasks")? as usize,
            "--iterations" => opts.iterations = value("--iterations")?,
            "--hold-us" => opts.hold = Duration::from_micros(value("--hold-us")?),
            "--timeout-ms" => {
                opts.timeout = match value("--timeout-ms")? {
                    0 => Timeout::Unbounded,
                    ms => Timeout::millis(ms),
                }
            }
            flag if flag.starts_with('-') => return Err(format!("unknown option {flag}")),
            path => opts.config = Some(path.to_string()),
        }
    }
    Ok(Some(opts))
}

/// State touched only inside the critical section.
struct Shared {
    counter: AtomicU64,
    lost: AtomicU64,
    failures: AtomicU64,
    latencies: Samples<Vec<Duration>>,
}

impl Shared {
    /// Unsynchronised read-modify-write; overlapping holders lose updates.
    fn critical_section(&self, mutex: &Mutex, hold: Duration) {
        if !mutex.is_locked() {
            self.lost.fetch_add(1, Ordering::Relaxed);
        }
        let v = self.counter.load(Ordering::Relaxed);
        if !hold.is_zero() {
            std::thread::sleep(hold);
        }
        self.counter.store(v + 1, Ordering::Relaxed);
    }

    fn record(&self, waited: Duration, res: &Result<(), LockError>) {
        match res {
            Ok(()) => self.latencies.lock().push(waited),
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                debug!("acquisition failed: {}", e);
            }
        }
    }
}

fn run(opts: RunOpts) -> Result<(), String> {
    let cfg = match &opts.config {
        Some(path) => {
            let cfg = load_config(path).map_err(|e| format!("failed to read config {path}: {e}"))?;
            info!("config loaded from {}", path);
            cfg
        }
        None => Config::from_env(),
    };
    let mutex = Mutex::with_strategy(LockBuffer::create(), wait::select(&cfg.wait))
        .map_err(|e| e.to_string())?;
    info!(
        "contending with {} thread(s) and {} task(s), {} iterations each, strategy {}",
        opts.threads,
        opts.tasks,
        opts.iterations,
        mutex.strategy_name()
    );

    let shared = Arc::new(Shared {
        counter: AtomicU64::new(0),
        lost: AtomicU64::new(0),
        failures: AtomicU64::new(0),
        latencies: Samples::new(Vec::new()),
    });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(opts.tasks.clamp(1, 8))
        .thread_name("wordlock-task")
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    let started = Instant::now();

    let threads: Vec<_> = (0..opts.threads)
        .map(|i| {
            let mutex = mutex.clone();
            let shared = Arc::clone(&shared);
            let opts = opts.clone();
            std::thread::Builder::new()
                .name(format!("wordlock-thread-{i}"))
                .spawn(move || {
                    for _ in 0..opts.iterations {
                        let t = Instant::now();
                        let res = mutex.lock_blocking(opts.timeout).map(|h| {
                            shared.critical_section(&mutex, opts.hold);
                            h.release();
                        });
                        shared.record(t.elapsed(), &res);
                    }
                })
                .map_err(|e| format!("failed to spawn thread: {e}"))
        })
        .collect::<Result<_, _>>()?;

    runtime.block_on(async {
        let tasks: Vec<_> = (0..opts.tasks)
            .map(|_| {
                let mutex = mutex.clone();
                let shared = Arc::clone(&shared);
                let opts = opts.clone();
                tokio::spawn(async move {
                    let (m, s, hold) = (&mutex, &*shared, opts.hold);
                    for _ in 0..opts.iterations {
                        let t = Instant::now();
                        let res = wordlock::guard(m, opts.timeout, move || async move {
                            s.critical_section(m, hold);
                            Ok::<(), LockError>(())
                        })
                        .await;
                        shared.record(t.elapsed(), &res);
                    }
                })
            })
            .collect();
        for t in tasks {
            if let Err(e) = t.await {
                error!("task failed: {}", e);
            }
        }
    });

    for t in threads {
        if t.join().is_err() {
            error!("participant thread panicked");
        }
    }

    let elapsed = started.elapsed();
    let mut lat = std::mem::take(&mut *shared.latencies.lock());
    lat.sort_unstable();
    let pct = |p: f64| -> Duration {
        if lat.is_empty() {
            return Duration::ZERO;
        }
        let idx = ((lat.len() - 1) as f64 * p).round() as usize;
        lat[idx]
    };
    let expected = (opts.threads + opts.tasks) as u64 * opts.iterations;
    let failures = shared.failures.load(Ordering::Relaxed);
    let counter = shared.counter.load(Ordering::Relaxed);

    println!("elapsed:        {:?}", elapsed);
    println!("acquisitions:   {}", lat.len());
    println!("failures:       {}", failures);
    println!("counter:        {} (expected {})", counter, expected - failures);
    println!("unlocked holds: {}", shared.lost.load(Ordering::Relaxed));
    println!("latency p50:    {:?}", pct(0.50));
    println!("latency p99:    {:?}", pct(0.99));
    println!("latency max:    {:?}", pct(1.0));
    println!();
    print!("{}", METRICS.render_text());

    if counter != expected - failures {
        return Err(format!(
            "lost updates: counter {} != {}",
            counter,
            expected - failures
        ));
    }
    Ok(())
}

fn main() {
    let opts = match parse_args(std::env::args().skip(1)) {
        Ok(Some(opts)) => opts,
        Ok(None) => {
            print_help();
            return;
        }
        Err(e) => {
            eprintln!("{e}\n");
            print_help();
            std::process::exit(2);
        }
    };
    setup_logger();
    if let Err(e) = run(opts) {
        error!("{}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn defaults_without_arguments() {
        let opts = parse_args(args(&[])).unwrap().unwrap();
        assert_eq!(opts.threads, 4);
        assert_eq!(opts.tasks, 4);
        assert_eq!(opts.timeout, Timeout::Unbounded);
        assert!(opts.config.is_none());
    }

    #[test]
    fn options_and_config_path() {
        let opts = parse_args(args(&[
            "--threads", "2", "--tasks", "0", "--hold-us", "5", "--timeout-ms", "20", "lock.conf",
        ]))
        .unwrap()
        .unwrap();
        assert_eq!(opts.threads, 2);
        assert_eq!(opts.tasks, 0);
        assert_eq!(opts.hold, Duration::from_micros(5));
        assert_eq!(opts.timeout, Timeout::millis(20));
        assert_eq!(opts.config.as_deref(), Some("lock.conf"));
    }

    #[test]
    fn help_and_errors() {
        assert!(parse_args(args(&["--help"])).unwrap().is_none());
        assert!(parse_args(args(&["--threads"])).unwrap_err().contains("needs a value"));
        assert!(parse_args(args(&["--iterations", "x"])).is_err());
        assert!(parse_args(args(&["--bogus"])).unwrap_err().contains("unknown option"));
    }
}
