use cachekit::{CacheKit, Error};
use clap::{Parser, Subcommand};
use log::{debug, info, warn};
use std::io::{self, BufRead, Write};
use std::process::exit;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

// Keeps the pre-sized map and key list within reach of a 32-bit `usize`.
const MAX_BENCH_COUNT: u64 = 10_000_000;
const MAX_BENCH_THREADS: u64 = 256;

#[derive(Debug, Parser)]
#[clap(name = "cachekit")]
#[clap(about = "A thread-safe in-memory key-value store", long_about = None)]
#[clap(version)]
struct Cli {
    #[clap(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// read commands from stdin, one per line (the default)
    Shell,

    /// time set, get and delete from several threads
    Bench {
        /// Number of keys
        #[clap(long, default_value_t = 100_000, value_parser = clap::value_parser!(u64).range(1..=MAX_BENCH_COUNT))]
        count: u64,
        /// Number of threads sharing the cache
        #[clap(long, default_value_t = 4, value_parser = clap::value_parser!(u64).range(1..=MAX_BENCH_THREADS))]
        threads: u64,
    },
}

/// A single shell line.
#[derive(Debug, Parser)]
#[clap(no_binary_name = true)]
struct Line {
    #[clap(subcommand)]
    op: Op,
}

#[derive(Debug, Subcommand)]
enum Op {
    /// get value by key
    #[clap(arg_required_else_help = true)]
    Get {
        /// The key
        key: String,
    },

    /// set value to key
    #[clap(arg_required_else_help = true)]
    Set {
        /// The string key
        key: String,
        /// The string value
        value: String,
    },

    /// overwrite the value of an existing key
    #[clap(arg_required_else_help = true)]
    Update {
        /// The string key
        key: String,
        /// The string value
        value: String,
    },

    /// remove key and value
    #[clap(arg_required_else_help = true)]
    Rm {
        /// The string key
        key: String,
    },

    /// check whether a key exists
    #[clap(arg_required_else_help = true)]
    Has {
        /// The string key
        key: String,
    },

    /// number of entries
    Len,

    /// remove every entry
    Clear,

    /// list keys
    Keys,

    /// list values
    Values,

    /// list key=value pairs
    Items,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Cli::parse();

    let ok = match args.command.unwrap_or(Commands::Shell) {
        Commands::Shell => {
            let cache = CacheKit::new();
            let stdin = io::stdin();
            let stdout = io::stdout();
            match run_shell(&cache, stdin.lock(), stdout.lock()) {
                Ok(ok) => ok,
                Err(e) => {
                    eprintln!("{}", e);
                    false
                }
            }
        }
        Commands::Bench { count, threads } => run_bench(count, threads),
    };

    if !ok {
        exit(1);
    }
}

/// Runs every line of `input` against `cache`.
///
/// Returns `false` if any line failed to parse; the remaining lines still run.
fn run_shell<R: BufRead, W: Write>(
    cache: &CacheKit<String, String>,
    input: R,
    mut out: W,
) -> io::Result<bool> {
    let mut ok = true;
    for line in input.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match Line::try_parse_from(line.split_whitespace()) {
            Ok(Line { op }) => {
                debug!("{:?}", op);
                apply(cache, op, &mut out)?;
            }
            Err(e) if !e.use_stderr() => write!(out, "{}", e)?,
            Err(e) => {
                warn!("unparsable line: {:?}", line);
                eprint!("{}", e);
                ok = false;
            }
        }
    }
    out.flush()?;
    Ok(ok)
}

fn apply<W: Write>(cache: &CacheKit<String, String>, op: Op, out: &mut W) -> io::Result<()> {
    match op {
        Op::Get { key } => match cache.get(&key) {
            Some(value) => writeln!(out, "{}", value),
            None => writeln!(out, "Key not found"),
        },
        Op::Set { key, value } => {
            cache.set(key, value);
            writeln!(out, "OK")
        }
        Op::Update { key, value } => match cache.update(&key, value) {
            Ok(()) => writeln!(out, "OK"),
            Err(Error::KeyNotFound) => writeln!(out, "Key not found: {}", key),
        },
        Op::Rm { key } => {
            cache.delete(&key);
            writeln!(out, "OK")
        }
        Op::Has { key } => writeln!(out, "{}", cache.has(&key)),
        Op::Len => writeln!(out, "{}", cache.len()),
        Op::Clear => {
            cache.clear();
            writeln!(out, "OK")
        }
        Op::Keys => {
            let mut keys = cache.keys();
            keys.sort();
            keys.iter().try_for_each(|key| writeln!(out, "{}", key))
        }
        Op::Values => {
            let mut values = cache.values();
            values.sort();
            values.iter().try_for_each(|value| writeln!(out, "{}", value))
        }
        Op::Items => {
            let mut items: Vec<_> = cache.items().into_iter().collect();
            items.sort();
            items
                .iter()
                .try_for_each(|(key, value)| writeln!(out, "{}={}", key, value))
        }
    }
}

fn run_bench(count: u64, threads: u64) -> bool {
    let cache = CacheKit::with_capacity(count as usize);
    let keys: Vec<String> = (0..count).map(|i| format!("key{}", i)).collect();
    let threads = threads as usize;

    let set = phase(&cache, &keys, threads, |cache, i, key| {
        cache.set(key.to_owned(), i);
        true
    });
    report("set", count, set.0);

    let get = phase(&cache, &keys, threads, |cache, i, key| {
        cache.get(key) == Some(i)
    });
    report("get", count, get.0);

    let delete = phase(&cache, &keys, threads, |cache, _, key| {
        cache.delete(key);
        true
    });
    report("delete", count, delete.0);

    if get.1 > 0 {
        eprintln!("{} reads returned the wrong value", get.1);
        return false;
    }
    if !cache.is_empty() {
        eprintln!("{} entries left after delete", cache.len());
        return false;
    }
    true
}

/// Runs `op` once per key, splitting the keys round-robin across `threads`.
///
/// Returns the elapsed time and the number of calls where `op` returned false.
fn phase<F>(
    cache: &CacheKit<String, u64>,
    keys: &[String],
    threads: usize,
    op: F,
) -> (Duration, u64)
where
    F: Fn(&CacheKit<String, u64>, u64, &str) -> bool + Sync,
{
    let failures = AtomicU64::new(0);
    let start = Instant::now();
    thread::scope(|s| {
        for t in 0..threads {
            let op = &op;
            let failures = &failures;
            s.spawn(move || {
                for (i, key) in keys.iter().enumerate().skip(t).step_by(threads) {
                    if !op(cache, i as u64, key) {
                        failures.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });
    (start.elapsed(), failures.into_inner())
}

fn report(name: &str, count: u64, elapsed: Duration) {
    info!("{} phase finished", name);
    println!(
        "{}: {} ops in {:?} ({} ns/op)",
        name,
        count,
        elapsed,
        elapsed.as_nanos() / u128::from(count)
    );
}
