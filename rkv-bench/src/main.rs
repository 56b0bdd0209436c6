//! # Client Benchmark Harness
//!
//! Purpose: Drive a live store through the sync client so round-trip
//! throughput and HyperLogLog accuracy can be compared over time.
//!
//! ## Usage
//!
//! ```text
//! bench_client [--config client.json] [url] [op_count]
//! ```
//!
//! `url` defaults to `redis://127.0.0.1:6379`, `op_count` to 20000. The
//! optional JSON file holds `ClientConfig` transport options. Log output is
//! controlled through `RUST_LOG`.

use std::env;
use std::fs;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use rkv_client::{ClientConfig, Connection, Endpoint};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_URL: &str = "redis://127.0.0.1:6379";
const DEFAULT_OP_COUNT: usize = 20_000;
const KEY_PREFIX: &str = "_bench:rkv";
// Relative error above which the PFCOUNT estimate is logged as a warning.
const HLL_TOLERANCE: f64 = 0.2;

struct BenchConfig {
    url: String,
    op_count: usize,
    client: ClientConfig,
}

impl BenchConfig {
    fn from_args() -> Result<Self> {
        let mut args = env::args().skip(1).peekable();
        let mut client = ClientConfig::default();

        if args.peek().map(String::as_str) == Some("--config") {
            args.next();
            let path = args.next().context("--config needs a path")?;
            let raw = fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            client = ClientConfig::from_json(&raw).with_context(|| format!("parsing {path}"))?;
        }

        let url = args.next().unwrap_or_else(|| DEFAULT_URL.to_string());
        let op_count = match args.next() {
            Some(raw) => raw.parse::<usize>().with_context(|| format!("invalid op count {raw:?}"))?,
            None => DEFAULT_OP_COUNT,
        };

        Ok(BenchConfig {
            url,
            op_count: op_count.max(1),
            client,
        })
    }
}

fn report(label: &str, ops: usize, elapsed: Duration) {
    let secs = elapsed.as_secs_f64();
    let ops_per_sec = (ops as f64) / secs;
    let micros_per_op = (secs * 1e6) / (ops as f64);
    info!("{label}: {ops} ops in {secs:.3}s ({ops_per_sec:.0} ops/s, {micros_per_op:.1} us/op)");
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run() {
        eprintln!("bench_client failed: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let config = BenchConfig::from_args()?;
    let endpoint = Endpoint::parse(&config.url)?;
    let mut conn = Connection::open_with_config(&endpoint, &config.client)
        .with_context(|| format!("connecting to {}", endpoint.addr()))?;
    info!(addr = %endpoint.addr(), auth = ?conn.auth_state(), ops = config.op_count, "connected");

    bench_hll(&mut conn, config.op_count)?;
    bench_list(&mut conn, config.op_count)?;
    bench_set_scan(&mut conn, config.op_count)?;
    Ok(())
}

fn bench_hll(conn: &mut Connection, ops: usize) -> Result<()> {
    let key = format!("{KEY_PREFIX}:hll");
    conn.del(&key)?;

    let start = Instant::now();
    for idx in 0..ops {
        conn.pf_add(&key, &[idx.to_string().as_str()])?;
    }
    report("PFADD", ops, start.elapsed());

    let estimate = conn.pf_count(&key)?;
    let error = (estimate as f64 - ops as f64).abs() / ops as f64;
    info!(estimate, actual = ops, error_pct = error * 100.0, "PFCOUNT");
    if error > HLL_TOLERANCE {
        warn!(estimate, actual = ops, "estimate outside tolerance");
    }

    conn.del(&key)?;
    Ok(())
}

fn bench_list(conn: &mut Connection, ops: usize) -> Result<()> {
    let key = format!("{KEY_PREFIX}:list");
    conn.del(&key)?;

    let start = Instant::now();
    for idx in 0..ops {
        conn.lpush(&key, &idx.to_string())?;
    }
    report("LPUSH", ops, start.elapsed());

    let len = conn.llen(&key)?;
    if len != ops as i64 {
        bail!("LLEN returned {len}, expected {ops}");
    }

    let start = Instant::now();
    let items = conn.lrange(&key, 0, -1)?;
    report("LRANGE (full)", 1, start.elapsed());
    if items.len() != ops {
        bail!("LRANGE returned {} items, expected {ops}", items.len());
    }

    conn.del(&key)?;
    Ok(())
}

fn bench_set_scan(conn: &mut Connection, ops: usize) -> Result<()> {
    let key = format!("{KEY_PREFIX}:set");
    conn.del(&key)?;

    let start = Instant::now();
    for idx in 0..ops {
        conn.sadd(&key, &[idx.to_string().as_str()])?;
    }
    report("SADD", ops, start.elapsed());

    let start = Instant::now();
    let mut seen = std::collections::HashSet::with_capacity(ops);
    for member in conn.sscan_iter(&key, "", 100) {
        seen.insert(member?);
    }
    report("SSCAN (drain)", seen.len(), start.elapsed());
    if seen.len() != ops {
        bail!("SSCAN covered {} members, expected {ops}", seen.len());
    }

    conn.del(&key)?;
    Ok(())
}
