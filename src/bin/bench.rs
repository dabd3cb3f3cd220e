//! Pipelined throughput benchmark against a live Redis-compatible server.
//!
//! Keeps up to `--window` requests in flight on one connection and reports
//! throughput plus latency percentiles.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use clap::Parser;
use tokio::sync::Semaphore;

use redpipe::{Client, DEFAULT_PORT};

#[derive(Parser, Debug)]
struct Args {
    /// Server host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Total number of requests to issue
    #[arg(short = 'n', long, default_value_t = 1_000_000)]
    requests: u64,

    /// Maximum requests in flight at once
    #[arg(short, long, default_value_t = 500)]
    window: u32,
}

#[tokio::main]
async fn main() -> redpipe::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let client = Client::connect((args.host.as_str(), args.port)).await?;
    println!(
        "benchmarking {}:{} with {} PINGs, window {}",
        args.host, args.port, args.requests, args.window
    );

    let window = Arc::new(Semaphore::new(args.window as usize));
    let successes = Arc::new(AtomicU64::new(0));
    let errors = Arc::new(AtomicU64::new(0));
    let latencies = Arc::new(Mutex::new(Vec::with_capacity(args.requests as usize)));

    let start = Instant::now();

    for i in 1..=args.requests {
        let permit = window.clone().acquire_owned().await.expect("semaphore open");
        let request_start = Instant::now();
        let response = client.ping();

        let successes = successes.clone();
        let errors = errors.clone();
        let latencies = latencies.clone();
        tokio::spawn(async move {
            match response.await {
                Ok(_) => {
                    successes.fetch_add(1, Ordering::Relaxed);
                    latencies.lock().unwrap().push(request_start.elapsed());
                }
                Err(err) => {
                    eprintln!("request failed: {err}");
                    errors.fetch_add(1, Ordering::Relaxed);
                }
            }
            drop(permit);
        });

        if i % 100_000 == 0 {
            println!("{i} requests sent");
        }
    }

    // All permits back means every response has been accounted for.
    let _drain = window
        .acquire_many(args.window)
        .await
        .expect("semaphore open");

    let elapsed = start.elapsed();
    client.disconnect();

    report(args.requests, elapsed, &successes, &errors, &latencies);
    Ok(())
}

fn report(
    requests: u64,
    elapsed: Duration,
    successes: &AtomicU64,
    errors: &AtomicU64,
    latencies: &Mutex<Vec<Duration>>,
) {
    let mut latencies = latencies.lock().unwrap();
    latencies.sort();

    let rate = requests as f64 / elapsed.as_secs_f64();
    println!("total time: {:.2}s", elapsed.as_secs_f64());
    println!("rate: {rate:.0} requests/sec");
    println!("success: {}", successes.load(Ordering::Relaxed));
    println!("errors: {}", errors.load(Ordering::Relaxed));

    for pct in [50.0, 90.0, 99.0, 99.9] {
        let index = ((latencies.len() as f64 * pct / 100.0) as usize)
            .min(latencies.len().saturating_sub(1));
        if let Some(latency) = latencies.get(index) {
            println!("p{pct} latency: {:.3}ms", latency.as_secs_f64() * 1000.0);
        }
    }
}
