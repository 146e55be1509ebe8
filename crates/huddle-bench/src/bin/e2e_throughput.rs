//! End-to-end relay throughput benchmark for Huddle.
//!
//! Joins N members to one room on a running server, then has every member
//! send continuously while counting what the relay delivers.
//!
//! ```bash
//! e2e_throughput [members] [server]
//! ```

use huddle_client::{ControlClient, RelaySocket};
use huddle_protocol::ControlResponse;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Barrier;

const DEFAULT_SERVER: &str = "127.0.0.1:9001";
const ROOM: &str = "benchmark";
const PASSWORD: &str = "benchmark";
const WARMUP_SECS: u64 = 2;
const BENCH_SECS: u64 = 10;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args: Vec<String> = std::env::args().collect();
    let members: usize = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(8);
    let server: SocketAddr = args
        .get(2)
        .map(String::as_str)
        .unwrap_or(DEFAULT_SERVER)
        .parse()?;

    println!("Huddle end-to-end relay throughput");
    println!("  server: {server}, members: {members}");
    println!("  warmup: {WARMUP_SECS}s, measurement: {BENCH_SECS}s");
    println!();

    let control = ControlClient::new(server);
    match control.create(ROOM, PASSWORD, "bench").await? {
        ControlResponse::Error(e) => println!("  create: {e} (reusing room)"),
        _ => println!("  create: ok"),
    }

    let received = Arc::new(AtomicU64::new(0));
    let sent = Arc::new(AtomicU64::new(0));
    let barrier = Arc::new(Barrier::new(members + 1));

    let mut handles = Vec::with_capacity(members * 2);
    for member in 0..members {
        let token = match control.join(ROOM, PASSWORD, &format!("bench-{member}")).await? {
            ControlResponse::Joined(token) => token,
            other => return Err(format!("join failed: {other}").into()),
        };

        let relay = Arc::new(RelaySocket::bind(server, ROOM, token).await?);
        // The first datagram binds the member's address.
        relay.send(b"").await?;

        let recv_relay = Arc::clone(&relay);
        let recv_count = Arc::clone(&received);
        handles.push(tokio::spawn(async move {
            while recv_relay.recv().await.is_ok() {
                recv_count.fetch_add(1, Ordering::Relaxed);
            }
        }));

        let send_count = Arc::clone(&sent);
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            let payload = format!("bench-{member}: {}", "x".repeat(48));
            barrier.wait().await;
            while relay.send(payload.as_bytes()).await.is_ok() {
                send_count.fetch_add(1, Ordering::Relaxed);
                tokio::task::yield_now().await;
            }
        }));
    }

    barrier.wait().await;
    println!("  all {members} members bound");

    tokio::time::sleep(Duration::from_secs(WARMUP_SECS)).await;
    received.store(0, Ordering::SeqCst);
    sent.store(0, Ordering::SeqCst);
    let start = Instant::now();

    tokio::time::sleep(Duration::from_secs(BENCH_SECS)).await;

    let elapsed = start.elapsed().as_secs_f64();
    let total_sent = sent.load(Ordering::SeqCst);
    let total_received = received.load(Ordering::SeqCst);
    let expected = total_sent * (members as u64).saturating_sub(1);

    println!();
    println!(
        "  sent:       {:>12} datagrams ({:.0}/s)",
        total_sent,
        total_sent as f64 / elapsed
    );
    println!(
        "  delivered:  {:>12} datagrams ({:.0}/s)",
        total_received,
        total_received as f64 / elapsed
    );
    if expected > 0 {
        println!(
            "  delivery:   {:>11.1}% of {} expected",
            total_received as f64 * 100.0 / expected as f64,
            expected
        );
    }

    for handle in handles {
        handle.abort();
    }
    Ok(())
}
