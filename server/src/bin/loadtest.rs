//! Load test for the tag server.
//!
//! Spawns multiple fake WebSocket clients that:
//! - Connect to the server and wait for their own snapshot
//! - Periodically send random turn/thrust input
//! - Count the snapshots, tag changes and disconnect notices they receive
//!
//! Usage: cargo run --bin loadtest -- [OPTIONS]

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tag_shared::protocol::PlayerMessage;
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Parser, Debug)]
#[command(about = "Drive many fake clients against a tag server")]
struct Args {
    /// Number of clients to spawn
    #[arg(long, default_value_t = 100)]
    clients: u32,
    /// Test duration in seconds
    #[arg(long, default_value_t = 30)]
    duration: u64,
    /// Inputs per second per client
    #[arg(long, default_value_t = 10.0)]
    input_rate: f64,
    /// Server URL
    #[arg(long, default_value = "ws://127.0.0.1:80/")]
    url: String,
}

// === Metrics ===

#[derive(Default)]
struct Metrics {
    connected: AtomicU64,
    messages_received: AtomicU64,
    tag_updates_received: AtomicU64,
    disconnects_received: AtomicU64,
    inputs_sent: AtomicU64,
    errors: AtomicU64,
    latency_sum_ms: AtomicU64,
    latency_count: AtomicU64,
}

// === Client task ===

async fn run_client(
    client_id: u32,
    url: String,
    input_rate: f64,
    duration: Duration,
    metrics: Arc<Metrics>,
) {
    let connect_start = Instant::now();

    let (mut ws, _) = match connect_async(&url).await {
        Ok(conn) => conn,
        Err(e) => {
            if client_id < 5 {
                eprintln!("Client {} failed to connect: {}", client_id, e);
            }
            metrics.errors.fetch_add(1, Ordering::Relaxed);
            return;
        }
    };

    // Wait for our own snapshot before doing anything else
    let own = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(msg) = ws.next().await {
            if let Ok(Message::Text(text)) = msg {
                metrics.messages_received.fetch_add(1, Ordering::Relaxed);
                if let Ok(snapshot) = serde_json::from_str::<PlayerMessage>(&text) {
                    if snapshot.is_new {
                        return Some(snapshot);
                    }
                }
            }
        }
        None
    })
    .await;

    let mut own = match own {
        Ok(Some(snapshot)) => snapshot,
        _ => {
            if client_id < 3 {
                eprintln!("Client {} never received its own snapshot", client_id);
            }
            metrics.errors.fetch_add(1, Ordering::Relaxed);
            return;
        }
    };

    let connect_latency = connect_start.elapsed();
    metrics
        .latency_sum_ms
        .fetch_add(connect_latency.as_millis() as u64, Ordering::Relaxed);
    metrics.latency_count.fetch_add(1, Ordering::Relaxed);
    metrics.connected.fetch_add(1, Ordering::Relaxed);

    let input_interval = if input_rate > 0.0 {
        Duration::from_secs_f64(1.0 / input_rate)
    } else {
        Duration::from_secs(3600) // Effectively never
    };
    let mut input_timer = tokio::time::interval(input_interval);
    input_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut rng = ChaCha8Rng::seed_from_u64(client_id as u64);
    let test_end = Instant::now() + duration;

    loop {
        if Instant::now() >= test_end {
            break;
        }

        tokio::select! {
            _ = input_timer.tick() => {
                own.turn = rng.gen_range(-1..=1);
                own.thrust = rng.gen_bool(0.6);
                own.is_new = false;
                let json = serde_json::to_string(&own).unwrap_or_default();
                if ws.send(Message::Text(json.into())).await.is_ok() {
                    metrics.inputs_sent.fetch_add(1, Ordering::Relaxed);
                } else {
                    metrics.errors.fetch_add(1, Ordering::Relaxed);
                    break;
                }
            }

            msg = ws.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        metrics.messages_received.fetch_add(1, Ordering::Relaxed);
                        if let Ok(snapshot) = serde_json::from_str::<PlayerMessage>(&text) {
                            if snapshot.has_disconnected {
                                metrics.disconnects_received.fetch_add(1, Ordering::Relaxed);
                            } else if snapshot.is_tag {
                                metrics.tag_updates_received.fetch_add(1, Ordering::Relaxed);
                            }
                            if snapshot.id == own.id {
                                own.x = snapshot.x;
                                own.y = snapshot.y;
                                own.angle = snapshot.angle;
                                own.velocity_x = snapshot.velocity_x;
                                own.velocity_y = snapshot.velocity_y;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        if client_id < 3 {
                            eprintln!("Client {} error: {}", client_id, e);
                        }
                        metrics.errors.fetch_add(1, Ordering::Relaxed);
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    let _ = ws.close(None).await;
    metrics.connected.fetch_sub(1, Ordering::Relaxed);
}

// === Main ===

#[tokio::main]
async fn main() {
    let args = Args::parse();

    println!("=== Tag Server Load Test ===");
    println!("Clients: {}", args.clients);
    println!("Duration: {}s", args.duration);
    println!("Input rate: {}/s per client", args.input_rate);
    println!("URL: {}", args.url);
    println!();

    let metrics = Arc::new(Metrics::default());
    let duration = Duration::from_secs(args.duration);
    let input_rate = args.input_rate;

    let mut handles = Vec::with_capacity(args.clients as usize);
    let spawn_start = Instant::now();

    for client_id in 0..args.clients {
        let url = args.url.clone();
        let metrics = Arc::clone(&metrics);

        handles.push(tokio::spawn(async move {
            run_client(client_id, url, input_rate, duration, metrics).await;
        }));

        // Stagger spawns slightly to avoid thundering herd
        if client_id % 50 == 49 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    println!("All clients spawned in {:?}", spawn_start.elapsed());
    println!();

    // Print stats periodically
    let metrics_clone = Arc::clone(&metrics);
    let duration_secs = args.duration;
    let stats_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        let start = Instant::now();

        loop {
            interval.tick().await;
            let elapsed = start.elapsed().as_secs();
            if elapsed >= duration_secs + 5 {
                break;
            }

            println!(
                "[{:3}s] connected={}, msgs={}, tag_updates={}, disconnects={}, inputs={}, errors={}",
                elapsed,
                metrics_clone.connected.load(Ordering::Relaxed),
                metrics_clone.messages_received.load(Ordering::Relaxed),
                metrics_clone.tag_updates_received.load(Ordering::Relaxed),
                metrics_clone.disconnects_received.load(Ordering::Relaxed),
                metrics_clone.inputs_sent.load(Ordering::Relaxed),
                metrics_clone.errors.load(Ordering::Relaxed),
            );
        }
    });

    for handle in handles {
        let _ = handle.await;
    }

    stats_handle.abort();

    // Final stats
    println!();
    println!("=== Final Results ===");
    let msgs = metrics.messages_received.load(Ordering::Relaxed);
    let inputs = metrics.inputs_sent.load(Ordering::Relaxed);
    let latency_sum = metrics.latency_sum_ms.load(Ordering::Relaxed);
    let latency_count = metrics.latency_count.load(Ordering::Relaxed);

    println!("Total messages received: {}", msgs);
    println!(
        "Total tag updates: {}",
        metrics.tag_updates_received.load(Ordering::Relaxed)
    );
    println!(
        "Total disconnect notices: {}",
        metrics.disconnects_received.load(Ordering::Relaxed)
    );
    println!("Total inputs sent: {}", inputs);
    println!("Total errors: {}", metrics.errors.load(Ordering::Relaxed));

    if latency_count > 0 {
        println!("Average join latency: {}ms", latency_sum / latency_count);
    }

    if args.duration > 0 {
        println!();
        println!(
            "Messages/sec (total): {:.0}",
            msgs as f64 / args.duration as f64
        );
        // Every input fans out to every other client
        let expected = inputs as f64 * (args.clients.saturating_sub(1)) as f64;
        if expected > 0.0 {
            println!(
                "Fan-out delivery: {:.1}%",
                msgs as f64 / expected * 100.0
            );
        }
    }
}
