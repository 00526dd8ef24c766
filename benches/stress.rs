use std::sync::Arc;
use std::time::{Duration, Instant};

use ulid::Ulid;
use venuepulse::config::EngineConfig;
use venuepulse::Engine;

const T0: i64 = 1_700_000_000_000;
const MINUTE: i64 = 60_000;

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.3}ms, p50={:.3}ms, p95={:.3}ms, p99={:.3}ms, max={:.3}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies[latencies.len() - 1].as_secs_f64() * 1000.0,
    );
}

async fn setup(engine: &Engine) -> Vec<Ulid> {
    let capacities = [Some(10), Some(25), Some(50), Some(100), None];
    let mut ids = Vec::new();
    for (n, cap) in capacities.iter().cycle().take(20).enumerate() {
        let id = Ulid::new();
        engine
            .register_activity(id, format!("venue {n}"), *cap, true)
            .await
            .unwrap();
        ids.push(id);
    }
    println!("  registered {} activities", ids.len());
    ids
}

async fn phase1_sequential(engine: &Engine, activity: Ulid) {
    let n = 2000;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();
    for i in 0..n as i64 {
        let t = Instant::now();
        let cid = engine.check_in(activity, 2, T0 + i * MINUTE).await.unwrap();
        engine.check_out(cid, T0 + i * MINUTE + 1).await.unwrap();
        latencies.push(t.elapsed());
    }
    let elapsed = start.elapsed();
    let ops = (2 * n) as f64 / elapsed.as_secs_f64();
    println!("  {n} check-in/out pairs in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("pair latency", &mut latencies);
}

async fn phase2_concurrent(engine: Arc<Engine>, activities: &[Ulid]) {
    let n_tasks = 32;
    let n_per_task = 500;
    let start = Instant::now();
    let mut handles = Vec::new();

    for task in 0..n_tasks {
        let engine = engine.clone();
        let activity = activities[task % activities.len()];
        handles.push(tokio::spawn(async move {
            let mut latencies = Vec::with_capacity(n_per_task);
            for i in 0..n_per_task as i64 {
                let t = Instant::now();
                engine.record_view(activity, T0 + i * MINUTE).await.unwrap();
                latencies.push(t.elapsed());
            }
            latencies
        }));
    }

    let mut all = Vec::new();
    for h in handles {
        all.extend(h.await.unwrap());
    }
    let elapsed = start.elapsed();
    let ops = all.len() as f64 / elapsed.as_secs_f64();
    println!("  {} views from {n_tasks} tasks in {:.2}s = {ops:.0} ops/sec", all.len(), elapsed.as_secs_f64());
    print_latency("view latency", &mut all);
}

async fn phase3_rank(engine: &Engine) {
    let n = 500;
    let mut latencies = Vec::with_capacity(n);
    for _ in 0..n {
        let t = Instant::now();
        let ranked = engine.rank_active(10).await;
        latencies.push(t.elapsed());
        assert!(ranked.len() <= 10);
    }
    print_latency("rank_active(10) latency", &mut latencies);
}

async fn phase4_compact(engine: &Engine) {
    let t = Instant::now();
    engine.compact_wal().await.unwrap();
    println!("  compaction took {:.2}ms", t.elapsed().as_secs_f64() * 1000.0);
}

#[tokio::main]
async fn main() {
    venuepulse::observability::init_tracing();
    let mut config = EngineConfig::from_env();
    config.data_dir = std::env::temp_dir().join(format!("venuepulse_bench_{}", Ulid::new()));
    let engine = Arc::new(Engine::open(&config).expect("open engine"));

    println!("=== venuepulse stress benchmark ===");
    println!("data_dir: {}\n", config.data_dir.display());

    println!("[setup]");
    let activities = setup(&engine).await;

    println!("\n[phase 1] sequential check-in/out on one activity");
    phase1_sequential(&engine, activities[0]).await;

    println!("\n[phase 2] concurrent views across activities");
    phase2_concurrent(engine.clone(), &activities).await;

    println!("\n[phase 3] ranking");
    phase3_rank(&engine).await;

    println!("\n[phase 4] compaction");
    phase4_compact(&engine).await;

    let _ = std::fs::remove_dir_all(&config.data_dir);
}
