//! Stress test - many handles, one producer thread each
//!
//! Every handle gets a data listener and an event listener. One producer
//! thread per handle pushes data and line changes as fast as it can while a
//! churn thread keeps registering and unregistering an extra listener.
//!
//! Usage: stress [handles] [messages-per-handle]

use portloop_core::{
    log_warn, DataListener, EventListener, Handle, LineEvent, LineMask, PortResult,
};
use portloop_runtime::{LaneStats, LooperConfig, PortManager};
use portloop_sim::SimNative;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Default)]
struct Counter {
    bytes: AtomicU64,
    messages: AtomicU64,
    events: AtomicU64,
}

impl DataListener for Counter {
    fn on_data(&self, data: &[u8]) {
        self.bytes.fetch_add(data.len() as u64, Ordering::Relaxed);
        self.messages.fetch_add(1, Ordering::Relaxed);
    }

    fn on_data_error(&self, _code: i32) {}
}

impl EventListener for Counter {
    fn on_event(&self, _event: LineEvent) {
        self.events.fetch_add(1, Ordering::Relaxed);
    }
}

fn arg(n: usize, default: usize) -> usize {
    std::env::args()
        .nth(n)
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn run() -> PortResult<()> {
    let num_handles = arg(1, 16);
    let per_handle = arg(2, 100_000);

    println!("Handles: {}, messages per handle: {}", num_handles, per_handle);

    let config = LooperConfig::from_env();
    println!("Queue capacity: {}\n", config.queue_capacity);
    let manager = Arc::new(PortManager::build(config, SimNative::new)?);
    let counter = Arc::new(Counter::default());

    let handles: Vec<Handle> = (1..=num_handles as u64).map(Handle::new).collect();
    for &h in &handles {
        manager.native().open(h, LineMask::NONE);
        manager.attach(h, format!("sim://stress{}", h))?;
        manager.set_up_data_listener(h, counter.clone())?;
        manager.set_up_event_listener(h, counter.clone())?;
    }

    // Churn: an extra listener on a spare handle, registered and removed in a loop.
    let spare = Handle::new(0);
    manager.native().open(spare, LineMask::NONE);
    manager.attach(spare, "sim://churn")?;
    let stop = Arc::new(AtomicBool::new(false));
    let churn = {
        let manager = Arc::clone(&manager);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut cycles = 0u64;
            while !stop.load(Ordering::Relaxed) {
                let l: Arc<dyn DataListener> = Arc::new(Counter::default());
                let result = manager
                    .set_up_data_listener(spare, l.clone())
                    .and_then(|()| manager.destroy_data_listener(spare, &l));
                if let Err(e) = result {
                    log_warn!("churn cycle failed: {}", e);
                }
                cycles += 1;
            }
            cycles
        })
    };

    let start = Instant::now();
    let producers: Vec<_> = handles
        .iter()
        .map(|&h| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                let payload = [0xA5u8; 32];
                for i in 0..per_handle {
                    manager.native().inject_data(h, &payload);
                    if i % 64 == 0 {
                        let lines = LineMask::from_bits_truncate((i / 64) as u32);
                        manager.native().set_lines(h, lines);
                    }
                }
            })
        })
        .collect();
    for p in producers {
        let _ = p.join();
    }
    let push_time = start.elapsed();

    // Let the delivery threads drain.
    let total_pushed = (num_handles * per_handle) as u64;
    let drain_start = Instant::now();
    loop {
        let pending: usize = handles
            .iter()
            .filter_map(|&h| manager.looper(h).ok().flatten())
            .filter_map(|l| l.data_stats())
            .map(|s| s.pending)
            .sum();
        if pending == 0 || drain_start.elapsed() > Duration::from_secs(30) {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    let total_time = start.elapsed();

    stop.store(true, Ordering::Relaxed);
    let cycles = churn.join().unwrap_or(0);

    let mut totals = LaneStats::default();
    for &h in &handles {
        if let Some(stats) = manager.looper(h)?.and_then(|l| l.data_stats()) {
            totals.delivered += stats.delivered;
            totals.evicted += stats.evicted;
            totals.pending += stats.pending;
        }
    }

    println!("=== Results ===");
    println!("Pushed:          {}", total_pushed);
    println!("Delivered:       {}", counter.messages.load(Ordering::Relaxed));
    println!("Evicted:         {}", totals.evicted);
    println!("Still pending:   {}", totals.pending);
    println!("Line events:     {}", counter.events.load(Ordering::Relaxed));
    println!("Bytes:           {}", counter.bytes.load(Ordering::Relaxed));
    println!("Churn cycles:    {}", cycles);
    println!("Push time:       {:?}", push_time);
    println!("Total time:      {:?}", total_time);
    println!(
        "Push rate:       {:.0} msgs/sec",
        total_pushed as f64 / push_time.as_secs_f64()
    );

    let data: Arc<dyn DataListener> = counter.clone();
    let events: Arc<dyn EventListener> = counter.clone();
    for &h in &handles {
        manager.destroy_event_listener(h, &events)?;
        manager.destroy_data_listener(h, &data)?;
        manager.detach(h)?;
    }
    manager.detach(spare)?;
    Ok(())
}

fn main() {
    println!("=== portloop Stress Test ===\n");

    if let Err(e) = run() {
        eprintln!("stress failed: {}", e);
        std::process::exit(1);
    }

    println!("\n=== Stress Test Complete ===");
}
