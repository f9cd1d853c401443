//! Loopback example
//!
//! Drives one simulated port end to end: data and line listeners, a paused
//! window with overflow, a mask change, then teardown.

use portloop_core::{DataListener, EventListener, Handle, LineEvent, LineMask, PortResult};
use portloop_runtime::{LooperConfig, PortManager};
use portloop_sim::SimNative;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

struct Printer;

impl DataListener for Printer {
    fn on_data(&self, data: &[u8]) {
        println!("[data]  {:?}", String::from_utf8_lossy(data));
    }

    fn on_data_error(&self, code: i32) {
        println!("[error] read failed with code {}", code);
    }
}

impl EventListener for Printer {
    fn on_event(&self, event: LineEvent) {
        println!(
            "[lines] {}  (asserted {}, deasserted {})",
            event,
            event.asserted(),
            event.deasserted()
        );
    }
}

fn settle() {
    thread::sleep(Duration::from_millis(50));
}

fn run() -> PortResult<()> {
    let config = LooperConfig::from_env().queue_capacity(3);
    let manager = PortManager::build(config, SimNative::new)?;
    let sim = manager.native();

    let h = Handle::new(1);
    sim.open(h, LineMask::CTS);
    manager.attach(h, "sim://loopback0")?;
    println!("Attached handle {} (initial lines CTS)\n", h);

    let printer = Arc::new(Printer);
    let data: Arc<dyn DataListener> = printer.clone();
    let events: Arc<dyn EventListener> = printer.clone();
    manager.set_up_data_listener(h, data.clone())?;
    manager.set_up_event_listener(h, events.clone())?;

    println!("--- Normal delivery ---");
    sim.inject_data(h, b"hello");
    sim.inject_read_error(h, 5);
    sim.set_lines(h, LineMask::CTS | LineMask::DSR);
    sim.set_lines(h, LineMask::DSR);
    settle();

    println!("\n--- Paused: pushing A,B,C,D into capacity 3 ---");
    manager.pause_events(&events)?;
    for item in [b"A", b"B", b"C", b"D"] {
        sim.inject_data(h, item);
    }
    let produced = sim.set_lines(h, LineMask::RI);
    println!("line change while paused produced an event: {}", produced);
    settle();
    if let Some(stats) = manager.looper(h)?.and_then(|l| l.data_stats()) {
        println!("pending {}, evicted {}", stats.pending, stats.evicted);
    }
    manager.resume_events(&events)?;
    settle();

    println!("\n--- Mask narrowed to DCD ---");
    manager.set_event_mask(&events, LineMask::DCD)?;
    println!("mask is now {}", manager.event_mask(&events)?);
    sim.set_lines(h, LineMask::DCD | LineMask::CTS);
    sim.set_lines(h, LineMask::CTS);
    settle();

    println!("\n--- Teardown ---");
    manager.destroy_event_listener(h, &events)?;
    manager.destroy_data_listener(h, &data)?;
    println!("looper present: {}", manager.looper(h)?.is_some());
    manager.detach(h)?;
    sim.close(h);
    Ok(())
}

fn main() {
    println!("=== portloop Loopback Example ===\n");

    if let Err(e) = run() {
        eprintln!("loopback failed: {}", e);
        std::process::exit(1);
    }

    println!("\n=== Example Complete ===");
}
