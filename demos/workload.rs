//! Drive a private heap with a random workload and dump what it looks like
//! afterwards.
//!
//! ```sh
//! RUST_LOG=debug WILDERNESS_CONFIG=config.json cargo run --example workload -- 2000 heap.json
//! ```

use std::{env, fs, ptr::NonNull};

use log::{info, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};
use wilderness::{Config, Heap, ReservedBreak};

fn load_config() -> Config {
    let Ok(path) = env::var("WILDERNESS_CONFIG") else {
        return Config::default();
    };
    match fs::read_to_string(&path).map(|text| serde_json::from_str(&text)) {
        Ok(Ok(config)) => config,
        Ok(Err(e)) => {
            warn!("{path} is not a valid config ({e}), using defaults");
            Config::default()
        }
        Err(e) => {
            warn!("cannot read {path} ({e}), using defaults");
            Config::default()
        }
    }
}

fn request(rng: &mut StdRng) -> usize {
    match rng.gen_range(0..100) {
        0..=79 => rng.gen_range(1..512),
        80..=97 => rng.gen_range(512..16 * 1024),
        _ => rng.gen_range(128 * 1024..512 * 1024),
    }
}

fn main() {
    env_logger::init();
    let mut args = env::args().skip(1);
    let steps: usize = args.next().and_then(|n| n.parse().ok()).unwrap_or(1000);
    let out = args.next();

    let config = load_config();
    info!("running {steps} steps with {config:?}");
    let mut heap = Heap::with_config(ReservedBreak::new(256 << 20).unwrap(), config);
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut live: Vec<NonNull<u8>> = Vec::new();

    for step in 0..steps {
        let roll = rng.gen_range(0..10);
        if live.is_empty() || roll < 5 {
            match heap.allocate(request(&mut rng)) {
                Ok(ptr) => live.push(ptr),
                Err(e) => warn!("step {step}: allocate failed: {e}"),
            }
        } else if roll < 8 {
            let ptr = live.swap_remove(rng.gen_range(0..live.len()));
            unsafe { heap.release(ptr.as_ptr()) };
        } else {
            let i = rng.gen_range(0..live.len());
            match unsafe { heap.reallocate(live[i].as_ptr(), request(&mut rng)) } {
                Ok(ptr) => live[i] = ptr,
                Err(e) => warn!("step {step}: reallocate failed: {e}"),
            }
        }
    }

    if let Err(e) = heap.verify() {
        panic!("heap is inconsistent: {e}");
    }
    let snapshot = heap.snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot.stats).unwrap());
    info!(
        "{} break blocks covering {} bytes, {} mapped",
        snapshot.blocks.len(),
        snapshot.break_footprint(),
        snapshot.mapped.len()
    );
    if let Some(out) = out {
        snapshot.write_to_file(&out).unwrap();
        info!("snapshot written to {out}");
    }
}
