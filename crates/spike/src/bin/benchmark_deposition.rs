use grid_density_core::{Device, GridConfig, GridManager, RayonContext, SerialContext};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use std::sync::Arc;
use std::time::Instant;

fn create_devices(count: usize, config: &GridConfig, seed: u64) -> Vec<Device> {
    let mut rng = ChaCha12Rng::seed_from_u64(seed);
    let [w, h] = config.dimensions;
    (0..count)
        .map(|i| {
            let pos = [rng.random::<f64>() * w, rng.random::<f64>() * h];
            let accuracy = 20.0 + rng.random::<f64>() * 10.0;
            Device::new(i.to_string(), pos, accuracy)
        })
        .collect()
}

fn main() {
    let num_devices = 2_000_000;
    let config = GridConfig::new([250.0, 250.0], [512, 512]);
    println!(
        "Benchmarking deposition of {} devices on a {}x{} grid",
        num_devices, config.n_cells[0], config.n_cells[1]
    );

    let devices = create_devices(num_devices, &config, 42);
    let mut serial = GridManager::new(Arc::new(SerialContext::default()), config.clone());
    let parallel_ctx = RayonContext::global();
    println!("Rayon threads: {}", parallel_ctx.num_threads());
    let mut parallel = GridManager::new(Arc::new(parallel_ctx), config);

    let steps = 5;

    let start = Instant::now();
    for _ in 0..steps {
        serial.update(&devices).unwrap();
    }
    let duration_serial = start.elapsed();
    println!("Time for {} updates (serial): {:?}", steps, duration_serial);
    println!("Avg time per update (serial): {:?}", duration_serial / steps as u32);

    let start = Instant::now();
    let mut last = None;
    for _ in 0..steps {
        last = Some(parallel.update(&devices).unwrap());
    }
    let duration_parallel = start.elapsed();
    println!("Time for {} updates (rayon): {:?}", steps, duration_parallel);
    println!("Avg time per update (rayon): {:?}", duration_parallel / steps as u32);
    if let Some(timings) = last {
        println!("Last rayon update breakdown: {:?}", timings);
    }

    let speedup = duration_serial.as_secs_f64() / duration_parallel.as_secs_f64().max(1e-9);
    println!("Speedup: {:.2}x", speedup);

    let identical = serial.occupation_matrix() == parallel.occupation_matrix()
        && serial.density_matrix() == parallel.density_matrix();
    println!("Matrices bit-identical: {}", identical);
    assert!(identical, "serial and rayon deposition diverged");
    println!(
        "Total mass: {} (devices: {})",
        parallel.occupation_matrix().sum(),
        parallel.device_count()
    );
}
