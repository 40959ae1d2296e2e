use std::time::Instant;

use bytemuck::{Pod, Zeroable};
use disk_sorted::{Result, SortConfig};
use log::{debug, error, info};
use rand::{rngs::SmallRng, Rng, SeedableRng};

#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C)]
struct Entry {
    key: i32,
    payload: [u8; 12],
}

fn main() -> Result<()> {
    env_logger::init();

    let mut rng = SmallRng::from_entropy();
    let size = 5_000_000;
    let chunk_size = 500_000;

    let source = (0..size).map(|_| Entry {
        key: rng.gen(),
        payload: rng.gen(),
    });
    debug!(
        "Total size: {} MiB",
        size * std::mem::size_of::<Entry>() / 1024 / 1024
    );

    let t = Instant::now();
    let config = SortConfig::new()
        .chunk_size(chunk_size)
        .serializer(disk_sorted::Pod);
    let sorted = disk_sorted::sort_by_key(source, |entry: &Entry| entry.key, config)?;

    let mut prev_key = None;
    let mut count = 0;
    for res in sorted {
        match res {
            Ok(entry) => {
                // validate if sorted
                count += 1;
                if let Some(p) = prev_key {
                    assert!(p <= entry.key);
                }
                prev_key = Some(entry.key);
            }
            Err(e) => {
                error!("{:?}", e);
                break;
            }
        }
    }
    assert!(count == size, "count: {} != size: {}", count, size);
    info!("Sorted {} records in {:?}", count, t.elapsed());

    Ok(())
}
