use log::{error, info};
use rand::prelude::*;

use blocksort::reference::{is_sorted_by_window, stable_sort_reference};
use blocksort::{Buffer, Device, Queue, SortConfig, TransformConfig};

static BLOCK_SIZE: u32 = 256;
static ITEMS_PER_THREAD: u32 = 4;
static BLOCK_COUNT: usize = 64;
static TRANSFORM_SIZE: usize = 1 << 16;

async fn run() -> blocksort::Result<()> {
    let device = Device::new()?;
    info!("device limits: {:?}", device.limits());

    let config = SortConfig::new(BLOCK_SIZE, ITEMS_PER_THREAD);
    if !device.supports_block_size(config.block_size) {
        error!(
            "block size {} is not supported (maximum {})",
            config.block_size,
            device.max_block_size()
        );
        return Ok(());
    }

    let queue = Queue::new(device)?;
    let mut rng = thread_rng();
    let size = config.batch_size() * BLOCK_COUNT;

    let keys: Vec<u32> = (0..size).map(|_| rng.gen()).collect();
    let values: Vec<u32> = (0..size as u32).collect();

    let key_buffer = Buffer::create_buffer_from_data(&keys, Some("keys".to_string()));
    let value_buffer = Buffer::create_buffer_from_data(&values, Some("values".to_string()));

    let report = queue
        .sort_pairs(config, &key_buffer, &value_buffer)
        .await?;
    info!(
        "sorted {} pairs in {} blocks ({:?})",
        size, report.blocks, report.elapsed
    );

    let sorted_keys = key_buffer.to_vec(&queue).await?;
    let sorted_values = value_buffer.to_vec(&queue).await?;

    let window = config.validate::<u32>()?;
    let mut expected_keys = keys;
    let mut expected_values = values;
    stable_sort_reference(
        &mut expected_keys,
        Some(&mut expected_values[..]),
        config.batch_size(),
        window,
        config.order,
    );
    let ok = is_sorted_by_window(&sorted_keys, config.batch_size(), window, config.order)
        && sorted_keys == expected_keys
        && sorted_values == expected_values;
    if ok {
        info!("block sort matches the host reference");
    } else {
        error!("block sort differs from the host reference");
    }

    // Cached-read transform over the sorted keys.
    let output = Buffer::<u32>::create_buffer(TRANSFORM_SIZE.min(size), Some("plus_five".to_string()));
    let report = queue
        .transform(
            TransformConfig::default(),
            &key_buffer,
            &output,
            output.len(),
            |x: u32| x.wrapping_add(5),
        )
        .await?;
    let transformed = output.to_vec(&queue).await?;
    let matches = transformed
        .iter()
        .zip(&sorted_keys)
        .all(|(&t, &k)| t == k.wrapping_add(5));
    info!(
        "transformed {} elements in {} blocks ({:?}), correct: {}",
        transformed.len(),
        report.blocks,
        report.elapsed,
        matches
    );

    Ok(())
}

fn main() {
    env_logger::init();
    if let Err(e) = futures::executor::block_on(run()) {
        error!("{}", e);
        std::process::exit(1);
    }
}
