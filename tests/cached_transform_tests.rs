use std::fmt::Debug;
use std::ops::Add;

use approx::assert_relative_eq;
use bytemuck::Pod;
use futures::executor::block_on;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use blocksort::{
    transform, Buffer, CachedReadIterator, Device, DeviceLimits, Queue, TransformConfig,
};

const SIZE: usize = 1024;

fn device() -> Device {
    Device::with_limits(DeviceLimits {
        max_block_size: 256,
        resident_blocks: 2,
    })
    .unwrap()
}

/// Values in [1, 200) so `+ 5` stays in range for every element type.
fn random_input<T: From<u8>>(seed: u64) -> Vec<T> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..SIZE).map(|_| T::from(rng.gen_range(1u8..200))).collect()
}

fn plus_five<T>(x: T) -> T
where
    T: Add<Output = T> + From<u8>,
{
    x + T::from(5)
}

fn check_cached<T>(seed: u64)
where
    T: Pod + Send + Sync + PartialEq + Debug + Add<Output = T> + From<u8>,
{
    let input: Vec<T> = random_input(seed);
    let mut output = vec![T::zeroed(); SIZE];

    let mut cached = CachedReadIterator::<T>::new();
    cached.bind(&input, SIZE * std::mem::size_of::<T>());
    let report = transform(
        &device(),
        &TransformConfig::default(),
        &cached,
        &mut output,
        SIZE,
        plus_five::<T>,
    )
    .unwrap();
    cached.unbind();

    assert_eq!(report.blocks, 1);
    for (i, (&got, &x)) in output.iter().zip(&input).enumerate() {
        assert_eq!(got, plus_five(x), "mismatch at index {}", i);
    }
}

#[test]
fn cached_transform_i32() {
    check_cached::<i32>(1);
}

#[test]
fn cached_transform_u32() {
    check_cached::<u32>(2);
}

#[test]
fn cached_transform_u8() {
    check_cached::<u8>(3);
}

#[test]
fn cached_transform_f32() {
    let input: Vec<f32> = random_input(4);
    let mut output = vec![0.0f32; SIZE];
    let mut cached = CachedReadIterator::<f32>::new();
    cached.bind(&input, SIZE * 4);
    transform(
        &device(),
        &TransformConfig::default(),
        &cached,
        &mut output,
        SIZE,
        |x: f32| x + 5.0,
    )
    .unwrap();
    for (&got, &x) in output.iter().zip(&input) {
        assert_relative_eq!(got, x + 5.0, max_relative = 0.1);
    }
}

#[test]
fn cached_transform_through_offset_iterator() {
    let input: Vec<u32> = (0..64).collect();
    let mut output = vec![0u32; 32];
    let mut cached = CachedReadIterator::<u32>::new();
    cached.bind(&input, 64 * 4);
    let shifted = cached.offset(32);
    transform(
        &device(),
        &TransformConfig {
            block_size: 8,
            items_per_thread: 2,
        },
        &shifted,
        &mut output,
        32,
        |x: u32| x * 10,
    )
    .unwrap();
    assert_eq!(output, (32..64).map(|x| x * 10).collect::<Vec<u32>>());
}

#[test]
fn cached_transform_on_queue() {
    let queue = Queue::new(device()).unwrap();
    let input: Vec<i32> = random_input(5);
    let source = Buffer::create_buffer_from_data(&input, Some("input".to_string()));
    let destination = Buffer::<i32>::create_buffer(SIZE, Some("output".to_string()));

    let report = block_on(queue.transform(
        TransformConfig {
            block_size: 128,
            items_per_thread: 3,
        },
        &source,
        &destination,
        SIZE,
        |x: i32| x + 5,
    ))
    .unwrap();
    assert_eq!(report.blocks, 3);

    let output = block_on(destination.to_vec(&queue)).unwrap();
    assert!(output.iter().zip(&input).all(|(&got, &x)| got == x + 5));
}

#[test]
fn queue_transform_rejects_count_past_input() {
    let queue = Queue::new(device()).unwrap();
    let source = Buffer::create_buffer_from_data(&[1u32, 2, 3], None);
    let destination = Buffer::<u32>::create_buffer(8, None);
    let result = block_on(queue.transform(
        TransformConfig::default(),
        &source,
        &destination,
        8,
        |x: u32| x,
    ));
    assert!(matches!(
        result,
        Err(blocksort::Error::OutOfBounds { what: "input", count: 8, len: 3 })
    ));
}
