use std::fmt::Debug;

use bytemuck::Pod;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serial_test::serial;

use blocksort::reference::stable_sort_reference;
use blocksort::{
    sort_keys, sort_pairs, BitWindow, BlockRadixSort, BlockRadixSortStorage, Device, DeviceLimits,
    LaunchDims, RadixKey, SortConfig, SortOrder,
};

/// Blocks per launch in the grid tests.
const BLOCKS: usize = 6;

trait Random: Copy {
    fn random(rng: &mut StdRng) -> Self;
}

macro_rules! impl_random_int {
    ($($t:ty),*) => {
        $(
        impl Random for $t {
            fn random(rng: &mut StdRng) -> Self {
                rng.gen()
            }
        }
        )*
    }
}

impl_random_int! {u8, u16, u32, u64, i8, i16, i32, i64}

impl Random for f32 {
    fn random(rng: &mut StdRng) -> Self {
        rng.gen_range(-1000.0..1000.0)
    }
}

impl Random for f64 {
    fn random(rng: &mut StdRng) -> Self {
        rng.gen_range(-1000.0..1000.0)
    }
}

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn device() -> Device {
    Device::with_limits(DeviceLimits {
        max_block_size: 1024,
        resident_blocks: 2,
    })
    .unwrap()
}

fn random_vec<T: Random>(rng: &mut StdRng, len: usize) -> Vec<T> {
    (0..len).map(|_| T::random(rng)).collect()
}

fn config(block_size: u32, items_per_thread: u32, descending: bool, window: Option<(u32, u32)>) -> SortConfig {
    let mut config = SortConfig::new(block_size, items_per_thread);
    if descending {
        config = config.descending();
    }
    if let Some((start, end)) = window {
        config = config.with_bit_window(start, end);
    }
    config
}

/// Sorts keys alone and keys with values, comparing both against the host
/// reference.
fn check<K, V>(block_size: u32, items_per_thread: u32, descending: bool, window: Option<(u32, u32)>)
where
    K: RadixKey + Random + PartialEq + Debug,
    V: Pod + Random + PartialEq + Debug + Send + Sync,
{
    init();
    let device = device();
    // Given block size not supported
    if !device.supports_block_size(block_size) {
        return;
    }

    let config = config(block_size, items_per_thread, descending, window);
    let bit_window = config.validate::<K>().unwrap();
    let size = config.batch_size() * BLOCKS;
    let mut rng = StdRng::seed_from_u64(block_size as u64 * 31 + items_per_thread as u64);

    // Keys only.
    let mut keys: Vec<K> = random_vec(&mut rng, size);
    let mut expected = keys.clone();
    stable_sort_reference(
        &mut expected,
        None::<&mut [u8]>,
        config.batch_size(),
        bit_window,
        config.order,
    );
    let report = sort_keys(&device, &config, &mut keys).unwrap();
    assert_eq!(report.blocks as usize, BLOCKS);
    for (i, (got, want)) in keys.iter().zip(&expected).enumerate() {
        assert_eq!(got, want, "key mismatch at index {}", i);
    }

    // Keys and values.
    let mut keys: Vec<K> = random_vec(&mut rng, size);
    let mut values: Vec<V> = random_vec(&mut rng, size);
    let mut expected_keys = keys.clone();
    let mut expected_values = values.clone();
    stable_sort_reference(
        &mut expected_keys,
        Some(&mut expected_values[..]),
        config.batch_size(),
        bit_window,
        config.order,
    );
    sort_pairs(&device, &config, &mut keys, &mut values).unwrap();
    for i in 0..size {
        assert_eq!(keys[i], expected_keys[i], "key mismatch at index {}", i);
        assert_eq!(values[i], expected_values[i], "value mismatch at index {}", i);
    }
}

// Power of 2 block size

#[test]
#[serial]
fn sort_u32_by_64() {
    check::<u32, i32>(64, 1, false, None);
}

#[test]
#[serial]
fn sort_i32_by_128() {
    check::<i32, i32>(128, 1, false, None);
}

#[test]
#[serial]
fn sort_u32_by_256() {
    check::<u32, i32>(256, 1, false, None);
}

#[test]
#[serial]
fn sort_u16_by_1024_desc() {
    check::<u16, i8>(1024, 1, true, None);
}

// Non-power of 2 block size

#[test]
#[serial]
fn sort_f64_by_65() {
    check::<f64, u32>(65, 1, false, None);
}

#[test]
#[serial]
fn sort_f32_by_37() {
    check::<f32, i32>(37, 1, false, None);
}

#[test]
#[serial]
fn sort_i64_by_510_desc() {
    check::<i64, i8>(510, 1, true, None);
}

#[test]
#[serial]
fn sort_u32_by_162() {
    check::<u32, i64>(162, 1, false, None);
}

#[test]
#[serial]
fn sort_u8_by_255() {
    check::<u8, f32>(255, 1, false, None);
}

// Power of 2 block size, several items per thread

#[test]
#[serial]
fn sort_f32_by_64x2_desc() {
    check::<f32, i8>(64, 2, true, None);
}

#[test]
#[serial]
fn sort_i32_by_128x4() {
    check::<i32, i16>(128, 4, false, None);
}

#[test]
#[serial]
fn sort_u16_by_256x7() {
    check::<u16, i8>(256, 7, false, None);
}

// Non-power of 2 block size, several items per thread

#[test]
#[serial]
fn sort_f64_by_33x5() {
    check::<f64, i32>(33, 5, false, None);
}

#[test]
#[serial]
fn sort_i8_by_464x2() {
    check::<i8, f64>(464, 2, false, None);
}

#[test]
#[serial]
fn sort_u16_by_100x3() {
    check::<u16, i32>(100, 3, false, None);
}

#[test]
#[serial]
fn sort_i16_by_234x9() {
    check::<i16, i32>(234, 9, false, None);
}

// Bit windows

#[test]
#[serial]
fn sort_u64_bits_8_20() {
    check::<u64, i8>(64, 1, false, Some((8, 20)));
}

#[test]
#[serial]
fn sort_u16_bits_4_10_desc() {
    check::<u16, i32>(102, 3, true, Some((4, 10)));
}

#[test]
#[serial]
fn sort_u32_bits_3_12_desc() {
    check::<u32, i16>(162, 2, true, Some((3, 12)));
}

// Scenarios

#[test]
#[serial]
fn equal_keys_keep_input_order_ascending() {
    init();
    let mut keys: Vec<u32> = vec![5, 3, 5, 1];
    keys.extend(100..160);
    let mut values: Vec<u32> = (0..64).collect();
    sort_pairs(&device(), &SortConfig::new(64, 1), &mut keys, &mut values).unwrap();
    assert_eq!(&keys[..4], &[1, 3, 5, 5]);
    assert_eq!(&values[..4], &[3, 1, 0, 2]);
    assert_eq!(keys[4..], (100..160).collect::<Vec<u32>>()[..]);
}

#[test]
#[serial]
fn equal_keys_keep_input_order_descending() {
    init();
    let mut keys: Vec<u32> = vec![5, 3, 5, 1];
    keys.extend(std::iter::repeat(0).take(60));
    let mut values: Vec<u32> = (0..64).collect();
    let config = SortConfig::new(64, 1).descending();
    sort_pairs(&device(), &config, &mut keys, &mut values).unwrap();
    assert_eq!(&keys[..4], &[5, 5, 3, 1]);
    assert_eq!(&values[..4], &[0, 2, 1, 3]);
    assert_eq!(values[4..], (4..64).collect::<Vec<u32>>()[..]);
}

#[test]
#[serial]
fn keys_differing_outside_window_compare_equal() {
    init();
    // Same bits 4..10, different bits 0..4 and bit 12.
    let first: u16 = 0b0001_0011_0101_0111;
    let second: u16 = 0b0000_0011_0101_1000;
    let mut keys = vec![first, second, 0xffff, 0x0000];
    let mut values = vec![0u8, 1, 2, 3];
    let config = SortConfig::new(4, 1).with_bit_window(4, 10);
    sort_pairs(&device(), &config, &mut keys, &mut values).unwrap();
    let first_pos = values.iter().position(|&v| v == 0).unwrap();
    let second_pos = values.iter().position(|&v| v == 1).unwrap();
    assert_eq!(second_pos, first_pos + 1);
    assert_eq!(keys[0], 0x0000);
    assert_eq!(keys[3], 0xffff);
}

#[test]
#[serial]
fn sorting_sorted_batch_is_identity() {
    init();
    let device = device();
    let config = SortConfig::new(48, 3).descending();
    let mut rng = StdRng::seed_from_u64(7);
    let mut keys: Vec<i32> = random_vec(&mut rng, config.batch_size() * 2);
    sort_keys(&device, &config, &mut keys).unwrap();
    let once = keys.clone();
    sort_keys(&device, &config, &mut keys).unwrap();
    assert_eq!(keys, once);
}

#[test]
#[serial]
fn unsupported_block_size_is_reported() {
    init();
    let device = Device::with_limits(DeviceLimits {
        max_block_size: 128,
        resident_blocks: 1,
    })
    .unwrap();
    let mut keys = vec![0u32; 256];
    let result = sort_keys(&device, &SortConfig::new(256, 1), &mut keys);
    assert!(matches!(
        result,
        Err(blocksort::Error::UnsupportedBlockSize { requested: 256, max: 128 })
    ));
}

/// Drives `BlockRadixSort` from a hand-written kernel, the way a device
/// program would: every unit calls the same method on its own items.
#[test]
#[serial]
fn unit_level_api_sorts_in_kernel() {
    init();
    let device = device();
    let dims = LaunchDims::new(40, 2);
    let mut rng = StdRng::seed_from_u64(11);
    let mut keys: Vec<u32> = random_vec(&mut rng, dims.batch_size() * 3);
    let mut values: Vec<u32> = (0..keys.len() as u32).collect();
    let mut expected_keys = keys.clone();
    let mut expected_values = values.clone();
    stable_sort_reference(
        &mut expected_keys,
        Some(&mut expected_values[..]),
        dims.batch_size(),
        BitWindow::new(3, 17),
        SortOrder::Descending,
    );

    device
        .launch(
            dims,
            (&mut keys[..], &mut values[..]),
            |_| BlockRadixSortStorage::<u32, u32>::with_values(40, 2, 4),
            |unit, (keys, values): (&mut [u32], &mut [u32]), storage: &BlockRadixSortStorage<u32, u32>| {
                assert_eq!(storage.batch_size(), 80);
                BlockRadixSort::new(storage).sort_pairs_desc_bits(unit, keys, values, 3, 17);
            },
        )
        .unwrap();

    assert_eq!(keys, expected_keys);
    assert_eq!(values, expected_values);

    let mut plain: Vec<u8> = random_vec(&mut rng, dims.batch_size());
    let mut expected = plain.clone();
    expected.sort_unstable();
    device
        .launch(
            dims,
            &mut plain[..],
            |_| BlockRadixSortStorage::<u8>::keys_only(40, 2, 2),
            |unit, keys: &mut [u8], storage: &BlockRadixSortStorage<u8>| {
                BlockRadixSort::new(storage).sort(unit, keys)
            },
        )
        .unwrap();
    assert_eq!(plain, expected);
}
