//! Host-side reference for checking device sorts.
//!
//! Each `batch_size` slice is stably sorted by the bit-window value of its
//! keys, the same contract the block sort promises.

use crate::radix::{BitWindow, RadixKey, SortOrder};

/// Stable per-batch sort of `keys` (and `values` alongside, if given).
pub fn stable_sort_reference<K: RadixKey, V: Copy>(
    keys: &mut [K],
    mut values: Option<&mut [V]>,
    batch_size: usize,
    window: BitWindow,
    order: SortOrder,
) {
    assert!(batch_size > 0);
    if let Some(values) = values.as_deref() {
        assert_eq!(values.len(), keys.len());
    }

    for (batch, start) in (0..keys.len()).step_by(batch_size).enumerate() {
        let end = (start + batch_size).min(keys.len());
        let mut index: Vec<usize> = (start..end).collect();
        // sort_by_key is stable.
        match order {
            SortOrder::Ascending => {
                index.sort_by_key(|&i| window.window_value(keys[i].to_radix_bits()))
            }
            SortOrder::Descending => index.sort_by_key(|&i| {
                std::cmp::Reverse(window.window_value(keys[i].to_radix_bits()))
            }),
        }

        let sorted_keys: Vec<K> = index.iter().map(|&i| keys[i]).collect();
        keys[start..end].copy_from_slice(&sorted_keys);
        if let Some(values) = values.as_deref_mut() {
            let sorted_values: Vec<V> = index.iter().map(|&i| values[i]).collect();
            values[start..end].copy_from_slice(&sorted_values);
        }
        log::trace!("reference sorted batch {}", batch);
    }
}

/// True if every adjacent pair of each batch is in order under `window`.
pub fn is_sorted_by_window<K: RadixKey>(
    keys: &[K],
    batch_size: usize,
    window: BitWindow,
    order: SortOrder,
) -> bool {
    keys.chunks(batch_size).all(|batch| {
        batch.windows(2).all(|pair| {
            let a = window.window_value(pair[0].to_radix_bits());
            let b = window.window_value(pair[1].to_radix_bits());
            match order {
                SortOrder::Ascending => a <= b,
                SortOrder::Descending => a >= b,
            }
        })
    })
}
