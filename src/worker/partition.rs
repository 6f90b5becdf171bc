//! Splitting a board's pins into shards for parallel fetch

use thiserror::Error;

use crate::job::ImageRef;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PartitionError {
    #[error("cannot split {len} pins into {count} shards")]
    ShardCountOutOfRange { count: usize, len: usize },
}

/// Preferred shard size; larger boards get larger shards so the task count stays bounded
pub fn target_shard_size(pin_count: usize) -> usize {
    if pin_count > 10_000 {
        100
    } else if pin_count > 5_000 {
        50
    } else {
        20
    }
}

pub fn shard_count(pin_count: usize) -> usize {
    let target = target_shard_size(pin_count);
    if pin_count > target {
        pin_count / target
    } else {
        1
    }
}

/// Split `items` into `count` contiguous shards of `len / count` items; the last
/// shard takes the remainder.
pub fn split<T: Clone>(items: &[T], count: usize) -> Result<Vec<Vec<T>>, PartitionError> {
    let len = items.len();
    if count == 0 || count > len {
        return Err(PartitionError::ShardCountOutOfRange { count, len });
    }

    let size = len / count;
    let shards = (0..count)
        .map(|i| {
            let start = i * size;
            let end = if i + 1 == count { len } else { start + size };
            items[start..end].to_vec()
        })
        .collect();

    Ok(shards)
}

/// Truncate to `max_pin_count`, then split by [`shard_count`]
pub fn partition(
    pins: &[ImageRef],
    max_pin_count: usize,
) -> Result<Vec<Vec<ImageRef>>, PartitionError> {
    let kept = &pins[..pins.len().min(max_pin_count)];
    split(kept, shard_count(kept.len()))
}
