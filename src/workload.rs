//! Write strategies compared by the RPC suite.
//!
//! Both strategies write every index of their partition exactly once, using
//! the decimal representation of the index as key, and stop at the first
//! failed request.

use crate::error::StoreError;
use crate::partition::Partition;
use crate::store::StoreClient;

/// Key written for iteration `i`.
#[inline]
pub fn key(i: u64) -> Vec<u8> {
    i.to_string().into_bytes()
}

/// One write request per index.
pub fn sequential_write<S>(client: &S, partition: Partition, value: &[u8]) -> Result<(), StoreError>
where
    S: StoreClient + ?Sized,
{
    for i in partition.range() {
        client.write(&key(i), value)?;
    }
    Ok(())
}

/// Buffer writes and flush them as one batch request every `batch_size`
/// entries. The trailing partial batch is flushed at the partition's last
/// index. Returns the number of batch requests issued, which is
/// `ceil(len / batch_size)`.
pub fn batch_write<S>(
    client: &S,
    partition: Partition,
    value: &[u8],
    batch_size: usize,
) -> Result<usize, StoreError>
where
    S: StoreClient + ?Sized,
{
    let batch_size = batch_size.max(1);
    let mut keys = Vec::with_capacity(batch_size);
    let mut values = Vec::with_capacity(batch_size);
    let mut flushes = 0;

    for i in partition.range() {
        keys.push(key(i));
        values.push(value.to_vec());
        if keys.len() == batch_size || i + 1 == partition.end {
            client.write_batch(&keys, &values)?;
            keys.clear();
            values.clear();
            flushes += 1;
        }
    }
    Ok(flushes)
}
