//! Sequential and batched write strategies against in-memory clients.

mod common;

use common::{FailingClient, RecordingClient};
use strata_rpc_benchmarks::runner::run;
use strata_rpc_benchmarks::workload::{batch_write, key, sequential_write};
use strata_rpc_benchmarks::{BenchmarkCase, Partition, StoreError};

const VALUE: &[u8] = b"xxxx";

#[test]
fn keys_are_decimal_indices() {
    assert_eq!(key(0), b"0".to_vec());
    assert_eq!(key(999), b"999".to_vec());
    assert_eq!(key(500_000), b"500000".to_vec());
}

#[test]
fn sequential_case_writes_every_key_once() {
    let mut client = RecordingClient::new();
    let case = BenchmarkCase::new("sequential write", |c: &RecordingClient, p: Partition| {
        sequential_write(c, p, VALUE)?;
        Ok(())
    })
    .concurrency(4)
    .iterations(1000);

    let result = run(case, &mut client).unwrap();

    assert_eq!(result.iterations, 1000);
    assert_eq!(client.sorted_indices(), (0..1000).collect::<Vec<u64>>());
    assert!(client.values().iter().all(|v| v == VALUE));
    assert!(client.batch_sizes().is_empty());
}

#[test]
fn batched_case_writes_every_key_once() {
    let mut client = RecordingClient::new();
    let case = BenchmarkCase::new("batch write", |c: &RecordingClient, p: Partition| {
        batch_write(c, p, VALUE, 100)?;
        Ok(())
    })
    .concurrency(3)
    .iterations(1000);

    run(case, &mut client).unwrap();

    assert_eq!(client.sorted_indices(), (0..1000).collect::<Vec<u64>>());
    // Partitions of 334, 333, 333 -> 4 batches each
    assert_eq!(client.batch_sizes().len(), 12);
    assert_eq!(client.batch_sizes().iter().sum::<usize>(), 1000);
}

#[test]
fn final_partial_batch_is_flushed() {
    let client = RecordingClient::new();

    let flushes = batch_write(&client, Partition::new(0, 250), VALUE, 100).unwrap();

    assert_eq!(flushes, 3);
    assert_eq!(client.batch_sizes(), vec![100, 100, 50]);
    let keys = client.keys();
    // Batch boundaries fall on indices 99, 199 and 249
    assert_eq!(keys[99], b"99".to_vec());
    assert_eq!(keys[199], b"199".to_vec());
    assert_eq!(keys[249], b"249".to_vec());
}

#[test]
fn flush_count_is_ceil_of_len_over_batch() {
    for len in 0..=57u64 {
        for batch in 1..=12usize {
            let client = RecordingClient::new();
            let partition = Partition::new(1_000, 1_000 + len);

            let flushes = batch_write(&client, partition, VALUE, batch).unwrap();

            let expected = len.div_ceil(batch as u64) as usize;
            assert_eq!(flushes, expected, "len={} batch={}", len, batch);
            assert_eq!(client.batch_sizes().len(), expected);
            assert!(client.batch_sizes().iter().all(|&s| s >= 1 && s <= batch));
            let indices = client.sorted_indices();
            assert_eq!(indices, (1_000..1_000 + len).collect::<Vec<u64>>());
        }
    }
}

#[test]
fn batches_do_not_align_to_global_indices() {
    let client = RecordingClient::new();

    batch_write(&client, Partition::new(250, 500), VALUE, 100).unwrap();

    assert_eq!(client.batch_sizes(), vec![100, 100, 50]);
}

#[test]
fn empty_partition_writes_nothing() {
    let client = RecordingClient::new();

    sequential_write(&client, Partition::new(7, 7), VALUE).unwrap();
    let flushes = batch_write(&client, Partition::new(7, 7), VALUE, 10).unwrap();

    assert_eq!(flushes, 0);
    assert!(client.keys().is_empty());
}

#[test]
fn sequential_write_stops_at_first_failure() {
    let client = FailingClient::after(5);

    let err = sequential_write(&client, Partition::new(0, 100), VALUE).unwrap_err();

    assert!(matches!(err, StoreError::Write(_)), "{:?}", err);
    assert_eq!(client.calls(), 6);
}

#[test]
fn batch_write_stops_at_first_failure() {
    let client = FailingClient::after(1);

    let err = batch_write(&client, Partition::new(0, 1000), VALUE, 100).unwrap_err();

    assert!(matches!(err, StoreError::Write(_)), "{:?}", err);
    assert_eq!(client.calls(), 2);
}

#[test]
fn zero_batch_size_behaves_like_one() {
    let client = RecordingClient::new();

    let flushes = batch_write(&client, Partition::new(0, 5), VALUE, 0).unwrap();

    assert_eq!(flushes, 5);
    assert_eq!(client.batch_sizes(), vec![1; 5]);
}
