//! Work partitioning and the summing itself

use std::time::Duration;

/// Split `numbers` into `n` contiguous chunks, preserving order.
///
/// Every chunk but the last holds `len / n` elements; the last one takes the
/// remainder. With fewer numbers than nodes the leading chunks are empty.
/// Returns no chunks for `n == 0`.
pub fn partition(numbers: &[i64], n: usize) -> Vec<Vec<i64>> {
    if n == 0 {
        return Vec::new();
    }

    let split = numbers.len() / n;
    (0..n)
        .map(|i| {
            let start = i * split;
            let end = if i == n - 1 { numbers.len() } else { start + split };
            numbers[start..end].to_vec()
        })
        .collect()
}

/// Sum of a chunk. Wraps on overflow so every party computes the same value.
pub fn chunk_sum(numbers: &[i64]) -> i64 {
    numbers.iter().fold(0i64, |acc, n| acc.wrapping_add(*n))
}

/// Sum of a chunk, sleeping `delay` per element to simulate work
pub async fn sum_with_delay(numbers: &[i64], delay: Duration) -> i64 {
    let mut sum = 0i64;
    for n in numbers {
        sum = sum.wrapping_add(*n);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
    sum
}

/// Simulated work for `elements` numbers at `delay` each
pub fn work_time(elements: usize, delay: Duration) -> Duration {
    delay.saturating_mul(u32::try_from(elements).unwrap_or(u32::MAX))
}
