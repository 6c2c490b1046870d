/// Splits `items` into `min(n, items.len())` contiguous chunks whose sizes
/// differ by at most one. The leading chunks take the remainder.
///
/// `n == 0` is treated as `n == 1`. An empty input yields no chunks.
pub fn split_into_n_chunks<T>(items: &[T], n: usize) -> Vec<&[T]> {
    if items.is_empty() {
        return Vec::new();
    }

    let n = n.clamp(1, items.len());
    let base = items.len() / n;
    let remainder = items.len() % n;

    let mut chunks = Vec::with_capacity(n);
    let mut from = 0;
    for i in 0..n {
        let size = if i < remainder { base + 1 } else { base };
        chunks.push(&items[from..from + size]);
        from += size;
    }
    chunks
}
