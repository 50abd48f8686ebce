//! Splitting work lists between workers
//!
//! Chunks are contiguous and order-preserving; their concatenation is always
//! the input list, last element included.

/// Split `items` into at most `worker_count` contiguous chunks
///
/// Every chunk holds `ceil(len / worker_count)` items except the last, which
/// takes the remainder. With more workers than items each item gets its own
/// chunk. A zero worker count is treated as one.
pub fn partition<T: Clone>(items: &[T], worker_count: usize) -> Vec<Vec<T>> {
    if items.is_empty() {
        return Vec::new();
    }

    let workers = worker_count.max(1);
    let chunk_size = items.len().div_ceil(workers);

    items.chunks(chunk_size).map(<[T]>::to_vec).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concatenation_equals_input_for_all_shapes() {
        for len in 1..=40usize {
            let items: Vec<usize> = (0..len).collect();
            for workers in 1..=12usize {
                let chunks = partition(&items, workers);
                assert!(chunks.len() <= workers, "len={len} workers={workers}");
                assert!(chunks.iter().all(|c| !c.is_empty()));

                let joined: Vec<usize> = chunks.concat();
                assert_eq!(joined, items, "len={len} workers={workers}");
            }
        }
    }

    #[test]
    fn last_item_is_never_dropped() {
        let items: Vec<u32> = (1..=10).collect();
        let chunks = partition(&items, 5);
        assert_eq!(chunks.len(), 5);
        assert_eq!(chunks.last().unwrap(), &vec![9, 10]);

        let chunks = partition(&items, 3);
        assert_eq!(chunks, vec![vec![1, 2, 3, 4], vec![5, 6, 7, 8], vec![9, 10]]);
    }

    #[test]
    fn more_workers_than_items_gives_singletons() {
        let chunks = partition(&["a", "b", "c"], 8);
        assert_eq!(chunks, vec![vec!["a"], vec!["b"], vec!["c"]]);
    }

    #[test]
    fn empty_input_and_zero_workers() {
        assert!(partition::<u8>(&[], 4).is_empty());
        assert_eq!(partition(&[1, 2], 0), vec![vec![1, 2]]);
    }
}
