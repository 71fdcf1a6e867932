//! Partitioning of an identifier list into batches.

/// The number of identifiers in each batch when `len` identifiers are
/// spread over `capacity` parallel slots. Never less than one.
pub fn batch_size(len: usize, capacity: usize) -> usize {
    len.checked_div(capacity).unwrap_or(0).max(1)
}

/// Split `items` into contiguous batches of [batch_size] items.
/// The last batch may be shorter. Empty input yields no batches.
pub fn plan_batches<T: Clone>(items: &[T], capacity: usize) -> Vec<Vec<T>> {
    items
        .chunks(batch_size(items.len(), capacity))
        .map(<[T]>::to_vec)
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn batch_size_clamps() {
        assert_eq!(1, batch_size(0, 4));
        assert_eq!(1, batch_size(3, 4));
        assert_eq!(1, batch_size(3, 0));
        assert_eq!(2, batch_size(4, 2));
        assert_eq!(3, batch_size(7, 2));
        assert_eq!(10, batch_size(10, 1));
    }

    #[test]
    fn empty_yields_no_batches() {
        let none: Vec<u32> = Vec::new();
        assert!(plan_batches(&none, 8).is_empty());
        assert!(plan_batches(&none, 0).is_empty());
    }

    #[test]
    fn example_split() {
        let ids = ["bafy1", "bafy2", "invalid-cid", "bafy3"];
        assert_eq!(
            vec![vec!["bafy1", "bafy2"], vec!["invalid-cid", "bafy3"]],
            plan_batches(&ids, 2),
        );
    }

    #[test]
    fn zero_capacity_batches_of_one() {
        let ids = [1, 2, 3];
        assert_eq!(vec![vec![1], vec![2], vec![3]], plan_batches(&ids, 0));
    }

    #[test]
    fn partitions_exactly() {
        for len in 1..64_usize {
            let items = (0..len).collect::<Vec<_>>();
            for capacity in 0..20 {
                let batches = plan_batches(&items, capacity);
                let size = batch_size(len, capacity);

                assert_eq!(len.div_ceil(size), batches.len());
                assert!(batches.iter().all(|b| !b.is_empty()));
                assert!(batches.iter().all(|b| b.len() <= size));
                assert_eq!(items, batches.concat());
            }
        }
    }
}
