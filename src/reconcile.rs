//! Visible-vs-total reconciliation
//!
//! The registry's listing calls hide soft-deleted entities unless asked to
//! include them. Listing twice and diffing the answers recovers which
//! entities are live and which are soft-deleted.

use std::collections::BTreeSet;

/// Live and soft-deleted members of one listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition<T: Ord> {
    pub live: BTreeSet<T>,
    pub deleted: BTreeSet<T>,
}

impl<T: Ord> Partition<T> {
    /// Every member, live first
    pub fn iter(&self) -> impl Iterator<Item = (&T, bool)> {
        self.live
            .iter()
            .map(|item| (item, false))
            .chain(self.deleted.iter().map(|item| (item, true)))
    }

    pub fn len(&self) -> usize {
        self.live.len() + self.deleted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty() && self.deleted.is_empty()
    }
}

/// Split `all` (the include-deleted listing) against `visible` (the default
/// listing). Everything visible is live; whatever only `all` reports is
/// soft-deleted. Input order does not matter.
pub fn reconcile<T, A, V>(all: A, visible: V) -> Partition<T>
where
    T: Ord,
    A: IntoIterator<Item = T>,
    V: IntoIterator<Item = T>,
{
    let live: BTreeSet<T> = visible.into_iter().collect();
    let deleted = all.into_iter().filter(|item| !live.contains(item)).collect();
    Partition { live, deleted }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_hidden_subjects_are_deleted() {
        let partition = reconcile(vec!["A", "B", "C"], vec!["C"]);
        assert_eq!(partition.live, BTreeSet::from(["C"]));
        assert_eq!(partition.deleted, BTreeSet::from(["A", "B"]));
    }

    #[test]
    fn test_listing_order_is_irrelevant() {
        let forward = reconcile(vec![1, 2, 3, 4], vec![4, 2]);
        let reversed = reconcile(vec![4, 3, 2, 1], vec![2, 4]);
        assert_eq!(forward, reversed);
        assert_eq!(forward.deleted, BTreeSet::from([1, 3]));
    }

    #[test]
    fn test_iter_yields_live_then_deleted() {
        let partition = reconcile(vec![1, 2, 3], vec![2]);
        let items: Vec<_> = partition.iter().map(|(v, deleted)| (*v, deleted)).collect();
        assert_eq!(items, vec![(2, false), (1, true), (3, true)]);
        assert_eq!(partition.len(), 3);
    }

    #[test]
    fn test_empty_listings() {
        let partition = reconcile(Vec::<i32>::new(), Vec::new());
        assert!(partition.is_empty());
    }

    proptest! {
        #[test]
        fn prop_partition_is_disjoint_and_covers(all in prop::collection::btree_set(0u8..50, 0..30),
                                                 hidden in prop::collection::btree_set(0u8..50, 0..30)) {
            let visible: BTreeSet<u8> = all.difference(&hidden).copied().collect();
            let partition = reconcile(all.clone(), visible.clone());

            prop_assert!(partition.live.is_disjoint(&partition.deleted));
            prop_assert_eq!(&partition.live, &visible);
            let expected_deleted: BTreeSet<u8> = all.intersection(&hidden).copied().collect();
            prop_assert_eq!(partition.deleted, expected_deleted);
        }
    }
}
