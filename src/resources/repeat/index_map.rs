//! Index map - How a collection changed, position by position.

use crate::error::LifecycleError;

/// Marks a position holding an item that did not exist before.
pub const INSERTED: isize = -2;

/// For each position of the new collection, the index the item had in the
/// old collection, or [`INSERTED`]. Old indices that no longer appear are
/// listed as deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexMap {
    indices: Vec<isize>,
    deleted: Vec<usize>,
}

impl IndexMap {
    /// Every item stays where it was.
    pub fn identity(len: usize) -> Self {
        Self {
            indices: (0..len as isize).collect(),
            deleted: Vec::new(),
        }
    }

    pub fn from_parts(indices: Vec<isize>, mut deleted: Vec<usize>) -> Self {
        deleted.sort_unstable();
        deleted.dedup();
        Self { indices, deleted }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<isize> {
        self.indices.get(position).copied()
    }

    pub fn indices(&self) -> &[isize] {
        &self.indices
    }

    /// Old indices that were removed, ascending.
    pub fn deleted_indices(&self) -> &[usize] {
        &self.deleted
    }

    /// True when nothing moved, nothing was inserted and nothing deleted.
    pub fn is_identity(&self) -> bool {
        self.deleted.is_empty()
            && self
                .indices
                .iter()
                .enumerate()
                .all(|(position, &old)| old == position as isize)
    }

    /// Record `delete_count` removals at `start` followed by `insert_count`
    /// insertions there. `start` and `delete_count` are clamped.
    pub fn splice(&mut self, start: usize, delete_count: usize, insert_count: usize) {
        let start = start.min(self.indices.len());
        let end = start.saturating_add(delete_count).min(self.indices.len());
        let removed: Vec<isize> = self
            .indices
            .splice(start..end, std::iter::repeat_n(INSERTED, insert_count))
            .collect();
        self.deleted
            .extend(removed.into_iter().filter(|&old| old >= 0).map(|old| old as usize));
        self.deleted.sort_unstable();
    }

    pub fn reverse(&mut self) {
        self.indices.reverse();
    }

    /// Check the map describes a change from a collection of `old_len`
    /// items: every old index is kept at one position or deleted, exactly
    /// once.
    pub fn validate(&self, old_len: usize) -> Result<(), LifecycleError> {
        let mut seen = vec![false; old_len];
        let kept = self.indices.iter().copied().filter(|&old| old != INSERTED);
        let deleted = self.deleted.iter().map(|&old| old as isize);
        for old in kept.chain(deleted) {
            let index = usize::try_from(old)
                .ok()
                .filter(|&index| index < old_len)
                .ok_or(LifecycleError::IndexOutOfRange { index: old, len: old_len })?;
            if std::mem::replace(&mut seen[index], true) {
                return Err(LifecycleError::UnbalancedIndexMap { index });
            }
        }
        match seen.iter().position(|&accounted| !accounted) {
            Some(index) => Err(LifecycleError::UnbalancedIndexMap { index }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let map = IndexMap::identity(3);
        assert_eq!(map.indices(), &[0, 1, 2]);
        assert!(map.is_identity());
    }

    #[test]
    fn test_splice_removal_records_deleted() {
        let mut map = IndexMap::identity(3);
        map.splice(1, 1, 0);
        assert_eq!(map.indices(), &[0, 2]);
        assert_eq!(map.deleted_indices(), &[1]);
        assert!(!map.is_identity());
    }

    #[test]
    fn test_splice_insert_marks_positions() {
        let mut map = IndexMap::identity(2);
        map.splice(1, 0, 2);
        assert_eq!(map.indices(), &[0, INSERTED, INSERTED, 1]);
        assert!(map.deleted_indices().is_empty());
    }

    #[test]
    fn test_replacing_an_insert_is_not_a_deletion() {
        let mut map = IndexMap::identity(1);
        map.splice(1, 0, 1);
        map.splice(1, 1, 0);
        assert_eq!(map.indices(), &[0]);
        assert!(map.deleted_indices().is_empty());
    }

    #[test]
    fn test_splice_clamps_out_of_range() {
        let mut map = IndexMap::identity(2);
        map.splice(5, 3, 1);
        assert_eq!(map.indices(), &[0, 1, INSERTED]);
    }

    #[test]
    fn test_validate_accepts_spliced_maps() {
        let mut map = IndexMap::identity(4);
        map.splice(1, 2, 3);
        map.reverse();
        assert_eq!(map.validate(4), Ok(()));
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let map = IndexMap::from_parts(vec![0, 5], vec![1]);
        assert_eq!(
            map.validate(2),
            Err(LifecycleError::IndexOutOfRange { index: 5, len: 2 })
        );
        let map = IndexMap::from_parts(vec![0, -1], vec![1]);
        assert_eq!(
            map.validate(2),
            Err(LifecycleError::IndexOutOfRange { index: -1, len: 2 })
        );
    }

    #[test]
    fn test_validate_rejects_unaccounted_index() {
        let map = IndexMap::from_parts(vec![0, 2], vec![]);
        assert_eq!(map.validate(3), Err(LifecycleError::UnbalancedIndexMap { index: 1 }));
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let map = IndexMap::from_parts(vec![0, 0], vec![1]);
        assert_eq!(map.validate(2), Err(LifecycleError::UnbalancedIndexMap { index: 0 }));
        let map = IndexMap::from_parts(vec![0, 1], vec![1]);
        assert_eq!(map.validate(2), Err(LifecycleError::UnbalancedIndexMap { index: 1 }));
    }

    #[test]
    fn test_reverse() {
        let mut map = IndexMap::identity(3);
        map.reverse();
        assert_eq!(map.indices(), &[2, 1, 0]);
    }
}
