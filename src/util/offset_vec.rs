use std::fmt::{Debug, Error, Formatter};
use std::iter::{DoubleEndedIterator, Enumerate, Extend, FromIterator};
use std::slice::Iter;
use std::vec::IntoIter as VecIntoIter;

/// Elements with a width (eg. when used in an `OffsetVec`)
pub trait Width {
    fn width(&self) -> usize;
}

/// A vector of elements of different logical "widths", where offsets into the vector are given in
/// terms of the sum of the widths of the previous elements (as opposed to the number of preceding
/// elements).
///
/// The JVM operand stack is the motivating use: `long` and `double` occupy two slots, and the
/// verifier's max-stack bound is expressed in slots, not in values. Keeping the accumulated width
/// alongside the entries means the current stack height is always available in constant time and
/// is never recomputed by walking the entries.
#[derive(Clone)]
pub struct OffsetVec<T: Sized> {
    /// Entries, along with their offset
    entries: Vec<(Offset, T)>,

    /// Offset of the next element to be added
    offset_len: Offset,
}

/// Offset into an `OffsetVec`
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Offset(pub usize);

impl<T: Sized + Width> OffsetVec<T> {
    /// New empty offset vector
    pub fn new() -> OffsetVec<T> {
        OffsetVec {
            entries: vec![],
            offset_len: Offset(0),
        }
    }

    /// Length of the `OffsetVec` (aka. number of entries)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Is the `OffsetVec` empty?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current offset size of the `OffsetVec` (aka. offset of the next element
    /// to be added)
    pub fn offset_len(&self) -> Offset {
        self.offset_len
    }

    /// Add an entry to the back
    pub fn push(&mut self, slot: T) -> Offset {
        let offset = self.offset_len;
        self.offset_len.0 += slot.width();
        self.entries.push((offset, slot));

        offset
    }

    /// Remove an entry from the back
    pub fn pop(&mut self) -> Option<(Offset, usize, T)> {
        self.entries.pop().map(|(off, elem)| {
            self.offset_len = off;
            (off, self.entries.len(), elem)
        })
    }

    /// Empty the vector
    pub fn clear(&mut self) {
        self.entries.clear();
        self.offset_len = Offset(0);
    }

    /// Get an entry (and its offset) by its position in the vector
    pub fn get_index(&self, index: usize) -> Option<(Offset, &T)> {
        self.entries.get(index).map(|(offset, t)| (*offset, t))
    }

    /// Get the last entry (and its offset)
    pub fn last(&self) -> Option<(Offset, &T)> {
        self.entries.last().map(|(offset, t)| (*offset, t))
    }

    /// Get the entry `n` positions down from the back (`n = 0` is the last entry)
    pub fn get_from_end(&self, n: usize) -> Option<&T> {
        self.len()
            .checked_sub(n + 1)
            .and_then(|index| self.entries.get(index))
            .map(|(_, t)| t)
    }

    /// Mutably visit every entry
    ///
    /// Entries must keep their width: offsets of later entries are not adjusted.
    pub fn for_each_mut(&mut self, mut visit: impl FnMut(&mut T)) {
        for (_, entry) in &mut self.entries {
            let width_before = entry.width();
            visit(entry);
            debug_assert_eq!(width_before, entry.width());
        }
    }

    pub fn iter(&self) -> OffsetVecIter<'_, T> {
        self.into_iter()
    }
}

impl<A: PartialEq> PartialEq for OffsetVec<A> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<A: Eq> Eq for OffsetVec<A> {}

impl<A: Width> Default for OffsetVec<A> {
    fn default() -> Self {
        OffsetVec::new()
    }
}

impl<A: Debug> Debug for OffsetVec<A> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        f.debug_list()
            .entries(self.entries.iter().map(|(_, entry)| entry))
            .finish()
    }
}

/// Iterator for owned `OffsetVec`
pub struct OffsetVecIntoIter<T>(Enumerate<VecIntoIter<(Offset, T)>>);

impl<T> Iterator for OffsetVecIntoIter<T> {
    type Item = (Offset, usize, T);

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(idx, (off, elem))| (off, idx, elem))
    }
}

impl<T> DoubleEndedIterator for OffsetVecIntoIter<T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.0
            .next_back()
            .map(|(idx, (off, elem))| (off, idx, elem))
    }
}

impl<T> IntoIterator for OffsetVec<T> {
    type Item = (Offset, usize, T);
    type IntoIter = OffsetVecIntoIter<T>;

    fn into_iter(self) -> OffsetVecIntoIter<T> {
        OffsetVecIntoIter(self.entries.into_iter().enumerate())
    }
}

/// Iterator for borrowed `OffsetVec`
pub struct OffsetVecIter<'a, T>(Enumerate<Iter<'a, (Offset, T)>>);

impl<'a, T> Iterator for OffsetVecIter<'a, T> {
    type Item = (Offset, usize, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(idx, (off, elem))| (*off, idx, elem))
    }
}

impl<'a, T> DoubleEndedIterator for OffsetVecIter<'a, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.0
            .next_back()
            .map(|(idx, (off, elem))| (*off, idx, elem))
    }
}

impl<'a, T> IntoIterator for &'a OffsetVec<T> {
    type Item = (Offset, usize, &'a T);
    type IntoIter = OffsetVecIter<'a, T>;

    fn into_iter(self) -> OffsetVecIter<'a, T> {
        OffsetVecIter(self.entries.iter().enumerate())
    }
}

impl<T: Width> FromIterator<T> for OffsetVec<T> {
    fn from_iter<A: IntoIterator<Item = T>>(elems: A) -> Self {
        let mut offset_vec = OffsetVec::new();
        for elem in elems {
            offset_vec.push(elem);
        }
        offset_vec
    }
}

impl<T: Width> Extend<T> for OffsetVec<T> {
    fn extend<U: IntoIterator<Item = T>>(&mut self, iter: U) {
        for elem in iter {
            self.push(elem);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    enum Slot {
        Narrow,
        Wide,
    }

    impl Width for Slot {
        fn width(&self) -> usize {
            match self {
                Slot::Narrow => 1,
                Slot::Wide => 2,
            }
        }
    }

    #[test]
    fn offsets_accumulate_widths() {
        let mut vec: OffsetVec<Slot> = OffsetVec::new();
        assert_eq!(vec.push(Slot::Narrow), Offset(0));
        assert_eq!(vec.push(Slot::Wide), Offset(1));
        assert_eq!(vec.push(Slot::Narrow), Offset(3));
        assert_eq!(vec.offset_len(), Offset(4));
        assert_eq!(vec.len(), 3);
    }

    #[test]
    fn pop_restores_offset_len() {
        let mut vec: OffsetVec<Slot> = OffsetVec::new();
        vec.push(Slot::Wide);
        vec.push(Slot::Narrow);
        assert_eq!(vec.pop(), Some((Offset(2), 1, Slot::Narrow)));
        assert_eq!(vec.offset_len(), Offset(2));
        assert_eq!(vec.pop(), Some((Offset(0), 0, Slot::Wide)));
        assert_eq!(vec.offset_len(), Offset(0));
        assert_eq!(vec.pop(), None);
    }

    #[test]
    fn end_relative_lookup() {
        let vec: OffsetVec<Slot> = vec![Slot::Narrow, Slot::Wide, Slot::Narrow]
            .into_iter()
            .collect();
        assert_eq!(vec.get_from_end(0), Some(&Slot::Narrow));
        assert_eq!(vec.get_from_end(1), Some(&Slot::Wide));
        assert_eq!(vec.get_from_end(2), Some(&Slot::Narrow));
        assert_eq!(vec.get_from_end(3), None);
    }
}
