use super::{Index, Set, SetCore, SetValue, INVALID_INDEX};

/// Borrowing in-order iterator over a [`Set`].
pub struct InOrderIter<'a, T: SetValue> {
    core: &'a SetCore<T>,
    index: Index,
}

impl<'a, T: SetValue> InOrderIter<'a, T> {
    pub(super) fn new(core: &'a SetCore<T>) -> Self {
        Self {
            index: core.first_in_order(),
            core,
        }
    }
}

impl<'a, T: SetValue> Iterator for InOrderIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.index == INVALID_INDEX {
            return None;
        }
        let value = self.core.value_at(self.index);
        self.index = self.core.next_in_order(self.index);
        Some(value)
    }
}

impl<'a, T: SetValue> IntoIterator for &'a Set<T> {
    type Item = &'a T;
    type IntoIter = InOrderIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A detached position in a [`Set`].
///
/// A cursor keeps the value it points at; when the set's storage shifts
/// underneath it (a resize, or a copy-on-write clone) the cursor re-resolves
/// its slot by value on the next access. It therefore stays valid across
/// any sequence of operations that leaves its value in the set.
#[derive(Clone, Debug)]
pub struct Cursor<T: SetValue> {
    value: T,
    index: Index,
    generation: u64,
}

impl<T: SetValue> Cursor<T> {
    pub(super) fn new(value: T, index: Index, generation: u64) -> Self {
        Self {
            value,
            index,
            generation,
        }
    }

    /// The value this cursor last pointed at.
    pub fn value(&self) -> &T {
        &self.value
    }
}

impl<T: SetValue> Set<T> {
    fn resolve_index(&self, cursor: &mut Cursor<T>) -> Option<Index> {
        let core = self.core();

        let stale = cursor.generation != core.generation()
            || !core.occupied_at(cursor.index)
            || core.value_at(cursor.index) != &cursor.value;
        if stale {
            cursor.index = core.locate(&cursor.value);
            cursor.generation = core.generation();
        }

        (cursor.index != INVALID_INDEX).then_some(cursor.index)
    }

    /// Re-anchor `cursor` and return the value it points at, or `None` if
    /// the value has left the set.
    pub fn resolve<'a>(&'a self, cursor: &mut Cursor<T>) -> Option<&'a T> {
        self.resolve_index(cursor).map(|index| self.core().value_at(index))
    }

    /// Move `cursor` to its in-order successor. Returns false (leaving the
    /// cursor in place) at the end of the set or if the cursor's value is
    /// gone.
    pub fn advance(&self, cursor: &mut Cursor<T>) -> bool {
        let Some(index) = self.resolve_index(cursor) else {
            return false;
        };

        let next = self.core().next_in_order(index);
        if next == INVALID_INDEX {
            return false;
        }

        cursor.value = self.core().value_at(next).clone();
        cursor.index = next;
        true
    }
}
