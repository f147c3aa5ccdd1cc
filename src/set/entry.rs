use super::{Index, INVALID_INDEX};

// The red/black bit shares a word with the parent index, so indexes are
// limited to 31 bits and the invalid sentinel masks down to all-ones.
const RED_FLAG: Index = 1 << (Index::BITS - 1);
const PARENT_MASK: Index = RED_FLAG - 1;

/// One slot of the combined hash table / red-black tree storage.
///
/// A slot doubles as a Robin-Hood hash entry (value plus the maximum probe
/// distance recorded at chain bases) and as a tree node (parent with packed
/// color, left and right child indexes into the same array).
#[derive(Clone, Debug)]
pub(super) struct Slot<T> {
    value: Option<T>,
    distance: Index,
    parent_color: Index,
    left: Index,
    right: Index,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            value: None,
            distance: 0,
            // All-ones: invalid parent, red by default.
            parent_color: INVALID_INDEX,
            left: INVALID_INDEX,
            right: INVALID_INDEX,
        }
    }
}

impl<T> Slot<T> {
    pub fn is_occupied(&self) -> bool {
        self.value.is_some()
    }

    pub fn value(&self) -> &T {
        self.value.as_ref().expect("occupied slot")
    }

    pub fn assign(&mut self, value: T) {
        self.value = Some(value);
    }

    pub fn release(&mut self) -> Option<T> {
        self.value.take()
    }

    pub fn distance(&self) -> Index {
        self.distance
    }

    pub fn set_distance(&mut self, distance: Index) {
        self.distance = distance;
    }

    pub fn is_red(&self) -> bool {
        self.parent_color & RED_FLAG != 0
    }

    pub fn is_black(&self) -> bool {
        !self.is_red()
    }

    pub fn set_red(&mut self, now_red: bool) {
        if now_red {
            self.parent_color |= RED_FLAG;
        } else {
            self.parent_color &= !RED_FLAG;
        }
    }

    pub fn set_black(&mut self) {
        self.set_red(false);
    }

    pub fn parent(&self) -> Index {
        let index = self.parent_color & PARENT_MASK;
        if index == INVALID_INDEX & PARENT_MASK {
            INVALID_INDEX
        } else {
            index
        }
    }

    pub fn set_parent(&mut self, parent: Index) {
        self.parent_color = (self.parent_color & RED_FLAG) | (parent & PARENT_MASK);
    }

    pub fn left(&self) -> Index {
        self.left
    }

    pub fn set_left(&mut self, left: Index) {
        self.left = left;
    }

    pub fn right(&self) -> Index {
        self.right
    }

    pub fn set_right(&mut self, right: Index) {
        self.right = right;
    }

    /// Detach the slot from the tree and restore the default color.
    pub fn clear_links(&mut self) {
        self.set_parent(INVALID_INDEX);
        self.set_red(true);
        self.left = INVALID_INDEX;
        self.right = INVALID_INDEX;
    }
}
