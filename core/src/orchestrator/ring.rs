//! Fixed-size round-robin dispatch ring

/// Circular buffer of entries with a cursor
///
/// Every call to [`RoundRobinRing::advance`] returns the entry under the cursor
/// and advances it, so over any window of `len()` consecutive calls each
/// entry is returned exactly once. The ring never grows or shrinks after
/// construction.
#[derive(Debug)]
pub struct RoundRobinRing<T> {
    entries: Box<[T]>,
    cursor: usize,
}

impl<T> RoundRobinRing<T> {
    /// Build a ring; returns `None` for an empty input
    pub fn new(entries: Vec<T>) -> Option<Self> {
        if entries.is_empty() {
            return None;
        }
        Some(Self {
            entries: entries.into_boxed_slice(),
            cursor: 0,
        })
    }

    /// Take the entry under the cursor and advance
    ///
    /// Returns the entry's index together with the entry.
    pub fn advance(&mut self) -> (usize, &mut T) {
        let idx = self.cursor;
        self.cursor = (self.cursor + 1) % self.entries.len();
        (idx, &mut self.entries[idx])
    }

    /// Entry by index
    pub fn get_mut(&mut self, idx: usize) -> Option<&mut T> {
        self.entries.get_mut(idx)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; an empty ring cannot be built
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all entries in index order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    /// Consume the ring, returning entries in index order
    pub fn into_vec(self) -> Vec<T> {
        self.entries.into_vec()
    }
}
