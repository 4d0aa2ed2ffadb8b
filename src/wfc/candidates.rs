use crate::tiles::PrototypeId;

const WORD_BITS: usize = 64;

/// Fixed-capacity bitset of prototype ids.
///
/// Capacity is the catalog size; every set built for the same catalog has the
/// same word count, which the binary operations rely on. Iteration is in
/// ascending id order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateSet {
    words: Vec<u64>,
    capacity: usize,
}

impl CandidateSet {
    pub fn empty(capacity: usize) -> Self {
        Self {
            words: vec![0; capacity.div_ceil(WORD_BITS)],
            capacity,
        }
    }

    pub fn full(capacity: usize) -> Self {
        let mut set = Self::empty(capacity);
        for word in set.words.iter_mut() {
            *word = u64::MAX;
        }
        set.clear_tail();
        set
    }

    pub fn from_ids(capacity: usize, ids: impl IntoIterator<Item = PrototypeId>) -> Self {
        let mut set = Self::empty(capacity);
        for id in ids {
            set.insert(id);
        }
        set
    }

    pub fn single(capacity: usize, id: PrototypeId) -> Self {
        Self::from_ids(capacity, [id])
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Ids outside the capacity are ignored
    pub fn insert(&mut self, id: PrototypeId) -> bool {
        let index = id.index();
        if index >= self.capacity {
            return false;
        }
        let (word, bit) = (index / WORD_BITS, index % WORD_BITS);
        let had = self.words[word] & (1 << bit) != 0;
        self.words[word] |= 1 << bit;
        !had
    }

    pub fn remove(&mut self, id: PrototypeId) -> bool {
        let index = id.index();
        if index >= self.capacity {
            return false;
        }
        let (word, bit) = (index / WORD_BITS, index % WORD_BITS);
        let had = self.words[word] & (1 << bit) != 0;
        self.words[word] &= !(1 << bit);
        had
    }

    pub fn contains(&self, id: PrototypeId) -> bool {
        let index = id.index();
        index < self.capacity && self.words[index / WORD_BITS] & (1 << (index % WORD_BITS)) != 0
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    pub fn clear(&mut self) {
        for word in self.words.iter_mut() {
            *word = 0;
        }
    }

    /// Keep only ids also present in `other`. Returns true if anything was removed.
    pub fn intersect_with(&mut self, other: &CandidateSet) -> bool {
        debug_assert_eq!(self.words.len(), other.words.len());
        let mut changed = false;
        for (word, &mask) in self.words.iter_mut().zip(other.words.iter()) {
            let next = *word & mask;
            changed |= next != *word;
            *word = next;
        }
        changed
    }

    pub fn union_with(&mut self, other: &CandidateSet) {
        debug_assert_eq!(self.words.len(), other.words.len());
        for (word, &mask) in self.words.iter_mut().zip(other.words.iter()) {
            *word |= mask;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = PrototypeId> + '_ {
        self.words.iter().enumerate().flat_map(|(word_index, &word)| {
            let mut bits = word;
            std::iter::from_fn(move || {
                if bits == 0 {
                    return None;
                }
                let bit = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                Some(PrototypeId((word_index * WORD_BITS + bit) as u16))
            })
        })
    }

    fn clear_tail(&mut self) {
        let tail = self.capacity % WORD_BITS;
        if tail != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << tail) - 1;
            }
        }
    }
}
