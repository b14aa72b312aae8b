//! Idle handle storage.
//!
//! [`IdleList`] is a doubly-linked list laid out in an arena: entries live in
//! a `Vec` of slots and link to each other by index. Vacated slots go on a
//! free stack and are reused by the next insert, so a pool that cycles
//! handles in and out does not grow the arena past its high-water mark.
//!
//! The front holds the most recently returned handle, the back the oldest.

struct Slot<T> {
    value: Option<T>,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Arena-backed doubly-linked list with O(1) push/pop at the front and O(1)
/// pop at the back.
pub struct IdleList<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    front: Option<usize>,
    back: Option<usize>,
    len: usize,
}

impl<T> Default for IdleList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> IdleList<T> {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            front: None,
            back: None,
            len: 0,
        }
    }

    /// Number of entries in the list.
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` when the list holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Most recently pushed entry.
    pub fn front(&self) -> Option<&T> {
        self.front.and_then(|idx| self.slots[idx].value.as_ref())
    }

    /// Oldest entry.
    pub fn back(&self) -> Option<&T> {
        self.back.and_then(|idx| self.slots[idx].value.as_ref())
    }

    /// Insert `value` as the most recent entry.
    pub fn push_front(&mut self, value: T) {
        let slot = Slot {
            value: Some(value),
            prev: None,
            next: self.front,
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = slot;
                idx
            }
            None => {
                self.slots.push(slot);
                self.slots.len() - 1
            }
        };

        match self.front {
            Some(old) => self.slots[old].prev = Some(idx),
            None => self.back = Some(idx),
        }
        self.front = Some(idx);
        self.len += 1;
    }

    /// Remove and return the most recent entry.
    pub fn pop_front(&mut self) -> Option<T> {
        let idx = self.front?;
        let next = self.slots[idx].next;
        match next {
            Some(next) => self.slots[next].prev = None,
            None => self.back = None,
        }
        self.front = next;
        Some(self.release(idx))
    }

    /// Remove and return the oldest entry.
    pub fn pop_back(&mut self) -> Option<T> {
        let idx = self.back?;
        let prev = self.slots[idx].prev;
        match prev {
            Some(prev) => self.slots[prev].next = None,
            None => self.front = None,
        }
        self.back = prev;
        Some(self.release(idx))
    }

    /// Remove every entry, returned in front-to-back order.
    pub fn drain(&mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len);
        while let Some(value) = self.pop_front() {
            out.push(value);
        }
        self.slots.clear();
        self.free.clear();
        out
    }

    /// Iterate front to back.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            cursor: self.front,
        }
    }

    fn release(&mut self, idx: usize) -> T {
        let slot = &mut self.slots[idx];
        slot.prev = None;
        slot.next = None;
        self.free.push(idx);
        self.len -= 1;
        // Linked slots always hold a value; a vacant one here means the links
        // are corrupt.
        slot.value.take().expect("idle list slot linked without a value")
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for IdleList<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Front-to-back iterator over an [`IdleList`].
pub struct Iter<'a, T> {
    list: &'a IdleList<T>,
    cursor: Option<usize>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let idx = self.cursor?;
        let slot = &self.list.slots[idx];
        self.cursor = slot.next;
        slot.value.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn collect(list: &IdleList<u32>) -> Vec<u32> {
        list.iter().copied().collect()
    }

    #[test]
    fn empty_list() {
        let mut list = IdleList::<u32>::new();
        assert!(list.is_empty());
        assert_eq!(list.front(), None);
        assert_eq!(list.back(), None);
        assert_eq!(list.pop_front(), None);
        assert_eq!(list.pop_back(), None);
    }

    #[test]
    fn push_front_orders_newest_first() {
        let mut list = IdleList::new();
        list.push_front(1);
        list.push_front(2);
        list.push_front(3);
        assert_eq!(collect(&list), vec![3, 2, 1]);
        assert_eq!(list.front(), Some(&3));
        assert_eq!(list.back(), Some(&1));
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn pops_from_both_ends() {
        let mut list = IdleList::new();
        for v in 1..=4 {
            list.push_front(v);
        }
        assert_eq!(list.pop_front(), Some(4));
        assert_eq!(list.pop_back(), Some(1));
        assert_eq!(collect(&list), vec![3, 2]);
        assert_eq!(list.pop_back(), Some(2));
        assert_eq!(list.pop_back(), Some(3));
        assert!(list.is_empty());
        assert_eq!(list.front(), None);
        assert_eq!(list.back(), None);
    }

    #[test]
    fn slots_are_reused() {
        let mut list = IdleList::new();
        for round in 0..10 {
            list.push_front(round);
            list.push_front(round + 100);
            list.pop_back();
            list.pop_front();
        }
        assert!(list.is_empty());
        assert!(list.slots.len() <= 2);
    }

    #[test]
    fn drain_returns_front_to_back() {
        let mut list = IdleList::new();
        for v in 1..=3 {
            list.push_front(v);
        }
        assert_eq!(list.drain(), vec![3, 2, 1]);
        assert!(list.is_empty());
        assert_eq!(list.front(), None);
    }

    #[derive(Debug, Clone)]
    enum Op {
        PushFront(u32),
        PopFront,
        PopBack,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            any::<u32>().prop_map(Op::PushFront),
            Just(Op::PopFront),
            Just(Op::PopBack),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn behaves_like_a_deque(ops in proptest::collection::vec(op(), 0..64)) {
            let mut list = IdleList::new();
            let mut model = std::collections::VecDeque::new();

            for op in ops {
                match op {
                    Op::PushFront(v) => {
                        list.push_front(v);
                        model.push_front(v);
                    }
                    Op::PopFront => prop_assert_eq!(list.pop_front(), model.pop_front()),
                    Op::PopBack => prop_assert_eq!(list.pop_back(), model.pop_back()),
                }

                // len matches what a front-to-back walk reaches, and the
                // ends are either both present or both absent.
                prop_assert_eq!(list.len(), list.iter().count());
                prop_assert_eq!(list.front.is_none(), list.back.is_none());
                prop_assert_eq!(list.front.is_none(), list.is_empty());
                prop_assert_eq!(collect(&list), model.iter().copied().collect::<Vec<_>>());
            }
        }
    }
}
