//! FIFO queue of waiters stored in a slot arena.
//!
//! Waiters are addressed by [`Entry`] handles carrying a slot index and a
//! generation. Slots are linked by index, so removing a waiter that may or
//! may not still be queued is a checked operation: a handle whose slot was
//! already vacated (or reused by a later waiter) simply finds nothing.

/// Handle to a queued value.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct Entry {
    id: usize,
    gen: usize,
}

#[derive(Debug)]
struct Slot<T> {
    gen: usize,
    value: Option<T>,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug)]
pub struct WaitQueue<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<T> WaitQueue<T> {
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// Number of queued values.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether `entry` still refers to a queued value.
    #[inline]
    pub fn contains(&self, entry: Entry) -> bool {
        self.slots
            .get(entry.id)
            .is_some_and(|slot| slot.gen == entry.gen && slot.value.is_some())
    }

    /// Appends `value` at the tail, returning its handle.
    pub fn push_back(&mut self, value: T) -> Entry {
        let id = if let Some(id) = self.free.pop() {
            self.slots[id].gen += 1;
            id
        } else {
            self.slots.push(Slot {
                gen: 0,
                value: None,
                prev: None,
                next: None,
            });
            self.slots.len() - 1
        };

        let tail = self.tail;
        let slot = &mut self.slots[id];
        slot.value = Some(value);
        slot.prev = tail;
        slot.next = None;
        let gen = slot.gen;

        match tail {
            Some(tail) => self.slots[tail].next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        self.len += 1;

        Entry { id, gen }
    }

    /// Removes and returns the value at the head.
    pub fn pop_front(&mut self) -> Option<T> {
        let head = self.head?;
        self.unlink(head)
    }

    /// Removes the value behind `entry` if it is still queued.
    pub fn remove(&mut self, entry: Entry) -> Option<T> {
        if !self.contains(entry) {
            return None;
        }
        self.unlink(entry.id)
    }

    /// Empties the queue, returning the values in queue order.
    ///
    /// Slots keep their generations, so handles to detached values stay
    /// stale rather than aliasing future waiters.
    pub fn detach(&mut self) -> Vec<T> {
        let mut detached = Vec::with_capacity(self.len);
        while let Some(value) = self.pop_front() {
            detached.push(value);
        }
        detached
    }

    fn unlink(&mut self, id: usize) -> Option<T> {
        let slot = &mut self.slots[id];
        let value = slot.value.take()?;
        let prev = slot.prev.take();
        let next = slot.next.take();

        match prev {
            Some(prev) => self.slots[prev].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.slots[next].prev = prev,
            None => self.tail = prev,
        }

        self.free.push(id);
        self.len -= 1;
        Some(value)
    }
}

impl<T> Default for WaitQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
