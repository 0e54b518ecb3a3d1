//! Fixed-capacity circular buffer of messages.
//!
//! Used for the software receive and transmit backlogs of the transport. The
//! queue is plain data with no internal locking: when it is shared between
//! interrupt and main-loop context the owner must wrap every access in a
//! critical section.
use crate::error::QueueFull;
use crate::protocol::messages::Message;

/// FIFO ring buffer holding up to `N` messages.
///
/// An explicit element count distinguishes full from empty, so all `N` slots
/// are usable. Entries are overwritten in place, never individually freed.
pub struct FrameQueue<const N: usize> {
    slots: [Option<Message>; N],
    read_index: usize,
    count: usize,
}

impl<const N: usize> Default for FrameQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> FrameQueue<N> {
    pub const fn new() -> Self {
        Self {
            slots: [None; N],
            read_index: 0,
            count: 0,
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of occupied slots, including entries blanked by [`Self::remove_at`].
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == N
    }

    /// Append `message`. On a full queue nothing changes and the caller
    /// decides how to account for the dropped message.
    pub fn push(&mut self, message: Message) -> Result<(), QueueFull> {
        if self.count == N {
            return Err(QueueFull);
        }
        let write_index = (self.read_index + self.count) % N;
        self.slots[write_index] = Some(message);
        self.count += 1;
        Ok(())
    }

    /// Remove and return the oldest message, skipping blanked entries.
    pub fn pop(&mut self) -> Option<Message> {
        while self.count > 0 {
            let slot = self.slots[self.read_index].take();
            self.read_index = (self.read_index + 1) % N;
            self.count -= 1;
            if slot.is_some() {
                return slot;
            }
        }
        None
    }

    /// Copy of the entry `index` positions behind the head, without removing it.
    /// `None` past the end or for a blanked entry.
    pub fn peek(&self, index: usize) -> Option<Message> {
        if index >= self.count {
            return None;
        }
        self.slots[(self.read_index + index) % N]
    }

    /// Blank the entry `index` positions behind the head. The slot stays
    /// occupied until it reaches the head, which keeps removal O(1).
    pub fn remove_at(&mut self, index: usize) -> bool {
        if index >= self.count {
            return false;
        }
        self.slots[(self.read_index + index) % N].take().is_some()
    }

    pub fn clear(&mut self) {
        self.slots = [None; N];
        self.read_index = 0;
        self.count = 0;
    }
}
