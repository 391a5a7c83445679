//! # Heap Object Table
//!
//! Small-integer handles for host objects the module must reference.
//!
//! ```text
//! slot:   0 ..127 | 128       129   130   131   | 132 .. (recyclable)
//! value:  reserved| undefined null  true  false | free list / objects
//! ```
//!
//! Unused slots chain to one another through `next`; allocation pops the
//! chain head, freeing pushes onto it. Indices stay stable across growth.

use crate::value::HostValue;

/// Module-reserved low slots.
pub const RESERVED_SLOTS: u32 = 128;
/// Slot of the `undefined` singleton.
pub const UNDEFINED_SLOT: u32 = 128;
/// Slot of the `null` singleton.
pub const NULL_SLOT: u32 = 129;
/// Slot of `true`.
pub const TRUE_SLOT: u32 = 130;
/// Slot of `false`.
pub const FALSE_SLOT: u32 = 131;
/// First slot that can be handed out and recycled.
pub const FIRST_FREE_SLOT: u32 = 132;

static UNDEFINED: HostValue = HostValue::Undefined;

#[derive(Debug)]
enum Slot {
    Occupied(HostValue),
    Free { next: u32 },
}

/// Slot table with a fixed reserved prefix and explicit free-list recycling.
///
/// # Thread Safety
///
/// Owned by exactly one context. Slots are meaningless on any other thread.
#[derive(Debug)]
pub struct HeapTable {
    slots: Vec<Slot>,
    next_free: u32,
    live: usize,
}

impl HeapTable {
    /// Creates a table holding only the reserved prefix and the four
    /// singletons.
    #[must_use]
    pub fn new() -> Self {
        let mut slots: Vec<Slot> = (0..RESERVED_SLOTS)
            .map(|_| Slot::Occupied(HostValue::Undefined))
            .collect();
        slots.extend([
            Slot::Occupied(HostValue::Undefined),
            Slot::Occupied(HostValue::Null),
            Slot::Occupied(HostValue::Bool(true)),
            Slot::Occupied(HostValue::Bool(false)),
        ]);
        Self {
            slots,
            next_free: FIRST_FREE_SLOT,
            live: 0,
        }
    }

    /// Total slots, reserved prefix included.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always false: the reserved prefix is never empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Objects currently allocated above the reserved prefix.
    #[inline]
    #[must_use]
    pub const fn live_count(&self) -> usize {
        self.live
    }

    /// Stores `value` and returns its slot.
    ///
    /// Reuses the most recently freed slot, or grows the table by one.
    pub fn alloc(&mut self, value: HostValue) -> u32 {
        if self.next_free as usize == self.slots.len() {
            self.slots.push(Slot::Free {
                next: self.next_free + 1,
            });
        }

        let slot = self.next_free;
        let next = match self.slots[slot as usize] {
            Slot::Free { next } => next,
            Slot::Occupied(_) => unreachable!("heap free list points at occupied slot {slot}"),
        };
        self.slots[slot as usize] = Slot::Occupied(value);
        self.next_free = next;
        self.live += 1;
        slot
    }

    /// Looks up a slot. Freed or unknown slots read as `undefined`.
    #[inline]
    #[must_use]
    pub fn get(&self, slot: u32) -> &HostValue {
        match self.slots.get(slot as usize) {
            Some(Slot::Occupied(value)) => value,
            _ => &UNDEFINED,
        }
    }

    /// Returns a slot to the free list.
    ///
    /// Reserved slots, free slots and out-of-range slots are left alone.
    /// Returns the value that was released.
    pub fn free(&mut self, slot: u32) -> Option<HostValue> {
        if slot < FIRST_FREE_SLOT {
            return None;
        }
        let entry = self.slots.get_mut(slot as usize)?;
        if matches!(entry, Slot::Free { .. }) {
            return None;
        }
        let Slot::Occupied(value) = std::mem::replace(
            entry,
            Slot::Free {
                next: self.next_free,
            },
        ) else {
            return None;
        };
        self.next_free = slot;
        self.live -= 1;
        Some(value)
    }

    /// `get` followed by `free`. Reserved slots are copied, not freed.
    pub fn take(&mut self, slot: u32) -> HostValue {
        if slot < FIRST_FREE_SLOT {
            return self.get(slot).clone();
        }
        self.free(slot).unwrap_or(HostValue::Undefined)
    }

    /// Allocates a second slot holding the same object.
    pub fn clone_ref(&mut self, slot: u32) -> u32 {
        let value = self.get(slot).clone();
        self.alloc(value)
    }

    /// Mutable access to an allocated object.
    pub fn get_mut(&mut self, slot: u32) -> Option<&mut HostValue> {
        if slot < FIRST_FREE_SLOT {
            return None;
        }
        match self.slots.get_mut(slot as usize) {
            Some(Slot::Occupied(value)) => Some(value),
            _ => None,
        }
    }
}

impl Default for HeapTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_round_trip() {
        let mut heap = HeapTable::new();
        let values = [
            HostValue::Number(3.5),
            HostValue::from("text"),
            HostValue::BigInt(7),
            HostValue::Array(vec![HostValue::Null]),
        ];
        let slots: Vec<u32> = values.iter().cloned().map(|v| heap.alloc(v)).collect();

        for (slot, value) in slots.iter().zip(&values) {
            assert!(*slot >= FIRST_FREE_SLOT);
            assert_eq!(heap.get(*slot), value);
        }
        assert_eq!(heap.live_count(), 4);
    }

    #[test]
    fn test_freed_slot_reads_undefined_and_is_reused() {
        let mut heap = HeapTable::new();
        let a = heap.alloc(HostValue::Number(1.0));
        let b = heap.alloc(HostValue::Number(2.0));

        assert_eq!(heap.free(a), Some(HostValue::Number(1.0)));
        assert_eq!(heap.get(a), &HostValue::Undefined);
        assert_eq!(heap.free(a), None);

        let c = heap.alloc(HostValue::Bool(true));
        assert_eq!(c, a);
        assert_eq!(heap.get(b), &HostValue::Number(2.0));
    }

    #[test]
    fn test_reserved_slots_never_recycled() {
        let mut heap = HeapTable::new();
        assert_eq!(heap.get(UNDEFINED_SLOT), &HostValue::Undefined);
        assert_eq!(heap.get(NULL_SLOT), &HostValue::Null);
        assert_eq!(heap.get(TRUE_SLOT), &HostValue::Bool(true));
        assert_eq!(heap.get(FALSE_SLOT), &HostValue::Bool(false));

        assert_eq!(heap.free(TRUE_SLOT), None);
        assert_eq!(heap.take(NULL_SLOT), HostValue::Null);
        assert_eq!(heap.get(NULL_SLOT), &HostValue::Null);
        assert_eq!(heap.alloc(HostValue::Null), FIRST_FREE_SLOT);
    }

    #[test]
    fn test_out_of_range_is_undefined() {
        let heap = HeapTable::new();
        assert_eq!(heap.get(10_000), &HostValue::Undefined);
    }

    #[test]
    fn test_growth_keeps_indices() {
        let mut heap = HeapTable::new();
        let first = heap.alloc(HostValue::from("first"));
        for i in 0..1000 {
            heap.alloc(HostValue::Number(f64::from(i)));
        }
        assert_eq!(heap.get(first), &HostValue::from("first"));
        assert_eq!(heap.len(), FIRST_FREE_SLOT as usize + 1001);
    }

    #[test]
    fn test_take_frees() {
        let mut heap = HeapTable::new();
        let slot = heap.alloc(HostValue::BigInt(9));
        let copy = heap.clone_ref(slot);

        assert_eq!(heap.take(slot), HostValue::BigInt(9));
        assert_eq!(heap.get(slot), &HostValue::Undefined);
        assert_eq!(heap.get(copy), &HostValue::BigInt(9));
        assert_eq!(heap.live_count(), 1);
    }
}
