//! The breakpoint table.
//!
//! A breakpoint is one `u64`: the method id in the low 32 bits and the
//! bytecode location in the high 32. The table is a flat array with
//! [`UNSET`] marking free slots; it doubles when full and reuses slots freed
//! by [`BreakpointTable::clear`].
//!
//! Because the method bits are the same for every entry of one method,
//! sorting a method's entries by their encoded value sorts them by location.

use crate::config::MAX_CAPACITY;
use crate::error::JvmtiResult;
use crate::sys::jni::jmethodID;
use crate::sys::jvmti::{jlocation, jvmtiError};

/// Marks a free slot. No valid breakpoint encodes to it since method ids are
/// never zero.
pub const UNSET: u64 = 0;

/// Runtime identity of a method. Zero is reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MethodId(pub u32);

impl MethodId {
    pub fn as_raw(self) -> jmethodID {
        self.0 as usize as jmethodID
    }

    pub fn from_raw(method: jmethodID) -> JvmtiResult<MethodId> {
        let raw = method as usize;
        if raw == 0 || raw > u32::MAX as usize {
            return Err(jvmtiError::INVALID_METHODID);
        }
        Ok(MethodId(raw as u32))
    }
}

pub fn encode(method: MethodId, location: jlocation) -> JvmtiResult<u64> {
    if method.0 == 0 {
        return Err(jvmtiError::INVALID_METHODID);
    }
    if !(0..=jlocation::from(u32::MAX)).contains(&location) {
        return Err(jvmtiError::INVALID_LOCATION);
    }
    Ok(((location as u64) << 32) | u64::from(method.0))
}

pub fn decode_method(encoded: u64) -> MethodId {
    MethodId(encoded as u32)
}

pub fn decode_location(encoded: u64) -> jlocation {
    (encoded >> 32) as jlocation
}

#[derive(Debug, Clone)]
pub struct BreakpointTable {
    entries: Vec<u64>,
    count: usize,
}

impl BreakpointTable {
    pub fn with_capacity(capacity: usize) -> BreakpointTable {
        BreakpointTable {
            entries: vec![UNSET; capacity.clamp(1, MAX_CAPACITY)],
            count: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// `DUPLICATE` if the breakpoint is already set.
    pub fn set(&mut self, method: MethodId, location: jlocation) -> JvmtiResult<()> {
        let id = encode(method, location)?;
        let mut free = None;
        for (i, entry) in self.entries.iter().enumerate() {
            if *entry == id {
                return Err(jvmtiError::DUPLICATE);
            }
            if *entry == UNSET && free.is_none() {
                free = Some(i);
            }
        }
        let slot = match free {
            Some(slot) => slot,
            None => {
                let old = self.entries.len();
                self.entries
                    .try_reserve_exact(old)
                    .map_err(|_| jvmtiError::OUT_OF_MEMORY)?;
                self.entries.resize(old * 2, UNSET);
                old
            }
        };
        self.entries[slot] = id;
        self.count += 1;
        Ok(())
    }

    /// `NOT_FOUND` if no such breakpoint is set.
    pub fn clear(&mut self, method: MethodId, location: jlocation) -> JvmtiResult<()> {
        let id = encode(method, location)?;
        match self.entries.iter_mut().find(|e| **e == id) {
            Some(entry) => {
                *entry = UNSET;
                self.count -= 1;
                Ok(())
            }
            None => Err(jvmtiError::NOT_FOUND),
        }
    }

    pub fn contains(&self, method: MethodId, location: jlocation) -> bool {
        encode(method, location).map_or(false, |id| self.entries.contains(&id))
    }

    pub fn has_breakpoints(&self, method: MethodId) -> bool {
        self.entries.iter().any(|e| *e != UNSET && decode_method(*e) == method)
    }

    /// Locations of every breakpoint in `method`, ascending.
    pub fn get_breakpoints(&self, method: MethodId) -> Vec<jlocation> {
        let matches = |e: &&u64| **e != UNSET && decode_method(**e) == method;
        let count = self.entries.iter().filter(matches).count();
        let mut found = Vec::with_capacity(count);
        found.extend(self.entries.iter().filter(matches).copied());
        match found.len() {
            0 | 1 => {}
            2 => {
                if found[0] > found[1] {
                    found.swap(0, 1);
                }
            }
            _ => found.sort_unstable(),
        }
        found.into_iter().map(decode_location).collect()
    }
}

impl Default for BreakpointTable {
    fn default() -> Self {
        BreakpointTable::with_capacity(16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_puts_location_high() {
        let id = encode(MethodId(7), 3).unwrap();
        assert_eq!(id, (3 << 32) | 7);
        assert_eq!(decode_method(id), MethodId(7));
        assert_eq!(decode_location(id), 3);
    }

    #[test]
    fn rejects_unencodable_breakpoints() {
        assert_eq!(encode(MethodId(0), 1), Err(jvmtiError::INVALID_METHODID));
        assert_eq!(encode(MethodId(1), -1), Err(jvmtiError::INVALID_LOCATION));
        assert_eq!(encode(MethodId(1), 1 << 32), Err(jvmtiError::INVALID_LOCATION));
    }

    #[test]
    fn duplicate_is_rejected_without_growing() {
        let mut table = BreakpointTable::with_capacity(2);
        table.set(MethodId(1), 10).unwrap();
        assert_eq!(table.set(MethodId(1), 10), Err(jvmtiError::DUPLICATE));
        assert_eq!(table.len(), 1);
        assert_eq!(table.capacity(), 2);
    }

    #[test]
    fn full_table_doubles() {
        let mut table = BreakpointTable::with_capacity(2);
        for loc in 0..5 {
            table.set(MethodId(9), loc).unwrap();
        }
        assert_eq!(table.capacity(), 8);
        assert_eq!(table.len(), 5);
    }

    #[test]
    fn clear_frees_the_slot_for_reuse() {
        let mut table = BreakpointTable::with_capacity(2);
        table.set(MethodId(1), 1).unwrap();
        table.set(MethodId(1), 2).unwrap();
        table.clear(MethodId(1), 1).unwrap();
        assert_eq!(table.clear(MethodId(1), 1), Err(jvmtiError::NOT_FOUND));
        table.set(MethodId(2), 1).unwrap();
        assert_eq!(table.capacity(), 2);
        assert!(!table.contains(MethodId(1), 1));
        assert!(table.has_breakpoints(MethodId(2)));
    }

    #[test]
    fn breakpoints_come_back_sorted_per_method() {
        let mut table = BreakpointTable::with_capacity(4);
        for loc in [40, 5, 17, 0] {
            table.set(MethodId(3), loc).unwrap();
        }
        table.set(MethodId(4), 1).unwrap();
        assert_eq!(table.get_breakpoints(MethodId(3)), vec![0, 5, 17, 40]);
        assert_eq!(table.get_breakpoints(MethodId(4)), vec![1]);
        assert!(table.get_breakpoints(MethodId(5)).is_empty());

        let mut pair = BreakpointTable::with_capacity(2);
        pair.set(MethodId(3), 9).unwrap();
        pair.set(MethodId(3), 2).unwrap();
        assert_eq!(pair.get_breakpoints(MethodId(3)), vec![2, 9]);
    }
}
