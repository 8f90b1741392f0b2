//! Per-environment object tags.
//!
//! A chained hash table from object identity to a non-zero 64-bit tag. Keys
//! are weak references, so tagging never keeps an object alive, and buckets
//! are chosen from the identity hash cached in the entry at insert time.
//! Nothing here calls into the object beyond reading that hash and comparing
//! addresses.
//!
//! Entries whose object has died are skipped by every lookup and dropped
//! when the table is resized.

use std::sync::{Arc, Weak};

use crate::config::MAX_CAPACITY;
use crate::error::JvmtiResult;
use crate::heap::{Object, ObjectRef};
use crate::sys::jni::jlong;
use crate::sys::jvmti::jvmtiError;

struct Entry {
    object: Weak<Object>,
    hash: u32,
    tag: jlong,
    next: Option<Box<Entry>>,
}

impl Entry {
    fn is(&self, object: &ObjectRef) -> bool {
        std::ptr::eq(self.object.as_ptr(), Arc::as_ptr(object))
    }

    fn is_live(&self) -> bool {
        self.object.strong_count() > 0
    }
}

pub struct TagMap {
    buckets: Vec<Option<Box<Entry>>>,
    len: usize,
}

impl TagMap {
    pub fn with_capacity(buckets: usize) -> TagMap {
        let buckets = buckets.clamp(1, MAX_CAPACITY).next_power_of_two();
        TagMap {
            buckets: (0..buckets).map(|_| None).collect(),
            len: 0,
        }
    }

    /// Stored entries, including any whose object has died but not yet been
    /// reclaimed.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    fn index(&self, hash: u32) -> usize {
        hash as usize & (self.buckets.len() - 1)
    }

    /// The object's tag, 0 if untagged.
    pub fn get(&self, object: &ObjectRef) -> jlong {
        let mut cursor = self.buckets[self.index(object.identity_hash())].as_deref();
        while let Some(entry) = cursor {
            if entry.is(object) {
                return entry.tag;
            }
            cursor = entry.next.as_deref();
        }
        0
    }

    /// Sets the object's tag; 0 removes it.
    pub fn set(&mut self, object: &ObjectRef, tag: jlong) {
        if tag == 0 {
            self.remove(object);
            return;
        }
        let hash = object.identity_hash();
        let index = self.index(hash);
        let mut cursor = self.buckets[index].as_deref_mut();
        while let Some(entry) = cursor {
            if entry.is(object) {
                entry.tag = tag;
                return;
            }
            cursor = entry.next.as_deref_mut();
        }
        if self.len + 1 > self.buckets.len() / 4 * 3 {
            self.resize();
        }
        let index = self.index(hash);
        let next = self.buckets[index].take();
        self.buckets[index] = Some(Box::new(Entry {
            object: Arc::downgrade(object),
            hash,
            tag,
            next,
        }));
        self.len += 1;
    }

    fn remove(&mut self, object: &ObjectRef) {
        let index = self.index(object.identity_hash());
        // Relink the chain without the removed entry; bucket order is free.
        let mut cursor = self.buckets[index].take();
        while let Some(mut entry) = cursor {
            cursor = entry.next.take();
            if entry.is(object) {
                self.len -= 1;
                continue;
            }
            entry.next = self.buckets[index].take();
            self.buckets[index] = Some(entry);
        }
    }

    /// Rebuilds the table, dropping dead entries. Doubles the bucket count if
    /// the live entries alone would still exceed the load factor.
    fn resize(&mut self) {
        let mut entries = Vec::with_capacity(self.len);
        for bucket in &mut self.buckets {
            let mut cursor = bucket.take();
            while let Some(mut entry) = cursor {
                cursor = entry.next.take();
                if entry.is_live() {
                    entries.push(entry);
                }
            }
        }
        let reclaimed = self.len - entries.len();
        let mut capacity = self.buckets.len();
        while entries.len() + 1 > capacity / 4 * 3 {
            capacity *= 2;
        }
        self.buckets = (0..capacity).map(|_| None).collect();
        self.len = entries.len();
        for mut entry in entries {
            let index = self.index(entry.hash);
            entry.next = self.buckets[index].take();
            self.buckets[index] = Some(entry);
        }
        tracing::trace!(reclaimed, buckets = capacity, live = self.len, "tag map resized");
    }

    fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.buckets.iter().flat_map(|bucket| {
            std::iter::successors(bucket.as_deref(), |entry| entry.next.as_deref())
        })
    }

    /// `GetObjectsWithTags`: live objects carrying any of `tags`.
    ///
    /// The first pass counts candidates; objects that die between the passes
    /// leave the result shorter than that count.
    pub fn objects_with_tags(&self, tags: &[jlong]) -> JvmtiResult<Vec<(ObjectRef, jlong)>> {
        if tags.iter().any(|t| *t == 0) {
            return Err(jvmtiError::ILLEGAL_ARGUMENT);
        }
        let count = self
            .entries()
            .filter(|e| e.is_live() && tags.contains(&e.tag))
            .count();
        let mut found = Vec::new();
        found.try_reserve_exact(count).map_err(|_| jvmtiError::OUT_OF_MEMORY)?;
        for entry in self.entries() {
            if !tags.contains(&entry.tag) {
                continue;
            }
            if let Some(object) = entry.object.upgrade() {
                found.push((object, entry.tag));
            }
        }
        Ok(found)
    }
}

impl Drop for TagMap {
    // Unlink chains iteratively so long buckets cannot overflow the stack.
    fn drop(&mut self) {
        for bucket in &mut self.buckets {
            let mut cursor = bucket.take();
            while let Some(mut entry) = cursor {
                cursor = entry.next.take();
            }
        }
    }
}
