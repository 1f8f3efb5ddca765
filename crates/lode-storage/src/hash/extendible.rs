//! Extendible hash table.
//!
//! The table keeps a directory of `2^global_depth` slots, each
//! referencing a bucket. A bucket with `local_depth` bits claims every
//! slot whose low `local_depth` bits equal the bucket's id, so a single
//! bucket may be shared by many slots. When an insert overflows a
//! bucket, the bucket splits on the next hash bit; when the split needs
//! more bits than the directory has, the directory doubles.
//!
//! Buckets live in an arena (`Vec<Bucket>`) and the directory holds
//! arena indices, so sharing a bucket across slots is a plain index
//! copy. Directory slots can be empty: a split that raises the local
//! depth by more than one bit leaves the unclaimed sibling patterns
//! without a bucket, and the next insert landing there starts a fresh
//! one.
//!
//! All public operations are serialized by an internal mutex.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};

use parking_lot::Mutex;

/// Upper bound on `local_depth` (and therefore `global_depth`).
///
/// A split that cannot separate its keys within this many hash bits
/// gives up instead of doubling the directory forever. 24 bits is a
/// 16M-slot directory, far beyond any realistic page table.
pub const MAX_DEPTH: u32 = 24;

struct Bucket<K, V> {
    /// The low `local_depth` bits common to every key in the bucket.
    id: usize,
    local_depth: u32,
    items: Vec<(K, V)>,
}

struct TableCore<K, V, S> {
    bucket_capacity: usize,
    global_depth: u32,
    bucket_count: usize,
    pair_count: usize,
    /// Directory of `2^global_depth` slots holding arena indices.
    directory: Vec<Option<usize>>,
    /// Bucket arena; buckets are never removed.
    buckets: Vec<Bucket<K, V>>,
    hash_builder: S,
}

impl<K, V, S> TableCore<K, V, S>
where
    K: Hash + Eq,
    V: Clone,
    S: BuildHasher,
{
    fn hash_of(&self, key: &K) -> usize {
        self.hash_builder.hash_one(key) as usize
    }

    fn dir_index(&self, hash: usize) -> usize {
        hash & ((1usize << self.global_depth) - 1)
    }

    fn get(&self, key: &K) -> Option<V> {
        let idx = self.dir_index(self.hash_of(key));
        let b = self.directory[idx]?;
        self.buckets[b]
            .items
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    fn remove(&mut self, key: &K) -> bool {
        let idx = self.dir_index(self.hash_of(key));
        let Some(b) = self.directory[idx] else {
            return false;
        };
        let items = &mut self.buckets[b].items;
        match items.iter().position(|(k, _)| k == key) {
            Some(pos) => {
                items.swap_remove(pos);
                self.pair_count -= 1;
                true
            }
            None => false,
        }
    }

    fn insert(&mut self, key: K, value: V) {
        let idx = self.dir_index(self.hash_of(&key));
        let b = match self.directory[idx] {
            Some(b) => b,
            None => {
                // Empty slot, left behind by a split that skipped this
                // pattern. Start a fresh bucket pinned to the full
                // directory index.
                let b = self.buckets.len();
                self.buckets.push(Bucket {
                    id: idx,
                    local_depth: self.global_depth,
                    items: Vec::new(),
                });
                self.directory[idx] = Some(b);
                self.bucket_count += 1;
                b
            }
        };

        if let Some(slot) = self.buckets[b].items.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
            return;
        }
        self.buckets[b].items.push((key, value));
        self.pair_count += 1;

        if self.buckets[b].items.len() > self.bucket_capacity {
            let old_id = self.buckets[b].id;
            let old_depth = self.buckets[b].local_depth;
            match self.split(b) {
                Some(sibling) => self.reassign_slots(b, sibling, old_id, old_depth),
                None => {
                    // The keys could not be separated within MAX_DEPTH
                    // bits. Restore the bucket's pattern (the failed
                    // attempts may have rewritten its id) and leave it
                    // over capacity; a later insert may split it.
                    self.buckets[b].id = old_id;
                    self.buckets[b].local_depth = old_depth;
                }
            }
        }
    }

    /// Splits bucket `b`, redistributing its items on successive hash
    /// bits until the sibling ends up non-empty. Returns the arena
    /// index of the sibling, or `None` when the keys are
    /// indistinguishable within [`MAX_DEPTH`] bits.
    fn split(&mut self, b: usize) -> Option<usize> {
        let mut sibling: Bucket<K, V> = Bucket {
            id: 0,
            local_depth: self.buckets[b].local_depth,
            items: Vec::new(),
        };

        while sibling.items.is_empty() {
            if self.buckets[b].local_depth >= MAX_DEPTH {
                return None;
            }
            self.buckets[b].local_depth += 1;
            sibling.local_depth += 1;

            let depth = self.buckets[b].local_depth;
            let split_bit = 1usize << (depth - 1);
            let id_mask = (1usize << depth) - 1;

            // Items whose new depth bit is set migrate to the sibling.
            let mut i = 0;
            while i < self.buckets[b].items.len() {
                let hash = self.hash_builder.hash_one(&self.buckets[b].items[i].0) as usize;
                if hash & split_bit != 0 {
                    sibling.id = hash & id_mask;
                    sibling.items.push(self.buckets[b].items.swap_remove(i));
                } else {
                    i += 1;
                }
            }

            if self.buckets[b].items.is_empty() {
                // Every item migrated, so nothing was separated. Keep
                // the items in the original bucket and try the next bit.
                std::mem::swap(&mut self.buckets[b].items, &mut sibling.items);
                self.buckets[b].id = sibling.id;
            }
        }

        self.buckets.push(sibling);
        self.bucket_count += 1;
        Some(self.buckets.len() - 1)
    }

    /// Rewires the directory after a successful split of a bucket that
    /// previously claimed the `old_id`/`old_depth` pattern.
    fn reassign_slots(&mut self, b: usize, sibling: usize, old_id: usize, old_depth: u32) {
        let new_depth = self.buckets[b].local_depth;

        // Directory growth: double once per new depth bit. Copying the
        // lower half keeps every existing slot's bucket claim intact,
        // since a claim only looks at the low local_depth bits.
        while self.global_depth < new_depth {
            let len = self.directory.len();
            self.directory.extend_from_within(0..len);
            self.global_depth += 1;
        }

        // Rewrite exactly the slots that referenced the bucket before
        // the split. Patterns claimed by neither half go empty.
        let id_mask = (1usize << new_depth) - 1;
        let bucket_id = self.buckets[b].id;
        let sibling_id = self.buckets[sibling].id;
        let step = 1usize << old_depth;

        let mut j = old_id;
        while j < self.directory.len() {
            self.directory[j] = if j & id_mask == bucket_id {
                Some(b)
            } else if j & id_mask == sibling_id {
                Some(sibling)
            } else {
                None
            };
            j += step;
        }
    }
}

/// A concurrent extendible hash table.
///
/// Buckets hold at most `bucket_capacity` pairs (except transiently
/// while an overflowing insert splits them), splitting and growing the
/// directory on demand. Removals never merge buckets or shrink the
/// directory.
///
/// The hasher is pluggable the same way it is for `HashMap`; the
/// default [`RandomState`] is right for production use, while tests can
/// substitute a deterministic hasher to pin down exact bucket layouts.
///
/// # Example
///
/// ```
/// use lode_storage::hash::ExtendibleHashTable;
///
/// let table = ExtendibleHashTable::new(4);
/// table.insert("a", 1);
/// assert_eq!(table.get(&"a"), Some(1));
/// assert!(table.remove(&"a"));
/// assert_eq!(table.get(&"a"), None);
/// ```
pub struct ExtendibleHashTable<K, V, S = RandomState> {
    inner: Mutex<TableCore<K, V, S>>,
}

impl<K, V> ExtendibleHashTable<K, V, RandomState>
where
    K: Hash + Eq,
    V: Clone,
{
    /// Creates a table whose buckets hold `bucket_capacity` pairs.
    pub fn new(bucket_capacity: usize) -> Self {
        Self::with_hasher(bucket_capacity, RandomState::new())
    }
}

impl<K, V, S> ExtendibleHashTable<K, V, S>
where
    K: Hash + Eq,
    V: Clone,
    S: BuildHasher,
{
    /// Creates a table with the given bucket capacity and hasher.
    ///
    /// # Panics
    ///
    /// Panics if `bucket_capacity` is zero.
    pub fn with_hasher(bucket_capacity: usize, hash_builder: S) -> Self {
        assert!(bucket_capacity > 0, "bucket capacity must be positive");
        Self {
            inner: Mutex::new(TableCore {
                bucket_capacity,
                global_depth: 0,
                bucket_count: 1,
                pair_count: 0,
                directory: vec![Some(0)],
                buckets: vec![Bucket {
                    id: 0,
                    local_depth: 0,
                    items: Vec::new(),
                }],
                hash_builder,
            }),
        }
    }

    /// Looks up the value for `key`.
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.lock().get(key)
    }

    /// Inserts a key-value pair, overwriting any previous value for
    /// the key.
    pub fn insert(&self, key: K, value: V) {
        self.inner.lock().insert(key, value)
    }

    /// Removes the entry for `key`. Returns whether it was present.
    pub fn remove(&self, key: &K) -> bool {
        self.inner.lock().remove(key)
    }

    /// Returns the number of key-value pairs.
    pub fn len(&self) -> usize {
        self.inner.lock().pair_count
    }

    /// Returns true if the table holds no pairs.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of directory index bits in use.
    pub fn global_depth(&self) -> u32 {
        self.inner.lock().global_depth
    }

    /// Returns the local depth of the bucket referenced by directory
    /// slot `slot`, or `None` for an out-of-range or empty slot.
    pub fn local_depth(&self, slot: usize) -> Option<u32> {
        let core = self.inner.lock();
        let b = core.directory.get(slot).copied().flatten()?;
        Some(core.buckets[b].local_depth)
    }

    /// Returns the number of distinct buckets.
    pub fn num_buckets(&self) -> usize {
        self.inner.lock().bucket_count
    }
}

impl<K, V, S> std::fmt::Debug for ExtendibleHashTable<K, V, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.inner.lock();
        f.debug_struct("ExtendibleHashTable")
            .field("global_depth", &core.global_depth)
            .field("buckets", &core.bucket_count)
            .field("pairs", &core.pair_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::hash::Hasher;
    use std::sync::Arc;

    use super::*;

    /// Hashes a `u64` key to itself so tests can dictate the exact
    /// bits the table sees.
    #[derive(Clone, Copy, Default)]
    struct IdentityState;

    struct IdentityHasher(u64);

    impl BuildHasher for IdentityState {
        type Hasher = IdentityHasher;

        fn build_hasher(&self) -> IdentityHasher {
            IdentityHasher(0)
        }
    }

    impl Hasher for IdentityHasher {
        fn finish(&self) -> u64 {
            self.0
        }

        fn write(&mut self, bytes: &[u8]) {
            for &b in bytes {
                self.0 = (self.0 << 8) | u64::from(b);
            }
        }

        fn write_u64(&mut self, i: u64) {
            self.0 = i;
        }
    }

    /// A key whose every instance hashes to the same value.
    #[derive(PartialEq, Eq)]
    struct Clash(u64);

    impl Hash for Clash {
        fn hash<H: Hasher>(&self, state: &mut H) {
            state.write_u64(0b101);
        }
    }

    fn pinned_table(capacity: usize) -> ExtendibleHashTable<u64, u64, IdentityState> {
        ExtendibleHashTable::with_hasher(capacity, IdentityState)
    }

    /// Every occupied directory slot must agree with its bucket on the
    /// low `local_depth` bits, and the directory must span exactly
    /// `2^global_depth` slots.
    fn assert_directory_consistent<K: Hash + Eq, V: Clone, S: BuildHasher>(
        table: &ExtendibleHashTable<K, V, S>,
    ) {
        let core = table.inner.lock();
        assert_eq!(core.directory.len(), 1usize << core.global_depth);
        for (j, slot) in core.directory.iter().enumerate() {
            if let Some(b) = slot {
                let bucket = &core.buckets[*b];
                assert!(bucket.local_depth <= core.global_depth);
                assert_eq!(
                    j & ((1usize << bucket.local_depth) - 1),
                    bucket.id,
                    "slot {j} disagrees with its bucket"
                );
            }
        }
    }

    #[test]
    fn test_insert_and_find() {
        let table = ExtendibleHashTable::new(4);
        for i in 0..200u64 {
            table.insert(i, i * 2);
        }
        for i in 0..200u64 {
            assert_eq!(table.get(&i), Some(i * 2));
        }
        assert_eq!(table.len(), 200);
        assert_eq!(table.get(&200), None);
        assert_directory_consistent(&table);
    }

    #[test]
    fn test_overwrite_keeps_single_entry() {
        let table = ExtendibleHashTable::new(4);
        table.insert(7u64, 1u64);
        table.insert(7, 2);
        assert_eq!(table.get(&7), Some(2));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_remove() {
        let table = ExtendibleHashTable::new(4);
        table.insert(1u64, 10u64);
        table.insert(2, 20);

        assert!(table.remove(&1));
        assert_eq!(table.get(&1), None);
        assert_eq!(table.len(), 1);

        // Removing an absent key is a no-op.
        assert!(!table.remove(&1));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_split_grows_directory() {
        // Capacity 2, keys chosen so the first split must use two bits:
        // 0b000, 0b010, 0b100 are all even, so bit 0 separates nothing.
        let table = pinned_table(2);
        for key in [0b000u64, 0b010, 0b100, 0b110, 0b001] {
            table.insert(key, key);
        }

        assert!(table.global_depth() >= 2);
        for key in [0b000u64, 0b010, 0b100, 0b110, 0b001] {
            assert_eq!(table.get(&key), Some(key));
        }
        assert_directory_consistent(&table);
    }

    #[test]
    fn test_split_fills_empty_slot_later() {
        let table = pinned_table(2);
        // Splitting {0, 2, 4} jumps local depth from 0 to 2 and leaves
        // the 0b01 and 0b11 patterns without a bucket.
        for key in [0u64, 2, 4] {
            table.insert(key, key);
        }
        assert_eq!(table.global_depth(), 2);
        assert_eq!(table.num_buckets(), 2);
        assert_eq!(table.local_depth(1), None);
        assert_eq!(table.local_depth(3), None);

        // The next insert landing on an empty pattern starts a bucket
        // pinned at the full directory depth.
        table.insert(1, 1);
        assert_eq!(table.num_buckets(), 3);
        assert_eq!(table.local_depth(1), Some(2));
        assert_eq!(table.get(&1), Some(1));
        assert_directory_consistent(&table);
    }

    #[test]
    fn test_depth_accessors() {
        let table = pinned_table(2);
        assert_eq!(table.global_depth(), 0);
        assert_eq!(table.local_depth(0), Some(0));
        assert_eq!(table.local_depth(99), None);
        assert_eq!(table.num_buckets(), 1);

        for key in [0u64, 1, 2, 3, 4, 5, 6, 7] {
            table.insert(key, key);
        }
        assert!(table.global_depth() >= 2);
        assert!(table.num_buckets() >= 3);
        assert_directory_consistent(&table);
    }

    #[test]
    fn test_degenerate_split_gives_up_at_max_depth() {
        // All keys collide on every bit, so no amount of depth can
        // separate them. The insert must terminate, leave the bucket
        // over capacity and keep every pair reachable.
        let table = ExtendibleHashTable::with_hasher(2, IdentityState);
        table.insert(Clash(1), 1u64);
        table.insert(Clash(2), 2);
        table.insert(Clash(3), 3);

        assert_eq!(table.len(), 3);
        assert_eq!(table.num_buckets(), 1);
        assert_eq!(table.global_depth(), 0);
        assert_eq!(table.local_depth(0), Some(0));
        for i in 1..=3u64 {
            assert_eq!(table.get(&Clash(i)), Some(i));
        }
        assert_directory_consistent(&table);

        assert!(table.remove(&Clash(2)));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_removals_never_shrink() {
        let table = pinned_table(2);
        for key in 0..32u64 {
            table.insert(key, key);
        }
        let depth = table.global_depth();
        let buckets = table.num_buckets();

        for key in 0..32u64 {
            assert!(table.remove(&key));
        }
        assert!(table.is_empty());
        assert_eq!(table.global_depth(), depth);
        assert_eq!(table.num_buckets(), buckets);
        assert_directory_consistent(&table);
    }

    #[test]
    fn test_concurrent_inserts() {
        let table = Arc::new(ExtendibleHashTable::new(4));
        let mut handles = Vec::new();
        for t in 0..4u64 {
            let table = Arc::clone(&table);
            handles.push(std::thread::spawn(move || {
                for i in 0..250u64 {
                    let key = t * 1000 + i;
                    table.insert(key, key + 1);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(table.len(), 1000);
        for t in 0..4u64 {
            for i in 0..250u64 {
                let key = t * 1000 + i;
                assert_eq!(table.get(&key), Some(key + 1));
            }
        }
        assert_directory_consistent(&table);
    }
}
