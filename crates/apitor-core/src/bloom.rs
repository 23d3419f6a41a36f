//! Approximate caller membership for unique-caller counting.
//!
//! A Bloom filter answers "definitely never seen" or "maybe seen": false
//! positives are possible, false negatives are not. The filter is shared by
//! every request for the process lifetime, so bits are atomic words and
//! check/insert need no lock.

use std::sync::atomic::{AtomicU64, Ordering};

/// Membership structure consulted by the request interceptor.
pub trait MembershipFilter: Send + Sync {
    /// May return true for keys never added; never false for added keys.
    fn contains(&self, key: &str) -> bool;
    fn add(&self, key: &str);
}

/// Default expected number of distinct callers.
pub const DEFAULT_CAPACITY: usize = 100_000;
/// Default bits per expected key (~1% false positive rate).
pub const DEFAULT_BITS_PER_KEY: usize = 10;

/// Fixed-size, lock-free Bloom filter.
#[derive(Debug)]
pub struct BloomFilter {
    words: Box<[AtomicU64]>,
    bits: usize,
    k: u32,
}

impl BloomFilter {
    pub fn new(capacity: usize, bits_per_key: usize) -> Self {
        // optimal k = bits_per_key * ln(2)
        let k = ((bits_per_key as f64 * 0.69) as u32).clamp(1, 30);
        let bits = (capacity.max(1) * bits_per_key.max(1)).max(64);
        let words = bits.div_ceil(64);
        Self {
            words: (0..words).map(|_| AtomicU64::new(0)).collect(),
            bits: words * 64,
            k,
        }
    }

    /// Number of hash probes per key.
    pub fn k(&self) -> u32 {
        self.k
    }

    fn probes(&self, key: &str) -> impl Iterator<Item = usize> + '_ {
        let mut h = bloom_hash(key.as_bytes());
        let delta = h.rotate_right(17);
        (0..self.k).map(move |_| {
            let pos = (h as usize) % self.bits;
            h = h.wrapping_add(delta);
            pos
        })
    }
}

impl Default for BloomFilter {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_BITS_PER_KEY)
    }
}

impl MembershipFilter for BloomFilter {
    fn contains(&self, key: &str) -> bool {
        self.probes(key)
            .all(|pos| self.words[pos / 64].load(Ordering::Relaxed) & (1u64 << (pos % 64)) != 0)
    }

    fn add(&self, key: &str) {
        for pos in self.probes(key) {
            self.words[pos / 64].fetch_or(1u64 << (pos % 64), Ordering::Relaxed);
        }
    }
}

/// Murmur-style 32-bit hash.
fn bloom_hash(key: &[u8]) -> u32 {
    const SEED: u32 = 0xbc9f1d34;
    const M: u32 = 0xc6a4a793;

    let mut h = SEED ^ (key.len() as u32).wrapping_mul(M);

    let mut chunks = key.chunks_exact(4);
    for c in &mut chunks {
        let w = u32::from_le_bytes([c[0], c[1], c[2], c[3]]);
        h = h.wrapping_add(w);
        h = h.wrapping_mul(M);
        h ^= h >> 16;
    }

    let rest = chunks.remainder();
    if rest.len() >= 3 {
        h = h.wrapping_add((rest[2] as u32) << 16);
    }
    if rest.len() >= 2 {
        h = h.wrapping_add((rest[1] as u32) << 8);
    }
    if let Some(&b) = rest.first() {
        h = h.wrapping_add(b as u32);
        h = h.wrapping_mul(M);
        h ^= h >> 24;
    }
    h
}
