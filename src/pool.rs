//! # Three-tier buffer pool.
//!
//! Process-wide pool of reusable byte buffers in three capacities:
//! 1 KiB for control frames and short lines, 4 KiB for ordinary messages,
//! 16 KiB for the largest payloads that still go through pooled assembly.
//! Larger requests fall through to a plain allocation and are not recycled.
//!
//! ## Rules
//! - A [`PooledBuf`] returns to its tier on drop with capacity intact and
//!   length reset to zero; no aliases survive the return.
//! - Free lists are bounded, so a burst cannot pin memory forever.
//! - Callers reach the pool through [`BufferPool::global`].

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

/// Tier capacities.
pub const SMALL_BUFFER_SIZE: usize = 1024;
pub const MEDIUM_BUFFER_SIZE: usize = 4096;
pub const LARGE_BUFFER_SIZE: usize = 16 * 1024;

/// Buffers kept per tier.
const FREE_LIST_DEPTH: usize = 32;

/// Three-tier pool of byte buffers.
#[derive(Debug)]
pub struct BufferPool {
    small: Mutex<Vec<Vec<u8>>>,
    medium: Mutex<Vec<Vec<u8>>>,
    large: Mutex<Vec<Vec<u8>>>,
    allocated: AtomicU64,
    reused: AtomicU64,
}

static GLOBAL_POOL: OnceLock<BufferPool> = OnceLock::new();

impl BufferPool {
    pub fn new() -> Self {
        Self {
            small: Mutex::new(Vec::new()),
            medium: Mutex::new(Vec::new()),
            large: Mutex::new(Vec::new()),
            allocated: AtomicU64::new(0),
            reused: AtomicU64::new(0),
        }
    }

    /// The process-wide pool instance.
    pub fn global() -> &'static BufferPool {
        GLOBAL_POOL.get_or_init(BufferPool::new)
    }

    /// Hands out a cleared buffer whose capacity covers `size`.
    ///
    /// Requests above [`LARGE_BUFFER_SIZE`] get a one-shot allocation that
    /// is dropped, not recycled.
    pub fn get(&self, size: usize) -> PooledBuf<'_> {
        let tier = Tier::for_size(size);
        let recycled = match tier {
            Tier::Small => self.pop(&self.small),
            Tier::Medium => self.pop(&self.medium),
            Tier::Large => self.pop(&self.large),
            Tier::Oversize => None,
        };

        let buf = match recycled {
            Some(buf) => {
                self.reused.fetch_add(1, Ordering::Relaxed);
                buf
            }
            None => {
                self.allocated.fetch_add(1, Ordering::Relaxed);
                Vec::with_capacity(tier.capacity().unwrap_or(size))
            }
        };

        PooledBuf {
            buf,
            tier,
            pool: self,
        }
    }

    /// (allocated, reused) counters since process start.
    pub fn counters(&self) -> (u64, u64) {
        (
            self.allocated.load(Ordering::Relaxed),
            self.reused.load(Ordering::Relaxed),
        )
    }

    fn pop(&self, list: &Mutex<Vec<Vec<u8>>>) -> Option<Vec<u8>> {
        list.lock().unwrap_or_else(|e| e.into_inner()).pop()
    }

    fn put(&self, tier: Tier, mut buf: Vec<u8>) {
        let list = match tier {
            Tier::Small => &self.small,
            Tier::Medium => &self.medium,
            Tier::Large => &self.large,
            Tier::Oversize => return,
        };
        // Only buffers with the tier's original capacity go back.
        if buf.capacity() != tier.capacity().unwrap_or(0) {
            return;
        }
        buf.clear();
        let mut list = list.lock().unwrap_or_else(|e| e.into_inner());
        if list.len() < FREE_LIST_DEPTH {
            list.push(buf);
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Small,
    Medium,
    Large,
    Oversize,
}

impl Tier {
    fn for_size(size: usize) -> Tier {
        if size <= SMALL_BUFFER_SIZE {
            Tier::Small
        } else if size <= MEDIUM_BUFFER_SIZE {
            Tier::Medium
        } else if size <= LARGE_BUFFER_SIZE {
            Tier::Large
        } else {
            Tier::Oversize
        }
    }

    fn capacity(&self) -> Option<usize> {
        match self {
            Tier::Small => Some(SMALL_BUFFER_SIZE),
            Tier::Medium => Some(MEDIUM_BUFFER_SIZE),
            Tier::Large => Some(LARGE_BUFFER_SIZE),
            Tier::Oversize => None,
        }
    }
}

/// A buffer checked out of the pool; returns to its tier on drop.
#[derive(Debug)]
pub struct PooledBuf<'a> {
    buf: Vec<u8>,
    tier: Tier,
    pool: &'a BufferPool,
}

impl Deref for PooledBuf<'_> {
    type Target = Vec<u8>;
    fn deref(&self) -> &Vec<u8> {
        &self.buf
    }
}

impl DerefMut for PooledBuf<'_> {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}

impl Drop for PooledBuf<'_> {
    fn drop(&mut self) {
        let buf = std::mem::take(&mut self.buf);
        self.pool.put(self.tier, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_match_requested_sizes() {
        let pool = BufferPool::new();
        assert!(pool.get(100).capacity() >= SMALL_BUFFER_SIZE);
        assert!(pool.get(2000).capacity() >= MEDIUM_BUFFER_SIZE);
        assert!(pool.get(10_000).capacity() >= LARGE_BUFFER_SIZE);
    }

    #[test]
    fn buffers_are_reused_with_capacity_intact() {
        let pool = BufferPool::new();
        {
            let mut buf = pool.get(512);
            buf.extend_from_slice(b"scratch");
        }
        let buf = pool.get(512);
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), SMALL_BUFFER_SIZE);
        let (_, reused) = pool.counters();
        assert_eq!(reused, 1);
    }

    #[test]
    fn oversize_requests_are_not_recycled() {
        let pool = BufferPool::new();
        {
            let _buf = pool.get(LARGE_BUFFER_SIZE + 1);
        }
        let _second = pool.get(LARGE_BUFFER_SIZE + 1);
        let (allocated, reused) = pool.counters();
        assert_eq!(allocated, 2);
        assert_eq!(reused, 0);
    }
}
