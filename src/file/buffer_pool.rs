//! Buffer pool: a bounded in-memory cache of pages with LRU eviction.
//!
//! Every page read or write goes through the pool. `get_page` and
//! `get_page_mut` return guards that pin the underlying frame for their
//! lifetime; dropping a guard releases the pin (and, for write guards,
//! records dirtiness), so a pin can never be leaked and a page can never be
//! mutated after release.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use lru::LruCache;

use super::error::{FileError, FileResult};
use super::page_file::PageFile;
use super::{BUFFER_POOL_SIZE, FrameId, PAGE_SIZE, PageId};

/// Cache performance counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Requests served from a resident frame
    pub hits: u64,
    /// Requests that had to load the page from disk
    pub misses: u64,
}

impl PoolStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total > 0 {
            self.hits as f64 / total as f64
        } else {
            0.0
        }
    }
}

/// One in-memory page slot. The data buffer has its own lock so guards can
/// outlive the pool's state mutex.
struct Frame {
    data: RwLock<Vec<u8>>,
}

impl Frame {
    fn new() -> Self {
        Self {
            data: RwLock::new(vec![0u8; PAGE_SIZE]),
        }
    }
}

/// Bookkeeping for one frame, kept under the state mutex.
#[derive(Debug, Clone, Copy)]
struct FrameMeta {
    page_id: Option<PageId>,
    pin_count: u32,
    dirty: bool,
}

impl FrameMeta {
    fn new() -> Self {
        Self {
            page_id: None,
            pin_count: 0,
            dirty: false,
        }
    }

    fn clear(&mut self) {
        *self = Self::new();
    }
}

/// Mutable pool state: page table, frame metadata, free list, the
/// evictable-frame LRU set and the hit/miss counters. One mutex covers all
/// of it for the duration of each public call.
struct PoolState {
    page_table: HashMap<PageId, FrameId>,
    meta: Vec<FrameMeta>,
    free_list: Vec<FrameId>,
    /// Unpinned frames in recency order; `pop_lru` yields the victim.
    evictable: LruCache<FrameId, ()>,
    stats: PoolStats,
}

/// Buffer pool over one page file.
pub struct BufferPool {
    file: Mutex<PageFile>,
    state: Mutex<PoolState>,
    frames: Vec<Frame>,
    pool_size: usize,
}

impl BufferPool {
    /// Create a pool with the default frame count.
    pub fn new(file: PageFile) -> Self {
        Self::with_capacity(file, BUFFER_POOL_SIZE)
    }

    /// Create a pool with `capacity` frames.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn with_capacity(file: PageFile, capacity: usize) -> Self {
        let frames: Vec<_> = (0..capacity).map(|_| Frame::new()).collect();

        let state = PoolState {
            page_table: HashMap::with_capacity(capacity),
            meta: vec![FrameMeta::new(); capacity],
            free_list: (0..capacity).rev().collect(),
            evictable: LruCache::new(NonZeroUsize::new(capacity).unwrap()),
            stats: PoolStats::default(),
        };

        Self {
            file: Mutex::new(file),
            state: Mutex::new(state),
            frames,
            pool_size: capacity,
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Fetch a page for reading. The returned guard holds a pin until
    /// dropped; several read guards for the same page may coexist.
    pub fn get_page(&self, page_id: PageId) -> FileResult<PageReadGuard<'_>> {
        let frame_id = self.pin_frame(page_id)?;
        let data = self.frames[frame_id]
            .data
            .read()
            .expect("frame lock poisoned");
        Ok(PageReadGuard {
            pool: self,
            frame_id,
            page_id,
            data,
        })
    }

    /// Fetch a page for writing. Call `mark_dirty` on the guard after
    /// mutating; the dirty flag is recorded when the guard drops.
    pub fn get_page_mut(&self, page_id: PageId) -> FileResult<PageWriteGuard<'_>> {
        let frame_id = self.pin_frame(page_id)?;
        let data = self.frames[frame_id]
            .data
            .write()
            .expect("frame lock poisoned");
        Ok(PageWriteGuard {
            pool: self,
            frame_id,
            page_id,
            data,
            dirty: false,
        })
    }

    /// Write the page to disk if it is resident and dirty, then clear the
    /// dirty flag. Idempotent; a non-resident page is a no-op.
    pub fn flush_page(&self, page_id: PageId) -> FileResult<()> {
        let frame_id = {
            let state = self.state.lock().expect("buffer pool lock poisoned");
            match state.page_table.get(&page_id) {
                Some(&fid) if state.meta[fid].dirty => fid,
                _ => return Ok(()),
            }
        };

        // The frame lock is taken without holding the state mutex, so a
        // writer dropping its guard cannot deadlock against us.
        {
            let data = self.frames[frame_id]
                .data
                .read()
                .expect("frame lock poisoned");
            let mut file = self.file.lock().expect("page file lock poisoned");
            file.write_page(page_id, &data)?;
        }

        let mut state = self.state.lock().expect("buffer pool lock poisoned");
        if state.meta[frame_id].page_id == Some(page_id) {
            state.meta[frame_id].dirty = false;
        }
        Ok(())
    }

    /// Write every dirty resident page to disk, then sync the file.
    pub fn flush_all(&self) -> FileResult<()> {
        let dirty_pages: Vec<PageId> = {
            let state = self.state.lock().expect("buffer pool lock poisoned");
            state
                .meta
                .iter()
                .filter(|m| m.dirty)
                .filter_map(|m| m.page_id)
                .collect()
        };

        for page_id in dirty_pages {
            self.flush_page(page_id)?;
        }

        let mut file = self.file.lock().expect("page file lock poisoned");
        file.flush()
    }

    pub fn stats(&self) -> PoolStats {
        self.state
            .lock()
            .expect("buffer pool lock poisoned")
            .stats
    }

    pub fn is_resident(&self, page_id: PageId) -> bool {
        self.state
            .lock()
            .expect("buffer pool lock poisoned")
            .page_table
            .contains_key(&page_id)
    }

    pub fn resident_count(&self) -> usize {
        self.state
            .lock()
            .expect("buffer pool lock poisoned")
            .page_table
            .len()
    }

    pub fn dirty_count(&self) -> usize {
        self.state
            .lock()
            .expect("buffer pool lock poisoned")
            .meta
            .iter()
            .filter(|m| m.dirty)
            .count()
    }

    /// Pin the frame holding `page_id`, loading the page on a miss.
    fn pin_frame(&self, page_id: PageId) -> FileResult<FrameId> {
        let mut state = self.state.lock().expect("buffer pool lock poisoned");

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            state.stats.hits += 1;
            state.meta[frame_id].pin_count += 1;
            // A pinned frame is not an eviction candidate
            state.evictable.pop(&frame_id);
            return Ok(frame_id);
        }

        state.stats.misses += 1;
        let frame_id = self.take_frame(&mut state, page_id)?;

        let read_result = {
            let mut data = self.frames[frame_id]
                .data
                .write()
                .expect("frame lock poisoned");
            let mut file = self.file.lock().expect("page file lock poisoned");
            file.read_page(page_id, &mut data)
        };
        if let Err(e) = read_result {
            state.free_list.push(frame_id);
            return Err(e);
        }

        state.page_table.insert(page_id, frame_id);
        state.meta[frame_id] = FrameMeta {
            page_id: Some(page_id),
            pin_count: 1,
            dirty: false,
        };
        Ok(frame_id)
    }

    /// Obtain an empty frame: from the free list, or by evicting the least
    /// recently used unpinned frame (writing it back first when dirty).
    fn take_frame(&self, state: &mut PoolState, for_page: PageId) -> FileResult<FrameId> {
        if let Some(frame_id) = state.free_list.pop() {
            return Ok(frame_id);
        }

        let Some((frame_id, ())) = state.evictable.pop_lru() else {
            return Err(FileError::NoEvictableFrame(for_page));
        };

        let meta = state.meta[frame_id];
        if let Some(old_page) = meta.page_id {
            if meta.dirty {
                // The victim is unpinned, so no guard holds its data lock
                let write_result = {
                    let data = self.frames[frame_id]
                        .data
                        .read()
                        .expect("frame lock poisoned");
                    let mut file = self.file.lock().expect("page file lock poisoned");
                    file.write_page(old_page, &data)
                };
                if let Err(e) = write_result {
                    state.evictable.put(frame_id, ());
                    return Err(e);
                }
            }
            state.page_table.remove(&old_page);
        }

        self.frames[frame_id]
            .data
            .write()
            .expect("frame lock poisoned")
            .fill(0);
        state.meta[frame_id].clear();

        Ok(frame_id)
    }

    /// Drop one pin from a frame; called from guard destructors. Once the
    /// pin count reaches zero the frame becomes an eviction candidate at
    /// the most recently used position.
    fn unpin(&self, frame_id: FrameId, dirty: bool) {
        let mut state = self.state.lock().expect("buffer pool lock poisoned");
        let meta = &mut state.meta[frame_id];

        if meta.pin_count > 0 {
            meta.pin_count -= 1;
            if dirty {
                meta.dirty = true;
            }
            if meta.pin_count == 0 {
                state.evictable.put(frame_id, ());
            }
        }
    }
}

impl Drop for BufferPool {
    fn drop(&mut self) {
        // Dirty pages must reach disk before the pool goes away
        let _ = self.flush_all();
    }
}

/// Shared borrow of a resident page. Dropping the guard releases the pin.
pub struct PageReadGuard<'a> {
    pool: &'a BufferPool,
    frame_id: FrameId,
    page_id: PageId,
    data: RwLockReadGuard<'a, Vec<u8>>,
}

impl PageReadGuard<'_> {
    pub fn page_id(&self) -> PageId {
        self.page_id
    }
}

impl Deref for PageReadGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl Drop for PageReadGuard<'_> {
    fn drop(&mut self) {
        self.pool.unpin(self.frame_id, false);
    }
}

/// Exclusive borrow of a resident page. Mutations must be followed by
/// `mark_dirty` before the guard drops, or they are lost on eviction.
pub struct PageWriteGuard<'a> {
    pool: &'a BufferPool,
    frame_id: FrameId,
    page_id: PageId,
    data: RwLockWriteGuard<'a, Vec<u8>>,
    dirty: bool,
}

impl PageWriteGuard<'_> {
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

impl Deref for PageWriteGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl DerefMut for PageWriteGuard<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Drop for PageWriteGuard<'_> {
    fn drop(&mut self) {
        self.pool.unpin(self.frame_id, self.dirty);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup(capacity: usize) -> (TempDir, BufferPool) {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = PageFile::open(temp_dir.path().join("test.db")).unwrap();
        (temp_dir, BufferPool::with_capacity(file, capacity))
    }

    #[test]
    fn test_fresh_page_is_zeroed() {
        let (_temp_dir, pool) = setup(4);

        let guard = pool.get_page(1).unwrap();
        assert_eq!(guard.len(), PAGE_SIZE);
        assert!(guard.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_write_then_read_back() {
        let (_temp_dir, pool) = setup(4);

        {
            let mut guard = pool.get_page_mut(1).unwrap();
            guard[0] = 42;
            guard.mark_dirty();
        }

        let guard = pool.get_page(1).unwrap();
        assert_eq!(guard[0], 42);
    }

    #[test]
    fn test_hit_miss_counters() {
        let (_temp_dir, pool) = setup(4);

        pool.get_page(1).unwrap();
        pool.get_page(2).unwrap();
        pool.get_page(1).unwrap();

        let stats = pool.stats();
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_lru_eviction_order() {
        // Capacity 4, accesses 1,2,3,4,1,5: the re-access of page 1 is the
        // only hit and page 2 is the eviction victim.
        let (_temp_dir, pool) = setup(4);

        for page_id in [1, 2, 3, 4, 1, 5] {
            let guard = pool.get_page(page_id).unwrap();
            drop(guard);
        }

        let stats = pool.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 5);

        assert!(!pool.is_resident(2));
        for page_id in [1, 3, 4, 5] {
            assert!(pool.is_resident(page_id), "page {} evicted", page_id);
        }
        assert_eq!(pool.resident_count(), 4);
    }

    #[test]
    fn test_dirty_page_written_back_on_eviction() {
        let (_temp_dir, pool) = setup(2);

        {
            let mut guard = pool.get_page_mut(1).unwrap();
            guard[0] = 99;
            guard.mark_dirty();
        }

        // Force page 1 out of the pool
        drop(pool.get_page(2).unwrap());
        drop(pool.get_page(3).unwrap());
        assert!(!pool.is_resident(1));

        let guard = pool.get_page(1).unwrap();
        assert_eq!(guard[0], 99);
    }

    #[test]
    fn test_unmarked_mutation_lost_on_eviction() {
        let (_temp_dir, pool) = setup(2);

        {
            let mut guard = pool.get_page_mut(1).unwrap();
            guard[0] = 99;
            // No mark_dirty: the mutation must not survive eviction
        }

        drop(pool.get_page(2).unwrap());
        drop(pool.get_page(3).unwrap());

        let guard = pool.get_page(1).unwrap();
        assert_eq!(guard[0], 0);
    }

    #[test]
    fn test_all_pinned_fails() {
        let (_temp_dir, pool) = setup(2);

        let _g1 = pool.get_page(1).unwrap();
        let _g2 = pool.get_page(2).unwrap();

        let result = pool.get_page(3);
        assert!(matches!(result, Err(FileError::NoEvictableFrame(3))));
    }

    #[test]
    fn test_pin_released_on_drop() {
        let (_temp_dir, pool) = setup(2);

        {
            let _g1 = pool.get_page(1).unwrap();
            let _g2 = pool.get_page(2).unwrap();
        }

        // Both guards dropped, so a third page can now be loaded
        assert!(pool.get_page(3).is_ok());
    }

    #[test]
    fn test_shared_read_guards() {
        let (_temp_dir, pool) = setup(4);

        let g1 = pool.get_page(1).unwrap();
        let g2 = pool.get_page(1).unwrap();
        assert_eq!(g1.page_id(), g2.page_id());
        assert_eq!(pool.resident_count(), 1);
    }

    #[test]
    fn test_flush_page_writes_frame_bytes() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("test.db");
        let pool = BufferPool::with_capacity(PageFile::open(&path).unwrap(), 4);

        {
            let mut guard = pool.get_page_mut(1).unwrap();
            guard[0] = 7;
            guard[100] = 8;
            guard.mark_dirty();
        }
        assert_eq!(pool.dirty_count(), 1);

        pool.flush_page(1).unwrap();
        assert_eq!(pool.dirty_count(), 0);

        // On-disk bytes equal the frame bytes at the moment of mark_dirty
        let mut file = PageFile::open(&path).unwrap();
        let mut buffer = vec![0u8; PAGE_SIZE];
        file.read_page(1, &mut buffer).unwrap();
        assert_eq!(buffer[0], 7);
        assert_eq!(buffer[100], 8);
    }

    #[test]
    fn test_flush_page_not_resident_is_noop() {
        let (_temp_dir, pool) = setup(2);
        pool.flush_page(42).unwrap();
    }

    #[test]
    fn test_flush_all_idempotent() {
        let (_temp_dir, pool) = setup(4);

        for page_id in 1..=3 {
            let mut guard = pool.get_page_mut(page_id).unwrap();
            guard[0] = page_id as u8;
            guard.mark_dirty();
        }

        pool.flush_all().unwrap();
        assert_eq!(pool.dirty_count(), 0);

        // A second flush with no intervening mutation changes nothing
        pool.flush_all().unwrap();
        assert_eq!(pool.dirty_count(), 0);

        for page_id in 1..=3u32 {
            let guard = pool.get_page(page_id).unwrap();
            assert_eq!(guard[0], page_id as u8);
        }
    }

    #[test]
    fn test_drop_flushes_dirty_pages() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("test.db");

        {
            let pool = BufferPool::with_capacity(PageFile::open(&path).unwrap(), 4);
            let mut guard = pool.get_page_mut(1).unwrap();
            guard[0] = 88;
            guard.mark_dirty();
            // Pool dropped here; dirty frame must be flushed
        }

        let pool = BufferPool::with_capacity(PageFile::open(&path).unwrap(), 4);
        let guard = pool.get_page(1).unwrap();
        assert_eq!(guard[0], 88);
    }

    #[test]
    fn test_lru_promotion_on_access() {
        let (_temp_dir, pool) = setup(3);

        for page_id in [1, 2, 3] {
            drop(pool.get_page(page_id).unwrap());
        }
        // Touch page 1 so page 2 becomes the LRU victim
        drop(pool.get_page(1).unwrap());
        drop(pool.get_page(4).unwrap());

        assert!(pool.is_resident(1));
        assert!(!pool.is_resident(2));
        assert!(pool.is_resident(3));
        assert!(pool.is_resident(4));
    }
}
