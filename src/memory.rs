use std::collections::HashMap;

use crate::config::MemoryConfig;
use crate::constants::EMPTY_ENTRY;

/// Unit of physical memory, of table entries and of user data.
pub type Word = i32;
pub type FrameIndex = usize;
pub type PageNumber = u64;

/// Word-addressable RAM plus a backing store for evicted pages.
///
/// Physical addresses are `frame * page_size + offset`.
pub trait PhysicalStore {
    /// Number of frames the store can hold.
    fn num_frames(&self) -> usize;

    fn read(&self, address: usize) -> Word;

    fn write(&mut self, address: usize, value: Word);

    /// Load the persisted content of `page` into `frame`, or zeros if the
    /// page was never evicted.
    fn restore(&mut self, frame: FrameIndex, page: PageNumber);

    /// Persist the content of `frame` as `page`.
    fn evict(&mut self, frame: FrameIndex, page: PageNumber);

    /// Drop every persisted page; later restores zero-fill.
    fn discard_swap(&mut self);
}

/// Decode a table entry. Zero (and anything that is not a frame index) is unmapped.
#[inline]
pub fn entry_to_frame(entry: Word) -> Option<FrameIndex> {
    match FrameIndex::try_from(entry) {
        Ok(0) | Err(_) => None,
        Ok(frame) => Some(frame),
    }
}

/// Operation counters kept by `PhysicalMemory`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounters {
    pub reads: u64,
    pub writes: u64,
    pub restores: u64,
    pub evictions: u64,
}

pub struct PhysicalMemory {
    data: Box<[Word]>,
    page_size: usize,
    disk: Disk,
    counters: std::cell::Cell<StoreCounters>,
}

impl PhysicalMemory {
    /// Create RAM for `config`, initialized to all zeros, with an empty disk.
    pub fn new(config: &MemoryConfig) -> Self {
        PhysicalMemory {
            data: vec![EMPTY_ENTRY; config.physical_memory_size()].into_boxed_slice(),
            page_size: config.page_size(),
            disk: Disk::new(),
            counters: std::cell::Cell::new(StoreCounters::default()),
        }
    }

    /// Contents of one frame
    pub fn frame(&self, frame: FrameIndex) -> &[Word] {
        let start = frame * self.page_size;
        &self.data[start..start + self.page_size]
    }

    fn frame_mut(&mut self, frame: FrameIndex) -> &mut [Word] {
        let start = frame * self.page_size;
        &mut self.data[start..start + self.page_size]
    }

    pub fn disk(&self) -> &Disk {
        &self.disk
    }

    pub fn counters(&self) -> StoreCounters {
        self.counters.get()
    }

    fn count(&self, f: impl FnOnce(&mut StoreCounters)) {
        let mut counters = self.counters.get();
        f(&mut counters);
        self.counters.set(counters);
    }
}

impl PhysicalStore for PhysicalMemory {
    fn num_frames(&self) -> usize {
        self.data.len() / self.page_size
    }

    #[inline]
    fn read(&self, address: usize) -> Word {
        self.count(|c| c.reads += 1);
        self.data[address]
    }

    #[inline]
    fn write(&mut self, address: usize, value: Word) {
        self.count(|c| c.writes += 1);
        self.data[address] = value;
    }

    fn restore(&mut self, frame: FrameIndex, page: PageNumber) {
        self.count(|c| c.restores += 1);
        match self.disk.take(page) {
            Some(content) => self.frame_mut(frame).copy_from_slice(&content),
            None => self.frame_mut(frame).fill(EMPTY_ENTRY),
        }
    }

    fn evict(&mut self, frame: FrameIndex, page: PageNumber) {
        self.count(|c| c.evictions += 1);
        let content: Box<[Word]> = self.frame(frame).into();
        self.disk.store(page, content);
    }

    fn discard_swap(&mut self) {
        self.disk.clear();
    }
}

/// Swap area - holds the content of evicted pages, keyed by page number.
#[derive(Debug, Default)]
pub struct Disk {
    pages: HashMap<PageNumber, Box<[Word]>>,
}

impl Disk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persisted content of `page`, if any
    pub fn get(&self, page: PageNumber) -> Option<&[Word]> {
        self.pages.get(&page).map(|content| &content[..])
    }

    pub fn contains(&self, page: PageNumber) -> bool {
        self.pages.contains_key(&page)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    fn store(&mut self, page: PageNumber, content: Box<[Word]>) {
        if self.pages.insert(page, content).is_some() {
            log::warn!("page {:#x} evicted while an older copy was still on disk", page);
        }
    }

    fn clear(&mut self) {
        self.pages.clear();
    }

    /// A page leaves the disk once it is resident again.
    fn take(&mut self, page: PageNumber) -> Option<Box<[Word]>> {
        self.pages.remove(&page)
    }
}
