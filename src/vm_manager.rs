//! Page table walker and the public read/write API.
//!
//! The whole page table lives inside the physical store: frame 0 is the root
//! table, every other frame is either an inner table or a data page
//! depending on its depth. Missing levels are created on the way down.

use std::collections::HashMap;
use std::ops::ControlFlow;

use crate::config::MemoryConfig;
use crate::constants::{EMPTY_ENTRY, ROOT_FRAME};
use crate::error::{AuditError, ConfigError, MmuError};
use crate::frame_search::{self, Link};
use crate::frame_selector::{self, FrameSource};
use crate::memory::{FrameIndex, PageNumber, PhysicalMemory, PhysicalStore, Word, entry_to_frame};
use crate::translation::VirtualAddress;

/// Counters for the paging activity of one `VMManager`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PagingStats {
    /// Missing entries met during walks, at any level.
    pub page_faults: u64,
    pub reclaimed_tables: u64,
    pub fresh_frames: u64,
    pub evictions: u64,
}

/// A data page currently held in a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResidentPage {
    pub page: PageNumber,
    pub frame: FrameIndex,
}

pub struct VMManager<S: PhysicalStore = PhysicalMemory> {
    config: MemoryConfig,
    store: S,
    stats: PagingStats,
}

impl VMManager<PhysicalMemory> {
    /// Manager over a fresh, zeroed `PhysicalMemory` sized for `config`.
    pub fn with_config(config: MemoryConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let store = PhysicalMemory::new(&config);
        Ok(VMManager { config, store, stats: PagingStats::default() })
    }
}

impl<S: PhysicalStore> VMManager<S> {
    /// Manager over an existing store, which must hold at least
    /// `config.num_frames` frames.
    pub fn new(config: MemoryConfig, store: S) -> Result<Self, ConfigError> {
        config.validate()?;
        if store.num_frames() < config.num_frames {
            return Err(ConfigError::StoreTooSmall {
                frames: store.num_frames(),
                required: config.num_frames,
            });
        }
        Ok(VMManager { config, store, stats: PagingStats::default() })
    }

    /// Clear the root table, unmapping the whole address space.
    ///
    /// Swapped-out pages are dropped as well: every page reads as zero
    /// until written again.
    pub fn initialize(&mut self) {
        for slot in 0..self.config.page_size() {
            self.store
                .write(self.config.frame_address(ROOT_FRAME, slot), EMPTY_ENTRY);
        }
        self.store.discard_swap();
        self.stats = PagingStats::default();
    }

    pub fn read(&mut self, va: u64) -> Result<Word, MmuError> {
        let address = self.translate(va)?;
        Ok(self.store.read(address))
    }

    pub fn write(&mut self, va: u64, value: Word) -> Result<(), MmuError> {
        let address = self.translate(va)?;
        self.store.write(address, value);
        Ok(())
    }

    /// Physical address of the word at `va`, faulting pages in as needed.
    ///
    /// On `FrameExhaustion` tables installed by earlier levels of the same
    /// walk stay in place.
    pub fn translate(&mut self, va: u64) -> Result<usize, MmuError> {
        let limit = self.config.virtual_memory_size();
        if va >= limit {
            return Err(MmuError::OutOfRange { address: va, limit });
        }

        let address = VirtualAddress::split(va, &self.config);
        let page = address.page_number(&self.config);
        let depth = self.config.tables_depth();
        log::trace!("{}", address);

        let mut current = ROOT_FRAME;
        for (level, &index) in address.indices.iter().enumerate() {
            let entry_address = self.config.frame_address(current, index);
            if let Some(next) = entry_to_frame(self.store.read(entry_address)) {
                current = next;
                continue;
            }

            self.stats.page_faults += 1;
            log::debug!("page fault: page {:#x} level {} (table frame {})", page, level, current);
            let frame = self.fault_in(page, current, level + 1 == depth)?;
            self.store.write(entry_address, frame as Word);
            current = frame;
        }

        Ok(self.config.frame_address(current, address.offset))
    }

    /// Get a frame for a missing entry of table `parent` and prepare its content.
    fn fault_in(
        &mut self,
        page: PageNumber,
        parent: FrameIndex,
        is_data_page: bool,
    ) -> Result<FrameIndex, MmuError> {
        let selection = frame_selector::select_frame(&mut self.store, &self.config, page, parent)?;
        match selection.source {
            FrameSource::EmptyTable => self.stats.reclaimed_tables += 1,
            FrameSource::Unused => self.stats.fresh_frames += 1,
            FrameSource::Evicted { .. } => self.stats.evictions += 1,
        }

        let frame = selection.frame;
        if is_data_page {
            self.store.restore(frame, page);
        } else {
            for slot in 0..self.config.page_size() {
                self.store
                    .write(self.config.frame_address(frame, slot), EMPTY_ENTRY);
            }
        }
        Ok(frame)
    }

    /// Every resident data page, in walk order (ascending page number).
    pub fn resident_pages(&self) -> Vec<ResidentPage> {
        let mut pages = Vec::new();
        let _: ControlFlow<()> = frame_search::walk(&self.store, &self.config, |node| {
            if node.is_leaf(&self.config) {
                pages.push(ResidentPage { page: node.prefix, frame: node.frame });
            }
            ControlFlow::Continue(())
        });
        pages
    }

    /// Check that every entry references a frame below `num_frames` and that
    /// no frame is referenced twice.
    pub fn audit(&self) -> Result<(), AuditError> {
        let mut owners: HashMap<FrameIndex, Link> = HashMap::new();
        let flow = frame_search::walk(&self.store, &self.config, |node| {
            if node.frame >= self.config.num_frames {
                return ControlFlow::Break(AuditError::FrameOutOfBounds {
                    frame: node.frame,
                    link: node.link,
                });
            }
            if let Some(&first) = owners.get(&node.frame) {
                return ControlFlow::Break(AuditError::Aliased {
                    frame: node.frame,
                    first,
                    second: node.link,
                });
            }
            owners.insert(node.frame, node.link);
            ControlFlow::Continue(())
        });

        match flow {
            ControlFlow::Break(err) => Err(err),
            ControlFlow::Continue(()) => Ok(()),
        }
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn stats(&self) -> PagingStats {
        self.stats
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    /// OFFSET_WIDTH=2, TABLES_DEPTH=2, 16 pages of 4 words
    fn small_vm(frames: usize) -> VMManager {
        let config = MemoryConfig::new(2, 6, frames).unwrap();
        let mut vm = VMManager::with_config(config).unwrap();
        vm.initialize();
        vm
    }

    fn default_vm() -> VMManager {
        let mut vm = VMManager::with_config(MemoryConfig::default()).unwrap();
        vm.initialize();
        vm
    }

    #[test]
    fn test_initial_reads_are_zero() {
        let mut vm = default_vm();
        for va in [0, 1, 0x1234, 0xFFFFF] {
            assert_eq!(vm.read(va), Ok(0), "Failed for VA={:#x}", va);
        }
        assert!(vm.audit().is_ok());
    }

    #[test]
    fn test_write_then_read() {
        let mut vm = default_vm();
        assert_eq!(vm.write(13, 3), Ok(()));
        assert_eq!(vm.read(13), Ok(3));

        vm.write(13, -9).unwrap();
        assert_eq!(vm.read(13), Ok(-9));
        // Neighbouring word untouched
        assert_eq!(vm.read(12), Ok(0));
    }

    #[test]
    fn test_first_fault_builds_full_path() {
        let mut vm = default_vm();
        vm.write(0, 5).unwrap();

        // 4 table levels -> 3 inner tables plus one data page
        assert_eq!(vm.stats().page_faults, 4);
        assert_eq!(vm.stats().fresh_frames, 4);
        assert_eq!(vm.resident_pages(), vec![ResidentPage { page: 0, frame: 4 }]);
        // Root points at frame 1, each table at the next frame
        assert_eq!(vm.store().frame(0)[0], 1);
        assert_eq!(vm.store().frame(1)[0], 2);
        assert_eq!(vm.store().frame(2)[0], 3);
        assert_eq!(vm.store().frame(3)[0], 4);
        assert_eq!(vm.store().frame(4)[0], 5);
    }

    #[test]
    fn test_translate_returns_physical_address() {
        let mut vm = small_vm(4);
        // page 0 lands in frame 2, offset 3
        assert_eq!(vm.translate(3), Ok(2 * 4 + 3));
        // second translation of the same page does not fault
        let faults = vm.stats().page_faults;
        assert_eq!(vm.translate(1), Ok(2 * 4 + 1));
        assert_eq!(vm.stats().page_faults, faults);
    }

    #[test]
    fn test_out_of_range_has_no_side_effects() {
        let mut vm = small_vm(4);
        vm.write(5, 11).unwrap();
        let before: Vec<Word> = (0..4).flat_map(|f| vm.store().frame(f).to_vec()).collect();
        let stats = vm.stats();

        let limit = vm.config().virtual_memory_size();
        assert_eq!(vm.read(limit), Err(MmuError::OutOfRange { address: limit, limit }));
        assert_eq!(
            vm.write(u64::MAX, 1),
            Err(MmuError::OutOfRange { address: u64::MAX, limit })
        );

        let after: Vec<Word> = (0..4).flat_map(|f| vm.store().frame(f).to_vec()).collect();
        assert_eq!(before, after);
        assert_eq!(vm.stats(), stats);
    }

    #[test]
    fn test_eviction_scenario() {
        let mut vm = small_vm(4);

        // page 0, offset 1 -> tables: root[0] = 1, frame1[0] = 2 (data)
        vm.write(1, 7).unwrap();
        assert_eq!(vm.resident_pages(), vec![ResidentPage { page: 0, frame: 2 }]);

        // page 4 needs a new table (frame 3) and then a data frame: none left
        vm.write(16, 9).unwrap();
        assert_eq!(vm.stats().evictions, 1);
        assert_eq!(vm.resident_pages(), vec![ResidentPage { page: 4, frame: 2 }]);
        assert!(vm.store().disk().contains(0));

        // page 0 comes back from disk, pushing page 4 out
        assert_eq!(vm.read(1), Ok(7));
        assert_eq!(vm.stats().evictions, 2);
        assert_eq!(vm.resident_pages(), vec![ResidentPage { page: 0, frame: 2 }]);
        assert_eq!(vm.read(16), Ok(9));
        assert!(vm.audit().is_ok());
    }

    #[test]
    fn test_empty_table_is_reclaimed() {
        let mut vm = small_vm(4);
        vm.write(0, 1).unwrap(); // root[0] -> 1, page 0 in 2
        vm.write(16, 2).unwrap(); // root[1] -> 3, evicts page 0 -> frame 1 empty
        assert!(frame_search::is_empty_table(vm.store(), vm.config(), 1));

        // page 8 reuses the empty table frame 1 for its own table
        vm.write(32, 3).unwrap();
        assert_eq!(vm.stats().reclaimed_tables, 1);
        assert_eq!(vm.store().frame(0)[0], 0);
        assert_eq!(vm.store().frame(0)[2], 1);
        assert!(vm.audit().is_ok());

        assert_eq!(vm.read(0), Ok(1));
        assert_eq!(vm.read(16), Ok(2));
        assert_eq!(vm.read(32), Ok(3));
    }

    #[test]
    fn test_exhaustion_keeps_partial_tables() {
        // Two frames cannot hold the root, a table and a data page
        let mut vm = small_vm(2);
        assert_eq!(vm.write(0, 1), Err(MmuError::FrameExhaustion { page: 0 }));

        // The inner table installed by the first level is not rolled back
        assert_eq!(vm.store().frame(0)[0], 1);
        assert!(vm.resident_pages().is_empty());
        assert!(vm.audit().is_ok());
        assert_eq!(vm.read(0), Err(MmuError::FrameExhaustion { page: 0 }));
    }

    #[test]
    fn test_initialize_unmaps_everything() {
        let mut vm = small_vm(8);
        vm.write(5, 42).unwrap();
        vm.initialize();

        assert!(vm.resident_pages().is_empty());
        assert_eq!(vm.stats(), PagingStats::default());
        // Stale frame content is replaced by a zero page
        assert_eq!(vm.read(5), Ok(0));
    }

    #[test]
    fn test_initialize_discards_swapped_pages() {
        let mut vm = small_vm(4);
        vm.write(1, 7).unwrap();
        // page 4 pushes page 0 out to disk
        vm.write(16, 9).unwrap();
        assert!(vm.store().disk().contains(0));

        vm.initialize();
        assert!(vm.store().disk().is_empty());
        assert!(vm.resident_pages().is_empty());

        assert_eq!(vm.read(1), Ok(0));
        assert_eq!(vm.read(16), Ok(0));
        assert!(vm.audit().is_ok());
    }

    #[test]
    fn test_initialize_after_pressure_reads_zero_everywhere() {
        let mut vm = small_vm(4);
        let num_pages = vm.config().num_pages();
        let page_size = vm.config().page_size() as u64;
        for page in 0..num_pages {
            vm.write(page * page_size, page as Word + 1).unwrap();
        }
        assert!(vm.stats().evictions > 0);

        vm.initialize();
        for page in 0..num_pages {
            assert_eq!(vm.read(page * page_size), Ok(0), "page {}", page);
        }
    }

    #[test]
    fn test_new_rejects_undersized_store() {
        let config = MemoryConfig::new(2, 6, 16).unwrap();
        let store = PhysicalMemory::new(&MemoryConfig::new(2, 6, 2).unwrap());
        assert!(matches!(
            VMManager::new(config, store),
            Err(ConfigError::StoreTooSmall { frames: 2, required: 16 })
        ));

        let store = PhysicalMemory::new(&config);
        let mut vm = VMManager::new(config, store).unwrap();
        vm.initialize();
        assert_eq!(vm.write(0, 1), Ok(()));
        assert_eq!(vm.read(0), Ok(1));
    }

    #[test]
    fn test_audit_detects_aliasing() {
        let mut vm = small_vm(8);
        vm.write(0, 1).unwrap();
        vm.write(4, 2).unwrap(); // page 1 shares table frame 1
        let config = *vm.config();
        // Point page 1 at page 0's data frame
        let shared = vm.store().frame(1)[0];
        vm.store_mut().write(config.frame_address(1, 1), shared);

        assert_eq!(
            vm.audit(),
            Err(AuditError::Aliased {
                frame: shared as usize,
                first: Link { table: 1, slot: 0 },
                second: Link { table: 1, slot: 1 },
            })
        );
    }

    #[test]
    fn test_audit_detects_out_of_bounds_entry() {
        let mut vm = small_vm(4);
        let config = *vm.config();
        vm.store_mut().write(config.frame_address(0, 3), 9);

        assert_eq!(
            vm.audit(),
            Err(AuditError::FrameOutOfBounds { frame: 9, link: Link { table: 0, slot: 3 } })
        );
    }

    #[test]
    fn test_every_page_round_trips_under_pressure() {
        // Default geometry: 64 frames for 65536 pages
        let mut vm = default_vm();
        let config = *vm.config();
        let page_size = config.page_size() as u64;
        let pages: Vec<u64> = (0..200).map(|i| i * 331 % config.num_pages()).collect();

        for (i, &page) in pages.iter().enumerate() {
            vm.write(page * page_size + i as u64 % page_size, i as Word + 1).unwrap();
        }
        assert!(vm.stats().evictions > 0);

        for (i, &page) in pages.iter().enumerate() {
            let va = page * page_size + i as u64 % page_size;
            assert_eq!(vm.read(va), Ok(i as Word + 1), "Failed for VA={:#x}", va);
        }
        assert!(vm.audit().is_ok());
    }

    #[test]
    fn test_random_workload_matches_model() {
        for (seed, frames) in [(1, 4), (2, 5), (3, 8), (4, 16)] {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut vm = small_vm(frames);
            let size = vm.config().virtual_memory_size();
            let mut model: HashMap<u64, Word> = HashMap::new();

            for _ in 0..2000 {
                let va = rng.gen_range(0..size);
                if rng.gen_bool(0.5) {
                    let value: Word = rng.r#gen();
                    vm.write(va, value).unwrap();
                    model.insert(va, value);
                } else {
                    let expected = model.get(&va).copied().unwrap_or(0);
                    assert_eq!(vm.read(va), Ok(expected), "seed {} VA={}", seed, va);
                }
                assert_eq!(vm.audit(), Ok(()), "seed {}", seed);
                assert!(vm.resident_pages().iter().all(|p| p.frame != ROOT_FRAME));
            }
        }
    }
}
