use crate::config::MemoryConfig;
use crate::memory::PageNumber;

/// A virtual address decomposed into per-level table indices and an offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualAddress {
    pub va: u64,
    /// One index per table level, root level first.
    pub indices: Vec<usize>,
    pub offset: usize,
}

#[inline]
fn extract_bits(value: u64, start: u32, count: u32) -> u64 {
    (value >> start) & ((1u64 << count) - 1)
}

impl VirtualAddress {
    /// Split `va` for the geometry in `config`.
    ///
    /// The offset is the low `offset_width` bits. The remaining bits are cut
    /// into `offset_width`-bit chunks from the least significant end, filling
    /// the deepest level first; when they do not divide evenly the root index
    /// gets the narrower leftover chunk.
    ///
    /// Bits above the virtual address width are ignored; callers range-check
    /// first.
    pub fn split(va: u64, config: &MemoryConfig) -> Self {
        let width = config.offset_width;
        let depth = config.tables_depth();

        let offset = extract_bits(va, 0, width) as usize;
        let mut indices = vec![0usize; depth];
        for (chunk, index) in indices.iter_mut().rev().enumerate() {
            let start = width * (chunk as u32 + 1);
            let count = width.min(config.virtual_address_width - start);
            *index = extract_bits(va, start, count) as usize;
        }

        VirtualAddress { va, indices, offset }
    }

    /// The address with its offset bits removed.
    #[inline]
    pub fn page_number(&self, config: &MemoryConfig) -> PageNumber {
        self.va >> config.offset_width
    }

    /// Indices followed by the offset, `tables_depth + 1` values in all.
    pub fn parts(&self) -> Vec<usize> {
        let mut parts = self.indices.clone();
        parts.push(self.offset);
        parts
    }
}

impl std::fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VA({:#x}) = (", self.va)?;
        for index in &self.indices {
            write!(f, "{}, ", index)?;
        }
        write!(f, "w={})", self.offset)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_split_even_chunks() {
        // 20-bit VA, 4-bit offset: four 4-bit indices
        let config = MemoryConfig::default();
        let va = VirtualAddress::split(0xABCDE, &config);

        assert_eq!(va.indices, vec![0xA, 0xB, 0xC, 0xD]);
        assert_eq!(va.offset, 0xE);
        assert_eq!(va.page_number(&config), 0xABCD);
    }

    #[test]
    fn test_split_uneven_top_chunk() {
        // 10-bit VA, 3-bit offset: 7 index bits -> widths 1, 3, 3
        let config = MemoryConfig::new(3, 10, 16).unwrap();
        let va = VirtualAddress::split(0b1_101_011_110, &config);

        assert_eq!(va.indices, vec![0b1, 0b101, 0b011]);
        assert_eq!(va.offset, 0b110);
        assert_eq!(va.parts(), vec![1, 5, 3, 6]);
    }

    #[test]
    fn test_split_edge_cases() {
        let config = MemoryConfig::new(2, 6, 4).unwrap();

        let va = VirtualAddress::split(0, &config);
        assert_eq!(va.parts(), vec![0, 0, 0]);

        let va = VirtualAddress::split(63, &config);
        assert_eq!(va.parts(), vec![3, 3, 3]);
    }

    #[test]
    fn test_split_is_injective() {
        // Every address of a small space maps to a distinct tuple
        let config = MemoryConfig::new(3, 10, 16).unwrap();
        let tuples: HashSet<Vec<usize>> = (0..config.virtual_memory_size())
            .map(|va| VirtualAddress::split(va, &config).parts())
            .collect();
        assert_eq!(tuples.len() as u64, config.virtual_memory_size());
    }

    #[test]
    fn test_page_number_matches_indices() {
        // Concatenating the indices gives back the page number
        let config = MemoryConfig::new(3, 10, 16).unwrap();
        for raw in [0, 1, 77, 511, 1023] {
            let va = VirtualAddress::split(raw, &config);
            let page = va
                .indices
                .iter()
                .fold(0u64, |page, &index| (page << config.offset_width) | index as u64);
            assert_eq!(page, va.page_number(&config), "Failed for VA={}", raw);
        }
    }

    #[test]
    fn test_display() {
        let config = MemoryConfig::new(2, 6, 4).unwrap();
        let va = VirtualAddress::split(0b01_10_11, &config);
        assert_eq!(format!("{}", va), "VA(0x1b) = (1, 2, w=3)");
    }
}
