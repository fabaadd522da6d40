//! Memory geometry.
//!
//! All sizes the engine works with derive from three numbers: the offset
//! width, the virtual address width and the number of physical frames.

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::ConfigError;
use crate::memory::Word;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoryConfig {
    pub offset_width: u32,
    pub virtual_address_width: u32,
    pub num_frames: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        MemoryConfig {
            offset_width: OFFSET_WIDTH,
            virtual_address_width: VIRTUAL_ADDRESS_WIDTH,
            num_frames: NUM_FRAMES,
        }
    }
}

impl MemoryConfig {
    /// Build and validate a geometry.
    pub fn new(
        offset_width: u32,
        virtual_address_width: u32,
        num_frames: usize,
    ) -> Result<Self, ConfigError> {
        let config = MemoryConfig { offset_width, virtual_address_width, num_frames };
        config.validate()?;
        Ok(config)
    }

    /// Geometry where RAM is `2^physical_width` words.
    pub fn from_widths(
        offset_width: u32,
        virtual_address_width: u32,
        physical_address_width: u32,
    ) -> Result<Self, ConfigError> {
        if physical_address_width <= offset_width {
            return Err(ConfigError::PhysicalWidthTooSmall {
                width: physical_address_width,
                offset_width,
            });
        }
        let frames = 1usize
            .checked_shl(physical_address_width - offset_width)
            .unwrap_or(usize::MAX);
        Self::new(offset_width, virtual_address_width, frames)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.offset_width == 0 || self.offset_width > MAX_OFFSET_WIDTH {
            return Err(ConfigError::OffsetWidth {
                width: self.offset_width,
                max: MAX_OFFSET_WIDTH,
            });
        }
        if self.virtual_address_width <= self.offset_width {
            return Err(ConfigError::AddressWidthTooSmall {
                width: self.virtual_address_width,
                offset_width: self.offset_width,
            });
        }
        if self.virtual_address_width > MAX_VIRTUAL_ADDRESS_WIDTH {
            return Err(ConfigError::AddressWidthTooLarge {
                width: self.virtual_address_width,
                max: MAX_VIRTUAL_ADDRESS_WIDTH,
            });
        }
        if self.num_frames == 0 {
            return Err(ConfigError::NoFrames);
        }
        let max = Word::MAX as usize;
        if self.num_frames > max {
            return Err(ConfigError::TooManyFrames { frames: self.num_frames, max });
        }
        let words = self.num_frames.checked_mul(self.page_size());
        if words.is_none_or(|words| words > MAX_PHYSICAL_MEMORY_SIZE) {
            return Err(ConfigError::PhysicalMemoryTooLarge {
                frames: self.num_frames,
                page_size: self.page_size(),
                max: MAX_PHYSICAL_MEMORY_SIZE,
            });
        }
        if self.num_frames <= self.tables_depth() {
            log::warn!(
                "{} frames cannot hold a full path of {} tables plus a page; translations may fail",
                self.num_frames,
                self.tables_depth()
            );
        }
        Ok(())
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        1 << self.offset_width
    }

    /// Number of table levels between the root and a data page.
    #[inline]
    pub fn tables_depth(&self) -> usize {
        let index_bits = self.virtual_address_width - self.offset_width;
        index_bits.div_ceil(self.offset_width) as usize
    }

    #[inline]
    pub fn virtual_memory_size(&self) -> u64 {
        1 << self.virtual_address_width
    }

    #[inline]
    pub fn num_pages(&self) -> u64 {
        self.virtual_memory_size() >> self.offset_width
    }

    /// Size of RAM in words.
    #[inline]
    pub fn physical_memory_size(&self) -> usize {
        self.num_frames * self.page_size()
    }

    /// Physical address of word `offset` of `frame`.
    #[inline]
    pub fn frame_address(&self, frame: usize, offset: usize) -> usize {
        frame * self.page_size() + offset
    }
}
