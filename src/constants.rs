/// Bits of a virtual address that select a word inside a page.
pub const OFFSET_WIDTH: u32 = 4;
pub const VIRTUAL_ADDRESS_WIDTH: u32 = 20;
pub const PHYSICAL_ADDRESS_WIDTH: u32 = 10;

pub const PAGE_SIZE: usize = 1 << OFFSET_WIDTH;
pub const RAM_SIZE: usize = 1 << PHYSICAL_ADDRESS_WIDTH;
pub const NUM_FRAMES: usize = RAM_SIZE / PAGE_SIZE;

/// Frame holding the top-level table. Never reclaimed or evicted.
pub const ROOT_FRAME: usize = 0;

/// Table entry value meaning "no child frame".
pub const EMPTY_ENTRY: i32 = 0;

pub const MAX_OFFSET_WIDTH: u32 = 20;
pub const MAX_VIRTUAL_ADDRESS_WIDTH: u32 = 63;
/// Largest simulated RAM, in words. The arena is allocated up front.
pub const MAX_PHYSICAL_MEMORY_SIZE: usize = 1 << 28;
