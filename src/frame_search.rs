//! Depth-first walk over every frame reachable from the root table.
//!
//! The walk visits entries in ascending slot order and descends into a
//! child table right after visiting it, so "first match" means first in
//! that fixed order. Recursion depth is bounded by `tables_depth`.

use std::fmt;
use std::ops::ControlFlow;

use crate::config::MemoryConfig;
use crate::constants::{EMPTY_ENTRY, ROOT_FRAME};
use crate::memory::{FrameIndex, PageNumber, PhysicalStore, entry_to_frame};

/// Position of a table entry: the table frame and the slot inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub table: FrameIndex,
    pub slot: usize,
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame {}[{}]", self.table, self.slot)
    }
}

/// A non-empty table entry found during the walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Node {
    pub frame: FrameIndex,
    /// Depth of `frame`; the root is depth 0, data pages sit at `tables_depth`.
    pub depth: usize,
    /// Entry that references `frame`.
    pub link: Link,
    /// Indices along the path, concatenated. For a data page this is its page number.
    pub prefix: PageNumber,
}

impl Node {
    #[inline]
    pub fn is_leaf(&self, config: &MemoryConfig) -> bool {
        self.depth == config.tables_depth()
    }
}

/// Call `visit` on every mapped entry of the tree, stopping at the first `Break`.
///
/// Entries are passed to `visit` before the walk descends into them, so the
/// visitor may stop the walk before a frame it rejects is read.
pub fn walk<S, B, F>(store: &S, config: &MemoryConfig, mut visit: F) -> ControlFlow<B>
where
    S: PhysicalStore + ?Sized,
    F: FnMut(&Node) -> ControlFlow<B>,
{
    walk_table(store, config, ROOT_FRAME, 0, 0, &mut visit)
}

fn walk_table<S, B, F>(
    store: &S,
    config: &MemoryConfig,
    table: FrameIndex,
    depth: usize,
    prefix: PageNumber,
    visit: &mut F,
) -> ControlFlow<B>
where
    S: PhysicalStore + ?Sized,
    F: FnMut(&Node) -> ControlFlow<B>,
{
    for slot in 0..config.page_size() {
        let Some(frame) = entry_to_frame(store.read(config.frame_address(table, slot))) else {
            continue;
        };
        let node = Node {
            frame,
            depth: depth + 1,
            link: Link { table, slot },
            prefix: (prefix << config.offset_width) | slot as PageNumber,
        };
        visit(&node)?;
        if !node.is_leaf(config) {
            walk_table(store, config, frame, node.depth, node.prefix, visit)?;
        }
    }
    ControlFlow::Continue(())
}

/// True when every entry of `frame` is unmapped.
pub fn is_empty_table<S>(store: &S, config: &MemoryConfig, frame: FrameIndex) -> bool
where
    S: PhysicalStore + ?Sized,
{
    (0..config.page_size()).all(|slot| store.read(config.frame_address(frame, slot)) == EMPTY_ENTRY)
}

/// Zero the entry at `link`, cutting its child out of the tree.
pub fn detach<S>(store: &mut S, config: &MemoryConfig, link: Link)
where
    S: PhysicalStore + ?Sized,
{
    store.write(config.frame_address(link.table, link.slot), EMPTY_ENTRY);
}
