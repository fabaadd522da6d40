//! Victim choice when no frame is free: evict the resident page furthest
//! from the page being faulted in, measured around the page-number circle.

use std::ops::ControlFlow;

use crate::config::MemoryConfig;
use crate::frame_search::{self, Link};
use crate::memory::{FrameIndex, PageNumber, PhysicalStore};

/// `min(|p1 - p2|, num_pages - |p1 - p2|)`
#[inline]
pub fn cyclic_distance(p1: PageNumber, p2: PageNumber, num_pages: u64) -> u64 {
    let diff = p1.abs_diff(p2);
    diff.min(num_pages - diff)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Victim {
    pub frame: FrameIndex,
    /// Parent entry, cleared on eviction.
    pub link: Link,
    pub page: PageNumber,
    pub distance: u64,
}

/// Find the resident page with the largest cyclic distance to `target`.
///
/// Ties go to the page met first in the walk, i.e. the lowest page number.
/// Returns `None` when no data page is resident.
pub fn find_victim<S>(store: &S, config: &MemoryConfig, target: PageNumber) -> Option<Victim>
where
    S: PhysicalStore + ?Sized,
{
    let num_pages = config.num_pages();
    let mut victim: Option<Victim> = None;

    let _: ControlFlow<()> = frame_search::walk(store, config, |node| {
        if node.is_leaf(config) {
            let distance = cyclic_distance(node.prefix, target, num_pages);
            if victim.is_none_or(|best| distance > best.distance) {
                victim = Some(Victim {
                    frame: node.frame,
                    link: node.link,
                    page: node.prefix,
                    distance,
                });
            }
        }
        ControlFlow::Continue(())
    });

    victim
}
