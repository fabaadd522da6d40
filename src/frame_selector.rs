//! Produces a frame for a page fault.
//!
//! Tiers, in order:
//! 1. reclaim an empty table (first in walk order), unhooking it from its parent;
//! 2. take the frame above the highest index referenced anywhere in the tree;
//! 3. evict the data page chosen by [`eviction::find_victim`].
//!
//! The excluded frame is the table the caller is currently filling in; it
//! is never handed out even when empty.

use std::fmt;
use std::ops::ControlFlow;

use crate::config::MemoryConfig;
use crate::constants::ROOT_FRAME;
use crate::error::MmuError;
use crate::eviction;
use crate::frame_search::{self, Node};
use crate::memory::{FrameIndex, PageNumber, PhysicalStore};

/// Where a selected frame came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSource {
    EmptyTable,
    Unused,
    Evicted { page: PageNumber },
}

impl fmt::Display for FrameSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameSource::EmptyTable => write!(f, "reclaimed empty table"),
            FrameSource::Unused => write!(f, "unused frame"),
            FrameSource::Evicted { page } => write!(f, "evicted page {:#x}", page),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub frame: FrameIndex,
    pub source: FrameSource,
}

pub fn select_frame<S>(
    store: &mut S,
    config: &MemoryConfig,
    target: PageNumber,
    exclude: FrameIndex,
) -> Result<Selection, MmuError>
where
    S: PhysicalStore + ?Sized,
{
    let mut highest = ROOT_FRAME;
    let empty_table = frame_search::walk(&*store, config, |node: &Node| {
        highest = highest.max(node.frame);
        if !node.is_leaf(config)
            && node.frame != exclude
            && frame_search::is_empty_table(&*store, config, node.frame)
        {
            ControlFlow::Break(*node)
        } else {
            ControlFlow::Continue(())
        }
    });

    let selection = if let ControlFlow::Break(node) = empty_table {
        frame_search::detach(store, config, node.link);
        Selection { frame: node.frame, source: FrameSource::EmptyTable }
    } else if highest + 1 < config.num_frames {
        Selection { frame: highest + 1, source: FrameSource::Unused }
    } else if let Some(victim) = eviction::find_victim(&*store, config, target) {
        frame_search::detach(store, config, victim.link);
        store.evict(victim.frame, victim.page);
        Selection {
            frame: victim.frame,
            source: FrameSource::Evicted { page: victim.page },
        }
    } else {
        log::warn!(
            "no empty table, unused frame or resident page for page {:#x}",
            target
        );
        return Err(MmuError::FrameExhaustion { page: target });
    };

    if selection.frame == ROOT_FRAME || selection.frame == exclude {
        log::warn!("refusing frame {} for page {:#x}", selection.frame, target);
        return Err(MmuError::FrameExhaustion { page: target });
    }

    log::debug!(
        "page {:#x}: frame {} ({})",
        target,
        selection.frame,
        selection.source
    );
    Ok(selection)
}
