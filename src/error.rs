//! Error types, one enum per subsystem.
//!
//! Every enum carries a short `name()` used in log lines and a `Display`
//! impl with the details.

use std::fmt;

use crate::frame_search::Link;
use crate::memory::{FrameIndex, PageNumber};

/// Failure of a translation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmuError {
    /// Virtual address at or beyond the end of the address space.
    OutOfRange { address: u64, limit: u64 },
    /// No frame could be produced for a page fault.
    FrameExhaustion { page: PageNumber },
}

impl MmuError {
    pub const fn name(&self) -> &'static str {
        match self {
            MmuError::OutOfRange { .. } => "virtual address out of range",
            MmuError::FrameExhaustion { .. } => "no frame available",
        }
    }
}

impl fmt::Display for MmuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MmuError::OutOfRange { address, limit } => {
                write!(f, "{}: {:#x} >= {:#x}", self.name(), address, limit)
            }
            MmuError::FrameExhaustion { page } => {
                write!(f, "{} while faulting in page {:#x}", self.name(), page)
            }
        }
    }
}

impl std::error::Error for MmuError {}

/// Rejected memory geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    OffsetWidth { width: u32, max: u32 },
    AddressWidthTooSmall { width: u32, offset_width: u32 },
    AddressWidthTooLarge { width: u32, max: u32 },
    PhysicalWidthTooSmall { width: u32, offset_width: u32 },
    NoFrames,
    /// Table entries are words, so every frame index must fit in one.
    TooManyFrames { frames: usize, max: usize },
    PhysicalMemoryTooLarge { frames: usize, page_size: usize, max: usize },
    /// The store handed to `VMManager::new` has fewer frames than the geometry.
    StoreTooSmall { frames: usize, required: usize },
}

impl ConfigError {
    pub const fn name(&self) -> &'static str {
        match self {
            ConfigError::OffsetWidth { .. } => "invalid offset width",
            ConfigError::AddressWidthTooSmall { .. } => "virtual address width too small",
            ConfigError::AddressWidthTooLarge { .. } => "virtual address width too large",
            ConfigError::PhysicalWidthTooSmall { .. } => "physical address width too small",
            ConfigError::NoFrames => "no physical frames",
            ConfigError::TooManyFrames { .. } => "too many physical frames",
            ConfigError::PhysicalMemoryTooLarge { .. } => "physical memory too large",
            ConfigError::StoreTooSmall { .. } => "physical store too small",
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::OffsetWidth { width, max } => {
                write!(f, "{}: {} (expected 1..={})", self.name(), width, max)
            }
            ConfigError::AddressWidthTooSmall { width, offset_width }
            | ConfigError::PhysicalWidthTooSmall { width, offset_width } => write!(
                f,
                "{}: {} must exceed the offset width {}",
                self.name(),
                width,
                offset_width
            ),
            ConfigError::AddressWidthTooLarge { width, max } => {
                write!(f, "{}: {} (max {})", self.name(), width, max)
            }
            ConfigError::NoFrames => write!(f, "{}", self.name()),
            ConfigError::TooManyFrames { frames, max } => {
                write!(f, "{}: {} (max {})", self.name(), frames, max)
            }
            ConfigError::PhysicalMemoryTooLarge { frames, page_size, max } => write!(
                f,
                "{}: {} frames of {} words (max {} words)",
                self.name(),
                frames,
                page_size,
                max
            ),
            ConfigError::StoreTooSmall { frames, required } => write!(
                f,
                "{}: {} frames, geometry needs {}",
                self.name(),
                frames,
                required
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Broken page-table invariant found by `VMManager::audit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditError {
    FrameOutOfBounds { frame: FrameIndex, link: Link },
    Aliased { frame: FrameIndex, first: Link, second: Link },
}

impl AuditError {
    pub const fn name(&self) -> &'static str {
        match self {
            AuditError::FrameOutOfBounds { .. } => "entry references a missing frame",
            AuditError::Aliased { .. } => "frame referenced twice",
        }
    }
}

impl fmt::Display for AuditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditError::FrameOutOfBounds { frame, link } => {
                write!(f, "{}: {} -> {}", self.name(), link, frame)
            }
            AuditError::Aliased { frame, first, second } => write!(
                f,
                "{}: {} from {} and {}",
                self.name(),
                frame,
                first,
                second
            ),
        }
    }
}

impl std::error::Error for AuditError {}

/// Failure loading a configuration file or a trace.
#[derive(Debug)]
pub enum TraceError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Parse { line: usize, message: String },
}

impl fmt::Display for TraceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceError::Io(e) => write!(f, "I/O error: {}", e),
            TraceError::Json(e) => write!(f, "invalid configuration file: {}", e),
            TraceError::Parse { line, message } => write!(f, "line {}: {}", line, message),
        }
    }
}

impl std::error::Error for TraceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TraceError::Io(e) => Some(e),
            TraceError::Json(e) => Some(e),
            TraceError::Parse { .. } => None,
        }
    }
}

impl From<std::io::Error> for TraceError {
    fn from(e: std::io::Error) -> Self {
        TraceError::Io(e)
    }
}

impl From<serde_json::Error> for TraceError {
    fn from(e: serde_json::Error) -> Self {
        TraceError::Json(e)
    }
}
