pub mod config;
pub mod constants;
pub mod error;
pub mod eviction;
pub mod frame_search;
pub mod frame_selector;
pub mod io;
pub mod memory;
pub mod translation;
pub mod vm_manager;

// Re-export commonly used items for convenience
pub use config::MemoryConfig;
pub use error::{AuditError, ConfigError, MmuError, TraceError};
pub use memory::{FrameIndex, PageNumber, PhysicalMemory, PhysicalStore, Word};
pub use translation::VirtualAddress;
pub use vm_manager::{PagingStats, ResidentPage, VMManager};
