//! Runtime configuration types.

use std::path::PathBuf;

/// Which memory backend backs the cell store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MemoryBackendKind {
    /// Volatile in-process array
    #[default]
    Array,
    /// Persistent memory-mapped file
    Mapped,
}

/// Default cell-store size in bytes (64 MiB = 8M cells)
pub const DEFAULT_MEMORY_SIZE: usize = 64 * 1024 * 1024;

/// Minimum size a mapped memory file is grown to at open
pub const MIN_MAPPED_SIZE: usize = 1024 * 1024;

/// Runtime configuration for the interpreter
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub backend: MemoryBackendKind,
    /// Cell-store size in bytes (array backend; minimum for mapped)
    pub memory_size: usize,
    /// Backing file for the mapped backend
    pub memory_file: PathBuf,
    /// Whether HLT terminates execution (default: true)
    pub exit_on_hlt: bool,
    /// Print load/run progress messages
    pub verbose: bool,
    /// Trace every executed instruction to stderr
    pub trace: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            backend: MemoryBackendKind::Array,
            memory_size: DEFAULT_MEMORY_SIZE,
            memory_file: PathBuf::from("masm.mem"),
            exit_on_hlt: true,
            verbose: false,
            trace: false,
        }
    }
}
