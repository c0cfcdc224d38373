//! masm - a Micro-Assembly register machine
//!
//! This library provides the loader, interpreter, memory backends,
//! and native-function bridge (MNI) for the Micro-Assembly language.

pub mod config;
pub mod console;
pub mod error;
pub mod loader;
pub mod memory;
pub mod mni;
pub mod package;
pub mod server;
pub mod vm;

// Re-export commonly used types
pub use config::{MemoryBackendKind, RuntimeConfig};
pub use error::MasmError;
pub use loader::load_program;
pub use memory::{ArrayMemory, MappedMemory, Memory, Operand, open_backend};
pub use mni::{MniContext, NativeRegistry};
pub use vm::{ExitStatus, Flags, Instruction, Op, Program, Vm};
