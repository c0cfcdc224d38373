//! Error types for loading and executing Micro-Assembly programs.

use std::io;

/// Error type covering the loader, the interpreter, and the memory
/// backends. Loader and interpreter errors are fatal to the current
/// run; native-bridge failures are downgraded to a status-register
/// write at the dispatch boundary and never surface here.
#[derive(Debug)]
pub enum MasmError {
    /// Operand token is not a register, `$address`, or integer literal
    InvalidOperand(String),
    /// Cell index outside the backend's capacity
    OutOfRange(String),
    /// Mnemonic not in the instruction set (detected at load time)
    UnknownInstruction(String),
    /// Jump/call target missing from the label table
    LabelNotFound(String),
    /// RET with an empty call stack
    CallStackUnderflow,
    /// DIV with a zero divisor
    DivisionByZero,
    /// OUT/COUT port other than 1 (stdout) or 2 (stderr)
    InvalidPort(i64),
    /// `#include` target could not be found on any search path
    IncludeNotFound(String),
    /// Include expansion did not settle within the pass limit
    TooManyIncludePasses,
    /// MNI target module or function is not registered
    NativeNotFound(String),
    /// I/O error from a backend file or source read
    Io(io::Error),
}

impl From<io::Error> for MasmError {
    fn from(e: io::Error) -> Self {
        MasmError::Io(e)
    }
}

impl std::fmt::Display for MasmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MasmError::InvalidOperand(tok) => write!(f, "invalid operand: {}", tok),
            MasmError::OutOfRange(what) => write!(f, "memory address out of range: {}", what),
            MasmError::UnknownInstruction(name) => write!(f, "unknown instruction: {}", name),
            MasmError::LabelNotFound(label) => write!(f, "label not found: {}", label),
            MasmError::CallStackUnderflow => write!(f, "RET without a matching CALL"),
            MasmError::DivisionByZero => write!(f, "division by zero"),
            MasmError::InvalidPort(port) => write!(f, "invalid port number: {}", port),
            MasmError::IncludeNotFound(path) => write!(f, "include file not found: {}", path),
            MasmError::TooManyIncludePasses => write!(f, "too many include passes"),
            MasmError::NativeNotFound(name) => write!(f, "MNI function not found: {}", name),
            MasmError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for MasmError {}
