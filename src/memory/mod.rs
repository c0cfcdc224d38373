//! The cell store: a linear sequence of 64-bit cells addressed by
//! index, with the register file aliased onto the low cells.
//!
//! Two interchangeable backends implement the [`Memory`] trait: a
//! volatile in-process array and a persistent memory-mapped file. All
//! operand and string logic lives in trait-provided methods so the
//! resolution rules exist exactly once.

mod array;
mod mapped;

pub use array::ArrayMemory;
pub use mapped::MappedMemory;

use crate::config::{MemoryBackendKind, MIN_MAPPED_SIZE, RuntimeConfig};
use crate::error::MasmError;

/// Register names, in cell order. Register `REGISTERS[i]` is aliased
/// to cell `i`; registers and general memory share one address space.
pub const REGISTERS: [&str; 25] = [
    "RAX", "RBX", "RCX", "RDX", "RBP", "RSP", "RDI", "RSI", "RFLAGS", "R0", "R1", "R2", "R3",
    "R4", "R5", "R6", "R7", "R8", "R9", "R10", "R11", "R12", "R13", "R14", "R15",
];

/// Cell index of a register name, if it is one.
pub fn register_index(name: &str) -> Option<usize> {
    REGISTERS.iter().position(|r| *r == name)
}

/// A resolved operand token. The three-way rule: exact register name,
/// then `$`-prefixed cell address, then signed decimal literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// A register, by cell index
    Register(usize),
    /// A direct cell address
    Address(i64),
    /// An integer literal (read-only)
    Literal(i64),
}

impl Operand {
    /// Parse a raw operand token. This is the single source of truth
    /// for operand resolution; every opcode handler and native-bridge
    /// accessor routes through it.
    pub fn parse(token: &str) -> Result<Operand, MasmError> {
        if let Some(idx) = register_index(token) {
            return Ok(Operand::Register(idx));
        }
        if let Some(rest) = token.strip_prefix('$') {
            let addr: i64 = rest
                .parse()
                .map_err(|_| MasmError::InvalidOperand(token.to_string()))?;
            if addr < 0 {
                return Err(MasmError::InvalidOperand(token.to_string()));
            }
            return Ok(Operand::Address(addr));
        }
        if let Ok(value) = token.parse::<i64>() {
            return Ok(Operand::Literal(value));
        }
        Err(MasmError::InvalidOperand(token.to_string()))
    }
}

/// The cell-store contract shared by both backends.
///
/// Backends supply bounds-checked cell access and capacity; operand
/// and string resolution are provided methods on top of those.
pub trait Memory {
    /// Read the cell at `index`. Fails with OutOfRange for negative or
    /// past-capacity indices.
    fn read_cell(&self, index: i64) -> Result<i64, MasmError>;

    /// Write the cell at `index`, with the same bounds rule.
    fn write_cell(&mut self, index: i64, value: i64) -> Result<(), MasmError>;

    /// Capacity in cells.
    fn len(&self) -> i64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve a token to its value: register cell, addressed cell, or
    /// the literal itself.
    fn read_operand(&self, token: &str) -> Result<i64, MasmError> {
        match Operand::parse(token)? {
            Operand::Register(idx) => self.read_cell(idx as i64),
            Operand::Address(addr) => self.read_cell(addr),
            Operand::Literal(value) => Ok(value),
        }
    }

    /// Resolve a token to a writable location and store `value` there.
    /// A literal is not a valid write target.
    fn write_operand(&mut self, token: &str, value: i64) -> Result<(), MasmError> {
        match Operand::parse(token)? {
            Operand::Register(idx) => self.write_cell(idx as i64, value),
            Operand::Address(addr) => self.write_cell(addr, value),
            Operand::Literal(_) => Err(MasmError::InvalidOperand(format!(
                "literal is not a writable location: {}",
                token
            ))),
        }
    }

    /// Resolve a token to the start address of an in-memory string.
    /// A register resolves to its current value, `$n` to `n` (with
    /// `$REG` meaning the address held in `REG`), and a bare integer
    /// to itself. Used by OUT's string path and the native bridge.
    fn string_address(&self, token: &str) -> Result<i64, MasmError> {
        if let Some(rest) = token.strip_prefix('$') {
            if let Some(idx) = register_index(rest) {
                return self.read_cell(idx as i64);
            }
            return match rest.parse::<i64>() {
                Ok(addr) if addr >= 0 => Ok(addr),
                _ => Err(MasmError::InvalidOperand(token.to_string())),
            };
        }
        if let Some(idx) = register_index(token) {
            return self.read_cell(idx as i64);
        }
        token
            .parse::<i64>()
            .map_err(|_| MasmError::InvalidOperand(token.to_string()))
    }

    /// Read the null-terminated string starting at the `$address`
    /// token. One character per cell; stops at a zero cell or the end
    /// of capacity.
    fn read_string(&self, token: &str) -> Result<String, MasmError> {
        match Operand::parse(token)? {
            Operand::Address(addr) => self.read_string_at(addr),
            _ => Err(MasmError::InvalidOperand(format!(
                "expected a memory address: {}",
                token
            ))),
        }
    }

    /// String read by start address.
    fn read_string_at(&self, addr: i64) -> Result<String, MasmError> {
        let mut out = String::new();
        let mut current = addr;
        while current < self.len() {
            let value = self.read_cell(current)?;
            if value == 0 {
                break;
            }
            out.push(char::from_u32(value as u32).unwrap_or(char::REPLACEMENT_CHARACTER));
            current += 1;
        }
        Ok(out)
    }

    /// Write `value` one character per cell starting at the `$address`
    /// token, followed by a zero cell. The string occupies
    /// `value.chars().count() + 1` cells; nothing guards against
    /// overlapping other data.
    fn write_string(&mut self, token: &str, value: &str) -> Result<(), MasmError> {
        match Operand::parse(token)? {
            Operand::Address(addr) => self.write_string_at(addr, value),
            _ => Err(MasmError::InvalidOperand(format!(
                "expected a memory address: {}",
                token
            ))),
        }
    }

    /// String write by start address.
    fn write_string_at(&mut self, addr: i64, value: &str) -> Result<(), MasmError> {
        let mut current = addr;
        for ch in value.chars() {
            self.write_cell(current, ch as i64)?;
            current += 1;
        }
        self.write_cell(current, 0)
    }
}

/// Construct the configured backend. The caller owns the returned
/// instance and must thread it through the loader, interpreter, and
/// native bridge; sub-systems never construct their own.
pub fn open_backend(config: &RuntimeConfig) -> Result<Box<dyn Memory>, MasmError> {
    match config.backend {
        MemoryBackendKind::Array => Ok(Box::new(ArrayMemory::new(config.memory_size))),
        MemoryBackendKind::Mapped => Ok(Box::new(MappedMemory::open(
            &config.memory_file,
            MIN_MAPPED_SIZE,
        )?)),
    }
}
