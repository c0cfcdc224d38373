//! MNI, the native-function bridge.
//!
//! Interpreted programs call host-implemented routines with
//! `MNI module.function a1 ... a4`. The registry maps module and
//! function names to plain function pointers and is populated from a
//! fixed list of built-in providers at construction; embedders may
//! register additional modules explicitly.
//!
//! Native failures are non-fatal to the running program: they are
//! caught at the dispatch boundary and reported by writing 0 to the
//! RFLAGS register. Natives signal success the same way, writing 1.

pub mod fs;
pub mod io;
pub mod strings;

use std::collections::HashMap;

use crate::error::MasmError;
use crate::memory::{Memory, register_index};

/// A host-implemented function callable from interpreted code.
pub type NativeFn = fn(&mut MniContext) -> Result<(), String>;

/// Registry of native modules: module name -> function name -> callable.
#[derive(Default)]
pub struct NativeRegistry {
    modules: HashMap<String, HashMap<String, NativeFn>>,
}

impl NativeRegistry {
    /// An empty registry with no modules.
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry with all built-in modules registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        io::register(&mut registry);
        fs::register(&mut registry);
        strings::register(&mut registry);
        registry
    }

    /// Register one function under a module, creating the module on
    /// first use.
    pub fn add(&mut self, module: &str, function: &str, f: NativeFn) {
        self.modules
            .entry(module.to_string())
            .or_default()
            .insert(function.to_string(), f);
    }

    pub fn lookup(&self, module: &str, function: &str) -> Option<NativeFn> {
        self.modules.get(module)?.get(function).copied()
    }

    /// Execute an MNI instruction: `target` is the `module.function`
    /// operand, `args` the remaining raw operand tokens (at most four
    /// are passed through).
    ///
    /// A malformed target is a fatal interpreter error. An unknown
    /// module/function or a failing native degrades to a logged
    /// message and RFLAGS = 0.
    pub fn dispatch(
        &self,
        target: &str,
        args: &[String],
        memory: &mut dyn Memory,
    ) -> Result<(), MasmError> {
        let (module, function) = target.split_once('.').ok_or_else(|| {
            MasmError::InvalidOperand(format!("MNI target must be module.function: {}", target))
        })?;
        if module.is_empty() || function.is_empty() || function.contains('.') {
            return Err(MasmError::InvalidOperand(format!(
                "MNI target must be module.function: {}",
                target
            )));
        }

        let Some(native) = self.lookup(module, function) else {
            eprintln!("{}", MasmError::NativeNotFound(target.to_string()));
            return set_status(memory, 0);
        };

        let mut ctx = MniContext::new(memory, args);
        if let Err(message) = native(&mut ctx) {
            eprintln!("error executing MNI function {}: {}", target, message);
            return set_status(memory, 0);
        }
        Ok(())
    }
}

fn set_status(memory: &mut dyn Memory, value: i64) -> Result<(), MasmError> {
    memory.write_operand("RFLAGS", value)
}

/// Per-dispatch call context: the active memory backend plus up to
/// four raw operand strings. Not persisted beyond one dispatch.
pub struct MniContext<'a> {
    memory: &'a mut dyn Memory,
    args: Vec<String>,
}

impl<'a> MniContext<'a> {
    pub fn new(memory: &'a mut dyn Memory, args: &[String]) -> Self {
        Self {
            memory,
            args: args.iter().take(4).cloned().collect(),
        }
    }

    /// The nth raw operand (0-based), or an error naming the gap.
    pub fn arg(&self, n: usize) -> Result<String, String> {
        self.args
            .get(n)
            .cloned()
            .ok_or_else(|| format!("missing argument {}", n + 1))
    }

    /// Read the null-terminated string whose start address `token`
    /// resolves to (register value, `$addr`, or bare address).
    pub fn read_string(&self, token: &str) -> Result<String, String> {
        let addr = self.memory.string_address(token).map_err(|e| e.to_string())?;
        self.memory.read_string_at(addr).map_err(|e| e.to_string())
    }

    /// Write a null-terminated string at the address `token` resolves to.
    pub fn write_string(&mut self, token: &str, value: &str) -> Result<(), String> {
        let addr = self.memory.string_address(token).map_err(|e| e.to_string())?;
        self.memory
            .write_string_at(addr, value)
            .map_err(|e| e.to_string())
    }

    /// Resolve `token` to its integer value via the operand rules.
    pub fn read_integer(&self, token: &str) -> Result<i64, String> {
        self.memory.read_operand(token).map_err(|e| e.to_string())
    }

    /// Store an integer through the operand rules (register or address).
    pub fn write_integer(&mut self, token: &str, value: i64) -> Result<(), String> {
        self.memory
            .write_operand(token, value)
            .map_err(|e| e.to_string())
    }

    /// Resolve `token` to a memory address: a register resolves to
    /// its value, `$n` to `n`, a bare integer to itself.
    pub fn memory_address(&self, token: &str) -> Result<i64, String> {
        self.memory.string_address(token).map_err(|e| e.to_string())
    }

    /// Low byte of the cell at the address `token` resolves to.
    pub fn read_byte(&self, token: &str) -> Result<u8, String> {
        let addr = self.memory.string_address(token).map_err(|e| e.to_string())?;
        let value = self.memory.read_cell(addr).map_err(|e| e.to_string())?;
        Ok(value as u8)
    }

    pub fn get_register(&self, name: &str) -> Result<i64, String> {
        let idx = register_index(name).ok_or_else(|| format!("not a register: {}", name))?;
        self.memory.read_cell(idx as i64).map_err(|e| e.to_string())
    }

    pub fn set_register(&mut self, name: &str, value: i64) -> Result<(), String> {
        let idx = register_index(name).ok_or_else(|| format!("not a register: {}", name))?;
        self.memory
            .write_cell(idx as i64, value)
            .map_err(|e| e.to_string())
    }
}
