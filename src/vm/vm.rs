use std::io::{self, Write};

use crate::config::RuntimeConfig;
use crate::error::MasmError;
use crate::memory::{Memory, Operand};
use crate::mni::NativeRegistry;
use crate::vm::{ExitStatus, Flags, Instruction, Op, Program};

/// The Micro-Assembly interpreter.
///
/// Owns the active memory backend, the comparison flags, and the call
/// stack; a [`Program`] is borrowed per run. One `Vm` executes one
/// program at a time, strictly sequentially.
pub struct Vm {
    memory: Box<dyn Memory>,
    natives: NativeRegistry,
    flags: Flags,
    call_stack: Vec<usize>,
    ip: usize,
    exit_on_hlt: bool,
    trace: bool,
    stdout: Box<dyn Write>,
    stderr: Box<dyn Write>,
}

enum Control {
    Continue,
    Halt,
    Exit(i64),
}

impl Vm {
    pub fn new(memory: Box<dyn Memory>) -> Self {
        Self::with_config(memory, &RuntimeConfig::default())
    }

    pub fn with_config(memory: Box<dyn Memory>, config: &RuntimeConfig) -> Self {
        Self::with_output(
            memory,
            config,
            Box::new(io::stdout()),
            Box::new(io::stderr()),
        )
    }

    /// Create a Vm with custom output streams, so tests can capture
    /// what OUT/COUT produce.
    pub fn with_output(
        memory: Box<dyn Memory>,
        config: &RuntimeConfig,
        stdout: Box<dyn Write>,
        stderr: Box<dyn Write>,
    ) -> Self {
        Self {
            memory,
            natives: NativeRegistry::with_builtins(),
            flags: Flags::default(),
            call_stack: Vec::new(),
            ip: 0,
            exit_on_hlt: config.exit_on_hlt,
            trace: config.trace,
            stdout,
            stderr,
        }
    }

    pub fn memory(&self) -> &dyn Memory {
        self.memory.as_ref()
    }

    pub fn memory_mut(&mut self) -> &mut dyn Memory {
        self.memory.as_mut()
    }

    pub fn flags(&self) -> &Flags {
        &self.flags
    }

    /// Register additional native modules beyond the builtins.
    pub fn natives_mut(&mut self) -> &mut NativeRegistry {
        &mut self.natives
    }

    /// Execute `program` to completion.
    ///
    /// Starts at the `main` label when one exists, otherwise at
    /// instruction 0. The instruction pointer, call stack, and
    /// comparison flags are reset on entry; memory carries over from
    /// previous runs.
    pub fn run(&mut self, program: &Program) -> Result<ExitStatus, MasmError> {
        self.ip = program.labels.get("main").copied().unwrap_or(0);
        self.call_stack.clear();
        self.flags = Flags::default();

        loop {
            // Running off the end is an implicit HLT.
            if self.ip >= program.instructions.len() {
                return Ok(ExitStatus::Halted);
            }

            let position = self.ip;
            let instr = &program.instructions[position];
            // Advance before dispatch; control-flow opcodes overwrite
            // the already-advanced pointer.
            self.ip += 1;

            if self.trace {
                eprintln!(
                    "[exec] {:>4}: {} {}",
                    position,
                    instr.op.name(),
                    instr.args.join(" ")
                );
            }

            match self.execute(instr, program)? {
                Control::Continue => {}
                Control::Halt => return Ok(ExitStatus::Halted),
                Control::Exit(code) => return Ok(ExitStatus::Exited(code)),
            }
        }
    }

    fn execute(&mut self, instr: &Instruction, program: &Program) -> Result<Control, MasmError> {
        match instr.op {
            Op::Mov => {
                let (dest, src) = self.two_args(instr)?;
                let value = self.memory.read_operand(&src)?;
                self.memory.write_operand(&dest, value)?;
            }
            Op::Add => self.binary(instr, |a, b| Ok(a.wrapping_add(b)))?,
            Op::Sub => self.binary(instr, |a, b| Ok(a.wrapping_sub(b)))?,
            Op::Mul => self.binary(instr, |a, b| Ok(a.wrapping_mul(b)))?,
            Op::Div => self.binary(instr, |a, b| {
                if b == 0 {
                    Err(MasmError::DivisionByZero)
                } else {
                    Ok(a.wrapping_div(b))
                }
            })?,
            Op::And => self.binary(instr, |a, b| Ok(a & b))?,
            Op::Or => self.binary(instr, |a, b| Ok(a | b))?,
            Op::Xor => self.binary(instr, |a, b| Ok(a ^ b))?,
            Op::Not => self.unary(instr, |a| !a)?,
            Op::Inc => self.unary(instr, |a| a.wrapping_add(1))?,
            Op::Dec => self.unary(instr, |a| a.wrapping_sub(1))?,
            Op::Cmp => {
                let (a, b) = self.two_args(instr)?;
                let a = self.memory.read_operand(&a)?;
                let b = self.memory.read_operand(&b)?;
                self.flags.set_from_cmp(a, b);
            }
            Op::Jmp => {
                self.ip = self.label_target(program, &self.arg(instr, 0)?)?;
            }
            Op::Je => {
                if self.flags.equal {
                    self.ip = self.label_target(program, &self.arg(instr, 0)?)?;
                } else if instr.args.len() > 1 {
                    self.ip = self.label_target(program, &self.arg(instr, 1)?)?;
                }
            }
            Op::Jl => {
                if self.flags.less {
                    self.ip = self.label_target(program, &self.arg(instr, 0)?)?;
                }
            }
            Op::Call => {
                let target = self.label_target(program, &self.arg(instr, 0)?)?;
                // The already-advanced ip is the return address.
                self.call_stack.push(self.ip);
                self.ip = target;
            }
            Op::Ret => {
                self.ip = self
                    .call_stack
                    .pop()
                    .ok_or(MasmError::CallStackUnderflow)?;
            }
            Op::Push => {
                let value = self.memory.read_operand(&self.arg(instr, 0)?)?;
                let rsp = self.memory.read_operand("RSP")? - 1;
                self.memory.write_cell(rsp, value)?;
                self.memory.write_operand("RSP", rsp)?;
            }
            Op::Pop => {
                let dest = self.arg(instr, 0)?;
                let rsp = self.memory.read_operand("RSP")?;
                let value = self.memory.read_cell(rsp)?;
                self.memory.write_operand(&dest, value)?;
                self.memory.write_operand("RSP", rsp + 1)?;
            }
            Op::Db => self.db(instr)?,
            Op::Out => self.out(instr, true)?,
            Op::Cout => self.out(instr, false)?,
            Op::Hlt => {
                if self.exit_on_hlt {
                    return Ok(Control::Halt);
                }
            }
            Op::Exit => {
                let code = match instr.args.first() {
                    Some(token) => self.memory.read_operand(token)?,
                    None => 0,
                };
                return Ok(Control::Exit(code));
            }
            Op::Mni => {
                let target = self.arg(instr, 0)?;
                self.natives
                    .dispatch(&target, &instr.args[1..], self.memory.as_mut())?;
            }
        }
        Ok(Control::Continue)
    }

    fn arg(&self, instr: &Instruction, n: usize) -> Result<String, MasmError> {
        instr.args.get(n).cloned().ok_or_else(|| {
            MasmError::InvalidOperand(format!(
                "{} expects at least {} operand(s)",
                instr.op.name(),
                n + 1
            ))
        })
    }

    fn two_args(&self, instr: &Instruction) -> Result<(String, String), MasmError> {
        Ok((self.arg(instr, 0)?, self.arg(instr, 1)?))
    }

    /// `op d,s` with the result written back to `d`. The source is
    /// checked (e.g. for a zero divisor) before the destination is
    /// touched.
    fn binary(
        &mut self,
        instr: &Instruction,
        f: impl Fn(i64, i64) -> Result<i64, MasmError>,
    ) -> Result<(), MasmError> {
        let (dest, src) = self.two_args(instr)?;
        let a = self.memory.read_operand(&dest)?;
        let b = self.memory.read_operand(&src)?;
        let result = f(a, b)?;
        self.memory.write_operand(&dest, result)
    }

    fn unary(&mut self, instr: &Instruction, f: impl Fn(i64) -> i64) -> Result<(), MasmError> {
        let dest = self.arg(instr, 0)?;
        let value = self.memory.read_operand(&dest)?;
        self.memory.write_operand(&dest, f(value))
    }

    fn label_target(&self, program: &Program, token: &str) -> Result<usize, MasmError> {
        let name = token.strip_prefix('#').ok_or_else(|| {
            MasmError::InvalidOperand(format!("jump target must be a #label: {}", token))
        })?;
        program
            .labels
            .get(name)
            .copied()
            .ok_or_else(|| MasmError::LabelNotFound(name.to_string()))
    }

    /// `DB $addr,value` — write a string (null-terminated) or a
    /// single integer at the address.
    fn db(&mut self, instr: &Instruction) -> Result<(), MasmError> {
        let (addr_token, data) = self.two_args(instr)?;
        let addr = match Operand::parse(&addr_token)? {
            Operand::Address(addr) => addr,
            _ => {
                return Err(MasmError::InvalidOperand(format!(
                    "DB expects a memory address, got {}",
                    addr_token
                )));
            }
        };

        if let Some(literal) = strip_quotes(&data) {
            self.memory.write_string_at(addr, literal)
        } else if let Ok(value) = data.parse::<i64>() {
            self.memory.write_cell(addr, value)
        } else {
            Err(MasmError::InvalidOperand(format!(
                "DB expects a string or number, got {}",
                data
            )))
        }
    }

    /// `OUT port,value` / `COUT port,value`. With `strings` set (OUT),
    /// a `$`-prefixed value token prints the null-terminated string at
    /// the resolved address; otherwise the value prints as one
    /// character.
    fn out(&mut self, instr: &Instruction, strings: bool) -> Result<(), MasmError> {
        let (port_token, value_token) = self.two_args(instr)?;
        let port = self.memory.read_operand(&port_token)?;

        let text = if strings && value_token.starts_with('$') {
            let addr = self.memory.string_address(&value_token)?;
            self.memory.read_string_at(addr)?
        } else {
            let value = self.memory.read_operand(&value_token)?;
            char::from_u32(value as u32)
                .unwrap_or(char::REPLACEMENT_CHARACTER)
                .to_string()
        };

        let stream: &mut dyn Write = match port {
            1 => self.stdout.as_mut(),
            2 => self.stderr.as_mut(),
            other => return Err(MasmError::InvalidPort(other)),
        };
        write!(stream, "{}", text)?;
        stream.flush()?;
        Ok(())
    }
}

fn strip_quotes(token: &str) -> Option<&str> {
    for quote in ['"', '\''] {
        if token.len() >= 2 && token.starts_with(quote) && token.ends_with(quote) {
            return Some(&token[1..token.len() - 1]);
        }
    }
    None
}
