//! Two-pass loader: pre-expanded source lines in, [`Program`] out.
//!
//! The first pass walks the lines counting real instructions and
//! recording `lbl` declarations against the index of the following
//! instruction; the second pass tokenizes and decodes the instruction
//! lines. Two passes are a correctness requirement, not an
//! optimization: forward jump targets must be in the label table
//! before any instruction is allowed to reference them.

pub mod preprocess;

use crate::error::MasmError;
use crate::vm::{Instruction, Op, Program};

/// Load a program from already include-expanded source text. Blank
/// lines and `;` comments are tolerated and skipped here as well, so
/// the loader does not depend on the preprocessor having run.
///
/// Loading is a pure function of its input: the same source always
/// yields the same instruction list and label table.
pub fn load_program(source: &str) -> Result<Program, MasmError> {
    let mut program = Program::default();

    // Pass 1: label table.
    let mut index = 0usize;
    for line in source.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }
        if let Some(name) = label_declaration(line) {
            program.labels.insert(name.to_string(), index);
            continue;
        }
        index += 1;
    }

    // Pass 2: instruction list.
    for line in source.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') || label_declaration(line).is_some() {
            continue;
        }
        program.instructions.push(decode_line(line)?);
    }

    Ok(program)
}

/// The label name if this line is a `lbl <name>` declaration.
fn label_declaration(line: &str) -> Option<&str> {
    let mut parts = line.splitn(2, char::is_whitespace);
    if !parts.next()?.eq_ignore_ascii_case("lbl") {
        return None;
    }
    let name = parts.next()?.trim();
    if name.is_empty() { None } else { Some(name) }
}

fn decode_line(line: &str) -> Result<Instruction, MasmError> {
    let (mnemonic, rest) = match line.find(char::is_whitespace) {
        Some(pos) => (&line[..pos], line[pos..].trim_start()),
        None => (line, ""),
    };

    let op = Op::parse(mnemonic)
        .ok_or_else(|| MasmError::UnknownInstruction(mnemonic.to_string()))?;

    let args = if op == Op::Db {
        tokenize_db(rest)
    } else {
        tokenize(rest)
    };

    Ok(Instruction::new(op, args))
}

/// Split an operand list on whitespace and commas, dropping anything
/// after an inline `;` comment.
fn tokenize(rest: &str) -> Vec<String> {
    let rest = match rest.find(';') {
        Some(pos) => &rest[..pos],
        None => rest,
    };
    rest.split([' ', '\t', ','])
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// DB's second operand may be a quoted string containing spaces; it
/// must survive as a single token, with escapes decoded and the
/// quotes retained.
fn tokenize_db(rest: &str) -> Vec<String> {
    let rest = rest.trim();
    let (address, data) = match rest.find(char::is_whitespace) {
        Some(pos) => (rest[..pos].trim_end_matches(','), rest[pos..].trim_start()),
        None => return tokenize(rest),
    };

    let data = data.trim();
    if let Some(quote) = data.chars().next().filter(|c| *c == '"' || *c == '\'') {
        // Take up to the matching close quote; anything after is a comment.
        let body_end = data[1..].find(quote).map(|p| p + 1);
        let literal = match body_end {
            Some(end) => &data[..=end],
            None => data,
        };
        let decoded = decode_escapes(literal);
        return vec![address.to_string(), decoded];
    }

    let mut args = vec![address.to_string()];
    args.extend(tokenize(data));
    args
}

fn decode_escapes(literal: &str) -> String {
    literal
        .replace("\\n", "\n")
        .replace("\\r", "\r")
        .replace("\\t", "\t")
}
